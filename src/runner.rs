//! Command runner: SQL statements against a named service, and external
//! processes with a timeout.
//!
//! Everything that leaves the process goes through the [`Runner`] trait, so
//! reconciliation and dispatch can be driven by a scripted runner in tests.

use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio_postgres::{NoTls, SimpleQueryMessage};

use crate::error::{DatamodelError, Result};
use crate::service::ServiceStore;

/// Database that is always present on a server; used to test reachability
/// independently of the service's own database.
pub const ADMIN_DATABASE: &str = "postgres";

/// One result row, every column in its text representation.
pub type Row = Vec<Option<String>>;

/// Which database of the service a statement runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbTarget {
    /// The database named in the service
    Service,
    /// Same host and credentials, administrative database
    Admin,
}

impl fmt::Display for DbTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbTarget::Service => write!(f, "service database"),
            DbTarget::Admin => write!(f, "{} database", ADMIN_DATABASE),
        }
    }
}

/// An external command, either as an argv vector or a shell string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    Argv(Vec<String>),
    Shell(String),
}

impl CommandLine {
    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandLine::Argv(args.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLine::Shell(s) => write!(f, "{}", s),
            CommandLine::Argv(argv) => {
                let parts: Vec<String> = argv
                    .iter()
                    .map(|a| {
                        if a.is_empty() || a.contains(char::is_whitespace) {
                            format!("\"{}\"", a.replace('"', "\\\""))
                        } else {
                            a.clone()
                        }
                    })
                    .collect();
                write!(f, "{}", parts.join(" "))
            }
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait Runner {
    /// Connect with the named service, run one statement, commit, return rows.
    ///
    /// Every connection-level failure maps to `DatabaseConnection`; a missing
    /// table, a missing database and an unreachable server look the same here.
    async fn run_sql(
        &self,
        service: &str,
        statement: &str,
        target: DbTarget,
        autocommit: bool,
    ) -> Result<Vec<Row>>;

    /// Run an external command and return its stdout.
    ///
    /// `timeout: None` waits indefinitely. Output is logged whatever the outcome.
    async fn run_command(
        &self,
        command: &CommandLine,
        cwd: Option<&Path>,
        timeout: Option<Duration>,
    ) -> Result<String>;
}

/// Runner backed by tokio-postgres and real child processes.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    store: ServiceStore,
    connect_timeout: Duration,
}

impl SystemRunner {
    pub fn new(store: ServiceStore, connect_timeout: Duration) -> Self {
        Self {
            store,
            connect_timeout,
        }
    }

    fn pg_config(
        &self,
        service: &str,
        statement: &str,
        target: DbTarget,
    ) -> Result<tokio_postgres::Config> {
        let conn_err = |message: String| DatamodelError::DatabaseConnection {
            statement: statement.to_string(),
            message,
        };

        // libpq reports service file problems as connection errors too
        let profile = self
            .store
            .read_profile(service)
            .map_err(|e| conn_err(e.to_string()))?
            .ok_or_else(|| {
                conn_err(format!(
                    "service '{}' not found in {}",
                    service,
                    self.store.path().display()
                ))
            })?;

        let mut config = tokio_postgres::Config::new();
        config.application_name("qgep-datamodel");
        config.connect_timeout(self.connect_timeout);

        if profile.host.is_empty() {
            config.host("localhost");
        } else {
            config.host(&profile.host);
        }

        if !profile.port.is_empty() {
            let port: u16 = profile.port.parse().map_err(|_| {
                conn_err(format!(
                    "invalid port '{}' in service '{}'",
                    profile.port, service
                ))
            })?;
            config.port(port);
        }

        match target {
            DbTarget::Admin => {
                config.dbname(ADMIN_DATABASE);
            }
            DbTarget::Service if !profile.dbname.is_empty() => {
                config.dbname(&profile.dbname);
            }
            DbTarget::Service => {}
        }

        let user = profile
            .user
            .or_else(|| std::env::var("PGUSER").ok())
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok());
        if let Some(ref user) = user {
            config.user(user);
        }

        let password = profile
            .password
            .or_else(|| std::env::var("PGPASSWORD").ok());
        if let Some(ref password) = password {
            config.password(password);
        }

        Ok(config)
    }
}

impl Runner for SystemRunner {
    async fn run_sql(
        &self,
        service: &str,
        statement: &str,
        target: DbTarget,
        autocommit: bool,
    ) -> Result<Vec<Row>> {
        log::info!(
            "Running query against service={} ({}): {}",
            service,
            target,
            statement
        );

        let config = self.pg_config(service, statement, target)?;
        let conn_err = |e: tokio_postgres::Error| DatamodelError::DatabaseConnection {
            statement: statement.to_string(),
            message: format!("Could not query service '{}' ({}): {}", service, target, e),
        };

        let (mut client, connection) = config.connect(NoTls).await.map_err(conn_err)?;

        // Spawn the connection handler
        tokio::spawn(async move {
            let _ = connection.await;
        });

        let messages = if autocommit {
            client.simple_query(statement).await.map_err(conn_err)?
        } else {
            let transaction = client.transaction().await.map_err(conn_err)?;
            let messages = transaction.simple_query(statement).await.map_err(conn_err)?;
            transaction.commit().await.map_err(conn_err)?;
            messages
        };

        let rows: Vec<Row> = messages
            .into_iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => Some(
                    (0..row.len())
                        .map(|i| row.get(i).map(str::to_string))
                        .collect(),
                ),
                _ => None,
            })
            .collect();

        log::debug!("Query returned {} row(s)", rows.len());
        Ok(rows)
    }

    async fn run_command(
        &self,
        command: &CommandLine,
        cwd: Option<&Path>,
        timeout: Option<Duration>,
    ) -> Result<String> {
        run_process(command, cwd, timeout).await
    }
}

/// Spawn `command`, capture its output and enforce `timeout`.
pub async fn run_process(
    command: &CommandLine,
    cwd: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<String> {
    let display = command.to_string();
    log::info!("Running command: {}", display);

    let spawn_failed = |reason: String| DatamodelError::Command {
        command: display.clone(),
        exit_code: -1,
        stdout: String::new(),
        stderr: reason,
    };

    let mut cmd = match command {
        CommandLine::Argv(argv) => {
            let (program, args) = argv
                .split_first()
                .ok_or_else(|| spawn_failed("empty command".to_string()))?;
            let mut cmd = tokio::process::Command::new(program);
            cmd.args(args);
            cmd
        }
        CommandLine::Shell(line) => {
            if cfg!(windows) {
                let mut cmd = tokio::process::Command::new("cmd");
                cmd.args(["/C", line.as_str()]);
                cmd
            } else {
                let mut cmd = tokio::process::Command::new("sh");
                cmd.args(["-c", line.as_str()]);
                cmd
            }
        }
    };

    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| spawn_failed(format!("failed to start: {}", e)))?;

    let waited = match timeout {
        // Dropping the future drops the child, which kills it.
        Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(result) => result,
            Err(_) => {
                log::error!("Command timed out after {:?}: {}", limit, display);
                return Err(DatamodelError::Timeout {
                    command: display,
                    timeout: limit,
                });
            }
        },
        None => child.wait_with_output().await,
    };
    let output = waited.map_err(|e| DatamodelError::io(format!("waiting for {}", display), e))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !stdout.is_empty() {
        log::info!("{}", stdout.trim_end());
    }
    if !stderr.is_empty() {
        log::error!("{}", stderr.trim_end());
    }

    if !output.status.success() {
        return Err(DatamodelError::Command {
            command: display,
            exit_code: output.status.code().unwrap_or(-1),
            stdout,
            stderr,
        });
    }

    Ok(stdout)
}
