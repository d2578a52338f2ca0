//! Argument construction for the migration tool and the setup script.

use std::path::Path;

use crate::resolver::PUM_INFO_TABLE;
use crate::runner::CommandLine;
use crate::version::Version;

/// `<pum...> upgrade -p <service> -t qgep_sys.pum_info -d <delta_dir> -u <target> -v int SRID <srid>`
pub fn upgrade_command(
    program: &[String],
    service: &str,
    delta_dir: &Path,
    target: &Version,
    srid: u32,
) -> CommandLine {
    let mut argv: Vec<String> = program.to_vec();
    argv.extend([
        "upgrade".to_string(),
        "-p".to_string(),
        service.to_string(),
        "-t".to_string(),
        PUM_INFO_TABLE.to_string(),
        "-d".to_string(),
        delta_dir.display().to_string(),
        "-u".to_string(),
        target.to_string(),
        "-v".to_string(),
        "int".to_string(),
        "SRID".to_string(),
        srid.to_string(),
    ]);
    CommandLine::Argv(argv)
}

/// `<script> -s <srid> -p <service>`
pub fn setup_command(script: &Path, srid: u32, service: &str) -> CommandLine {
    CommandLine::argv([
        script.display().to_string(),
        "-s".to_string(),
        srid.to_string(),
        "-p".to_string(),
        service.to_string(),
    ])
}

/// `<python> -m pip install --user "<req>"...` as a shell line.
pub fn pip_install_command(python: &str, requirements: &[String]) -> CommandLine {
    // run through the shell: on Windows `python3` is usually a .bat wrapper
    let mut line = format!("{} -m pip install --user", shell_word(python));
    for requirement in requirements {
        line.push_str(&format!(" \"{}\"", requirement.replace('"', "\\\"")));
    }
    CommandLine::Shell(line)
}

fn shell_word(word: &str) -> String {
    if word.contains(char::is_whitespace) {
        format!("\"{}\"", word)
    } else {
        word.to_string()
    }
}

const REQUIREMENTS_CHECK: &str = r#"import sys, pkg_resources
missing = []
for req in sys.argv[1:]:
    try:
        pkg_resources.require(req)
    except pkg_resources.DistributionNotFound:
        missing.append(req + ": missing")
    except pkg_resources.VersionConflict:
        missing.append(req + ": conflict")
print("\n".join(missing))
sys.exit(1 if missing else 0)
"#;

/// Prints one `<req>: missing|conflict` line per unmet requirement and
/// exits 1 if there is any.
pub fn requirements_check_command(python: &str, requirements: &[String]) -> CommandLine {
    let mut argv = vec![
        python.to_string(),
        "-c".to_string(),
        REQUIREMENTS_CHECK.to_string(),
    ];
    argv.extend(requirements.iter().cloned());
    CommandLine::Argv(argv)
}
