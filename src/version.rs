//! Datamodel versions.
//!
//! Versions come from two places: delta directory names
//! (`delta_1.5.2_add_view`) and the `version` column of the metadata table.
//! Both are written by the migration tool's Python ecosystem, so parsing
//! follows the public version grammar of Python packaging (epoch and local
//! segments aside), which is a superset of plain `MAJOR.MINOR.PATCH`.

use regex::Regex;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::DatamodelError;

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?x)^
            v?
            (?P<release>[0-9]+(?:\.[0-9]+)*)
            (?:
                [-_.]?
                (?P<pre_l>alpha|a|beta|b|preview|pre|c|rc)
                [-_.]?
                (?P<pre_n>[0-9]+)?
            )?
            (?:
                (?:-(?P<post_n1>[0-9]+))
                |
                (?:[-_.]?(?P<post_l>post|rev|r)[-_.]?(?P<post_n2>[0-9]+)?)
            )?
            (?:
                [-_.]?
                (?P<dev_l>dev)
                [-_.]?
                (?P<dev_n>[0-9]+)?
            )?
            $",
        )
        .expect("version pattern is valid")
    })
}

/// Pre-release phase, ordered alpha < beta < release candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PreRelease {
    Alpha,
    Beta,
    Rc,
}

impl PreRelease {
    fn from_label(label: &str) -> Self {
        match label {
            "a" | "alpha" => PreRelease::Alpha,
            "b" | "beta" => PreRelease::Beta,
            _ => PreRelease::Rc,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            PreRelease::Alpha => "a",
            PreRelease::Beta => "b",
            PreRelease::Rc => "rc",
        }
    }
}

/// A parsed version with total ordering.
#[derive(Debug, Clone)]
pub struct Version {
    release: Vec<u64>,
    pre: Option<(PreRelease, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
}

/// Position of the pre-release segment in the ordering.
/// A dev release without pre/post sorts before every pre-release.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum PreKey {
    DevOnly,
    Pre(PreRelease, u64),
    Final,
}

impl Version {
    pub fn parse(input: &str) -> Result<Self, DatamodelError> {
        let normalized = input.trim().to_ascii_lowercase();
        let caps = version_pattern()
            .captures(&normalized)
            .ok_or_else(|| DatamodelError::InvalidVersion(input.to_string()))?;

        let number = |s: &str| -> Result<u64, DatamodelError> {
            s.parse::<u64>()
                .map_err(|_| DatamodelError::InvalidVersion(input.to_string()))
        };

        let release = caps["release"]
            .split('.')
            .map(number)
            .collect::<Result<Vec<_>, _>>()?;

        let pre = match caps.name("pre_l") {
            Some(label) => {
                let n = caps.name("pre_n").map(|m| number(m.as_str())).transpose()?;
                Some((PreRelease::from_label(label.as_str()), n.unwrap_or(0)))
            }
            None => None,
        };

        let post = if let Some(n) = caps.name("post_n1") {
            Some(number(n.as_str())?)
        } else if caps.name("post_l").is_some() {
            Some(
                caps.name("post_n2")
                    .map(|m| number(m.as_str()))
                    .transpose()?
                    .unwrap_or(0),
            )
        } else {
            None
        };

        let dev = match caps.name("dev_l") {
            Some(_) => Some(
                caps.name("dev_n")
                    .map(|m| number(m.as_str()))
                    .transpose()?
                    .unwrap_or(0),
            ),
            None => None,
        };

        Ok(Version {
            release,
            pre,
            post,
            dev,
        })
    }

    /// Release components as written (`1.5` stays `[1, 5]`).
    #[cfg(test)]
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    #[cfg(test)]
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    fn pre_key(&self) -> PreKey {
        match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => PreKey::DevOnly,
            (Some((phase, n)), _, _) => PreKey::Pre(phase, n),
            _ => PreKey::Final,
        }
    }

    fn cmp_release(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        for i in 0..len {
            let a = self.release.get(i).copied().unwrap_or(0);
            let b = other.release.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_release(other)
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            // no post-release sorts before any post-release
            .then_with(|| self.post.cmp(&other.post))
            // no dev marker sorts after any dev marker
            .then_with(|| match (self.dev, other.dev) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(&b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl FromStr for Version {
    type Err = DatamodelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let release: Vec<String> = self.release.iter().map(|n| n.to_string()).collect();
        write!(f, "{}", release.join("."))?;
        if let Some((phase, n)) = self.pre {
            write!(f, "{}{}", phase.as_str(), n)?;
        }
        if let Some(n) = self.post {
            write!(f, ".post{}", n)?;
        }
        if let Some(n) = self.dev {
            write!(f, ".dev{}", n)?;
        }
        Ok(())
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
