//! Epoch:version-release values

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::vercmp::rpmvercmp;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvrError {
    #[error("Unknown comparison operator: {0}")]
    UnknownOperator(String),

    #[error("Empty version in \"{0}\"")]
    EmptyVersion(String),
}

/// A parsed `[epoch:]version[-release]` string.
///
/// The epoch is only present when the input carried a `digits:` prefix; an
/// empty epoch (`:1.0`) is read as `0`. The release is everything after the
/// last `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Evr {
    pub epoch: Option<String>,
    pub version: String,
    pub release: Option<String>,
}

impl Evr {
    /// Build an EVR from its parts.
    pub fn new(epoch: Option<u32>, version: impl Into<String>, release: Option<&str>) -> Self {
        Self {
            epoch: epoch.map(|e| e.to_string()),
            version: version.into(),
            release: release.map(str::to_string),
        }
    }

    /// Split an EVR string. Never fails; missing parts are `None`.
    pub fn parse(s: &str) -> Self {
        let digits = s.bytes().take_while(u8::is_ascii_digit).count();

        let (epoch, rest) = if s.as_bytes().get(digits) == Some(&b':') {
            let e = &s[..digits];
            let e = if e.is_empty() { "0" } else { e };
            (Some(e.to_string()), &s[digits + 1..])
        } else {
            (None, s)
        };

        let (version, release) = match rest.rfind('-') {
            Some(idx) => (&rest[..idx], Some(rest[idx + 1..].to_string())),
            None => (rest, None),
        };

        Self {
            epoch,
            version: version.to_string(),
            release,
        }
    }

    /// Numeric epoch, `0` when missing or unparsable.
    pub fn epoch_num(&self) -> u64 {
        self.epoch
            .as_deref()
            .and_then(|e| e.parse().ok())
            .unwrap_or(0)
    }

    /// Whether an explicit, non-empty epoch was given.
    pub fn has_epoch(&self) -> bool {
        self.epoch.as_deref().map_or(false, |e| !e.is_empty())
    }

    /// Whether a non-empty release was given.
    pub fn has_release(&self) -> bool {
        self.release.as_deref().map_or(false, |r| !r.is_empty())
    }

    /// Total order used for package identity comparisons.
    ///
    /// A missing epoch counts as `0` and a missing release as empty.
    pub fn compare(&self, other: &Evr) -> Ordering {
        let ae = self.epoch.as_deref().unwrap_or("0");
        let be = other.epoch.as_deref().unwrap_or("0");
        rpmvercmp(ae, be)
            .then_with(|| rpmvercmp(&self.version, &other.version))
            .then_with(|| {
                rpmvercmp(
                    self.release.as_deref().unwrap_or(""),
                    other.release.as_deref().unwrap_or(""),
                )
            })
    }
}

impl FromStr for Evr {
    type Err = EvrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let evr = Evr::parse(s.trim());
        if evr.version.is_empty() {
            return Err(EvrError::EmptyVersion(s.to_string()));
        }
        Ok(evr)
    }
}

impl fmt::Display for Evr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(epoch) = &self.epoch {
            write!(f, "{}:", epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(release) = &self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}
