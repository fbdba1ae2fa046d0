//! Dependency sense flags

use bitflags::bitflags;
use std::fmt;

use crate::evr::EvrError;

bitflags! {
    /// Comparison and context flags attached to a dependency.
    ///
    /// The low bits (`LESS`, `GREATER`, `EQUAL`) select the version range,
    /// the remaining bits describe where the dependency came from.
    #[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
    pub struct Sense: u32 {
        const ANY = 0;
        const LESS = 1 << 1;
        const GREATER = 1 << 2;
        const EQUAL = 1 << 3;

        const PROVIDES = 1 << 4;
        const CONFLICTS = 1 << 5;
        const PREREQ = 1 << 6;      // legacy prereq dependency
        const OBSOLETES = 1 << 7;
        const INTERP = 1 << 8;      // interpreter used by scriptlet
        const SCRIPT_PRE = 1 << 9;
        const SCRIPT_POST = 1 << 10;
        const SCRIPT_PREUN = 1 << 11;
        const SCRIPT_POSTUN = 1 << 12;
        const SCRIPT_VERIFY = 1 << 13;
        const FIND_REQUIRES = 1 << 14;
        const FIND_PROVIDES = 1 << 15;
        const TRIGGERIN = 1 << 16;
        const TRIGGERUN = 1 << 17;
        const TRIGGERPOSTUN = 1 << 18;
        const MISSINGOK = 1 << 19;  // suggests/enhances hint
        const RPMLIB = 1 << 24;     // rpmlib(feature) dependency
        const TRIGGERPREIN = 1 << 25;
        const KEYRING = 1 << 26;
        const CONFIG = 1 << 28;
        const PROBE = 1 << 29;

        const LE = Self::LESS.bits() | Self::EQUAL.bits();
        const GE = Self::GREATER.bits() | Self::EQUAL.bits();
        const SENSEMASK = Self::LESS.bits() | Self::GREATER.bits() | Self::EQUAL.bits();
        const NOTEQUAL = Self::LESS.bits() | Self::GREATER.bits();

        const INSTALL_ONLY = Self::SCRIPT_PRE.bits()
            | Self::SCRIPT_POST.bits()
            | Self::RPMLIB.bits()
            | Self::KEYRING.bits();
        const ERASE_ONLY = Self::SCRIPT_PREUN.bits() | Self::SCRIPT_POSTUN.bits();

        const ALL_REQUIRES = Self::INTERP.bits()
            | Self::SCRIPT_PRE.bits()
            | Self::SCRIPT_POST.bits()
            | Self::SCRIPT_PREUN.bits()
            | Self::SCRIPT_POSTUN.bits()
            | Self::SCRIPT_VERIFY.bits()
            | Self::FIND_REQUIRES.bits()
            | Self::MISSINGOK.bits()
            | Self::RPMLIB.bits()
            | Self::KEYRING.bits();
    }
}

impl Default for Sense {
    fn default() -> Self {
        Sense::empty()
    }
}

impl Sense {
    /// Parse a comparison operator such as `>=` or `=<`.
    pub fn from_operator(op: &str) -> Result<Self, EvrError> {
        match op {
            "<=" | "=<" => Ok(Sense::LE),
            "==" | "=" => Ok(Sense::EQUAL),
            ">=" | "=>" => Ok(Sense::GE),
            "<" => Ok(Sense::LESS),
            ">" => Ok(Sense::GREATER),
            "!=" | "<>" => Ok(Sense::NOTEQUAL),
            _ => Err(EvrError::UnknownOperator(op.to_string())),
        }
    }

    /// Only the comparison bits.
    pub fn range(self) -> Sense {
        self & Sense::SENSEMASK
    }

    /// True when the flags carry a version comparison.
    pub fn is_versioned(self) -> bool {
        !self.range().is_empty()
    }

    /// Operator text in the form used by dependency display strings.
    pub fn operator(self) -> &'static str {
        let r = self.range();
        if r == Sense::LE {
            "<="
        } else if r == Sense::GE {
            ">="
        } else if r == Sense::NOTEQUAL {
            "<>"
        } else if r == Sense::LESS {
            "<"
        } else if r == Sense::GREATER {
            ">"
        } else if r == Sense::EQUAL {
            "="
        } else if r == Sense::SENSEMASK {
            "<>="
        } else {
            ""
        }
    }

    /// Pre-requisite bits relevant while installing.
    pub fn install_prereq(self) -> Sense {
        self & Sense::INSTALL_ONLY
    }

    /// Pre-requisite bits relevant while erasing.
    pub fn erase_prereq(self) -> Sense {
        self & Sense::ERASE_ONLY
    }

    /// A bare legacy `PreReq:` with no other script context.
    pub fn is_legacy_prereq(self) -> bool {
        (self & (Sense::ALL_REQUIRES | Sense::PREREQ)) == Sense::PREREQ
    }

    /// Label used when reporting a requirement that took part in a loop.
    pub fn requires_label(self) -> &'static str {
        let f = self - Sense::PREREQ;
        if f.contains(Sense::SCRIPT_PRE) {
            "Requires(pre):"
        } else if f.contains(Sense::SCRIPT_POST) {
            "Requires(post):"
        } else if f.contains(Sense::SCRIPT_PREUN) {
            "Requires(preun):"
        } else if f.contains(Sense::SCRIPT_POSTUN) {
            "Requires(postun):"
        } else if f.contains(Sense::SCRIPT_VERIFY) {
            "Requires(verify):"
        } else if f.contains(Sense::MISSINGOK) {
            "Requires(hint):"
        } else if f.contains(Sense::FIND_REQUIRES) {
            "Requires(auto):"
        } else {
            "Requires:"
        }
    }
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operator())
    }
}
