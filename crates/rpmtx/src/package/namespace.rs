//! Dependency name classification

use std::fmt;

/// Permission bits tested by the filesystem access probes.
///
/// No bits set means an existence test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessMode {
    pub read: bool,
    pub write: bool,
    pub exec: bool,
}

impl AccessMode {
    pub const EXISTS: AccessMode = AccessMode { read: false, write: false, exec: false };

    /// Parse a three character `rwx` marker such as `r_x` or `RW_`.
    pub fn from_marker(marker: &str) -> Option<Self> {
        let b = marker.as_bytes();
        if b.len() != 3 {
            return None;
        }
        let bit = |c: u8, set: &[u8]| -> Option<bool> {
            if set.contains(&c) {
                Some(true)
            } else if c == b'_' {
                Some(false)
            } else {
                None
            }
        };
        Some(AccessMode {
            read: bit(b[0], b"Rr")?,
            write: bit(b[1], b"Ww")?,
            exec: bit(b[2], b"Xx")?,
        })
    }

    pub fn is_exists(&self) -> bool {
        !self.read && !self.write && !self.exec
    }
}

/// Syntactic category of a dependency name.
///
/// Probe namespaces have the form `ns(argument)`; everything else is looked
/// up in the provider indexes and the installed database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Absolute path
    Path,
    /// `%{macro}` truth test
    Function,
    /// Shared object name
    Dso,
    Rpmlib,
    Config,
    Cpuinfo,
    Getconf,
    Uname,
    Soname,
    User,
    Group,
    Mounted,
    Diskspace,
    Digest,
    Gnupg,
    Macro,
    Envvar,
    Running,
    Sanity,
    Vcheck,
    Signature,
    Verify,
    Access(AccessMode),
    /// Some other `ns(...)` form
    Other,
    /// Dotted numeric string
    Version,
    /// Dotted non-numeric string
    Compound,
    /// Plain name
    Plain,
}

impl Namespace {
    /// Classify a dependency name. A leading `!` is ignored.
    pub fn classify(name: &str) -> Namespace {
        let s = name.strip_prefix('!').unwrap_or(name);

        if s.starts_with('/') {
            return Namespace::Path;
        }
        if s.starts_with("%{") && s.ends_with('}') {
            return Namespace::Function;
        }
        if s.len() > 3 && s.ends_with(".so") {
            return Namespace::Dso;
        }

        if s.len() >= 5 && s.ends_with(')') {
            if let Some(open) = s.find('(') {
                if let Some(ns) = Self::probe_namespace(&s[..open]) {
                    return ns;
                }
            }
        }

        if s.contains('(') || s.ends_with(')') {
            return Namespace::Other;
        }

        let b = s.as_bytes();
        for i in 0..b.len() {
            if b[i..].starts_with(b".so") {
                return Namespace::Dso;
            }
            if b[i] == b'.' {
                let digit_before = i > 0 && b[i - 1].is_ascii_digit();
                let digit_after = b.get(i + 1).map_or(false, u8::is_ascii_digit);
                if digit_before && digit_after {
                    return Namespace::Version;
                }
                return Namespace::Compound;
            }
        }
        Namespace::Plain
    }

    fn probe_namespace(prefix: &str) -> Option<Namespace> {
        let ns = match prefix {
            "rpmlib" => Namespace::Rpmlib,
            "config" => Namespace::Config,
            "cpuinfo" => Namespace::Cpuinfo,
            "getconf" => Namespace::Getconf,
            "uname" => Namespace::Uname,
            "soname" => Namespace::Soname,
            "user" => Namespace::User,
            "group" => Namespace::Group,
            "mounted" => Namespace::Mounted,
            "diskspace" => Namespace::Diskspace,
            "digest" => Namespace::Digest,
            "gnupg" => Namespace::Gnupg,
            "macro" => Namespace::Macro,
            "envvar" => Namespace::Envvar,
            "running" => Namespace::Running,
            "sanitycheck" => Namespace::Sanity,
            "vcheck" => Namespace::Vcheck,
            "signature" => Namespace::Signature,
            "verify" => Namespace::Verify,
            "exists" => Namespace::Access(AccessMode::EXISTS),
            "executable" => Namespace::Access(AccessMode { exec: true, ..AccessMode::EXISTS }),
            "readable" => Namespace::Access(AccessMode { read: true, ..AccessMode::EXISTS }),
            "writable" => Namespace::Access(AccessMode { write: true, ..AccessMode::EXISTS }),
            other => Namespace::Access(AccessMode::from_marker(other)?),
        };
        Some(ns)
    }

    /// Probe namespaces that take an argument in parentheses.
    pub fn is_probe(&self) -> bool {
        !matches!(
            self,
            Namespace::Path
                | Namespace::Function
                | Namespace::Dso
                | Namespace::Other
                | Namespace::Version
                | Namespace::Compound
                | Namespace::Plain
        )
    }

    /// Namespaces that can never be provided by another transaction element.
    pub fn is_virtual(&self) -> bool {
        matches!(
            self,
            Namespace::Rpmlib
                | Namespace::Config
                | Namespace::Cpuinfo
                | Namespace::Getconf
                | Namespace::Uname
                | Namespace::Soname
                | Namespace::Access(_)
                | Namespace::User
                | Namespace::Group
                | Namespace::Mounted
                | Namespace::Diskspace
                | Namespace::Digest
                | Namespace::Gnupg
                | Namespace::Macro
                | Namespace::Envvar
                | Namespace::Running
                | Namespace::Sanity
                | Namespace::Vcheck
                | Namespace::Signature
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            Namespace::Path => "path",
            Namespace::Function => "function",
            Namespace::Dso => "dso",
            Namespace::Rpmlib => "rpmlib",
            Namespace::Config => "config",
            Namespace::Cpuinfo => "cpuinfo",
            Namespace::Getconf => "getconf",
            Namespace::Uname => "uname",
            Namespace::Soname => "soname",
            Namespace::User => "user",
            Namespace::Group => "group",
            Namespace::Mounted => "mounted",
            Namespace::Diskspace => "diskspace",
            Namespace::Digest => "digest",
            Namespace::Gnupg => "gnupg",
            Namespace::Macro => "macro",
            Namespace::Envvar => "envvar",
            Namespace::Running => "running",
            Namespace::Sanity => "sanitycheck",
            Namespace::Vcheck => "vcheck",
            Namespace::Signature => "signature",
            Namespace::Verify => "verify",
            Namespace::Access(_) => "access",
            Namespace::Other => "namespace",
            Namespace::Version => "version",
            Namespace::Compound => "compound",
            Namespace::Plain => "string",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_basic_forms() {
        assert_eq!(Namespace::classify("/usr/bin/perl"), Namespace::Path);
        assert_eq!(Namespace::classify("%{with_gui}"), Namespace::Function);
        assert_eq!(Namespace::classify("libc.so"), Namespace::Dso);
        assert_eq!(Namespace::classify("libc.so.6"), Namespace::Dso);
        assert_eq!(Namespace::classify("perl(Foo::Bar)"), Namespace::Other);
        assert_eq!(Namespace::classify("python3.11"), Namespace::Version);
        assert_eq!(Namespace::classify("foo.bar"), Namespace::Compound);
        assert_eq!(Namespace::classify("bash"), Namespace::Plain);
    }

    #[test]
    fn test_classify_probes() {
        assert_eq!(Namespace::classify("rpmlib(PayloadIsBzip2)"), Namespace::Rpmlib);
        assert_eq!(Namespace::classify("user(root)"), Namespace::User);
        assert_eq!(Namespace::classify("diskspace(/var)"), Namespace::Diskspace);
        assert_eq!(Namespace::classify("sanitycheck(foo)"), Namespace::Sanity);
        assert_eq!(Namespace::classify("!running(sshd)"), Namespace::Running);
        assert_eq!(
            Namespace::classify("executable(/bin/sh)"),
            Namespace::Access(AccessMode { exec: true, ..AccessMode::EXISTS })
        );
        assert_eq!(
            Namespace::classify("r_x(/bin/sh)"),
            Namespace::Access(AccessMode { read: true, write: false, exec: true })
        );
        assert_eq!(Namespace::classify("___(/bin/sh)"), Namespace::Access(AccessMode::EXISTS));
    }

    #[test]
    fn test_short_probe_like_names_are_not_probes() {
        assert_eq!(Namespace::classify("a()"), Namespace::Other);
        assert_eq!(Namespace::classify("rwz(/x)"), Namespace::Other);
    }

    #[test]
    fn test_virtual_namespaces() {
        assert!(Namespace::Rpmlib.is_virtual());
        assert!(Namespace::Access(AccessMode::EXISTS).is_virtual());
        assert!(!Namespace::Plain.is_virtual());
        assert!(!Namespace::Path.is_virtual());
        assert!(!Namespace::Verify.is_virtual());
        assert!(!Namespace::Function.is_virtual());
    }

    #[test]
    fn test_access_marker() {
        assert_eq!(AccessMode::from_marker("RWX"), Some(AccessMode { read: true, write: true, exec: true }));
        assert!(AccessMode::from_marker("___").map_or(false, |m| m.is_exists()));
        assert_eq!(AccessMode::from_marker("rw"), None);
    }
}
