//! Package headers as consumed by the resolver

use rpmtx_evr::{Evr, Sense};
use std::collections::BTreeSet;

use super::dependency::{DepTag, Dependency};

/// A file owned by a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    /// Symlink target, `None` for regular files and directories
    pub link_to: Option<String>,
}

/// Install-time path prefix rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub old_path: String,
    pub new_path: String,
}

impl Relocation {
    pub fn new(old_path: impl Into<String>, new_path: impl Into<String>) -> Self {
        Self {
            old_path: old_path.into(),
            new_path: new_path.into(),
        }
    }

    fn apply(&self, path: &str) -> Option<String> {
        let old = self.old_path.trim_end_matches('/');
        let rest = path.strip_prefix(old)?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        Some(format!("{}{}", self.new_path.trim_end_matches('/'), rest))
    }
}

/// Package identity and dependency sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub epoch: Option<u32>,
    pub version: String,
    pub release: String,
    pub arch: Option<String>,
    pub os: Option<String>,
    /// Multilib color bits
    pub color: u32,

    /// Digest of the immutable header region
    pub hdrid: Option<String>,
    /// Digest of the package payload
    pub pkgid: Option<String>,
    /// Source package file name; `None` for source packages
    pub sourcerpm: Option<String>,

    pub install_tid: Option<u32>,
    pub install_time: Option<u32>,

    pub provides: Vec<Dependency>,
    pub requires: Vec<Dependency>,
    pub conflicts: Vec<Dependency>,
    pub obsoletes: Vec<Dependency>,
    pub files: Vec<FileEntry>,

    /// Carries a sanity check script
    pub has_sanity_check: bool,
    /// Carries a version tracking script
    pub has_track: bool,
}

impl Header {
    /// Binary package with a derived source-rpm identity.
    pub fn new(name: impl Into<String>, version: impl Into<String>, release: impl Into<String>) -> Self {
        let name = name.into();
        let version = version.into();
        let release = release.into();
        let sourcerpm = Some(format!("{}-{}-{}.src.rpm", name, version, release));
        Self {
            name,
            epoch: None,
            version,
            release,
            arch: None,
            os: None,
            color: 0,
            hdrid: None,
            pkgid: None,
            sourcerpm,
            install_tid: None,
            install_time: None,
            provides: Vec::new(),
            requires: Vec::new(),
            conflicts: Vec::new(),
            obsoletes: Vec::new(),
            files: Vec::new(),
            has_sanity_check: false,
            has_track: false,
        }
    }

    pub fn with_epoch(mut self, epoch: u32) -> Self {
        self.epoch = Some(epoch);
        self
    }

    pub fn with_arch(mut self, arch: &str) -> Self {
        self.arch = Some(arch.to_string());
        self
    }

    pub fn with_os(mut self, os: &str) -> Self {
        self.os = Some(os.to_string());
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }

    pub fn with_hdrid(mut self, hdrid: &str) -> Self {
        self.hdrid = Some(hdrid.to_string());
        self
    }

    pub fn with_pkgid(mut self, pkgid: &str) -> Self {
        self.pkgid = Some(pkgid.to_string());
        self
    }

    pub fn with_sourcerpm(mut self, sourcerpm: Option<&str>) -> Self {
        self.sourcerpm = sourcerpm.map(str::to_string);
        self
    }

    pub fn with_install_tid(mut self, tid: u32, time: u32) -> Self {
        self.install_tid = Some(tid);
        self.install_time = Some(time);
        self
    }

    /// Add a dependency to the set matching its tag.
    pub fn with_dependency(mut self, dep: Dependency) -> Self {
        match dep.tag {
            DepTag::Provides | DepTag::Name => self.provides.push(dep.retag(DepTag::Provides)),
            DepTag::Requires | DepTag::Dirnames | DepTag::Linktos => {
                self.requires.push(dep.retag(DepTag::Requires))
            }
            DepTag::Conflicts => self.conflicts.push(dep),
            DepTag::Obsoletes => self.obsoletes.push(dep),
        }
        self
    }

    pub fn with_file(mut self, path: &str) -> Self {
        self.files.push(FileEntry {
            path: path.to_string(),
            link_to: None,
        });
        self
    }

    pub fn with_symlink(mut self, path: &str, target: &str) -> Self {
        self.files.push(FileEntry {
            path: path.to_string(),
            link_to: Some(target.to_string()),
        });
        self
    }

    pub fn with_sanity_check(mut self) -> Self {
        self.has_sanity_check = true;
        self
    }

    pub fn with_track(mut self) -> Self {
        self.has_track = true;
        self
    }

    pub fn evr(&self) -> Evr {
        Evr::new(self.epoch, self.version.as_str(), Some(self.release.as_str()))
    }

    /// `name-[epoch:]version-release`
    pub fn nevr(&self) -> String {
        format!("{}-{}", self.name, self.evr())
    }

    /// `nevr` plus `.arch` when known
    pub fn nevra(&self) -> String {
        match &self.arch {
            Some(arch) => format!("{}.{}", self.nevr(), arch),
            None => self.nevr(),
        }
    }

    pub fn is_source(&self) -> bool {
        self.sourcerpm.is_none()
    }

    /// `name = [epoch:]version-release`
    pub fn self_provide(&self) -> Dependency {
        Dependency::new(DepTag::Provides, self.name.as_str(), Sense::EQUAL, self.evr().to_string())
            .with_color(self.color)
    }

    /// Declared provides plus the implicit self provide.
    pub fn all_provides(&self) -> Vec<Dependency> {
        let mut provides = self.provides.clone();
        if !provides.iter().any(|p| p.name == self.name && p.evr == self.evr().to_string()) {
            provides.push(self.self_provide());
        }
        provides
    }

    /// Whether any provide satisfies `dep`. Unversioned requirements match
    /// whenever the header was selected for the name.
    pub fn any_provide_matches(&self, dep: &Dependency, nopromote: bool) -> bool {
        if !dep.is_versioned() || dep.evr.is_empty() {
            return true;
        }
        self.all_provides()
            .iter()
            .any(|p| p.name == dep.bare_name() && dep.range_overlaps(p, nopromote))
    }

    /// Digest identity when both sides carry one, N-V-R identity when
    /// neither does. A header with a digest never matches one without.
    pub fn identical(&self, other: &Header) -> bool {
        match (&self.hdrid, &other.hdrid) {
            (Some(a), Some(b)) => a == b,
            (Some(_), None) | (None, Some(_)) => false,
            (None, None) => self.name == other.name && self.version == other.version && self.release == other.release,
        }
    }

    pub fn owns_file(&self, path: &str) -> bool {
        self.files.iter().any(|f| f.path == path)
    }

    /// Parent directories of owned files, excluding those deeper than
    /// `depth_limit` separators.
    pub fn dirname_deps(&self, depth_limit: usize) -> Vec<Dependency> {
        let dirs: BTreeSet<&str> = self
            .files
            .iter()
            .filter_map(|f| parent_dir(&f.path))
            .filter(|d| d.matches('/').count() <= depth_limit)
            .collect();
        dirs.into_iter()
            .map(|d| Dependency::named(DepTag::Dirnames, d).with_color(self.color))
            .collect()
    }

    /// Resolved symlink targets.
    pub fn linkto_deps(&self) -> Vec<Dependency> {
        let mut seen = BTreeSet::new();
        self.files
            .iter()
            .filter_map(|f| {
                let target = f.link_to.as_deref().filter(|t| !t.is_empty())?;
                resolve_link(&f.path, target)
            })
            .filter(|t| seen.insert(t.clone()))
            .map(|t| Dependency::named(DepTag::Linktos, t).with_color(self.color))
            .collect()
    }

    /// Apply install-time relocations to owned files and path provides.
    pub fn relocate(&mut self, relocations: &[Relocation]) {
        if relocations.is_empty() {
            return;
        }
        let rewrite = |path: &str| relocations.iter().find_map(|r| r.apply(path));
        for file in &mut self.files {
            if let Some(new_path) = rewrite(&file.path) {
                file.path = new_path;
            }
        }
        for dep in &mut self.provides {
            if dep.name.starts_with('/') {
                if let Some(new_name) = rewrite(&dep.name) {
                    dep.name = new_name;
                }
            }
        }
    }
}

fn parent_dir(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    if idx == 0 {
        Some("/")
    } else {
        Some(&trimmed[..idx])
    }
}

/// Resolve a symlink target against the directory holding the link and
/// normalize `.` and `..` components.
fn resolve_link(link: &str, target: &str) -> Option<String> {
    let joined = if target.starts_with('/') {
        target.to_string()
    } else {
        format!("{}/{}", parent_dir(link)?, target)
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    Some(format!("/{}", parts.join("/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(tag: DepTag, s: &str) -> Dependency {
        Dependency::parse(tag, s).unwrap()
    }

    #[test]
    fn test_identity_strings() {
        let h = Header::new("bash", "5.2", "1").with_arch("x86_64");
        assert_eq!(h.nevr(), "bash-5.2-1");
        assert_eq!(h.nevra(), "bash-5.2-1.x86_64");
        assert_eq!(h.with_epoch(2).nevr(), "bash-2:5.2-1");
        assert!(!Header::new("bash", "5.2", "1").is_source());
        assert!(Header::new("bash", "5.2", "1").with_sourcerpm(None).is_source());
    }

    #[test]
    fn test_self_provide_is_implicit() {
        let h = Header::new("foo", "1.0", "1").with_dependency(dep(DepTag::Provides, "libfoo.so.1"));
        let provides = h.all_provides();
        assert_eq!(provides.len(), 2);
        assert_eq!(provides[1].display(), "P foo = 1.0-1");
    }

    #[test]
    fn test_any_provide_matches() {
        let h = Header::new("foo", "1.0", "1").with_dependency(dep(DepTag::Provides, "bar = 2.0"));
        assert!(h.any_provide_matches(&dep(DepTag::Requires, "bar"), true));
        assert!(h.any_provide_matches(&dep(DepTag::Requires, "bar >= 1.5"), true));
        assert!(!h.any_provide_matches(&dep(DepTag::Requires, "bar > 2.0"), true));
        assert!(h.any_provide_matches(&dep(DepTag::Obsoletes, "foo < 2.0"), true));
    }

    #[test]
    fn test_identical() {
        let a = Header::new("foo", "1.0", "1");
        let b = Header::new("foo", "1.0", "1").with_arch("noarch");
        assert!(a.identical(&b));
        let a = a.with_hdrid("abc");
        assert!(!a.identical(&b));
        assert!(!b.identical(&a));
        let b = b.with_hdrid("def");
        assert!(!a.identical(&b));
    }

    #[test]
    fn test_dirname_deps() {
        let h = Header::new("foo", "1.0", "1")
            .with_file("/usr/bin/foo")
            .with_file("/usr/bin/foo-helper")
            .with_file("/etc/foo.conf")
            .with_file("/a/b/c/d/e");
        let names: Vec<String> = h.dirname_deps(100).into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["/a/b/c/d", "/etc", "/usr/bin"]);

        let names: Vec<String> = h.dirname_deps(2).into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["/etc", "/usr/bin"]);
    }

    #[test]
    fn test_linkto_deps() {
        let h = Header::new("foo", "1.0", "1")
            .with_symlink("/usr/lib/libfoo.so", "libfoo.so.1")
            .with_symlink("/usr/bin/foo", "../libexec/foo/foo")
            .with_symlink("/etc/alt", "/opt/alt/./bin")
            .with_symlink("/etc/empty", "");
        let names: Vec<String> = h.linkto_deps().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["/usr/lib/libfoo.so.1", "/usr/libexec/foo/foo", "/opt/alt/bin"]);
    }

    #[test]
    fn test_relocate() {
        let mut h = Header::new("foo", "1.0", "1")
            .with_file("/opt/foo/bin/foo")
            .with_file("/opt/foobar")
            .with_dependency(dep(DepTag::Provides, "/opt/foo/bin/foo"));
        h.relocate(&[Relocation::new("/opt/foo", "/usr/local")]);
        assert!(h.owns_file("/usr/local/bin/foo"));
        assert!(h.owns_file("/opt/foobar"));
        assert_eq!(h.provides[0].name, "/usr/local/bin/foo");
    }
}
