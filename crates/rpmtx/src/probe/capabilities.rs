//! Static system capability lists: rpmlib features, cpuinfo, getconf, uname
//! and the sysinfo provides file

use rpmtx_evr::Sense;
use std::path::Path;

use crate::package::{DepTag, Dependency, DependencySet};

/// Features this resolver implements, as `(name, evr, flags)`.
const RPMLIB_FEATURES: &[(&str, &str, Sense)] = &[
    ("rpmlib(VersionedDependencies)", "3.0.3-1", Sense::RPMLIB.union(Sense::EQUAL)),
    ("rpmlib(CompressedFileNames)", "3.0.4-1", Sense::RPMLIB.union(Sense::EQUAL)),
    ("rpmlib(PayloadIsBzip2)", "3.0.5-1", Sense::RPMLIB.union(Sense::EQUAL)),
    ("rpmlib(PayloadFilesHavePrefix)", "4.0-1", Sense::RPMLIB.union(Sense::EQUAL)),
    ("rpmlib(ExplicitPackageProvide)", "4.0-1", Sense::RPMLIB.union(Sense::EQUAL)),
    ("rpmlib(HeaderLoadSortsTags)", "4.0.1-1", Sense::EQUAL),
    ("rpmlib(ScriptletInterpreterArgs)", "4.0.3-1", Sense::EQUAL),
    ("rpmlib(PartialHardlinkSets)", "4.0.4-1", Sense::EQUAL),
    ("rpmlib(ConcurrentAccess)", "4.1-1", Sense::EQUAL),
    ("rpmlib(BuiltinLuaScripts)", "4.2.2-1", Sense::EQUAL),
];

/// How a `/proc/cpuinfo` field turns into provides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CpuField {
    Ignore,
    /// `cpuinfo(field) = value`
    Value,
    /// `cpuinfo(field)` when the value is `yes`
    Bug,
    /// One `cpuinfo(flag)` per listed flag
    Flags,
}

const CPUINFO_FIELDS: &[(&str, CpuField)] = &[
    ("processor", CpuField::Ignore),
    ("vendor_id", CpuField::Ignore),
    ("cpu_family", CpuField::Value),
    ("model", CpuField::Value),
    ("model_name", CpuField::Ignore),
    ("stepping", CpuField::Value),
    ("cpu_MHz", CpuField::Value),
    ("cache_size", CpuField::Value),
    ("physical_id", CpuField::Ignore),
    ("siblings", CpuField::Ignore),
    ("core_id", CpuField::Ignore),
    ("cpu_cores", CpuField::Ignore),
    ("fdiv_bug", CpuField::Bug),
    ("hlt_bug", CpuField::Bug),
    ("f00f_bug", CpuField::Bug),
    ("coma_bug", CpuField::Bug),
    ("fpu", CpuField::Ignore),
    ("fpu_exception", CpuField::Bug),
    ("cpuid_level", CpuField::Ignore),
    ("wp", CpuField::Bug),
    ("flags", CpuField::Flags),
    ("bogomips", CpuField::Value),
];

fn ns_provide(ns: &str, name: &str, evr: &str, flags: Sense) -> Dependency {
    Dependency::new(DepTag::Provides, format!("{}({})", ns, name), flags, evr)
}

pub fn rpmlib_provides() -> DependencySet {
    RPMLIB_FEATURES
        .iter()
        .map(|(name, evr, flags)| Dependency::new(DepTag::Provides, *name, *flags, *evr))
        .collect()
}

/// Build cpuinfo provides from `/proc/cpuinfo` text. Only the first
/// occurrence of each field counts, so multi-processor files describe the
/// first CPU.
pub fn parse_cpuinfo(text: &str) -> DependencySet {
    let mut set = DependencySet::new();
    let mut seen: Vec<&str> = Vec::new();

    for line in text.lines() {
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f.trim(), v.trim()),
            None => continue,
        };
        if field.is_empty() || value.is_empty() {
            continue;
        }
        let field = field.replace(char::is_whitespace, "_");

        let (name, kind) = match CPUINFO_FIELDS.iter().find(|(n, _)| *n == field) {
            Some(entry) => *entry,
            None => continue,
        };
        if seen.contains(&name) {
            continue;
        }
        seen.push(name);

        match kind {
            CpuField::Ignore => {}
            CpuField::Value => {
                let value = value.replace(|c: char| c.is_whitespace() || c == '(' || c == ')', "_");
                set.merge(ns_provide("cpuinfo", name, &value, Sense::PROBE | Sense::EQUAL));
            }
            CpuField::Bug => {
                if value == "yes" {
                    set.merge(ns_provide("cpuinfo", name, "", Sense::PROBE));
                }
            }
            CpuField::Flags => {
                for flag in value.split_whitespace() {
                    set.merge(ns_provide("cpuinfo", flag, "", Sense::PROBE));
                }
            }
        }
    }
    set
}

/// Cpuinfo provides from a file; an unreadable file yields an empty set.
pub fn read_cpuinfo(path: &Path) -> DependencySet {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_cpuinfo(&text),
        Err(e) => {
            log::debug!("cannot read {}: {}", path.display(), e);
            DependencySet::new()
        }
    }
}

/// `getconf(NAME) = value` for the sysconf variables that have a value.
pub fn getconf_provides() -> DependencySet {
    use nix::unistd::{sysconf, SysconfVar};

    let vars = [
        ("ARG_MAX", SysconfVar::ARG_MAX),
        ("CHILD_MAX", SysconfVar::CHILD_MAX),
        ("CLK_TCK", SysconfVar::CLK_TCK),
        ("NGROUPS_MAX", SysconfVar::NGROUPS_MAX),
        ("OPEN_MAX", SysconfVar::OPEN_MAX),
        ("PAGESIZE", SysconfVar::PAGE_SIZE),
        ("LINE_MAX", SysconfVar::LINE_MAX),
        ("RE_DUP_MAX", SysconfVar::RE_DUP_MAX),
        ("EXPR_NEST_MAX", SysconfVar::EXPR_NEST_MAX),
        ("BC_BASE_MAX", SysconfVar::BC_BASE_MAX),
        ("BC_DIM_MAX", SysconfVar::BC_DIM_MAX),
        ("BC_SCALE_MAX", SysconfVar::BC_SCALE_MAX),
        ("BC_STRING_MAX", SysconfVar::BC_STRING_MAX),
        ("COLL_WEIGHTS_MAX", SysconfVar::COLL_WEIGHTS_MAX),
        ("_POSIX_VERSION", SysconfVar::_POSIX_VERSION),
    ];

    let mut set = DependencySet::new();
    for (name, var) in vars {
        match sysconf(var) {
            Ok(Some(value)) if value >= 0 => {
                set.merge(ns_provide("getconf", name, &value.to_string(), Sense::PROBE | Sense::EQUAL));
            }
            _ => {}
        }
    }
    set
}

/// `uname(field) = value` for the kernel identity fields.
pub fn uname_provides() -> DependencySet {
    let uts = match nix::sys::utsname::uname() {
        Ok(uts) => uts,
        Err(e) => {
            log::debug!("uname failed: {}", e);
            return DependencySet::new();
        }
    };

    let mut fields = vec![
        ("sysname", uts.sysname().to_string_lossy().into_owned()),
        ("nodename", uts.nodename().to_string_lossy().into_owned()),
        ("release", uts.release().to_string_lossy().into_owned()),
        ("machine", uts.machine().to_string_lossy().into_owned()),
    ];
    #[cfg(any(target_os = "linux", target_os = "android"))]
    fields.push(("domainname", uts.domainname().to_string_lossy().into_owned()));

    fields
        .into_iter()
        .filter(|(_, value)| !value.is_empty() && value != "(none)")
        .map(|(field, value)| ns_provide("uname", field, &value, Sense::EQUAL))
        .collect()
}

const SYSINFO_OPERATORS: &[(&str, Sense)] = &[
    ("<=", Sense::LE),
    ("=<", Sense::LE),
    ("==", Sense::EQUAL),
    (">=", Sense::GE),
    ("=>", Sense::GE),
    ("<", Sense::LESS),
    ("=", Sense::EQUAL),
    (">", Sense::GREATER),
];

/// Parse a sysinfo provides file: one `name [op evr]` per line. Paths are
/// never versioned. Malformed lines are skipped with a warning.
pub fn parse_sysinfo(text: &str, origin: &str) -> DependencySet {
    let mut set = DependencySet::new();

    for (ln, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let first = line.chars().next().unwrap_or(' ');
        if !(first.is_ascii_alphanumeric() || matches!(first, '_' | '/' | '%')) {
            log::warn!(
                "{}:{} \"{}\" must begin with alphanumeric, '_', '/' or '%'",
                origin,
                ln + 1,
                line
            );
            continue;
        }

        let name_end = line
            .find(|c: char| c.is_whitespace() || "<=>".contains(c))
            .unwrap_or(line.len());
        let name = &line[..name_end];
        let rest = line[name_end..].trim_start();

        if name.starts_with('/') || rest.is_empty() {
            set.merge(Dependency::new(DepTag::Provides, name, Sense::PROBE, ""));
            continue;
        }

        let (op, flags) = match SYSINFO_OPERATORS.iter().find(|(op, _)| rest.starts_with(op)) {
            Some(entry) => *entry,
            None => {
                log::warn!("{}:{} no comparison operator found", origin, ln + 1);
                continue;
            }
        };
        let evr = match rest[op.len()..].split_whitespace().next() {
            Some(evr) => evr,
            None => {
                log::warn!("{}:{} no EVR comparison value found", origin, ln + 1);
                continue;
            }
        };
        set.merge(Dependency::new(DepTag::Provides, name, flags | Sense::PROBE, evr));
    }
    set
}

/// Sysinfo provides, `None` when the file cannot be read.
pub fn read_sysinfo(path: &Path) -> Option<DependencySet> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(parse_sysinfo(&text, &path.display().to_string())),
        Err(e) => {
            log::debug!("no sysinfo provides from {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(s: &str) -> Dependency {
        Dependency::parse(DepTag::Requires, s).unwrap()
    }

    const CPUINFO: &str = "\
processor\t: 0
vendor_id\t: GenuineIntel
cpu family\t: 6
model\t\t: 158
model name\t: Intel(R) Core(TM) i7-8700K CPU @ 3.70GHz
cache size\t: 12288 KB
fdiv_bug\t: no
f00f_bug\t: yes
flags\t\t: fpu vme sse sse2 avx2
bogomips\t: 7399.70

processor\t: 1
model\t\t: 1
flags\t\t: fpu mmx
";

    #[test]
    fn test_rpmlib_provides() {
        let set = rpmlib_provides();
        assert_eq!(set.len(), 10);
        assert!(set.contains(&req("rpmlib(CompressedFileNames) <= 3.0.4-1"), true));
        assert!(set.contains(&req("rpmlib(BuiltinLuaScripts)"), true));
        assert!(!set.contains(&req("rpmlib(PayloadIsXz) <= 5.2-1"), true));
        assert!(!set.contains(&req("rpmlib(CompressedFileNames) >= 5.0"), true));
    }

    #[test]
    fn test_parse_cpuinfo() {
        let set = parse_cpuinfo(CPUINFO);
        assert!(set.contains(&req("cpuinfo(cpu_family) = 6"), true));
        assert!(set.contains(&req("cpuinfo(model) = 158"), true));
        assert!(!set.contains(&req("cpuinfo(model) = 1"), true));
        assert!(set.contains(&req("cpuinfo(cache_size) = 12288_KB"), true));
        assert!(set.contains(&req("cpuinfo(f00f_bug)"), true));
        assert!(!set.contains(&req("cpuinfo(fdiv_bug)"), true));
        assert!(set.contains(&req("cpuinfo(sse2)"), true));
        assert!(!set.contains(&req("cpuinfo(mmx)"), true));
        assert!(!set.contains(&req("cpuinfo(vendor_id)"), true));
    }

    #[test]
    fn test_uname_provides() {
        let set = uname_provides();
        assert!(set.iter().any(|d| d.name == "uname(sysname)"));
        assert!(set.iter().all(|d| d.evr != "(none)"));
    }

    #[test]
    fn test_getconf_provides() {
        let set = getconf_provides();
        let page = set.iter().find(|d| d.name == "getconf(PAGESIZE)").unwrap();
        assert!(page.evr.parse::<i64>().unwrap() > 0);
    }

    #[test]
    fn test_parse_sysinfo() {
        let text = "\
# system provides
bash = 5.2-1
/usr/bin/sh
libfoo.so.1
kernel>=6.1
-bad
noop ~ 1
";
        let set = parse_sysinfo(text, "sysinfo");
        assert_eq!(set.len(), 4);
        assert!(set.contains(&req("bash >= 5.0"), true));
        assert!(!set.contains(&req("bash > 5.2-1"), true));
        assert!(set.contains(&req("/usr/bin/sh"), true));
        assert!(set.contains(&req("libfoo.so.1"), true));
        assert!(set.contains(&req("kernel > 7"), true));
    }
}
