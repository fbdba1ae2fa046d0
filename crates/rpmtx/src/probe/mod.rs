//! Namespace probes
//!
//! Dependencies in a virtual namespace (`user(...)`, `rpmlib(...)`,
//! `diskspace(...)` and friends) are decided here instead of by looking for
//! a providing package. Capability lists and the filesystem table are
//! computed on first use and kept in a [`ProbeContext`] until it is reset.

mod capabilities;
mod digest;
mod elf;
mod gpg;
mod system;

pub use capabilities::{
    getconf_provides, parse_cpuinfo, parse_sysinfo, read_cpuinfo, read_sysinfo, rpmlib_provides, uname_provides,
};
pub use digest::{file_digest, split_digest_arg, DigestAlgo};
pub use elf::{read_elf, ElfInfo};
pub use system::{parse_mounts, parse_size, read_filesystems, FileSystem};

use rpmtx_evr::Sense;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{MacroContext, ResolverConfig};
use crate::db::{HeaderStore, MatchTag};
use crate::error::Result;
use crate::order::Whiteout;
use crate::package::{Dependency, DependencySet, Header, Namespace};

const PROC_CPUINFO: &str = "/proc/cpuinfo";
const PROC_MOUNTS: &str = "/proc/self/mounts";

/// Verdict of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Satisfied,
    Unsatisfied,
    /// No probe handles this dependency; look for a provider instead
    Declined,
}

impl ProbeOutcome {
    pub fn from_bool(satisfied: bool) -> Self {
        if satisfied {
            ProbeOutcome::Satisfied
        } else {
            ProbeOutcome::Unsatisfied
        }
    }
}

/// Where a verdict came from, shown in the resolver trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Note {
    None,
    Cached,
    FunctionProbe,
    UserLookup,
    GroupLookup,
    AccessProbe,
    MtabProbe,
    DiskspaceProbe,
    DigestProbe,
    SignatureProbe,
    VerifyProbe,
    GnupgProbe,
    MacroProbe,
    EnvvarProbe,
    RunningProbe,
    SanityProbe,
    VcheckProbe,
    SysinfoProvides,
    RpmlibProvides,
    CpuinfoProvides,
    GetconfProvides,
    UnameProvides,
    SonameProvides,
    RootFiles,
    DbFiles,
    DbProvides,
    Suggested,
    HintSkipped,
}

impl Note {
    pub fn as_str(&self) -> &'static str {
        match self {
            Note::None => "",
            Note::Cached => "(cached)",
            Note::FunctionProbe => "(function probe)",
            Note::UserLookup => "(user lookup)",
            Note::GroupLookup => "(group lookup)",
            Note::AccessProbe => "(access probe)",
            Note::MtabProbe => "(mtab probe)",
            Note::DiskspaceProbe => "(diskspace probe)",
            Note::DigestProbe => "(digest probe)",
            Note::SignatureProbe => "(signature probe)",
            Note::VerifyProbe => "(verify probe)",
            Note::GnupgProbe => "(gnupg probe)",
            Note::MacroProbe => "(macro probe)",
            Note::EnvvarProbe => "(envvar probe)",
            Note::RunningProbe => "(running probe)",
            Note::SanityProbe => "(sanity probe)",
            Note::VcheckProbe => "(vcheck probe)",
            Note::SysinfoProvides => "(sysinfo provides)",
            Note::RpmlibProvides => "(rpmlib provides)",
            Note::CpuinfoProvides => "(cpuinfo provides)",
            Note::GetconfProvides => "(getconf provides)",
            Note::UnameProvides => "(uname provides)",
            Note::SonameProvides => "(soname provides)",
            Note::RootFiles => "(root files)",
            Note::DbFiles => "(db files)",
            Note::DbProvides => "(db provides)",
            Note::Suggested => "(suggested)",
            Note::HintSkipped => "(hint skipped)",
        }
    }

    /// Verdicts from runtime probes, which a missing-ok hint always
    /// overrides.
    pub fn is_runtime_probe(&self) -> bool {
        matches!(
            self,
            Note::FunctionProbe
                | Note::UserLookup
                | Note::GroupLookup
                | Note::AccessProbe
                | Note::MtabProbe
                | Note::DiskspaceProbe
                | Note::DigestProbe
                | Note::SignatureProbe
                | Note::VerifyProbe
                | Note::GnupgProbe
                | Note::MacroProbe
                | Note::EnvvarProbe
                | Note::RunningProbe
                | Note::SanityProbe
                | Note::VcheckProbe
        )
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Collaborators a probe may consult.
pub struct ProbeEnv<'a> {
    pub macros: &'a dyn MacroContext,
    pub store: Option<&'a dyn HeaderStore>,
    pub config: &'a ResolverConfig,
}

/// Lazily computed system information shared by all probes of a
/// transaction.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    cpuinfo_path: PathBuf,
    mounts_path: PathBuf,
    fixed_filesystems: Option<Vec<FileSystem>>,

    rpmlib: Option<DependencySet>,
    cpuinfo: Option<DependencySet>,
    getconf: Option<DependencySet>,
    uname: Option<DependencySet>,
    /// `Some(None)` once the sysinfo file was found unreadable
    sysinfo: Option<Option<DependencySet>>,
    filesystems: Option<Vec<FileSystem>>,
    whiteout: Option<Whiteout>,
}

impl Default for ProbeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeContext {
    pub fn new() -> Self {
        Self {
            cpuinfo_path: PathBuf::from(PROC_CPUINFO),
            mounts_path: PathBuf::from(PROC_MOUNTS),
            fixed_filesystems: None,
            rpmlib: None,
            cpuinfo: None,
            getconf: None,
            uname: None,
            sysinfo: None,
            filesystems: None,
            whiteout: None,
        }
    }

    pub fn with_cpuinfo_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cpuinfo_path = path.into();
        self.cpuinfo = None;
        self
    }

    pub fn with_mounts_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.mounts_path = path.into();
        self.filesystems = None;
        self
    }

    /// Use a fixed filesystem table instead of the mount table.
    pub fn with_filesystems(mut self, filesystems: Vec<FileSystem>) -> Self {
        self.fixed_filesystems = Some(filesystems);
        self.filesystems = None;
        self
    }

    /// Drop every computed list; the next probe recomputes what it needs.
    pub fn reset(&mut self) {
        self.rpmlib = None;
        self.cpuinfo = None;
        self.getconf = None;
        self.uname = None;
        self.sysinfo = None;
        self.filesystems = None;
    }

    /// Release everything, including the dependency whiteout.
    pub fn dispose(&mut self) {
        self.reset();
        self.whiteout = None;
    }

    pub fn filesystems(&mut self) -> &[FileSystem] {
        if self.filesystems.is_none() {
            let table = match &self.fixed_filesystems {
                Some(fixed) => fixed.clone(),
                None => read_filesystems(&self.mounts_path),
            };
            self.filesystems = Some(table);
        }
        self.filesystems.as_deref().unwrap_or(&[])
    }

    /// The dependency whiteout, parsed from `list` on first use.
    pub fn whiteout(&mut self, list: &str, level: log::Level) -> &Whiteout {
        self.whiteout.get_or_insert_with(|| Whiteout::parse(list, level))
    }

    pub(crate) fn release_whiteout(&mut self) {
        self.whiteout = None;
    }

    fn rpmlib(&mut self) -> &DependencySet {
        self.rpmlib.get_or_insert_with(rpmlib_provides)
    }

    fn cpuinfo(&mut self) -> &DependencySet {
        let path = &self.cpuinfo_path;
        self.cpuinfo.get_or_insert_with(|| read_cpuinfo(path))
    }

    fn getconf(&mut self) -> &DependencySet {
        self.getconf.get_or_insert_with(getconf_provides)
    }

    fn uname(&mut self) -> &DependencySet {
        self.uname.get_or_insert_with(uname_provides)
    }

    fn sysinfo(&mut self, config: &ResolverConfig) -> Option<&DependencySet> {
        self.sysinfo
            .get_or_insert_with(|| read_sysinfo(&config.sysinfo_path()))
            .as_ref()
    }

    /// Decide `dep` if it belongs to a probe namespace or is listed in the
    /// sysinfo provides. Returns [`ProbeOutcome::Declined`] otherwise.
    pub fn probe(&mut self, dep: &Dependency, env: &ProbeEnv<'_>) -> Result<(ProbeOutcome, Note)> {
        let ns = dep.namespace();
        let arg = dep.probe_arg();
        let nopromote = env.config.nopromote;

        let runtime = match ns {
            Namespace::Function => Some((env.macros.expand_numeric(dep.bare_name()) != 0, Note::FunctionProbe)),
            Namespace::User => Some((system::user_exists(arg), Note::UserLookup)),
            Namespace::Group => Some((system::group_exists(arg), Note::GroupLookup)),
            Namespace::Access(mode) => Some((system::access_ok(arg, mode), Note::AccessProbe)),
            Namespace::Mounted => Some((system::is_mounted(self.filesystems(), arg), Note::MtabProbe)),
            Namespace::Diskspace => {
                let ok = system::diskspace_ok(self.filesystems(), arg, &dep.evr, dep.flags);
                Some((ok, Note::DiskspaceProbe))
            }
            Namespace::Digest => {
                let (algo, path) = split_digest_arg(arg);
                let ok = digest::digest_matches(algo, Path::new(path), &dep.evr, dep.flags.contains(Sense::EQUAL));
                Some((settle(ns, ok), Note::DigestProbe))
            }
            Namespace::Signature => Some((gpg::signature_ok(&env.config.gpg_program, arg, &dep.evr), Note::SignatureProbe)),
            Namespace::Verify => Some((settle(ns, verify_installed(dep, arg, env)), Note::VerifyProbe)),
            Namespace::Gnupg => {
                let ok = gpg::gnupg_ok(&env.config.gpg_program, arg, &dep.evr, dep.flags.contains(Sense::EQUAL));
                Some((ok, Note::GnupgProbe))
            }
            Namespace::Macro => Some((env.macros.is_defined(arg), Note::MacroProbe)),
            Namespace::Envvar => {
                let value = std::env::var(arg).ok();
                Some((system::envvar_ok(value.as_deref(), &dep.evr, dep.flags), Note::EnvvarProbe))
            }
            Namespace::Running => Some((system::is_running(arg, &env.config.varrun), Note::RunningProbe)),
            Namespace::Sanity => {
                let ok = installed_with_script(dep, arg, env, |h| h.has_sanity_check);
                Some((settle(ns, ok), Note::SanityProbe))
            },
            Namespace::Vcheck => {
                let ok = installed_with_script(dep, arg, env, |h| h.has_track);
                Some((settle(ns, ok), Note::VcheckProbe))
            },
            _ => None,
        };
        if let Some((ok, note)) = runtime {
            return Ok((ProbeOutcome::from_bool(ok), note));
        }

        if let Some(sysinfo) = self.sysinfo(env.config) {
            if sysinfo.contains(dep, nopromote) {
                return Ok((ProbeOutcome::Satisfied, Note::SysinfoProvides));
            }
        }

        let listed = |found: bool, note: Note| {
            if found {
                (ProbeOutcome::Satisfied, note)
            } else {
                (ProbeOutcome::Unsatisfied, Note::None)
            }
        };
        let outcome = match ns {
            Namespace::Rpmlib => listed(self.rpmlib().contains(dep, nopromote), Note::RpmlibProvides),
            Namespace::Cpuinfo => listed(self.cpuinfo().contains(dep, nopromote), Note::CpuinfoProvides),
            Namespace::Getconf => listed(self.getconf().contains(dep, nopromote), Note::GetconfProvides),
            Namespace::Uname => listed(self.uname().contains(dep, nopromote), Note::UnameProvides),
            Namespace::Soname => listed(soname_provided(arg, &dep.evr), Note::SonameProvides),
            _ => (ProbeOutcome::Declined, Note::None),
        };
        Ok(outcome)
    }
}

/// A probe that could not run leaves its dependency unsatisfied.
fn settle(ns: Namespace, result: Result<bool>) -> bool {
    result.unwrap_or_else(|e| {
        log::debug!("{:?} probe: {}", ns, e);
        false
    })
}

/// The dependency as it applies to the probed name: same range and flags,
/// named after the probe argument.
fn probe_target(dep: &Dependency, arg: &str) -> Dependency {
    Dependency::new(dep.tag, arg, dep.flags, dep.evr.as_str())
}

fn installed_with_script(
    dep: &Dependency,
    arg: &str,
    env: &ProbeEnv<'_>,
    has_script: impl Fn(&Header) -> bool,
) -> Result<bool> {
    let store = match env.store {
        Some(store) if store.is_open() => store,
        _ => return Ok(false),
    };
    let target = probe_target(dep, arg);
    Ok(store
        .find(MatchTag::ProvideName, arg)?
        .iter()
        .filter(|m| m.header.any_provide_matches(&target, env.config.nopromote))
        .any(|m| has_script(&m.header)))
}

/// Re-run installed package verification. Without a database there is
/// nothing to contradict the dependency.
fn verify_installed(dep: &Dependency, arg: &str, env: &ProbeEnv<'_>) -> Result<bool> {
    let store = match env.store {
        Some(store) if store.is_open() => store,
        _ => return Ok(true),
    };

    let by_name = !(arg == "*" || arg.starts_with('/'));
    let matches = if arg == "*" {
        store.all()?
    } else if arg.starts_with('/') {
        store.find(MatchTag::Basenames, arg)?
    } else {
        store.find(MatchTag::ProvideName, arg)?
    };

    let target = probe_target(dep, arg);
    let mut ok = true;
    for m in &matches {
        if by_name && !m.header.any_provide_matches(&target, env.config.nopromote) {
            continue;
        }
        if !store.verify(m)? {
            log::debug!("verification failed for {}", m.header.nevra());
            ok = false;
        }
    }
    Ok(ok)
}

/// `soname(/path/lib.so) = provide`: the object must export `provide`, or
/// merely have a SONAME when no provide is named.
fn soname_provided(path: &str, wanted: &str) -> bool {
    if !path.starts_with('/') {
        return false;
    }
    let provides = match read_elf(Path::new(path)) {
        Ok(info) => info.provides(),
        Err(e) => {
            log::debug!("soname probe: {}", e);
            return false;
        }
    };
    if wanted.is_empty() {
        !provides.is_empty()
    } else {
        provides.iter().any(|p| p == wanted)
    }
}
