use indexmap::IndexSet;
use std::sync::Arc;

use super::{DepContext, DepStatus};
use crate::db::{DbMatch, MatchTag};
use crate::error::Result;
use crate::package::{DepTag, Dependency, Header};
use crate::ts::{CheckFlags, Problem, ProblemKind, TransactionSet};

const TRANSACTION_PACKAGE: &str = "transaction dependencies";

/// The dependency sets of one package that a check looks at
#[derive(Debug, Default)]
struct PackageDeps {
    requires: Vec<Dependency>,
    conflicts: Vec<Dependency>,
    dirnames: Vec<Dependency>,
    linktos: Vec<Dependency>,
}

impl PackageDeps {
    fn of(header: &Header, flags: CheckFlags, depth_limit: usize) -> Self {
        let mut deps = PackageDeps::default();
        if !flags.contains(CheckFlags::NOREQUIRES) {
            deps.requires = header.requires.clone();
        }
        if !flags.contains(CheckFlags::NOCONFLICTS) {
            deps.conflicts = header.conflicts.clone();
        }
        // Source packages carry no paths
        if !header.is_source() {
            if !flags.contains(CheckFlags::NOPARENTDIRS) {
                deps.dirnames = header.dirname_deps(depth_limit);
            }
            if !flags.contains(CheckFlags::NOLINKTOS) {
                deps.linktos = header.linkto_deps();
            }
        }
        deps
    }

    fn sets(&self) -> [(&[Dependency], ProblemKind); 4] {
        [
            (self.requires.as_slice(), ProblemKind::Requires),
            (self.conflicts.as_slice(), ProblemKind::Conflicts),
            (self.dirnames.as_slice(), ProblemKind::Requires),
            (self.linktos.as_slice(), ProblemKind::Requires),
        ]
    }
}

impl TransactionSet {
    /// Check every dependency the transaction touches.
    ///
    /// Added packages have their requires, conflicts, parent directories and
    /// symlink targets checked, and installed packages that conflict with
    /// anything they provide are reported. Installed packages requiring
    /// something an erased package provides are reported as well. Last come
    /// the transaction's own dependencies.
    ///
    /// # Returns
    /// * `Ok(n)` - Number of problems recorded in [`problems`](TransactionSet::problems)
    /// * `Err(e)` - The installed database failed; checking stopped
    pub fn check(&mut self) -> Result<usize> {
        self.problems.clear();
        self.added.make_index();

        let tscolor = self.config.transaction_color;
        let depth_limit = self.config.dirname_depth_limit;
        let mut worst = DepStatus::Satisfied;

        let added: Vec<Arc<Header>> = self
            .elements
            .iter()
            .filter(|e| e.key.is_added())
            .map(|e| Arc::clone(&e.header))
            .collect();
        for header in &added {
            log::debug!("========== +++ {} 0x{:x}", header.nevra(), header.color);
            let deps = PackageDeps::of(header, self.flags, depth_limit);
            let status = self.check_package_deps(&header.nevra(), &deps, None, tscolor, DepContext::Added, false)?;
            worst = worst.max(status);

            for name in provided_names(header) {
                let status = self.check_package_set(MatchTag::ConflictName, &name, DepContext::Added)?;
                worst = worst.max(status);
            }
        }

        let removed: Vec<Arc<Header>> = self
            .elements
            .iter()
            .filter(|e| !e.key.is_added())
            .map(|e| Arc::clone(&e.header))
            .collect();
        for header in &removed {
            log::debug!("========== --- {} 0x{:x}", header.nevra(), header.color);
            for name in provided_names(header) {
                let status = self.check_package_set(MatchTag::RequireName, &name, DepContext::Installed)?;
                worst = worst.max(status);
            }
        }

        let mut deps = PackageDeps::default();
        for dep in &self.transaction_deps {
            match dep.tag {
                DepTag::Conflicts => deps.conflicts.push(dep.clone()),
                _ => deps.requires.push(dep.retag(DepTag::Requires)),
            }
        }
        let status = self.check_package_deps(TRANSACTION_PACKAGE, &deps, None, 0, DepContext::Transaction, false)?;
        worst = worst.max(status);

        log::debug!("check found {} problem(s), worst status {:?}", self.problems.len(), worst);
        Ok(self.problems.len())
    }

    /// Check one package's dependency sets, recording a problem for every
    /// unsatisfied requirement and every conflict that is present.
    ///
    /// With `name_filter` only dependencies on that exact name are looked
    /// at. Dependencies colored outside `tscolor` are skipped.
    fn check_package_deps(
        &mut self,
        package: &str,
        deps: &PackageDeps,
        name_filter: Option<&str>,
        tscolor: u32,
        ctx: DepContext,
        installed: bool,
    ) -> Result<DepStatus> {
        let mut status = DepStatus::Satisfied;

        for (set, kind) in deps.sets() {
            for dep in set {
                if dep.name.is_empty() {
                    continue;
                }
                if name_filter.map_or(false, |name| name != dep.name) {
                    continue;
                }
                if tscolor != 0 && dep.color != 0 && tscolor & dep.color == 0 {
                    continue;
                }

                let resolution = match self.satisfy(dep, ctx) {
                    Ok(r) => r,
                    Err(e) => {
                        log::error!("{}: {} {}: {}", package, dep.tag.type_name(), dep.nevr(), e);
                        return Err(e);
                    }
                };

                let present = resolution.is_satisfied();
                let is_problem = match kind {
                    ProblemKind::Requires => !present,
                    ProblemKind::Conflicts => present,
                };
                if !is_problem {
                    continue;
                }

                let suggestions = match kind {
                    ProblemKind::Requires => self.suggestions_for(dep),
                    ProblemKind::Conflicts => Vec::new(),
                };
                self.problems.push(Problem {
                    kind,
                    package: package.to_string(),
                    dependency: dep.nevr(),
                    suggestions,
                    installed,
                });
                status = DepStatus::Unsatisfied;
            }
        }
        Ok(status)
    }

    /// Re-check the installed packages whose `tag` index holds `name`,
    /// restricted to dependencies on that name. Only requirements broken by
    /// an erasure are reported against the installed package.
    fn check_package_set(&mut self, tag: MatchTag, name: &str, ctx: DepContext) -> Result<DepStatus> {
        let installed = tag == MatchTag::RequireName;
        let matches: Vec<DbMatch> = self.init_iterator(tag, name)?.prune(&self.removed_offsets).collect();
        let tscolor = self.config.transaction_color;
        let depth_limit = self.config.dirname_depth_limit;

        let mut status = DepStatus::Satisfied;
        for m in matches {
            let deps = PackageDeps::of(&m.header, self.flags, depth_limit);
            let rc = self.check_package_deps(&m.header.nevra(), &deps, Some(name), tscolor, ctx, installed)?;
            status = status.max(rc);
        }
        Ok(status)
    }
}

/// Provide names then owned files, without repeats.
fn provided_names(header: &Header) -> IndexSet<String> {
    header
        .all_provides()
        .into_iter()
        .map(|p| p.name)
        .chain(header.files.iter().map(|f| f.path.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::db::{HeaderStore, MemoryStore};
    use crate::error::ResolutionError;
    use crate::package::Header;
    use rpmtx_evr::Sense;

    fn config() -> ResolverConfig {
        let mut config = ResolverConfig::default();
        config.sysinfo_path = "/nonexistent/rpmtx/sysinfo".into();
        config
    }

    fn pkg(name: &str, version: &str, release: &str) -> Header {
        Header::new(name, version, release)
    }

    fn dep(tag: DepTag, s: &str) -> Dependency {
        Dependency::parse(tag, s).unwrap()
    }

    #[test]
    fn test_missing_requirement_with_suggestion() {
        let mut ts = TransactionSet::new(config());
        ts.set_available(vec![pkg("bar", "2.0", "1"), pkg("baz", "1.0", "1")]);
        ts.add_install_element(
            pkg("foo", "1.0", "1").with_dependency(dep(DepTag::Requires, "bar >= 2")),
            None,
            true,
            &[],
        )
        .unwrap();

        assert_eq!(ts.check().unwrap(), 1);
        let problem = ts.problems().iter().next().unwrap();
        assert_eq!(problem.kind, ProblemKind::Requires);
        assert_eq!(problem.to_string(), "bar >= 2 is needed by foo-1.0-1");
        assert_eq!(problem.suggestions, vec!["bar-2.0-1".to_string()]);
        assert!(!problem.installed);
    }

    #[test]
    fn test_requirement_met_by_added_package() {
        let mut ts = TransactionSet::new(config());
        ts.add_install_element(
            pkg("foo", "1.0", "1").with_dependency(dep(DepTag::Requires, "bar >= 2")),
            None,
            true,
            &[],
        )
        .unwrap();
        ts.add_install_element(pkg("bar", "2.1", "1"), None, true, &[]).unwrap();
        assert_eq!(ts.check().unwrap(), 0);
    }

    #[test]
    fn test_added_conflict_with_installed() {
        let mut store = MemoryStore::new();
        store.insert(pkg("sendmail", "8.17", "1"));
        let mut ts = TransactionSet::new(config()).with_store(store);
        ts.add_install_element(
            pkg("postfix", "3.8", "1").with_dependency(dep(DepTag::Conflicts, "sendmail")),
            None,
            true,
            &[],
        )
        .unwrap();

        assert_eq!(ts.check().unwrap(), 1);
        let problem = ts.problems().iter().next().unwrap();
        assert_eq!(problem.to_string(), "sendmail conflicts with postfix-3.8-1");
    }

    #[test]
    fn test_installed_conflict_with_added_provide() {
        let mut store = MemoryStore::new();
        store.insert(pkg("sendmail", "8.17", "1").with_dependency(dep(DepTag::Conflicts, "smtpdaemon")));
        let mut ts = TransactionSet::new(config()).with_store(store);
        ts.add_install_element(
            pkg("postfix", "3.8", "1").with_dependency(Dependency::named(DepTag::Provides, "smtpdaemon")),
            None,
            true,
            &[],
        )
        .unwrap();

        assert_eq!(ts.check().unwrap(), 1);
        let problem = ts.problems().iter().next().unwrap();
        assert!(!problem.installed);
        assert_eq!(problem.to_string(), "smtpdaemon conflicts with sendmail-8.17-1");
    }

    #[test]
    fn test_erasing_required_package() {
        let mut store = MemoryStore::new();
        let bash = store.insert(pkg("bash", "5.2", "1"));
        store.insert(pkg("script", "1", "1").with_dependency(dep(DepTag::Requires, "bash")));
        let header = store.get(bash).unwrap();
        let mut ts = TransactionSet::new(config()).with_store(store);
        ts.add_erase_element(header, bash).unwrap();

        assert_eq!(ts.check().unwrap(), 1);
        let problem = ts.problems().iter().next().unwrap();
        assert!(problem.installed);
        assert_eq!(problem.to_string(), "bash is needed by (installed) script-1-1");
    }

    #[test]
    fn test_upgrade_keeps_requirement_satisfied() {
        let mut store = MemoryStore::new();
        store.insert(pkg("bash", "5.1", "1"));
        store.insert(pkg("script", "1", "1").with_dependency(dep(DepTag::Requires, "bash >= 5")));
        let mut ts = TransactionSet::new(config()).with_store(store);
        ts.add_install_element(pkg("bash", "5.2", "1"), None, true, &[]).unwrap();

        assert_eq!(ts.len(), 2);
        assert_eq!(ts.check().unwrap(), 0);
    }

    #[test]
    fn test_flags_drop_sets() {
        let mut ts = TransactionSet::new(config()).with_flags(CheckFlags::NOREQUIRES | CheckFlags::NOPARENTDIRS);
        ts.add_install_element(
            pkg("foo", "1.0", "1")
                .with_dependency(dep(DepTag::Requires, "missing"))
                .with_file("/opt/foo/bin/foo"),
            None,
            true,
            &[],
        )
        .unwrap();
        assert_eq!(ts.check().unwrap(), 0);
    }

    #[test]
    fn test_parent_directories_and_links() {
        let mut ts = TransactionSet::new(config()).with_flags(CheckFlags::NOREQUIRES);
        ts.add_install_element(
            pkg("filesystem", "3", "1").with_file("/").with_file("/opt").with_file("/opt/foo"),
            None,
            true,
            &[],
        )
        .unwrap();
        ts.add_install_element(
            pkg("foo", "1.0", "1")
                .with_file("/opt/foo/bin/foo")
                .with_symlink("/opt/foo/lib", "../lib64"),
            None,
            true,
            &[],
        )
        .unwrap();

        ts.check().unwrap();
        let missing: Vec<String> = ts.problems().iter().map(|p| p.dependency.clone()).collect();
        assert!(missing.contains(&"/opt/foo/bin".to_string()));
        assert!(missing.contains(&"/opt/lib64".to_string()));
        assert!(!missing.contains(&"/opt/foo".to_string()));
    }

    #[test]
    fn test_color_filter() {
        let mut config = config();
        config.transaction_color = 2;
        let mut ts = TransactionSet::new(config);
        ts.add_install_element(
            pkg("app", "1", "1")
                .with_dependency(Dependency::named(DepTag::Requires, "libz.so.1").with_color(1))
                .with_dependency(Dependency::named(DepTag::Requires, "libz.so.1()(64bit)").with_color(2)),
            None,
            true,
            &[],
        )
        .unwrap();

        assert_eq!(ts.check().unwrap(), 1);
        assert_eq!(ts.problems().iter().next().unwrap().dependency, "libz.so.1()(64bit)");
    }

    #[test]
    fn test_transaction_dependencies() {
        let mut ts = TransactionSet::new(config());
        ts.add_dependency(dep(DepTag::Requires, "rpmlib(PayloadFilesHavePrefix) <= 4.0-1"));
        ts.add_dependency(dep(DepTag::Requires, "rpmlib(Teleportation)"));
        ts.add_dependency(dep(DepTag::Conflicts, "rpmlib(CompressedFileNames)"));

        assert_eq!(ts.check().unwrap(), 2);
        let shown: Vec<String> = ts.problems().iter().map(|p| p.to_string()).collect();
        assert_eq!(
            shown,
            vec![
                "rpmlib(Teleportation) is needed by transaction dependencies".to_string(),
                "rpmlib(CompressedFileNames) conflicts with transaction dependencies".to_string(),
            ]
        );
    }

    #[test]
    fn test_hint_never_reported() {
        let mut ts = TransactionSet::new(config());
        ts.add_install_element(
            pkg("foo", "1.0", "1")
                .with_dependency(Dependency::named(DepTag::Requires, "foo-docs").with_flags(Sense::MISSINGOK)),
            None,
            true,
            &[],
        )
        .unwrap();
        assert_eq!(ts.check().unwrap(), 0);
    }

    struct FailingStore;

    impl HeaderStore for FailingStore {
        fn find(&self, _tag: MatchTag, _key: &str) -> Result<Vec<DbMatch>> {
            Err(ResolutionError::Database("index is corrupt".to_string()))
        }

        fn all(&self) -> Result<Vec<DbMatch>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_database_failure_stops_check() {
        let mut ts = TransactionSet::new(config()).with_store(FailingStore);
        ts.add_install_element(
            pkg("foo", "1.0", "1").with_dependency(dep(DepTag::Requires, "bar")),
            None,
            false,
            &[],
        )
        .unwrap();
        assert!(matches!(ts.check(), Err(ResolutionError::Database(_))));
    }
}
