use rpmtx_evr::Sense;

use super::{DepContext, DepStatus, Resolution, SolveOutcome};
use crate::db::MatchTag;
use crate::error::Result;
use crate::package::{DepTag, Dependency, Namespace};
use crate::probe::{Note, ProbeEnv, ProbeOutcome};
use crate::ts::{CheckFlags, TransactionSet};

/// Names whose verdict only depends on the installed database.
fn is_lookup(ns: Namespace) -> bool {
    matches!(
        ns,
        Namespace::Path
            | Namespace::Dso
            | Namespace::Other
            | Namespace::Version
            | Namespace::Compound
            | Namespace::Plain
            | Namespace::Config
    )
}

impl TransactionSet {
    /// Decide whether a single dependency is satisfied.
    ///
    /// Probe namespaces are answered by the probe context. Everything else is
    /// looked up in the added index, the result cache, the installed
    /// database and finally the solver callback (only for requirements of
    /// packages being added). Missing-ok dependencies are always satisfied;
    /// a leading `!` inverts the verdict.
    ///
    /// # Returns
    /// * `Ok(resolution)` - The verdict and where it came from
    /// * `Err(e)` - The installed database failed
    pub fn satisfy(&mut self, dep: &Dependency, ctx: DepContext) -> Result<Resolution> {
        let (mut satisfied, note) = self.resolve(dep, ctx)?;
        if dep.is_negated() && note != Note::HintSkipped {
            satisfied = !satisfied;
        }

        let resolution = Resolution {
            status: DepStatus::from_bool(satisfied),
            note,
        };
        log::trace!("{:>9}: {:<45} {}", dep.tag.type_name(), dep.nevr(), resolution);
        Ok(resolution)
    }

    fn resolve(&mut self, dep: &Dependency, ctx: DepContext) -> Result<(bool, Note)> {
        let missing_ok = dep.flags.contains(Sense::MISSINGOK);
        let nopromote = self.config.nopromote;
        let name = dep.bare_name().to_string();
        let key = dep.display();
        let mut retries = self.config.solver_retries;

        loop {
            let env = ProbeEnv {
                macros: &*self.macros,
                store: self.store.as_deref(),
                config: &self.config,
            };
            let (outcome, note) = self.probes.probe(dep, &env)?;
            if outcome != ProbeOutcome::Declined {
                let satisfied = outcome == ProbeOutcome::Satisfied;
                if missing_ok && (!satisfied || note.is_runtime_probe()) {
                    return Ok((true, Note::HintSkipped));
                }
                return Ok((satisfied, note));
            }

            // Verdicts that depend on what is staged are never cached
            if self.added.satisfies(dep, nopromote).is_some() {
                return Ok((true, Note::None));
            }

            let cacheable = self.config.cache_results
                && self.cache.is_some()
                && self.removed_offsets.is_empty()
                && is_lookup(dep.namespace());

            if cacheable {
                if let Some(rc) = self.cache_get(&key) {
                    return Ok((rc == 0, Note::Cached));
                }
            }

            if let Some(note) = self.lookup_installed(dep, &name)? {
                if cacheable {
                    self.cache_put(&key, DepStatus::Satisfied);
                }
                return Ok((true, note));
            }

            let suggest = ctx == DepContext::Added && dep.tag != DepTag::Conflicts;
            if suggest && retries > 0 && !self.flags.contains(CheckFlags::NOSUGGEST) {
                if let Some(mut solver) = self.solver.take() {
                    let outcome = solver.solve(self, dep);
                    self.solver = Some(solver);
                    match outcome {
                        SolveOutcome::Satisfied => return Ok((true, Note::Suggested)),
                        SolveOutcome::AddedCandidate => {
                            retries -= 1;
                            self.added.make_index();
                            continue;
                        }
                        SolveOutcome::Unresolved => {}
                    }
                }
            }

            if missing_ok {
                return Ok((true, Note::HintSkipped));
            }
            if cacheable {
                self.cache_put(&key, DepStatus::Unsatisfied);
            }
            return Ok((false, Note::None));
        }
    }

    /// Search the installed database, skipping rows being erased.
    fn lookup_installed(&self, dep: &Dependency, name: &str) -> Result<Option<Note>> {
        if !self.store.as_deref().map_or(false, |s| s.is_open()) {
            return Ok(None);
        }

        if name == "/" {
            return Ok(Some(Note::RootFiles));
        }
        if name.starts_with('/') {
            let mut files = self.init_iterator(MatchTag::Basenames, name)?.prune(&self.removed_offsets);
            if files.next().is_some() {
                return Ok(Some(Note::DbFiles));
            }
        }

        let nopromote = self.config.nopromote;
        let found = self
            .init_iterator(MatchTag::ProvideName, name)?
            .prune(&self.removed_offsets)
            .any(|m| m.header.any_provide_matches(dep, nopromote));
        Ok(found.then_some(Note::DbProvides))
    }

    fn cache_get(&mut self, key: &str) -> Option<i32> {
        let cache = self.cache.as_mut()?;
        match cache.get(key) {
            Ok(rc) => rc,
            Err(e) => {
                log::warn!("Disabling dependency cache: {}", e);
                self.cache = None;
                None
            }
        }
    }

    fn cache_put(&mut self, key: &str, status: DepStatus) {
        if let Some(cache) = self.cache.as_mut() {
            if let Err(e) = cache.put(key, status.code()) {
                log::warn!("Disabling dependency cache: {}", e);
                self.cache = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MacroTable, ResolverConfig};
    use crate::db::MemoryStore;
    use crate::depends::{MemoryResultCache, ResultCache};
    use crate::error::ResolutionError;
    use crate::package::Header;

    fn config() -> ResolverConfig {
        let mut config = ResolverConfig::default();
        config.sysinfo_path = "/nonexistent/rpmtx/sysinfo".into();
        config
    }

    fn req(s: &str) -> Dependency {
        Dependency::parse(DepTag::Requires, s).unwrap()
    }

    fn pkg(name: &str, version: &str, release: &str) -> Header {
        Header::new(name, version, release)
    }

    #[test]
    fn test_rpmlib_without_database() {
        let mut ts = TransactionSet::new(config());
        let r = ts
            .satisfy(&req("rpmlib(CompressedFileNames) <= 3.0.4-1"), DepContext::Added)
            .unwrap();
        assert!(r.is_satisfied());
        assert_eq!(r.note, Note::RpmlibProvides);
    }

    #[test]
    fn test_added_index_hit_is_not_cached() {
        let mut ts = TransactionSet::new(config()).with_cache(MemoryResultCache::new());
        ts.add_install_element(
            pkg("bar", "1.0", "1").with_dependency(Dependency::named(DepTag::Provides, "libbar.so()(64bit)")),
            None,
            false,
            &[],
        )
        .unwrap();

        let r = ts.satisfy(&req("libbar.so()(64bit)"), DepContext::Added).unwrap();
        assert!(r.is_satisfied());
        assert_eq!(r.note, Note::None);
        assert_eq!(ts.cache_get("R libbar.so()(64bit)"), None);
    }

    #[test]
    fn test_database_lookups() {
        let mut store = MemoryStore::new();
        store.insert(
            pkg("bash", "5.2", "1")
                .with_file("/bin/bash")
                .with_dependency(Dependency::parse(DepTag::Provides, "sh = 5.2").unwrap()),
        );
        let mut ts = TransactionSet::new(config()).with_store(store);

        let r = ts.satisfy(&req("/bin/bash"), DepContext::Added).unwrap();
        assert_eq!(r.note, Note::DbFiles);
        let r = ts.satisfy(&req("/"), DepContext::Added).unwrap();
        assert_eq!(r.note, Note::RootFiles);
        let r = ts.satisfy(&req("sh >= 5"), DepContext::Added).unwrap();
        assert_eq!(r.note, Note::DbProvides);
        assert!(!ts.satisfy(&req("sh >= 6"), DepContext::Added).unwrap().is_satisfied());
        assert!(!ts.satisfy(&req("zsh"), DepContext::Added).unwrap().is_satisfied());
    }

    #[test]
    fn test_erased_rows_are_skipped() {
        let mut store = MemoryStore::new();
        let off = store.insert(pkg("bash", "5.2", "1"));
        let header = store.get(off).unwrap();
        let mut ts = TransactionSet::new(config()).with_store(store);
        assert!(ts.satisfy(&req("bash"), DepContext::Installed).unwrap().is_satisfied());

        ts.add_erase_element(header, off).unwrap();
        assert!(!ts.satisfy(&req("bash"), DepContext::Installed).unwrap().is_satisfied());
    }

    #[test]
    fn test_cache_hit_and_write() {
        let mut store = MemoryStore::new();
        store.insert(pkg("bash", "5.2", "1"));
        let mut cache = MemoryResultCache::new();
        cache.put("R zsh", 0).unwrap();
        let mut ts = TransactionSet::new(config()).with_store(store).with_cache(cache);

        let r = ts.satisfy(&req("zsh"), DepContext::Installed).unwrap();
        assert!(r.is_satisfied());
        assert_eq!(r.note, Note::Cached);

        ts.satisfy(&req("bash"), DepContext::Installed).unwrap();
        assert_eq!(ts.cache_get("R bash"), Some(0));
        ts.satisfy(&req("fish"), DepContext::Installed).unwrap();
        assert_eq!(ts.cache_get("R fish"), Some(1));
    }

    #[test]
    fn test_cache_bypassed_while_erasing() {
        let mut store = MemoryStore::new();
        let off = store.insert(pkg("bash", "5.2", "1"));
        let header = store.get(off).unwrap();
        let mut cache = MemoryResultCache::new();
        cache.put("R bash", 0).unwrap();
        let mut ts = TransactionSet::new(config()).with_store(store).with_cache(cache);
        ts.add_erase_element(header, off).unwrap();

        let r = ts.satisfy(&req("bash"), DepContext::Installed).unwrap();
        assert!(!r.is_satisfied());
        assert_eq!(r.note, Note::None);
    }

    struct BrokenCache;

    impl ResultCache for BrokenCache {
        fn get(&mut self, _key: &str) -> Result<Option<i32>> {
            Err(ResolutionError::Cache("unreadable".to_string()))
        }

        fn put(&mut self, _key: &str, _rc: i32) -> Result<()> {
            Err(ResolutionError::Cache("unwritable".to_string()))
        }

        fn clear(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_cache_failure_disables_cache() {
        let mut ts = TransactionSet::new(config()).with_store(MemoryStore::new()).with_cache(BrokenCache);
        let r = ts.satisfy(&req("bash"), DepContext::Installed).unwrap();
        assert!(!r.is_satisfied());
        assert!(ts.cache.is_none());
    }

    #[test]
    fn test_missing_ok() {
        let mut ts = TransactionSet::new(config());
        let hint = req("nothing-provides-this").with_flags(Sense::MISSINGOK);
        let r = ts.satisfy(&hint, DepContext::Added).unwrap();
        assert!(r.is_satisfied());
        assert_eq!(r.note, Note::HintSkipped);

        let hint = req("rpmlib(NoSuchFeature)").with_flags(Sense::MISSINGOK);
        assert_eq!(ts.satisfy(&hint, DepContext::Added).unwrap().note, Note::HintSkipped);

        let hint = Dependency::named(DepTag::Requires, "%{with_gui}").with_flags(Sense::MISSINGOK);
        let r = ts.satisfy(&hint, DepContext::Added).unwrap();
        assert!(r.is_satisfied());
        assert_eq!(r.note, Note::HintSkipped);
    }

    #[test]
    fn test_probe_that_cannot_run_is_unsatisfied() {
        let dir = tempfile::TempDir::new().unwrap();
        let name = format!("digest(sha256:{})", dir.path().display());
        let mut ts = TransactionSet::new(config());

        let hint = Dependency::new(DepTag::Requires, name.as_str(), Sense::EQUAL | Sense::MISSINGOK, "abc");
        let r = ts.satisfy(&hint, DepContext::Added).unwrap();
        assert!(r.is_satisfied());
        assert_eq!(r.note, Note::HintSkipped);

        let dep = Dependency::new(DepTag::Requires, name.as_str(), Sense::EQUAL, "abc");
        let r = ts.satisfy(&dep, DepContext::Added).unwrap();
        assert!(!r.is_satisfied());
        assert_eq!(r.note, Note::DigestProbe);
    }

    #[test]
    fn test_negation() {
        let mut store = MemoryStore::new();
        store.insert(pkg("bash", "5.2", "1"));
        let mut ts = TransactionSet::new(config())
            .with_store(store)
            .with_macros(MacroTable::new().with("with_gui", "1"));

        assert!(!ts.satisfy(&req("!bash"), DepContext::Added).unwrap().is_satisfied());
        assert!(ts.satisfy(&req("!zsh"), DepContext::Added).unwrap().is_satisfied());
        let dep = Dependency::named(DepTag::Requires, "!%{with_gui}");
        assert!(!ts.satisfy(&dep, DepContext::Added).unwrap().is_satisfied());
    }

    #[test]
    fn test_solver_adds_candidate_and_retries() {
        let mut ts = TransactionSet::new(config()).with_solver(|ts: &mut TransactionSet, dep: &Dependency| {
            if dep.name != "libfoo" {
                return SolveOutcome::Unresolved;
            }
            match ts.add_install_element(Header::new("libfoo", "1.0", "1"), None, false, &[]) {
                Ok(_) => SolveOutcome::AddedCandidate,
                Err(_) => SolveOutcome::Unresolved,
            }
        });

        let r = ts.satisfy(&req("libfoo"), DepContext::Added).unwrap();
        assert!(r.is_satisfied());
        assert_eq!(ts.len(), 1);

        assert!(!ts.satisfy(&req("libbar"), DepContext::Added).unwrap().is_satisfied());
    }

    #[test]
    fn test_solver_only_for_added_and_bounded() {
        let mut config = config();
        config.solver_retries = 3;
        let mut calls = 0;
        let mut ts = TransactionSet::new(config).with_solver(move |_: &mut TransactionSet, _: &Dependency| {
            calls += 1;
            assert!(calls <= 3);
            SolveOutcome::AddedCandidate
        });

        assert!(!ts.satisfy(&req("ghost"), DepContext::Added).unwrap().is_satisfied());
        assert!(!ts.satisfy(&req("ghost"), DepContext::Installed).unwrap().is_satisfied());

        ts.set_flags(CheckFlags::NOSUGGEST);
        assert!(!ts.satisfy(&req("ghost"), DepContext::Added).unwrap().is_satisfied());
    }

    #[test]
    fn test_solver_satisfied() {
        let mut ts = TransactionSet::new(config())
            .with_solver(|_: &mut TransactionSet, _: &Dependency| SolveOutcome::Satisfied);
        let r = ts.satisfy(&req("anything"), DepContext::Added).unwrap();
        assert!(r.is_satisfied());
        assert_eq!(r.note, Note::Suggested);
    }
}
