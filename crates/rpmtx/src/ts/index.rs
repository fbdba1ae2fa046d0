//! Provider lookup for packages staged in the transaction

use std::collections::BTreeMap;

use super::element::ElementRef;
use crate::package::{Dependency, Header};

#[derive(Debug, Clone)]
struct IndexEntry {
    provides: Vec<Dependency>,
    files: Vec<String>,
}

/// Maps capability names and owned files to the staged packages
/// providing them.
///
/// One index holds the packages being added, a second one the packages
/// being erased.
#[derive(Debug, Clone, Default)]
pub struct ProviderIndex {
    entries: BTreeMap<ElementRef, IndexEntry>,
    provides: BTreeMap<String, Vec<(ElementRef, usize)>>,
    files: BTreeMap<String, Vec<ElementRef>>,
}

impl ProviderIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a package's provides and files under `key`, replacing any
    /// previous entry with that key. Provides colored outside `tscolor` are
    /// left out.
    pub fn add(&mut self, key: ElementRef, header: &Header, tscolor: u32) {
        self.remove(key);

        let provides: Vec<Dependency> = header
            .all_provides()
            .into_iter()
            .filter(|p| tscolor == 0 || p.color == 0 || tscolor & p.color != 0)
            .collect();
        let files: Vec<String> = header.files.iter().map(|f| f.path.clone()).collect();

        let entry = IndexEntry { provides, files };
        self.index_entry(key, &entry);
        self.entries.insert(key, entry);
    }

    /// Drop a package from the index.
    pub fn remove(&mut self, key: ElementRef) -> bool {
        if self.entries.remove(&key).is_none() {
            return false;
        }
        for keys in self.provides.values_mut() {
            keys.retain(|(k, _)| *k != key);
        }
        for keys in self.files.values_mut() {
            keys.retain(|k| *k != key);
        }
        self.provides.retain(|_, v| !v.is_empty());
        self.files.retain(|_, v| !v.is_empty());
        true
    }

    /// Rebuild the name lookups from the stored entries in key order.
    pub fn make_index(&mut self) {
        self.provides.clear();
        self.files.clear();
        let entries = std::mem::take(&mut self.entries);
        for (key, entry) in &entries {
            self.index_entry(*key, entry);
        }
        self.entries = entries;
    }

    fn index_entry(&mut self, key: ElementRef, entry: &IndexEntry) {
        for (i, p) in entry.provides.iter().enumerate() {
            self.provides.entry(p.name.clone()).or_default().push((key, i));
        }
        for f in &entry.files {
            self.files.entry(f.clone()).or_default().push(key);
        }
    }

    pub fn contains(&self, key: ElementRef) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.provides.clear();
        self.files.clear();
    }

    /// Every staged package satisfying `dep`, without duplicates. Paths are
    /// matched against owned files first, then against provides.
    pub fn all_satisfying(&self, dep: &Dependency, nopromote: bool) -> Vec<ElementRef> {
        let name = dep.bare_name();
        let mut found: Vec<ElementRef> = Vec::new();

        if name.starts_with('/') {
            if let Some(keys) = self.files.get(name) {
                for key in keys {
                    if !found.contains(key) {
                        found.push(*key);
                    }
                }
            }
            if !found.is_empty() {
                return found;
            }
        }

        if let Some(keys) = self.provides.get(name) {
            for (key, i) in keys {
                if found.contains(key) {
                    continue;
                }
                let provide = match self.entries.get(key).and_then(|e| e.provides.get(*i)) {
                    Some(p) => p,
                    None => continue,
                };
                if dep.range_overlaps(provide, nopromote) {
                    found.push(*key);
                }
            }
        }
        found
    }

    /// First staged package satisfying `dep`.
    pub fn satisfies(&self, dep: &Dependency, nopromote: bool) -> Option<ElementRef> {
        self.all_satisfying(dep, nopromote).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::DepTag;

    fn req(s: &str) -> Dependency {
        Dependency::parse(DepTag::Requires, s).unwrap()
    }

    fn index() -> ProviderIndex {
        let mut index = ProviderIndex::new();
        index.add(
            ElementRef::Added(0),
            &Header::new("bar", "1.0", "1")
                .with_dependency(Dependency::named(DepTag::Provides, "libbar.so()(64bit)"))
                .with_file("/usr/lib64/libbar.so"),
            0,
        );
        index.add(
            ElementRef::Added(1),
            &Header::new("baz", "2.0", "1").with_dependency(Dependency::parse(DepTag::Provides, "bar = 3.0").unwrap()),
            0,
        );
        index
    }

    #[test]
    fn test_lookup_by_provide_and_file() {
        let index = index();
        assert_eq!(index.satisfies(&req("libbar.so()(64bit)"), true), Some(ElementRef::Added(0)));
        assert_eq!(index.satisfies(&req("/usr/lib64/libbar.so"), true), Some(ElementRef::Added(0)));
        assert_eq!(index.satisfies(&req("/usr/lib64/missing.so"), true), None);
    }

    #[test]
    fn test_version_filter() {
        let index = index();
        assert_eq!(
            index.all_satisfying(&req("bar"), true),
            vec![ElementRef::Added(0), ElementRef::Added(1)]
        );
        assert_eq!(index.all_satisfying(&req("bar >= 2.0"), true), vec![ElementRef::Added(1)]);
        assert_eq!(index.satisfies(&req("bar > 5"), true), None);
    }

    #[test]
    fn test_remove_and_rebuild() {
        let mut index = index();
        assert!(index.remove(ElementRef::Added(0)));
        assert!(!index.remove(ElementRef::Added(0)));
        assert_eq!(index.satisfies(&req("libbar.so()(64bit)"), true), None);
        index.make_index();
        assert_eq!(index.satisfies(&req("bar"), true), Some(ElementRef::Added(1)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_color_filter() {
        let mut index = ProviderIndex::new();
        let h = Header::new("lib32", "1.0", "1")
            .with_dependency(Dependency::named(DepTag::Provides, "libz.so.1").with_color(1));
        index.add(ElementRef::Added(0), &h, 2);
        assert_eq!(index.satisfies(&req("libz.so.1"), true), None);
        assert_eq!(index.satisfies(&req("lib32"), true), Some(ElementRef::Added(0)));
    }
}
