/// Package name pairs whose relations the sorter must not record.
///
/// Parsed from a whitespace separated list of `requirer>provider` entries,
/// e.g. `"glibc>bash pam>initscripts"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whiteout {
    entries: Vec<(String, String)>,
}

impl Whiteout {
    /// Parse a whiteout list. Entries without `>` or with an empty side are
    /// skipped.
    pub fn parse(list: &str, level: log::Level) -> Self {
        let mut entries = Vec::new();
        for item in list.split_whitespace() {
            let (requirer, provider) = match item.split_once('>') {
                Some((p, q)) if !p.is_empty() && !q.is_empty() => (p, q),
                _ => {
                    log::debug!("Skipping malformed whiteout entry: {}", item);
                    continue;
                }
            };
            log::log!(
                level,
                "ignore package name relation(s) [{}]\t{} -> {}",
                entries.len(),
                requirer,
                provider
            );
            entries.push((requirer.to_string(), provider.to_string()));
        }
        Self { entries }
    }

    /// Whether a relation from `requirer` on `provider` is whited out
    pub fn ignores(&self, requirer: &str, provider: &str) -> bool {
        self.entries.iter().any(|(p, q)| p == requirer && q == provider)
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entries() {
        let whiteout = Whiteout::parse("glibc>bash  pam>initscripts\n", log::Level::Debug);
        assert_eq!(whiteout.len(), 2);
        assert!(whiteout.ignores("glibc", "bash"));
        assert!(whiteout.ignores("pam", "initscripts"));
    }

    #[test]
    fn test_ignores_is_directional() {
        let whiteout = Whiteout::parse("glibc>bash", log::Level::Debug);
        assert!(!whiteout.ignores("bash", "glibc"));
        assert!(!whiteout.ignores("glibc", "zsh"));
    }

    #[test]
    fn test_parse_skips_malformed() {
        let whiteout = Whiteout::parse("nonsense >bash glibc> a>b", log::Level::Debug);
        assert_eq!(whiteout.entries(), &[("a".to_string(), "b".to_string())]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(Whiteout::parse("", log::Level::Debug).is_empty());
    }
}
