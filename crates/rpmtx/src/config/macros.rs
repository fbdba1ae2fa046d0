//! Macro collaborator interface

use indexmap::IndexMap;

/// Read access to the surrounding tool's macro definitions.
///
/// Only plain lookups are needed here; the full expansion language lives
/// outside this crate.
pub trait MacroContext {
    /// Value of `name`, or `None` if undefined.
    fn get(&self, name: &str) -> Option<String>;

    fn is_defined(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Expand `%{name}`, `%{?name}` or `%{?name:text}` and read the result as
    /// an integer. `Y`/`y` count as 1, `N`/`n` as 0, anything unparsable as 0.
    fn expand_numeric(&self, expr: &str) -> i64 {
        let expr = expr.trim();
        let expanded = match expr.strip_prefix("%{").and_then(|s| s.strip_suffix('}')) {
            Some(inner) => {
                let conditional = inner.starts_with('?');
                let inner = inner.trim_start_matches('?');
                match inner.split_once(':') {
                    Some((name, text)) => {
                        if self.is_defined(name) {
                            text.to_string()
                        } else {
                            String::new()
                        }
                    }
                    None => match self.get(inner) {
                        Some(value) => value,
                        None if conditional => String::new(),
                        None => expr.to_string(),
                    },
                }
            }
            None => expr.to_string(),
        };
        parse_numeric(&expanded)
    }
}

fn parse_numeric(s: &str) -> i64 {
    let s = s.trim();
    match s.as_bytes().first() {
        Some(b'Y') | Some(b'y') => return 1,
        Some(b'N') | Some(b'n') => return 0,
        _ => {}
    }
    let sign_len = usize::from(s.starts_with('-') || s.starts_with('+'));
    let digits = s[sign_len..].bytes().take_while(u8::is_ascii_digit).count();
    s[..sign_len + digits].parse().unwrap_or(0)
}

/// In-memory macro table.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    values: IndexMap<String, String>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style define.
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.define(name, value);
        self
    }

    pub fn define(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    pub fn undefine(&mut self, name: &str) {
        self.values.shift_remove(name);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<IndexMap<String, String>> for MacroTable {
    fn from(values: IndexMap<String, String>) -> Self {
        Self { values }
    }
}

impl MacroContext for MacroTable {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let table = MacroTable::new().with("_varrun", "/run");
        assert_eq!(table.get("_varrun").as_deref(), Some("/run"));
        assert!(table.is_defined("_varrun"));
        assert!(!table.is_defined("_missing"));
    }

    #[test]
    fn test_expand_numeric() {
        let table = MacroTable::new()
            .with("with_foo", "1")
            .with("without_bar", "0")
            .with("answer", "yes")
            .with("count", "42abc");

        assert_eq!(table.expand_numeric("%{with_foo}"), 1);
        assert_eq!(table.expand_numeric("%{without_bar}"), 0);
        assert_eq!(table.expand_numeric("%{answer}"), 1);
        assert_eq!(table.expand_numeric("%{count}"), 42);
        assert_eq!(table.expand_numeric("%{?undefined}"), 0);
        assert_eq!(table.expand_numeric("%{undefined}"), 0);
        assert_eq!(table.expand_numeric("%{?with_foo:7}"), 7);
        assert_eq!(table.expand_numeric("%{?nope:7}"), 0);
        assert_eq!(table.expand_numeric("-3"), -3);
    }

    #[test]
    fn test_undefine() {
        let mut table = MacroTable::new().with("a", "1");
        table.undefine("a");
        assert!(table.is_empty());
    }
}
