//! Synonym groups used for lexical query expansion

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;

const DEFAULT_GROUPS: &[&[&str]] = &[
    &["what", "which"],
    &["how", "way"],
    &["create", "make", "build", "generate"],
    &["delete", "remove", "erase"],
    &["change", "modify", "update", "alter"],
    &["get", "fetch", "retrieve", "obtain"],
    &["find", "search", "locate", "lookup"],
    &["show", "display", "list"],
    &["explain", "describe", "clarify"],
    &["fix", "repair", "resolve"],
    &["error", "bug", "issue", "problem"],
    &["start", "begin", "launch"],
    &["stop", "end", "halt", "terminate"],
    &["big", "large", "huge"],
    &["small", "tiny", "little"],
    &["fast", "quick", "rapid"],
    &["use", "utilize", "employ"],
];

static DEFAULT_TABLE: Lazy<SynonymTable> = Lazy::new(|| SynonymTable::from_groups(DEFAULT_GROUPS));

/// Symmetric word -> synonyms lookup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynonymTable {
    synonyms: HashMap<String, BTreeSet<String>>,
}

impl SynonymTable {
    /// Table with no synonyms
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every word of a group becomes a synonym of every other word of it
    pub fn from_groups(groups: &[&[&str]]) -> Self {
        let mut table = Self::default();

        for group in groups {
            table.add_group(*group);
        }

        table
    }

    pub fn add_group<W: AsRef<str>>(&mut self, group: &[W]) {
        let words: Vec<String> = group.iter().map(|w| w.as_ref().to_lowercase()).collect();

        for word in &words {
            let entry = self.synonyms.entry(word.clone()).or_default();

            for other in &words {
                if other != word {
                    entry.insert(other.clone());
                }
            }
        }
    }

    pub fn synonyms(&self, word: &str) -> impl Iterator<Item = &str> {
        self.synonyms
            .get(word)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Tokens plus their synonyms, each term once, in first-seen order
    pub fn expand(&self, tokens: &[String]) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut expanded = Vec::new();

        for token in tokens {
            if seen.insert(token.clone()) {
                expanded.push(token.clone());
            }
        }

        for token in tokens {
            for synonym in self.synonyms(token) {
                if seen.insert(synonym.to_string()) {
                    expanded.push(synonym.to_string());
                }
            }
        }

        expanded
    }

    pub fn is_empty(&self) -> bool {
        self.synonyms.is_empty()
    }
}

/// Built-in table of common question-word and verb synonyms
pub fn default_synonyms() -> SynonymTable {
    DEFAULT_TABLE.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_are_symmetric() {
        let table = SynonymTable::from_groups(&[&["Fix", "repair"]]);

        assert_eq!(table.synonyms("fix").collect::<Vec<_>>(), vec!["repair"]);
        assert_eq!(table.synonyms("repair").collect::<Vec<_>>(), vec!["fix"]);
        assert_eq!(table.synonyms("mend").count(), 0);
    }

    #[test]
    fn test_expand_deduplicates() {
        let table = default_synonyms();
        let tokens = vec!["fix".to_string(), "bug".to_string(), "fix".to_string()];

        let expanded = table.expand(&tokens);

        assert_eq!(&expanded[..2], &["fix".to_string(), "bug".to_string()]);
        assert!(expanded.contains(&"repair".to_string()));
        assert!(expanded.contains(&"issue".to_string()));
        assert_eq!(
            expanded.len(),
            expanded.iter().collect::<BTreeSet<_>>().len()
        );
    }

    #[test]
    fn test_empty_table() {
        let table = SynonymTable::empty();
        assert!(table.is_empty());
        assert_eq!(table.expand(&["x".to_string()]), vec!["x".to_string()]);
    }
}
