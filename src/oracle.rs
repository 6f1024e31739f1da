//! External relatedness signal used to supervise weighting and to score
//! neighbour lists.

use crate::config::files_handling::{open_lines, ReadFile};
use crate::error::{GentsError, Result};

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::info;

/// Answer of a relatedness lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    Related,
    Unrelated,
    FirstMissing,
    SecondMissing,
    BothMissing,
}

impl Relation {
    /// Integer code used in output files: 1, 0, -1, -2, -3.
    pub fn code(&self) -> i32 {
        match self {
            Relation::Related => 1,
            Relation::Unrelated => 0,
            Relation::FirstMissing => -1,
            Relation::SecondMissing => -2,
            Relation::BothMissing => -3,
        }
    }

    pub fn is_related(&self) -> bool {
        matches!(self, Relation::Related)
    }
}

pub trait RelatednessOracle {
    fn exists(&self, word: &str) -> bool;
    fn relatedness(&self, first: &str, second: &str) -> Relation;
}

/// Synonym groups, one space separated group per line. Two words are related
/// iff some line holds both.
#[derive(Clone, Debug, Default)]
pub struct SynonymGroups {
    // word -> lines it appears on
    groups: HashMap<String, BTreeSet<usize>>,
    lines: usize,
}

impl SynonymGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group<'a>(&mut self, words: impl IntoIterator<Item = &'a str>) {
        for word in words {
            self.groups.entry(word.to_string()).or_default().insert(self.lines);
        }
        self.lines += 1;
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl ReadFile for SynonymGroups {
    fn read_file(file_path: &Path) -> Result<Self> {
        let mut oracle = Self::new();
        for line in open_lines(file_path)? {
            let line = line.map_err(|e| GentsError::read(file_path, e))?;
            oracle.add_group(line.split_whitespace());
        }
        info!("{}: {} words in {} groups", file_path.display(), oracle.len(), oracle.lines);
        Ok(oracle)
    }
}

impl RelatednessOracle for SynonymGroups {
    fn exists(&self, word: &str) -> bool {
        self.groups.contains_key(word)
    }

    fn relatedness(&self, first: &str, second: &str) -> Relation {
        match (self.groups.get(first), self.groups.get(second)) {
            (Some(a), Some(b)) => {
                if a.intersection(b).next().is_some() {
                    Relation::Related
                } else {
                    Relation::Unrelated
                }
            }
            (Some(_), None) => Relation::SecondMissing,
            (None, Some(_)) => Relation::FirstMissing,
            (None, None) => Relation::BothMissing,
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::config::files_handling::read_input;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn shared_line_means_related() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("synonyms.txt");
        fs::write(&path, "cat feline\ndog hound canine\nfeline lynx\n").unwrap();

        let oracle: SynonymGroups = read_input(&path).unwrap();
        assert_eq!(oracle.len(), 6);
        assert_eq!(oracle.relatedness("cat", "feline"), Relation::Related);
        assert_eq!(oracle.relatedness("lynx", "feline"), Relation::Related);
        assert_eq!(oracle.relatedness("cat", "lynx"), Relation::Unrelated);
        assert_eq!(oracle.relatedness("cat", "dog").code(), 0);
    }

    #[test]
    fn missing_words_have_their_own_codes() {
        let mut oracle = SynonymGroups::new();
        oracle.add_group(["cat", "feline"]);
        oracle.add_group(["dog", "hound"]);

        assert!(oracle.exists("hound"));
        assert!(!oracle.exists("tree"));
        assert_eq!(oracle.relatedness("tree", "cat"), Relation::FirstMissing);
        assert_eq!(oracle.relatedness("cat", "tree"), Relation::SecondMissing);
        assert_eq!(oracle.relatedness("tree", "bush"), Relation::BothMissing);
        assert_eq!(Relation::BothMissing.code(), -3);
        assert!(!oracle.relatedness("cat", "dog").is_related());
        assert!(oracle.relatedness("dog", "hound").is_related());
    }
}
