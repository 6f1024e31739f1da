//! Turns one corpus line into the `(word, context)` pairs the builder counts.

use crate::error::GentsError;

use std::fmt::Display;
use std::str::FromStr;

/// Lexical category of the words that become matrix rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pos {
    Noun,
    Verb,
    Adjective,
}

impl Pos {
    pub fn tag(&self) -> &'static str {
        match self {
            Pos::Noun => "N",
            Pos::Verb => "V",
            Pos::Adjective => "A",
        }
    }
}

impl FromStr for Pos {
    type Err = GentsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "N" => Ok(Pos::Noun),
            "V" => Ok(Pos::Verb),
            "A" => Ok(Pos::Adjective),
            _ => Err(GentsError::UnknownPos(s.to_string())),
        }
    }
}

impl Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Defines how a line of corpus text yields co-occurrence pairs.
pub trait PairExtractor {
    /// Appends every valid `(word, context)` pair found in `line` to `pairs`.
    /// Lines that do not fit the format yield nothing.
    fn extract(&self, line: &str, pairs: &mut Vec<(String, String)>);
}

fn is_lower_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase())
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic())
}

/// Dependency triples, one per line: `head<TAB>relation<TAB>dependent`, e.g.
///
/// ```text
/// be          VBE:pred:N  philosophy
/// philosophy  N:subj:N    anarchism
/// ```
///
/// A head of the requested category gets the context `relation:dependent`, a
/// dependent of that category gets the reversed context `a:b-R:c:head`.
#[derive(Clone, Debug)]
pub struct DependencyTriples {
    pos: Pos,
}

impl DependencyTriples {
    pub fn new(pos: Pos) -> Self {
        Self { pos }
    }
}

impl PairExtractor for DependencyTriples {
    fn extract(&self, line: &str, pairs: &mut Vec<(String, String)>) {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() != 3 {
            return;
        }
        let (head, relation, dependent) = (parts[0], parts[1], parts[2]);
        let tag = self.pos.tag();

        if relation.starts_with(&format!("{}:", tag)) && is_lower_word(head) && is_word(dependent) {
            pairs.push((head.to_string(), format!("{}:{}", relation, dependent)));
        }

        if relation.ends_with(&format!(":{}", tag)) && is_word(head) && is_lower_word(dependent) {
            let bits: Vec<&str> = relation.split(':').collect();
            if bits.len() >= 3 {
                pairs.push((dependent.to_string(), format!("{}:{}-R:{}:{}", bits[0], bits[1], bits[2], head)));
            }
        }
    }
}

/// POS-tagged running text (`word_TAG` tokens separated by whitespace) with a
/// symmetric window around each target. Only English Penn tag prefixes are
/// mapped.
#[derive(Clone, Debug)]
pub struct TaggedWindow {
    pos: Pos,
    // window size minus the target itself
    reach: usize,
}

impl TaggedWindow {
    pub fn new(pos: Pos, window: usize) -> Self {
        Self {
            pos,
            reach: window.saturating_sub(1),
        }
    }

    // "dogs_NNS" -> Some(("dogs", 'N'))
    fn map_token(token: &str) -> Option<(&str, char)> {
        let (word, tag) = token.rsplit_once('_')?;
        let coarse = if tag.starts_with("NN") {
            'N'
        } else if tag.starts_with("VB") {
            'V'
        } else if tag.starts_with("JJ") {
            'A'
        } else if tag.starts_with("RB") {
            'R'
        } else {
            return None;
        };
        Some((word, coarse))
    }

    fn is_target(&self, word: &str, coarse: char) -> bool {
        let wanted = match self.pos {
            Pos::Noun => 'N',
            Pos::Verb => 'V',
            Pos::Adjective => 'A',
        };
        coarse == wanted && !word.is_empty() && word.chars().all(char::is_lowercase)
    }

    fn is_context(&self, word: &str, coarse: char) -> bool {
        let allowed: &[char] = match self.pos {
            Pos::Noun => &['V', 'A', 'N'],
            Pos::Verb | Pos::Adjective => &['R', 'N'],
        };
        allowed.contains(&coarse) && !word.is_empty() && word.chars().all(char::is_alphabetic)
    }
}

impl PairExtractor for TaggedWindow {
    fn extract(&self, line: &str, pairs: &mut Vec<(String, String)>) {
        // sentence-initial capital
        let mut chars = line.chars();
        let line = match chars.next() {
            Some(first) => first.to_lowercase().chain(chars).collect::<String>(),
            None => return,
        };

        let tokens: Vec<Option<(&str, char)>> = line.split_whitespace().map(Self::map_token).collect();
        for (target, token) in tokens.iter().enumerate() {
            let word = match token {
                Some((word, coarse)) if self.is_target(word, *coarse) => *word,
                _ => continue,
            };

            let start = target.saturating_sub(self.reach);
            let end = (target + self.reach).min(tokens.len());
            for neighbour in start..end {
                if neighbour == target {
                    continue;
                }
                if let Some((context, context_pos)) = tokens[neighbour] {
                    if self.is_context(context, context_pos) {
                        pairs.push((word.to_string(), format!("{}_{}", context.to_lowercase(), context_pos)));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn run(extractor: &dyn PairExtractor, line: &str) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        extractor.extract(line, &mut pairs);
        pairs
    }

    fn pair(word: &str, context: &str) -> (String, String) {
        (word.to_string(), context.to_string())
    }

    #[test]
    fn triples_forward_and_reverse() {
        let nouns = DependencyTriples::new(Pos::Noun);

        assert_eq!(run(&nouns, "be\tVBE:pred:N\tphilosophy"), vec![pair("philosophy", "VBE:pred-R:N:be")]);
        assert_eq!(
            run(&nouns, "philosophy\tN:subj:N\tanarchism"),
            vec![pair("philosophy", "N:subj:N:anarchism"), pair("anarchism", "N:subj-R:N:philosophy")]
        );
    }

    #[test]
    fn triples_reject_dirty_tokens() {
        let nouns = DependencyTriples::new(Pos::Noun);
        assert!(run(&nouns, "Philosophy\tN:subj:V\tanarchism").is_empty());
        assert!(run(&nouns, "war2\tN:mod:A\tcold").is_empty());
        assert!(run(&nouns, "be\tVBE:pred:N\tnew york").is_empty());
        assert!(run(&nouns, "only two\tfields").is_empty());
        assert!(run(&nouns, "").is_empty());
        // capitalised dependent is still a fine context
        assert_eq!(run(&nouns, "city\tN:nn:N\tParis").len(), 1);
    }

    #[test]
    fn triples_respect_category() {
        let verbs = DependencyTriples::new(Pos::Verb);
        assert!(run(&verbs, "philosophy\tN:subj:N\tanarchism").is_empty());
        assert_eq!(run(&verbs, "eat\tV:obj:N\tapple"), vec![pair("eat", "V:obj:N:apple")]);
    }

    #[test]
    fn tagged_window_pairs() {
        let nouns = TaggedWindow::new(Pos::Noun, 3);
        let pairs = run(&nouns, "The_DT Big_JJ dog_NN barked_VBD loudly_RB");
        assert_eq!(pairs, vec![pair("dog", "big_A"), pair("dog", "barked_V")]);
    }

    #[test]
    fn tagged_window_lowercases_first_character() {
        let nouns = TaggedWindow::new(Pos::Noun, 3);
        let pairs = run(&nouns, "Dogs_NNS bark_VBP");
        assert_eq!(pairs, vec![pair("dogs", "bark_V")]);
    }

    #[test]
    fn pos_parses() {
        assert_eq!("N".parse::<Pos>().unwrap(), Pos::Noun);
        assert!("X".parse::<Pos>().is_err());
    }
}
