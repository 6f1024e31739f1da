//! Term <-> id dictionaries filled while scanning the corpus.

use std::collections::{BTreeSet, HashMap};

/// One namespace of ids (words or contexts). Ids are handed out on first
/// sight, dense from 0, and never reused.
#[derive(Debug, Default, Clone)]
pub struct Lexicon {
    term2id: HashMap<String, usize>,
    id2term: Vec<String>,
    occurrences: Vec<u64>,
    // distinct ids from the other namespace this term was seen with
    partners: Vec<BTreeSet<usize>>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `term`, assigning the next free one if it is new.
    pub fn get_or_insert(&mut self, term: &str) -> usize {
        if let Some(id) = self.term2id.get(term) {
            return *id;
        }
        let id = self.id2term.len();
        self.term2id.insert(term.to_owned(), id);
        self.id2term.push(term.to_owned());
        self.occurrences.push(0);
        self.partners.push(BTreeSet::new());
        id
    }

    /// Records one occurrence of `id` alongside `partner`.
    pub fn observe(&mut self, id: usize, partner: usize) {
        self.occurrences[id] += 1;
        self.partners[id].insert(partner);
    }

    pub fn id(&self, term: &str) -> Option<usize> {
        self.term2id.get(term).copied()
    }

    pub fn term(&self, id: usize) -> Option<&str> {
        self.id2term.get(id).map(String::as_str)
    }

    pub fn occurrences(&self, id: usize) -> u64 {
        self.occurrences.get(id).copied().unwrap_or(0)
    }

    pub fn distinct_partners(&self, id: usize) -> usize {
        self.partners.get(id).map_or(0, BTreeSet::len)
    }

    pub fn len(&self) -> usize {
        self.id2term.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id2term.is_empty()
    }

    /// `(term, id)` pairs in lexicographic term order.
    pub fn sorted_terms(&self) -> Vec<(&str, usize)> {
        let mut sorted: Vec<(&str, usize)> = self
            .id2term
            .iter()
            .enumerate()
            .map(|(id, term)| (term.as_str(), id))
            .collect();
        sorted.sort_unstable();
        sorted
    }
}

/// Compaction of original ids to the contiguous ids of the survivors.
#[derive(Debug, Clone)]
pub struct IndexMap {
    origin_to_compact: Vec<Option<usize>>,
    compact_to_origin: Vec<usize>,
}

impl IndexMap {
    /// Keeps every term whose distinct-partner count reaches `min_partners`,
    /// numbering survivors in lexicographic order of their labels.
    pub fn by_partner_count(lexicon: &Lexicon, min_partners: usize) -> Self {
        let mut origin_to_compact = vec![None; lexicon.len()];
        let mut compact_to_origin = Vec::new();
        for (_, id) in lexicon.sorted_terms() {
            if lexicon.distinct_partners(id) >= min_partners {
                origin_to_compact[id] = Some(compact_to_origin.len());
                compact_to_origin.push(id);
            }
        }
        Self {
            origin_to_compact,
            compact_to_origin,
        }
    }

    pub fn compact(&self, origin: usize) -> Option<usize> {
        self.origin_to_compact.get(origin).copied().flatten()
    }

    pub fn origin(&self, compact: usize) -> Option<usize> {
        self.compact_to_origin.get(compact).copied()
    }

    /// Number of survivors.
    pub fn len(&self) -> usize {
        self.compact_to_origin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compact_to_origin.is_empty()
    }

    /// Original ids of the survivors in compact order.
    pub fn survivors(&self) -> &[usize] {
        &self.compact_to_origin
    }
}
