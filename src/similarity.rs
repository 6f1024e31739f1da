
use crate::config::files_handling::read_input;
use crate::error::Result;
use crate::sparse::{read_matrix, Orientation, SparseRow};

use rayon::{prelude::*, ThreadPoolBuilder};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use tracing::{info, warn};

/// Sparse row with its euclidean norm, fixed at construction.
#[derive(Clone, Debug, Default)]
pub struct SparseVector {
    features: BTreeMap<usize, f32>,
    norm: f32,
}

impl SparseVector {
    pub fn new(features: BTreeMap<usize, f32>) -> Self {
        let norm = features.values().map(|v| v * v).sum::<f32>().sqrt();
        Self { features, norm }
    }

    pub fn norm(&self) -> f32 {
        self.norm
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Walks the shorter vector and probes the longer one.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (short, long) = if self.len() <= other.len() { (self, other) } else { (other, self) };
        short
            .features
            .iter()
            .filter_map(|(k, v)| long.features.get(k).map(|w| v * w))
            .sum()
    }

    /// Cosine similarity; 0 when either vector is all zeros.
    pub fn cosine(&self, other: &SparseVector) -> f32 {
        let denominator = self.norm * other.norm;
        if denominator == 0.0 {
            return 0.0;
        }
        self.dot(other) / denominator
    }
}

impl From<&SparseRow> for SparseVector {
    fn from(row: &SparseRow) -> Self {
        Self::new(row.iter().map(|(k, v)| (*k, *v as f32)).collect())
    }
}

/// Which word of a pair is not in the matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Missing {
    First,
    Second,
    Both,
}

impl Missing {
    /// Score written to output files in place of a similarity.
    pub fn sentinel(&self) -> f32 {
        match self {
            Missing::First => -1.0,
            Missing::Second => -2.0,
            Missing::Both => -3.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Neighbour {
    pub word: String,
    pub score: f32,
}

impl Display for Neighbour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.word, self.score)
    }
}

/// Joins a neighbour list as `w1 (s1), w2 (s2), ...`.
pub fn format_neighbours(neighbours: &[Neighbour]) -> String {
    neighbours.iter().map(|n| n.to_string()).collect::<Vec<String>>().join(", ")
}

/// Read-only cosine similarity over the rows of a matrix.
pub struct Similarity {
    // label -> row id, iterated in label order
    t2i: BTreeMap<String, usize>,
    rows: Vec<SparseVector>,
}

impl Similarity {

    pub fn new(labels: Vec<String>, matrix: &[SparseRow]) -> Similarity {

        let mut rows: Vec<SparseVector> = matrix.iter().map(SparseVector::from).collect();
        if rows.len() < labels.len() {
            warn!("{} labels but only {} rows, padding with empty rows", labels.len(), rows.len());
            rows.resize_with(labels.len(), SparseVector::default);
        }

        let mut t2i = BTreeMap::new();
        for (i, label) in labels.into_iter().enumerate() {
            t2i.insert(label, i);
        }

        Self { t2i, rows }
    }

    /// Loads a label file (line order is the row id) and a row-major matrix.
    pub fn load(label_path: &Path, matrix_path: &Path) -> Result<Similarity> {
        let labels: Vec<String> = read_input(label_path)?;
        let (header, matrix) = read_matrix(matrix_path, Orientation::RowMajor)?;
        info!("loaded {} labels and a {} x {} matrix with {} entries", labels.len(), header.rows, header.cols, header.nnz);
        Ok(Self::new(labels, &matrix))
    }

    pub fn len(&self) -> usize {
        self.t2i.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t2i.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.t2i.contains_key(word)
    }

    fn vector(&self, word: &str) -> Option<&SparseVector> {
        self.t2i.get(word).and_then(|i| self.rows.get(*i))
    }

    pub fn pairwise(&self, first: &str, second: &str) -> std::result::Result<f32, Missing> {
        match (self.vector(first), self.vector(second)) {
            (Some(a), Some(b)) => Ok(a.cosine(b)),
            (None, Some(_)) => Err(Missing::First),
            (Some(_), None) => Err(Missing::Second),
            (None, None) => Err(Missing::Both),
        }
    }

    /// The `k` most similar other words, best first, `None` for an unknown
    /// word. Only positive scores make the list; among equal scores the
    /// alphabetically first word ranks higher.
    pub fn top_k(&self, word: &str, k: usize) -> Option<Vec<Neighbour>> {
        let query_id = *self.t2i.get(word)?;
        let query = self.rows.get(query_id)?;

        // the list never outgrows the candidates, whatever k asks for
        let mut best: Vec<Neighbour> = Vec::with_capacity(k.min(self.rows.len()).saturating_add(1));
        for (candidate, id) in &self.t2i {
            if *id == query_id {
                continue;
            }
            let score = match self.rows.get(*id) {
                Some(row) => query.cosine(row),
                None => continue,
            };
            if score.is_nan() || score <= 0.0 {
                continue;
            }
            let position = best.iter().position(|n| n.score < score).unwrap_or(best.len());
            if position < k {
                best.insert(position, Neighbour { word: candidate.clone(), score });
                best.truncate(k);
            }
        }
        Some(best)
    }

    /// Runs [`Similarity::top_k`] for every word on `threads` workers. Result
    /// slots follow the order of `words`; unknown words leave theirs `None`.
    pub fn batch_top_k(&self, words: &[String], k: usize, threads: usize) -> Result<Vec<Option<Vec<Neighbour>>>> {
        let pool = ThreadPoolBuilder::new().num_threads(threads).build()?;
        let results = pool.install(|| {
            words
                .par_iter()
                .map(|word| {
                    let neighbours = self.top_k(word, k);
                    if neighbours.is_none() {
                        warn!("{} is not in the matrix", word);
                    }
                    neighbours
                })
                .collect()
        });
        Ok(results)
    }
}


#[cfg(test)]
mod tests {

    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn pets() -> Similarity {
        let labels = vec!["cat".to_string(), "dog".to_string(), "tree".to_string()];
        let matrix = vec![vec![(0, 1.0), (1, 2.0)], vec![(0, 1.0), (1, 1.0)], vec![(2, 5.0)]];
        Similarity::new(labels, &matrix)
    }

    #[test]
    fn cosine_scenario() {
        let sim = pets();
        let score = sim.pairwise("cat", "dog").unwrap();
        assert!((score - 3.0 / (5.0f32.sqrt() * 2.0f32.sqrt())).abs() < 1e-6);
        assert!((score - 0.9487).abs() < 1e-4);
        assert_eq!(sim.pairwise("cat", "tree").unwrap(), 0.0);
    }

    #[test]
    fn pairwise_is_symmetric_and_bounded() {
        let sim = pets();
        for a in ["cat", "dog", "tree"] {
            let own = sim.pairwise(a, a).unwrap();
            assert!((own - 1.0).abs() < 1e-6);
            for b in ["cat", "dog", "tree"] {
                let ab = sim.pairwise(a, b).unwrap();
                assert_eq!(ab, sim.pairwise(b, a).unwrap());
                assert!((0.0..=1.0 + 1e-6).contains(&ab));
            }
        }
    }

    #[test]
    fn missing_words() {
        let sim = pets();
        assert_eq!(sim.pairwise("bird", "cat"), Err(Missing::First));
        assert_eq!(sim.pairwise("cat", "bird"), Err(Missing::Second));
        assert_eq!(sim.pairwise("bird", "fish"), Err(Missing::Both));
        assert_eq!(Missing::Both.sentinel(), -3.0);
        assert!(sim.top_k("bird", 3).is_none());
    }

    #[test]
    fn empty_rows_score_zero() {
        let sim = Similarity::new(vec!["a".to_string(), "b".to_string()], &[vec![(0, 1.0)]]);
        assert_eq!(sim.pairwise("a", "b"), Ok(0.0));
        assert_eq!(sim.pairwise("b", "b"), Ok(0.0));
    }

    #[test]
    fn top_k_keeps_positive_scores_only() {
        let sim = pets();
        let neighbours = sim.top_k("cat", 5).unwrap();
        assert_eq!(neighbours.len(), 1);
        assert_eq!(neighbours[0].word, "dog");
        assert!(sim.top_k("cat", 0).unwrap().is_empty());
        assert!(sim.top_k("tree", 2).unwrap().is_empty());
    }

    #[test]
    fn top_k_beyond_the_lexicon_returns_everything() {
        let sim = pets();
        for k in [4, 1usize << 60, usize::MAX] {
            let neighbours = sim.top_k("cat", k).unwrap();
            assert_eq!(neighbours.len(), 1);
            assert_eq!(neighbours[0].word, "dog");
        }

        let words: Vec<String> = ["cat", "dog"].iter().map(|s| s.to_string()).collect();
        let results = sim.batch_top_k(&words, usize::MAX, 2).unwrap();
        assert_eq!(results[1].as_ref().unwrap()[0].word, "cat");
    }

    #[test]
    fn top_k_orders_by_score_then_label() {
        let labels: Vec<String> = ["query", "zeta", "alpha", "mid", "low"].iter().map(|s| s.to_string()).collect();
        let matrix = vec![
            vec![(0, 1.0)],
            vec![(0, 1.0)],
            vec![(0, 1.0)],
            vec![(0, 1.0), (1, 1.0)],
            vec![(0, 1.0), (1, 3.0)],
        ];
        let sim = Similarity::new(labels, &matrix);

        let top: Vec<String> = sim.top_k("query", 3).unwrap().into_iter().map(|n| n.word).collect();
        assert_eq!(top, vec!["alpha", "zeta", "mid"]);

        let all = sim.top_k("query", 10).unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(all[3].word, "low");
    }

    #[test]
    fn batch_keeps_submission_order() {
        let sim = pets();
        let words: Vec<String> = ["dog", "bird", "cat", "tree"].iter().map(|s| s.to_string()).collect();
        let results = sim.batch_top_k(&words, 2, 3).unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().unwrap()[0].word, "cat");
        assert!(results[1].is_none());
        assert_eq!(results[2].as_ref().unwrap()[0].word, "dog");
        assert!(results[3].as_ref().unwrap().is_empty());
        for (word, result) in words.iter().zip(&results) {
            assert_eq!(result, &sim.top_k(word, 2));
        }
    }

    #[test]
    fn loads_from_files() {
        let dir = tempdir().unwrap();
        let labels = dir.path().join("m.rlabel");
        let matrix = dir.path().join("matrix_crs.mat");
        fs::write(&labels, "cat\ndog\ntree\n").unwrap();
        fs::write(&matrix, "3 3 5\n0 1 1 2\n0 1 1 1\n2 5\n").unwrap();

        let sim = Similarity::load(&labels, &matrix).unwrap();
        assert_eq!(sim.len(), 3);
        assert_eq!(sim.pairwise("cat", "dog").unwrap(), pets().pairwise("cat", "dog").unwrap());
        assert_eq!(
            format_neighbours(&sim.top_k("dog", 2).unwrap()),
            format!("cat ({})", sim.pairwise("dog", "cat").unwrap())
        );
    }
}
