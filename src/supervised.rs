//! Supervised weighting: columns (or relation groups of columns) are scored
//! by how well they separate related training pairs from unrelated ones.

use crate::association::{ContingencyTable, Measure};
use crate::config::files_handling::save_output;
use crate::config::{FeatureRecord, Params, RelationGroup};
use crate::error::{GentsError, Result};
use crate::oracle::RelatednessOracle;
use crate::reweight::{apply_weights, suffixed, FeatureWeights};
use crate::sparse::{transpose_file, MatrixReader, SparseRow};

use std::collections::{BTreeMap, HashSet};
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Matrix rows seen through the oracle.
#[derive(Clone, Debug)]
pub struct TrainingSet {
    words: Vec<String>,
    tf: Vec<f64>,
    eligible: Vec<bool>,
    legit: f64,
    // row id -> ids of related eligible rows, both directions stored
    related: Vec<HashSet<usize>>,
}

impl TrainingSet {
    /// A row is a training word iff the oracle knows it and it is not exempt.
    /// Every unordered pair of training words is put to the oracle once.
    pub fn new(rows: &[FeatureRecord], oracle: &dyn RelatednessOracle, exempt: &HashSet<String>, progress_every: usize) -> Self {
        let words: Vec<String> = rows.iter().map(|r| r.label.clone()).collect();
        let tf: Vec<f64> = rows.iter().map(|r| r.tf).collect();
        let eligible: Vec<bool> = words
            .iter()
            .map(|w| !exempt.contains(w) && oracle.exists(w))
            .collect();
        let legit: f64 = tf.iter().zip(&eligible).filter(|(_, e)| **e).map(|(tf, _)| tf).sum();

        let training: Vec<usize> = (0..words.len()).filter(|i| eligible[*i]).collect();
        info!("unique training words: {}", training.len());
        info!("total words: {}", words.len());
        info!("occurrences of training words: {}", legit);

        let mut related = vec![HashSet::new(); words.len()];
        let mut unique_pairs: u64 = 0;
        for (n, &i) in training.iter().enumerate() {
            for &j in &training[n + 1..] {
                unique_pairs += 1;
                if oracle.relatedness(&words[i], &words[j]).is_related() {
                    related[i].insert(j);
                    related[j].insert(i);
                }
            }
            if progress_every > 0 && (n + 1) % progress_every == 0 {
                info!("pairs: {} training words done", n + 1);
            }
        }
        info!("unique pairs: {}", unique_pairs);

        Self {
            words,
            tf,
            eligible,
            legit,
            related,
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn is_eligible(&self, row: usize) -> bool {
        self.eligible.get(row).copied().unwrap_or(false)
    }

    /// Summed term frequency of the training words.
    pub fn legit(&self) -> f64 {
        self.legit
    }

    pub fn are_related(&self, first: usize, second: usize) -> bool {
        self.related.get(first).map_or(false, |r| r.contains(&second))
    }

    /// Pair counts of one column, `None` when fewer than `min_words` training
    /// words occur in it.
    pub fn column_counts(&self, column: &[(usize, f64)], min_words: usize) -> Option<PairCounts> {
        // ordered, so the float sums come out the same on every run
        let in_column: BTreeMap<usize, f64> = column
            .iter()
            .filter(|(row, _)| self.is_eligible(*row))
            .map(|(row, value)| (*row, *value))
            .collect();
        if in_column.len() < min_words {
            return None;
        }

        let mut counts = PairCounts::default();
        for (&first, &first_value) in &in_column {
            for (&second, &second_value) in &in_column {
                if first == second {
                    continue;
                }
                if self.are_related(first, second) {
                    counts.related_sharing += first_value * second_value;
                } else {
                    counts.unrelated_sharing += first_value * second_value;
                }
            }
            for &partner in &self.related[first] {
                if !in_column.contains_key(&partner) {
                    counts.related_not_sharing += first_value * self.tf[partner];
                }
            }
        }

        let values: f64 = in_column.values().sum();
        let tf_in_column: f64 = in_column.keys().map(|row| self.tf[*row]).sum();
        counts.not_sharing = values * (self.legit - tf_in_column);
        Some(counts)
    }
}

/// Weighted pair counts of one column or group of columns.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PairCounts {
    pub related_sharing: f64,
    pub unrelated_sharing: f64,
    pub related_not_sharing: f64,
    /// All training pairs with exactly one word in the column.
    pub not_sharing: f64,
}

impl PairCounts {
    pub fn to_table(&self) -> ContingencyTable {
        ContingencyTable::new(
            self.related_sharing,
            self.related_not_sharing,
            self.unrelated_sharing,
            self.not_sharing - self.related_not_sharing,
        )
    }
}

impl AddAssign for PairCounts {
    fn add_assign(&mut self, other: Self) {
        self.related_sharing += other.related_sharing;
        self.unrelated_sharing += other.unrelated_sharing;
        self.related_not_sharing += other.related_not_sharing;
        self.not_sharing += other.not_sharing;
    }
}

/// What one score is computed over.
#[derive(Clone, Debug)]
pub enum Supervision {
    /// Every column on its own.
    Context,
    /// One shared score per contiguous relation group.
    Relation(Vec<RelationGroup>),
}

impl Supervision {
    pub fn tag(&self) -> char {
        match self {
            Supervision::Context => 'c',
            Supervision::Relation(_) => 'r',
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Supervision::Context => "context",
            Supervision::Relation(_) => "relation",
        }
    }

    /// `columns_<kind>_<measure>.txt`.
    pub fn weight_file_name(&self, measure: Measure) -> String {
        format!("columns_{}_{}.txt", self.kind(), measure)
    }

    /// Turns per-column counts into unnormalised weights.
    pub fn score(&self, counts: &[Option<PairCounts>], measure: Measure) -> FeatureWeights {
        let mut weights = FeatureWeights::new(counts.len());
        match self {
            Supervision::Context => {
                for (column, column_counts) in counts.iter().enumerate() {
                    if let Some(c) = column_counts {
                        let table = c.to_table();
                        let score = table.score(measure);
                        report(&column.to_string(), &table, score);
                        weights.set(column, score);
                    }
                }
            }
            Supervision::Relation(groups) => {
                for group in groups {
                    let columns = group.start.min(counts.len())..group.end.min(counts.len());
                    let mut summed = PairCounts::default();
                    for c in counts[columns.clone()].iter().flatten() {
                        summed += *c;
                    }
                    if summed == PairCounts::default() {
                        debug!("relation {} ({:?}) has no training pairs", group.relation, columns);
                        continue;
                    }
                    let table = summed.to_table();
                    let score = table.score(measure);
                    report(&group.relation, &table, score);
                    for column in columns {
                        weights.set(column, score);
                    }
                }
            }
        }
        weights
    }
}

fn report(feature: &str, table: &ContingencyTable, score: f64) {
    if score.is_finite() {
        debug!("feature {}: {} -> {}", feature, table, score);
    } else {
        error!("error at feature {}: {} -> {}", feature, table, score);
    }
}

/// Files written by a supervised pass.
#[derive(Clone, Debug)]
pub struct SupervisedOutput {
    pub rows: PathBuf,
    pub columns: PathBuf,
    pub weights: PathBuf,
    pub trained_features: usize,
}

/// Scores every column of the column-major file at `col_path`, normalises
/// the weights, stores them next to that file and rewrites both matrices as
/// `<file>.{c,r}-<measure>`.
pub fn weight_supervised(
    training: &TrainingSet,
    supervision: &Supervision,
    measure: Measure,
    row_path: &Path,
    col_path: &Path,
    params: &Params,
) -> Result<SupervisedOutput> {
    info!("association measure: {}, {} supervision", measure, supervision.kind());

    let reader = MatrixReader::open(col_path)?;
    let cols = reader.header().cols;
    let mut counts: Vec<Option<PairCounts>> = Vec::with_capacity(cols);
    for (i, column) in reader.enumerate() {
        let column: SparseRow = column?;
        counts.push(training.column_counts(&column, params.min_training_words));
        if params.progress_every > 0 && (i + 1) % params.progress_every == 0 {
            info!("features processed: {}", i + 1);
        }
    }
    counts.resize(cols, None);
    let trained_features = counts.iter().filter(|c| c.is_some()).count();
    info!("features included: {}", trained_features);

    let mut weights = supervision.score(&counts, measure);
    weights.normalize(measure)?;

    let weight_dir = col_path.parent().unwrap_or_else(|| Path::new("."));
    let weight_path = save_output(weight_dir, &supervision.weight_file_name(measure), weights.as_array())?;
    info!("wrote {}", weight_path.display());

    let new_rows = suffixed(row_path, supervision.tag(), measure);
    let new_cols = suffixed(col_path, supervision.tag(), measure);
    apply_weights(row_path, &new_rows, &weights, params.supervised_keep, params.progress_every)?;
    transpose_file(&new_rows, &new_cols, params.progress_every)?;

    Ok(SupervisedOutput {
        rows: new_rows,
        columns: new_cols,
        weights: weight_path,
        trained_features,
    })
}

/// The row feature file must describe exactly the rows of the matrix.
pub fn check_rows(features: &[FeatureRecord], rows: usize, path: &Path) -> Result<()> {
    if features.len() != rows {
        return Err(GentsError::Config {
            reason: format!("{} lists {} words but the matrix has {} rows", path.display(), features.len(), rows),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::oracle::SynonymGroups;
    use crate::sparse::{read_matrix, Orientation};
    use std::fs;
    use tempfile::tempdir;

    fn record(label: &str, tf: f64) -> FeatureRecord {
        FeatureRecord {
            label: label.to_string(),
            nz: 1,
            tf,
            entropy: 0.0,
        }
    }

    fn oracle() -> SynonymGroups {
        let mut oracle = SynonymGroups::new();
        oracle.add_group(["cat", "feline"]);
        oracle.add_group(["dog", "hound"]);
        oracle
    }

    // cat 0, feline 1, dog 2, hound 3, tree 4 (unknown to the oracle)
    fn rows() -> Vec<FeatureRecord> {
        vec![record("cat", 3.0), record("feline", 2.0), record("dog", 4.0), record("hound", 5.0), record("tree", 6.0)]
    }

    #[test]
    fn training_words_and_pairs() {
        let training = TrainingSet::new(&rows(), &oracle(), &HashSet::new(), 0);
        assert_eq!(training.legit(), 14.0);
        assert!(!training.is_eligible(4));
        assert!(training.are_related(0, 1) && training.are_related(1, 0));
        assert!(!training.are_related(0, 2));

        let exempt: HashSet<String> = ["dog".to_string()].into_iter().collect();
        let held_out = TrainingSet::new(&rows(), &oracle(), &exempt, 0);
        assert_eq!(held_out.legit(), 10.0);
        assert!(!held_out.is_eligible(2));
        assert!(!held_out.are_related(3, 2));
    }

    #[test]
    fn pair_counts_by_hand() {
        let training = TrainingSet::new(&rows(), &oracle(), &HashSet::new(), 0);
        let column = vec![(0, 1.0), (1, 2.0), (2, 1.0), (4, 7.0)];

        let counts = training.column_counts(&column, 2).unwrap();
        // cat-feline both ways
        assert_eq!(counts.related_sharing, 4.0);
        // cat-dog, feline-dog both ways
        assert_eq!(counts.unrelated_sharing, 6.0);
        // dog's partner hound is missing: 1 * tf(hound)
        assert_eq!(counts.related_not_sharing, 5.0);
        // (1 + 2 + 1) * (14 - 9)
        assert_eq!(counts.not_sharing, 20.0);

        let table = counts.to_table();
        assert_eq!(table.true_positive(), 4.0);
        assert_eq!(table.false_negative(), 5.0);
        assert_eq!(table.false_positive(), 6.0);
        assert_eq!(table.true_negative(), 15.0);
    }

    #[test]
    fn pair_counts_ignore_cell_order() {
        let training = TrainingSet::new(&rows(), &oracle(), &HashSet::new(), 0);
        let column = vec![(0, 0.1), (1, 0.7), (2, 0.3), (3, 1.9)];
        let reversed: Vec<(usize, f64)> = column.iter().rev().copied().collect();

        let expected = training.column_counts(&column, 2).unwrap();
        for _ in 0..10 {
            let counts = training.column_counts(&reversed, 2).unwrap();
            assert_eq!(counts.related_sharing.to_bits(), expected.related_sharing.to_bits());
            assert_eq!(counts.unrelated_sharing.to_bits(), expected.unrelated_sharing.to_bits());
            assert_eq!(counts.related_not_sharing.to_bits(), expected.related_not_sharing.to_bits());
            assert_eq!(counts.not_sharing.to_bits(), expected.not_sharing.to_bits());
        }
    }

    #[test]
    fn columns_need_two_training_words() {
        let training = TrainingSet::new(&rows(), &oracle(), &HashSet::new(), 0);
        assert!(training.column_counts(&[(0, 1.0), (4, 3.0)], 2).is_none());
        assert!(training.column_counts(&[], 2).is_none());
    }

    #[test]
    fn relation_groups_share_one_score() {
        let first = PairCounts {
            related_sharing: 2.0,
            unrelated_sharing: 1.0,
            related_not_sharing: 1.0,
            not_sharing: 10.0,
        };
        let counts = vec![Some(first), Some(first), None, None];
        let groups = vec![
            RelationGroup { relation: "subj".to_string(), start: 0, end: 2 },
            RelationGroup { relation: "obj".to_string(), start: 2, end: 4 },
        ];

        let weights = Supervision::Relation(groups).score(&counts, Measure::Dice);
        let mut summed = first;
        summed += first;
        let expected = summed.to_table().score(Measure::Dice);
        assert_eq!(weights.weight(0), expected);
        assert_eq!(weights.weight(1), expected);
        // all-zero group is left untrained
        assert!(!weights.is_good(2) && !weights.is_good(3));

        let context = Supervision::Context.score(&counts, Measure::Dice);
        assert_eq!(context.weight(0), first.to_table().score(Measure::Dice));
        assert_eq!(context.good_count(), 2);
    }

    #[test]
    fn context_pass_writes_weights_and_matrices() {
        let dir = tempdir().unwrap();
        let crs = dir.path().join("matrix_crs.mat");
        let ccs = dir.path().join("matrix_ccs.mat");
        // column 0 holds cat and feline, column 1 holds cat and dog, column 2 only tree
        fs::write(&crs, "5 3 5\n0 1 1 1\n0 1\n1 1\n\n2 2\n").unwrap();
        transpose_file(&crs, &ccs, 0).unwrap();

        let training = TrainingSet::new(&rows(), &oracle(), &HashSet::new(), 0);
        let params = Params::default();
        let output = weight_supervised(&training, &Supervision::Context, Measure::Dice, &crs, &ccs, &params).unwrap();

        assert_eq!(output.trained_features, 2);
        assert_eq!(output.weights, dir.path().join("columns_context_Dice.txt"));
        assert!(dir.path().join("columns_context_Dice.npy").exists());
        assert_eq!(output.rows, dir.path().join("matrix_crs.mat.c-Dice"));

        let weights: Vec<f64> = fs::read_to_string(&output.weights)
            .unwrap()
            .lines()
            .map(|l| l.split(' ').nth(1).unwrap().parse().unwrap())
            .collect();
        assert_eq!(weights.len(), 3);
        // column 1 pairs two unrelated words, Dice is 0
        assert_eq!(weights[1], 0.0);
        // good scores 1 and 0 average to 0.5, the untrained column gets it
        assert_eq!(weights[0], 2.0);
        assert_eq!(weights[2], 0.5);

        let (header, rewritten) = read_matrix(&output.rows, Orientation::RowMajor).unwrap();
        assert_eq!(header.rows, 5);
        assert_eq!(rewritten[0], vec![(0, 2.0)]);
        assert!(rewritten[2].is_empty());
        assert_eq!(rewritten[4], vec![(2, 1.0)]);
    }
}
