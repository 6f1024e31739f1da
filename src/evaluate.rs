//! Scores a matrix by how early an oracle-related word shows up in the
//! neighbour lists of randomly drawn words, per term frequency bucket.

use crate::config::{EvaluationParams, FeatureRecord};
use crate::oracle::RelatednessOracle;
use crate::similarity::{Neighbour, Similarity};

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Display;
use tracing::{debug, info};

/// Average rank of the first related neighbour for one frequency, `None`
/// when no word has that frequency.
#[derive(Clone, Debug, PartialEq)]
pub struct BucketScore {
    pub frequency: usize,
    pub average: Option<f64>,
}

impl Display for BucketScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.average {
            Some(average) => write!(f, "{}\t{}", self.frequency, average),
            None => write!(f, "{}\tX", self.frequency),
        }
    }
}

pub struct Evaluation<'a> {
    similarity: &'a Similarity,
    oracle: &'a dyn RelatednessOracle,
    tf: HashMap<String, f64>,
    // term frequency -> words, only frequencies that occur
    buckets: BTreeMap<usize, Vec<String>>,
    params: EvaluationParams,
}

impl<'a> Evaluation<'a> {

    /// Buckets every row word the oracle knows by its integral term
    /// frequency, up to `params.max_frequency`. Stop words are left out.
    pub fn new(
        similarity: &'a Similarity,
        oracle: &'a dyn RelatednessOracle,
        rows: &[FeatureRecord],
        stop_words: &HashSet<String>,
        params: EvaluationParams,
    ) -> Self {
        let mut buckets: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for row in rows {
            if stop_words.contains(&row.label) || row.tf.fract() != 0.0 || row.tf > params.max_frequency as f64 {
                continue;
            }
            if oracle.exists(&row.label) {
                buckets.entry(row.tf as usize).or_default().push(row.label.clone());
            }
        }
        info!("{} candidate words over {} frequencies", buckets.values().map(Vec::len).sum::<usize>(), params.max_frequency);

        let tf = rows.iter().map(|r| (r.label.clone(), r.tf)).collect();
        Self {
            similarity,
            oracle,
            tf,
            buckets,
            params,
        }
    }

    pub fn bucket(&self, frequency: usize) -> &[String] {
        self.buckets.get(&frequency).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of neighbours at least as frequent as `word` that come before
    /// the first related one; the list size when there is none.
    pub fn first_related(&self, word: &str, word_tf: f64, neighbours: &[Neighbour]) -> usize {
        let mut counter = 0;
        for candidate in neighbours {
            let candidate_tf = self.tf.get(&candidate.word).copied().unwrap_or(0.0);
            if candidate_tf < word_tf {
                continue;
            }
            if self.oracle.relatedness(word, &candidate.word).is_related() {
                return counter;
            }
            counter += 1;
        }
        self.params.list_size
    }

    fn rank(&self, word: &str, word_tf: f64) -> usize {
        match self.similarity.top_k(word, self.params.list_size) {
            Some(neighbours) => self.first_related(word, word_tf, &neighbours),
            None => self.params.list_size,
        }
    }

    /// Draws `params.samples` words with replacement from every frequency
    /// bucket from 1 to `params.max_frequency`.
    pub fn run<R: Rng>(&self, rng: &mut R) -> Vec<BucketScore> {
        (1..=self.params.max_frequency)
            .map(|frequency| {
                let words = self.bucket(frequency);
                if words.is_empty() || self.params.samples == 0 {
                    return BucketScore { frequency, average: None };
                }
                let mut average = 0.0;
                for _ in 0..self.params.samples {
                    if let Some(word) = words.choose(rng) {
                        let rank = self.rank(word, frequency as f64);
                        debug!("{} (tf {}): first related at {}", word, frequency, rank);
                        average += rank as f64 / self.params.samples as f64;
                    }
                }
                info!("frequency {}: {}", frequency, average);
                BucketScore {
                    frequency,
                    average: Some(average),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::oracle::SynonymGroups;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record(label: &str, tf: f64) -> FeatureRecord {
        FeatureRecord {
            label: label.to_string(),
            nz: 1,
            tf,
            entropy: 0.0,
        }
    }

    fn params() -> EvaluationParams {
        EvaluationParams {
            max_frequency: 3,
            samples: 4,
            list_size: 10,
        }
    }

    fn fixture() -> (Similarity, SynonymGroups, Vec<FeatureRecord>) {
        let labels: Vec<String> = ["cat", "dog", "feline", "kitten"].iter().map(|s| s.to_string()).collect();
        let matrix = vec![
            vec![(0, 1.0), (1, 1.0)],
            vec![(0, 1.0), (1, 0.9)],
            vec![(0, 1.0), (1, 0.5)],
            vec![(0, 1.0)],
        ];
        let mut oracle = SynonymGroups::new();
        oracle.add_group(["cat", "feline"]);
        oracle.add_group(["dog"]);
        let rows = vec![record("cat", 2.0), record("dog", 3.0), record("feline", 2.0), record("kitten", 1.0)];
        (Similarity::new(labels, &matrix), oracle, rows)
    }

    #[test]
    fn buckets_skip_unknown_and_stop_words() {
        let (sim, oracle, rows) = fixture();
        let stop: HashSet<String> = ["feline".to_string()].into_iter().collect();
        let evaluation = Evaluation::new(&sim, &oracle, &rows, &stop, params());

        assert_eq!(evaluation.bucket(2), ["cat".to_string()]);
        assert_eq!(evaluation.bucket(3), ["dog".to_string()]);
        // kitten is not known to the oracle
        assert!(evaluation.bucket(1).is_empty());
        assert!(evaluation.bucket(7).is_empty());
    }

    #[test]
    fn huge_frequency_limit_only_holds_seen_buckets() {
        let (sim, oracle, rows) = fixture();
        let limits = EvaluationParams {
            max_frequency: usize::MAX,
            ..params()
        };
        let evaluation = Evaluation::new(&sim, &oracle, &rows, &HashSet::new(), limits);

        assert_eq!(evaluation.bucket(2), ["cat".to_string(), "feline".to_string()]);
        assert_eq!(evaluation.bucket(3), ["dog".to_string()]);
        assert!(evaluation.bucket(usize::MAX).is_empty());
    }

    #[test]
    fn rank_counts_frequent_enough_misses() {
        let (sim, oracle, rows) = fixture();
        let evaluation = Evaluation::new(&sim, &oracle, &rows, &HashSet::new(), params());

        // cat's neighbours: dog, feline, kitten; dog is unrelated and frequent enough
        let neighbours = sim.top_k("cat", 10).unwrap();
        assert_eq!(neighbours[0].word, "dog");
        assert_eq!(evaluation.first_related("cat", 2.0, &neighbours), 1);
        // with a higher threshold feline no longer counts and nothing related is left
        assert_eq!(evaluation.first_related("cat", 3.0, &neighbours), 10);
    }

    #[test]
    fn averages_per_bucket() {
        let (sim, oracle, rows) = fixture();
        let evaluation = Evaluation::new(&sim, &oracle, &rows, &HashSet::new(), params());
        let mut rng = StdRng::seed_from_u64(7);

        let scores = evaluation.run(&mut rng);
        assert_eq!(scores.len(), 3);
        assert_eq!(scores[0].to_string(), "1\tX");
        // cat and feline both see dog first, then each other
        assert_eq!(scores[1].to_string(), "2\t1");
        // dog has no related word at all
        assert_eq!(scores[2], BucketScore { frequency: 3, average: Some(10.0) });
    }
}
