//! Measures of association over a 2x2 contingency table.
//!
//! The table is laid out as
//!
//! ```text
//!                 shares feature   does not share
//!   related       true_positive    false_negative
//!   unrelated     false_positive   true_negative
//! ```
//!
//! and every measure is computed from the observed table and the table of
//! values expected from its marginals. Scores below zero are clamped to zero.

use crate::error::GentsError;

use ndarray::{array, Array1, Array2, Axis};
use ndarray_stats::EntropyExt;
use std::f64::consts::LN_2;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Measure {
    Pmi,
    LogLikelihood,
    ChiSquare,
    TScore,
    ZScore,
    Dice,
    InfoGain,
}

impl Measure {
    /// Short name used in file suffixes and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Measure::Pmi => "PMI",
            Measure::LogLikelihood => "LL",
            Measure::ChiSquare => "Chi2",
            Measure::TScore => "Tscore",
            Measure::ZScore => "Zscore",
            Measure::Dice => "Dice",
            Measure::InfoGain => "IG",
        }
    }
}

impl FromStr for Measure {
    type Err = GentsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PMI" => Ok(Measure::Pmi),
            "LL" => Ok(Measure::LogLikelihood),
            "Chi2" => Ok(Measure::ChiSquare),
            "Tscore" => Ok(Measure::TScore),
            "Zscore" => Ok(Measure::ZScore),
            "Dice" | "F" => Ok(Measure::Dice),
            "IG" => Ok(Measure::InfoGain),
            _ => Err(GentsError::UnknownMeasure(s.to_string())),
        }
    }
}

impl Display for Measure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContingencyTable {
    observed: Array2<f64>,
}

impl ContingencyTable {
    pub fn new(true_positive: f64, false_negative: f64, false_positive: f64, true_negative: f64) -> Self {
        Self {
            observed: array![[true_positive, false_negative], [false_positive, true_negative]],
        }
    }

    pub fn true_positive(&self) -> f64 {
        self.observed[[0, 0]]
    }

    pub fn false_negative(&self) -> f64 {
        self.observed[[0, 1]]
    }

    pub fn false_positive(&self) -> f64 {
        self.observed[[1, 0]]
    }

    pub fn true_negative(&self) -> f64 {
        self.observed[[1, 1]]
    }

    pub fn row_sums(&self) -> Array1<f64> {
        self.observed.sum_axis(Axis(1))
    }

    pub fn col_sums(&self) -> Array1<f64> {
        self.observed.sum_axis(Axis(0))
    }

    pub fn total(&self) -> f64 {
        self.observed.sum()
    }

    /// `expected[i][j] = row_sum[i] * col_sum[j] / total`, undefined for an empty table.
    pub fn expected(&self) -> Array2<f64> {
        let rows = self.row_sums();
        let cols = self.col_sums();
        let total = self.total();
        Array2::from_shape_fn((2, 2), |(i, j)| rows[i] * cols[j] / total)
    }

    /// Scores the table with `measure`. Never negative; an empty table scores 0.
    /// Non-finite results are passed through so the caller can report them.
    pub fn score(&self, measure: Measure) -> f64 {
        if self.total() == 0.0 {
            return 0.0;
        }

        let observed = &self.observed;
        let value = match measure {
            Measure::Pmi => pmi(observed, &self.expected()),
            Measure::LogLikelihood => log_likelihood(observed, &self.expected()),
            Measure::ChiSquare => chi_square(observed, &self.expected()),
            Measure::TScore => t_score(observed, &self.expected()),
            Measure::ZScore => z_score(observed, &self.expected()),
            Measure::Dice => dice(observed),
            Measure::InfoGain => info_gain(observed),
        };

        if value < 0.0 {
            0.0
        } else {
            value
        }
    }
}

impl Display for ContingencyTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tp: {}, fn: {}, fp: {}, tn: {}",
            self.true_positive(),
            self.false_negative(),
            self.false_positive(),
            self.true_negative()
        )
    }
}

/// Convenience wrapper building a fresh table for a single evaluation.
pub fn association(
    true_positive: f64,
    false_negative: f64,
    false_positive: f64,
    true_negative: f64,
    measure: Measure,
) -> f64 {
    ContingencyTable::new(true_positive, false_negative, false_positive, true_negative).score(measure)
}

/// Shannon entropy in bits of an already normalised distribution. Zero
/// probabilities contribute nothing and an empty distribution has no entropy.
pub fn entropy_bits(probabilities: &Array1<f64>) -> f64 {
    match probabilities.entropy() {
        Ok(nats) => nats / LN_2,
        Err(_) => 0.0,
    }
}

// log2 of a non-positive number is the smallest positive f64, so the term vanishes
fn log2(x: f64) -> f64 {
    if x > 0.0 {
        x.log2()
    } else {
        f64::MIN_POSITIVE
    }
}

fn pmi(observed: &Array2<f64>, expected: &Array2<f64>) -> f64 {
    if observed[[0, 0]] == 0.0 {
        return 0.0;
    }
    log2(observed[[0, 0]] / expected[[0, 0]])
}

fn log_likelihood(observed: &Array2<f64>, expected: &Array2<f64>) -> f64 {
    if observed[[0, 0]] == 0.0 {
        return 0.0;
    }
    let sum: f64 = observed
        .iter()
        .zip(expected.iter())
        .filter(|(o, _)| **o != 0.0)
        .map(|(o, e)| o * log2(o / e))
        .sum();
    2.0 * sum
}

fn chi_square(observed: &Array2<f64>, expected: &Array2<f64>) -> f64 {
    if observed[[0, 0]] == 0.0 {
        return 0.0;
    }
    observed
        .iter()
        .zip(expected.iter())
        .map(|(o, e)| {
            // an empty row or column expects and observes nothing
            if *e == 0.0 && *o == 0.0 {
                0.0
            } else {
                (o - e).powi(2) / e
            }
        })
        .sum()
}

fn t_score(observed: &Array2<f64>, expected: &Array2<f64>) -> f64 {
    if observed[[0, 0]] == 0.0 {
        return 0.0;
    }
    (observed[[0, 0]] - expected[[0, 0]]) / observed[[0, 0]].sqrt()
}

fn z_score(observed: &Array2<f64>, expected: &Array2<f64>) -> f64 {
    if observed[[0, 0]] == 0.0 {
        return 0.0;
    }
    (observed[[0, 0]] - expected[[0, 0]]) / expected[[0, 0]].sqrt()
}

fn dice(observed: &Array2<f64>) -> f64 {
    let precision = observed[[0, 0]] / observed.row(0).sum();
    let recall = observed[[0, 0]] / observed.column(0).sum();
    if precision == 0.0 || recall == 0.0 || precision.is_nan() || recall.is_nan() {
        return 0.0;
    }
    2.0 * precision * recall / (precision + recall)
}

fn binary_entropy(a: f64, b: f64) -> f64 {
    let n = a + b;
    if n == 0.0 {
        return 0.0;
    }
    entropy_bits(&array![a / n, b / n])
}

// reduction in uncertainty about the row class once the column is known
fn info_gain(observed: &Array2<f64>) -> f64 {
    let rows = observed.sum_axis(Axis(1));
    let cols = observed.sum_axis(Axis(0));
    let total = observed.sum();

    let prior = binary_entropy(rows[0], rows[1]);
    let conditional = (0..2)
        .map(|j| {
            if cols[j] == 0.0 {
                0.0
            } else {
                (cols[j] / total) * binary_entropy(observed[[0, j]], observed[[1, j]])
            }
        })
        .sum::<f64>();

    prior - conditional
}
