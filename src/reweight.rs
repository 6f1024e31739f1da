//! Steps shared by the weighting passes, and the unsupervised pass itself.

use crate::association::{ContingencyTable, Measure};
use crate::error::{GentsError, Result};
use crate::sparse::{transpose_file, MatrixHeader, MatrixReader, MatrixWriter, SparseRow};

use ndarray::Array1;
use ndarray_stats::SummaryStatisticsExt;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// One weight per column, produced by a supervised pass.
///
/// Columns start at 1.0 and not good; only a finite score makes a column good.
#[derive(Clone, Debug)]
pub struct FeatureWeights {
    weights: Array1<f64>,
    good: Array1<f64>,
}

impl FeatureWeights {
    pub fn new(columns: usize) -> Self {
        Self {
            weights: Array1::ones(columns),
            good: Array1::zeros(columns),
        }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Records the score of `column`. Non-finite scores leave it not good.
    pub fn set(&mut self, column: usize, score: f64) {
        if column >= self.weights.len() {
            warn!("weight for column {} outside of {} columns ignored", column, self.weights.len());
            return;
        }
        if score.is_finite() {
            self.weights[column] = score;
            self.good[column] = 1.0;
        } else {
            self.good[column] = 0.0;
        }
    }

    pub fn is_good(&self, column: usize) -> bool {
        self.good.get(column).map_or(false, |g| *g > 0.0)
    }

    pub fn good_count(&self) -> usize {
        self.good.iter().filter(|g| **g > 0.0).count()
    }

    pub fn weight(&self, column: usize) -> f64 {
        self.weights.get(column).copied().unwrap_or(0.0)
    }

    pub fn as_array(&self) -> &Array1<f64> {
        &self.weights
    }

    /// Scales good weights to average 1.0 and gives every other column the
    /// mean itself. Returns the mean.
    pub fn normalize(&mut self, measure: Measure) -> Result<f64> {
        let fail = |reason: String| GentsError::NoTrainableFeatures {
            measure: measure.to_string(),
            reason,
        };

        if self.good_count() == 0 {
            return Err(fail(format!("none of {} columns had enough training words", self.len())));
        }
        let mean = self
            .weights
            .weighted_mean(&self.good)
            .map_err(|e| fail(e.to_string()))?;
        if mean == 0.0 || !mean.is_finite() {
            return Err(fail(format!("average score over good columns is {}", mean)));
        }
        info!("average score: {}", mean);

        let good = &self.good;
        self.weights.zip_mut_with(good, |w, g| {
            *w = if *g > 0.0 { *w / mean } else { mean };
        });
        Ok(mean)
    }
}

/// `<path>.<tag>-<measure>`, e.g. `matrix_crs.mat.c-PMI`.
pub fn suffixed(path: &Path, tag: char, measure: Measure) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}-{}", tag, measure));
    PathBuf::from(name)
}

/// Streams the row-major file at `row_path`, maps every cell through `weigh`
/// (`column`, `value`, `row_total`) and writes the cells whose new value is
/// above `keep` to `out_path`. `weigh` returning `None` drops the cell.
pub fn rewrite_rows<F>(row_path: &Path, out_path: &Path, keep: f64, progress_every: usize, mut weigh: F) -> Result<MatrixHeader>
where
    F: FnMut(usize, f64, f64) -> Option<f64>,
{
    let reader = MatrixReader::open(row_path)?;
    let header = reader.header();

    let mut rows: Vec<SparseRow> = Vec::with_capacity(header.rows);
    for (i, row) in reader.enumerate() {
        let row = row?;
        let row_total: f64 = row.iter().map(|(_, v)| v).sum();
        rows.push(
            row.into_iter()
                .filter_map(|(col, value)| weigh(col, value, row_total).map(|w| (col, w)))
                .filter(|(_, w)| *w > keep)
                .collect(),
        );
        if progress_every > 0 && (i + 1) % progress_every == 0 {
            info!("reweighted {} rows", i + 1);
        }
    }

    let new_header = MatrixHeader {
        nnz: rows.iter().map(Vec::len).sum(),
        ..header
    };
    let mut writer = MatrixWriter::create(out_path, new_header)?;
    for row in &rows {
        writer.write_row(row)?;
    }
    writer.finish()?;
    info!("wrote {} ({} of {} entries kept)", out_path.display(), new_header.nnz, header.nnz);
    Ok(new_header)
}

/// Multiplies every cell by its column weight.
pub fn apply_weights(row_path: &Path, out_path: &Path, weights: &FeatureWeights, keep: f64, progress_every: usize) -> Result<MatrixHeader> {
    rewrite_rows(row_path, out_path, keep, progress_every, |col, value, _| Some(value * weights.weight(col)))
}

/// Column sums and grand total of a column-major file.
pub fn column_totals(col_path: &Path) -> Result<(Array1<f64>, f64)> {
    let reader = MatrixReader::open(col_path)?;
    let header = reader.header();
    let mut totals = Array1::zeros(header.cols);
    for (col, column) in reader.enumerate() {
        let sum: f64 = column?.iter().map(|(_, v)| v).sum();
        match totals.get_mut(col) {
            Some(total) => *total = sum,
            None => warn!("{}: column {} beyond the {} announced, ignored", col_path.display(), col, header.cols),
        }
    }
    let total = totals.sum();
    info!("total weight: {}", total);
    Ok((totals, total))
}

/// Reweights each cell by its own association with its row and column:
/// `tp = value`, `fp = row_total - tp`, `fn = column_total - tp`, the rest is
/// `tn`. Writes `<row>.u-<M>` and `<col>.u-<M>` and returns their paths.
pub fn weight_unsupervised(row_path: &Path, col_path: &Path, measure: Measure, keep: f64, progress_every: usize) -> Result<(PathBuf, PathBuf)> {
    info!("association measure: {}", measure);
    let (column_totals, total) = column_totals(col_path)?;

    let new_rows = suffixed(row_path, 'u', measure);
    let new_cols = suffixed(col_path, 'u', measure);

    rewrite_rows(row_path, &new_rows, keep, progress_every, |col, value, row_total| {
        let column_total = column_totals.get(col).copied().unwrap_or(0.0);
        let true_positive = value;
        let false_positive = row_total - true_positive;
        let false_negative = column_total - true_positive;
        let true_negative = total - (true_positive + false_positive + false_negative);

        let table = ContingencyTable::new(true_positive, false_negative, false_positive, true_negative);
        let score = table.score(measure);
        if score.is_finite() {
            Some(score)
        } else {
            error!("{} is {} for column {} with {}", measure, score, col, table);
            None
        }
    })?;

    transpose_file(&new_rows, &new_cols, progress_every)?;
    Ok((new_rows, new_cols))
}
