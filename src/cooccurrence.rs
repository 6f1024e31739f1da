
// imports
use crate::association::entropy_bits;
use crate::config::files_handling::{open_lines, save_output};
use crate::config::{FeatureRecord, RelationGroup};
use crate::error::{GentsError, Result};
use crate::extract::PairExtractor;
use crate::lexicon::{IndexMap, Lexicon};
use crate::sparse::{transpose_file, MatrixHeader, MatrixWriter};

use ndarray::Array1;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ROW_MATRIX: &str = "matrix_crs.mat";
pub const COLUMN_MATRIX: &str = "matrix_ccs.mat";
pub const ROW_FEATURES: &str = "row_features.csv";
pub const COLUMN_FEATURES: &str = "column_features.csv";
pub const BOUNDARY: &str = "boundary.txt";
pub const INFO: &str = "info.txt";

/// Summary of one corpus file pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub lines: usize,
    pub skipped: usize,
    pub pairs: usize,
}

/// Accumulates word/context counts from corpus files and writes the pruned
/// matrix into `<out_dir>/<name>`.
///
/// Call order matters: load every file, then [`MatrixBuilder::generate_column_map`]
/// and [`MatrixBuilder::generate_row_map`], then the labels, the row-major file
/// and last the column-major file which is read back from the row-major one.
pub struct MatrixBuilder {
    name: String,
    directory: PathBuf,
    min_term_partners: usize,
    min_context_partners: usize,
    progress_every: usize,
    words: Lexicon,
    contexts: Lexicon,
    // word id -> (context id -> count), original ids
    cells: Vec<BTreeMap<usize, u64>>,
    non_zero_entries: usize,
    column_map: Option<IndexMap>,
    row_map: Option<IndexMap>,
    entry_count: usize,
}

impl MatrixBuilder {

    pub fn new(out_dir: &Path, name: &str, min_term_partners: usize, min_context_partners: usize, progress_every: usize) -> Self {
        Self {
            name: name.to_string(),
            directory: out_dir.join(name),
            min_term_partners,
            min_context_partners,
            progress_every,
            words: Lexicon::new(),
            contexts: Lexicon::new(),
            cells: Vec::new(),
            non_zero_entries: 0,
            column_map: None,
            row_map: None,
            entry_count: 0,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Creates the output directory, which must not exist yet.
    pub fn create_directory(&self) -> Result<()> {
        if self.directory.exists() {
            return Err(GentsError::DirectoryExists { path: self.directory.clone() });
        }
        fs::create_dir_all(&self.directory).map_err(|e| GentsError::write(&self.directory, e))?;
        info!("directory {} created", self.directory.display());
        Ok(())
    }

    /// Counts every pair `extractor` finds in the file at `path`.
    ///
    /// A read failure stops this file; counts gathered so far are kept.
    pub fn load_file(&mut self, path: &Path, extractor: &dyn PairExtractor) -> Result<LoadStats> {
        info!("loading {}", path.display());
        let mut stats = LoadStats::default();
        let mut pairs = Vec::new();

        for line in open_lines(path)? {
            let line = line.map_err(|e| GentsError::read(path, e))?;
            stats.lines += 1;

            pairs.clear();
            extractor.extract(&line, &mut pairs);
            if pairs.is_empty() {
                stats.skipped += 1;
                debug!("{}:{}: no pair in {:?}", path.display(), stats.lines, line);
                continue;
            }
            for (word, context) in &pairs {
                self.count_pair(word, context);
            }
            stats.pairs += pairs.len();
        }

        info!(
            "{}: {} lines, {} skipped, {} pairs; {} words, {} contexts, {} entries so far",
            path.display(), stats.lines, stats.skipped, stats.pairs, self.words.len(), self.contexts.len(), self.non_zero_entries
        );
        Ok(stats)
    }

    pub fn count_pair(&mut self, word: &str, context: &str) {
        let word_id = self.words.get_or_insert(word);
        let context_id = self.contexts.get_or_insert(context);
        if word_id == self.cells.len() {
            self.cells.push(BTreeMap::new());
        }

        let count = self.cells[word_id].entry(context_id).or_insert(0);
        if *count == 0 {
            self.non_zero_entries += 1;
        }
        *count += 1;

        self.words.observe(word_id, context_id);
        self.contexts.observe(context_id, word_id);
    }

    /// Decides which contexts survive. Must run before the row map.
    pub fn generate_column_map(&mut self) -> usize {
        let map = IndexMap::by_partner_count(&self.contexts, self.min_context_partners);
        info!("{} of {} contexts kept", map.len(), self.contexts.len());
        let kept = map.len();
        self.column_map = Some(map);
        kept
    }

    /// Decides which words survive and counts the entries that will be written,
    /// i.e. cells of surviving rows that fall in surviving columns.
    pub fn generate_row_map(&mut self) -> usize {
        if self.column_map.is_none() {
            self.generate_column_map();
        }
        let map = IndexMap::by_partner_count(&self.words, self.min_term_partners);

        self.entry_count = match &self.column_map {
            Some(columns) => map
                .survivors()
                .iter()
                .map(|row| self.cells[*row].keys().filter(|col| columns.compact(**col).is_some()).count())
                .sum(),
            None => 0,
        };
        info!("{} of {} words kept, {} entries", map.len(), self.words.len(), self.entry_count);

        let kept = map.len();
        self.row_map = Some(map);
        kept
    }

    fn labels(lexicon: &Lexicon, map: &IndexMap) -> Vec<String> {
        map.survivors()
            .iter()
            .filter_map(|id| lexicon.term(*id))
            .map(str::to_string)
            .collect()
    }

    pub fn row_labels(&self) -> Vec<String> {
        self.row_map.as_ref().map(|m| Self::labels(&self.words, m)).unwrap_or_default()
    }

    pub fn column_labels(&self) -> Vec<String> {
        self.column_map.as_ref().map(|m| Self::labels(&self.contexts, m)).unwrap_or_default()
    }

    /// Writes `<name>.rlabel` and `<name>.clabel`.
    pub fn write_labels(&self) -> Result<()> {
        let rlabel = save_output(&self.directory, &format!("{}.rlabel", self.name), &self.row_labels())?;
        info!("built {}", rlabel.display());
        let clabel = save_output(&self.directory, &format!("{}.clabel", self.name), &self.column_labels())?;
        info!("built {}", clabel.display());
        Ok(())
    }

    fn shape(&self) -> MatrixHeader {
        MatrixHeader {
            rows: self.row_map.as_ref().map_or(0, IndexMap::len),
            cols: self.column_map.as_ref().map_or(0, IndexMap::len),
            nnz: self.entry_count,
        }
    }

    pub fn write_info(&self, description: &str) -> Result<()> {
        let path = self.directory.join(INFO);
        let shape = self.shape();
        let mut out = fs::File::create(&path).map_err(|e| GentsError::write(&path, e))?;
        write!(
            out,
            "{}\nTotal Words: {}\tTotal Contexts: {}\tTotal Entries: {}\nUsed Words: {}\tUsed Contexts: {}\tUsed Entries: {}\n",
            description,
            self.words.len(),
            self.contexts.len(),
            self.non_zero_entries,
            shape.rows,
            shape.cols,
            shape.nnz
        )
        .map_err(|e| GentsError::write(&path, e))
    }

    /// Writes the row-major matrix and the row feature stats, then drops the
    /// raw counts.
    pub fn generate_crs(&mut self) -> Result<PathBuf> {
        let path = self.directory.join(ROW_MATRIX);
        info!("building {}", path.display());

        let (rows, columns) = match (&self.row_map, &self.column_map) {
            (Some(rows), Some(columns)) => (rows, columns),
            _ => {
                return Err(GentsError::Config {
                    reason: "row and column maps must be generated before the row-major matrix".to_string(),
                })
            }
        };

        let mut writer = MatrixWriter::create(&path, self.shape())?;
        let mut features = Vec::with_capacity(rows.len());
        for (i, origin) in rows.survivors().iter().enumerate() {
            let mut row: Vec<(usize, f64)> = self.cells[*origin]
                .iter()
                .filter_map(|(col, count)| columns.compact(*col).map(|c| (c, *count as f64)))
                .collect();
            row.sort_unstable_by_key(|(c, _)| *c);

            writer.write_row(&row)?;
            let label = self.words.term(*origin).unwrap_or_default();
            features.push(feature_record(label, row.iter().map(|(_, v)| *v)));

            if self.progress_every > 0 && (i + 1) % self.progress_every == 0 {
                info!("processed {} rows", i + 1);
            }
        }
        writer.finish()?;
        save_output(&self.directory, ROW_FEATURES, &features)?;

        self.cells = Vec::new();
        Ok(path)
    }

    /// Transposes the row-major file into the column-major one and writes the
    /// column feature stats and the relation boundaries.
    pub fn generate_ccs(&self) -> Result<PathBuf> {
        let crs = self.directory.join(ROW_MATRIX);
        let ccs = self.directory.join(COLUMN_MATRIX);
        info!("building {}", ccs.display());

        let columns = transpose_file(&crs, &ccs, self.progress_every)?;
        let labels = self.column_labels();
        let features: Vec<FeatureRecord> = labels
            .iter()
            .zip(&columns)
            .map(|(label, column)| feature_record(label, column.iter().map(|(_, v)| *v)))
            .collect();
        save_output(&self.directory, COLUMN_FEATURES, &features)?;
        save_output(&self.directory, BOUNDARY, &relation_groups(&labels))?;

        Ok(ccs)
    }
}

/// `nz`, `tf` and the entropy in bits of the value distribution of a vector.
pub fn feature_record(label: &str, values: impl Iterator<Item = f64>) -> FeatureRecord {
    let values: Array1<f64> = values.collect();
    let tf = values.sum();
    let entropy = if tf > 0.0 { entropy_bits(&(&values / tf)).abs() } else { 0.0 };
    FeatureRecord {
        label: label.to_string(),
        nz: values.len(),
        tf,
        entropy,
    }
}

/// Splits sorted column labels into runs sharing their relation, the second
/// `:` field (`N:subj:N:dog` -> `subj`). A label without one stays in the
/// current run.
pub fn relation_groups(labels: &[String]) -> Vec<RelationGroup> {
    let mut groups: Vec<RelationGroup> = Vec::new();
    for (i, label) in labels.iter().enumerate() {
        let relation = label.split(':').nth(1);
        match (groups.last_mut(), relation) {
            (Some(last), Some(relation)) if last.relation != relation => {
                last.end = i;
                groups.push(RelationGroup {
                    relation: relation.to_string(),
                    start: i,
                    end: i + 1,
                });
            }
            (Some(last), _) => last.end = i + 1,
            (None, relation) => groups.push(RelationGroup {
                relation: relation.unwrap_or_default().to_string(),
                start: i,
                end: i + 1,
            }),
        }
    }
    groups
}
