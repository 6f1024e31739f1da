
use crate::error::{GentsError, Result};

use serde::Deserialize;
use std::{fmt::Display, fs::File, io::BufReader, path::Path};
use tracing::info;

/// Knobs shared by the evaluation harness.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluationParams {
    /// Highest term frequency bucket evaluated.
    pub max_frequency: usize,
    /// Random draws per frequency bucket.
    pub samples: usize,
    /// Neighbour list length, also the score of a word with no related neighbour.
    pub list_size: usize,
}

impl Default for EvaluationParams {
    fn default() -> Self {
        Self {
            max_frequency: 100,
            samples: 100,
            list_size: 10000,
        }
    }
}

impl Display for EvaluationParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "evaluation parameters:
        max_frequency: {},
        samples: {},
        list_size: {}",
        self.max_frequency, self.samples, self.list_size
        )
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Params {
    /// Unsupervised cells are kept iff their association score is above this.
    pub unsupervised_keep: f64,
    /// Supervised rewritten cells are kept iff above this.
    pub supervised_keep: f64,
    /// A column needs this many training words to be trainable.
    pub min_training_words: usize,
    /// Default worker count for batch queries.
    pub threads: usize,
    /// Rows/columns between progress lines, 0 silences them.
    pub progress_every: usize,
    pub evaluation: EvaluationParams,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            unsupervised_keep: 1e-21,
            supervised_keep: 1e-11,
            min_training_words: 2,
            threads: 4,
            progress_every: 10000,
            evaluation: EvaluationParams::default(),
        }
    }
}

impl Display for Params {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "using parameters:
        unsupervised_keep: {:e},
        supervised_keep: {:e},
        min_training_words: {},
        threads: {},
        progress_every: {},
        {}",
        self.unsupervised_keep, self.supervised_keep, self.min_training_words, self.threads, self.progress_every, self.evaluation
        )
    }
}

pub struct Config {
    params: Params,
}

impl Config {

    pub fn get_params(&self) -> Params {
        self.params.clone()
    }

    /// Reads the optional json file; every key left out keeps its default.
    pub fn new(json_path: Option<&Path>) -> Result<Config> {

        let params = match json_path {
            Some(path) => {
                let f = File::open(path).map_err(|e| GentsError::read(path, e))?;
                let params: Params = serde_json::from_reader(BufReader::new(f)).map_err(|e| GentsError::Config {
                    reason: format!("{}: {}", path.display(), e),
                })?;
                info!("loaded configuration from {}", path.display());
                params
            }
            None => Params::default(),
        };

        Self::validate(&params)?;
        Ok(Self { params })
    }

    fn validate(params: &Params) -> Result<()> {
        let reason = if params.threads == 0 {
            "threads must be positive"
        } else if params.min_training_words < 2 {
            "min_training_words must be at least 2, a single word forms no pair"
        } else if !(params.unsupervised_keep.is_finite() && params.supervised_keep.is_finite()) {
            "keep thresholds must be finite"
        } else if params.evaluation.list_size == 0 {
            "evaluation list_size must be positive"
        } else {
            return Ok(());
        };
        Err(GentsError::Config { reason: reason.to_string() })
    }
}

/// Records of the `label;nz;tf;TF;entropy` feature files.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureRecord {
    pub label: String,
    pub nz: usize,
    pub tf: f64,
    pub entropy: f64,
}

impl Display for FeatureRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // the frequency column appears twice in the file format
        write!(f, "{};{};{};{};{}", self.label, self.nz, self.tf, self.tf, self.entropy)
    }
}

/// A contiguous run of columns sharing one relation label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationGroup {
    pub relation: String,
    pub start: usize,
    /// Exclusive.
    pub end: usize,
}

impl RelationGroup {
    pub fn columns(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

pub mod files_handling {

    use super::{FeatureRecord, RelationGroup};
    use crate::error::{GentsError, Result};

    use flate2::read::GzDecoder;
    use ndarray::Array1;
    use ndarray_npy::write_npy;
    use std::collections::HashSet;
    use std::fs::{self, File};
    use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
    use std::path::{Path, PathBuf};
    use tracing::warn;

    pub const FEATURE_HEADER: &str = "label;nz;tf;TF;entropy";

    /// Line iterator over a plain or gzip (`.gz`) file.
    pub fn open_lines(path: &Path) -> Result<Lines<Box<dyn BufRead>>> {
        let f = File::open(path).map_err(|e| GentsError::read(path, e))?;
        let reader: Box<dyn BufRead> = match path.extension() {
            Some(ext) if ext == "gz" => Box::new(BufReader::new(GzDecoder::new(f))),
            _ => Box::new(BufReader::new(f)),
        };
        Ok(reader.lines())
    }

    fn write_lines<I, T>(path: &Path, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: std::fmt::Display,
    {
        let f = File::create(path).map_err(|e| GentsError::write(path, e))?;
        let mut out = BufWriter::new(f);
        for line in lines {
            writeln!(out, "{}", line).map_err(|e| GentsError::write(path, e))?;
        }
        out.flush().map_err(|e| GentsError::write(path, e))
    }

    pub fn read_input<R: ReadFile>(file_path: &Path) -> Result<R> {
        R::read_file(file_path)
    }

    /// Saves `item` as `output_dir/file_name`, creating the folder if needed.
    pub fn save_output<S: SaveFile>(output_dir: &Path, file_name: &str, item: &S) -> Result<PathBuf> {
        fs::create_dir_all(output_dir).map_err(|e| GentsError::write(output_dir, e))?;
        let out = output_dir.join(file_name);
        item.save_file(&out)?;
        Ok(out)
    }

    pub trait ReadFile: Sized {
        fn read_file(file_path: &Path) -> Result<Self>;
    }

    pub trait SaveFile {
        fn save_file(&self, file_path: &Path) -> Result<()>;
    }

    /// Label files: line order is the id.
    impl ReadFile for Vec<String> {
        fn read_file(file_path: &Path) -> Result<Self> {
            open_lines(file_path)?
                .map(|line| line.map(|l| l.trim_end().to_string()).map_err(|e| GentsError::read(file_path, e)))
                .collect()
        }
    }

    impl SaveFile for Vec<String> {
        fn save_file(&self, file_path: &Path) -> Result<()> {
            write_lines(file_path, self)
        }
    }

    /// Word lists (exempt words, stop words): one word per line, blanks ignored.
    impl ReadFile for HashSet<String> {
        fn read_file(file_path: &Path) -> Result<Self> {
            let mut words = HashSet::new();
            for line in open_lines(file_path)? {
                let line = line.map_err(|e| GentsError::read(file_path, e))?;
                let word = line.trim();
                if !word.is_empty() {
                    words.insert(word.to_string());
                }
            }
            Ok(words)
        }
    }

    impl ReadFile for Vec<FeatureRecord> {
        fn read_file(file_path: &Path) -> Result<Self> {
            let mut records = Vec::new();
            // first line is the header
            for (i, line) in open_lines(file_path)?.enumerate().skip(1) {
                let line = line.map_err(|e| GentsError::read(file_path, e))?;
                let parts: Vec<&str> = line.split(';').collect();
                let parsed = match parts.as_slice() {
                    [label, nz, tf, _, entropy] => match (nz.parse::<usize>(), tf.parse::<f64>(), entropy.parse::<f64>()) {
                        (Ok(nz), Ok(tf), Ok(entropy)) => Some(FeatureRecord {
                            label: label.to_string(),
                            nz,
                            tf,
                            entropy,
                        }),
                        _ => None,
                    },
                    _ => None,
                };
                match parsed {
                    Some(record) => records.push(record),
                    None => warn!("{}:{}: skipping malformed feature line {:?}", file_path.display(), i + 1, line),
                }
            }
            Ok(records)
        }
    }

    impl SaveFile for Vec<FeatureRecord> {
        fn save_file(&self, file_path: &Path) -> Result<()> {
            write_lines(file_path, std::iter::once(FEATURE_HEADER.to_string()).chain(self.iter().map(|r| r.to_string())))
        }
    }

    /// Boundary files hold `relation := end` lines, `end` exclusive; each group
    /// starts where the previous one ended.
    impl ReadFile for Vec<RelationGroup> {
        fn read_file(file_path: &Path) -> Result<Self> {
            let mut groups = Vec::new();
            let mut start = 0;
            for (i, line) in open_lines(file_path)?.enumerate() {
                let line = line.map_err(|e| GentsError::read(file_path, e))?;
                if line.trim().is_empty() {
                    continue;
                }
                let parsed = line
                    .rsplit_once(":=")
                    .and_then(|(relation, end)| end.trim().parse::<usize>().ok().map(|end| (relation.trim(), end)));
                match parsed {
                    Some((relation, end)) if end >= start => {
                        groups.push(RelationGroup {
                            relation: relation.to_string(),
                            start,
                            end,
                        });
                        start = end;
                    }
                    _ => warn!("{}:{}: skipping malformed boundary {:?}", file_path.display(), i + 1, line),
                }
            }
            Ok(groups)
        }
    }

    impl SaveFile for Vec<RelationGroup> {
        fn save_file(&self, file_path: &Path) -> Result<()> {
            write_lines(file_path, self.iter().map(|g| format!("{} := {}", g.relation, g.end)))
        }
    }

    /// Column weights: `id weight` lines, plus the same vector as `.npy` next to it.
    impl SaveFile for Array1<f64> {
        fn save_file(&self, file_path: &Path) -> Result<()> {
            write_lines(file_path, self.iter().enumerate().map(|(id, w)| format!("{} {}", id, w)))?;
            let npy = file_path.with_extension("npy");
            write_npy(&npy, self).map_err(|source| GentsError::Npy { path: npy.clone(), source })
        }
    }
}

#[cfg(test)]
mod tests {

    use super::files_handling::{read_input, save_output};
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use ndarray::{array, Array1};
    use std::collections::HashSet;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn defaults_without_file() {
        let params = Config::new(None).unwrap().get_params();
        assert_eq!(params, Params::default());
        assert_eq!(params.min_training_words, 2);
        assert_eq!(params.evaluation.list_size, 10000);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{"threads": 8, "evaluation": {"samples": 5}}"#).unwrap();

        let params = Config::new(Some(&path)).unwrap().get_params();
        assert_eq!(params.threads, 8);
        assert_eq!(params.evaluation.samples, 5);
        assert_eq!(params.evaluation.max_frequency, 100);
        assert_eq!(params.supervised_keep, 1e-11);
    }

    #[test]
    fn bad_json_is_a_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{"thread": 8}"#).unwrap();
        assert!(matches!(Config::new(Some(&path)), Err(GentsError::Config { .. })));

        fs::write(&path, r#"{"threads": 0}"#).unwrap();
        assert!(matches!(Config::new(Some(&path)), Err(GentsError::Config { .. })));
    }

    #[test]
    fn labels_and_word_lists() {
        let dir = tempdir().unwrap();
        let labels = vec!["cat".to_string(), "dog".to_string()];
        let path = save_output(dir.path(), "m.rlabel", &labels).unwrap();
        assert_eq!(read_input::<Vec<String>>(&path).unwrap(), labels);

        let list = dir.path().join("exempt.txt");
        fs::write(&list, "cat\n\n dog \n").unwrap();
        let words = read_input::<HashSet<String>>(&list).unwrap();
        assert_eq!(words.len(), 2);
        assert!(words.contains("dog"));
    }

    #[test]
    fn feature_records() {
        let dir = tempdir().unwrap();
        let records = vec![FeatureRecord {
            label: "cat".to_string(),
            nz: 2,
            tf: 5.0,
            entropy: 0.5,
        }];
        let path = save_output(dir.path(), "row_features.csv", &records).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "label;nz;tf;TF;entropy\ncat;2;5;5;0.5\n");

        fs::write(&path, "label;nz;tf;TF;entropy\ncat;2;5;5;0.5\nbroken;line\n").unwrap();
        assert_eq!(read_input::<Vec<FeatureRecord>>(&path).unwrap(), records);
    }

    #[test]
    fn boundaries_chain_their_starts() {
        let dir = tempdir().unwrap();
        let groups = vec![
            RelationGroup { relation: "mod".to_string(), start: 0, end: 3 },
            RelationGroup { relation: "subj".to_string(), start: 3, end: 7 },
        ];
        let path = save_output(dir.path(), "boundary.txt", &groups).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "mod := 3\nsubj := 7\n");
        assert_eq!(read_input::<Vec<RelationGroup>>(&path).unwrap(), groups);
        assert_eq!(groups[1].columns(), 3..7);
    }

    #[test]
    fn weights_as_text_and_npy() {
        let dir = tempdir().unwrap();
        let weights: Array1<f64> = array![1.5, 0.5];
        let path = save_output(dir.path(), "columns_context_PMI.txt", &weights).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "0 1.5\n1 0.5\n");

        let back: Array1<f64> = ndarray_npy::read_npy(dir.path().join("columns_context_PMI.npy")).unwrap();
        assert_eq!(back, weights);
    }

    #[test]
    fn gzip_input_is_transparent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corpus.txt.gz");
        let mut encoder = GzEncoder::new(fs::File::create(&path).unwrap(), Compression::default());
        encoder.write_all(b"one\ntwo\n").unwrap();
        encoder.finish().unwrap();

        let lines: Vec<String> = files_handling::open_lines(&path).unwrap().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["one", "two"]);
    }
}
