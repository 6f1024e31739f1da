
// imports
use crate::association::Measure;
use crate::config::files_handling::read_input;
use crate::config::{FeatureRecord, Params, RelationGroup};
use crate::cooccurrence::MatrixBuilder;
use crate::error::Result;
use crate::extract::{DependencyTriples, PairExtractor, Pos, TaggedWindow};
use crate::oracle::SynonymGroups;
use crate::reweight::weight_unsupervised;
use crate::sparse::MatrixReader;
use crate::supervised::{check_rows, weight_supervised, SupervisedOutput, Supervision, TrainingSet};

use std::collections::HashSet;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Everything a matrix build needs besides the numeric knobs.
#[derive(Clone, Debug)]
pub struct BuildRequest {
    pub pos: Pos,
    pub out_dir: PathBuf,
    pub name: String,
    pub min_term_partners: usize,
    pub min_context_partners: usize,
    pub files: Vec<PathBuf>,
    /// Tagged running text with this window instead of dependency triples.
    pub window: Option<usize>,
}

impl Display for BuildRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let files: Vec<String> = self.files.iter().map(|p| p.display().to_string()).collect();
        let input = match self.window {
            Some(window) => format!("tagged text, window {}", window),
            None => "dependency triples".to_string(),
        };
        write!(
            f,
            "Matrix: {}\tPOS: {}\tMin Term: {}\tMin Context: {}\tInput: {}\tFiles: {}",
            self.name,
            self.pos,
            self.min_term_partners,
            self.min_context_partners,
            input,
            files.join(" ")
        )
    }
}

/// Inputs shared by both supervised passes.
#[derive(Clone, Debug)]
pub struct SupervisedRequest {
    pub measure: Measure,
    pub training: PathBuf,
    pub row_features: PathBuf,
    pub row_matrix: PathBuf,
    pub column_matrix: PathBuf,
    /// Words held out of training.
    pub exempt: Option<PathBuf>,
}

pub struct Pipeline {}

impl Pipeline {

    // builds a matrix directory in order -
    // -> count pairs of every corpus file
    // -> column map, then row map
    // -> labels and info
    // -> row-major file, then column-major file read back from it

    pub fn build(request: &BuildRequest, params: &Params) -> Result<PathBuf> {

        let timer = Instant::now();
        info!("{}", request);

        let extractor: Box<dyn PairExtractor> = match request.window {
            Some(window) => Box::new(TaggedWindow::new(request.pos, window)),
            None => Box::new(DependencyTriples::new(request.pos)),
        };

        let mut builder = MatrixBuilder::new(
            &request.out_dir,
            &request.name,
            request.min_term_partners,
            request.min_context_partners,
            params.progress_every,
        );
        builder.create_directory()?;

        for file in &request.files {
            if let Err(e) = builder.load_file(file, extractor.as_ref()) {
                warn!("{}, moving on to the next file", e);
            }
        }
        info!("finished counting, took {} seconds ...", timer.elapsed().as_secs());

        builder.generate_column_map();
        builder.generate_row_map();
        builder.write_labels()?;
        builder.write_info(&request.to_string())?;
        builder.generate_crs()?;
        builder.generate_ccs()?;

        info!("matrix written to {}, took {} seconds ...", builder.directory().display(), timer.elapsed().as_secs());
        Ok(builder.directory().to_path_buf())
    }

    pub fn unsupervised(measure: Measure, row_matrix: &Path, column_matrix: &Path, params: &Params) -> Result<(PathBuf, PathBuf)> {
        let timer = Instant::now();
        let written = weight_unsupervised(row_matrix, column_matrix, measure, params.unsupervised_keep, params.progress_every)?;
        info!("unsupervised weighting done, took {} seconds ...", timer.elapsed().as_secs());
        Ok(written)
    }

    pub fn context(request: &SupervisedRequest, params: &Params) -> Result<SupervisedOutput> {
        Self::supervised(request, Supervision::Context, params)
    }

    pub fn relation(request: &SupervisedRequest, boundary: &Path, params: &Params) -> Result<SupervisedOutput> {
        let groups: Vec<RelationGroup> = read_input(boundary)?;
        info!("{} relations in {}", groups.len(), boundary.display());
        Self::supervised(request, Supervision::Relation(groups), params)
    }

    fn supervised(request: &SupervisedRequest, supervision: Supervision, params: &Params) -> Result<SupervisedOutput> {

        let timer = Instant::now();
        let rows: Vec<FeatureRecord> = read_input(&request.row_features)?;
        let header = MatrixReader::open(&request.row_matrix)?.header();
        check_rows(&rows, header.rows, &request.row_features)?;

        let oracle: SynonymGroups = read_input(&request.training)?;
        let exempt: HashSet<String> = match &request.exempt {
            Some(path) => read_input(path)?,
            None => HashSet::new(),
        };
        info!("{} exempt words", exempt.len());

        let training = TrainingSet::new(&rows, &oracle, &exempt, params.progress_every);
        let output = weight_supervised(&training, &supervision, request.measure, &request.row_matrix, &request.column_matrix, params)?;

        info!(
            "{} weighting done on {} features, took {} seconds ...",
            supervision.kind(),
            output.trained_features,
            timer.elapsed().as_secs()
        );
        Ok(output)
    }
}
