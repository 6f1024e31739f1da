pub mod association;
pub mod config;
pub mod cooccurrence;
pub mod error;
pub mod evaluate;
pub mod extract;
pub mod lexicon;
pub mod oracle;
pub mod pipeline;
pub mod reweight;
pub mod similarity;
pub mod sparse;
pub mod supervised;
pub mod tools;

pub use association::{ContingencyTable, Measure};
pub use config::files_handling;
pub use config::{Config, FeatureRecord, Params};
pub use cooccurrence::MatrixBuilder;
pub use error::{GentsError, Result};
pub use evaluate::Evaluation;
pub use extract::Pos;
pub use oracle::{Relation, RelatednessOracle, SynonymGroups};
pub use pipeline::{BuildRequest, Pipeline, SupervisedRequest};
pub use similarity::Similarity;
