//! Error types shared by the builder, the weighting passes and the query tools.
//!
//! Statistical and lexical edge cases are recovered where they happen and never
//! reach this type. What lands here is fatal for the enclosing run: missing
//! files, refused output directories, unreadable headers, bad configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GentsError {
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The builder never overwrites an earlier matrix.
    #[error("Directory '{path}' already exists, refusing to overwrite a previous matrix")]
    DirectoryExists { path: PathBuf },

    #[error("Malformed matrix header in '{path}': {line:?}")]
    MalformedHeader { path: PathBuf, line: String },

    #[error("Unknown association measure '{0}'. Expected one of: PMI, LL, Chi2, Tscore, Zscore, Dice, F, IG")]
    UnknownMeasure(String),

    #[error("Unknown part of speech '{0}'. Expected one of: N, V, A")]
    UnknownPos(String),

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// Normalisation has nothing to divide by.
    #[error("No trainable features for {measure}: {reason}")]
    NoTrainableFeatures { measure: String, reason: String },

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to write npy file '{path}': {source}")]
    Npy {
        path: PathBuf,
        source: ndarray_npy::WriteNpyError,
    },
}

impl GentsError {
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, GentsError>;
