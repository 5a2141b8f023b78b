use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("input {file} is missing required columns: {columns}")]
    #[diagnostic(help("check that the file has a header row and is the expected export"))]
    MissingColumns { file: String, columns: String },

    #[error("malformed row {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("unknown species prefix: {0}")]
    InvalidSpecies(String),

    #[error("invalid score convention: {0}")]
    InvalidConvention(String),

    #[error("invalid import option: {0}")]
    InvalidOption(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to open identifier cache: {0}")]
    CacheOpen(String),

    #[error("failed to write identifier cache: {0}")]
    CacheWrite(String),

    #[error("failed to open graph store: {0}")]
    GraphOpen(String),

    #[error("graph operation failed: {0}")]
    StoreOperation(String),

    #[error("NCBI request failed: {0}")]
    NcbiHttp(String),

    #[error("NCBI returned status {status}: {message}")]
    NcbiStatus { status: u16, message: String },

    #[error("Ensembl request failed: {0}")]
    EnsemblHttp(String),

    #[error("Ensembl returned status {status}: {message}")]
    EnsemblStatus { status: u16, message: String },

    #[error("uniprot request failed: {0}")]
    UniprotHttp(String),

    #[error("uniprot returned status {status}: {message}")]
    UniprotStatus { status: u16, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
