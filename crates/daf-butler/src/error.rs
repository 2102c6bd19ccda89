use thiserror::Error;

use daf_mapper::Format;

#[derive(Debug, Error)]
pub enum ButlerError {
    #[error("dataset not found: {dataset_type} {data_id}")]
    NotFound { dataset_type: String, data_id: String },

    #[error("repository {0} has no mapper")]
    MapperUndetermined(String),

    #[error("session has no output repositories")]
    NoOutputs,

    #[error("mapper of {root} gave no write location for {dataset_type}")]
    NoWriteLocation { root: String, dataset_type: String },

    #[error("{format} codec error: {reason}")]
    Codec { format: Format, reason: String },

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("graph error: {0}")]
    Graph(#[from] daf_graph::GraphError),

    #[error("mapper error: {0}")]
    Mapper(#[from] daf_mapper::MapperError),

    #[error("store error: {0}")]
    Store(#[from] daf_store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ButlerResult<T> = Result<T, ButlerError>;
