use stowage_model::{DriverId, RemoteFileId};
use thiserror::Error;

use crate::config::ConfigError;

/// Failures reported by a [`RemoteStore`](crate::ports::RemoteStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote file not found: {0}")]
    NotFound(RemoteFileId),

    #[error("operation not supported by this store: {0}")]
    Unsupported(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by a [`Catalog`](crate::ports::Catalog).
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog rejected record '{name}': {reason}")]
    Rejected { name: String, reason: String },

    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by a [`VideoService`](crate::ports::VideoService).
#[derive(Error, Debug)]
pub enum VideoCreationError {
    #[error("video rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Manifest content that cannot be turned into a `BundleManifest`.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("manifest is empty")]
    Empty,

    #[error("manifest is not valid: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("manifest field '{0}' is blank")]
    MissingField(&'static str),
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("invalid driver {driver}: {reason}")]
    InvalidDriver { driver: DriverId, reason: String },

    #[error("invalid importer configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("manifest discovery ({query}) failed: {source}")]
    Discovery {
        query: String,
        #[source]
        source: StoreError,
    },

    #[error("remote store request for {file} failed: {source}")]
    Transport {
        file: RemoteFileId,
        #[source]
        source: StoreError,
    },

    #[error("manifest {file} could not be decoded: {source}")]
    Decode {
        file: RemoteFileId,
        #[source]
        source: DecodeError,
    },

    #[error("bundle container {container} is malformed: {reason}")]
    MalformedBundle {
        container: RemoteFileId,
        reason: String,
    },

    #[error(
        "registering bundle {bundle} failed after {created} records: {source}"
    )]
    Registration {
        bundle: String,
        created: usize,
        #[source]
        source: CatalogError,
    },

    #[error("creating video for bundle {bundle} failed: {source}")]
    VideoCreation {
        bundle: String,
        #[source]
        source: VideoCreationError,
    },

    #[error("task for manifest {file} aborted: {reason}")]
    TaskAborted { file: RemoteFileId, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ImportError {
    pub fn transport(file: &RemoteFileId, source: StoreError) -> Self {
        ImportError::Transport {
            file: file.clone(),
            source,
        }
    }

    /// Stable short label used in logs and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::InvalidDriver { .. } => "invalid_driver",
            ImportError::Config(_) => "config",
            ImportError::Discovery { .. } => "discovery",
            ImportError::Transport { .. } => "transport",
            ImportError::Decode { .. } => "decode",
            ImportError::MalformedBundle { .. } => "malformed",
            ImportError::Registration { .. } => "registration",
            ImportError::VideoCreation { .. } => "video_creation",
            ImportError::TaskAborted { .. } => "aborted",
            ImportError::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
