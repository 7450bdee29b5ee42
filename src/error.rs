// Error taxonomy shared by the resolver, the store and the intake flows

use thiserror::Error;

use crate::allocation::{CapitalBand, Tier};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("invalid combination: band {band} is not offered for tier {tier}")]
    InvalidCombination { tier: Tier, band: CapitalBand },

    #[error("unknown investor tier: {0:?}")]
    UnknownTier(String),

    #[error("unknown capital band: {0:?}")]
    UnknownBand(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open store {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("store query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("stored value for column {column} is malformed: {message}")]
    Decode { column: String, message: String },

    #[error("export failed: {0}")]
    Export(String),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("credentials unavailable: {0}")]
    Credentials(String),

    #[error("upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upload rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("admin panel is disabled: no password configured")]
    Disabled,

    #[error("admin password rejected")]
    Denied,
}

/// Validation failure for one form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub context: String,
}

impl ValidationError {
    pub fn required(field: &str, context: &str) -> Self {
        ValidationError {
            field: field.to_string(),
            message: "Required field is empty".to_string(),
            context: context.to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.context, self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Why a form submission was rejected
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("submission has {} invalid field(s)", .0.len())]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
