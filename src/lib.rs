// Allocation Intake - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod admin;    // List / add / delete / export for both stores
pub mod allocation;
pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod intake;   // Form validation + submission flows
pub mod logging;
pub mod records;
pub mod report;   // Simulation summary files
pub mod upload;   // Cloud storage collaborator

// Re-export commonly used types
pub use admin::{check_password, AdminPanel, AdminRows, Export, StoreKind};
pub use allocation::{
    bands_for, category_shares, resolve, resolve_labels,
    AllocationBreakdown, CapitalBand, Category, CategoryShare, Tier,
    ALLOCATION_TABLE, NET_WORTH_MULTIPLIER,
};
pub use config::Config;
pub use db::{sha256_hex, Record, RecordId, RecordStore, Stored};
pub use error::{AccessError, IntakeError, LookupError, StorageError, UploadError, ValidationError};
pub use fields::{normalize, FieldValue, StorageValue};
pub use intake::{
    submit_investor, submit_profile,
    Attachment, AttachmentKind, InvestorForm, InvestorSubmission,
    ProfileForm, ProfileSubmission, UploadOutcome, UploadTarget,
};
pub use records::{ClientRecord, ProfileRecord};
pub use upload::{DriveUploader, FileUploader, LocalFile, StagedFile};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
