// 🛠️ Admin panel operations - list, add, delete, export both stores
//
// Surfaces (CLI, TUI, HTTP) all go through `AdminPanel`, so adding a row
// here uses the same insert path as the public forms.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::config::Config;
use crate::db::{sha256_hex, RecordId, RecordStore, Stored};
use crate::error::{AccessError, IntakeError, StorageError};
use crate::intake::{submit_investor, InvestorForm, ProfileForm};
use crate::records::{ClientRecord, ProfileRecord};

// ============================================================================
// STORE SELECTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Clients,
    Profiles,
}

impl StoreKind {
    pub const ALL: [StoreKind; 2] = [StoreKind::Clients, StoreKind::Profiles];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Clients => "clients",
            StoreKind::Profiles => "profiles",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clients" | "clientes" => Ok(StoreKind::Clients),
            "profiles" | "client_profiles" => Ok(StoreKind::Profiles),
            other => Err(format!("unknown store {:?} (expected clients or profiles)", other)),
        }
    }
}

/// Rows of either store, serialized as a plain JSON array
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AdminRows {
    Clients(Vec<Stored<ClientRecord>>),
    Profiles(Vec<Stored<ProfileRecord>>),
}

impl AdminRows {
    pub fn len(&self) -> usize {
        match self {
            AdminRows::Clients(rows) => rows.len(),
            AdminRows::Profiles(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<RecordId> {
        match self {
            AdminRows::Clients(rows) => rows.iter().map(|r| r.id).collect(),
            AdminRows::Profiles(rows) => rows.iter().map(|r| r.id).collect(),
        }
    }
}

/// A downloadable export with its integrity digest
#[derive(Debug, Clone)]
pub struct Export {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    pub sha256: String,
}

impl Export {
    fn new(file_name: String, content_type: &'static str, bytes: Vec<u8>) -> Self {
        let sha256 = sha256_hex(&bytes);
        Export {
            file_name,
            content_type,
            bytes,
            sha256,
        }
    }
}

// ============================================================================
// ADMIN PANEL
// ============================================================================

#[derive(Debug, Clone)]
pub struct AdminPanel {
    clients: RecordStore,
    profiles: RecordStore,
}

impl AdminPanel {
    pub fn new(clients: RecordStore, profiles: RecordStore) -> Self {
        AdminPanel { clients, profiles }
    }

    pub fn from_config(config: &Config) -> Self {
        AdminPanel::new(
            RecordStore::new(&config.clients_db_path),
            RecordStore::new(&config.profiles_db_path),
        )
    }

    /// Create both tables if absent
    pub fn ensure_schemas(&self) -> Result<(), StorageError> {
        self.clients.ensure_schema::<ClientRecord>()?;
        self.profiles.ensure_schema::<ProfileRecord>()?;
        Ok(())
    }

    pub fn store(&self, kind: StoreKind) -> &RecordStore {
        match kind {
            StoreKind::Clients => &self.clients,
            StoreKind::Profiles => &self.profiles,
        }
    }

    pub fn list(&self, kind: StoreKind) -> Result<AdminRows, StorageError> {
        Ok(match kind {
            StoreKind::Clients => AdminRows::Clients(self.clients.list()?),
            StoreKind::Profiles => AdminRows::Profiles(self.profiles.list()?),
        })
    }

    pub fn count(&self, kind: StoreKind) -> Result<i64, StorageError> {
        match kind {
            StoreKind::Clients => self.clients.count::<ClientRecord>(),
            StoreKind::Profiles => self.profiles.count::<ProfileRecord>(),
        }
    }

    /// Add a client row; the breakdown always comes from the allocation table
    pub fn add_client(&self, form: &InvestorForm) -> Result<RecordId, IntakeError> {
        let submission = submit_investor(&self.clients, form, None)?;
        Ok(submission.id)
    }

    /// Add a profile row without attachments
    pub fn add_profile(&self, form: ProfileForm) -> Result<RecordId, IntakeError> {
        form.validate().map_err(IntakeError::Validation)?;
        let record = form.into_record(&[]);
        Ok(self.profiles.insert(&record)?)
    }

    pub fn delete(&self, kind: StoreKind, id: RecordId) -> Result<bool, StorageError> {
        match kind {
            StoreKind::Clients => self.clients.delete_by_id::<ClientRecord>(id),
            StoreKind::Profiles => self.profiles.delete_by_id::<ProfileRecord>(id),
        }
    }

    /// Whole-store SQL dump, named after the store file
    pub fn export_dump(&self, kind: StoreKind) -> Result<Export, StorageError> {
        let store = self.store(kind);
        let bytes = store.dump_all()?;
        Ok(Export::new(format!("{}.sql", store.file_name()), "application/sql", bytes))
    }

    pub fn export_csv(&self, kind: StoreKind) -> Result<Export, StorageError> {
        let bytes = match kind {
            StoreKind::Clients => self.clients.export_csv::<ClientRecord>()?,
            StoreKind::Profiles => self.profiles.export_csv::<ProfileRecord>()?,
        };
        Ok(Export::new(format!("{}.csv", kind), "text/csv", bytes))
    }
}

/// Gate for every admin action
///
/// Both sides are compared as SHA-256 digests so the comparison length
/// does not depend on the guess.
pub fn check_password(configured: Option<&str>, provided: Option<&str>) -> Result<(), AccessError> {
    let Some(expected) = configured else {
        return Err(AccessError::Disabled);
    };
    let provided = provided.ok_or(AccessError::Denied)?;

    if sha256_hex(expected.as_bytes()) == sha256_hex(provided.as_bytes()) {
        Ok(())
    } else {
        tracing::warn!("admin password rejected");
        Err(AccessError::Denied)
    }
}

// ============================================================================
// TESTS
// ============================================================================
