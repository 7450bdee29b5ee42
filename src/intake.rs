// 📥 Intake flows - validate → resolve → persist → (best-effort) side effects
//
// Forms are plain input structs built fresh per submission; nothing is
// carried over between submissions.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use crate::allocation::{category_shares, CapitalBand, CategoryShare, Tier};
use crate::db::{RecordId, RecordStore};
use crate::error::{IntakeError, ValidationError};
use crate::fields::split_list;
use crate::records::{ClientRecord, ProfileRecord};
use crate::report::write_summary;
use crate::upload::{FileUploader, StagedFile};

// ============================================================================
// INVESTOR FORM
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvestorForm {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub tier: String,
    pub capital_band: String,
}

impl InvestorForm {
    /// Every field is required before anything is resolved
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("name", &self.name),
            ("phone", &self.phone),
            ("email", &self.email),
            ("tier", &self.tier),
            ("capital_band", &self.capital_band),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError::required(field, "InvestorForm"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvestorSubmission {
    pub id: RecordId,
    pub record: ClientRecord,
    pub shares: Vec<CategoryShare>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_path: Option<PathBuf>,
}

/// Validate, resolve and persist one investor submission.
///
/// When `simulations_dir` is given a summary file is written after the
/// insert; a failed write is logged and does not undo the record.
pub fn submit_investor(
    store: &RecordStore,
    form: &InvestorForm,
    simulations_dir: Option<&Path>,
) -> Result<InvestorSubmission, IntakeError> {
    form.validate().map_err(IntakeError::Validation)?;

    let tier: Tier = form.tier.parse()?;
    let band: CapitalBand = form.capital_band.parse()?;
    let record = ClientRecord::resolved(&form.name, &form.phone, &form.email, tier, band)?;

    let id = store.insert(&record)?;

    let summary_path = simulations_dir.and_then(|dir| match write_summary(dir, &record) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!(id, error = %e, "could not write simulation summary");
            None
        }
    });

    Ok(InvestorSubmission {
        id,
        shares: category_shares(&record.breakdown),
        record,
        summary_path,
    })
}

// ============================================================================
// PROFILE FORM
// ============================================================================

/// Accept either a JSON array or one comma-separated string
fn list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListInput {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match Option::<ListInput>::deserialize(deserializer)? {
        Some(ListInput::List(items)) => items,
        Some(ListInput::Csv(text)) => split_list(&text),
        None => Vec::new(),
    })
}

/// Unknown keys are rejected rather than silently dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileForm {
    pub company_name: String,
    #[serde(alias = "site")]
    pub website: String,
    pub website_no_site: bool,
    #[serde(deserialize_with = "list_or_csv")]
    pub client_type: Vec<String>,
    pub contact_name: String,
    pub city: String,
    pub email: String,
    /// Area code, two digits
    pub phone_dd: String,
    pub phone_number: String,
    /// Already formatted phone, used when the split parts are empty
    pub phone: String,
    #[serde(deserialize_with = "list_or_csv")]
    pub market_segment: Vec<String>,
    pub address: String,
    pub no_physical_address: bool,
    pub capital: String,
    pub desired_revenue: String,
    #[serde(deserialize_with = "list_or_csv")]
    pub services: Vec<String>,
    #[serde(deserialize_with = "list_or_csv")]
    pub payment_methods: Vec<String>,
    pub source: String,
    pub business_field: String,
    pub business_type: String,
    pub context: String,
    pub return_time: String,
    pub market_analysis: bool,
    pub difficulties: String,
    pub cnpj_or_cpf: String,
    pub employees: String,
}

impl ProfileForm {
    /// `(DD) NUMBER`, falling back to `phone` when neither part was filled
    pub fn phone(&self) -> String {
        let dd = self.phone_dd.trim();
        let number = self.phone_number.trim();
        if dd.is_empty() && number.is_empty() {
            self.phone.trim().to_string()
        } else {
            format!("({}) {}", dd, number)
        }
    }

    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let dd = self.phone_dd.trim();

        if !dd.is_empty() && (dd.len() != 2 || !dd.chars().all(|c| c.is_ascii_digit())) {
            errors.push(ValidationError {
                field: "phone_dd".to_string(),
                message: format!("Area code must be 2 digits, got {:?}", dd),
                context: "ProfileForm".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn into_record(self, attachments: &[Attachment]) -> ProfileRecord {
        let file_for = |kind: AttachmentKind| {
            attachments
                .iter()
                .find(|a| a.kind == kind)
                .map(|a| a.file_name.clone())
        };
        let phone = self.phone();

        ProfileRecord {
            company_name: self.company_name,
            website: if self.website_no_site { String::new() } else { self.website },
            client_type: self.client_type,
            contact_name: self.contact_name,
            city: self.city,
            email: self.email,
            phone,
            market_segment: self.market_segment,
            address: self.address,
            no_physical_address: self.no_physical_address,
            capital: self.capital,
            desired_revenue: self.desired_revenue,
            services: self.services,
            payment_methods: self.payment_methods,
            source: self.source,
            business_field: self.business_field,
            business_type: self.business_type,
            context: self.context,
            return_time: self.return_time,
            market_analysis: self.market_analysis,
            difficulties: self.difficulties,
            cnpj_or_cpf: self.cnpj_or_cpf,
            employees: self.employees,
            logo_path: file_for(AttachmentKind::Logo),
            pdf_path: file_for(AttachmentKind::Pdf),
            video_path: file_for(AttachmentKind::Video),
            submitted_at: Utc::now(),
        }
    }
}

// ============================================================================
// ATTACHMENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Logo,
    Pdf,
    Video,
}

impl AttachmentKind {
    pub fn from_field(name: &str) -> Option<Self> {
        match name {
            "logo" => Some(AttachmentKind::Logo),
            "pdf" => Some(AttachmentKind::Pdf),
            "video" => Some(AttachmentKind::Video),
            _ => None,
        }
    }

    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            AttachmentKind::Logo => &["jpg", "jpeg", "png"],
            AttachmentKind::Pdf => &["pdf"],
            AttachmentKind::Video => &["mp4"],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let ext = Path::new(&self.file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if self.kind.allowed_extensions().contains(&ext.as_str()) {
            Ok(())
        } else {
            Err(ValidationError {
                field: format!("{:?}", self.kind).to_lowercase(),
                message: format!(
                    "File {:?} must be one of: {}",
                    self.file_name,
                    self.kind.allowed_extensions().join(", ")
                ),
                context: "ProfileForm".to_string(),
            })
        }
    }
}

/// Result of one best-effort upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub kind: AttachmentKind,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileSubmission {
    pub id: RecordId,
    pub record: ProfileRecord,
    pub uploads: Vec<UploadOutcome>,
}

/// Where and how attachments are pushed after the insert
pub struct UploadTarget<'a> {
    pub uploader: Option<&'a dyn FileUploader>,
    pub staging_dir: &'a Path,
    pub folder_id: Option<&'a str>,
}

/// Validate and persist a profile, then upload its attachments.
///
/// The insert commits first; every upload failure only yields a warning in
/// the returned outcomes.
pub async fn submit_profile(
    store: &RecordStore,
    target: &UploadTarget<'_>,
    form: ProfileForm,
    attachments: Vec<Attachment>,
) -> Result<ProfileSubmission, IntakeError> {
    let mut errors = form.validate().err().unwrap_or_default();
    errors.extend(attachments.iter().filter_map(|a| a.validate().err()));
    if !errors.is_empty() {
        return Err(IntakeError::Validation(errors));
    }

    let record = form.into_record(&attachments);
    let id = store.insert(&record)?;

    let mut uploads = Vec::with_capacity(attachments.len());
    for attachment in &attachments {
        uploads.push(upload_attachment(target, attachment).await);
    }

    Ok(ProfileSubmission { id, record, uploads })
}

async fn upload_attachment(target: &UploadTarget<'_>, attachment: &Attachment) -> UploadOutcome {
    let mut outcome = UploadOutcome {
        kind: attachment.kind,
        file_name: attachment.file_name.clone(),
        remote_id: None,
        warning: None,
    };

    let Some(uploader) = target.uploader else {
        tracing::warn!(file = %attachment.file_name, "uploads disabled, file kept as reference only");
        outcome.warning = Some("uploads are not configured".to_string());
        return outcome;
    };

    let staged = match StagedFile::write(target.staging_dir, &attachment.file_name, &attachment.bytes).await {
        Ok(staged) => staged,
        Err(e) => {
            tracing::warn!(file = %attachment.file_name, error = %e, "could not stage upload");
            outcome.warning = Some(format!("could not stage file: {}", e));
            return outcome;
        }
    };

    match uploader.upload(&staged.file, target.folder_id).await {
        Ok(remote_id) => outcome.remote_id = Some(remote_id),
        Err(e) => {
            tracing::warn!(file = %attachment.file_name, error = %e, "upload failed");
            outcome.warning = Some(e.to_string());
        }
    }

    staged.remove().await;
    outcome
}

// ============================================================================
// TESTS
// ============================================================================
