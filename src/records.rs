// 🗂️ Persisted records - investor allocations and client profiles
//
// Both are insert-once: the admin panel deletes whole rows, never edits.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::allocation::{resolve, AllocationBreakdown, CapitalBand, Category, Tier};
use crate::db::{decode_err, get_flag, get_list, get_opt_text, get_text, Record};
use crate::error::{LookupError, StorageError};
use crate::fields::{normalize, FieldValue, StorageValue};

// ============================================================================
// CLIENT RECORD (investor allocation form)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub tier: Tier,
    pub capital_band: CapitalBand,
    #[serde(flatten)]
    pub breakdown: AllocationBreakdown,
    pub submitted_at: DateTime<Utc>,
}

impl ClientRecord {
    /// Build a record whose breakdown comes from the allocation table
    pub fn resolved(
        name: &str,
        phone: &str,
        email: &str,
        tier: Tier,
        capital_band: CapitalBand,
    ) -> Result<Self, LookupError> {
        let breakdown = resolve(tier, capital_band)?;

        Ok(ClientRecord {
            name: name.trim().to_string(),
            phone: phone.trim().to_string(),
            email: email.trim().to_string(),
            tier,
            capital_band,
            breakdown,
            submitted_at: Utc::now(),
        })
    }
}

impl Record for ClientRecord {
    const TABLE: &'static str = "clients";

    const SCHEMA: &'static str = "CREATE TABLE IF NOT EXISTS clients (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        phone TEXT NOT NULL,
        email TEXT NOT NULL,
        tier TEXT NOT NULL,
        capital_band TEXT NOT NULL,
        total_net_worth INTEGER NOT NULL,
        investment_contribution INTEGER NOT NULL,
        emergency_reserve INTEGER NOT NULL,
        setup_costs INTEGER NOT NULL,
        traffic_costs INTEGER NOT NULL,
        training_budget INTEGER NOT NULL,
        infrastructure_budget INTEGER NOT NULL,
        submitted_at TEXT NOT NULL
    )";

    fn columns(&self) -> Vec<(&'static str, StorageValue)> {
        let mut columns = vec![
            ("name", normalize(FieldValue::from(self.name.clone()))),
            ("phone", normalize(FieldValue::from(self.phone.clone()))),
            ("email", normalize(FieldValue::from(self.email.clone()))),
            ("tier", normalize(FieldValue::from(self.tier.as_str()))),
            ("capital_band", normalize(FieldValue::from(self.capital_band.label()))),
            ("total_net_worth", normalize(FieldValue::from(self.breakdown.total_net_worth))),
        ];

        for category in Category::ALL {
            columns.push((
                category.column(),
                normalize(FieldValue::from(self.breakdown.amount(category))),
            ));
        }

        columns.push(("submitted_at", normalize(FieldValue::from(self.submitted_at.to_rfc3339()))));
        columns
    }

    fn from_row(row: &Row<'_>) -> Result<Self, StorageError> {
        let tier_text = get_text(row, "tier")?;
        let band_text = get_text(row, "capital_band")?;
        let submitted_text = get_text(row, "submitted_at")?;

        let tier: Tier = tier_text.parse().map_err(|e| decode_err("tier", e))?;
        let capital_band: CapitalBand = band_text.parse().map_err(|e| decode_err("capital_band", e))?;
        let submitted_at = DateTime::parse_from_rfc3339(&submitted_text)
            .map_err(|e| decode_err("submitted_at", e))?
            .with_timezone(&Utc);

        Ok(ClientRecord {
            name: get_text(row, "name")?,
            phone: get_text(row, "phone")?,
            email: get_text(row, "email")?,
            tier,
            capital_band,
            breakdown: AllocationBreakdown {
                total_net_worth: row.get("total_net_worth")?,
                investment_contribution: row.get("investment_contribution")?,
                emergency_reserve: row.get("emergency_reserve")?,
                setup_costs: row.get("setup_costs")?,
                traffic_costs: row.get("traffic_costs")?,
                training_budget: row.get("training_budget")?,
                infrastructure_budget: row.get("infrastructure_budget")?,
            },
            submitted_at,
        })
    }
}

// ============================================================================
// PROFILE RECORD (client profile intake form)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub company_name: String,
    pub website: String,
    pub client_type: Vec<String>,
    pub contact_name: String,
    pub city: String,
    pub email: String,
    pub phone: String,
    pub market_segment: Vec<String>,
    pub address: String,
    pub no_physical_address: bool,
    pub capital: String,
    pub desired_revenue: String,
    pub services: Vec<String>,
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
    pub logo_path: Option<String>,
    pub pdf_path: Option<String>,
    pub video_path: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl Record for ProfileRecord {
    const TABLE: &'static str = "profiles";

    const SCHEMA: &'static str = "CREATE TABLE IF NOT EXISTS profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        company_name TEXT, website TEXT, client_type TEXT,
        contact_name TEXT, city TEXT, email TEXT, phone TEXT,
        market_segment TEXT, address TEXT, no_physical_address BOOLEAN,
        capital TEXT, desired_revenue TEXT, services TEXT, payment_methods TEXT,
        source TEXT, business_field TEXT, business_type TEXT, context TEXT,
        return_time TEXT, market_analysis BOOLEAN, difficulties TEXT,
        cnpj_or_cpf TEXT, employees TEXT,
        logo_path TEXT, pdf_path TEXT, video_path TEXT,
        submitted_at TEXT NOT NULL
    )";

    fn columns(&self) -> Vec<(&'static str, StorageValue)> {
        let fields: Vec<(&'static str, FieldValue)> = vec![
            ("company_name", self.company_name.clone().into()),
            ("website", self.website.clone().into()),
            ("client_type", self.client_type.clone().into()),
            ("contact_name", self.contact_name.clone().into()),
            ("city", self.city.clone().into()),
            ("email", self.email.clone().into()),
            ("phone", self.phone.clone().into()),
            ("market_segment", self.market_segment.clone().into()),
            ("address", self.address.clone().into()),
            ("no_physical_address", self.no_physical_address.into()),
            ("capital", self.capital.clone().into()),
            ("desired_revenue", self.desired_revenue.clone().into()),
            ("services", self.services.clone().into()),
            ("payment_methods", self.payment_methods.clone().into()),
            ("source", self.source.clone().into()),
            ("business_field", self.business_field.clone().into()),
            ("business_type", self.business_type.clone().into()),
            ("context", self.context.clone().into()),
            ("return_time", self.return_time.clone().into()),
            ("market_analysis", self.market_analysis.into()),
            ("difficulties", self.difficulties.clone().into()),
            ("cnpj_or_cpf", self.cnpj_or_cpf.clone().into()),
            ("employees", self.employees.clone().into()),
            ("logo_path", self.logo_path.clone().into()),
            ("pdf_path", self.pdf_path.clone().into()),
            ("video_path", self.video_path.clone().into()),
            ("submitted_at", self.submitted_at.to_rfc3339().into()),
        ];

        fields
            .into_iter()
            .map(|(column, value)| (column, normalize(value)))
            .collect()
    }

    fn from_row(row: &Row<'_>) -> Result<Self, StorageError> {
        let submitted_text = get_text(row, "submitted_at")?;
        let submitted_at = DateTime::parse_from_rfc3339(&submitted_text)
            .map_err(|e| decode_err("submitted_at", e))?
            .with_timezone(&Utc);

        Ok(ProfileRecord {
            company_name: get_text(row, "company_name")?,
            website: get_text(row, "website")?,
            client_type: get_list(row, "client_type")?,
            contact_name: get_text(row, "contact_name")?,
            city: get_text(row, "city")?,
            email: get_text(row, "email")?,
            phone: get_text(row, "phone")?,
            market_segment: get_list(row, "market_segment")?,
            address: get_text(row, "address")?,
            no_physical_address: get_flag(row, "no_physical_address")?,
            capital: get_text(row, "capital")?,
            desired_revenue: get_text(row, "desired_revenue")?,
            services: get_list(row, "services")?,
            payment_methods: get_list(row, "payment_methods")?,
            source: get_text(row, "source")?,
            business_field: get_text(row, "business_field")?,
            business_type: get_text(row, "business_type")?,
            context: get_text(row, "context")?,
            return_time: get_text(row, "return_time")?,
            market_analysis: get_flag(row, "market_analysis")?,
            difficulties: get_text(row, "difficulties")?,
            cnpj_or_cpf: get_text(row, "cnpj_or_cpf")?,
            employees: get_text(row, "employees")?,
            logo_path: get_opt_text(row, "logo_path")?,
            pdf_path: get_opt_text(row, "pdf_path")?,
            video_path: get_opt_text(row, "video_path")?,
            submitted_at,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RecordStore;

    fn temp_store<R: Record>(file: &str) -> (tempfile::TempDir, RecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join(file));
        store.ensure_schema::<R>().unwrap();
        (dir, store)
    }

    fn sample_profile() -> ProfileRecord {
        ProfileRecord {
            company_name: "Acme Ltda".to_string(),
            website: "https://acme.example".to_string(),
            client_type: vec!["MEI".to_string(), "Startup".to_string()],
            contact_name: "Ana".to_string(),
            city: "Recife".to_string(),
            email: "ana@acme.example".to_string(),
            phone: "(81) 99999-0000".to_string(),
            market_segment: vec!["B2B".to_string()],
            address: String::new(),
            no_physical_address: true,
            capital: "200mil".to_string(),
            desired_revenue: "1M/yr".to_string(),
            services: vec!["Consultoria".to_string(), "Marketing Digital".to_string()],
            payment_methods: vec!["Pix".to_string(), "Cartão de Crédito".to_string()],
            source: "Instagram".to_string(),
            business_field: "Food".to_string(),
            business_type: "Restaurant".to_string(),
            context: "Expanding, second unit".to_string(),
            return_time: "12 months".to_string(),
            market_analysis: false,
            difficulties: "Hiring".to_string(),
            cnpj_or_cpf: "12.345.678/0001-90".to_string(),
            employees: "12".to_string(),
            logo_path: Some("logo.png".to_string()),
            pdf_path: None,
            video_path: None,
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolved_client_uses_table() {
        let record = ClientRecord::resolved(" Ana ", "81 9999", "ana@x.com", Tier::Starter, CapitalBand::K20)
            .unwrap();

        assert_eq!(record.name, "Ana");
        assert_eq!(record.breakdown.total_net_worth, 60_000);
        assert_eq!(record.breakdown.emergency_reserve, 6_000);
    }

    #[test]
    fn test_resolved_client_rejects_invalid_pair() {
        let err = ClientRecord::resolved("Ana", "1", "a@b.c", Tier::Advanced, CapitalBand::K40).unwrap_err();
        assert!(matches!(err, LookupError::InvalidCombination { .. }));
    }

    #[test]
    fn test_client_round_trip() {
        let (_dir, store) = temp_store::<ClientRecord>("clientes.db");
        let record =
            ClientRecord::resolved("Bruno", "11 98888-7777", "bruno@x.com", Tier::Intermediate, CapitalBand::M1)
                .unwrap();

        let id = store.insert(&record).unwrap();
        let listed = store.list::<ClientRecord>().unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].record, record);
    }

    #[test]
    fn test_profile_round_trip_keeps_lists() {
        let (_dir, store) = temp_store::<ProfileRecord>("client_profiles.db");
        let profile = sample_profile();

        store.insert(&profile).unwrap();
        let listed = store.list::<ProfileRecord>().unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].record, profile);
        assert_eq!(listed[0].record.payment_methods[1], "Cartão de Crédito");
    }

    #[test]
    fn test_profile_lists_stored_as_json_text() {
        let (_dir, store) = temp_store::<ProfileRecord>("client_profiles.db");
        store.insert(&sample_profile()).unwrap();

        let conn = rusqlite::Connection::open(store.path()).unwrap();
        let services: String = conn
            .query_row("SELECT services FROM profiles", [], |row| row.get(0))
            .unwrap();
        assert_eq!(services, r#"["Consultoria","Marketing Digital"]"#);
    }

    #[test]
    fn test_client_json_shape() {
        let record = ClientRecord::resolved("Ana", "1", "a@b.c", Tier::Starter, CapitalBand::K40).unwrap();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["tier"], "Starter");
        assert_eq!(json["capital_band"], "40k");
        assert_eq!(json["total_net_worth"], 120_000);
        assert_eq!(json["investment_contribution"], 4_000);
    }
}
