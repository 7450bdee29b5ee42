// 📊 Allocation Table - Tier/Band → Budget Breakdown
//
// Every breakdown is derived at compile time from ONE function
// (nominal value × fixed percentage table), so two tiers sharing a band
// can never drift apart.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LookupError;

/// Multiplier from nominal band value to total net worth
pub const NET_WORTH_MULTIPLIER: i64 = 3;

// ============================================================================
// TIER
// ============================================================================

/// Deserializes through `FromStr`, so JSON accepts every spelling the CLI does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Tier {
    Starter,
    Intermediate,
    Advanced,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Starter, Tier::Intermediate, Tier::Advanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Starter => "Starter",
            Tier::Intermediate => "Intermediate",
            Tier::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "starter" | "inicial" => Ok(Tier::Starter),
            "intermediate" | "intermediário" | "intermediario" => Ok(Tier::Intermediate),
            "advanced" | "avançado" | "avancado" => Ok(Tier::Advanced),
            _ => Err(LookupError::UnknownTier(s.to_string())),
        }
    }
}

impl TryFrom<String> for Tier {
    type Error = LookupError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ============================================================================
// CAPITAL BAND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum CapitalBand {
    #[serde(rename = "20k")]
    K20,
    #[serde(rename = "40k")]
    K40,
    #[serde(rename = "60k")]
    K60,
    #[serde(rename = "80k")]
    K80,
    #[serde(rename = "100k")]
    K100,
    #[serde(rename = "200k")]
    K200,
    #[serde(rename = "400k")]
    K400,
    #[serde(rename = "600k")]
    K600,
    #[serde(rename = "800k")]
    K800,
    #[serde(rename = "1M")]
    M1,
}

impl CapitalBand {
    pub const ALL: [CapitalBand; 10] = [
        CapitalBand::K20,
        CapitalBand::K40,
        CapitalBand::K60,
        CapitalBand::K80,
        CapitalBand::K100,
        CapitalBand::K200,
        CapitalBand::K400,
        CapitalBand::K600,
        CapitalBand::K800,
        CapitalBand::M1,
    ];

    /// Nominal capital in whole currency units
    pub const fn nominal(&self) -> i64 {
        match self {
            CapitalBand::K20 => 20_000,
            CapitalBand::K40 => 40_000,
            CapitalBand::K60 => 60_000,
            CapitalBand::K80 => 80_000,
            CapitalBand::K100 => 100_000,
            CapitalBand::K200 => 200_000,
            CapitalBand::K400 => 400_000,
            CapitalBand::K600 => 600_000,
            CapitalBand::K800 => 800_000,
            CapitalBand::M1 => 1_000_000,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CapitalBand::K20 => "20k",
            CapitalBand::K40 => "40k",
            CapitalBand::K60 => "60k",
            CapitalBand::K80 => "80k",
            CapitalBand::K100 => "100k",
            CapitalBand::K200 => "200k",
            CapitalBand::K400 => "400k",
            CapitalBand::K600 => "600k",
            CapitalBand::K800 => "800k",
            CapitalBand::M1 => "1M",
        }
    }
}

impl fmt::Display for CapitalBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl FromStr for CapitalBand {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(' ', "");
        let band = match key.as_str() {
            "20k" | "20mil" => CapitalBand::K20,
            "40k" | "40mil" => CapitalBand::K40,
            "60k" | "60mil" => CapitalBand::K60,
            "80k" | "80mil" => CapitalBand::K80,
            "100k" | "100mil" => CapitalBand::K100,
            "200k" | "200mil" => CapitalBand::K200,
            "400k" | "400mil" => CapitalBand::K400,
            "600k" | "600mil" => CapitalBand::K600,
            "800k" | "800mil" => CapitalBand::K800,
            "1m" | "1milhão" | "1milhao" | "1-million" => CapitalBand::M1,
            _ => return Err(LookupError::UnknownBand(s.to_string())),
        };
        Ok(band)
    }
}

impl TryFrom<String> for CapitalBand {
    type Error = LookupError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ============================================================================
// BUDGET CATEGORIES
// ============================================================================

/// Budget categories in their fixed display/storage order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    InvestmentContribution,
    EmergencyReserve,
    SetupCosts,
    TrafficCosts,
    TrainingBudget,
    InfrastructureBudget,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::InvestmentContribution,
        Category::EmergencyReserve,
        Category::SetupCosts,
        Category::TrafficCosts,
        Category::TrainingBudget,
        Category::InfrastructureBudget,
    ];

    /// Share of the nominal band value, in percent
    pub const fn percent(&self) -> i64 {
        match self {
            Category::InvestmentContribution => 10,
            Category::EmergencyReserve => 30,
            Category::SetupCosts => 10,
            Category::TrafficCosts => 20,
            Category::TrainingBudget => 15,
            Category::InfrastructureBudget => 15,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::InvestmentContribution => "10% investment contribution",
            Category::EmergencyReserve => "30% emergency reserve",
            Category::SetupCosts => "10% setup costs",
            Category::TrafficCosts => "20% traffic costs",
            Category::TrainingBudget => "15% business training",
            Category::InfrastructureBudget => "15% infrastructure",
        }
    }

    /// Column name in the clients table
    pub fn column(&self) -> &'static str {
        match self {
            Category::InvestmentContribution => "investment_contribution",
            Category::EmergencyReserve => "emergency_reserve",
            Category::SetupCosts => "setup_costs",
            Category::TrafficCosts => "traffic_costs",
            Category::TrainingBudget => "training_budget",
            Category::InfrastructureBudget => "infrastructure_budget",
        }
    }
}

// ============================================================================
// BREAKDOWN
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllocationBreakdown {
    pub total_net_worth: i64,
    pub investment_contribution: i64,
    pub emergency_reserve: i64,
    pub setup_costs: i64,
    pub traffic_costs: i64,
    pub training_budget: i64,
    pub infrastructure_budget: i64,
}

impl AllocationBreakdown {
    /// The single derivation every table entry goes through
    pub const fn from_nominal(nominal: i64) -> Self {
        AllocationBreakdown {
            total_net_worth: nominal * NET_WORTH_MULTIPLIER,
            investment_contribution: nominal * Category::InvestmentContribution.percent() / 100,
            emergency_reserve: nominal * Category::EmergencyReserve.percent() / 100,
            setup_costs: nominal * Category::SetupCosts.percent() / 100,
            traffic_costs: nominal * Category::TrafficCosts.percent() / 100,
            training_budget: nominal * Category::TrainingBudget.percent() / 100,
            infrastructure_budget: nominal * Category::InfrastructureBudget.percent() / 100,
        }
    }

    pub fn amount(&self, category: Category) -> i64 {
        match category {
            Category::InvestmentContribution => self.investment_contribution,
            Category::EmergencyReserve => self.emergency_reserve,
            Category::SetupCosts => self.setup_costs,
            Category::TrafficCosts => self.traffic_costs,
            Category::TrainingBudget => self.training_budget,
            Category::InfrastructureBudget => self.infrastructure_budget,
        }
    }

    /// Category amounts in fixed order (total excluded)
    pub fn category_amounts(&self) -> [i64; 6] {
        Category::ALL.map(|c| self.amount(c))
    }

    pub fn categories_sum(&self) -> i64 {
        self.category_amounts().iter().sum()
    }
}

// ============================================================================
// STATIC TABLE
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct TableEntry {
    pub tier: Tier,
    pub band: CapitalBand,
    pub breakdown: AllocationBreakdown,
}

const fn entry(tier: Tier, band: CapitalBand) -> TableEntry {
    TableEntry {
        tier,
        band,
        breakdown: AllocationBreakdown::from_nominal(band.nominal()),
    }
}

/// Every legal (tier, band) pair, in selection order
pub static ALLOCATION_TABLE: [TableEntry; 11] = [
    entry(Tier::Starter, CapitalBand::K20),
    entry(Tier::Starter, CapitalBand::K40),
    entry(Tier::Starter, CapitalBand::K60),
    entry(Tier::Starter, CapitalBand::K80),
    entry(Tier::Starter, CapitalBand::K100),
    entry(Tier::Intermediate, CapitalBand::K200),
    entry(Tier::Intermediate, CapitalBand::K400),
    entry(Tier::Intermediate, CapitalBand::K600),
    entry(Tier::Intermediate, CapitalBand::K800),
    entry(Tier::Intermediate, CapitalBand::M1),
    entry(Tier::Advanced, CapitalBand::M1),
];

static STARTER_BANDS: [CapitalBand; 5] = [
    CapitalBand::K20,
    CapitalBand::K40,
    CapitalBand::K60,
    CapitalBand::K80,
    CapitalBand::K100,
];

static INTERMEDIATE_BANDS: [CapitalBand; 5] = [
    CapitalBand::K200,
    CapitalBand::K400,
    CapitalBand::K600,
    CapitalBand::K800,
    CapitalBand::M1,
];

static ADVANCED_BANDS: [CapitalBand; 1] = [CapitalBand::M1];

/// Selectable bands for a tier
pub fn bands_for(tier: Tier) -> &'static [CapitalBand] {
    match tier {
        Tier::Starter => &STARTER_BANDS,
        Tier::Intermediate => &INTERMEDIATE_BANDS,
        Tier::Advanced => &ADVANCED_BANDS,
    }
}

/// Look up the breakdown for a (tier, band) pair
pub fn resolve(tier: Tier, band: CapitalBand) -> Result<AllocationBreakdown, LookupError> {
    ALLOCATION_TABLE
        .iter()
        .find(|e| e.tier == tier && e.band == band)
        .map(|e| e.breakdown)
        .ok_or(LookupError::InvalidCombination { tier, band })
}

/// Parse labels then resolve; used by the CLI and HTTP surfaces
pub fn resolve_labels(tier: &str, band: &str) -> Result<(Tier, CapitalBand, AllocationBreakdown), LookupError> {
    let tier: Tier = tier.parse()?;
    let band: CapitalBand = band.parse()?;
    let breakdown = resolve(tier, band)?;
    Ok((tier, band, breakdown))
}

// ============================================================================
// CHART PROJECTION
// ============================================================================

/// One slice of the pie chart handed to the plotting collaborator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: Category,
    pub label: &'static str,
    pub amount: i64,
    /// Share of the category sum, 0.0..=100.0
    pub percent: f64,
}

pub fn category_shares(breakdown: &AllocationBreakdown) -> Vec<CategoryShare> {
    let sum = breakdown.categories_sum();

    Category::ALL
        .iter()
        .map(|&category| {
            let amount = breakdown.amount(category);
            let percent = if sum == 0 {
                0.0
            } else {
                amount as f64 * 100.0 / sum as f64
            };
            CategoryShare {
                category,
                label: category.label(),
                amount,
                percent,
            }
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starter_20k_scenario() {
        let b = resolve(Tier::Starter, CapitalBand::K20).unwrap();

        assert_eq!(b.total_net_worth, 60_000);
        assert_eq!(b.category_amounts(), [2_000, 6_000, 2_000, 4_000, 3_000, 3_000]);
        // Categories add up to the nominal value, not the total
        assert_eq!(b.categories_sum(), 20_000);
        assert_ne!(b.categories_sum(), b.total_net_worth);
    }

    #[test]
    fn test_intermediate_200k_scenario() {
        let b = resolve(Tier::Intermediate, CapitalBand::K200).unwrap();

        assert_eq!(b.total_net_worth, 600_000);
        assert_eq!(
            b.category_amounts(),
            [20_000, 60_000, 20_000, 40_000, 30_000, 30_000]
        );
    }

    #[test]
    fn test_shared_million_band_is_identical() {
        let advanced = resolve(Tier::Advanced, CapitalBand::M1).unwrap();
        let intermediate = resolve(Tier::Intermediate, CapitalBand::M1).unwrap();

        assert_eq!(advanced, intermediate);
        assert_eq!(advanced.total_net_worth, 3_000_000);
    }

    #[test]
    fn test_every_entry_follows_percentages() {
        for e in ALLOCATION_TABLE.iter() {
            let nominal = e.band.nominal();
            assert_eq!(e.breakdown.total_net_worth, nominal * 3, "{} {}", e.tier, e.band);
            for c in Category::ALL {
                assert_eq!(e.breakdown.amount(c) * 100, nominal * c.percent());
            }
            assert_eq!(e.breakdown.categories_sum(), nominal);
        }
    }

    #[test]
    fn test_unlisted_pair_is_rejected() {
        let err = resolve(Tier::Advanced, CapitalBand::K20).unwrap_err();
        assert_eq!(
            err,
            LookupError::InvalidCombination {
                tier: Tier::Advanced,
                band: CapitalBand::K20
            }
        );

        assert!(resolve(Tier::Starter, CapitalBand::K200).is_err());
        assert!(resolve(Tier::Intermediate, CapitalBand::K100).is_err());
    }

    #[test]
    fn test_table_matches_band_lists() {
        for tier in Tier::ALL {
            for band in CapitalBand::ALL {
                let listed = bands_for(tier).contains(&band);
                assert_eq!(resolve(tier, band).is_ok(), listed, "{} {}", tier, band);
            }
        }
        assert_eq!(bands_for(Tier::Starter).len(), 5);
        assert_eq!(bands_for(Tier::Advanced), &[CapitalBand::M1]);
    }

    #[test]
    fn test_parse_original_labels() {
        assert_eq!("Inicial".parse::<Tier>().unwrap(), Tier::Starter);
        assert_eq!("Avançado".parse::<Tier>().unwrap(), Tier::Advanced);
        assert_eq!("1milhão".parse::<CapitalBand>().unwrap(), CapitalBand::M1);
        assert_eq!("1 milhão".parse::<CapitalBand>().unwrap(), CapitalBand::M1);
        assert_eq!("40mil".parse::<CapitalBand>().unwrap(), CapitalBand::K40);
        assert!("Mais de 1 milhão".parse::<CapitalBand>().is_err());
        assert!("Expert".parse::<Tier>().is_err());
    }

    #[test]
    fn test_resolve_labels() {
        let (tier, band, b) = resolve_labels("starter", "20k").unwrap();
        assert_eq!(tier, Tier::Starter);
        assert_eq!(band, CapitalBand::K20);
        assert_eq!(b.total_net_worth, 60_000);

        assert!(matches!(
            resolve_labels("advanced", "20k"),
            Err(LookupError::InvalidCombination { .. })
        ));
    }

    #[test]
    fn test_category_shares_exclude_total() {
        let b = resolve(Tier::Starter, CapitalBand::K20).unwrap();
        let shares = category_shares(&b);

        assert_eq!(shares.len(), 6);
        assert!(shares.iter().all(|s| s.amount != b.total_net_worth));
        assert_eq!(shares[1].category, Category::EmergencyReserve);
        assert!((shares[1].percent - 30.0).abs() < 1e-9);

        let total: f64 = shares.iter().map(|s| s.percent).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_serde_labels() {
        let json = serde_json::to_string(&CapitalBand::M1).unwrap();
        assert_eq!(json, "\"1M\"");

        let band: CapitalBand = serde_json::from_str("\"20mil\"").unwrap();
        assert_eq!(band, CapitalBand::K20);

        let tier: Tier = serde_json::from_str("\"Intermediário\"").unwrap();
        assert_eq!(tier, Tier::Intermediate);
    }

    #[test]
    fn test_json_and_text_parsing_agree() {
        for label in ["1-million", "1 milhão", "1milhao", " 1M "] {
            let json = serde_json::to_string(label).unwrap();
            assert_eq!(serde_json::from_str::<CapitalBand>(&json).unwrap(), CapitalBand::M1, "{}", label);
            assert_eq!(label.parse::<CapitalBand>().unwrap(), CapitalBand::M1);
        }
        for label in ["avancado", "STARTER", "intermediario"] {
            let json = serde_json::to_string(label).unwrap();
            let parsed: Tier = label.parse().unwrap();
            assert_eq!(serde_json::from_str::<Tier>(&json).unwrap(), parsed, "{}", label);
        }

        assert!(serde_json::from_str::<Tier>("\"Expert\"").is_err());
        let err = serde_json::from_str::<CapitalBand>("\"5k\"").unwrap_err();
        assert!(err.to_string().contains("5k"));

        // Output labels stay canonical
        assert_eq!(serde_json::to_string(&Tier::Advanced).unwrap(), "\"Advanced\"");
        assert_eq!(serde_json::to_string(&CapitalBand::K200).unwrap(), "\"200k\"");
    }
}
