use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Zip code → location entry. Ordered so that serialization is stable.
pub type ZipMapping = BTreeMap<String, ZipEntry>;

/// State code → policy document.
pub type StatePolicies = BTreeMap<String, StatePolicy>;

/// One entry of the zip-mapping document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZipEntry {
    pub state: String,
    pub state_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    pub city: String,
    #[serde(default)]
    pub providers: Vec<String>,
}

impl ZipEntry {
    pub fn location(&self, zip: &str) -> LocationInfo {
        LocationInfo {
            zip: zip.to_string(),
            city: self.city.clone(),
            state: self.state.clone(),
            state_code: self.state_code.clone(),
            county: self.county.clone(),
        }
    }
}

/// Location details returned to callers (the non-provider part of a [`ZipEntry`])
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfo {
    pub zip: String,
    pub city: String,
    pub state: String,
    pub state_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
}

/// Per-state roster document (`data/providers/<state>.json`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderData {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub state_code: String,
    #[serde(default)]
    pub last_updated: String,
    pub providers: Vec<Provider>,
}

impl ProviderData {
    pub fn find(&self, provider_id: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id == provider_id)
    }
}

/// Community solar provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub service_areas: Vec<ServiceArea>,
    pub pricing: Pricing,
    pub features: Features,
    pub contact_info: ContactInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<Promotion>,
    #[serde(default)]
    pub last_updated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceArea {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counties: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_codes: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    /// Percent off the retail rate, e.g. 10.0 = 10%
    pub discount_rate: f64,
    /// USD per month
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_fee: Option<f64>,
    /// Months; 0 means no contract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_length: Option<u32>,
}

impl Pricing {
    /// `discountRate` must be finite and within (0, 100]
    pub fn has_valid_discount(&self) -> bool {
        self.discount_rate.is_finite() && self.discount_rate > 0.0 && self.discount_rate <= 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    pub no_upfront_cost: bool,
    pub cancellable_anytime: bool,
    pub renewable_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub website: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub description: String,
    /// ISO date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

/// Kind of community solar legislation a state has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegislationType {
    Enabling,
    Pilot,
    UtilitySpecific,
}

/// State-level program information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePolicy {
    pub state: String,
    pub state_code: String,
    #[serde(default)]
    pub has_legislation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legislation_type: Option<LegislationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_name: Option<String>,
    pub description: String,
    #[serde(default)]
    pub key_benefits: Vec<String>,
    #[serde(default)]
    pub eligibility: Eligibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_size: Option<MarketSize>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub last_updated: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub residential_allowed: bool,
    pub commercial_allowed: bool,
    pub low_income_programs: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSize {
    pub total_projects: u32,
    #[serde(rename = "totalCapacityMW")]
    pub total_capacity_mw: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub title: String,
    pub url: String,
}

/// Estimated savings for a monthly bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsCalculation {
    pub current_annual_cost: f64,
    pub estimated_savings: f64,
    pub savings_percentage: f64,
    pub new_annual_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_breakdown: Option<Vec<MonthlySavings>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySavings {
    pub month: u32,
    pub savings: f64,
}
