// Shared fixture: a throwaway data directory laid out like `data/`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::TempDir;

use community_solar_rs::DataStore;

pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    /// Zip mappings, IL and MA rosters and a policy file. No NY roster.
    pub fn new() -> Self {
        let fixture = Self::empty();
        fixture.write_json("zip-mappings.json", &zip_mappings());
        fixture.write_json("providers/illinois.json", &illinois_roster());
        fixture.write_json("providers/massachusetts.json", &massachusetts_roster());
        fixture.write_json("policies/state-policies.json", &policies());
        fixture
    }

    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.file(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(path, content).expect("write fixture file");
    }

    pub fn write_json(&self, rel: &str, value: &Value) {
        self.write(rel, &serde_json::to_string_pretty(value).expect("render json"));
    }

    pub fn remove(&self, rel: &str) {
        std::fs::remove_file(self.file(rel)).expect("remove fixture file");
    }

    pub fn store(&self) -> Arc<DataStore> {
        Arc::new(DataStore::new(self.path()))
    }
}

pub fn provider(id: &str, name: &str, discount_rate: f64, subscription_fee: Option<f64>) -> Value {
    let mut pricing = json!({ "discountRate": discount_rate, "contractLength": 0 });
    if let Some(fee) = subscription_fee {
        pricing["subscriptionFee"] = json!(fee);
    }
    json!({
        "id": id,
        "name": name,
        "pricing": pricing,
        "features": {
            "noUpfrontCost": true,
            "cancellableAnytime": true,
            "renewablePercentage": 100
        },
        "contactInfo": { "website": "https://example.com" },
        "lastUpdated": "2025-01-15"
    })
}

/// 60601 lists an id ("ghost-il") missing from the IL roster; 62999 lists none.
pub fn zip_mappings() -> Value {
    json!({
        "02108": {
            "state": "Massachusetts", "stateCode": "MA", "county": "Suffolk",
            "city": "Boston", "providers": ["nexamp-ma"]
        },
        "10001": {
            "state": "New York", "stateCode": "NY", "county": "New York",
            "city": "New York", "providers": ["nexamp-ny"]
        },
        "60103": {
            "state": "Illinois", "stateCode": "IL", "county": "DuPage",
            "city": "Bartlett", "providers": ["nexamp-il"]
        },
        "60601": {
            "state": "Illinois", "stateCode": "IL", "county": "Cook",
            "city": "Chicago", "providers": ["arcadia-il", "nexamp-il", "ghost-il"]
        },
        "62999": {
            "state": "Illinois", "stateCode": "IL",
            "city": "Cairo", "providers": []
        }
    })
}

pub fn illinois_roster() -> Value {
    json!({
        "state": "Illinois",
        "stateCode": "IL",
        "lastUpdated": "2025-01-15",
        "providers": [
            provider("nexamp-il", "Nexamp", 10.0, None),
            provider("arcadia-il", "Arcadia", 15.0, Some(10.0)),
            provider("shared-id", "Shared Illinois", 12.0, None)
        ]
    })
}

pub fn massachusetts_roster() -> Value {
    json!({
        "state": "Massachusetts",
        "stateCode": "MA",
        "lastUpdated": "2025-01-15",
        "providers": [
            provider("nexamp-ma", "Nexamp", 20.0, None),
            provider("shared-id", "Shared Massachusetts", 5.0, None)
        ]
    })
}

pub fn policies() -> Value {
    json!({
        "IL": {
            "state": "Illinois",
            "stateCode": "IL",
            "hasLegislation": true,
            "legislationType": "enabling",
            "programName": "Illinois Shines",
            "description": "Adjustable Block Program",
            "keyBenefits": ["No upfront cost"],
            "eligibility": {
                "residentialAllowed": true,
                "commercialAllowed": true,
                "lowIncomePrograms": true
            },
            "marketSize": { "totalProjects": 400, "totalCapacityMW": 1200.5 },
            "resources": [{ "title": "Illinois Shines", "url": "https://illinoisshines.com" }],
            "lastUpdated": "2025-01-15"
        }
    })
}
