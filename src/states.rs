//! Supported-state table.
//!
//! A single table drives both the mapping generator and the data store: which
//! states are served, their display names, roster file names, the provider ids
//! stamped into every zip of the state, and the data used by range generation.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Inclusive numeric zip code range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZipRange {
    pub start: u32,
    pub end: u32,
}

/// Configuration for one supported state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    /// Two-letter code, e.g. "IL"
    pub code: String,
    /// Display name, e.g. "Illinois"
    pub name: String,
    /// URL slug used by the state page, e.g. "new-york"
    pub slug: String,
    /// Roster file name under `providers/`
    pub roster_file: String,
    /// Provider ids attached to every zip in the state
    #[serde(default)]
    pub providers: Vec<String>,
    #[serde(default)]
    pub zip_ranges: Vec<ZipRange>,
    /// 3-digit zip prefix → coarse city name
    #[serde(default)]
    pub prefix_cities: BTreeMap<String, String>,
}

impl StateConfig {
    /// City for a zip in range mode, falling back to "City in {name}"
    pub fn city_for_zip(&self, zip: &str) -> String {
        zip.get(..3)
            .and_then(|prefix| self.prefix_cities.get(prefix))
            .cloned()
            .unwrap_or_else(|| format!("City in {}", self.name))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateTableError {
    #[error("failed to read state table {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid state table: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("state table has no states")]
    Empty,
    #[error("duplicate state code {0}")]
    Duplicate(String),
}

/// Ordered list of supported states. Order is the search order for
/// provider lookups that do not name a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTable {
    states: Vec<StateConfig>,
}

impl StateTable {
    pub fn new(states: Vec<StateConfig>) -> Result<Self, StateTableError> {
        if states.is_empty() {
            return Err(StateTableError::Empty);
        }
        for (i, state) in states.iter().enumerate() {
            if states[..i].iter().any(|s| s.code == state.code) {
                return Err(StateTableError::Duplicate(state.code.clone()));
            }
        }
        Ok(Self { states })
    }

    /// Parse a TOML table of `[[states]]` entries
    pub fn from_toml_str(s: &str) -> Result<Self, StateTableError> {
        #[derive(Deserialize)]
        struct File {
            states: Vec<StateConfig>,
        }
        let file: File = toml::from_str(s)?;
        Self::new(file.states)
    }

    pub fn load(path: &Path) -> Result<Self, StateTableError> {
        let content = std::fs::read_to_string(path).map_err(|source| StateTableError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn get(&self, code: &str) -> Option<&StateConfig> {
        self.states.iter().find(|s| s.code == code)
    }

    pub fn by_slug(&self, slug: &str) -> Option<&StateConfig> {
        self.states.iter().find(|s| s.slug == slug)
    }

    pub fn is_supported(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(|s| s.code.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateConfig> {
        self.states.iter()
    }
}

impl Default for StateTable {
    fn default() -> Self {
        Self {
            states: vec![illinois(), new_york(), massachusetts(), minnesota()],
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn cities(items: &[(&str, &str)]) -> BTreeMap<String, String> {
    items
        .iter()
        .map(|(prefix, city)| (prefix.to_string(), city.to_string()))
        .collect()
}

fn illinois() -> StateConfig {
    StateConfig {
        code: "IL".to_string(),
        name: "Illinois".to_string(),
        slug: "illinois".to_string(),
        roster_file: "illinois.json".to_string(),
        providers: strings(&[
            "clearway-il",
            "sunscription-il",
            "nexamp-il",
            "common-energy-il",
            "solstice-il",
            "ampion-il",
            "arcadia-il",
            "gejc-il",
            "igs-il",
            "illinois-community-solar",
            "mc2-il",
            "powermarket-il",
            "solar-landscape-il",
        ]),
        zip_ranges: vec![
            ZipRange { start: 60001, end: 60999 },
            ZipRange { start: 61001, end: 62999 },
        ],
        prefix_cities: cities(&[
            ("600", "Chicago"),
            ("601", "Chicago"),
            ("606", "Chicago"),
            ("607", "Chicago"),
            ("608", "Chicago"),
            ("610", "Rockford"),
            ("615", "Peoria"),
            ("617", "Bloomington"),
            ("618", "Centralia"),
            ("620", "East St. Louis"),
            ("625", "Carbondale"),
            ("627", "Springfield"),
        ]),
    }
}

fn new_york() -> StateConfig {
    StateConfig {
        code: "NY".to_string(),
        name: "New York".to_string(),
        slug: "new-york".to_string(),
        roster_file: "new-york.json".to_string(),
        providers: strings(&["clearway-ny", "nexamp-ny", "common-energy-ny", "sunscription-ny"]),
        zip_ranges: vec![
            ZipRange { start: 10001, end: 14999 },
            // Fishers Island
            ZipRange { start: 6390, end: 6390 },
        ],
        prefix_cities: cities(&[
            ("100", "New York"),
            ("101", "New York"),
            ("102", "New York"),
            ("103", "New York"),
            ("104", "Bronx"),
            ("105", "Westchester"),
            ("110", "Queens"),
            ("111", "Queens"),
            ("112", "Brooklyn"),
            ("113", "Flushing"),
            ("114", "Jamaica"),
            ("116", "Far Rockaway"),
            ("117", "Hicksville"),
            ("118", "Riverhead"),
            ("120", "Albany"),
            ("122", "Albany"),
            ("130", "Syracuse"),
            ("132", "Syracuse"),
            ("140", "Rochester"),
            ("142", "Buffalo"),
            ("143", "Niagara Falls"),
        ]),
    }
}

fn massachusetts() -> StateConfig {
    StateConfig {
        code: "MA".to_string(),
        name: "Massachusetts".to_string(),
        slug: "massachusetts".to_string(),
        roster_file: "massachusetts.json".to_string(),
        providers: strings(&["clearway-ma", "nexamp-ma", "solstice-ma", "common-energy-ma"]),
        zip_ranges: vec![
            ZipRange { start: 1001, end: 2799 },
            ZipRange { start: 5501, end: 5544 },
        ],
        prefix_cities: cities(&[
            ("010", "Springfield"),
            ("011", "Springfield"),
            ("012", "Pittsfield"),
            ("013", "Greenfield"),
            ("014", "Fitchburg"),
            ("015", "Worcester"),
            ("016", "Worcester"),
            ("017", "Framingham"),
            ("018", "Woburn"),
            ("019", "Lynn"),
            ("020", "Brockton"),
            ("021", "Boston"),
            ("022", "Cambridge"),
            ("023", "Brockton"),
            ("024", "Brockton"),
            ("025", "Cape Cod"),
            ("026", "Cape Cod"),
            ("027", "New Bedford"),
        ]),
    }
}

fn minnesota() -> StateConfig {
    StateConfig {
        code: "MN".to_string(),
        name: "Minnesota".to_string(),
        slug: "minnesota".to_string(),
        roster_file: "minnesota.json".to_string(),
        providers: strings(&["clearway-mn", "cef-mn", "sunshare-mn", "nexamp-mn"]),
        zip_ranges: vec![ZipRange { start: 55001, end: 56799 }],
        prefix_cities: cities(&[
            ("550", "Minneapolis"),
            ("551", "St. Paul"),
            ("553", "Minneapolis"),
            ("554", "Minneapolis"),
            ("555", "Minneapolis"),
            ("560", "Mankato"),
            ("565", "Rochester"),
            ("566", "Duluth"),
            ("567", "Thief River Falls"),
        ]),
    }
}
