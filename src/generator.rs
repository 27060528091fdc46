//! Offline builder for the zip-mapping document.
//!
//! Two sources produce the same [`ZipMapping`] schema:
//! - a zip reference dataset (delimited text), filtered to the supported
//!   states and overlaid with manual corrections
//! - per-state numeric zip ranges, with coarse city names from a prefix table
//!
//! Every zip in a state gets the state's full provider list.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::csv::Table;
use crate::states::StateTable;
use crate::types::{LocationInfo, ProviderData, ZipEntry, ZipMapping};
use crate::zipcode;

pub const DEFAULT_INPUT_PATH: &str = "data/zip-database.csv";
pub const DEFAULT_OUTPUT_PATH: &str = "data/zip-mappings.json";

/// Zips printed after a run so corrections can be eyeballed
pub const SPOT_CHECK_ZIPS: [&str; 3] = ["60103", "60108", "60601"];

const MISSING_INPUT_HINT: &str = "Download a US zip code database as CSV with zipcode, state_abbr, city \
and county columns (for example from https://github.com/scpike/us-state-county-zip), save it at the \
path above, and run again. To build coarse mappings without a dataset use --mode ranges.";

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("zip code database not found at {path}\n{hint}")]
    MissingInput { path: String, hint: &'static str },
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("column '{0}' not found in the zip code database header")]
    MissingColumn(String),
    #[error("invalid corrections file {path}: {source}")]
    Corrections {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to serialize zip mappings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Manual fix for a zip whose dataset city is wrong
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Correction {
    pub city: String,
    #[serde(default)]
    pub county: Option<String>,
}

/// Zip → correction table, matched by exact zip
#[derive(Debug, Clone, PartialEq)]
pub struct Corrections(BTreeMap<String, Correction>);

impl Corrections {
    pub fn new(entries: BTreeMap<String, Correction>) -> Self {
        Self(entries)
    }

    /// Load from a TOML or JSON file of `"zip" = { city, county }` entries
    pub fn load(path: &Path) -> Result<Self, GenerationError> {
        let content = std::fs::read_to_string(path).map_err(|source| GenerationError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        type Parsed = Result<BTreeMap<String, Correction>, Box<dyn std::error::Error + Send + Sync>>;
        let parsed: Parsed = if is_json {
            serde_json::from_str(&content).map_err(Into::into)
        } else {
            toml::from_str(&content).map_err(Into::into)
        };
        let entries = parsed.map_err(|source| GenerationError::Corrections {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self(entries))
    }

    pub fn get(&self, zip: &str) -> Option<&Correction> {
        self.0.get(zip)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Corrections {
    /// Cities verified against USPS
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        // dataset says "Hanover park"
        entries.insert(
            "60103".to_string(),
            Correction {
                city: "Bartlett".to_string(),
                county: Some("DuPage".to_string()),
            },
        );
        entries.insert(
            "60108".to_string(),
            Correction {
                city: "Bloomingdale".to_string(),
                county: Some("DuPage".to_string()),
            },
        );
        Self(entries)
    }
}

/// Header names of the columns the generator reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
    pub zip: String,
    pub state: String,
    pub city: String,
    pub county: String,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            zip: "zipcode".to_string(),
            state: "state_abbr".to_string(),
            city: "city".to_string(),
            county: "county".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub states: StateTable,
    pub corrections: Corrections,
    pub columns: Columns,
    pub delimiter: char,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            states: StateTable::default(),
            corrections: Corrections::default(),
            columns: Columns::default(),
            delimiter: ',',
        }
    }
}

/// Zip count for one state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateCount {
    pub code: String,
    pub name: String,
    pub count: usize,
}

/// Summary of one generation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    /// In state-table order
    pub per_state: Vec<StateCount>,
    pub total: usize,
    pub corrections_applied: usize,
    /// Supported-state rows dropped because the zip was unusable
    pub skipped: usize,
}

impl GenerationReport {
    pub fn count_for(&self, code: &str) -> usize {
        self.per_state
            .iter()
            .find(|s| s.code == code)
            .map(|s| s.count)
            .unwrap_or(0)
    }
}

impl fmt::Display for GenerationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Zip codes processed per state:")?;
        for state in &self.per_state {
            writeln!(f, "  {} ({}): {}", state.name, state.code, state.count)?;
        }
        writeln!(f, "  Total: {}", self.total)?;
        writeln!(f, "  Manual corrections applied: {}", self.corrections_applied)?;
        write!(f, "  Rows skipped: {}", self.skipped)
    }
}

/// Output of a run: the mapping plus its report
#[derive(Debug, Clone)]
pub struct Generation {
    pub mapping: ZipMapping,
    pub report: GenerationReport,
}

pub struct Generator {
    config: GeneratorConfig,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Build from a dataset file; fails before anything is written when the
    /// file is absent.
    pub fn generate_from_file(&self, path: &Path) -> Result<Generation, GenerationError> {
        if !path.exists() {
            return Err(GenerationError::MissingInput {
                path: path.display().to_string(),
                hint: MISSING_INPUT_HINT,
            });
        }
        let content = std::fs::read_to_string(path).map_err(|source| GenerationError::Read {
            path: path.display().to_string(),
            source,
        })?;
        self.generate_from_str(&content)
    }

    pub fn generate_from_str(&self, content: &str) -> Result<Generation, GenerationError> {
        let table = Table::parse(content, self.config.delimiter);
        self.generate_from_table(&table)
    }

    pub fn generate_from_table(&self, table: &Table) -> Result<Generation, GenerationError> {
        let columns = &self.config.columns;
        let require = |name: &str| {
            table
                .column(name)
                .ok_or_else(|| GenerationError::MissingColumn(name.to_string()))
        };
        let zip_col = Some(require(columns.zip.as_str())?);
        let state_col = Some(require(columns.state.as_str())?);
        let city_col = Some(require(columns.city.as_str())?);
        let county_col = table.column(&columns.county);

        let mut mapping = ZipMapping::new();
        let mut corrections_applied = 0;
        let mut skipped = 0;

        for row in table.rows() {
            let state_code = row.get(state_col);
            let Some(state) = self.config.states.get(state_code) else {
                continue;
            };

            let raw_zip = row.get(zip_col);
            let Some(zip) = zipcode::zip_key(raw_zip) else {
                tracing::debug!(zip = raw_zip, state = state_code, "skipping row with unusable zip");
                skipped += 1;
                continue;
            };

            let mut city = row.get(city_col).to_string();
            let mut county = Some(row.get(county_col))
                .filter(|c| !c.is_empty())
                .map(str::to_string);

            if let Some(correction) = self.config.corrections.get(&zip) {
                city = correction.city.clone();
                if let Some(fixed) = &correction.county {
                    county = Some(fixed.clone());
                }
                corrections_applied += 1;
            }

            mapping.insert(
                zip,
                ZipEntry {
                    state: state.name.clone(),
                    state_code: state.code.clone(),
                    county,
                    city,
                    providers: state.providers.clone(),
                },
            );
        }

        let report = self.report(&mapping, corrections_applied, skipped);
        Ok(Generation { mapping, report })
    }

    /// Build from the numeric zip ranges in the state table
    pub fn generate_from_ranges(&self) -> Generation {
        let mut mapping = ZipMapping::new();

        for state in self.config.states.iter() {
            for range in &state.zip_ranges {
                for zip in range.start..=range.end {
                    let zip = format!("{:05}", zip);
                    let city = state.city_for_zip(&zip);
                    mapping.insert(
                        zip,
                        ZipEntry {
                            state: state.name.clone(),
                            state_code: state.code.clone(),
                            county: None,
                            city,
                            providers: state.providers.clone(),
                        },
                    );
                }
            }
        }

        let report = self.report(&mapping, 0, 0);
        Generation { mapping, report }
    }

    fn report(&self, mapping: &ZipMapping, corrections_applied: usize, skipped: usize) -> GenerationReport {
        let per_state = self
            .config
            .states
            .iter()
            .map(|state| StateCount {
                code: state.code.clone(),
                name: state.name.clone(),
                count: mapping.values().filter(|e| e.state_code == state.code).count(),
            })
            .collect();

        GenerationReport {
            per_state,
            total: mapping.len(),
            corrections_applied,
            skipped,
        }
    }
}

/// Serialize a mapping; identical mappings always render to identical text.
pub fn render_mapping(mapping: &ZipMapping) -> Result<String, GenerationError> {
    Ok(serde_json::to_string_pretty(mapping)?)
}

/// Replace the file at `path` with the rendered mapping.
///
/// Writes a sibling temp file first and renames it over the target so a
/// failed run never leaves a truncated document behind.
pub fn write_mapping(path: &Path, mapping: &ZipMapping) -> Result<(), GenerationError> {
    let rendered = render_mapping(mapping)?;
    let write_err = |source: std::io::Error| GenerationError::Write {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }

    let tmp = temp_path(path);
    std::fs::write(&tmp, rendered).map_err(write_err)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(write_err(e));
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Location for each requested zip, `None` when the zip is not mapped
pub fn spot_check(mapping: &ZipMapping, zips: &[&str]) -> Vec<(String, Option<LocationInfo>)> {
    zips.iter()
        .map(|zip| (zip.to_string(), mapping.get(*zip).map(|e| e.location(zip))))
        .collect()
}

/// Roster/mapping consistency problem
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrityIssue {
    /// Mapping references a state with no loadable roster
    MissingRoster { state_code: String, zip_count: usize },
    /// Provider id stamped into zips but absent from the state's roster
    UnknownProvider {
        state_code: String,
        provider_id: String,
        zip_count: usize,
        example_zip: String,
    },
    /// Roster provider with a discount outside (0, 100]
    InvalidDiscount {
        state_code: String,
        provider_id: String,
        discount_rate: f64,
    },
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRoster {
                state_code,
                zip_count,
            } => write!(f, "{state_code}: no provider roster ({zip_count} zips affected)"),
            Self::UnknownProvider {
                state_code,
                provider_id,
                zip_count,
                example_zip,
            } => write!(
                f,
                "{state_code}: provider '{provider_id}' not in roster ({zip_count} zips, e.g. {example_zip})"
            ),
            Self::InvalidDiscount {
                state_code,
                provider_id,
                discount_rate,
            } => write!(
                f,
                "{state_code}: provider '{provider_id}' has discount rate {discount_rate} outside (0, 100]"
            ),
        }
    }
}

/// Check that every provider id in the mapping exists in its state's roster
/// and that roster discounts are in range. `rosters` is keyed by state code.
pub fn check_integrity(
    mapping: &ZipMapping,
    rosters: &BTreeMap<String, ProviderData>,
) -> Vec<IntegrityIssue> {
    // (state, provider) -> (zip count, first zip)
    let mut unknown: BTreeMap<(String, String), (usize, String)> = BTreeMap::new();
    let mut missing: BTreeMap<String, usize> = BTreeMap::new();

    for (zip, entry) in mapping {
        let Some(roster) = rosters.get(&entry.state_code) else {
            *missing.entry(entry.state_code.clone()).or_default() += 1;
            continue;
        };
        for id in &entry.providers {
            if roster.find(id).is_none() {
                let slot = unknown
                    .entry((entry.state_code.clone(), id.clone()))
                    .or_insert_with(|| (0, zip.clone()));
                slot.0 += 1;
            }
        }
    }

    let mut issues: Vec<IntegrityIssue> = missing
        .into_iter()
        .map(|(state_code, zip_count)| IntegrityIssue::MissingRoster {
            state_code,
            zip_count,
        })
        .collect();

    issues.extend(
        unknown
            .into_iter()
            .map(|((state_code, provider_id), (zip_count, example_zip))| IntegrityIssue::UnknownProvider {
                state_code,
                provider_id,
                zip_count,
                example_zip,
            }),
    );

    for (state_code, roster) in rosters {
        for provider in &roster.providers {
            if !provider.pricing.has_valid_discount() {
                issues.push(IntegrityIssue::InvalidDiscount {
                    state_code: state_code.clone(),
                    provider_id: provider.id.clone(),
                    discount_rate: provider.pricing.discount_rate,
                });
            }
        }
    }

    issues
}
