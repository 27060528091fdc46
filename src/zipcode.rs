use std::sync::LazyLock;

use regex::Regex;

use crate::types::LocationInfo;

static NON_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^0-9]").unwrap());

/// Strip everything but digits and keep at most the first five.
///
/// "60103-1234" → "60103", " 021 08" → "02108". The result may be shorter
/// than five digits; callers check with [`is_valid_zip`].
pub fn normalize_zip(raw: &str) -> String {
    NON_DIGITS.replace_all(raw, "").chars().take(5).collect()
}

/// Exactly five ASCII digits
pub fn is_valid_zip(zip: &str) -> bool {
    zip.len() == 5 && zip.bytes().all(|b| b.is_ascii_digit())
}

static DATASET_ZIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:([0-9]{3,5})|([0-9]{5})-?[0-9]{4})$").unwrap());

/// Canonical zip key for dataset rows.
///
/// Spreadsheet exports drop leading zeros ("2108" for Boston), so 3 to 5 digit
/// codes are zero-padded. ZIP+4 forms keep the first five digits. Any other
/// value, including one with stray letters, is rejected rather than repaired.
pub fn zip_key(raw: &str) -> Option<String> {
    let caps = DATASET_ZIP.captures(raw.trim())?;
    match (caps.get(1), caps.get(2)) {
        (Some(short), _) => Some(format!("{:0>5}", short.as_str())),
        (None, Some(zip5)) => Some(zip5.as_str().to_string()),
        (None, None) => None,
    }
}

/// Look up city and state from the bundled US zip reference database
pub fn reference_location(zip: &str) -> Option<(String, String)> {
    // Avoid zipcodes::matching to suppress debug_print output.
    let results = zipcodes::filter_by(vec![|z: &zipcodes::Zipcode| z.zip_code == zip], None).ok()?;
    let info = results.first()?;
    Some((info.city.clone(), info.state.clone()))
}

/// Format a location for display: "Bartlett, DuPage County, IL"
pub fn format_location(location: &LocationInfo) -> String {
    match location.county.as_deref().filter(|c| !c.is_empty()) {
        Some(county) => format!("{}, {} County, {}", location.city, county, location.state_code),
        None => format!("{}, {}", location.city, location.state_code),
    }
}
