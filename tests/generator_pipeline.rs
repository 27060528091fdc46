// tests/generator_pipeline.rs
//
// Generator end to end: dataset file in, mapping document out, then read back
// through the DataStore the server uses.

mod common;

use std::collections::BTreeMap;

use common::Fixture;
use community_solar_rs::generator::{self, Corrections, GenerationError};
use community_solar_rs::{DataStore, Generator, GeneratorConfig, StateTable, ZipMapping};

const DATASET: &str = "\
zipcode,state_abbr,city,county
60103,IL,Hanover park,Cook
60601,IL,Chicago,Cook
10001,NY,New York,New York
2108,MA,Boston,Suffolk
55401,MN,Minneapolis,Hennepin
90210,CA,Beverly Hills,Los Angeles
abc,IL,Nowhere,
";

fn generate(fixture: &Fixture) -> ZipMapping {
    fixture.write("zip-database.csv", DATASET);
    Generator::new(GeneratorConfig::default())
        .generate_from_file(&fixture.file("zip-database.csv"))
        .expect("generate")
        .mapping
}

#[test]
fn missing_input_fails_without_writing() {
    let fixture = Fixture::empty();
    let output = fixture.file("zip-mappings.json");

    let err = Generator::new(GeneratorConfig::default())
        .generate_from_file(&fixture.file("zip-database.csv"))
        .unwrap_err();
    assert!(matches!(err, GenerationError::MissingInput { .. }));
    assert!(err.to_string().contains("zip-database.csv"));
    assert!(!output.exists());
}

#[test]
fn output_is_byte_identical_across_runs() {
    let fixture = Fixture::empty();
    let first = fixture.file("out/first.json");
    let second = fixture.file("out/second.json");

    generator::write_mapping(&first, &generate(&fixture)).expect("first write");
    generator::write_mapping(&second, &generate(&fixture)).expect("second write");

    let a = std::fs::read(&first).expect("read first");
    let b = std::fs::read(&second).expect("read second");
    assert_eq!(a, b);
}

#[test]
fn overwrite_replaces_file_and_leaves_no_temp() {
    let fixture = Fixture::empty();
    fixture.write("zip-mappings.json", "stale contents");
    let output = fixture.file("zip-mappings.json");

    generator::write_mapping(&output, &generate(&fixture)).expect("write");

    let text = std::fs::read_to_string(&output).expect("read output");
    let parsed: ZipMapping = serde_json::from_str(&text).expect("valid mapping");
    assert_eq!(parsed.len(), 5);

    let leftovers: Vec<_> = std::fs::read_dir(fixture.path())
        .expect("read dir")
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn only_supported_states_with_their_provider_lists() {
    let fixture = Fixture::empty();
    let mapping = generate(&fixture);
    let states = StateTable::default();

    assert!(!mapping.contains_key("90210"));
    for (zip, entry) in &mapping {
        assert_eq!(zip.len(), 5);
        let state = states.get(&entry.state_code).expect("supported state");
        assert_eq!(entry.state, state.name);
        assert_eq!(entry.providers, state.providers);
    }

    // Corrections and zero padding
    assert_eq!(mapping["60103"].city, "Bartlett");
    assert_eq!(mapping["60103"].county.as_deref(), Some("DuPage"));
    assert_eq!(mapping["02108"].city, "Boston");
}

#[test]
fn corrections_file_replaces_builtins() {
    let fixture = Fixture::empty();
    fixture.write(
        "corrections.toml",
        r#"
"60601" = { city = "The Loop" }
"#,
    );
    fixture.write_json(
        "corrections.json",
        &serde_json::json!({ "60601": { "city": "Downtown", "county": "Cook" } }),
    );

    let toml = Corrections::load(&fixture.file("corrections.toml")).expect("toml corrections");
    let json = Corrections::load(&fixture.file("corrections.json")).expect("json corrections");
    assert_eq!(json.get("60601").map(|c| c.city.as_str()), Some("Downtown"));

    fixture.write("zip-database.csv", DATASET);
    let generation = Generator::new(GeneratorConfig {
        corrections: toml,
        ..GeneratorConfig::default()
    })
    .generate_from_file(&fixture.file("zip-database.csv"))
    .expect("generate");

    assert_eq!(generation.mapping["60601"].city, "The Loop");
    assert_eq!(generation.mapping["60601"].county.as_deref(), Some("Cook"));
    // Built-in fix no longer applies
    assert_eq!(generation.mapping["60103"].city, "Hanover park");
    assert_eq!(generation.report.corrections_applied, 1);
}

#[test]
fn bad_corrections_file_is_an_error() {
    let fixture = Fixture::empty();
    fixture.write("corrections.json", "[1, 2, 3]");
    let err = Corrections::load(&fixture.file("corrections.json")).unwrap_err();
    assert!(matches!(&err, GenerationError::Corrections { path, .. } if path.ends_with("corrections.json")));
    let source = std::error::Error::source(&err).expect("parse error kept as source");
    assert!(source.downcast_ref::<serde_json::Error>().is_some());

    fixture.write("corrections.toml", "\"60601\" = 42");
    let err = Corrections::load(&fixture.file("corrections.toml")).unwrap_err();
    let source = std::error::Error::source(&err).expect("parse error kept as source");
    assert!(source.downcast_ref::<toml::de::Error>().is_some());
}

#[test]
fn report_counts_states_and_skips() {
    let fixture = Fixture::empty();
    fixture.write("zip-database.csv", DATASET);
    let generation = Generator::new(GeneratorConfig::default())
        .generate_from_file(&fixture.file("zip-database.csv"))
        .expect("generate");

    let report = &generation.report;
    assert_eq!(report.count_for("IL"), 2);
    assert_eq!(report.count_for("NY"), 1);
    assert_eq!(report.count_for("MA"), 1);
    assert_eq!(report.count_for("MN"), 1);
    assert_eq!(report.total, 5);
    assert_eq!(report.skipped, 1);
    assert!(report.to_string().contains("Illinois (IL): 2"));
}

#[tokio::test]
async fn generated_mapping_is_served_by_the_store() {
    let fixture = Fixture::empty();
    let mapping = generate(&fixture);
    generator::write_mapping(&fixture.file("zip-mappings.json"), &mapping).expect("write");

    let store = DataStore::new(fixture.path());
    let location = store.lookup_zip_code("60103").await.expect("mapped");
    assert_eq!(location.city, "Bartlett");
    assert_eq!(location.state_code, "IL");
}

#[tokio::test]
async fn shipped_data_passes_integrity_check() {
    let data_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
    let zip_generator = Generator::new(GeneratorConfig::default());
    let mapping = zip_generator.generate_from_ranges().mapping;

    let store = DataStore::new(&data_dir);
    let mut rosters = BTreeMap::new();
    for code in store.states().codes() {
        let roster = store
            .get_providers_for_state(code)
            .await
            .unwrap_or_else(|| panic!("roster for {code}"));
        rosters.insert(code.to_string(), roster.as_ref().clone());
    }

    let issues = generator::check_integrity(&mapping, &rosters);
    assert!(issues.is_empty(), "integrity issues: {issues:?}");

    for code in store.states().codes() {
        assert!(store.get_state_policy(code).await.is_some(), "policy for {code}");
    }
}
