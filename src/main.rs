use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use community_solar_rs::generator::{
    self, Columns, Corrections, DEFAULT_INPUT_PATH, DEFAULT_OUTPUT_PATH, GenerationError,
    SPOT_CHECK_ZIPS,
};
use community_solar_rs::{DataStore, Generator, GeneratorConfig, StateTable, format_location, zipcode};

#[derive(Parser, Debug)]
#[command(
    name = "generate-zips",
    version,
    about = "Build the zip code → location/provider mapping for the supported states"
)]
struct Cli {
    #[arg(long, value_enum, default_value_t = Mode::Csv, help = "Data source")]
    mode: Mode,
    #[arg(long, default_value = DEFAULT_INPUT_PATH, help = "Zip code database (csv mode)")]
    input: PathBuf,
    #[arg(long, default_value = DEFAULT_OUTPUT_PATH)]
    output: PathBuf,
    #[arg(long, help = "TOML state table replacing the built-in states")]
    states: Option<PathBuf>,
    #[arg(long, help = "TOML or JSON city corrections replacing the built-in ones")]
    corrections: Option<PathBuf>,
    #[arg(long, default_value_t = ',')]
    delimiter: char,
    #[arg(long, default_value = "zipcode")]
    zip_column: String,
    #[arg(long, default_value = "state_abbr")]
    state_column: String,
    #[arg(long, default_value = "city")]
    city_column: String,
    #[arg(long, default_value = "county")]
    county_column: String,
    #[arg(long, help = "Check provider ids against the rosters in --data-dir")]
    verify: bool,
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Filter a zip code database
    Csv,
    /// Synthesize from per-state zip ranges
    Ranges,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let states = match &cli.states {
        Some(path) => StateTable::load(path)?,
        None => StateTable::default(),
    };
    let corrections = match &cli.corrections {
        Some(path) => Corrections::load(path)?,
        None => Corrections::default(),
    };

    let zip_generator = Generator::new(GeneratorConfig {
        states,
        corrections,
        columns: Columns {
            zip: cli.zip_column.clone(),
            state: cli.state_column.clone(),
            city: cli.city_column.clone(),
            county: cli.county_column.clone(),
        },
        delimiter: cli.delimiter,
    });

    let generation = match cli.mode {
        Mode::Csv => {
            println!("Reading zip code database from {}...", cli.input.display());
            match zip_generator.generate_from_file(&cli.input) {
                Ok(generation) => generation,
                Err(e @ GenerationError::MissingInput { .. }) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Mode::Ranges => {
            println!("Generating zip code mappings from state zip ranges...");
            zip_generator.generate_from_ranges()
        }
    };

    println!("{}", generation.report);

    println!("\nWriting to: {}", cli.output.display());
    generator::write_mapping(&cli.output, &generation.mapping)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;

    println!("\nSpot checks:");
    for (zip, location) in generator::spot_check(&generation.mapping, &SPOT_CHECK_ZIPS) {
        let mapped = location
            .as_ref()
            .map(format_location)
            .unwrap_or_else(|| "not mapped".to_string());
        match zipcode::reference_location(&zip) {
            Some((city, state)) => println!("  {}: {} (reference: {}, {})", zip, mapped, city, state),
            None => println!("  {}: {}", zip, mapped),
        }
    }

    if cli.verify {
        let states = zip_generator.config().states.clone();
        let store = DataStore::with_states(&cli.data_dir, states);

        let mut rosters = BTreeMap::new();
        for code in store.states().codes() {
            if let Some(roster) = store.get_providers_for_state(code).await {
                rosters.insert(code.to_string(), roster.as_ref().clone());
            }
        }

        let issues = generator::check_integrity(&generation.mapping, &rosters);
        if !issues.is_empty() {
            eprintln!("\nIntegrity check failed ({} issues):", issues.len());
            for issue in &issues {
                eprintln!("  {}", issue);
            }
            std::process::exit(1);
        }
        println!("\nIntegrity check passed: every provider id resolves");
    }

    println!("\nDone.");
    Ok(())
}
