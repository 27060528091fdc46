pub mod api;
pub mod csv;
pub mod generator;
pub mod savings;
pub mod states;
pub mod store;
pub mod types;
pub mod zipcode;

pub use api::{AppState, build_app};
pub use generator::{Generation, GenerationReport, Generator, GeneratorConfig};
pub use savings::{BreakdownBasis, calculate_savings};
pub use states::StateTable;
pub use store::DataStore;
pub use types::{LocationInfo, Provider, SavingsCalculation, StatePolicy, ZipEntry, ZipMapping};
pub use zipcode::{format_location, normalize_zip};
