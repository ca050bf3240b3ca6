// Modules
pub mod acyclicity;
pub mod config;
pub mod constants;
pub mod data;
pub mod effect;
pub mod errors;
pub mod linalg;
pub mod notears;
pub mod objective;
pub mod optimizer;
pub mod structure;
pub mod synthetic;
pub mod utils;

// Individual classes, and functions
pub use config::{JsonIO, NotearsConfig};
pub use data::Dataset;
pub use errors::{DataError, StructureError};
pub use notears::{fit, FitReport, StructureLearner, WeightMatrix};
pub use structure::StructureModel;
