//! Effect
//!
//! Backdoor adjusted effect estimation on a declared causal model: identify the
//! adjustment set, estimate the treatment coefficient with linear regression, and check
//! the estimate by adding random common causes.
pub mod model;
pub mod refute;


pub use model::{CausalEstimate, CausalModel, IdentifiedEstimand};
pub use refute::Refutation;
