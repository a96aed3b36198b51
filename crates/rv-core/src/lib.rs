//! rv-core: stable foundation for the revive batch orchestrator.
//!
//! Contains:
//! - ids (compact case identifiers)
//! - cancel (cooperative cancellation token shared across workers)
//! - naming (case/batch name rules and simulator output prefixes)
//! - timing (stage wall-clock and worker busy-time accounting)
//! - error (shared error types)

pub mod cancel;
pub mod error;
pub mod ids;
pub mod naming;
pub mod timing;

// Re-exports: nice ergonomics for downstream crates
pub use cancel::CancellationToken;
pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use naming::{StageLabel, output_prefix, validate_batch_name, validate_case_name};
