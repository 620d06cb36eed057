//! Restore orchestration
//!
//! Ties discovery, admission, the state store and the activation pipeline
//! into one run. Locations are processed in the order requested and each
//! is its own cluster with its own capacity and shard budget.

mod confirmation;
mod errors;
mod pipeline;
mod request;
mod runner;
mod topology;

pub use confirmation::{Confirmer, Decision, FixedConfirmer};
pub use errors::{OrchestratorResult, RunError, RunErrorCode, Severity};
pub use pipeline::{ActivationPipeline, UnitOutcome};
pub use request::{
    LocationAdmission, PipelineStage, RunRequest, RunResult, UnitConflict, UnitFailure,
};
pub use runner::{OrchestratorSettings, RestoreOrchestrator};
pub use topology::{Location, Topology};
