//! rv-sim: everything on the simulator side of a stage barrier.
//!
//! - model (generated input documents, deterministic rendering)
//! - simulator (backends: external command, replay of existing outputs)
//! - invoker (one bulk submission per stage, output verification)
//! - outputs / report / hourly (reading what the simulator wrote)

pub mod error;
pub mod hourly;
pub mod invoker;
pub mod model;
pub mod outputs;
pub mod report;
pub mod simulator;

pub use error::{SimError, SimResult};
pub use hourly::{HourlySeries, HourlySlice};
pub use invoker::{BatchRunReport, JobReport, SimulatorInvoker};
pub use model::{ModelDocument, ModelObject, format_number};
pub use outputs::OutputFiles;
pub use report::{CostLineItem, TabularReport};
pub use simulator::{CommandSimulator, JobStatus, ReplaySimulator, SimJob, Simulator};
