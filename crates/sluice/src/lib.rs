#![deny(clippy::await_holding_refcell_ref)]

#[macro_use]
pub mod common;

pub mod bridge;
pub mod engine;
pub mod queue;
pub mod resources;
pub mod scheduler;
pub mod workload;

pub use crate::common::ids::{FlavorId, JobId, ObjectRef, ReservationId, WorkloadId};
pub use crate::common::{Map, Set, WrappedRcRefCell};

pub type Error = common::error::AdmissionError;
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests;
