//! Voltage compliance checking for uploaded distribution grid models.
//!
//! An object-created notification names a grid model in object storage. The model is fetched
//! into scratch space, handed to an external Newton-Raphson load flow engine, and the solved bus
//! voltages are checked against the VDE-AR-N 4110 band. The verdict is stored keyed by the
//! object key.

pub mod api;
pub mod config;
pub mod domain;
pub mod evaluator;
pub mod loader;
pub mod pipeline;
pub mod power_flow;
pub mod repo;
pub mod state;
pub mod storage;
pub mod telemetry;
