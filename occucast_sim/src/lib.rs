//! Occucast Deterministic Simulation Harness
//!
//! Runs the prediction node against a simulated human on a virtual clock,
//! with a reference Boltzmann planner standing in for the inference library.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: virtual clock advanced once per pose update
//! - **Randomness**: all entropy derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                         │
//! │  ┌──────────────┐   poses   ┌──────────────────────────┐   │
//! │  │ LinearHuman  │──────────►│     PredictionNode       │   │
//! │  │ (+ noise)    │           │  ┌────────────────────┐  │   │
//! │  └──────────────┘           │  │ BoltzmannPlanner   │  │   │
//! │                             │  │ (or FlakyForecaster)│  │   │
//! │                             │  └────────────────────┘  │   │
//! │                             └────────────┬─────────────┘   │
//! │                                          │ grids, markers   │
//! │                             ┌────────────▼─────────────┐   │
//! │                             │ SimExport / RerunLogger  │   │
//! │                             └──────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use occucast_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).with_duration(10.0).run(ScenarioId::Walk);
//! assert!(result.passed);
//! ```

mod context;
mod human;
mod planner;
mod runner;
pub mod exporter;
pub mod scenarios;
pub mod visualizer;

pub use context::SimContext;
pub use human::LinearHuman;
pub use planner::{BoltzmannPlanner, FlakyForecaster};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use exporter::{SimExport, SimFrame};
pub use visualizer::RerunLogger;
