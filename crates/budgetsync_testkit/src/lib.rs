//! # BudgetSync Testkit
//!
//! Test utilities for BudgetSync.
//!
//! This crate provides:
//! - Record builders and a sample household budget
//! - Property-based test generators using proptest
//! - `SimulatedBudgetServer`, an in-process provider with versioned records
//!   and fault switches
//!
//! ## Usage
//!
//! ```rust,ignore
//! use budgetsync_testkit::prelude::*;
//!
//! let server = SimulatedBudgetServer::new();
//! server.seed("b1", &sample_snapshot("b1"));
//! let manager = ReplicaManager::new(SyncConfig::default(), server);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod simulator;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::simulator::*;
}

pub use fixtures::*;
pub use generators::*;
pub use simulator::*;
