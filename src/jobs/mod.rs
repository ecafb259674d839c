//! Background Jobs Module
//!
//! Jobs scheduled and executed by the job scheduler service.
//!
//! # Available Jobs
//!
//! - `price_reconciliation_job` - Refreshes card prices and regenerates collection charts
//!
//! Jobs are safe to re-run: a pass with unchanged market prices writes no
//! change records.

pub mod price_reconciliation_job;
