//! QA release metrics: milestone reconciliation into reporting tables and
//! commit cadence line protocol.
//!
//! The reconciliation path is [`reconcile::run_pipeline`] (Source Counter,
//! Annotation Fetcher, Milestone Reconciler); the cadence path is
//! [`cadence::collect_commit_days`] plus [`cadence::write_lines`].

pub mod annotation;
pub mod cadence;
pub mod cli;
pub mod config;
pub mod destination;
pub mod error;
pub mod ext;
pub mod http;
pub mod logging;
pub mod model;
pub mod reconcile;
pub mod runner;
pub mod source;
pub mod util;
