//! Multi-validator approval workflow.
//!
//! An access request owns one [`ValidationRecord`] per requested system and
//! configured validator. Validators resolve records once; after every
//! resolution [`reconcile`] recomputes the request status from the records.
//! The pure rules live in [`reconcile`], [`resolution`] and [`finalize`];
//! [`service`] persists them with compare-and-set updates.
//!
//! [`ValidationRecord`]: crate::models::validation::ValidationRecord

pub mod finalize;
pub mod reconcile;
pub mod resolution;
pub mod service;

pub use finalize::{can_finalize, finalize_blocker, FinalizeBlocker};
pub use reconcile::{next_status, reconcile, reconcile_statuses};
pub use service::WorkflowService;

/// Rejections of workflow operations. None of them is retried.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// The record is no longer pending, or its request is closed.
    #[error("validation already resolved")]
    AlreadyResolved,
    #[error("not allowed to resolve validation: {0}")]
    Unauthorized(String),
    #[error("{0} not found")]
    NotFound(&'static str),
}
