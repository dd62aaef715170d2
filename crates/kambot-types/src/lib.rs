//! # kambot-types
//!
//! Core type definitions for the kambot question-answering pipeline.
//!
//! This crate is the foundation of the dependency graph -- all other
//! kambot crates depend on it. It contains:
//!
//! - **[`error`]** -- [`KambotError`], the collaborator-level error type
//! - **[`request`]** -- the immutable inbound [`Request`]
//! - **[`verdict`]** -- classifier [`Verdict`]s and retrieved [`Snippet`]s
//! - **[`outcome`]** -- terminal [`Outcome`]s and the serializable response envelope
//! - **[`config`]** -- Configuration schema

pub mod config;
pub mod error;
pub mod outcome;
pub mod request;
pub mod verdict;

pub use error::{KambotError, Result};
pub use outcome::{
    ApiResponse, FailureClass, Outcome, OutcomeMetadata, RejectReason, ResponseMetadata,
    SAFETY_EXHAUSTED, StageName, SystemCause, VerificationStatus,
};
pub use request::Request;
pub use verdict::{Snippet, Verdict};
