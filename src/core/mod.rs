//! Core pipeline logic.
//!
//! This module contains:
//! - Controller: The modernization state machine
//! - Retry: Linear-backoff retry policy for provider requests
//! - Upload: Source file filtering at the upload boundary
//! - SessionStore: Transcript and output persistence

pub mod controller;
pub mod retry;
pub mod session_store;
pub mod upload;

// Re-export commonly used types
pub use controller::{IgnoreReason, PipelineController, PipelineSnapshot, StepOutcome};
pub use retry::RetryPolicy;
pub use session_store::{output_file_names, SessionStore, SessionSummary};
pub use upload::{FilteredUpload, UploadFilter, UploadedFile};
