//! modernize - COBOL to Java modernization pipeline
//!
//! Guides a set of legacy COBOL sources through analysis, planning and
//! translation by orchestrating an interchangeable text-generation
//! provider (Gemini or Azure OpenAI).
//!
//! # Architecture
//!
//! - `PipelineController` owns the session state machine
//!   (Upload → Analyze → Plan → Transform → Done) and the transcript
//! - `Provider` implementations build prompts and parse structured output
//! - `ProviderClient` issues requests with bounded linear retry
//!
//! # Modules
//!
//! - `adapters`: Provider trait, HTTP client and backend wire formats
//! - `core`: Controller, retry policy, upload filter, session store
//! - `domain`: Data structures (Stage, Artifact, PlanItem, Transcript)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Modernize two programs with Azure OpenAI
//! modernize run PAYROLL.CBL TAX.cob --provider azure --output-dir java/
//!
//! # Review a saved session
//! modernize show <session-id>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;

// Re-export main types at crate root for convenience
pub use adapters::{build_provider, Provider, ProviderKind};
pub use crate::core::{PipelineController, PipelineSnapshot, StepOutcome, UploadedFile};
pub use domain::{Artifact, ArtifactKind, PlanItem, Stage, TranscriptEntry};
pub use error::ProviderError;
