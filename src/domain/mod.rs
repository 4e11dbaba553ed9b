//! Domain types for the modernization pipeline.
//!
//! This module contains the core data structures:
//! - Stage: Workflow phase
//! - Artifact: Uploaded sources and generated outputs
//! - PlanItem: Ordered modernization steps
//! - Transcript: Append-only conversation log

pub mod artifact;
pub mod plan;
pub mod stage;
pub mod transcript;

// Re-export commonly used types
pub use artifact::{Artifact, ArtifactId, ArtifactKind, OutputFile};
pub use plan::PlanItem;
pub use stage::Stage;
pub use transcript::{Author, Transcript, TranscriptEntry, GREETING};
