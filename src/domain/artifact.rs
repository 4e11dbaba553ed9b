//! Source and generated files held by the pipeline.
//!
//! An artifact is a named unit of text. Uploaded COBOL sources and the Java
//! files produced by the transform step share this type and differ only by
//! their [`ArtifactKind`].

use serde::{Deserialize, Serialize};

/// A named unit of source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// File name as uploaded or as chosen by the provider
    pub name: String,

    /// Raw text content
    pub content: String,

    /// Whether this is an uploaded source or a generated output
    pub kind: ArtifactKind,
}

impl Artifact {
    /// Create a new artifact
    pub fn new(name: impl Into<String>, content: impl Into<String>, kind: ArtifactKind) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            kind,
        }
    }

    /// Create an uploaded source artifact
    pub fn source(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(name, content, ArtifactKind::Source)
    }

    /// Create a generated output artifact
    pub fn generated(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(name, content, ArtifactKind::Generated)
    }

    pub fn is_source(&self) -> bool {
        self.kind == ArtifactKind::Source
    }

    /// Language label used when fencing the content in prompts
    pub fn language(&self) -> &'static str {
        self.kind.language()
    }

    pub fn id(&self) -> ArtifactId {
        ArtifactId::new(self.kind, self.name.clone())
    }

    pub fn is(&self, id: &ArtifactId) -> bool {
        self.kind == id.kind && self.name == id.name
    }
}

/// Identifies one artifact in a session
///
/// Names are unique within a kind only: a generated file may reuse the
/// name of an uploaded source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactId {
    pub kind: ArtifactKind,
    pub name: String,
}

impl ArtifactId {
    pub fn new(kind: ArtifactKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn source(name: impl Into<String>) -> Self {
        Self::new(ArtifactKind::Source, name)
    }

    pub fn generated(name: impl Into<String>) -> Self {
        Self::new(ArtifactKind::Generated, name)
    }
}

/// Origin of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Legacy source uploaded by the user (COBOL)
    Source,

    /// Output produced by the transform step (Java)
    Generated,
}

impl ArtifactKind {
    pub fn language(&self) -> &'static str {
        match self {
            Self::Source => "cobol",
            Self::Generated => "java",
        }
    }
}

/// A `{name, content}` pair handed to the export collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    pub name: String,
    pub content: String,
}

impl From<&Artifact> for OutputFile {
    fn from(artifact: &Artifact) -> Self {
        Self {
            name: artifact.name.clone(),
            content: artifact.content.clone(),
        }
    }
}
