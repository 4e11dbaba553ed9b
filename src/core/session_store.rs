//! File-based persistence of a finished (or abandoned) session.
//!
//! Layout under the session directory:
//! - `transcript.jsonl`: one transcript entry per line, in order
//! - `session.json`: stage, analysis, plan and active artifact
//! - `output/`: generated files, one per output artifact

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;
use uuid::Uuid;

use crate::domain::{ArtifactId, OutputFile, PlanItem, Stage, TranscriptEntry};

use super::controller::PipelineSnapshot;

/// Session summary stored next to the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub stage: Stage,
    pub source_files: Vec<String>,
    pub output_files: Vec<String>,
    pub active_artifact: Option<ArtifactId>,
    pub analysis: Option<String>,
    pub plan: Option<Vec<PlanItem>>,
}

impl From<&PipelineSnapshot> for SessionSummary {
    fn from(snapshot: &PipelineSnapshot) -> Self {
        Self {
            session_id: snapshot.session_id,
            stage: snapshot.stage,
            source_files: snapshot.source_files().map(|a| a.name.clone()).collect(),
            output_files: snapshot.output_files().into_iter().map(|f| f.name).collect(),
            active_artifact: snapshot.active_artifact.clone(),
            analysis: snapshot.analysis.clone(),
            plan: snapshot.plan.clone(),
        }
    }
}

/// Session directory writer/reader
pub struct SessionStore {
    /// Directory containing the session
    session_dir: PathBuf,

    /// Path to the transcript.jsonl file
    transcript_path: PathBuf,

    /// Path to generated output files
    output_dir: PathBuf,
}

impl SessionStore {
    /// Create or open the store for a session under `base_dir`
    pub async fn open(base_dir: &Path, session_id: Uuid) -> Result<Self> {
        let session_dir = base_dir.join(session_id.to_string());
        let output_dir = session_dir.join("output");

        fs::create_dir_all(&output_dir)
            .await
            .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

        Ok(Self {
            transcript_path: session_dir.join("transcript.jsonl"),
            session_dir,
            output_dir,
        })
    }

    /// Default base directory for sessions ($MODERNIZE_HOME/sessions or the user data dir)
    pub fn base_directory() -> Result<PathBuf> {
        if let Ok(home) = std::env::var("MODERNIZE_HOME") {
            return Ok(PathBuf::from(home).join("sessions"));
        }
        Ok(dirs::data_dir()
            .context("Failed to determine data directory")?
            .join("modernize")
            .join("sessions"))
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write the transcript, summary and output files of a snapshot
    ///
    /// The transcript file is rewritten, so saving twice is harmless.
    pub async fn save(&self, snapshot: &PipelineSnapshot) -> Result<Vec<PathBuf>> {
        self.write_transcript(&snapshot.transcript).await?;

        let summary = SessionSummary::from(snapshot);
        let summary_path = self.session_dir.join("session.json");
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialize session summary")?;
        fs::write(&summary_path, json)
            .await
            .with_context(|| format!("Failed to write session summary: {}", summary_path.display()))?;

        self.write_outputs(&snapshot.output_files()).await
    }

    async fn write_transcript(&self, entries: &[TranscriptEntry]) -> Result<()> {
        let mut file = File::create(&self.transcript_path)
            .await
            .with_context(|| format!("Failed to create transcript file: {}", self.transcript_path.display()))?;

        for entry in entries {
            let json = serde_json::to_string(entry).context("Failed to serialize transcript entry")?;
            file.write_all(format!("{}\n", json).as_bytes())
                .await
                .context("Failed to write transcript entry")?;
        }
        file.flush().await.context("Failed to flush transcript")?;

        Ok(())
    }

    /// Write generated files into the output directory
    ///
    /// File names are flattened with [`output_file_names`], so a file can
    /// never point outside the output directory or replace another one.
    pub async fn write_outputs(&self, files: &[OutputFile]) -> Result<Vec<PathBuf>> {
        let names = output_file_names(files)?;
        let mut written = Vec::with_capacity(files.len());

        for (file, name) in files.iter().zip(names) {
            let path = self.output_dir.join(name);
            fs::write(&path, &file.content)
                .await
                .with_context(|| format!("Failed to write output file: {}", path.display()))?;
            written.push(path);
        }

        Ok(written)
    }

    /// Replay the stored transcript in order
    pub async fn replay(&self) -> Result<Vec<TranscriptEntry>> {
        if !self.transcript_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.transcript_path)
            .await
            .with_context(|| format!("Failed to open transcript file: {}", self.transcript_path.display()))?;

        let mut lines = BufReader::new(file).lines();
        let mut entries = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let entry: TranscriptEntry = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse transcript entry: {}", line))?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Load the stored session summary, if any
    pub async fn summary(&self) -> Result<Option<SessionSummary>> {
        let path = self.session_dir.join("session.json");
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read session summary: {}", path.display()))?;
        let summary = serde_json::from_str(&content).context("Failed to parse session summary")?;
        Ok(Some(summary))
    }

    /// List all session IDs in the base directory
    pub async fn list_sessions(base_dir: &Path) -> Result<Vec<Uuid>> {
        if !base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(base_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Ok(uuid) = Uuid::parse_str(name) {
                        sessions.push(uuid);
                    }
                }
            }
        }

        Ok(sessions)
    }
}

/// Unique file names for writing `files` into a single directory
///
/// Only the final path component of each name is kept. A name that is
/// already taken gets a numeric suffix before its extension, so
/// `com/a/Util.java` and `com/b/Util.java` become `Util.java` and
/// `Util_2.java`.
pub fn output_file_names(files: &[OutputFile]) -> Result<Vec<String>> {
    let mut taken = HashSet::new();

    files
        .iter()
        .map(|file| {
            let base = safe_file_name(&file.name)
                .with_context(|| format!("Refusing to write output with unusable name '{}'", file.name))?;

            let mut name = base.to_string();
            let mut counter = 2;
            while !taken.insert(name.clone()) {
                name = with_suffix(base, counter);
                counter += 1;
            }
            if name != base {
                warn!(original = %file.name, renamed = %name, "Output file name collides; renaming");
            }
            Ok(name)
        })
        .collect()
}

fn with_suffix(name: &str, counter: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, counter, ext),
        _ => format!("{}_{}", name, counter),
    }
}

fn safe_file_name(name: &str) -> Option<&str> {
    let candidate = Path::new(name.trim()).file_name()?.to_str()?;
    (!candidate.is_empty() && candidate != "." && candidate != "..").then_some(candidate)
}
