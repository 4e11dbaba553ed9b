//! Conversation transcript shown to the user.
//!
//! The transcript is an append-only log. Every user action and every
//! provider response or failure adds one entry; entries are never edited
//! or removed except by a full session reset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::plan::PlanItem;

/// Greeting that seeds every fresh transcript
pub const GREETING: &str =
    "Hello! I am your COBOL modernization assistant. Please upload your COBOL files to begin.";

/// A single turn in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Sequence number, strictly increasing within a transcript
    pub id: u64,

    /// When the entry was appended
    pub timestamp: DateTime<Utc>,

    /// Who produced the entry
    pub author: Author,

    /// Free text, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Embedded analysis result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,

    /// Embedded plan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<PlanItem>>,
}

impl TranscriptEntry {
    fn new(id: u64, author: Author) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            author,
            text: None,
            analysis: None,
            plan: None,
        }
    }
}

/// Author of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    User,
    Assistant,
}

/// Append-only transcript with monotonically assigned ids
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    next_id: u64,
}

impl Transcript {
    /// Empty transcript; ids start at 1
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// Fresh transcript containing only the greeting
    pub fn seeded() -> Self {
        let mut transcript = Self::new();
        transcript.assistant_text(GREETING);
        transcript
    }

    fn push(&mut self, author: Author) -> &mut TranscriptEntry {
        // Default-constructed transcripts start at 0; keep ids >= 1.
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.entries.push(TranscriptEntry::new(id, author));
        // Just pushed, so the vector is non-empty.
        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }

    pub fn user_text(&mut self, text: impl Into<String>) {
        self.push(Author::User).text = Some(text.into());
    }

    pub fn assistant_text(&mut self, text: impl Into<String>) {
        self.push(Author::Assistant).text = Some(text.into());
    }

    pub fn assistant_analysis(&mut self, analysis: impl Into<String>) {
        self.push(Author::Assistant).analysis = Some(analysis.into());
    }

    pub fn assistant_plan(&mut self, plan: Vec<PlanItem>) {
        self.push(Author::Assistant).plan = Some(plan);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_transcript() {
        let transcript = Transcript::seeded();

        assert_eq!(transcript.len(), 1);
        let greeting = &transcript.entries()[0];
        assert_eq!(greeting.id, 1);
        assert_eq!(greeting.author, Author::Assistant);
        assert_eq!(greeting.text.as_deref(), Some(GREETING));
    }

    #[test]
    fn test_ids_strictly_increasing() {
        let mut transcript = Transcript::seeded();
        transcript.user_text("Uploaded 1 COBOL file(s).");
        transcript.assistant_analysis("Payroll batch job");
        transcript.assistant_plan(vec![PlanItem::new("Step", "Do it")]);

        let ids: Vec<u64> = transcript.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        let timestamps: Vec<_> = transcript.entries().iter().map(|e| e.timestamp).collect();
        assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_default_transcript_starts_at_one() {
        let mut transcript = Transcript::default();
        transcript.user_text("hi");
        assert_eq!(transcript.entries()[0].id, 1);
    }

    #[test]
    fn test_entry_serialization_skips_empty_fields() {
        let mut transcript = Transcript::new();
        transcript.assistant_analysis("Payroll batch job");

        let json = serde_json::to_string(&transcript.entries()[0]).unwrap();
        assert!(json.contains("\"analysis\""));
        assert!(!json.contains("\"plan\""));
        assert!(!json.contains("\"text\""));

        let parsed: TranscriptEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.analysis.as_deref(), Some("Payroll batch job"));
    }
}
