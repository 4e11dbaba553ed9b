//! Modernization plan items.

use serde::{Deserialize, Serialize};

/// One ordered step of the modernization plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    pub title: String,
    pub description: String,
}

impl PlanItem {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Render a plan as a numbered list ("1. Title: description")
pub fn numbered(plan: &[PlanItem]) -> String {
    plan.iter()
        .enumerate()
        .map(|(index, item)| format!("{}. {}: {}", index + 1, item.title, item.description))
        .collect::<Vec<_>>()
        .join("\n")
}
