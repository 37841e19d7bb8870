//! Structured analysis of a board document.
//!
//! These are the only shapes the service ever returns to callers; model
//! output is coerced into them by [`crate::services::normalizer`].

use serde::{Deserialize, Serialize};

/// Result of analysing one board document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Executive summary.
    pub summary: String,

    pub risks: Vec<Risk>,

    pub decisions: Vec<Decision>,

    pub questions: Vec<Question>,
}

/// Reply to a governance chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub title: String,
    pub description: String,
    pub status: DecisionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub title: String,
    pub description: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    #[default]
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Approved,
    Pending,
    #[default]
    Discussed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

/// A closed set of lowercase labels with a fallback (the `Default` variant).
pub trait Level: Copy + Default {
    /// Matches an already-lowercased label.
    fn from_label(label: &str) -> Option<Self>;
}

impl Level for Severity {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            _ => None,
        }
    }
}

impl Level for DecisionStatus {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "approved" => Some(DecisionStatus::Approved),
            "pending" => Some(DecisionStatus::Pending),
            "discussed" => Some(DecisionStatus::Discussed),
            _ => None,
        }
    }
}

impl Level for Priority {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

/// One entry of an analysis list: a title, a description and a level field
/// whose JSON key differs per kind.
pub trait Finding: Sized {
    type Level: Level;

    /// Name of the list in [`AnalysisResult`] (`risks`, ...).
    const LIST_KEY: &'static str;
    /// Name of the level field (`severity`, ...).
    const LEVEL_KEY: &'static str;

    fn from_parts(title: String, description: String, level: Self::Level) -> Self;
}

impl Finding for Risk {
    type Level = Severity;
    const LIST_KEY: &'static str = "risks";
    const LEVEL_KEY: &'static str = "severity";

    fn from_parts(title: String, description: String, severity: Severity) -> Self {
        Risk {
            title,
            description,
            severity,
        }
    }
}

impl Finding for Decision {
    type Level = DecisionStatus;
    const LIST_KEY: &'static str = "decisions";
    const LEVEL_KEY: &'static str = "status";

    fn from_parts(title: String, description: String, status: DecisionStatus) -> Self {
        Decision {
            title,
            description,
            status,
        }
    }
}

impl Finding for Question {
    type Level = Priority;
    const LIST_KEY: &'static str = "questions";
    const LEVEL_KEY: &'static str = "priority";

    fn from_parts(title: String, description: String, priority: Priority) -> Self {
        Question {
            title,
            description,
            priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_lowercase_levels() {
        let result = AnalysisResult {
            summary: "Quarterly review".to_string(),
            risks: vec![Risk::from_parts(
                "Liquidity".to_string(),
                "Cash runway under 6 months".to_string(),
                Severity::High,
            )],
            decisions: vec![Decision::from_parts(
                "Budget".to_string(),
                "FY budget".to_string(),
                DecisionStatus::Approved,
            )],
            questions: vec![],
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["risks"][0]["severity"], "high");
        assert_eq!(value["decisions"][0]["status"], "approved");
        assert_eq!(value["questions"], json!([]));
    }

    #[test]
    fn defaults_match_documented_fallbacks() {
        assert_eq!(Severity::default(), Severity::Medium);
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!(DecisionStatus::default(), DecisionStatus::Discussed);
    }

    #[test]
    fn labels_are_exact_lowercase() {
        assert_eq!(Severity::from_label("low"), Some(Severity::Low));
        assert_eq!(Severity::from_label("Low"), None);
        assert_eq!(DecisionStatus::from_label("pending"), Some(DecisionStatus::Pending));
        assert_eq!(Priority::from_label("urgent"), None);
    }
}
