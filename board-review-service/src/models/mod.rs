//! Domain models for the board review service.

pub mod analysis;

pub use analysis::{
    AnalysisResult, ChatReply, Decision, DecisionStatus, Finding, Level, Priority, Question, Risk,
    Severity,
};
