//! Prompt construction for document analysis and governance chat.

use crate::models::AnalysisResult;
use crate::services::providers::{PromptMessage, PromptPart};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

const ANALYSIS_INSTRUCTIONS: &str = r#"Analyze this board document and provide a structured analysis. Return ONLY valid JSON with this exact structure:

{
  "summary": "Brief executive summary of the document",
  "risks": [
    {
      "title": "Risk title",
      "description": "Risk description",
      "severity": "high|medium|low"
    }
  ],
  "decisions": [
    {
      "title": "Decision title",
      "description": "Decision description",
      "status": "approved|pending|discussed"
    }
  ],
  "questions": [
    {
      "title": "Question title",
      "description": "Question description",
      "priority": "high|medium|low"
    }
  ]
}

DO NOT include any text outside the JSON. Ensure the JSON is valid and complete."#;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    #[error("Document content required")]
    MissingDocument,

    #[error("base64Data is not valid base64: {0}")]
    InvalidBase64(String),

    #[error("Message required")]
    MissingMessage,
}

/// The document to analyse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentPayload {
    /// Base64 PDF bytes, whitespace removed.
    Pdf { base64: String },
    Text(String),
}

impl DocumentPayload {
    /// Pick the payload from the request fields.
    ///
    /// A `pdf` file type with base64 data wins; otherwise non-blank text is used.
    pub fn from_request(
        file_type: Option<&str>,
        base64_data: Option<&str>,
        text_data: Option<&str>,
    ) -> Result<Self, PromptError> {
        let is_pdf = file_type.is_some_and(|t| t.trim().eq_ignore_ascii_case("pdf"));

        if is_pdf {
            if let Some(data) = base64_data.filter(|d| !d.trim().is_empty()) {
                return Ok(DocumentPayload::Pdf {
                    base64: clean_base64(data)?,
                });
            }
        }

        match text_data {
            Some(text) if !text.trim().is_empty() => Ok(DocumentPayload::Text(text.to_string())),
            _ => Err(PromptError::MissingDocument),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DocumentPayload::Pdf { .. } => "pdf",
            DocumentPayload::Text(_) => "text",
        }
    }
}

/// Drop an optional data-URL prefix and whitespace, then check the alphabet.
fn clean_base64(data: &str) -> Result<String, PromptError> {
    let data = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };

    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| PromptError::InvalidBase64(e.to_string()))?;

    Ok(cleaned)
}

/// User message asking for a structured analysis of `payload`.
pub fn analysis_message(payload: &DocumentPayload) -> PromptMessage {
    match payload {
        DocumentPayload::Pdf { base64 } => PromptMessage {
            parts: vec![
                PromptPart::Document {
                    media_type: PDF_MEDIA_TYPE.to_string(),
                    data: base64.clone(),
                },
                PromptPart::Text(ANALYSIS_INSTRUCTIONS.to_string()),
            ],
        },
        DocumentPayload::Text(text) => PromptMessage::text(format!(
            "{}\n\nDocument content:\n{}",
            ANALYSIS_INSTRUCTIONS, text
        )),
    }
}

/// User message for a chat question, grounded in a prior analysis when given.
pub fn chat_message(
    message: &str,
    context: Option<&AnalysisResult>,
) -> Result<PromptMessage, PromptError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(PromptError::MissingMessage);
    }

    let prompt = match context {
        Some(context) => {
            let summary = if context.summary.trim().is_empty() {
                "(none provided)"
            } else {
                context.summary.trim()
            };

            format!(
                "Context: I have analyzed a board document with the following findings:\n\
                 - {} risks identified\n\
                 - {} decisions documented\n\
                 - {} questions raised\n\
                 - Summary: {}\n\n\
                 User question: {}\n\n\
                 Please provide helpful advice, solutions, or insights related to this board governance matter.",
                context.risks.len(),
                context.decisions.len(),
                context.questions.len(),
                summary,
                message
            )
        }
        None => format!(
            "You are a board governance and corporate strategy expert. Help the user with their question.\n\n\
             User question: {}\n\n\
             Provide practical, actionable advice.",
            message
        ),
    };

    Ok(PromptMessage::text(prompt))
}
