//! Completion normalization.
//!
//! Turns the free-form text returned by the model into an [`AnalysisResult`].
//! Cosmetic deviations are absorbed:
//! - Markdown code fences anywhere in the text,
//! - prose before or after the JSON object,
//! - level labels in the wrong case or outside the allowed set.
//!
//! Anything that is not a JSON object, or whose fields have the wrong JSON
//! type, is rejected rather than guessed at.

use crate::models::{AnalysisResult, ChatReply, Decision, Finding, Level, Question, Risk};
use regex::Regex;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::sync::LazyLock;
use thiserror::Error;

/// A fence at the start of a line, with its info string (`json`, `JSON`, ...),
/// or bare backticks anywhere else. Words after a mid-line fence are kept.
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_+.\-]*(?:[ \t]*\r?\n|[ \t]+|$)|```")
        .expect("code fence pattern is valid")
});

/// Top-level keys that mark an object as the analysis body.
const ANALYSIS_KEYS: [&str; 4] = ["summary", "risks", "decisions", "questions"];

/// The completion could not be turned into the requested schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("Model response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Model response must be a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("Model response field `{field}` must be {expected}, found {found}")]
    WrongType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Normalize an analysis completion.
pub fn normalize_analysis(raw: &str) -> Result<AnalysisResult, NormalizeError> {
    let stripped = strip_code_fences(raw);
    let value = parse_json(stripped.trim())?;
    analysis_from_value(&value)
}

/// Chat replies are free text; only surrounding whitespace is removed.
pub fn normalize_chat_reply(raw: &str) -> ChatReply {
    ChatReply {
        reply: raw.trim().to_string(),
    }
}

/// Remove every fence delimiter, keeping the fenced content in place.
pub fn strip_code_fences(raw: &str) -> Cow<'_, str> {
    CODE_FENCE.replace_all(raw, "")
}

/// Validate and coerce an already-parsed value into an [`AnalysisResult`].
///
/// Also used for the analysis a caller sends back as chat context.
pub fn analysis_from_value(value: &Value) -> Result<AnalysisResult, NormalizeError> {
    let object = value
        .as_object()
        .ok_or_else(|| NormalizeError::NotAnObject(json_type(value)))?;

    Ok(AnalysisResult {
        summary: string_field(object, "summary", "summary")?,
        risks: findings::<Risk>(object)?,
        decisions: findings::<Decision>(object)?,
        questions: findings::<Question>(object)?,
    })
}

/// Parse the whole text as JSON; failing that, try the value starting at each
/// `{` in turn and take the first object carrying an analysis key. Braces in
/// surrounding prose (`{}`, `{JSON}`) are skipped, and nested objects of a
/// truncated body never qualify.
fn parse_json(text: &str) -> Result<Value, NormalizeError> {
    let whole_err = match serde_json::from_str::<Value>(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    text.match_indices('{')
        .find_map(|(start, _)| analysis_object_at(&text[start..]))
        .ok_or_else(|| NormalizeError::InvalidJson(whole_err.to_string()))
}

fn analysis_object_at(text: &str) -> Option<Value> {
    let value = serde_json::Deserializer::from_str(text)
        .into_iter::<Value>()
        .next()?
        .ok()?;

    let is_analysis = value
        .as_object()
        .is_some_and(|object| ANALYSIS_KEYS.iter().any(|key| object.contains_key(*key)));

    is_analysis.then_some(value)
}

fn findings<F: Finding>(object: &Map<String, Value>) -> Result<Vec<F>, NormalizeError> {
    let items = match object.get(F::LIST_KEY) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(NormalizeError::WrongType {
                field: F::LIST_KEY.to_string(),
                expected: "an array",
                found: json_type(other),
            });
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| finding::<F>(index, item))
        .collect()
}

fn finding<F: Finding>(index: usize, item: &Value) -> Result<F, NormalizeError> {
    let path = format!("{}[{}]", F::LIST_KEY, index);
    let object = item.as_object().ok_or_else(|| NormalizeError::WrongType {
        field: path.clone(),
        expected: "an object",
        found: json_type(item),
    })?;

    let title = string_field(object, "title", &format!("{}.title", path))?;
    let description = string_field(object, "description", &format!("{}.description", path))?;
    let level = level_field::<F::Level>(object.get(F::LEVEL_KEY));

    if level.coerced {
        tracing::debug!(
            field = %format!("{}.{}", path, F::LEVEL_KEY),
            value = ?object.get(F::LEVEL_KEY),
            "Coerced unrecognised level to default"
        );
    }

    Ok(F::from_parts(title, description, level.value))
}

fn string_field(
    object: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<String, NormalizeError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(NormalizeError::WrongType {
            field: path.to_string(),
            expected: "a string",
            found: json_type(other),
        }),
    }
}

struct Coerced<L> {
    value: L,
    coerced: bool,
}

fn level_field<L: Level>(value: Option<&Value>) -> Coerced<L> {
    let parsed = value
        .and_then(Value::as_str)
        .and_then(|label| L::from_label(&label.trim().to_lowercase()));

    match parsed {
        Some(value) => Coerced {
            value,
            coerced: false,
        },
        None => Coerced {
            value: L::default(),
            coerced: true,
        },
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DecisionStatus, Priority, Severity};
    use serde_json::json;

    const MINIMAL: &str = r#"{"summary":"x","risks":[],"decisions":[],"questions":[]}"#;

    fn sample() -> Value {
        json!({
            "summary": "Board approved the FY25 budget.",
            "risks": [
                {"title": "Liquidity", "description": "Runway below target", "severity": "high"}
            ],
            "decisions": [
                {"title": "Budget", "description": "FY25 budget", "status": "approved"}
            ],
            "questions": [
                {"title": "Hiring", "description": "Is the plan funded?", "priority": "low"}
            ]
        })
    }

    #[test]
    fn strips_json_fence() {
        let raw = format!("```json\n{}\n```", MINIMAL);
        let result = normalize_analysis(&raw).unwrap();
        assert_eq!(
            result,
            AnalysisResult {
                summary: "x".to_string(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn recovers_object_from_fences_and_prose() {
        let body = serde_json::to_string_pretty(&sample()).unwrap();
        let expected = analysis_from_value(&sample()).unwrap();

        let wrappers = [
            body.clone(),
            format!("```\n{}\n```", body),
            format!("```JSON\n{}\n```", body),
            format!("Here is the analysis:\n```json\n{}\n```\nLet me know if you need more.", body),
            format!("Sure.\n\n{}\n\nHope this helps!", body),
            format!("  \n```json {}``` \n", body),
        ];

        for raw in wrappers {
            assert_eq!(normalize_analysis(&raw).unwrap(), expected, "input: {raw}");
        }
    }

    #[test]
    fn braces_in_prose_do_not_hide_the_body() {
        let body = serde_json::to_string(&sample()).unwrap();
        let expected = analysis_from_value(&sample()).unwrap();

        let wrappers = [
            format!("Following the {{}} template:\n```json\n{}\n```", body),
            format!("Here is the analysis in {{JSON}} form:\n```json\n{}\n```", body),
            format!("Schema {{\"title\": \"...\"}} applied:\n{}\nDone {{ok}}.", body),
        ];

        for raw in wrappers {
            assert_eq!(normalize_analysis(&raw).unwrap(), expected, "input: {raw}");
        }
    }

    #[test]
    fn prose_object_without_analysis_keys_is_malformed() {
        let err = normalize_analysis("I used the {} template but ran out of time.").unwrap_err();
        assert!(matches!(err, NormalizeError::InvalidJson(_)));
    }

    #[test]
    fn fence_inside_string_value_keeps_following_word() {
        let result = normalize_analysis(r#"{"summary":"Use ```sql blocks"}"#).unwrap();
        assert_eq!(result.summary, "Use sql blocks");
    }

    #[test]
    fn normalizing_twice_is_stable() {
        let first = normalize_analysis(&sample().to_string()).unwrap();
        let reserialized = serde_json::to_string(&first).unwrap();
        let second = normalize_analysis(&format!("```json\n{}\n```", reserialized)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn uppercase_level_is_lowercased() {
        let raw = r#"{"summary":"x","risks":[{"title":"T","description":"D","severity":"HIGH"}],
            "decisions":[],"questions":[]}"#;
        let result = normalize_analysis(raw).unwrap();
        assert_eq!(result.risks[0].severity, Severity::High);
    }

    #[test]
    fn unknown_level_is_coerced_to_default() {
        let raw = json!({
            "summary": "x",
            "risks": [{"title": "T", "description": "D", "severity": "urgent"}],
            "decisions": [{"title": "T", "description": "D", "status": "Tabled"}],
            "questions": [{"title": "T", "description": "D", "priority": 3}]
        });
        let result = normalize_analysis(&raw.to_string()).unwrap();

        assert_eq!(result.risks.len(), 1);
        assert_eq!(result.risks[0].title, "T");
        assert_eq!(result.risks[0].description, "D");
        assert_eq!(result.risks[0].severity, Severity::Medium);
        assert_eq!(result.decisions[0].status, DecisionStatus::Discussed);
        assert_eq!(result.questions[0].priority, Priority::Medium);
    }

    #[test]
    fn padded_level_is_accepted() {
        let raw = json!({
            "decisions": [{"title": "T", "description": "D", "status": " Pending "}]
        });
        let result = normalize_analysis(&raw.to_string()).unwrap();
        assert_eq!(result.decisions[0].status, DecisionStatus::Pending);
    }

    #[test]
    fn missing_summary_defaults_to_empty() {
        let raw = r#"{"risks":[],"decisions":[],"questions":[]}"#;
        let result = normalize_analysis(raw).unwrap();
        assert_eq!(result.summary, "");
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let result = normalize_analysis(r#"{"summary":"only a summary"}"#).unwrap();
        assert!(result.risks.is_empty());
        assert!(result.decisions.is_empty());
        assert!(result.questions.is_empty());
    }

    #[test]
    fn missing_element_strings_default_to_empty() {
        let raw = json!({ "risks": [{"severity": "low"}] });
        let result = normalize_analysis(&raw.to_string()).unwrap();
        assert_eq!(result.risks[0].title, "");
        assert_eq!(result.risks[0].description, "");
        assert_eq!(result.risks[0].severity, Severity::Low);
    }

    #[test]
    fn refusal_text_is_malformed() {
        let err = normalize_analysis("Sorry, I can't help with that.").unwrap_err();
        assert!(matches!(err, NormalizeError::InvalidJson(_)));
    }

    #[test]
    fn truncated_object_is_malformed() {
        let raw = r#"```json
{"summary":"x","risks":[{"title":"T","description":"D","severity":"high"},{"title":"Cut"#;
        let err = normalize_analysis(raw).unwrap_err();
        assert!(matches!(err, NormalizeError::InvalidJson(_)));
    }

    #[test]
    fn top_level_array_is_rejected() {
        let err = normalize_analysis("[1, 2, 3]").unwrap_err();
        assert_eq!(err, NormalizeError::NotAnObject("an array"));
    }

    #[test]
    fn wrongly_typed_list_is_rejected() {
        let err = normalize_analysis(r#"{"summary":"x","risks":"none"}"#).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::WrongType {
                field: "risks".to_string(),
                expected: "an array",
                found: "a string",
            }
        );
    }

    #[test]
    fn non_object_element_reports_its_path() {
        let err = normalize_analysis(r#"{"questions":[{"title":"a"}, "b"]}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Model response field `questions[1]` must be an object, found a string"
        );
    }

    #[test]
    fn chat_reply_is_trimmed_verbatim() {
        let reply = normalize_chat_reply("\n  ```Keep this fence```  \n");
        assert_eq!(reply.reply, "```Keep this fence```");
    }
}
