//! Response parser: turns free-form model output into a typed value, never failing.
//!
//! Extraction order:
//! 1. If a Markdown fenced block (```` ```json ... ``` ````) holding a `{` is present,
//!    keep only the first such interior.
//! 2. Strip any remaining fence markers.
//! 3. Slice from the first `{` to the last `}`.
//! 4. JSON parse into `T`; field-level leniency lives in [`de`].
//!
//! Any failure logs the raw text and yields the caller's fallback, so downstream
//! code never branches on "is there a result".

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("valid fence regex"));

/// How much of a bad response is echoed into the log.
const RAW_LOG_CHARS: usize = 800;

/// Whether the value came from the model or from the fallback constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub value: T,
    pub outcome: ParseOutcome,
}

impl<T> Parsed<T> {
    pub fn is_fallback(&self) -> bool {
        self.outcome == ParseOutcome::Fallback
    }
}

/// Applies the fence and brace extraction steps. Returns `None` when no `{ ... }` span exists.
pub fn extract_json(raw: &str) -> Option<String> {
    let candidate = FENCED_BLOCK
        .captures_iter(raw)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .find(|interior| interior.contains('{'))
        .unwrap_or(raw);

    let unfenced = candidate.replace("```json", "").replace("```", "");

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end < start {
        return None;
    }
    Some(unfenced[start..=end].trim().to_string())
}

/// Parses `raw` into `T`, substituting `fallback()` on any extraction or decode failure.
///
/// `label` names the response kind in log lines.
pub fn parse_or_fallback<T, F>(raw: &str, label: &str, fallback: F) -> Parsed<T>
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    let failure = match extract_json(raw) {
        Some(json) => match serde_json::from_str::<T>(&json) {
            Ok(value) => {
                debug!("Parsed {label} response ({} chars)", raw.len());
                return Parsed {
                    value,
                    outcome: ParseOutcome::Parsed,
                };
            }
            Err(e) => e.to_string(),
        },
        None => "no JSON object found".to_string(),
    };

    error!("Failed to parse {label} response: {failure}");
    error!(
        "Raw {label} response (first {RAW_LOG_CHARS} chars): {}",
        raw.chars().take(RAW_LOG_CHARS).collect::<String>()
    );

    Parsed {
        value: fallback(),
        outcome: ParseOutcome::Fallback,
    }
}

/// Deserializers tolerant of the shapes models actually emit.
///
/// Once a reply is valid JSON it is kept: an odd field degrades to a neutral
/// value instead of failing the whole document.
pub mod de {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use tracing::warn;

    /// Integer field that may arrive as `29840`, `29840.0` or `"29,840円"`.
    /// Anything without a usable number (`"要確認"`, `null`, objects) reads as 0.
    pub fn int<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(int_from(&value).unwrap_or_else(|| {
            if !value.is_null() {
                warn!("Non-numeric value {value} where an integer was expected; using 0");
            }
            0
        }))
    }

    fn int_from(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
            Value::String(s) => {
                let digits: String = s
                    .trim()
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '-' || *c == '.')
                    .collect();
                digits.parse::<f64>().ok().map(|f| f.round() as i64)
            }
            _ => None,
        }
    }

    /// Text field that may arrive as a string, a number, a list or `null`.
    pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(opt_text(deserializer)?.unwrap_or_default())
    }

    /// Optional text field. Lists are joined line by line; objects keep their JSON.
    pub fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(text_from(Value::deserialize(deserializer)?))
    }

    fn text_from(value: Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Array(items) => {
                let lines: Vec<String> = items.into_iter().filter_map(text_from).collect();
                Some(lines.join("\n"))
            }
            other @ Value::Object(_) => Some(other.to_string()),
        }
    }

    /// List of strings that may arrive as a single string.
    pub fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let items = match Value::deserialize(deserializer)? {
            Value::Array(items) => items,
            other => vec![other],
        };
        Ok(items
            .into_iter()
            .filter_map(text_from)
            .filter(|s| !s.trim().is_empty())
            .collect())
    }

    /// Nested object or list; a value of the wrong shape reads as `T::default()`.
    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: serde::de::DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        match serde_json::from_value(value) {
            Ok(v) => Ok(v),
            Err(e) => {
                warn!("Dropping malformed nested value: {e}");
                Ok(T::default())
            }
        }
    }
}
