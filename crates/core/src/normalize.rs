//! Recovery of script lists from model text.
//!
//! The backend is asked for schema-shaped JSON but does not always deliver
//! it: answers arrive wrapped in code fences, cut off mid-array, or as a bare
//! object. Each [`RepairStrategy`] makes one structural fix and the first one
//! that yields an array or object wins. Content is never invented.

use std::borrow::Cow;

use serde_json::Value;

use crate::{
    error::{Result, StoryforgeError},
    types::Script,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStrategy {
    /// Parse the fence-stripped text as is.
    Strict,
    /// Keep only the span from the first `[` to the last `]`.
    OuterBrackets,
    /// Text opens an array that never closes.
    CloseTruncatedArray,
    /// A single object with no enclosing array.
    WrapBareObject,
    /// Truncated inside an object that sits inside an array.
    CloseObjectAndArray,
}

pub const REPAIR_ORDER: [RepairStrategy; 5] = [
    RepairStrategy::Strict,
    RepairStrategy::OuterBrackets,
    RepairStrategy::CloseTruncatedArray,
    RepairStrategy::WrapBareObject,
    RepairStrategy::CloseObjectAndArray,
];

/// Outcome of a single strategy.
#[derive(Debug)]
pub enum Attempt {
    Recovered(Vec<Value>),
    NotApplicable,
    Failed,
}

#[derive(Debug)]
pub struct Recovered {
    pub items: Vec<Value>,
    pub strategy: RepairStrategy,
}

impl RepairStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            RepairStrategy::Strict => "strict",
            RepairStrategy::OuterBrackets => "outer_brackets",
            RepairStrategy::CloseTruncatedArray => "close_truncated_array",
            RepairStrategy::WrapBareObject => "wrap_bare_object",
            RepairStrategy::CloseObjectAndArray => "close_object_and_array",
        }
    }

    /// The repaired text this strategy would parse, if it applies at all.
    fn rewrite<'a>(&self, stripped: &'a str) -> Option<Cow<'a, str>> {
        let open = stripped.find('[');
        let close = stripped.rfind(']');
        match self {
            RepairStrategy::Strict => Some(Cow::Borrowed(stripped)),
            RepairStrategy::OuterBrackets => match (open, close) {
                (Some(start), Some(end)) if end > start => {
                    Some(Cow::Borrowed(&stripped[start..=end]))
                }
                _ => None,
            },
            RepairStrategy::CloseTruncatedArray => match (open, close) {
                (Some(start), None) => Some(Cow::Owned(format!("{}]", &stripped[start..]))),
                (Some(start), Some(end)) if end < start => {
                    Some(Cow::Owned(format!("{}]", &stripped[start..])))
                }
                _ => None,
            },
            RepairStrategy::WrapBareObject => stripped
                .starts_with('{')
                .then(|| Cow::Owned(format!("[{stripped}]"))),
            RepairStrategy::CloseObjectAndArray => Some(Cow::Owned(format!("{stripped}}}]"))),
        }
    }

    pub fn attempt(&self, stripped: &str) -> Attempt {
        let Some(candidate) = self.rewrite(stripped) else {
            return Attempt::NotApplicable;
        };
        match serde_json::from_str::<Value>(&candidate) {
            Ok(Value::Array(items)) => Attempt::Recovered(items),
            Ok(object @ Value::Object(_)) => Attempt::Recovered(vec![object]),
            _ => Attempt::Failed,
        }
    }
}

/// Remove Markdown code fence markers anywhere in the text, then trim.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

pub fn recover_json(text: &str) -> Result<Recovered> {
    let stripped = strip_code_fences(text);
    for strategy in REPAIR_ORDER {
        match strategy.attempt(&stripped) {
            Attempt::Recovered(items) => {
                if strategy != RepairStrategy::Strict {
                    tracing::warn!(strategy = strategy.name(), "Model response needed repair");
                }
                return Ok(Recovered { items, strategy });
            }
            Attempt::NotApplicable => {}
            Attempt::Failed => {
                tracing::trace!(strategy = strategy.name(), "Repair attempt failed");
            }
        }
    }
    Err(StoryforgeError::MalformedResponse {
        raw: text.to_string(),
    })
}

/// Turn the first candidate's text into scripts.
pub fn normalize(text: &str) -> Result<Vec<Script>> {
    let recovered = recover_json(text)?;
    if recovered.items.is_empty() {
        return Err(StoryforgeError::EmptyResponse);
    }

    let scripts: Vec<Script> =
        serde_json::from_value(Value::Array(recovered.items)).map_err(|e| {
            tracing::warn!(error = %e, "Recovered JSON does not match the script shape");
            StoryforgeError::MalformedResponse {
                raw: text.to_string(),
            }
        })?;

    tracing::debug!(
        scripts = scripts.len(),
        strategy = recovered.strategy.name(),
        "Response normalized"
    );
    Ok(scripts)
}
