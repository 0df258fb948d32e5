use super::raw::{RawValue, ValueRepr};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// An owned, safely retainable rendition of an evaluation value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayValue {
    /// An ordinary value, passed through unchanged.
    Plain {
        type_name: String,
        value: serde_json::Value,
    },
    /// Snapshot of a contiguous view.
    View {
        type_name: String,
        element_count: usize,
        preview: Option<String>,
    },
    /// Snapshot of a stack-only aggregate.
    Opaque {
        type_name: String,
        text: String,
        has_text_override: bool,
    },
}

impl DisplayValue {
    pub fn type_name(&self) -> &str {
        match self {
            Self::Plain { type_name, .. }
            | Self::View { type_name, .. }
            | Self::Opaque { type_name, .. } => type_name,
        }
    }

    /// The plain value, if this is one.
    pub fn as_plain(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Plain { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain { value, .. } => write!(f, "{}", value),
            Self::View {
                type_name,
                element_count,
                preview: Some(preview),
            } => write!(f, "{}[{}] \"{}\"", type_name, element_count, preview),
            Self::View {
                type_name,
                element_count,
                preview: None,
            } => write!(f, "{}[{}]", type_name, element_count),
            Self::Opaque { text, .. } => write!(f, "{}", text),
        }
    }
}

/// Message shown for stack-only values that cannot be rendered.
pub fn no_text_override_message(type_name: &str) -> String {
    format!(
        "{} is a stack-only type and has no ToString() override; its value cannot be displayed.",
        type_name
    )
}

/// Message shown for stack-only values whose ToString() override failed.
pub fn failed_text_override_message(type_name: &str, reason: &str) -> String {
    format!(
        "{} is a stack-only type and its ToString() override failed ({}); its value cannot be displayed.",
        type_name, reason
    )
}

/// Converts raw evaluation values into [`DisplayValue`]s.
///
/// Conversion never fails: errors or panics raised while reading a view or
/// running a type's textual conversion fall back to an explanatory message.
#[derive(Debug, Clone)]
pub struct OutputSnapshotter {
    /// Longest character preview kept for a view, in chars.
    preview_limit: usize,
}

impl Default for OutputSnapshotter {
    fn default() -> Self {
        Self { preview_limit: 1024 }
    }
}

impl OutputSnapshotter {
    pub fn new(preview_limit: usize) -> Self {
        Self { preview_limit }
    }

    pub fn snapshot(&self, raw: RawValue) -> DisplayValue {
        let type_name = raw.declared_type;
        match raw.repr {
            ValueRepr::Boxed(value) => DisplayValue::Plain { type_name, value },
            ValueRepr::ContiguousView(view) => {
                let count = guarded(|| view.len()).and_then(Result::ok);
                let Some(element_count) = count else {
                    tracing::warn!("[OutputSnapshotter] Could not read length of {}", type_name);
                    return DisplayValue::Opaque {
                        text: no_text_override_message(&type_name),
                        type_name,
                        has_text_override: false,
                    };
                };
                let preview = guarded(|| view.char_preview())
                    .flatten()
                    .and_then(Result::ok)
                    .map(|text| self.truncate(text));
                DisplayValue::View {
                    type_name,
                    element_count,
                    preview,
                }
            }
            ValueRepr::StackOnly(value) => match guarded(|| value.custom_text()) {
                Some(Some(Ok(text))) => DisplayValue::Opaque {
                    type_name,
                    text,
                    has_text_override: true,
                },
                Some(Some(Err(fault))) => {
                    tracing::debug!(
                        "[OutputSnapshotter] ToString() of {} threw {}",
                        type_name,
                        fault
                    );
                    DisplayValue::Opaque {
                        text: failed_text_override_message(&type_name, &fault.to_string()),
                        type_name,
                        has_text_override: true,
                    }
                }
                None => {
                    tracing::debug!("[OutputSnapshotter] ToString() of {} panicked", type_name);
                    DisplayValue::Opaque {
                        text: failed_text_override_message(&type_name, "panicked"),
                        type_name,
                        has_text_override: true,
                    }
                }
                Some(None) => DisplayValue::Opaque {
                    text: no_text_override_message(&type_name),
                    type_name,
                    has_text_override: false,
                },
            },
        }
    }

    fn truncate(&self, text: String) -> String {
        if text.chars().count() <= self.preview_limit {
            return text;
        }
        let mut cut: String = text.chars().take(self.preview_limit).collect();
        cut.push('…');
        cut
    }
}

/// Runs `f`, turning a panic into `None`.
fn guarded<T>(f: impl FnOnce() -> T) -> Option<T> {
    catch_unwind(AssertUnwindSafe(f)).ok()
}
