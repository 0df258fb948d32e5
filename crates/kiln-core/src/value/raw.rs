use crate::evaluation::FaultDescription;
use std::fmt;

/// Read access to a stack-only view over contiguous memory (span-like or
/// memory-like), valid only for the duration of the call that produced it.
pub trait ContiguousView: Send {
    /// Number of elements in the view.
    fn len(&self) -> Result<usize, FaultDescription>;

    fn is_empty(&self) -> Result<bool, FaultDescription> {
        self.len().map(|n| n == 0)
    }

    /// Materialized text for character-element views; `None` for any other
    /// element type.
    fn char_preview(&self) -> Option<Result<String, FaultDescription>>;
}

/// A value of a stack-only user-defined type that cannot be boxed or kept.
pub trait StackOnlyValue: Send {
    /// Result of the type's own textual conversion, or `None` when the type
    /// does not override it.
    fn custom_text(&self) -> Option<Result<String, FaultDescription>>;
}

/// How a produced value is represented by the compiler frontend.
pub enum ValueRepr {
    /// An ordinary value that can be retained as-is.
    Boxed(serde_json::Value),
    /// A view whose backing storage may not outlive the call.
    ContiguousView(Box<dyn ContiguousView>),
    /// A stack-only aggregate.
    StackOnly(Box<dyn StackOnlyValue>),
}

/// A value as returned by the compiler frontend, before it is made safe to
/// hand back to the caller.
pub struct RawValue {
    /// Declared type name as the language spells it, e.g. `System.Span<char>`.
    pub declared_type: String,
    pub repr: ValueRepr,
}

impl RawValue {
    pub fn boxed(declared_type: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            declared_type: declared_type.into(),
            repr: ValueRepr::Boxed(value),
        }
    }

    pub fn view(declared_type: impl Into<String>, view: impl ContiguousView + 'static) -> Self {
        Self {
            declared_type: declared_type.into(),
            repr: ValueRepr::ContiguousView(Box::new(view)),
        }
    }

    pub fn stack_only(declared_type: impl Into<String>, value: impl StackOnlyValue + 'static) -> Self {
        Self {
            declared_type: declared_type.into(),
            repr: ValueRepr::StackOnly(Box::new(value)),
        }
    }
}

impl fmt::Debug for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match &self.repr {
            ValueRepr::Boxed(value) => format!("Boxed({})", value),
            ValueRepr::ContiguousView(_) => "ContiguousView(..)".to_string(),
            ValueRepr::StackOnly(_) => "StackOnly(..)".to_string(),
        };
        f.debug_struct("RawValue")
            .field("declared_type", &self.declared_type)
            .field("repr", &repr)
            .finish()
    }
}
