//! Raw evaluation values and their owned display snapshots.

mod raw;
mod snapshot;

pub use raw::{ContiguousView, RawValue, StackOnlyValue, ValueRepr};
pub use snapshot::{
    DisplayValue, OutputSnapshotter, failed_text_override_message, no_text_override_message,
};
