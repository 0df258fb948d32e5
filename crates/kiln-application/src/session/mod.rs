//! Committed session state and the cell that publishes it to readers.

mod cell;
mod state;

pub use cell::SessionStateCell;
pub use state::SessionState;
