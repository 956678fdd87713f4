//! Controller layer: operator input parsing, UI events, and command orchestration.

pub mod events;
pub mod line;
pub mod orchestration;
