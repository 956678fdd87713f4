//! Terminal UI layer: panel rendering and the event printer thread.

pub mod render;

pub use render::spawn_printer;
