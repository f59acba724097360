//! CLI command implementations.

pub mod product;
pub mod stage;

pub use product::ProductCommand;
pub use stage::{Stage, StageCommand};
