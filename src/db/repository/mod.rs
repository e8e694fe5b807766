//! Repository layer: entity-scoped database operations.

mod side_effect;

pub use side_effect::*;
