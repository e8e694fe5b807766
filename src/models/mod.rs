pub mod enums;
pub mod interaction;

pub use enums::*;
pub use interaction::*;
