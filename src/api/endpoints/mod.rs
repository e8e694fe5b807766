pub mod analyze;
pub mod health;
pub mod interaction;
pub mod patient;
