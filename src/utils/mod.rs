pub mod formatting;
pub mod progress;
pub mod truncation;
