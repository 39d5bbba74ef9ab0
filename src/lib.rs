pub mod cli;
pub mod config;
pub mod environment;
pub mod errors;
pub mod harness;
pub mod llm;
pub mod payload;
pub mod pipeline;
pub mod prompts;
pub mod synthesis;
pub mod utils;
