pub mod config;
pub mod error;
pub mod prompts;
pub mod splitter;
pub mod traits;
pub mod types;
