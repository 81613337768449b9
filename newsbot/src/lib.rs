// Library interface for newsbot modules
// This allows tests and the binary to import modules

pub mod auth;
pub mod blogger;
pub mod error;
pub mod llm;
pub mod news;
pub mod pipeline;
pub mod server;
pub mod synthesizer;
