mod client;
mod config;

pub use crate::client::ChatGptClient;
pub use crate::config::{DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAiConfig};
