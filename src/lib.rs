pub mod config;
pub mod error;
pub mod gradio;
pub mod relay;
pub mod retry;
pub mod security;
pub mod server;
pub mod staging;
pub mod synthesis;
pub mod translation;
