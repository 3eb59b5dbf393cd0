//! Kongkow is a streaming chat client built around a small transcript state
//! machine.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the transcript session, the backend port and its
//!   OpenAI-compatible streaming implementation, dictation, and config.
//! - [`ui`] holds presentation helpers such as the markdown renderer.
//! - [`commands`] implements slash-command parsing for the line-mode chat.
//! - [`api`] defines the chat completion payloads sent over the wire.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod ui;
pub mod utils;
