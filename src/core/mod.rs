pub mod backend;
pub mod chat_stream;
pub mod config;
pub mod constants;
pub mod dictation;
pub mod events;
pub mod message;
pub mod session;
