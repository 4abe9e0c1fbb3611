//! Chat front ends for RepoMind.
//!
//! The Discord bot parses prefix commands and forwards them to the RepoMind
//! HTTP backend; replies longer than Discord's limit are split.

pub mod backend;
pub mod commands;
pub mod discord;
pub mod error;
pub mod handler;
pub mod split;

pub use backend::BackendClient;
pub use discord::DiscordBot;
pub use error::ChannelError;
pub use handler::{CommandHandler, Replier};
