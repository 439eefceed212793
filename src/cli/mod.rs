// src/cli/mod.rs — CLI definition (clap derive)

pub mod chat;
pub mod sessions;

use clap::{Parser, Subcommand};

use crate::infra::config::Config;

#[derive(Parser)]
#[command(name = "pathmentor", about = "AI career mentor chat", version)]
pub struct Cli {
    /// Config file path
    #[arg(long)]
    pub config: Option<String>,

    /// User whose sessions to use (overrides PATHMENTOR_USER and config)
    #[arg(short, long)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive mentor chat (default)
    Chat {
        /// Resume an existing session
        #[arg(short, long)]
        session: Option<String>,
    },
    /// List saved sessions grouped by date
    Sessions,
    /// Print a session's transcript
    Show {
        /// Session id
        id: String,
    },
    /// Delete a session and its messages
    Delete {
        /// Session id
        id: String,
    },
}

/// Resolve the acting user: flag, then `PATHMENTOR_USER`, then config,
/// then the login name.
pub fn resolve_user(flag: Option<&str>, config: &Config) -> String {
    flag.map(str::to_string)
        .or_else(|| std::env::var("PATHMENTOR_USER").ok())
        .or_else(|| config.user.id.clone())
        .or_else(|| std::env::var("USER").ok())
        .or_else(|| std::env::var("USERNAME").ok())
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_wins() {
        let mut config = Config::default();
        config.user.id = Some("from-config".into());
        assert_eq!(resolve_user(Some("alice"), &config), "alice");
    }

    #[test]
    fn test_parse_chat_with_session() {
        let cli = Cli::parse_from(["pathmentor", "--user", "u1", "chat", "--session", "abc"]);
        assert_eq!(cli.user.as_deref(), Some("u1"));
        match cli.command {
            Some(Commands::Chat { session }) => assert_eq!(session.as_deref(), Some("abc")),
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn test_parse_default_command() {
        let cli = Cli::parse_from(["pathmentor"]);
        assert!(cli.command.is_none());
    }
}
