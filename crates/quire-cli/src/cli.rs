//! CLI argument parsing and command definitions.
//!
//! The `quire` binary is a diagnostics shell over the editing engine: it
//! classifies and transcodes article files the same way an editing session
//! would, and manages the configuration file.

use clap::{Parser, Subcommand, ValueEnum};

// ============================================================================
// CLI argument types
// ============================================================================

/// Top-level CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "quire", author, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file.
    #[arg(short, long, env = "QUIRE_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-essential output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report whether a file holds markdown or markup.
    Classify {
        /// File to inspect; `-` reads standard input.
        file: String,
    },

    /// Convert a file between markdown and markup.
    Transcode {
        /// Target format.
        #[arg(short, long, value_enum)]
        to: Target,

        /// Article id used to label media diagnostics.
        #[arg(long, default_value = "unsaved")]
        article_id: String,

        /// Print warnings and diagnostics as JSON on stderr.
        #[arg(long)]
        json: bool,

        /// File to convert; `-` reads standard input.
        file: String,
    },

    /// Print version information.
    Version,

    /// Configuration operations.
    Config(ConfigCommand),
}

/// Transcoding target.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Markdown to markup.
    #[value(alias = "html")]
    Markup,
    /// Markup to markdown.
    #[value(alias = "md")]
    Markdown,
}

/// Config-specific subcommands.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Config subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigAction,
}

/// Available config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path.
    Path,

    /// Get a configuration value by dotted key.
    Get {
        /// Dotted key (e.g., "editor.debounce_ms").
        key: String,
    },

    /// Create a default configuration file.
    Init {
        /// Output file path (defaults to XDG config path).
        #[arg(short, long)]
        file: Option<String>,

        /// Overwrite existing file.
        #[arg(long)]
        force: bool,
    },

    /// Export configuration as environment variables.
    Export {
        /// Format as Docker --env flags.
        #[arg(long)]
        docker_env: bool,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_args_default() {
        let args = CliArgs::parse_from(["quire"]);
        assert!(!args.verbose);
        assert!(!args.quiet);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_cli_args_flags() {
        let args = CliArgs::parse_from(["quire", "--verbose", "--config", "/tmp/q.toml"]);
        assert!(args.verbose);
        assert_eq!(args.config.as_deref(), Some("/tmp/q.toml"));
    }

    #[test]
    fn test_classify_command() {
        let args = CliArgs::parse_from(["quire", "classify", "post.md"]);
        match args.command {
            Some(Command::Classify { file }) => assert_eq!(file, "post.md"),
            _ => panic!("Expected Classify command"),
        }
    }

    #[test]
    fn test_transcode_command() {
        let args = CliArgs::parse_from(["quire", "transcode", "--to", "markup", "post.md"]);
        match args.command {
            Some(Command::Transcode {
                to,
                article_id,
                json,
                file,
            }) => {
                assert_eq!(to, Target::Markup);
                assert_eq!(article_id, "unsaved");
                assert!(!json);
                assert_eq!(file, "post.md");
            }
            _ => panic!("Expected Transcode command"),
        }
    }

    #[test]
    fn test_transcode_alias_and_id() {
        let args = CliArgs::parse_from([
            "quire",
            "transcode",
            "--to",
            "md",
            "--article-id",
            "a-7",
            "-",
        ]);
        match args.command {
            Some(Command::Transcode {
                to, article_id, ..
            }) => {
                assert_eq!(to, Target::Markdown);
                assert_eq!(article_id, "a-7");
            }
            _ => panic!("Expected Transcode command"),
        }
    }

    #[test]
    fn test_transcode_requires_target() {
        assert!(CliArgs::try_parse_from(["quire", "transcode", "post.md"]).is_err());
    }

    #[test]
    fn test_version_command() {
        let args = CliArgs::parse_from(["quire", "version"]);
        assert!(matches!(args.command, Some(Command::Version)));
    }

    #[test]
    fn test_config_get_command() {
        let args = CliArgs::parse_from(["quire", "config", "get", "editor.debounce_ms"]);
        match args.command {
            Some(Command::Config(ConfigCommand {
                command: ConfigAction::Get { key },
            })) => assert_eq!(key, "editor.debounce_ms"),
            _ => panic!("Expected Config Get command"),
        }
    }

    #[test]
    fn test_config_init_force() {
        let args = CliArgs::parse_from(["quire", "config", "init", "--force"]);
        match args.command {
            Some(Command::Config(ConfigCommand {
                command: ConfigAction::Init { file, force },
            })) => {
                assert!(file.is_none());
                assert!(force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }

    #[test]
    fn test_config_export_docker_env() {
        let args = CliArgs::parse_from(["quire", "config", "export", "--docker-env"]);
        match args.command {
            Some(Command::Config(ConfigCommand {
                command: ConfigAction::Export { docker_env },
            })) => assert!(docker_env),
            _ => panic!("Expected Config Export command"),
        }
    }
}
