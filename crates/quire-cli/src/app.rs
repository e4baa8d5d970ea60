//! The `quire` application.
//!
//! Loads configuration, sets up logging and dispatches commands.

use crate::cli::{CliArgs, Command};
use crate::config::QuireConfig;
use crate::{config_handlers, content_handlers};
use quire_core::Result;
use tracing_subscriber::EnvFilter;

// ============================================================================
// QuireCli
// ============================================================================

/// CLI application state.
pub struct QuireCli {
    name: String,
    config: QuireConfig,
    version: String,
}

impl QuireCli {
    /// Create from CLI args, loading config from file/env.
    pub fn from_args(name: impl Into<String>, args: &CliArgs) -> Result<Self> {
        let config = QuireConfig::load(args.config.as_deref())?;
        Ok(Self::new(name, config))
    }

    /// Create with an already loaded configuration.
    pub fn new(name: impl Into<String>, config: QuireConfig) -> Self {
        Self {
            name: name.into(),
            config,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Override the version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// The loaded configuration.
    pub fn config(&self) -> &QuireConfig {
        &self.config
    }

    /// Run the command in `args`.
    pub async fn run(&self, args: CliArgs) -> Result<()> {
        match args.command {
            Some(Command::Classify { file }) => content_handlers::handle_classify(&file),
            Some(Command::Transcode {
                to,
                article_id,
                json,
                file,
            }) => content_handlers::handle_transcode(
                &file,
                to,
                &article_id,
                json,
                &self.config.editor,
            ),
            Some(Command::Version) => {
                println!("{} {}", self.name, self.version);
                Ok(())
            }
            Some(Command::Config(config_cmd)) => {
                config_handlers::handle_config_command(args.config.as_deref(), config_cmd.command)
            }
            None => {
                println!("{} {}: use --help for usage", self.name, self.version);
                Ok(())
            }
        }
    }
}

/// Initialise tracing-based logging.
///
/// Uses `RUST_LOG` env var if set, otherwise defaults based on verbosity flags.
pub fn init_logging(verbose: bool, quiet: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if quiet {
        EnvFilter::new("warn")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // A subscriber may already be set, e.g. in tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli() -> QuireCli {
        QuireCli::new("quire", QuireConfig::default()).with_version("0.1.0")
    }

    #[test]
    fn test_quire_cli_new() {
        let cli = cli();
        assert_eq!(cli.name, "quire");
        assert_eq!(cli.version, "0.1.0");
        assert_eq!(cli.config().project_name, "quire");
    }

    #[test]
    fn test_from_args_with_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "project_name = \"desk\"\n[editor]\ndebounce_ms = 900\n").unwrap();

        let args = CliArgs::parse_from(["quire", "--config", path.to_str().unwrap()]);
        let cli = QuireCli::from_args("quire", &args).unwrap();
        assert_eq!(cli.config().project_name, "desk");
        assert_eq!(cli.config().editor.debounce_ms, 900);
    }

    #[tokio::test]
    async fn test_run_version_and_no_command() {
        assert!(cli().run(CliArgs::parse_from(["quire", "version"])).await.is_ok());
        assert!(cli().run(CliArgs::parse_from(["quire"])).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_classify_and_transcode() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("post.md");
        std::fs::write(&path, "# Title\n\nBody").unwrap();
        let file = path.to_str().unwrap();

        let args = CliArgs::parse_from(["quire", "classify", file]);
        assert!(cli().run(args).await.is_ok());

        let args = CliArgs::parse_from(["quire", "transcode", "--to", "markup", "--json", file]);
        assert!(cli().run(args).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_missing_file_fails() {
        let args = CliArgs::parse_from(["quire", "classify", "/nonexistent/post.md"]);
        assert!(cli().run(args).await.is_err());
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(false, false);
        init_logging(true, false);
        init_logging(false, true);
    }
}
