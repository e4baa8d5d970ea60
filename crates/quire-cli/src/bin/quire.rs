use clap::Parser;
use quire_cli::cli::Command;
use quire_cli::config_handlers::handle_config_command;
use quire_cli::{CliArgs, QuireCli, init_logging};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(args.verbose, args.quiet);

    // Config commands must work even when the config file does not load.
    let result = if let Some(Command::Config(config_cmd)) = args.command {
        handle_config_command(args.config.as_deref(), config_cmd.command)
    } else {
        match QuireCli::from_args("quire", &args) {
            Ok(cli) => cli.run(args).await,
            Err(err) => Err(err),
        }
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "Command failed");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
