use chatpoll::cli::{self, Cli, Command, ConfigCommand};
use chatpoll::{config, logging};
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // These never need a valid config
    match &cli.command {
        Some(Command::Version) => {
            cli::handle_version();
            return;
        }
        Some(Command::Config(ConfigCommand::Path)) => {
            cli::handle_config_path();
            return;
        }
        _ => {}
    }

    let cfg = match config::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init_logging(&cfg.logging) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = cli::run(cli, &cfg).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
