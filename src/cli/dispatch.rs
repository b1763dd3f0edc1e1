use super::{
    Cli,
    commands::{Command, ConfigCommand},
};
use crate::{
    Result,
    config::Config,
    handlers::{config_handler, search},
    output,
};
use std::sync::Arc;

pub async fn dispatch(mut cli: Cli, config: Arc<Config>) -> Result<()> {
    let command = match cli.command.take() {
        Some(cmd) => cmd,
        None => {
            eprintln!("No command provided. Use --help for usage.");
            std::process::exit(1);
        }
    };

    match command {
        Command::Search { term, debug, .. } => {
            let result = search::handle_search(config, &term.join(" "), debug).await?;
            output::print_output(&result, cli.json, true)
        }
        Command::Serve { host, .. } => search::handle_serve(config, host).await,
        Command::Health => {
            let result = search::handle_health(config).await?;
            output::print_output(&result, cli.json, true)
        }
        Command::Config { subcommand } => handle_config_command(subcommand, &cli, &config),
    }
}

fn handle_config_command(subcommand: ConfigCommand, cli: &Cli, config: &Config) -> Result<()> {
    match subcommand {
        ConfigCommand::Init => {
            let result = config_handler::handle_config_init()?;
            output::print_output(&result, cli.json, true)
        }
        ConfigCommand::Show => {
            let result = config_handler::handle_config_show(config)?;
            output::print_output(&result, cli.json, true)
        }
        ConfigCommand::Path => {
            let result = config_handler::handle_config_path()?;
            output::print_output(&result, cli.json, true)
        }
    }
}
