use clap::Subcommand;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    #[command(about = "Search the store and summarize the prices found")]
    Search {
        #[arg(help = "Search term", required = true, num_args = 1..)]
        term: Vec<String>,
        #[arg(long, help = "Include request diagnostics in the result")]
        debug: bool,
        #[arg(long, help = "Minimum prices a strategy must find to be accepted")]
        threshold: Option<usize>,
    },

    #[command(about = "Serve the search API over HTTP")]
    Serve {
        #[arg(long, help = "Address to bind")]
        host: Option<String>,
        #[arg(long, help = "Port to listen on")]
        port: Option<u16>,
    },

    #[command(about = "Check that a browser context can be opened and closed")]
    Health,

    #[command(about = "Manage configuration")]
    Config {
        #[command(subcommand)]
        subcommand: ConfigCommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    #[command(about = "Initialize config file with defaults")]
    Init,

    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Show config file path")]
    Path,
}
