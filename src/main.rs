use clap::Parser;
use hazard::cli::{handle_config_init, handle_config_validate, Cli, Commands, ConfigCommands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Simulate(args) => hazard::cli::simulate::run_simulate(args).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args).map(|msg| {
                println!("{}", msg);
            }),
            ConfigCommands::Validate(args) => handle_config_validate(&args).map(|msg| {
                println!("{}", msg);
            }),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
