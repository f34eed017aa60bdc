use clap::Parser;
use showcase::cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "showcase=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init { path, name }) => {
            showcase::cli::init::run(path, name).await?;
        }
        Some(Commands::Serve { host, port }) => {
            showcase::cli::serve::run(&cli.config, host, port).await?;
        }
        Some(Commands::Migrate) => {
            showcase::cli::migrate::run(&cli.config).await?;
        }
        Some(Commands::User { command }) => {
            showcase::cli::user::run(&cli.config, command).await?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
        }
    }

    Ok(())
}
