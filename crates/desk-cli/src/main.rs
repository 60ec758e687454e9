use anyhow::Result;
use clap::Parser;
use desk_cli::Cli;
use desk_gateway::run_portal_server;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

fn init_tracing(default_directive: &str) {
    let default_directive: Directive = default_directive
        .parse()
        .unwrap_or_else(|_| LevelFilter::INFO.into());
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_directive)
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    run_portal_server(cli.into_config()).await
}
