//! The `gantry` binary

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::ApiClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let api = ApiClient::new(cli.api_url.clone(), cli.token.clone());

    match cli.command {
        Commands::Serve { config } => commands::serve(config).await,

        Commands::RegisterMcp {
            name,
            url,
            transport,
            timeout,
            tag,
            disabled,
            servers_file,
        } => commands::register_mcp(&servers_file, &name, &url, &transport, timeout, tag, disabled),

        Commands::ListServers => commands::list_servers(&api).await,

        Commands::ListTools { server, format } => commands::list_tools(&api, &server, format).await,

        Commands::Invoke {
            server,
            tool,
            params,
            params_file,
        } => {
            let params = commands::load_params(params, params_file)?;
            commands::invoke(&api, &server, &tool, params).await
        }

        Commands::InvokeBroadcast {
            tool,
            servers,
            tags,
            params,
            params_file,
            format,
        } => {
            let params = commands::load_params(params, params_file)?;
            commands::invoke_broadcast(&api, &tool, servers, tags, params, format).await
        }
    }
}
