//! Command-line interface definition

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Secure gateway and aggregator for MCP servers
#[derive(Debug, Parser)]
#[command(name = "gantry", version, about)]
pub struct Cli {
    /// Gateway API base URL for client commands
    #[arg(long, global = true, default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Bearer token sent with client commands
    #[arg(long, global = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output rendering for query commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per item
    Summary,
    /// Everything, human readable
    Full,
    /// Raw JSON
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the gateway server
    Serve {
        /// Configuration file; environment variables override it
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Register (or update) an upstream MCP server in mcp_servers.yaml
    RegisterMcp {
        /// Upstream name
        name: String,

        /// MCP endpoint URL
        url: String,

        /// Transport type
        #[arg(long = "type", default_value = "streamable_http")]
        transport: String,

        /// Session timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,

        /// Tags for broadcast grouping (repeatable)
        #[arg(long)]
        tag: Vec<String>,

        /// Register the server disabled
        #[arg(long)]
        disabled: bool,

        /// Registry file to update
        #[arg(long, default_value = "mcp_servers.yaml")]
        servers_file: PathBuf,
    },

    /// List configured upstream servers
    ListServers,

    /// List tools on one upstream server
    ListTools {
        /// Upstream name
        server: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Summary)]
        format: OutputFormat,
    },

    /// Invoke one tool on one upstream server
    Invoke {
        /// Upstream name
        server: String,

        /// Tool name
        tool: String,

        /// Tool parameters as inline JSON
        #[arg(short, long)]
        params: Option<String>,

        /// Tool parameters from a JSON file
        #[arg(long, conflicts_with = "params")]
        params_file: Option<PathBuf>,
    },

    /// Invoke one tool on many upstream servers and aggregate the results
    InvokeBroadcast {
        /// Tool name
        tool: String,

        /// Explicit target servers (repeatable)
        #[arg(long)]
        servers: Vec<String>,

        /// Target servers by tag (repeatable)
        #[arg(long)]
        tags: Vec<String>,

        /// Tool parameters as inline JSON
        #[arg(short, long)]
        params: Option<String>,

        /// Tool parameters from a JSON file
        #[arg(long, conflicts_with = "params")]
        params_file: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Summary)]
        format: OutputFormat,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_register_command() {
        let cli = Cli::parse_from([
            "gantry",
            "register-mcp",
            "logs-east",
            "http://localhost:3001/mcp",
            "--type",
            "sse",
            "--timeout",
            "45",
            "--tag",
            "logging",
            "--tag",
            "east",
        ]);

        match cli.command {
            Commands::RegisterMcp {
                name,
                url,
                transport,
                timeout,
                tag,
                disabled,
                ..
            } => {
                assert_eq!(name, "logs-east");
                assert_eq!(url, "http://localhost:3001/mcp");
                assert_eq!(transport, "sse");
                assert_eq!(timeout, 45);
                assert_eq!(tag, vec!["logging", "east"]);
                assert!(!disabled);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn parses_broadcast_with_format() {
        let cli = Cli::parse_from([
            "gantry",
            "invoke-broadcast",
            "search_logs",
            "--tags",
            "logging",
            "-p",
            "{\"query\": \"error\"}",
            "--format",
            "json",
        ]);

        match cli.command {
            Commands::InvokeBroadcast { tool, tags, format, .. } => {
                assert_eq!(tool, "search_logs");
                assert_eq!(tags, vec!["logging"]);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn params_and_params_file_conflict() {
        let result = Cli::try_parse_from([
            "gantry", "invoke", "a", "echo", "-p", "{}", "--params-file", "x.json",
        ]);
        assert!(result.is_err());
    }
}
