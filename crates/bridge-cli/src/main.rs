//! bridge-cli
//!
//! Thin JSON-RPC client for talking to a running bridge-node.
//!
//! Usage:
//!   bridge-cli submit  --prompt "..." [--rpc <url>] [--token <bearer>]
//!   bridge-cli status  --task-id <id> [--rpc <url>] [--token <bearer>]
//!   bridge-cli cancel  --task-id <id> [--rpc <url>] [--token <bearer>]
//!   bridge-cli describe [--rpc <url>]
//!   bridge-cli health   [--rpc <url>]

use clap::{Parser, Subcommand};

mod rpc_client;
use rpc_client::BridgeRpcClient;

#[derive(Parser, Debug)]
#[command(name = "bridge-cli", version, about = "Agent bridge CLI client")]
struct Args {
    /// JSON-RPC endpoint of the bridge node (POST / or POST /a2a).
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080/")]
    rpc: String,

    /// Bearer token for authenticated calls.
    #[arg(long, global = true, env = "BRIDGE_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a prompt and wait synchronously for the result.
    Submit {
        /// Prompt text to send.
        #[arg(long)]
        prompt: String,
    },

    /// Fetch the status (and output, if completed) of a task.
    Status {
        /// Task id returned by `submit`.
        #[arg(long)]
        task_id: String,
    },

    /// Cancel a running task.
    Cancel {
        /// Task id to cancel.
        #[arg(long)]
        task_id: String,
    },

    /// Print the agent's capability document.
    Describe,

    /// Print uptime, protocol list, and active task count.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn,bridge_cli=info")
        .init();

    let args = Args::parse();
    let client = BridgeRpcClient::new(&args.rpc, args.token.clone());

    match args.command {
        Command::Submit { prompt } => {
            let result = client.message_send(&prompt).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }

        Command::Status { task_id } => {
            let result = client.tasks_get(&task_id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }

        Command::Cancel { task_id } => {
            let result = client.tasks_cancel(&task_id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }

        Command::Describe => {
            let result = client.agent_describe().await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }

        Command::Health => {
            let result = client.agent_status().await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}
