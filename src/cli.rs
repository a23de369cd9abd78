use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::Url;

pub mod private_key;

pub use private_key::PrivateKey;

use crate::types::{Network, QueueName};

#[derive(Debug, Clone, Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Deploy every contract in the configuration, skipping recorded ones
    Deploy,
    /// Deploy new implementations and queue the proxy upgrades
    Upgrade,
    /// Queue the configured calls for offline signing
    Configure,
    /// Deploy, upgrade and configure in one run
    Full,
    /// Print the predicted address of every configured contract
    Predict,
    /// Print the deployment registry of a network
    Status,
}

#[derive(Debug, Clone, Parser)]
#[clap(rename_all = "kebab-case", version, about)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    /// Path to the pipeline configuration file (yaml or toml)
    #[clap(short, long, env, global = true)]
    pub config: Option<PathBuf>,

    /// The network name, used to scope the registry and batch files
    ///
    /// Should be something meaningful like 'mainnet' or 'base-sepolia'
    #[clap(short, long, env, global = true)]
    pub network: Option<Network>,

    /// The RPC Url to use for the deployment
    #[clap(short, long, env, global = true)]
    pub rpc_url: Option<Url>,

    /// Private key used to broadcast deployments, not needed for queued
    /// transactions
    #[clap(short, long, env, global = true, hide_env_values = true)]
    pub private_key: Option<PrivateKey>,

    /// Directory holding one registry file per network
    #[clap(long, env, global = true, default_value = "deployments")]
    pub registry_dir: PathBuf,

    /// Directory batch artifacts are written to
    #[clap(long, env, global = true, default_value = "batches")]
    pub batch_dir: PathBuf,

    /// Foundry project the contract artifacts are read from
    #[clap(long, env, global = true, default_value = ".")]
    pub contracts_dir: PathBuf,

    /// Queue used by steps that don't name one, defaults to the command name
    #[clap(short, long, env, global = true)]
    pub queue: Option<QueueName>,

    /// The etherscan API key to use for source verification
    #[clap(short, long, env, global = true)]
    pub etherscan_api_key: Option<String>,

    /// Skip the confirmation prompt before broadcasting
    #[clap(short, long, global = true)]
    pub yes: bool,
}

impl Command {
    /// Whether the command sends transactions itself.
    pub fn broadcasts(&self) -> bool {
        matches!(self, Self::Deploy | Self::Upgrade | Self::Full)
    }

    pub fn default_queue(&self) -> QueueName {
        let name = match self {
            Self::Deploy => "deploy",
            Self::Upgrade => "upgrade",
            Self::Configure => "configure",
            Self::Full => "full",
            Self::Predict => "predict",
            Self::Status => "status",
        };

        QueueName::from(name)
    }
}
