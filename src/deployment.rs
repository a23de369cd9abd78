use std::sync::Arc;

use eyre::{Context, ContextCompat};
use tokio::sync::Mutex;
use tracing::{info, instrument, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_indicatif::style::ProgressStyle;

use self::steps::{
    configure, upgrade, DeployArgs, DeployFamilies, DeployedContract,
};
use crate::artifacts::ForgeArtifacts;
use crate::cli::{Args, Command};
use crate::client::{ChainClient, EthersClient, Offline, TransactionSender};
use crate::config::Config;
use crate::dispatcher::parse_version_tag;
use crate::error::DeployError;
use crate::registry::{
    DeploymentRecord, DeploymentRegistry, FileRegistryStore, RegistryStore,
};
use crate::report::Report;
use crate::serde_utils::{self, Format};
use crate::tx_queue::TxQueue;
use crate::types::Network;

pub mod deployed_contracts;
pub mod deployment_context;
pub mod steps;

pub use self::deployed_contracts::DeployedContracts;
pub use self::deployment_context::DeploymentContext;

pub async fn run_deployment(args: Args) -> eyre::Result<()> {
    let network = args
        .network
        .clone()
        .context("Missing network, pass --network or set NETWORK")?;

    let store: Arc<dyn RegistryStore> =
        Arc::new(FileRegistryStore::new(&args.registry_dir));

    if let Command::Status = args.command {
        let records = status(&DeploymentRegistry::new(store), &network).await?;
        println!("{}", serde_utils::to_string(Format::Yaml, &records)?);
        return Ok(());
    }

    let config_path = args
        .config
        .as_ref()
        .context("Missing config, pass --config or set CONFIG")?;

    let config: Config = serde_utils::read_deserialize(config_path).await?;
    config.validate()?;

    let predict_only = matches!(args.command, Command::Predict);

    let (client, sender, chain_id): (
        Arc<dyn ChainClient>,
        Arc<dyn TransactionSender>,
        Option<u64>,
    ) = match args.rpc_url.as_ref() {
        Some(rpc_url) if !predict_only => {
            let client = Arc::new(
                EthersClient::connect(rpc_url, args.private_key.as_ref())
                    .await?,
            );

            if args.command.broadcasts() {
                let signer = client
                    .signer_address()
                    .context("Missing private key, pass --private-key")?;

                confirm(&args, &network, &format!("{signer:?}"))?;
            }

            let chain_id = client.chain_id().await?;

            (client.clone(), client, Some(chain_id))
        }
        None if args.command.broadcasts() => {
            eyre::bail!("Missing rpc url, pass --rpc-url or set RPC_URL")
        }
        _ => (Arc::new(Offline), Arc::new(Offline), None),
    };

    let mut tx_queue = TxQueue::new(&args.batch_dir);
    if let Some(chain_id) = chain_id {
        tx_queue = tx_queue.with_chain_id(chain_id);
    }

    let context = Arc::new(DeploymentContext {
        network: network.clone(),
        registry: DeploymentRegistry::new(store),
        client,
        sender,
        artifacts: Arc::new(ForgeArtifacts::new(&args.contracts_dir)),
        tx_queue: Mutex::new(tx_queue),
        default_queue: args
            .queue
            .clone()
            .unwrap_or_else(|| args.command.default_queue()),
        contracts_dir: args.contracts_dir.clone(),
        chain_id,
        etherscan_api_key: args.etherscan_api_key.clone(),
        predict_only,
    });

    let config = Arc::new(config);
    let families = DeployFamilies::new()?;

    let report = match args.command {
        Command::Deploy => deployment(context, config, &families).await?,
        Command::Upgrade => upgrade_deployment(context, config).await?,
        Command::Configure => configure_deployment(context, config).await?,
        Command::Full => full_deployment(context, config, &families).await?,
        Command::Predict => {
            predict_addresses(context, config, &families).await?
        }
        Command::Status => unreachable!("handled before loading the config"),
    };

    println!("{}", serde_utils::to_string(Format::Yaml, &report)?);

    Ok(())
}

fn confirm(args: &Args, network: &Network, signer: &str) -> eyre::Result<()> {
    if args.yes {
        return Ok(());
    }

    let proceed = inquire::Confirm::new(&format!(
        "Broadcast {} on {network} from {signer}?",
        args.command.default_queue()
    ))
    .with_default(false)
    .prompt()?;

    if !proceed {
        eyre::bail!("Aborted");
    }

    Ok(())
}

/// Deploys every configured contract, in configuration order.
///
/// Every version is checked against the deploy tables before anything is sent.
#[instrument(skip_all, fields(network = %context.network))]
pub async fn deploy_contracts(
    context: Arc<DeploymentContext>,
    config: Arc<Config>,
    families: &DeployFamilies,
    deployed: &mut DeployedContracts,
) -> eyre::Result<Vec<DeployedContract>> {
    for contract in &config.contracts {
        let version = parse_version_tag(&contract.version)?;
        let table = families.table(contract.kind);

        if !table.supports(&version) {
            return Err(DeployError::UnsupportedVersion {
                operation: table.operation().to_string(),
                version,
            })
            .with_context(|| format!("Deploying {}", contract.name));
        }
    }

    let mut contracts = vec![];

    let span = Span::current();
    span.pb_set_style(&ProgressStyle::with_template(
        "{spinner} {span_name} [{pos}/{len}] {wide_msg}",
    )?);
    span.pb_set_length(config.contracts.len() as u64);

    for contract in &config.contracts {
        let version = parse_version_tag(&contract.version)?;

        span.pb_set_message(contract.name.as_str());

        let args = DeployArgs {
            context: context.clone(),
            config: config.clone(),
            contract: contract.clone(),
            deployed: deployed.clone(),
        };

        let results = families
            .table(contract.kind)
            .dispatch(&version, args)
            .await
            .with_context(|| format!("Deploying {}", contract.name))?;

        for result in results {
            info!(
                name = %result.name,
                address = ?result.address,
                outcome = %result.outcome,
                "Contract ready"
            );

            deployed.insert(result.name.clone(), result.address);
            contracts.push(result);
        }

        span.pb_inc(1);
    }

    Ok(contracts)
}

async fn load_deployed(
    context: &DeploymentContext,
) -> eyre::Result<DeployedContracts> {
    DeployedContracts::from_registry(&context.registry, &context.network).await
}

pub async fn deployment(
    context: Arc<DeploymentContext>,
    config: Arc<Config>,
    families: &DeployFamilies,
) -> eyre::Result<Report> {
    let mut deployed = load_deployed(&context).await?;
    let mut report = Report::new(context.network.clone());

    report.contracts =
        deploy_contracts(context.clone(), config, families, &mut deployed)
            .await?;
    report.batches = context.flush_queues().await?;

    Ok(report)
}

pub async fn upgrade_deployment(
    context: Arc<DeploymentContext>,
    config: Arc<Config>,
) -> eyre::Result<Report> {
    let mut deployed = load_deployed(&context).await?;
    let mut report = Report::new(context.network.clone());

    report.upgrades =
        upgrade::upgrade(context.clone(), config, &mut deployed).await?;
    report.batches = context.flush_queues().await?;

    Ok(report)
}

pub async fn configure_deployment(
    context: Arc<DeploymentContext>,
    config: Arc<Config>,
) -> eyre::Result<Report> {
    let deployed = load_deployed(&context).await?;
    let mut report = Report::new(context.network.clone());

    report.calls =
        configure::configure(context.clone(), config, &deployed).await?;
    report.batches = context.flush_queues().await?;

    Ok(report)
}

pub async fn full_deployment(
    context: Arc<DeploymentContext>,
    config: Arc<Config>,
    families: &DeployFamilies,
) -> eyre::Result<Report> {
    let mut deployed = load_deployed(&context).await?;
    let mut report = Report::new(context.network.clone());

    report.contracts = deploy_contracts(
        context.clone(),
        config.clone(),
        families,
        &mut deployed,
    )
    .await?;

    report.upgrades =
        upgrade::upgrade(context.clone(), config.clone(), &mut deployed).await?;

    report.calls =
        configure::configure(context.clone(), config, &deployed).await?;

    report.batches = context.flush_queues().await?;

    Ok(report)
}

/// Addresses every configured contract and upgrade would end up at.
///
/// Only artifacts and the registry are read, nothing is queued or written.
pub async fn predict_addresses(
    context: Arc<DeploymentContext>,
    config: Arc<Config>,
    families: &DeployFamilies,
) -> eyre::Result<Report> {
    eyre::ensure!(context.predict_only, "Context is not in predict mode");

    let mut deployed = load_deployed(&context).await?;
    let mut report = Report::new(context.network.clone());

    report.contracts = deploy_contracts(
        context.clone(),
        config.clone(),
        families,
        &mut deployed,
    )
    .await?;

    report.upgrades = upgrade::upgrade(context, config, &mut deployed).await?;

    Ok(report)
}

pub async fn status<S: RegistryStore>(
    registry: &DeploymentRegistry<S>,
    network: &Network,
) -> eyre::Result<Vec<DeploymentRecord>> {
    let records = registry.list(network).await?;

    if records.is_empty() {
        info!(%network, "Nothing deployed yet");
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ethers::types::{Address, H256};
    use indoc::indoc;

    use super::*;
    use crate::error::ErrorKind;
    use crate::guard::IMPLEMENTATION_SLOT;
    use crate::predictor::DETERMINISTIC_DEPLOYER;
    use crate::registry::MemoryRegistryStore;
    use crate::testing::{FakeChain, StaticArtifacts};
    use crate::tx_queue::BatchArtifact;
    use crate::types::{ContractName, QueueName};

    const CONFIG: &str = indoc! {r#"
        salt_prefix: "lending:"
        contracts:
          - name: Oracle
            version: v1_0_0
            constructor_args: ["0x00000000000000000000000000000000000000aa"]
          - name: Pool
            artifact: Pool
            kind: proxy
            version: v1_0_0
            initializer:
              function: initialize
              args: ["@Oracle"]
          - name: Vault
            artifact: Pool
            kind: proxy
            version: v2_0_0
            initializer:
              function: initialize
              args: ["@Oracle"]
            queue: vault-setup
        calls:
          - target: "@Pool"
            artifact: Pool
            function: setFee
            args: ["30"]
          - target: "@Oracle"
            artifact: Oracle
            function: setHeartbeat
            args: ["3600"]
    "#};

    struct Harness {
        chain: Arc<FakeChain>,
        store: Arc<MemoryRegistryStore>,
        batches: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> eyre::Result<Self> {
            Ok(Self {
                chain: Arc::new(FakeChain::default()),
                store: Arc::new(MemoryRegistryStore::default()),
                batches: tempfile::tempdir()?,
            })
        }

        fn context(
            &self,
            queue: &str,
            predict_only: bool,
        ) -> Arc<DeploymentContext> {
            let store: Arc<dyn RegistryStore> = self.store.clone();
            let tx_queue =
                TxQueue::new(self.batches.path()).with_chain_id(31337);

            Arc::new(DeploymentContext {
                network: Network::from("mainnet"),
                registry: DeploymentRegistry::new(store),
                client: self.chain.clone(),
                sender: self.chain.clone(),
                artifacts: Arc::new(StaticArtifacts::protocol()),
                tx_queue: Mutex::new(tx_queue),
                default_queue: QueueName::from(queue),
                contracts_dir: ".".into(),
                chain_id: Some(31337),
                etherscan_api_key: None,
                predict_only,
            })
        }

        async fn deploy(&self, config: &Arc<Config>) -> eyre::Result<Report> {
            let families = DeployFamilies::new()?;
            let context = self.context("deploy", false);

            deployment(context, config.clone(), &families).await
        }

        async fn predict(&self, config: &Arc<Config>) -> eyre::Result<Report> {
            let families = DeployFamilies::new()?;
            let context = self.context("predict", true);

            predict_addresses(context, config.clone(), &families).await
        }

        async fn configure(
            &self,
            config: &Arc<Config>,
        ) -> eyre::Result<Report> {
            let context = self.context("configure", false);

            configure_deployment(context, config.clone()).await
        }

        async fn upgrade(&self, config: &Arc<Config>) -> eyre::Result<Report> {
            let context = self.context("upgrade", false);

            upgrade_deployment(context, config.clone()).await
        }

        fn batch_path(&self, queue: &str) -> PathBuf {
            self.batches.path().join("mainnet").join(format!("{queue}.json"))
        }

        async fn batch(&self, queue: &str) -> eyre::Result<BatchArtifact> {
            serde_utils::read_deserialize(self.batch_path(queue)).await
        }
    }

    fn config(content: &str) -> eyre::Result<Arc<Config>> {
        let config: Config = serde_utils::from_str(Format::Yaml, content)?;
        config.validate()?;

        Ok(Arc::new(config))
    }

    fn address_of(report: &Report, name: &str) -> Address {
        report
            .contracts
            .iter()
            .find(|contract| contract.name == ContractName::from(name))
            .map(|contract| contract.address)
            .unwrap()
    }

    fn all_outcomes(report: &Report, outcome: steps::StepOutcome) -> bool {
        report
            .contracts
            .iter()
            .all(|contract| contract.outcome == outcome)
    }

    #[tokio::test]
    async fn second_deploy_sends_nothing() -> eyre::Result<()> {
        let harness = Harness::new()?;
        let config = config(CONFIG)?;

        let first = harness.deploy(&config).await?;

        // Oracle, Pool + implementation, Vault + implementation
        assert_eq!(harness.chain.sent().len(), 5);
        assert!(all_outcomes(&first, steps::StepOutcome::Deployed));

        let second = harness.deploy(&config).await?;

        assert_eq!(harness.chain.sent().len(), 5);
        assert!(all_outcomes(&second, steps::StepOutcome::AlreadySatisfied));

        for name in ["Oracle", "Pool", "PoolImplementation", "Vault"] {
            assert_eq!(address_of(&first, name), address_of(&second, name));
        }

        Ok(())
    }

    #[tokio::test]
    async fn deployed_addresses_match_prediction() -> eyre::Result<()> {
        let harness = Harness::new()?;
        let config = config(CONFIG)?;

        let predicted = harness.predict(&config).await?;

        assert!(harness.chain.sent().is_empty());
        assert!(harness.store.list(&"mainnet".into()).await?.is_empty());

        let deployed = harness.deploy(&config).await?;

        assert_eq!(predicted.contracts.len(), deployed.contracts.len());
        for (predicted, deployed) in
            predicted.contracts.iter().zip(&deployed.contracts)
        {
            assert_eq!(predicted.name, deployed.name);
            assert_eq!(predicted.address, deployed.address);
        }

        for tx in harness.chain.sent() {
            assert_eq!(tx.to, DETERMINISTIC_DEPLOYER);
        }

        Ok(())
    }

    #[tokio::test]
    async fn proxy_v2_queues_initializer_for_owner() -> eyre::Result<()> {
        let harness = Harness::new()?;
        let config = config(CONFIG)?;

        let report = harness.deploy(&config).await?;

        assert_eq!(report.batches.len(), 1);
        assert_eq!(report.batches[0].queue, QueueName::from("vault-setup"));

        let batch = harness.batch("vault-setup").await?;
        let initialize = &batch.transactions[0];

        assert_eq!(batch.transactions.len(), 1);
        assert_eq!(initialize.to, address_of(&report, "Vault"));
        assert_eq!(initialize.function_signature, "initialize(address)");
        assert_eq!(
            initialize.contract_inputs_values["oracle"],
            format!("{:?}", address_of(&report, "Oracle"))
        );

        Ok(())
    }

    #[tokio::test]
    async fn initialized_proxy_v2_queues_nothing() -> eyre::Result<()> {
        let harness = Harness::new()?;
        let config = config(CONFIG)?;

        let predicted = harness.predict(&config).await?;

        harness.chain.set_storage(
            address_of(&predicted, "Vault"),
            H256::zero(),
            H256::from_low_u64_be(1),
        );

        let report = harness.deploy(&config).await?;

        assert!(report.batches.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn preexisting_code_is_recorded_not_sent() -> eyre::Result<()> {
        let harness = Harness::new()?;
        let config = config(indoc! {r#"
            contracts:
              - name: Oracle
                version: v1_0_0
                constructor_args:
                  - "0x00000000000000000000000000000000000000aa"
        "#})?;

        let predicted = harness.predict(&config).await?;
        let oracle = address_of(&predicted, "Oracle");

        harness.chain.set_code(oracle, vec![0xfe]);

        let report = harness.deploy(&config).await?;

        assert!(harness.chain.sent().is_empty());
        assert_eq!(
            report.contracts[0].outcome,
            steps::StepOutcome::Preexisting
        );

        let record = harness
            .store
            .get(&"mainnet".into(), &"Oracle".into())
            .await?;
        assert_eq!(
            record.map(|record| record.deployed_at),
            Some(crate::registry::DeployedAt::Preexisting)
        );

        Ok(())
    }

    #[tokio::test]
    async fn unsupported_version_deploys_nothing() -> eyre::Result<()> {
        let harness = Harness::new()?;
        let config = config(indoc! {r#"
            contracts:
              - name: Pool
                kind: proxy
                version: v3_0_0
        "#})?;

        let err = harness.deploy(&config).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DeployError>(),
            Some(DeployError::UnsupportedVersion { .. })
        ));
        assert!(harness.chain.sent().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn configure_queues_calls_in_order() -> eyre::Result<()> {
        let harness = Harness::new()?;
        let config = config(CONFIG)?;

        harness.deploy(&config).await?;
        let sent = harness.chain.sent().len();

        let report = harness.configure(&config).await?;

        assert_eq!(harness.chain.sent().len(), sent);
        assert_eq!(report.calls.len(), 2);

        let batch = harness.batch("configure").await?;
        let signatures: Vec<_> = batch
            .transactions
            .iter()
            .map(|tx| tx.function_signature.as_str())
            .collect();

        assert_eq!(
            signatures,
            vec!["setFee(uint256)", "setHeartbeat(uint256)"]
        );
        assert_eq!(batch.chain_id.as_deref(), Some("31337"));

        Ok(())
    }

    #[tokio::test]
    async fn changed_contract_needs_force() -> eyre::Result<()> {
        let harness = Harness::new()?;
        let config = config(CONFIG)?;

        let first = harness.deploy(&config).await?;
        let oracle = address_of(&first, "Oracle");
        let sent = harness.chain.sent().len();

        let mut changed = (*config).clone();
        changed.contracts[0].constructor_args =
            vec!["0x00000000000000000000000000000000000000bb".to_string()];

        let unforced = harness.deploy(&Arc::new(changed.clone())).await?;

        assert_eq!(harness.chain.sent().len(), sent);
        assert_eq!(address_of(&unforced, "Oracle"), oracle);

        changed.contracts[0].force = true;
        let forced = harness.deploy(&Arc::new(changed)).await?;

        assert_eq!(harness.chain.sent().len(), sent + 1);
        assert_ne!(address_of(&forced, "Oracle"), oracle);

        let history = harness
            .store
            .history(&"mainnet".into(), &"Oracle".into())
            .await?;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].address, oracle);

        Ok(())
    }

    #[tokio::test]
    async fn zero_call_target_queues_nothing() -> eyre::Result<()> {
        let harness = Harness::new()?;
        let config = config(indoc! {r#"
            calls:
              - target: "0x0000000000000000000000000000000000000000"
                artifact: Pool
                function: setFee
                args: ["30"]
        "#})?;

        let err = harness.configure(&config).await.unwrap_err();

        assert_eq!(
            err.downcast_ref::<DeployError>().map(DeployError::kind),
            Some(ErrorKind::InvalidInput)
        );
        assert!(!harness.batch_path("configure").exists());

        Ok(())
    }

    #[tokio::test]
    async fn upgrade_is_queued_not_sent() -> eyre::Result<()> {
        let harness = Harness::new()?;

        harness.deploy(&config(CONFIG)?).await?;

        let pool = harness
            .store
            .get(&"mainnet".into(), &"Pool".into())
            .await?
            .unwrap();
        harness.chain.set_storage(
            pool.address,
            H256::zero(),
            H256::from_low_u64_be(1),
        );

        let config = config(&format!(
            "{CONFIG}{}",
            indoc! {r#"
                upgrades:
                  - proxy: Pool
                    artifact: PoolV2
                    version: v2_0_0
                    initializer:
                      function: initialize
                      args: ["@Oracle"]
            "#}
        ))?;

        let sent = harness.chain.sent().len();
        let report = harness.upgrade(&config).await?;

        // only the new implementation is sent, the upgrade itself is queued
        assert_eq!(harness.chain.sent().len(), sent + 1);
        assert_eq!(report.upgrades.len(), 1);
        assert!(!report.upgrades[0].initializes);

        let batch = harness.batch("upgrade").await?;
        assert_eq!(batch.transactions.len(), 1);
        assert_eq!(batch.transactions[0].to, pool.address);
        assert_eq!(
            batch.transactions[0].function_signature,
            "upgradeTo(address)"
        );

        let implementation = report.upgrades[0].implementation.address;
        let history = harness
            .store
            .history(&"mainnet".into(), &"PoolImplementation".into())
            .await?;
        assert_eq!(history.len(), 1);

        // once executed, rerunning has nothing left to do
        harness.chain.set_storage(
            pool.address,
            IMPLEMENTATION_SLOT,
            implementation.into(),
        );

        let rerun = harness.upgrade(&config).await?;

        assert_eq!(harness.chain.sent().len(), sent + 1);
        assert_eq!(rerun.upgrades[0].queued, None);
        assert!(rerun.batches.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn status_lists_network_records() -> eyre::Result<()> {
        let registry = DeploymentRegistry::new(MemoryRegistryStore::default());
        registry
            .put(crate::testing::record("Oracle", "mainnet", 0xaa), false)
            .await?;

        assert_eq!(status(&registry, &"mainnet".into()).await?.len(), 1);
        assert!(status(&registry, &"sepolia".into()).await?.is_empty());

        Ok(())
    }
}
