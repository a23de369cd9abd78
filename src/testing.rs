//! In-memory stand-ins for the chain and the compiler, shared by unit tests.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::abi::{parse_abi, Token};
use ethers::types::{Address, Bytes, H256};
use ethers::utils::{get_create2_address, keccak256};
use semver::Version;
use serde_json::json;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;

use crate::artifacts::{ArtifactSource, ContractArtifact};
use crate::client::{
    CallBuilder, ChainClient, PopulatedCall, SentTransaction, TransactionSender,
    UnsignedTransaction,
};
use crate::error::DeployError;
use crate::forge_utils::ContractSpec;
use crate::registry::{DeployedAt, DeploymentRecord};
use crate::types::{ContractName, Network};

pub fn record(name: &str, network: &str, byte: u8) -> DeploymentRecord {
    DeploymentRecord {
        name: ContractName::from(name),
        address: Address::repeat_byte(byte),
        network: Network::from(network),
        deployed_at: DeployedAt::Transaction {
            hash: H256::repeat_byte(byte),
            block: Some(byte as u64),
        },
        version: Version::new(1, 0, 0),
    }
}

pub fn erc20_call(function: &str, args: Vec<Token>) -> PopulatedCall {
    let abi = parse_abi(&[
        "function approve(address spender, uint256 amount) returns (bool)",
        "function transfer(address to, uint256 amount) returns (bool)",
    ])
    .unwrap();

    CallBuilder::default()
        .abi(abi)
        .function_name(function)
        .args(args)
        .to(Address::repeat_byte(0xaa))
        .build()
        .unwrap()
}

#[derive(Debug, Default)]
struct ChainState {
    storage: HashMap<(Address, H256), H256>,
    code: HashMap<Address, Bytes>,
    sent: Vec<UnsignedTransaction>,
    fail_storage_reads: bool,
}

/// Any call carrying at least a salt is treated as a CREATE2 factory call.
#[derive(Debug, Default)]
pub struct FakeChain {
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn set_storage(&self, address: Address, slot: H256, value: H256) {
        self.state
            .lock()
            .unwrap()
            .storage
            .insert((address, slot), value);
    }

    pub fn set_code(&self, address: Address, code: impl Into<Bytes>) {
        self.state.lock().unwrap().code.insert(address, code.into());
    }

    pub fn fail_storage_reads(&self) {
        self.state.lock().unwrap().fail_storage_reads = true;
    }

    pub fn sent(&self) -> Vec<UnsignedTransaction> {
        self.state.lock().unwrap().sent.clone()
    }

    fn create2_target(tx: &UnsignedTransaction) -> Option<Address> {
        if tx.data.len() <= 32 {
            return None;
        }

        let (salt, init_code) = tx.data.split_at(32);

        Some(get_create2_address(tx.to, salt, init_code))
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn chain_id(&self) -> Result<u64, DeployError> {
        Ok(31337)
    }

    async fn get_storage_at(
        &self,
        address: Address,
        slot: H256,
    ) -> Result<H256, DeployError> {
        let state = self.state.lock().unwrap();

        if state.fail_storage_reads {
            return Err(DeployError::external(
                "eth_getStorageAt",
                "connection refused",
            ));
        }

        Ok(state
            .storage
            .get(&(address, slot))
            .copied()
            .unwrap_or_default())
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, DeployError> {
        let state = self.state.lock().unwrap();

        Ok(state.code.get(&address).cloned().unwrap_or_default())
    }

    async fn call(
        &self,
        tx: &UnsignedTransaction,
    ) -> Result<Bytes, DeployError> {
        Ok(Self::create2_target(tx)
            .map(|address| Bytes::from(address.as_bytes().to_vec()))
            .unwrap_or_default())
    }
}

#[async_trait]
impl TransactionSender for FakeChain {
    async fn send(
        &self,
        tx: UnsignedTransaction,
    ) -> Result<SentTransaction, DeployError> {
        let mut state = self.state.lock().unwrap();

        if let Some(address) = Self::create2_target(&tx) {
            state.code.insert(address, Bytes::from(vec![0xfe]));
        }

        state.sent.push(tx.clone());

        Ok(SentTransaction {
            hash: H256(keccak256(&tx.data)),
            block_number: Some(state.sent.len() as u64),
        })
    }
}

/// Fixed set of artifacts, keyed by contract name.
#[derive(Debug, Default)]
pub struct StaticArtifacts {
    artifacts: HashMap<String, Arc<ContractArtifact>>,
}

impl StaticArtifacts {
    pub fn with(
        mut self,
        name: &str,
        abi: serde_json::Value,
        bytecode: &[u8],
    ) -> Self {
        let artifact = ContractArtifact::from_parts(
            ContractSpec::name(name),
            abi,
            Bytes::from(bytecode.to_vec()),
        )
        .unwrap();

        self.artifacts.insert(name.to_string(), Arc::new(artifact));
        self
    }

    /// A small protocol: an oracle, an upgradeable pool and the proxy.
    pub fn protocol() -> Self {
        Self::default()
            .with(
                "Oracle",
                json!([
                    {
                        "type": "constructor",
                        "inputs": [{ "name": "owner", "type": "address" }],
                        "stateMutability": "nonpayable"
                    },
                    {
                        "type": "function",
                        "name": "setHeartbeat",
                        "inputs": [{ "name": "heartbeat", "type": "uint256" }],
                        "outputs": [],
                        "stateMutability": "nonpayable"
                    }
                ]),
                &[0x60, 0x80, 0x60, 0x01],
            )
            .with("Pool", pool_abi(), &[0x60, 0x80, 0x60, 0x02])
            .with("PoolV2", pool_abi(), &[0x60, 0x80, 0x60, 0x03])
            .with(
                "ERC1967Proxy",
                json!([{
                    "type": "constructor",
                    "inputs": [
                        { "name": "implementation", "type": "address" },
                        { "name": "_data", "type": "bytes" }
                    ],
                    "stateMutability": "payable"
                }]),
                &[0x60, 0x80, 0x60, 0x04],
            )
    }
}

fn pool_abi() -> serde_json::Value {
    json!([
        {
            "type": "function",
            "name": "initialize",
            "inputs": [{ "name": "oracle", "type": "address" }],
            "outputs": [],
            "stateMutability": "nonpayable"
        },
        {
            "type": "function",
            "name": "setFee",
            "inputs": [{ "name": "fee", "type": "uint256" }],
            "outputs": [],
            "stateMutability": "nonpayable"
        }
    ])
}

#[async_trait]
impl ArtifactSource for StaticArtifacts {
    async fn artifact(
        &self,
        spec: &ContractSpec,
    ) -> eyre::Result<Arc<ContractArtifact>> {
        self.artifacts
            .get(&spec.name)
            .cloned()
            .ok_or_else(|| eyre::eyre!("Unknown artifact {spec}"))
    }
}

/// Collects formatted log lines so tests can assert on emitted events.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn subscriber(&self) -> impl Subscriber + Send + Sync {
        tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
