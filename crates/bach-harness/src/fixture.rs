//! JSON scenario fixtures
//!
//! A fixture file maps scenario names to an environment, pre-state,
//! transaction, expected post-state and validity range. Everything is
//! parsed up front; building per fork then only allocates, validates and
//! signs, exactly like a built-in scenario.

use crate::allocator::AccountAllocator;
use crate::builder::TransactionBuilder;
use crate::compiled::{self, CompiledCode};
use crate::error::{HarnessError, HarnessResult, SetupResult};
use crate::scenario::{Scenario, ScenarioInput, ScenarioSpec};
use crate::verifier::{Expectation, ExpectedAccount, ExpectedPostState};
use bach_crypto::{private_key_from_bytes, private_key_to_address};
use bach_forks::{Fork, ForkRange};
use bach_primitives::{quantity, Address, H256, U256};
use bach_types::{Account, AccessListItem, Environment, TxType};
use bytes::Bytes;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Number given either as a JSON integer or as a hex/decimal string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    /// JSON integer
    Number(u64),
    /// `0x` hex or decimal string
    Text(String),
}

impl Quantity {
    fn to_u256(&self) -> HarnessResult<U256> {
        match self {
            Quantity::Number(n) => Ok(U256::from(*n)),
            Quantity::Text(s) => Ok(quantity::parse_u256(s)?),
        }
    }

    fn to_u64(&self) -> HarnessResult<u64> {
        match self {
            Quantity::Number(n) => Ok(*n),
            Quantity::Text(s) => Ok(quantity::parse_u64(s)?),
        }
    }
}

/// Account code: hex bytes or a named compiled artifact
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CodeSource {
    /// Hex bytes
    Hex(String),
    /// Compiled artifact
    Compiled {
        /// Artifact name
        compiled: String,
    },
}

/// Block context record
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvRecord {
    /// Fee recipient
    pub coinbase: Option<String>,
    /// Difficulty
    pub difficulty: Option<Quantity>,
    /// Randomness beacon output
    pub prevrandao: Option<String>,
    /// Block gas limit
    pub gas_limit: Option<Quantity>,
    /// Block number
    pub number: Option<Quantity>,
    /// Block timestamp
    pub timestamp: Option<Quantity>,
    /// Base fee
    pub base_fee: Option<Quantity>,
    /// Blob base fee
    pub blob_base_fee: Option<Quantity>,
}

/// Pre-state account record
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountRecord {
    /// Balance
    #[serde(default)]
    pub balance: Option<Quantity>,
    /// Nonce
    #[serde(default)]
    pub nonce: Option<Quantity>,
    /// Code
    #[serde(default)]
    pub code: Option<CodeSource>,
    /// Storage, key to value
    #[serde(default)]
    pub storage: BTreeMap<String, Quantity>,
}

/// Access list entry record
#[derive(Debug, Clone, Deserialize)]
pub struct AccessListRecord {
    /// Account
    pub address: String,
    /// Storage keys
    #[serde(default)]
    pub storage_keys: Vec<String>,
}

/// Transaction record
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRecord {
    /// Type tag: 0 legacy, 1 access list, 2 dynamic fee
    #[serde(default, rename = "type")]
    pub tx_type: u8,
    /// Chain id; omitted means the configured one
    pub chain_id: Option<Quantity>,
    /// Sign with a chain id (legacy only)
    #[serde(default = "default_protected")]
    pub protected: bool,
    /// Recipient; omitted or empty creates a contract
    pub to: Option<String>,
    /// Value
    pub value: Option<Quantity>,
    /// Gas limit
    pub gas_limit: Quantity,
    /// Gas price (types 0 and 1)
    pub gas_price: Option<Quantity>,
    /// Fee cap (type 2)
    pub max_fee_per_gas: Option<Quantity>,
    /// Priority fee cap (type 2)
    pub max_priority_fee_per_gas: Option<Quantity>,
    /// Payload
    #[serde(default)]
    pub data: String,
    /// Access list
    #[serde(default)]
    pub access_list: Vec<AccessListRecord>,
    /// Explicit nonce
    pub nonce: Option<Quantity>,
    /// Sender; defaults to the key's address
    pub sender: Option<String>,
    /// Signing key
    pub secret_key: String,
}

fn default_protected() -> bool {
    true
}

/// Expected account record
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpectedRecord {
    /// Account must not exist
    #[serde(default)]
    pub absent: bool,
    /// Balance
    pub balance: Option<Quantity>,
    /// Nonce
    pub nonce: Option<Quantity>,
    /// Code
    pub code: Option<String>,
    /// Storage; when present, exact
    pub storage: Option<BTreeMap<String, Quantity>>,
}

/// One scenario in a fixture file
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureRecord {
    /// First fork included
    #[serde(default = "default_valid_from")]
    pub valid_from: Fork,
    /// First fork excluded
    pub valid_until: Option<Fork>,
    /// Block context
    #[serde(default)]
    pub env: EnvRecord,
    /// Pre-state
    pub pre: BTreeMap<String, AccountRecord>,
    /// Transaction
    pub transaction: TransactionRecord,
    /// Expected post-state
    #[serde(default)]
    pub post: BTreeMap<String, ExpectedRecord>,
}

fn default_valid_from() -> Fork {
    Fork::Frontier
}

/// Pre-state account with its code still unchecked against the fork
#[derive(Debug, Clone)]
struct PreAccount {
    address: Address,
    account: Account,
    compiled: Option<CompiledCode>,
}

/// Fully parsed fixture
#[derive(Debug, Clone)]
struct Fixture {
    env: Environment,
    pre: Vec<PreAccount>,
    tx: TransactionBuilder,
    post: ExpectedPostState,
}

impl Fixture {
    fn build(&self, input: &ScenarioInput<'_>) -> SetupResult<ScenarioSpec> {
        let mut alloc = AccountAllocator::new();
        for entry in &self.pre {
            let mut account = entry.account.clone();
            if let Some(code) = &entry.compiled {
                account.code = code.for_fork(input.rules)?;
            }
            alloc.insert_account(entry.address, account)?;
        }
        let tx = self
            .tx
            .clone()
            .build(&alloc, input.rules, input.chain_id)?;
        Ok(ScenarioSpec {
            env: Environment {
                chain_id: input.chain_id,
                ..self.env.clone()
            },
            pre: alloc.into_pre_state(),
            tx,
            post: self.post.clone(),
        })
    }
}

/// Load scenarios from a fixture file
pub fn load_file(path: impl AsRef<Path>) -> HarnessResult<Vec<Scenario>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let scenarios = parse_str(&content)?;
    debug!(path = %path.display(), count = scenarios.len(), "loaded fixtures");
    Ok(scenarios)
}

/// Parse scenarios from fixture JSON
pub fn parse_str(json: &str) -> HarnessResult<Vec<Scenario>> {
    let records: BTreeMap<String, FixtureRecord> = serde_json::from_str(json)?;
    records
        .into_iter()
        .map(|(name, record)| to_scenario(name, record))
        .collect()
}

fn to_scenario(name: String, record: FixtureRecord) -> HarnessResult<Scenario> {
    let range = match record.valid_until {
        Some(until) => ForkRange::between(record.valid_from, until)
            .map_err(|e| HarnessError::Fixture(format!("{name}: {e}")))?,
        None => ForkRange::starting(record.valid_from),
    };
    let fixture = Arc::new(Fixture {
        env: parse_env(&record.env)?,
        pre: record
            .pre
            .iter()
            .map(|(address, account)| parse_account(address, account))
            .collect::<HarnessResult<_>>()?,
        tx: parse_transaction(&record.transaction)?,
        post: parse_post(&record.post)?,
    });
    Ok(Scenario::new(name, range, move |input| fixture.build(input)))
}

fn parse_address(s: &str) -> HarnessResult<Address> {
    Address::from_hex(s).map_err(|e| HarnessError::Fixture(format!("address {s}: {e}")))
}

fn parse_h256(s: &str) -> HarnessResult<H256> {
    Ok(H256::from_word(quantity::parse_u256(s)?))
}

fn parse_env(record: &EnvRecord) -> HarnessResult<Environment> {
    let mut env = Environment::default();
    if let Some(coinbase) = &record.coinbase {
        env.coinbase = parse_address(coinbase)?;
    }
    if let Some(difficulty) = &record.difficulty {
        env.difficulty = difficulty.to_u256()?;
    }
    if let Some(prevrandao) = &record.prevrandao {
        env.prevrandao = parse_h256(prevrandao)?;
    }
    if let Some(gas_limit) = &record.gas_limit {
        env.gas_limit = gas_limit.to_u64()?;
    }
    if let Some(number) = &record.number {
        env.number = number.to_u64()?;
    }
    if let Some(timestamp) = &record.timestamp {
        env.timestamp = timestamp.to_u64()?;
    }
    if let Some(base_fee) = &record.base_fee {
        env.base_fee = base_fee.to_u256()?;
    }
    if let Some(blob_base_fee) = &record.blob_base_fee {
        env.blob_base_fee = blob_base_fee.to_u256()?;
    }
    Ok(env)
}

fn parse_storage(storage: &BTreeMap<String, Quantity>) -> HarnessResult<BTreeMap<U256, U256>> {
    storage
        .iter()
        .map(|(key, value)| Ok((quantity::parse_u256(key)?, value.to_u256()?)))
        .collect()
}

fn parse_account(address: &str, record: &AccountRecord) -> HarnessResult<PreAccount> {
    let balance = record.balance.as_ref().map(Quantity::to_u256).transpose()?;
    let nonce = record.nonce.as_ref().map(Quantity::to_u64).transpose()?;
    let (code, compiled) = match &record.code {
        None => (Bytes::new(), None),
        Some(CodeSource::Hex(hex)) => (Bytes::from(quantity::parse_bytes(hex)?), None),
        Some(CodeSource::Compiled { compiled: name }) => {
            let code = compiled::by_name(name)
                .ok_or_else(|| HarnessError::Fixture(format!("unknown compiled code: {name}")))?;
            (code.bytes().clone(), Some(code))
        }
    };
    let account = Account::with_code(code, balance.unwrap_or_default(), nonce.unwrap_or_default())
        .with_storage(parse_storage(&record.storage)?);
    Ok(PreAccount {
        address: parse_address(address)?,
        account,
        compiled,
    })
}

fn parse_transaction(record: &TransactionRecord) -> HarnessResult<TransactionBuilder> {
    let key = private_key_from_bytes(&quantity::parse_bytes(&record.secret_key)?)
        .map_err(|e| HarnessError::Fixture(format!("secret_key: {e}")))?;
    let sender = match &record.sender {
        Some(sender) => parse_address(sender)?,
        None => private_key_to_address(&key),
    };
    let to = match record.to.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(to) => Some(parse_address(to)?),
    };
    let tx_type = match record.tx_type {
        0 => TxType::Legacy,
        1 => TxType::AccessList,
        2 => TxType::DynamicFee,
        other => return Err(HarnessError::Fixture(format!("unknown transaction type {other}"))),
    };
    let access_list: Vec<AccessListItem> = record
        .access_list
        .iter()
        .map(|item| {
            Ok(AccessListItem {
                address: parse_address(&item.address)?,
                storage_keys: item
                    .storage_keys
                    .iter()
                    .map(|key| parse_h256(key))
                    .collect::<HarnessResult<_>>()?,
            })
        })
        .collect::<HarnessResult<_>>()?;

    let mut builder = TransactionBuilder::default()
        .tx_type(tx_type)
        .sender(sender)
        .to(to)
        .gas_limit(record.gas_limit.to_u64()?)
        .data(quantity::parse_bytes(&record.data)?)
        .access_list(access_list)
        .protected(record.protected)
        .secret_key(key);
    if let Some(value) = &record.value {
        builder = builder.value(value.to_u256()?);
    }
    if let Some(chain_id) = &record.chain_id {
        builder = builder.chain_id(chain_id.to_u64()?);
    }
    if let Some(price) = &record.gas_price {
        builder = builder.gas_price(price.to_u256()?);
    }
    if let Some(fee) = &record.max_fee_per_gas {
        builder = builder.max_fee_per_gas(fee.to_u256()?);
    }
    if let Some(tip) = &record.max_priority_fee_per_gas {
        builder = builder.max_priority_fee_per_gas(tip.to_u256()?);
    }
    if let Some(nonce) = &record.nonce {
        builder = builder.nonce(nonce.to_u64()?);
    }
    Ok(builder)
}

fn parse_post(post: &BTreeMap<String, ExpectedRecord>) -> HarnessResult<ExpectedPostState> {
    let mut expected = ExpectedPostState::new();
    for (address, record) in post {
        let address = parse_address(address)?;
        if record.absent {
            expected.insert(address, Expectation::Absent);
            continue;
        }
        let account = ExpectedAccount {
            balance: record.balance.as_ref().map(Quantity::to_u256).transpose()?,
            nonce: record.nonce.as_ref().map(Quantity::to_u64).transpose()?,
            code: record
                .code
                .as_deref()
                .map(quantity::parse_bytes)
                .transpose()?
                .map(Bytes::from),
            storage: record.storage.as_ref().map(parse_storage).transpose()?,
        };
        expected.insert(address, Expectation::Present(account));
    }
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::runner::Runner;
    use bach_forks::ForkRuleset;
    use std::io::Write;

    const SSTORE_FIXTURE: &str = r#"{
        "store_one": {
            "valid_from": "Berlin",
            "env": { "coinbase": "0x2adc25665018aa1fe0e6bc666dac8fc2697ff9ba", "number": "1" },
            "pre": {
                "0x0000000000000000000000000000000000001000": {
                    "balance": "0",
                    "code": "0x600160005500"
                },
                "0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b": { "balance": "0x0ba1a9ce" }
            },
            "transaction": {
                "to": "0x0000000000000000000000000000000000001000",
                "gas_limit": 100000,
                "gas_price": "10",
                "secret_key": "0x45a915e4d060149eb4365960e6a7a45f334393093061116b197e3240065ff2d8"
            },
            "post": {
                "0x0000000000000000000000000000000000001000": { "storage": { "0x00": "0x01" } },
                "0x0000000000000000000000000000000000002000": { "absent": true }
            }
        }
    }"#;

    #[test]
    fn test_parse_and_run() {
        let scenarios = parse_str(SSTORE_FIXTURE).unwrap();
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].name(), "store_one");
        assert!(!scenarios[0].applies_to(Fork::Istanbul));

        let runner = Runner::new(&HarnessConfig {
            forks: vec![Fork::Berlin, Fork::Cancun],
            ..Default::default()
        });
        let summary = runner.run(&scenarios).unwrap();
        assert_eq!(summary.stats.total, 2);
        assert!(summary.stats.all_passed(), "{:?}", summary.stats.failures);
    }

    #[test]
    fn test_chain_id_comes_from_input() {
        let scenarios = parse_str(SSTORE_FIXTURE).unwrap();
        let rules = ForkRuleset::standard().rules(Fork::London);
        let spec = scenarios[0]
            .build(&ScenarioInput {
                fork: Fork::London,
                rules: &rules,
                chain_id: 1337,
            })
            .unwrap();
        assert_eq!(spec.env.chain_id, 1337);
        assert_eq!(spec.tx.tx.chain_id(), Some(1337));
        assert_eq!(spec.pre.len(), 2);
    }

    #[test]
    fn test_compiled_code_handle() {
        let json = r#"{
            "compiled": {
                "valid_from": "Berlin",
                "pre": {
                    "0x0000000000000000000000000000000000001000": {
                        "code": { "compiled": "add_and_store" }
                    },
                    "0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b": { "balance": "0x0ba1a9ce0ba1a9ce" }
                },
                "transaction": {
                    "type": 1,
                    "to": "0x0000000000000000000000000000000000001000",
                    "gas_limit": "0x7a120",
                    "secret_key": "0x45a915e4d060149eb4365960e6a7a45f334393093061116b197e3240065ff2d8"
                },
                "post": {
                    "0x0000000000000000000000000000000000001000": { "storage": { "0": 3 } }
                }
            }
        }"#;
        let scenarios = parse_str(json).unwrap();
        let rules = ForkRuleset::standard().rules(Fork::Berlin);
        let spec = scenarios[0]
            .build(&ScenarioInput {
                fork: Fork::Berlin,
                rules: &rules,
                chain_id: 1,
            })
            .unwrap();
        let contract = Address::from_low_u64_be(0x1000);
        assert_eq!(spec.pre.get(&contract).unwrap().code.len(), 22);

        let runner = Runner::new(&HarnessConfig {
            forks: vec![Fork::Berlin, Fork::Cancun],
            ..Default::default()
        });
        let summary = runner.run(&scenarios).unwrap();
        assert!(summary.stats.all_passed(), "{:?}", summary.stats.failures);
    }

    #[test]
    fn test_invalid_fixtures() {
        assert!(matches!(parse_str("{"), Err(HarnessError::Json(_))));

        let bad_range = SSTORE_FIXTURE.replace(
            r#""valid_from": "Berlin","#,
            r#""valid_from": "Berlin", "valid_until": "Berlin","#,
        );
        assert!(matches!(parse_str(&bad_range), Err(HarnessError::Fixture(_))));

        let bad_quantity = SSTORE_FIXTURE.replace(r#""gas_price": "10""#, r#""gas_price": "ten""#);
        assert!(matches!(parse_str(&bad_quantity), Err(HarnessError::Quantity(_))));

        let bad_code =
            SSTORE_FIXTURE.replace(r#""0x600160005500""#, r#"{"compiled": "missing"}"#);
        assert!(matches!(parse_str(&bad_code), Err(HarnessError::Fixture(_))));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SSTORE_FIXTURE.as_bytes()).unwrap();
        let scenarios = load_file(file.path()).unwrap();
        assert_eq!(scenarios.len(), 1);
        assert!(matches!(load_file("/nonexistent.json"), Err(HarnessError::Io(_))));
    }
}
