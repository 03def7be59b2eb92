//! Transaction builder for declarative scenario construction
//!
//! Provides a fluent API; `build` validates against the pre-state and the
//! active fork, then signs.

use crate::allocator::AccountAllocator;
use crate::error::{SetupError, SetupResult};
use bach_crypto::{private_key_to_address, PrivateKey};
use bach_forks::{ForkRules, Param};
use bach_primitives::{Address, U256};
use bach_types::{
    AccessListItem, AccessListTx, DynamicFeeTx, LegacyTx, SignedTransaction, Transaction, TxType,
};
use bytes::Bytes;
use tracing::debug;

/// Default gas limit for scenario transactions
pub const DEFAULT_GAS_LIMIT: u64 = 21_000;

/// Default gas price, and default fee cap for dynamic-fee transactions
pub const DEFAULT_GAS_PRICE: u64 = 10;

/// Builder for constructing transactions declaratively
#[derive(Clone)]
pub struct TransactionBuilder {
    pub(crate) tx_type: TxType,
    pub(crate) sender: Option<Address>,
    pub(crate) to: Option<Address>,
    pub(crate) value: U256,
    pub(crate) data: Bytes,
    pub(crate) gas_limit: u64,
    pub(crate) gas_price: U256,
    pub(crate) max_fee_per_gas: U256,
    pub(crate) max_priority_fee_per_gas: U256,
    pub(crate) access_list: Vec<AccessListItem>,
    pub(crate) chain_id: Option<u64>,
    pub(crate) protected: bool,
    pub(crate) nonce: Option<u64>,
    pub(crate) secret_key: Option<PrivateKey>,
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self {
            tx_type: TxType::Legacy,
            sender: None,
            to: None,
            value: U256::zero(),
            data: Bytes::new(),
            gas_limit: DEFAULT_GAS_LIMIT,
            gas_price: U256::from(DEFAULT_GAS_PRICE),
            max_fee_per_gas: U256::from(DEFAULT_GAS_PRICE),
            max_priority_fee_per_gas: U256::zero(),
            access_list: Vec::new(),
            chain_id: None,
            protected: true,
            nonce: None,
            secret_key: None,
        }
    }
}

impl std::fmt::Debug for TransactionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionBuilder")
            .field("tx_type", &self.tx_type)
            .field("sender", &self.sender)
            .field("to", &self.to)
            .field("value", &self.value)
            .field("gas_limit", &self.gas_limit)
            .field("chain_id", &self.chain_id)
            .field("protected", &self.protected)
            .field("nonce", &self.nonce)
            .finish_non_exhaustive()
    }
}

impl TransactionBuilder {
    /// Message call from `sender` to `to`
    pub fn call(sender: Address, to: Address) -> Self {
        Self {
            sender: Some(sender),
            to: Some(to),
            ..Default::default()
        }
    }

    /// Contract creation from `sender` running `init_code`
    pub fn create(sender: Address, init_code: impl Into<Bytes>) -> Self {
        Self {
            sender: Some(sender),
            data: init_code.into(),
            ..Default::default()
        }
    }

    /// Set the transaction type
    pub fn tx_type(mut self, tx_type: TxType) -> Self {
        self.tx_type = tx_type;
        self
    }

    /// Set the sender
    pub fn sender(mut self, sender: Address) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Set the recipient; `None` creates a contract
    pub fn to(mut self, to: Option<Address>) -> Self {
        self.to = to;
        self
    }

    /// Set the value to send
    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Set the call data or init code
    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    /// Set the gas limit
    pub fn gas_limit(mut self, limit: u64) -> Self {
        self.gas_limit = limit;
        self
    }

    /// Set the gas price (legacy and access-list transactions)
    pub fn gas_price(mut self, price: U256) -> Self {
        self.gas_price = price;
        self
    }

    /// Set the fee cap (dynamic-fee transactions)
    pub fn max_fee_per_gas(mut self, fee: U256) -> Self {
        self.max_fee_per_gas = fee;
        self
    }

    /// Set the priority fee cap (dynamic-fee transactions)
    pub fn max_priority_fee_per_gas(mut self, tip: U256) -> Self {
        self.max_priority_fee_per_gas = tip;
        self
    }

    /// Set the access list
    pub fn access_list(mut self, access_list: Vec<AccessListItem>) -> Self {
        self.access_list = access_list;
        self
    }

    /// Set the chain id explicitly instead of taking the scenario's
    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Sign with or without a chain id (legacy transactions only)
    pub fn protected(mut self, protected: bool) -> Self {
        self.protected = protected;
        self
    }

    /// Set an explicit nonce instead of the sender's current one
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Sign with `key` instead of the allocator's key for the sender
    pub fn secret_key(mut self, key: PrivateKey) -> Self {
        self.secret_key = Some(key);
        self
    }

    /// Highest price per gas this transaction may pay
    fn max_fee(&self) -> U256 {
        match self.tx_type {
            TxType::DynamicFee => self.max_fee_per_gas,
            TxType::Legacy | TxType::AccessList => self.gas_price,
        }
    }

    /// Validate against the allocated pre-state and `rules`, then sign.
    ///
    /// `chain_id` is the chain the scenario runs on; a chain id set on the
    /// builder must equal it.
    pub fn build(
        self,
        alloc: &AccountAllocator,
        rules: &ForkRules,
        chain_id: u64,
    ) -> SetupResult<SignedTransaction> {
        let sender = self.sender.ok_or(SetupError::MissingSender)?;
        let pre = alloc.pre_state();

        match self.tx_type {
            TxType::Legacy if self.protected => {
                rules.get(Param::ReplayProtection)?;
            }
            TxType::Legacy => {}
            TxType::AccessList => {
                rules.get(Param::TxTypeAccessList)?;
            }
            TxType::DynamicFee => {
                rules.get(Param::TxTypeDynamicFee)?;
            }
        }

        let signs_chain_id = self.tx_type != TxType::Legacy || self.protected;
        let tx_chain_id = self.chain_id.unwrap_or(chain_id);
        if signs_chain_id && (tx_chain_id == 0 || tx_chain_id != chain_id) {
            return Err(SetupError::InvalidChainId {
                expected: chain_id,
                got: Some(tx_chain_id),
            });
        }

        let key = match &self.secret_key {
            Some(key) => key.clone(),
            None => alloc
                .key_for(&sender)
                .cloned()
                .ok_or(SetupError::MissingKey(sender))?,
        };
        let signer = private_key_to_address(&key);
        if signer != sender {
            return Err(SetupError::SignatureMismatch { sender, signer });
        }

        let expected_nonce = pre.nonce(&sender);
        let nonce = self.nonce.unwrap_or(expected_nonce);
        if nonce != expected_nonce {
            return Err(SetupError::NonceMismatch {
                address: sender,
                expected: expected_nonce,
                got: nonce,
            });
        }

        let balance = pre.balance(&sender);
        let required = U256::from(self.gas_limit)
            .checked_mul(self.max_fee())
            .and_then(|fee| fee.checked_add(self.value))
            .unwrap_or(U256::MAX);
        if balance < required {
            return Err(SetupError::InsufficientFunds {
                address: sender,
                required,
                balance,
            });
        }

        let tx = match self.tx_type {
            TxType::Legacy => Transaction::Legacy(LegacyTx {
                nonce,
                gas_price: self.gas_price,
                gas_limit: self.gas_limit,
                to: self.to,
                value: self.value,
                data: self.data,
                chain_id: self.protected.then_some(tx_chain_id),
            }),
            TxType::AccessList => Transaction::AccessList(AccessListTx {
                chain_id: tx_chain_id,
                nonce,
                gas_price: self.gas_price,
                gas_limit: self.gas_limit,
                to: self.to,
                value: self.value,
                data: self.data,
                access_list: self.access_list,
            }),
            TxType::DynamicFee => Transaction::DynamicFee(DynamicFeeTx {
                chain_id: tx_chain_id,
                nonce,
                max_priority_fee_per_gas: self.max_priority_fee_per_gas,
                max_fee_per_gas: self.max_fee_per_gas,
                gas_limit: self.gas_limit,
                to: self.to,
                value: self.value,
                data: self.data,
                access_list: self.access_list,
            }),
        };

        let signed = tx.sign(&key)?;
        let recovered = signed.recover_sender()?;
        if recovered != sender {
            return Err(SetupError::SignatureMismatch {
                sender,
                signer: recovered,
            });
        }
        debug!(hash = %signed.hash(), sender = %sender, "built transaction");
        Ok(signed)
    }
}
