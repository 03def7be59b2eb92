//! Transaction types and their signing payloads

use crate::error::TxError;
use bach_crypto::{keccak256, recover_address, sign, PrivateKey, Signature};
use bach_primitives::{Address, H256, U256};
use bytes::Bytes;
use rlp::RlpStream;

/// Transaction type identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TxType {
    /// Legacy transaction (pre-EIP-2718)
    #[default]
    Legacy = 0,
    /// EIP-2930 access list transaction
    AccessList = 1,
    /// EIP-1559 dynamic fee transaction
    DynamicFee = 2,
}

impl TxType {
    /// Envelope type byte, `None` for legacy
    pub fn envelope_byte(self) -> Option<u8> {
        match self {
            TxType::Legacy => None,
            other => Some(other as u8),
        }
    }
}

/// Legacy transaction (Type 0)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyTx {
    /// Transaction nonce
    pub nonce: u64,
    /// Gas price in wei
    pub gas_price: U256,
    /// Gas limit
    pub gas_limit: u64,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    /// Value to transfer in wei
    pub value: U256,
    /// Input data
    pub data: Bytes,
    /// EIP-155 chain id; `None` signs an unprotected transaction
    pub chain_id: Option<u64>,
}

/// EIP-2930 access list transaction (Type 1)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessListTx {
    /// Chain ID
    pub chain_id: u64,
    /// Transaction nonce
    pub nonce: u64,
    /// Gas price in wei
    pub gas_price: U256,
    /// Gas limit
    pub gas_limit: u64,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    /// Value to transfer in wei
    pub value: U256,
    /// Input data
    pub data: Bytes,
    /// Access list
    pub access_list: Vec<AccessListItem>,
}

/// EIP-1559 dynamic fee transaction (Type 2)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DynamicFeeTx {
    /// Chain ID
    pub chain_id: u64,
    /// Transaction nonce
    pub nonce: u64,
    /// Max priority fee per gas (tip)
    pub max_priority_fee_per_gas: U256,
    /// Max fee per gas
    pub max_fee_per_gas: U256,
    /// Gas limit
    pub gas_limit: u64,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    /// Value to transfer in wei
    pub value: U256,
    /// Input data
    pub data: Bytes,
    /// Access list
    pub access_list: Vec<AccessListItem>,
}

/// Access list item (address + storage keys)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessListItem {
    /// Account address
    pub address: Address,
    /// Storage keys
    pub storage_keys: Vec<H256>,
}

/// Unsigned transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transaction {
    /// Legacy transaction
    Legacy(LegacyTx),
    /// EIP-2930 transaction
    AccessList(AccessListTx),
    /// EIP-1559 transaction
    DynamicFee(DynamicFeeTx),
}

macro_rules! each_body {
    ($tx:expr, $body:ident => $e:expr) => {
        match $tx {
            Transaction::Legacy($body) => $e,
            Transaction::AccessList($body) => $e,
            Transaction::DynamicFee($body) => $e,
        }
    };
}

impl Transaction {
    /// Transaction type
    pub fn tx_type(&self) -> TxType {
        match self {
            Transaction::Legacy(_) => TxType::Legacy,
            Transaction::AccessList(_) => TxType::AccessList,
            Transaction::DynamicFee(_) => TxType::DynamicFee,
        }
    }

    /// Get transaction nonce
    pub fn nonce(&self) -> u64 {
        each_body!(self, tx => tx.nonce)
    }

    /// Get gas limit
    pub fn gas_limit(&self) -> u64 {
        each_body!(self, tx => tx.gas_limit)
    }

    /// Get recipient address
    pub fn to(&self) -> Option<Address> {
        each_body!(self, tx => tx.to)
    }

    /// Get transfer value
    pub fn value(&self) -> U256 {
        each_body!(self, tx => tx.value)
    }

    /// Get input data
    pub fn data(&self) -> &Bytes {
        each_body!(self, tx => &tx.data)
    }

    /// Check if this is a contract creation transaction
    pub fn is_create(&self) -> bool {
        self.to().is_none()
    }

    /// Access list, empty for legacy transactions
    pub fn access_list(&self) -> &[AccessListItem] {
        match self {
            Transaction::Legacy(_) => &[],
            Transaction::AccessList(tx) => &tx.access_list,
            Transaction::DynamicFee(tx) => &tx.access_list,
        }
    }

    /// Chain id the signature commits to, if any
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Transaction::Legacy(tx) => tx.chain_id,
            Transaction::AccessList(tx) => Some(tx.chain_id),
            Transaction::DynamicFee(tx) => Some(tx.chain_id),
        }
    }

    /// Highest price per gas the sender may be charged
    pub fn max_fee_per_gas(&self) -> U256 {
        match self {
            Transaction::Legacy(tx) => tx.gas_price,
            Transaction::AccessList(tx) => tx.gas_price,
            Transaction::DynamicFee(tx) => tx.max_fee_per_gas,
        }
    }

    /// Get effective gas price for the given base fee
    ///
    /// Returns `None` if `base_fee > max_fee_per_gas` for EIP-1559 transactions
    /// (transaction cannot be included in block with this base fee).
    pub fn effective_gas_price(&self, base_fee: U256) -> Option<U256> {
        match self {
            Transaction::Legacy(tx) => Some(tx.gas_price),
            Transaction::AccessList(tx) => Some(tx.gas_price),
            Transaction::DynamicFee(tx) => {
                if base_fee > tx.max_fee_per_gas {
                    return None;
                }
                let priority_fee = tx.max_priority_fee_per_gas.min(tx.max_fee_per_gas - base_fee);
                Some(base_fee + priority_fee)
            }
        }
    }

    /// Hash the sender signs
    pub fn signing_hash(&self) -> H256 {
        keccak256(&self.signing_payload())
    }

    /// Bytes whose hash is signed
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut stream = RlpStream::new();
        match self {
            Transaction::Legacy(tx) => {
                let protected = tx.chain_id.is_some();
                stream.begin_list(if protected { 9 } else { 6 });
                self.append_fields(&mut stream);
                if let Some(chain_id) = tx.chain_id {
                    stream.append(&chain_id).append(&0u8).append(&0u8);
                }
            }
            Transaction::AccessList(_) => {
                stream.begin_list(8);
                self.append_fields(&mut stream);
            }
            Transaction::DynamicFee(_) => {
                stream.begin_list(9);
                self.append_fields(&mut stream);
            }
        }
        self.with_envelope(stream.out().to_vec())
    }

    /// Sign with `key`
    pub fn sign(self, key: &PrivateKey) -> Result<SignedTransaction, TxError> {
        let signature = sign(&self.signing_hash(), key)?;
        let v = match &self {
            Transaction::Legacy(LegacyTx {
                chain_id: Some(chain_id),
                ..
            }) => chain_id * 2 + 35 + u64::from(signature.y_parity),
            Transaction::Legacy(_) => 27 + u64::from(signature.y_parity),
            _ => u64::from(signature.y_parity),
        };
        let signature = TxSignature::new(v, H256::from(signature.r), H256::from(signature.s));
        Ok(SignedTransaction::new(self, signature))
    }

    // Unsigned fields in wire order, without the surrounding list header
    fn append_fields(&self, stream: &mut RlpStream) {
        match self {
            Transaction::Legacy(tx) => {
                stream
                    .append(&tx.nonce)
                    .append(&tx.gas_price)
                    .append(&tx.gas_limit);
                append_to(stream, tx.to);
                stream.append(&tx.value).append(&tx.data.to_vec());
            }
            Transaction::AccessList(tx) => {
                stream
                    .append(&tx.chain_id)
                    .append(&tx.nonce)
                    .append(&tx.gas_price)
                    .append(&tx.gas_limit);
                append_to(stream, tx.to);
                stream.append(&tx.value).append(&tx.data.to_vec());
                append_access_list(stream, &tx.access_list);
            }
            Transaction::DynamicFee(tx) => {
                stream
                    .append(&tx.chain_id)
                    .append(&tx.nonce)
                    .append(&tx.max_priority_fee_per_gas)
                    .append(&tx.max_fee_per_gas)
                    .append(&tx.gas_limit);
                append_to(stream, tx.to);
                stream.append(&tx.value).append(&tx.data.to_vec());
                append_access_list(stream, &tx.access_list);
            }
        }
    }

    fn with_envelope(&self, rlp: Vec<u8>) -> Vec<u8> {
        match self.tx_type().envelope_byte() {
            Some(byte) => {
                let mut out = Vec::with_capacity(rlp.len() + 1);
                out.push(byte);
                out.extend_from_slice(&rlp);
                out
            }
            None => rlp,
        }
    }
}

fn append_to(stream: &mut RlpStream, to: Option<Address>) {
    match to {
        Some(address) => stream.append(&address),
        None => stream.append_empty_data(),
    };
}

fn append_access_list(stream: &mut RlpStream, access_list: &[AccessListItem]) {
    stream.begin_list(access_list.len());
    for item in access_list {
        stream.begin_list(2);
        stream.append(&item.address);
        stream.append_list::<H256, H256>(&item.storage_keys);
    }
}

/// Signature components
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxSignature {
    /// Recovery ID (v value)
    pub v: u64,
    /// R component
    pub r: H256,
    /// S component
    pub s: H256,
}

impl TxSignature {
    /// Create a new signature
    pub fn new(v: u64, r: H256, s: H256) -> Self {
        Self { v, r, s }
    }

    /// Check if signature is valid (non-zero r and s)
    pub fn is_valid(&self) -> bool {
        !self.r.is_zero() && !self.s.is_zero()
    }
}

/// Signed transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Transaction body
    pub tx: Transaction,
    /// Signature
    pub signature: TxSignature,
    hash: H256,
}

impl SignedTransaction {
    /// Attach a signature
    pub fn new(tx: Transaction, signature: TxSignature) -> Self {
        let mut signed = SignedTransaction {
            tx,
            signature,
            hash: H256::ZERO,
        };
        signed.hash = keccak256(&signed.encode());
        signed
    }

    /// Transaction hash
    pub fn hash(&self) -> H256 {
        self.hash
    }

    /// Network encoding: rlp for legacy, type byte ‖ rlp for typed transactions
    pub fn encode(&self) -> Vec<u8> {
        let fields = match &self.tx {
            Transaction::Legacy(_) => 9,
            Transaction::AccessList(_) => 11,
            Transaction::DynamicFee(_) => 12,
        };
        let mut stream = RlpStream::new_list(fields);
        self.tx.append_fields(&mut stream);
        stream
            .append(&self.signature.v)
            .append(&U256::from_big_endian(self.signature.r.as_bytes()))
            .append(&U256::from_big_endian(self.signature.s.as_bytes()));
        self.tx.with_envelope(stream.out().to_vec())
    }

    /// Recovery parity encoded in `v`
    pub fn y_parity(&self) -> Result<u8, TxError> {
        let v = self.signature.v;
        let parity = match &self.tx {
            Transaction::Legacy(LegacyTx {
                chain_id: Some(chain_id),
                ..
            }) => v
                .checked_sub(chain_id.saturating_mul(2).saturating_add(35))
                .ok_or(TxError::InvalidV(v))?,
            Transaction::Legacy(_) => v.checked_sub(27).ok_or(TxError::InvalidV(v))?,
            _ => v,
        };
        match parity {
            0 | 1 => Ok(parity as u8),
            _ => Err(TxError::InvalidV(v)),
        }
    }

    /// Recover the sender address from the signature
    pub fn recover_sender(&self) -> Result<Address, TxError> {
        if !self.signature.is_valid() {
            return Err(TxError::EmptySignature);
        }
        let signature = Signature::new(
            *self.signature.r.as_bytes(),
            *self.signature.s.as_bytes(),
            self.y_parity()?,
        );
        Ok(recover_address(&self.tx.signing_hash(), &signature)?)
    }
}

impl Default for LegacyTx {
    fn default() -> Self {
        Self {
            nonce: 0,
            gas_price: U256::zero(),
            gas_limit: 21000,
            to: None,
            value: U256::zero(),
            data: Bytes::new(),
            chain_id: None,
        }
    }
}
