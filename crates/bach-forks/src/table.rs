//! The mainnet parameter table, one layer per fork

use crate::ruleset::{ForkRuleset, ForkRulesetBuilder, Layer};
use crate::{Fork, Param};

mod op {
    pub const SHL: u8 = 0x1b;
    pub const SHR: u8 = 0x1c;
    pub const SAR: u8 = 0x1d;
    pub const BALANCE: u8 = 0x31;
    pub const RETURNDATASIZE: u8 = 0x3d;
    pub const RETURNDATACOPY: u8 = 0x3e;
    pub const EXTCODESIZE: u8 = 0x3b;
    pub const EXTCODECOPY: u8 = 0x3c;
    pub const EXTCODEHASH: u8 = 0x3f;
    pub const CHAINID: u8 = 0x46;
    pub const SELFBALANCE: u8 = 0x47;
    pub const BASEFEE: u8 = 0x48;
    pub const BLOBHASH: u8 = 0x49;
    pub const BLOBBASEFEE: u8 = 0x4a;
    pub const SLOAD: u8 = 0x54;
    pub const TLOAD: u8 = 0x5c;
    pub const TSTORE: u8 = 0x5d;
    pub const MCOPY: u8 = 0x5e;
    pub const PUSH0: u8 = 0x5f;
    pub const CREATE2: u8 = 0xf5;
    pub const CALL: u8 = 0xf1;
    pub const CALLCODE: u8 = 0xf2;
    pub const DELEGATECALL: u8 = 0xf4;
    pub const STATICCALL: u8 = 0xfa;
    pub const REVERT: u8 = 0xfd;
    pub const SELFDESTRUCT: u8 = 0xff;
}

/// Static gas of every Frontier opcode.
const FRONTIER_OPCODES: &[(u8, u64)] = &[
    (0x00, 0),  // STOP
    (0x01, 3),  // ADD
    (0x02, 5),  // MUL
    (0x03, 3),  // SUB
    (0x04, 5),  // DIV
    (0x05, 5),  // SDIV
    (0x06, 5),  // MOD
    (0x07, 5),  // SMOD
    (0x08, 8),  // ADDMOD
    (0x09, 8),  // MULMOD
    (0x0a, 10), // EXP
    (0x0b, 5),  // SIGNEXTEND
    (0x10, 3),  // LT
    (0x11, 3),  // GT
    (0x12, 3),  // SLT
    (0x13, 3),  // SGT
    (0x14, 3),  // EQ
    (0x15, 3),  // ISZERO
    (0x16, 3),  // AND
    (0x17, 3),  // OR
    (0x18, 3),  // XOR
    (0x19, 3),  // NOT
    (0x1a, 3),  // BYTE
    (0x20, 30), // KECCAK256
    (0x30, 2),  // ADDRESS
    (0x31, 20), // BALANCE
    (0x32, 2),  // ORIGIN
    (0x33, 2),  // CALLER
    (0x34, 2),  // CALLVALUE
    (0x35, 3),  // CALLDATALOAD
    (0x36, 2),  // CALLDATASIZE
    (0x37, 3),  // CALLDATACOPY
    (0x38, 2),  // CODESIZE
    (0x39, 3),  // CODECOPY
    (0x3a, 2),  // GASPRICE
    (0x3b, 20), // EXTCODESIZE
    (0x3c, 20), // EXTCODECOPY
    (0x40, 20), // BLOCKHASH
    (0x41, 2),  // COINBASE
    (0x42, 2),  // TIMESTAMP
    (0x43, 2),  // NUMBER
    (0x44, 2),  // DIFFICULTY
    (0x45, 2),  // GASLIMIT
    (0x50, 2),  // POP
    (0x51, 3),  // MLOAD
    (0x52, 3),  // MSTORE
    (0x53, 3),  // MSTORE8
    (0x54, 50), // SLOAD
    (0x55, 0),  // SSTORE
    (0x56, 8),  // JUMP
    (0x57, 10), // JUMPI
    (0x58, 2),  // PC
    (0x59, 2),  // MSIZE
    (0x5a, 2),  // GAS
    (0x5b, 1),  // JUMPDEST
    (0xf0, 32000), // CREATE
    (0xf1, 40),    // CALL
    (0xf2, 40),    // CALLCODE
    (0xf3, 0),     // RETURN
    (0xff, 0),     // SELFDESTRUCT
];

fn frontier() -> Layer {
    let mut layer = Layer::new(Fork::Frontier)
        .set(Param::TxBase, 21000)
        .set(Param::TxCreate, 0)
        .set(Param::TxDataZero, 4)
        .set(Param::TxDataNonZero, 68)
        .set(Param::CallStipend, 2300)
        .set(Param::CallValueTransfer, 9000)
        .set(Param::CallNewAccount, 25000)
        .set(Param::CallDepthLimit, 1024)
        .set(Param::SstoreSet, 20000)
        .set(Param::SstoreReset, 5000)
        .set(Param::SstoreClearRefund, 15000)
        .set(Param::CodeDepositByte, 200)
        .set(Param::ExpByte, 10)
        .set(Param::MemoryWord, 3)
        .set(Param::CopyWord, 3)
        .set(Param::KeccakWord, 6)
        .set(Param::LogData, 8)
        .set(Param::BlockhashWindow, 256)
        .set(Param::SelfdestructRefund, 24000)
        .set(Param::MaxRefundQuotient, 2);

    for &(byte, gas) in FRONTIER_OPCODES {
        layer = layer.set(Param::Opcode(byte), gas);
    }
    // PUSH1..PUSH32, DUP1..DUP16, SWAP1..SWAP16
    for byte in 0x60..=0x9f {
        layer = layer.set(Param::Opcode(byte), 3);
    }
    // LOG0..LOG4: base plus 375 per topic
    for topics in 0..=4u8 {
        layer = layer.set(Param::Opcode(0xa0 + topics), 375 + 375 * u64::from(topics));
    }
    layer
}

fn homestead() -> Layer {
    Layer::new(Fork::Homestead)
        .set(Param::TxCreate, 32000)
        .set(Param::CreateDepositOogFails, 1)
        .set(Param::Opcode(op::DELEGATECALL), 40)
}

fn byzantium() -> Layer {
    Layer::new(Fork::Byzantium)
        // EIP-150
        .set(Param::AllButOne64th, 1)
        .set(Param::Opcode(op::BALANCE), 400)
        .set(Param::Opcode(op::EXTCODESIZE), 700)
        .set(Param::Opcode(op::EXTCODECOPY), 700)
        .set(Param::Opcode(op::SLOAD), 200)
        .set(Param::Opcode(op::CALL), 700)
        .set(Param::Opcode(op::CALLCODE), 700)
        .set(Param::Opcode(op::DELEGATECALL), 700)
        .set(Param::Opcode(op::SELFDESTRUCT), 5000)
        .set(Param::SelfdestructNewAccount, 25000)
        // EIP-155, EIP-160, EIP-161, EIP-170
        .set(Param::ReplayProtection, 1)
        .set(Param::ExpByte, 50)
        .set(Param::EmptyAccountCleanup, 1)
        .set(Param::MaxCodeSize, 24576)
        // EIP-140, EIP-211, EIP-214
        .set(Param::Opcode(op::REVERT), 0)
        .set(Param::Opcode(op::RETURNDATASIZE), 2)
        .set(Param::Opcode(op::RETURNDATACOPY), 3)
        .set(Param::Opcode(op::STATICCALL), 700)
}

fn constantinople() -> Layer {
    Layer::new(Fork::Constantinople)
        .set(Param::Opcode(op::SHL), 3)
        .set(Param::Opcode(op::SHR), 3)
        .set(Param::Opcode(op::SAR), 3)
        .set(Param::Opcode(op::CREATE2), 32000)
        .set(Param::Opcode(op::EXTCODEHASH), 400)
        // EIP-1283, no sentry
        .set(Param::NetSstoreMetering, 1)
        .set(Param::SstoreNoop, 200)
}

fn constantinople_fix() -> Layer {
    // EIP-1283 withdrawn
    Layer::new(Fork::ConstantinopleFix).set(Param::NetSstoreMetering, 0)
}

fn istanbul() -> Layer {
    Layer::new(Fork::Istanbul)
        .set(Param::TxDataNonZero, 16)
        .set(Param::NetSstoreMetering, 1)
        .set(Param::SstoreNoop, 800)
        .set(Param::SstoreSentry, 2300)
        .set(Param::Opcode(op::BALANCE), 700)
        .set(Param::Opcode(op::SLOAD), 800)
        .set(Param::Opcode(op::EXTCODEHASH), 700)
        .set(Param::Opcode(op::CHAINID), 2)
        .set(Param::Opcode(op::SELFBALANCE), 5)
}

fn berlin() -> Layer {
    let mut layer = Layer::new(Fork::Berlin)
        .set(Param::ColdAccountAccess, 2600)
        .set(Param::ColdSload, 2100)
        .set(Param::WarmStorageRead, 100)
        .set(Param::SstoreNoop, 100)
        .set(Param::SstoreReset, 2900)
        .set(Param::AccessListAddress, 2400)
        .set(Param::AccessListStorageKey, 1900)
        .set(Param::TxTypeAccessList, 1);
    // Access costs become fully dynamic
    for byte in [
        op::BALANCE,
        op::EXTCODESIZE,
        op::EXTCODECOPY,
        op::EXTCODEHASH,
        op::SLOAD,
        op::CALL,
        op::CALLCODE,
        op::DELEGATECALL,
        op::STATICCALL,
    ] {
        layer = layer.set(Param::Opcode(byte), 0);
    }
    layer
}

fn london() -> Layer {
    Layer::new(Fork::London)
        .set(Param::SstoreClearRefund, 4800)
        .set(Param::SelfdestructRefund, 0)
        .set(Param::MaxRefundQuotient, 5)
        .set(Param::TxTypeDynamicFee, 1)
        .set(Param::RejectEfCode, 1)
        .set(Param::BaseFee, 1)
        .set(Param::Opcode(op::BASEFEE), 2)
}

fn paris() -> Layer {
    Layer::new(Fork::Paris).set(Param::Prevrandao, 1)
}

fn shanghai() -> Layer {
    Layer::new(Fork::Shanghai)
        .set(Param::InitCodeWord, 2)
        .set(Param::MaxInitCodeSize, 49152)
        .set(Param::WarmCoinbase, 1)
        .set(Param::Opcode(op::PUSH0), 2)
}

fn cancun() -> Layer {
    Layer::new(Fork::Cancun)
        .set(Param::SelfdestructSameTxOnly, 1)
        .set(Param::Opcode(op::TLOAD), 100)
        .set(Param::Opcode(op::TSTORE), 100)
        .set(Param::Opcode(op::MCOPY), 3)
        .set(Param::Opcode(op::BLOBHASH), 3)
        .set(Param::Opcode(op::BLOBBASEFEE), 2)
}

/// Build the table shipped with the harness.
pub(crate) fn mainnet() -> ForkRuleset {
    let layers = [
        frontier(),
        homestead(),
        byzantium(),
        constantinople(),
        constantinople_fix(),
        istanbul(),
        berlin(),
        london(),
        paris(),
        shanghai(),
        cancun(),
    ];
    layers
        .into_iter()
        .fold(ForkRulesetBuilder::default(), ForkRulesetBuilder::layer)
        .build()
}
