//! Parameters resolved through the fork table

use std::fmt;

/// A fork-dependent value.
///
/// Flags (e.g. [`Param::AllButOne64th`]) are stored as `1` from the fork that
/// introduces them. Opcode availability is expressed by [`Param::Opcode`]: an
/// opcode is executable from the first fork that gives it a static gas cost.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Param {
    // ---- transaction ----
    /// Base cost of every transaction
    TxBase,
    /// Extra intrinsic cost of a creation transaction
    TxCreate,
    /// Intrinsic cost per zero payload byte
    TxDataZero,
    /// Intrinsic cost per non-zero payload byte
    TxDataNonZero,
    /// Intrinsic cost per access-list address
    AccessListAddress,
    /// Intrinsic cost per access-list storage key
    AccessListStorageKey,
    /// Cost per 32-byte word of init code (EIP-3860)
    InitCodeWord,
    /// Maximum init code size (EIP-3860)
    MaxInitCodeSize,
    /// Type-1 transactions accepted (EIP-2930)
    TxTypeAccessList,
    /// Type-2 transactions accepted (EIP-1559)
    TxTypeDynamicFee,
    /// Chain id may be embedded in legacy signatures (EIP-155)
    ReplayProtection,

    // ---- calls and accounts ----
    /// Gas handed to a frame receiving value
    CallStipend,
    /// Surcharge for a call transferring value
    CallValueTransfer,
    /// Surcharge for a call creating a new account
    CallNewAccount,
    /// Cost of first access to an address (EIP-2929)
    ColdAccountAccess,
    /// Cost of first access to a storage slot (EIP-2929)
    ColdSload,
    /// Cost of a warm storage read (EIP-2929)
    WarmStorageRead,
    /// Maximum call depth
    CallDepthLimit,
    /// Child frames receive at most all but 1/64 of remaining gas (EIP-150)
    AllButOne64th,
    /// Empty accounts are treated as non-existent and removed when touched (EIP-161)
    EmptyAccountCleanup,
    /// Coinbase starts the transaction warm (EIP-3651)
    WarmCoinbase,

    // ---- storage ----
    /// SSTORE zero to non-zero
    SstoreSet,
    /// SSTORE non-zero to anything
    SstoreReset,
    /// Refund for clearing a slot
    SstoreClearRefund,
    /// Minimum gas left for SSTORE to run (EIP-2200)
    SstoreSentry,
    /// Net gas metering for SSTORE (EIP-1283, EIP-2200)
    NetSstoreMetering,
    /// Net-metered SSTORE of an unchanged value or an already dirty slot
    SstoreNoop,

    // ---- creation ----
    /// Cost per byte of deployed code
    CodeDepositByte,
    /// Maximum deployed code size (EIP-170)
    MaxCodeSize,
    /// Running out of gas for the code deposit fails the creation (EIP-2)
    CreateDepositOogFails,
    /// Deployed code may not start with 0xEF (EIP-3541)
    RejectEfCode,

    // ---- misc execution ----
    /// Cost per byte of EXP exponent
    ExpByte,
    /// Cost per word of memory
    MemoryWord,
    /// Cost per word copied
    CopyWord,
    /// Cost per word hashed by KECCAK256
    KeccakWord,
    /// Cost per byte of LOG data
    LogData,
    /// Number of recent blocks BLOCKHASH can see
    BlockhashWindow,
    /// Refund for SELFDESTRUCT
    SelfdestructRefund,
    /// Surcharge when SELFDESTRUCT funds a new account
    SelfdestructNewAccount,
    /// SELFDESTRUCT only deletes accounts created in the same transaction (EIP-6780)
    SelfdestructSameTxOnly,
    /// Refund is capped at gas used divided by this
    MaxRefundQuotient,

    // ---- block ----
    /// Block base fee is charged (EIP-1559)
    BaseFee,
    /// DIFFICULTY opcode returns prevrandao (EIP-4399)
    Prevrandao,

    /// Static gas of an opcode; undefined means the opcode is invalid
    Opcode(u8),
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Opcode(byte) => write!(f, "opcode 0x{byte:02x}"),
            other => write!(f, "{other:?}"),
        }
    }
}
