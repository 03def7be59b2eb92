//! # bach-forks
//!
//! Protocol upgrade ordering and the parameters each upgrade introduces.
//!
//! - [`Fork`]: total order of upgrades, [`ForkRange`] for scenario validity
//! - [`ForkRuleset`]: layered (fork, overrides) table with backward lookup
//! - [`ForkRules`]: the table flattened for one fork

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod fork;
mod param;
mod ruleset;
mod table;

pub use error::{ForkError, ForkResult};
pub use fork::{Fork, ForkRange};
pub use param::Param;
pub use ruleset::{ForkRules, ForkRuleset, ForkRulesetBuilder, Layer};

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Mainnet table ====================

    #[test]
    fn test_call_costs_by_fork() {
        let table = ForkRuleset::standard();
        let call = Param::Opcode(0xf1);
        assert_eq!(table.lookup(Fork::Frontier, call), Ok(40));
        assert_eq!(table.lookup(Fork::Byzantium, call), Ok(700));
        assert_eq!(table.lookup(Fork::Berlin, call), Ok(0));
        assert_eq!(table.lookup(Fork::Cancun, Param::CallStipend), Ok(2300));
        assert_eq!(table.lookup(Fork::London, Param::ColdAccountAccess), Ok(2600));
    }

    #[test]
    fn test_opcode_availability() {
        let table = ForkRuleset::standard();
        let chainid = Param::Opcode(0x46);
        assert!(table.lookup(Fork::ConstantinopleFix, chainid).is_err());
        assert_eq!(table.lookup(Fork::Istanbul, chainid), Ok(2));
        assert_eq!(table.activation(Param::Opcode(0x5f)), Some(Fork::Shanghai));
        assert_eq!(table.activation(Param::Opcode(0xf4)), Some(Fork::Homestead));
        assert_eq!(table.activation(Param::Opcode(0xfe)), None);
    }

    #[test]
    fn test_calldata_cost_drops_at_istanbul() {
        let table = ForkRuleset::standard();
        assert_eq!(table.lookup(Fork::ConstantinopleFix, Param::TxDataNonZero), Ok(68));
        assert_eq!(table.lookup(Fork::Istanbul, Param::TxDataNonZero), Ok(16));
    }

    #[test]
    fn test_net_sstore_metering_withdrawn_at_constantinople_fix() {
        let table = ForkRuleset::standard();
        assert!(table.rules(Fork::Constantinople).is_active(Param::NetSstoreMetering));
        assert!(!table.rules(Fork::ConstantinopleFix).is_active(Param::NetSstoreMetering));
        assert!(table.rules(Fork::Istanbul).is_active(Param::NetSstoreMetering));
        assert_eq!(
            table.lookup_with_origin(Fork::ConstantinopleFix, Param::NetSstoreMetering),
            Ok((0, Fork::ConstantinopleFix))
        );
        assert_eq!(table.lookup(Fork::Constantinople, Param::SstoreNoop), Ok(200));
        assert!(table.lookup(Fork::Byzantium, Param::SstoreNoop).is_err());
    }

    #[test]
    fn test_every_fork_has_a_layer() {
        let table = ForkRuleset::standard();
        let forks: Vec<Fork> = table.layers().iter().map(Layer::fork).collect();
        assert_eq!(forks, Fork::ALL.to_vec());
    }

    #[test]
    fn test_access_list_costs() {
        let rules = ForkRuleset::standard().rules(Fork::Berlin);
        assert_eq!(rules.get(Param::AccessListAddress), Ok(2400));
        assert_eq!(rules.get(Param::AccessListStorageKey), Ok(1900));
        assert_eq!(rules.get(Param::ColdSload), Ok(2100));
        assert_eq!(rules.get(Param::WarmStorageRead), Ok(100));
    }
}
