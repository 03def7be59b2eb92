//! Layered fork parameter table

use crate::error::{ForkError, ForkResult};
use crate::{Fork, Param};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

/// Overrides introduced by one fork.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layer {
    fork: Fork,
    overrides: BTreeMap<Param, u64>,
}

impl Layer {
    /// Empty layer for `fork`
    pub fn new(fork: Fork) -> Self {
        Layer {
            fork,
            overrides: BTreeMap::new(),
        }
    }

    /// Define or override a parameter
    pub fn set(mut self, param: Param, value: u64) -> Self {
        self.overrides.insert(param, value);
        self
    }

    /// Fork this layer belongs to
    pub fn fork(&self) -> Fork {
        self.fork
    }

    /// Value this layer assigns, if any
    pub fn get(&self, param: Param) -> Option<u64> {
        self.overrides.get(&param).copied()
    }
}

/// Builder for [`ForkRuleset`]. Layers for the same fork are merged, later
/// `set` calls winning.
#[derive(Default)]
pub struct ForkRulesetBuilder {
    layers: BTreeMap<Fork, Layer>,
}

impl ForkRulesetBuilder {
    /// Add a layer
    pub fn layer(mut self, layer: Layer) -> Self {
        let entry = self
            .layers
            .entry(layer.fork)
            .or_insert_with(|| Layer::new(layer.fork));
        entry.overrides.extend(layer.overrides);
        self
    }

    /// Finish the table
    pub fn build(self) -> ForkRuleset {
        let layers: Vec<Layer> = self.layers.into_values().collect();
        debug!(
            layers = layers.len(),
            params = layers.iter().map(|l| l.overrides.len()).sum::<usize>(),
            "fork ruleset built"
        );
        ForkRuleset { layers }
    }
}

/// Immutable table of (activation fork, overrides), ordered by fork.
///
/// Lookups walk backward from the queried fork to the nearest layer that
/// defines the parameter, so a fork never observes a later override.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForkRuleset {
    layers: Vec<Layer>,
}

impl ForkRuleset {
    /// Start a custom table
    pub fn builder() -> ForkRulesetBuilder {
        ForkRulesetBuilder::default()
    }

    /// The mainnet table, built once and shared
    pub fn standard() -> &'static ForkRuleset {
        static STANDARD: OnceLock<ForkRuleset> = OnceLock::new();
        STANDARD.get_or_init(crate::table::mainnet)
    }

    /// Resolve `param` as seen by `fork`
    pub fn lookup(&self, fork: Fork, param: Param) -> ForkResult<u64> {
        self.lookup_with_origin(fork, param).map(|(value, _)| value)
    }

    /// Resolve `param` and report which fork's layer supplied it
    pub fn lookup_with_origin(&self, fork: Fork, param: Param) -> ForkResult<(u64, Fork)> {
        self.layers
            .iter()
            .rev()
            .filter(|layer| layer.fork <= fork)
            .find_map(|layer| layer.get(param).map(|value| (value, layer.fork)))
            .ok_or(ForkError::FeatureNotActive { fork, param })
    }

    /// First fork at which `param` is defined
    pub fn activation(&self, param: Param) -> Option<Fork> {
        self.layers
            .iter()
            .find(|layer| layer.get(param).is_some())
            .map(|layer| layer.fork)
    }

    /// Precompute every parameter visible at `fork`
    pub fn rules(&self, fork: Fork) -> ForkRules {
        let mut params = BTreeMap::new();
        let mut opcode_gas = [None; 256];
        for layer in self.layers.iter().filter(|layer| layer.fork <= fork) {
            for (&param, &value) in &layer.overrides {
                params.insert(param, value);
                if let Param::Opcode(byte) = param {
                    opcode_gas[usize::from(byte)] = Some(value);
                }
            }
        }
        ForkRules {
            fork,
            params,
            opcode_gas,
        }
    }

    /// Layers in fork order
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }
}

/// Every parameter visible at one fork, flattened for the interpreter loop.
#[derive(Clone, Debug)]
pub struct ForkRules {
    fork: Fork,
    params: BTreeMap<Param, u64>,
    opcode_gas: [Option<u64>; 256],
}

impl ForkRules {
    /// Fork these rules were resolved for
    pub fn fork(&self) -> Fork {
        self.fork
    }

    /// Value of `param`, or `FeatureNotActive`
    pub fn get(&self, param: Param) -> ForkResult<u64> {
        self.params
            .get(&param)
            .copied()
            .ok_or(ForkError::FeatureNotActive {
                fork: self.fork,
                param,
            })
    }

    /// Value of `param` if defined
    pub fn value(&self, param: Param) -> Option<u64> {
        self.params.get(&param).copied()
    }

    /// Value of `param`, zero when not yet defined
    pub fn value_or_zero(&self, param: Param) -> u64 {
        self.value(param).unwrap_or(0)
    }

    /// Flag parameter is defined and non-zero
    pub fn is_active(&self, param: Param) -> bool {
        self.value(param).is_some_and(|value| value != 0)
    }

    /// Static gas of an opcode, `None` when the opcode does not exist yet
    pub fn opcode_gas(&self, byte: u8) -> Option<u64> {
        self.opcode_gas[usize::from(byte)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ForkRuleset {
        ForkRuleset::builder()
            .layer(
                Layer::new(Fork::Frontier)
                    .set(Param::CallStipend, 2300)
                    .set(Param::SstoreReset, 5000),
            )
            .layer(Layer::new(Fork::Berlin).set(Param::SstoreReset, 2900))
            .layer(Layer::new(Fork::Berlin).set(Param::ColdSload, 2100))
            .build()
    }

    // ==================== Lookup ====================

    #[test]
    fn test_lookup_walks_back_to_defining_fork() {
        let rules = table();
        assert_eq!(rules.lookup(Fork::London, Param::CallStipend), Ok(2300));
        assert_eq!(
            rules.lookup_with_origin(Fork::London, Param::CallStipend),
            Ok((2300, Fork::Frontier))
        );
    }

    #[test]
    fn test_lookup_sees_nearest_override() {
        let rules = table();
        assert_eq!(rules.lookup(Fork::Istanbul, Param::SstoreReset), Ok(5000));
        assert_eq!(rules.lookup(Fork::Berlin, Param::SstoreReset), Ok(2900));
        assert_eq!(rules.lookup(Fork::Cancun, Param::SstoreReset), Ok(2900));
    }

    #[test]
    fn test_lookup_before_definition_is_not_active() {
        let rules = table();
        assert_eq!(
            rules.lookup(Fork::Istanbul, Param::ColdSload),
            Err(ForkError::FeatureNotActive {
                fork: Fork::Istanbul,
                param: Param::ColdSload
            })
        );
        assert_eq!(rules.activation(Param::ColdSload), Some(Fork::Berlin));
        assert_eq!(rules.activation(Param::WarmCoinbase), None);
    }

    #[test]
    fn test_same_fork_layers_merge() {
        let rules = table();
        assert_eq!(rules.layers().len(), 2);
        assert_eq!(rules.lookup(Fork::Berlin, Param::ColdSload), Ok(2100));
    }

    // ==================== Resolved rules ====================

    #[test]
    fn test_resolved_rules_match_lookup() {
        let table = ForkRuleset::standard();
        for fork in Fork::ALL {
            let rules = table.rules(fork);
            for byte in 0..=255u8 {
                let param = Param::Opcode(byte);
                assert_eq!(rules.opcode_gas(byte), table.lookup(fork, param).ok());
                assert_eq!(rules.get(param), table.lookup(fork, param));
            }
        }
    }

    #[test]
    fn test_flags() {
        let table = ForkRuleset::standard();
        assert!(!table.rules(Fork::Istanbul).is_active(Param::TxTypeAccessList));
        assert!(table.rules(Fork::Berlin).is_active(Param::TxTypeAccessList));
        assert_eq!(table.rules(Fork::Frontier).value_or_zero(Param::SstoreSentry), 0);
    }
}
