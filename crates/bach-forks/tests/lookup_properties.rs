//! Property tests for fork parameter resolution

use bach_forks::{Fork, ForkError, ForkRuleset, Layer, Param};
use proptest::prelude::*;

fn fork_strategy() -> impl Strategy<Value = Fork> {
    (0..Fork::ALL.len()).prop_map(|i| Fork::ALL[i])
}

fn param_strategy() -> impl Strategy<Value = Param> {
    prop_oneof![
        any::<u8>().prop_map(Param::Opcode),
        Just(Param::CallStipend),
        Just(Param::SstoreReset),
        Just(Param::SstoreClearRefund),
        Just(Param::ColdAccountAccess),
        Just(Param::TxDataNonZero),
        Just(Param::InitCodeWord),
        Just(Param::MaxRefundQuotient),
    ]
}

proptest! {
    #[test]
    fn lookup_is_deterministic(fork in fork_strategy(), param in param_strategy()) {
        let table = ForkRuleset::standard();
        prop_assert_eq!(table.lookup(fork, param), table.lookup(fork, param));
        prop_assert_eq!(table.rules(fork).get(param), table.lookup(fork, param));
    }

    #[test]
    fn lookup_never_sees_later_overrides(
        fork in fork_strategy(),
        param in param_strategy(),
        later_value in any::<u64>(),
    ) {
        let base = ForkRuleset::standard();
        let before = base.lookup(fork, param);

        // Override the parameter in every fork after `fork`.
        let mut builder = ForkRuleset::builder();
        for layer in base.layers() {
            builder = builder.layer(layer.clone());
        }
        for later in Fork::ALL.into_iter().filter(|f| *f > fork) {
            builder = builder.layer(Layer::new(later).set(param, later_value));
        }
        let patched = builder.build();

        prop_assert_eq!(patched.lookup(fork, param), before);
    }

    #[test]
    fn origin_is_never_after_queried_fork(fork in fork_strategy(), param in param_strategy()) {
        match ForkRuleset::standard().lookup_with_origin(fork, param) {
            Ok((_, origin)) => prop_assert!(origin <= fork),
            Err(e) => prop_assert_eq!(e, ForkError::FeatureNotActive { fork, param }),
        }
    }
}
