//! Algebraic laws of the delta contract, checked over random operation
//! sequences.

use proptest::prelude::*;

use crdt_host_core::{
    CrdtDelta, CrdtError, CrdtKind, CrdtOperation, CrdtState, CrdtValue, Element, GCounterDelta,
    LwwClock, ReplicaId,
};

fn replica(n: u8) -> ReplicaId {
    ReplicaId::from_bytes([n; 16])
}

fn element() -> impl Strategy<Value = Element> {
    "[a-e]".prop_map(Element::from)
}

fn set_op() -> impl Strategy<Value = CrdtOperation> {
    prop_oneof![
        3 => element().prop_map(CrdtOperation::Add),
        2 => element().prop_map(CrdtOperation::Remove),
        1 => Just(CrdtOperation::Clear),
    ]
}

fn lww_op() -> impl Strategy<Value = CrdtOperation> {
    (
        element(),
        prop_oneof![
            Just(LwwClock::Default),
            (0u64..20).prop_map(LwwClock::Custom),
            (0u64..20).prop_map(LwwClock::CustomAutoIncrement),
        ],
    )
        .prop_map(|(value, clock)| CrdtOperation::Set { value, clock })
}

fn run(kind: CrdtKind, id: u8, ops: &[CrdtOperation]) -> (CrdtState, Option<CrdtDelta>) {
    let mut state = CrdtState::new(kind, replica(id));
    for op in ops {
        state.mutate(op.clone()).unwrap();
    }
    let delta = state.export_delta(false);
    (state, delta)
}

proptest! {
    #[test]
    fn test_gcounter_delta_is_sum_of_increments(increments in prop::collection::vec(0i64..1_000_000, 0..20)) {
        let ops: Vec<_> = increments.iter().copied().map(CrdtOperation::Increment).collect();
        let (state, delta) = run(CrdtKind::GCounter, 1, &ops);
        let total: i64 = increments.iter().sum();

        prop_assert_eq!(state.current_value(), CrdtValue::GCounter(total as u64));
        if total == 0 {
            prop_assert!(delta.is_none());
        } else {
            prop_assert_eq!(
                delta,
                Some(CrdtDelta::GCounter(GCounterDelta { increment: total as u64 }))
            );
        }
    }

    #[test]
    fn test_negative_increment_rejected_without_mutation(before in 0i64..1000, bad in i64::MIN..0) {
        let mut state = CrdtState::new(CrdtKind::GCounter, replica(1));
        state.mutate(CrdtOperation::Increment(before)).unwrap();

        let err = state.mutate(CrdtOperation::Increment(bad)).unwrap_err();
        prop_assert!(matches!(err, CrdtError::InvalidOperation(_)));
        prop_assert_eq!(state.current_value(), CrdtValue::GCounter(before as u64));

        let exported = state.export_delta(false);
        if before == 0 {
            prop_assert!(exported.is_none());
        } else {
            prop_assert_eq!(
                exported,
                Some(CrdtDelta::GCounter(GCounterDelta { increment: before as u64 }))
            );
        }
    }

    #[test]
    fn test_second_export_is_none(ops in prop::collection::vec(set_op(), 0..16)) {
        let (mut state, _) = run(CrdtKind::OrSet, 1, &ops);
        prop_assert!(state.export_delta(false).is_none());
    }

    #[test]
    fn test_counter_deltas_commute(a in 0i64..1_000_000, b in 0i64..1_000_000) {
        let (_, da) = run(CrdtKind::GCounter, 1, &[CrdtOperation::Increment(a)]);
        let (_, db) = run(CrdtKind::GCounter, 2, &[CrdtOperation::Increment(b)]);
        let da = da.unwrap_or(CrdtDelta::GCounter(GCounterDelta { increment: 0 }));
        let db = db.unwrap_or(CrdtDelta::GCounter(GCounterDelta { increment: 0 }));

        let mut ab = CrdtState::new(CrdtKind::GCounter, replica(3));
        ab.apply_delta(&da).unwrap();
        ab.apply_delta(&db).unwrap();
        let mut ba = CrdtState::new(CrdtKind::GCounter, replica(4));
        ba.apply_delta(&db).unwrap();
        ba.apply_delta(&da).unwrap();

        prop_assert_eq!(ab.current_value(), ba.current_value());
        prop_assert_eq!(ab.current_value(), CrdtValue::GCounter((a + b) as u64));
    }

    #[test]
    fn test_counter_delta_applied_twice_counts_twice(n in 1i64..1_000_000) {
        let (_, delta) = run(CrdtKind::GCounter, 1, &[CrdtOperation::Increment(n)]);
        let delta = delta.unwrap();

        let mut target = CrdtState::new(CrdtKind::GCounter, replica(2));
        target.apply_delta(&delta).unwrap();
        target.apply_delta(&delta).unwrap();
        prop_assert_eq!(target.current_value(), CrdtValue::GCounter(2 * n as u64));
    }

    #[test]
    fn test_set_deltas_are_idempotent(ops in prop::collection::vec(set_op(), 1..16)) {
        let (origin, delta) = run(CrdtKind::OrSet, 1, &ops);
        prop_assume!(delta.is_some());
        let delta = delta.unwrap();

        let mut once = CrdtState::new(CrdtKind::OrSet, replica(2));
        once.apply_delta(&delta).unwrap();
        let mut twice = once.clone();
        twice.apply_delta(&delta).unwrap();

        prop_assert_eq!(once.current_value(), twice.current_value());
        prop_assert_eq!(once.current_value(), origin.current_value());
    }

    #[test]
    fn test_gset_converges_in_any_order(
        left in prop::collection::vec(element(), 1..8),
        right in prop::collection::vec(element(), 1..8),
    ) {
        let left_ops: Vec<_> = left.into_iter().map(CrdtOperation::Add).collect();
        let right_ops: Vec<_> = right.into_iter().map(CrdtOperation::Add).collect();
        let (mut a, da) = run(CrdtKind::GSet, 1, &left_ops);
        let (mut b, db) = run(CrdtKind::GSet, 2, &right_ops);

        a.apply_delta(&db.unwrap()).unwrap();
        b.apply_delta(&da.clone().unwrap()).unwrap();
        b.apply_delta(&da.unwrap()).unwrap();
        prop_assert_eq!(a.current_value(), b.current_value());
    }

    #[test]
    fn test_lww_replicas_converge(
        left in prop::collection::vec(lww_op(), 1..6),
        right in prop::collection::vec(lww_op(), 1..6),
    ) {
        let (mut a, da) = run(CrdtKind::LwwRegister, 1, &left);
        let (mut b, db) = run(CrdtKind::LwwRegister, 2, &right);

        a.apply_delta(&db.unwrap()).unwrap();
        b.apply_delta(&da.unwrap()).unwrap();
        prop_assert_eq!(a.current_value(), b.current_value());
    }

    #[test]
    fn test_mismatched_delta_leaves_value_unchanged(n in 1i64..1000, flag in any::<bool>()) {
        let mut state = CrdtState::new(CrdtKind::GCounter, replica(1));
        state.mutate(CrdtOperation::Increment(n)).unwrap();

        let delta = CrdtDelta::Flag(crdt_host_core::FlagDelta { value: flag });
        let err = state.apply_delta(&delta).unwrap_err();
        let is_mismatch = matches!(
            err,
            CrdtError::DeltaMismatch { expected: CrdtKind::GCounter, found: CrdtKind::Flag }
        );
        prop_assert!(is_mismatch);
        prop_assert_eq!(state.current_value(), CrdtValue::GCounter(n as u64));
    }
}
