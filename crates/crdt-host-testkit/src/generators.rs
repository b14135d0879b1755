//! Proptest generators for property-based testing.

use proptest::prelude::*;

use crdt_host_core::{CrdtKind, CrdtOperation, Element, LwwClock, ReplicaId};

/// Generate a random ReplicaId.
pub fn replica_id() -> impl Strategy<Value = ReplicaId> {
    any::<[u8; 16]>().prop_map(ReplicaId::from_bytes)
}

/// Generate an element from a small alphabet, so operations collide.
pub fn element() -> impl Strategy<Value = Element> {
    "[a-f]{1,2}".prop_map(Element::from)
}

/// Generate arbitrary element bytes.
pub fn raw_element(max_len: usize) -> impl Strategy<Value = Element> {
    prop::collection::vec(any::<u8>(), 0..=max_len).prop_map(Element::from)
}

/// Generate a CrdtKind.
pub fn crdt_kind() -> impl Strategy<Value = CrdtKind> {
    prop::sample::select(CrdtKind::ALL.to_vec())
}

/// Generate an LWW clock choice.
pub fn lww_clock() -> impl Strategy<Value = LwwClock> {
    prop_oneof![
        Just(LwwClock::Default),
        (0u64..1000).prop_map(LwwClock::Custom),
        (0u64..1000).prop_map(LwwClock::CustomAutoIncrement),
    ]
}

/// Generate an operation that a fresh CRDT of `kind` accepts.
///
/// Counter amounts stay small enough that no sequence overflows. Map
/// operations put counters and never address a key they have not put.
pub fn operation(kind: CrdtKind) -> BoxedStrategy<CrdtOperation> {
    match kind {
        CrdtKind::GCounter => (0i64..1_000_000).prop_map(CrdtOperation::Increment).boxed(),
        CrdtKind::PnCounter => prop_oneof![
            (0i64..1_000_000).prop_map(CrdtOperation::Increment),
            (0i64..1_000_000).prop_map(CrdtOperation::Decrement),
        ]
        .boxed(),
        CrdtKind::GSet => element().prop_map(CrdtOperation::Add).boxed(),
        CrdtKind::OrSet => prop_oneof![
            4 => element().prop_map(CrdtOperation::Add),
            3 => element().prop_map(CrdtOperation::Remove),
            1 => Just(CrdtOperation::Clear),
        ]
        .boxed(),
        CrdtKind::Flag => Just(CrdtOperation::Enable).boxed(),
        CrdtKind::LwwRegister => (element(), lww_clock())
            .prop_map(|(value, clock)| CrdtOperation::Set { value, clock })
            .boxed(),
        CrdtKind::Vote => any::<bool>().prop_map(CrdtOperation::Vote).boxed(),
        CrdtKind::OrMap => prop_oneof![
            4 => element().prop_map(|key| CrdtOperation::Put {
                key,
                kind: CrdtKind::GCounter,
            }),
            2 => element().prop_map(CrdtOperation::Remove),
            1 => Just(CrdtOperation::Clear),
        ]
        .boxed(),
    }
}

/// Generate up to `max` operations for `kind`.
pub fn operations(kind: CrdtKind, max: usize) -> impl Strategy<Value = Vec<CrdtOperation>> {
    prop::collection::vec(operation(kind), 0..=max)
}

/// Generate a kind together with operations for it.
pub fn kind_and_operations(max: usize) -> impl Strategy<Value = (CrdtKind, Vec<CrdtOperation>)> {
    crdt_kind().prop_flat_map(move |kind| (Just(kind), operations(kind, max)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crdt_host_core::{CrdtState, CrdtValue};

    proptest! {
        #[test]
        fn test_generated_operations_apply((kind, ops) in kind_and_operations(24), replica in replica_id()) {
            let mut state = CrdtState::new(kind, replica);
            for op in ops {
                prop_assert!(state.mutate(op).is_ok());
            }
        }

        #[test]
        fn test_export_rebuilds_value((kind, ops) in kind_and_operations(24)) {
            let mut origin = CrdtState::new(kind, ReplicaId::from_bytes([1; 16]));
            for op in ops {
                origin.mutate(op).unwrap();
            }
            let delta = origin.export_delta(true).unwrap();
            let copy = CrdtState::from_delta(ReplicaId::from_bytes([2; 16]), &delta).unwrap();

            match (origin.current_value(), copy.current_value()) {
                // The copy is a different voter, so only the tally carries over.
                (CrdtValue::Vote(a), CrdtValue::Vote(b)) => {
                    prop_assert_eq!(a.votes_for, b.votes_for);
                    prop_assert_eq!(a.total_voters, b.total_voters);
                }
                (a, b) => prop_assert_eq!(a, b),
            }
        }

        #[test]
        fn test_raw_elements_order_bytewise(a in raw_element(8), b in raw_element(8)) {
            prop_assert_eq!(a.cmp(&b), a.as_bytes().cmp(b.as_bytes()));
        }
    }
}
