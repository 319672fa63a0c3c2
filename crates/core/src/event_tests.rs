// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

#[test]
fn json_has_stable_field_order() {
    let event = Event {
        location: "the ether".to_string(),
        operation: Operation::Delete,
        id: "an-id".to_string(),
        trigger: "tests".to_string(),
    };

    assert_eq!(
        event.to_json().unwrap(),
        r#"{"location":"the ether","operation":"delete","id":"an-id","trigger":"tests"}"#
    );
}

fn arb_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Unknown),
        Just(Operation::Create),
        Just(Operation::Read),
        Just(Operation::Update),
        Just(Operation::Delete),
    ]
}

proptest! {
    #[test]
    fn event_json_roundtrip(
        location in ".*",
        operation in arb_operation(),
        id in ".*",
        trigger in ".*",
    ) {
        let event = Event { location, operation, id, trigger };

        let parsed: Event = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        prop_assert_eq!(parsed, event);
    }
}
