//! Property-based test generators using proptest.
//!
//! Provides strategies for generating records and operation sequences.

use crate::fixtures::{TestThing, TestThing2};
use proptest::prelude::*;

/// One mutation against a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOp {
    /// Add a record.
    Add(TestThing2),
    /// Replace a record.
    Update(TestThing2),
    /// Remove the record with this identifier.
    Remove(u64),
}

/// Strategy for record identifiers from a small range, so operations collide.
pub fn record_id_strategy() -> impl Strategy<Value = u64> {
    1u64..64
}

/// Strategy for field values, including characters that need escaping.
pub fn field_value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 ,:{}%_-]{0,16}").expect("Invalid regex")
}

/// Strategy for valid partition names.
pub fn partition_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9_]{0,31}").expect("Invalid regex")
}

/// Strategy for [`TestThing`] records.
pub fn test_thing_strategy() -> impl Strategy<Value = TestThing> {
    record_id_strategy().prop_map(TestThing::new)
}

/// Strategy for [`TestThing2`] records.
pub fn test_thing2_strategy() -> impl Strategy<Value = TestThing2> {
    (
        record_id_strategy(),
        field_value_strategy(),
        field_value_strategy(),
    )
        .prop_map(|(id, color, ice_cream)| TestThing2::new(id, &color, &ice_cream))
}

/// Strategy for a single mutation.
pub fn set_op_strategy() -> impl Strategy<Value = SetOp> {
    prop_oneof![
        3 => test_thing2_strategy().prop_map(SetOp::Add),
        1 => test_thing2_strategy().prop_map(SetOp::Update),
        2 => record_id_strategy().prop_map(SetOp::Remove),
    ]
}

/// Strategy for a sequence of mutations.
pub fn set_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<SetOp>> {
    prop::collection::vec(set_op_strategy(), 0..max_len)
}
