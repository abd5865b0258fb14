//! Cache Key Derivation
//!
//! Value tokens, item keys, query/scan group keys and request shapes. Every
//! function here is pure: the same inputs always produce byte-identical keys.

mod encode;
mod shape;

pub use encode::{encode_key_value, encode_tagged_value, encode_value, NULL_TOKEN};
pub use shape::{
    item_key, key_only, query_group, query_shape, resolve_expression, scan_shape,
    target_key_schema, GroupKey,
};
