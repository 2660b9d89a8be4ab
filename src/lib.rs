//! Pluggable key-value storage for scalar metric values
//!
//! See [`storage`] for the `KeyValue` contract and its backends.

pub mod config;
pub mod storage;
pub mod util;
