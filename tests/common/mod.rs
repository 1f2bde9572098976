#![allow(dead_code)]

pub mod nodes;

pub use nodes::*;

use serde_json::json;
use stategraph::state::State;

/// Initial state seeded with one input value.
pub fn state_with_input(value: &str) -> State {
    State::builder().with_value("input", json!(value)).build()
}
