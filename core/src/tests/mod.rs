//! Embedding tests driven through the public [`State`] API

mod bridge_tests;
mod embedding_tests;
mod timeout_tests;

use crate::host::OutputBuffer;
use crate::state::State;
use std::sync::Arc;

/// A state with every module enabled whose `print` output is captured
fn captured_state() -> (State, OutputBuffer) {
    let buffer = OutputBuffer::new();
    let state = State::builder()
        .all_modules()
        .output(Arc::new(buffer.clone()))
        .build();
    (state, buffer)
}
