//! Tests for the tree-walking executor
//!
//! Organized by language area

mod helpers;

mod basic_tests;
mod collection_tests;
mod control_flow_tests;
mod function_tests;
mod interrupt_tests;
mod limit_tests;
mod string_tests;
