//! Type definitions shared by the parser and the executor

pub mod ast;
mod ordered_map;

pub use ast::*;
pub use ordered_map::OrderedMap;
