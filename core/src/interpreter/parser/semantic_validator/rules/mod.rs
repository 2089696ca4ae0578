//! Validation Rules
//!
//! Each file in this module contains one validation rule (or a pair of
//! closely related ones):
//!
//! - `loop_control.rs` - `break`/`continue` outside a loop
//! - `return_outside_function.rs` - `return` at module or class level
//! - `nonlocal_at_module_level.rs` - `nonlocal` outside any function
//! - `duplicate_argument.rs` - a parameter name bound twice
//! - `non_default_after_default.rs` - required parameter after an optional one
//! - `expression_depth.rs` - expressions nested too deeply to evaluate
//! - `unreachable_code.rs` - statements after `return`/`raise`/`break`/`continue`

mod duplicate_argument;
mod expression_depth;
mod loop_control;
mod non_default_after_default;
mod nonlocal_at_module_level;
mod return_outside_function;
mod unreachable_code;

pub use duplicate_argument::DuplicateArgumentRule;
pub use expression_depth::{ExpressionDepthRule, MAX_EXPRESSION_DEPTH};
pub use loop_control::{BreakOutsideLoopRule, ContinueOutsideLoopRule};
pub use non_default_after_default::NonDefaultAfterDefaultRule;
pub use nonlocal_at_module_level::NonlocalAtModuleLevelRule;
pub use return_outside_function::ReturnOutsideFunctionRule;
pub use unreachable_code::UnreachableCodeRule;
