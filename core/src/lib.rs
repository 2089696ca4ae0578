//! Ember: an embeddable, sandboxed scripting runtime
//!
//! Hosts create isolated [`State`]s, push values in, register native
//! callables and modules, run guest code under a timeout or a
//! cancellation token, and read results back as [`Value`]s. Guest code
//! reaches no standard module or reflective builtin unless the host
//! enabled it through the state's capability set.

pub mod capability;
pub mod cli;
pub mod code;
pub mod config;
pub mod controller;
pub mod error;
pub mod host;
pub mod interpreter;
pub mod state;
pub mod value;

#[cfg(test)]
mod tests;

pub use capability::{
    Builtin, BuiltinGroup, CapabilityPolicy, CapabilitySet, StdModule, UnknownCapability,
};
pub use code::Code;
pub use config::EmberConfig;
pub use controller::{ExecutionController, Outcome, Phase};
pub use error::{
    CompileErrorSet, Diagnostic, Error, ErrorKind, Result, RuntimeError, Severity, TraceEntry,
};
pub use host::{CallContext, Callable, HostModule, OutputBuffer, OutputSink, StdoutSink};
pub use state::{State, StateBuilder};
pub use value::{Complex64, Dict, DictKey, IntPolicy, List, Tuple, UserData, Value};

pub use tokio_util::sync::CancellationToken;
