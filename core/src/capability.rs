//! Capability registry
//!
//! Each state keeps two independent sets: standard modules and opt-in
//! builtins. The posture is deny-by-default: guest code reaches neither
//! unless it was enabled. The core of the language (arithmetic, `len`,
//! iteration, conversions, `print`) is never gated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/* ===================== Standard Modules ===================== */

/// Standard modules a state can expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdModule {
    Math,
    Cmath,
    Json,
    Random,
    Time,
    String,
}

impl StdModule {
    pub const ALL: [StdModule; 6] = [
        StdModule::Math,
        StdModule::Cmath,
        StdModule::Json,
        StdModule::Random,
        StdModule::Time,
        StdModule::String,
    ];

    /// Import name inside scripts
    pub fn name(self) -> &'static str {
        match self {
            StdModule::Math => "math",
            StdModule::Cmath => "cmath",
            StdModule::Json => "json",
            StdModule::Random => "random",
            StdModule::Time => "time",
            StdModule::String => "string",
        }
    }

    pub fn from_name(name: &str) -> Option<StdModule> {
        StdModule::ALL.into_iter().find(|m| m.name() == name)
    }
}

impl fmt::Display for StdModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StdModule {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StdModule::from_name(s).ok_or_else(|| UnknownCapability(s.to_string()))
    }
}

/* ===================== Opt-In Builtins ===================== */

/// Builtins that are unreachable unless enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Builtin {
    Getattr,
    Setattr,
    Hasattr,
    Delattr,
    Dir,
    Vars,
    Globals,
    Locals,
    Eval,
    Exec,
}

impl Builtin {
    pub const ALL: [Builtin; 10] = [
        Builtin::Getattr,
        Builtin::Setattr,
        Builtin::Hasattr,
        Builtin::Delattr,
        Builtin::Dir,
        Builtin::Vars,
        Builtin::Globals,
        Builtin::Locals,
        Builtin::Eval,
        Builtin::Exec,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Getattr => "getattr",
            Builtin::Setattr => "setattr",
            Builtin::Hasattr => "hasattr",
            Builtin::Delattr => "delattr",
            Builtin::Dir => "dir",
            Builtin::Vars => "vars",
            Builtin::Globals => "globals",
            Builtin::Locals => "locals",
            Builtin::Eval => "eval",
            Builtin::Exec => "exec",
        }
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        Builtin::ALL.into_iter().find(|b| b.name() == name)
    }

    pub fn group(self) -> BuiltinGroup {
        match self {
            Builtin::Eval | Builtin::Exec => BuiltinGroup::Execution,
            _ => BuiltinGroup::Reflection,
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Builtin {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Builtin::from_name(s).ok_or_else(|| UnknownCapability(s.to_string()))
    }
}

/// Convenience groups of opt-in builtins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinGroup {
    /// Attribute and namespace introspection
    Reflection,
    /// Dynamic evaluation of source text
    Execution,
}

impl BuiltinGroup {
    pub fn members(self) -> impl Iterator<Item = Builtin> {
        Builtin::ALL.into_iter().filter(move |b| b.group() == self)
    }
}

impl FromStr for BuiltinGroup {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reflection" => Ok(BuiltinGroup::Reflection),
            "execution" => Ok(BuiltinGroup::Execution),
            other => Err(UnknownCapability(other.to_string())),
        }
    }
}

/// A capability name that is not part of the fixed enumeration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown capability '{0}'")]
pub struct UnknownCapability(pub String);

/* ===================== Capability Set ===================== */

/// The per-state registry of enabled modules and builtins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    modules: BTreeSet<StdModule>,
    builtins: BTreeSet<Builtin>,
}

impl CapabilitySet {
    /// Nothing enabled
    pub fn none() -> Self {
        Self::default()
    }

    pub fn enable_module(&mut self, module: StdModule) -> bool {
        self.modules.insert(module)
    }

    pub fn disable_module(&mut self, module: StdModule) -> bool {
        self.modules.remove(&module)
    }

    pub fn enable_all_modules(&mut self) {
        self.modules.extend(StdModule::ALL);
    }

    pub fn is_module_enabled(&self, module: StdModule) -> bool {
        self.modules.contains(&module)
    }

    /// Enabled modules in declaration order
    pub fn modules(&self) -> Vec<StdModule> {
        self.modules.iter().copied().collect()
    }

    pub fn enable_builtin(&mut self, builtin: Builtin) -> bool {
        self.builtins.insert(builtin)
    }

    pub fn disable_builtin(&mut self, builtin: Builtin) -> bool {
        self.builtins.remove(&builtin)
    }

    pub fn enable_builtin_group(&mut self, group: BuiltinGroup) {
        self.builtins.extend(group.members());
    }

    pub fn is_builtin_enabled(&self, builtin: Builtin) -> bool {
        self.builtins.contains(&builtin)
    }

    pub fn builtins(&self) -> Vec<Builtin> {
        self.builtins.iter().copied().collect()
    }

    /// Whether guest code can reach the opt-in builtin called `name`
    pub(crate) fn allows_builtin_named(&self, name: &str) -> bool {
        Builtin::from_name(name).is_some_and(|b| self.is_builtin_enabled(b))
    }

    /// Whether guest code can import the standard module called `name`
    pub(crate) fn allows_module_named(&self, name: &str) -> bool {
        StdModule::from_name(name).is_some_and(|m| self.is_module_enabled(m))
    }
}

/* ===================== Policy ===================== */

/// Documented starting point for a new state's capabilities
///
/// [`CapabilityPolicy::default`] is the curated set used by `State::new`:
/// the side-effect-free modules `math`, `cmath`, `string` and `json`, and
/// no opt-in builtins. Hosts wanting another baseline construct their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityPolicy {
    pub modules: Vec<StdModule>,
    #[serde(default)]
    pub builtins: Vec<Builtin>,
}

impl Default for CapabilityPolicy {
    fn default() -> Self {
        Self {
            modules: vec![
                StdModule::Math,
                StdModule::Cmath,
                StdModule::String,
                StdModule::Json,
            ],
            builtins: Vec::new(),
        }
    }
}

impl CapabilityPolicy {
    /// Deny everything
    pub fn none() -> Self {
        Self {
            modules: Vec::new(),
            builtins: Vec::new(),
        }
    }

    /// Every module and every opt-in builtin
    pub fn all() -> Self {
        Self {
            modules: StdModule::ALL.to_vec(),
            builtins: Builtin::ALL.to_vec(),
        }
    }

    pub fn to_set(&self) -> CapabilitySet {
        let mut set = CapabilitySet::none();
        for module in &self.modules {
            set.enable_module(*module);
        }
        for builtin in &self.builtins {
            set.enable_builtin(*builtin);
        }
        set
    }
}
