use crate::capability::{Builtin, BuiltinGroup, StdModule};
use crate::config::EmberConfig;
use crate::error::Error;
use crate::state::State;
use crate::value::Value;
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "ember")]
#[command(about = "Ember - an embeddable, sandboxed scripting runtime", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a script in a fresh state
    Run {
        /// Script to run
        file: PathBuf,

        /// Abort after this many milliseconds
        #[arg(short = 't', long = "timeout-ms")]
        timeout_ms: Option<u64>,

        /// Bind a global before running, as NAME=JSON
        #[arg(long = "set", value_name = "NAME=JSON")]
        globals: Vec<String>,

        #[command(flatten)]
        capabilities: CapabilityArgs,
    },

    /// Compile a script and report every diagnostic without running it
    Check {
        /// Script to check
        file: PathBuf,
    },

    /// Evaluate one expression and print its repr
    Eval {
        /// Expression to evaluate
        expression: String,

        /// Abort after this many milliseconds
        #[arg(short = 't', long = "timeout-ms")]
        timeout_ms: Option<u64>,

        #[command(flatten)]
        capabilities: CapabilityArgs,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Capability overrides applied on top of the configuration
#[derive(Args, Debug, Default, Clone)]
pub struct CapabilityArgs {
    /// Start from no capabilities instead of the configured ones
    #[arg(long)]
    pub bare: bool,

    /// Enable a standard module (repeatable)
    #[arg(short = 'm', long = "module", value_name = "NAME")]
    pub modules: Vec<StdModule>,

    /// Enable every standard module
    #[arg(long)]
    pub all_modules: bool,

    /// Enable an opt-in builtin (repeatable)
    #[arg(short = 'b', long = "builtin", value_name = "NAME")]
    pub builtins: Vec<Builtin>,

    /// Enable a builtin group: reflection or execution (repeatable)
    #[arg(long = "builtin-group", value_name = "GROUP")]
    pub builtin_groups: Vec<BuiltinGroup>,
}

impl CapabilityArgs {
    /// Apply the overrides to a configuration
    pub fn apply(&self, config: &mut EmberConfig) {
        let caps = &mut config.capabilities;
        if self.bare {
            caps.modules.clear();
            caps.builtins.clear();
            caps.builtin_groups.clear();
            caps.all_modules = false;
        }
        caps.modules.extend(self.modules.iter().copied());
        caps.builtins.extend(self.builtins.iter().copied());
        caps.builtin_groups.extend(self.builtin_groups.iter().copied());
        caps.all_modules |= self.all_modules;
    }
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

/// Process exit status for an error returned by the CLI
///
/// 124 for a timeout and 130 for an interrupt, like `timeout(1)` and shells.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<Error>() {
        Some(Error::TimedOut { .. }) => 124,
        Some(Error::Cancelled) => 130,
        _ => 1,
    }
}

/// Human-readable report for an error returned by the CLI
pub fn render_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<Error>() {
        Some(Error::Runtime(runtime)) => runtime.render(),
        Some(Error::Compile(set)) => format!("{} error(s) in {}\n{}", set.len(), set.name(), set),
        _ => format!("Error: {:#}", err),
    }
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load eagerly so config errors surface before any script output
    let mut config = EmberConfig::builder()
        .config_path(cli.config.clone())
        .build()
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Run {
            file,
            timeout_ms,
            globals,
            capabilities,
        } => {
            let source = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let name = file.display().to_string();
            let bindings = globals
                .iter()
                .map(|assignment| parse_assignment(assignment))
                .collect::<Result<Vec<_>>>()?;
            capabilities.apply(&mut config);

            let mut state = State::from_config(&config);
            for (global, value) in bindings {
                state.set_global(&global, value)?;
            }
            let timeout = timeout_ms
                .map(Duration::from_millis)
                .or(config.limits.default_timeout());

            run_interruptible(state, move |state, token| {
                let code = state.compile(&source, &name)?;
                state.execute_with_limits(&code, timeout, Some(token))?;
                Ok(())
            })
            .await?;
        }

        Commands::Check { file } => {
            let source = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let name = file.display().to_string();
            let code = crate::code::Code::compile(&source, &name).map_err(Error::from)?;
            for warning in code.warnings() {
                println!(
                    "{}:{}:{}: warning: {} [{}]",
                    name, warning.line, warning.column, warning.message, warning.rule
                );
            }
            println!("✓ {} compiled ({})", name, &code.digest()[..12]);
        }

        Commands::Eval {
            expression,
            timeout_ms,
            capabilities,
        } => {
            capabilities.apply(&mut config);
            let timeout = timeout_ms
                .map(Duration::from_millis)
                .or(config.limits.default_timeout());
            let state = State::from_config(&config);

            let value = run_interruptible(state, move |state, token| {
                Ok(state.eval_with_limits(&expression, timeout, Some(token))?)
            })
            .await?;
            println!("{}", value.repr());
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

/// Run `job` on a blocking thread, cancelling it on Ctrl-C
async fn run_interruptible<T, F>(mut state: State, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut State, &CancellationToken) -> Result<T> + Send + 'static,
{
    let token = CancellationToken::new();
    let ctrl_c = {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, cancelling script");
                token.cancel();
            }
        })
    };

    let result = tokio::task::spawn_blocking(move || {
        let result = job(&mut state, &token);
        state.close();
        result
    })
    .await
    .context("script thread failed");
    ctrl_c.abort();
    result?
}

/// Parse a `NAME=JSON` binding; values that are not JSON bind as strings
fn parse_assignment(assignment: &str) -> Result<(String, Value)> {
    let (name, raw) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=JSON, got '{}'", assignment))?;
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c == '_' || c.is_alphanumeric()) {
        return Err(anyhow!("invalid global name '{}'", name));
    }
    let value = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => Value::from(json),
        Err(_) => Value::from(raw),
    };
    Ok((name.to_string(), value))
}
