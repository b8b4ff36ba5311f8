//! envprovision - push secrets into every hosting environment through the platform CLI
//!
//! The library resolves an ordered list of variables (literal values, freshly
//! generated secrets, or values read from the environment), then stores each
//! one in every deployment environment by running `vercel env add` with the
//! value on stdin. Every call is bounded by a timeout and its outcome is
//! reported on its own line; no failure stops the run.
//!
//! # Example
//!
//! ```no_run
//! use envprovision::{Manifest, Provisioner, Settings, VercelCli};
//!
//! fn main() -> envprovision::Result<()> {
//!     let manifest = Manifest::builtin();
//!     let settings = Settings::default();
//!     let entries = manifest.resolve(&std::env::current_dir()?)?;
//!
//!     let provisioner = Provisioner::new(entries, manifest.environments.clone(), &settings);
//!     let report = provisioner.run(&VercelCli::from_settings(&settings), &mut std::io::stdout())?;
//!     println!("{} pairs failed", report.failed());
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod provisioner;
mod secret;

pub mod tool;

pub use config::{
    DEFAULT_APP_URL, DEFAULT_TIMEOUT, DEFAULT_TOOL, Defaults, Environment, GlobalConfig,
    MANIFEST_FILE, Manifest, Overrides, Settings, TIMEOUT_SECS_RANGE, ValueSource, VariableEntry,
    VariableSpec, check_timeout_secs,
};
pub use error::{ProvisionError, Result};
pub use provisioner::{PairResult, Provisioner, RunReport, outcome_line};
pub use secret::{SECRET_BYTES, generate_secret};
pub use tool::{CallOutcome, EnvTool, VercelCli};
