//! Manifest, global defaults and resolved run settings

use crate::error::{ProvisionError, Result};
use crate::secret::generate_secret;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// File name of the project manifest looked up in the working directory.
pub const MANIFEST_FILE: &str = "envprovision.toml";

/// Platform CLI invoked when nothing else is configured.
pub const DEFAULT_TOOL: &str = "vercel";

/// Upper bound on a single `env add` call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Accepted range for the per-call timeout, in seconds.
pub const TIMEOUT_SECS_RANGE: std::ops::RangeInclusive<u64> = 1..=3600;

/// Page to try once the platform has redeployed.
pub const DEFAULT_APP_URL: &str = "https://movies-trackers.vercel.app/en/register";

const BUILTIN_DATABASE_URL: &str = "postgresql://neondb_owner:<REDACTED>@<REDACTED>/neondb?sslmode=require&channel_binding=require&options=-csearch_path%3D%22movies-tracker%22";
const BUILTIN_TMDB_TOKEN: &str = "<REDACTED>";

/// A deployment tier of the hosting platform.
///
/// The declaration order is the order every variable is pushed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Preview,
    Development,
}

impl Environment {
    /// All tiers in push order.
    pub const ALL: [Environment; 3] = [
        Environment::Production,
        Environment::Preview,
        Environment::Development,
    ];

    /// The name the platform CLI expects as its positional argument.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Preview => "preview",
            Environment::Development => "development",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_environments() -> Vec<Environment> {
    Environment::ALL.to_vec()
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Where a variable's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Taken verbatim from the manifest.
    Literal(String),
    /// A fresh secret from [`generate_secret`].
    Generated,
    /// Read from the named environment variable (after loading `.env`).
    Env(String),
}

/// A variable as declared in the manifest, before its value is resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub generate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
}

impl VariableSpec {
    /// Returns the single value source of this entry.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::InvalidManifest`] unless exactly one of
    /// `value`, `generate` or `env` is given.
    pub fn source(&self) -> Result<ValueSource> {
        match (&self.value, self.generate, &self.env) {
            (Some(value), false, None) => Ok(ValueSource::Literal(value.clone())),
            (None, true, None) => Ok(ValueSource::Generated),
            (None, false, Some(key)) => Ok(ValueSource::Env(key.clone())),
            (None, false, None) => Err(ProvisionError::InvalidManifest(format!(
                "variable '{}' needs one of `value`, `generate = true` or `env`",
                self.name
            ))),
            _ => Err(ProvisionError::InvalidManifest(format!(
                "variable '{}' sets more than one of `value`, `generate` and `env`",
                self.name
            ))),
        }
    }
}

/// A variable with its final value, ready to be pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableEntry {
    pub name: String,
    pub value: String,
    /// Whether the value was generated for this run.
    pub generated: bool,
}

/// The project manifest: which variables go to which environments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "default_environments")]
    pub environments: Vec<Environment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_url: Option<String>,
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
}

impl Manifest {
    /// The variable set used when no `envprovision.toml` exists.
    pub fn builtin() -> Self {
        Self {
            environments: default_environments(),
            app_url: None,
            variables: vec![
                VariableSpec {
                    name: "DATABASE_URL".to_string(),
                    value: Some(BUILTIN_DATABASE_URL.to_string()),
                    ..Default::default()
                },
                VariableSpec {
                    name: "JWT_SECRET".to_string(),
                    generate: true,
                    ..Default::default()
                },
                VariableSpec {
                    name: "TMDB_READ_ACCESS_TOKEN".to_string(),
                    value: Some(BUILTIN_TMDB_TOKEN.to_string()),
                    ..Default::default()
                },
            ],
        }
    }

    /// Reads and validates a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProvisionError::NoManifest(path.display().to_string())
            } else {
                ProvisionError::Io(e)
            }
        })?;
        content.parse()
    }

    /// Finds the manifest for this run.
    ///
    /// An explicit path must exist. Otherwise `envprovision.toml` in `dir` is
    /// used when present, and the built-in set when it is not.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = dir.join(MANIFEST_FILE);
        if candidate.exists() {
            Self::load(&candidate)
        } else {
            Ok(Self::builtin())
        }
    }

    /// Checks names, sources and environments.
    pub fn validate(&self) -> Result<()> {
        if self.environments.is_empty() {
            return Err(ProvisionError::InvalidManifest(
                "`environments` must list at least one environment".to_string(),
            ));
        }
        let mut seen_envs = HashSet::new();
        for env in &self.environments {
            if !seen_envs.insert(env) {
                return Err(ProvisionError::InvalidManifest(format!(
                    "environment '{}' is listed more than once",
                    env
                )));
            }
        }

        let mut seen = HashSet::new();
        for spec in &self.variables {
            if spec.name.trim().is_empty() {
                return Err(ProvisionError::InvalidManifest(
                    "variable names must not be empty".to_string(),
                ));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(ProvisionError::DuplicateVariable(spec.name.clone()));
            }
            spec.source()?;
        }
        Ok(())
    }

    /// Produces the ordered variable list, generating secrets and reading
    /// `env` sources through `lookup`.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<Vec<VariableEntry>>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.validate()?;
        self.variables
            .iter()
            .map(|spec| -> Result<VariableEntry> {
                let (value, generated) = match spec.source()? {
                    ValueSource::Literal(value) => (value, false),
                    ValueSource::Generated => (generate_secret(), true),
                    ValueSource::Env(key) => {
                        let value =
                            lookup(key.as_str()).ok_or_else(|| ProvisionError::MissingEnvValue {
                                name: spec.name.clone(),
                                key: key.clone(),
                            })?;
                        (value, false)
                    }
                };
                Ok(VariableEntry {
                    name: spec.name.clone(),
                    value,
                    generated,
                })
            })
            .collect()
    }

    /// Like [`Manifest::resolve_with`], reading the process environment and
    /// then `dir/.env` if there is one. Parent directories are not searched.
    pub fn resolve(&self, dir: &Path) -> Result<Vec<VariableEntry>> {
        let dotenv = read_dotenv(&dir.join(".env"))?;
        self.resolve_with(|key| std::env::var(key).ok().or_else(|| dotenv.get(key).cloned()))
    }

    /// Renders the manifest as a commented `envprovision.toml`.
    pub fn to_toml_with_comments(&self) -> Result<String> {
        let mut output = String::new();
        output.push_str("# Variables pushed to every environment, in this order.\n");
        output.push_str("# Each entry takes exactly one of:\n");
        output.push_str("#   value = \"...\"     literal value\n");
        output.push_str("#   generate = true   fresh 64-character hex secret per run\n");
        output.push_str("#   env = \"NAME\"      read from the environment (or .env)\n\n");
        output.push_str(&toml::to_string_pretty(self)?);
        Ok(output)
    }
}

fn read_dotenv(path: &Path) -> Result<HashMap<String, String>> {
    match dotenvy::from_path_iter(path) {
        Ok(iter) => {
            let vars = iter.collect::<std::result::Result<HashMap<_, _>, _>>()?;
            tracing::debug!(path = %path.display(), count = vars.len(), "loaded .env");
            Ok(vars)
        }
        Err(e) if e.not_found() => Ok(HashMap::new()),
        Err(e) => Err(e.into()),
    }
}

/// Rejects a timeout outside [`TIMEOUT_SECS_RANGE`].
pub fn check_timeout_secs(secs: u64) -> Result<u64> {
    if TIMEOUT_SECS_RANGE.contains(&secs) {
        Ok(secs)
    } else {
        Err(ProvisionError::InvalidTimeout(secs))
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FromStr for Manifest {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(s)?;
        manifest.validate()?;
        Ok(manifest)
    }
}

/// User-level defaults shared by all projects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_url: Option<String>,
}

impl GlobalConfig {
    /// Path of the user configuration file, typically
    /// `~/.config/envprovision/config.toml` on Linux.
    pub fn path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "envprovision").ok_or(ProvisionError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Loads the user configuration, `None` if it has not been created.
    pub fn load() -> Result<Option<Self>> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        if let Some(secs) = config.defaults.timeout_secs {
            check_timeout_secs(secs)?;
        }
        Ok(Some(config))
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Values given on the command line or through `ENVPROVISION_*` variables.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub tool: Option<String>,
    pub timeout_secs: Option<u64>,
    pub app_url: Option<String>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub tool: String,
    pub timeout: Duration,
    pub app_url: String,
}

impl Settings {
    /// Merges overrides, manifest and global defaults, in that priority.
    pub fn resolve(
        overrides: Overrides,
        manifest: &Manifest,
        global: Option<&GlobalConfig>,
    ) -> Result<Self> {
        let defaults = global.map(|g| g.defaults.clone()).unwrap_or_default();

        let tool = overrides
            .tool
            .or(defaults.tool)
            .unwrap_or_else(|| DEFAULT_TOOL.to_string());
        let timeout = match overrides.timeout_secs.or(defaults.timeout_secs) {
            Some(secs) => Duration::from_secs(check_timeout_secs(secs)?),
            None => DEFAULT_TIMEOUT,
        };
        let app_url = overrides
            .app_url
            .or_else(|| manifest.app_url.clone())
            .or(defaults.app_url)
            .unwrap_or_else(|| DEFAULT_APP_URL.to_string());

        Ok(Self {
            tool,
            timeout,
            app_url,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tool: DEFAULT_TOOL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            app_url: DEFAULT_APP_URL.to_string(),
        }
    }
}
