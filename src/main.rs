use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use envprovision::{
    DEFAULT_APP_URL, DEFAULT_TIMEOUT, DEFAULT_TOOL, Defaults, GlobalConfig, MANIFEST_FILE,
    Manifest, Overrides, ProvisionError, Provisioner, Settings, VercelCli, check_timeout_secs,
};
use std::fs;
use std::io;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Main CLI structure for the envprovision application.
///
/// Running without a subcommand is the same as `envprovision run`.
#[derive(Parser)]
#[command(name = "envprovision")]
#[command(about = "Push secrets into every hosting environment through the platform CLI", long_about = None)]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Print diagnostic logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    /// The subcommand to execute
    #[command(subcommand)]
    command: Option<Commands>,
    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Store every variable in every environment (the default)
    Run(RunArgs),
    /// Print a fresh 64-character hex secret
    Generate,
    /// Write an envprovision.toml describing the built-in variables
    Init {
        /// Overwrite an existing manifest without asking
        #[arg(short, long)]
        force: bool,
    },
    /// Init or show the user configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Manifest to read instead of ./envprovision.toml
    #[arg(short, long, env = "ENVPROVISION_MANIFEST")]
    manifest: Option<PathBuf>,
    /// Platform CLI command (e.g. "vercel" or "npx vercel")
    #[arg(short, long, env = "ENVPROVISION_TOOL")]
    tool: Option<String>,
    /// Seconds to wait for each call before killing it
    #[arg(
        long,
        env = "ENVPROVISION_TIMEOUT",
        value_name = "SECS",
        value_parser = clap::value_parser!(u64).range(1..=3600)
    )]
    timeout: Option<u64>,
    /// URL to try once the platform has redeployed
    #[arg(long, env = "ENVPROVISION_APP_URL")]
    app_url: Option<String>,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Initialize user configuration
    Init,
    /// Show current configuration
    Show,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("envprovision=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(args: RunArgs) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let manifest = Manifest::discover(args.manifest.as_deref(), &cwd)
        .wrap_err("Failed to load manifest")?;

    let global = match GlobalConfig::load() {
        Ok(config) => config,
        Err(ProvisionError::NoConfigDir) => None,
        Err(e) => return Err(e).wrap_err("Failed to load user configuration"),
    };

    let settings = Settings::resolve(
        Overrides {
            tool: args.tool,
            timeout_secs: args.timeout,
            app_url: args.app_url,
        },
        &manifest,
        global.as_ref(),
    )
    .wrap_err("Invalid settings")?;
    tracing::debug!(?settings, "resolved settings");

    let entries = manifest
        .resolve(&cwd)
        .wrap_err("Failed to resolve variable values")?;

    let provisioner = Provisioner::new(entries, manifest.environments.clone(), &settings);
    let tool = VercelCli::from_settings(&settings);
    provisioner
        .run(&tool, &mut io::stdout().lock())
        .wrap_err("Failed to write report")?;
    Ok(())
}

fn init(force: bool) -> Result<()> {
    let path = PathBuf::from(MANIFEST_FILE);
    if path.exists() && !force {
        use inquire::Confirm;
        let overwrite = Confirm::new(&format!("{} already exists. Overwrite?", MANIFEST_FILE))
            .with_default(false)
            .prompt()?;

        if !overwrite {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let manifest = Manifest::builtin();
    let content = manifest.to_toml_with_comments()?;
    fs::write(&path, content)?;

    // Set file permissions to 600 (owner read/write only) on Unix systems
    #[cfg(unix)]
    {
        let mut permissions = fs::metadata(&path)?.permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(&path, permissions)?;
    }

    println!(
        "✓ Created {} with {} variables",
        MANIFEST_FILE,
        manifest.variables.len()
    );
    println!("\nNext steps:");
    println!("  1. Replace the placeholder values, or use env = \"NAME\" to read them from .env");
    println!("  2. vercel login && vercel link   # authenticate the platform CLI");
    println!("  3. envprovision                  # push every variable");
    Ok(())
}

fn config_init() -> Result<()> {
    use inquire::{CustomType, Text};

    let tool = Text::new("Platform CLI command:")
        .with_default(DEFAULT_TOOL)
        .with_help_message("Use 'npx vercel' if the CLI is not installed globally")
        .prompt()?;
    let timeout_secs = CustomType::<u64>::new("Seconds to wait for each call:")
        .with_default(DEFAULT_TIMEOUT.as_secs())
        .with_error_message("Please type a whole number of seconds")
        .prompt()?;
    let timeout_secs = check_timeout_secs(timeout_secs)?;
    let app_url = Text::new("URL to try after the redeploy:")
        .with_default(DEFAULT_APP_URL)
        .prompt()?;

    let config = GlobalConfig {
        defaults: Defaults {
            tool: Some(tool),
            timeout_secs: Some(timeout_secs),
            app_url: Some(app_url),
        },
    };
    let path = config.save()?;
    println!("\n✓ Configuration saved to {}", path.display());
    Ok(())
}

fn config_show() -> Result<()> {
    let path = GlobalConfig::path()?;
    match GlobalConfig::load()? {
        Some(config) => {
            let defaults = config.defaults;
            println!("Configuration file: {}\n", path.display());
            println!(
                "Tool:     {}",
                defaults.tool.as_deref().unwrap_or(DEFAULT_TOOL)
            );
            println!(
                "Timeout:  {}s",
                defaults.timeout_secs.unwrap_or(DEFAULT_TIMEOUT.as_secs())
            );
            println!(
                "App URL:  {}",
                defaults.app_url.as_deref().unwrap_or(DEFAULT_APP_URL)
            );
        }
        None => {
            println!("No configuration found. Run 'envprovision config init' to create one.");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command.unwrap_or(Commands::Run(cli.run)) {
        Commands::Run(args) => run(args),
        Commands::Generate => {
            println!("{}", envprovision::generate_secret());
            Ok(())
        }
        Commands::Init { force } => init(force).wrap_err("Failed to write manifest"),
        Commands::Config { action } => match action {
            ConfigAction::Init => config_init().wrap_err("Failed to save configuration"),
            ConfigAction::Show => config_show().wrap_err("Failed to read configuration"),
        },
    }
}
