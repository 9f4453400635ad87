use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// Environment variable holding the log filter directive
const LOG_ENV: &str = "PROPGUARD_LOG";

#[derive(Parser)]
#[command(name = "propguard")]
#[command(version, about = "Property protection rule tooling", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Property protection rule files
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
}

#[derive(Subcommand)]
enum RulesCommands {
    /// Validate a rule file
    Check {
        /// Path to the rule TOML file
        file: PathBuf,

        /// Policy file backing `policy:` delegations
        #[arg(long)]
        policy_file: Option<PathBuf>,
    },
    /// Decide one action on one property
    Eval {
        /// Path to the rule TOML file
        file: PathBuf,

        /// Property name
        #[arg(long)]
        property: String,

        /// Action: create, read, update or delete
        #[arg(long)]
        action: String,

        /// Requester role (repeatable)
        #[arg(long = "role")]
        roles: Vec<String>,

        /// Policy file backing `policy:` delegations
        #[arg(long)]
        policy_file: Option<PathBuf>,

        /// Requester tenant
        #[arg(long)]
        tenant: Option<String>,

        /// Requester user
        #[arg(long)]
        user: Option<String>,

        /// Requester is an administrator
        #[arg(long)]
        admin: bool,
    },
    /// Show the properties a requester sees
    View {
        /// Path to the rule TOML file
        file: PathBuf,

        /// JSON file with a flat object of property names to values
        #[arg(long)]
        properties: PathBuf,

        /// Operation mode of the view
        #[arg(long, value_enum, default_value_t = Mode::Read)]
        mode: Mode,

        /// Requester role (repeatable)
        #[arg(long = "role")]
        roles: Vec<String>,

        /// Policy file backing `policy:` delegations
        #[arg(long)]
        policy_file: Option<PathBuf>,
    },
}

/// Operation mode accepted by `rules view`
#[derive(Clone, Copy, ValueEnum)]
pub enum Mode {
    /// Existing properties, filtered by the read permission
    Read,
    /// New properties, filtered by the create permission
    Create,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Rules { command } => match command {
            RulesCommands::Check { file, policy_file } => {
                commands::rules::check(&file, policy_file.as_deref())?;
            }
            RulesCommands::Eval {
                file,
                property,
                action,
                roles,
                policy_file,
                tenant,
                user,
                admin,
            } => {
                let requester = commands::requester(roles, tenant, user, admin)?;
                commands::rules::eval(&file, policy_file.as_deref(), &property, &action, &requester)?;
            }
            RulesCommands::View {
                file,
                properties,
                mode,
                roles,
                policy_file,
            } => {
                let requester = commands::requester(roles, None, None, false)?;
                commands::rules::view(&file, policy_file.as_deref(), &properties, mode, requester)?;
            }
        },
    }

    Ok(())
}
