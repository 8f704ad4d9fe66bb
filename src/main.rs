use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use subtrack::cli::list::ListArgs;
use subtrack::cli::manage::{AddArgs, EditArgs};
use subtrack::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct AddCommand {
    /// Display name, e.g. "Netflix"
    name: String,
    /// Price per billing cycle
    price: f64,
    /// Currency of the price (RON, USD, EUR, GBP)
    #[arg(long, default_value = "RON")]
    currency: String,
    /// Billing cycle: monthly or yearly
    #[arg(long, default_value = "monthly")]
    cycle: String,
    /// First payment date (YYYY-MM-DD)
    #[arg(long)]
    start: String,
    #[arg(long, default_value = "Other")]
    category: String,
    /// Display color, e.g. "#e50914"
    #[arg(long)]
    color: Option<String>,
}

#[derive(Args)]
struct EditCommand {
    id: u64,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    price: Option<f64>,
    #[arg(long)]
    currency: Option<String>,
    #[arg(long)]
    cycle: Option<String>,
    #[arg(long)]
    start: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    color: Option<String>,
    /// Mark the subscription active or paused
    #[arg(long)]
    active: Option<bool>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Track a new subscription
    Add(AddCommand),
    /// List subscriptions with monthly costs
    List {
        /// Case-insensitive name filter
        #[arg(short, long)]
        search: Option<String>,
        /// Only show one category ("all" shows everything)
        #[arg(long)]
        category: Option<String>,
        /// price-asc, price-desc, date-asc or date-desc
        #[arg(long)]
        sort: Option<String>,
    },
    /// Change fields of a subscription
    Edit(EditCommand),
    /// Delete a subscription
    Remove { id: u64 },
    /// Roll past-due payment dates forward
    Refresh {
        /// Also drop cached exchange rates
        #[arg(long)]
        rates: bool,
    },
    /// Display monthly spend summary
    Summary {
        /// Leave paused subscriptions out of the totals
        #[arg(long)]
        active_only: bool,
    },
}

impl From<Commands> for subtrack::AppCommand {
    fn from(cmd: Commands) -> subtrack::AppCommand {
        match cmd {
            Commands::Add(a) => subtrack::AppCommand::Add(AddArgs {
                name: a.name,
                price: a.price,
                currency: a.currency,
                cycle: a.cycle,
                start: a.start,
                category: a.category,
                color: a.color,
            }),
            Commands::List {
                search,
                category,
                sort,
            } => subtrack::AppCommand::List(ListArgs {
                search,
                category,
                sort,
            }),
            Commands::Edit(e) => subtrack::AppCommand::Edit(EditArgs {
                id: e.id,
                name: e.name,
                price: e.price,
                currency: e.currency,
                cycle: e.cycle,
                start: e.start,
                category: e.category,
                color: e.color,
                active: e.active,
            }),
            Commands::Remove { id } => subtrack::AppCommand::Remove { id },
            Commands::Refresh { rates } => subtrack::AppCommand::Refresh { clear_rates: rates },
            Commands::Summary { active_only } => subtrack::AppCommand::Summary { active_only },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => subtrack::cli::setup::setup_at_path(path),
            None => subtrack::cli::setup::setup(),
        },
        Some(cmd) => subtrack::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
