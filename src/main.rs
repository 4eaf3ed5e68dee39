use std::path::PathBuf;
use std::process::ExitCode;

use accounta::config::Configuration;
use accounta::{
    Account, AccountManager, Attributes, Flag, FlagOverrides, NewAccount, Page, Password,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to `config.yaml`.
    #[arg(long, short, global = true, default_value = "config.yaml")]
    config: PathBuf,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Privilege {
    Staff,
    Superuser,
}

impl From<Privilege> for Flag {
    fn from(privilege: Privilege) -> Self {
        match privilege {
            Privilege::Staff => Flag::Staff,
            Privilege::Superuser => Flag::Superuser,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Create a regular account.
    CreateAccount {
        email: String,
        #[arg(long, env = "ACCOUNTA_PASSWORD", hide_env_values = true)]
        password: String,
        /// Extra attribute as `key=value`. JSON values are parsed.
        #[arg(long = "attr", value_parser = parse_attribute)]
        attributes: Vec<(String, Value)>,
        /// Grant staff status at creation.
        #[arg(long)]
        staff: bool,
    },
    /// Create an account with every privilege.
    CreateSuperuser {
        email: String,
        #[arg(long, env = "ACCOUNTA_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long = "attr", value_parser = parse_attribute)]
        attributes: Vec<(String, Value)>,
    },
    /// Print an account as JSON.
    Show { email: String },
    /// List accounts ordered by email.
    List {
        #[arg(long, default_value_t = accounta::repository::DEFAULT_PAGE_SIZE)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    Activate { email: String },
    Deactivate { email: String },
    Grant { email: String, privilege: Privilege },
    Revoke { email: String, privilege: Privilege },
    /// Issue a new random password and print it once.
    ResetPassword { email: String },
    /// Delete an account permanently.
    Delete { email: String },
}

fn parse_attribute(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected `key=value`, got {raw:?}"))?;

    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| Value::String(value.to_owned()));

    Ok((key.trim().to_owned(), value))
}

fn print(account: &Account) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(account)?);
    Ok(())
}

async fn run(
    manager: AccountManager,
    cmd: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Commands::CreateAccount {
            email,
            password,
            attributes,
            staff,
        } => {
            let request = NewAccount::new(email, Password::from(password))
                .attributes(attributes.into_iter().collect::<Attributes>());
            let account = if staff {
                let flags = FlagOverrides::default().with(Flag::Staff, true);
                manager.create_account_with_flags(request, flags).await?
            } else {
                manager.create_account(request).await?
            };

            print(&account)?;
        },
        Commands::CreateSuperuser {
            email,
            password,
            attributes,
        } => {
            let request = NewAccount::new(email, Password::from(password))
                .attributes(attributes.into_iter().collect::<Attributes>());

            let flags = FlagOverrides::default();

            print(&manager.create_privileged_account(request, flags).await?)?;
        },
        Commands::Show { email } => {
            print(&manager.find_by_identifier(&email).await?)?;
        },
        Commands::List { limit, offset } => {
            let accounts = manager.list_accounts(Page { limit, offset }).await?;
            println!("{}", serde_json::to_string_pretty(&accounts)?);
        },
        Commands::Activate { email } => {
            print(&manager.activate(&email).await?)?;
        },
        Commands::Deactivate { email } => {
            print(&manager.deactivate(&email).await?)?;
        },
        Commands::Grant { email, privilege } => {
            print(&manager.set_privilege(&email, privilege.into(), true).await?)?;
        },
        Commands::Revoke { email, privilege } => {
            print(&manager.set_privilege(&email, privilege.into(), false).await?)?;
        },
        Commands::ResetPassword { email } => {
            let secret = manager.reset_credential(&email).await?;
            println!("New password for {email:?}: {}", secret.as_str());
        },
        Commands::Delete { email } => {
            manager.delete_account(&email).await?;
            println!("Account {email:?} has been deleted.");
        },
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    accounta::telemetry::setup_logging();
    accounta::telemetry::describe_metrics();

    let args = Args::parse();
    let config = Configuration::default().path(args.config).read();

    let manager = match accounta::initialize(config).await {
        Ok(manager) => manager,
        Err(err) => {
            tracing::error!(error = %err, "initialization failed");
            return ExitCode::FAILURE;
        },
    };

    match run(manager, args.cmd).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        },
    }
}
