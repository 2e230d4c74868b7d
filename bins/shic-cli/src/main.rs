//! shic-cli: command-line driver for the Shibacoin wallet engine.
//!
//! Every command loads the wallet from the encrypted store, performs one
//! action, and waits for pending writes before exiting.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chain_shic::amount::{format_amount, parse_amount, to_display};
use chain_shic::transaction::ChangePolicy;
use clap::{Args, Parser, Subcommand};
use secrecy::ExposeSecret;
use wallet_core::{AccountRegistry, HttpExplorerClient, SendFlow, SendRequest, WalletConfig};

/// Shibacoin (SHIC) wallet.
#[derive(Parser)]
#[command(name = "shic-cli")]
#[command(version, about = "Shibacoin wallet")]
struct Cli {
    /// Encrypted store file (overrides SHIC_STORE_PATH).
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new wallet with a fresh 12-word phrase.
    New(PasswordArgs),
    /// Restore a wallet from an existing phrase.
    Import(ImportArgs),
    /// Derive and select the next account.
    AddAccount(AddAccountArgs),
    /// List accounts.
    Accounts,
    /// Select an account by index.
    Select { index: usize },
    /// Query the selected account's balance and the SHIC price.
    Balance,
    /// Send SHIC from the selected account.
    Send(SendArgs),
    /// Print the WIF private key of an account.
    ExportWif { index: usize },
    /// Forget the phrase, password and selection. Accounts are kept.
    Clear,
}

#[derive(Args)]
struct PasswordArgs {
    /// Wallet password. Prompted for when omitted.
    #[arg(long)]
    password: Option<String>,
}

#[derive(Args)]
struct ImportArgs {
    /// The 12-word phrase, quoted. Prompted for when omitted.
    #[arg(long)]
    phrase: Option<String>,

    #[command(flatten)]
    password: PasswordArgs,
}

#[derive(Args)]
struct AddAccountArgs {
    /// Display name; "Account N" when omitted.
    #[arg(long)]
    name: Option<String>,
}

#[derive(Args)]
struct SendArgs {
    /// Recipient address (starts with 'S').
    #[arg(short, long)]
    to: String,

    /// Amount in SHIC, fee included (e.g. 0.5).
    #[arg(short, long)]
    amount: String,

    /// Spend from this account instead of the selected one.
    #[arg(long)]
    from: Option<usize>,

    /// Pay the remainder back to the sender instead of the miner.
    #[arg(long)]
    return_change: bool,

    #[command(flatten)]
    password: PasswordArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = WalletConfig::from_env().context("Failed to load configuration")?;
    if let Some(path) = cli.store {
        config.store_path = path;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    let store = config
        .open_store()
        .with_context(|| format!("Failed to open store {}", config.store_path.display()))?;
    let mut registry = AccountRegistry::load(store.clone());

    let outcome = run(cli.command, &config, &mut registry).await;
    store.flush().await;
    outcome
}

async fn run(command: Commands, config: &WalletConfig, registry: &mut AccountRegistry) -> Result<()> {
    match command {
        Commands::New(args) => wallet_new(registry, args),
        Commands::Import(args) => wallet_import(registry, args),
        Commands::AddAccount(args) => {
            let account = registry.add_account(args.name.as_deref())?;
            println!("Account {}: {} ({})", account.index, account.address, account.name);
            Ok(())
        }
        Commands::Accounts => {
            list_accounts(registry);
            Ok(())
        }
        Commands::Select { index } => {
            let account = registry.select_account(index)?;
            println!("Selected {}: {}", account.name, account.address);
            Ok(())
        }
        Commands::Balance => wallet_balance(registry, config).await,
        Commands::Send(args) => wallet_send(registry, config, args).await,
        Commands::ExportWif { index } => {
            let wif = registry.private_key_wif(index)?;
            println!("{}", wif.expose_secret());
            Ok(())
        }
        Commands::Clear => {
            registry.clear_wallet_data();
            println!("Wallet data cleared.");
            Ok(())
        }
    }
}

fn wallet_new(registry: &mut AccountRegistry, args: PasswordArgs) -> Result<()> {
    let password = password_or_prompt(args, true)?;
    let account = registry.new_wallet()?;
    registry.set_password(&password);

    let phrase = registry
        .state()
        .mnemonic()
        .context("wallet has no phrase after creation")?;
    println!("\n=== WALLET CREATED ===");
    println!("Address: {}", account.address);
    println!("\nRECOVERY PHRASE (12 WORDS):");
    println!("  {}", phrase.expose_secret());
    println!("\nWrite it down. Anyone with this phrase can spend your funds.");
    Ok(())
}

fn wallet_import(registry: &mut AccountRegistry, args: ImportArgs) -> Result<()> {
    let phrase = match args.phrase {
        Some(phrase) => phrase,
        None => rpassword::prompt_password("Recovery phrase: ")
            .context("Failed to read recovery phrase")?,
    };
    let password = password_or_prompt(args.password, true)?;
    let account = registry.import_wallet(&phrase)?;
    registry.set_password(&password);

    println!("\n=== WALLET RESTORED ===");
    println!("Address: {}", account.address);
    Ok(())
}

fn list_accounts(registry: &AccountRegistry) {
    let state = registry.state();
    if state.accounts().is_empty() {
        println!("No accounts. Run `shic-cli new` or `shic-cli import`.");
        return;
    }
    for account in state.accounts() {
        let marker = if account.index == state.selected_index() { "*" } else { " " };
        let hidden = if account.visible { "" } else { " (hidden)" };
        println!(
            "{marker} {:>3}  {}  {}{hidden}",
            account.index, account.address, account.name
        );
    }
}

async fn wallet_balance(registry: &mut AccountRegistry, config: &WalletConfig) -> Result<()> {
    let client = HttpExplorerClient::new(config)?;
    let balance = registry
        .update_balance(&client)
        .await
        .context("Failed to fetch balance")?;

    println!("\n=== WALLET BALANCE ===");
    if let Some(address) = registry.state().selected_address() {
        println!("Address: {address}");
    }
    println!("Balance: {} SHIC", format_amount(balance));

    match registry.update_price_usd(&client).await {
        Ok(price) => println!("Value:   {:.2} USDT", price * to_display(balance)),
        Err(e) => tracing::warn!(error = %e, "price unavailable"),
    }
    Ok(())
}

async fn wallet_send(
    registry: &mut AccountRegistry,
    config: &WalletConfig,
    args: SendArgs,
) -> Result<()> {
    let amount_sat = parse_amount(&args.amount)
        .with_context(|| format!("Invalid amount {:?}", args.amount))?;
    let password = password_or_prompt(args.password, false)?;

    let policy = if args.return_change {
        ChangePolicy::ReturnToSender
    } else {
        config.change_policy
    };
    let client = HttpExplorerClient::new(config)?;
    let mut flow = SendFlow::new(config.fee_sat, policy);

    let request = SendRequest {
        from_index: args.from,
        destination: args.to.clone(),
        amount_sat,
        password,
    };
    let receipt = match flow.run(registry, &client, request).await {
        Ok(receipt) => receipt,
        Err(e) => bail!("Send failed while {}: {e}", last_active_state(&flow)),
    };

    println!("\n=== TRANSACTION SENT ===");
    println!("TxID:   {}", receipt.txid);
    println!("To:     {}", args.to);
    println!("Amount: {} SHIC", format_amount(receipt.sent_sat));
    println!("Fee:    {} SHIC", format_amount(receipt.fee_sat));
    if receipt.donated {
        println!("No change output; the remainder went to the fee.");
    }
    println!("View:   {}", receipt.explorer_url);
    Ok(())
}

/// State the flow was in when it failed.
fn last_active_state(flow: &SendFlow) -> String {
    let trace = flow.trace();
    trace
        .len()
        .checked_sub(2)
        .and_then(|i| trace.get(i))
        .map_or_else(|| flow.state().to_string(), ToString::to_string)
}

fn password_or_prompt(args: PasswordArgs, confirm: bool) -> Result<String> {
    if let Some(password) = args.password {
        return Ok(password);
    }
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    if confirm {
        let again =
            rpassword::prompt_password("Confirm password: ").context("Failed to read password")?;
        if password != again {
            bail!("Passwords do not match");
        }
    }
    Ok(password)
}
