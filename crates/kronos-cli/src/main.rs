// ============================================================================
// kronos — terminal shell for KRONOS quests, rewards and the AI advisor
// ============================================================================
// Usage:
//   kronos connect                          Connect a wallet and show the address
//   kronos quests                           List quests and reward status
//   kronos verify <QUEST>                   Check a quest without claiming
//   kronos claim <QUEST>                    Verify a quest and send its reward
//   kronos chat [--message TEXT]            Chat with the KRONOS advisor
//   kronos rewards stats|list|export        Inspect the reward ledger
//   kronos rewards clear-pending <Q> <W>    Release a stuck pending claim
//
// A wallet comes from --address or from the provider at KRONOS_WALLET_RPC_URL.
// ============================================================================

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use kronos_core::chain_data::BlockscoutClient;
use kronos_core::db::{RewardDb, RewardStatus};
use kronos_core::quest::{QuestCatalog, QuestRunner, QuestVerifier, VerifyOutcome};
use kronos_core::{
    AiAdvisor, ChatMessage, ChainData, Conversation, KronosConfig, KronosError, QuestStatus,
    RewardDisburser, WalletConnector, WalletSession,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

/// KRONOS: learn Web3 by doing, get rewarded in PYUSD
#[derive(Parser)]
#[command(name = "kronos", version, about = "Quests, PYUSD rewards and an AI guide for your wallet")]
struct Cli {
    /// Path to the reward ledger (default: ~/.kronos/rewards.redb)
    #[arg(long, global = true)]
    db_path: Option<String>,

    /// Use this wallet address instead of asking a wallet provider
    #[arg(long, global = true)]
    address: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect a wallet and print its address
    Connect,

    /// List available quests
    Quests,

    /// Check a quest against on-chain activity without claiming the reward
    Verify {
        /// Quest id (see `kronos quests`)
        quest: String,
    },

    /// Verify a quest and send its reward
    Claim {
        /// Quest id (see `kronos quests`)
        quest: String,
    },

    /// Chat with the KRONOS advisor about your on-chain activity
    Chat {
        /// Ask a single question and exit
        #[arg(long, short)]
        message: Option<String>,
    },

    /// Inspect and manage the reward ledger
    Rewards {
        #[command(subcommand)]
        command: RewardCommands,
    },
}

#[derive(Subcommand)]
enum RewardCommands {
    /// Show ledger statistics
    Stats,

    /// List reward claims with optional status filter
    List {
        /// Filter by status: pending, sent
        #[arg(long)]
        status: Option<String>,
    },

    /// Export the ledger as JSON
    Export,

    /// Remove a pending claim after checking the transfer by hand
    ClearPending {
        quest: String,
        wallet: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kronos=debug".parse()?)
                .add_directive("kronos_core=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = KronosConfig::from_env();
    info!("Starting KRONOS ({:?})", config);

    let result = match &cli.command {
        Commands::Connect => cmd_connect(&cli, &config).await,
        Commands::Quests => cmd_quests(&cli, &config),
        Commands::Verify { quest } => cmd_verify(&cli, &config, quest).await,
        Commands::Claim { quest } => cmd_claim(&cli, &config, quest).await,
        Commands::Chat { message } => cmd_chat(&cli, &config, message.as_deref()).await,
        Commands::Rewards { command } => {
            let db = open_ledger(&cli, &config)?;
            let decimals = config.reward_token_decimals()?;
            match command {
                RewardCommands::Stats => cmd_reward_stats(&db, decimals),
                RewardCommands::List { status } => {
                    cmd_reward_list(&db, status.as_deref(), decimals)
                }
                RewardCommands::Export => cmd_reward_export(&db),
                RewardCommands::ClearPending { quest, wallet } => {
                    cmd_clear_pending(&db, quest, wallet)
                }
            }
        }
    };

    if let Err(e) = &result {
        if let Some(notice) = e.downcast_ref::<KronosError>().and_then(notice_for) {
            eprintln!("{}", notice);
            std::process::exit(1);
        }
    }
    result
}

// ============================================================================
// Helpers
// ============================================================================

/// Blocking notices the browser shell used to show as alerts/banners
fn notice_for(err: &KronosError) -> Option<&'static str> {
    match err {
        KronosError::ProviderUnavailable => Some(
            "No wallet provider found. Please install a wallet (e.g. Frame) and set \
             KRONOS_WALLET_RPC_URL, or pass --address.",
        ),
        KronosError::WalletNotConnected => {
            Some("Please connect your wallet first (`kronos connect` or --address).")
        }
        KronosError::NoAccounts => Some("Your wallet did not share any accounts."),
        _ => None,
    }
}

fn open_ledger(cli: &Cli, config: &KronosConfig) -> Result<RewardDb> {
    let path = cli.db_path.as_deref().or(config.db_path.as_deref());
    RewardDb::open(path)
}

fn chain_data(config: &KronosConfig) -> Result<Arc<dyn ChainData>> {
    Ok(Arc::new(BlockscoutClient::from_config(config)?))
}

/// Session from --address, an already-authorized account, or a fresh request
async fn resolve_session(cli: &Cli, config: &KronosConfig) -> Result<WalletSession> {
    if let Some(address) = &cli.address {
        return Ok(WalletSession::with_address(address)?);
    }

    let connector = WalletConnector::from_config(config)?;
    if !connector.has_provider() {
        return Err(KronosError::ProviderUnavailable.into());
    }

    let mut session = connector.init().await;
    if !session.is_connected() {
        connector.connect(&mut session).await?;
    }
    Ok(session)
}

fn parse_status(s: &str) -> Result<RewardStatus> {
    match s.to_lowercase().as_str() {
        "pending" => Ok(RewardStatus::Pending),
        "sent" => Ok(RewardStatus::Sent),
        _ => anyhow::bail!("Unknown status '{}'. Valid values: pending, sent", s),
    }
}

fn format_timestamp(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("(invalid: {})", ts))
}

fn format_units(minor_units: u64, decimals: u8) -> String {
    let Some(scale) = 10u64.checked_pow(u32::from(decimals)) else {
        return format!("{} units", minor_units);
    };
    if decimals == 0 {
        return minor_units.to_string();
    }
    format!(
        "{}.{:0width$}",
        minor_units / scale,
        minor_units % scale,
        width = usize::from(decimals)
    )
}

// ============================================================================
// Wallet & Quests
// ============================================================================

async fn cmd_connect(cli: &Cli, config: &KronosConfig) -> Result<()> {
    let session = resolve_session(cli, config).await?;
    println!("Connected: {}", session.require_address()?);
    Ok(())
}

fn cmd_quests(cli: &Cli, config: &KronosConfig) -> Result<()> {
    let catalog = QuestCatalog::sepolia();
    let wallet = cli
        .address
        .as_deref()
        .map(WalletSession::with_address)
        .transpose()?;
    let db = match &wallet {
        Some(_) => Some(open_ledger(cli, config)?),
        None => None,
    };

    println!("{:<14}  {:<4}  {:<8}  {:<10}  {}", "QUEST", "TIER", "REWARD", "STATUS", "TITLE");
    println!("{}", "-".repeat(72));

    for quest in catalog.all() {
        let status = match (&db, &wallet) {
            (Some(db), Some(session)) => {
                let address = session.require_address()?;
                match db.get_reward(&quest.id, address)? {
                    Some(r) if r.status == RewardStatus::Sent => "complete",
                    Some(_) => "pending",
                    None => "active",
                }
            }
            _ => "-",
        };
        println!(
            "{:<14}  {:<4}  {:<8}  {:<10}  {}",
            quest.id,
            quest.tier,
            format!("${:.2}", quest.reward_amount),
            status,
            quest.title
        );
        println!("{:<14}  {}", "", quest.description);
    }
    Ok(())
}

async fn cmd_verify(cli: &Cli, config: &KronosConfig, quest_id: &str) -> Result<()> {
    let session = resolve_session(cli, config).await?;
    let wallet = session.require_address()?;
    let verifier = QuestVerifier::new(chain_data(config)?, QuestCatalog::sepolia());

    match verifier.check_by_id(quest_id, wallet).await? {
        VerifyOutcome::Verified => println!("✓ {} verified for {}", quest_id, wallet),
        VerifyOutcome::NotFound => {
            println!("✗ {} not found on-chain for {} yet", quest_id, wallet)
        }
        VerifyOutcome::UpstreamUnavailable(reason) => {
            println!("! Could not reach the block explorer: {}", reason)
        }
    }
    Ok(())
}

async fn cmd_claim(cli: &Cli, config: &KronosConfig, quest_id: &str) -> Result<()> {
    let session = resolve_session(cli, config).await?;
    let ledger = Arc::new(open_ledger(cli, config)?);
    let verifier = QuestVerifier::new(chain_data(config)?, QuestCatalog::sepolia());
    let disburser = RewardDisburser::from_config(config)?;
    let runner = QuestRunner::new(verifier, disburser, ledger);

    println!("Verifying {}...", quest_id);
    let record = runner.run(&session, quest_id).await?;

    let marker = match record.status {
        QuestStatus::Complete => "✓",
        QuestStatus::Error => "✗",
        _ => "…",
    };
    println!("{} {}", marker, record.message);
    if let Some(hash) = &record.transaction_hash {
        println!("  Transaction: {}", hash);
    }
    Ok(())
}

// ============================================================================
// Advisor
// ============================================================================

async fn cmd_chat(cli: &Cli, config: &KronosConfig, message: Option<&str>) -> Result<()> {
    let session = resolve_session(cli, config).await?;
    let wallet = session.require_address()?.to_string();
    let advisor = AiAdvisor::from_config(chain_data(config)?, config)?;
    let mut conversation = Conversation::new();

    if let Some(text) = message {
        conversation.push(ChatMessage::user(text));
        println!("{}", advisor.respond(conversation.messages(), &wallet).await);
        return Ok(());
    }

    println!("KRONOS: Hi! Ask me anything about your wallet {}.", wallet);
    println!("        (type 'exit' to leave)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| anyhow!("Failed to read input: {}", e))?
        else {
            break;
        };

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if matches!(text, "exit" | "quit") {
            break;
        }

        conversation.push(ChatMessage::user(text));
        let reply = advisor.respond(conversation.messages(), &wallet).await;
        println!("KRONOS: {}", reply);
        conversation.push(ChatMessage::assistant(reply));
    }

    info!("Chat ended after {} messages", conversation.len());
    Ok(())
}

// ============================================================================
// Reward Ledger
// ============================================================================

fn cmd_reward_stats(db: &RewardDb, decimals: u8) -> Result<()> {
    let stats = db.stats()?;

    println!("=== KRONOS Reward Ledger Stats ===");
    println!("Database: {}", db.path().display());
    println!();
    println!("Rewards:  {} total", stats.total_rewards);
    println!("  {:12} {}", "sent", stats.sent);
    println!("  {:12} {}", "pending", stats.pending);
    println!("Paid out: {} tokens", format_units(stats.sent_minor_units, decimals));

    Ok(())
}

fn cmd_reward_list(db: &RewardDb, status_filter: Option<&str>, decimals: u8) -> Result<()> {
    let filter = status_filter.map(parse_status).transpose()?;
    let rewards = db.list_rewards(filter.as_ref())?;

    if rewards.is_empty() {
        println!("No rewards found.");
        return Ok(());
    }

    println!(
        "{:<12}  {:<42}  {:<10}  {:<8}  {:<22}  {}",
        "QUEST", "WALLET", "AMOUNT", "STATUS", "CREATED AT", "TX"
    );
    println!("{}", "-".repeat(120));

    for reward in &rewards {
        println!(
            "{:<12}  {:<42}  {:<10}  {:<8}  {:<22}  {}",
            reward.quest_id,
            reward.wallet,
            format_units(reward.amount_minor_units, decimals),
            format!("{:?}", reward.status),
            format_timestamp(reward.created_at),
            reward.transaction_hash.as_deref().unwrap_or("-")
        );
    }

    println!("\nTotal: {} rewards", rewards.len());
    Ok(())
}

fn cmd_reward_export(db: &RewardDb) -> Result<()> {
    let rewards = db.list_rewards(None)?;
    let stats = db.stats()?;

    let export = serde_json::json!({
        "exported_at": Utc::now().to_rfc3339(),
        "stats": stats,
        "rewards": rewards,
    });

    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}

fn cmd_clear_pending(db: &RewardDb, quest_id: &str, wallet: &str) -> Result<()> {
    if db.clear_pending(quest_id, wallet)? {
        println!("Cleared pending claim for {} / {}", quest_id, wallet);
    } else {
        println!("No pending claim for {} / {} (sent rewards are never cleared)", quest_id, wallet);
    }
    Ok(())
}
