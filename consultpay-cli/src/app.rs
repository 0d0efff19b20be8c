use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use consultpay_config::{AppConfig, NotificationConfig};
use consultpay_core::{AccountId, BookingId, ConsultantId, PayoutId, TransactionId};
use consultpay_events::EventBus;
use consultpay_ledger::{
    SqliteStore, StoreOptions, TransactionKind, TransactionQuery, TransactionStatus,
};
use consultpay_settlement::{
    BalanceAggregator, BookingLifecycle, CommissionAdmin, DispatchStats, LogNotifier,
    NotificationDispatcher, Notifier, PayoutRecorder, PayoutRequest, SettlementEngine,
    SettlementOutcome, Store, WalletService, WebhookNotifier,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::telemetry;

#[derive(Parser)]
#[command(author, version, about = "Consultpay commission and payout ledger")]
pub struct Cli {
    /// Extra configuration file layered over config/default.toml and config/{env}.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Configuration profile
    #[arg(long, global = true, default_value = "dev")]
    env: String,
    /// Override database.path
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the database and seed platform commission defaults
    Init,
    /// Print the effective configuration
    Config,
    /// Platform-wide commission defaults
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Consultant catalog, commission and payout summaries
    #[command(subcommand)]
    Consultant(ConsultantCommand),
    /// Users and their wallets
    #[command(subcommand)]
    User(UserCommand),
    /// Ledger rows
    #[command(subcommand)]
    Txn(TxnCommand),
    /// Booking lifecycle and settlement
    #[command(subcommand)]
    Booking(BookingCommand),
    /// Off-platform consultant payouts
    #[command(subcommand)]
    Payout(PayoutCommand),
    /// Net platform commission across all settled bookings
    Revenue,
    /// Compare wallet caches with ledger replays and report integrity warnings
    Verify,
    /// Recompute every wallet cache from the ledger
    RebuildWallets,
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    Show,
    SetDefaults {
        #[arg(long)]
        consultant_pct: Decimal,
        #[arg(long)]
        user_pct: Decimal,
    },
}

#[derive(Subcommand)]
pub enum ConsultantCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        /// Hourly session price
        #[arg(long)]
        price: Decimal,
        #[command(flatten)]
        rates: RateArgs,
    },
    List,
    /// Replace both overrides. Omitted rates fall back to the platform default.
    SetCommission {
        id: i64,
        #[command(flatten)]
        rates: RateArgs,
    },
    SetPrice {
        id: i64,
        price: Decimal,
    },
    /// Earned, paid and outstanding totals derived from the ledger
    Summary { id: i64 },
    /// Preview what one session would settle to under the current rates
    Quote { id: i64 },
}

#[derive(Args)]
pub struct RateArgs {
    /// Percent withheld from the consultant
    #[arg(long)]
    consultant_pct: Option<Decimal>,
    /// Percent charged to the user on top of the price
    #[arg(long)]
    user_pct: Option<Decimal>,
}

#[derive(Subcommand)]
pub enum UserCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Credit a wallet; --pending waits for a gateway callback
    TopUp {
        account: i64,
        amount: Decimal,
        #[arg(long)]
        pending: bool,
    },
    /// Record a subscription or chat credit
    Credit {
        account: i64,
        #[arg(value_enum)]
        kind: CreditKind,
        amount: Decimal,
        #[arg(long)]
        description: Option<String>,
    },
    Balance { account: i64 },
}

#[derive(Subcommand)]
pub enum TxnCommand {
    /// Apply a payment gateway callback to a pending row
    Resolve {
        id: i64,
        #[arg(value_enum)]
        status: Resolution,
    },
    /// Append an offsetting row for a wallet movement
    Reverse {
        id: i64,
        #[arg(long)]
        reason: String,
    },
    List {
        #[arg(long)]
        account: Option<i64>,
        #[arg(long)]
        consultant: Option<i64>,
        #[arg(long)]
        booking: Option<i64>,
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
        #[arg(long)]
        limit: Option<usize>,
        /// Newest first
        #[arg(long)]
        desc: bool,
    },
}

#[derive(Subcommand)]
pub enum BookingCommand {
    Create {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        consultant: i64,
    },
    Confirm { id: i64 },
    /// Mark the call finished without settling
    MarkCompleted { id: i64 },
    /// Call finished: settle the booking (idempotent)
    Complete { id: i64 },
    Cancel { id: i64 },
    Reject { id: i64 },
    Show { id: i64 },
}

#[derive(Subcommand)]
pub enum PayoutCommand {
    Record {
        consultant: i64,
        amount: Decimal,
        #[arg(long)]
        notes: Option<String>,
        /// Reject the payout if outstanding moved away from this value
        #[arg(long)]
        expect_outstanding: Option<Decimal>,
    },
    List { consultant: i64 },
    /// Replace the notes on a payout; omit --notes to clear them
    Notes {
        id: i64,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CreditKind {
    Subscription,
    ChatCredit,
}

impl From<CreditKind> for TransactionKind {
    fn from(value: CreditKind) -> Self {
        match value {
            CreditKind::Subscription => TransactionKind::Subscription,
            CreditKind::ChatCredit => TransactionKind::ChatCredit,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Resolution {
    Success,
    Failed,
}

impl From<Resolution> for TransactionStatus {
    fn from(value: Resolution) -> Self {
        match value {
            Resolution::Success => TransactionStatus::Success,
            Resolution::Failed => TransactionStatus::Failed,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum KindArg {
    Credit,
    Debit,
    Earning,
    Commission,
    Subscription,
    ChatCredit,
}

impl From<KindArg> for TransactionKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Credit => TransactionKind::Credit,
            KindArg::Debit => TransactionKind::Debit,
            KindArg::Earning => TransactionKind::Earning,
            KindArg::Commission => TransactionKind::Commission,
            KindArg::Subscription => TransactionKind::Subscription,
            KindArg::ChatCredit => TransactionKind::ChatCredit,
        }
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(&cli.env, cli.config.as_deref())?;
    if let Some(path) = cli.database {
        config.database.path = path;
    }
    let _telemetry = telemetry::init(&config.logging, cli.verbose)?;

    if let Command::Config = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let services = Services::open(&config)?;
    let dispatcher = spawn_dispatcher(&config.notifications, &services.bus)?;
    let result = execute(cli.command, &services, &config);
    // every publisher must go before the dispatcher can observe a closed bus
    drop(services);
    if let Some(handle) = dispatcher {
        drain(handle, config.notifications.drain_timeout()).await;
    }
    result
}

struct Services {
    bus: EventBus,
    engine: SettlementEngine,
    balances: BalanceAggregator,
    payouts: PayoutRecorder,
    admin: CommissionAdmin,
    wallets: WalletService,
    bookings: BookingLifecycle,
}

impl Services {
    fn open(config: &AppConfig) -> Result<Self> {
        let options = StoreOptions {
            platform_account: config.platform.account(),
            busy_timeout: config.database.busy_timeout(),
        };
        let store = SqliteStore::open(&config.database.path, options).with_context(|| {
            format!(
                "failed to open ledger database {}",
                config.database.path.display()
            )
        })?;
        debug!(path = %store.path().display(), "ledger database opened");
        let store: Arc<dyn Store> = Arc::new(store);
        let bus = EventBus::default();
        Ok(Self {
            engine: SettlementEngine::new(store.clone(), bus.clone()),
            balances: BalanceAggregator::new(store.clone(), bus.clone()),
            payouts: PayoutRecorder::new(store.clone(), bus.clone()),
            admin: CommissionAdmin::new(store.clone()),
            wallets: WalletService::new(store.clone()),
            bookings: BookingLifecycle::new(store),
            bus,
        })
    }
}

fn spawn_dispatcher(
    config: &NotificationConfig,
    bus: &EventBus,
) -> Result<Option<JoinHandle<DispatchStats>>> {
    if !config.enabled {
        return Ok(None);
    }
    let notifier: Arc<dyn Notifier> = match config.webhook() {
        Some(url) => Arc::new(
            WebhookNotifier::new(url, config.timeout())
                .context("failed to build notification client")?,
        ),
        None => Arc::new(LogNotifier),
    };
    Ok(Some(
        NotificationDispatcher::new(notifier).spawn(bus.subscribe()),
    ))
}

async fn drain(handle: JoinHandle<DispatchStats>, limit: Duration) {
    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(stats)) => debug!(
            delivered = stats.delivered,
            failed = stats.failed,
            skipped = stats.skipped,
            "notification dispatcher drained"
        ),
        Ok(Err(err)) => warn!(error = %err, "notification dispatcher crashed"),
        Err(_) => warn!(?limit, "gave up waiting for queued notifications"),
    }
}

fn execute(command: Command, services: &Services, config: &AppConfig) -> Result<()> {
    match command {
        Command::Init => {
            let settings = services.admin.seed_global_defaults(
                config.commission.default_consultant_pct,
                config.commission.default_user_pct,
            )?;
            info!(path = %config.database.path.display(), "ledger initialised");
            emit(&json!({
                "database": config.database.path,
                "platform_account": config.platform.account(),
                "currency": config.platform.currency,
                "settings": settings,
            }))
        }
        Command::Config => Ok(()),
        Command::Settings(cmd) => settings(cmd, services),
        Command::Consultant(cmd) => consultant(cmd, services),
        Command::User(cmd) => user(cmd, services),
        Command::Txn(cmd) => txn(cmd, services),
        Command::Booking(cmd) => booking(cmd, services),
        Command::Payout(cmd) => payout(cmd, services),
        Command::Revenue => emit(&json!({
            "platform_commission": services.balances.platform_commission_total()?,
            "currency": config.platform.currency,
        })),
        Command::Verify => {
            let report = services.balances.verify()?;
            emit(&report)?;
            let warnings = report.warnings();
            if !warnings.is_empty() {
                bail!("ledger verification found {} warning(s)", warnings.len());
            }
            Ok(())
        }
        Command::RebuildWallets => {
            let wallets = services.wallets.rebuild_caches()?;
            info!(count = wallets.len(), "wallet caches rebuilt");
            emit(&wallets)
        }
    }
}

fn settings(cmd: SettingsCommand, services: &Services) -> Result<()> {
    match cmd {
        SettingsCommand::Show => emit(&services.admin.global_defaults()?),
        SettingsCommand::SetDefaults {
            consultant_pct,
            user_pct,
        } => emit(&services.admin.set_global_defaults(consultant_pct, user_pct)?),
    }
}

fn consultant(cmd: ConsultantCommand, services: &Services) -> Result<()> {
    match cmd {
        ConsultantCommand::Add {
            name,
            email,
            price,
            rates,
        } => emit(&services.admin.register_consultant(
            &name,
            email.as_deref(),
            price,
            rates.consultant_pct,
            rates.user_pct,
        )?),
        ConsultantCommand::List => emit(&services.admin.consultants()?),
        ConsultantCommand::SetCommission { id, rates } => emit(&services.admin.set_commission(
            ConsultantId::new(id),
            rates.consultant_pct,
            rates.user_pct,
        )?),
        ConsultantCommand::SetPrice { id, price } => {
            emit(&services.admin.set_hourly_price(ConsultantId::new(id), price)?)
        }
        ConsultantCommand::Summary { id } => emit(
            &services
                .balances
                .consultant_payout_summary(ConsultantId::new(id))?,
        ),
        ConsultantCommand::Quote { id } => {
            let id = ConsultantId::new(id);
            emit(&json!({
                "rates": services.admin.effective_commission(id)?,
                "amounts": services.admin.quote(id)?,
            }))
        }
    }
}

fn user(cmd: UserCommand, services: &Services) -> Result<()> {
    match cmd {
        UserCommand::Add { name, email } => {
            emit(&services.wallets.register_user(&name, email.as_deref())?)
        }
        UserCommand::TopUp {
            account,
            amount,
            pending,
        } => emit(
            &services
                .wallets
                .top_up(AccountId::new(account), amount, pending)?,
        ),
        UserCommand::Credit {
            account,
            kind,
            amount,
            description,
        } => emit(&services.wallets.credit(
            AccountId::new(account),
            kind.into(),
            amount,
            description,
        )?),
        UserCommand::Balance { account } => {
            emit(&services.balances.wallet_check(AccountId::new(account))?)
        }
    }
}

fn txn(cmd: TxnCommand, services: &Services) -> Result<()> {
    match cmd {
        TxnCommand::Resolve { id, status } => emit(
            &services
                .wallets
                .resolve_pending(TransactionId::new(id), status.into())?,
        ),
        TxnCommand::Reverse { id, reason } => {
            emit(&services.wallets.reverse(TransactionId::new(id), &reason)?)
        }
        TxnCommand::List {
            account,
            consultant,
            booking,
            kind,
            limit,
            desc,
        } => {
            let query = TransactionQuery {
                account: account.map(AccountId::new),
                consultant: consultant.map(ConsultantId::new),
                booking: booking.map(BookingId::new),
                kind: kind.map(TransactionKind::from),
                limit,
                descending: desc,
                ..TransactionQuery::default()
            };
            emit(&services.wallets.history(query)?)
        }
    }
}

fn booking(cmd: BookingCommand, services: &Services) -> Result<()> {
    match cmd {
        BookingCommand::Create { user, consultant } => emit(
            &services
                .bookings
                .create(AccountId::new(user), ConsultantId::new(consultant))?,
        ),
        BookingCommand::Confirm { id } => emit(&services.bookings.confirm(BookingId::new(id))?),
        BookingCommand::MarkCompleted { id } => {
            emit(&services.bookings.mark_completed(BookingId::new(id))?)
        }
        BookingCommand::Cancel { id } => emit(&services.bookings.cancel(BookingId::new(id))?),
        BookingCommand::Reject { id } => emit(&services.bookings.reject(BookingId::new(id))?),
        BookingCommand::Show { id } => {
            let id = BookingId::new(id);
            match services.bookings.get(id)? {
                Some(booking) => emit(&booking),
                None => bail!("booking {id} not found"),
            }
        }
        BookingCommand::Complete { id } => {
            let outcome = services.engine.booking_completed(BookingId::new(id))?;
            match outcome {
                SettlementOutcome::Settled {
                    booking,
                    transactions,
                    commission,
                } => emit(&json!({
                    "outcome": "settled",
                    "booking": booking,
                    "rates": commission,
                    "transactions": transactions,
                })),
                SettlementOutcome::AlreadySettled { booking } => emit(&json!({
                    "outcome": "already_settled",
                    "booking": booking,
                })),
            }
        }
    }
}

fn payout(cmd: PayoutCommand, services: &Services) -> Result<()> {
    match cmd {
        PayoutCommand::Record {
            consultant,
            amount,
            notes,
            expect_outstanding,
        } => {
            let mut request = PayoutRequest::new(ConsultantId::new(consultant), amount);
            if let Some(notes) = notes {
                request = request.with_notes(notes);
            }
            if let Some(expected) = expect_outstanding {
                request = request.expecting_outstanding(expected);
            }
            let receipt = services.payouts.record(request)?;
            emit(&json!({
                "payout": receipt.payout,
                "new_outstanding": receipt.new_outstanding,
                "warnings": receipt.warnings,
            }))
        }
        PayoutCommand::List { consultant } => {
            emit(&services.payouts.history(ConsultantId::new(consultant))?)
        }
        PayoutCommand::Notes { id, notes } => {
            emit(&services.payouts.update_notes(PayoutId::new(id), notes)?)
        }
    }
}

fn emit<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}
