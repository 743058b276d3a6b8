use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use paycycle::application::consumer::ConsumerPool;
use paycycle::application::engine::FinanceEngine;
use paycycle::application::publisher::OutboundPublisher;
use paycycle::config::Settings;
use paycycle::domain::clock::Clock;
use paycycle::domain::ledger::{DEFAULT_PAGE_SIZE, NewManualExpense};
use paycycle::domain::ports::{MessageSource, StoreRef};
use paycycle::infrastructure::bus::{InMemoryBus, LoggingSink};
use paycycle::infrastructure::in_memory::InMemoryStore;
#[cfg(feature = "storage-rocksdb")]
use paycycle::infrastructure::rocksdb::RocksDBStore;
use paycycle::interfaces::csv::report_writer::ReportWriter;
use paycycle::interfaces::jsonl::event_log_reader::EventLogReader;
use paycycle::observability::init_logging;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Feed a JSON-lines event log through the consumers, then print statuses
    Replay { events: PathBuf },
    /// Run the periodic reset check until interrupted. Inbound events are
    /// only consumed through `replay`; no external broker is attached.
    Serve,
    /// List payment statuses
    Status,
    /// List positions
    Positions,
    /// Add a position
    PositionAdd {
        name: String,
        base_salary: Decimal,
        #[arg(long)]
        description: Option<String>,
    },
    /// Change a position's salary or description
    PositionUpdate {
        name: String,
        #[arg(long)]
        base_salary: Option<Decimal>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a position
    PositionDelete { name: String },
    /// Confirm payment for an employee
    Pay { employee_id: String },
    /// Dismiss an employee
    Dismiss { employee_id: String },
    /// Show the payment cycle configuration
    Cycle,
    /// Change the reset day (1-31)
    SetResetDay { day: u32 },
    /// Reset paid statuses if the reset day has come
    CheckReset,
    /// Reset paid statuses now
    Reset,
    /// Record a manual expense
    ExpenseAdd {
        category: String,
        value: Decimal,
        #[arg(long)]
        responsible: String,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a manual expense and its ledger row
    ExpenseDelete { id: u64 },
    /// List manual expenses, newest first
    Expenses,
    /// List ledger rows, newest first
    Ledger {
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
}

fn open_store(settings: &Settings) -> Result<StoreRef> {
    match &settings.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            info!(path = %path.display(), "Opened persistent store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(path) => {
            tracing::warn!(
                path = %path.display(),
                "Built without storage-rocksdb, falling back to in-memory storage"
            );
            Ok(Arc::new(InMemoryStore::new()))
        }
        None => Ok(Arc::new(InMemoryStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings;
    init_logging(settings.log_format);

    let store = open_store(&settings)?;
    let clock = settings.clock();
    let publisher = Arc::new(OutboundPublisher::start(
        Arc::new(LoggingSink),
        settings.publish_policy(),
    ));
    let engine = FinanceEngine::new(store, Arc::clone(&clock), publisher);

    // Reset commands run and report the check themselves.
    let check_reset = !matches!(cli.command, Command::CheckReset | Command::Reset);
    if settings.demo_seed {
        let mut rng = StdRng::from_entropy();
        engine
            .start_up(check_reset, Some(&mut rng))
            .await
            .into_diagnostic()?;
    } else {
        engine
            .start_up::<StdRng>(check_reset, None)
            .await
            .into_diagnostic()?;
    }

    let result = run(cli.command, &engine, &settings, clock.as_ref()).await;
    engine.shutdown().await;
    result
}

async fn run(
    command: Command,
    engine: &FinanceEngine,
    settings: &Settings,
    clock: &dyn Clock,
) -> Result<()> {
    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());

    match command {
        Command::Replay { events } => {
            let file = File::open(events).into_diagnostic()?;
            let bus = Arc::new(InMemoryBus::new(settings.max_redeliveries));
            let pool = start_consumers(engine, &bus, settings);

            for event in EventLogReader::new(BufReader::new(file)).events() {
                match event.and_then(|e| Ok((e.body()?, e.queue))) {
                    Ok((body, queue)) => bus.publish(&queue, body),
                    Err(e) => error!(error = %e, "Error reading event log"),
                }
            }
            bus.close();

            for (kind, stats) in pool.join().await {
                info!(
                    subject = kind.subject(),
                    applied = stats.applied,
                    dropped = stats.dropped,
                    requeued = stats.requeued,
                    "Replay finished"
                );
            }
            let statuses = engine.statuses().await.into_diagnostic()?;
            writer.write_statuses(&statuses).into_diagnostic()?;
        }
        Command::Serve => {
            let (stop, stopped) = watch::channel(false);
            let ticker = engine
                .scheduler()
                .spawn_periodic(settings.reset_check_interval(), stopped);

            info!("Running periodic reset checks; press Ctrl-C to stop");
            tokio::signal::ctrl_c().await.into_diagnostic()?;
            info!("Shutting down");

            let _ = stop.send(true);
            if let Err(e) = ticker.await {
                error!(error = %e, "Scheduler task failed");
            }
        }
        Command::Status => {
            let statuses = engine.statuses().await.into_diagnostic()?;
            writer.write_statuses(&statuses).into_diagnostic()?;
        }
        Command::Positions => {
            let positions = engine.positions().list().await.into_diagnostic()?;
            writer.write_positions(&positions).into_diagnostic()?;
        }
        Command::PositionAdd {
            name,
            base_salary,
            description,
        } => {
            let position = engine
                .positions()
                .create(&name, description, base_salary)
                .await
                .into_diagnostic()?;
            writer.write_positions(&[position]).into_diagnostic()?;
        }
        Command::PositionUpdate {
            name,
            base_salary,
            description,
        } => {
            let position = engine
                .positions()
                .update(&name, base_salary, description)
                .await
                .into_diagnostic()?;
            writer.write_positions(&[position]).into_diagnostic()?;
        }
        Command::PositionDelete { name } => {
            engine.positions().delete(&name).await.into_diagnostic()?;
            let positions = engine.positions().list().await.into_diagnostic()?;
            writer.write_positions(&positions).into_diagnostic()?;
        }
        Command::Pay { employee_id } => {
            let confirmation = engine.confirm_payment(&employee_id).await.into_diagnostic()?;
            writer.write_payment(&confirmation).into_diagnostic()?;
        }
        Command::Dismiss { employee_id } => {
            let status = engine.dismiss_employee(&employee_id).await.into_diagnostic()?;
            writer.write_statuses(&[status]).into_diagnostic()?;
        }
        Command::Cycle => {
            let config = engine.get_or_create_cycle_config().await.into_diagnostic()?;
            let next = engine.next_reset_date().await.into_diagnostic()?;
            writer.write_cycle(&config, next).into_diagnostic()?;
        }
        Command::SetResetDay { day } => {
            let config = engine.update_cycle_config(day).await.into_diagnostic()?;
            let next = engine.next_reset_date().await.into_diagnostic()?;
            writer.write_cycle(&config, next).into_diagnostic()?;
        }
        Command::CheckReset => {
            let outcome = engine.check_and_auto_reset().await.into_diagnostic()?;
            writer.write_reset(&outcome).into_diagnostic()?;
        }
        Command::Reset => {
            let outcome = engine.manual_reset().await.into_diagnostic()?;
            writer.write_reset(&outcome).into_diagnostic()?;
        }
        Command::ExpenseAdd {
            category,
            value,
            responsible,
            date,
            description,
        } => {
            let date = date.unwrap_or_else(|| clock.today());
            let expense = NewManualExpense::new(date, category, description, value, responsible)
                .into_diagnostic()?;
            let (expense, _) = engine.create_manual_expense(expense).await.into_diagnostic()?;
            writer.write_expenses(&[expense]).into_diagnostic()?;
        }
        Command::ExpenseDelete { id } => {
            let expense = engine.delete_manual_expense(id).await.into_diagnostic()?;
            writer.write_expenses(&[expense]).into_diagnostic()?;
        }
        Command::Expenses => {
            let expenses = engine.manual_expenses().await.into_diagnostic()?;
            writer.write_expenses(&expenses).into_diagnostic()?;
        }
        Command::Ledger { limit, offset } => {
            let entries = engine.list_ledger(limit, offset).await.into_diagnostic()?;
            writer.write_ledger(&entries).into_diagnostic()?;
        }
    }
    Ok(())
}

fn start_consumers(engine: &FinanceEngine, bus: &Arc<InMemoryBus>, settings: &Settings) -> ConsumerPool {
    let bindings = settings
        .queue_bindings()
        .into_iter()
        .map(|(kind, queue)| {
            let source: Arc<dyn MessageSource> = Arc::new(bus.consumer(&queue));
            (kind, source)
        })
        .collect();
    ConsumerPool::start(engine.ingestor(), bindings)
}
