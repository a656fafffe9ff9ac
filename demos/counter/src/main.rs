//! Counter terminal front end
//!
//! Reads one command per line from stdin and prints the count after each.
//! Type `help` for the accepted commands.
//!
//! # Running
//!
//! ```bash
//! TALLY_INITIAL_COUNT=3 TALLY_METRICS_ADDR=127.0.0.1:9000 cargo run -p counter
//! ```
//!
//! With `TALLY_METRICS_ADDR` set, metrics are served at `http://<addr>/metrics`.

use counter::command::{self, Command};
use counter::config::CounterConfig;
use counter::{CounterAction, CounterEnvironment, CounterReducer, CounterState, CounterStore};
use tally_core::action::NamedAction;
use tally_runtime::metrics::MetricsServer;
use tally_runtime::Store;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "counter=info,tally_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = CounterConfig::from_env()?;
    tracing::info!(?config, "Starting counter");

    let _metrics = match config.metrics_addr {
        Some(addr) => {
            let mut server = MetricsServer::new(addr);
            server.start()?;
            Some(server)
        },
        None => None,
    };

    let store: CounterStore = Store::with_config(
        CounterState::new(config.initial_count),
        CounterReducer,
        CounterEnvironment,
        config.store.clone(),
    );

    let mut updates = store.subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let count = updates.borrow_and_update().count;
            tracing::debug!(count, "State committed");
        }
    });

    println!("count = {}", store.state(|s| s.count).await);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match command::parse(&line) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => {
                if !execute(&store, command).await {
                    continue;
                }
            },
            Ok(None) => continue,
            Err(e) => {
                eprintln!("error: {e}");
                continue;
            },
        }
        println!("count = {}", store.state(|s| s.count).await);
    }

    store
        .shutdown(config.store.default_shutdown_timeout)
        .await?;
    tracing::info!(commits = store.commits().await, "Counter stopped");

    Ok(())
}

/// Run one command; returns whether the count should be printed afterwards
async fn execute(store: &CounterStore, command: Command) -> bool {
    let result = match command {
        Command::Dispatch(envelope) => store.dispatch_envelope(&envelope).await,
        Command::MultiplyByLast => counter::multiply_by_last(store).await,
        Command::History => {
            let snapshots = store.history().await;
            println!(
                "{} of {} commits kept (capacity {})",
                snapshots.len(),
                store.commits().await,
                store.config().history_capacity
            );
            for snapshot in snapshots {
                println!(
                    "#{:<4} {} {:<16} count = {}",
                    snapshot.sequence,
                    snapshot.recorded_at.format("%H:%M:%S%.3f"),
                    snapshot.action,
                    snapshot.state.count
                );
            }
            return false;
        },
        Command::Help => {
            println!("{}", command::help(CounterAction::known_names()));
            return false;
        },
        Command::Quit => return false,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
    }
    true
}
