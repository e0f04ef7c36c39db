//! Tidings simulator - drives a broker with synthetic sessions and entity
//! traffic, then reports what was delivered.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tidings_broker::{sweep_task, AffinityKey, Broker, BrokerArgs};
use tidings_proto::{FieldValue, Manipulation, Message, Origin, Payload, Record, ViewParams, ViewType};

const ENTITY: &str = "Order";
const NEWS: &str = "news";
const STATUSES: [&str; 3] = ["open", "pending", "closed"];

/// Tidings broker simulator.
#[derive(Parser, Debug)]
#[command(name = "tidings-sim")]
#[command(about = "Simulate sessions polling a tidings broker")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    broker: BrokerArgs,

    /// Number of client sessions.
    #[arg(long, default_value_t = 4)]
    sessions: usize,

    /// Number of entity updates to publish.
    #[arg(long, default_value_t = 200)]
    publishes: usize,

    /// Milliseconds between publishes.
    #[arg(long, default_value_t = 5)]
    publish_interval_ms: u64,

    /// Milliseconds between polls of each session.
    #[arg(long, default_value_t = 20)]
    poll_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tidings_broker=info,tidings_sim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.broker.clone().into_config();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        retention_secs = config.retention.as_secs(),
        sweep_interval = ?config.sweep_interval,
        sessions = cli.sessions,
        publishes = cli.publishes,
        "starting tidings simulator"
    );

    let broker = Arc::new(Broker::new(config)?);

    if let Some(interval) = broker.config().sweep_interval {
        tokio::spawn(sweep_task(broker.clone(), interval));
    }

    // Ctrl+C stops everything early
    let signal_broker = broker.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            return;
        }
        tracing::info!("received shutdown signal");
        signal_broker.shutdown();
    });

    let poll_interval = Duration::from_millis(cli.poll_interval_ms);
    let mut workers = Vec::with_capacity(cli.sessions);
    for index in 0..cli.sessions {
        let broker = broker.clone();
        workers.push(tokio::task::spawn_blocking(move || {
            run_session(&broker, index, poll_interval)
        }));
    }

    let publisher = {
        let broker = broker.clone();
        let publishes = cli.publishes;
        let interval = Duration::from_millis(cli.publish_interval_ms);
        tokio::task::spawn_blocking(move || run_publisher(&broker, publishes, interval))
    };
    let published = publisher.await?;

    // Let the sessions drain what is left before stopping them
    tokio::time::sleep(poll_interval * 3).await;
    broker.shutdown();

    for (index, worker) in workers.into_iter().enumerate() {
        let received = worker.await?;
        tracing::info!(session = index, received, "session finished");
    }

    let snapshot = serde_json::to_string(&broker.metrics().snapshot())?;
    tracing::info!(published, metrics = %snapshot, "simulation complete");

    Ok(())
}

/// Open a view on the entity channel and poll until the broker stops.
///
/// Even sessions watch only open orders; odd sessions watch everything.
fn run_session(broker: &Broker, index: usize, poll_interval: Duration) -> usize {
    let affinity = AffinityKey::new(format!("worker-{}", index));

    let mut view = ViewParams::new(format!("grid-{}", index)).with_view_type(ViewType::Grid);
    if index % 2 == 0 {
        view = view.with_search("status=open");
    }
    broker.limit_subscriber(ENTITY, &affinity, &view);
    broker.subscribe(NEWS, &affinity);

    let mut received = 0;
    while !broker.is_shut_down() {
        for payload in broker.poll(&affinity) {
            received += payload.manipulations.len() + payload.messages.len();
            tracing::debug!(
                session = index,
                channel = payload.channel().unwrap_or_default(),
                timestamp = payload.timestamp,
                "payload received"
            );
        }
        std::thread::sleep(poll_interval);
    }
    received
}

/// Publish random order status changes with the occasional news message.
fn run_publisher(broker: &Broker, publishes: usize, interval: Duration) -> usize {
    let mut rng = rand::thread_rng();
    let mut published = 0;

    for n in 0..publishes {
        if broker.is_shut_down() {
            break;
        }

        let status = STATUSES[rng.gen_range(0..STATUSES.len())];
        let order_id = rng.gen_range(1..=50i64);
        let record = Record::new()
            .with_field("id", FieldValue::new(order_id))
            .with_field("status", FieldValue::new(status));
        let manipulation = if rng.gen_bool(0.1) {
            Manipulation::delete(ENTITY, order_id)
        } else {
            Manipulation::update(ENTITY, order_id).with_record(record)
        };

        broker.publish(
            ENTITY,
            Payload::new(Origin::persistence("simulator")).with_manipulation(manipulation),
        );
        published += 1;

        if n % 25 == 0 {
            broker.publish(
                NEWS,
                Payload::new(Origin::system()).with_message(Message::info(format!("batch {}", n / 25))),
            );
            published += 1;
        }

        std::thread::sleep(interval);
    }
    published
}
