use color_eyre::{eyre::eyre, Result};
use sbconsole::broker::{EntityAddress, MemoryBroker, OutgoingMessage};
use sbconsole::connection::MemoryCredentialStore;
use sbconsole::persistence::config_portal::ConfigPortal;
use sbconsole::persistence::ConsoleConfig;
use sbconsole::presenter::{ChannelExecutor, TracingErrorHandler};
use sbconsole::ServiceBusConsole;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEMO_CONNECTIONS: [(&str, &str); 2] = [
    (
        "prod",
        "Endpoint=sb://prod.demo.local/;SharedAccessKeyName=RootManageSharedAccessKey;SharedAccessKey=demo",
    ),
    (
        "dev",
        "Endpoint=sb://dev.demo.local/;SharedAccessKeyName=RootManageSharedAccessKey;SharedAccessKey=demo",
    ),
];

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let portal = Arc::new(ConfigPortal::load(ConsoleConfig::default_path()).await?);
    let broker = Arc::new(seed_broker()?);
    let credentials = Arc::new(MemoryCredentialStore::default());
    for (name, secret) in DEMO_CONNECTIONS {
        credentials.insert(name, secret);
    }

    let (ui, ui_loop) = ChannelExecutor::new();
    let ui_handle = tokio::spawn(ui_loop.run());

    let console = ServiceBusConsole::new(
        broker.clone(),
        credentials,
        Arc::new(ui),
        Arc::new(TracingErrorHandler),
        portal,
    );

    let restored = console.restore_connections().await;
    for (name, secret) in DEMO_CONNECTIONS {
        if !restored.iter().any(|r| r == name) {
            console.add_connection(name, secret).await?;
        }
    }

    // dev goes down before the overview is built
    broker.namespace("dev.demo.local").set_unavailable(true);

    let summary = console.get_dead_letters().await;
    for group in summary.groups() {
        info!("{}: {} dead-letter entries", group.key, group.items.len());
        for item in &group.items {
            info!("  {} -> {}", item.display_name(), item.count);
        }
    }
    for (connection, error) in &summary.failures {
        warn!("{} could not be read: {}", connection, error);
    }

    let messages = console
        .peek_dead_letter("prod", "orders", None, 10, None)
        .await?;
    for message in &messages {
        info!("{}", message.render());
    }

    drop(console);
    ui_handle
        .await
        .map_err(|e| eyre!("UI loop failed: {}", e))?;
    Ok(())
}

fn seed_broker() -> Result<MemoryBroker> {
    let broker = MemoryBroker::new();
    let prod = broker.namespace("prod.demo.local");
    prod.add_queue("orders");
    prod.add_queue("payments");
    prod.add_topic("billing", &["invoices", "audit"]);

    for i in 0..3 {
        let message = OutgoingMessage::new(format!("{{\"order\":{}}}", i))
            .with_property("content-type", "application/json");
        for seq in prod.publish("orders", message)? {
            prod.dead_letter(&EntityAddress::Queue("orders".into()), seq)?;
        }
    }
    let invoices = EntityAddress::Subscription {
        topic: "billing".into(),
        subscription: "invoices".into(),
    };
    for i in 0..2 {
        // both subscriptions number their copies alike
        let seqs = prod.publish("billing", OutgoingMessage::new(format!("invoice {}", i)))?;
        if let Some(&seq) = seqs.first() {
            prod.dead_letter(&invoices, seq)?;
        }
    }

    broker.namespace("dev.demo.local").add_queue("scratch");
    Ok(broker)
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
