use anyhow::{anyhow, Result};
use std::env;
use tracing_subscriber::EnvFilter;

use yape_listener::{
    load_notifications, CategoryClassifier, Category, ListenerConfig, ListenerOutcome,
    NotificationListener, ServiceSettings, SqliteSink, TransactionParser,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let config = ListenerConfig::from_env()?;

    match args.get(1).map(String::as_str) {
        Some("parse") => run_parse(&config, &args[2..])?,
        Some("ingest") => run_ingest(&config, args.get(2))?,
        Some("list") => run_list(&config, args.get(2))?,
        Some("stats") => run_stats(&config)?,
        Some("enable") => run_toggle(&config, true)?,
        Some("disable") => run_toggle(&config, false)?,
        Some("status") => run_status(&config)?,
        _ => print_usage(),
    }

    Ok(())
}

fn print_usage() {
    println!("yape-listener {}", yape_listener::VERSION);
    println!();
    println!("Usage:");
    println!("  yape-listener parse <message...>   Parse one notification text, print JSON");
    println!("  yape-listener ingest <file.csv>    Replay notifications into the database");
    println!("  yape-listener list [CATEGORY]      Show stored transactions");
    println!("  yape-listener stats                Totals per category");
    println!("  yape-listener enable | disable     Turn capture on/off");
    println!("  yape-listener status               Show capture settings");
}

fn build_parser(config: &ListenerConfig) -> Result<TransactionParser> {
    match &config.rules_path {
        Some(path) => Ok(TransactionParser::with_classifier(CategoryClassifier::from_file(path)?)),
        None => Ok(TransactionParser::new()),
    }
}

fn run_parse(config: &ListenerConfig, words: &[String]) -> Result<()> {
    if words.is_empty() {
        return Err(anyhow!("parse needs a message, e.g. parse \"Recibiste de Ana por S/ 10\""));
    }

    let message = words.join(" ");
    let settings = ServiceSettings::load_or_init(&config.settings_path)?;
    let parser = build_parser(config)?;

    let id = uuid::Uuid::new_v4().to_string();
    let timestamp = chrono::Utc::now().timestamp_millis();
    let record = parser.parse(&message, &id, timestamp, &settings.effective_device_id(config));

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn run_ingest(config: &ListenerConfig, csv_path: Option<&String>) -> Result<()> {
    let csv_path = csv_path.ok_or_else(|| anyhow!("ingest needs a CSV file path"))?;

    println!("📂 Loading notifications from {}...", csv_path);
    let events = load_notifications(std::path::Path::new(csv_path))?;
    println!("✓ Loaded {} notifications", events.len());

    let settings = ServiceSettings::load_or_init(&config.settings_path)?;
    let sink = SqliteSink::open(&config.db_path)?;
    let listener = NotificationListener::new(sink, &settings.effective_device_id(config))
        .with_source_package(&config.source_package)
        .with_parser(build_parser(config)?);

    let outcomes = listener.replay(&events, settings.service_enabled);

    let mut delivered = 0;
    let mut ignored = 0;
    let mut failed = 0;
    let mut paused = 0;
    for outcome in &outcomes {
        match outcome {
            ListenerOutcome::Delivered { .. } => delivered += 1,
            ListenerOutcome::Ignored { .. } => ignored += 1,
            ListenerOutcome::SinkFailed { .. } => failed += 1,
            ListenerOutcome::Paused => paused += 1,
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Delivered: {}", delivered);
    println!("✓ Ignored (other apps): {}", ignored);
    if paused > 0 {
        println!("⏸️  Paused: {} (run `yape-listener enable`)", paused);
    }
    if failed > 0 {
        println!("❌ Failed: {}", failed);
    }
    println!("✓ Database contains {} transactions", listener.sink().count()?);

    Ok(())
}

fn run_list(config: &ListenerConfig, category: Option<&String>) -> Result<()> {
    let sink = SqliteSink::open(&config.db_path)?;

    let records = match category {
        Some(code) => {
            let category = Category::from_code(code)
                .ok_or_else(|| anyhow!("Unknown category: {}", code))?;
            sink.records_by_category(category)?
        }
        None => sink.all_records()?,
    };

    for stored in &records {
        let tx = &stored.record;
        println!(
            "{}  {:<10}  S/ {:>10}  {}",
            tx.formatted_date, tx.category, tx.amount, tx.counterparty
        );
    }
    println!("\n{} transactions", records.len());

    Ok(())
}

fn run_stats(config: &ListenerConfig) -> Result<()> {
    let sink = SqliteSink::open(&config.db_path)?;

    println!("📊 Totals by category");
    for total in sink.category_totals()? {
        println!(
            "  {:<10} {:>5} tx   S/ {:>12.2}",
            total.category, total.count, total.total
        );
    }

    Ok(())
}

fn run_toggle(config: &ListenerConfig, enabled: bool) -> Result<()> {
    let mut settings = ServiceSettings::load_or_init(&config.settings_path)?;
    settings.set_enabled(enabled, &config.settings_path)?;

    if enabled {
        println!("✅ Captura activada");
    } else {
        println!("⏸️  Captura pausada");
    }

    Ok(())
}

fn run_status(config: &ListenerConfig) -> Result<()> {
    let settings = ServiceSettings::load_or_init(&config.settings_path)?;

    println!("Service enabled: {}", settings.service_enabled);
    println!("Device id:       {}", settings.effective_device_id(config));
    println!("Source package:  {}", config.source_package);
    println!("Database:        {}", config.db_path.display());

    Ok(())
}
