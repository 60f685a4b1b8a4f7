//! `scout` - CLI for wireless survey capture and analysis

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::Parser;

use scout::agent;
use scout::cli::{
    Cli, Command, ConfigCommand, IngestCommand, ReportCommand, ScanCommand, SearchCommand,
};
use scout::ingest::{archive_ingested, ingest_file};
use scout::scan::ReplayScanSource;
use scout::tags::AnnotatedObservation;
use scout::{
    init_logging, Config, CounterStore, FileMedium, RecordFile, Reference, ScanMerger, Storage,
    StoredObservation,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    match cli.command {
        Command::Scan(cmd) => handle_scan(&config, &cmd),
        Command::Cleanup => handle_cleanup(&config),
        Command::Ingest(cmd) => handle_ingest(&config, &cmd),
        Command::Report(cmd) => handle_report(&config, &cmd),
        Command::Localities(cmd) => handle_localities(&config, cmd.json),
        Command::Search(cmd) => handle_search(&config, &cmd),
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn counter_store(config: &Config) -> CounterStore<FileMedium> {
    CounterStore::new(FileMedium::new(config.counter_path()))
}

fn open_storage(config: &Config) -> Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("opening database {}", path.display()))
}

fn handle_scan(config: &Config, cmd: &ScanCommand) -> Result<()> {
    let Some(replay) = cmd.replay.clone().or_else(|| config.agent.replay_path.clone()) else {
        bail!("no scan source: pass --replay FILE or set agent.replay_path");
    };
    let passes = cmd.passes.unwrap_or(config.agent.scan_passes);
    if passes == 0 {
        bail!("--passes must be greater than 0");
    }

    let mut source = ReplayScanSource::load(&replay)
        .with_context(|| format!("loading replay {}", replay.display()))?;
    let merger = ScanMerger::new(passes, config.inter_pass_delay());
    let vault = RecordFile::new(config.vault_path());
    let mut counter = counter_store(config);

    let outcome = agent::capture(&merger, &mut source, &mut counter, &vault)?;
    println!(
        "Locality {}: {} networks saved to {} ({} of {} passes failed)",
        outcome.locality_id,
        outcome.written,
        vault.path().display(),
        outcome.passes_failed,
        passes
    );
    Ok(())
}

fn handle_cleanup(config: &Config) -> Result<()> {
    let vault = RecordFile::new(config.vault_path());
    let mut counter = counter_store(config);

    let removed = agent::cleanup(&mut counter, &vault)?;
    if removed {
        println!("Vault {} removed.", vault.path().display());
    } else {
        println!("No vault at {}.", vault.path().display());
    }
    println!("Next locality id will be 1.");
    Ok(())
}

fn handle_ingest(config: &Config, cmd: &IngestCommand) -> Result<()> {
    let source = cmd.source.clone().unwrap_or_else(|| config.inbox_path());
    if !source.exists() {
        bail!("source file {} not found", source.display());
    }

    let mut storage = open_storage(config)?;
    let report = ingest_file(&mut storage, &RecordFile::new(&source))
        .with_context(|| format!("ingesting {}", source.display()))?;

    println!(
        "Ingested {} of {} rows from {} ({} malformed, {} rejected)",
        report.accepted,
        report.decoded + report.malformed,
        source.display(),
        report.malformed,
        report.rejected
    );

    if cmd.archive {
        match archive_ingested(&report, &source, &config.archive_dir())? {
            Some(archived) => println!("Archived to {}", archived.display()),
            None => println!("Nothing accepted; {} left in place.", source.display()),
        }
    }
    Ok(())
}

fn handle_report(config: &Config, cmd: &ReportCommand) -> Result<()> {
    let storage = open_storage(config)?;
    let locality = match cmd.locality {
        Some(id) => id,
        None => match storage.localities()?.first() {
            Some(id) => *id,
            None => {
                println!("No observations ingested yet.");
                return Ok(());
            }
        },
    };

    let view = storage.locality_view(locality, cmd.scope())?;
    let reference = Reference::load(&config.vendors_path(), &config.rules_path());
    let annotated: Vec<AnnotatedObservation> =
        view.rows.iter().map(|r| reference.annotate(r)).collect();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&annotated)?);
        return Ok(());
    }

    match view.ingested_at {
        Some(at) => println!(
            "Locality {locality}, ingested {}: {} observations",
            format_ingest_time(at),
            annotated.len()
        ),
        None => println!(
            "Locality {locality}, all ingestions: {} observations",
            annotated.len()
        ),
    }
    println!();
    println!(
        "{:<32} {:<17} {:>5} {:>4} {:<20} {:<16} Tags",
        "SSID", "MAC", "RSSI", "CH", "Vendor", "Security"
    );
    for a in &annotated {
        let o = &a.observation;
        let ssid = if o.hidden && o.ssid.is_empty() {
            "<hidden>"
        } else {
            o.ssid.as_str()
        };
        println!(
            "{:<32} {:<17} {:>5} {:>4} {:<20} {:<16} {}",
            truncate(ssid, 32),
            o.mac,
            o.rssi,
            o.channel,
            truncate(&a.vendor, 20),
            truncate(&a.security_label, 16),
            a.tags
        );
    }
    Ok(())
}

fn handle_localities(config: &Config, json: bool) -> Result<()> {
    let storage = open_storage(config)?;
    let localities = storage.localities()?;

    if json {
        let entries: Vec<_> = localities
            .iter()
            .map(|id| -> scout::Result<serde_json::Value> {
                Ok(serde_json::json!({
                    "locality_id": id,
                    "ingested_at": storage.ingest_times(*id)?,
                }))
            })
            .collect::<scout::Result<_>>()?;
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if localities.is_empty() {
        println!("No observations ingested yet.");
    }
    for id in localities {
        let times = storage.ingest_times(id)?;
        println!("{id:>6}  {} ingestion(s)", times.len());
        for t in times {
            println!("        {}", format_ingest_time(t));
        }
    }
    Ok(())
}

/// Full-precision form accepted by `report --at`.
fn format_ingest_time(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn handle_search(config: &Config, cmd: &SearchCommand) -> Result<()> {
    let storage = open_storage(config)?;
    let rows = if cmd.mac {
        storage.by_mac(&cmd.query, cmd.limit)?
    } else {
        storage.search_ssid(&cmd.query, cmd.limit)?
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_rows(&rows);
    }
    Ok(())
}

fn print_rows(rows: &[StoredObservation]) {
    if rows.is_empty() {
        println!("No matching observations.");
        return;
    }
    for o in rows {
        println!(
            "[{}] loc {:>4}  {:<17} {:>5} dBm  ch {:>3}  {}",
            o.timestamp.format("%Y-%m-%d %H:%M:%S"),
            o.locality_id,
            o.mac,
            o.rssi,
            o.channel,
            o.ssid
        );
    }
}

fn handle_status(config: &Config, json: bool) -> Result<()> {
    let counter = counter_store(config).current();
    let storage = open_storage(config)?;
    let stats = storage.stats()?;

    if json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "vault_path": config.vault_path(),
            "locality_counter": counter,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("scout status");
        println!("------------");
        println!("Database:       {}", config.database_path().display());
        println!("Vault:          {}", config.vault_path().display());
        println!("Counter:        {counter} (next locality {})", counter + 1);
        println!("Observations:   {}", stats.total_observations);
        println!("Localities:     {}", stats.localities);
        println!("Distinct MACs:  {}", stats.distinct_macs);
        if let Some(last) = stats.last_ingest {
            println!("Last ingest:    {}", last.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        println!("Database size:  {} bytes", stats.db_size_bytes);
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[agent]");
                println!("  Vault path:         {}", config.vault_path().display());
                println!("  Counter path:       {}", config.counter_path().display());
                println!("  Scan passes:        {}", config.agent.scan_passes);
                println!("  Inter-pass delay:   {:?}", config.inter_pass_delay());
                if let Some(replay) = &config.agent.replay_path {
                    println!("  Replay path:        {}", replay.display());
                }
                println!();
                println!("[hq]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Inbox path:         {}", config.inbox_path().display());
                println!("  Archive dir:        {}", config.archive_dir().display());
                println!("  Vendors path:       {}", config.vendors_path().display());
                println!("  Rules path:         {}", config.rules_path().display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
        out.push('~');
        out
    }
}
