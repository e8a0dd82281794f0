//! Administrative command handlers.

use super::print_json;
use crate::Engine;
use freshwire::config::FreshwireConfig;
use freshwire::models::KeyFamily;
use freshwire::observability::ObservabilityHandle;

/// Parses family names; `all` expands to every family.
fn parse_families(names: &[String]) -> Result<Vec<KeyFamily>, Box<dyn std::error::Error>> {
    if names.iter().any(|name| name.eq_ignore_ascii_case("all")) {
        return Ok(KeyFamily::all().to_vec());
    }
    names
        .iter()
        .map(|name| {
            KeyFamily::parse(name).ok_or_else(|| {
                let known: Vec<&str> = KeyFamily::all().iter().map(KeyFamily::as_str).collect();
                format!("unknown key family '{name}' (expected {} or all)", known.join(", ")).into()
            })
        })
        .collect()
}

/// Reset command.
pub fn cmd_reset(
    engine: &Engine,
    families: &[String],
    scan: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let families = parse_families(families)?;
    let report = if scan {
        engine.purge(&families)?
    } else {
        engine.reset(&families)?
    };
    print_json(&report)
}

/// Keys command.
pub fn cmd_keys(engine: &Engine, family: &str) -> Result<(), Box<dyn std::error::Error>> {
    let family = KeyFamily::parse(family).ok_or_else(|| format!("unknown key family '{family}'"))?;
    let mut keys = engine.keys(family)?;
    keys.sort();
    for key in keys {
        println!("{key}");
    }
    Ok(())
}

/// Status command.
pub fn cmd_status(
    engine: &Engine,
    config: &FreshwireConfig,
    observability: &ObservabilityHandle,
) -> Result<(), Box<dyn std::error::Error>> {
    let dedup = engine.config();

    println!("Freshwire Status");
    println!("================");
    println!();
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "Config File: {}",
        config
            .source_path
            .as_ref()
            .map_or_else(|| "(none - using defaults)".to_string(), |p| p.display().to_string())
    );
    println!();

    println!("Store:");
    println!("  Backend: {}", engine.backend_name());
    println!("  Namespace: {}", config.store.namespace);
    println!("  Timeout: {}ms", config.store.timeout_ms);
    match engine.ping() {
        Ok(()) => println!("  Health: reachable"),
        Err(e) => println!("  Health: unreachable ({e})"),
    }
    println!();

    println!("Deduplication:");
    println!("  Enabled: {}", dedup.enabled);
    println!("  Similarity Threshold: {:.2}", dedup.similarity_threshold);
    println!("  Top Terms: {}", dedup.top_term_count);
    println!("  Semantic Lookback: {}", dedup.semantic_lookback);
    println!("  Exclusive Commit: {}", dedup.exclusive_commit);
    println!(
        "  TTLs: content {}s, semantic {}s, source {}s, global {}",
        dedup.content_ttl_secs,
        dedup.semantic_ttl_secs,
        dedup.source_ttl_secs,
        dedup
            .global_ttl()
            .map_or_else(|| "unbounded".to_string(), |ttl| format!("{}s", ttl.as_secs()))
    );
    println!();

    println!("Key Families:");
    for family in KeyFamily::all() {
        match engine.keys(*family) {
            Ok(keys) => println!("  {family}: {}", keys.len()),
            Err(e) => println!("  {family}: unavailable ({e})"),
        }
    }

    if let Some(metrics) = observability.metrics() {
        println!();
        println!("Metrics:");
        print!("{}", metrics.render());
    }
    Ok(())
}
