use std::io::Write;
use std::time::Duration;

use chrono::Local;
use strata_core::attributes::{self, Attribute};
use strata_core::context::EngineConfigExt;
use strata_core::effects::{EffectId, EffectRecord, OwnerId};
use strata_core::host::AttributeHost;

use crate::CliContext;

/// Owners are addressed by UUID or by player name.
pub fn parse_owner(input: &str) -> OwnerId {
    OwnerId::parse_or_name(input)
}

fn parse_attribute(input: &str) -> Result<Attribute, String> {
    attributes::resolve(input).ok_or_else(|| format!("unknown attribute '{input}'"))
}

/// Parse `500ms`, `30s`, `5m`, `2h`; a bare number is seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let split = input
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(input.len());
    let (number, unit) = input.split_at(split);
    let number: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration '{input}'"))?;
    let millis = match unit.trim() {
        "ms" => number,
        "" | "s" => number * 1_000.0,
        "m" => number * 60_000.0,
        "h" => number * 3_600_000.0,
        other => return Err(format!("unknown duration unit '{other}'")),
    };
    if !millis.is_finite() || millis < 0.0 {
        return Err(format!("invalid duration '{input}'"));
    }
    Ok(Duration::from_millis(millis.round() as u64))
}

/// `1h 02m`, `4m 05s`, `12.3s`
pub fn format_remaining(ms: i64) -> String {
    let ms = ms.max(0);
    let secs = ms / 1_000;
    if secs >= 3_600 {
        format!("{}h {:02}m", secs / 3_600, (secs % 3_600) / 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", ms as f64 / 1_000.0)
    }
}

fn print_record_header() {
    println!(
        "{:<3} {:<28} {:>10} {:>10} {:>10} {:<8} {:<10} Effect",
        "#", "Attribute", "Captured", "Target", "Left", "State", "Source"
    );
    println!("{}", "-".repeat(120));
}

fn print_record(record: &EffectRecord) {
    let state = if record.is_paused { "paused" } else { "running" };
    println!(
        "{:<3} {:<28} {:>10.4} {:>10.4} {:>10} {:<8} {:<10} {} ({})",
        record.stack_index,
        record.attribute.key(),
        record.captured_value,
        record.target_value,
        format_remaining(record.remaining_ms),
        state,
        record.source,
        record.effect_id,
        record.created_at.with_timezone(&Local).format("%H:%M:%S"),
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

pub async fn connect(owner: &str, ctx: &CliContext) -> Result<(), String> {
    let id = parse_owner(owner);
    let manager = ctx.engine.manager();
    if manager.is_connected(id) {
        println!("{owner} ({id}) is already connected");
        return Ok(());
    }
    let restored = manager.on_connect(id).await.map_err(|e| e.to_string())?;
    println!("{owner} ({id}) connected, {restored} effect(s) restored");
    Ok(())
}

pub async fn disconnect(owner: &str, ctx: &CliContext) -> Result<(), String> {
    let id = parse_owner(owner);
    let manager = ctx.engine.manager();
    if !manager.is_connected(id) {
        println!("{owner} is not connected");
        return Ok(());
    }
    let held = manager.on_disconnect(id).await.map_err(|e| e.to_string())?;
    println!("{owner} disconnected, {held} effect(s) frozen");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Effects
// ─────────────────────────────────────────────────────────────────────────────

pub async fn apply(
    owner: &str,
    attribute: &str,
    value: f64,
    duration: Duration,
    source: &str,
    ctx: &CliContext,
) -> Result<(), String> {
    let id = parse_owner(owner);
    let effect_id = ctx
        .engine
        .manager()
        .apply_effect(id, attribute, value, duration, source)
        .await
        .map_err(|e| e.to_string())?;

    let attribute = parse_attribute(attribute)?;
    println!(
        "applied {effect_id}: {} = {} for {}",
        attribute,
        ctx.host.value(id, attribute),
        format_remaining(duration.as_millis() as i64)
    );
    Ok(())
}

pub async fn cancel(owner: &str, attribute: &str, ctx: &CliContext) -> Result<(), String> {
    let id = parse_owner(owner);
    let attribute = parse_attribute(attribute)?;
    let removed = ctx
        .engine
        .manager()
        .cancel_effects(id, attribute)
        .await
        .map_err(|e| e.to_string())?;
    println!(
        "cancelled {removed} effect(s), {} = {}",
        attribute,
        ctx.host.value(id, attribute)
    );
    Ok(())
}

pub async fn cancel_effect(owner: &str, effect_id: &str, ctx: &CliContext) -> Result<(), String> {
    let id = parse_owner(owner);
    let effect_id: EffectId = effect_id
        .parse()
        .map_err(|e| format!("invalid effect id: {e}"))?;
    let found = ctx
        .engine
        .manager()
        .cancel_effect(id, effect_id)
        .await
        .map_err(|e| e.to_string())?;
    if found {
        println!("cancelled {effect_id}");
    } else {
        println!("no effect {effect_id} on {owner}");
    }
    Ok(())
}

pub async fn clear(owner: &str, ctx: &CliContext) -> Result<(), String> {
    let id = parse_owner(owner);
    let removed = ctx
        .engine
        .manager()
        .clear_all(id)
        .await
        .map_err(|e| e.to_string())?;
    println!("cleared {removed} effect(s) from {owner}");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Queries
// ─────────────────────────────────────────────────────────────────────────────

pub fn list(owner: Option<&str>, ctx: &CliContext) {
    let manager = ctx.engine.manager();
    let owners = match owner {
        Some(owner) => vec![parse_owner(owner)],
        None => manager.connected_owners(),
    };

    if owners.is_empty() {
        println!("No owners connected");
        return;
    }

    for id in owners {
        let status = if manager.is_connected(id) { "online" } else { "offline" };
        let active = manager.list_active(id);
        println!("\n{id} [{status}] {} active stack(s)", active.len());
        if active.is_empty() {
            continue;
        }
        print_record_header();
        for record in &active {
            print_record(record);
        }
    }
}

pub fn stack(owner: &str, attribute: &str, ctx: &CliContext) -> Result<(), String> {
    let id = parse_owner(owner);
    let attribute = parse_attribute(attribute)?;
    let records = ctx.engine.manager().list_stack(id, attribute);
    if records.is_empty() {
        println!("No effects on {attribute}");
        return Ok(());
    }

    print_record_header();
    // Top first
    for record in records.iter().rev() {
        print_record(record);
    }
    let total: f64 = records.iter().map(EffectRecord::delta).sum();
    println!("\nTotal delta: {total:+.4}");
    Ok(())
}

pub fn get(owner: &str, attribute: Option<&str>, ctx: &CliContext) -> Result<(), String> {
    let id = parse_owner(owner);
    match attribute {
        Some(attribute) => {
            let attribute = parse_attribute(attribute)?;
            println!("{attribute} = {}", ctx.host.value(id, attribute));
        }
        None => {
            let values = ctx.host.values_for(id);
            if values.is_empty() {
                println!("All attributes at their defaults");
            }
            for (attribute, value) in values {
                println!("{:<28} {value}", attribute.key());
            }
        }
    }
    Ok(())
}

/// Write a live value directly, as another plugin would.
pub fn set(owner: &str, attribute: &str, value: f64, ctx: &CliContext) -> Result<(), String> {
    let id = parse_owner(owner);
    let attribute = parse_attribute(attribute)?;
    if !value.is_finite() {
        return Err(format!("invalid value {value}"));
    }
    let value = attribute.meta().clamp(value);
    ctx.host.set_live_value(id, attribute, value);
    println!("{attribute} = {value}");
    Ok(())
}

pub fn attrs() {
    println!(
        "{:<28} {:>10} {:>10} {:>10}  Aliases",
        "Attribute", "Default", "Min", "Max"
    );
    println!("{}", "-".repeat(90));
    for attribute in Attribute::ALL {
        let meta = attribute.meta();
        println!(
            "{:<28} {:>10} {:>10} {:>10}  {}",
            attribute.key(),
            meta.default_value,
            meta.min_value,
            meta.max_value,
            attributes::aliases_for(attribute).join(", ")
        );
    }
}

pub fn resolve(input: &str) {
    match attributes::resolve(input) {
        Some(attribute) => println!("{input} -> {attribute}"),
        None => println!("{input} does not name an attribute"),
    }
}

pub fn show_config(ctx: &CliContext) -> Result<(), String> {
    let config = ctx.config();
    if let Ok(path) = strata_core::context::EngineConfig::config_path() {
        println!("# {}", path.display());
    }
    println!("# data directory: {}", config.data_dir().display());
    print!("{}", config.to_toml().map_err(|e| e.to_string())?);
    Ok(())
}

pub fn exit() {
    let _ = write!(std::io::stdout(), "quitting...");
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::context::EngineConfig;

    #[test]
    fn durations_accept_units() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("1.5m").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7_200));
        assert!(parse_duration("3 fortnights").is_err());
        assert!(parse_duration("s").is_err());
    }

    #[test]
    fn remaining_time_formats() {
        assert_eq!(format_remaining(12_340), "12.3s");
        assert_eq!(format_remaining(245_000), "4m 05s");
        assert_eq!(format_remaining(3_720_000), "1h 02m");
        assert_eq!(format_remaining(-5), "0.0s");
    }

    #[tokio::test]
    async fn apply_and_cancel_through_the_shell() {
        let ctx = CliContext::with_config(EngineConfig::in_memory())
            .await
            .unwrap();

        connect("alex", &ctx).await.unwrap();
        apply("alex", "size", 2.0, Duration::from_secs(60), "admin", &ctx)
            .await
            .unwrap();
        let owner = parse_owner("alex");
        assert_eq!(ctx.host.value(owner, Attribute::Scale), 2.0);

        set("alex", "scale", 5.0, &ctx).unwrap();
        cancel("alex", "scale", &ctx).await.unwrap();
        assert_eq!(ctx.host.value(owner, Attribute::Scale), 4.0);

        assert!(apply("alex", "wings", 1.0, Duration::from_secs(1), "admin", &ctx)
            .await
            .is_err());
        ctx.shutdown().await;
    }
}
