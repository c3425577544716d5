use std::io::{self, BufRead};

use anyhow::Context;
use colored::Colorize;
use ringlog_core::{RingLog, RingStatus, SlotDump, SlotMarker, WriterSink};
use ringlog_storage::FileStorage;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::cli::*;
use crate::config::CliConfig;

type Log = RingLog<FileStorage>;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = CliConfig::resolve(cli.config.as_deref())?;
    config.apply(&cli.store);
    let mut log = build_log(&config)?;
    let format = cli.format;

    match cli.command {
        Command::Init(args) => cmd_init(&mut log, &config, args, format),
        Command::Append(args) => cmd_append(&mut log, &config, args, format),
        Command::Debug(args) => cmd_debug(&mut log, &config, args, format),
        Command::Read(args) => cmd_read(&mut log, &config, args, format),
        Command::Dump => cmd_dump(&mut log, &config, format),
        Command::Status => {
            open(&mut log, &config)?;
            print_status(&log.status(), format)
        }
        Command::Erase => cmd_erase(&mut log, &config, format),
        Command::Remove => cmd_remove(&mut log, format),
        Command::LastId => {
            open(&mut log, &config)?;
            let id = log.last_line_id();
            match format {
                OutputFormat::Json => print_json(&json!({ "last_line_id": id })),
                OutputFormat::Text => {
                    println!("{id}");
                    Ok(())
                }
            }
        }
    }
}

fn build_log(config: &CliConfig) -> anyhow::Result<Log> {
    let storage = FileStorage::new(&config.dir)
        .with_context(|| format!("cannot use directory {}", config.dir.display()))?;
    let mut log = RingLog::new(storage)
        .with_name(config.name.clone())
        .with_tag(config.tag.clone());
    if config.debug_level > 0 {
        log.add_sink(WriterSink::new(io::stderr()));
    }
    log.set_debug_level(config.debug_level);
    debug!(dir = %config.dir.display(), name = %config.name, "ring log configured");
    Ok(log)
}

fn open(log: &mut Log, config: &CliConfig) -> anyhow::Result<()> {
    let ring = config.ring_config();
    log.open(ring.capacity, ring.line_width)
        .with_context(|| format!("cannot open {} in {}", config.name, config.dir.display()))
}

fn cmd_init(
    log: &mut Log,
    config: &CliConfig,
    args: InitArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if args.fresh {
        let ring = config.ring_config();
        log.open_fresh(ring.capacity, ring.line_width)?;
    } else {
        open(log, config)?;
    }
    if format == OutputFormat::Text {
        println!(
            "{} Ring store {} ready in {}",
            "✓".green().bold(),
            config.name.bold(),
            config.dir.display()
        );
    }
    print_status(&log.status(), format)
}

fn cmd_append(
    log: &mut Log,
    config: &CliConfig,
    args: AppendArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    open(log, config)?;
    let mut ids = Vec::new();
    if args.message.is_empty() {
        for line in io::stdin().lock().lines() {
            ids.push(log.append(&line?)?);
        }
    } else {
        ids.push(log.append(&args.message.join(" "))?);
    }
    print_appended(&ids, format)
}

fn cmd_debug(
    log: &mut Log,
    config: &CliConfig,
    args: DebugArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    open(log, config)?;
    let id = log.append_tagged(&args.tag, &args.message.join(" "))?;
    print_appended(&[id], format)
}

fn cmd_read(
    log: &mut Log,
    config: &CliConfig,
    args: ReadArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    open(log, config)?;
    let lines = log
        .lines(args.start, args.count)
        .collect::<ringlog_core::Result<Vec<_>>>()?;
    match format {
        OutputFormat::Json => print_json(&lines),
        OutputFormat::Text => {
            for line in &lines {
                println!("{line}");
            }
            Ok(())
        }
    }
}

fn cmd_dump(log: &mut Log, config: &CliConfig, format: OutputFormat) -> anyhow::Result<()> {
    open(log, config)?;
    let dumps = log.dump()?;
    match format {
        OutputFormat::Json => print_json(&dumps),
        OutputFormat::Text => {
            for dump in &dumps {
                print_slot(dump);
            }
            Ok(())
        }
    }
}

fn cmd_erase(log: &mut Log, config: &CliConfig, format: OutputFormat) -> anyhow::Result<()> {
    open(log, config)?;
    log.reset()?;
    if format == OutputFormat::Text {
        println!("{} Erased {}", "✓".green().bold(), config.name.bold());
    }
    print_status(&log.status(), format)
}

fn cmd_remove(log: &mut Log, format: OutputFormat) -> anyhow::Result<()> {
    let existed = log.remove()?;
    match format {
        OutputFormat::Json => print_json(&json!({ "removed": existed })),
        OutputFormat::Text => {
            if existed {
                println!("{} Removed {}", "✓".green().bold(), log.name().bold());
            } else {
                println!("Nothing to remove at {}", log.name().bold());
            }
            Ok(())
        }
    }
}

fn print_appended(ids: &[u32], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(&json!({ "line_ids": ids })),
        OutputFormat::Text => {
            for id in ids {
                println!("{} line {}", "✓".green(), id.to_string().yellow());
            }
            Ok(())
        }
    }
}

fn print_status(status: &RingStatus, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(status);
    }
    println!("Store: {} ({})", status.name.bold(), status.state.to_string().cyan());
    println!(
        "  Capacity: {} lines x {} bytes (record {} bytes)",
        status.capacity, status.line_width, status.record_length
    );
    if status.is_empty() {
        println!("  Lines: {}", "none".dimmed());
    } else {
        println!(
            "  Lines: {}..={} ({} live)",
            status.oldest_id.to_string().yellow(),
            status.newest_id.to_string().yellow(),
            status.len()
        );
    }
    println!("  Debug level: {}", status.debug_level);
    Ok(())
}

fn print_slot(dump: &SlotDump) {
    let marker = format!("{:<6}", dump.marker);
    let marker = match dump.marker {
        SlotMarker::Newest => marker.green().bold(),
        SlotMarker::Oldest => marker.yellow(),
        SlotMarker::Live => marker.normal(),
        SlotMarker::Empty => marker.dimmed(),
        SlotMarker::Stale => marker.red(),
    };
    let id = if dump.record.is_live() {
        dump.record.line_id.to_string()
    } else {
        "-".to_string()
    };
    println!("{:>5} {} {:>8} {}", dump.slot, marker, id, dump.record.payload);
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
