//! lehrpool-ctl: command-line image downloader for bwLehrpool image servers.

mod cmd;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use lehrpool_core::config::LehrpoolConfig;

use cmd::fetch::TicketSource;

fn print_usage() {
    println!("Usage: lehrpool-ctl [--json] <command>");
    println!();
    println!("Commands:");
    println!("  fetch --ticket <file> [--out <path>]");
    println!("        Download the image described by a transfer ticket (JSON)");
    println!("  fetch --host <host> --port <port> --token <token> --size <bytes> [--out <path>]");
    println!("        Download using explicit transfer parameters");
    println!("  inspect <specifics.json>");
    println!("        Summarize an exported image/version pair");
    println!("  config");
    println!("        Show the effective configuration");
    println!();
    println!("Options:");
    println!("  --json   Print machine-readable output");
    println!();
    println!("Logging is controlled through RUST_LOG, e.g. RUST_LOG=lehrpool_client=debug");
}

/// Flags and positionals of one invocation.
#[derive(Debug, Default)]
struct Args {
    json: bool,
    ticket: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    token: Option<String>,
    size: Option<u64>,
    out: Option<PathBuf>,
    positional: Vec<String>,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut parsed = Args::default();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || -> Result<String> {
            i += 1;
            args.get(i)
                .cloned()
                .with_context(|| format!("{flag} requires a value"))
        };
        match flag {
            "--json" => parsed.json = true,
            "--ticket" => parsed.ticket = Some(PathBuf::from(value()?)),
            "--host" => parsed.host = Some(value()?),
            "--port" => {
                parsed.port = Some(value()?.parse().context("--port must be a number")?)
            }
            "--token" => parsed.token = Some(value()?),
            "--size" => {
                parsed.size = Some(value()?.parse().context("--size must be a number of bytes")?)
            }
            "--out" | "-o" => parsed.out = Some(PathBuf::from(value()?)),
            _ => parsed.positional.push(flag.to_string()),
        }
        i += 1;
    }
    Ok(parsed)
}

fn ticket_source(args: &Args) -> Result<TicketSource> {
    if let Some(path) = &args.ticket {
        if args.host.is_some() || args.port.is_some() || args.token.is_some() || args.size.is_some() {
            bail!("--ticket cannot be combined with --host/--port/--token/--size");
        }
        return Ok(TicketSource::File(path.clone()));
    }
    match (&args.host, args.port, &args.token, args.size) {
        (Some(host), Some(port), Some(token), Some(size)) => Ok(TicketSource::Explicit {
            host: host.clone(),
            port,
            token: token.clone(),
            size,
        }),
        _ => bail!("fetch needs either --ticket or all of --host, --port, --token and --size"),
    }
}

fn load_config() -> LehrpoolConfig {
    if let Err(e) = LehrpoolConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    LehrpoolConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        LehrpoolConfig::default()
    })
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw)?;
    let positional: Vec<&str> = args.positional.iter().map(String::as_str).collect();

    match positional.as_slice() {
        ["fetch"] => {
            let source = ticket_source(&args)?;
            cmd::fetch::cmd_fetch(&load_config(), &source, args.out.as_deref(), args.json)
        }
        ["inspect", path] => cmd::inspect::cmd_inspect(std::path::Path::new(path), args.json),
        ["config"] => cmd::config::cmd_config(&load_config()),
        ["help"] | ["--help"] | ["-h"] | [] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
