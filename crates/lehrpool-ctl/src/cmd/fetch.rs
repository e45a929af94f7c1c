//! `fetch`: download one image to disk.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use lehrpool_client::{DownloadOptions, TcpDownload};
use lehrpool_core::config::LehrpoolConfig;
use lehrpool_core::TransferTicket;

/// Where the ticket for a fetch comes from.
pub enum TicketSource {
    File(PathBuf),
    Explicit {
        host: String,
        port: u16,
        token: String,
        size: u64,
    },
}

impl TicketSource {
    fn resolve(&self) -> Result<TransferTicket> {
        match self {
            Self::File(path) => TransferTicket::load(path)
                .with_context(|| format!("failed to load ticket {}", path.display())),
            Self::Explicit {
                host,
                port,
                token,
                size,
            } => Ok(TransferTicket::new(host.clone(), *port, token.clone(), *size)),
        }
    }
}

pub fn cmd_fetch(
    config: &LehrpoolConfig,
    source: &TicketSource,
    out: Option<&Path>,
    json: bool,
) -> Result<()> {
    let ticket = source.resolve()?;
    if ticket.token.is_empty() {
        bail!("transfer token is empty");
    }

    let out = match out {
        Some(path) => path.to_path_buf(),
        None => default_output(config, &ticket)?,
    };

    let options = DownloadOptions::from(&config.transfer);
    let mut download = TcpDownload::connect(&ticket, &options)
        .with_context(|| format!("failed to open download from {}", ticket.address()))?;
    let report = download
        .save_to(&out)
        .with_context(|| format!("download to {} failed", out.display()))?;

    if json {
        let summary = serde_json::json!({
            "path": out.display().to_string(),
            "bytes": report.bytes,
            "blake3": report.digest_hex(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Saved {} bytes to {}", report.bytes, out.display());
        println!("blake3 {}", report.digest_hex());
    }
    Ok(())
}

/// `<download_dir>/<token>.img`, creating the directory if needed.
fn default_output(config: &LehrpoolConfig, ticket: &TransferTicket) -> Result<PathBuf> {
    let dir = &config.storage.download_dir;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create download directory {}", dir.display()))?;
    Ok(dir.join(format!("{}.img", file_stem(&ticket.token))))
}

/// Tokens come from the server; keep only characters safe in a file name.
fn file_stem(token: &str) -> String {
    token
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
