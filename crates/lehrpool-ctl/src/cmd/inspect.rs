//! `inspect`: summarize an image/version pair as exported by the master server.

use std::path::Path;

use anyhow::{Context, Result};
use lehrpool_core::ImageSpecifics;

pub fn cmd_inspect(path: &Path, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let specifics = ImageSpecifics::from_json(&text)
        .with_context(|| format!("{} is not an image/version pair", path.display()))?;
    let ImageSpecifics { details, version } = &specifics;

    if json {
        let summary = serde_json::json!({
            "image_base_id": details.image_base_id,
            "image_name": details.image_name,
            "virt_id": details.virt_id,
            "version_id": version.version_id,
            "file_size": version.file_size,
            "is_latest": version.version_id == details.latest_version_id,
            "is_valid": version.is_valid,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  {}", details.image_name);
    println!("═══════════════════════════════════════");
    println!("  Image      : {}", details.image_base_id);
    println!("  Virt       : {}", details.virt_id);
    println!("  Versions   : {}", details.versions.len());
    println!("  Version    : {}", version.version_id);
    println!(
        "  Size       : {} bytes ({:.1} MiB)",
        version.file_size,
        version.file_size as f64 / (1024.0 * 1024.0)
    );
    println!("  Latest     : {}", version.version_id == details.latest_version_id);
    println!("  Valid      : {}", version.is_valid);
    if !details.description.is_empty() {
        println!("\n  {}", details.description);
    }
    Ok(())
}
