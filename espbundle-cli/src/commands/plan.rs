//! Bundle layout preview.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use espbundle::{Bundle, UploadPlan, plan};

use crate::config::Config;

/// Read and plan a bundle.
fn load_plan(bundle: &Path, chunk_size: u32) -> Result<UploadPlan> {
    let archive = Bundle::from_file(bundle)
        .with_context(|| format!("Failed to load bundle {}", bundle.display()))?;
    Ok(plan(archive.entries, chunk_size)?)
}

/// JSON form of a plan.
fn plan_json(plan: &UploadPlan) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = plan
        .iter()
        .map(|p| {
            serde_json::json!({
                "name": p.name(),
                "address": format!("{:#x}", p.address),
                "length": p.len(),
                "image": p.entry.is_image(),
            })
        })
        .collect();

    serde_json::json!({
        "chunk_size": plan.chunk_size,
        "end_address": format!("{:#x}", plan.end_address),
        "entries": entries,
    })
}

/// Plan command implementation.
pub(crate) fn cmd_plan(config: &Config, bundle: &Path, json: bool) -> Result<()> {
    let plan = load_plan(bundle, config.chunk_size)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan_json(&plan))?);
        return Ok(());
    }

    eprintln!(
        "{}",
        style(format!("Flash layout of {}", bundle.display()))
            .bold()
            .underlined()
    );
    if plan.is_empty() {
        eprintln!("  {}", style("(bundle has no entries)").dim());
        return Ok(());
    }
    for planned in &plan {
        let kind = if planned.entry.is_image() {
            style("image").yellow().to_string()
        } else {
            style("data").dim().to_string()
        };
        eprintln!(
            "  {} 0x{:08X}  {} ({} bytes) {}",
            style("•").dim(),
            planned.address,
            style(planned.name()).cyan(),
            planned.len(),
            kind
        );
    }
    eprintln!("  end: 0x{:08X} (chunk 0x{:X})", plan.end_address, plan.chunk_size);

    Ok(())
}
