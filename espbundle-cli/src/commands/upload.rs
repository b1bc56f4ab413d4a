//! Upload command implementation.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, theme::ColorfulTheme};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use crate::commands::{CliSession, build_session, bundle::resolve_bundle, styled_status};
use crate::config::Config;
use crate::{Cli, CliError, use_fancy_output, was_interrupted};

fn ensure_not_interrupted() -> Result<()> {
    if was_interrupted() {
        Err(CliError::Cancelled("Interrupted".into()).into())
    } else {
        Ok(())
    }
}

/// Ask before erasing, unless `--yes` was given.
fn confirm_erase(cli: &Cli, yes: bool, bundle: &Path) -> Result<()> {
    if yes {
        return Ok(());
    }
    if cli.non_interactive || !std::io::stdin().is_terminal() {
        return Err(CliError::Usage(
            "Uploading erases the whole flash; pass --yes to confirm in non-interactive mode"
                .into(),
        )
        .into());
    }

    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "Erase the device and flash {}?",
            bundle.display()
        ))
        .default(false)
        .interact_opt()
        .context("erase confirmation failed")?;

    match confirmed {
        Some(true) => Ok(()),
        _ => Err(CliError::Cancelled("Upload cancelled".into()).into()),
    }
}

/// Upload command implementation.
pub(crate) fn cmd_upload(cli: &Cli, config: &Config, bundle: Option<PathBuf>, yes: bool) -> Result<()> {
    let mut session = build_session(cli, config);
    let status = session.poll();
    if !cli.quiet {
        eprintln!("{}", styled_status(status));
    }
    status.into_result()?;

    // Only ask for a bundle once a device is known to be ready.
    let base = std::env::current_dir().context("failed to get current directory")?;
    let bundle = resolve_bundle(bundle, &base, cli.non_interactive, cli.quiet)?;

    confirm_erase(cli, yes, &bundle)?;
    ensure_not_interrupted()?;

    upload_with_progress(cli, &mut session, &bundle)
}

/// Run an upload on a session whose last poll found a device.
pub(crate) fn upload_with_progress(cli: &Cli, session: &mut CliSession, bundle: &Path) -> Result<()> {
    if !cli.quiet {
        eprintln!(
            "{} Uploading {}",
            style("📦").cyan(),
            bundle.display()
        );
    }

    let pb = if cli.quiet || !use_fancy_output() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(0);
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.set_message("erasing flash");
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        pb
    };

    let result = session.run_upload(bundle, &mut |name: &str, done: usize, total: usize| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
        if done < total {
            pb.set_message(name.to_string());
        }
    });

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            pb.abandon_with_message("failed");
            return Err(e).with_context(|| format!("Upload of {} failed", bundle.display()));
        },
    };
    pb.finish_with_message("complete");

    for entry in &report.entries {
        info!("  {:#010x}  {} ({} bytes)", entry.address, entry.name, entry.len);
    }

    if !cli.quiet {
        eprintln!(
            "\n{} Flashed {} entries to {}",
            style("🎉").green().bold(),
            report.entries.len(),
            report.device
        );
    }

    Ok(())
}
