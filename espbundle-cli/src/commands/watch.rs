//! Timer-driven device status display.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use console::style;
use espbundle::DeviceStatus;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};

use crate::commands::{build_session, print_instructions, styled_status, upload::upload_with_progress};
use crate::config::Config;
use crate::{Cli, use_fancy_output, was_interrupted};

/// Granularity of the interrupt check while waiting for the next poll.
const SLEEP_STEP: Duration = Duration::from_millis(50);

/// Sleep for `total`, returning early (with `false`) on Ctrl-C.
fn sleep_interruptible(total: Duration) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if was_interrupted() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(SLEEP_STEP.min(deadline - now));
    }
}

/// Watch command implementation.
pub(crate) fn cmd_watch(cli: &Cli, config: &Config, upload: Option<&Path>) -> Result<()> {
    if let Some(bundle) = upload {
        if !bundle.is_file() {
            anyhow::bail!("Bundle {} does not exist", bundle.display());
        }
    }

    if !cli.quiet {
        print_instructions(config);
        if let Some(bundle) = upload {
            eprintln!(
                "{} {} will be flashed as soon as a device is ready",
                style("📦").cyan(),
                bundle.display()
            );
        }
    }

    let spinner = if cli.quiet || !use_fancy_output() {
        ProgressBar::hidden()
    } else {
        let spinner = ProgressBar::new_spinner();
        #[allow(clippy::unwrap_used)] // Static template string
        spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}").unwrap());
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner
    };

    let interval = Duration::from_millis(config.poll_interval_ms);
    let mut session = build_session(cli, config);
    let mut last: Option<DeviceStatus> = None;

    loop {
        let status = session.poll();
        if last != Some(status) {
            debug!("Device status changed: {status}");
            spinner.set_message(styled_status(status));
            if spinner.is_hidden() && !cli.quiet {
                eprintln!("{}", styled_status(status));
            }
            last = Some(status);
        }

        if status.is_ready() {
            if let Some(bundle) = upload {
                spinner.finish_and_clear();
                return upload_with_progress(cli, &mut session, bundle);
            }
        }

        if !sleep_interruptible(interval) {
            spinner.finish_and_clear();
            info!("Stopped watching");
            return Ok(());
        }
    }
}
