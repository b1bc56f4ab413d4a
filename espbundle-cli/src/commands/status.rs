//! One-shot device status.

use anyhow::Result;
use espbundle::SessionState;

use crate::Cli;
use crate::commands::{build_session, print_instructions, styled_status};
use crate::config::Config;

/// Status command implementation.
pub(crate) fn cmd_status(cli: &Cli, config: &Config, json: bool) -> Result<()> {
    let mut session = build_session(cli, config);
    let status = session.poll();

    if json {
        let port = match session.state() {
            SessionState::DeviceReady(device) => Some(device.port().to_string()),
            _ => None,
        };
        let value = serde_json::json!({
            "status": status,
            "ready": status.is_ready(),
            "port": port,
            "message": status.message(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if !cli.quiet {
        print_instructions(config);
    }
    eprintln!("{}", styled_status(status));
    if let SessionState::DeviceReady(device) = session.state() {
        eprintln!("  port: {device}");
    }

    Ok(())
}
