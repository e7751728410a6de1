//! Reboot and shutdown commands.

use std::process::Command;

use log::{info, warn};

/// Trait for power control implementations.
///
/// Commands are fire-and-forget: nothing waits for the machine to go down.
pub trait PowerControl: Send + Sync {
    /// Reboot immediately.
    fn reboot(&self);

    /// Power off immediately.
    fn shutdown(&self);
}

/// Issues `sudo reboot now` / `sudo shutdown now`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPower;

impl SystemPower {
    fn spawn(args: &[&str]) {
        info!("running sudo {}", args.join(" "));
        if let Err(e) = Command::new("sudo").args(args).spawn() {
            warn!("failed to run sudo {}: {}", args.join(" "), e);
        }
    }
}

impl PowerControl for SystemPower {
    fn reboot(&self) {
        Self::spawn(&["reboot", "now"]);
    }

    fn shutdown(&self) {
        Self::spawn(&["shutdown", "now"]);
    }
}
