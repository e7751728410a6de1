//! Error types for the status panel.

use crate::input::InputLine;

/// Errors that can occur while driving the status panel.
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    /// Writing a frame or a contrast value to the panel failed.
    #[error("Panel write failed: {0}")]
    Panel(String),

    /// A hardware input line could not be registered for edge events.
    #[error("Failed to register input line {line:?} (pin {pin}): {reason}")]
    InputRegistration {
        /// The logical input that failed.
        line: InputLine,
        /// The hardware pin it was bound to.
        pin: u32,
        /// What the edge source reported.
        reason: String,
    },

    /// The background render thread could not be started.
    #[error("Failed to spawn render thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// An I/O error occurred (e.g., reading the config file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for [`Config`](crate::Config).
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// The brightness sequence has no levels to cycle through.
    #[error("Brightness level sequence must not be empty")]
    EmptyBrightnessLevels,
}
