//! The physical display.

use std::sync::{Arc, Mutex};

use crate::error::DisplayError;
use crate::frame::Frame;

/// Trait for monochrome panel implementations.
///
/// This allows the OLED driver to be swapped for a mock in tests.
pub trait Panel: Send {
    /// Panel width in pixels.
    fn width(&self) -> u32;

    /// Panel height in pixels.
    fn height(&self) -> u32;

    /// Show `frame` on the panel.
    fn display(&mut self, frame: &Frame) -> Result<(), DisplayError>;

    /// Set the contrast (0 = off, 255 = brightest).
    fn set_contrast(&mut self, level: u8) -> Result<(), DisplayError>;
}

/// A panel shared between the render task and the brightness button.
pub type SharedPanel = Arc<Mutex<dyn Panel>>;

/// Wrap a panel for sharing.
pub fn share_panel<P: Panel + 'static>(panel: P) -> SharedPanel {
    Arc::new(Mutex::new(panel))
}
