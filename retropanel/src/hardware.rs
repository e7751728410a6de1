//! SSD1306 over I2C and buttons on the GPIO character device.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use embedded_graphics::{draw_target::DrawTarget, pixelcolor::BinaryColor};
use gpiocdev::Request;
use gpiocdev::chip::Chip;
use gpiocdev::line::{Bias, EdgeDetection, EdgeKind, Value};
use linux_embedded_hal::I2cdev;
use log::{debug, info, warn};
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::{
    Brightness as OledBrightness, DisplayConfig, DisplayRotation, DisplaySize128x64, I2CInterface,
};
use ssd1306::{I2CDisplayInterface, Ssd1306};

use retropanel_core::{
    Debouncer, DisplayError, EdgeHandler, EdgeSource, Frame, InputLine, LineReader, Panel,
};

const CONSUMER: &str = "retropanel";

// Precharge period used with every contrast level.
const PRECHARGE: u8 = 0x2;

type Oled = Ssd1306<
    I2CInterface<I2cdev>,
    DisplaySize128x64,
    BufferedGraphicsMode<DisplaySize128x64>,
>;

fn panel_error(e: impl std::fmt::Debug) -> DisplayError {
    DisplayError::Panel(format!("{e:?}"))
}

// =============================================================================
// Panel
// =============================================================================

/// A 128x64 SSD1306 in buffered mode.
pub struct Ssd1306Panel {
    oled: Oled,
}

impl Ssd1306Panel {
    /// Open and initialise the panel on an I2C bus.
    pub fn open(bus: &Path) -> Result<Self, DisplayError> {
        let i2c = I2cdev::new(bus).map_err(panel_error)?;
        let interface = I2CDisplayInterface::new(i2c);
        let mut oled = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        oled.init().map_err(panel_error)?;
        oled.clear(BinaryColor::Off).map_err(panel_error)?;
        oled.flush().map_err(panel_error)?;
        info!("SSD1306 ready on {}", bus.display());
        Ok(Self { oled })
    }
}

impl Panel for Ssd1306Panel {
    fn width(&self) -> u32 {
        128
    }

    fn height(&self) -> u32 {
        64
    }

    fn display(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        self.oled.draw_iter(frame.pixels()).map_err(panel_error)?;
        self.oled.flush().map_err(panel_error)
    }

    fn set_contrast(&mut self, level: u8) -> Result<(), DisplayError> {
        // Contrast 0 still glows, so level 0 turns the panel off.
        self.oled.set_display_on(level > 0).map_err(panel_error)?;
        if level > 0 {
            self.oled
                .set_brightness(OledBrightness::custom(PRECHARGE, level))
                .map_err(panel_error)?;
        }
        Ok(())
    }
}

// =============================================================================
// Buttons
// =============================================================================

/// Levels of the registered lines, updated from their edge events.
#[derive(Debug, Default)]
pub struct GpioLevels {
    pressed: Mutex<HashSet<InputLine>>,
}

impl GpioLevels {
    fn set(&self, line: InputLine, pressed: bool) {
        let mut lines = self.pressed.lock().unwrap_or_else(PoisonError::into_inner);
        if pressed {
            lines.insert(line);
        } else {
            lines.remove(&line);
        }
    }
}

impl LineReader for GpioLevels {
    fn is_asserted(&self, line: InputLine) -> bool {
        self.pressed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&line)
    }
}

/// Whether a line level means the button is down. Buttons pull the line to
/// ground against the pull-up.
fn is_pressed(value: Value) -> bool {
    value == Value::Inactive
}

/// Whether an edge is a press rather than a release.
fn is_press(kind: EdgeKind) -> bool {
    kind == EdgeKind::Falling
}

/// Falling-edge events from active-low buttons.
///
/// Lines are requested with the pull-up bias on, so an open button reads
/// high. Each line gets an event thread that tracks its level and a handler
/// thread, so a handler waiting on a long press still sees the release.
pub struct GpioEdgeSource {
    chip: PathBuf,
    levels: Arc<GpioLevels>,
    released: Arc<AtomicBool>,
}

impl GpioEdgeSource {
    /// Open a GPIO character device such as `/dev/gpiochip0`.
    pub fn open(path: &Path) -> Result<Self, DisplayError> {
        let info = Chip::from_path(path)
            .and_then(|chip| chip.info())
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        debug!(
            "opened {} ({}, {} lines)",
            path.display(),
            info.label,
            info.num_lines
        );
        Ok(Self {
            chip: path.to_path_buf(),
            levels: Arc::new(GpioLevels::default()),
            released: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Line levels for the long-press check.
    pub fn levels(&self) -> Arc<GpioLevels> {
        Arc::clone(&self.levels)
    }
}

impl EdgeSource for GpioEdgeSource {
    fn register(
        &mut self,
        line: InputLine,
        pin: u32,
        debounce: Duration,
        handler: EdgeHandler,
    ) -> Result<(), DisplayError> {
        let registration_error = |reason: String| DisplayError::InputRegistration {
            line,
            pin,
            reason,
        };

        let request = Request::builder()
            .on_chip(&self.chip)
            .with_consumer(CONSUMER)
            .with_line(pin)
            .as_input()
            .with_bias(Bias::PullUp)
            .with_edge_detection(EdgeDetection::BothEdges)
            .request()
            .map_err(|e| registration_error(e.to_string()))?;

        let initial = request
            .value(pin)
            .map_err(|e| registration_error(e.to_string()))?;
        self.levels.set(line, is_pressed(initial));

        let (tx, rx) = mpsc::channel::<()>();
        let levels = Arc::clone(&self.levels);
        let released = Arc::clone(&self.released);
        std::thread::Builder::new()
            .name(format!("gpio-{pin}"))
            .spawn(move || {
                let debouncer = Debouncer::new(debounce);
                loop {
                    let event = match request.read_edge_event() {
                        Ok(event) => event,
                        Err(e) => {
                            warn!("reading {:?} events failed: {}", line, e);
                            break;
                        }
                    };
                    if released.load(Ordering::SeqCst) {
                        break;
                    }
                    let pressed = is_press(event.kind);
                    levels.set(line, pressed);
                    if pressed && debouncer.accept(Instant::now()) && tx.send(()).is_err() {
                        break;
                    }
                }
                debug!("{:?} event thread exiting", line);
            })
            .map_err(DisplayError::Spawn)?;

        std::thread::Builder::new()
            .name(format!("input-{pin}"))
            .spawn(move || {
                while rx.recv().is_ok() {
                    handler();
                }
            })
            .map_err(DisplayError::Spawn)?;

        info!("listening for {:?} on GPIO {} (pull-up)", line, pin);
        Ok(())
    }

    fn release(&mut self) {
        // Event threads block in read(2) and notice on their next edge.
        self.released.store(true, Ordering::SeqCst);
        debug!("GPIO lines released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_pulled_up_line_is_not_pressed() {
        assert!(!is_pressed(Value::Active));
        assert!(is_pressed(Value::Inactive));
    }

    #[test]
    fn test_falling_edge_is_press() {
        assert!(is_press(EdgeKind::Falling));
        assert!(!is_press(EdgeKind::Rising));
    }

    #[test]
    fn test_idle_line_leaves_levels_clear() {
        let levels = GpioLevels::default();
        levels.set(InputLine::Button3, is_pressed(Value::Active));
        assert!(!levels.is_asserted(InputLine::Button3));
        levels.set(InputLine::Button3, is_press(EdgeKind::Falling));
        assert!(levels.is_asserted(InputLine::Button3));
        levels.set(InputLine::Button3, is_press(EdgeKind::Rising));
        assert!(!levels.is_asserted(InputLine::Button3));
    }
}
