//! Joystick and button handling.
//!
//! Each hardware line delivers falling edges on its own thread. The
//! [`InputDispatcher`] maps a line to an [`Intent`] and calls into the page
//! controller, the brightness control or the power commands.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::brightness::Brightness;
use crate::config::{LONG_PRESS_THRESHOLD, PinConfig};
use crate::controller::PageController;
use crate::error::DisplayError;
use crate::power::PowerControl;

// =============================================================================
// Lines and intents
// =============================================================================

/// A physical input, active low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputLine {
    /// Joystick pushed right.
    JoystickRight,
    /// Joystick pushed left.
    JoystickLeft,
    /// First push-button.
    Button1,
    /// Second push-button.
    Button2,
    /// Third push-button.
    Button3,
}

impl InputLine {
    /// Every input, in registration order.
    pub const ALL: [InputLine; 5] = [
        InputLine::JoystickRight,
        InputLine::JoystickLeft,
        InputLine::Button1,
        InputLine::Button2,
        InputLine::Button3,
    ];

    /// What pressing this input does.
    pub fn intent(self) -> Intent {
        match self {
            InputLine::JoystickRight => Intent::NextPage,
            InputLine::JoystickLeft => Intent::PreviousPage,
            InputLine::Button1 => Intent::CycleBrightness,
            InputLine::Button2 => Intent::HoldToReboot,
            InputLine::Button3 => Intent::HoldToShutdown,
        }
    }

    /// The GPIO offset this input is wired to.
    pub fn pin(self, pins: &PinConfig) -> u32 {
        match self {
            InputLine::JoystickRight => pins.next,
            InputLine::JoystickLeft => pins.previous,
            InputLine::Button1 => pins.brightness,
            InputLine::Button2 => pins.reboot,
            InputLine::Button3 => pins.shutdown,
        }
    }
}

/// What an input asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Show the next page.
    NextPage,
    /// Show the previous page.
    PreviousPage,
    /// Step the panel contrast.
    CycleBrightness,
    /// Reboot if held for the long-press threshold.
    HoldToReboot,
    /// Shut down if held for the long-press threshold.
    HoldToShutdown,
}

// =============================================================================
// Edge source
// =============================================================================

/// Callback run on a debounced falling edge.
pub type EdgeHandler = Box<dyn Fn() + Send + Sync + 'static>;

/// Trait for hardware that delivers edge events.
pub trait EdgeSource {
    /// Call `handler` on every falling edge of `line`, dropping edges that
    /// arrive within `debounce` of the last accepted one.
    ///
    /// # Errors
    ///
    /// [`DisplayError::InputRegistration`] if the line can't be claimed.
    fn register(
        &mut self,
        line: InputLine,
        pin: u32,
        debounce: Duration,
        handler: EdgeHandler,
    ) -> Result<(), DisplayError>;

    /// Release every registered line.
    fn release(&mut self) {}
}

/// Trait for reading the current level of an input.
pub trait LineReader: Send + Sync {
    /// Whether `line` is held (pulled low).
    fn is_asserted(&self, line: InputLine) -> bool;
}

/// Drops edges that follow an accepted edge too closely.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last: Mutex<Option<Instant>>,
}

impl Debouncer {
    /// Debouncer with the given window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: Mutex::new(None),
        }
    }

    /// Whether an edge at `now` should be handled.
    pub fn accept(&self, now: Instant) -> bool {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        match *last {
            Some(prev) if now.saturating_duration_since(prev) < self.window => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

// =============================================================================
// Long press
// =============================================================================

/// Detects a button held continuously for a threshold.
#[derive(Debug, Clone, Copy)]
pub struct LongPress {
    threshold: Duration,
    poll: Duration,
}

impl LongPress {
    /// The fixed three second hold, sampled every `poll`.
    pub fn new(poll: Duration) -> Self {
        Self::with_threshold(LONG_PRESS_THRESHOLD, poll)
    }

    /// A hold detector with a custom threshold.
    pub fn with_threshold(threshold: Duration, poll: Duration) -> Self {
        Self { threshold, poll }
    }

    /// Block while `asserted` holds. Returns `true` once it has held for the
    /// threshold, `false` as soon as it is released.
    pub fn wait(&self, asserted: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        self.wait_with(|| start.elapsed(), asserted, std::thread::sleep)
    }

    /// [`wait`](Self::wait) with an explicit clock and sleep.
    ///
    /// The line is sampled before the elapsed time, so a hold of exactly the
    /// threshold counts and a release just before it does not.
    pub fn wait_with(
        &self,
        mut elapsed: impl FnMut() -> Duration,
        mut asserted: impl FnMut() -> bool,
        mut sleep: impl FnMut(Duration),
    ) -> bool {
        loop {
            if !asserted() {
                return false;
            }
            if elapsed() >= self.threshold {
                return true;
            }
            sleep(self.poll);
        }
    }
}

// =============================================================================
// InputDispatcher
// =============================================================================

/// Turns input edges into page, brightness and power actions.
pub struct InputDispatcher {
    controller: Arc<PageController>,
    brightness: Arc<Brightness>,
    power: Arc<dyn PowerControl>,
    lines: Arc<dyn LineReader>,
    long_press: LongPress,
}

impl InputDispatcher {
    /// Create a dispatcher.
    pub fn new(
        controller: Arc<PageController>,
        brightness: Arc<Brightness>,
        power: Arc<dyn PowerControl>,
        lines: Arc<dyn LineReader>,
        long_press: LongPress,
    ) -> Self {
        Self {
            controller,
            brightness,
            power,
            lines,
            long_press,
        }
    }

    /// Register every input line with `source`.
    ///
    /// # Errors
    ///
    /// Fails on the first line that can't be registered; the device has no
    /// other controls, so callers treat this as fatal.
    pub fn register_all(
        self: &Arc<Self>,
        source: &mut dyn EdgeSource,
        pins: &PinConfig,
        debounce: Duration,
    ) -> Result<(), DisplayError> {
        for line in InputLine::ALL {
            let dispatcher = Arc::clone(self);
            source.register(
                line,
                line.pin(pins),
                debounce,
                Box::new(move || dispatcher.handle(line)),
            )?;
            debug!("registered {:?} on pin {}", line, line.pin(pins));
        }
        Ok(())
    }

    /// Act on an edge of `line`. Hold intents block until the hold resolves.
    pub fn handle(&self, line: InputLine) {
        let intent = line.intent();
        debug!("{:?} -> {:?}", line, intent);
        match intent {
            Intent::NextPage => {
                if let Err(e) = self.controller.advance() {
                    warn!("page advance failed: {}", e);
                }
            }
            Intent::PreviousPage => {
                if let Err(e) = self.controller.retreat() {
                    warn!("page retreat failed: {}", e);
                }
            }
            Intent::CycleBrightness => {
                if let Err(e) = self.brightness.cycle() {
                    warn!("brightness change failed: {}", e);
                }
            }
            Intent::HoldToReboot => {
                if self.held(line) {
                    self.power.reboot();
                }
            }
            Intent::HoldToShutdown => {
                if self.held(line) {
                    self.power.shutdown();
                }
            }
        }
    }

    fn held(&self, line: InputLine) -> bool {
        let held = self.long_press.wait(|| self.lines.is_asserted(line));
        if !held {
            info!("{:?} released early, ignoring", line);
        }
        held
    }
}
