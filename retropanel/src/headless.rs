//! Off-device stand-ins: a panel that logs and buttons read from stdin.

use std::io::BufRead;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};

use retropanel_core::mock::{MockEdgeSource, MockLines};
use retropanel_core::{
    CancelToken, DisplayError, EdgeHandler, EdgeSource, Frame, InputLine, Panel, PowerControl,
    share_panel,
};

use crate::Devices;

/// A panel that writes changed frames to the log.
pub struct LogPanel {
    width: u32,
    height: u32,
    last: Option<Frame>,
}

impl LogPanel {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            last: None,
        }
    }
}

impl Panel for LogPanel {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn display(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        if self.last.as_ref() == Some(frame) {
            return Ok(());
        }
        debug!("frame: {} pixels lit", frame.lit_count());
        trace!("\n{:?}", frame);
        self.last = Some(frame.clone());
        Ok(())
    }

    fn set_contrast(&mut self, level: u8) -> Result<(), DisplayError> {
        info!("contrast set to {}", level);
        Ok(())
    }
}

/// Logs power commands instead of running them.
pub struct LogPower;

impl PowerControl for LogPower {
    fn reboot(&self) {
        warn!("reboot requested (headless, ignoring)");
    }

    fn shutdown(&self) {
        warn!("shutdown requested (headless, ignoring)");
    }
}

/// A [`MockEdgeSource`] the keyboard thread can trigger after registration.
#[derive(Clone, Default)]
struct SharedEdges(Arc<Mutex<MockEdgeSource>>);

impl SharedEdges {
    /// Deliver a falling edge on `line`. The handler runs with the source
    /// unlocked, so a held button doesn't block registration or release.
    fn trigger(&self, line: InputLine) -> bool {
        let handler = self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .accept_edge(line, Instant::now());
        match handler {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }
}

impl EdgeSource for SharedEdges {
    fn register(
        &mut self,
        line: InputLine,
        pin: u32,
        debounce: Duration,
        handler: EdgeHandler,
    ) -> Result<(), DisplayError> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .register(line, pin, debounce, handler)
    }

    fn release(&mut self) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release();
    }
}

/// Reads single-letter commands from stdin and turns them into edges.
///
/// | key | input |
/// |-----|-------|
/// | `n` | joystick right |
/// | `p` | joystick left |
/// | `b` | button 1 |
/// | `r` / `R` | tap / hold button 2 |
/// | `s` / `S` | tap / hold button 3 |
/// | `q` | quit |
pub struct Keyboard {
    edges: SharedEdges,
    lines: Arc<MockLines>,
}

impl Keyboard {
    /// Start the reader thread. `q` cancels `token`.
    pub fn spawn(self, token: CancelToken) -> std::io::Result<()> {
        info!("headless: keys n/p/b/r/R/s/S/q then enter");
        std::thread::Builder::new()
            .name("keyboard".to_string())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    for key in line.trim().chars() {
                        if key == 'q' {
                            token.cancel();
                            return;
                        }
                        self.press(key);
                    }
                }
                debug!("stdin closed, keyboard reader exiting");
            })?;
        Ok(())
    }

    fn press(&self, key: char) {
        let (input, hold) = match key {
            'n' => (InputLine::JoystickRight, false),
            'p' => (InputLine::JoystickLeft, false),
            'b' => (InputLine::Button1, false),
            'r' => (InputLine::Button2, false),
            'R' => (InputLine::Button2, true),
            's' => (InputLine::Button3, false),
            'S' => (InputLine::Button3, true),
            other => {
                warn!("unknown key {:?}", other);
                return;
            }
        };

        self.lines.set_asserted(input, hold);
        if !self.edges.trigger(input) {
            debug!("{:?} debounced", input);
        }
        self.lines.set_asserted(input, false);
    }
}

/// Logging panel, keyboard buttons and no-op power control.
pub fn devices() -> Devices {
    let edges = SharedEdges::default();
    let lines = Arc::new(MockLines::default());
    Devices {
        panel: share_panel(LogPanel::new(128, 64)),
        edges: Box::new(edges.clone()),
        lines: Arc::clone(&lines) as _,
        power: Arc::new(LogPower),
        keyboard: Some(Keyboard { edges, lines }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_handler_runs_with_edges_unlocked() {
        let mut edges = SharedEdges::default();
        let inner = edges.clone();
        let (tx, rx) = mpsc::channel();
        edges
            .register(
                InputLine::Button2,
                20,
                Duration::ZERO,
                Box::new(move || {
                    // Locks the same source the trigger came through.
                    let pins = inner
                        .0
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .registered_pins();
                    let _ = tx.send(pins);
                }),
            )
            .unwrap();

        let trigger = edges.clone();
        std::thread::spawn(move || trigger.trigger(InputLine::Button2));
        let pins = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(pins, [(InputLine::Button2, 20)]);

        edges.release();
        assert!(!edges.trigger(InputLine::Button2));
    }
}
