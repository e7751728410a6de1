//! In-memory stand-ins for the panel, providers, power and GPIO.
//!
//! These let the page controller and input dispatcher run without an OLED,
//! a Raspberry Pi or a running emulator. The headless mode of the binary
//! uses them too.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::DisplayError;
use crate::frame::Frame;
use crate::input::{Debouncer, EdgeHandler, EdgeSource, InputLine, LineReader};
use crate::page::{GameInfo, MediaInfo, StatsSnapshot};
use crate::panel::Panel;
use crate::power::PowerControl;
use crate::providers::{GameInfoProvider, MediaInfoProvider, StatsProvider};

/// Frames kept by [`MockPanel`]; later frames are counted but not stored.
const MAX_RECORDED_FRAMES: usize = 1024;

// =============================================================================
// Panel
// =============================================================================

#[derive(Debug, Default)]
struct PanelRecord {
    frames: Vec<Frame>,
    frame_count: usize,
    last: Option<Frame>,
    contrast: Vec<u8>,
    fail_writes: bool,
}

/// A panel that records what it is given.
///
/// Clones share the same record, so a test can keep one clone and hand
/// the other to the controller.
///
/// # Example
///
/// ```
/// use retropanel_core::{Frame, MockPanel, Panel};
///
/// let mut panel = MockPanel::new(128, 64);
/// panel.display(&Frame::new(128, 64)).unwrap();
/// panel.set_contrast(255).unwrap();
/// assert_eq!(panel.frame_count(), 1);
/// assert_eq!(panel.contrast_history(), [255]);
/// ```
#[derive(Debug, Clone)]
pub struct MockPanel {
    width: u32,
    height: u32,
    record: Arc<Mutex<PanelRecord>>,
}

impl MockPanel {
    /// Create a mock panel of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            record: Arc::new(Mutex::new(PanelRecord::default())),
        }
    }

    /// Frames displayed so far.
    pub fn frame_count(&self) -> usize {
        self.record().frame_count
    }

    /// The first frames displayed, in order.
    pub fn frames(&self) -> Vec<Frame> {
        self.record().frames.clone()
    }

    /// The most recent frame.
    pub fn last_frame(&self) -> Option<Frame> {
        self.record().last.clone()
    }

    /// Every contrast value set, in order.
    pub fn contrast_history(&self) -> Vec<u8> {
        self.record().contrast.clone()
    }

    /// Make every later write fail with [`DisplayError::Panel`].
    pub fn fail_writes(&self, fail: bool) {
        self.record().fail_writes = fail;
    }

    fn record(&self) -> std::sync::MutexGuard<'_, PanelRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Panel for MockPanel {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn display(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        let mut record = self.record();
        if record.fail_writes {
            return Err(DisplayError::Panel("mock write failure".to_string()));
        }
        record.frame_count += 1;
        if record.frames.len() < MAX_RECORDED_FRAMES {
            record.frames.push(frame.clone());
        }
        record.last = Some(frame.clone());
        Ok(())
    }

    fn set_contrast(&mut self, level: u8) -> Result<(), DisplayError> {
        let mut record = self.record();
        if record.fail_writes {
            return Err(DisplayError::Panel("mock write failure".to_string()));
        }
        record.contrast.push(level);
        Ok(())
    }
}

// =============================================================================
// Providers
// =============================================================================

/// Game provider that plays back a script.
///
/// Each query returns the next scripted game; once the script runs out the
/// last game is repeated.
#[derive(Debug)]
pub struct ScriptedGameProvider {
    script: Mutex<VecDeque<GameInfo>>,
    current: Mutex<GameInfo>,
    queries: AtomicUsize,
}

impl ScriptedGameProvider {
    /// Play back `games` in order.
    pub fn new(games: Vec<GameInfo>) -> Self {
        Self {
            script: Mutex::new(games.into()),
            current: Mutex::new(GameInfo::menu()),
            queries: AtomicUsize::new(0),
        }
    }

    /// Always in the front-end menu.
    pub fn menu() -> Self {
        Self::new(Vec::new())
    }

    /// Drop the rest of the script and report `game` from now on.
    pub fn set(&self, game: GameInfo) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = game;
    }

    /// Append `game` to the script.
    pub fn push(&self, game: GameInfo) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(game);
    }

    /// Number of queries served.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl GameInfoProvider for ScriptedGameProvider {
    fn query(&self) -> GameInfo {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            *current = next;
        }
        current.clone()
    }
}

/// Media provider returning a fixed track.
#[derive(Debug)]
pub struct StaticMedia {
    media: Mutex<MediaInfo>,
}

impl StaticMedia {
    /// Always report `media`.
    pub fn new(media: MediaInfo) -> Self {
        Self {
            media: Mutex::new(media),
        }
    }

    /// Replace the reported track.
    pub fn set(&self, media: MediaInfo) {
        *self.media.lock().unwrap_or_else(PoisonError::into_inner) = media;
    }
}

impl Default for StaticMedia {
    fn default() -> Self {
        Self::new(MediaInfo::placeholder())
    }
}

impl MediaInfoProvider for StaticMedia {
    fn query(&self) -> MediaInfo {
        self.media
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Stats provider returning a fixed snapshot and counting queries.
#[derive(Debug, Default)]
pub struct StaticStats {
    snapshot: Mutex<StatsSnapshot>,
    queries: AtomicUsize,
}

impl StaticStats {
    /// Always report `snapshot`.
    pub fn new(snapshot: StatsSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            queries: AtomicUsize::new(0),
        }
    }

    /// Replace the reported snapshot.
    pub fn set(&self, snapshot: StatsSnapshot) {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    /// Number of queries served.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl StatsProvider for StaticStats {
    fn query(&self) -> StatsSnapshot {
        self.queries.fetch_add(1, Ordering::SeqCst);
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Power
// =============================================================================

/// A command recorded by [`MockPower`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerCommand {
    /// [`PowerControl::reboot`] was called.
    Reboot,
    /// [`PowerControl::shutdown`] was called.
    Shutdown,
}

/// Power control that only records commands.
#[derive(Debug, Default)]
pub struct MockPower {
    commands: Mutex<Vec<PowerCommand>>,
}

impl MockPower {
    /// Commands issued so far.
    pub fn commands(&self) -> Vec<PowerCommand> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, command: PowerCommand) {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }
}

impl PowerControl for MockPower {
    fn reboot(&self) {
        self.record(PowerCommand::Reboot);
    }

    fn shutdown(&self) {
        self.record(PowerCommand::Shutdown);
    }
}

// =============================================================================
// GPIO
// =============================================================================

/// Line levels set by hand.
#[derive(Debug, Default)]
pub struct MockLines {
    asserted: Mutex<HashSet<InputLine>>,
}

impl MockLines {
    /// Press (`true`) or release (`false`) `line`.
    pub fn set_asserted(&self, line: InputLine, asserted: bool) {
        let mut lines = self.asserted.lock().unwrap_or_else(PoisonError::into_inner);
        if asserted {
            lines.insert(line);
        } else {
            lines.remove(&line);
        }
    }
}

impl LineReader for MockLines {
    fn is_asserted(&self, line: InputLine) -> bool {
        self.asserted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&line)
    }
}

/// A registered handler, shareable so it can run without the source borrowed.
pub type SharedHandler = Arc<dyn Fn() + Send + Sync + 'static>;

struct Registration {
    pin: u32,
    debouncer: Debouncer,
    handler: SharedHandler,
}

/// Edge source whose edges are triggered by hand.
///
/// Handlers run on the triggering thread, after the same debounce check a
/// hardware source applies.
#[derive(Default)]
pub struct MockEdgeSource {
    registrations: HashMap<InputLine, Registration>,
    fail_on: Option<InputLine>,
}

impl MockEdgeSource {
    /// An edge source that refuses to register `line`.
    pub fn failing_on(line: InputLine) -> Self {
        Self {
            registrations: HashMap::new(),
            fail_on: Some(line),
        }
    }

    /// Registered lines and their pins, in [`InputLine::ALL`] order.
    pub fn registered_pins(&self) -> Vec<(InputLine, u32)> {
        InputLine::ALL
            .iter()
            .filter_map(|line| self.registrations.get(line).map(|r| (*line, r.pin)))
            .collect()
    }

    /// Deliver a falling edge on `line` now.
    pub fn trigger(&self, line: InputLine) -> bool {
        self.trigger_at(line, Instant::now())
    }

    /// Deliver a falling edge on `line` at `now`.
    ///
    /// Returns `true` if a handler ran.
    pub fn trigger_at(&self, line: InputLine, now: Instant) -> bool {
        match self.accept_edge(line, now) {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }

    /// Run the debounce check for an edge on `line` at `now` and return the
    /// handler to call, without calling it.
    ///
    /// Lets a caller that shares the source behind a lock release the lock
    /// before a long-running handler starts.
    pub fn accept_edge(&self, line: InputLine, now: Instant) -> Option<SharedHandler> {
        self.registrations
            .get(&line)
            .filter(|registration| registration.debouncer.accept(now))
            .map(|registration| Arc::clone(&registration.handler))
    }
}

impl EdgeSource for MockEdgeSource {
    fn register(
        &mut self,
        line: InputLine,
        pin: u32,
        debounce: Duration,
        handler: EdgeHandler,
    ) -> Result<(), DisplayError> {
        if self.fail_on == Some(line) {
            return Err(DisplayError::InputRegistration {
                line,
                pin,
                reason: "line busy".to_string(),
            });
        }
        self.registrations.insert(
            line,
            Registration {
                pin,
                debouncer: Debouncer::new(debounce),
                handler: Arc::from(handler),
            },
        );
        Ok(())
    }

    fn release(&mut self) {
        self.registrations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_provider_repeats_last() {
        let provider = ScriptedGameProvider::new(vec![
            GameInfo::new("nes", "Contra"),
            GameInfo::new("gba", "Metroid Fusion"),
        ]);
        assert_eq!(provider.query().game_title, "Contra");
        assert_eq!(provider.query().game_title, "Metroid Fusion");
        assert_eq!(provider.query().game_title, "Metroid Fusion");
        assert_eq!(provider.queries(), 3);

        provider.set(GameInfo::menu());
        assert_eq!(provider.query(), GameInfo::menu());

        provider.push(GameInfo::new("n64", "Mario Kart 64"));
        assert_eq!(provider.query().game_title, "Mario Kart 64");
        assert_eq!(provider.query().game_title, "Mario Kart 64");
    }

    #[test]
    fn test_mock_panel_records_until_failure() {
        let mut panel = MockPanel::new(128, 64);
        let observer = panel.clone();
        panel.display(&Frame::new(128, 64)).unwrap();
        observer.fail_writes(true);
        assert!(panel.display(&Frame::new(128, 64)).is_err());
        assert!(panel.set_contrast(10).is_err());
        assert_eq!(observer.frame_count(), 1);
        assert!(observer.contrast_history().is_empty());
    }

    #[test]
    fn test_edge_source_release_drops_handlers() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut source = MockEdgeSource::default();
        let counter = Arc::clone(&hits);
        source
            .register(
                InputLine::Button1,
                21,
                Duration::ZERO,
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        assert!(source.trigger(InputLine::Button1));
        assert!(!source.trigger(InputLine::Button2));
        source.release();
        assert!(!source.trigger(InputLine::Button1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_accept_edge_debounces_without_running_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut source = MockEdgeSource::default();
        let counter = Arc::clone(&hits);
        source
            .register(
                InputLine::Button2,
                20,
                Duration::from_millis(300),
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        let t0 = Instant::now();
        let handler = source.accept_edge(InputLine::Button2, t0).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(
            source
                .accept_edge(InputLine::Button2, t0 + Duration::from_millis(100))
                .is_none()
        );
        handler();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(source.accept_edge(InputLine::Button3, t0).is_none());
    }
}
