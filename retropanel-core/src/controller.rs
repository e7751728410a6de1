//! Page controller: the single owner of what is on screen.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::config::RenderConfig;
use crate::error::DisplayError;
use crate::page::{GameInfo, Page, PageContent};
use crate::panel::SharedPanel;
use crate::providers::Providers;
use crate::render::FrameRenderer;
use crate::task::{ScrollTask, TaskContext, TaskGauge};

/// Mutable controller state, only touched with the lock held.
#[derive(Debug)]
struct PageState {
    page: Page,
    task: Option<ScrollTask>,
    /// `(display_name, game_title)` of the game last put on screen.
    last_seen: Option<(String, String)>,
    last_page_change: Instant,
    shut_down: bool,
}

/// Owns the current page and its render task.
///
/// Every operation holds one lock for its whole cancel/fetch/start sequence,
/// so calls from the main loop and from button callbacks are totally
/// ordered, and a new render task is only started after the previous one has
/// been joined.
///
/// # Example
///
/// ```
/// use retropanel_core::{MockPanel, Page, PageController, Providers, RenderConfig, share_panel};
/// use retropanel_core::mock::{ScriptedGameProvider, StaticMedia, StaticStats};
/// use std::sync::Arc;
///
/// let providers = Providers {
///     game: Arc::new(ScriptedGameProvider::menu()),
///     media: Arc::new(StaticMedia::default()),
///     stats: Arc::new(StaticStats::default()),
/// };
/// let controller = PageController::new(
///     share_panel(MockPanel::new(128, 64)),
///     providers,
///     RenderConfig::default(),
/// );
/// controller.start()?;
/// assert_eq!(controller.advance()?, Page::Media);
/// controller.shutdown();
/// # Ok::<(), retropanel_core::DisplayError>(())
/// ```
pub struct PageController {
    state: Mutex<PageState>,
    providers: Providers,
    ctx: TaskContext,
}

impl PageController {
    /// Create a controller showing [`Page::Game`]. Nothing is drawn until
    /// [`start`](Self::start).
    pub fn new(panel: SharedPanel, providers: Providers, timing: RenderConfig) -> Self {
        let renderer = {
            let panel = panel.lock().unwrap_or_else(PoisonError::into_inner);
            FrameRenderer::new(panel.width(), panel.height())
        };
        let ctx = TaskContext {
            panel,
            renderer,
            stats: Arc::clone(&providers.stats),
            timing,
            gauge: Arc::new(TaskGauge::default()),
        };

        Self {
            state: Mutex::new(PageState {
                page: Page::default(),
                task: None,
                last_seen: None,
                last_page_change: Instant::now(),
                shut_down: false,
            }),
            providers,
            ctx,
        }
    }

    /// Draw the initial page.
    pub fn start(&self) -> Result<(), DisplayError> {
        let mut state = self.lock();
        let page = state.page;
        self.switch_locked(&mut state, page)
    }

    /// Stop the current task and show `page` with freshly fetched content.
    ///
    /// The task is always restarted, even when `page` is already showing.
    pub fn switch_to(&self, page: Page) -> Result<(), DisplayError> {
        let mut state = self.lock();
        self.switch_locked(&mut state, page)
    }

    /// Move to the next page and reset the automatic paging timer.
    ///
    /// Returns the page now showing. After [`shutdown`](Self::shutdown) that
    /// is the page that was showing, and the timer is left alone.
    pub fn advance(&self) -> Result<Page, DisplayError> {
        self.step(Page::next)
    }

    /// Move to the previous page and reset the automatic paging timer.
    pub fn retreat(&self) -> Result<Page, DisplayError> {
        self.step(Page::previous)
    }

    /// Advance if at least `interval` has passed since the last page change.
    ///
    /// The check and the advance happen under one lock, so a button press
    /// racing the automatic timer can't cause a double step.
    pub fn advance_if_due(
        &self,
        interval: Duration,
        now: Instant,
    ) -> Result<Option<Page>, DisplayError> {
        let mut state = self.lock();
        if state.shut_down || now.saturating_duration_since(state.last_page_change) < interval {
            return Ok(None);
        }
        let next = state.page.next();
        debug!("auto paging to {:?}", next);
        state.last_page_change = now;
        self.switch_locked(&mut state, next)?;
        Ok(Some(next))
    }

    /// Restart the game page if a different game is now running.
    ///
    /// Returns `true` if the render task was restarted. Does nothing on
    /// other pages.
    pub fn refresh_if_changed(&self) -> Result<bool, DisplayError> {
        let mut state = self.lock();
        if state.page != Page::Game || state.shut_down {
            return Ok(false);
        }

        let game = self.providers.game.query();
        let unchanged = state
            .last_seen
            .as_ref()
            .is_some_and(|(name, title)| (name.as_str(), title.as_str()) == game.identity());
        if unchanged {
            return Ok(false);
        }

        info!("game changed to {} / {}", game.display_name, game.game_title);
        self.install_game(&mut state, game)?;
        Ok(true)
    }

    /// Stop the render task for good. Later switches are ignored.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.shut_down = true;
        if let Some(task) = state.task.take() {
            debug!("stopping {:?} task for shutdown", task.page());
            task.stop();
        }
    }

    /// The page currently showing.
    pub fn current_page(&self) -> Page {
        self.lock().page
    }

    /// When the page last changed through [`advance`](Self::advance) or
    /// [`retreat`](Self::retreat).
    pub fn last_page_change(&self) -> Instant {
        self.lock().last_page_change
    }

    /// Restart the automatic paging timer without changing page.
    pub fn reset_page_timer(&self) {
        self.lock().last_page_change = Instant::now();
    }

    /// Render thread counters.
    pub fn gauge(&self) -> &TaskGauge {
        &self.ctx.gauge
    }

    /// Number of render tasks started so far.
    pub fn task_starts(&self) -> usize {
        self.ctx.gauge.started()
    }

    fn step(&self, direction: fn(Page) -> Page) -> Result<Page, DisplayError> {
        let mut state = self.lock();
        if state.shut_down {
            debug!("ignoring page step after shutdown");
            return Ok(state.page);
        }
        let target = direction(state.page);
        state.last_page_change = Instant::now();
        self.switch_locked(&mut state, target)?;
        Ok(target)
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn switch_locked(&self, state: &mut PageState, page: Page) -> Result<(), DisplayError> {
        if state.shut_down {
            debug!("ignoring switch to {:?} after shutdown", page);
            return Ok(());
        }

        // Stop first so no provider query overlaps a running render.
        Self::stop_task(state);

        match page {
            Page::Game => {
                let game = self.providers.game.query();
                self.install_game(state, game)
            }
            Page::Media => self.install(state, PageContent::Media(self.providers.media.query())),
            Page::Stats => self.install(state, PageContent::Stats(self.providers.stats.query())),
        }
    }

    fn install_game(&self, state: &mut PageState, game: GameInfo) -> Result<(), DisplayError> {
        state.last_seen = Some((game.display_name.clone(), game.game_title.clone()));
        self.install(state, PageContent::Game(game))
    }

    fn install(&self, state: &mut PageState, content: PageContent) -> Result<(), DisplayError> {
        Self::stop_task(state);
        let page = content.page();
        state.page = page;
        state.task = Some(ScrollTask::spawn(content, &self.ctx)?);
        info!("showing {:?} page", page);
        Ok(())
    }

    fn stop_task(state: &mut PageState) {
        if let Some(task) = state.task.take() {
            debug!("stopping {:?} task", task.page());
            task.stop();
        }
    }
}

impl Drop for PageController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockPanel, ScriptedGameProvider, StaticMedia, StaticStats};
    use crate::page::{MediaInfo, StatsSnapshot};
    use crate::panel;

    fn timing() -> RenderConfig {
        RenderConfig {
            scroll_cadence_ms: 1,
            static_hold_ms: 5,
            stats_interval_ms: 5,
        }
    }

    fn controller_with(game: ScriptedGameProvider) -> (PageController, MockPanel) {
        controller_with_media(game, Arc::new(StaticMedia::new(MediaInfo::placeholder())))
    }

    fn controller_with_media(
        game: ScriptedGameProvider,
        media: Arc<StaticMedia>,
    ) -> (PageController, MockPanel) {
        let panel = MockPanel::new(128, 64);
        let providers = Providers {
            game: Arc::new(game),
            media,
            stats: Arc::new(StaticStats::new(StatsSnapshot::default())),
        };
        (
            PageController::new(panel::share_panel(panel.clone()), providers, timing()),
            panel,
        )
    }

    #[test]
    fn test_advance_cycles_modulo_three() {
        let (controller, _panel) = controller_with(ScriptedGameProvider::menu());
        controller.start().unwrap();
        assert_eq!(controller.current_page(), Page::Game);

        for n in 1..=7 {
            controller.advance().unwrap();
            assert_eq!(controller.current_page(), Page::from_index(n));
        }

        let before = controller.current_page();
        for _ in 0..3 {
            controller.advance().unwrap();
        }
        assert_eq!(controller.current_page(), before);
    }

    #[test]
    fn test_retreat_wraps_backwards() {
        let (controller, _panel) = controller_with(ScriptedGameProvider::menu());
        controller.start().unwrap();
        assert_eq!(controller.retreat().unwrap(), Page::Stats);
        assert_eq!(controller.retreat().unwrap(), Page::Media);
        assert_eq!(controller.retreat().unwrap(), Page::Game);
    }

    #[test]
    fn test_advance_resets_page_timer() {
        let (controller, _panel) = controller_with(ScriptedGameProvider::menu());
        let before = controller.last_page_change();
        std::thread::sleep(Duration::from_millis(5));
        controller.advance().unwrap();
        assert!(controller.last_page_change() > before);

        let after_advance = controller.last_page_change();
        controller.switch_to(Page::Stats).unwrap();
        assert_eq!(controller.last_page_change(), after_advance);
    }

    #[test]
    fn test_advance_if_due_waits_for_interval() {
        let (controller, _panel) = controller_with(ScriptedGameProvider::menu());
        controller.start().unwrap();
        let interval = Duration::from_secs(5);
        let base = controller.last_page_change();

        assert_eq!(controller.advance_if_due(interval, base + Duration::from_secs(4)).unwrap(), None);
        assert_eq!(
            controller.advance_if_due(interval, base + interval).unwrap(),
            Some(Page::Media)
        );
        assert_eq!(controller.last_page_change(), base + interval);
        assert_eq!(
            controller.advance_if_due(interval, base + Duration::from_secs(9)).unwrap(),
            None
        );
        assert_eq!(
            controller.advance_if_due(interval, base + Duration::from_secs(10)).unwrap(),
            Some(Page::Stats)
        );
    }

    #[test]
    fn test_switch_to_same_page_restarts_task() {
        let (controller, _panel) = controller_with(ScriptedGameProvider::menu());
        controller.start().unwrap();
        controller.switch_to(Page::Game).unwrap();
        controller.switch_to(Page::Game).unwrap();
        assert_eq!(controller.task_starts(), 3);
        assert_eq!(controller.gauge().peak(), 1);
    }

    #[test]
    fn test_media_refetched_on_every_entry() {
        let media = Arc::new(StaticMedia::default());
        let (controller, panel) =
            controller_with_media(ScriptedGameProvider::menu(), Arc::clone(&media));
        let renderer = FrameRenderer::new(128, 64);
        let wait_for_frame = |expected: &crate::frame::Frame| {
            let deadline = Instant::now() + Duration::from_secs(5);
            while panel.last_frame().as_ref() != Some(expected) {
                assert!(Instant::now() < deadline, "frame never shown");
                std::thread::sleep(Duration::from_millis(1));
            }
        };

        controller.switch_to(Page::Media).unwrap();
        wait_for_frame(&renderer.render(&PageContent::Media(MediaInfo::placeholder()), 0));

        let track = MediaInfo {
            title: "Time".to_string(),
            artist: "Pink Floyd".to_string(),
            album: "Meddle".to_string(),
        };
        media.set(track.clone());
        controller.advance().unwrap();
        controller.retreat().unwrap();
        wait_for_frame(&renderer.render(&PageContent::Media(track), 0));
        controller.shutdown();
    }

    #[test]
    fn test_refresh_without_change_does_not_restart() {
        let (controller, _panel) = controller_with(ScriptedGameProvider::menu());
        controller.start().unwrap();
        for _ in 0..5 {
            assert!(!controller.refresh_if_changed().unwrap());
        }
        assert_eq!(controller.task_starts(), 1);
    }

    #[test]
    fn test_refresh_restarts_once_per_change() {
        let game = ScriptedGameProvider::new(vec![
            GameInfo::menu(),
            GameInfo::menu(),
            GameInfo::new("snes", "Chrono Trigger"),
            GameInfo::new("snes", "Chrono Trigger"),
            GameInfo::new("snes", "Chrono Trigger"),
            GameInfo::new("snes", "Super Metroid"),
            GameInfo::menu(),
            GameInfo::menu(),
        ]);
        let (controller, _panel) = controller_with(game);
        controller.start().unwrap();

        let restarts: Vec<bool> = (0..7)
            .map(|_| controller.refresh_if_changed().unwrap())
            .collect();
        assert_eq!(
            restarts,
            [false, true, false, false, true, true, false]
        );
        assert_eq!(controller.task_starts(), 4);
    }

    #[test]
    fn test_refresh_ignored_off_game_page() {
        let game = ScriptedGameProvider::new(vec![
            GameInfo::menu(),
            GameInfo::new("n64", "Mario Kart 64"),
        ]);
        let (controller, _panel) = controller_with(game);
        controller.start().unwrap();
        controller.switch_to(Page::Media).unwrap();
        assert!(!controller.refresh_if_changed().unwrap());
        assert_eq!(controller.task_starts(), 2);
    }

    #[test]
    fn test_concurrent_callers_never_overlap_tasks() {
        let (controller, _panel) = controller_with(ScriptedGameProvider::menu());
        let controller = Arc::new(controller);
        controller.start().unwrap();

        let workers: Vec<_> = (0..4)
            .map(|i| {
                let controller = Arc::clone(&controller);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        match i % 3 {
                            0 => {
                                controller.advance().unwrap();
                            }
                            1 => {
                                controller.refresh_if_changed().unwrap();
                            }
                            _ => controller.switch_to(Page::Stats).unwrap(),
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(controller.gauge().peak(), 1);
        controller.shutdown();
        assert_eq!(controller.gauge().live(), 0);
    }

    #[test]
    fn test_shutdown_stops_task_and_ignores_later_switches() {
        let (controller, _panel) = controller_with(ScriptedGameProvider::menu());
        controller.switch_to(Page::Stats).unwrap();
        controller.shutdown();
        assert_eq!(controller.gauge().live(), 0);

        let starts = controller.task_starts();
        let changed = controller.last_page_change();
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(controller.advance().unwrap(), Page::Stats);
        assert_eq!(controller.retreat().unwrap(), Page::Stats);
        assert_eq!(controller.current_page(), Page::Stats);
        assert_eq!(controller.last_page_change(), changed);
        assert_eq!(controller.task_starts(), starts);
    }
}
