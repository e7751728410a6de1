//! Background render tasks.
//!
//! A [`ScrollTask`] owns one thread that draws a single page until it is
//! cancelled. Cancellation is cooperative through a [`CancelToken`]; every
//! sleep inside the task is a wait on that token, so a cancel is seen within
//! one frame interval.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, trace, warn};

use crate::config::RenderConfig;
use crate::error::DisplayError;
use crate::frame::Frame;
use crate::page::{Page, PageContent, StatsSnapshot};
use crate::panel::SharedPanel;
use crate::providers::StatsProvider;
use crate::render::{FrameRenderer, RenderPlan, ScrollPlan};

// =============================================================================
// Cancellation
// =============================================================================

/// A cancel flag that can also be slept on.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake any waiter.
    pub fn cancel(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `timeout` or until cancelled, whichever comes first.
    ///
    /// Returns `true` if the token is cancelled.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

// =============================================================================
// Task gauge
// =============================================================================

/// Counts render threads, used to check that only one ever runs at a time.
#[derive(Debug, Default)]
pub struct TaskGauge {
    live: AtomicUsize,
    peak: AtomicUsize,
    started: AtomicUsize,
}

impl TaskGauge {
    /// Render threads currently running.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Highest number of render threads ever running at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Render threads started so far.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>) -> LiveGuard {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);
        LiveGuard(Arc::clone(self))
    }
}

struct LiveGuard(Arc<TaskGauge>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::SeqCst);
    }
}

// =============================================================================
// ScrollTask
// =============================================================================

/// Everything a render task needs besides its content.
#[derive(Clone)]
pub struct TaskContext {
    /// Where frames go.
    pub panel: SharedPanel,
    /// Panel geometry and fonts.
    pub renderer: FrameRenderer,
    /// Re-queried by the stats page on every redraw.
    pub stats: Arc<dyn StatsProvider>,
    /// Frame cadences.
    pub timing: RenderConfig,
    /// Shared thread counter.
    pub gauge: Arc<TaskGauge>,
}

/// One running page render.
///
/// Dropping the task cancels it and waits for its thread.
pub struct ScrollTask {
    page: Page,
    token: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl ScrollTask {
    /// Start rendering `content` on a new thread.
    ///
    /// # Errors
    ///
    /// [`DisplayError::Spawn`] if the thread could not be created.
    pub fn spawn(content: PageContent, ctx: &TaskContext) -> Result<Self, DisplayError> {
        let page = content.page();
        let token = CancelToken::new();

        let handle = {
            let ctx = ctx.clone();
            let token = token.clone();
            std::thread::Builder::new()
                .name(format!("render-{page:?}").to_lowercase())
                .spawn(move || {
                    let _live = ctx.gauge.enter();
                    debug!("render task for {:?} started", page);
                    match run(content, &ctx, &token) {
                        Ok(()) => debug!("render task for {:?} finished", page),
                        Err(e) => warn!("render task for {:?} stopped: {}", page, e),
                    }
                })
                .map_err(DisplayError::Spawn)?
        };
        ctx.gauge.started.fetch_add(1, Ordering::SeqCst);

        Ok(Self {
            page,
            token,
            handle: Some(handle),
        })
    }

    /// The page this task draws.
    pub fn page(&self) -> Page {
        self.page
    }

    /// Whether the thread has exited (static frame held, error, or cancelled).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Ask the task to stop without waiting for it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel the task and block until its thread has exited.
    pub fn stop(mut self) {
        self.cancel_and_join();
    }

    fn cancel_and_join(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("render task for {:?} panicked", self.page);
            }
        }
    }
}

impl Drop for ScrollTask {
    fn drop(&mut self) {
        self.cancel_and_join();
    }
}

impl std::fmt::Debug for ScrollTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollTask")
            .field("page", &self.page)
            .field("cancelled", &self.token.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}

fn run(content: PageContent, ctx: &TaskContext, token: &CancelToken) -> Result<(), DisplayError> {
    match content {
        PageContent::Stats(first) => run_stats(first, ctx, token),
        content => match ctx.renderer.plan(&content) {
            RenderPlan::Static(frame) => {
                show(ctx, &frame)?;
                token.wait(ctx.timing.static_hold());
                Ok(())
            }
            RenderPlan::Scrolling(plan) => run_scroll(&plan, ctx, token),
        },
    }
}

fn run_scroll(plan: &ScrollPlan, ctx: &TaskContext, token: &CancelToken) -> Result<(), DisplayError> {
    let cadence = ctx.timing.scroll_cadence();
    while !token.is_cancelled() {
        for offset in 0..plan.span() {
            if token.is_cancelled() {
                return Ok(());
            }
            trace!("scroll offset {}/{}", offset, plan.span());
            show(ctx, &plan.frame_at(offset))?;
            if token.wait(cadence) {
                return Ok(());
            }
        }
    }
    Ok(())
}

fn run_stats(
    first: StatsSnapshot,
    ctx: &TaskContext,
    token: &CancelToken,
) -> Result<(), DisplayError> {
    let mut snapshot = first;
    loop {
        show(ctx, &ctx.renderer.render(&PageContent::Stats(snapshot), 0))?;
        if token.wait(ctx.timing.stats_interval()) {
            return Ok(());
        }
        snapshot = ctx.stats.query();
    }
}

fn show(ctx: &TaskContext, frame: &Frame) -> Result<(), DisplayError> {
    ctx.panel
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .display(frame)
}
