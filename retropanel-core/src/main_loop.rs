//! The once-a-second supervisor loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::PagingConfig;
use crate::controller::PageController;
use crate::error::DisplayError;
use crate::page::Page;
use crate::task::CancelToken;

/// Default time between supervisor ticks.
pub const TICK: Duration = Duration::from_secs(1);

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    /// Page advanced to by the automatic timer, if any.
    pub advanced: Option<Page>,
    /// Whether the game page was restarted for a new game.
    pub refreshed: bool,
}

/// Drives automatic paging and game change detection.
///
/// Runs on the caller's thread until its [`CancelToken`] is cancelled, then
/// stops the render task.
pub struct MainLoop {
    controller: Arc<PageController>,
    paging: PagingConfig,
    tick: Duration,
    token: CancelToken,
}

impl MainLoop {
    /// Create a loop ticking every [`TICK`].
    pub fn new(controller: Arc<PageController>, paging: PagingConfig) -> Self {
        Self::with_tick(controller, paging, TICK)
    }

    /// Create a loop with a custom tick.
    pub fn with_tick(controller: Arc<PageController>, paging: PagingConfig, tick: Duration) -> Self {
        Self {
            controller,
            paging,
            tick,
            token: CancelToken::new(),
        }
    }

    /// A handle that stops [`run`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// One iteration: advance if the paging interval has elapsed, then check
    /// the game page for a new game.
    pub fn tick(&self, now: Instant) -> Result<TickOutcome, DisplayError> {
        let advanced = if self.paging.enabled {
            self.controller.advance_if_due(self.paging.interval(), now)?
        } else {
            None
        };
        let refreshed = self.controller.refresh_if_changed()?;
        Ok(TickOutcome {
            advanced,
            refreshed,
        })
    }

    /// Show the first page and tick until cancelled.
    pub fn run(&self) -> Result<(), DisplayError> {
        info!(
            "main loop started (auto paging {}, every {:?})",
            if self.paging.enabled { "on" } else { "off" },
            self.paging.interval()
        );
        self.controller.start()?;
        self.controller.reset_page_timer();

        loop {
            match self.tick(Instant::now()) {
                Ok(outcome) if outcome != TickOutcome::default() => debug!("tick: {:?}", outcome),
                Ok(_) => {}
                Err(e) => warn!("tick failed: {}", e),
            }
            if self.token.wait(self.tick) {
                break;
            }
        }

        info!("main loop stopping");
        self.controller.shutdown();
        Ok(())
    }
}
