//! Page cycling, scrolling and button handling for a RetroPie status OLED.
//!
//! This crate drives a small monochrome panel (typically an SSD1306 over I2C)
//! that shows one of three pages:
//!
//! - **Game**: the running emulator system and rom title, or the menu.
//! - **Media**: the track an MPRIS player is playing.
//! - **Stats**: CPU load, SoC temperature and memory use.
//!
//! Text wider than the panel scrolls in from the right on a background
//! thread. A joystick moves between pages, one button cycles brightness and
//! two more reboot or power off the machine when held.
//!
//! # Architecture
//!
//! - [`PageController`] owns the current page and its [`ScrollTask`]. Every
//!   page change cancels and joins the running task before a new one starts.
//! - [`MainLoop`] ticks once a second for automatic paging and new-game
//!   detection.
//! - [`InputDispatcher`] maps [`InputLine`] edges from an [`EdgeSource`] to
//!   page, [`Brightness`] and [`PowerControl`] actions.
//! - Hardware sits behind the [`Panel`], [`EdgeSource`] and [`LineReader`]
//!   traits; content comes from the [`Providers`].
//!
//! # Example
//!
//! ```
//! use retropanel_core::mock::{ScriptedGameProvider, StaticMedia, StaticStats};
//! use retropanel_core::{
//!     GameInfo, MainLoop, MockPanel, Page, PageController, PagingConfig, Providers,
//!     RenderConfig, share_panel,
//! };
//! use std::sync::Arc;
//!
//! let panel = MockPanel::new(128, 64);
//! let game = Arc::new(ScriptedGameProvider::menu());
//! let providers = Providers {
//!     game: game.clone(),
//!     media: Arc::new(StaticMedia::default()),
//!     stats: Arc::new(StaticStats::default()),
//! };
//! let controller = Arc::new(PageController::new(
//!     share_panel(panel.clone()),
//!     providers,
//!     RenderConfig::default(),
//! ));
//! controller.start()?;
//!
//! let main_loop = MainLoop::new(controller.clone(), PagingConfig::default());
//! game.set(GameInfo::new("snes", "Chrono Trigger"));
//! assert!(main_loop.tick(std::time::Instant::now())?.refreshed);
//! assert_eq!(controller.current_page(), Page::Game);
//! controller.shutdown();
//! # Ok::<(), retropanel_core::DisplayError>(())
//! ```
//!
//! # Testing
//!
//! The [`mock`] module has in-memory versions of every hardware trait and
//! provider, so the whole stack runs without a Raspberry Pi.

#![warn(missing_docs)]

mod brightness;
mod config;
mod controller;
mod error;
mod frame;
mod input;
mod main_loop;
pub mod mock;
mod page;
mod panel;
mod power;
mod providers;
mod render;
mod task;

// Re-export public API
pub use brightness::Brightness;
pub use config::{
    BrightnessConfig, Config, InputConfig, LONG_PRESS_THRESHOLD, PagingConfig, PinConfig,
    RenderConfig,
};
pub use controller::PageController;
pub use error::DisplayError;
pub use frame::Frame;
pub use input::{
    Debouncer, EdgeHandler, EdgeSource, InputDispatcher, InputLine, Intent, LineReader, LongPress,
};
pub use main_loop::{MainLoop, TICK, TickOutcome};
pub use mock::MockPanel;
pub use page::{
    GameInfo, MENU_SYSTEM, MENU_TITLE, MediaInfo, Page, PageContent, StatsSnapshot,
    system_display_name,
};
pub use panel::{Panel, SharedPanel, share_panel};
pub use power::{PowerControl, SystemPower};
pub use providers::{
    GameInfoProvider, MediaInfoProvider, PlayerctlMedia, ProcessGameProvider, Providers,
    StatsProvider, SystemStats, THERMAL_ZONE, game_from_cmdline, parse_metadata,
    read_temperature,
};
pub use render::{FontSize, FrameRenderer, PageLayout, RenderPlan, STRIP_HEIGHT, ScrollPlan, TextLine};
pub use task::{CancelToken, ScrollTask, TaskContext, TaskGauge};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ScriptedGameProvider, StaticMedia, StaticStats};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn timing() -> RenderConfig {
        RenderConfig {
            scroll_cadence_ms: 1,
            static_hold_ms: 20,
            stats_interval_ms: 5,
        }
    }

    fn wait_for_frames(panel: &MockPanel, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while panel.frame_count() < count {
            assert!(Instant::now() < deadline, "panel never got {count} frames");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_menu_renders_static_centered() {
        let _ = env_logger::builder().is_test(true).try_init();
        let panel = MockPanel::new(128, 64);
        let controller = PageController::new(
            share_panel(panel.clone()),
            Providers {
                game: Arc::new(ScriptedGameProvider::menu()),
                media: Arc::new(StaticMedia::default()),
                stats: Arc::new(StaticStats::default()),
            },
            timing(),
        );
        controller.start().unwrap();
        wait_for_frames(&panel, 1);

        let renderer = FrameRenderer::new(128, 64);
        let content = PageContent::Game(GameInfo::menu());
        let layout = renderer.layout(&content);
        assert!(layout.header.text.contains("Now Playing"));
        assert_eq!(layout.lines[0].text, "RetroPie");
        assert_eq!(layout.content.as_ref().map(|l| l.text.as_str()), Some("Menu"));

        let RenderPlan::Static(expected) = renderer.plan(&content) else {
            panic!("menu should fit without scrolling");
        };
        assert_eq!(panel.frames()[0], expected);

        // "Menu" sits in the middle of the content row, inside the border.
        let mut inner = Frame::new(126, 64);
        inner.paste(&expected, 1, 126, embedded_graphics::prelude::Point::zero());
        let (left, right) = inner.lit_columns(40, 50).unwrap();
        assert!((left as i32 - (125 - right) as i32).abs() <= 3);
        controller.shutdown();
    }

    #[test]
    fn test_rom_path_resolves_system_name() {
        let args: Vec<String> = [
            "/opt/retropie/emulators/retroarch/bin/retroarch",
            "-L",
            "/opt/retropie/libretrocores/lr-snes9x/snes9x_libretro.so",
            "/home/pi/RetroPie/roms/snes/Chrono Trigger.sfc",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let game = game_from_cmdline(&args).unwrap();
        assert_eq!(game.system_id, "snes");
        assert_eq!(game.game_title, "Chrono Trigger");
        assert_eq!(game.display_name, "Super Nintendo");
    }

    #[test]
    fn test_missing_player_shows_placeholders() {
        let media = PlayerctlMedia::with_player("retropanel-no-such-player").query();
        assert_eq!(media, MediaInfo::placeholder());

        let layout = FrameRenderer::new(128, 64).layout(&PageContent::Media(media));
        assert!(layout.lines.iter().all(|line| !line.text.is_empty()));
        assert_eq!(layout.content.map(|l| l.text), Some("Track: ".to_string()));
    }

    #[test]
    fn test_stats_lines_in_order() {
        let panel = MockPanel::new(128, 64);
        let snapshot = StatsSnapshot {
            cpu_percent: 55.3,
            ram_percent: 40.0,
            temperature_celsius: 47.2,
        };
        let controller = PageController::new(
            share_panel(panel.clone()),
            Providers {
                game: Arc::new(ScriptedGameProvider::menu()),
                media: Arc::new(StaticMedia::default()),
                stats: Arc::new(StaticStats::new(snapshot)),
            },
            timing(),
        );
        controller.switch_to(Page::Stats).unwrap();
        wait_for_frames(&panel, 2);
        controller.shutdown();

        let renderer = FrameRenderer::new(128, 64);
        let content = PageContent::Stats(snapshot);
        let layout = renderer.layout(&content);
        let lines: Vec<(&str, i32)> = layout
            .lines
            .iter()
            .map(|line| (line.text.as_str(), line.y))
            .collect();
        assert_eq!(
            lines,
            [("CPU: 55.3%", 20), ("GPU: 47.2°C", 30), ("RAM: 40.0%", 40)]
        );
        assert_eq!(panel.frames()[0], renderer.render(&content, 0));
    }

    #[test]
    fn test_button_press_during_auto_paging() {
        let panel = MockPanel::new(128, 64);
        let controller = Arc::new(PageController::new(
            share_panel(panel.clone()),
            Providers {
                game: Arc::new(ScriptedGameProvider::menu()),
                media: Arc::new(StaticMedia::default()),
                stats: Arc::new(StaticStats::default()),
            },
            timing(),
        ));
        controller.start().unwrap();
        let main_loop = MainLoop::new(Arc::clone(&controller), PagingConfig::default());

        // The press restarts the interval, so the timer waits a full period
        // from the press rather than from the previous change.
        let base = controller.last_page_change();
        std::thread::sleep(Duration::from_millis(2));
        controller.advance().unwrap();
        let pressed = controller.last_page_change();
        assert!(pressed > base);

        assert_eq!(main_loop.tick(base + Duration::from_secs(10)).unwrap().advanced, None);
        assert_eq!(
            main_loop
                .tick(pressed + Duration::from_secs(10))
                .unwrap()
                .advanced,
            Some(Page::Stats)
        );
        assert_eq!(controller.gauge().peak(), 1);
    }
}
