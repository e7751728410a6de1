//! Content providers: where the game, media and stats pages get their data.
//!
//! Providers never fail. Each one falls back to a placeholder value when its
//! source is unavailable, so the controller always has something to draw.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, trace};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

use crate::page::{GameInfo, MediaInfo, StatsSnapshot};

/// Process names of the emulators RetroPie launches.
const EMULATORS: &[&str] = &[
    "retroarch",
    "lr-mame",
    "mednafen",
    "pcsx-rearmed",
    "reicast",
    "mupen64plus",
    "daphne",
];

/// Extensions that mark a command line argument as a rom.
const ROM_EXTENSIONS: &[&str] = &[
    ".nes", ".sfc", ".gb", ".gba", ".gen", ".md", ".zip", ".cue", ".iso", ".pbp",
];

/// Default SoC temperature sensor on a Raspberry Pi.
pub const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

// =============================================================================
// Provider traits
// =============================================================================

/// Source of the currently running game.
pub trait GameInfoProvider: Send + Sync {
    /// The running game, or [`GameInfo::menu`] if none.
    fn query(&self) -> GameInfo;
}

/// Source of the currently playing track.
pub trait MediaInfoProvider: Send + Sync {
    /// The current track, or [`MediaInfo::placeholder`] if no player answers.
    fn query(&self) -> MediaInfo;
}

/// Source of host metrics.
pub trait StatsProvider: Send + Sync {
    /// A fresh metrics sample.
    fn query(&self) -> StatsSnapshot;
}

/// The three providers the page controller pulls from.
#[derive(Clone)]
pub struct Providers {
    /// Game page source.
    pub game: Arc<dyn GameInfoProvider>,
    /// Media page source.
    pub media: Arc<dyn MediaInfoProvider>,
    /// Stats page source.
    pub stats: Arc<dyn StatsProvider>,
}

impl Providers {
    /// The providers that read from the local system.
    pub fn system() -> Self {
        Self {
            game: Arc::new(ProcessGameProvider::new()),
            media: Arc::new(PlayerctlMedia::new()),
            stats: Arc::new(SystemStats::new()),
        }
    }
}

// =============================================================================
// Game: process table
// =============================================================================

/// Finds the running game by scanning emulator command lines.
pub struct ProcessGameProvider {
    system: Mutex<System>,
}

impl ProcessGameProvider {
    /// Create a provider with an empty process table.
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for ProcessGameProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GameInfoProvider for ProcessGameProvider {
    fn query(&self) -> GameInfo {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            process_refresh(),
        );

        for process in system.processes().values() {
            let name = process.name().to_string_lossy();
            if !EMULATORS.contains(&name.as_ref()) {
                continue;
            }
            let args: Vec<String> = process
                .cmd()
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect();
            if let Some(game) = game_from_cmdline(&args) {
                trace!("found {} running {:?}", name, game);
                return game;
            }
        }

        debug!("no emulator running, showing menu");
        GameInfo::menu()
    }
}

/// Only command lines are needed, and they never change for a running process.
fn process_refresh() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing().with_cmd(UpdateKind::OnlyIfNotSet)
}

/// Extract the system and title from an emulator's arguments.
///
/// The rom is the first argument inside a `roms` folder or with a known rom
/// extension. The system is the folder right below `roms`.
pub fn game_from_cmdline(args: &[String]) -> Option<GameInfo> {
    let rom = args.iter().find(|arg| {
        arg.contains("/roms/") || ROM_EXTENSIONS.iter().any(|ext| arg.ends_with(ext))
    })?;

    let parts: Vec<&str> = rom.split('/').collect();
    let system_id = parts
        .iter()
        .position(|part| *part == "roms")
        .and_then(|idx| parts.get(idx + 1))
        .map(|system| system.to_lowercase())
        .unwrap_or_else(|| "unknown".to_string());

    let title = Path::new(rom)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    Some(GameInfo::new(system_id, title))
}

// =============================================================================
// Media: MPRIS via playerctl
// =============================================================================

const FIELD_SEPARATOR: char = '\u{1f}';

/// Reads MPRIS metadata through the `playerctl` command.
pub struct PlayerctlMedia {
    player: Option<String>,
}

impl PlayerctlMedia {
    /// Query whichever player `playerctl` picks.
    pub fn new() -> Self {
        Self { player: None }
    }

    /// Query a specific player by MPRIS name.
    pub fn with_player(player: impl Into<String>) -> Self {
        Self {
            player: Some(player.into()),
        }
    }
}

impl Default for PlayerctlMedia {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaInfoProvider for PlayerctlMedia {
    fn query(&self) -> MediaInfo {
        let mut cmd = Command::new("playerctl");
        if let Some(ref player) = self.player {
            cmd.arg("--player").arg(player);
        }
        let format = format!("{{{{title}}}}{FIELD_SEPARATOR}{{{{artist}}}}{FIELD_SEPARATOR}{{{{album}}}}");
        cmd.args(["metadata", "--format", &format]);

        match cmd.output() {
            Ok(output) if output.status.success() => {
                parse_metadata(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                debug!(
                    "playerctl exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                MediaInfo::placeholder()
            }
            Err(e) => {
                debug!("failed to run playerctl: {}", e);
                MediaInfo::placeholder()
            }
        }
    }
}

/// Parse `title<US>artist<US>album` output. Empty fields become `Unknown`.
pub fn parse_metadata(output: &str) -> MediaInfo {
    let mut fields = output.trim_end_matches(['\r', '\n']).split(FIELD_SEPARATOR);
    let mut next = || {
        fields
            .next()
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .unwrap_or("Unknown")
            .to_string()
    };
    MediaInfo {
        title: next(),
        artist: next(),
        album: next(),
    }
}

// =============================================================================
// Stats: sysinfo + thermal zone
// =============================================================================

/// CPU and memory from `sysinfo`, temperature from sysfs.
pub struct SystemStats {
    system: Mutex<System>,
    thermal_path: PathBuf,
}

impl SystemStats {
    /// Read the default Raspberry Pi thermal zone.
    pub fn new() -> Self {
        Self::with_thermal_path(THERMAL_ZONE)
    }

    /// Read temperature from a different sensor file.
    pub fn with_thermal_path(path: impl Into<PathBuf>) -> Self {
        let mut system = System::new();
        // CPU usage is a delta, so take the baseline sample now.
        system.refresh_cpu_usage();
        Self {
            system: Mutex::new(system),
            thermal_path: path.into(),
        }
    }
}

impl Default for SystemStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsProvider for SystemStats {
    fn query(&self) -> StatsSnapshot {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_cpu_usage();
        system.refresh_memory();

        let total = system.total_memory();
        let ram_percent = if total == 0 {
            0.0
        } else {
            system.used_memory() as f32 / total as f32 * 100.0
        };

        StatsSnapshot {
            cpu_percent: system.global_cpu_usage(),
            ram_percent,
            temperature_celsius: read_temperature(&self.thermal_path),
        }
    }
}

/// Read a millidegree sensor file, returning 0.0 if it can't be read.
pub fn read_temperature(path: &Path) -> f32 {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| raw.trim().parse::<f32>().ok())
        .map(|millis| millis / 1000.0)
        .unwrap_or_else(|| {
            debug!("temperature sensor {} unreadable", path.display());
            0.0
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_snes_rom_path() {
        let game = game_from_cmdline(&args(&[
            "/opt/retropie/emulators/retroarch/bin/retroarch",
            "-L",
            "/opt/retropie/libretrocores/lr-snes9x/snes9x_libretro.so",
            "--config",
            "/opt/retropie/configs/snes/retroarch.cfg",
            "/home/pi/RetroPie/roms/snes/Chrono Trigger.sfc",
        ]))
        .unwrap();

        assert_eq!(game.system_id, "snes");
        assert_eq!(game.display_name, "Super Nintendo");
        assert_eq!(game.game_title, "Chrono Trigger");
    }

    #[test]
    fn test_system_folder_is_lowercased() {
        let game = game_from_cmdline(&args(&["/home/pi/RetroPie/roms/GBA/Golden Sun.gba"])).unwrap();
        assert_eq!(game.system_id, "gba");
        assert_eq!(game.display_name, "Game Boy Advance");
    }

    #[test]
    fn test_rom_outside_roms_folder() {
        let game = game_from_cmdline(&args(&["mednafen", "/media/usb/Sonic.md"])).unwrap();
        assert_eq!(game.system_id, "unknown");
        assert_eq!(game.display_name, "Unknown");
        assert_eq!(game.game_title, "Sonic");
    }

    #[test]
    fn test_no_rom_argument() {
        assert!(game_from_cmdline(&args(&["retroarch", "--menu"])).is_none());
        assert!(game_from_cmdline(&[]).is_none());
    }

    #[test]
    fn test_parse_full_metadata() {
        let media = parse_metadata("Time\u{1f}Pink Floyd\u{1f}The Dark Side of the Moon\n");
        assert_eq!(media.title, "Time");
        assert_eq!(media.artist, "Pink Floyd");
        assert_eq!(media.album, "The Dark Side of the Moon");
    }

    #[test]
    fn test_parse_missing_fields() {
        let media = parse_metadata("Untitled\u{1f}\u{1f}\n");
        assert_eq!(media.title, "Untitled");
        assert_eq!(media.artist, "Unknown");
        assert_eq!(media.album, "Unknown");
    }

    #[test]
    fn test_process_scan_reads_only_command_lines() {
        let refresh = process_refresh();
        assert_eq!(refresh.cmd(), UpdateKind::OnlyIfNotSet);
        assert_eq!(refresh.environ(), UpdateKind::Never);
        assert_eq!(refresh.cwd(), UpdateKind::Never);
        assert!(!refresh.memory());
        assert!(!refresh.disk_usage());

        // No emulator runs alongside the test harness.
        let provider = ProcessGameProvider::new();
        assert_eq!(provider.query(), GameInfo::menu());
        assert_eq!(provider.query(), GameInfo::menu());
    }

    #[test]
    fn test_unreadable_temperature_is_zero() {
        assert_eq!(read_temperature(Path::new("/nonexistent/thermal/temp")), 0.0);
    }

    #[test]
    fn test_temperature_in_millidegrees() {
        let path = std::env::temp_dir().join(format!("retropanel-temp-{}", std::process::id()));
        std::fs::write(&path, "47200\n").unwrap();
        let temp = read_temperature(&path);
        std::fs::remove_file(&path).unwrap();
        assert!((temp - 47.2).abs() < 1e-4);
    }
}
