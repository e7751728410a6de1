//! Page definitions and the content shown on each page.

/// System id reported when no emulator is running.
pub const MENU_SYSTEM: &str = "RetroPie";
/// Game title reported when no emulator is running.
pub const MENU_TITLE: &str = "Menu";

/// RetroPie rom folder names mapped to readable system names.
const SYSTEM_NAMES: &[(&str, &str)] = &[
    ("nes", "Nintendo Entertainment System"),
    ("snes", "Super Nintendo"),
    ("n64", "Nintendo 64"),
    ("gb", "Game Boy"),
    ("gba", "Game Boy Advance"),
    ("psx", "PlayStation"),
    ("psp", "PlayStation Portable"),
    ("sega32x", "Sega 32X"),
    ("segacd", "Sega CD"),
    ("sgg", "Sega Game Gear"),
    ("mastersystem", "Sega Master System"),
    ("genesis", "Sega Genesis"),
    ("mame", "MAME (Arcade)"),
    ("arcade", "Arcade"),
    ("pcengine", "PC Engine"),
    ("pcenginecd", "PC Engine CD"),
    ("sg1000", "Sega SG-1000"),
    ("megadrive", "Sega Mega Drive"),
    ("coleco", "ColecoVision"),
    ("dreamcast", "Sega Dreamcast"),
    ("gamecube", "Nintendo GameCube"),
    ("wii", "Nintendo Wii"),
    ("ds", "Nintendo DS"),
    ("3ds", "Nintendo 3DS"),
    ("gameandwatch", "Game & Watch"),
    ("gbc", "Game Boy Color"),
];

// =============================================================================
// Page
// =============================================================================

/// The informational pages, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Page {
    /// The currently running game.
    #[default]
    Game,
    /// The currently playing media track.
    Media,
    /// Host CPU, temperature and memory.
    Stats,
}

impl Page {
    /// All pages in cycle order.
    pub const ALL: [Page; 3] = [Page::Game, Page::Media, Page::Stats];

    /// Position of this page in the cycle.
    pub fn index(self) -> usize {
        match self {
            Page::Game => 0,
            Page::Media => 1,
            Page::Stats => 2,
        }
    }

    /// The page at `index`, modulo the cycle length.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    /// The page after this one, wrapping back to [`Page::Game`].
    pub fn next(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    /// The page before this one, wrapping to [`Page::Stats`].
    pub fn previous(self) -> Self {
        Self::from_index(self.index() + Self::ALL.len() - 1)
    }

    /// Header text drawn at the top of the page.
    pub fn header(self) -> &'static str {
        match self {
            Page::Game => "- Now Playing -",
            Page::Media => "- Now Listening -",
            Page::Stats => "- System Stats -",
        }
    }
}

// =============================================================================
// Content
// =============================================================================

/// The game shown on the [`Page::Game`] page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInfo {
    /// Rom folder name, e.g. `snes`.
    pub system_id: String,
    /// Human readable system name, e.g. `Super Nintendo`.
    pub display_name: String,
    /// Rom file name without extension.
    pub game_title: String,
}

impl GameInfo {
    /// Build game info from a system id and title, resolving the display name.
    pub fn new(system_id: impl Into<String>, game_title: impl Into<String>) -> Self {
        let system_id = system_id.into();
        Self {
            display_name: system_display_name(&system_id),
            system_id,
            game_title: game_title.into(),
        }
    }

    /// The sentinel shown while EmulationStation is in its menus.
    pub fn menu() -> Self {
        Self::new(MENU_SYSTEM, MENU_TITLE)
    }

    /// The identity used to detect that a different game started.
    pub fn identity(&self) -> (&str, &str) {
        (&self.display_name, &self.game_title)
    }
}

impl Default for GameInfo {
    fn default() -> Self {
        Self::menu()
    }
}

/// Map a rom folder name to a readable system name.
///
/// Unknown ids fall back to the id with its first character uppercased.
pub fn system_display_name(system_id: &str) -> String {
    SYSTEM_NAMES
        .iter()
        .find(|(id, _)| *id == system_id)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| capitalize_first(system_id))
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Track metadata shown on the [`Page::Media`] page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    /// Track title.
    pub title: String,
    /// Comma separated artist list.
    pub artist: String,
    /// Album name.
    pub album: String,
}

impl MediaInfo {
    /// Placeholder metadata used when no player answers.
    pub fn placeholder() -> Self {
        Self {
            title: "Track: ".to_string(),
            artist: "Artist: ".to_string(),
            album: "Album: ".to_string(),
        }
    }
}

impl Default for MediaInfo {
    fn default() -> Self {
        Self::placeholder()
    }
}

/// Host metrics shown on the [`Page::Stats`] page.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatsSnapshot {
    /// Global CPU usage in percent.
    pub cpu_percent: f32,
    /// Used memory in percent.
    pub ram_percent: f32,
    /// SoC temperature, 0.0 when the sensor is unreadable.
    pub temperature_celsius: f32,
}

impl StatsSnapshot {
    /// The metric lines in the order they are drawn.
    pub fn lines(&self) -> [String; 3] {
        [
            format!("CPU: {:.1}%", self.cpu_percent),
            format!("GPU: {:.1}°C", self.temperature_celsius),
            format!("RAM: {:.1}%", self.ram_percent),
        ]
    }
}

/// Content for whichever page is active.
#[derive(Debug, Clone, PartialEq)]
pub enum PageContent {
    /// Content of [`Page::Game`].
    Game(GameInfo),
    /// Content of [`Page::Media`].
    Media(MediaInfo),
    /// Content of [`Page::Stats`].
    Stats(StatsSnapshot),
}

impl PageContent {
    /// The page this content belongs to.
    pub fn page(&self) -> Page {
        match self {
            PageContent::Game(_) => Page::Game,
            PageContent::Media(_) => Page::Media,
            PageContent::Stats(_) => Page::Stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_cycle_wraps() {
        assert_eq!(Page::Game.next(), Page::Media);
        assert_eq!(Page::Media.next(), Page::Stats);
        assert_eq!(Page::Stats.next(), Page::Game);

        assert_eq!(Page::Game.previous(), Page::Stats);
        assert_eq!(Page::Stats.previous(), Page::Media);
    }

    #[test]
    fn test_n_advances_match_modulo() {
        for start in Page::ALL {
            let mut page = start;
            for n in 1..=10 {
                page = page.next();
                assert_eq!(page, Page::from_index(start.index() + n));
            }
        }
    }

    #[test]
    fn test_known_system_names() {
        assert_eq!(system_display_name("snes"), "Super Nintendo");
        assert_eq!(system_display_name("gameandwatch"), "Game & Watch");
        assert_eq!(system_display_name("3ds"), "Nintendo 3DS");
    }

    #[test]
    fn test_unknown_system_is_capitalized() {
        assert_eq!(system_display_name("amiga"), "Amiga");
        assert_eq!(system_display_name("RetroPie"), "RetroPie");
        assert_eq!(system_display_name(""), "");
    }

    #[test]
    fn test_menu_sentinel() {
        let menu = GameInfo::menu();
        assert_eq!(menu.system_id, "RetroPie");
        assert_eq!(menu.display_name, "RetroPie");
        assert_eq!(menu.game_title, "Menu");
    }

    #[test]
    fn test_stats_lines_order_and_format() {
        let stats = StatsSnapshot {
            cpu_percent: 55.3,
            ram_percent: 40.0,
            temperature_celsius: 47.2,
        };
        assert_eq!(stats.lines(), ["CPU: 55.3%", "GPU: 47.2°C", "RAM: 40.0%"]);
    }
}
