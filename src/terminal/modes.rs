/// Resolution policy for code points whose East-Asian-Width is Ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbiguousWidthMode {
    #[default]
    Auto,
    Narrow,
    Wide,
}

/// Line-density mode set via window-op `CSI 9 ; n t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDensity {
    D25,
    D30,
    D43,
    D50,
    D60,
}

impl Default for LineDensity {
    fn default() -> Self {
        LineDensity::D25
    }
}

impl LineDensity {
    pub fn from_n(n: u16) -> Option<Self> {
        match n {
            25 => Some(LineDensity::D25),
            30 => Some(LineDensity::D30),
            43 => Some(LineDensity::D43),
            50 => Some(LineDensity::D50),
            60 => Some(LineDensity::D60),
            _ => None,
        }
    }
}

/// Terminal-wide mode flags tracking the DEC private modes and vendor
/// extensions this system recognizes.
#[derive(Debug, Clone)]
pub struct Modes {
    /// DECTCEM: text cursor visible
    pub cursor_visible: bool,
    /// Bracketed paste mode (2004)
    pub bracketed_paste: bool,
    /// Flex East-Asian-Width mode (2027)
    pub flex_width: bool,
    /// Visual-width-wrap mode (2028)
    pub visual_width_wrap: bool,
    pub ambiguous_width: AmbiguousWidthMode,
    /// DECAWM: auto-wrap mode (7)
    pub auto_wrap: bool,
    /// Smart word wrap (7702)
    pub smart_word_wrap: bool,
    /// Scrollback accumulation disabled (7700)
    pub scrollback_disabled: bool,
    /// Auto-scroll disabled (7701)
    pub auto_scroll_disabled: bool,
    /// DECCOLM: 132-column mode (3)
    pub column_mode_132: bool,
    /// 40-column mode (window-op `9;40;n`)
    pub column_mode_40: bool,
    pub line_density: LineDensity,
    /// DECSCNM: currently-active theme.
    pub dark_theme: bool,
    /// Theme to restore to on `reset()`.
    pub preferred_dark_theme: bool,
    pub cursor_blink_fast: bool,
}

impl Default for Modes {
    fn default() -> Self {
        Self {
            cursor_visible: true,
            bracketed_paste: false,
            flex_width: false,
            visual_width_wrap: false,
            ambiguous_width: AmbiguousWidthMode::Auto,
            auto_wrap: true,
            smart_word_wrap: false,
            scrollback_disabled: false,
            auto_scroll_disabled: false,
            column_mode_132: false,
            column_mode_40: false,
            line_density: LineDensity::D25,
            dark_theme: true,
            preferred_dark_theme: true,
            cursor_blink_fast: false,
        }
    }
}
