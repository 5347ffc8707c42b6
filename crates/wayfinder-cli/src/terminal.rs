//! ANSI styling for the text report.

use std::ffi::OsStr;

use wayfinder_lib::CompletionState;

/// Escape sequences used by the text renderer, or empty strings when color
/// is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorPalette {
    pub reset: &'static str,
    pub heading: &'static str,
    pub muted: &'static str,
    pub good: &'static str,
    pub warn: &'static str,
    pub bad: &'static str,
}

impl ColorPalette {
    pub fn new(enabled: bool) -> Self {
        let pick = |code: &'static str| if enabled { code } else { "" };
        Self {
            reset: pick("\x1b[0m"),
            heading: pick("\x1b[1;97m"),
            muted: pick("\x1b[90m"),
            good: pick("\x1b[32m"),
            warn: pick("\x1b[33m"),
            bad: pick("\x1b[31m"),
        }
    }

    pub fn plain() -> Self {
        Self::new(false)
    }

    /// Palette for stdout, honouring `NO_COLOR` and `TERM=dumb`.
    pub fn detect() -> Self {
        let no_color = std::env::var_os("NO_COLOR");
        let term = std::env::var_os("TERM");
        Self::new(color_enabled(no_color.as_deref(), term.as_deref()))
    }

    /// Color and label for a search outcome.
    pub fn state(&self, state: CompletionState) -> (&'static str, &'static str) {
        match state {
            CompletionState::Complete => (self.good, "complete"),
            CompletionState::Partial => (self.warn, "partial"),
            CompletionState::Error => (self.bad, "error"),
        }
    }
}

/// Whether ANSI output is wanted given the `NO_COLOR` and `TERM` variables.
pub fn color_enabled(no_color: Option<&OsStr>, term: Option<&OsStr>) -> bool {
    if no_color.is_some() {
        return false;
    }
    !term.is_some_and(|term| term.eq_ignore_ascii_case("dumb"))
}

/// Group digits in threes: `1234567` becomes `1,234,567`.
///
/// ```
/// use wayfinder_cli::terminal::format_with_separators;
/// assert_eq!(format_with_separators(999), "999");
/// assert_eq!(format_with_separators(1234567), "1,234,567");
/// ```
pub fn format_with_separators(n: u64) -> String {
    let digits = n.to_string();
    let head = digits.len() % 3;
    let mut groups: Vec<&str> = Vec::with_capacity(digits.len() / 3 + 1);
    if head > 0 {
        groups.push(&digits[..head]);
    }
    groups.extend(
        digits.as_bytes()[head..]
            .chunks(3)
            .filter_map(|chunk| std::str::from_utf8(chunk).ok()),
    );
    groups.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_with_separators() {
        assert_eq!(format_with_separators(0), "0");
        assert_eq!(format_with_separators(1000), "1,000");
        assert_eq!(format_with_separators(123_456), "123,456");
        assert_eq!(format_with_separators(u64::MAX), "18,446,744,073,709,551,615");
    }

    #[test]
    fn test_plain_palette_is_empty() {
        let plain = ColorPalette::plain();
        assert_eq!(plain.state(CompletionState::Partial), ("", "partial"));
        assert!(plain.reset.is_empty());
        assert_eq!(ColorPalette::new(true).good, "\x1b[32m");
    }

    #[test]
    fn test_color_enabled_rules() {
        let os = |value: &'static str| Some(OsStr::new(value));
        assert!(color_enabled(None, None));
        assert!(color_enabled(None, os("xterm-256color")));
        assert!(!color_enabled(os("1"), os("xterm-256color")));
        assert!(!color_enabled(None, os("dumb")));
        assert!(!color_enabled(None, os("DUMB")));
    }
}
