use std::fmt;

/// Coarse playback status the engine reports after each pass. Consumers
/// (status display, notifications) render it however they like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSignal {
    Ad,
    NoAd,
}

impl StatusSignal {
    /// Menu-bar glyph used by the desktop front end.
    pub fn glyph(&self) -> &'static str {
        match self {
            StatusSignal::Ad => "\u{2602}\u{fe0e}",   // ☂︎
            StatusSignal::NoAd => "\u{2600}\u{fe0e}", // ☀︎
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusSignal::Ad => "ad showing",
            StatusSignal::NoAd => "no ad",
        }
    }
}

impl fmt::Display for StatusSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_and_glyphs_differ() {
        assert_ne!(StatusSignal::Ad.glyph(), StatusSignal::NoAd.glyph());
        assert_eq!(StatusSignal::Ad.to_string(), "ad showing");
        assert_eq!(StatusSignal::NoAd.to_string(), "no ad");
    }
}
