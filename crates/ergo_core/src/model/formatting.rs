//! Page and typography options passed to the document template.

/// Default body font.
pub const DEFAULT_FONT_FAMILY: &str = "Times New Roman";
/// Default body font size in points.
pub const DEFAULT_FONT_SIZE: u32 = 12;
/// Default paper size keyword.
pub const DEFAULT_PAPER_SIZE: &str = "us-letter";
/// Default region code.
pub const DEFAULT_REGION: &str = "us";
/// Default language code.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Formatting options of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattingOptions {
    pub font_family: String,
    /// Points.
    pub font_size: u32,
    /// `us-letter`, `a4`, ...
    pub paper_size: String,
    /// `us`, `uk`, `au`, ...
    pub region: String,
    /// `en`, `es`, `fr`, `de`, ...
    pub language: String,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            paper_size: DEFAULT_PAPER_SIZE.to_string(),
            region: DEFAULT_REGION.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}
