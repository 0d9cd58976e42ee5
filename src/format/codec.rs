//! Markup encoding and decoding for [`FormattingRecord`].
//!
//! ## Encoded form
//!
//! ```text
//! <p style="text-align:right">          only when alignment != left
//!   <strong>                            bold (outermost)
//!     <em>                              italic
//!       <u>                             underline
//!         <span style="font-size:20px;color:#112233;font-family:'Open Sans'">
//!           text                        escaped, "\n" -> <br>
//! ```
//!
//! Only attributes that differ from their default are written, so a default
//! record encodes to `<p>text</p>`. Decoding is lenient: it accepts the tag
//! aliases editors emit (`<b>`, `<i>`), `rgb()` colors, quoted family lists
//! and paragraph breaks, and falls back to the default for any attribute it
//! cannot read.

use std::sync::LazyLock;

use regex::Regex;

use super::{Alignment, FormattingRecord};
use crate::canvas::FontSizeRange;

static BOLD_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?:strong|b)(?:\s[^>]*)?>").expect("valid regex"));
static ITALIC_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?:em|i)(?:\s[^>]*)?>").expect("valid regex"));
static UNDERLINE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<u(?:\s[^>]*)?>").expect("valid regex"));
static STYLE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bstyle\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});
static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(?:p|div)>\s*<(?:p|div)(?:\s[^>]*)?>").expect("valid regex")
});
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static RGB_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^rgba?\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*(?:,\s*[\d.]+\s*)?\)$")
        .expect("valid regex")
});

// ============================================================================
// ENCODE
// ============================================================================

/// Encode a record as editor markup in minimal form.
pub fn encode(record: &FormattingRecord) -> String {
    let mut inner = escape_text(&record.text);

    let style = span_style(record);
    if !style.is_empty() {
        inner = format!(r#"<span style="{style}">{inner}</span>"#);
    }
    if record.is_underline {
        inner = format!("<u>{inner}</u>");
    }
    if record.is_italic {
        inner = format!("<em>{inner}</em>");
    }
    if record.is_bold {
        inner = format!("<strong>{inner}</strong>");
    }

    match record.alignment {
        Alignment::Left => format!("<p>{inner}</p>"),
        alignment => format!(r#"<p style="text-align:{alignment}">{inner}</p>"#),
    }
}

/// Inline style declarations for the attributes that differ from default.
fn span_style(record: &FormattingRecord) -> String {
    let mut declarations = Vec::new();
    if !record.has_default_size() {
        declarations.push(format!("font-size:{}px", record.font_size));
    }
    if !record.has_default_color() {
        declarations.push(format!("color:{}", record.color));
    }
    if !record.has_default_family() {
        declarations.push(format!("font-family:{}", quote_family(&record.font_family)));
    }
    declarations.join(";")
}

fn quote_family(family: &str) -> String {
    if family.chars().any(char::is_whitespace) {
        format!("'{family}'")
    } else {
        family.to_string()
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\n' => out.push_str("<br>"),
            _ => out.push(ch),
        }
    }
    out
}

// ============================================================================
// DECODE
// ============================================================================

/// Decode editor markup into a record.
///
/// Never fails: empty markup yields the default record and every attribute
/// that cannot be read keeps its default. Font sizes outside `range` are
/// rejected.
pub fn decode(markup: &str, range: FontSizeRange) -> FormattingRecord {
    let mut record = FormattingRecord::default();
    if markup.trim().is_empty() {
        return record;
    }

    record.text = plain_text(markup);
    record.is_bold = BOLD_TAG.is_match(markup);
    record.is_italic = ITALIC_TAG.is_match(markup);
    record.is_underline = UNDERLINE_TAG.is_match(markup);

    let styles = InlineStyles::collect(markup, range);
    if let Some(size) = styles.font_size {
        record.font_size = size;
    }
    if let Some(color) = styles.color {
        record.color = color;
    }
    if let Some(family) = styles.font_family {
        record.font_family = family;
    }
    record.alignment = styles.alignment.unwrap_or_default();

    record
}

/// First valid value of each style property found in the markup.
#[derive(Debug, Default)]
struct InlineStyles {
    font_size: Option<u32>,
    color: Option<String>,
    font_family: Option<String>,
    alignment: Option<Alignment>,
}

impl InlineStyles {
    fn collect(markup: &str, range: FontSizeRange) -> Self {
        let mut styles = Self::default();
        for caps in STYLE_ATTR.captures_iter(markup) {
            let Some(body) = caps.get(1).or_else(|| caps.get(2)) else {
                continue;
            };
            let body = unescape_entities(body.as_str());
            for declaration in body.split(';') {
                let Some((property, value)) = declaration.split_once(':') else {
                    continue;
                };
                let value = value.trim();
                match property.trim().to_ascii_lowercase().as_str() {
                    "font-size" if styles.font_size.is_none() => {
                        styles.font_size = parse_font_size(value, range);
                    }
                    "color" if styles.color.is_none() => {
                        styles.color = normalize_color(value);
                    }
                    "font-family" if styles.font_family.is_none() => {
                        styles.font_family = parse_font_family(value);
                    }
                    "text-align" if styles.alignment.is_none() => {
                        styles.alignment = Alignment::parse(value);
                    }
                    _ => {}
                }
            }
        }
        styles
    }
}

/// `"20px"` → 20, only when inside `range`.
fn parse_font_size(value: &str, range: FontSizeRange) -> Option<u32> {
    let lower = value.to_ascii_lowercase();
    let number = lower.strip_suffix("px").unwrap_or(&lower).trim();
    let size: f64 = number.parse().ok()?;
    if !size.is_finite() || size < 0.0 {
        return None;
    }
    let size = size.round() as u32;
    range.contains(size).then_some(size)
}

/// Accepts `#rgb`, `#rrggbb` and `rgb(r, g, b)`; returns `#rrggbb`.
pub fn normalize_color(value: &str) -> Option<String> {
    if let Some(hex) = value.strip_prefix('#') {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        return match hex.len() {
            6 => Some(value.to_string()),
            3 => {
                let expanded: String = hex.chars().flat_map(|c| [c, c]).collect();
                Some(format!("#{expanded}"))
            }
            _ => None,
        };
    }

    let caps = RGB_COLOR.captures(value)?;
    let mut channels = [0u8; 3];
    for (i, channel) in channels.iter_mut().enumerate() {
        *channel = caps[i + 1].parse().ok()?;
    }
    Some(format!(
        "#{:02x}{:02x}{:02x}",
        channels[0], channels[1], channels[2]
    ))
}

/// First family of a list, with quoting removed.
fn parse_font_family(value: &str) -> Option<String> {
    let first = value.split(',').next()?.trim();
    let family = first.trim_matches(|c| c == '"' || c == '\'').trim();
    (!family.is_empty()).then(|| family.to_string())
}

fn plain_text(markup: &str) -> String {
    let text = PARAGRAPH_BREAK.replace_all(markup, "\n");
    let text = LINE_BREAK.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, "");
    unescape_entities(&text)
}

fn unescape_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BADGE: FontSizeRange = FontSizeRange::BADGE;

    fn styled() -> FormattingRecord {
        FormattingRecord {
            text: "Ada <Lovelace> & co".into(),
            font_size: 36,
            color: "#1a2b3c".into(),
            is_bold: true,
            is_italic: true,
            is_underline: true,
            font_family: "Open Sans".into(),
            alignment: Alignment::Right,
        }
    }

    #[test]
    fn test_encode_default_is_minimal() {
        let markup = encode(&FormattingRecord::new("Name"));
        assert_eq!(markup, "<p>Name</p>");
        assert!(!markup.contains("style"));
    }

    #[test]
    fn test_encode_empty_default() {
        assert_eq!(encode(&FormattingRecord::default()), "<p></p>");
    }

    #[test]
    fn test_encode_nesting_order() {
        let markup = encode(&styled());
        assert_eq!(
            markup,
            "<p style=\"text-align:right\"><strong><em><u>\
             <span style=\"font-size:36px;color:#1a2b3c;font-family:'Open Sans'\">\
             Ada &lt;Lovelace&gt; &amp; co</span></u></em></strong></p>"
        );
    }

    #[test]
    fn test_encode_omits_default_values() {
        let record = FormattingRecord {
            text: "x".into(),
            color: "#ff0000".into(),
            ..Default::default()
        };
        assert_eq!(encode(&record), r#"<p><span style="color:#ff0000">x</span></p>"#);
    }

    #[test]
    fn test_round_trip_styled() {
        let record = styled();
        assert_eq!(decode(&encode(&record), BADGE), record);
    }

    #[test]
    fn test_round_trip_text_with_quotes_and_markup_lookalikes() {
        let record = FormattingRecord::new(r#"x style='color:#ff0000' "quoted" <b>"#);
        let markup = encode(&record);
        assert!(!markup.contains("style='"));
        assert_eq!(decode(&markup, BADGE), record);
    }

    #[test]
    fn test_round_trip_each_flag() {
        let variants = [
            FormattingRecord { is_bold: true, ..FormattingRecord::new("b") },
            FormattingRecord { is_italic: true, ..FormattingRecord::new("i") },
            FormattingRecord { is_underline: true, ..FormattingRecord::new("u") },
            FormattingRecord { alignment: Alignment::Center, ..FormattingRecord::new("c") },
            FormattingRecord { font_size: 8, ..FormattingRecord::new("small") },
            FormattingRecord { font_family: "Roboto".into(), ..FormattingRecord::new("r") },
            FormattingRecord::new("line one\nline two"),
            FormattingRecord::default(),
        ];
        for record in variants {
            assert_eq!(decode(&encode(&record), BADGE), record);
        }
    }

    #[test]
    fn test_decode_empty_is_default() {
        assert_eq!(decode("", BADGE), FormattingRecord::default());
        assert_eq!(decode("   ", BADGE), FormattingRecord::default());
    }

    #[test]
    fn test_decode_reference_markup() {
        let markup = r#"<p style="text-align:right"><strong><span style="font-size:20px;color:#112233">Name</span></strong></p>"#;
        assert_eq!(
            decode(markup, BADGE),
            FormattingRecord {
                text: "Name".into(),
                font_size: 20,
                color: "#112233".into(),
                is_bold: true,
                is_italic: false,
                is_underline: false,
                font_family: "Arial".into(),
                alignment: Alignment::Right,
            }
        );
    }

    #[test]
    fn test_decode_tag_aliases() {
        let record = decode("<p><b><i>Hi</i></b></p>", BADGE);
        assert!(record.is_bold);
        assert!(record.is_italic);
        assert!(!record.is_underline);
        assert_eq!(record.text, "Hi");
    }

    #[test]
    fn test_decode_br_is_not_bold() {
        let record = decode("<p>a<br>b</p>", BADGE);
        assert!(!record.is_bold);
        assert_eq!(record.text, "a\nb");
    }

    #[test]
    fn test_decode_paragraphs_become_lines() {
        let record = decode("<p>first</p><p>second</p>", BADGE);
        assert_eq!(record.text, "first\nsecond");
    }

    #[test]
    fn test_decode_font_size_range_depends_on_context() {
        let markup = r#"<p><span style="font-size:80px">Big</span></p>"#;
        assert_eq!(decode(markup, FontSizeRange::BADGE).font_size, 80);
        assert_eq!(decode(markup, FontSizeRange::TICKET).font_size, 14);
    }

    #[test]
    fn test_decode_rejects_tiny_font() {
        let markup = r#"<p><span style="font-size:4px">tiny</span></p>"#;
        assert_eq!(decode(markup, BADGE).font_size, 14);
    }

    #[test]
    fn test_decode_partial_recovery() {
        let markup = r#"<p><strong><em><span style="color:not-a-color;font-size:22px">X</span></em></strong></p>"#;
        let record = decode(markup, BADGE);
        assert_eq!(record.color, "#000000");
        assert_eq!(record.font_size, 22);
        assert!(record.is_bold);
        assert!(record.is_italic);
    }

    #[test]
    fn test_decode_rgb_and_short_hex() {
        let rgb = decode(r#"<p><span style="color: rgb(255, 0, 16)">x</span></p>"#, BADGE);
        assert_eq!(rgb.color, "#ff0010");
        let short = decode(r#"<p><span style="color:#abc">x</span></p>"#, BADGE);
        assert_eq!(short.color, "#aabbcc");
    }

    #[test]
    fn test_decode_font_family_strips_quotes() {
        let markup = r#"<p><span style="font-family:&quot;Open Sans&quot;, sans-serif">x</span></p>"#;
        assert_eq!(decode(markup, BADGE).font_family, "Open Sans");
        let single = r#"<p><span style='font-family:"Lato"'>x</span></p>"#;
        assert_eq!(decode(single, BADGE).font_family, "Lato");
    }

    #[test]
    fn test_decode_unknown_alignment_is_left() {
        let record = decode(r#"<p style="text-align:justify">x</p>"#, BADGE);
        assert_eq!(record.alignment, Alignment::Left);
    }

    #[test]
    fn test_decode_plain_text_without_tags() {
        assert_eq!(decode("just text", BADGE), FormattingRecord::new("just text"));
    }

    #[test]
    fn test_reencode_is_stable() {
        let markup = r#"<p style="text-align:center"><b><span style="color:RGB(0,0,0);font-size:14px">Hi</span></b></p>"#;
        let once = encode(&decode(markup, BADGE));
        let twice = encode(&decode(&once, BADGE));
        assert_eq!(once, twice);
        assert_eq!(once, r#"<p style="text-align:center"><strong>Hi</strong></p>"#);
    }
}
