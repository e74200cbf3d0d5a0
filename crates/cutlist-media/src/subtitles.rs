//! ASS subtitle track compilation for burn-in.
//!
//! Cues are authored in SRT notation; the `ass` filter needs a styled
//! Advanced SubStation Alpha document, so one is generated per render.

use std::fmt::Write as _;
use std::path::Path;

use cutlist_models::subtitle::{is_hex_color, DEFAULT_OUTLINE_COLOR, DEFAULT_PRIMARY_COLOR};
use cutlist_models::timestamp::srt_to_track_time;
use cutlist_models::{SubtitleCue, SubtitleStyle};

use crate::error::MediaResult;

/// File name of the generated document inside the render's temp dir.
pub const SUBTITLE_FILE_NAME: &str = "subtitles.ass";

/// Horizontal margin applied on both sides, in pixels.
const MARGIN_HORIZONTAL: u32 = 10;

/// Convert `#RRGGBB` to ASS `&H00BBGGRR`.
///
/// Returns `None` for anything that is not a six-digit hex colour.
pub fn hex_to_ass_color(hex: &str) -> Option<String> {
    if !is_hex_color(hex) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let (r, g, b) = (channel(1)?, channel(3)?, channel(5)?);
    Some(format!("&H00{:02X}{:02X}{:02X}", b, g, r))
}

/// ASS numpad alignment for a horizontal alignment name.
///
/// Only "center" and "left" are recognised; everything else, "right"
/// included, maps to bottom-right.
pub fn alignment_code(horizontal_align: &str) -> u8 {
    match horizontal_align {
        "center" => 2,
        "left" => 1,
        _ => 3,
    }
}

/// Bottom margin in pixels for a percentage of the canvas height.
pub fn vertical_margin_pixels(canvas_height: u32, margin_percent: f64) -> u32 {
    (f64::from(canvas_height) * margin_percent / 100.0).round().max(0.0) as u32
}

/// Escape a file path for use inside a single-quoted filter argument.
///
/// The argument is unquoted twice, once by the graph parser and once by the
/// option parser. A quote therefore closes the graph-level quoting, emits
/// `\\\'` (which reaches the option parser as `\'`) and reopens it.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', r"'\\\''")
}

/// Build the complete ASS document for a set of cues.
pub fn compile_ass(
    cues: &[SubtitleCue],
    style: Option<&SubtitleStyle>,
    canvas_width: u32,
    canvas_height: u32,
) -> String {
    let default_style = SubtitleStyle::default();
    let style = style.unwrap_or(&default_style);

    let primary = hex_to_ass_color(&style.primary_color)
        .or_else(|| hex_to_ass_color(DEFAULT_PRIMARY_COLOR))
        .unwrap_or_default();
    let outline = hex_to_ass_color(&style.outline_color)
        .or_else(|| hex_to_ass_color(DEFAULT_OUTLINE_COLOR))
        .unwrap_or_default();
    let alignment = alignment_code(&style.horizontal_align);
    let margin_v = vertical_margin_pixels(canvas_height, style.vertical_margin);

    let mut doc = String::new();
    doc.push_str("[Script Info]\n");
    doc.push_str("Title: Rendered Subtitles\n");
    doc.push_str("ScriptType: v4.00+\n");
    doc.push_str("WrapStyle: 0\n");
    doc.push_str("ScaledBorderAndShadow: yes\n");
    let _ = writeln!(doc, "PlayResX: {}", canvas_width);
    let _ = writeln!(doc, "PlayResY: {}", canvas_height);
    doc.push_str("YCbCr Matrix: TV.709\n\n");

    doc.push_str("[V4+ Styles]\n");
    doc.push_str(
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, \
         Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, \
         Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n",
    );
    let _ = writeln!(
        doc,
        "Style: Default,{font},{size},{primary},&H000000FF,{outline},&H80000000,0,0,0,0,100,100,0,0,1,{outline_width},0,{alignment},{ml},{mr},{mv},1",
        font = style.font_family,
        size = style.font_size,
        primary = primary,
        outline = outline,
        outline_width = style.outline_width,
        alignment = alignment,
        ml = MARGIN_HORIZONTAL,
        mr = MARGIN_HORIZONTAL,
        mv = margin_v,
    );
    doc.push('\n');

    doc.push_str("[Events]\n");
    doc.push_str("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n");
    for cue in cues {
        let _ = writeln!(
            doc,
            "Dialogue: 0,{},{},Default,,0,0,0,,{}",
            srt_to_track_time(&cue.start_time),
            srt_to_track_time(&cue.end_time),
            escape_cue_text(&cue.text),
        );
    }

    doc
}

/// ASS uses `\N` for hard line breaks.
fn escape_cue_text(text: &str) -> String {
    text.replace("\r\n", "\\N").replace(['\n', '\r'], "\\N")
}

/// Write the document as UTF-8 with a byte-order mark.
pub async fn write_ass(path: &Path, document: &str) -> MediaResult<()> {
    let mut bytes = Vec::with_capacity(document.len() + 3);
    bytes.extend_from_slice("\u{feff}".as_bytes());
    bytes.extend_from_slice(document.as_bytes());
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_hex_to_ass_color() {
        assert_eq!(hex_to_ass_color("#FFFFFF").as_deref(), Some("&H00FFFFFF"));
        assert_eq!(hex_to_ass_color("#000000").as_deref(), Some("&H00000000"));
        assert_eq!(hex_to_ass_color("#FF8000").as_deref(), Some("&H000080FF"));
        assert_eq!(hex_to_ass_color("#12abEF").as_deref(), Some("&H00EFAB12"));
        assert_eq!(hex_to_ass_color("red"), None);
    }

    #[test]
    fn test_alignment_code() {
        assert_eq!(alignment_code("center"), 2);
        assert_eq!(alignment_code("left"), 1);
        assert_eq!(alignment_code("right"), 3);
        assert_eq!(alignment_code("anything-else"), 3);
        assert_eq!(alignment_code(""), 3);
    }

    #[test]
    fn test_vertical_margin_pixels() {
        assert_eq!(vertical_margin_pixels(1080, 8.0), 86);
        assert_eq!(vertical_margin_pixels(1080, 10.0), 108);
        assert_eq!(vertical_margin_pixels(1080, 0.0), 0);
    }

    #[test]
    fn test_escape_filter_path() {
        assert_eq!(
            escape_filter_path(&PathBuf::from("/tmp/render-x/subtitles.ass")),
            "/tmp/render-x/subtitles.ass"
        );
        assert_eq!(
            escape_filter_path(&PathBuf::from("C:\\Temp\\it's\\subtitles.ass")),
            r"C\:/Temp/it'\\\''s/subtitles.ass"
        );
    }

    #[test]
    fn test_quote_in_path_keeps_filter_quoting_balanced() {
        let filter = format!("ass='{}'", escape_filter_path(&PathBuf::from("/tmp/o'brien/subtitles.ass")));
        assert_eq!(filter, r"ass='/tmp/o'\\\''brien/subtitles.ass'");
        // Every unescaped quote opens or closes a quoted run.
        let bare_quotes = filter
            .char_indices()
            .filter(|&(i, c)| c == '\'' && !filter[..i].ends_with('\\'))
            .count();
        assert_eq!(bare_quotes % 2, 0);
    }

    #[test]
    fn test_compile_ass_defaults() {
        let cues = vec![SubtitleCue::new("00:00:01,239", "00:00:03,500", "Hello\nworld")];
        let doc = compile_ass(&cues, None, 1920, 1080);

        assert!(doc.starts_with("[Script Info]\n"));
        assert!(doc.contains("PlayResX: 1920\n"));
        assert!(doc.contains("PlayResY: 1080\n"));
        assert!(doc.contains(
            "Style: Default,Arial,48,&H00FFFFFF,&H000000FF,&H00000000,&H80000000,0,0,0,0,100,100,0,0,1,2.5,0,2,10,10,86,1\n"
        ));
        assert!(doc.contains("Dialogue: 0,0:00:01.23,0:00:03.50,Default,,0,0,0,,Hello\\Nworld\n"));
    }

    #[test]
    fn test_compile_ass_custom_style() {
        let style = SubtitleStyle {
            font_family: "Roboto".to_string(),
            font_size: 36.0,
            primary_color: "#FFFF00".to_string(),
            outline_color: "#101010".to_string(),
            outline_width: 3.0,
            vertical_margin: 10.0,
            horizontal_align: "left".to_string(),
        };
        let doc = compile_ass(&[], Some(&style), 1920, 1080);
        assert!(doc.contains(
            "Style: Default,Roboto,36,&H0000FFFF,&H000000FF,&H00101010,&H80000000,0,0,0,0,100,100,0,0,1,3,0,1,10,10,108,1\n"
        ));
        assert!(!doc.contains("Dialogue:"));
    }

    #[test]
    fn test_malformed_cue_time_falls_back_to_zero() {
        let cues = vec![SubtitleCue::new("bogus", "00:00:02,000", "x")];
        let doc = compile_ass(&cues, None, 1920, 1080);
        assert!(doc.contains("Dialogue: 0,0:00:00.00,0:00:02.00,Default,,0,0,0,,x\n"));
    }

    #[test]
    fn test_invalid_colour_falls_back_to_default() {
        let style = SubtitleStyle {
            primary_color: "nope".to_string(),
            ..Default::default()
        };
        let doc = compile_ass(&[], Some(&style), 1920, 1080);
        assert!(doc.contains("Style: Default,Arial,48,&H00FFFFFF,"));
    }

    #[tokio::test]
    async fn test_write_ass_prepends_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SUBTITLE_FILE_NAME);
        write_ass(&path, "[Script Info]\n").await.unwrap();

        let bytes = tokio::fs::read(&path).await.unwrap();
        assert_eq!(&bytes[..3], &[0xEF, 0xBB, 0xBF]);
        assert_eq!(&bytes[3..], b"[Script Info]\n");
    }
}
