//! Text summary builder for CLI output.
//!
//! Formats a generated code as terminal block art plus human-readable lines,
//! and renders the history list for `--list-history`.

use crate::history::{format_relative, short_label, EMPTY_PLACEHOLDER};
use crate::model::HistoryEntry;
use crate::render::Artifact;
use crate::trigger::GenerateRequest;
use serde::Serialize;
use std::path::Path;
use time::OffsetDateTime;

/// Quiet zone used for terminal output; narrower than the bitmap's to save rows.
const TERMINAL_QUIET_ZONE: i64 = 2;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Machine-readable result of a one-shot generation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationReport<'a> {
    pub text: &'a str,
    pub size: u32,
    pub color: String,
    pub bg_color: String,
    pub width: u32,
    pub height: u32,
    pub modules: usize,
    pub file: Option<String>,
    pub history_len: usize,
}

impl<'a> GenerationReport<'a> {
    pub fn new(
        request: &'a GenerateRequest,
        artifact: &Artifact,
        saved: Option<&Path>,
        history_len: usize,
    ) -> Self {
        Self {
            text: &request.text,
            size: request.settings.size,
            color: artifact.dark.to_string(),
            bg_color: artifact.light.to_string(),
            width: artifact.image.width(),
            height: artifact.image.height(),
            modules: artifact.module_width(),
            file: saved.map(|p| p.display().to_string()),
            history_len,
        }
    }
}

/// History row for `--list-history --json`; the image snapshot is left out.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HistoryListItem<'a> {
    pub index: usize,
    pub text: &'a str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub age: String,
    pub size: Option<u32>,
    pub color: Option<String>,
    pub bg_color: Option<String>,
}

impl<'a> HistoryListItem<'a> {
    pub fn new(index: usize, entry: &'a HistoryEntry, now: OffsetDateTime) -> Self {
        Self {
            index,
            text: &entry.text,
            timestamp: entry.created_at,
            age: format_relative(entry.created_at, now),
            size: entry.size,
            color: entry.foreground.map(|c| c.to_string()),
            bg_color: entry.background.map(|c| c.to_string()),
        }
    }
}

/// Draw the module matrix with half-block characters, two module rows per line.
/// Light modules are drawn filled so the code scans on dark terminals.
pub(crate) fn block_art(artifact: &Artifact) -> Vec<String> {
    let w = artifact.module_width() as i64;
    let lo = -TERMINAL_QUIET_ZONE;
    let hi = w + TERMINAL_QUIET_ZONE;
    let mut lines = Vec::new();
    let mut y = lo;
    while y < hi {
        let line: String = (lo..hi)
            .map(|x| match (artifact.is_dark(x, y), artifact.is_dark(x, y + 1)) {
                (false, false) => '█',
                (false, true) => '▀',
                (true, false) => '▄',
                (true, true) => ' ',
            })
            .collect();
        lines.push(line);
        y += 2;
    }
    lines
}

/// Build the text summary for a one-shot generation.
pub(crate) fn build_text_summary(
    request: &GenerateRequest,
    artifact: &Artifact,
    saved: Option<&Path>,
    history_len: usize,
) -> TextSummary {
    let mut lines = block_art(artifact);
    lines.push(String::new());
    lines.push(format!("Text: {}", request.text));
    lines.push(format!(
        "Size: {}x{} px ({} modules, error correction H)",
        artifact.image.width(),
        artifact.image.height(),
        artifact.module_width()
    ));
    lines.push(format!("Colors: {} on {}", artifact.dark, artifact.light));
    if let Some(path) = saved {
        lines.push(format!("Saved: {}", path.display()));
    }
    lines.push(format!("History: {history_len} item(s)"));
    TextSummary { lines }
}

/// One line per history entry, or the empty-state placeholder.
pub(crate) fn build_history_summary(entries: &[HistoryEntry], now: OffsetDateTime) -> TextSummary {
    if entries.is_empty() {
        return TextSummary {
            lines: vec![EMPTY_PLACEHOLDER.to_string()],
        };
    }
    let lines = entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let appearance = match (e.size, e.foreground, e.background) {
                (Some(size), Some(fg), Some(bg)) => format!("{size}px {fg}/{bg}"),
                (Some(size), _, _) => format!("{size}px"),
                _ => "-".to_string(),
            };
            format!(
                "{:>2}. {:<28}  {:<12}  {}",
                i + 1,
                short_label(&e.text),
                format_relative(e.created_at, now),
                appearance
            )
        })
        .collect();
    TextSummary { lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QrSettings, Rgb};
    use crate::render::QrCodeEncoder;
    use crate::trigger::generate;
    use time::macros::datetime;
    use time::Duration;

    #[test]
    fn block_art_covers_symbol_and_quiet_zone() {
        let request = GenerateRequest::new("hello", QrSettings::default()).unwrap();
        let artifact = generate(&QrCodeEncoder, &request).unwrap();
        let art = block_art(&artifact);
        let side = artifact.module_width() + 2 * TERMINAL_QUIET_ZONE as usize;
        assert_eq!(art.len(), side.div_ceil(2));
        assert!(art.iter().all(|l| l.chars().count() == side));
        // First row is pure quiet zone.
        assert!(art[0].chars().all(|c| c == '█'));
    }

    #[test]
    fn report_describes_the_rendered_code() {
        let settings = QrSettings {
            size: 256,
            foreground: Rgb::new(0x1e, 0x3a, 0x8a),
            background: Rgb::new(0xfe, 0xf9, 0xc3),
        };
        let request = GenerateRequest::new("hello", settings).unwrap();
        let artifact = generate(&QrCodeEncoder, &request).unwrap();
        let json = serde_json::to_value(GenerationReport::new(&request, &artifact, None, 3)).unwrap();
        assert_eq!(json["color"], "#1e3a8a");
        assert_eq!(json["bgColor"], "#fef9c3");
        assert_eq!(json["width"], 256);
        assert_eq!(json["historyLen"], 3);

        let summary = build_text_summary(&request, &artifact, None, 3);
        assert!(summary.lines.contains(&"Colors: #1e3a8a on #fef9c3".to_string()));
    }

    #[test]
    fn history_summary_shows_placeholder_when_empty() {
        let summary = build_history_summary(&[], OffsetDateTime::now_utc());
        assert_eq!(summary.lines, [EMPTY_PLACEHOLDER]);
    }

    #[test]
    fn history_summary_lists_newest_first() {
        let now = datetime!(2024-03-20 12:00:00 UTC);
        let entries = vec![
            HistoryEntry::new(
                "https://example.com/a/very/long/path/indeed".into(),
                String::new(),
                now - Duration::minutes(5),
                QrSettings {
                    size: 300,
                    foreground: Rgb::new(0x11, 0x22, 0x33),
                    background: Rgb::WHITE,
                },
            ),
            HistoryEntry {
                text: "old".into(),
                image: String::new(),
                created_at: now - Duration::days(2),
                size: None,
                foreground: None,
                background: None,
            },
        ];
        let summary = build_history_summary(&entries, now);
        assert_eq!(summary.lines.len(), 2);
        assert!(summary.lines[0].starts_with(" 1. https://example.com/a/ver..."));
        assert!(summary.lines[0].contains("5 min ago"));
        assert!(summary.lines[0].contains("300px #112233/#ffffff"));
        assert!(summary.lines[1].contains("2 d ago"));
        assert!(summary.lines[1].ends_with('-'));
    }
}
