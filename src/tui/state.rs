use crate::history::HistoryCache;
use crate::model::{QrSettings, Rgb, SIZE_OPTIONS};
use crate::render::{decode_data_uri, Artifact};
use crate::storage::BoxedStore;
use crate::trigger::Debouncer;
use image::RgbaImage;
use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};
use std::path::PathBuf;

pub const TAB_GENERATE: usize = 0;
pub const TAB_HISTORY: usize = 1;
pub const TAB_HELP: usize = 2;
pub const TAB_COUNT: usize = 3;

/// Foreground choices offered by the colour picker (F3).
pub const FOREGROUND_PALETTE: [Rgb; 6] = [
    Rgb::BLACK,
    Rgb::new(0x1e, 0x3a, 0x8a),
    Rgb::new(0x16, 0x65, 0x34),
    Rgb::new(0x6d, 0x28, 0xd9),
    Rgb::new(0xb9, 0x1c, 0x1c),
    Rgb::WHITE,
];

/// Background choices offered by the colour picker (F4).
pub const BACKGROUND_PALETTE: [Rgb; 5] = [
    Rgb::WHITE,
    Rgb::new(0xfe, 0xf9, 0xc3),
    Rgb::new(0xe0, 0xf2, 0xfe),
    Rgb::new(0xf3, 0xf4, 0xf6),
    Rgb::BLACK,
];

/// Decoded snapshot of the selected history entry.
pub struct HistoryPreview {
    pub index: usize,
    pub image: Option<RgbaImage>,
}

pub struct UiState {
    pub tab: usize,
    pub input: String,
    pub settings: QrSettings,
    pub info: String,
    /// Blocking message; must be dismissed before anything else happens.
    pub alert: Option<String>,
    pub confirm_clear: bool,

    pub artifact: Option<Artifact>,
    pub shown_text: Option<String>,
    pub generating: bool,
    pub debouncer: Debouncer,

    pub history: HistoryCache<BoxedStore>,
    pub history_selected: usize, // Index of selected history item (0 = most recent)
    pub history_preview: Option<HistoryPreview>,

    pub download_dir: PathBuf,
    pub last_download: Option<PathBuf>,
}

impl UiState {
    pub fn new(
        history: HistoryCache<BoxedStore>,
        settings: QrSettings,
        debouncer: Debouncer,
        download_dir: PathBuf,
    ) -> Self {
        let mut state = Self {
            tab: TAB_GENERATE,
            input: String::new(),
            settings,
            info: String::new(),
            alert: None,
            confirm_clear: false,
            artifact: None,
            shown_text: None,
            generating: false,
            debouncer,
            history,
            history_selected: 0,
            history_preview: None,
            download_dir,
            last_download: None,
        };
        state.refresh_history_preview();
        state
    }

    pub fn next_size(&mut self) {
        self.settings.size = cycle(&SIZE_OPTIONS, self.settings.size);
    }

    pub fn next_foreground(&mut self) {
        self.settings.foreground = cycle(&FOREGROUND_PALETTE, self.settings.foreground);
    }

    pub fn next_background(&mut self) {
        self.settings.background = cycle(&BACKGROUND_PALETTE, self.settings.background);
    }

    /// Keep the selection inside the list after it shrinks.
    pub fn clamp_history_selection(&mut self) {
        if self.history_selected >= self.history.len() {
            self.history_selected = self.history.len().saturating_sub(1);
        }
    }

    /// Decode the selected entry's snapshot for the preview pane.
    pub fn refresh_history_preview(&mut self) {
        self.clamp_history_selection();
        let Some(entry) = self.history.get(self.history_selected) else {
            self.history_preview = None;
            return;
        };
        let image = match decode_data_uri(&entry.image) {
            Ok(img) => Some(img),
            Err(e) => {
                tracing::debug!("history snapshot unreadable: {e}");
                None
            }
        };
        self.history_preview = Some(HistoryPreview {
            index: self.history_selected,
            image,
        });
    }
}

/// Next value after `current` in `options`, wrapping; the first option when
/// `current` is not one of them.
pub fn cycle<T: Copy + PartialEq>(options: &[T], current: T) -> T {
    match options.iter().position(|o| *o == current) {
        Some(i) => options[(i + 1) % options.len()],
        None => options[0],
    }
}

pub fn to_color(c: Rgb) -> Color {
    Color::Rgb(c.r, c.g, c.b)
}

pub fn push_wrapped_status_kv(
    out: &mut Vec<Line<'static>>,
    label: &str,
    value: &str,
    status_area_width: u16,
) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    // Account for borders (2 chars on each side)
    let usable_width = status_area_width.saturating_sub(4).max(1);
    let label_text = format!("{label}:");
    let label_width = label_text.chars().count() as u16;

    let value_chars: Vec<char> = value.chars().collect();
    let mut remaining = value_chars.as_slice();
    let mut first = true;

    while !remaining.is_empty() {
        let line_width = if first {
            usable_width.saturating_sub(label_width + 1).max(1)
        } else {
            usable_width.saturating_sub(2).max(1)
        };

        let chars_to_take = (remaining.len() as u16).min(line_width) as usize;
        let (line_chars, rest) = remaining.split_at(chars_to_take);
        let line_text: String = line_chars.iter().collect();

        if first {
            out.push(Line::from(vec![
                Span::styled(label_text.clone(), Style::default().fg(Color::Gray)),
                Span::raw(" "),
                Span::raw(line_text),
            ]));
            first = false;
        } else {
            out.push(Line::from(vec![Span::raw("  "), Span::raw(line_text)]));
        }

        remaining = rest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HistoryEntry;
    use crate::storage::MemoryStore;
    use time::OffsetDateTime;

    fn state_with(entries: &[&str]) -> UiState {
        let mut history: HistoryCache<BoxedStore> =
            HistoryCache::load(Box::new(MemoryStore::default()));
        for text in entries {
            history.insert(HistoryEntry::new(
                text.to_string(),
                "not a data uri".into(),
                OffsetDateTime::now_utc(),
                QrSettings::default(),
            ));
        }
        UiState::new(
            history,
            QrSettings::default(),
            Debouncer::default(),
            PathBuf::from("."),
        )
    }

    #[test]
    fn cycle_wraps_and_recovers_from_unknown_values() {
        assert_eq!(cycle(&SIZE_OPTIONS, 128), 200);
        assert_eq!(cycle(&SIZE_OPTIONS, 400), 128);
        assert_eq!(cycle(&SIZE_OPTIONS, 999), 128);
    }

    #[test]
    fn pickers_walk_their_palettes() {
        let mut state = state_with(&[]);
        state.next_size();
        assert_eq!(state.settings.size, 256);
        state.next_foreground();
        assert_eq!(state.settings.foreground, FOREGROUND_PALETTE[1]);
        state.next_background();
        assert_eq!(state.settings.background, BACKGROUND_PALETTE[1]);
    }

    #[test]
    fn selection_is_clamped_after_clear() {
        let mut state = state_with(&["a", "b", "c"]);
        state.history_selected = 2;
        state.history.clear();
        state.refresh_history_preview();
        assert_eq!(state.history_selected, 0);
        assert!(state.history_preview.is_none());
    }

    #[test]
    fn unreadable_snapshot_still_selects() {
        let state = state_with(&["a"]);
        let preview = state.history_preview.as_ref().unwrap();
        assert_eq!(preview.index, 0);
        assert!(preview.image.is_none());
    }

    #[test]
    fn wrapped_status_splits_long_values() {
        let mut out = Vec::new();
        push_wrapped_status_kv(&mut out, "Info", &"x".repeat(50), 24);
        assert!(out.len() > 1);
        push_wrapped_status_kv(&mut out, "Empty", "   ", 24);
        assert!(out.len() > 1);
    }
}
