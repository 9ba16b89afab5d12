//! Recent-history cache.
//!
//! Newest-first list of at most [`HISTORY_CAPACITY`] entries, one per distinct
//! text, mirrored to a [`HistoryStore`] after every mutation. Storage problems
//! never reach the caller: they are logged and the cache degrades to what it
//! has in memory (or to an empty list on load).

use crate::model::HistoryEntry;
#[cfg(any(test, feature = "tui"))]
use crate::model::{QrSettings, Rgb};
use crate::storage::HistoryStore;
use std::collections::HashSet;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

pub const HISTORY_CAPACITY: usize = 12;

/// Characters of the text shown on a history card before it is cut.
pub const LABEL_BUDGET: usize = 25;

pub const EMPTY_PLACEHOLDER: &str = "No items in history";

/// What a history click copies back into the editable fields.
#[cfg(any(test, feature = "tui"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreTarget {
    pub text: String,
    pub size: Option<u32>,
    pub foreground: Option<Rgb>,
    pub background: Option<Rgb>,
}

#[cfg(any(test, feature = "tui"))]
impl RestoreTarget {
    /// Overwrite the settings that were stored with the entry; missing ones
    /// keep their current value.
    pub fn apply_to(&self, settings: &mut QrSettings) {
        if let Some(size) = self.size {
            settings.size = size;
        }
        if let Some(fg) = self.foreground {
            settings.foreground = fg;
        }
        if let Some(bg) = self.background {
            settings.background = bg;
        }
    }
}

pub struct HistoryCache<S: HistoryStore> {
    entries: Vec<HistoryEntry>,
    store: S,
}

impl<S: HistoryStore> HistoryCache<S> {
    /// Build a cache populated from whatever `store` currently holds.
    pub fn load(store: S) -> Self {
        let mut cache = Self {
            entries: Vec::new(),
            store,
        };
        cache.reload();
        cache
    }

    /// Replace the in-memory list with the persisted one.
    pub fn reload(&mut self) {
        self.entries = read_entries(&self.store);
    }

    /// Record a freshly generated code. An older entry with the same text is
    /// dropped first, then the list is capped at [`HISTORY_CAPACITY`].
    pub fn insert(&mut self, entry: HistoryEntry) {
        self.entries.retain(|e| e.text != entry.text);
        self.entries.insert(0, entry);
        self.entries.truncate(HISTORY_CAPACITY);
        self.persist();
        tracing::debug!(len = self.entries.len(), "history updated");
    }

    /// Drop every entry and remove the persisted value. Callers are expected
    /// to have obtained the user's confirmation.
    pub fn clear(&mut self) {
        self.entries.clear();
        if let Err(e) = self.store.remove() {
            tracing::warn!("failed to remove persisted history: {e}");
        }
        tracing::info!("history cleared");
    }

    #[cfg(any(test, feature = "tui"))]
    pub fn restore(&self, index: usize) -> Option<RestoreTarget> {
        self.entries.get(index).map(|e| RestoreTarget {
            text: e.text.clone(),
            size: e.size,
            foreground: e.foreground,
            background: e.background,
        })
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    #[cfg(any(test, feature = "tui"))]
    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn persist(&mut self) {
        match serde_json::to_string(&self.entries) {
            Ok(json) => {
                if let Err(e) = self.store.write(&json) {
                    tracing::warn!("failed to persist history: {e}");
                }
            }
            Err(e) => tracing::warn!("failed to serialize history: {e}"),
        }
    }
}

fn read_entries<S: HistoryStore>(store: &S) -> Vec<HistoryEntry> {
    let raw = match store.read() {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!("failed to read history, starting empty: {e}");
            return Vec::new();
        }
    };
    let parsed: Vec<HistoryEntry> = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("malformed history, starting empty: {e}");
            return Vec::new();
        }
    };

    // Records from builds that did not dedup may repeat a text; keep the newest.
    let mut seen = HashSet::new();
    let mut entries: Vec<HistoryEntry> = parsed
        .into_iter()
        .filter(|e| seen.insert(e.text.clone()))
        .collect();
    entries.truncate(HISTORY_CAPACITY);
    tracing::info!(len = entries.len(), "history loaded");
    entries
}

/// Card label: the text cut to [`LABEL_BUDGET`] characters with `...` appended.
pub fn short_label(text: &str) -> String {
    if text.chars().count() > LABEL_BUDGET {
        let head: String = text.chars().take(LABEL_BUDGET).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Coarse age of an entry: "now", "N min ago", "N h ago", "N d ago", or the
/// local calendar date once it is a week old.
pub fn format_relative(timestamp: OffsetDateTime, now: OffsetDateTime) -> String {
    let age = now - timestamp;
    let mins = age.whole_minutes();
    let hours = age.whole_hours();
    let days = age.whole_days();

    if mins < 1 {
        return "now".to_string();
    }
    if mins < 60 {
        return format!("{mins} min ago");
    }
    if hours < 24 {
        return format!("{hours} h ago");
    }
    if days < 7 {
        return format!("{days} d ago");
    }
    absolute_date(timestamp, local_offset())
}

/// `d/m/yyyy` in the given offset.
pub fn absolute_date(timestamp: OffsetDateTime, offset: UtcOffset) -> String {
    let fmt = format_description!("[day padding:none]/[month padding:none]/[year]");
    let local = timestamp.to_offset(offset);
    local
        .format(fmt)
        .unwrap_or_else(|_| local.date().to_string())
}

pub(crate) fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};
    use time::macros::datetime;
    use time::Duration;

    fn entry(text: &str) -> HistoryEntry {
        HistoryEntry::new(
            text.to_string(),
            format!("data:image/png;base64,{text}"),
            datetime!(2024-01-15 14:30:45 UTC),
            QrSettings::default(),
        )
    }

    fn persisted(cache: &HistoryCache<MemoryStore>) -> Vec<HistoryEntry> {
        let raw = cache.store().read().unwrap().expect("history persisted");
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn insert_prepends_and_grows_by_one() {
        let mut cache = HistoryCache::load(MemoryStore::default());
        cache.insert(entry("a"));
        cache.insert(entry("b"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.entries()[0].text, "b");
        assert_eq!(cache.entries()[1].text, "a");
    }

    #[test]
    fn thirteenth_insert_evicts_oldest() {
        let mut cache = HistoryCache::load(MemoryStore::default());
        for i in 0..13 {
            cache.insert(entry(&format!("item-{i}")));
        }
        assert_eq!(cache.len(), HISTORY_CAPACITY);
        assert_eq!(cache.entries()[0].text, "item-12");
        assert_eq!(cache.entries()[11].text, "item-1");
        assert!(cache.entries().iter().all(|e| e.text != "item-0"));
    }

    #[test]
    fn reinserting_a_key_moves_it_to_front() {
        let mut cache = HistoryCache::load(MemoryStore::default());
        for t in ["a", "b", "c"] {
            cache.insert(entry(t));
        }
        cache.insert(entry("a"));
        let texts: Vec<_> = cache.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["a", "c", "b"]);
    }

    #[test]
    fn reinserting_at_capacity_keeps_size() {
        let mut cache = HistoryCache::load(MemoryStore::default());
        for i in 0..HISTORY_CAPACITY {
            cache.insert(entry(&format!("item-{i}")));
        }
        cache.insert(entry("item-3"));
        assert_eq!(cache.len(), HISTORY_CAPACITY);
        assert_eq!(cache.entries().iter().filter(|e| e.text == "item-3").count(), 1);
        // Nothing was evicted since the re-insert freed its own slot.
        assert!(cache.entries().iter().any(|e| e.text == "item-0"));
    }

    #[test]
    fn persisted_form_matches_memory_after_each_mutation() {
        let mut cache = HistoryCache::load(MemoryStore::default());
        for i in 0..15 {
            cache.insert(entry(&format!("item-{}", i % 9)));
            assert_eq!(persisted(&cache), cache.entries());
        }
        cache.clear();
        assert_eq!(cache.store().read().unwrap(), None);
    }

    #[test]
    fn clear_then_load_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let mut cache = HistoryCache::load(FileStore::new(&path));
        cache.insert(entry("a"));
        assert_eq!(HistoryCache::load(FileStore::new(&path)).len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert!(!path.exists());
        assert!(HistoryCache::load(FileStore::new(&path)).is_empty());
    }

    #[test]
    fn malformed_storage_loads_empty() {
        let cache = HistoryCache::load(MemoryStore::with_value("{not json"));
        assert!(cache.is_empty());
    }

    #[test]
    fn load_drops_duplicates_and_caps_size() {
        let mut list: Vec<HistoryEntry> = (0..20).map(|i| entry(&format!("item-{i}"))).collect();
        list.insert(1, entry("item-0"));
        let raw = serde_json::to_string(&list).unwrap();
        let cache = HistoryCache::load(MemoryStore::with_value(raw));
        assert_eq!(cache.len(), HISTORY_CAPACITY);
        assert_eq!(cache.entries()[0].text, "item-0");
        assert_eq!(cache.entries()[1].text, "item-1");
    }

    #[test]
    fn restore_returns_text_and_settings() {
        let mut cache = HistoryCache::load(MemoryStore::default());
        let mut e = entry("https://example.com");
        e.size = Some(300);
        e.foreground = Some(Rgb::new(0x11, 0x22, 0x33));
        e.background = None;
        cache.insert(e);

        let target = cache.restore(0).unwrap();
        assert_eq!(target.text, "https://example.com");

        let mut settings = QrSettings {
            size: 128,
            foreground: Rgb::BLACK,
            background: Rgb::new(1, 2, 3),
        };
        target.apply_to(&mut settings);
        assert_eq!(settings.size, 300);
        assert_eq!(settings.foreground, Rgb::new(0x11, 0x22, 0x33));
        assert_eq!(settings.background, Rgb::new(1, 2, 3));
        assert!(cache.restore(1).is_none());
    }

    #[test]
    fn short_label_truncates_by_characters() {
        assert_eq!(short_label("short"), "short");
        let exact = "x".repeat(LABEL_BUDGET);
        assert_eq!(short_label(&exact), exact);
        let long = "ñ".repeat(30);
        assert_eq!(short_label(&long), format!("{}...", "ñ".repeat(LABEL_BUDGET)));
    }

    #[test]
    fn relative_time_labels() {
        let now = datetime!(2024-03-20 12:00:00 UTC);
        assert_eq!(format_relative(now - Duration::seconds(30), now), "now");
        assert_eq!(format_relative(now + Duration::seconds(30), now), "now");
        assert_eq!(format_relative(now - Duration::minutes(5), now), "5 min ago");
        assert_eq!(format_relative(now - Duration::minutes(59), now), "59 min ago");
        assert_eq!(format_relative(now - Duration::hours(3), now), "3 h ago");
        assert_eq!(format_relative(now - Duration::days(2), now), "2 d ago");
        assert_eq!(format_relative(now - Duration::days(6), now), "6 d ago");

        let old = now - Duration::days(10);
        assert_eq!(format_relative(old, now), absolute_date(old, local_offset()));
    }

    #[test]
    fn absolute_date_is_day_month_year() {
        let ts = datetime!(2024-03-05 12:00:00 UTC);
        assert_eq!(absolute_date(ts, UtcOffset::UTC), "5/3/2024");
    }
}
