//! Post-generation processing.
//!
//! Snapshots a completed artifact and records it in the history cache.

use crate::history::HistoryCache;
use crate::model::HistoryEntry;
use crate::render::{Artifact, RenderError};
use crate::storage::HistoryStore;
use crate::trigger::GenerateRequest;
use time::OffsetDateTime;

/// Record a completed generation. Nothing is inserted if the snapshot cannot
/// be encoded.
pub(crate) fn process_generation<S: HistoryStore>(
    history: &mut HistoryCache<S>,
    request: &GenerateRequest,
    artifact: &Artifact,
    now: OffsetDateTime,
) -> Result<(), RenderError> {
    let image = artifact.data_uri()?;
    history.insert(HistoryEntry::new(
        request.text.clone(),
        image,
        now,
        request.settings,
    ));
    Ok(())
}
