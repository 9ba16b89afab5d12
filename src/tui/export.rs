use crate::storage;
use anyhow::Result;
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;
use time::OffsetDateTime;

use super::state::UiState;

// Global clipboard manager channel - initialized once on first use
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Save the displayed code as a timestamped PNG in the download directory.
/// A missing code or a failed write becomes a blocking alert.
pub fn download_current(state: &mut UiState) {
    match storage::download_artifact(
        &state.download_dir,
        state.artifact.as_ref(),
        OffsetDateTime::now_utc(),
    ) {
        Ok(path) => {
            state.info = format!("Downloaded: {} (Ctrl-Y to copy path)", path.display());
            state.last_download = Some(path);
        }
        Err(e) => {
            tracing::warn!("download failed: {e}");
            state.alert = Some(e.to_string());
        }
    }
}

/// Copy the last downloaded path to the clipboard.
pub fn copy_download_path(state: &mut UiState) {
    let Some(path) = state.last_download.as_ref() else {
        state.info = "Nothing downloaded yet. Press Ctrl-S first".into();
        return;
    };
    let path = path.to_string_lossy().to_string();
    match copy_to_clipboard(&path) {
        Ok(_) => {
            let display_path = if path.chars().count() > 60 {
                let head: String = path.chars().take(57).collect();
                format!("{head}...")
            } else {
                path
            };
            state.info = format!("✓ Copied to clipboard: {}", display_path);
        }
        Err(e) => {
            state.info = format!("Clipboard copy failed: {e:#}");
        }
    }
}

/// Initialize the clipboard manager thread if not already initialized.
/// This creates a background thread that processes clipboard operations sequentially,
/// keeping each clipboard instance alive for a sufficient duration.
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                match Clipboard::new() {
                    Ok(mut clipboard) => {
                        if clipboard.set_text(&text).is_ok() {
                            // Keep the instance alive so clipboard managers on Linux can read it.
                            std::thread::sleep(Duration::from_secs(2));
                        }
                    }
                    Err(e) => tracing::warn!("clipboard unavailable: {e}"),
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Copy text to clipboard.
/// Returns immediately after queuing the clipboard operation, without blocking the UI thread.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}
