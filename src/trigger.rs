//! Generation trigger: input validation and the debounce timer.

use crate::model::QrSettings;
use crate::render::{Artifact, QrEncoder, RenderRequest, ERROR_CORRECTION};
#[cfg(any(test, feature = "tui"))]
use std::time::{Duration, Instant};

#[cfg(any(test, feature = "tui"))]
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    #[error("Please enter some text or a URL")]
    EmptyInput,
    #[error("Error generating the QR code: {0}")]
    Render(String),
    #[error("Error generating the QR code: no image was produced")]
    MissingArtifact,
}

/// A validated request: trimmed, non-empty text plus the settings to draw with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub text: String,
    pub settings: QrSettings,
}

impl GenerateRequest {
    pub fn new(text: &str, settings: QrSettings) -> Result<Self, GenerateError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GenerateError::EmptyInput);
        }
        Ok(Self {
            text: text.to_string(),
            settings,
        })
    }

    pub fn render_request(&self) -> RenderRequest {
        RenderRequest {
            text: self.text.clone(),
            width: self.settings.size,
            height: self.settings.size,
            dark: self.settings.foreground,
            light: self.settings.background,
            ec_level: ERROR_CORRECTION,
        }
    }
}

/// Render one request on the calling thread. The controller runs this on the
/// blocking pool.
pub fn generate(encoder: &dyn QrEncoder, request: &GenerateRequest) -> Result<Artifact, GenerateError> {
    encoder
        .render(&request.render_request())
        .map_err(|e| GenerateError::Render(e.to_string()))
}

/// Cancellable one-shot timer. Every `schedule` pushes the deadline out to
/// `now + window`, so only the last of a burst of edits fires.
#[cfg(any(test, feature = "tui"))]
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

#[cfg(any(test, feature = "tui"))]
impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns true exactly once per schedule, when `now` has reached the deadline.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(any(test, feature = "tui"))]
impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::QrCodeEncoder;

    #[test]
    fn rejects_blank_input() {
        assert_eq!(
            GenerateRequest::new("   \n\t", QrSettings::default()),
            Err(GenerateError::EmptyInput)
        );
        assert_eq!(
            GenerateRequest::new("", QrSettings::default()),
            Err(GenerateError::EmptyInput)
        );
    }

    #[test]
    fn trims_and_maps_settings() {
        let settings = QrSettings {
            size: 300,
            ..QrSettings::default()
        };
        let req = GenerateRequest::new("  https://example.com \n", settings).unwrap();
        assert_eq!(req.text, "https://example.com");
        let render = req.render_request();
        assert_eq!((render.width, render.height), (300, 300));
        assert_eq!(render.ec_level, qrcode::EcLevel::H);
    }

    #[test]
    fn generate_reports_render_failures() {
        let req = GenerateRequest::new(&"z".repeat(3000), QrSettings::default()).unwrap();
        let err = generate(&QrCodeEncoder, &req).unwrap_err();
        assert!(matches!(err, GenerateError::Render(_)));
    }

    #[test]
    fn only_last_schedule_fires() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(800));
        d.schedule(t0);
        d.schedule(t0 + Duration::from_millis(500));
        // The first deadline (t0 + 800ms) no longer applies.
        assert!(!d.fire_if_due(t0 + Duration::from_millis(900)));
        assert!(d.fire_if_due(t0 + Duration::from_millis(1300)));
        assert!(!d.fire_if_due(t0 + Duration::from_millis(5000)));
    }

    #[test]
    fn cancel_prevents_firing() {
        let t0 = Instant::now();
        let mut d = Debouncer::default();
        d.schedule(t0);
        assert!(d.is_pending());
        d.cancel();
        assert!(!d.is_pending());
        assert!(!d.fire_if_due(t0 + Duration::from_secs(10)));
    }
}
