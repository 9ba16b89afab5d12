//! Terminal rendering of QR bitmaps.
//!
//! Each cell draws two vertically stacked pixels with `▀`: the foreground colour
//! is the upper pixel and the background colour the lower one.

use super::state::to_color;
use crate::render::Artifact;
use image::{imageops::FilterType, RgbaImage};
use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
};

const UPPER_HALF: &str = "▀";

/// Quiet zone drawn around the live preview, in modules.
const PREVIEW_QUIET_ZONE: i64 = 1;

/// Cells needed to draw `artifact` at one module per cell column.
pub fn artifact_cells(artifact: &Artifact) -> (u16, u16) {
    let side = artifact.module_width() as i64 + 2 * PREVIEW_QUIET_ZONE;
    (side as u16, ((side + 1) / 2) as u16)
}

/// Draw the module matrix of `artifact`, or `None` if it does not fit.
pub fn artifact_lines(artifact: &Artifact, max_cols: u16, max_rows: u16) -> Option<Vec<Line<'static>>> {
    let (cols, rows) = artifact_cells(artifact);
    if cols > max_cols || rows > max_rows {
        return None;
    }

    let dark = to_color(artifact.dark);
    let light = to_color(artifact.light);
    let color = |x: i64, y: i64| if artifact.is_dark(x, y) { dark } else { light };

    let lo = -PREVIEW_QUIET_ZONE;
    let hi = artifact.module_width() as i64 + PREVIEW_QUIET_ZONE;
    let mut lines = Vec::with_capacity(rows as usize);
    let mut y = lo;
    while y < hi {
        let spans: Vec<Span<'static>> = (lo..hi)
            .map(|x| half_block(color(x, y), color(x, y + 1)))
            .collect();
        lines.push(Line::from(spans));
        y += 2;
    }
    Some(lines)
}

/// Draw a stored snapshot scaled down to fit `max_cols` × `max_rows` cells.
pub fn snapshot_lines(image: &RgbaImage, max_cols: u16, max_rows: u16) -> Vec<Line<'static>> {
    // Square output: one pixel per column, two per row.
    let side = u32::from(max_cols.min(max_rows.saturating_mul(2))) & !1;
    if side == 0 || image.width() == 0 || image.height() == 0 {
        return Vec::new();
    }
    let scaled = image::imageops::resize(image, side, side, FilterType::Nearest);
    let px = |x: u32, y: u32| {
        let p = scaled.get_pixel(x, y);
        Color::Rgb(p[0], p[1], p[2])
    };

    (0..side)
        .step_by(2)
        .map(|y| {
            let spans: Vec<Span<'static>> = (0..side).map(|x| half_block(px(x, y), px(x, y + 1))).collect();
            Line::from(spans)
        })
        .collect()
}

fn half_block(upper: Color, lower: Color) -> Span<'static> {
    Span::styled(UPPER_HALF, Style::default().fg(upper).bg(lower))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QrSettings;
    use crate::render::QrCodeEncoder;
    use crate::trigger::{generate, GenerateRequest};

    fn artifact() -> Artifact {
        let request = GenerateRequest::new("https://example.com", QrSettings::default()).unwrap();
        generate(&QrCodeEncoder, &request).unwrap()
    }

    #[test]
    fn artifact_preview_fits_or_declines() {
        let artifact = artifact();
        let (cols, rows) = artifact_cells(&artifact);
        let lines = artifact_lines(&artifact, cols, rows).unwrap();
        assert_eq!(lines.len(), rows as usize);
        assert!(lines.iter().all(|l| l.spans.len() == cols as usize));
        assert!(artifact_lines(&artifact, cols - 1, rows).is_none());
    }

    #[test]
    fn snapshot_is_scaled_to_square() {
        let artifact = artifact();
        let lines = snapshot_lines(&artifact.image, 40, 10);
        assert_eq!(lines.len(), 10);
        assert!(lines.iter().all(|l| l.spans.len() == 20));
        assert!(snapshot_lines(&artifact.image, 0, 10).is_empty());
    }
}
