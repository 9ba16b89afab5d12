use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key(k: &'static str, width: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(k, Style::default().fg(Color::Magenta)),
        Span::raw(format!("{:pad$}{what}", "", pad = width.saturating_sub(k.chars().count()))),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame, debounce_ms: u128) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        key("Ctrl-C", 12, "Quit (q also works outside the Generate tab)"),
        key("tab", 12, "Switch tabs"),
        key("F1", 12, "Show this help"),
        key("F2", 12, "Next size"),
        key("F3", 12, "Next foreground colour"),
        key("F4", 12, "Next background colour"),
        key("Ctrl-S", 12, "Download PNG (once a code is shown)"),
        key("Ctrl-Y", 12, "Copy downloaded path to clipboard"),
        Line::from(""),
        Line::from("Generate tab:"),
        key("typing", 12, ""),
        Line::from(format!(
            "    Regenerates after {debounce_ms} ms without further edits"
        )),
        key("Enter", 12, "Generate now"),
        key("Ctrl-U", 12, "Clear the text"),
        Line::from(""),
        Line::from("History tab:"),
        key("↑/↓ j/k", 12, "Navigate"),
        key("Enter", 12, "Restore text and settings, then regenerate"),
        key("y", 12, "Copy selected text to clipboard"),
        key("r", 12, "Reload from disk"),
        key("x", 12, "Clear history (asks first)"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
