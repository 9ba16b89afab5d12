mod export;
mod help;
mod preview;
mod state;

use crate::cli::{self, Cli};
use crate::history::{format_relative, short_label, EMPTY_PLACEHOLDER};
use crate::model::GenerateEvent;
use crate::orchestrator::{self, UiCommand};
use crate::render::QrCodeEncoder;
use crate::trigger::{Debouncer, GenerateError, GenerateRequest};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap},
    Terminal,
};
use state::{
    push_wrapped_status_kv, to_color, UiState, TAB_COUNT, TAB_GENERATE, TAB_HELP, TAB_HISTORY,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli) -> Result<()> {
    // Unbounded channels avoid backpressure between the UI thread and the controller.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<GenerateEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let history = cli::open_history(&args);
    let download_dir = cli::download_dir(&args)?;

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_args = args.clone();
    let ui_handle = std::thread::spawn(move || {
        run_threaded(ui_args, history, download_dir, event_rx, cmd_tx)
    });

    let res = orchestrator::run_controller(Arc::new(QrCodeEncoder), event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    args: Cli,
    history: crate::history::HistoryCache<crate::storage::BoxedStore>,
    download_dir: PathBuf,
    mut event_rx: UnboundedReceiver<GenerateEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState::new(
        history,
        cli::build_settings(&args),
        Debouncer::new(Duration::from(args.debounce)),
        download_dir,
    );

    let tick_rate = Duration::from_millis(50);
    let mut last_tick = Instant::now();
    let mut dirty = true;

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&mut state, ev);
            dirty = true;
        }

        if state.debouncer.fire_if_due(Instant::now()) {
            tracing::debug!("debounce window elapsed");
            auto_generate(&mut state, &cmd_tx);
            dirty = true;
        }

        if dirty || last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
            dirty = false;
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                dirty = true;
                if handle_key(&mut state, k, &cmd_tx) {
                    let _ = cmd_tx.send(UiCommand::Quit);
                    break Ok(());
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

/// Validate the current input and hand it to the controller. Invalid input
/// raises an alert and changes nothing else.
fn trigger_generation(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>) {
    state.debouncer.cancel();
    match GenerateRequest::new(&state.input, state.settings) {
        Ok(request) => {
            state.artifact = None;
            state.shown_text = None;
            if cmd_tx.send(UiCommand::Generate(request)).is_err() {
                state.alert = Some("The generator has stopped; restart the app.".into());
            }
        }
        Err(e) => state.alert = Some(e.to_string()),
    }
}

/// Debounced trigger: blank input is skipped silently rather than alerted.
fn auto_generate(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>) {
    if state.input.trim().is_empty() {
        return;
    }
    trigger_generation(state, cmd_tx);
}

fn restore_selected(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>) {
    let Some(target) = state.history.restore(state.history_selected) else {
        return;
    };
    state.input = target.text.clone();
    target.apply_to(&mut state.settings);
    state.tab = TAB_GENERATE;
    state.info = format!("Restored: {}", short_label(&target.text));
    trigger_generation(state, cmd_tx);
}

/// Returns true when the app should quit.
fn handle_key(state: &mut UiState, k: KeyEvent, cmd_tx: &UnboundedSender<UiCommand>) -> bool {
    let ctrl = k.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && k.code == KeyCode::Char('c') {
        return true;
    }

    // Modal dialogs swallow everything until answered.
    if state.alert.is_some() {
        if matches!(k.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
            state.alert = None;
        }
        return false;
    }
    if state.confirm_clear {
        match k.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                state.confirm_clear = false;
                state.history.clear();
                state.history_selected = 0;
                state.refresh_history_preview();
                state.info = "History cleared".into();
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.confirm_clear = false;
                state.info = "Clear cancelled".into();
            }
            _ => {}
        }
        return false;
    }

    match (k.modifiers, k.code) {
        (_, KeyCode::Tab) => {
            state.tab = (state.tab + 1) % TAB_COUNT;
            if state.tab == TAB_HISTORY {
                state.history_selected = 0;
                state.refresh_history_preview();
            }
            return false;
        }
        (_, KeyCode::BackTab) => {
            state.tab = (state.tab + TAB_COUNT - 1) % TAB_COUNT;
            return false;
        }
        (_, KeyCode::F(1)) => {
            state.tab = TAB_HELP;
            return false;
        }
        (_, KeyCode::F(2)) => {
            state.next_size();
            state.info = format!("Size: {} px (Enter to regenerate)", state.settings.size);
            return false;
        }
        (_, KeyCode::F(3)) => {
            state.next_foreground();
            state.info = format!("Foreground: {} (Enter to regenerate)", state.settings.foreground);
            return false;
        }
        (_, KeyCode::F(4)) => {
            state.next_background();
            state.info = format!("Background: {} (Enter to regenerate)", state.settings.background);
            return false;
        }
        (m, KeyCode::Char('s')) if m.contains(KeyModifiers::CONTROL) => {
            export::download_current(state);
            return false;
        }
        (m, KeyCode::Char('y')) if m.contains(KeyModifiers::CONTROL) => {
            export::copy_download_path(state);
            return false;
        }
        _ => {}
    }

    match state.tab {
        TAB_GENERATE => {
            match (k.modifiers, k.code) {
                (_, KeyCode::Enter) => trigger_generation(state, cmd_tx),
                (_, KeyCode::Backspace) => {
                    if state.input.pop().is_some() {
                        state.debouncer.schedule(Instant::now());
                    }
                }
                (m, KeyCode::Char('u')) if m.contains(KeyModifiers::CONTROL) => {
                    state.input.clear();
                    state.debouncer.schedule(Instant::now());
                }
                (m, KeyCode::Char(c))
                    if !m.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
                {
                    state.input.push(c);
                    state.debouncer.schedule(Instant::now());
                }
                _ => {}
            }
            false
        }
        TAB_HISTORY => match k.code {
            KeyCode::Char('q') => true,
            KeyCode::Up | KeyCode::Char('k') => {
                if state.history_selected > 0 {
                    state.history_selected -= 1;
                    state.refresh_history_preview();
                }
                false
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if state.history_selected + 1 < state.history.len() {
                    state.history_selected += 1;
                    state.refresh_history_preview();
                }
                false
            }
            KeyCode::Enter => {
                restore_selected(state, cmd_tx);
                false
            }
            KeyCode::Char('x') => {
                if state.history.is_empty() {
                    state.info = "History is already empty".into();
                } else {
                    state.confirm_clear = true;
                }
                false
            }
            KeyCode::Char('r') => {
                state.history.reload();
                state.refresh_history_preview();
                state.info = format!("Reloaded: {} item(s)", state.history.len());
                false
            }
            KeyCode::Char('y') => {
                if let Some(entry) = state.history.get(state.history_selected) {
                    let text = entry.text.clone();
                    state.info = match export::copy_to_clipboard(&text) {
                        Ok(_) => format!("✓ Copied to clipboard: {}", short_label(&text)),
                        Err(e) => format!("Clipboard copy failed: {e:#}"),
                    };
                }
                false
            }
            _ => false,
        },
        _ => matches!(k.code, KeyCode::Char('q')),
    }
}

fn apply_event(state: &mut UiState, ev: GenerateEvent) {
    match ev {
        GenerateEvent::Started { id, text } => {
            tracing::debug!(id, "ui received start");
            state.generating = true;
            state.info = format!("Generating: {}", short_label(&text));
        }
        GenerateEvent::Queued { id } => {
            tracing::debug!(id, "ui received queue notice");
            state.info = "Waiting for the current render…".into();
        }
        GenerateEvent::Completed {
            id,
            request,
            artifact,
        } => {
            tracing::debug!(id, "ui received artifact");
            state.generating = false;
            if let Err(e) = orchestrator::process_generation(
                &mut state.history,
                &request,
                &artifact,
                OffsetDateTime::now_utc(),
            ) {
                tracing::error!("could not snapshot QR code: {e}");
                state.alert = Some(GenerateError::Render(e.to_string()).to_string());
                return;
            }
            state.artifact = Some(*artifact);
            state.shown_text = Some(request.text);
            state.history_selected = 0;
            state.refresh_history_preview();
            state.info = "QR code generated".into();
        }
        GenerateEvent::Failed { id, error } => {
            tracing::warn!(id, "generation failed: {error}");
            state.generating = false;
            state.alert = Some(error.to_string());
        }
        GenerateEvent::Info(msg) => state.info = msg,
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![
        Line::from("Generate"),
        Line::from(format!("History ({})", state.history.len())),
        Line::from("Help"),
    ])
    .select(state.tab)
    .block(Block::default().borders(Borders::ALL).title("qrgen"))
    .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        TAB_GENERATE => draw_generate(chunks[1], f, state),
        TAB_HISTORY => draw_history(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f, state.debouncer.window().as_millis()),
    }

    if state.confirm_clear {
        draw_modal(
            area,
            f,
            "Clear history",
            vec![
                Line::from(format!(
                    "Clear all {} history item(s)? This cannot be undone.",
                    state.history.len()
                )),
                Line::from(""),
                Line::from(vec![
                    Span::styled("y", Style::default().fg(Color::Magenta)),
                    Span::raw(": clear   "),
                    Span::styled("n", Style::default().fg(Color::Magenta)),
                    Span::raw(": cancel"),
                ]),
            ],
        );
    }
    if let Some(msg) = state.alert.as_deref() {
        draw_modal(
            area,
            f,
            "Alert",
            vec![
                Line::from(msg.to_string()),
                Line::from(""),
                Line::from(Span::styled(
                    "Press Enter to dismiss",
                    Style::default().fg(Color::Gray),
                )),
            ],
        );
    }
}

fn draw_modal(area: Rect, f: &mut ratatui::Frame, title: &str, lines: Vec<Line<'static>>) {
    let width = area.width.min(64);
    let height = (lines.len() as u16 + 4).min(area.height);
    let rect = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };
    f.render_widget(Clear, rect);
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(title.to_string()),
        );
    f.render_widget(p, rect);
}

fn draw_generate(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(46), Constraint::Min(0)].as_ref())
        .split(area);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(6),
                Constraint::Min(0),
            ]
            .as_ref(),
        )
        .split(cols[0]);

    // Input: show the tail when the text is wider than the box.
    let inner_width = left[0].width.saturating_sub(3) as usize;
    let char_count = state.input.chars().count();
    let visible: String = state
        .input
        .chars()
        .skip(char_count.saturating_sub(inner_width))
        .collect();
    let input = Paragraph::new(Line::from(vec![
        Span::raw(visible),
        Span::styled("▏", Style::default().fg(Color::Magenta)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Text or URL (Enter: generate)"),
    );
    f.render_widget(input, left[0]);

    let swatch = |c| Span::styled("██", Style::default().fg(to_color(c)));
    let settings = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("Size:       ", Style::default().fg(Color::Gray)),
            Span::raw(format!("{} px  ", state.settings.size)),
            Span::styled("F2", Style::default().fg(Color::Magenta)),
        ]),
        Line::from(vec![
            Span::styled("Foreground: ", Style::default().fg(Color::Gray)),
            swatch(state.settings.foreground),
            Span::raw(format!(" {}  ", state.settings.foreground)),
            Span::styled("F3", Style::default().fg(Color::Magenta)),
        ]),
        Line::from(vec![
            Span::styled("Background: ", Style::default().fg(Color::Gray)),
            swatch(state.settings.background),
            Span::raw(format!(" {}  ", state.settings.background)),
            Span::styled("F4", Style::default().fg(Color::Magenta)),
        ]),
        Line::from(vec![
            Span::styled("Correction: ", Style::default().fg(Color::Gray)),
            Span::raw("H (highest)"),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Settings"));
    f.render_widget(settings, left[1]);

    let width = left[2].width;
    let mut status: Vec<Line<'static>> = Vec::new();
    push_wrapped_status_kv(&mut status, "Info", &state.info, width);
    if state.generating {
        status.push(Line::from(Span::styled(
            "Rendering…",
            Style::default().fg(Color::Yellow),
        )));
    } else if state.debouncer.is_pending() {
        status.push(Line::from(Span::styled(
            "Waiting for typing to pause…",
            Style::default().fg(Color::Gray),
        )));
    }
    if let Some(text) = state.shown_text.as_deref() {
        push_wrapped_status_kv(&mut status, "Showing", text, width);
    }
    if state.artifact.is_some() {
        status.push(Line::from(""));
        status.push(Line::from(vec![
            Span::styled("Ctrl-S", Style::default().fg(Color::Magenta)),
            Span::raw(" Download PNG"),
        ]));
    }
    if let Some(path) = state.last_download.as_ref() {
        push_wrapped_status_kv(&mut status, "Last download", &path.display().to_string(), width);
        status.push(Line::from(vec![
            Span::styled("Ctrl-Y", Style::default().fg(Color::Magenta)),
            Span::raw(" Copy path"),
        ]));
    }
    let p = Paragraph::new(status).block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(p, left[2]);

    let block = Block::default().borders(Borders::ALL).title("QR code");
    let inner = block.inner(cols[1]);
    f.render_widget(block, cols[1]);

    let body: Vec<Line<'static>> = match state.artifact.as_ref() {
        Some(artifact) => match preview::artifact_lines(artifact, inner.width, inner.height) {
            Some(lines) => lines,
            None => {
                let (w, h) = preview::artifact_cells(artifact);
                vec![Line::from(format!(
                    "Enlarge the terminal to preview ({w}x{h} cells needed)"
                ))]
            }
        },
        None if state.generating => vec![Line::from("Rendering…")],
        None => vec![Line::from(Span::styled(
            "Type some text to generate a QR code",
            Style::default().fg(Color::Gray),
        ))],
    };
    let top_pad = inner.height.saturating_sub(body.len() as u16) / 2;
    let mut padded: Vec<Line<'static>> = vec![Line::from(""); top_pad as usize];
    padded.extend(body);
    f.render_widget(Paragraph::new(padded).alignment(Alignment::Center), inner);
}

fn draw_history(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(40), Constraint::Length(34)].as_ref())
        .split(area);

    let mut lines: Vec<Line<'static>> = Vec::new();
    let total = state.history.len();
    let current_pos = if total > 0 { state.history_selected + 1 } else { 0 };
    lines.push(Line::from(vec![
        Span::raw(format!("History ({current_pos}/{total}) - ")),
        Span::styled("↑/↓/j/k", Style::default().fg(Color::Magenta)),
        Span::raw(": navigate, "),
        Span::styled("Enter", Style::default().fg(Color::Magenta)),
        Span::raw(": restore, "),
        Span::styled("x", Style::default().fg(Color::Magenta)),
        Span::raw(": clear"),
    ]));
    if !state.info.is_empty() {
        push_wrapped_status_kv(&mut lines, "Info", &state.info, cols[0].width);
    }
    lines.push(Line::from(""));

    if state.history.is_empty() {
        lines.push(Line::from(Span::styled(
            EMPTY_PLACEHOLDER,
            Style::default().fg(Color::Gray),
        )));
    }

    let now = OffsetDateTime::now_utc();
    for (idx, entry) in state.history.entries().iter().enumerate() {
        let is_selected = idx == state.history_selected;
        let style = if is_selected {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        let pick = |normal: Style| if is_selected { style } else { normal };

        let mut spans = vec![
            Span::styled(format!("{:>2}. ", idx + 1), pick(Style::default().fg(Color::Gray))),
            Span::styled(if is_selected { "> " } else { "  " }, style),
            Span::styled(format!("{:<28}", short_label(&entry.text)), style),
            Span::raw("  "),
            Span::styled(
                format!("{:<12}", format_relative(entry.created_at, now)),
                pick(Style::default().fg(Color::Gray)),
            ),
        ];
        if let Some(size) = entry.size {
            spans.push(Span::raw("  "));
            spans.push(Span::styled(
                format!("{size:>4}px"),
                pick(Style::default().fg(Color::Cyan)),
            ));
        }
        if let (Some(fg), Some(bg)) = (entry.foreground, entry.background) {
            spans.push(Span::raw(" "));
            spans.push(Span::styled("█", Style::default().fg(to_color(fg)).bg(to_color(bg))));
            spans.push(Span::styled("█", Style::default().fg(to_color(bg))));
        }
        lines.push(Line::from(spans));
    }

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("History"));
    f.render_widget(p, cols[0]);

    let block = Block::default().borders(Borders::ALL).title("Preview");
    let inner = block.inner(cols[1]);
    f.render_widget(block, cols[1]);

    let mut preview_lines: Vec<Line<'static>> = Vec::new();
    if let (Some(entry), Some(preview)) = (
        state.history.get(state.history_selected),
        state
            .history_preview
            .as_ref()
            .filter(|p| p.index == state.history_selected),
    ) {
        // Leave room below the image for the full text.
        let text_rows = 3;
        match preview.image.as_ref() {
            Some(img) => preview_lines.extend(preview::snapshot_lines(
                img,
                inner.width,
                inner.height.saturating_sub(text_rows),
            )),
            None => preview_lines.push(Line::from(Span::styled(
                "Snapshot unavailable",
                Style::default().fg(Color::Gray),
            ))),
        }
        preview_lines.push(Line::from(""));
        push_wrapped_status_kv(&mut preview_lines, "Text", &entry.text, inner.width + 4);
    }
    f.render_widget(
        Paragraph::new(preview_lines).alignment(Alignment::Center),
        inner,
    );
}
