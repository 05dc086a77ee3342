mod editor;

use std::io::{stdout, Write};
use std::time::Duration;

use crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers,
    },
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};

use playpen_core::Variant;
use playpen_engine::{Clipboard, Playground};

use crate::util;
use editor::{EditOutcome, TextEditor};

/// Lines shown for a collapsed step.
const SNIPPET_LINES: usize = 6;

pub(crate) struct TuiApp {
    playground: Playground,
    editor: TextEditor,
    clipboard: Box<dyn Clipboard>,
    should_quit: bool,
    show_help: bool,
    /// One-shot status text (preview path, open failure). Cleared on next key.
    notice: Option<String>,
}

impl TuiApp {
    pub(crate) fn new(playground: Playground, clipboard: Box<dyn Clipboard>, tab_width: usize) -> Self {
        let editor = TextEditor::new(playground.current_code(), tab_width);
        Self {
            playground,
            editor,
            clipboard,
            should_quit: false,
            show_help: false,
            notice: None,
        }
    }

    fn read_only(&self) -> bool {
        self.playground.variant().has_expand() && !self.playground.expanded()
    }

    /// Reload the editor after the active slot or its buffer changed underneath it.
    fn sync_editor(&mut self) {
        self.editor.load(self.playground.current_code());
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if self.show_help {
            // Any key dismisses help
            self.show_help = false;
            return;
        }
        self.notice = None;

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let alt = key.modifiers.contains(KeyModifiers::ALT);

        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::F(1) => self.show_help = true,
            KeyCode::Char('q') if ctrl => self.should_quit = true,
            KeyCode::Char('n') if ctrl => self.cycle(1),
            KeyCode::Char('p') if ctrl => self.cycle(-1),
            KeyCode::Char('r') if ctrl => {
                if self.playground.reset_active() {
                    self.sync_editor();
                }
            }
            KeyCode::Char('y') if ctrl => {
                self.playground.copy_active(self.clipboard.as_mut());
            }
            KeyCode::Char('e') if ctrl => {
                self.playground.toggle_expanded();
            }
            KeyCode::Char('o') if ctrl => self.open_in_browser(),
            KeyCode::Char(c @ '1'..='9') if alt => {
                let position = (c as usize) - ('1' as usize);
                if self.playground.select_position(position) {
                    self.sync_editor();
                }
            }
            _ => self.edit(key),
        }
    }

    /// Step sequences move with clamping; tabs wrap around.
    fn cycle(&mut self, delta: isize) {
        let moved = match self.playground.variant() {
            Variant::Steps if delta > 0 => self.playground.next(),
            Variant::Steps => self.playground.previous(),
            Variant::Tabs => {
                let len = self.playground.slots().len() as isize;
                let target = (self.playground.active_position() as isize + delta).rem_euclid(len);
                self.playground.select_position(target as usize)
            }
            Variant::Single => false,
        };
        if moved {
            self.sync_editor();
        }
    }

    fn edit(&mut self, key: KeyEvent) {
        if self.read_only() {
            return;
        }
        if self.editor.handle_key(key) == EditOutcome::Changed {
            self.playground.edit_active(self.editor.text());
        }
    }

    fn open_in_browser(&mut self) {
        let frame = self.playground.preview();
        let notice = match playpen_io::write_preview_temp(frame, self.playground.title()) {
            Ok(path) => match open::that(&path) {
                Ok(()) => format!("Preview opened: {}", path.display()),
                Err(e) => {
                    log::warn!("Failed to open {}: {}", path.display(), e);
                    format!("Preview written to {} (could not open browser)", path.display())
                }
            },
            Err(e) => {
                log::warn!("Preview export failed: {}", e);
                format!("Preview export failed: {e}")
            }
        };
        self.notice = Some(notice);
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

        self.draw_title(frame, chunks[0]);
        self.draw_slot_bar(frame, chunks[1]);

        let body = Layout::horizontal([Constraint::Min(20), Constraint::Length(34)]).split(chunks[2]);
        self.draw_editor(frame, body[0]);
        self.draw_preview(frame, body[1]);
        self.draw_status(frame, chunks[3]);

        if self.show_help {
            self.draw_help(frame, area);
        }
    }

    fn draw_title(&self, frame: &mut Frame, area: Rect) {
        let pg = &self.playground;
        let storage = match pg.storage_key() {
            Some(key) => format!(" | saved as {key}"),
            None => String::new(),
        };
        let title = format!(
            " playpen: {} | {} | {} slot(s){} ",
            pg.title(),
            pg.variant(),
            pg.slots().len(),
            storage
        );
        let para = Paragraph::new(Line::from(vec![Span::styled(
            title,
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )]))
        .style(Style::default().bg(Color::Cyan));
        frame.render_widget(para, area);
    }

    fn draw_slot_bar(&self, frame: &mut Frame, area: Rect) {
        let pg = &self.playground;
        let mut spans = Vec::new();
        if pg.variant() == Variant::Steps {
            spans.push(Span::styled(
                format!(" Step {}/{} ", pg.active_position() + 1, pg.slots().len()),
                Style::default().fg(Color::Yellow).bg(Color::Black),
            ));
        }
        for (i, slot) in pg.slots().iter().enumerate() {
            let marker = if pg.has_edits(slot.id()) { "*" } else { "" };
            let name = util::truncate_display(slot.label(), 24);
            let label = if i < 9 {
                format!(" {}:{}{} ", i + 1, name, marker)
            } else {
                format!(" {}{} ", name, marker)
            };
            if slot.id() == pg.active() {
                spans.push(Span::styled(
                    label,
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ));
            } else {
                spans.push(Span::styled(
                    label,
                    Style::default().fg(Color::Gray).bg(Color::DarkGray),
                ));
            }
            spans.push(Span::styled(" ", Style::default().bg(Color::Black)));
        }
        let para = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
        frame.render_widget(para, area);
    }

    fn draw_editor(&mut self, frame: &mut Frame, area: Rect) {
        let read_only = self.read_only();
        let title = if read_only {
            format!(" {} (collapsed, Ctrl-E to edit) ", self.playground.active_slot().label())
        } else {
            format!(" {} ", self.playground.active_slot().label())
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if read_only { Color::DarkGray } else { Color::Cyan }))
            .title(title);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let lines = self.editor.lines();
        let gutter = lines.len().to_string().len().max(2) + 1;
        let text_width = (inner.width as usize).saturating_sub(gutter + 1);
        let height = inner.height as usize;

        let (first, shown) = if read_only {
            (0, height.min(SNIPPET_LINES))
        } else {
            self.editor.adjust_scroll(height);
            (self.editor.scroll_row(), height)
        };
        let lines = self.editor.lines();
        let end = (first + shown).min(lines.len());

        let mut rendered: Vec<Line> = Vec::with_capacity(end - first + 1);
        for (row, line) in lines.iter().enumerate().take(end).skip(first) {
            let visible = util::visible_line(line);
            rendered.push(Line::from(vec![
                Span::styled(
                    format!("{:>width$} ", row + 1, width = gutter),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(util::clip_display(&visible, text_width).to_string()),
            ]));
        }
        if read_only && lines.len() > end {
            rendered.push(Line::from(Span::styled(
                format!("{:>width$} ... {} more line(s)", "", lines.len() - end, width = gutter),
                Style::default().fg(Color::DarkGray),
            )));
        }
        frame.render_widget(Paragraph::new(rendered), inner);

        if !read_only && !self.show_help {
            let (row, col) = self.editor.cursor();
            let line = &lines[row];
            let x = (gutter + 1 + util::column_of(line, col)).min(inner.width.saturating_sub(1) as usize);
            let y = row.saturating_sub(first);
            if y < height {
                frame.set_cursor_position((inner.x + x as u16, inner.y + y as u16));
            }
        }
    }

    fn draw_preview(&self, frame: &mut Frame, area: Rect) {
        let preview = self.playground.preview();
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta))
            .title(format!(" Preview #{} ", preview.generation()));

        let sandbox = if preview.sandbox_attribute().is_empty() {
            "(everything denied)".to_string()
        } else {
            preview.sandbox_attribute().to_string()
        };
        let dim = Style::default().fg(Color::DarkGray);
        let lines = vec![
            Line::from(vec![Span::styled("sandbox  ", dim), Span::raw(sandbox)]),
            Line::from(vec![Span::styled("referrer ", dim), Span::raw("no-referrer")]),
            Line::from(vec![
                Span::styled("markup   ", dim),
                Span::raw(format!("{} bytes", preview.source_len())),
            ]),
            Line::from(""),
            Line::from(Span::styled("Ctrl-O renders it in your browser", dim)),
        ];
        let para = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
        frame.render_widget(para, area);
    }

    fn draw_status(&self, frame: &mut Frame, area: Rect) {
        let pg = &self.playground;
        let mut left = format!(" {}", pg.active_slot().label());
        if pg.has_edits(pg.active()) {
            left.push_str("  [edited]  Ctrl-R: reset");
        }
        if pg.is_copied() {
            left.push_str("  Copied!");
        }
        if let Some(notice) = &self.notice {
            left.push_str("  ");
            left.push_str(notice);
        }

        let (row, col) = self.editor.cursor();
        let right = format!("Ln {}, Col {}  F1: help ", row + 1, col + 1);

        let width = area.width as usize;
        let left = util::truncate_display(&left, width.saturating_sub(util::display_width(&right)));
        let padding = width.saturating_sub(util::display_width(&left) + util::display_width(&right));
        let status = format!("{}{:pad$}{}", left, "", right, pad = padding);

        let style = if pg.is_copied() {
            Style::default().fg(Color::Black).bg(Color::Green)
        } else {
            Style::default().fg(Color::Black).bg(Color::DarkGray)
        };
        let para = Paragraph::new(Line::from(vec![Span::styled(status, style)])).style(style);
        frame.render_widget(para, area);
    }

    fn draw_help(&self, frame: &mut Frame, area: Rect) {
        let mut help_lines = vec![
            "",
            "  Editing",
            "  -------",
            "  arrows / PgUp / PgDn   Move cursor",
            "  Home / End             Line start/end",
            "  Tab                    Indent",
            "  Ctrl+R                 Reset to original",
            "  Ctrl+Y                 Copy code",
            "  Ctrl+O                 Open preview in browser",
        ];

        match self.playground.variant() {
            Variant::Steps => help_lines.extend_from_slice(&[
                "",
                "  Steps",
                "  -----",
                "  Ctrl+N / Ctrl+P        Next/prev step",
                "  Alt+1..9               Jump to step",
                "  Ctrl+E                 Expand/collapse",
            ]),
            Variant::Tabs => help_lines.extend_from_slice(&[
                "",
                "  Tabs",
                "  ----",
                "  Ctrl+N / Ctrl+P        Next/prev tab",
                "  Alt+1..9               Jump to tab",
            ]),
            Variant::Single => {}
        }

        help_lines.extend_from_slice(&[
            "",
            "  General",
            "  -------",
            "  Esc / Ctrl+Q           Quit",
            "  F1                     Toggle this help",
            "",
        ]);
        let help_width: u16 = 50;
        let help_height: u16 = help_lines.len() as u16 + 2;

        let x = area.width.saturating_sub(help_width) / 2;
        let y = area.height.saturating_sub(help_height) / 2;
        let popup = Rect::new(
            area.x + x,
            area.y + y,
            help_width.min(area.width),
            help_height.min(area.height),
        );

        let lines: Vec<Line> = help_lines
            .iter()
            .map(|s| Line::from(Span::styled(*s, Style::default().fg(Color::White))))
            .collect();

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Keybindings ")
            .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .style(Style::default().bg(Color::Black));

        frame.render_widget(Clear, popup);
        frame.render_widget(Paragraph::new(lines).block(block), popup);
    }
}

/// Run the interactive shell until the user quits.
pub fn run(playground: Playground, clipboard: Box<dyn Clipboard>, tab_width: usize) -> Result<(), String> {
    let app = TuiApp::new(playground, clipboard, tab_width);
    run_app(app)
}

fn run_app(mut app: TuiApp) -> Result<(), String> {
    terminal::enable_raw_mode().map_err(|e| format!("failed to enable raw mode: {}", e))?;
    stdout()
        .execute(EnterAlternateScreen)
        .map_err(|e| format!("failed to enter alternate screen: {}", e))?;
    if let Err(e) = stdout().execute(EnableBracketedPaste) {
        log::debug!("Bracketed paste unavailable: {}", e);
    }

    struct Cleanup;
    impl Drop for Cleanup {
        fn drop(&mut self) {
            let mut out = stdout();
            let _ = out.execute(DisableBracketedPaste);
            let _ = out.execute(LeaveAlternateScreen);
            let _ = terminal::disable_raw_mode();
            let _ = out.flush();
        }
    }
    let _cleanup = Cleanup;

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend).map_err(|e| format!("failed to create terminal: {}", e))?;

    loop {
        terminal
            .draw(|frame| app.draw(frame))
            .map_err(|e| format!("draw error: {}", e))?;

        if event::poll(Duration::from_millis(100)).map_err(|e| format!("event poll error: {}", e))? {
            match event::read().map_err(|e| format!("event read error: {}", e))? {
                Event::Key(key) if key.kind != KeyEventKind::Release => app.handle_key(key),
                Event::Paste(text) => app.paste(&text),
                _ => {}
            }
        }
        app.playground.poll_timers();

        if app.should_quit {
            break;
        }
    }

    app.playground.flush_persistence();
    log::debug!("Shell closed for '{}'", app.playground.title());
    Ok(())
}

impl TuiApp {
    fn paste(&mut self, text: &str) {
        if self.read_only() {
            return;
        }
        let mut changed = false;
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            // Terminals send pasted newlines as CR, LF or CRLF
            let code = match ch {
                '\r' => {
                    chars.next_if_eq(&'\n');
                    KeyCode::Enter
                }
                '\n' => KeyCode::Enter,
                c => KeyCode::Char(c),
            };
            changed |= self.editor.handle_key(KeyEvent::new(code, KeyModifiers::NONE)) == EditOutcome::Changed;
        }
        if changed {
            self.playground.edit_active(self.editor.text());
        }
    }
}
