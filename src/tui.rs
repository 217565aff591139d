use crate::document::RowKind;
use crate::portal::{Portal, Theme};
use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    cursor::Show,
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, List, ListItem, ListState, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState,
    },
};
use std::io;
use std::time::Duration;

const MOUSE_SCROLL_ROWS: isize = 3;

#[derive(Debug, Clone, Copy)]
struct Palette {
    bg: Color,
    fg: Color,
    muted: Color,
    accent: Color,
    bar_bg: Color,
    selection_bg: Color,
    code: Color,
    warn: Color,
}

fn palette_of(theme: Theme) -> Palette {
    match theme {
        Theme::Light => Palette {
            bg: Color::Rgb(250, 250, 250),
            fg: Color::Rgb(30, 30, 30),
            muted: Color::Rgb(120, 120, 120),
            accent: Color::Rgb(0, 122, 255),
            bar_bg: Color::Rgb(235, 240, 245),
            selection_bg: Color::Rgb(210, 220, 235),
            code: Color::Rgb(38, 130, 70),
            warn: Color::Rgb(200, 110, 0),
        },
        Theme::Dark => Palette {
            bg: Color::Rgb(20, 22, 26),
            fg: Color::Rgb(220, 220, 220),
            muted: Color::Rgb(140, 140, 140),
            accent: Color::Rgb(95, 175, 255),
            bar_bg: Color::Rgb(35, 40, 46),
            selection_bg: Color::Rgb(60, 65, 72),
            code: Color::Rgb(130, 200, 120),
            warn: Color::Rgb(255, 200, 110),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    pub text: String,
    pub lesson_id: Option<String>,
}

/// ナビゲーション一覧と、アクティブなレッスンの位置
pub fn nav_entries(portal: &Portal) -> (Vec<NavEntry>, Option<usize>) {
    let active = portal.active_id();
    let filtered = portal.filtered();
    let mut entries = Vec::new();
    let mut selected = None;

    for chapter in filtered.chapters() {
        entries.push(NavEntry {
            text: chapter.title.to_string(),
            lesson_id: None,
        });
        for lesson in &chapter.lessons {
            if active.as_deref() == Some(lesson.id.as_str()) {
                selected = Some(entries.len());
            }
            entries.push(NavEntry {
                text: format!("  {}", lesson.title),
                lesson_id: Some(lesson.id.clone()),
            });
        }
    }

    (entries, selected)
}

pub struct App {
    portal: Portal,
    search_active: bool,
    nav_state: ListState,
    // 直近に描画した目次の領域（クリック判定用）
    nav_area: Rect,
}

impl App {
    pub fn new(portal: Portal) -> Self {
        Self {
            portal,
            search_active: false,
            nav_state: ListState::default(),
            nav_area: Rect::default(),
        }
    }

    /// 目次の index 番目の項目へジャンプする。章見出しなら何もしない
    pub fn activate_nav_entry(&mut self, index: usize) -> bool {
        let (entries, _) = nav_entries(&self.portal);
        match entries.get(index).and_then(|e| e.lesson_id.as_deref()) {
            Some(id) => {
                debug_log!("目次からジャンプ: #{}", id);
                self.portal.scroll_to_lesson(id)
            }
            None => false,
        }
    }

    fn handle_nav_click(&mut self, mouse: MouseEvent) {
        let area = self.nav_area;
        // 枠線の内側だけが項目
        let inside = mouse.column > area.x
            && mouse.column + 1 < area.x + area.width
            && mouse.row > area.y
            && mouse.row + 1 < area.y + area.height;
        if inside {
            let index = self.nav_state.offset() + (mouse.row - area.y - 1) as usize;
            self.activate_nav_entry(index);
        }
    }

    /// 終了するなら true
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let alt = key.modifiers.contains(KeyModifiers::ALT);

        if self.search_active {
            match key.code {
                KeyCode::Char('c') if ctrl => return true,
                KeyCode::Esc | KeyCode::Enter => self.search_active = false,
                KeyCode::Backspace => {
                    let mut query = self.portal.query().to_string();
                    query.pop();
                    self.portal.set_query(query);
                }
                KeyCode::Char('u') if ctrl => self.portal.set_query(""),
                KeyCode::Char(c) if !ctrl && !alt => {
                    let mut query = self.portal.query().to_string();
                    query.push(c);
                    self.portal.set_query(query);
                }
                _ => {}
            }
            return false;
        }

        match key.code {
            KeyCode::Char('c') if ctrl => return true,
            KeyCode::Char('q') => return true,
            KeyCode::Char('/') => self.search_active = true,
            KeyCode::Esc => self.portal.set_query(""),
            KeyCode::Char('j') | KeyCode::Down => self.portal.scroll_by(1),
            KeyCode::Char('k') | KeyCode::Up => self.portal.scroll_by(-1),
            KeyCode::Char(' ') | KeyCode::PageDown => self.portal.page_down(),
            KeyCode::PageUp => self.portal.page_up(),
            KeyCode::Char('g') | KeyCode::Home => self.portal.scroll_to(0),
            KeyCode::Char('G') | KeyCode::End => self.portal.scroll_to(usize::MAX),
            KeyCode::Char('n') => self.portal.next_lesson(),
            KeyCode::Char('p') => self.portal.prev_lesson(),
            KeyCode::Char('t') => self.portal.toggle_theme(),
            _ => {}
        }
        false
    }

    fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            Event::Mouse(mouse) => {
                match mouse.kind {
                    MouseEventKind::ScrollDown => self.portal.scroll_by(MOUSE_SCROLL_ROWS),
                    MouseEventKind::ScrollUp => self.portal.scroll_by(-MOUSE_SCROLL_ROWS),
                    MouseEventKind::Down(MouseButton::Left) => self.handle_nav_click(mouse),
                    _ => {}
                }
                false
            }
            _ => false,
        }
    }
}

type RestoreStep = Box<dyn FnOnce() -> io::Result<()>>;

/// すべての手順を実行し、最初のエラーを返す
fn run_restore_steps(steps: Vec<RestoreStep>) -> io::Result<()> {
    let mut first_err = None;
    for step in steps {
        if let Err(e) = step() {
            first_err.get_or_insert(e);
        }
    }
    first_err.map_or(Ok(()), Err)
}

/// drop（パニック時を含む）で端末を元に戻す
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        // 以降で失敗しても drop で raw モードは解除される
        let guard = TerminalGuard;
        execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let result = run_restore_steps(vec![
            Box::new(disable_raw_mode) as RestoreStep,
            Box::new(|| execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture, Show))
                as RestoreStep,
        ]);
        if let Err(e) = result {
            debug_log!("端末の復元に失敗: {}", e);
        }
    }
}

pub fn run(portal: Portal) -> Result<()> {
    let _guard = TerminalGuard::enter()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(portal);
    run_app(&mut terminal, &mut app)
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    debug_log!("TUI開始");
    loop {
        terminal.draw(|f| ui(f, app))?;
        if event::poll(Duration::from_millis(200))? && app.handle_event(event::read()?) {
            break;
        }
    }
    debug_log!("TUI終了");
    Ok(())
}

fn ui(f: &mut Frame, app: &mut App) {
    let palette = palette_of(app.portal.theme());
    f.render_widget(
        Block::default().style(Style::default().bg(palette.bg).fg(palette.fg)),
        f.area(),
    );

    // ヘッダー + 本体 + フッター
    let v = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(f.area());
    let h = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(v[1]);

    let content_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.muted));
    let inner = content_block.inner(h[1]);
    // 描画前に表示領域の大きさを反映する（スクロールバーの1列を除く）
    app.portal
        .resize(inner.width.saturating_sub(1) as usize, inner.height as usize);

    draw_header(f, v[0], app, &palette);
    draw_nav(f, h[0], app, &palette);
    draw_content(f, h[1], content_block, app, &palette);
    draw_footer(f, v[2], app, &palette);
}

fn draw_header(f: &mut Frame, area: Rect, app: &App, palette: &Palette) {
    let filtered = app.portal.filtered();
    let mut spans = vec![
        Span::styled(
            " 📚 Learning Portal ",
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" 🔍 "),
        Span::raw(app.portal.query().to_string()),
    ];
    if app.search_active {
        spans.push(Span::styled("▏", Style::default().fg(palette.accent)));
    }
    spans.push(Span::styled(
        format!(
            "  {}/{} 件 / 約{}分",
            filtered.lesson_count(),
            app.portal.curriculum().lessons().count(),
            filtered.total_minutes()
        ),
        Style::default().fg(palette.muted),
    ));

    f.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(palette.bar_bg)),
        area,
    );
}

fn draw_nav(f: &mut Frame, area: Rect, app: &mut App, palette: &Palette) {
    let (entries, selected) = nav_entries(&app.portal);
    let items: Vec<ListItem> = entries
        .into_iter()
        .map(|entry| {
            let style = if entry.lesson_id.is_none() {
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(palette.fg)
            };
            ListItem::new(Line::from(Span::styled(entry.text, style)))
        })
        .collect();

    app.nav_area = area;
    app.nav_state.select(selected);
    let list = List::new(items)
        .block(
            Block::default()
                .title(" 目次 ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.muted)),
        )
        .highlight_style(
            Style::default()
                .bg(palette.selection_bg)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶");
    f.render_stateful_widget(list, area, &mut app.nav_state);
}

fn row_style(kind: RowKind, palette: &Palette) -> Style {
    match kind {
        RowKind::ChapterHeading => Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::BOLD),
        RowKind::LessonTitle => Style::default().fg(palette.fg).add_modifier(Modifier::BOLD),
        RowKind::Meta | RowKind::Caption | RowKind::CodeFrame => {
            Style::default().fg(palette.muted)
        }
        RowKind::Summary => Style::default()
            .fg(palette.muted)
            .add_modifier(Modifier::ITALIC),
        RowKind::Code => Style::default().fg(palette.code),
        RowKind::Image => Style::default().fg(palette.accent),
        RowKind::NoResults => Style::default().fg(palette.warn),
        RowKind::Text | RowKind::Bullet | RowKind::Blank => Style::default().fg(palette.fg),
    }
}

fn draw_content(f: &mut Frame, area: Rect, block: Block, app: &App, palette: &Palette) {
    let inner = block.inner(area);
    let document = app.portal.document();
    let scroll = app.portal.scroll();

    let lines: Vec<Line> = document
        .rows()
        .iter()
        .skip(scroll)
        .take(inner.height as usize)
        .map(|row| Line::from(Span::styled(row.text.clone(), row_style(row.kind, palette))))
        .collect();

    f.render_widget(Paragraph::new(lines).block(block), area);
    draw_scrollbar(f, area, scroll, document.len());
}

fn draw_scrollbar(f: &mut Frame, area: Rect, position: usize, content_len: usize) {
    if area.height <= 2 {
        return;
    }
    let total = content_len.max(position + 1).max(1);
    let mut state = ScrollbarState::new(total).position(position);
    let sb = Scrollbar::new(ScrollbarOrientation::VerticalRight);
    let sb_area = Rect {
        x: area.x + area.width.saturating_sub(1),
        y: area.y + 1,
        width: 1,
        height: area.height.saturating_sub(2),
    };
    f.render_stateful_widget(sb, sb_area, &mut state);
}

fn draw_footer(f: &mut Frame, area: Rect, app: &App, palette: &Palette) {
    let help = if app.search_active {
        " 入力で絞り込み | Backspace: 削除 | Ctrl+U: クリア | Enter/Esc: 確定 "
    } else {
        " /: 検索 | Esc: 検索解除 | j/k: スクロール | n/p: 次/前のレッスン | t: テーマ | q: 終了 "
    };
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(
            help,
            Style::default().fg(palette.muted),
        )))
        .style(Style::default().bg(palette.bar_bg)),
        area,
    );
}
