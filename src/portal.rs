use crate::content::Curriculum;
use crate::document::{Document, Viewport};
use crate::filter::{FilteredCurriculum, filter_curriculum};
use crate::scroll_spy::{Fallback, ScrollEvents, ScrollSpy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// ページ表示中の状態をまとめて持つ。query / theme / activeId の持ち主はここだけ
pub struct Portal {
    curriculum: Curriculum,
    query: String,
    theme: Theme,
    width: usize,
    viewport_height: usize,
    offset: i32,
    document: Document,
    scroll: usize,
    events: ScrollEvents,
    spy: ScrollSpy,
}

impl Portal {
    pub fn new(curriculum: Curriculum, theme: Theme, offset: i32, fallback: Fallback) -> Self {
        let width = 80;
        let filtered = filter_curriculum(&curriculum, "");
        let document = Document::render(&filtered, width);
        let events = ScrollEvents::new();
        let spy = ScrollSpy::subscribe(
            &events,
            filtered.lesson_ids(),
            offset,
            fallback,
            &Viewport {
                document: &document,
                scroll: 0,
            },
        );

        Self {
            curriculum,
            query: String::new(),
            theme,
            width,
            viewport_height: 20,
            offset,
            document,
            scroll: 0,
            events,
            spy,
        }
    }

    /// 検索ボックスから毎キー入力で呼ばれる
    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        if query == self.query {
            return;
        }
        self.query = query;
        self.scroll = 0;
        self.rebuild();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// 現在のクエリで毎回作り直す
    pub fn filtered(&self) -> FilteredCurriculum<'_> {
        filter_curriculum(&self.curriculum, &self.query)
    }

    fn rebuild(&mut self) {
        let filtered = filter_curriculum(&self.curriculum, &self.query);
        self.document = Document::render(&filtered, self.width);
        let ids = filtered.lesson_ids();
        debug_log!(
            "検索 {:?}: {} 章 / {} レッスン",
            self.query,
            filtered.chapters().len(),
            ids.len()
        );

        self.scroll = self.scroll.min(self.max_scroll());
        let viewport = Viewport {
            document: &self.document,
            scroll: self.scroll,
        };
        if !self
            .spy
            .retarget(&self.events, ids, self.offset, &viewport)
        {
            // id 列が同じでも行位置は変わりうる
            self.events.emit(&viewport);
        }
    }

    /// 表示領域の大きさを反映する。幅が変わったら折り返しをやり直す
    pub fn resize(&mut self, width: usize, viewport_height: usize) {
        self.viewport_height = viewport_height.max(1);
        let width = width.max(1);
        if width != self.width {
            self.width = width;
            let anchor = self.spy.active_id().filter(|_| self.scroll > 0);
            self.rebuild();
            if let Some(id) = anchor {
                self.scroll_to_lesson(&id);
            }
        }
    }

    fn max_scroll(&self) -> usize {
        self.document.len().saturating_sub(1)
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let next = self.scroll.saturating_add_signed(delta).min(self.max_scroll());
        self.scroll_to(next);
    }

    pub fn page_down(&mut self) {
        self.scroll_by(self.viewport_height.saturating_sub(1).max(1) as isize);
    }

    pub fn page_up(&mut self) {
        self.scroll_by(-(self.viewport_height.saturating_sub(1).max(1) as isize));
    }

    pub fn scroll_to(&mut self, row: usize) {
        self.scroll = row.min(self.max_scroll());
        self.emit_scroll();
    }

    /// `#id` へのジャンプ。アンカーが無ければ false
    pub fn scroll_to_lesson(&mut self, id: &str) -> bool {
        match self.document.anchor_row(id) {
            Some(row) => {
                self.scroll_to(row);
                true
            }
            None => false,
        }
    }

    pub fn next_lesson(&mut self) {
        let ids = self.spy.ids();
        let target = match self.active_index() {
            Some(i) => ids.get(i + 1).or_else(|| ids.get(i)),
            None => ids.first(),
        };
        if let Some(id) = target.cloned() {
            self.scroll_to_lesson(&id);
        }
    }

    pub fn prev_lesson(&mut self) {
        let Some(i) = self.active_index() else {
            return;
        };
        let ids = self.spy.ids();
        let current_row = self.document.anchor_row(&ids[i]);
        // レッスンの途中ならまずその先頭へ戻る
        let target = if current_row.is_some_and(|row| row < self.scroll) || i == 0 {
            ids[i].clone()
        } else {
            ids[i - 1].clone()
        };
        self.scroll_to_lesson(&target);
    }

    fn active_index(&self) -> Option<usize> {
        let active = self.spy.active_id()?;
        self.spy.ids().iter().position(|id| *id == active)
    }

    fn emit_scroll(&self) {
        self.events.emit(&Viewport {
            document: &self.document,
            scroll: self.scroll,
        });
    }

    pub fn active_id(&self) -> Option<String> {
        self.spy.active_id()
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        debug_log!("テーマ切り替え: {:?}", self.theme);
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    #[cfg(test)]
    fn listener_count(&self) -> usize {
        self.events.listener_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentLoader;

    fn create_portal() -> Portal {
        let curriculum = ContentLoader::embedded()
            .expect("embedded curriculum")
            .into_curriculum();
        let mut portal = Portal::new(curriculum, Theme::Light, 3, Fallback::First);
        portal.resize(60, 20);
        portal
    }

    #[test]
    fn test_initial_state() {
        let portal = create_portal();

        assert_eq!(portal.query(), "");
        assert_eq!(portal.theme(), Theme::Light);
        assert_eq!(portal.scroll(), 0);
        assert_eq!(portal.active_id().as_deref(), Some("basics-intro"));
        assert_eq!(portal.listener_count(), 1);
    }

    #[test]
    fn test_set_query_filters_and_resubscribes() {
        let mut portal = create_portal();
        portal.scroll_by(30);

        portal.set_query("glossary");
        assert_eq!(portal.scroll(), 0);
        assert_eq!(portal.filtered().lesson_ids(), vec!["reference-glossary"]);
        assert_eq!(portal.active_id().as_deref(), Some("reference-glossary"));
        assert_eq!(portal.listener_count(), 1);

        portal.set_query("edge");
        assert_eq!(portal.active_id().as_deref(), Some("functions-advanced"));

        portal.set_query("no such thing anywhere");
        assert!(portal.filtered().is_empty());
        assert_eq!(portal.active_id(), None);
        assert_eq!(portal.listener_count(), 1);

        portal.set_query("   ");
        assert_eq!(portal.filtered().lesson_ids(), portal.curriculum().lesson_ids());
    }

    #[test]
    fn test_scrolling_moves_active_lesson() {
        let mut portal = create_portal();
        let row = portal.document().anchor_row("basics-variables").unwrap();

        portal.scroll_to(row);
        assert_eq!(portal.active_id().as_deref(), Some("basics-variables"));

        // offset 行ぶん手前でも到達済み扱い
        portal.scroll_to(row - 3);
        assert_eq!(portal.active_id().as_deref(), Some("basics-variables"));

        portal.scroll_to(row - 4);
        assert_eq!(portal.active_id().as_deref(), Some("basics-intro"));
    }

    #[test]
    fn test_lesson_navigation() {
        let mut portal = create_portal();

        portal.next_lesson();
        assert_eq!(portal.active_id().as_deref(), Some("basics-variables"));
        portal.next_lesson();
        assert_eq!(portal.active_id().as_deref(), Some("basics-control-flow"));
        portal.prev_lesson();
        assert_eq!(portal.active_id().as_deref(), Some("basics-variables"));

        assert!(portal.scroll_to_lesson("reference-resources"));
        assert!(!portal.scroll_to_lesson("missing"));
        portal.next_lesson();
        assert_eq!(portal.active_id().as_deref(), Some("reference-resources"));
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut portal = create_portal();

        portal.scroll_by(-5);
        assert_eq!(portal.scroll(), 0);
        portal.scroll_by(100_000);
        assert_eq!(portal.scroll(), portal.document().len() - 1);
        assert_eq!(portal.active_id().as_deref(), Some("reference-resources"));
    }

    #[test]
    fn test_resize_keeps_active_lesson() {
        let mut portal = create_portal();
        portal.scroll_to_lesson("functions-define");

        portal.resize(20, 10);
        assert_eq!(portal.active_id().as_deref(), Some("functions-define"));
        assert_eq!(portal.listener_count(), 1);
    }

    #[test]
    fn test_toggle_theme() {
        let mut portal = create_portal();

        portal.toggle_theme();
        assert_eq!(portal.theme(), Theme::Dark);
        portal.toggle_theme();
        assert_eq!(portal.theme(), Theme::Light);
    }
}
