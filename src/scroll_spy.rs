use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// ビューポート上端からこの距離までに上端が来たセクションを「到達済み」とみなす
pub const DEFAULT_OFFSET: i32 = 120;

/// アンカー位置の問い合わせ。ビューポート上端からの相対位置を返す
pub trait AnchorLayout {
    /// 文書中にアンカーが存在しなければ `None`
    fn anchor_top(&self, id: &str) -> Option<i32>;
}

impl AnchorLayout for HashMap<String, i32> {
    fn anchor_top(&self, id: &str) -> Option<i32> {
        self.get(id).copied()
    }
}

/// どのセクションにも到達していないときの扱い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Fallback {
    /// 先頭のIDをアクティブにする
    #[default]
    First,
    /// 何もハイライトしない
    Nothing,
}

/// 到達済みの最後のセクションを返す。未到達のIDに当たった時点で走査をやめる
pub fn compute_active_id<'a>(
    ids: &'a [String],
    layout: &dyn AnchorLayout,
    offset: i32,
    fallback: Fallback,
) -> Option<&'a str> {
    let mut current = None;

    for id in ids {
        // 文書にないアンカーは飛ばす
        let Some(top) = layout.anchor_top(id) else {
            continue;
        };
        if top <= offset {
            current = Some(id.as_str());
        } else {
            break;
        }
    }

    current.or_else(|| match fallback {
        Fallback::First => ids.first().map(String::as_str),
        Fallback::Nothing => None,
    })
}

type ScrollHandler = Box<dyn FnMut(&dyn AnchorLayout)>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<(u64, ScrollHandler)>,
}

/// スクロールイベントの購読先。UIスレッド専用
#[derive(Clone, Default)]
pub struct ScrollEvents {
    registry: Rc<RefCell<Registry>>,
}

impl ScrollEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen(&self, handler: impl FnMut(&dyn AnchorLayout) + 'static) -> ScrollListener {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.handlers.push((id, Box::new(handler)));

        ScrollListener {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    pub fn emit(&self, layout: &dyn AnchorLayout) {
        for (_, handler) in self.registry.borrow_mut().handlers.iter_mut() {
            handler(layout);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.borrow().handlers.len()
    }
}

/// drop で購読を解除するガード
pub struct ScrollListener {
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Drop for ScrollListener {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .borrow_mut()
                .handlers
                .retain(|(id, _)| *id != self.id);
        }
    }
}

/// 現在読んでいるセクションを追跡する。(ids, offset) の組ごとに購読をやり直す
pub struct ScrollSpy {
    ids: Rc<Vec<String>>,
    offset: i32,
    fallback: Fallback,
    active: Rc<RefCell<Option<String>>>,
    listener: Option<ScrollListener>,
}

impl ScrollSpy {
    pub fn subscribe(
        events: &ScrollEvents,
        ids: Vec<String>,
        offset: i32,
        fallback: Fallback,
        layout: &dyn AnchorLayout,
    ) -> Self {
        let mut spy = Self {
            ids: Rc::new(Vec::new()),
            offset,
            fallback,
            active: Rc::new(RefCell::new(None)),
            listener: None,
        };
        spy.attach(events, ids, offset, layout);
        spy
    }

    fn attach(
        &mut self,
        events: &ScrollEvents,
        ids: Vec<String>,
        offset: i32,
        layout: &dyn AnchorLayout,
    ) {
        // 古いリスナーを先に外す
        self.listener = None;
        self.ids = Rc::new(ids);
        self.offset = offset;

        let ids = Rc::clone(&self.ids);
        let active = Rc::clone(&self.active);
        let fallback = self.fallback;
        let evaluate = move |layout: &dyn AnchorLayout| {
            let next = compute_active_id(&ids, layout, offset, fallback).map(str::to_string);
            *active.borrow_mut() = next;
        };

        // 最初のスクロール前でも正しい値を持つよう即時に評価する
        evaluate(layout);
        self.listener = Some(events.listen(evaluate));
    }

    /// ids か offset が変わったときだけ購読し直す。やり直したら true
    pub fn retarget(
        &mut self,
        events: &ScrollEvents,
        ids: Vec<String>,
        offset: i32,
        layout: &dyn AnchorLayout,
    ) -> bool {
        if self.listener.is_some() && *self.ids == ids && self.offset == offset {
            return false;
        }
        debug_log!(
            "スクロールスパイを再購読: {} 件, offset={}",
            ids.len(),
            offset
        );
        self.attach(events, ids, offset, layout);
        true
    }

    pub fn unsubscribe(&mut self) {
        self.listener = None;
    }

    pub fn is_subscribed(&self) -> bool {
        self.listener.is_some()
    }

    pub fn active_id(&self) -> Option<String> {
        self.active.borrow().clone()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn layout(tops: &[(&str, i32)]) -> HashMap<String, i32> {
        tops.iter().map(|(id, top)| (id.to_string(), *top)).collect()
    }

    #[test]
    fn test_defaults_to_first_id_above_all_anchors() {
        let ids = ids(&["a", "b", "c"]);
        let layout = layout(&[("a", 300), ("b", 700), ("c", 1200)]);

        assert_eq!(
            compute_active_id(&ids, &layout, DEFAULT_OFFSET, Fallback::First),
            Some("a")
        );
        assert_eq!(
            compute_active_id(&ids, &layout, DEFAULT_OFFSET, Fallback::Nothing),
            None
        );
    }

    #[test]
    fn test_stops_at_first_unreached_section() {
        let ids = ids(&["a", "b", "c"]);
        let layout = layout(&[("a", -50), ("b", 130), ("c", 400)]);

        assert_eq!(compute_active_id(&ids, &layout, 120, Fallback::First), Some("a"));
    }

    #[test]
    fn test_last_reached_section_is_active() {
        let ids = ids(&["L1", "L2", "L3"]);
        let layout = layout(&[("L1", -200), ("L2", 50), ("L3", 600)]);

        assert_eq!(compute_active_id(&ids, &layout, 120, Fallback::First), Some("L2"));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let ids = ids(&["a", "b"]);
        let layout = layout(&[("a", 0), ("b", 120)]);

        assert_eq!(compute_active_id(&ids, &layout, 120, Fallback::First), Some("b"));
    }

    #[test]
    fn test_empty_ids_have_no_active_id() {
        let layout = layout(&[("a", -100)]);

        assert_eq!(compute_active_id(&[], &layout, 120, Fallback::First), None);
        assert_eq!(compute_active_id(&[], &layout, 120, Fallback::Nothing), None);
    }

    #[test]
    fn test_missing_anchors_are_skipped() {
        let ids = ids(&["a", "stale", "c", "d"]);
        let layout = layout(&[("a", -300), ("c", 10), ("d", 500)]);

        assert_eq!(compute_active_id(&ids, &layout, 120, Fallback::First), Some("c"));

        // どのアンカーも無い場合はフォールバック
        let empty = HashMap::new();
        assert_eq!(compute_active_id(&ids, &empty, 120, Fallback::First), Some("a"));
    }

    #[test]
    fn test_subscribe_evaluates_eagerly() {
        let events = ScrollEvents::new();
        let layout = layout(&[("L1", -200), ("L2", 50), ("L3", 600)]);

        let spy = ScrollSpy::subscribe(
            &events,
            ids(&["L1", "L2", "L3"]),
            120,
            Fallback::First,
            &layout,
        );

        assert_eq!(spy.active_id().as_deref(), Some("L2"));
        assert_eq!(events.listener_count(), 1);
        assert!(spy.is_subscribed());
    }

    #[test]
    fn test_scroll_events_update_active_id() {
        let events = ScrollEvents::new();
        let spy = ScrollSpy::subscribe(
            &events,
            ids(&["a", "b", "c"]),
            120,
            Fallback::First,
            &layout(&[("a", 0), ("b", 400), ("c", 800)]),
        );
        assert_eq!(spy.active_id().as_deref(), Some("a"));

        events.emit(&layout(&[("a", -400), ("b", 0), ("c", 400)]));
        assert_eq!(spy.active_id().as_deref(), Some("b"));

        events.emit(&layout(&[("a", -800), ("b", -400), ("c", 0)]));
        assert_eq!(spy.active_id().as_deref(), Some("c"));
    }

    #[test]
    fn test_retarget_replaces_listener() {
        let events = ScrollEvents::new();
        let first = layout(&[("a", 0), ("b", 50)]);
        let mut spy = ScrollSpy::subscribe(&events, ids(&["a", "b"]), 120, Fallback::First, &first);
        assert_eq!(spy.active_id().as_deref(), Some("b"));

        // 同じ入力なら何もしない
        assert!(!spy.retarget(&events, ids(&["a", "b"]), 120, &first));
        assert_eq!(events.listener_count(), 1);

        let second = layout(&[("b", 50)]);
        assert!(spy.retarget(&events, ids(&["b"]), 120, &second));
        assert_eq!(events.listener_count(), 1);
        assert_eq!(spy.ids(), ["b".to_string()]);
        assert_eq!(spy.active_id().as_deref(), Some("b"));

        assert!(spy.retarget(&events, ids(&["b"]), 10, &second));
        assert_eq!(spy.offset(), 10);
        assert_eq!(events.listener_count(), 1);
        assert_eq!(spy.active_id().as_deref(), Some("b"));

        assert!(spy.retarget(&events, vec![], 10, &second));
        assert_eq!(spy.active_id(), None);
    }

    #[test]
    fn test_drop_and_unsubscribe_release_listener() {
        let events = ScrollEvents::new();
        let layout = layout(&[("a", 0)]);

        let spy = ScrollSpy::subscribe(&events, ids(&["a"]), 120, Fallback::First, &layout);
        assert_eq!(events.listener_count(), 1);
        drop(spy);
        assert_eq!(events.listener_count(), 0);

        let mut spy = ScrollSpy::subscribe(&events, ids(&["a"]), 120, Fallback::First, &layout);
        spy.unsubscribe();
        assert_eq!(events.listener_count(), 0);
        assert!(!spy.is_subscribed());

        // 解除後のイベントは値を変えない
        events.emit(&HashMap::new());
        assert_eq!(spy.active_id().as_deref(), Some("a"));
    }
}
