use crate::content::{ContentNode, Lesson};
use crate::filter::FilteredCurriculum;
use crate::scroll_spy::AnchorLayout;
use std::collections::HashMap;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    ChapterHeading,
    LessonTitle,
    Meta,
    Summary,
    Text,
    CodeFrame,
    Code,
    Bullet,
    Image,
    Caption,
    Blank,
    NoResults,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub kind: RowKind,
    pub text: String,
}

impl Row {
    fn new(kind: RowKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    fn blank() -> Self {
        Self::new(RowKind::Blank, "")
    }
}

/// 絞り込み結果を行に展開したもの。レッスンのアンカー行を覚えておく
#[derive(Debug, Clone, Default)]
pub struct Document {
    rows: Vec<Row>,
    anchors: HashMap<String, usize>,
}

impl Document {
    pub fn render(filtered: &FilteredCurriculum, width: usize) -> Self {
        let mut doc = Self::default();

        if filtered.is_empty() {
            doc.rows.push(Row::new(
                RowKind::NoResults,
                "一致するレッスンはありません",
            ));
            return doc;
        }

        for chapter in filtered.chapters() {
            doc.rows
                .push(Row::new(RowKind::ChapterHeading, format!("■ {}", chapter.title)));
            doc.rows.push(Row::blank());
            for lesson in &chapter.lessons {
                doc.render_lesson(lesson, width);
            }
        }

        doc
    }

    fn render_lesson(&mut self, lesson: &Lesson, width: usize) {
        self.anchors.insert(lesson.id.clone(), self.rows.len());
        self.rows
            .push(Row::new(RowKind::LessonTitle, format!("## {}", lesson.title)));

        let mut meta = Vec::new();
        if let Some(difficulty) = lesson.difficulty {
            meta.push(format!("難易度: {}", difficulty.label()));
        }
        if let Some(minutes) = lesson.estimated_minutes {
            meta.push(format!("約{}分", minutes));
        }
        if !meta.is_empty() {
            self.rows.push(Row::new(RowKind::Meta, meta.join(" / ")));
        }
        if let Some(summary) = &lesson.summary {
            for line in wrap_text(summary, width) {
                self.rows.push(Row::new(RowKind::Summary, line));
            }
        }
        self.rows.push(Row::blank());

        for node in &lesson.content {
            self.render_node(node, width);
        }
    }

    fn render_node(&mut self, node: &ContentNode, width: usize) {
        match node {
            ContentNode::Paragraph { text } => {
                for line in wrap_text(text, width) {
                    self.rows.push(Row::new(RowKind::Text, line));
                }
            }
            ContentNode::Code {
                code,
                language,
                filename,
            } => {
                let header = match (filename, language) {
                    (Some(f), Some(l)) => format!("┌─ {} ({})", f, l),
                    (Some(f), None) => format!("┌─ {}", f),
                    (None, Some(l)) => format!("┌─ {}", l),
                    (None, None) => "┌─".to_string(),
                };
                self.rows.push(Row::new(RowKind::CodeFrame, header));
                for line in code.trim_end_matches('\n').lines() {
                    self.rows.push(Row::new(RowKind::Code, format!("│ {}", line)));
                }
                self.rows.push(Row::new(RowKind::CodeFrame, "└─"));
            }
            ContentNode::List { items } => {
                for item in items {
                    let mut lines = wrap_text(item, width.saturating_sub(2)).into_iter();
                    if let Some(first) = lines.next() {
                        self.rows.push(Row::new(RowKind::Bullet, format!("• {}", first)));
                    }
                    for rest in lines {
                        self.rows.push(Row::new(RowKind::Bullet, format!("  {}", rest)));
                    }
                }
            }
            ContentNode::Image {
                src,
                alt,
                caption,
                width: w,
                height: h,
            } => {
                let size = match (w, h) {
                    (Some(w), Some(h)) => format!(" {}x{}", w, h),
                    (Some(w), None) => format!(" w={}", w),
                    (None, Some(h)) => format!(" h={}", h),
                    (None, None) => String::new(),
                };
                self.rows.push(Row::new(
                    RowKind::Image,
                    format!("[画像: {}] {}{}", alt, src, size),
                ));
                if let Some(caption) = caption {
                    self.rows.push(Row::new(RowKind::Caption, format!("  {}", caption)));
                }
            }
            ContentNode::Unknown => return,
        }
        self.rows.push(Row::blank());
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn anchor_row(&self, id: &str) -> Option<usize> {
        self.anchors.get(id).copied()
    }
}

/// スクロール位置を固定した文書。アンカーの上端を表示先頭行からの相対行で返す
pub struct Viewport<'a> {
    pub document: &'a Document,
    pub scroll: usize,
}

impl AnchorLayout for Viewport<'_> {
    fn anchor_top(&self, id: &str) -> Option<i32> {
        self.document
            .anchor_row(id)
            .map(|row| row as i32 - self.scroll as i32)
    }
}

/// 表示幅で折り返す。空白があればそこで切る
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        let mut line_width = 0;

        for ch in paragraph.chars() {
            let w = ch.width().unwrap_or(0);
            if line_width + w > width && !line.is_empty() {
                if ch == ' ' {
                    lines.push(std::mem::take(&mut line));
                    line_width = 0;
                    continue;
                }
                match line.rfind(' ').filter(|&pos| pos > 0) {
                    Some(pos) => {
                        let tail = line.split_off(pos + 1);
                        lines.push(line.trim_end().to_string());
                        line = tail;
                    }
                    None => lines.push(std::mem::take(&mut line)),
                }
                line_width = line.width();
            }
            if line.is_empty() && ch == ' ' {
                continue;
            }
            line.push(ch);
            line_width += w;
        }
        lines.push(line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Chapter, Curriculum, Difficulty};
    use crate::filter::filter_curriculum;

    fn create_test_curriculum() -> Curriculum {
        Curriculum::new(vec![Chapter {
            key: "ch".to_string(),
            title: "Chapter".to_string(),
            lessons: vec![
                Lesson {
                    id: "one".to_string(),
                    title: "One".to_string(),
                    summary: Some("first".to_string()),
                    content: vec![ContentNode::Paragraph {
                        text: "hello world".to_string(),
                    }],
                    difficulty: Some(Difficulty::Beginner),
                    estimated_minutes: Some(5),
                },
                Lesson {
                    id: "two".to_string(),
                    title: "Two".to_string(),
                    summary: None,
                    content: vec![
                        ContentNode::Code {
                            code: "a = 1\nb = 2\n".to_string(),
                            language: Some("python".to_string()),
                            filename: Some("ab.py".to_string()),
                        },
                        ContentNode::Unknown,
                        ContentNode::Image {
                            src: "x.png".to_string(),
                            alt: "figure".to_string(),
                            caption: Some("a figure".to_string()),
                            width: Some(10),
                            height: Some(20),
                        },
                    ],
                    difficulty: None,
                    estimated_minutes: None,
                },
            ],
        }])
    }

    #[test]
    fn test_render_records_anchor_rows() {
        let curriculum = create_test_curriculum();
        let doc = Document::render(&filter_curriculum(&curriculum, ""), 40);

        let one = doc.anchor_row("one").unwrap();
        let two = doc.anchor_row("two").unwrap();
        assert_eq!(one, 2);
        assert_eq!(doc.rows()[one].text, "## One");
        assert_eq!(doc.rows()[one + 1].text, "難易度: 初級 / 約5分");
        assert_eq!(doc.rows()[two].kind, RowKind::LessonTitle);
        assert!(two > one);
        assert!(doc.anchor_row("missing").is_none());
    }

    #[test]
    fn test_render_node_kinds() {
        let curriculum = create_test_curriculum();
        let doc = Document::render(&filter_curriculum(&curriculum, "ab.py"), 40);

        let texts: Vec<&str> = doc.rows().iter().map(|r| r.text.as_str()).collect();
        assert!(texts.contains(&"┌─ ab.py (python)"));
        assert!(texts.contains(&"│ b = 2"));
        assert!(texts.contains(&"[画像: figure] x.png 10x20"));
        assert!(texts.contains(&"  a figure"));
        assert!(doc.anchor_row("one").is_none());
    }

    #[test]
    fn test_render_no_results() {
        let curriculum = create_test_curriculum();
        let doc = Document::render(&filter_curriculum(&curriculum, "zzz"), 40);

        assert_eq!(doc.len(), 1);
        assert_eq!(doc.rows()[0].kind, RowKind::NoResults);
    }

    #[test]
    fn test_viewport_reports_relative_tops() {
        let curriculum = create_test_curriculum();
        let doc = Document::render(&filter_curriculum(&curriculum, ""), 40);
        let two = doc.anchor_row("two").unwrap() as i32;

        let viewport = Viewport {
            document: &doc,
            scroll: 4,
        };
        assert_eq!(viewport.anchor_top("one"), Some(-2));
        assert_eq!(viewport.anchor_top("two"), Some(two - 4));
        assert_eq!(viewport.anchor_top("missing"), None);
    }

    #[test]
    fn test_wrap_text_breaks_on_spaces() {
        assert_eq!(wrap_text("hello big world", 9), vec!["hello big", "world"]);
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap_text("", 10), vec![""]);
    }

    #[test]
    fn test_wrap_text_counts_wide_chars() {
        // 全角文字は幅2
        assert_eq!(wrap_text("あいうえお", 4), vec!["あい", "うえ", "お"]);
    }
}
