use crate::content::{Chapter, ContentNode, Curriculum, Lesson};
use serde::Serialize;

/// 検索後に残った章。レッスンは元のカリキュラムを借用する
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredChapter<'a> {
    pub key: &'a str,
    pub title: &'a str,
    pub lessons: Vec<&'a Lesson>,
}

impl<'a> FilteredChapter<'a> {
    fn all(chapter: &'a Chapter) -> Self {
        Self {
            key: &chapter.key,
            title: &chapter.title,
            lessons: chapter.lessons.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FilteredCurriculum<'a> {
    chapters: Vec<FilteredChapter<'a>>,
}

impl<'a> FilteredCurriculum<'a> {
    pub fn chapters(&self) -> &[FilteredChapter<'a>] {
        &self.chapters
    }

    pub fn lessons(&self) -> impl Iterator<Item = &'a Lesson> + '_ {
        self.chapters.iter().flat_map(|ch| ch.lessons.iter().copied())
    }

    /// スクロールスパイに渡すID列（文書順）
    pub fn lesson_ids(&self) -> Vec<String> {
        self.lessons().map(|l| l.id.clone()).collect()
    }

    pub fn lesson_count(&self) -> usize {
        self.chapters.iter().map(|ch| ch.lessons.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lesson_count() == 0
    }

    pub fn total_minutes(&self) -> u32 {
        self.lessons().filter_map(|l| l.estimated_minutes).sum()
    }

    /// 一覧表示用の行
    pub fn outline(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for chapter in &self.chapters {
            let minutes: u32 = chapter
                .lessons
                .iter()
                .filter_map(|l| l.estimated_minutes)
                .sum();
            lines.push(format!(
                "{} [{}] (レッスン数: {}, 約{}分)",
                chapter.title,
                chapter.key,
                chapter.lessons.len(),
                minutes
            ));
            for lesson in &chapter.lessons {
                let mut line = format!("  #{} {}", lesson.id, lesson.title);
                if let Some(difficulty) = lesson.difficulty {
                    line.push_str(&format!(" [{}]", difficulty.label()));
                }
                if let Some(minutes) = lesson.estimated_minutes {
                    line.push_str(&format!(" {}分", minutes));
                }
                lines.push(line);
                if let Some(summary) = &lesson.summary {
                    lines.push(format!("      {}", summary));
                }
            }
        }
        lines
    }
}

pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn node_matches(node: &ContentNode, needle: &str) -> bool {
    match node {
        ContentNode::Paragraph { text } => contains_folded(text, needle),
        ContentNode::Code { code, filename, .. } => {
            contains_folded(code, needle)
                || filename
                    .as_deref()
                    .is_some_and(|f| contains_folded(f, needle))
        }
        ContentNode::List { items } => items.iter().any(|item| contains_folded(item, needle)),
        // 画像と未知の種類は検索対象外
        ContentNode::Image { .. } | ContentNode::Unknown => false,
    }
}

/// `needle` は正規化済み（trim + 小文字化）であること
pub fn lesson_matches(lesson: &Lesson, needle: &str) -> bool {
    contains_folded(&lesson.title, needle)
        || lesson
            .summary
            .as_deref()
            .is_some_and(|s| contains_folded(s, needle))
        || lesson.content.iter().any(|node| node_matches(node, needle))
}

/// クエリに一致するレッスンだけを残す。章・レッスンの順序は変えない
pub fn filter_curriculum<'a>(curriculum: &'a Curriculum, query: &str) -> FilteredCurriculum<'a> {
    let needle = normalize_query(query);

    if needle.is_empty() {
        return FilteredCurriculum {
            chapters: curriculum.chapters.iter().map(FilteredChapter::all).collect(),
        };
    }

    let chapters = curriculum
        .chapters
        .iter()
        .filter_map(|chapter| {
            let lessons: Vec<&Lesson> = chapter
                .lessons
                .iter()
                .filter(|lesson| lesson_matches(lesson, &needle))
                .collect();
            if lessons.is_empty() {
                None
            } else {
                Some(FilteredChapter {
                    key: &chapter.key,
                    title: &chapter.title,
                    lessons,
                })
            }
        })
        .collect();

    FilteredCurriculum { chapters }
}
