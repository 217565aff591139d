use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// レッスン内の描画単位。`kind` タグで種類が決まる
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind")]
pub enum ContentNode {
    #[serde(rename = "p")]
    Paragraph { text: String },
    #[serde(rename = "code")]
    Code {
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    #[serde(rename = "ul")]
    List { items: Vec<String> },
    #[serde(rename = "img")]
    Image {
        src: String,
        alt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<u32>,
    },
    // 未知の kind は読み込みを止めずにここへ落とす（検索対象外、描画もしない）
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "初級",
            Difficulty::Intermediate => "中級",
            Difficulty::Advanced => "上級",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Lesson {
    /// カリキュラム全体で一意。アンカーとナビゲーションのキーを兼ねる
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Chapter {
    pub key: String,
    pub title: String,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Curriculum {
    pub chapters: Vec<Chapter>,
}

impl Curriculum {
    pub fn new(chapters: Vec<Chapter>) -> Self {
        Self { chapters }
    }

    pub fn lessons(&self) -> impl Iterator<Item = &Lesson> {
        self.chapters.iter().flat_map(|ch| ch.lessons.iter())
    }

    pub fn lesson_ids(&self) -> Vec<String> {
        self.lessons().map(|l| l.id.clone()).collect()
    }

    /// キーやIDの重複を警告として返す。フィルタ側は検証しない
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut keys = HashSet::new();
        let mut ids = HashSet::new();

        for chapter in &self.chapters {
            if !keys.insert(chapter.key.as_str()) {
                warnings.push(format!("章キーが重複しています: {}", chapter.key));
            }
            for lesson in &chapter.lessons {
                if !ids.insert(lesson.id.as_str()) {
                    warnings.push(format!("レッスンIDが重複しています: {}", lesson.id));
                }
            }
        }

        warnings
    }
}

const EMBEDDED_CURRICULUM: &str = include_str!("data/curriculum.yaml");

pub struct ContentLoader {
    curriculum: Curriculum,
}

impl ContentLoader {
    pub fn empty() -> Self {
        Self {
            curriculum: Curriculum::default(),
        }
    }

    /// バイナリに埋め込まれたカリキュラムを読み込む
    pub fn embedded() -> Result<Self> {
        let chapters: Vec<Chapter> = serde_yaml::from_str(EMBEDDED_CURRICULUM)
            .context("埋め込みカリキュラムのパースに失敗しました")?;
        Ok(Self::checked(Curriculum::new(chapters)))
    }

    /// ディレクトリ内の *.yaml をファイル名順に1章ずつ読み込む
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<_> = fs::read_dir(dir)
            .with_context(|| format!("ディレクトリを読めません: {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "yaml" || ext == "yml"))
            .collect();
        paths.sort();

        let mut chapters = Vec::new();
        for path in &paths {
            match Self::load_chapter_file(path) {
                Ok(chapter) => {
                    debug_log!("章を読み込みました: {} ({})", chapter.title, path.display());
                    chapters.push(chapter);
                }
                Err(e) => {
                    eprintln!("⚠️ 章の読み込みに失敗: {}: {:#}", path.display(), e);
                    debug_log!("章の読み込みに失敗: {}: {:#}", path.display(), e);
                }
            }
        }

        if chapters.is_empty() {
            return Err(anyhow!(
                "学習コンテンツが見つかりませんでした: {}",
                dir.display()
            ));
        }

        debug_log!("合計 {} 章を読み込みました", chapters.len());
        Ok(Self::checked(Curriculum::new(chapters)))
    }

    fn checked(curriculum: Curriculum) -> Self {
        for warning in curriculum.validate() {
            debug_log!("⚠️ {}", warning);
        }
        Self { curriculum }
    }

    fn load_chapter_file(path: &Path) -> Result<Chapter> {
        let content = fs::read_to_string(path)?;
        let chapter: Chapter = serde_yaml::from_str(&content)?;
        Ok(chapter)
    }

    pub fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    pub fn into_curriculum(self) -> Curriculum {
        self.curriculum
    }

    pub fn get_chapter(&self, key: &str) -> Option<&Chapter> {
        self.curriculum.chapters.iter().find(|ch| ch.key == key)
    }

    pub fn get_chapter_count(&self) -> usize {
        self.curriculum.chapters.len()
    }

    // デバッグ用：サンプル章を生成
    pub fn create_sample_chapter(&self, output_path: &Path) -> Result<()> {
        let yaml_content = serde_yaml::to_string(&sample_chapter())?;
        fs::write(output_path, yaml_content)
            .with_context(|| format!("書き込みに失敗しました: {}", output_path.display()))?;
        debug_log!("サンプル章を作成しました: {}", output_path.display());
        Ok(())
    }
}

fn sample_chapter() -> Chapter {
    Chapter {
        key: "sample".to_string(),
        title: "サンプル章".to_string(),
        lessons: vec![
            Lesson {
                id: "sample-intro".to_string(),
                title: "はじめに".to_string(),
                summary: Some("この章の構成と書き方".to_string()),
                content: vec![
                    ContentNode::Paragraph {
                        text: "1ファイルが1章に対応します。レッスンIDは全体で一意にしてください。"
                            .to_string(),
                    },
                    ContentNode::List {
                        items: vec![
                            "p: 段落".to_string(),
                            "code: コードブロック".to_string(),
                            "ul: 箇条書き".to_string(),
                            "img: 画像".to_string(),
                        ],
                    },
                ],
                difficulty: Some(Difficulty::Beginner),
                estimated_minutes: Some(5),
            },
            Lesson {
                id: "sample-code".to_string(),
                title: "コード例".to_string(),
                summary: None,
                content: vec![
                    ContentNode::Code {
                        code: "fn main() {\n    println!(\"hello\");\n}".to_string(),
                        language: Some("rust".to_string()),
                        filename: Some("main.rs".to_string()),
                    },
                    ContentNode::Image {
                        src: "images/hello.png".to_string(),
                        alt: "実行結果".to_string(),
                        caption: Some("cargo run の出力".to_string()),
                        width: Some(640),
                        height: None,
                    },
                ],
                difficulty: Some(Difficulty::Intermediate),
                estimated_minutes: Some(10),
            },
        ],
    }
}
