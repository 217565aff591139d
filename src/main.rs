use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::PathBuf;

use learning_portal::config::{Overrides, PortalConfig};
use learning_portal::content::{ContentLoader, Curriculum};
use learning_portal::debug_log;
use learning_portal::filter::{FilteredCurriculum, filter_curriculum};
use learning_portal::logging;
use learning_portal::portal::{Portal, Theme};
use learning_portal::scroll_spy::Fallback;
use learning_portal::tui;

#[derive(Parser)]
#[command(name = "learning-portal")]
#[command(about = "カリキュラムを検索しながら読める学習ポータル")]
struct Args {
    #[arg(short, long, help = "設定ファイル (YAML)")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "章ファイル (*.yaml) のディレクトリ。省略時は埋め込みカリキュラム")]
    data_dir: Option<PathBuf>,

    #[arg(long, value_enum, help = "テーマ")]
    theme: Option<Theme>,

    #[arg(long, help = "表示先頭から何行以内に来たセクションを現在位置とみなすか")]
    offset: Option<i32>,

    #[arg(long, value_enum, help = "どのセクションにも到達していないときの扱い")]
    fallback: Option<Fallback>,

    #[arg(long, help = "デバッグログの出力先")]
    log_file: Option<PathBuf>,

    #[arg(short, long, help = "章の一覧を表示して終了")]
    list: bool,

    #[arg(long, requires = "list", help = "一覧表示する章のキー")]
    chapter: Option<String>,

    #[arg(short, long, help = "検索結果を表示して終了")]
    search: Option<String>,

    #[arg(long, requires = "search", help = "検索結果をJSONで出力")]
    json: bool,

    #[arg(long, help = "サンプル章を生成")]
    generate_sample: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = PortalConfig::resolve(
        args.config.as_deref(),
        Overrides {
            data_dir: args.data_dir.clone(),
            theme: args.theme,
            scroll_offset: args.offset,
            fallback: args.fallback,
            log_file: args.log_file.clone(),
        },
    )?;

    // ログが書けなくても起動は続ける
    if let Err(e) = logging::init(&config.log_file) {
        eprintln!("⚠️ {:#}", e);
    }
    debug_log!("設定: {:?}", config);

    if let Some(output_path) = args.generate_sample {
        let loader = ContentLoader::empty();
        loader.create_sample_chapter(&output_path)?;
        println!("✓ サンプル章を生成しました: {}", output_path.display());
        return Ok(());
    }

    let loader = match &config.data_dir {
        Some(dir) => ContentLoader::from_dir(dir)?,
        None => ContentLoader::embedded()?,
    };

    if args.list {
        return list_chapters(&loader, args.chapter.as_deref());
    }

    if let Some(query) = &args.search {
        let filtered = filter_curriculum(loader.curriculum(), query);
        if args.json {
            println!("{}", serde_json::to_string_pretty(&filtered)?);
        } else {
            print_search_results(query, &filtered);
        }
        return Ok(());
    }

    let portal = Portal::new(
        loader.into_curriculum(),
        config.theme,
        config.scroll_offset,
        config.fallback,
    );
    tui::run(portal)
}

fn list_chapters(loader: &ContentLoader, chapter_key: Option<&str>) -> Result<()> {
    println!("\n=== 利用可能な章 ===");

    match chapter_key {
        Some(key) => {
            let chapter = loader
                .get_chapter(key)
                .ok_or_else(|| anyhow!("章が見つかりません: {}", key))?;
            let single = Curriculum::new(vec![chapter.clone()]);
            print_outline(&filter_curriculum(&single, ""));
        }
        None => {
            print_outline(&filter_curriculum(loader.curriculum(), ""));
            println!("📚 合計 {} 章", loader.get_chapter_count());
        }
    }

    Ok(())
}

fn print_search_results(query: &str, filtered: &FilteredCurriculum) {
    println!("\n🔍 \"{}\" の検索結果", query.trim());
    if filtered.is_empty() {
        println!("一致するレッスンはありません");
        return;
    }
    print_outline(filtered);
    println!(
        "{} 章 / {} レッスン (約{}分)",
        filtered.chapters().len(),
        filtered.lesson_count(),
        filtered.total_minutes()
    );
}

fn print_outline(filtered: &FilteredCurriculum) {
    for line in filtered.outline() {
        println!("{}", line);
    }
    println!();
}
