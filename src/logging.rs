use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const DEFAULT_LOG_FILE: &str = "/tmp/learning_portal_debug.log";

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

// デバッグログ用のマクロ（TUIが端末を占有するのでファイルにのみ出力）
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        $crate::logging::append_line(&format!($($arg)*))
    };
}

/// ログファイルを初期化する。起動時に一度だけ呼ぶ
pub fn init(path: &Path) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("ログファイルを開けません: {}", path.display()))?;

    writeln!(file, "=== Learning Portal Debug Log ===")?;
    writeln!(
        file,
        "Started at: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")
    )?;

    let _ = LOG_PATH.set(path.to_path_buf());
    Ok(())
}

pub fn log_path() -> &'static Path {
    LOG_PATH
        .get()
        .map(PathBuf::as_path)
        .unwrap_or_else(|| Path::new(DEFAULT_LOG_FILE))
}

pub fn format_line(message: &str) -> String {
    format!(
        "[{}] 🔧 DEBUG: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        message
    )
}

pub fn append_line(message: &str) {
    // ログの失敗で本体を止めない
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path())
    {
        let _ = writeln!(file, "{}", format_line(message));
    }
}
