use crate::logging::DEFAULT_LOG_FILE;
use crate::portal::Theme;
use crate::scroll_spy::Fallback;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 端末では行がピクセルの代わり。表示先頭から3行以内に来たら到達済み
pub const TERMINAL_SCROLL_OFFSET: i32 = 3;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortalConfig {
    /// 未指定なら埋め込みカリキュラムを使う
    pub data_dir: Option<PathBuf>,
    pub theme: Theme,
    pub scroll_offset: i32,
    pub fallback: Fallback,
    pub log_file: PathBuf,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            theme: Theme::default(),
            scroll_offset: TERMINAL_SCROLL_OFFSET,
            fallback: Fallback::default(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

/// コマンドライン引数による上書き
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub theme: Option<Theme>,
    pub scroll_offset: Option<i32>,
    pub fallback: Option<Fallback>,
    pub log_file: Option<PathBuf>,
}

impl PortalConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("設定ファイルを読めません: {}", path.display()))?;
        let config: PortalConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("設定ファイルの形式が不正です: {}", path.display()))?;
        Ok(config)
    }

    /// 既定値 < 設定ファイル < コマンドライン引数 の順で決める
    pub fn resolve(file: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(dir) = overrides.data_dir {
            config.data_dir = Some(dir);
        }
        if let Some(theme) = overrides.theme {
            config.theme = theme;
        }
        if let Some(offset) = overrides.scroll_offset {
            config.scroll_offset = offset;
        }
        if let Some(fallback) = overrides.fallback {
            config.fallback = fallback;
        }
        if let Some(log_file) = overrides.log_file {
            config.log_file = log_file;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_file() -> Result<()> {
        let config = PortalConfig::resolve(None, Overrides::default())?;

        assert_eq!(config, PortalConfig::default());
        assert_eq!(config.theme, Theme::Light);
        assert_eq!(config.scroll_offset, TERMINAL_SCROLL_OFFSET);
        assert_eq!(config.fallback, Fallback::First);
        Ok(())
    }

    #[test]
    fn test_file_then_cli_overrides() -> Result<()> {
        let tmp_dir = tempdir()?;
        let path = tmp_dir.path().join("portal.yaml");
        fs::write(
            &path,
            "data_dir: content\ntheme: dark\nscroll_offset: 5\nfallback: nothing\n",
        )?;

        let config = PortalConfig::resolve(Some(&path), Overrides::default())?;
        assert_eq!(config.data_dir, Some(PathBuf::from("content")));
        assert_eq!(config.theme, Theme::Dark);
        assert_eq!(config.scroll_offset, 5);
        assert_eq!(config.fallback, Fallback::Nothing);
        assert_eq!(config.log_file, PathBuf::from(DEFAULT_LOG_FILE));

        let config = PortalConfig::resolve(
            Some(&path),
            Overrides {
                theme: Some(Theme::Light),
                scroll_offset: Some(1),
                ..Overrides::default()
            },
        )?;
        assert_eq!(config.theme, Theme::Light);
        assert_eq!(config.scroll_offset, 1);
        assert_eq!(config.fallback, Fallback::Nothing);
        Ok(())
    }

    #[test]
    fn test_unknown_keys_are_rejected() -> Result<()> {
        let tmp_dir = tempdir()?;
        let path = tmp_dir.path().join("portal.yaml");
        fs::write(&path, "colour: blue\n")?;

        assert!(PortalConfig::load(&path).is_err());
        assert!(PortalConfig::load(&tmp_dir.path().join("missing.yaml")).is_err());
        Ok(())
    }
}
