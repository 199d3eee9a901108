//! ファイル形式の判定
//!
//! ワークフロー文書と設定ファイルは YAML と TOML のどちらでも記述できます。
//! 形式は拡張子で決まります（`.yaml` / `.yml` → YAML、`.toml` → TOML）。

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ConfigError;

/// 宣言的文書のファイル形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Toml,
}

impl DocumentFormat {
    /// 拡張子から形式を判定する
    ///
    /// # エラー
    ///
    /// - [`ConfigError::UnsupportedFormat`] - 拡張子が対応外、または存在しない
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// 文字列をデシリアライズする
    pub fn parse<T: DeserializeOwned>(self, text: &str) -> Result<T, ConfigError> {
        match self {
            Self::Yaml => Ok(serde_yaml::from_str(text)?),
            Self::Toml => Ok(toml::from_str(text)?),
        }
    }

    /// 値を文字列にシリアライズする
    pub fn render<T: Serialize>(self, value: &T) -> Result<String, ConfigError> {
        match self {
            Self::Yaml => Ok(serde_yaml::to_string(value)?),
            Self::Toml => Ok(toml::to_string(value)?),
        }
    }
}

/// ファイルを読み込み、拡張子に応じた形式でデシリアライズする
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let format = DocumentFormat::from_path(path)?;
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    format.parse(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_from_path() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("a/flow.yaml")).unwrap(),
            DocumentFormat::Yaml
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("flow.YML")).unwrap(),
            DocumentFormat::Yaml
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("flow.toml")).unwrap(),
            DocumentFormat::Toml
        );
    }

    #[test]
    fn test_from_path_unsupported() {
        let result = DocumentFormat::from_path(Path::new("flow.json"));
        match result {
            Err(ConfigError::UnsupportedFormat(path)) => {
                assert_eq!(path, PathBuf::from("flow.json"));
            }
            other => panic!("Expected UnsupportedFormat, got {:?}", other),
        }

        assert!(DocumentFormat::from_path(Path::new("flow")).is_err());
    }

    #[test]
    fn test_read_document_missing_file() {
        let result: Result<serde_json::Value, _> =
            read_document(Path::new("/nonexistent/promptchain/flow.yaml"));
        assert!(matches!(result, Err(ConfigError::FileRead { .. })));
    }
}
