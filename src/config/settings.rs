//! 設定ファイル全体とエンジン設定
//!
//! # 責務
//!
//! - 設定ファイル（既定: `<ユーザー設定ディレクトリ>/promptchain/config.yaml`）の読み込み
//! - プラグインレジストリとエンジン設定の構築
//!
//! 設定ファイルの初期生成や移行は行いません。ファイルが無い場合はエラーです。

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use super::dto::{AppConfigDto, EngineSettingsDto};
use super::format::read_document;
use super::plugins::PluginRegistry;
use super::task::non_empty;

/// 設定ディレクトリ名
const APP_DIR_NAME: &str = "promptchain";

/// 設定ファイル名
const CONFIG_FILE_NAME: &str = "config.yaml";

/// 既定のプラグインランタイムCLI
pub const DEFAULT_PLUGIN_RUNTIME: &str = "extism";

/// ネストしたワークフローの既定の最大深さ
pub const DEFAULT_MAX_NESTING_DEPTH: u32 = 8;

/// エンジン設定
///
/// タイムアウトが `None` の場合、その呼び出しには期限を設けません。
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// ホスト機能1回あたりの期限
    pub host_call_timeout: Option<Duration>,
    /// 生成呼び出し1回あたりの期限
    pub generation_timeout: Option<Duration>,
    /// フィードバックによる再実行の上限回数
    pub max_feedback_rounds: Option<u32>,
    /// ネストしたワークフローの最大深さ
    pub max_nesting_depth: u32,
    /// Wasm プラグインを実行するCLIコマンド
    pub plugin_runtime: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            host_call_timeout: None,
            generation_timeout: None,
            max_feedback_rounds: None,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            plugin_runtime: DEFAULT_PLUGIN_RUNTIME.to_string(),
        }
    }
}

impl From<EngineSettingsDto> for EngineSettings {
    fn from(dto: EngineSettingsDto) -> Self {
        let defaults = Self::default();
        Self {
            host_call_timeout: dto.host_call_timeout_secs.map(Duration::from_secs),
            generation_timeout: dto.generation_timeout_secs.map(Duration::from_secs),
            max_feedback_rounds: dto.max_feedback_rounds,
            max_nesting_depth: dto.max_nesting_depth.unwrap_or(defaults.max_nesting_depth),
            plugin_runtime: non_empty(dto.plugin_runtime).unwrap_or(defaults.plugin_runtime),
        }
    }
}

/// 設定ファイル全体
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub registry: PluginRegistry,
    pub engine: EngineSettings,
}

impl AppConfig {
    /// 設定ファイルを読み込む
    ///
    /// `apiKey` / `accountId` はプロセスの環境変数から解決します。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_env(path, &|name| std::env::var(name).ok())
    }

    /// 環境変数の参照方法を指定して設定ファイルを読み込む
    pub fn from_file_with_env(
        path: impl AsRef<Path>,
        lookup_env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let dto: AppConfigDto = read_document(path.as_ref())?;
        Ok(Self {
            registry: PluginRegistry::from_dtos(dto.completion_plugins, lookup_env)?,
            engine: dto.engine.into(),
        })
    }

    /// 既定の設定ファイルパス
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::ConfigDirUnavailable)?;
        Ok(config_dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }
}
