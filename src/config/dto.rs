//! デシリアライズ用の DTO (Data Transfer Object)
//!
//! # 責務
//!
//! このモジュールは、YAML / TOML ファイルからのデータ読み込み専用の構造体を提供します。
//! DTO はバリデーション前の「生データ」を表現し、ドメインモデルとは分離されています。
//!
//! ## 変換フロー
//!
//! ```text
//! YAML / TOML ファイル
//!   ↓ (デシリアライズ)
//! WorkflowDto / AppConfigDto
//!   ↓ (TryFrom でバリデーション)
//! Workflow / AppConfig (ドメインモデル)
//! ```
//!
//! フィールド名は既存のワークフローファイルとの互換性のため、ワイヤ形式そのままです。

use serde::{Deserialize, Serialize};

/// ワークフロー DTO
///
/// **注**: この構造体は config モジュール内部の実装詳細です。
/// 外部からは [`Workflow`](super::workflow::Workflow) を使用してください。
#[derive(Debug, Default, Serialize, Deserialize)]
pub(super) struct WorkflowDto {
    /// 反復値を計算するスクリプト
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) iterator_script: Option<String>,
    /// タスクの配列（文書順）
    #[serde(default)]
    pub(super) tasks: Vec<TaskDto>,
}

/// タスク DTO
#[derive(Debug, Default, Serialize, Deserialize)]
pub(super) struct TaskDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) plugin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) temperature: Option<TemperatureDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) pre_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) post_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) tools: Option<Vec<serde_json::Value>>,
}

/// temperature は文字列でも数値でも書ける
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub(super) enum TemperatureDto {
    Text(String),
    Number(f64),
}

impl TemperatureDto {
    /// プラグインには文字列として渡すため、テキストに正規化する
    pub(super) fn into_text(self) -> String {
        match self {
            TemperatureDto::Text(text) => text,
            TemperatureDto::Number(number) => number.to_string(),
        }
    }
}

/// 設定ファイル DTO
#[derive(Debug, Default, Deserialize)]
pub(super) struct AppConfigDto {
    #[serde(default, rename = "completion-plugins")]
    pub(super) completion_plugins: Vec<PluginConfigDto>,
    #[serde(default)]
    pub(super) engine: EngineSettingsDto,
}

/// プラグイン設定 DTO
///
/// `apiKey` と `accountId` には値そのものではなく、値を保持する環境変数の名前を書きます。
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PluginConfigDto {
    pub(super) name: String,
    #[serde(default)]
    pub(super) source: String,
    #[serde(default)]
    pub(super) hash: Option<String>,
    #[serde(default)]
    pub(super) api_key: Option<String>,
    #[serde(default)]
    pub(super) account_id: Option<String>,
    #[serde(default)]
    pub(super) url: Option<String>,
    #[serde(default)]
    pub(super) model: Option<String>,
    #[serde(default)]
    pub(super) temperature: Option<TemperatureDto>,
    #[serde(default)]
    pub(super) role: Option<String>,
    #[serde(default)]
    pub(super) wasi: bool,
}

/// エンジン設定 DTO
#[derive(Debug, Default, Deserialize)]
pub(super) struct EngineSettingsDto {
    #[serde(default)]
    pub(super) host_call_timeout_secs: Option<u64>,
    #[serde(default)]
    pub(super) generation_timeout_secs: Option<u64>,
    #[serde(default)]
    pub(super) max_feedback_rounds: Option<u32>,
    #[serde(default)]
    pub(super) max_nesting_depth: Option<u32>,
    #[serde(default)]
    pub(super) plugin_runtime: Option<String>,
}
