//! タスクの定義
//!
//! # 責務
//!
//! ワークフローを構成するタスク（チェーンの1ステップ）の定義体を提供するモジュール。
//! アプリケーションに対して、[Task] を提供する。

use crate::error::ConfigError;
use super::dto::TaskDto;

/// タスク（ドメインモデル）
///
/// ワークフロー内の1つの処理単位を表します。
/// `plugin` が無いタスクは生成を呼ばない、スクリプトのみ（またはパススルー）のステップです。
///
/// ## DTO との違い
///
/// - [`TaskDto`](super::dto::TaskDto): デシリアライズ専用
/// - [`Task`]: バリデーション済み。空文字列のフィールドは `None` に正規化済み
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    name: String,
    prompt: String,
    role: Option<String>,
    plugin: Option<String>,
    model: Option<String>,
    temperature: Option<String>,
    pre_script: Option<String>,
    post_script: Option<String>,
    tools: Vec<serde_json::Value>,
}

impl Task {
    /// タスク名（表示用のみ）
    pub fn name(&self) -> &str {
        &self.name
    }

    /// プロンプトテンプレート
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// 使用する生成プラグイン名
    pub fn plugin(&self) -> Option<&str> {
        self.plugin.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn temperature(&self) -> Option<&str> {
        self.temperature.as_deref()
    }

    pub fn pre_script(&self) -> Option<&str> {
        self.pre_script.as_deref()
    }

    pub fn post_script(&self) -> Option<&str> {
        self.post_script.as_deref()
    }

    /// ツール定義（形式はプラグイン側の契約。そのまま転送する）
    pub fn tools(&self) -> &[serde_json::Value] {
        &self.tools
    }
}

/// 空文字列（空白のみを含む）を `None` として扱う
pub(super) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

/// DTO からドメインモデルへの変換（読み込み方向）
///
/// ツール定義がマッピングでない場合は [`ConfigError::Validation`] を返します。
impl TryFrom<TaskDto> for Task {
    type Error = ConfigError;

    fn try_from(dto: TaskDto) -> Result<Self, Self::Error> {
        let name = dto.name.unwrap_or_default();
        let tools = dto.tools.unwrap_or_default();

        if let Some(index) = tools.iter().position(|tool| !tool.is_object()) {
            return Err(ConfigError::Validation(format!(
                "タスク '{}' の tools[{}] はマッピングである必要があります",
                name, index
            )));
        }

        Ok(Self {
            name,
            prompt: dto.prompt.unwrap_or_default(),
            role: non_empty(dto.role),
            plugin: non_empty(dto.plugin),
            model: non_empty(dto.model),
            temperature: non_empty(dto.temperature.map(|t| t.into_text())),
            pre_script: non_empty(dto.pre_script),
            post_script: non_empty(dto.post_script),
            tools,
        })
    }
}

/// ドメインモデルから DTO への変換（書き込み方向）
impl From<Task> for TaskDto {
    fn from(task: Task) -> Self {
        Self {
            name: Some(task.name).filter(|n| !n.is_empty()),
            prompt: Some(task.prompt).filter(|p| !p.is_empty()),
            role: task.role,
            plugin: task.plugin,
            model: task.model,
            temperature: task.temperature.map(super::dto::TemperatureDto::Text),
            pre_script: task.pre_script,
            post_script: task.post_script,
            tools: Some(task.tools).filter(|t| !t.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::dto::TemperatureDto;

    #[test]
    fn test_empty_fields_become_none() {
        let dto = TaskDto {
            name: Some("summarize".to_string()),
            prompt: Some("Summarize: ".to_string()),
            plugin: Some("".to_string()),
            role: Some("   ".to_string()),
            ..Default::default()
        };

        let task = Task::try_from(dto).unwrap();
        assert_eq!(task.name(), "summarize");
        assert_eq!(task.prompt(), "Summarize: ");
        assert_eq!(task.plugin(), None);
        assert_eq!(task.role(), None);
        assert!(task.tools().is_empty());
    }

    #[test]
    fn test_numeric_temperature_is_kept_as_text() {
        let dto = TaskDto {
            temperature: Some(TemperatureDto::Number(0.5)),
            ..Default::default()
        };
        let task = Task::try_from(dto).unwrap();
        assert_eq!(task.temperature(), Some("0.5"));
    }

    #[test]
    fn test_tool_must_be_mapping() {
        let dto = TaskDto {
            name: Some("lookup".to_string()),
            tools: Some(vec![serde_json::json!("search")]),
            ..Default::default()
        };

        match Task::try_from(dto) {
            Err(ConfigError::Validation(message)) => {
                assert!(message.contains("lookup"));
                assert!(message.contains("tools[0]"));
            }
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }
}
