//! 生成機能アダプター
//!
//! # 責務
//!
//! - タスクのプラグイン名をレジストリで解決する
//! - タスクの上書き（model / role / temperature）をプラグイン設定の **コピー** に適用する
//! - 生成呼び出しに期限を設け、失敗を [`ExecutionError`] に変換する
//!
//! レジストリ自体は変更しません。同じプラグインを使う後続のタスクは、
//! 常に元の設定から上書きを始めます。

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::{PluginConfig, PluginRegistry, Task};
use crate::engine::ExecutionError;
use super::traits::GenerationClient;

/// 生成機能アダプター
#[derive(Clone)]
pub struct GenerationAdapter {
    registry: Arc<PluginRegistry>,
    client: Arc<dyn GenerationClient>,
    timeout: Option<Duration>,
}

impl GenerationAdapter {
    /// # 引数
    ///
    /// - `registry`: プラグインレジストリ（読み取り専用）
    /// - `client`: 生成クライアント
    /// - `timeout`: 生成呼び出し1回の期限（`None` は無期限）
    pub fn new(
        registry: Arc<PluginRegistry>,
        client: Arc<dyn GenerationClient>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            client,
            timeout,
        }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// タスクの上書きを適用したプラグイン設定を返す
    ///
    /// # エラー
    ///
    /// - [`ExecutionError::PluginNotFound`] - レジストリに無いプラグイン名
    pub fn effective_config(
        &self,
        plugin: &str,
        task: &Task,
    ) -> Result<PluginConfig, ExecutionError> {
        let mut config = self
            .registry
            .get(plugin)
            .cloned()
            .ok_or_else(|| ExecutionError::PluginNotFound(plugin.to_string()))?;

        if let Some(model) = task.model() {
            config.model = Some(model.to_string());
        }
        if let Some(role) = task.role() {
            config.role = Some(role.to_string());
        }
        if let Some(temperature) = task.temperature() {
            config.temperature = Some(temperature.to_string());
        }
        Ok(config)
    }

    /// タスクのプラグインでテキストを生成する
    ///
    /// タスクに `tools` がある場合はツール付き生成を呼び出します。
    ///
    /// # エラー
    ///
    /// - [`ExecutionError::PluginNotFound`] - レジストリに無いプラグイン名
    /// - [`ExecutionError::PluginCall`] - プラグインの呼び出し失敗
    /// - [`ExecutionError::Timeout`] - 期限内に完了しない
    pub async fn generate(
        &self,
        plugin: &str,
        task: &Task,
        prompt: &str,
    ) -> Result<String, ExecutionError> {
        let config = self.effective_config(plugin, task)?;
        debug!(
            task = task.name(),
            plugin,
            model = config.model.as_deref().unwrap_or_default(),
            "生成を呼び出します"
        );

        let call = async {
            if task.tools().is_empty() {
                self.client.generate(prompt, &config).await
            } else {
                self.client
                    .generate_with_tools(prompt, &config, task.tools())
                    .await
            }
        };

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                ExecutionError::Timeout {
                    task: task.name().to_string(),
                    timeout_secs: limit.as_secs(),
                }
            })?,
            None => call.await,
        };

        result.map_err(|source| ExecutionError::PluginCall {
            plugin: plugin.to_string(),
            source,
        })
    }

    /// プラグインが提供するモデル名の一覧
    ///
    /// # エラー
    ///
    /// - [`ExecutionError::PluginNotFound`] - レジストリに無いプラグイン名
    /// - [`ExecutionError::PluginCall`] - プラグインの呼び出し失敗
    pub async fn list_models(&self, plugin: &str) -> Result<Vec<String>, ExecutionError> {
        let config = self
            .registry
            .get(plugin)
            .ok_or_else(|| ExecutionError::PluginNotFound(plugin.to_string()))?;

        let models = self
            .client
            .list_models(config)
            .await
            .map_err(|source| ExecutionError::PluginCall {
                plugin: plugin.to_string(),
                source,
            })?;
        Ok(models.into_iter().map(|model| model.name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Workflow;
    use crate::engine::test_support::{EchoClient, test_registry};

    fn tasks(yaml: &str) -> Vec<Task> {
        Workflow::from_yaml(yaml).unwrap().tasks().to_vec()
    }

    fn adapter(client: EchoClient, timeout: Option<Duration>) -> GenerationAdapter {
        GenerationAdapter::new(Arc::new(test_registry()), Arc::new(client), timeout)
    }

    #[test]
    fn test_overrides_apply_to_copy_only() {
        let adapter = adapter(EchoClient::default(), None);
        let tasks = tasks(
            r#"
tasks:
  - plugin: echo
    model: override-model
    temperature: 0.1
  - plugin: echo
"#,
        );

        let first = adapter.effective_config("echo", &tasks[0]).unwrap();
        assert_eq!(first.model.as_deref(), Some("override-model"));
        assert_eq!(first.temperature.as_deref(), Some("0.1"));

        let second = adapter.effective_config("echo", &tasks[1]).unwrap();
        assert_eq!(second.model.as_deref(), Some("echo-model"));
        assert_eq!(
            adapter.registry().get("echo").unwrap().model.as_deref(),
            Some("echo-model")
        );
    }

    #[tokio::test]
    async fn test_unknown_plugin() {
        let adapter = adapter(EchoClient::default(), None);
        let task = &tasks("tasks:\n  - plugin: missing\n")[0];

        let result = adapter.generate("missing", task, "hi").await;
        assert!(matches!(result, Err(ExecutionError::PluginNotFound(name)) if name == "missing"));
    }

    #[tokio::test]
    async fn test_generate_records_effective_config() {
        let client = EchoClient::default();
        let adapter = adapter(client.clone(), None);
        let task = &tasks("tasks:\n  - plugin: echo\n    role: critic\n")[0];

        let output = adapter.generate("echo", task, "prompt").await.unwrap();
        assert_eq!(output, "prompt");
        assert_eq!(
            client.requests(),
            vec!["echo|echo-model|critic|prompt".to_string()]
        );
    }

    #[tokio::test]
    async fn test_tools_use_tool_generation() {
        let client = EchoClient::default();
        let adapter = adapter(client.clone(), None);
        let task = &tasks("tasks:\n  - plugin: echo\n    tools:\n      - name: search\n")[0];

        let output = adapter.generate("echo", task, "q").await.unwrap();
        assert_eq!(output, "q [tools: 1]");
    }

    #[tokio::test]
    async fn test_plugin_failure_is_wrapped() {
        let adapter = adapter(EchoClient::failing(), None);
        let task = &tasks("tasks:\n  - plugin: echo\n")[0];

        let result = adapter.generate("echo", task, "hi").await;
        assert!(matches!(result, Err(ExecutionError::PluginCall { plugin, .. }) if plugin == "echo"));
    }

    #[tokio::test]
    async fn test_generation_timeout() {
        let adapter = adapter(
            EchoClient::default().with_delay(Duration::from_millis(200)),
            Some(Duration::from_millis(10)),
        );
        let task = &tasks("tasks:\n  - name: slow\n    plugin: echo\n")[0];

        let result = adapter.generate("echo", task, "hi").await;
        assert!(matches!(result, Err(ExecutionError::Timeout { task, .. }) if task == "slow"));
    }

    #[tokio::test]
    async fn test_list_models() {
        let adapter = adapter(EchoClient::default(), None);
        let models = adapter.list_models("echo").await.unwrap();
        assert_eq!(models, vec!["echo-model".to_string(), "echo-large".to_string()]);

        let result = adapter.list_models("missing").await;
        assert!(matches!(result, Err(ExecutionError::PluginNotFound(_))));
    }
}
