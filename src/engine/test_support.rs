//! エンジンのテスト用スタブ

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{PluginConfig, PluginRegistry};
use crate::error::ProviderError;
use crate::provider::{GenerationClient, ModelInfo};
use super::feedback::FeedbackPrompter;

/// プロンプトをそのまま返す生成クライアント
#[derive(Clone, Default)]
pub struct EchoClient {
    prompts: Arc<Mutex<Vec<String>>>,
    requests: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
    fail: bool,
}

impl EchoClient {
    /// 常に失敗するクライアント
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 受け取ったプロンプト（呼び出し順）
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// `name|model|role|prompt` 形式の呼び出し記録
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    async fn record(&self, prompt: &str, config: &PluginConfig) -> Result<(), ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ProviderError::CliExecutionError("echo failed".to_string()));
        }

        self.prompts.lock().unwrap().push(prompt.to_string());
        self.requests.lock().unwrap().push(format!(
            "{}|{}|{}|{}",
            config.name,
            config.model.as_deref().unwrap_or_default(),
            config.role.as_deref().unwrap_or_default(),
            prompt
        ));
        Ok(())
    }
}

#[async_trait]
impl GenerationClient for EchoClient {
    async fn generate(&self, prompt: &str, config: &PluginConfig) -> Result<String, ProviderError> {
        self.record(prompt, config).await?;
        Ok(prompt.to_string())
    }

    async fn generate_with_tools(
        &self,
        prompt: &str,
        config: &PluginConfig,
        tools: &[serde_json::Value],
    ) -> Result<String, ProviderError> {
        self.record(prompt, config).await?;
        Ok(format!("{} [tools: {}]", prompt, tools.len()))
    }

    async fn list_models(&self, _config: &PluginConfig) -> Result<Vec<ModelInfo>, ProviderError> {
        if self.fail {
            return Err(ProviderError::CliExecutionError("echo failed".to_string()));
        }
        Ok(["echo-model", "echo-large"]
            .into_iter()
            .map(|name| ModelInfo {
                name: name.to_string(),
                aliases: Vec::new(),
            })
            .collect())
    }
}

/// `echo` プラグインだけを持つレジストリ
pub fn test_registry() -> PluginRegistry {
    PluginRegistry::new(vec![PluginConfig {
        name: "echo".to_string(),
        source: "echo.wasm".to_string(),
        hash: None,
        api_key: String::new(),
        account_id: String::new(),
        url: None,
        model: Some("echo-model".to_string()),
        temperature: None,
        role: None,
        wasi: false,
    }])
}

/// 用意した回答を順に返すフィードバック入力
///
/// 回答が残っている間は再実行を承諾し、無くなったら断ります。
#[derive(Default)]
pub struct ScriptedFeedback {
    answers: Mutex<VecDeque<String>>,
    confirmations: Mutex<usize>,
}

impl ScriptedFeedback {
    pub fn new(answers: Vec<String>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            confirmations: Mutex::new(0),
        }
    }

    /// 再実行を尋ねられた回数
    pub fn confirmations(&self) -> usize {
        *self.confirmations.lock().unwrap()
    }
}

#[async_trait]
impl FeedbackPrompter for ScriptedFeedback {
    async fn confirm_rerun(&self) -> std::io::Result<bool> {
        *self.confirmations.lock().unwrap() += 1;
        Ok(!self.answers.lock().unwrap().is_empty())
    }

    async fn collect_feedback(&self) -> std::io::Result<String> {
        Ok(self.answers.lock().unwrap().pop_front().unwrap_or_default())
    }
}
