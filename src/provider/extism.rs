//! Extism CLI 経由の生成プラグインクライアント
//!
//! # 責務
//!
//! - 設定された Wasm プラグインの `completion` / `completionWithTools` / `models`
//!   関数を [`PluginRuntime`] で呼び出す
//! - [`GenerationClient`] トレイトを実装し、統一インターフェースを提供
//!
//! # プラグインに渡す設定
//!
//! | キー          | 値                          |
//! |---------------|-----------------------------|
//! | `api_key`     | 解決済みの APIキー          |
//! | `account_id`  | 解決済みのアカウントID      |
//! | `model`       | モデル名                    |
//! | `temperature` | 温度（文字列）              |
//! | `role`        | ロール                      |
//!
//! 設定はマニフェストの `config` として渡し、コマンドライン引数には載せません。
//! 空の値は渡しません。`url` はマニフェストの `allowed_hosts` になります。
//!
//! # 出力形式
//!
//! - `completion`: 生成されたテキストそのもの
//! - `models`: JSON（`[{"name": "...", "aliases": ["..."]}]`）

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::config::PluginConfig;
use crate::error::ProviderError;
use super::runtime::{CallOptions, PluginRuntime};
use super::traits::{GenerationClient, ModelInfo};

/// 生成関数名
const COMPLETION_FUNCTION: &str = "completion";

/// ツール付き生成関数名
const COMPLETION_WITH_TOOLS_FUNCTION: &str = "completionWithTools";

/// モデル一覧関数名
const MODELS_FUNCTION: &str = "models";

/// `completionWithTools` の入力
#[derive(Debug, Serialize)]
struct ToolsInput<'a> {
    prompt: &'a str,
    tools: &'a [serde_json::Value],
}

/// Extism CLI 経由の生成プラグインクライアント
pub struct ExtismCliClient {
    runtime: PluginRuntime,
}

impl ExtismCliClient {
    pub fn new(runtime: PluginRuntime) -> Self {
        Self { runtime }
    }

    /// プラグイン設定から呼び出しオプションを組み立てる
    fn call_options(config: &PluginConfig) -> CallOptions {
        CallOptions::default()
            .with_config("api_key", config.api_key.as_str())
            .with_config("account_id", config.account_id.as_str())
            .with_config("model", config.model.clone().unwrap_or_default())
            .with_config("temperature", config.temperature.clone().unwrap_or_default())
            .with_config("role", config.role.clone().unwrap_or_default())
            .allow_host(config.url.as_deref())
            .wasi(config.wasi)
    }

    /// プラグインを解決して関数を呼び出す
    async fn call(
        &self,
        config: &PluginConfig,
        function: &str,
        input: &str,
    ) -> Result<String, ProviderError> {
        self.runtime.check_cli_available().await?;

        let module = self
            .runtime
            .resolve_module(&config.source, config.hash.as_deref())
            .await?;

        debug!(plugin = %config.name, function, "プラグイン関数を呼び出します");
        self.runtime
            .call(&module, function, input, &Self::call_options(config))
            .await
    }

    /// `models` 関数の出力をパースする
    fn parse_models(stdout: &str) -> Result<Vec<ModelInfo>, ProviderError> {
        serde_json::from_str(stdout.trim()).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "モデル一覧を JSON として解釈できません: {}。出力: {}",
                e, stdout
            ))
        })
    }
}

impl Default for ExtismCliClient {
    fn default() -> Self {
        Self::new(PluginRuntime::new())
    }
}

#[async_trait]
impl GenerationClient for ExtismCliClient {
    async fn generate(
        &self,
        prompt: &str,
        config: &PluginConfig,
    ) -> Result<String, ProviderError> {
        self.call(config, COMPLETION_FUNCTION, prompt).await
    }

    async fn generate_with_tools(
        &self,
        prompt: &str,
        config: &PluginConfig,
        tools: &[serde_json::Value],
    ) -> Result<String, ProviderError> {
        let input = serde_json::to_string(&ToolsInput { prompt, tools }).map_err(|e| {
            ProviderError::InvalidResponse(format!("ツール定義を JSON に変換できません: {}", e))
        })?;
        self.call(config, COMPLETION_WITH_TOOLS_FUNCTION, &input)
            .await
    }

    async fn list_models(&self, config: &PluginConfig) -> Result<Vec<ModelInfo>, ProviderError> {
        let stdout = self.call(config, MODELS_FUNCTION, "").await?;
        Self::parse_models(&stdout)
    }
}
