//! 生成プラグインの共通インターフェース定義
//!
//! # 責務
//!
//! - テキスト生成の共通トレイト [`GenerationClient`] を定義
//! - プラグインが返すモデル一覧の型 [`ModelInfo`] を提供
//!
//! # 実装方式
//!
//! 本番実装（[`super::ExtismCliClient`]）は Wasm プラグインを
//! **CLIツール呼び出しベース** で実行します。プラグイン設定（APIキー・モデル・
//! 温度・ロール）は呼び出しごとに [`PluginConfig`] として渡されます。
//!
//! # 使用例
//!
//! ```rust,no_run
//! use promptchain::config::PluginConfig;
//! use promptchain::provider::GenerationClient;
//!
//! async fn example(client: &dyn GenerationClient, config: &PluginConfig) {
//!     let text = client.generate("Explain Rust ownership in one sentence.", config)
//!         .await
//!         .unwrap();
//!     println!("{}", text);
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::PluginConfig;
use crate::error::ProviderError;

/// テキスト生成の共通インターフェース
///
/// # 実装要件
///
/// - `Send + Sync`: マルチスレッド環境で安全に使用可能
/// - 非同期実行対応（`async_trait`を使用）
/// - `config` はタスクごとの上書きを適用済みのコピー。実装は変更しない
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// プロンプトから生テキストを生成する
    ///
    /// # 引数
    ///
    /// - `prompt`: 実効プロンプト（累積出力 + 作業中のプロンプト）
    /// - `config`: プラグイン設定
    ///
    /// # エラー
    ///
    /// - [`ProviderError::CliNotFound`] - ランタイムCLIが未インストール
    /// - [`ProviderError::PluginLoad`] - プラグインモジュールを読み込めない
    /// - [`ProviderError::CliExecutionError`] - プラグインの実行エラー
    async fn generate(&self, prompt: &str, config: &PluginConfig)
    -> Result<String, ProviderError>;

    /// ツール定義を添えて生成する
    ///
    /// `tools` はワークフロー文書に書かれた値をそのまま渡します。
    async fn generate_with_tools(
        &self,
        prompt: &str,
        config: &PluginConfig,
        tools: &[serde_json::Value],
    ) -> Result<String, ProviderError>;

    /// プラグインが提供するモデルの一覧
    async fn list_models(&self, config: &PluginConfig) -> Result<Vec<ModelInfo>, ProviderError>;
}

/// プラグインが提供するモデル
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_info_deserialize() {
        let models: Vec<ModelInfo> = serde_json::from_str(
            r#"[{"name": "gpt-4o", "aliases": ["4o"]}, {"name": "gpt-4o-mini"}]"#,
        )
        .unwrap();

        assert_eq!(models[0].aliases, vec!["4o".to_string()]);
        assert!(models[1].aliases.is_empty());
    }
}
