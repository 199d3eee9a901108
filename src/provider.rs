//! 生成プラグイン抽象化レイヤー（CLI版）
//!
//! # 責務
//!
//! - テキスト生成を統一的に扱うインターフェース [`GenerationClient`] を提供
//! - Wasm プラグインをプラグインランタイムCLI（Extism）で実行する本番実装
//! - タスク単位の設定上書き・期限・エラー変換を行う [`GenerationAdapter`]
//!
//! # アーキテクチャ
//!
//! このモジュールは **CLIツール呼び出しベース** で設計されています。
//! プラグインは設定ファイルの `completion-plugins` に登録された Wasm モジュールで、
//! `extism call` サブプロセスとして実行します。
//!
//! ## 使用するCLIツール
//!
//! - **Extism CLI**: `extism` コマンド
//!   - インストール: <https://extism.org/docs/install>
//!   - 設定 `engine.plugin_runtime` で別のパスを指定可能
//!
//! # モジュール構成
//!
//! - `traits` - 共通インターフェース（[`GenerationClient`]トレイト等）
//! - `runtime` - プラグインの取得・検証と `extism call` の実行
//! - `extism` - Extism CLI 経由のクライアント
//! - `adapter` - タスクとレジストリをつなぐアダプター
//!
//! # 使用例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use promptchain::config::AppConfig;
//! use promptchain::provider::{ExtismCliClient, GenerationAdapter};
//! use promptchain::provider::runtime::PluginRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::from_file(AppConfig::default_path()?)?;
//!     let client = ExtismCliClient::new(PluginRuntime::with_command(&config.engine.plugin_runtime));
//!     let adapter = GenerationAdapter::new(Arc::new(config.registry), Arc::new(client), None);
//!
//!     for model in adapter.list_models("openai").await? {
//!         println!("{}", model);
//!     }
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod extism;
pub mod runtime;
pub mod traits;

// 公開APIの再エクスポート
pub use adapter::GenerationAdapter;
pub use extism::ExtismCliClient;
pub use traits::{GenerationClient, ModelInfo};
