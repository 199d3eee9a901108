//! 設定と宣言的文書の読み込み
//!
//! # 責務
//!
//! - ワークフロー文書（YAML / TOML）を読み込み、[`workflow::Workflow`] に変換
//! - 生成プラグインのレジストリ（`completion-plugins`）を読み込み、[`plugins::PluginRegistry`] を提供
//! - エンジン設定（タイムアウト、フィードバック上限など）を [`settings::EngineSettings`] として提供
//!
//! # モジュール構成
//!
//! - `format` - 拡張子によるファイル形式の判定とデシリアライズ
//! - `dto` - デシリアライズ専用の DTO（外部非公開）
//! - `task` - タスク（チェーンの1ステップ）のドメインモデル
//! - `workflow` - ワークフロー文書のドメインモデル
//! - `plugins` - プラグイン設定とレジストリ
//! - `settings` - 設定ファイル全体とエンジン設定

pub mod format;
mod dto;
pub mod task;
pub mod workflow;
pub mod plugins;
pub mod settings;

pub use format::DocumentFormat;
pub use plugins::{PluginConfig, PluginRegistry};
pub use settings::{AppConfig, EngineSettings};
pub use task::Task;
pub use workflow::Workflow;
