//! ワークフロー実行エンジン
//!
//! # 責務
//!
//! - ワークフロー文書を読み込み、`iterator_script` で反復を計画
//! - 反復ごとにタスクを宣言順に実行し、出力を次のタスクへ連鎖
//! - タスクのスクリプト（`pre_script` / `post_script`）の評価
//! - 生成プラグインの抽象的な利用
//! - フィードバックによる再実行と、ネストしたワークフローの実行
//!
//! # モジュール構成
//!
//! - [`orchestrator`][]: エントリーポイント（文書の読み込み・反復・フィードバック）
//! - [`planner`][]: 反復計画
//! - [`executor`][]: 反復1回分のタスクチェーン実行
//! - [`context`][]: 反復中の状態（累積出力・タスク出力）
//! - [`feedback`][]: フィードバックのやり取りとプロンプトの合成
//! - [`result`][]: 実行結果型とエラー型
//!
//! # 使用例
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use promptchain::config::AppConfig;
//! use promptchain::engine::Orchestrator;
//! use promptchain::host::SystemHost;
//! use promptchain::provider::runtime::PluginRuntime;
//! use promptchain::provider::{ExtismCliClient, GenerationAdapter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1. 設定を読み込む
//!     let config = AppConfig::from_file(AppConfig::default_path()?)?;
//!     let runtime = PluginRuntime::with_command(&config.engine.plugin_runtime);
//!
//!     // 2. Orchestratorを生成
//!     let generation = GenerationAdapter::new(
//!         Arc::new(config.registry),
//!         Arc::new(ExtismCliClient::new(runtime.clone())),
//!         config.engine.generation_timeout,
//!     );
//!     let orchestrator = Orchestrator::new(
//!         config.engine,
//!         generation,
//!         Arc::new(SystemHost::new(runtime)),
//!     );
//!
//!     // 3. ワークフローを実行
//!     let run = orchestrator
//!         .run_workflow(Path::new("workflows/simple.yaml"), "Rust の所有権", false, false)
//!         .await?;
//!
//!     // 4. 結果を出力
//!     print!("{}", run.final_output);
//!     println!("Iterations: {}", run.iterations.len());
//!     println!("Duration: {:?}", run.total_duration);
//!
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod executor;
pub mod feedback;
pub mod orchestrator;
pub mod planner;
pub mod result;

#[cfg(test)]
pub(crate) mod test_support;

// 公開APIの再エクスポート
pub use context::{RunState, TaskOutput};
pub use executor::TaskChainExecutor;
pub use feedback::{FeedbackPrompter, synthesize_prompt};
pub use orchestrator::{IterationObserver, NoopObserver, Orchestrator};
pub use planner::{IterationPlanner, PlanError};
pub use result::{ExecutionError, IterationResult, WorkflowRun};
