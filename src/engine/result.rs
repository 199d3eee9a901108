//! ワークフロー実行結果の型定義
//!
//! # 責務
//!
//! - 反復1回分の実行結果 [`IterationResult`] の型定義
//! - ワークフロー全体の実行結果 [`WorkflowRun`] の型定義
//! - 実行エラー [`ExecutionError`] の型定義
//!
//! # 使用例
//!
//! ```rust,no_run
//! use promptchain::engine::result::WorkflowRun;
//!
//! fn handle_result(run: WorkflowRun) {
//!     println!("反復回数: {}", run.iterations.len());
//!     println!("フィードバック回数: {}", run.feedback_rounds);
//!     print!("{}", run.final_output);
//!
//!     // JSON形式で出力
//!     if let Ok(json) = run.to_json() {
//!         println!("JSON: {}", json);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::error::{ConfigError, ProviderError};
use crate::script::{ExpressionError, IterationValue};
use super::context::TaskOutput;
use super::planner::PlanError;

/// ワークフロー実行結果
///
/// フィードバックで再実行した場合は、最後のラウンドの結果です。
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRun {
    /// 全反復の出力を順に連結したもの
    pub final_output: String,

    /// 最後の反復の出力（反復が無い場合は空）
    pub last_result: String,

    /// 各反復の実行結果（実行順）
    pub iterations: Vec<IterationResult>,

    /// フィードバックによる再実行の回数
    pub feedback_rounds: u32,

    /// 総実行時間
    pub total_duration: Duration,
}

impl WorkflowRun {
    /// 反復結果から組み立てる
    pub fn from_iterations(iterations: Vec<IterationResult>, total_duration: Duration) -> Self {
        let final_output = iterations
            .iter()
            .map(|iteration| iteration.output.as_str())
            .collect::<String>();
        let last_result = iterations
            .last()
            .map(|iteration| iteration.output.clone())
            .unwrap_or_default();

        Self {
            final_output,
            last_result,
            iterations,
            feedback_rounds: 0,
            total_duration,
        }
    }

    /// 結果をJSON形式でシリアライズ
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// 反復1回分の実行結果
#[derive(Debug, Clone, Serialize)]
pub struct IterationResult {
    /// 反復インデックス（0始まり）
    pub index: usize,

    /// 反復値
    pub value: IterationValue,

    /// 最後のタスクの出力（タスクが無い場合は空）
    pub output: String,

    /// 各タスクの出力（実行順）
    pub tasks: Vec<TaskOutput>,

    /// 実行時間
    pub duration: Duration,
}

/// 実行エラー
///
/// 最初に発生したエラーで実行は中断します。部分的な出力は返しません。
///
/// # エラー種別
///
/// - [`ExecutionError::Parse`] - ワークフロー文書の読み込み・解釈に失敗
/// - [`ExecutionError::Plan`] - `iterator_script` の失敗（タスクは1つも実行されない）
/// - [`ExecutionError::Expression`] - `pre_script` / `post_script` の失敗
/// - [`ExecutionError::PluginNotFound`] - レジストリに無いプラグイン名
/// - [`ExecutionError::PluginCall`] - 生成プラグインの呼び出し失敗
/// - [`ExecutionError::Timeout`] - 生成呼び出しが期限内に完了しない
/// - [`ExecutionError::NestingTooDeep`] - ネストしたワークフローが深すぎる
/// - [`ExecutionError::Feedback`] - フィードバックの入力を読み取れない
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("ワークフローの読み込みに失敗しました: {0}")]
    Parse(#[source] ConfigError),

    #[error("反復計画に失敗しました: {0}")]
    Plan(#[from] PlanError),

    #[error("タスク '{task}' のスクリプトが失敗しました: {source}")]
    Expression {
        task: String,
        #[source]
        source: ExpressionError,
    },

    #[error("プラグインが見つかりません: '{0}'")]
    PluginNotFound(String),

    #[error("プラグイン '{plugin}' の呼び出しに失敗しました: {source}")]
    PluginCall {
        plugin: String,
        #[source]
        source: ProviderError,
    },

    #[error("タイムアウト: タスク '{task}' が {timeout_secs}秒以内に完了しませんでした")]
    Timeout {
        /// タイムアウトしたタスク名
        task: String,
        /// タイムアウト時間（秒）
        timeout_secs: u64,
    },

    #[error("ネストしたワークフローが深すぎます（上限: {limit}）: {path}")]
    NestingTooDeep { path: PathBuf, limit: u32 },

    #[error("フィードバックを読み取れませんでした: {0}")]
    Feedback(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Value;

    fn iteration(index: usize, output: &str) -> IterationResult {
        IterationResult {
            index,
            value: Value::Number(index as f64),
            output: output.to_string(),
            tasks: vec![],
            duration: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_final_output_concatenates_iterations() {
        let run = WorkflowRun::from_iterations(
            vec![iteration(0, "a"), iteration(1, "b"), iteration(2, "c")],
            Duration::from_secs(1),
        );
        assert_eq!(run.final_output, "abc");
        assert_eq!(run.last_result, "c");
        assert_eq!(run.feedback_rounds, 0);
    }

    #[test]
    fn test_empty_run() {
        let run = WorkflowRun::from_iterations(vec![], Duration::ZERO);
        assert_eq!(run.final_output, "");
        assert_eq!(run.last_result, "");
    }

    #[test]
    fn test_to_json() {
        let run = WorkflowRun::from_iterations(vec![iteration(0, "hello")], Duration::ZERO);
        let json: serde_json::Value = serde_json::from_str(&run.to_json().unwrap()).unwrap();
        assert_eq!(json["final_output"], "hello");
        assert_eq!(json["iterations"][0]["value"], 0);
    }

    #[test]
    fn test_error_messages() {
        let err = ExecutionError::Timeout {
            task: "draft".to_string(),
            timeout_secs: 30,
        };
        assert_eq!(
            err.to_string(),
            "タイムアウト: タスク 'draft' が 30秒以内に完了しませんでした"
        );

        let err = ExecutionError::PluginNotFound("missing".to_string());
        assert!(err.to_string().contains("'missing'"));
    }
}
