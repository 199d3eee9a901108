//! 反復計画
//!
//! `iterator_script` を評価し、タスクチェーンを何回、どの値で実行するかを決めます。
//!
//! | `iterator_script`          | 計画                         |
//! |----------------------------|------------------------------|
//! | 無い（空）                 | `[Null]`（1回）              |
//! | リストを返す               | その要素の順に1回ずつ        |
//! | 空リストを返す             | 0回                          |
//! | リスト以外 / 失敗          | [`PlanError`]（タスクは実行しない） |
//!
//! 結果がリストにならないと静的に分かる式（`AppendFile(...)` や文字列リテラル等）は
//! 評価前にコンパイルエラーとなり、ホスト機能は一切呼ばれません。
//! 種類を推論できない式は評価後に検査します。
//!
//! `iterator_script` にはホスト機能のみが束縛され、`input` / `iterValue` はありません。

use thiserror::Error;
use tracing::debug;

use crate::config::Workflow;
use crate::host::HostBridge;
use crate::script::{
    Bindings, ExpressionError, IterationValue, ScriptEngine, Value, ValueKind,
};

/// 反復計画のエラー
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error("iterator_script はリストを返す必要があります（実際: {actual}）: `{expression}`")]
    NotSequence {
        expression: String,
        actual: &'static str,
    },
}

/// 反復計画
pub struct IterationPlanner<'a> {
    scripts: &'a dyn ScriptEngine,
}

impl<'a> IterationPlanner<'a> {
    pub fn new(scripts: &'a dyn ScriptEngine) -> Self {
        Self { scripts }
    }

    /// 反復値のリストを計画する
    pub async fn plan(
        &self,
        workflow: &Workflow,
        host: &HostBridge<'_>,
    ) -> Result<Vec<IterationValue>, PlanError> {
        let Some(script) = workflow.iterator_script() else {
            return Ok(vec![Value::Null]);
        };

        let values = match self
            .scripts
            .evaluate_expecting(script, &Bindings::new(), host, ValueKind::List)
            .await?
        {
            Value::List(values) => values,
            other => {
                return Err(PlanError::NotSequence {
                    expression: script.to_string(),
                    actual: other.type_name(),
                });
            }
        };

        debug!(iterations = values.len(), "反復計画を作成しました");
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::test_support::{RecordingHost, RecordingInvoker};
    use crate::script::ExprEngine;
    use std::path::Path;

    async fn plan(yaml: &str, host: &RecordingHost) -> Result<Vec<IterationValue>, PlanError> {
        let workflow = Workflow::from_yaml(yaml).unwrap();
        let invoker = RecordingInvoker::default();
        let bridge = HostBridge::new(host, &invoker, Path::new("."), 0, None);
        IterationPlanner::new(&ExprEngine::new())
            .plan(&workflow, &bridge)
            .await
    }

    #[tokio::test]
    async fn test_absent_script_runs_once() {
        let values = plan("tasks: []\n", &RecordingHost::default()).await.unwrap();
        assert_eq!(values, vec![Value::Null]);
    }

    #[tokio::test]
    async fn test_list_in_order() {
        let values = plan(
            "iterator_script: '[\"a\", 2, [true]]'\ntasks: []\n",
            &RecordingHost::default(),
        )
        .await
        .unwrap();
        assert_eq!(
            values,
            vec![
                Value::from("a"),
                Value::Number(2.0),
                Value::List(vec![Value::Bool(true)]),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_list_runs_zero_times() {
        let values = plan("iterator_script: '[]'\ntasks: []\n", &RecordingHost::default())
            .await
            .unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn test_script_can_use_host_functions() {
        let host = RecordingHost::default().with_fetch_body("x,y");
        let values = plan(
            "iterator_script: 'split(Get(\"https://example.com/list\"), \",\")'\ntasks: []\n",
            &host,
        )
        .await
        .unwrap();
        assert_eq!(values, vec![Value::from("x"), Value::from("y")]);
    }

    #[tokio::test]
    async fn test_non_list_result() {
        let result = plan(
            "iterator_script: '[\"abc\"][0]'\ntasks: []\n",
            &RecordingHost::default(),
        )
        .await;
        assert!(matches!(
            result,
            Err(PlanError::NotSequence { actual: "string", .. })
        ));
    }

    #[tokio::test]
    async fn test_non_list_host_call_is_rejected_before_evaluation() {
        let host = RecordingHost::default();
        let result = plan(
            "iterator_script: 'AppendFile(\"side effect\", \"out.txt\")'\ntasks: []\n",
            &host,
        )
        .await;

        assert!(matches!(
            result,
            Err(PlanError::Expression(ExpressionError::Compile { .. }))
        ));
        assert!(host.calls().is_empty());
        assert_eq!(host.file("out.txt"), None);
    }

    #[tokio::test]
    async fn test_string_literal_is_rejected_at_compile_time() {
        let result = plan("iterator_script: '\"abc\"'\ntasks: []\n", &RecordingHost::default()).await;
        assert!(matches!(
            result,
            Err(PlanError::Expression(ExpressionError::Compile { .. }))
        ));
    }

    #[tokio::test]
    async fn test_input_is_not_bound() {
        let result = plan("iterator_script: 'input'\ntasks: []\n", &RecordingHost::default()).await;
        assert!(matches!(
            result,
            Err(PlanError::Expression(ExpressionError::Compile { .. }))
        ));
    }
}
