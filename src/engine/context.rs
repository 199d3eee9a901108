//! 反復1回分の実行コンテキスト
//!
//! # 責務
//!
//! - タスクチェーンの進行状況を追跡
//! - 累積出力（直前のタスクの出力）の保持
//! - 各タスクの出力と実行時間の記録
//!
//! 反復ごとに新しいコンテキストを作るため、累積出力は反復をまたぎません。
//!
//! # 使用例
//!
//! ```rust
//! use promptchain::engine::context::{RunState, TaskOutput};
//! use promptchain::script::Value;
//! use std::time::Duration;
//!
//! let mut state = RunState::new(0, Value::from("rust"));
//!
//! state.start_task("draft");
//! state.record_task_output(TaskOutput::new("draft", "Draft text", true, Duration::from_secs(2)));
//!
//! // 次のタスクは累積出力を受け取る
//! assert_eq!(state.accumulated_output(), "Draft text");
//! ```

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::script::{Bindings, IterationValue};
use super::result::IterationResult;

/// タスク1つの実行結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutput {
    /// タスク名
    pub task_name: String,

    /// タスクの出力（`post_script` 適用後）
    pub content: String,

    /// 生成プラグインを呼び出したかどうか
    pub generated: bool,

    /// 実行時間
    pub duration: Duration,
}

impl TaskOutput {
    pub fn new(
        task_name: impl Into<String>,
        content: impl Into<String>,
        generated: bool,
        duration: Duration,
    ) -> Self {
        Self {
            task_name: task_name.into(),
            content: content.into(),
            generated,
            duration,
        }
    }
}

/// 反復1回分の実行コンテキスト
#[derive(Debug)]
pub struct RunState {
    iteration_index: usize,
    iteration_value: IterationValue,
    started_at: Instant,

    current_task: Option<String>,
    accumulated_output: String,
    task_outputs: Vec<TaskOutput>,
}

impl RunState {
    pub fn new(iteration_index: usize, iteration_value: IterationValue) -> Self {
        Self {
            iteration_index,
            iteration_value,
            started_at: Instant::now(),
            current_task: None,
            accumulated_output: String::new(),
            task_outputs: Vec::new(),
        }
    }

    pub fn iteration_index(&self) -> usize {
        self.iteration_index
    }

    pub fn iteration_value(&self) -> &IterationValue {
        &self.iteration_value
    }

    /// 現在実行中のタスクとして記録する
    pub fn start_task(&mut self, task_name: &str) {
        self.current_task = Some(task_name.to_string());
    }

    pub fn current_task(&self) -> Option<&str> {
        self.current_task.as_deref()
    }

    /// タスクの完了を記録し、累積出力をその出力で置き換える
    pub fn record_task_output(&mut self, output: TaskOutput) {
        self.accumulated_output = output.content.clone();
        self.current_task = None;
        self.task_outputs.push(output);
    }

    /// 直前のタスクの出力（最初のタスクでは空）
    pub fn accumulated_output(&self) -> &str {
        &self.accumulated_output
    }

    pub fn task_outputs(&self) -> &[TaskOutput] {
        &self.task_outputs
    }

    /// スクリプトに渡す束縛（`input` と `iterValue`）
    pub fn bindings(&self, input: &str) -> Bindings {
        Bindings::for_task(input, &self.iteration_value)
    }

    /// 反復の実行結果に変換する
    pub fn into_result(self) -> IterationResult {
        IterationResult {
            index: self.iteration_index,
            value: self.iteration_value,
            output: self.accumulated_output,
            tasks: self.task_outputs,
            duration: self.started_at.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Value;

    #[test]
    fn test_accumulated_output_is_replaced() {
        let mut state = RunState::new(1, Value::from("go"));
        assert_eq!(state.accumulated_output(), "");

        state.start_task("first");
        assert_eq!(state.current_task(), Some("first"));
        state.record_task_output(TaskOutput::new("first", "A", true, Duration::ZERO));
        assert_eq!(state.current_task(), None);

        state.start_task("second");
        state.record_task_output(TaskOutput::new("second", "B", false, Duration::ZERO));

        assert_eq!(state.accumulated_output(), "B");
        assert_eq!(state.task_outputs().len(), 2);
    }

    #[test]
    fn test_bindings_include_iteration_value() {
        let state = RunState::new(0, Value::Number(7.0));
        let bindings = state.bindings("text");
        assert_eq!(bindings.get("input"), Some(&Value::from("text")));
        assert_eq!(bindings.get("iterValue"), Some(&Value::Number(7.0)));
    }

    #[test]
    fn test_into_result() {
        let mut state = RunState::new(2, Value::from("x"));
        state.record_task_output(TaskOutput::new("only", "done", false, Duration::ZERO));

        let result = state.into_result();
        assert_eq!(result.index, 2);
        assert_eq!(result.output, "done");
        assert_eq!(result.value, Value::from("x"));
        assert_eq!(result.tasks[0].task_name, "only");
    }
}
