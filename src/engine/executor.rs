//! タスクチェーンの実行
//!
//! # 責務
//!
//! 反復1回分のタスクを宣言順に実行し、各タスクの出力を次のタスクに渡します。
//!
//! ## タスク1つの処理
//!
//! 1. 作業プロンプト = タスクのプロンプト
//!    （最初の反復の最初のタスクのみ `ユーザープロンプト + " " + プロンプト`）
//! 2. `pre_script` があれば評価し、結果を作業プロンプトの末尾に追加（`input` = 作業プロンプト）
//! 3. `plugin` があれば `累積出力 + 作業プロンプト` で生成。無ければ生成結果は空
//! 4. `post_script` があれば評価し、その結果でタスクの出力を置き換える（`input` = 生成結果）
//! 5. タスクの出力が新しい累積出力になる
//!
//! 途中のエラーでチェーンは中断し、それ以降のタスクは実行しません。

use std::time::Instant;

use tracing::{debug, info};

use crate::config::{Task, Workflow};
use crate::host::HostBridge;
use crate::provider::GenerationAdapter;
use crate::script::{ScriptEngine, Value};
use super::context::{RunState, TaskOutput};
use super::result::{ExecutionError, IterationResult};

/// タスクチェーンの実行者
pub struct TaskChainExecutor<'a> {
    scripts: &'a dyn ScriptEngine,
    generation: &'a GenerationAdapter,
}

impl<'a> TaskChainExecutor<'a> {
    pub fn new(scripts: &'a dyn ScriptEngine, generation: &'a GenerationAdapter) -> Self {
        Self {
            scripts,
            generation,
        }
    }

    /// 反復1回分のタスクチェーンを実行する
    ///
    /// # 引数
    ///
    /// - `workflow`: 実行するワークフロー
    /// - `state`: この反復のコンテキスト
    /// - `user_prompt`: 最初のタスクの前に付けるユーザープロンプト（最初の反復のみ）
    /// - `host`: スクリプトに渡すホスト機能
    ///
    /// # 戻り値
    ///
    /// 最後のタスクの出力を含む反復の実行結果
    pub async fn run_iteration(
        &self,
        workflow: &Workflow,
        mut state: RunState,
        user_prompt: Option<&str>,
        host: &HostBridge<'_>,
    ) -> Result<IterationResult, ExecutionError> {
        for (index, task) in workflow.tasks().iter().enumerate() {
            let prefix = if index == 0 { user_prompt } else { None };
            state.start_task(task.name());
            let output = self.run_task(task, &state, prefix, host).await?;
            state.record_task_output(output);
        }

        let result = state.into_result();
        info!(
            iteration = result.index,
            tasks = result.tasks.len(),
            duration_ms = result.duration.as_millis() as u64,
            "反復が完了しました"
        );
        Ok(result)
    }

    async fn run_task(
        &self,
        task: &Task,
        state: &RunState,
        user_prompt: Option<&str>,
        host: &HostBridge<'_>,
    ) -> Result<TaskOutput, ExecutionError> {
        let started = Instant::now();
        debug!(
            task = task.name(),
            iteration = state.iteration_index(),
            "タスクを開始します"
        );

        let mut working_prompt = match user_prompt {
            Some(prompt) => format!("{} {}", prompt, task.prompt()),
            None => task.prompt().to_string(),
        };

        if let Some(script) = task.pre_script() {
            let value = self.evaluate(task, script, &working_prompt, state, host).await?;
            working_prompt.push_str(&value.to_string());
        }

        let generated = match task.plugin() {
            Some(plugin) => {
                let effective_prompt = format!("{}{}", state.accumulated_output(), working_prompt);
                Some(
                    self.generation
                        .generate(plugin, task, &effective_prompt)
                        .await?,
                )
            }
            None => None,
        };
        let was_generated = generated.is_some();
        let generated = generated.unwrap_or_default();

        let content = match task.post_script() {
            Some(script) => self
                .evaluate(task, script, &generated, state, host)
                .await?
                .to_string(),
            None => generated,
        };

        let duration = started.elapsed();
        debug!(
            task = task.name(),
            duration_ms = duration.as_millis() as u64,
            "タスクが完了しました"
        );
        Ok(TaskOutput::new(task.name(), content, was_generated, duration))
    }

    async fn evaluate(
        &self,
        task: &Task,
        script: &str,
        input: &str,
        state: &RunState,
        host: &HostBridge<'_>,
    ) -> Result<Value, ExecutionError> {
        self.scripts
            .evaluate(script, &state.bindings(input), host)
            .await
            .map_err(|source| ExecutionError::Expression {
                task: task.name().to_string(),
                source,
            })
    }
}
