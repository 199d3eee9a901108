//! ワークフロー実行のエントリーポイント
//!
//! # 責務
//!
//! - ワークフロー文書の読み込み → 反復計画 → 反復ごとのタスクチェーン実行
//! - 反復結果の通知（[`IterationObserver`]）
//! - フィードバックによる再実行（上限付きのループ）
//! - ネストしたワークフローの実行（[`WorkflowInvoker`] の実装）と深さの制限
//!
//! すべての処理は順番に `await` され、タスク・反復を並行に実行することはありません。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{EngineSettings, Workflow};
use crate::host::{HostBridge, HostError, HostServices, WorkflowInvoker};
use crate::provider::GenerationAdapter;
use crate::script::{ExprEngine, ScriptEngine};
use super::context::RunState;
use super::executor::TaskChainExecutor;
use super::feedback::{FeedbackPrompter, synthesize_prompt};
use super::planner::IterationPlanner;
use super::result::{ExecutionError, IterationResult, WorkflowRun};

/// 反復の完了通知を受け取る
///
/// トップレベルの実行でのみ呼ばれます（ネストしたワークフローでは呼ばれません）。
pub trait IterationObserver: Send + Sync {
    /// # 引数
    ///
    /// - `iteration`: 完了した反復の結果
    /// - `raw`: 出力を加工せずに表示するかどうか
    fn on_iteration(&self, iteration: &IterationResult, raw: bool);
}

/// 何もしないオブザーバー
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl IterationObserver for NoopObserver {
    fn on_iteration(&self, _iteration: &IterationResult, _raw: bool) {}
}

/// ワークフロー実行のエントリーポイント
pub struct Orchestrator {
    settings: EngineSettings,
    generation: GenerationAdapter,
    services: Arc<dyn HostServices>,
    scripts: Arc<dyn ScriptEngine>,
    observer: Arc<dyn IterationObserver>,
    prompter: Option<Arc<dyn FeedbackPrompter>>,
}

impl Orchestrator {
    /// # 引数
    ///
    /// - `settings`: エンジン設定（期限・上限）
    /// - `generation`: 生成機能アダプター
    /// - `services`: スクリプトに公開するホスト機能の実装
    pub fn new(
        settings: EngineSettings,
        generation: GenerationAdapter,
        services: Arc<dyn HostServices>,
    ) -> Self {
        Self {
            settings,
            generation,
            services,
            scripts: Arc::new(ExprEngine::new()),
            observer: Arc::new(NoopObserver),
            prompter: None,
        }
    }

    /// スクリプトエンジンを差し替える
    pub fn with_script_engine(mut self, scripts: Arc<dyn ScriptEngine>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn IterationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_feedback_prompter(mut self, prompter: Arc<dyn FeedbackPrompter>) -> Self {
        self.prompter = Some(prompter);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// ワークフローを実行する
    ///
    /// # 引数
    ///
    /// - `path`: ワークフロー文書のパス
    /// - `prompt`: ユーザープロンプト（最初の反復の最初のタスクの前に付く）
    /// - `raw`: 出力を加工せずに表示するかどうか（オブザーバーに渡す）
    /// - `feedback`: 実行後にフィードバックによる再実行を尋ねるかどうか
    ///
    /// # 戻り値
    ///
    /// 最後のラウンドの実行結果
    pub async fn run_workflow(
        &self,
        path: &Path,
        prompt: &str,
        raw: bool,
        feedback: bool,
    ) -> Result<WorkflowRun, ExecutionError> {
        let mut prompt = prompt.to_string();
        let mut round = 0;

        loop {
            let mut run = self.run_document(path, &prompt, raw, 0).await?;
            run.feedback_rounds = round;

            if !feedback {
                return Ok(run);
            }
            let Some(prompter) = &self.prompter else {
                warn!("フィードバックの入力手段が無いため再実行しません");
                return Ok(run);
            };
            if let Some(limit) = self.settings.max_feedback_rounds
                && round >= limit
            {
                info!(limit, "フィードバックによる再実行の上限に達しました");
                return Ok(run);
            }

            if !prompter.confirm_rerun().await.map_err(ExecutionError::Feedback)? {
                return Ok(run);
            }
            let feedback_text = prompter
                .collect_feedback()
                .await
                .map_err(ExecutionError::Feedback)?;

            prompt = synthesize_prompt(&prompt, &run.last_result, &feedback_text);
            round += 1;
            info!(round, "フィードバックを反映して再実行します");
        }
    }

    /// ワークフロー文書を読み込んで1ラウンド実行する
    async fn run_document(
        &self,
        path: &Path,
        prompt: &str,
        raw: bool,
        depth: u32,
    ) -> Result<WorkflowRun, ExecutionError> {
        let workflow = Workflow::from_file(path).map_err(ExecutionError::Parse)?;
        info!(
            path = %path.display(),
            tasks = workflow.tasks().len(),
            depth,
            "ワークフローを読み込みました"
        );
        self.run(&workflow, prompt, raw, depth).await
    }

    /// 読み込み済みのワークフローを1ラウンド実行する
    ///
    /// `depth` はネストの深さ（トップレベルは 0）です。
    pub async fn run(
        &self,
        workflow: &Workflow,
        prompt: &str,
        raw: bool,
        depth: u32,
    ) -> Result<WorkflowRun, ExecutionError> {
        let started = Instant::now();
        let base_dir = workflow.base_dir();
        let host = HostBridge::new(
            self.services.as_ref(),
            self,
            &base_dir,
            depth,
            self.settings.host_call_timeout,
        );

        let values = IterationPlanner::new(self.scripts.as_ref())
            .plan(workflow, &host)
            .await?;

        let executor = TaskChainExecutor::new(self.scripts.as_ref(), &self.generation);
        let mut iterations = Vec::with_capacity(values.len());

        for (index, value) in values.into_iter().enumerate() {
            let user_prompt = (index == 0 && !prompt.is_empty()).then_some(prompt);
            let iteration = executor
                .run_iteration(workflow, RunState::new(index, value), user_prompt, &host)
                .await?;

            if depth == 0 {
                self.observer.on_iteration(&iteration, raw);
            }
            iterations.push(iteration);
        }

        Ok(WorkflowRun::from_iterations(iterations, started.elapsed()))
    }
}

#[async_trait]
impl WorkflowInvoker for Orchestrator {
    async fn run_nested(
        &self,
        path: PathBuf,
        prompt: String,
        depth: u32,
    ) -> Result<String, HostError> {
        let limit = self.settings.max_nesting_depth;
        let result = if depth > limit {
            Err(ExecutionError::NestingTooDeep {
                path: path.clone(),
                limit,
            })
        } else {
            self.run_document(&path, &prompt, true, depth).await
        };

        result
            .map(|run| run.final_output)
            .map_err(|err| HostError::ChildWorkflow {
                path,
                source: Box::new(err),
            })
    }
}
