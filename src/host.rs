//! ホスト機能ブリッジ
//!
//! # 責務
//!
//! ユーザーが書いたスクリプトから呼び出せる機能を、固定の許可リストとして提供します。
//! スクリプトはこのモジュールを経由しない限り、ファイル・ネットワーク・プラグインに
//! アクセスできません。
//!
//! | スクリプト上の名前               | メソッド                                      |
//! |----------------------------------|-----------------------------------------------|
//! | `Get(url)`                       | [`HostBridge::fetch`]                         |
//! | `AppendFile(content, path)`      | [`HostBridge::append_to_file`]                |
//! | `ReadFile(path)`                 | [`HostBridge::read_file`]                     |
//! | `Extism(locator, fn, input)`     | [`HostBridge::invoke_plugin`]                 |
//! | `Resend(to, from, subject, body)`| [`HostBridge::send_email`]                    |
//! | `Workflow(path, prompt)`         | [`HostBridge::invoke_nested_workflow`]        |
//!
//! 実際の入出力は [`HostServices`]（本番は [`SystemHost`]）が行い、
//! ネストしたワークフローの実行は [`WorkflowInvoker`]（オーケストレーター）に委譲します。

mod email;
mod system;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ProviderError;

pub use email::{EmailMessage, markdown_to_html};
pub use system::SystemHost;

/// ホスト機能のエラー
#[derive(Debug, Error)]
pub enum HostError {
    /// 通信に失敗（HTTP のエラーステータスは含まない）
    #[error("HTTPリクエストに失敗しました ({url}): {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// ファイル操作に失敗
    #[error("ファイル操作に失敗しました ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// プラグインモジュールを読み込めない
    #[error("プラグインを読み込めませんでした: {0}")]
    PluginLoad(#[source] ProviderError),

    /// プラグイン関数の実行に失敗
    #[error("プラグインの呼び出しに失敗しました: {0}")]
    PluginCall(#[source] ProviderError),

    /// 必要な設定（認証情報など）が無い
    #[error("設定が不足しています: {0}")]
    Config(String),

    /// 外部サービスが要求を拒否した
    #[error("外部サービスがエラーを返しました\n status code: {status}\n {body}")]
    Provider { status: u16, body: String },

    /// ネストしたワークフローのパスが存在しない
    #[error("ワークフローが見つかりません: {0}")]
    Path(PathBuf),

    /// ネストしたワークフローが失敗した
    #[error("ネストしたワークフロー {path} の実行に失敗しました: {source}")]
    ChildWorkflow {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// 期限内に完了しなかった
    #[error("ホスト機能 {capability} が {}秒以内に完了しませんでした", .limit.as_secs())]
    Timeout {
        capability: &'static str,
        limit: Duration,
    },
}

impl From<ProviderError> for HostError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::PluginLoad(_) => HostError::PluginLoad(err),
            other => HostError::PluginCall(other),
        }
    }
}

/// ホスト機能の実装
///
/// パスは呼び出し元（スクリプト）が渡したものをそのまま扱います。
#[async_trait]
pub trait HostServices: Send + Sync {
    /// URL の内容を取得する（エラーステータスでも本文を返す）
    async fn fetch(&self, url: &str) -> Result<String, HostError>;

    /// ファイルに追記し（無ければ作成）、書き込んだバイト数を返す
    async fn append_to_file(&self, path: &Path, content: &str) -> Result<usize, HostError>;

    async fn read_file(&self, path: &Path) -> Result<String, HostError>;

    /// Wasm プラグインの関数を呼び出す
    async fn invoke_plugin(
        &self,
        locator: &str,
        function: &str,
        input: &str,
    ) -> Result<String, HostError>;

    /// Markdown の本文を HTML に変換してメールを送信する
    async fn send_email(&self, message: &EmailMessage) -> Result<(), HostError>;
}

/// ネストしたワークフローの実行者（オーケストレーターが実装する）
#[async_trait]
pub trait WorkflowInvoker: Send + Sync {
    /// ワークフロー文書を実行し、最終出力を返す
    ///
    /// # 引数
    ///
    /// - `path`: 解決済みのワークフロー文書のパス
    /// - `prompt`: ユーザープロンプト
    /// - `depth`: 子のネスト深さ（トップレベルは 0）
    async fn run_nested(&self, path: PathBuf, prompt: String, depth: u32)
    -> Result<String, HostError>;
}

/// スクリプトから見えるホスト機能の許可リスト
///
/// 実行中のワークフロー文書ごとに作られ、相対パスの基点とネスト深さを保持します。
pub struct HostBridge<'a> {
    services: &'a dyn HostServices,
    invoker: &'a dyn WorkflowInvoker,
    base_dir: &'a Path,
    depth: u32,
    timeout: Option<Duration>,
}

impl<'a> HostBridge<'a> {
    /// # 引数
    ///
    /// - `services`: ホスト機能の実装
    /// - `invoker`: ネストしたワークフローの実行者
    /// - `base_dir`: 実行中のワークフロー文書のディレクトリ
    /// - `depth`: 実行中のワークフローのネスト深さ
    /// - `timeout`: 1回の呼び出しの期限（`None` は無期限）
    pub fn new(
        services: &'a dyn HostServices,
        invoker: &'a dyn WorkflowInvoker,
        base_dir: &'a Path,
        depth: u32,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            services,
            invoker,
            base_dir,
            depth,
            timeout,
        }
    }

    pub fn base_dir(&self) -> &Path {
        self.base_dir
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub async fn fetch(&self, url: &str) -> Result<String, HostError> {
        self.guard("Get", self.services.fetch(url)).await
    }

    pub async fn append_to_file(&self, content: &str, path: &str) -> Result<usize, HostError> {
        self.guard("AppendFile", self.services.append_to_file(Path::new(path), content))
            .await
    }

    pub async fn read_file(&self, path: &str) -> Result<String, HostError> {
        self.guard("ReadFile", self.services.read_file(Path::new(path)))
            .await
    }

    pub async fn invoke_plugin(
        &self,
        locator: &str,
        function: &str,
        input: &str,
    ) -> Result<String, HostError> {
        self.guard(
            "Extism",
            self.services.invoke_plugin(locator, function, input),
        )
        .await
    }

    pub async fn send_email(
        &self,
        to: &str,
        from: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), HostError> {
        let message = EmailMessage {
            to: to.to_string(),
            from: from.to_string(),
            subject: subject.to_string(),
            body_markdown: body.to_string(),
        };
        self.guard("Resend", self.services.send_email(&message)).await
    }

    /// ネストしたワークフローを実行し、その最終出力を返す
    ///
    /// `relative_path` は実行中のワークフロー文書のディレクトリを基点に解決します。
    ///
    /// # エラー
    ///
    /// - [`HostError::Path`] - 解決したパスが存在しない
    /// - [`HostError::ChildWorkflow`] - 子ワークフローが失敗した
    pub async fn invoke_nested_workflow(
        &self,
        relative_path: &str,
        prompt: &str,
    ) -> Result<String, HostError> {
        let path = self.base_dir.join(relative_path);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(HostError::Path(path));
        }
        let path = std::path::absolute(&path).unwrap_or(path);

        self.guard(
            "Workflow",
            self.invoker
                .run_nested(path, prompt.to_string(), self.depth + 1),
        )
        .await
    }

    /// 呼び出しをログに記録し、期限を適用する
    async fn guard<T>(
        &self,
        capability: &'static str,
        call: impl Future<Output = Result<T, HostError>>,
    ) -> Result<T, HostError> {
        debug!(capability, depth = self.depth, "ホスト機能を呼び出します");

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(HostError::Timeout { capability, limit })),
            None => call.await,
        };

        if let Err(err) = &result {
            warn!(capability, error = %err, "ホスト機能が失敗しました");
        }
        result
    }
}
