//! 埋め込み式言語
//!
//! # 責務
//!
//! ワークフロー文書の `iterator_script` / `pre_script` / `post_script` に書かれた
//! 式をコンパイルし、評価します。
//!
//! - コンパイル時に未定義の変数・関数を検出する（静的検査）
//! - 評価は非同期で行い、ホスト機能（`Get` / `AppendFile` / `Workflow` 等）を待機できる
//! - 評価エンジンは [`ScriptEngine`] トレイトで差し替え可能
//!
//! ## 束縛される名前
//!
//! | 名前        | 内容                                       |
//! |-------------|--------------------------------------------|
//! | `input`     | 作業中のプロンプト（pre）/ 生成結果（post）|
//! | `iterValue` | 現在の反復値                               |
//! | ホスト機能  | [`crate::host::HostBridge`] を参照         |
//!
//! `iterator_script` にはホスト機能のみが束縛されます。

pub mod ast;
pub mod evaluator;
mod parser;
pub mod value;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::host::{HostBridge, HostError};

pub use evaluator::ExprEngine;
pub use value::{IterationValue, Value, ValueKind};

/// 作業中のテキストの束縛名
pub const INPUT_BINDING: &str = "input";

/// 反復値の束縛名
pub const ITER_VALUE_BINDING: &str = "iterValue";

/// 式の評価で発生するエラー（原因）
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("構文エラー: {0}")]
    Syntax(String),

    #[error("未定義の変数です: {0}")]
    UnknownVariable(String),

    #[error("未定義の関数です: {0}")]
    UnknownFunction(String),

    #[error("型エラー: {0}")]
    Type(String),

    #[error("関数 {function} の引数の数が不正です（期待: {expected}, 実際: {actual}）")]
    Arity {
        function: String,
        expected: usize,
        actual: usize,
    },

    #[error("インデックス {index} は範囲外です（長さ: {len}）")]
    IndexOutOfRange { index: f64, len: usize },

    #[error("ゼロ除算です")]
    DivisionByZero,

    /// 静的に推論した結果の種類が要求と異なる
    #[error("式の結果は {expected} である必要があります（推論結果: {actual}）")]
    ResultKind {
        expected: &'static str,
        actual: &'static str,
    },

    #[error(transparent)]
    Host(#[from] HostError),
}

/// スクリプトのコンパイル・実行エラー
///
/// どの式で失敗したかを保持します。
#[derive(Debug, Error)]
pub enum ExpressionError {
    #[error("スクリプトのコンパイルに失敗しました `{expression}`: {source}")]
    Compile {
        expression: String,
        #[source]
        source: ScriptError,
    },

    #[error("スクリプトの実行に失敗しました `{expression}`: {source}")]
    Runtime {
        expression: String,
        #[source]
        source: ScriptError,
    },
}

impl ExpressionError {
    pub fn expression(&self) -> &str {
        match self {
            ExpressionError::Compile { expression, .. }
            | ExpressionError::Runtime { expression, .. } => expression,
        }
    }

    pub fn cause(&self) -> &ScriptError {
        match self {
            ExpressionError::Compile { source, .. } | ExpressionError::Runtime { source, .. } => {
                source
            }
        }
    }

    /// ホスト機能の失敗が原因であればそのエラーを返す
    pub fn host_error(&self) -> Option<&HostError> {
        match self.cause() {
            ScriptError::Host(err) => Some(err),
            _ => None,
        }
    }
}

/// スクリプトに束縛する変数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: BTreeMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// タスクスクリプト用の束縛（`input` と `iterValue`）
    pub fn for_task(input: &str, iteration_value: &IterationValue) -> Self {
        Self::new()
            .with(INPUT_BINDING, Value::from(input))
            .with(ITER_VALUE_BINDING, iteration_value.clone())
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

/// スクリプト評価エンジン
///
/// コンパイル失敗は [`ExpressionError::Compile`]、実行時の失敗
/// （ホスト機能のエラーを含む）は [`ExpressionError::Runtime`] として返します。
#[async_trait]
pub trait ScriptEngine: Send + Sync {
    /// 式をコンパイルし、束縛とホスト機能のもとで評価する
    async fn evaluate(
        &self,
        source: &str,
        bindings: &Bindings,
        host: &HostBridge<'_>,
    ) -> Result<Value, ExpressionError>;

    /// 結果の種類を指定して評価する
    ///
    /// 結果の種類を静的に推論できるエンジンは、不一致を評価前に
    /// [`ExpressionError::Compile`] として返します（ホスト機能は呼ばれない）。
    /// 既定の実装は推論せずに [`ScriptEngine::evaluate`] を呼ぶだけなので、
    /// 呼び出し側は評価結果の種類も検査すること。
    async fn evaluate_expecting(
        &self,
        source: &str,
        bindings: &Bindings,
        host: &HostBridge<'_>,
        expected: ValueKind,
    ) -> Result<Value, ExpressionError> {
        let _ = expected;
        self.evaluate(source, bindings, host).await
    }
}
