//! エラー型の定義
//!
//! このモジュールは、設定の読み込みと生成プラグイン呼び出しで使用されるエラー型を定義します。
//! ホスト機能のエラーは [`crate::host::HostError`]、スクリプトのエラーは
//! [`crate::script::ExpressionError`]、実行全体のエラーは
//! [`crate::engine::ExecutionError`] にそれぞれ定義されています。

use std::path::PathBuf;

use thiserror::Error;

/// 設定関連のエラー
///
/// ワークフロー文書とプラグインレジストリの読み込みで発生します。
#[derive(Debug, Error)]
pub enum ConfigError {
    /// ファイルの読み込みに失敗
    #[error("設定ファイルの読み込みに失敗しました: {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML のデシリアライズに失敗
    #[error("TOML のデシリアライズに失敗しました: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    /// TOML のシリアライズに失敗
    #[error("TOML のシリアライズに失敗しました: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// YAML のデシリアライズ / シリアライズに失敗
    #[error("YAML の変換に失敗しました: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// 対応していない拡張子
    #[error("対応していないファイル形式です（.yaml / .yml / .toml のみ）: {0}")]
    UnsupportedFormat(PathBuf),

    /// ユーザー設定ディレクトリが解決できない
    #[error("ユーザー設定ディレクトリを特定できませんでした")]
    ConfigDirUnavailable,

    /// バリデーションエラー
    #[error("設定のバリデーションに失敗しました: {0}")]
    Validation(String),
}

/// 生成プラグイン（プラグインランタイムCLI）呼び出しのエラー
#[derive(Debug, Error)]
pub enum ProviderError {
    /// プラグインランタイムCLIが見つからない
    ///
    /// 1つ目はコマンド名、2つ目はインストール方法の案内
    #[error("プラグインランタイム '{0}' が見つかりません。{1} からインストールしてください")]
    CliNotFound(String, String),

    /// CLI実行エラー
    #[error("プラグインの実行に失敗しました: {0}")]
    CliExecutionError(String),

    /// プラグインのソースを読み込めない
    #[error("プラグインを読み込めませんでした: {0}")]
    PluginLoad(String),

    /// 不正なレスポンス
    #[error("プラグインのレスポンスが不正です: {0}")]
    InvalidResponse(String),

    /// 入出力エラー
    #[error("入出力エラー: {0}")]
    Io(#[from] std::io::Error),

    /// 出力が UTF-8 ではない
    #[error("出力を UTF-8 として解釈できません: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
