//! promptchain - 宣言的なワークフローで生成プラグインを連鎖させる実行エンジン
//!
//! # モジュール構成
//!
//! - [`config`] - ワークフロー文書・プラグインレジストリ・エンジン設定の読み込み
//! - [`script`] - `iterator_script` / `pre_script` / `post_script` の式言語
//! - [`host`] - スクリプトから呼び出せるホスト機能
//! - [`provider`] - 生成プラグインの呼び出し
//! - [`engine`] - 反復計画・タスクチェーン・フィードバック・ネスト実行
//! - [`error`] - 設定とプラグイン呼び出しのエラー型

pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod provider;
pub mod script;
