//! フィードバックによる再実行
//!
//! ワークフローの実行後にユーザーへ再実行の要否を尋ね、受け取ったフィードバックを
//! 次のラウンドのプロンプトに組み込みます。ユーザーとのやり取りは
//! [`FeedbackPrompter`] の実装（CLI では `dialoguer`）が担当します。

use async_trait::async_trait;

/// ユーザーとのフィードバックのやり取り
#[async_trait]
pub trait FeedbackPrompter: Send + Sync {
    /// 再実行するかどうかを尋ねる
    async fn confirm_rerun(&self) -> std::io::Result<bool>;

    /// フィードバックの本文を受け取る
    async fn collect_feedback(&self) -> std::io::Result<String>;
}

/// 次のラウンドのプロンプトを組み立てる
///
/// # 引数
///
/// - `prompt`: 直前のラウンドのプロンプト
/// - `response`: 直前のラウンドの最後の反復の出力
/// - `feedback`: ユーザーのフィードバック
pub fn synthesize_prompt(prompt: &str, response: &str, feedback: &str) -> String {
    format!(
        "you were prompted with {} and responded with {} the user provided this feedback: {}",
        prompt, response, feedback
    )
}
