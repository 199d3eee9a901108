//! 本番用のホスト機能
//!
//! HTTP は `reqwest`、ファイルは `tokio::fs`、Wasm プラグインは
//! [`PluginRuntime`]（Extism CLI）で実行します。

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::email::{RESEND_API_KEY_VAR, RESEND_ENDPOINT, ResendPayload};
use super::{EmailMessage, HostError, HostServices};
use crate::provider::runtime::{CallOptions, PluginRuntime};

/// 本番用のホスト機能
#[derive(Debug, Clone)]
pub struct SystemHost {
    http: reqwest::Client,
    runtime: PluginRuntime,
    resend_api_key: Option<String>,
}

impl SystemHost {
    /// `RESEND_API_KEY` はプロセスの環境変数から読み込みます。
    pub fn new(runtime: PluginRuntime) -> Self {
        Self {
            http: reqwest::Client::new(),
            runtime,
            resend_api_key: std::env::var(RESEND_API_KEY_VAR)
                .ok()
                .filter(|key| !key.is_empty()),
        }
    }

    /// Resend の API キーを明示的に指定する
    pub fn with_resend_api_key(mut self, key: Option<String>) -> Self {
        self.resend_api_key = key;
        self
    }

    fn io_error(path: &Path, source: std::io::Error) -> HostError {
        HostError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
impl HostServices for SystemHost {
    async fn fetch(&self, url: &str) -> Result<String, HostError> {
        let network_error = |source| HostError::Network {
            url: url.to_string(),
            source,
        };
        let response = self.http.get(url).send().await.map_err(network_error)?;
        response.text().await.map_err(network_error)
    }

    async fn append_to_file(&self, path: &Path, content: &str) -> Result<usize, HostError> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| Self::io_error(path, e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| Self::io_error(path, e))?;
        file.flush().await.map_err(|e| Self::io_error(path, e))?;
        Ok(content.len())
    }

    async fn read_file(&self, path: &Path) -> Result<String, HostError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Self::io_error(path, e))
    }

    async fn invoke_plugin(
        &self,
        locator: &str,
        function: &str,
        input: &str,
    ) -> Result<String, HostError> {
        self.runtime.check_cli_available().await?;
        let module = self.runtime.resolve_module(locator, None).await?;
        let output = self
            .runtime
            .call(&module, function, input, &CallOptions::default().wasi(true))
            .await?;
        Ok(output)
    }

    async fn send_email(&self, message: &EmailMessage) -> Result<(), HostError> {
        let api_key = self.resend_api_key.as_deref().ok_or_else(|| {
            HostError::Config(format!("環境変数 {} が設定されていません", RESEND_API_KEY_VAR))
        })?;

        let payload = serde_json::to_string(&ResendPayload::new(message))
            .map_err(|e| HostError::Config(format!("メールを JSON に変換できません: {}", e)))?;

        let network_error = |source| HostError::Network {
            url: RESEND_ENDPOINT.to_string(),
            source,
        };
        let response = self
            .http
            .post(RESEND_ENDPOINT)
            .header(AUTHORIZATION, format!("Bearer {}", api_key))
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(provider_error(status.as_u16(), response.text().await));
        }

        info!(subject = %message.subject, "メールを送信しました");
        Ok(())
    }
}

/// 異常ステータスの応答をエラーにする（本文が読めない場合は読み込みエラーを本文とする）
fn provider_error<E: std::fmt::Display>(status: u16, body: Result<String, E>) -> HostError {
    HostError::Provider {
        status,
        body: body.unwrap_or_else(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.md");
        let host = SystemHost::new(PluginRuntime::new());

        assert_eq!(host.append_to_file(&path, "first\n").await.unwrap(), 6);
        assert_eq!(host.append_to_file(&path, "second").await.unwrap(), 6);
        assert_eq!(host.read_file(&path).await.unwrap(), "first\nsecond");
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let host = SystemHost::new(PluginRuntime::new());
        let result = host
            .read_file(Path::new("/nonexistent/promptchain/input.txt"))
            .await;
        assert!(matches!(result, Err(HostError::Io { .. })));
    }

    #[test]
    fn test_provider_error_keeps_body_read_failure() {
        let error = provider_error(422, Ok::<_, std::io::Error>("invalid `to`".to_string()));
        assert!(matches!(
            error,
            HostError::Provider { status: 422, ref body } if body == "invalid `to`"
        ));

        let failed: Result<String, std::io::Error> =
            Err(std::io::Error::other("connection reset"));
        let error = provider_error(500, failed);
        assert!(matches!(
            error,
            HostError::Provider { status: 500, ref body } if body == "connection reset"
        ));
    }

    #[tokio::test]
    async fn test_send_email_without_api_key() {
        let host = SystemHost::new(PluginRuntime::new()).with_resend_api_key(None);
        let message = EmailMessage {
            to: "to@example.com".to_string(),
            from: "from@example.com".to_string(),
            subject: "s".to_string(),
            body_markdown: "b".to_string(),
        };
        let result = host.send_email(&message).await;
        assert!(matches!(result, Err(HostError::Config(_))));
    }
}
