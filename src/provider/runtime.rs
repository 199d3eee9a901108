//! Wasm プラグインランタイム（Extism CLI）の呼び出し
//!
//! # 責務
//!
//! - プラグインの場所（URL またはローカルパス）を実行可能なファイルに解決する
//! - URL のモジュールはダウンロードしてキャッシュし、`hash` 指定時は SHA-256 を検証する
//! - `extism call` サブプロセスで関数を実行し、標準出力を結果として返す
//!
//! 入力は標準入力で、プラグイン設定（APIキーを含む）は所有者のみ読み書きできる
//! 一時マニフェストで渡します。コマンドライン引数には載せません。
//!
//! 生成プラグイン（[`super::ExtismCliClient`]）とスクリプトの `Extism(...)`
//! ホスト機能の両方がこのランタイムを共有します。
//!
//! # CLIツール
//!
//! - **コマンド**: `extism`（設定 `engine.plugin_runtime` で変更可能）
//! - **インストール**: <https://extism.org/docs/install>
//!
//! ```text
//! extism call <manifest.json> <function> --manifest --stdin [--wasi] < input
//! ```
//!
//! マニフェストの形式:
//!
//! ```json
//! {"wasm": [{"path": "/abs/module.wasm"}], "config": {"model": "gpt-4o"}, "allowed_hosts": ["api.openai.com"]}
//! ```

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::settings::DEFAULT_PLUGIN_RUNTIME;
use crate::error::ProviderError;

/// インストール方法の案内（エラーメッセージ用）
const INSTALL_URL: &str = "https://extism.org/docs/install";

/// キャッシュディレクトリ名
const CACHE_DIR_NAME: &str = "promptchain/plugins";

/// 1回の関数呼び出しのオプション
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    /// マニフェストの `config` として渡す値（空の値は渡さない）
    pub config: Vec<(String, String)>,
    /// プラグインに通信を許可するホスト
    pub allowed_hosts: Vec<String>,
    pub wasi: bool,
}

impl CallOptions {
    pub fn with_config(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.config.push((key.to_string(), value));
        }
        self
    }

    pub fn allow_host(mut self, host: Option<&str>) -> Self {
        if let Some(host) = host.filter(|h| !h.is_empty()) {
            self.allowed_hosts.push(host.to_string());
        }
        self
    }

    pub fn wasi(mut self, enabled: bool) -> Self {
        self.wasi = enabled;
        self
    }

    /// モジュールと設定をまとめたマニフェスト
    pub fn manifest<'a>(&'a self, module: &'a Path) -> Manifest<'a> {
        Manifest {
            wasm: vec![ManifestWasm { path: module }],
            config: self
                .config
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str()))
                .collect(),
            allowed_hosts: self.allowed_hosts.iter().map(String::as_str).collect(),
        }
    }

    /// `extism` に渡すコマンドライン引数
    ///
    /// 入力と設定値は含みません（標準入力とマニフェストで渡す）。
    pub fn args(&self, manifest_path: &Path, function: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "call".into(),
            manifest_path.into(),
            function.into(),
            "--manifest".into(),
            "--stdin".into(),
        ];
        if self.wasi {
            args.push("--wasi".into());
        }
        args
    }
}

/// Extism のマニフェスト
#[derive(Debug, Serialize)]
pub struct Manifest<'a> {
    wasm: Vec<ManifestWasm<'a>>,
    config: BTreeMap<&'a str, &'a str>,
    allowed_hosts: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct ManifestWasm<'a> {
    path: &'a Path,
}

/// プラグインランタイム
#[derive(Debug, Clone)]
pub struct PluginRuntime {
    /// 使用するCLIコマンド名（通常は "extism"）
    command: String,
    /// ダウンロードしたモジュールの保存先
    cache_dir: PathBuf,
    http: reqwest::Client,
}

impl PluginRuntime {
    /// 既定のコマンドとキャッシュディレクトリでランタイムを生成
    pub fn new() -> Self {
        Self::with_command(DEFAULT_PLUGIN_RUNTIME)
    }

    /// カスタムコマンド名を指定してランタイムを生成
    pub fn with_command(command: impl Into<String>) -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(CACHE_DIR_NAME);
        Self {
            command: command.into(),
            cache_dir,
            http: reqwest::Client::new(),
        }
    }

    /// キャッシュディレクトリを差し替える
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// CLIツールが利用可能かチェック
    ///
    /// # エラー
    ///
    /// - [`ProviderError::CliNotFound`] - CLIツールが見つからない
    pub async fn check_cli_available(&self) -> Result<(), ProviderError> {
        let check_command = if cfg!(target_os = "windows") {
            "where"
        } else {
            "which"
        };

        // 確認コマンド自体が無い環境も「見つからない」として扱う
        match Command::new(check_command).arg(&self.command).output().await {
            Ok(output) if output.status.success() => Ok(()),
            _ => Err(ProviderError::CliNotFound(
                self.command.clone(),
                INSTALL_URL.to_string(),
            )),
        }
    }

    /// プラグインの場所をローカルファイルに解決する
    ///
    /// # 引数
    ///
    /// - `locator`: `https://` / `http://` の URL、またはローカルパス（`~` 展開あり）
    /// - `expected_hash`: モジュール内容の SHA-256（16進）。指定時は一致を検証する
    ///
    /// # エラー
    ///
    /// - [`ProviderError::PluginLoad`] - ダウンロード失敗、ファイルが無い、ハッシュ不一致
    pub async fn resolve_module(
        &self,
        locator: &str,
        expected_hash: Option<&str>,
    ) -> Result<PathBuf, ProviderError> {
        let path = if is_url(locator) {
            self.download(locator).await?
        } else {
            let path = expand_home(locator);
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(ProviderError::PluginLoad(format!(
                    "ファイルが見つかりません: {}",
                    path.display()
                )));
            }
            path
        };

        if let Some(expected) = expected_hash {
            verify_hash(&path, expected).await?;
        }
        Ok(path)
    }

    /// URL のモジュールをキャッシュにダウンロードする（取得済みなら再利用）
    async fn download(&self, url: &str) -> Result<PathBuf, ProviderError> {
        let target = self.cache_dir.join(format!("{}.wasm", sha256_hex(url.as_bytes())));
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            debug!(url, path = %target.display(), "キャッシュ済みのプラグインを使用します");
            return Ok(target);
        }

        debug!(url, "プラグインをダウンロードします");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::PluginLoad(format!("{}: {}", url, e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::PluginLoad(format!(
                "{}: status code {}",
                url,
                status.as_u16()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::PluginLoad(format!("{}: {}", url, e)))?;

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        tokio::fs::write(&target, &bytes).await?;
        Ok(target)
    }

    /// モジュールの関数を呼び出し、標準出力を返す
    ///
    /// `input` は標準入力に書き込みます。関数が入力を読まずに終了した場合
    /// （パイプの切断）はエラーにしません。
    ///
    /// # エラー
    ///
    /// - [`ProviderError::Io`] - マニフェストの作成・プロセスの起動・入力の書き込みに失敗
    /// - [`ProviderError::CliExecutionError`] - 終了コードが非0
    /// - [`ProviderError::Utf8`] - 出力が UTF-8 ではない
    pub async fn call(
        &self,
        module: &Path,
        function: &str,
        input: &str,
        options: &CallOptions,
    ) -> Result<String, ProviderError> {
        let module = std::path::absolute(module).unwrap_or_else(|_| module.to_path_buf());
        let manifest_json = serde_json::to_vec(&options.manifest(&module)).map_err(|e| {
            ProviderError::InvalidResponse(format!("マニフェストを JSON に変換できません: {}", e))
        })?;

        // 作成されるファイルは所有者のみ読み書き可能（0600）
        let manifest = tempfile::Builder::new()
            .prefix("promptchain-manifest-")
            .suffix(".json")
            .tempfile()?;
        tokio::fs::write(manifest.path(), &manifest_json).await?;

        let mut child = Command::new(&self.command)
            .args(options.args(manifest.path(), function))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdin = child.stdin.take();
        let write_input = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(input.as_bytes()).await {
                    Err(err) if err.kind() != ErrorKind::BrokenPipe => return Err(err),
                    _ => {}
                }
            }
            Ok(())
        };
        let (written, output) = tokio::join!(write_input, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::CliExecutionError(format!(
                "{} の実行が終了コード {} で失敗しました: {}",
                function,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        written?;

        Ok(String::from_utf8(output.stdout)?)
    }
}

impl Default for PluginRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn is_url(locator: &str) -> bool {
    locator.starts_with("https://") || locator.starts_with("http://")
}

/// 先頭の `~` をホームディレクトリに展開する
fn expand_home(locator: &str) -> PathBuf {
    match (locator.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            home.join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(locator),
    }
}

fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

async fn verify_hash(path: &Path, expected: &str) -> Result<(), ProviderError> {
    let contents = tokio::fs::read(path).await?;
    let actual = sha256_hex(&contents);
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(ProviderError::PluginLoad(format!(
            "ハッシュが一致しません: {}（期待: {}, 実際: {}）",
            path.display(),
            expected,
            actual
        )))
    }
}
