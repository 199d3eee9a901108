//! promptchain CLI - ワークフロー文書を実行する

use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use dialoguer::{Confirm, Input};
use thiserror::Error;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use promptchain::config::AppConfig;
use promptchain::engine::{
    ExecutionError, FeedbackPrompter, IterationObserver, IterationResult, Orchestrator,
};
use promptchain::error::ConfigError;
use promptchain::host::SystemHost;
use promptchain::provider::runtime::PluginRuntime;
use promptchain::provider::{ExtismCliClient, GenerationAdapter};

/// ログファイル名の接頭辞
const LOG_FILE_PREFIX: &str = "promptchain.log";

#[derive(Parser)]
#[command(name = "promptchain")]
#[command(about = "宣言的なワークフローで生成プラグインを連鎖させる")]
#[command(version)]
struct Cli {
    /// ユーザープロンプト（標準入力がパイプの場合はその内容の後ろに付く）
    prompt: Option<String>,

    /// 実行するワークフロー文書（.yaml / .yml / .toml）
    #[arg(short, long, required_unless_present = "models")]
    workflow: Option<PathBuf>,

    /// 出力を加工せずにそのまま表示する
    #[arg(short, long)]
    raw: bool,

    /// 実行後にフィードバックによる再実行を尋ねる
    #[arg(short, long)]
    feedback: bool,

    /// プラグインレジストリの設定ファイル
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 指定したプラグインのモデル一覧を表示する
    #[arg(long, value_name = "PLUGIN")]
    models: Option<String>,

    /// デバッグログを出力する
    #[arg(short, long)]
    verbose: bool,

    /// ログファイルの出力先（日次ローテーション）
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// 標準エラーのログをJSON形式にする
    #[arg(long)]
    log_json: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("標準入力の読み込みに失敗しました")]
    Stdin(#[source] io::Error),

    #[error("--workflow を指定してください")]
    MissingWorkflow,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(&cli);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_error_chain(&err);
            ExitCode::FAILURE
        }
    }
}

/// tracing の購読者を設定する
///
/// 戻り値のガードはプロセス終了まで保持すること（ファイルへの書き出しが止まる）。
fn init_logging(cli: &Cli) -> Option<WorkerGuard> {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let stderr_layer = if cli.log_json {
        fmt::layer().json().with_writer(io::stderr).boxed()
    } else {
        fmt::layer().with_writer(io::stderr).boxed()
    };

    let (file_layer, guard) = match &cli.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => AppConfig::default_path()?,
    };
    let config = AppConfig::from_file(&config_path)?;

    let runtime = PluginRuntime::with_command(&config.engine.plugin_runtime);
    let generation = GenerationAdapter::new(
        Arc::new(config.registry),
        Arc::new(ExtismCliClient::new(runtime.clone())),
        config.engine.generation_timeout,
    );

    if let Some(plugin) = &cli.models {
        for model in generation.list_models(plugin).await? {
            println!("{}", model);
        }
        return Ok(());
    }

    let workflow = cli.workflow.as_ref().ok_or(CliError::MissingWorkflow)?;
    let prompt = read_prompt(cli.prompt.as_deref())?;

    let orchestrator = Orchestrator::new(
        config.engine,
        generation,
        Arc::new(SystemHost::new(runtime)),
    )
    .with_observer(Arc::new(StdoutObserver))
    .with_feedback_prompter(Arc::new(TerminalPrompter));

    orchestrator
        .run_workflow(workflow, &prompt, cli.raw, cli.feedback)
        .await?;
    Ok(())
}

/// パイプされた標準入力と引数からプロンプトを組み立てる
fn read_prompt(argument: Option<&str>) -> Result<String, CliError> {
    let mut prompt = String::new();

    let stdin = io::stdin();
    if !stdin.is_terminal() {
        stdin
            .lock()
            .read_to_string(&mut prompt)
            .map_err(CliError::Stdin)?;
    }
    if let Some(argument) = argument {
        prompt.push_str(argument);
    }
    Ok(prompt)
}

fn print_error_chain(err: &dyn std::error::Error) {
    eprintln!("Error: {}", err);
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
}

/// 反復が完了するたびに標準出力へ表示する
struct StdoutObserver;

impl IterationObserver for StdoutObserver {
    fn on_iteration(&self, iteration: &IterationResult, raw: bool) {
        let mut stdout = io::stdout().lock();
        let written = if raw {
            write!(stdout, "{}", iteration.output)
        } else {
            writeln!(stdout, "{}", iteration.output)
        };
        if let Err(err) = written.and_then(|_| stdout.flush()) {
            warn!(iteration = iteration.index, error = %err, "出力の書き込みに失敗しました");
        }
    }
}

/// 端末で再実行の要否とフィードバックを尋ねる
struct TerminalPrompter;

#[async_trait]
impl FeedbackPrompter for TerminalPrompter {
    async fn confirm_rerun(&self) -> io::Result<bool> {
        tokio::task::spawn_blocking(|| {
            Confirm::new()
                .with_prompt("フィードバックを入力して再実行しますか？")
                .default(false)
                .interact()
                .map_err(io::Error::other)
        })
        .await
        .map_err(io::Error::other)?
    }

    async fn collect_feedback(&self) -> io::Result<String> {
        tokio::task::spawn_blocking(|| {
            Input::<String>::new()
                .with_prompt("フィードバック")
                .interact_text()
                .map_err(io::Error::other)
        })
        .await
        .map_err(io::Error::other)?
    }
}
