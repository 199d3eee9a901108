//! ワークフロー文書の読み込みと管理を行うモジュール
//!
//! # 責務
//!
//! タスクの連鎖を宣言的に記述したワークフロー文書（YAML / TOML）を読み込み、
//! [`Workflow`] 構造体として扱うための機能を提供します。
//!
//! ## 使用例
//!
//! ```yaml
//! iterator_script: '["rust", "go"]'
//! tasks:
//!   - name: research
//!     prompt: "Describe the language: "
//!     plugin: openai
//!     pre_script: 'string(iterValue)'
//!   - name: save
//!     post_script: 'AppendFile(input, "out.md")'
//! ```
//!
//! ## 関連モジュール
//!
//! - [`crate::config::task`]: 各タスクの定義
//! - [`crate::engine::planner`]: `iterator_script` の評価
//! - [`crate::engine::executor`]: タスクチェーンの実行

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use super::dto::WorkflowDto;
use super::format::{DocumentFormat, read_document};
use super::task::{Task, non_empty};

/// ワークフロー定義（ドメインモデル）
///
/// タスクの順序付きリストと、任意の反復計画（`iterator_script`）を持ちます。
/// 読み込み後は不変で、実行時の作業コピーは実行側が持ちます。
#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
    iterator_script: Option<String>,
    tasks: Vec<Task>,
    source_path: Option<PathBuf>,
}

impl Workflow {
    /// ファイルからワークフローを読み込む
    ///
    /// 拡張子で形式を判定します（`.yaml` / `.yml` / `.toml`）。
    /// 読み込んだパスは記憶され、ネストしたワークフローの相対パス解決の基点になります。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let dto: WorkflowDto = read_document(path)?;
        let mut workflow = Self::try_from(dto)?;
        workflow.source_path = Some(path.to_path_buf());
        Ok(workflow)
    }

    /// YAML 文字列からワークフローを読み込む
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let dto: WorkflowDto = DocumentFormat::Yaml.parse(yaml)?;
        Self::try_from(dto)
    }

    /// TOML 文字列からワークフローを読み込む
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let dto: WorkflowDto = DocumentFormat::Toml.parse(toml)?;
        Self::try_from(dto)
    }

    /// ワークフローを YAML 文字列に変換
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        let dto = WorkflowDto::from(self.clone());
        DocumentFormat::Yaml.render(&dto)
    }

    pub fn iterator_script(&self) -> Option<&str> {
        self.iterator_script.as_deref()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// 読み込み元のパス（文字列から読み込んだ場合は `None`）
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// 相対パス解決の基点となるディレクトリ
    ///
    /// 文字列から読み込んだ場合はカレントディレクトリ（`.`）。
    pub fn base_dir(&self) -> PathBuf {
        match self.source_path.as_deref().and_then(Path::parent) {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// DTO からドメインモデルへの変換（読み込み方向）
impl TryFrom<WorkflowDto> for Workflow {
    type Error = ConfigError;

    fn try_from(dto: WorkflowDto) -> Result<Self, Self::Error> {
        let tasks = dto
            .tasks
            .into_iter()
            .map(Task::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            iterator_script: non_empty(dto.iterator_script),
            tasks,
            source_path: None,
        })
    }
}

/// ドメインモデルから DTO への変換（書き込み方向）
impl From<Workflow> for WorkflowDto {
    fn from(workflow: Workflow) -> Self {
        Self {
            iterator_script: workflow.iterator_script,
            tasks: workflow.tasks.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_YAML: &str = r#"
iterator_script: '["a", "b", "c"]'
tasks:
  - name: draft
    prompt: "Write about "
    role: writer
    plugin: openai
    model: gpt-4o
    temperature: 0.2
    pre_script: 'string(iterValue)'
  - name: save
    post_script: 'AppendFile(input, "out.md")'
"#;

    #[test]
    fn test_from_yaml() {
        let workflow = Workflow::from_yaml(SAMPLE_YAML).unwrap();

        assert_eq!(workflow.iterator_script(), Some(r#"["a", "b", "c"]"#));
        assert_eq!(workflow.tasks().len(), 2);

        let draft = &workflow.tasks()[0];
        assert_eq!(draft.name(), "draft");
        assert_eq!(draft.prompt(), "Write about ");
        assert_eq!(draft.role(), Some("writer"));
        assert_eq!(draft.plugin(), Some("openai"));
        assert_eq!(draft.model(), Some("gpt-4o"));
        assert_eq!(draft.temperature(), Some("0.2"));
        assert_eq!(draft.pre_script(), Some("string(iterValue)"));

        let save = &workflow.tasks()[1];
        assert_eq!(save.plugin(), None);
        assert_eq!(save.prompt(), "");
        assert_eq!(save.post_script(), Some(r#"AppendFile(input, "out.md")"#));
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
iterator_script = "[1, 2]"

[[tasks]]
name = "first"
prompt = "Hello"
plugin = "openai"
temperature = "0.9"

[[tasks]]
name = "second"
prompt = "World"
tools = [{ name = "search", description = "web search" }]
"#;
        let workflow = Workflow::from_toml(toml).unwrap();
        assert_eq!(workflow.iterator_script(), Some("[1, 2]"));
        assert_eq!(workflow.tasks()[0].temperature(), Some("0.9"));
        assert_eq!(workflow.tasks()[1].tools().len(), 1);
        assert_eq!(workflow.tasks()[1].tools()[0]["name"], "search");
    }

    #[test]
    fn test_empty_iterator_script_is_absent() {
        let workflow = Workflow::from_yaml("iterator_script: '  '\ntasks: []\n").unwrap();
        assert_eq!(workflow.iterator_script(), None);
        assert!(workflow.tasks().is_empty());
    }

    #[test]
    fn test_malformed_document() {
        let result = Workflow::from_yaml("tasks: [name: oops");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));

        let result = Workflow::from_yaml("tasks: 42\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let original = Workflow::from_yaml(SAMPLE_YAML).unwrap();
        let yaml = original.to_yaml().unwrap();
        let restored = Workflow::from_yaml(&yaml).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_base_dir() {
        let workflow = Workflow::from_yaml("tasks: []\n").unwrap();
        assert_eq!(workflow.base_dir(), PathBuf::from("."));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.yaml");
        std::fs::write(&path, "tasks: []\n").unwrap();

        let workflow = Workflow::from_file(&path).unwrap();
        assert_eq!(workflow.source_path(), Some(path.as_path()));
        assert_eq!(workflow.base_dir(), dir.path().to_path_buf());
    }
}
