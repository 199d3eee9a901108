//! 生成プラグインの設定とレジストリ
//!
//! # 責務
//!
//! - 設定ファイルの `completion-plugins` を [`PluginConfig`] に変換
//! - APIキー等の環境変数名を値に解決
//! - 名前によるプラグイン設定の検索（[`PluginRegistry::get`]）
//!
//! レジストリはエンジンからは読み取り専用です。タスクごとの上書き
//! （model / temperature / role）は常に [`PluginConfig`] のコピーに対して行います。

use crate::error::ConfigError;
use super::dto::PluginConfigDto;
use super::task::non_empty;

/// プラグイン設定
///
/// `api_key` と `account_id` は環境変数から解決済みの値を保持します。
#[derive(Clone, PartialEq)]
pub struct PluginConfig {
    pub name: String,
    /// Wasm モジュールの場所（URL またはローカルパス）
    pub source: String,
    /// モジュールの SHA-256（16進）。指定時は読み込み時に検証する
    pub hash: Option<String>,
    pub api_key: String,
    pub account_id: String,
    /// プラグインが通信を許可されるホスト
    pub url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<String>,
    pub role: Option<String>,
    pub wasi: bool,
}

impl std::fmt::Debug for PluginConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // APIキーはログに出さない
        f.debug_struct("PluginConfig")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("hash", &self.hash)
            .field("url", &self.url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("role", &self.role)
            .field("wasi", &self.wasi)
            .finish_non_exhaustive()
    }
}

impl PluginConfig {
    /// 環境変数の値を読み込む関数を指定して DTO から変換する
    fn from_dto(
        dto: PluginConfigDto,
        lookup_env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if dto.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "completion-plugins の name は必須です".to_string(),
            ));
        }
        if dto.source.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "プラグイン '{}' の source は必須です",
                dto.name
            )));
        }

        let resolve = |var: Option<String>| {
            non_empty(var)
                .and_then(|name| lookup_env(&name))
                .unwrap_or_default()
        };

        Ok(Self {
            api_key: resolve(dto.api_key),
            account_id: resolve(dto.account_id),
            name: dto.name,
            source: dto.source,
            hash: non_empty(dto.hash),
            url: non_empty(dto.url),
            model: non_empty(dto.model),
            temperature: non_empty(dto.temperature.map(|t| t.into_text())),
            role: non_empty(dto.role),
            wasi: dto.wasi,
        })
    }
}

/// プラグイン設定のレジストリ（読み取り専用）
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<PluginConfig>,
}

impl PluginRegistry {
    pub fn new(plugins: Vec<PluginConfig>) -> Self {
        Self { plugins }
    }

    pub(super) fn from_dtos(
        dtos: Vec<PluginConfigDto>,
        lookup_env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let plugins = dtos
            .into_iter()
            .map(|dto| PluginConfig::from_dto(dto, lookup_env))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { plugins })
    }

    /// 名前でプラグイン設定を検索する（最初に一致したもの）
    pub fn get(&self, name: &str) -> Option<&PluginConfig> {
        self.plugins.iter().find(|plugin| plugin.name == name)
    }

    /// 登録済みのプラグイン名（定義順）
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(|plugin| plugin.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(name: &str, api_key: Option<&str>) -> PluginConfigDto {
        PluginConfigDto {
            name: name.to_string(),
            source: format!("https://example.com/{}.wasm", name),
            api_key: api_key.map(str::to_string),
            model: Some("gpt-4o".to_string()),
            ..Default::default()
        }
    }

    fn fake_env(name: &str) -> Option<String> {
        match name {
            "TEST_OPENAI_KEY" => Some("sk-test".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_resolves_env_var_names() {
        let registry = PluginRegistry::from_dtos(
            vec![dto("openai", Some("TEST_OPENAI_KEY")), dto("other", Some("MISSING"))],
            &fake_env,
        )
        .unwrap();

        assert_eq!(registry.get("openai").unwrap().api_key, "sk-test");
        assert_eq!(registry.get("other").unwrap().api_key, "");
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["openai", "other"]);
    }

    #[test]
    fn test_get_unknown_plugin() {
        let registry = PluginRegistry::from_dtos(vec![dto("openai", None)], &fake_env).unwrap();
        assert!(registry.get("anthropic").is_none());
        assert!(registry.get("").is_none());
    }

    #[test]
    fn test_missing_source_is_rejected() {
        let mut invalid = dto("broken", None);
        invalid.source = String::new();
        let result = PluginRegistry::from_dtos(vec![invalid], &fake_env);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let registry =
            PluginRegistry::from_dtos(vec![dto("openai", Some("TEST_OPENAI_KEY"))], &fake_env)
                .unwrap();
        let rendered = format!("{:?}", registry.get("openai").unwrap());
        assert!(!rendered.contains("sk-test"));
    }
}
