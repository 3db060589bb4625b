//! 模块清单解析器
//!
//! 从 `module.yaml` / `module.json` 解析模块清单，校验后与工厂组合为 [`ModuleDefinition`]。
//!
//! ```yaml
//! id: "editor"
//! name: "编辑器"
//! version: "1.2.0"
//! category: feature
//! dependencies:
//!   - "storage"
//! provides:
//!   - "document.edit"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::metadata::{ModuleCategory, ModuleDefinition, ModuleFactory};
use crate::utils::{CoreError, Result};

/// 模块清单
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// 模块 ID
    pub id: String,
    /// 显示名称
    pub name: String,
    /// 版本号（semver）
    pub version: String,
    /// 分类名称
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// 描述
    #[serde(default)]
    pub description: String,
    /// 依赖的模块 ID
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// 提供的能力
    #[serde(default)]
    pub provides: Vec<String>,
}

impl ModuleManifest {
    /// 创建最小清单
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            category: None,
            description: String::new(),
            dependencies: Vec::new(),
            provides: Vec::new(),
        }
    }

    /// 校验后与工厂组合为模块定义
    pub fn into_definition(self, factory: ModuleFactory) -> Result<ModuleDefinition> {
        ModuleParser::validate(&self)?;

        let category = self
            .category
            .as_deref()
            .map(str::parse::<ModuleCategory>)
            .transpose()?;

        let mut definition = ModuleDefinition::new(self.id, self.name, self.version, factory)
            .with_description(self.description);
        definition.category = category;
        definition.dependencies = self.dependencies;
        definition.provides = self.provides;
        Ok(definition)
    }
}

/// 模块清单解析器
#[derive(Debug, Clone, Default)]
pub struct ModuleParser;

impl ModuleParser {
    /// 创建解析器
    pub fn new() -> Self {
        Self
    }

    /// 从文件解析清单
    ///
    /// `.json` 扩展名按 JSON 解析，其余按 YAML 解析。
    pub async fn parse_file(path: &Path) -> Result<ModuleManifest> {
        let content = tokio::fs::read_to_string(path).await?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        if is_json {
            let manifest: ModuleManifest = serde_json::from_str(&content)?;
            Self::validate(&manifest)?;
            Ok(manifest)
        } else {
            Self::parse_str(&content)
        }
    }

    /// 从字符串解析清单（YAML，JSON 作为 YAML 的子集同样可以解析）
    pub fn parse_str(content: &str) -> Result<ModuleManifest> {
        let manifest: ModuleManifest = serde_yaml::from_str(content)
            .map_err(|e| CoreError::InvalidDefinition(format!("清单格式错误: {}", e)))?;
        Self::validate(&manifest)?;
        Ok(manifest)
    }

    /// 校验清单
    ///
    /// 收集全部问题后一次性返回 `InvalidDefinition`。
    pub fn validate(manifest: &ModuleManifest) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // 1. 必填字段与 ID 格式
        if manifest.id.is_empty() {
            errors.push("模块 ID 不能为空".to_string());
        } else if !Self::is_valid_module_id(&manifest.id) {
            errors.push(format!(
                "模块 ID '{}' 格式无效，只允许字母、数字、下划线和连字符",
                manifest.id
            ));
        }

        if manifest.name.trim().is_empty() {
            errors.push("模块名称不能为空".to_string());
        }

        // 2. 版本号
        if manifest.version.is_empty() {
            errors.push("模块版本号不能为空".to_string());
        } else if semver::Version::parse(&manifest.version).is_err() {
            errors.push(format!(
                "无效的版本号格式 '{}', 请使用 semver 格式 (如 1.0.0)",
                manifest.version
            ));
        }

        // 3. 分类
        if let Some(category) = &manifest.category {
            if let Err(e) = category.parse::<ModuleCategory>() {
                errors.push(e.to_string());
            }
        }

        // 4. 依赖
        for (index, dep) in manifest.dependencies.iter().enumerate() {
            if !Self::is_valid_module_id(dep) {
                errors.push(format!("第 {} 个依赖的模块 ID '{}' 无效", index + 1, dep));
            } else if dep == &manifest.id {
                errors.push("模块不能依赖自身".to_string());
            }
        }

        // 5. 能力名称
        for capability in &manifest.provides {
            if !Self::is_valid_capability(capability) {
                errors.push(format!(
                    "无效的能力名称格式: '{}', 推荐使用 domain.action 格式",
                    capability
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidDefinition(errors.join("; ")))
        }
    }

    /// 字母开头，只包含字母、数字、下划线和连字符
    fn is_valid_module_id(id: &str) -> bool {
        let mut chars = id.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            }
            _ => false,
        }
    }

    /// `domain.action` 或简单名称
    fn is_valid_capability(capability: &str) -> bool {
        !capability.is_empty() && capability.split('.').all(Self::is_valid_identifier)
    }

    fn is_valid_identifier(s: &str) -> bool {
        let mut chars = s.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::metadata::{factory, ModuleInstance};

    fn noop_factory() -> ModuleFactory {
        factory(|ctx| async move { Ok(ModuleInstance::new(ctx.module_id, "测试", "1.0.0")) })
    }

    #[test]
    fn test_parse_yaml_manifest() {
        let yaml = r#"
id: "video-card"
name: "视频卡片"
version: "1.2.3"
category: plugin
description: "支持视频卡片的编辑和渲染"
dependencies:
  - "video-decoder"
provides:
  - "video.edit"
  - "video.render"
"#;

        let manifest = ModuleParser::parse_str(yaml).unwrap();
        assert_eq!(manifest.id, "video-card");
        assert_eq!(manifest.category.as_deref(), Some("plugin"));
        assert_eq!(manifest.dependencies, vec!["video-decoder"]);

        let def = manifest.into_definition(noop_factory()).unwrap();
        assert_eq!(def.category, Some(ModuleCategory::Plugin));
        assert_eq!(def.provides.len(), 2);
        assert_eq!(def.description, "支持视频卡片的编辑和渲染");
    }

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest = ModuleParser::parse_str("id: core\nname: Core\nversion: 0.1.0\n").unwrap();
        assert!(manifest.category.is_none());
        assert!(manifest.dependencies.is_empty());
    }

    #[test]
    fn test_parse_json_as_yaml() {
        let json = r#"{"id": "storage", "name": "存储", "version": "2.0.0", "provides": ["kv"]}"#;
        let manifest = ModuleParser::parse_str(json).unwrap();
        assert_eq!(manifest.provides, vec!["kv"]);
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut manifest = ModuleManifest::new("1bad", "", "v1");
        manifest.category = Some("widget".into());
        manifest.provides.push("a..b".into());

        let err = ModuleParser::validate(&manifest).unwrap_err();
        assert_eq!(err.kind().as_str(), "LOAD_ERROR");
        let msg = err.to_string();
        assert!(msg.contains("格式无效"));
        assert!(msg.contains("模块名称不能为空"));
        assert!(msg.contains("无效的版本号格式"));
        assert!(msg.contains("未知的模块分类"));
        assert!(msg.contains("a..b"));
    }

    #[test]
    fn test_self_dependency_rejected() {
        let mut manifest = ModuleManifest::new("editor", "编辑器", "1.0.0");
        manifest.dependencies.push("editor".into());
        assert!(ModuleParser::validate(&manifest).is_err());
    }

    #[test]
    fn test_malformed_yaml() {
        let err = ModuleParser::parse_str("id: [unclosed").unwrap_err();
        assert!(matches!(err, CoreError::InvalidDefinition(_)));
    }

    #[test]
    fn test_identifier_rules() {
        assert!(ModuleParser::is_valid_module_id("my-module_2"));
        assert!(!ModuleParser::is_valid_module_id("-x"));
        assert!(!ModuleParser::is_valid_module_id(""));
        assert!(ModuleParser::is_valid_capability("card.create"));
        assert!(ModuleParser::is_valid_capability("_internal"));
        assert!(!ModuleParser::is_valid_capability("card."));
    }

    #[tokio::test]
    async fn test_parse_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("module.yaml");
        tokio::fs::write(&yaml_path, "id: a\nname: A\nversion: 1.0.0\n")
            .await
            .unwrap();
        assert_eq!(ModuleParser::parse_file(&yaml_path).await.unwrap().id, "a");

        let json_path = dir.path().join("module.json");
        tokio::fs::write(&json_path, r#"{"id": "b", "name": "B", "version": "1.0.0"}"#)
            .await
            .unwrap();
        assert_eq!(ModuleParser::parse_file(&json_path).await.unwrap().id, "b");

        let missing = dir.path().join("missing.yaml");
        let err = ModuleParser::parse_file(&missing).await.unwrap_err();
        assert!(matches!(err, CoreError::ConfigLoadFailed(_)));
    }
}
