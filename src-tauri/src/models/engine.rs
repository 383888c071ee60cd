//! # 生成引擎与模型描述
//!
//! 定义受支持的生成引擎目录（封闭集合）以及每个引擎要求填写的字段，
//! 前端据此渲染"导入模型"表单，网关据此在转发前做本地必填校验。
//!
//! 对应前端 TypeScript 接口：
//! ```typescript
//! interface EngineConfig { id: string; name: string; description: string; fields: EngineField[] }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GatewayError;

/// 字段输入方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// 通过文件选择器选择本地文件
    File,
    Text,
}

/// 引擎要求的单个字段
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineField {
    /// 前端表单与 `ModelDescriptor` 中使用的字段名
    pub key: &'static str,
    /// 转发给计算服务时使用的字段名
    #[serde(skip)]
    pub wire_key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    /// 文件选择器的扩展名过滤
    pub extensions: &'static [&'static str],
    pub placeholder: &'static str,
    pub required: bool,
}

/// 引擎定义
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSpec {
    pub id: &'static str,
    /// 计算服务内部使用的引擎名称
    #[serde(skip)]
    pub wire_name: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub fields: &'static [EngineField],
}

const STABLE_AUDIO_TOOLS_FIELDS: &[EngineField] = &[
    EngineField {
        key: "checkpointPath",
        wire_key: "checkpoint_path",
        label: "Checkpoint Path",
        kind: FieldKind::File,
        extensions: &["ckpt", "safetensors", "pt", "pth", "bin"],
        placeholder: "/path/to/model.ckpt",
        required: true,
    },
    EngineField {
        key: "configPath",
        wire_key: "config_path",
        label: "Config Path (model_config.json)",
        kind: FieldKind::File,
        extensions: &["json"],
        placeholder: "/path/to/model_config.json",
        required: true,
    },
];

/// 受支持的引擎目录
pub const ENGINES: &[EngineSpec] = &[
    EngineSpec {
        id: "default",
        wire_name: "default",
        name: "Default",
        description: "自动下载并使用最新版 Stable Audio Open Small（基于 Stable Audio Tools 引擎）",
        fields: &[],
    },
    EngineSpec {
        id: "stable-audio-tools",
        wire_name: "stable_audio_tools",
        name: "Stable Audio Tools",
        description: "手动选择任意基于 Stable Audio 的模型 checkpoint 和配置文件",
        fields: STABLE_AUDIO_TOOLS_FIELDS,
    },
];

/// 按 id 查找引擎
pub fn find_engine(id: &str) -> Option<&'static EngineSpec> {
    ENGINES.iter().find(|e| e.id == id)
}

/// 前端提交的模型导入描述
///
/// 引擎专有字段以扁平形式出现（如 `checkpointPath`），在 [`validate`](Self::validate)
/// 中按引擎字段表检查。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    /// 模型显示名称，为空时由计算服务自行命名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub engine: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl ModelDescriptor {
    /// 本地必填字段校验
    ///
    /// 返回对应的引擎定义，失败时携带第一个出错的字段名。
    pub fn validate(&self) -> Result<&'static EngineSpec, GatewayError> {
        let engine =
            find_engine(&self.engine).ok_or_else(|| GatewayError::Validation("engine".into()))?;

        for field in engine.fields.iter().filter(|f| f.required) {
            let filled = self
                .fields
                .get(field.key)
                .is_some_and(|v| !v.trim().is_empty());
            if !filled {
                return Err(GatewayError::Validation(field.key.to_string()));
            }
        }
        Ok(engine)
    }

    /// 构造"注册模型"请求体，字段名转换为计算服务的写法
    pub fn to_register_body(&self, engine: &EngineSpec) -> Value {
        let mut body = Map::new();
        body.insert("engine".into(), Value::String(engine.wire_name.to_string()));
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            body.insert("name".into(), Value::String(name.to_string()));
        }
        for field in engine.fields {
            if let Some(value) = self.fields.get(field.key) {
                body.insert(field.wire_key.into(), Value::String(value.trim().to_string()));
            }
        }
        Value::Object(body)
    }
}
