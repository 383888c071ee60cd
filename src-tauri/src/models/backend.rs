//! # 计算服务请求 / 响应数据模型
//!
//! 定义托管状态机的状态，以及网关各操作与前端之间传递的请求和结果结构。
//! 请求结构使用 camelCase 与前端交互，转发给计算服务时改用其 snake_case 写法。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 计算服务托管状态
///
/// ```text
/// NotStarted → Starting → Ready → Stopped
///                  └────→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendState {
    NotStarted,
    Starting,
    Ready,
    Stopped,
    Failed,
}

impl BackendState {
    pub fn is_ready(self) -> bool {
        self == BackendState::Ready
    }
}

/// 前端查询的托管状态快照
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatus {
    pub state: BackendState,
    pub pid: Option<u32>,
    pub base_url: String,
    /// 实际使用的启动策略名称
    pub strategy: &'static str,
}

/// 计算服务通用的确认响应：`{ "message": "...", "success": true }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: String,
}

/// 生成 / 变体完成后的响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    #[serde(default)]
    pub message: String,
    #[serde(alias = "samples_generated", default)]
    pub samples_generated: u32,
}

/// 文本生成请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
}

/// 基于已有音频的变体请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationRequest {
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    /// 噪声强度 0.0–1.0，边上的 strength = 1 - noise_level
    #[serde(default = "default_noise_level")]
    pub noise_level: f64,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

fn default_steps() -> u32 {
    100
}

fn default_batch_size() -> u32 {
    4
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_chunk_size() -> u32 {
    32768
}

fn default_noise_level() -> f64 {
    0.7
}

impl GenerateRequest {
    pub fn to_wire(&self) -> Value {
        let mut body = Map::new();
        body.insert("model_name".into(), self.model_name.clone().into());
        if let Some(prompt) = &self.prompt {
            body.insert("prompt".into(), prompt.clone().into());
        }
        body.insert("steps".into(), self.steps.into());
        body.insert("batch_size".into(), self.batch_size.into());
        if let Some(seed) = self.seed {
            body.insert("seed".into(), seed.into());
        }
        body.insert("sample_rate".into(), self.sample_rate.into());
        body.insert("chunk_size".into(), self.chunk_size.into());
        Value::Object(body)
    }
}

impl VariationRequest {
    pub fn to_wire(&self) -> Value {
        let mut body = Map::new();
        body.insert("source_name".into(), self.source_name.clone().into());
        if let Some(model) = &self.model_name {
            body.insert("model_name".into(), model.clone().into());
        }
        body.insert("noise_level".into(), self.noise_level.into());
        body.insert("steps".into(), self.steps.into());
        body.insert("batch_size".into(), self.batch_size.into());
        if let Some(seed) = self.seed {
            body.insert("seed".into(), seed.into());
        }
        Value::Object(body)
    }
}

/// 导出完成后的响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    #[serde(default)]
    pub message: String,
    #[serde(alias = "export_path")]
    pub export_path: String,
}

/// 解析出的音频文件信息
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInfo {
    /// 计算服务解析出的绝对路径
    pub path: String,
    pub mime_type: &'static str,
}

/// 读取到本地的音频文件
///
/// 字节内容通过 `tauri::ipc::Response` 原样传给前端，不经过 JSON 序列化。
#[derive(Debug, Clone)]
pub struct AudioFile {
    pub info: AudioInfo,
    pub data: Vec<u8>,
}
