//! # 音频相关 Tauri Commands
//!
//! 提供音频文件读取与音频图编辑的 command 处理函数：
//! - `get_audio_file` - 读取音频字节，以二进制响应返回
//! - `get_audio_info` / `resolve_audio_path` - 解析音频路径与 MIME 类型
//! - `reveal_audio_file` - 在系统文件管理器中定位音频文件
//! - `generate_audio` / `create_variation` - 生成新批次
//! - `update_element` - 修改节点属性（别名、评分等）
//! - `add_external_source` / `rescan_source` - 导入 / 重新扫描外部音频目录
//! - `export_audio` - 导出选中的音频

use serde_json::{Map, Value};
use tauri::ipc::Response;
use tauri::{AppHandle, State};
use tauri_plugin_opener::OpenerExt;

use crate::error::GatewayError;
use crate::models::backend::{
    Ack, AudioInfo, ExportResult, GenerateRequest, GenerationResult, VariationRequest,
};
use crate::services::gateway::RpcGateway;

/// 读取音频文件内容
///
/// 字节数据以原始二进制返回（前端收到 `ArrayBuffer`），避免 JSON 数组带来的体积膨胀；
/// MIME 类型通过 `get_audio_info` 获取，前端据此构造 `Blob` 播放。
#[tauri::command]
pub async fn get_audio_file(
    filename: String,
    gateway: State<'_, RpcGateway>,
) -> Result<Response, GatewayError> {
    let audio = gateway.get_audio_file(&filename).await?;
    Ok(Response::new(audio.data))
}

/// 解析音频文件的绝对路径和 MIME 类型
#[tauri::command]
pub async fn get_audio_info(
    filename: String,
    gateway: State<'_, RpcGateway>,
) -> Result<AudioInfo, GatewayError> {
    gateway.get_audio_info(&filename).await
}

#[tauri::command]
pub async fn resolve_audio_path(
    filename: String,
    gateway: State<'_, RpcGateway>,
) -> Result<String, GatewayError> {
    gateway.resolve_audio_path(&filename).await
}

/// 在文件管理器中定位音频文件
///
/// 使用 `tauri-plugin-opener` 的 OS 原生 API，避免手动拼接 shell 命令。
#[tauri::command]
pub async fn reveal_audio_file(
    filename: String,
    app: AppHandle,
    gateway: State<'_, RpcGateway>,
) -> Result<(), GatewayError> {
    let path = gateway.resolve_audio_path(&filename).await?;
    app.opener()
        .reveal_item_in_dir(&path)
        .map_err(|e| GatewayError::Io(format!("无法定位 {}: {}", path, e)))
}

#[tauri::command]
pub async fn generate_audio(
    request: GenerateRequest,
    gateway: State<'_, RpcGateway>,
) -> Result<GenerationResult, GatewayError> {
    gateway.generate(&request).await
}

#[tauri::command]
pub async fn create_variation(
    request: VariationRequest,
    gateway: State<'_, RpcGateway>,
) -> Result<GenerationResult, GatewayError> {
    gateway.create_variation(&request).await
}

#[tauri::command]
pub async fn update_element(
    name: String,
    attributes: Map<String, Value>,
    gateway: State<'_, RpcGateway>,
) -> Result<Ack, GatewayError> {
    gateway.update_element(&name, attributes).await
}

#[tauri::command]
pub async fn add_external_source(
    source_path: String,
    gateway: State<'_, RpcGateway>,
) -> Result<Ack, GatewayError> {
    gateway.add_external_source(&source_path).await
}

#[tauri::command]
pub async fn rescan_source(
    source_name: String,
    gateway: State<'_, RpcGateway>,
) -> Result<Ack, GatewayError> {
    gateway.rescan_source(&source_name).await
}

#[tauri::command]
pub async fn export_audio(
    names: Vec<String>,
    export_name: String,
    gateway: State<'_, RpcGateway>,
) -> Result<ExportResult, GatewayError> {
    gateway.export_audio(&names, &export_name).await
}
