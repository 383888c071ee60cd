//! # 模型相关 Tauri Commands
//!
//! - `list_engines` - 支持的生成引擎及其字段表，前端据此渲染导入表单
//! - `import_model` - 本地校验后注册模型

use tauri::State;

use crate::error::GatewayError;
use crate::models::backend::Ack;
use crate::models::engine::{ENGINES, EngineSpec, ModelDescriptor};
use crate::services::gateway::RpcGateway;

#[tauri::command]
pub fn list_engines() -> &'static [EngineSpec] {
    ENGINES
}

#[tauri::command]
pub async fn import_model(
    descriptor: ModelDescriptor,
    gateway: State<'_, RpcGateway>,
) -> Result<Ack, GatewayError> {
    gateway.import_model(&descriptor).await
}
