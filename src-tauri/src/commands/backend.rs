//! # 计算服务状态 Tauri Commands

use tauri::State;

use crate::error::GatewayError;
use crate::models::backend::BackendStatus;
use crate::models::settings::BackendSettings;
use crate::services::gateway::RpcGateway;
use crate::services::supervisor::ProcessSupervisor;

/// 查询计算服务托管状态
#[tauri::command]
pub async fn get_backend_status(
    supervisor: State<'_, ProcessSupervisor>,
    settings: State<'_, BackendSettings>,
) -> Result<BackendStatus, String> {
    Ok(BackendStatus {
        state: supervisor.state(),
        pid: supervisor.pid().await,
        base_url: settings.base_url(),
        strategy: supervisor.strategy_name(),
    })
}

/// 把前端日志写入计算服务的日志
///
/// # 参数
/// - `level` - `debug` / `info` / `warning` / `error`，缺省为 `info`
#[tauri::command]
pub async fn log_message(
    message: String,
    level: Option<String>,
    gateway: State<'_, RpcGateway>,
) -> Result<(), GatewayError> {
    let level = level.unwrap_or_else(|| "info".to_string());
    gateway.log_message(&message, &level).await
}
