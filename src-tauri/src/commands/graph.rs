//! # 图数据 Tauri Commands

use tauri::State;

use crate::error::GatewayError;
use crate::models::graph::{GraphView, ViewMode};
use crate::services::gateway::RpcGateway;

/// 获取当前项目的图数据
///
/// # 参数
/// - `mode` - `"batch"` 按批次分组，`"cluster"` 按相似度聚类
#[tauri::command]
pub async fn get_graph_data(
    mode: ViewMode,
    gateway: State<'_, RpcGateway>,
) -> Result<GraphView, GatewayError> {
    gateway.get_graph_data(mode).await
}
