//! # 项目相关 Tauri Commands
//!
//! - `open_project_dialog` / `new_project_dialog` - 原生目录选择 / 保存对话框
//! - `get_recent_projects` / `add_recent_project` / `remove_recent_project` - 最近项目列表
//! - `load_project` / `create_project` - 转发给计算服务
//! - `load_project_and_get_data` - 先加载项目，完成后再取批次视图图数据

use serde::Serialize;
use tauri::{AppHandle, State};
use tauri_plugin_dialog::{DialogExt, FilePath};
use tokio::sync::oneshot;

use crate::error::{GatewayError, StoreError};
use crate::models::backend::Ack;
use crate::models::graph::{GraphView, ViewMode};
use crate::services::gateway::RpcGateway;
use crate::services::project_store::ProjectStore;
use crate::utils::path::normalize_project_path;

/// 加载项目后一并返回的数据
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectData {
    pub message: String,
    pub graph: GraphView,
}

/// 选择已有项目目录
///
/// # 返回值
/// 用户选择的目录绝对路径；取消时返回 `None`
#[tauri::command]
pub async fn open_project_dialog(app: AppHandle) -> Result<Option<String>, String> {
    let (tx, rx) = oneshot::channel();
    app.dialog()
        .file()
        .set_title("打开项目")
        .pick_folder(move |folder| {
            let _ = tx.send(folder);
        });
    wait_for_dialog(rx).await
}

/// 选择新项目的位置和名称
///
/// 只返回路径，不创建目录；目录由 `create_project` 创建。
#[tauri::command]
pub async fn new_project_dialog(app: AppHandle) -> Result<Option<String>, String> {
    let (tx, rx) = oneshot::channel();
    app.dialog()
        .file()
        .set_title("新建项目")
        .set_file_name("untitled-project")
        .save_file(move |file| {
            let _ = tx.send(file);
        });
    wait_for_dialog(rx).await
}

/// 对话框以回调形式返回结果，这里桥接为 async
async fn wait_for_dialog(rx: oneshot::Receiver<Option<FilePath>>) -> Result<Option<String>, String> {
    let picked = rx.await.map_err(|_| "对话框已关闭".to_string())?;
    Ok(picked
        .and_then(|p| p.into_path().ok())
        .map(|p| p.to_string_lossy().to_string()))
}

#[tauri::command]
pub async fn get_recent_projects(store: State<'_, ProjectStore>) -> Result<Vec<String>, StoreError> {
    store.get_recent().await
}

/// 把项目移到最近列表最前面
///
/// # 返回值
/// 更新后的完整列表
#[tauri::command]
pub async fn add_recent_project(
    project_path: String,
    store: State<'_, ProjectStore>,
) -> Result<Vec<String>, StoreError> {
    let path = normalize_project_path(&project_path).map_err(StoreError::InvalidPath)?;
    store.add_recent(path).await
}

#[tauri::command]
pub async fn remove_recent_project(
    project_path: String,
    store: State<'_, ProjectStore>,
) -> Result<Vec<String>, StoreError> {
    // 列表中保存的是规范化后的路径，两种写法都尝试删除
    let normalized = normalize_project_path(&project_path).unwrap_or_else(|_| project_path.clone());
    if normalized != project_path {
        store.remove_recent(&project_path).await?;
    }
    store.remove_recent(&normalized).await
}

#[tauri::command]
pub async fn load_project(
    project_path: String,
    gateway: State<'_, RpcGateway>,
) -> Result<Ack, GatewayError> {
    gateway.load_project(&project_path).await
}

#[tauri::command]
pub async fn create_project(
    project_path: String,
    gateway: State<'_, RpcGateway>,
) -> Result<Ack, GatewayError> {
    gateway.create_project(&project_path).await
}

/// 加载项目并返回其批次视图
///
/// 图数据请求在加载完成之后才发出：计算服务的当前项目是全局状态，
/// 并发发出会读到上一个项目的图。
#[tauri::command]
pub async fn load_project_and_get_data(
    project_path: String,
    gateway: State<'_, RpcGateway>,
) -> Result<ProjectData, GatewayError> {
    let ack = gateway.load_project(&project_path).await?;
    let graph = gateway.get_graph_data(ViewMode::Batch).await?;
    Ok(ProjectData {
        message: ack.message,
        graph,
    })
}
