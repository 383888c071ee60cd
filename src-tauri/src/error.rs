//! # 错误类型
//!
//! 后端托管与网关的类型化错误：
//! - `LaunchError` - 计算服务启动失败（对整个应用会话是致命的）
//! - `GatewayError` - 单个网关操作失败（局部、可恢复）
//! - `StoreError` - 最近项目列表持久化失败
//!
//! 所有错误都实现 `Serialize`，以 `{ kind, message, ... }` 对象的形式通过
//! Tauri IPC 传给前端，前端可以按 `kind` 分支处理，而不是解析错误字符串。

use std::time::Duration;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

/// 计算服务启动失败
#[derive(Debug, Error)]
pub enum LaunchError {
    /// 在限定时间内没有观察到就绪信号
    #[error("计算服务在 {}s 内未就绪", .0.as_secs_f32())]
    Timeout(Duration),

    /// 进程在就绪前退出；`None` 表示被信号终止、没有退出码
    #[error("计算服务在就绪前退出（退出码 {0:?}）")]
    ExitedEarly(Option<i32>),

    /// 无法创建子进程（可执行文件不存在、权限不足等）
    #[error("启动计算服务失败: {0}")]
    SpawnFailed(String),
}

/// 网关操作名称，用于标注被计算服务拒绝的请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    LoadProject,
    CreateProject,
    GetGraphData,
    ImportModel,
    ResolveAudio,
    LogMessage,
    Generate,
    Variation,
    UpdateElement,
    AddExternalSource,
    RescanSource,
    Export,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::LoadProject => "loadProject",
            Operation::CreateProject => "createProject",
            Operation::GetGraphData => "getGraphData",
            Operation::ImportModel => "importModel",
            Operation::ResolveAudio => "getAudioFile",
            Operation::LogMessage => "logMessage",
            Operation::Generate => "generateAudio",
            Operation::Variation => "createVariation",
            Operation::UpdateElement => "updateElement",
            Operation::AddExternalSource => "addExternalSource",
            Operation::RescanSource => "rescanSource",
            Operation::Export => "exportAudio",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个网关操作的失败
///
/// 任何一个操作失败都不会影响网关或托管进程的状态，调用方可以自行决定是否重试。
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 计算服务尚未就绪（或已停止），请求未被发出
    #[error("计算服务尚未就绪")]
    NotReady,

    /// 网络层失败：连接被拒绝、超时、响应体读取中断
    #[error("与计算服务通信失败: {0}")]
    Transport(String),

    /// 计算服务返回了非 2xx 状态码
    #[error("{operation} 被计算服务拒绝（HTTP {status}）: {body}")]
    Rejected {
        operation: Operation,
        status: u16,
        body: String,
    },

    /// 2xx 响应体无法按预期结构解析
    #[error("计算服务返回了无法解析的响应: {0}")]
    MalformedResponse(String),

    /// 本地校验失败，携带出错的字段名
    #[error("字段校验失败: {0}")]
    Validation(String),

    /// 项目、音频等资源不存在
    #[error("未找到: {0}")]
    NotFound(String),

    /// 本地文件系统操作失败（如创建项目目录）
    #[error("文件操作失败: {0}")]
    Io(String),

    /// 读取已解析出的音频文件失败
    #[error("读取文件 {path} 失败: {reason}")]
    Read { path: String, reason: String },
}

impl GatewayError {
    /// 前端用于分支判断的错误类别标识
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::NotReady => "notReady",
            GatewayError::Transport(_) => "transport",
            GatewayError::Rejected { .. } => "rejected",
            GatewayError::MalformedResponse(_) => "malformedResponse",
            GatewayError::Validation(_) => "validation",
            GatewayError::NotFound(_) => "notFound",
            GatewayError::Io(_) => "io",
            GatewayError::Read { .. } => "read",
        }
    }
}

impl Serialize for GatewayError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("GatewayError", 5)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        match self {
            GatewayError::Rejected {
                operation, status, ..
            } => {
                state.serialize_field("operation", operation.as_str())?;
                state.serialize_field("status", status)?;
            }
            GatewayError::Validation(field) => {
                state.serialize_field("field", field)?;
            }
            _ => {}
        }
        state.end()
    }
}

/// 最近项目列表持久化失败
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("读写最近项目列表失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("解析最近项目列表失败: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("项目路径无效: {0}")]
    InvalidPath(String),
}

impl Serialize for StoreError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let kind = match self {
            StoreError::Io(_) => "io",
            StoreError::Parse(_) => "parse",
            StoreError::InvalidPath(_) => "invalidPath",
        };
        let mut state = serializer.serialize_struct("StoreError", 2)?;
        state.serialize_field("kind", kind)?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_serializes_operation_and_status() {
        let err = GatewayError::Rejected {
            operation: Operation::LoadProject,
            status: 500,
            body: "boom".to_string(),
        };
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["kind"], "rejected");
        assert_eq!(value["operation"], "loadProject");
        assert_eq!(value["status"], 500);
    }

    #[test]
    fn test_validation_serializes_field() {
        let value = serde_json::to_value(GatewayError::Validation("checkpointPath".into())).unwrap();
        assert_eq!(value["kind"], "validation");
        assert_eq!(value["field"], "checkpointPath");
    }
}
