//! # 业务逻辑服务模块
//!
//! 计算服务托管与网关的核心实现，与 Tauri command 层解耦：
//! - `readiness` - 就绪检测：逐行扫描子进程输出，匹配"监听中"签名
//! - `launch` - 启动配置解析与启动策略（日志扫描 / 固定等待）
//! - `supervisor` - 进程托管：状态机、意外退出监控、优雅停止
//! - `transport` - 到计算服务的本地 HTTP 传输
//! - `gateway` - 具名操作网关：就绪检查、本地校验、统一错误转换
//! - `project_store` - 最近项目列表持久化

pub mod gateway;
pub mod launch;
pub mod project_store;
pub mod readiness;
pub mod supervisor;
pub mod transport;
