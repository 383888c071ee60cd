//! # Tauri Command 处理模块
//!
//! 本模块包含所有注册到 Tauri 的 command 处理函数，是前端与网关之间的薄封送层。
//! 每个子模块对应一个功能域：
//! - `projects` - 项目对话框、最近项目列表、加载 / 创建项目
//! - `graph` - 项目图数据
//! - `models` - 引擎目录与模型导入
//! - `audio` - 音频文件、生成、变体、属性修改、导出
//! - `backend` - 计算服务状态与日志
//!
//! 所有错误都以 `{ kind, message, ... }` 对象返回前端。

pub mod audio;
pub mod backend;
pub mod graph;
pub mod models;
pub mod projects;
