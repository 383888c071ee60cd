//! # 数据模型模块
//!
//! 定义与前端 TypeScript 类型对应、并与计算服务 JSON 互转的 Rust 数据结构：
//! - `graph` - 项目图的节点、边和视图
//! - `engine` - 生成引擎目录与模型导入描述
//! - `project` - 最近打开的项目列表
//! - `backend` - 托管状态与网关请求 / 响应结构
//! - `settings` - 后端托管配置

pub mod backend;
pub mod engine;
pub mod graph;
pub mod project;
pub mod settings;
