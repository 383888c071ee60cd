//! # 通用工具函数
//!
//! - `path` - 配置目录与项目路径处理
//! - `mime` - 音频扩展名到 MIME 类型的映射

pub mod mime;
pub mod path;
