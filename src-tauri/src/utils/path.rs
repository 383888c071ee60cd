//! # 路径工具函数
//!
//! 提供与文件路径相关的工具函数，包括：
//! - 获取应用配置目录（Tauri 路径解析器不可用时的兜底）
//! - 将前端传入的项目路径规范化为绝对路径

use std::path::{Path, PathBuf};

/// 应用标识符，与 `tauri.conf.json` 中的 `identifier` 保持一致
pub const APP_IDENTIFIER: &str = "com.stemma2a.app";

/// 获取应用配置目录的兜底路径
///
/// 正常情况下由 Tauri 的 `app.path().app_config_dir()` 提供，
/// 此函数仅在其失败时使用，规则与之相同：`<系统配置目录>/<identifier>`。
///
/// # 示例
/// - Windows: `C:\Users\username\AppData\Roaming\com.stemma2a.app`
/// - Linux: `/home/username/.config/com.stemma2a.app`
/// - macOS: `/Users/username/Library/Application Support/com.stemma2a.app`
///
/// # 错误
/// 如果无法确定系统配置目录，返回错误信息。
pub fn fallback_config_dir() -> Result<PathBuf, String> {
    let base = dirs::config_dir().ok_or_else(|| "无法获取系统配置目录".to_string())?;
    Ok(base.join(APP_IDENTIFIER))
}

/// 将项目路径规范化为绝对路径字符串
///
/// 只做词法上的处理（不要求路径存在、不解析符号链接），
/// 以便同一项目在最近列表中按字符串去重。末尾的路径分隔符会被去掉。
///
/// # 错误
/// 路径为空或无法获取当前工作目录时返回错误信息。
pub fn normalize_project_path(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("项目路径为空".to_string());
    }

    let absolute = std::path::absolute(Path::new(trimmed))
        .map_err(|e| format!("无法解析项目路径 {}: {}", trimmed, e))?;

    let mut text = absolute.to_string_lossy().to_string();
    while text.len() > 1 && text.ends_with(std::path::MAIN_SEPARATOR) && !is_root(&text) {
        text.pop();
    }
    Ok(text)
}

/// 判断路径字符串是否是根目录（`/` 或 `C:\`）
fn is_root(text: &str) -> bool {
    Path::new(text).parent().is_none()
}
