//! # 音频 MIME 类型映射

use std::path::Path;

/// 无法识别扩展名时使用的通用二进制类型
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// 根据文件扩展名推断 MIME 类型
///
/// 封闭映射：`.wav` / `.mp3` / `.ogg`，其余一律返回通用二进制类型，从不报错。
pub fn audio_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("ogg") => "audio/ogg",
        _ => FALLBACK_MIME,
    }
}
