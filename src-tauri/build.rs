//! # StemmA2A 桌面外壳 - Tauri Cargo 构建脚本
//!
//! 在编译主项目之前由 Cargo 自动执行，生成 Tauri 运行时所需的资源绑定代码，
//! 并处理 `tauri.conf.json`、权限清单和应用图标。

fn main() {
  tauri_build::build()
}
