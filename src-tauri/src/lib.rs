//! # StemmA2A - Tauri 应用核心初始化模块
//!
//! 本模块负责 Tauri 应用的完整初始化流程，包括：
//! - 注册 Tauri 官方插件（日志、对话框、Opener）
//! - 读取计算服务配置，启动计算服务并等待其就绪
//! - 注册应用全局状态（进程托管器、网关、最近项目存储）
//! - 就绪后才创建主窗口；应用退出时停止计算服务
//!
//! ## 架构说明
//! 通过将核心逻辑放在 `lib.rs` 而非 `main.rs` 中，
//! Tauri 可以在桌面端（`main.rs`）和移动端入口之间共享此初始化代码。
//!
//! ## 模块结构
//! - `commands/` - Tauri command 处理函数（IPC 接口层）
//! - `models/` - 数据模型（对应前端 TypeScript 类型）
//! - `services/` - 核心逻辑（进程托管、就绪检测、网关、持久化）
//! - `utils/` - 通用工具函数

mod commands;
mod error;
mod models;
mod services;
mod utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tauri::{Manager, RunEvent, WebviewUrl, WebviewWindowBuilder};

use models::settings::{BACKEND_CONFIG_FILE, BackendSettings};
use services::gateway::RpcGateway;
use services::launch::{
    BuildMode, LaunchRoots, Platform, build_strategy, resolve_launch_spec, strategy_kind,
};
use services::project_store::ProjectStore;
use services::supervisor::ProcessSupervisor;
use services::transport::HttpTransport;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
/// Tauri 应用启动函数
///
/// 1. 注册插件和所有自定义 commands
/// 2. 在 `setup` 钩子中加载配置、注册日志插件、启动计算服务
/// 3. 计算服务就绪后注册全局状态并创建主窗口
/// 4. 运行事件循环，在 `RunEvent::Exit` 时停止计算服务
///
/// 计算服务启动失败对整个会话是致命的：记录日志、输出到 stderr 后以非零退出码结束，
/// 不会打开一个连接不上后端的窗口。
pub fn run() {
    let builder = tauri::Builder::default()
        // 对话框插件：打开 / 新建项目时的原生目录选择器
        .plugin(tauri_plugin_dialog::init())
        // Opener 插件：在系统文件管理器中定位音频文件
        .plugin(tauri_plugin_opener::init())
        .invoke_handler(tauri::generate_handler![
            // 项目 commands
            commands::projects::open_project_dialog,
            commands::projects::new_project_dialog,
            commands::projects::get_recent_projects,
            commands::projects::add_recent_project,
            commands::projects::remove_recent_project,
            commands::projects::load_project,
            commands::projects::create_project,
            commands::projects::load_project_and_get_data,
            // 图数据 commands
            commands::graph::get_graph_data,
            // 模型 commands
            commands::models::list_engines,
            commands::models::import_model,
            // 音频 commands
            commands::audio::get_audio_file,
            commands::audio::get_audio_info,
            commands::audio::resolve_audio_path,
            commands::audio::reveal_audio_file,
            commands::audio::generate_audio,
            commands::audio::create_variation,
            commands::audio::update_element,
            commands::audio::add_external_source,
            commands::audio::rescan_source,
            commands::audio::export_audio,
            // 计算服务 commands
            commands::backend::get_backend_status,
            commands::backend::log_message,
        ])
        .setup(|app| {
            let config_dir = match app.path().app_config_dir() {
                Ok(dir) => dir,
                Err(_) => utils::path::fallback_config_dir()?,
            };
            let loaded = tauri::async_runtime::block_on(BackendSettings::try_load(
                &config_dir.join(BACKEND_CONFIG_FILE),
            ));
            let settings = loaded.clone().unwrap_or_default();

            app.handle().plugin(
                tauri_plugin_log::Builder::new()
                    .level(settings.level_filter())
                    .build(),
            )?;
            // 配置加载早于日志插件，加载失败的警告在这里补记
            if let Err(e) = &loaded {
                log::warn!("{}，使用默认配置", e);
            }
            log::info!("配置目录: {}", config_dir.display());

            let mode = BuildMode::current();
            let platform = Platform::current();
            let roots = LaunchRoots {
                dev_root: dev_root(),
                resource_dir: app
                    .path()
                    .resource_dir()
                    .unwrap_or_else(|_| PathBuf::from(".")),
            };
            let spec = resolve_launch_spec(mode, platform, &roots, &settings.host, settings.port)
                .with_overrides(&settings);
            let strategy = build_strategy(strategy_kind(platform, mode), &settings);
            let supervisor = ProcessSupervisor::new(spec, strategy, settings.stop_grace());
            // 传输层在启动前构造：地址无效时不会留下已启动的计算服务
            let transport = HttpTransport::new(&settings.base_url(), settings.request_timeout())?;

            tauri::async_runtime::block_on(supervisor.start())?;
            log::info!("计算服务已就绪: {}", settings.base_url());

            let gateway = RpcGateway::new(
                Arc::new(transport),
                supervisor.subscribe(),
                settings.generation_timeout(),
            );

            app.manage(gateway);
            app.manage(supervisor);
            app.manage(ProjectStore::new(&config_dir));
            app.manage(settings);

            // 从这里开始的任何失败都要先停止计算服务，run() 随后会以 exit(1) 结束进程
            let window = WebviewWindowBuilder::new(app, "main", WebviewUrl::default())
                .title("StemmA2A")
                .inner_size(1400.0, 900.0)
                .min_inner_size(1000.0, 700.0)
                .build();
            let supervisor = app.state::<ProcessSupervisor>();
            tauri::async_runtime::block_on(supervisor.stop_on_error(window))?;
            Ok(())
        });

    let app = match builder.build(tauri::generate_context!()) {
        Ok(app) => app,
        Err(e) => {
            log::error!("应用启动失败: {}", e);
            eprintln!("StemmA2A 启动失败: {}", e);
            std::process::exit(1);
        }
    };

    app.run(|handle, event| {
        if let RunEvent::Exit = event {
            if let Some(supervisor) = handle.try_state::<ProcessSupervisor>() {
                log::info!("应用退出，停止计算服务");
                tauri::async_runtime::block_on(supervisor.stop());
            }
        }
    });
}

/// 开发模式下的仓库根目录（`src-tauri` 的上一级）
fn dev_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .unwrap_or(manifest_dir)
        .to_path_buf()
}
