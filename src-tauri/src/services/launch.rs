//! # 计算服务启动配置与启动策略
//!
//! ## 启动配置解析
//! 计算服务的可执行文件、入口脚本和工作目录取决于构建模式与平台：
//!
//! | 构建模式 | 程序 | 参数 | 工作目录 |
//! |---------|------|------|---------|
//! | Development | `python`（Windows）/ `python3` | `backend/app.py` | 开发根目录 |
//! | Packaged | `<资源目录>/backend/stemma-backend[.exe]` | 无 | 可执行文件所在目录 |
//!
//! [`resolve_launch_spec`] 是 (模式, 平台, 根目录) 的纯函数；
//! 配置文件中的 `backendProgram` / `backendArgs` / `backendDir` 可以覆盖解析结果。
//!
//! ## 启动策略
//! 两种策略实现同一个 [`LaunchStrategy`] trait，由 [`strategy_kind`] 按 (平台, 模式) 选择：
//! - `LogScanLaunch` - 主路径：重定向输出流，逐行扫描就绪信号
//! - `GraceDelayLaunch` - 降级路径：服务运行在独立的控制台窗口中，日志无法读取，
//!   固定等待一段时间后只要进程仍存活就视为就绪

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::error::LaunchError;
use crate::models::settings::BackendSettings;
use crate::services::readiness::{
    self, ListeningSignature, OutputStream, ReadinessDetector, ScanOutcome,
};

/// 构建模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Development,
    Packaged,
}

impl BuildMode {
    /// 调试构建视为开发模式，与 Tauri 的 devUrl / frontendDist 切换规则一致
    pub fn current() -> Self {
        if cfg!(debug_assertions) {
            BuildMode::Development
        } else {
            BuildMode::Packaged
        }
    }
}

/// 宿主平台
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }
}

/// 启动配置解析所需的根目录
#[derive(Debug, Clone)]
pub struct LaunchRoots {
    /// 开发模式下的仓库根目录（包含 `backend/app.py`）
    pub dev_root: PathBuf,
    /// 打包后的资源目录（包含 `backend/stemma-backend`）
    pub resource_dir: PathBuf,
}

/// 一次启动所需的全部参数
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub envs: Vec<(String, String)>,
}

/// 根据构建模式和平台解析启动配置（纯函数）
pub fn resolve_launch_spec(
    mode: BuildMode,
    platform: Platform,
    roots: &LaunchRoots,
    host: &str,
    port: u16,
) -> LaunchSpec {
    let envs = vec![
        // 管道输出时 Python 默认块缓冲，就绪行会被延迟到缓冲区满才出现
        ("PYTHONUNBUFFERED".to_string(), "1".to_string()),
        ("STEMMA_HOST".to_string(), host.to_string()),
        ("STEMMA_PORT".to_string(), port.to_string()),
    ];

    match mode {
        BuildMode::Development => {
            let interpreter = match platform {
                Platform::Windows => "python",
                Platform::MacOs | Platform::Linux => "python3",
            };
            LaunchSpec {
                program: PathBuf::from(interpreter),
                args: vec![Path::new("backend")
                    .join("app.py")
                    .to_string_lossy()
                    .to_string()],
                working_dir: roots.dev_root.clone(),
                envs,
            }
        }
        BuildMode::Packaged => {
            let executable = match platform {
                Platform::Windows => "stemma-backend.exe",
                Platform::MacOs | Platform::Linux => "stemma-backend",
            };
            let backend_dir = roots.resource_dir.join("backend");
            LaunchSpec {
                program: backend_dir.join(executable),
                args: vec![],
                working_dir: backend_dir,
                envs,
            }
        }
    }
}

impl LaunchSpec {
    /// 应用配置文件中的覆盖项
    pub fn with_overrides(mut self, settings: &BackendSettings) -> Self {
        if let Some(program) = &settings.backend_program {
            self.program = PathBuf::from(program);
            self.args = settings.backend_args.clone().unwrap_or_default();
        }
        if let Some(dir) = &settings.backend_dir {
            self.working_dir = PathBuf::from(dir);
        }
        self
    }

    /// 用于日志的命令行描述
    pub fn describe(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().to_string()];
        parts.extend(self.args.iter().cloned());
        format!("{} (cwd: {})", parts.join(" "), self.working_dir.display())
    }

    /// 构造基础命令：工作目录、环境变量、关闭 stdin、句柄丢弃时结束进程
    ///
    /// Unix 上子进程放入独立进程组，停止时整组发送信号，
    /// 连带结束 Flask 调试重载器派生的子进程。
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(&self.working_dir)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        command
    }
}

/// 启动策略种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    LogScan,
    GraceDelay,
}

/// 按 (平台, 模式) 选择启动策略（纯函数）
///
/// Windows 开发模式下计算服务运行在独立的控制台窗口中，方便开发者直接查看输出，
/// 此时日志无法捕获，只能使用固定等待。
pub fn strategy_kind(platform: Platform, mode: BuildMode) -> StrategyKind {
    match (platform, mode) {
        (Platform::Windows, BuildMode::Development) => StrategyKind::GraceDelay,
        _ => StrategyKind::LogScan,
    }
}

/// 根据配置构造启动策略
pub fn build_strategy(kind: StrategyKind, settings: &BackendSettings) -> Box<dyn LaunchStrategy> {
    match kind {
        StrategyKind::LogScan => {
            let detector = match settings.readiness_pattern.as_deref() {
                Some(pattern) => ListeningSignature::new(pattern).unwrap_or_else(|e| {
                    log::warn!("就绪信号正则无效，使用默认签名: {}", e);
                    ListeningSignature::default()
                }),
                None => ListeningSignature::default(),
            };
            Box::new(LogScanLaunch::new(Arc::new(detector), settings.launch_timeout()))
        }
        StrategyKind::GraceDelay => Box::new(GraceDelayLaunch::new(settings.grace_delay())),
    }
}

/// 启动计算服务并等待其就绪
///
/// 成功时返回已就绪的子进程句柄；失败时实现负责结束自己创建的进程，不得泄漏。
#[async_trait]
pub trait LaunchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn launch(&self, spec: &LaunchSpec) -> Result<Child, LaunchError>;
}

/// 主路径：扫描输出流中的就绪信号
pub struct LogScanLaunch {
    detector: Arc<dyn ReadinessDetector>,
    timeout: Duration,
}

impl LogScanLaunch {
    pub fn new(detector: Arc<dyn ReadinessDetector>, timeout: Duration) -> Self {
        Self { detector, timeout }
    }
}

#[async_trait]
impl LaunchStrategy for LogScanLaunch {
    fn name(&self) -> &'static str {
        "log-scan"
    }

    async fn launch(&self, spec: &LaunchSpec) -> Result<Child, LaunchError> {
        let mut command = spec.command();
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        #[cfg(target_os = "windows")]
        {
            // CREATE_NO_WINDOW: 发布版以 GUI 子系统运行，避免为控制台子进程弹出窗口
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = command
            .spawn()
            .map_err(|e| LaunchError::SpawnFailed(format!("{}: {}", spec.describe(), e)))?;
        log::info!("计算服务进程已创建 pid={:?}", child.id());

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            readiness::forward_output(stdout, OutputStream::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            readiness::forward_output(stderr, OutputStream::Stderr, tx);
        }

        let outcome = readiness::scan_for_readiness(
            &mut rx,
            exit_code(&mut child),
            self.detector.as_ref(),
            self.timeout,
        )
        .await;

        match outcome {
            ScanOutcome::Ready => Ok(child),
            ScanOutcome::Exited(code) => Err(LaunchError::ExitedEarly(code)),
            ScanOutcome::TimedOut => {
                log::warn!("等待就绪信号超时，结束计算服务进程");
                force_kill(&mut child).await;
                Err(LaunchError::Timeout(self.timeout))
            }
        }
    }
}

/// 降级路径：固定等待后检查进程是否存活
pub struct GraceDelayLaunch {
    grace: Duration,
}

impl GraceDelayLaunch {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }
}

#[async_trait]
impl LaunchStrategy for GraceDelayLaunch {
    fn name(&self) -> &'static str {
        "grace-delay"
    }

    async fn launch(&self, spec: &LaunchSpec) -> Result<Child, LaunchError> {
        let mut command = host_command(spec);
        let mut child = command
            .spawn()
            .map_err(|e| LaunchError::SpawnFailed(format!("{}: {}", spec.describe(), e)))?;
        log::info!(
            "计算服务进程已创建 pid={:?}，等待 {}s 后视为就绪",
            child.id(),
            self.grace.as_secs_f32()
        );

        tokio::select! {
            code = exit_code(&mut child) => Err(LaunchError::ExitedEarly(code)),
            _ = tokio::time::sleep(self.grace) => Ok(child),
        }
    }
}

/// 降级策略的宿主命令
///
/// Windows 上用 `cmd /k` 在新控制台窗口中运行计算服务，服务崩溃后窗口仍保留输出；
/// 其他平台直接继承宿主的输出流。
fn host_command(spec: &LaunchSpec) -> Command {
    #[cfg(target_os = "windows")]
    {
        // CREATE_NEW_CONSOLE: 为子进程分配一个全新的控制台窗口
        const CREATE_NEW_CONSOLE: u32 = 0x00000010;

        let mut parts = vec![format!("\"{}\"", spec.program.display())];
        parts.extend(spec.args.iter().map(|a| format!("\"{}\"", a)));

        // 使用 .raw_arg() 传递命令（而非 .args()），
        // 避免 Rust 的 MSVC 风格参数转义与 cmd.exe 的引号解析规则冲突。
        let mut command = Command::new("cmd");
        command
            .raw_arg(format!("/k {}", parts.join(" ")))
            .current_dir(&spec.working_dir)
            .envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .creation_flags(CREATE_NEW_CONSOLE)
            .kill_on_drop(true);
        command
    }

    #[cfg(not(target_os = "windows"))]
    {
        let mut command = spec.command();
        command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        command
    }
}

/// 等待进程退出并取出退出码；被信号终止时为 `None`
pub(crate) async fn exit_code(child: &mut Child) -> Option<i32> {
    match child.wait().await {
        Ok(status) => status.code(),
        Err(e) => {
            log::warn!("等待计算服务进程失败: {}", e);
            None
        }
    }
}

/// 请求进程（及其子进程）自行退出
///
/// - **Unix**: 向整个进程组发送 SIGTERM
/// - **Windows**: `taskkill /T`（不带 /F），控制台程序可能拒绝，由强制结束兜底
pub(crate) async fn request_graceful_exit(pid: u32) {
    #[cfg(unix)]
    let result = Command::new("kill")
        .args(["-TERM", "--", &format!("-{}", pid)])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    #[cfg(windows)]
    let result = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match result {
        Ok(status) if status.success() => log::debug!("已向计算服务 pid={} 发送退出请求", pid),
        Ok(status) => log::debug!("退出请求未被接受 pid={}: {}", pid, status),
        Err(e) => log::warn!("发送退出请求失败 pid={}: {}", pid, e),
    }
}

/// 强制结束进程（及其子进程）
pub(crate) async fn force_kill(child: &mut Child) {
    if let Some(pid) = child.id() {
        #[cfg(unix)]
        let _ = Command::new("kill")
            .args(["-KILL", "--", &format!("-{}", pid)])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        #[cfg(windows)]
        let _ = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
    }

    if let Err(e) = child.kill().await {
        log::error!("强制结束计算服务失败: {}", e);
    }
}
