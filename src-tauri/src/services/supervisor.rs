//! # 计算服务进程托管
//!
//! `ProcessSupervisor` 独占计算服务的子进程句柄（任意时刻至多一个），
//! 负责启动、就绪等待、意外退出监控和停止。
//!
//! ## 状态机
//! ```text
//! NotStarted → Starting → Ready → Stopped
//!                  └────→ Failed
//! ```
//! 状态通过 `tokio::sync::watch` 广播，网关持有接收端，在发出任何请求前检查是否为 `Ready`。
//!
//! ## 进程生命周期
//! 就绪后子进程交给一个监控任务持有：
//! - 进程意外退出：记录退出码，状态转为 `Failed`
//! - 收到停止请求：先请求进程自行退出，等待 `stop_grace`，超时后强制结束
//!
//! 停止从不返回错误，所有失败只记录日志，保证应用退出流程总能继续。

use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::LaunchError;
use crate::models::backend::BackendState;
use crate::services::launch::{self, LaunchSpec, LaunchStrategy};

/// 强制结束后等待监控任务收尾的额外时间
const KILL_SETTLE: Duration = Duration::from_secs(2);

/// 计算服务进程托管器
///
/// 通过 Tauri 的 `manage()` 注册为应用状态。
pub struct ProcessSupervisor {
    spec: LaunchSpec,
    strategy: Box<dyn LaunchStrategy>,
    stop_grace: Duration,
    state: Arc<watch::Sender<BackendState>>,
    /// 当前存活的进程；只有 `start` / `stop` 在持锁状态下修改
    process: Mutex<Option<BackendProcess>>,
}

/// 已就绪的计算服务进程
struct BackendProcess {
    pid: Option<u32>,
    stop_tx: Option<oneshot::Sender<()>>,
    monitor: JoinHandle<()>,
}

impl ProcessSupervisor {
    pub fn new(spec: LaunchSpec, strategy: Box<dyn LaunchStrategy>, stop_grace: Duration) -> Self {
        let (state, _) = watch::channel(BackendState::NotStarted);
        Self {
            spec,
            strategy,
            stop_grace,
            state: Arc::new(state),
            process: Mutex::new(None),
        }
    }

    /// 订阅状态变化，供网关做就绪检查
    pub fn subscribe(&self) -> watch::Receiver<BackendState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> BackendState {
        *self.state.borrow()
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// 当前进程 id（未运行时为 `None`）
    pub async fn pid(&self) -> Option<u32> {
        self.process.lock().await.as_ref().and_then(|p| p.pid)
    }

    /// 启动计算服务并等待就绪
    ///
    /// - 已有进程且处于 `Ready`：不做任何事
    /// - 已有进程但未就绪（如上次监控到意外退出）：先结束旧进程再重新启动
    ///
    /// 只有观察到就绪信号（或降级策略的等待结束且进程存活）才返回 `Ok`。
    pub async fn start(&self) -> Result<(), LaunchError> {
        let mut process = self.process.lock().await;

        if let Some(existing) = process.as_ref() {
            if self.state().is_ready() && !existing.monitor.is_finished() {
                log::info!("计算服务已在运行，忽略重复启动");
                return Ok(());
            }
        }
        if let Some(previous) = process.take() {
            log::info!("结束旧的计算服务进程后重新启动");
            self.shutdown(previous).await;
        }

        transition(&self.state, BackendState::Starting);
        log::info!(
            "启动计算服务（策略 {}）: {}",
            self.strategy.name(),
            self.spec.describe()
        );

        match self.strategy.launch(&self.spec).await {
            Ok(child) => {
                let pid = child.id();
                // 先标记就绪再交给监控任务，避免立即退出时 Failed 被 Ready 覆盖
                transition(&self.state, BackendState::Ready);
                let (stop_tx, stop_rx) = oneshot::channel();
                let monitor = tokio::spawn(monitor(
                    child,
                    stop_rx,
                    self.stop_grace,
                    Arc::clone(&self.state),
                ));
                *process = Some(BackendProcess {
                    pid,
                    stop_tx: Some(stop_tx),
                    monitor,
                });
                Ok(())
            }
            Err(e) => {
                log::error!("计算服务启动失败: {}", e);
                transition(&self.state, BackendState::Failed);
                Err(e)
            }
        }
    }

    /// 停止计算服务
    ///
    /// 幂等：没有存活进程时只把状态置为 `Stopped`。
    pub async fn stop(&self) {
        let mut process = self.process.lock().await;
        if let Some(running) = process.take() {
            self.shutdown(running).await;
        }
        transition(&self.state, BackendState::Stopped);
    }

    /// 就绪之后的初始化结果；失败时先停止计算服务再原样返回错误
    ///
    /// 启动失败后进程会以 `exit` 结束，析构函数不会运行，
    /// 必须在这里显式停止，否则计算服务会成为孤儿进程继续占用端口。
    pub async fn stop_on_error<T, E: std::fmt::Display>(&self, result: Result<T, E>) -> Result<T, E> {
        if let Err(e) = &result {
            log::error!("计算服务就绪后的初始化失败，停止计算服务: {}", e);
            self.stop().await;
        }
        result
    }

    /// 通知监控任务结束进程并等待其完成，总耗时有上限
    async fn shutdown(&self, mut running: BackendProcess) {
        if let Some(tx) = running.stop_tx.take() {
            let _ = tx.send(());
        }

        match tokio::time::timeout(self.stop_grace + KILL_SETTLE, &mut running.monitor).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("计算服务监控任务异常结束: {}", e),
            Err(_) => {
                // 丢弃子进程句柄会触发 kill_on_drop
                log::error!("停止计算服务超时，放弃等待");
                running.monitor.abort();
            }
        }
    }
}

/// 持有已就绪的子进程，直到它退出或收到停止请求
async fn monitor(
    mut child: Child,
    stop_rx: oneshot::Receiver<()>,
    grace: Duration,
    state: Arc<watch::Sender<BackendState>>,
) {
    tokio::select! {
        code = launch::exit_code(&mut child) => {
            log::warn!("计算服务意外退出，退出码 {:?}", code);
            transition(&state, BackendState::Failed);
        }
        // 发送端被丢弃（托管器被释放）同样视为停止请求
        _ = stop_rx => {
            terminate(&mut child, grace).await;
        }
    }
}

/// 先请求退出，超时后强制结束
async fn terminate(child: &mut Child, grace: Duration) {
    match child.id() {
        Some(pid) => launch::request_graceful_exit(pid).await,
        None => return,
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => log::info!("计算服务已退出: {}", status),
        Ok(Err(e)) => log::warn!("等待计算服务退出失败: {}", e),
        Err(_) => {
            log::warn!("计算服务未在 {}s 内退出，强制结束", grace.as_secs_f32());
            launch::force_kill(child).await;
            log::info!("计算服务已被强制结束");
        }
    }
}

fn transition(state: &watch::Sender<BackendState>, next: BackendState) {
    let previous = state.send_replace(next);
    if previous != next {
        log::info!("计算服务状态: {:?} → {:?}", previous, next);
    }
}
