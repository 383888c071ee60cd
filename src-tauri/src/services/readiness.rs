//! # 就绪检测服务
//!
//! 计算服务没有专门的健康检查接口，唯一能观察到的就绪事件是它打印的
//! "监听中"日志行（Flask 的 ` * Running on http://127.0.0.1:5000`）。
//!
//! 本模块把这一脆弱的字符串匹配隔离在 [`ReadinessDetector`] 之后：
//! - `ListeningSignature` - 基于正则的默认实现，可通过配置替换模式
//! - `forward_output` - 逐行读取子进程输出，全部写入日志，并转发给检测循环
//! - `scan_for_readiness` - 在就绪行、进程退出、超时三者中等待最先发生的一个

use std::future::Future;
use std::time::Duration;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// 判断单行输出是否表示计算服务已就绪
pub trait ReadinessDetector: Send + Sync {
    fn is_ready(&self, line: &str) -> bool;
}

/// 基于正则的就绪签名
pub struct ListeningSignature {
    pattern: Regex,
}

impl ListeningSignature {
    /// 默认签名：匹配 `Running on http://...` 或 `Listening on http://...`
    pub const DEFAULT_PATTERN: &'static str = r"(?i)\b(running|listening) on https?://";

    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl Default for ListeningSignature {
    fn default() -> Self {
        Self {
            pattern: Regex::new(Self::DEFAULT_PATTERN).expect("默认就绪签名是合法正则"),
        }
    }
}

impl ReadinessDetector for ListeningSignature {
    fn is_ready(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }
}

/// 子进程输出流
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputStream::Stdout => f.write_str("stdout"),
            OutputStream::Stderr => f.write_str("stderr"),
        }
    }
}

/// 子进程输出的一行
#[derive(Debug, Clone)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

/// 持续读取子进程的一个输出流
///
/// 每一行都写入 `backend` 日志目标（无论是否已就绪），同时尽力转发给检测循环；
/// 检测循环结束、接收端被丢弃后转发静默失败，日志照常写入直到流关闭。
/// 按字节读取并做有损 UTF-8 转换，避免非法编码中断读取导致子进程管道写满阻塞。
pub fn forward_output<R>(
    reader: R,
    stream: OutputStream,
    tx: mpsc::UnboundedSender<OutputLine>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    log::info!(target: "backend", "[{}] {}", stream, text);
                    let _ = tx.send(OutputLine { stream, text });
                }
                Err(e) => {
                    log::warn!(target: "backend", "读取计算服务 {} 失败: {}", stream, e);
                    break;
                }
            }
        }
        log::debug!(target: "backend", "计算服务 {} 已关闭", stream);
    })
}

/// 就绪等待的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Ready,
    /// 进程在就绪前退出
    Exited(Option<i32>),
    TimedOut,
}

/// 等待就绪行、进程退出或超时
///
/// `exited` 在进程退出时给出退出码。所有输出流都关闭后不再读取，只等待退出或超时。
/// 进程退出时即使还有未读的就绪行也视为退出：已经退出的服务不可能处于就绪状态。
pub async fn scan_for_readiness<F>(
    lines: &mut mpsc::UnboundedReceiver<OutputLine>,
    exited: F,
    detector: &dyn ReadinessDetector,
    timeout: Duration,
) -> ScanOutcome
where
    F: Future<Output = Option<i32>>,
{
    let deadline = Instant::now() + timeout;
    tokio::pin!(exited);
    let mut streams_open = true;

    loop {
        tokio::select! {
            code = &mut exited => return ScanOutcome::Exited(code),
            line = lines.recv(), if streams_open => match line {
                Some(line) if detector.is_ready(&line.text) => {
                    log::info!("检测到就绪信号: {}", line.text);
                    return ScanOutcome::Ready;
                }
                Some(_) => {}
                None => streams_open = false,
            },
            _ = tokio::time::sleep_until(deadline) => return ScanOutcome::TimedOut,
        }
    }
}
