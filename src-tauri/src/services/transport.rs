//! # 计算服务传输层
//!
//! 把"发一个请求、拿回状态码和完整响应体"抽象为 [`Transport`] trait：
//! - `HttpTransport` - 基于 reqwest 的本地 HTTP 实现
//! - 测试中使用记录调用次数的桩实现，验证未就绪时不发出任何请求
//!
//! 传输层不解释状态码，也不解析响应体，这些都由网关统一处理。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// 发往计算服务的请求
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub method: Method,
    /// 路径段，发送时逐段做百分号编码（文件名中可能含空格等字符）
    pub segments: Vec<String>,
    /// JSON 请求体
    pub body: Option<Value>,
    /// 覆盖默认超时（生成类请求耗时较长）
    pub timeout: Option<Duration>,
}

impl BackendRequest {
    pub fn get(route: &str) -> Self {
        Self {
            method: Method::Get,
            segments: vec![route.to_string()],
            body: None,
            timeout: None,
        }
    }

    pub fn post(route: &str, body: Value) -> Self {
        Self {
            method: Method::Post,
            segments: vec![route.to_string()],
            body: Some(body),
            timeout: None,
        }
    }

    /// 追加一个路径段
    pub fn segment(mut self, segment: &str) -> Self {
        self.segments.push(segment.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 用于日志的路径，如 `/audio-path/clip.wav`
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// 计算服务的响应，响应体已完整读取
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    pub status: u16,
    pub body: String,
}

impl BackendResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 一次本地网络往返
///
/// 只有网络层失败（连接失败、超时、响应体读取中断）才返回 `Err`；
/// 任何状态码都作为 `Ok` 返回，由调用方判断。
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: BackendRequest) -> Result<BackendResponse, String>;
}

/// 基于 reqwest 的 HTTP 传输
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpTransport {
    /// # 参数
    /// - `base_url` - 计算服务根地址，如 `http://127.0.0.1:5000`
    /// - `timeout` - 默认请求超时
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, String> {
        let base_url =
            reqwest::Url::parse(base_url).map_err(|e| format!("计算服务地址无效 {}: {}", base_url, e))?;
        if base_url.cannot_be_a_base() {
            return Err(format!("计算服务地址无效: {}", base_url));
        }

        // 本地服务不走系统代理，否则 HTTP(S)_PROXY 环境变量会把请求发到代理上
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| format!("创建 HTTP 客户端失败: {}", e))?;

        Ok(Self { client, base_url })
    }

    fn url_for(&self, request: &BackendRequest) -> reqwest::Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(request.segments.iter());
        }
        url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: BackendRequest) -> Result<BackendResponse, String> {
        let url = self.url_for(&request);
        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| format!("请求 {} 失败: {}", request.path(), e))?;
        let status = response.status().as_u16();
        // 必须完整读取响应体，中途断开视为传输失败而不是成功
        let body = response
            .text()
            .await
            .map_err(|e| format!("读取 {} 响应体失败: {}", request.path(), e))?;

        Ok(BackendResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_request_path() {
        let request = BackendRequest::get("audio-path").segment("clip 1.wav");
        assert_eq!(request.path(), "/audio-path/clip 1.wav");
        assert_eq!(request.method, Method::Get);
    }

    #[test]
    fn test_url_encodes_segments() {
        let transport = HttpTransport::new("http://127.0.0.1:5000", Duration::from_secs(1)).unwrap();
        let url = transport.url_for(&BackendRequest::get("audio-path").segment("my clip#1.wav"));
        assert_eq!(url.as_str(), "http://127.0.0.1:5000/audio-path/my%20clip%231.wav");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpTransport::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_round_trip_against_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let body = r#"{"error": "No project loaded"}"#;
            let response = format!(
                "HTTP/1.1 400 BAD REQUEST\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            request
        });

        let transport = HttpTransport::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap();
        let response = transport.send(BackendRequest::get("graph")).await.unwrap();
        assert_eq!(response.status, 400);
        assert!(!response.is_success());
        assert!(response.body.contains("No project loaded"));

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /graph HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_error() {
        // 绑定后立即释放，得到一个大概率无人监听的端口
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let transport =
            HttpTransport::new(&format!("http://127.0.0.1:{}", port), Duration::from_secs(2)).unwrap();
        assert!(transport.send(BackendRequest::get("graph")).await.is_err());
    }
}
