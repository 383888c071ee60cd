//! # 计算服务网关
//!
//! 把前端可调用的具名操作转发给计算服务的本地 HTTP 接口，并把结果统一为
//! `Result<T, GatewayError>`。
//!
//! ## 统一约定
//! - 托管状态不是 `Ready` 时立即返回 `NotReady`，不发出任何请求
//! - 本地校验（必填字段、路径存在性、评分范围）在发请求前完成
//! - 非 2xx 响应转为 `Rejected { operation, status, body }`
//! - 2xx 响应体必须能按预期结构解析，否则为 `MalformedResponse`
//!
//! 所有操作都经过同一个转发原语 [`RpcGateway::forward`]。网关本身不持有会话状态，
//! 依赖其他操作结果的调用（如先加载项目再取图数据）由调用方自行排序。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tokio::sync::watch;

use crate::error::{GatewayError, Operation};
use crate::models::backend::{
    Ack, AudioFile, AudioInfo, BackendState, ExportResult, GenerateRequest, GenerationResult,
    VariationRequest,
};
use crate::models::engine::ModelDescriptor;
use crate::models::graph::{GraphView, Rating, ViewMode};
use crate::services::transport::{BackendRequest, BackendResponse, Transport};
use crate::utils::mime::audio_mime_type;
use crate::utils::path::normalize_project_path;

/// 计算服务网关
///
/// 通过 Tauri 的 `manage()` 注册为应用状态，所有方法只需要 `&self`。
pub struct RpcGateway {
    transport: Arc<dyn Transport>,
    state: watch::Receiver<BackendState>,
    /// 生成 / 变体请求的超时，远长于普通请求
    generation_timeout: Duration,
}

/// `/audio-path/<filename>` 的响应
#[derive(Deserialize)]
struct ResolvedPath {
    path: String,
}

impl RpcGateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        state: watch::Receiver<BackendState>,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            state,
            generation_timeout,
        }
    }

    // ============ 项目 ============

    /// 让计算服务加载已有项目
    pub async fn load_project(&self, project_path: &str) -> Result<Ack, GatewayError> {
        self.ensure_ready()?;
        let path = project_dir(project_path)?;

        let is_dir = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(GatewayError::NotFound(path));
        }

        self.forward(
            Operation::LoadProject,
            BackendRequest::post("load", json!({ "project_name": path })),
        )
        .await
    }

    /// 创建项目目录（已存在则跳过），再让计算服务初始化项目
    pub async fn create_project(&self, project_path: &str) -> Result<Ack, GatewayError> {
        self.ensure_ready()?;
        let path = project_dir(project_path)?;

        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| GatewayError::Io(format!("创建项目目录 {} 失败: {}", path, e)))?;

        self.forward(
            Operation::CreateProject,
            BackendRequest::post("create", json!({ "project_name": path })),
        )
        .await
    }

    // ============ 图数据 ============

    /// 获取指定视图模式下的图数据
    pub async fn get_graph_data(&self, mode: ViewMode) -> Result<GraphView, GatewayError> {
        let route = match mode {
            ViewMode::Batch => "graph",
            ViewMode::Cluster => "graph-tsne",
        };
        let response = self
            .round_trip(Operation::GetGraphData, BackendRequest::get(route))
            .await?;
        parse_graph(mode, &response.body)
    }

    // ============ 模型 ============

    /// 校验引擎必填字段后注册模型
    pub async fn import_model(&self, descriptor: &ModelDescriptor) -> Result<Ack, GatewayError> {
        self.ensure_ready()?;
        let engine = descriptor.validate()?;

        self.forward(
            Operation::ImportModel,
            BackendRequest::post("import-model", descriptor.to_register_body(engine)),
        )
        .await
    }

    // ============ 音频 ============

    /// 让计算服务把音频文件名解析为本地绝对路径
    pub async fn resolve_audio_path(&self, filename: &str) -> Result<String, GatewayError> {
        self.ensure_ready()?;
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(GatewayError::Validation("filename".into()));
        }

        let resolved: ResolvedPath = self
            .forward(
                Operation::ResolveAudio,
                BackendRequest::get("audio-path").segment(filename),
            )
            .await?;
        Ok(resolved.path)
    }

    /// 解析路径并按扩展名确定 MIME 类型，不读取文件内容
    pub async fn get_audio_info(&self, filename: &str) -> Result<AudioInfo, GatewayError> {
        let path = self.resolve_audio_path(filename).await?;
        let mime_type = audio_mime_type(Path::new(&path));
        Ok(AudioInfo { path, mime_type })
    }

    /// 解析路径后在本地读取音频字节
    pub async fn get_audio_file(&self, filename: &str) -> Result<AudioFile, GatewayError> {
        let info = self.get_audio_info(filename).await?;

        let data = tokio::fs::read(&info.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GatewayError::NotFound(info.path.clone())
            } else {
                GatewayError::Read {
                    path: info.path.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        log::debug!("读取音频 {} ({} 字节, {})", info.path, data.len(), info.mime_type);
        Ok(AudioFile { info, data })
    }

    /// 以文本提示生成一个新批次
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerationResult, GatewayError> {
        self.ensure_ready()?;
        if request.model_name.trim().is_empty() {
            return Err(GatewayError::Validation("modelName".into()));
        }
        validate_batch(request.steps, request.batch_size)?;

        self.forward(
            Operation::Generate,
            BackendRequest::post("generate", request.to_wire()).timeout(self.generation_timeout),
        )
        .await
    }

    /// 以已有音频为源生成变体
    pub async fn create_variation(
        &self,
        request: &VariationRequest,
    ) -> Result<GenerationResult, GatewayError> {
        self.ensure_ready()?;
        if request.source_name.trim().is_empty() {
            return Err(GatewayError::Validation("sourceName".into()));
        }
        if !(0.0..=1.0).contains(&request.noise_level) {
            return Err(GatewayError::Validation("noiseLevel".into()));
        }
        validate_batch(request.steps, request.batch_size)?;

        self.forward(
            Operation::Variation,
            BackendRequest::post("variation", request.to_wire()).timeout(self.generation_timeout),
        )
        .await
    }

    /// 修改节点属性（别名、评分、标签等）
    ///
    /// `rating` 为 `null` 表示清除评分，否则必须是 1 到 5 的整数。
    pub async fn update_element(
        &self,
        name: &str,
        attributes: Map<String, Value>,
    ) -> Result<Ack, GatewayError> {
        self.ensure_ready()?;
        if name.trim().is_empty() {
            return Err(GatewayError::Validation("name".into()));
        }
        if let Some(rating) = attributes.get("rating") {
            serde_json::from_value::<Option<Rating>>(rating.clone())
                .map_err(|_| GatewayError::Validation("rating".into()))?;
        }

        self.forward(
            Operation::UpdateElement,
            BackendRequest::post(
                "update-element",
                json!({ "name": name, "attributes": attributes }),
            ),
        )
        .await
    }

    /// 把一个本地音频目录作为外部来源导入项目
    pub async fn add_external_source(&self, source_path: &str) -> Result<Ack, GatewayError> {
        self.ensure_ready()?;
        let source_path = source_path.trim();
        if source_path.is_empty() {
            return Err(GatewayError::Validation("sourcePath".into()));
        }
        let is_dir = tokio::fs::metadata(source_path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(GatewayError::NotFound(source_path.to_string()));
        }

        self.forward(
            Operation::AddExternalSource,
            BackendRequest::post("add-external-source", json!({ "source_path": source_path })),
        )
        .await
    }

    /// 重新扫描已导入的外部来源目录，把新增的音频加入项目
    pub async fn rescan_source(&self, source_name: &str) -> Result<Ack, GatewayError> {
        self.ensure_ready()?;
        let source_name = source_name.trim();
        if source_name.is_empty() {
            return Err(GatewayError::Validation("sourceName".into()));
        }

        self.forward(
            Operation::RescanSource,
            BackendRequest::post("rescan-source", json!({ "source_name": source_name })),
        )
        .await
    }

    /// 把选中的音频导出到项目的导出目录
    pub async fn export_audio(
        &self,
        names: &[String],
        export_name: &str,
    ) -> Result<ExportResult, GatewayError> {
        self.ensure_ready()?;
        if names.is_empty() {
            return Err(GatewayError::Validation("names".into()));
        }
        if export_name.trim().is_empty() {
            return Err(GatewayError::Validation("exportName".into()));
        }

        self.forward(
            Operation::Export,
            BackendRequest::post(
                "export",
                json!({ "names": names, "export_name": export_name.trim() }),
            ),
        )
        .await
    }

    // ============ 日志 ============

    /// 写入计算服务自己的日志
    pub async fn log_message(&self, message: &str, level: &str) -> Result<(), GatewayError> {
        self.round_trip(
            Operation::LogMessage,
            BackendRequest::post("log", json!({ "message": message, "level": level })),
        )
        .await
        .map(|_| ())
    }

    // ============ 转发原语 ============

    fn ensure_ready(&self) -> Result<(), GatewayError> {
        if self.state.borrow().is_ready() {
            Ok(())
        } else {
            Err(GatewayError::NotReady)
        }
    }

    /// 发出请求并把 2xx 响应体解析为 `T`
    async fn forward<T: DeserializeOwned>(
        &self,
        operation: Operation,
        request: BackendRequest,
    ) -> Result<T, GatewayError> {
        let response = self.round_trip(operation, request).await?;
        serde_json::from_str(&response.body)
            .map_err(|e| GatewayError::MalformedResponse(format!("{}: {}", operation, e)))
    }

    /// 就绪检查、发送、状态码判断；返回完整读取的 2xx 响应
    async fn round_trip(
        &self,
        operation: Operation,
        request: BackendRequest,
    ) -> Result<BackendResponse, GatewayError> {
        self.ensure_ready()?;

        let method = request.method;
        let path = request.path();
        log::debug!("{} → {} {}", operation, method, path);

        let response = self.transport.send(request).await.map_err(|e| {
            log::warn!("{} 请求失败: {}", operation, e);
            GatewayError::Transport(e)
        })?;
        log::debug!("{} ← HTTP {} ({} 字节)", operation, response.status, response.body.len());

        if response.is_success() {
            return Ok(response);
        }

        let message = error_message(&response.body);
        log::warn!("{} {} {} 被拒绝 HTTP {}: {}", operation, method, path, response.status, message);

        if response.status == 404
            && matches!(operation, Operation::LoadProject | Operation::ResolveAudio)
        {
            return Err(GatewayError::NotFound(message));
        }
        Err(GatewayError::Rejected {
            operation,
            status: response.status,
            body: message,
        })
    }
}

/// 规范化项目路径，失败时标记为 `projectPath` 字段错误
fn project_dir(raw: &str) -> Result<String, GatewayError> {
    normalize_project_path(raw).map_err(|e| {
        log::warn!("{}", e);
        GatewayError::Validation("projectPath".into())
    })
}

fn validate_batch(steps: u32, batch_size: u32) -> Result<(), GatewayError> {
    if steps == 0 {
        return Err(GatewayError::Validation("steps".into()));
    }
    if batch_size == 0 {
        return Err(GatewayError::Validation("batchSize".into()));
    }
    Ok(())
}

/// 解析 `{ "graph_data": ... }` 响应
///
/// `graph_data` 可能是对象，也可能是一段 JSON 字符串（计算服务直接透传了
/// NetworkX 的序列化结果）。没有 `graph_data` 包装时把整个响应体当作图数据。
fn parse_graph(mode: ViewMode, body: &str) -> Result<GraphView, GatewayError> {
    let malformed = |e: serde_json::Error| {
        GatewayError::MalformedResponse(format!("{}: {}", Operation::GetGraphData, e))
    };

    let envelope: Value = serde_json::from_str(body).map_err(malformed)?;
    let raw = match envelope {
        Value::Object(mut map) => match map.remove("graph_data") {
            Some(inner) => inner,
            None => Value::Object(map),
        },
        other => other,
    };
    let graph = match raw {
        Value::String(text) => serde_json::from_str(&text).map_err(malformed)?,
        other => other,
    };

    GraphView::from_cytoscape(mode, graph).map_err(malformed)
}

/// 从错误响应中提取可读信息：优先取 `{ "error": "..." }`，否则使用原始响应体
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::graph::NodeKind;
    use crate::services::transport::Method;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// 记录所有请求并按顺序返回预设响应的桩传输
    #[derive(Default)]
    struct RecordingTransport {
        calls: Mutex<Vec<BackendRequest>>,
        replies: Mutex<VecDeque<Result<BackendResponse, String>>>,
    }

    impl RecordingTransport {
        fn replying(replies: Vec<Result<BackendResponse, String>>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                replies: Mutex::new(replies.into()),
            })
        }

        fn calls(&self) -> Vec<BackendRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: BackendRequest) -> Result<BackendResponse, String> {
            self.calls.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err("no reply".to_string()))
        }
    }

    fn ok(body: Value) -> Result<BackendResponse, String> {
        Ok(BackendResponse {
            status: 200,
            body: body.to_string(),
        })
    }

    fn status(status: u16, body: &str) -> Result<BackendResponse, String> {
        Ok(BackendResponse {
            status,
            body: body.to_string(),
        })
    }

    fn gateway(
        transport: &Arc<RecordingTransport>,
        state: BackendState,
    ) -> (RpcGateway, watch::Sender<BackendState>) {
        let (tx, rx) = watch::channel(state);
        let transport: Arc<dyn Transport> = transport.clone();
        (RpcGateway::new(transport, rx, Duration::from_secs(60)), tx)
    }

    fn graph_json() -> Value {
        json!({
            "elements": {
                "nodes": [
                    { "data": { "id": "sao", "type": "model" } },
                    { "data": { "id": "batch_1", "type": "batch" } },
                    { "data": { "id": "sample_1", "type": "audio", "parent": "batch_1", "rating": 3 } }
                ],
                "edges": [
                    { "data": { "source": "sao", "target": "batch_1", "type": "dd_generation", "seed": 7 } }
                ]
            }
        })
    }

    #[tokio::test]
    async fn test_not_ready_makes_no_calls() {
        let transport = RecordingTransport::replying(vec![ok(json!({}))]);
        let dir = tempfile::tempdir().unwrap();
        let generate: GenerateRequest =
            serde_json::from_value(json!({ "modelName": "sao" })).unwrap();
        let variation: VariationRequest =
            serde_json::from_value(json!({ "sourceName": "sample_1" })).unwrap();
        for state in [
            BackendState::NotStarted,
            BackendState::Starting,
            BackendState::Stopped,
            BackendState::Failed,
        ] {
            let (gw, _tx) = gateway(&transport, state);
            assert!(matches!(gw.load_project("/tmp").await, Err(GatewayError::NotReady)));
            assert!(matches!(gw.create_project("/tmp/x").await, Err(GatewayError::NotReady)));
            assert!(matches!(
                gw.get_graph_data(ViewMode::Batch).await,
                Err(GatewayError::NotReady)
            ));
            assert!(matches!(
                gw.import_model(&ModelDescriptor::default()).await,
                Err(GatewayError::NotReady)
            ));
            assert!(matches!(gw.get_audio_file("a.wav").await, Err(GatewayError::NotReady)));
            assert!(matches!(gw.get_audio_info("a.wav").await, Err(GatewayError::NotReady)));
            assert!(matches!(
                gw.resolve_audio_path("a.wav").await,
                Err(GatewayError::NotReady)
            ));
            assert!(matches!(gw.log_message("hi", "info").await, Err(GatewayError::NotReady)));
            assert!(matches!(gw.generate(&generate).await, Err(GatewayError::NotReady)));
            assert!(matches!(
                gw.create_variation(&variation).await,
                Err(GatewayError::NotReady)
            ));
            assert!(matches!(
                gw.update_element("sample_1", Map::new()).await,
                Err(GatewayError::NotReady)
            ));
            // 目录真实存在，确认是就绪检查而不是路径检查拦下了请求
            assert!(matches!(
                gw.add_external_source(dir.path().to_str().unwrap()).await,
                Err(GatewayError::NotReady)
            ));
            assert!(matches!(gw.rescan_source("drums").await, Err(GatewayError::NotReady)));
            assert!(matches!(
                gw.export_audio(&["a".into()], "out").await,
                Err(GatewayError::NotReady)
            ));
        }
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_state_change_is_observed() {
        let transport = RecordingTransport::replying(vec![ok(json!({ "message": "ok" }))]);
        let (gw, tx) = gateway(&transport, BackendState::Starting);
        assert!(matches!(gw.log_message("a", "info").await, Err(GatewayError::NotReady)));

        tx.send_replace(BackendState::Ready);
        gw.log_message("a", "info").await.unwrap();

        tx.send_replace(BackendState::Stopped);
        assert!(matches!(gw.log_message("a", "info").await, Err(GatewayError::NotReady)));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_import_model_validates_before_sending() {
        let transport = RecordingTransport::replying(vec![]);
        let (gw, _tx) = gateway(&transport, BackendState::Ready);

        let descriptor: ModelDescriptor = serde_json::from_value(json!({
            "engine": "stable-audio-tools",
            "checkpointPath": "",
            "configPath": "/c.json"
        }))
        .unwrap();
        match gw.import_model(&descriptor).await {
            Err(GatewayError::Validation(field)) => assert_eq!(field, "checkpointPath"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_import_model_rejected() {
        let transport =
            RecordingTransport::replying(vec![status(400, r#"{"error": "Checkpoint not found"}"#)]);
        let (gw, _tx) = gateway(&transport, BackendState::Ready);

        let descriptor: ModelDescriptor = serde_json::from_value(json!({
            "engine": "stable-audio-tools",
            "name": "drums",
            "checkpointPath": "/m.ckpt",
            "configPath": "/c.json"
        }))
        .unwrap();
        match gw.import_model(&descriptor).await {
            Err(GatewayError::Rejected {
                operation,
                status,
                body,
            }) => {
                assert_eq!(operation, Operation::ImportModel);
                assert_eq!(status, 400);
                assert_eq!(body, "Checkpoint not found");
            }
            other => panic!("unexpected: {:?}", other),
        }

        let calls = transport.calls();
        assert_eq!(calls[0].path(), "/import-model");
        let body = calls[0].body.as_ref().unwrap();
        assert_eq!(body["engine"], "stable_audio_tools");
        assert_eq!(body["checkpoint_path"], "/m.ckpt");
        assert_eq!(body["config_path"], "/c.json");
    }

    #[tokio::test]
    async fn test_graph_routes_and_validity() {
        let transport = RecordingTransport::replying(vec![
            ok(json!({ "graph_data": graph_json() })),
            ok(json!({ "graph_data": graph_json().to_string() })),
        ]);
        let (gw, _tx) = gateway(&transport, BackendState::Ready);

        let batch = gw.get_graph_data(ViewMode::Batch).await.unwrap();
        assert_eq!(batch.mode, ViewMode::Batch);
        assert!(batch.validate().is_ok());
        assert_eq!(batch.children_of("batch_1").count(), 1);

        // graph_data 以字符串形式给出
        let cluster = gw.get_graph_data(ViewMode::Cluster).await.unwrap();
        assert_eq!(cluster.nodes.len(), 3);
        assert!(matches!(
            cluster.node("sample_1").map(|n| &n.kind),
            Some(NodeKind::Audio { .. })
        ));

        let paths: Vec<_> = transport.calls().iter().map(|c| c.path()).collect();
        assert_eq!(paths, ["/graph", "/graph-tsne"]);
        assert!(transport.calls().iter().all(|c| c.method == Method::Get));
    }

    #[tokio::test]
    async fn test_graph_malformed_body() {
        let transport = RecordingTransport::replying(vec![
            status(200, "<html>Internal Server Error</html>"),
            ok(json!({ "graph_data": { "elements": { "nodes": [ { "data": { "type": "audio" } } ] } } })),
            ok(json!({ "graph_data": "{not json" })),
        ]);
        let (gw, _tx) = gateway(&transport, BackendState::Ready);

        for _ in 0..3 {
            assert!(matches!(
                gw.get_graph_data(ViewMode::Batch).await,
                Err(GatewayError::MalformedResponse(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_graph_rejected_and_transport_error() {
        let transport = RecordingTransport::replying(vec![
            status(400, r#"{"error": "No project loaded"}"#),
            Err("connection refused".into()),
        ]);
        let (gw, _tx) = gateway(&transport, BackendState::Ready);

        assert!(matches!(
            gw.get_graph_data(ViewMode::Batch).await,
            Err(GatewayError::Rejected { status: 400, .. })
        ));
        assert!(matches!(
            gw.get_graph_data(ViewMode::Batch).await,
            Err(GatewayError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_load_project_checks_directory() {
        let transport = RecordingTransport::replying(vec![
            ok(json!({ "message": "Project loaded", "success": true })),
            status(500, r#"{"error": "boom"}"#),
        ]);
        let (gw, _tx) = gateway(&transport, BackendState::Ready);
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing");
        assert!(matches!(
            gw.load_project(missing.to_str().unwrap()).await,
            Err(GatewayError::NotFound(_))
        ));
        assert!(transport.calls().is_empty());

        let ack = gw.load_project(dir.path().to_str().unwrap()).await.unwrap();
        assert_eq!(ack.message, "Project loaded");
        let calls = transport.calls();
        assert_eq!(calls[0].path(), "/load");
        assert_eq!(
            calls[0].body.as_ref().unwrap()["project_name"],
            normalize_project_path(dir.path().to_str().unwrap()).unwrap()
        );

        match gw.load_project(dir.path().to_str().unwrap()).await {
            Err(GatewayError::Rejected {
                operation, status, ..
            }) => {
                assert_eq!(operation, Operation::LoadProject);
                assert_eq!(status, 500);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_project_makes_directory() {
        let transport = RecordingTransport::replying(vec![ok(json!({ "message": "Project created" }))]);
        let (gw, _tx) = gateway(&transport, BackendState::Ready);
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("songs").join("first");

        gw.create_project(project.to_str().unwrap()).await.unwrap();
        assert!(project.is_dir());
        assert_eq!(transport.calls()[0].path(), "/create");
    }

    #[tokio::test]
    async fn test_audio_file_mime_types() {
        let dir = tempfile::tempdir().unwrap();
        let mp3 = dir.path().join("clip.mp3");
        let xyz = dir.path().join("clip.xyz");
        std::fs::write(&mp3, b"ID3").unwrap();
        std::fs::write(&xyz, b"\x00\x01").unwrap();

        let transport = RecordingTransport::replying(vec![
            ok(json!({ "path": mp3.to_str().unwrap() })),
            ok(json!({ "path": xyz.to_str().unwrap() })),
        ]);
        let (gw, _tx) = gateway(&transport, BackendState::Ready);

        let audio = gw.get_audio_file("clip.mp3").await.unwrap();
        assert_eq!(audio.info.mime_type, "audio/mpeg");
        assert_eq!(audio.info.path, mp3.to_str().unwrap());
        assert_eq!(audio.data, b"ID3");

        let other = gw.get_audio_info("clip.xyz").await.unwrap();
        assert_eq!(other.mime_type, "application/octet-stream");

        assert_eq!(transport.calls()[0].segments, ["audio-path", "clip.mp3"]);
    }

    #[tokio::test]
    async fn test_audio_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone.wav");
        let transport = RecordingTransport::replying(vec![
            status(404, r#"{"error": "Audio file not found"}"#),
            ok(json!({ "path": gone.to_str().unwrap() })),
        ]);
        let (gw, _tx) = gateway(&transport, BackendState::Ready);

        assert!(matches!(gw.get_audio_file("x.wav").await, Err(GatewayError::NotFound(_))));
        assert!(matches!(gw.get_audio_file("gone.wav").await, Err(GatewayError::NotFound(_))));
        assert!(matches!(gw.get_audio_file("  ").await, Err(GatewayError::Validation(_))));
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_update_element_rating_range() {
        let transport = RecordingTransport::replying(vec![ok(json!({ "message": "updated" }))]);
        let (gw, _tx) = gateway(&transport, BackendState::Ready);

        let mut attributes = Map::new();
        attributes.insert("rating".into(), json!(7));
        match gw.update_element("sample_1", attributes).await {
            Err(GatewayError::Validation(field)) => assert_eq!(field, "rating"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(transport.calls().is_empty());

        let mut attributes = Map::new();
        attributes.insert("rating".into(), json!(5));
        attributes.insert("alias".into(), json!("kick"));
        gw.update_element("sample_1", attributes).await.unwrap();
        let body = transport.calls()[0].body.clone().unwrap();
        assert_eq!(body["name"], "sample_1");
        assert_eq!(body["attributes"]["rating"], 5);
    }

    #[tokio::test]
    async fn test_generate_uses_long_timeout_and_wire_names() {
        let transport = RecordingTransport::replying(vec![ok(json!({
            "message": "Generation completed",
            "samples_generated": 4
        }))]);
        let (gw, _tx) = gateway(&transport, BackendState::Ready);

        let request: GenerateRequest =
            serde_json::from_value(json!({ "modelName": "sao", "seed": 11 })).unwrap();
        let result = gw.generate(&request).await.unwrap();
        assert_eq!(result.samples_generated, 4);

        let call = &transport.calls()[0];
        assert_eq!(call.timeout, Some(Duration::from_secs(60)));
        assert_eq!(call.body.as_ref().unwrap()["model_name"], "sao");
    }

    #[tokio::test]
    async fn test_local_validation_of_supplemental_operations() {
        let transport = RecordingTransport::replying(vec![]);
        let (gw, _tx) = gateway(&transport, BackendState::Ready);

        let variation: VariationRequest =
            serde_json::from_value(json!({ "sourceName": "sample_1", "noiseLevel": 1.5 })).unwrap();
        assert!(matches!(
            gw.create_variation(&variation).await,
            Err(GatewayError::Validation(f)) if f == "noiseLevel"
        ));
        assert!(matches!(
            gw.export_audio(&[], "out").await,
            Err(GatewayError::Validation(f)) if f == "names"
        ));
        assert!(matches!(
            gw.add_external_source("/definitely/not/here").await,
            Err(GatewayError::NotFound(_))
        ));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rescan_source() {
        let transport = RecordingTransport::replying(vec![
            ok(json!({ "message": "Source rescanned successfully", "success": true })),
            status(500, r#"{"error": "Unknown source: drums"}"#),
        ]);
        let (gw, _tx) = gateway(&transport, BackendState::Ready);

        assert!(matches!(
            gw.rescan_source("  ").await,
            Err(GatewayError::Validation(f)) if f == "sourceName"
        ));
        assert!(transport.calls().is_empty());

        let ack = gw.rescan_source(" field-recordings ").await.unwrap();
        assert_eq!(ack.message, "Source rescanned successfully");
        let calls = transport.calls();
        assert_eq!(calls[0].path(), "/rescan-source");
        assert_eq!(calls[0].method, Method::Post);
        assert_eq!(calls[0].body.as_ref().unwrap()["source_name"], "field-recordings");

        match gw.rescan_source("drums").await {
            Err(GatewayError::Rejected {
                operation, body, ..
            }) => {
                assert_eq!(operation, Operation::RescanSource);
                assert_eq!(body, "Unknown source: drums");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_launch_leaves_gateway_unusable() {
        use crate::error::LaunchError;
        use crate::services::launch::{LaunchSpec, LogScanLaunch};
        use crate::services::readiness::ListeningSignature;
        use crate::services::supervisor::ProcessSupervisor;

        let supervisor = ProcessSupervisor::new(
            LaunchSpec {
                program: "sh".into(),
                args: vec!["-c".into(), "echo warming up; sleep 10".into()],
                working_dir: std::env::temp_dir(),
                envs: vec![],
            },
            Box::new(LogScanLaunch::new(
                Arc::new(ListeningSignature::default()),
                Duration::from_millis(500),
            )),
            Duration::from_secs(1),
        );
        let transport = RecordingTransport::replying(vec![ok(json!({}))]);
        let gw = RpcGateway::new(transport.clone(), supervisor.subscribe(), Duration::from_secs(5));

        assert!(matches!(supervisor.start().await, Err(LaunchError::Timeout(_))));
        assert!(matches!(
            gw.get_graph_data(ViewMode::Batch).await,
            Err(GatewayError::NotReady)
        ));
        assert!(transport.calls().is_empty());
    }
}
