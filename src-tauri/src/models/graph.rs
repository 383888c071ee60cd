//! # 项目图数据模型
//!
//! 定义网关 `get_graph_data` 返回给前端的节点 / 边结构。
//! 图数据由计算服务以 Cytoscape JSON 形式提供：
//!
//! ```json
//! { "elements": {
//!     "nodes": [ { "data": { "id": "...", "type": "audio", ... } } ],
//!     "edges": [ { "data": { "source": "...", "target": "...", "type": "dd_generation", ... } } ]
//! } }
//! ```
//!
//! 本模块只负责结构定义和校验，不包含任何布局或聚类逻辑（由计算服务完成）。

use std::collections::HashSet;

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// 图的投影方式
///
/// - `Batch` - 按生成批次分组（批次节点包含其音频子节点）
/// - `Cluster` - 按计算服务给出的相似度聚类平铺音频节点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Batch,
    Cluster,
}

/// 音频评分：1 到 5 的整数
///
/// 计算服务可能把评分写成数字或字符串（`"3"`），两种形式都接受，
/// 超出范围的值视为响应格式错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Option<Self> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Some(Rating(value as u8))
        } else {
            None
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl<'de> Deserialize<'de> for Rating {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawRating {
            Int(i64),
            Text(String),
        }

        let value = match RawRating::deserialize(deserializer)? {
            RawRating::Int(v) => v,
            RawRating::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| serde::de::Error::custom(format!("无效的评分: {}", s)))?,
        };
        Rating::new(value)
            .ok_or_else(|| serde::de::Error::custom(format!("评分超出 1-5 范围: {}", value)))
    }
}

/// 图节点
///
/// 公共字段（id、显示名、别名、创建时间）放在结构体上，
/// 类型相关字段由 `type` 字段区分的 [`NodeKind`] 承载。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// 节点标识符，计算服务可能以整数形式给出，统一转为字符串
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// 创建时间（Unix 秒）
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,

    #[serde(flatten)]
    pub kind: NodeKind,
}

/// 节点类型及其专有字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    /// 已注册的生成模型
    Model {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        engine: Option<String>,
    },
    /// 外部导入的音频来源目录
    External {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    /// 一次生成产生的批次
    Batch,
    /// 导入的音频集合
    Set,
    /// 单个音频片段
    Audio {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rating: Option<Rating>,
        /// 所属批次 / 集合节点 id；聚类视图中不存在
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
        batch_index: Option<u32>,
        #[serde(default, deserialize_with = "deserialize_tags", skip_serializing_if = "Option::is_none")]
        tags: Option<Vec<String>>,
        /// 聚类视图坐标
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tsne: Option<Vec<f64>>,
    },
}

impl GraphNode {
    /// 节点是否是分组节点（批次或集合）
    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Batch | NodeKind::Set)
    }

    /// 音频节点的所属分组
    pub fn parent(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Audio { parent, .. } => parent.as_deref(),
            _ => None,
        }
    }
}

/// 有向边
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    #[serde(deserialize_with = "deserialize_id")]
    pub source: String,

    #[serde(deserialize_with = "deserialize_id")]
    pub target: String,

    #[serde(flatten)]
    pub kind: EdgeKind,
}

/// 边类型及其元数据
///
/// 计算服务使用 `dd_generation` / `dd_variation` 的写法，这里统一输出为规范名称。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EdgeKind {
    /// 模型 → 批次
    #[serde(rename = "generation", alias = "dd_generation")]
    Generation {
        #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
        seed: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_name: Option<String>,
        #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
        steps: Option<u32>,
        #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
        batch_size: Option<u32>,
    },
    /// 模型 → 变体批次
    #[serde(rename = "variation", alias = "dd_variation")]
    Variation {
        #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
        seed: Option<i64>,
        #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
        noise_level: Option<f64>,
    },
    /// 源音频 → 变体批次，`strength = 1 - noise_level`
    #[serde(rename = "audio_source", alias = "audio-source")]
    AudioSource {
        #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
        strength: Option<f64>,
    },
    /// 外部来源 → 导入集合
    #[serde(rename = "import")]
    Import,
}

/// 某一视图模式下物化出的节点 / 边集合
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphView {
    pub mode: ViewMode,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// 边引用了视图中不存在的节点
#[derive(Debug, Error, PartialEq)]
#[error("边 {from} -> {to} 引用了不存在的节点 {missing}")]
pub struct DanglingEdge {
    pub from: String,
    pub to: String,
    pub missing: String,
}

#[derive(Deserialize)]
struct CytoscapeGraph {
    elements: CytoscapeElements,
}

#[derive(Deserialize)]
struct CytoscapeElements {
    #[serde(default)]
    nodes: Vec<CytoscapeElement<GraphNode>>,
    #[serde(default)]
    edges: Vec<CytoscapeElement<GraphEdge>>,
}

#[derive(Deserialize)]
struct CytoscapeElement<T> {
    data: T,
}

impl GraphView {
    /// 从 Cytoscape JSON 构造视图
    ///
    /// 任何一个节点或边无法解析都会使整个解析失败，不会返回部分填充的视图。
    pub fn from_cytoscape(mode: ViewMode, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let graph: CytoscapeGraph = serde_json::from_value(value)?;
        Ok(GraphView {
            mode,
            nodes: graph.elements.nodes.into_iter().map(|e| e.data).collect(),
            edges: graph.elements.edges.into_iter().map(|e| e.data).collect(),
        })
    }

    /// 校验每条边的两端都在本视图的节点集合中
    ///
    /// 网关信任计算服务，不强制执行此校验；前端或测试可以按需调用。
    pub fn validate(&self) -> Result<(), DanglingEdge> {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !ids.contains(endpoint.as_str()) {
                    return Err(DanglingEdge {
                        from: edge.source.clone(),
                        to: edge.target.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// 某个批次 / 集合节点下的音频子节点
    pub fn children_of<'a>(&'a self, group_id: &'a str) -> impl Iterator<Item = &'a GraphNode> + 'a {
        self.nodes
            .iter()
            .filter(move |n| n.parent() == Some(group_id))
    }
}

fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(i) => i.to_string(),
    })
}

/// 宽松的数值字段：接受数字或数字字符串
///
/// 计算服务在类型转换失败时会原样保留字符串，无法识别的值按缺省处理，
/// 不让单个元数据字段导致整个图解析失败。
fn lenient_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + FromStr,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(other) => serde_json::from_value(other).ok(),
    })
}

/// 标签：列表或逗号分隔的字符串，去掉首尾空白和空项
fn deserialize_tags<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<String>>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(split_tags(&text)),
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(tag) => Some(tag.trim().to_string()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .filter(|tag| !tag.is_empty())
                .collect(),
        ),
        Some(other) => Some(split_tags(&other.to_string())),
    })
}

fn split_tags(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
