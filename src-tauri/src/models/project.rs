//! # 最近项目列表数据模型
//!
//! 最近打开的项目路径列表：最新的在最前，按路径去重，最多保留 10 条。
//! 只能通过 [`RecentProjects::add`] / [`RecentProjects::remove`] 修改。
//!
//! 对应前端 TypeScript 类型：`string[]`

use serde::{Deserialize, Serialize};

/// 最近项目列表的最大长度
pub const MAX_RECENT_PROJECTS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentProjects(Vec<String>);

impl RecentProjects {
    /// 从持久化数据恢复，顺带修复去重和长度约束（文件可能被手工编辑过）
    pub fn from_paths(paths: Vec<String>) -> Self {
        let mut list = RecentProjects::default();
        for path in paths.into_iter().rev() {
            list.add(path);
        }
        list
    }

    /// 把路径移动到最前面
    pub fn add(&mut self, path: String) {
        self.0.retain(|p| *p != path);
        self.0.insert(0, path);
        self.0.truncate(MAX_RECENT_PROJECTS);
    }

    /// 移除所有与 `path` 相同的条目，不存在时不做任何事
    ///
    /// 返回是否有条目被移除。
    pub fn remove(&mut self, path: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|p| p != path);
        self.0.len() != before
    }

    pub fn paths(&self) -> &[String] {
        &self.0
    }

    pub fn into_paths(self) -> Vec<String> {
        self.0
    }
}
