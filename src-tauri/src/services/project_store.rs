//! # 最近项目持久化
//!
//! 最近打开的项目列表保存在应用配置目录下的 `settings.json` 中，
//! 键名固定为 `recentProjects`。同一文件中的其他键原样保留。
//!
//! 写入先落到同目录的临时文件再重命名，避免写到一半时崩溃留下损坏的设置文件。
//! 已经损坏（无法解析）的设置文件会被备份为 `settings.json.corrupt`，
//! 随后按空设置处理，下一次写入即可恢复。

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::models::project::RecentProjects;

/// 设置文件名
pub const SETTINGS_FILE: &str = "settings.json";

/// 损坏设置文件的备份后缀
const CORRUPT_SUFFIX: &str = "json.corrupt";

/// 最近项目列表在设置文件中的键名
pub const RECENT_PROJECTS_KEY: &str = "recentProjects";

/// 最近项目存储
///
/// 进程内单写者：所有读改写都在同一把锁下完成。
pub struct ProjectStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ProjectStore {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            path: config_dir.join(SETTINGS_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取最近项目列表，文件不存在时为空
    pub async fn get_recent(&self) -> Result<Vec<String>, StoreError> {
        let _guard = self.lock.lock().await;
        let settings = self.read_settings().await?;
        Ok(recent_from(&settings).into_paths())
    }

    /// 把项目移到列表最前面（去重、截断到上限）
    pub async fn add_recent(&self, project_path: String) -> Result<Vec<String>, StoreError> {
        self.update(|recent| {
            recent.add(project_path);
            true
        })
        .await
    }

    /// 删除项目的所有出现，不存在时不写文件
    pub async fn remove_recent(&self, project_path: &str) -> Result<Vec<String>, StoreError> {
        self.update(|recent| recent.remove(project_path)).await
    }

    /// 读改写；`mutate` 返回 `false` 表示无变化，跳过写入
    async fn update<F>(&self, mutate: F) -> Result<Vec<String>, StoreError>
    where
        F: FnOnce(&mut RecentProjects) -> bool,
    {
        let _guard = self.lock.lock().await;
        let mut settings = self.read_settings().await?;
        let mut recent = recent_from(&settings);

        if mutate(&mut recent) {
            settings.insert(RECENT_PROJECTS_KEY.to_string(), serde_json::to_value(&recent)?);
            self.write_settings(&settings).await?;
            log::debug!("最近项目已更新: {} 项", recent.paths().len());
        }
        Ok(recent.into_paths())
    }

    async fn read_settings(&self) -> Result<Map<String, Value>, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => {
                log::warn!("{} 顶层不是对象（{}），按空设置处理", self.path.display(), other);
                Ok(Map::new())
            }
            Err(e) => {
                log::warn!("{} 无法解析（{}），按空设置处理", self.path.display(), e);
                self.backup_corrupt().await;
                Ok(Map::new())
            }
        }
    }

    /// 保留一份损坏的原文件，下一次写入会覆盖 `settings.json`
    async fn backup_corrupt(&self) {
        let backup = self.path.with_extension(CORRUPT_SUFFIX);
        match tokio::fs::copy(&self.path, &backup).await {
            Ok(_) => log::info!("损坏的设置文件已备份到 {}", backup.display()),
            Err(e) => log::warn!("备份损坏的设置文件失败 {}: {}", backup.display(), e),
        }
    }

    async fn write_settings(&self, settings: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// 从设置中取出最近项目列表；格式不对时忽略并修复
fn recent_from(settings: &Map<String, Value>) -> RecentProjects {
    let paths = settings
        .get(RECENT_PROJECTS_KEY)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    RecentProjects::from_paths(paths)
}
