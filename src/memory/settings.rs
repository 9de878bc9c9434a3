//! 设置存储：环境选择、已保存的请求模板、X-Ray 开关
//!
//! 读操作同步返回内存中的当前值；写操作同步更新内存，再在后台任务中写盘（尽力而为，失败只记日志）。
//! 磁盘格式带版本号：{"version": 1, "state": {...}}。文件缺失用默认值；无法解析或版本不符时告警并重置为默认值。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::core::HarnessError;
use crate::models::{ConversationRequest, Environment, SavedRequestTemplate};

/// 当前磁盘格式版本
pub const SETTINGS_SCHEMA_VERSION: u32 = 1;

/// 设置内容
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsState {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub saved_requests: Vec<SavedRequestTemplate>,
    #[serde(default)]
    pub x_ray_mode: bool,
}

#[derive(Serialize, Deserialize)]
struct PersistedSettings {
    version: u32,
    state: SettingsState,
}

/// 设置文件；last_written 记录已落盘的修订号，旧修订的写入直接跳过
#[derive(Debug)]
struct SettingsFile {
    path: PathBuf,
    last_written: Mutex<u64>,
}

impl SettingsFile {
    fn encode(state: SettingsState) -> Result<String, HarnessError> {
        let persisted = PersistedSettings {
            version: SETTINGS_SCHEMA_VERSION,
            state,
        };
        Ok(serde_json::to_string_pretty(&persisted)?)
    }

    async fn write(&self, revision: u64, state: SettingsState) -> Result<(), HarnessError> {
        let mut last = self.last_written.lock().await;
        if revision <= *last {
            return Ok(());
        }
        let body = Self::encode(state)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, body).await?;
        *last = revision;
        Ok(())
    }

    /// 没有 tokio 运行时时使用（如同步测试或进程退出前）
    fn write_blocking(&self, revision: u64, state: SettingsState) -> Result<(), HarnessError> {
        let mut last = self.last_written.blocking_lock();
        if revision <= *last {
            return Ok(());
        }
        let body = Self::encode(state)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, body)?;
        *last = revision;
        Ok(())
    }
}

/// 进程启动时构造一次，按引用传给各使用方
#[derive(Debug)]
pub struct SettingsStore {
    state: RwLock<SettingsState>,
    revision: AtomicU64,
    file: Option<Arc<SettingsFile>>,
}

impl SettingsStore {
    /// 不落盘的存储
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(SettingsState::default()),
            revision: AtomicU64::new(0),
            file: None,
        }
    }

    /// 从 JSON 文件加载；文件不存在时使用默认值
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = load_state(&path);
        Self {
            state: RwLock::new(state),
            revision: AtomicU64::new(0),
            file: Some(Arc::new(SettingsFile {
                path,
                last_written: Mutex::new(0),
            })),
        }
    }

    pub fn snapshot(&self) -> SettingsState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn environment(&self) -> Environment {
        self.state.read().unwrap_or_else(|e| e.into_inner()).environment
    }

    pub fn set_environment(&self, environment: Environment) {
        self.update(|s| s.environment = environment);
        tracing::info!(environment = %environment, "backend environment selected");
    }

    pub fn saved_requests(&self) -> Vec<SavedRequestTemplate> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .saved_requests
            .clone()
    }

    /// 只追加：不去重，同名也会新增一条
    pub fn add_saved_request(&self, request: ConversationRequest, name: impl Into<String>) {
        let template = SavedRequestTemplate {
            name: name.into(),
            request,
        };
        self.update(|s| s.saved_requests.push(template));
    }

    /// 按名查找，同名取最后保存的那一条
    pub fn saved_request(&self, name: &str) -> Option<SavedRequestTemplate> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .saved_requests
            .iter()
            .rev()
            .find(|t| t.name == name)
            .cloned()
    }

    pub fn x_ray_mode(&self) -> bool {
        self.state.read().unwrap_or_else(|e| e.into_inner()).x_ray_mode
    }

    /// 翻转 X-Ray 开关，返回新值
    pub fn toggle_x_ray_mode(&self) -> bool {
        let mut enabled = false;
        self.update(|s| {
            s.x_ray_mode = !s.x_ray_mode;
            enabled = s.x_ray_mode;
        });
        enabled
    }

    /// 立即把当前状态写盘并等待完成
    pub async fn flush(&self) -> Result<(), HarnessError> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let (revision, state) = self.current();
        file.write(revision, state).await
    }

    fn current(&self) -> (u64, SettingsState) {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        (self.revision.load(Ordering::SeqCst), state.clone())
    }

    /// 在写锁内修改状态并分配修订号，保证修订号与快照一一对应
    fn update(&self, f: impl FnOnce(&mut SettingsState)) {
        let (revision, snapshot) = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            f(&mut state);
            let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
            (revision, state.clone())
        };
        self.persist(revision, snapshot);
    }

    fn persist(&self, revision: u64, snapshot: SettingsState) {
        let Some(file) = self.file.clone() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = file.write(revision, snapshot).await {
                        tracing::warn!(path = %file.path.display(), "Failed to persist settings: {}", e);
                    }
                });
            }
            Err(_) => {
                if let Err(e) = file.write_blocking(revision, snapshot) {
                    tracing::warn!(path = %file.path.display(), "Failed to persist settings: {}", e);
                }
            }
        }
    }
}

fn load_state(path: &Path) -> SettingsState {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return SettingsState::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), "Settings unreadable ({}), using defaults", e);
            return SettingsState::default();
        }
    };
    match serde_json::from_str::<PersistedSettings>(&data) {
        Ok(p) if p.version == SETTINGS_SCHEMA_VERSION => p.state,
        Ok(p) => {
            tracing::warn!(
                path = %path.display(),
                version = p.version,
                "Unsupported settings version, resetting to defaults"
            );
            SettingsState::default()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "Settings corrupt ({}), resetting to defaults", e);
            SettingsState::default()
        }
    }
}
