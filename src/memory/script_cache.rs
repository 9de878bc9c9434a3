//! 剧本缓存：movie_id -> 剧本文档
//!
//! 会话内避免重复拉取；无过期、无淘汰，同一 id 并发写入时后写者胜出。

use std::collections::HashMap;
use std::sync::RwLock;

use crate::backend::ScriptService;
use crate::core::BackendError;
use crate::models::ScriptDocument;

#[derive(Debug, Default)]
pub struct ScriptCache {
    scripts: RwLock<HashMap<String, ScriptDocument>>,
}

impl ScriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, movie_id: &str) -> Option<ScriptDocument> {
        let scripts = self.scripts.read().unwrap_or_else(|e| e.into_inner());
        scripts.get(movie_id).cloned()
    }

    pub fn put(&self, movie_id: impl Into<String>, script: ScriptDocument) {
        let mut scripts = self.scripts.write().unwrap_or_else(|e| e.into_inner());
        scripts.insert(movie_id.into(), script);
    }

    /// 命中直接返回，未命中时通过脚本服务拉取并写入缓存
    pub async fn get_or_fetch(
        &self,
        movie_id: &str,
        service: &dyn ScriptService,
    ) -> Result<ScriptDocument, BackendError> {
        if let Some(script) = self.get(movie_id) {
            tracing::debug!(movie_id = %movie_id, "script cache hit");
            return Ok(script);
        }
        let script = service.get_script(movie_id).await?;
        self.put(movie_id, script.clone());
        Ok(script)
    }

    pub fn len(&self) -> usize {
        self.scripts.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
