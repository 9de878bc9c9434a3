//! 元素数据源
//!
//! 本地源：读取影片剧本（经剧本缓存），取出对应类型的子列表；
//! 全局源：查询全局目录中 is_global 为 true 的条目。
//! 两者对影片类型或空的上游结果都返回空列表而不是报错。

use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::{DocumentStore, ScriptService};
use crate::core::HarnessError;
use crate::memory::ScriptCache;
use crate::models::{ElementKind, ElementRef};

/// 可标记元素的数据源
#[async_trait]
pub trait ElementSource: Send + Sync {
    /// scope_key 为影片 id；全局源忽略它
    async fn fetch(&self, scope_key: &str, kind: ElementKind)
        -> Result<Vec<ElementRef>, HarnessError>;
}

/// 本地剧本源
pub struct LocalScriptSource {
    cache: Arc<ScriptCache>,
    scripts: Arc<dyn ScriptService>,
}

impl LocalScriptSource {
    pub fn new(cache: Arc<ScriptCache>, scripts: Arc<dyn ScriptService>) -> Self {
        Self { cache, scripts }
    }
}

#[async_trait]
impl ElementSource for LocalScriptSource {
    async fn fetch(
        &self,
        scope_key: &str,
        kind: ElementKind,
    ) -> Result<Vec<ElementRef>, HarnessError> {
        if !kind.is_taggable() {
            return Ok(Vec::new());
        }
        let script = self
            .cache
            .get_or_fetch(scope_key, self.scripts.as_ref())
            .await?;
        Ok(script.elements(kind))
    }
}

/// 全局目录源
pub struct GlobalCatalogSource {
    documents: Arc<dyn DocumentStore>,
}

impl GlobalCatalogSource {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl ElementSource for GlobalCatalogSource {
    async fn fetch(
        &self,
        _scope_key: &str,
        kind: ElementKind,
    ) -> Result<Vec<ElementRef>, HarnessError> {
        let Some(collection) = kind.collection() else {
            return Ok(Vec::new());
        };
        let entries = self.documents.query_global(collection).await?;
        Ok(entries.iter().filter_map(ElementRef::from_value).collect())
    }
}
