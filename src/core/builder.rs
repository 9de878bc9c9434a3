//! 组件装配：设置、剧本缓存、元素数据源、解析器、编排器
//!
//! 设置与缓存在进程启动时构造一次，以 Arc 传给各使用方。
//! 离线模式或显式注入 Mock 时不发网络请求。

use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::{AgentBackend, DocumentStore, HttpBackend, HttpDocumentStore, MockBackend, ScriptService};
use crate::config::{load_config, AppConfig};
use crate::core::{ConversationOrchestrator, HarnessError, PendingChangesLocation};
use crate::elements::{GlobalCatalogSource, LocalScriptSource, TaggableElementResolver};
use crate::memory::{ScriptCache, SettingsStore};

/// 装配好的测试台
pub struct Harness {
    pub config: AppConfig,
    pub settings: Arc<SettingsStore>,
    pub cache: Arc<ScriptCache>,
    pub resolver: TaggableElementResolver,
    pub orchestrator: ConversationOrchestrator,
}

pub struct HarnessBuilder {
    config: AppConfig,
    settings: Option<Arc<SettingsStore>>,
    backend: Option<Arc<dyn AgentBackend>>,
    scripts: Option<Arc<dyn ScriptService>>,
    documents: Option<Arc<dyn DocumentStore>>,
}

impl HarnessBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            settings: None,
            backend: None,
            scripts: None,
            documents: None,
        }
    }

    /// 指定设置存储（默认从 <data_dir>/<app name>.json 打开）
    pub fn with_settings(mut self, settings: Arc<SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn AgentBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_script_service(mut self, scripts: Arc<dyn ScriptService>) -> Self {
        self.scripts = Some(scripts);
        self
    }

    pub fn with_document_store(mut self, documents: Arc<dyn DocumentStore>) -> Self {
        self.documents = Some(documents);
        self
    }

    /// 三个协作方都用同一个 Mock
    pub fn with_mock(self, mock: Arc<MockBackend>) -> Self {
        self.with_backend(mock.clone())
            .with_script_service(mock.clone())
            .with_document_store(mock)
    }

    pub fn build(self) -> Harness {
        let HarnessBuilder {
            config,
            settings,
            backend,
            scripts,
            documents,
        } = self;

        let settings = settings
            .unwrap_or_else(|| Arc::new(SettingsStore::open(config.app.settings_path())));

        let offline = config.backend.offline.then(|| {
            tracing::warn!("Offline mode, using Mock backend");
            Arc::new(MockBackend::new())
        });

        // Agent 后端与剧本服务走同一个边缘代理
        let http = Arc::new(HttpBackend::new(
            config.backend.endpoints(),
            config.backend.timeout_secs,
            settings.clone(),
        ));

        let backend: Arc<dyn AgentBackend> = match (backend, &offline) {
            (Some(b), _) => b,
            (None, Some(mock)) => mock.clone(),
            (None, None) => http.clone(),
        };
        let scripts: Arc<dyn ScriptService> = match (scripts, &offline) {
            (Some(s), _) => s,
            (None, Some(mock)) => mock.clone(),
            (None, None) => http,
        };
        let documents: Arc<dyn DocumentStore> = match (documents, &offline) {
            (Some(d), _) => d,
            (None, Some(mock)) => mock.clone(),
            (None, None) => Arc::new(HttpDocumentStore::new(
                config.documents.base_url.clone(),
                config.backend.timeout_secs,
            )),
        };

        let cache = Arc::new(ScriptCache::new());
        let resolver = TaggableElementResolver::new(
            Arc::new(LocalScriptSource::new(cache.clone(), scripts.clone())),
            Arc::new(GlobalCatalogSource::new(documents.clone())),
        );
        let orchestrator = ConversationOrchestrator::new(backend, documents, scripts, cache.clone())
            .with_pending_changes_location(PendingChangesLocation {
                collection: config.documents.purchase_orders_collection.clone(),
                field: config.documents.changes_field.clone(),
            });

        Harness {
            config,
            settings,
            cache,
            resolver,
            orchestrator,
        }
    }
}

/// 加载配置并装配测试台；配置加载失败时使用默认值
pub fn create_harness(config_path: Option<PathBuf>) -> Result<Harness, HarnessError> {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Config load failed ({}), using defaults", e);
            AppConfig::default()
        }
    };
    std::fs::create_dir_all(&config.app.data_dir)?;
    Ok(HarnessBuilder::new(config).build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversationRequest, ElementKind, ScriptDocument};
    use serde_json::json;

    #[tokio::test]
    async fn test_builder_wires_shared_cache() {
        let mock = Arc::new(MockBackend::new().with_script(
            "movie-1",
            ScriptDocument::new(json!({"characters": [{"id": "c1", "name": "Ada"}]})),
        ));
        let harness = HarnessBuilder::new(AppConfig::default())
            .with_settings(Arc::new(SettingsStore::in_memory()))
            .with_mock(mock.clone())
            .build();

        let found = harness.resolver.resolve("movie-1", ElementKind::Character).await;
        assert_eq!(found.len(), 1);
        // 解析器已填充缓存，查看剧本不再请求
        harness.orchestrator.view_script("movie-1").await.unwrap();
        assert_eq!(mock.script_calls(), 1);
        assert_eq!(harness.cache.len(), 1);
    }

    #[tokio::test]
    async fn test_offline_config_uses_mock() {
        let mut config = AppConfig::default();
        config.backend.offline = true;
        let harness = HarnessBuilder::new(config)
            .with_settings(Arc::new(SettingsStore::in_memory()))
            .build();

        let resp = harness
            .orchestrator
            .send(ConversationRequest::new("ping", "m", "m", "u"))
            .await
            .unwrap();
        assert_eq!(resp.content.message, "Echo from Mock: ping");
    }
}
