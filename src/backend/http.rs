//! HTTP 实现：经边缘代理访问 Agent 后端与剧本服务，经 REST 访问文档存储
//!
//! base URL 每次调用时从设置中读取当前环境，切换环境后下一次调用即生效。
//! 非 2xx 一律视为失败（BackendError::Status）。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::backend::{is_global_entry, AgentBackend, DocumentStore, ScriptService};
use crate::core::BackendError;
use crate::memory::SettingsStore;
use crate::models::{
    ConversationRequest, ConversationResponse, Environment, PaymentApprovalMessage, ScriptDocument,
};

fn build_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

/// base 与 path 拼接，去掉多余的斜杠
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// 非 2xx 转为 Status 错误，附带响应体便于排查
async fn check_status(resp: Response) -> Result<Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, BackendError> {
    let resp = check_status(resp).await?;
    resp.json::<T>()
        .await
        .map_err(|e| BackendError::Decode(e.to_string()))
}

/// Agent 后端 + 剧本服务（同一个边缘代理）
pub struct HttpBackend {
    client: Client,
    endpoints: HashMap<Environment, String>,
    settings: Arc<SettingsStore>,
}

impl HttpBackend {
    pub fn new(
        endpoints: HashMap<Environment, String>,
        timeout_secs: u64,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self {
            client: build_client(timeout_secs),
            endpoints,
            settings,
        }
    }

    fn base_url(&self) -> Result<&str, BackendError> {
        let environment = self.settings.environment();
        self.endpoints
            .get(&environment)
            .map(String::as_str)
            .ok_or_else(|| BackendError::UnconfiguredEnvironment(environment.to_string()))
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, BackendError> {
        let url = join_url(self.base_url()?, path);
        tracing::debug!(url = %url, "POST");
        let resp = self.client.post(&url).json(body).send().await?;
        Ok(resp)
    }
}

#[async_trait]
impl AgentBackend for HttpBackend {
    async fn converse(
        &self,
        request: &ConversationRequest,
    ) -> Result<ConversationResponse, BackendError> {
        let resp = self
            .post("agent/converse", &json!({ "request": request }))
            .await?;
        read_json(resp).await
    }

    async fn approve_payment(
        &self,
        message: &PaymentApprovalMessage,
    ) -> Result<ConversationResponse, BackendError> {
        let resp = self
            .post("agent/approvePayment", &json!({ "message": message }))
            .await?;
        read_json(resp).await
    }
}

#[async_trait]
impl ScriptService for HttpBackend {
    async fn get_script(&self, movie_id: &str) -> Result<ScriptDocument, BackendError> {
        let resp = self
            .post("movies/getScript", &json!({ "movieId": movie_id }))
            .await?;
        let body = check_status(resp).await?.text().await?;
        // 空响应视为空剧本
        if body.trim().is_empty() {
            return Ok(ScriptDocument::default());
        }
        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

/// REST 文档存储：GET {base}/{collection}/{id}，GET {base}/{collection}?is_global=true
pub struct HttpDocumentStore {
    client: Client,
    base_url: Option<String>,
}

impl HttpDocumentStore {
    pub fn new(base_url: Option<String>, timeout_secs: u64) -> Self {
        Self {
            client: build_client(timeout_secs),
            base_url,
        }
    }

    fn url(&self, path: &str) -> Result<String, BackendError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| BackendError::Transport("document store base_url not configured".into()))?;
        Ok(join_url(base, path))
    }
}

/// 查询结果可能是数组，也可能包在 {"documents": [...]} 里
pub(crate) fn documents_from_body(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("documents") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, BackendError> {
        let url = self.url(&format!("{}/{}", collection, id))?;
        tracing::debug!(url = %url, "GET document");
        let resp = self.client.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let doc: Value = read_json(resp).await?;
        Ok(if doc.is_null() { None } else { Some(doc) })
    }

    async fn query_global(&self, collection: &str) -> Result<Vec<Value>, BackendError> {
        let url = self.url(collection)?;
        tracing::debug!(url = %url, "GET global catalog");
        let resp = self
            .client
            .get(&url)
            .query(&[("is_global", "true")])
            .send()
            .await?;
        let body = check_status(resp).await?.text().await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let body: Value =
            serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))?;
        // 服务端可能忽略过滤参数，本地再筛一遍
        Ok(documents_from_body(body)
            .into_iter()
            .filter(is_global_entry)
            .collect())
    }
}
