//! Mock 后端（离线运行与测试用，无需网络）
//!
//! 对话：优先返回预置回复，否则回显最后一条用户消息；审批：预置回复或固定确认文本。
//! 每类调用都有计数，设置 failure 后所有调用返回该错误。

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::backend::{is_global_entry, AgentBackend, DocumentStore, ScriptService};
use crate::core::BackendError;
use crate::models::{ConversationRequest, ConversationResponse, PaymentApprovalMessage, ScriptDocument};

pub const MOCK_CONVERSATION_ID: &str = "mock-conversation";

#[derive(Debug, Default)]
pub struct MockBackend {
    converse_calls: AtomicUsize,
    approve_calls: AtomicUsize,
    script_calls: AtomicUsize,
    document_calls: AtomicUsize,
    failure: Mutex<Option<BackendError>>,
    responses: Mutex<VecDeque<ConversationResponse>>,
    approvals: Mutex<VecDeque<ConversationResponse>>,
    scripts: Mutex<HashMap<String, ScriptDocument>>,
    documents: Mutex<HashMap<(String, String), Value>>,
    catalog: Mutex<HashMap<String, Vec<Value>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 排队一条 converse 回复
    pub fn with_response(self, response: ConversationResponse) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
        self
    }

    /// 排队一条 approve_payment 回复
    pub fn with_approval_response(self, response: ConversationResponse) -> Self {
        self.approvals
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
        self
    }

    pub fn with_script(self, movie_id: impl Into<String>, script: ScriptDocument) -> Self {
        self.scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(movie_id.into(), script);
        self
    }

    pub fn with_document(
        self,
        collection: impl Into<String>,
        id: impl Into<String>,
        document: Value,
    ) -> Self {
        self.documents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((collection.into(), id.into()), document);
        self
    }

    /// 目录条目原样保存，查询时只返回 is_global == true 的
    pub fn with_catalog(self, collection: impl Into<String>, entries: Vec<Value>) -> Self {
        self.catalog
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(collection.into(), entries);
        self
    }

    pub fn set_failure(&self, failure: Option<BackendError>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = failure;
    }

    pub fn converse_calls(&self) -> usize {
        self.converse_calls.load(Ordering::SeqCst)
    }

    pub fn approve_calls(&self) -> usize {
        self.approve_calls.load(Ordering::SeqCst)
    }

    pub fn script_calls(&self) -> usize {
        self.script_calls.load(Ordering::SeqCst)
    }

    pub fn document_calls(&self) -> usize {
        self.document_calls.load(Ordering::SeqCst)
    }

    /// 所有网络调用的总数
    pub fn total_calls(&self) -> usize {
        self.converse_calls() + self.approve_calls() + self.script_calls() + self.document_calls()
    }

    fn check_failure(&self) -> Result<(), BackendError> {
        match self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AgentBackend for MockBackend {
    async fn converse(
        &self,
        request: &ConversationRequest,
    ) -> Result<ConversationResponse, BackendError> {
        self.converse_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let queued = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        Ok(queued.unwrap_or_else(|| {
            let conversation_id = request
                .conversation_id
                .clone()
                .unwrap_or_else(|| MOCK_CONVERSATION_ID.to_string());
            ConversationResponse::message(
                conversation_id,
                format!("Echo from Mock: {}", request.message),
            )
        }))
    }

    async fn approve_payment(
        &self,
        message: &PaymentApprovalMessage,
    ) -> Result<ConversationResponse, BackendError> {
        self.approve_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let queued = self
            .approvals
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        Ok(queued.unwrap_or_else(|| {
            ConversationResponse::message(
                message.conversation_id.clone(),
                format!("Payment {} approved (mock)", message.payment_request_id),
            )
        }))
    }
}

#[async_trait]
impl ScriptService for MockBackend {
    async fn get_script(&self, movie_id: &str) -> Result<ScriptDocument, BackendError> {
        self.script_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        Ok(scripts.get(movie_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl DocumentStore for MockBackend {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, BackendError> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let documents = self.documents.lock().unwrap_or_else(|e| e.into_inner());
        Ok(documents
            .get(&(collection.to_string(), id.to_string()))
            .cloned())
    }

    async fn query_global(&self, collection: &str) -> Result<Vec<Value>, BackendError> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let catalog = self.catalog.lock().unwrap_or_else(|e| e.into_inner());
        Ok(catalog
            .get(collection)
            .map(|entries| entries.iter().filter(|e| is_global_entry(e)).cloned().collect())
            .unwrap_or_default())
    }
}
