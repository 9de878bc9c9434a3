//! 对话编排器
//!
//! 两段式追加：先同步追加用户条目（乐观），网络调用结束后再追加 Agent 条目。
//! 传输失败不会抛给调用方，而是追加一条合成的错误回复（type=error，花费 0），不自动重试。
//! 审批缺少 conversation_id / root_element_id / user_id / payment_request_id 时直接拒绝，不发请求也不写记录。

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{watch, RwLock};

use crate::backend::{AgentBackend, DocumentStore, ScriptService};
use crate::core::{HarnessError, OrchestratorPhase};
use crate::memory::{ConversationMessage, ScriptCache, Transcript};
use crate::models::{
    ConversationRequest, ConversationResponse, PaymentApprovalMessage, ScriptDocument,
};

/// 审批所需的寻址信息（来自当前表单）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApprovalContext {
    pub root_element_id: String,
    pub user_id: String,
}

impl ApprovalContext {
    pub fn new(root_element_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            root_element_id: root_element_id.into(),
            user_id: user_id.into(),
        }
    }

    pub fn from_request(request: &ConversationRequest) -> Self {
        Self::new(request.root_element_id.clone(), request.user_id.clone())
    }
}

/// 付款请求对应的待定剧本改动
#[derive(Debug, Clone, PartialEq)]
pub enum PendingChanges {
    /// 文档不存在、字段缺失或内容无法解析
    Unavailable,
    /// 文档存在但内容为空：审批后才会生成
    Pending,
    Ready(Value),
}

/// 待定改动所在的集合与字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChangesLocation {
    pub collection: String,
    pub field: String,
}

impl Default for PendingChangesLocation {
    fn default() -> Self {
        Self {
            collection: "purchase_orders".to_string(),
            field: "data".to_string(),
        }
    }
}

pub struct ConversationOrchestrator {
    backend: Arc<dyn AgentBackend>,
    documents: Arc<dyn DocumentStore>,
    scripts: Arc<dyn ScriptService>,
    cache: Arc<ScriptCache>,
    pending_changes: PendingChangesLocation,
    transcript: RwLock<Transcript>,
    phase_tx: watch::Sender<OrchestratorPhase>,
    in_flight: AtomicUsize,
    generation: AtomicU64,
}

/// 在途计数守卫：第一个进入时切到 Sending，最后一个离开时回到 Idle
struct InFlight<'a> {
    orchestrator: &'a ConversationOrchestrator,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.orchestrator.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.orchestrator.phase_tx.send_replace(OrchestratorPhase::Idle);
        }
    }
}

impl ConversationOrchestrator {
    pub fn new(
        backend: Arc<dyn AgentBackend>,
        documents: Arc<dyn DocumentStore>,
        scripts: Arc<dyn ScriptService>,
        cache: Arc<ScriptCache>,
    ) -> Self {
        let (phase_tx, _) = watch::channel(OrchestratorPhase::Idle);
        Self {
            backend,
            documents,
            scripts,
            cache,
            pending_changes: PendingChangesLocation::default(),
            transcript: RwLock::new(Transcript::new()),
            phase_tx,
            in_flight: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
        }
    }

    pub fn with_pending_changes_location(mut self, location: PendingChangesLocation) -> Self {
        self.pending_changes = location;
        self
    }

    pub fn phase(&self) -> OrchestratorPhase {
        *self.phase_tx.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<OrchestratorPhase> {
        self.phase_tx.subscribe()
    }

    /// 对话记录快照
    pub async fn transcript(&self) -> Vec<ConversationMessage> {
        self.transcript.read().await.entries().to_vec()
    }

    pub async fn transcript_len(&self) -> usize {
        self.transcript.read().await.len()
    }

    /// 最近一条付款请求（供「批准」操作使用）
    pub async fn last_payment_request(&self) -> Option<ConversationResponse> {
        self.transcript.read().await.last_payment_request().cloned()
    }

    fn begin(&self) -> InFlight<'_> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
            self.phase_tx.send_replace(OrchestratorPhase::Sending);
        }
        InFlight { orchestrator: self }
    }

    async fn append(&self, entry: ConversationMessage) {
        self.transcript.write().await.push(entry);
    }

    /// 发送一条请求；网络失败时返回（并记录）合成的错误回复
    pub async fn send(
        &self,
        request: ConversationRequest,
    ) -> Result<ConversationResponse, HarnessError> {
        request.validate()?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.append(ConversationMessage::user_request(request.clone()))
            .await;
        let _in_flight = self.begin();

        tracing::debug!(generation, root_element_id = %request.root_element_id, "converse");
        let response = match self.backend.converse(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(generation, "Converse failed: {}", e);
                ConversationResponse::synthetic_error(&e.reason())
            }
        };

        let latest = self.generation.load(Ordering::SeqCst);
        if generation < latest {
            tracing::warn!(generation, latest, "response arrived after a newer request was sent");
        }

        self.append(ConversationMessage::agent_response(response.clone()))
            .await;
        Ok(response)
    }

    /// 批准付款请求；缺字段时返回 MissingField，不发请求、不写记录
    pub async fn approve(
        &self,
        response: &ConversationResponse,
        context: &ApprovalContext,
    ) -> Result<ConversationResponse, HarnessError> {
        let message = match approval_message(response, context) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!("Missing required fields for payment approval: {}", e);
                return Err(e);
            }
        };

        self.append(ConversationMessage::user_approval(message.clone()))
            .await;
        let _in_flight = self.begin();

        tracing::debug!(payment_request_id = %message.payment_request_id, "approve payment");
        let result = match self.backend.approve_payment(&message).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(payment_request_id = %message.payment_request_id, "Approve payment failed: {}", e);
                ConversationResponse::synthetic_error(&e.reason())
            }
        };

        self.append(ConversationMessage::agent_response(result.clone()))
            .await;
        Ok(result)
    }

    /// 查询付款请求对应的待定改动；任何失败都降级为 Unavailable
    pub async fn fetch_pending_changes(&self, payment_request_id: &str) -> PendingChanges {
        let location = &self.pending_changes;
        match self
            .documents
            .get_document(&location.collection, payment_request_id)
            .await
        {
            Ok(Some(doc)) => interpret_changes(doc.get(&location.field)),
            Ok(None) => {
                tracing::info!(payment_request_id = %payment_request_id, "no pending changes document");
                PendingChanges::Unavailable
            }
            Err(e) => {
                tracing::warn!(payment_request_id = %payment_request_id, "Failed to load pending changes: {}", e);
                PendingChanges::Unavailable
            }
        }
    }

    /// 查看剧本（经缓存）
    pub async fn view_script(&self, movie_id: &str) -> Result<ScriptDocument, HarnessError> {
        if movie_id.trim().is_empty() {
            return Err(HarnessError::MissingField("element_id"));
        }
        let script = self
            .cache
            .get_or_fetch(movie_id, self.scripts.as_ref())
            .await?;
        Ok(script)
    }
}

fn approval_message(
    response: &ConversationResponse,
    context: &ApprovalContext,
) -> Result<PaymentApprovalMessage, HarnessError> {
    let payment_request_id = response
        .payment_request_id()
        .ok_or(HarnessError::MissingField("payment_request_id"))?;
    if response.conversation_id.trim().is_empty() {
        return Err(HarnessError::MissingField("conversation_id"));
    }
    if context.root_element_id.trim().is_empty() {
        return Err(HarnessError::MissingField("root_element_id"));
    }
    if context.user_id.trim().is_empty() {
        return Err(HarnessError::MissingField("user_id"));
    }
    Ok(PaymentApprovalMessage::approve(
        response.conversation_id.clone(),
        context.root_element_id.clone(),
        payment_request_id,
        context.user_id.clone(),
    ))
}

/// 字段缺失 / null => Unavailable；空字符串 => Pending；JSON 字符串 => 解析；已是结构化值 => 原样
fn interpret_changes(field: Option<&Value>) -> PendingChanges {
    match field {
        None | Some(Value::Null) => PendingChanges::Unavailable,
        Some(Value::String(s)) if s.is_empty() => PendingChanges::Pending,
        Some(Value::String(s)) => match serde_json::from_str(s) {
            Ok(parsed) => PendingChanges::Ready(parsed),
            Err(e) => {
                tracing::warn!("Failed to parse pending changes: {}", e);
                PendingChanges::Unavailable
            }
        },
        Some(other) => PendingChanges::Ready(other.clone()),
    }
}
