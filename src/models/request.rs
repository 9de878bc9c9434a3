//! 对话请求与已保存的请求模板
//!
//! 上下文类型决定子 id 是否存在：movie 不带 data，scene / shot 必须带对应的 scene_id / shot_id。

use serde::{Deserialize, Serialize};

use crate::core::HarnessError;
use crate::models::{ElementKind, TaggedElement};

/// 请求的作用域上下文（序列化为 {"type": "scene", "data": {"scene_id": ...}}）
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ConversationContext {
    #[default]
    Movie,
    Scene { scene_id: String },
    Shot { shot_id: String },
}

impl ConversationContext {
    pub fn kind(&self) -> &'static str {
        match self {
            ConversationContext::Movie => "movie",
            ConversationContext::Scene { .. } => "scene",
            ConversationContext::Shot { .. } => "shot",
        }
    }

    /// scene / shot 的子 id；movie 返回 None
    pub fn sub_id(&self) -> Option<&str> {
        match self {
            ConversationContext::Movie => None,
            ConversationContext::Scene { scene_id } => Some(scene_id),
            ConversationContext::Shot { shot_id } => Some(shot_id),
        }
    }
}

/// 发往 Agent 的一条请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRequest {
    pub message: String,
    pub element_type: ElementKind,
    pub root_element_id: String,
    pub element_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub context: ConversationContext,
    #[serde(default)]
    pub tagged_elements: Vec<TaggedElement>,
}

impl Default for ConversationRequest {
    fn default() -> Self {
        Self {
            message: String::new(),
            element_type: ElementKind::Movie,
            root_element_id: String::new(),
            element_id: String::new(),
            user_id: String::new(),
            conversation_id: None,
            context: ConversationContext::Movie,
            tagged_elements: Vec::new(),
        }
    }
}

impl ConversationRequest {
    pub fn new(
        message: impl Into<String>,
        root_element_id: impl Into<String>,
        element_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            root_element_id: root_element_id.into(),
            element_id: element_id.into(),
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context: ConversationContext) -> Self {
        self.context = context;
        self
    }

    pub fn tag(&mut self, element: TaggedElement) {
        self.tagged_elements.push(element);
    }

    /// 发送前检查必填字段，失败时不发起任何网络调用
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.message.trim().is_empty() {
            return Err(HarnessError::MissingField("message"));
        }
        if self.root_element_id.trim().is_empty() {
            return Err(HarnessError::MissingField("root_element_id"));
        }
        if self.element_id.trim().is_empty() {
            return Err(HarnessError::MissingField("element_id"));
        }
        if self.user_id.trim().is_empty() {
            return Err(HarnessError::MissingField("user_id"));
        }
        match &self.context {
            ConversationContext::Scene { scene_id } if scene_id.trim().is_empty() => {
                Err(HarnessError::MissingField("scene_id"))
            }
            ConversationContext::Shot { shot_id } if shot_id.trim().is_empty() => {
                Err(HarnessError::MissingField("shot_id"))
            }
            _ => Ok(()),
        }
    }
}

/// 用户命名保存的完整请求快照；名字不去重，按名查找取最后一个
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedRequestTemplate {
    pub name: String,
    #[serde(flatten)]
    pub request: ConversationRequest,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filled() -> ConversationRequest {
        ConversationRequest::new("rewrite act two", "movie-1", "movie-1", "user-1")
    }

    #[test]
    fn test_context_wire_shape() {
        let req = filled().with_context(ConversationContext::Scene {
            scene_id: "s-4".into(),
        });
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["context"], json!({"type": "scene", "data": {"scene_id": "s-4"}}));
        assert_eq!(v["element_type"], json!("movie"));
        assert!(v.get("conversation_id").is_none());

        let movie = serde_json::to_value(filled()).unwrap();
        assert_eq!(movie["context"], json!({"type": "movie"}));
    }

    #[test]
    fn test_validate_requires_sub_id_for_scene() {
        let req = filled().with_context(ConversationContext::Scene {
            scene_id: "  ".into(),
        });
        assert!(matches!(req.validate(), Err(HarnessError::MissingField("scene_id"))));
        assert!(filled().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_user() {
        let mut req = filled();
        req.user_id.clear();
        assert!(matches!(req.validate(), Err(HarnessError::MissingField("user_id"))));
    }

    #[test]
    fn test_saved_template_flattens_request() {
        let saved = SavedRequestTemplate {
            name: "smoke".into(),
            request: filled(),
        };
        let v = serde_json::to_value(&saved).unwrap();
        assert_eq!(v["name"], json!("smoke"));
        assert_eq!(v["message"], json!("rewrite act two"));
        let back: SavedRequestTemplate = serde_json::from_value(v).unwrap();
        assert_eq!(back, saved);
    }
}
