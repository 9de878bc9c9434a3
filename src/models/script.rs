//! 剧本文档：结构对核心不透明，只按元素类型取出子列表

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{ElementKind, ElementRef};

/// 脚本服务返回的剧本文档（characters / props / sets 等嵌套列表）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptDocument(Value);

impl ScriptDocument {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// 取出某类元素；列表可能在顶层，也可能包在 "script" 下。
    /// 影片类型、缺失列表或非数组时返回空
    pub fn elements(&self, kind: ElementKind) -> Vec<ElementRef> {
        let Some(key) = kind.collection() else {
            return Vec::new();
        };
        let section = self
            .0
            .get(key)
            .or_else(|| self.0.get("script").and_then(|s| s.get(key)));
        match section.and_then(Value::as_array) {
            Some(items) => items.iter().filter_map(ElementRef::from_value).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_elements_by_kind() {
        let doc = ScriptDocument::new(json!({
            "characters": [{"id": "c1", "name": "Ada"}, {"id": "c2", "name": "Bo"}],
            "props": [],
            "sets": "not-a-list"
        }));
        let names: Vec<_> = doc
            .elements(ElementKind::Character)
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Ada", "Bo"]);
        assert!(doc.elements(ElementKind::Prop).is_empty());
        assert!(doc.elements(ElementKind::Set).is_empty());
        assert!(doc.elements(ElementKind::Movie).is_empty());
    }

    #[test]
    fn test_elements_nested_under_script() {
        let doc = ScriptDocument::new(json!({"script": {"props": [{"id": "p1", "name": "Lamp"}]}}));
        assert_eq!(doc.elements(ElementKind::Prop), vec![ElementRef::new("p1", "Lamp")]);
    }
}
