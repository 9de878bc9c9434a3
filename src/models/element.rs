//! 元素类型与被标记元素

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::HarnessError;

/// 元素类型（角色 / 道具 / 场景布景 / 影片本身）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    #[serde(alias = "CHARACTER")]
    Character,
    #[serde(alias = "PROP")]
    Prop,
    #[serde(alias = "SET")]
    Set,
    #[serde(alias = "MOVIE")]
    Movie,
}

impl ElementKind {
    /// 剧本文档与全局目录中对应的集合名；影片本身不是可标记的子元素，返回 None
    pub fn collection(&self) -> Option<&'static str> {
        match self {
            ElementKind::Character => Some("characters"),
            ElementKind::Prop => Some("props"),
            ElementKind::Set => Some("sets"),
            ElementKind::Movie => None,
        }
    }

    pub fn is_taggable(&self) -> bool {
        self.collection().is_some()
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Character => write!(f, "character"),
            ElementKind::Prop => write!(f, "prop"),
            ElementKind::Set => write!(f, "set"),
            ElementKind::Movie => write!(f, "movie"),
        }
    }
}

impl FromStr for ElementKind {
    type Err = HarnessError;

    /// 大小写不敏感，单复数均可（character / characters）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "character" | "characters" => Ok(ElementKind::Character),
            "prop" | "props" => Ok(ElementKind::Prop),
            "set" | "sets" => Ok(ElementKind::Set),
            "movie" | "movies" => Ok(ElementKind::Movie),
            _ => Err(HarnessError::UnknownElementKind(s.to_string())),
        }
    }
}

/// 数据源返回的最小元素引用 {id, name}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRef {
    pub id: String,
    pub name: String,
}

impl ElementRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// 从剧本或目录中的 JSON 对象提取；没有 id 的条目返回 None，缺少 name 时用 id 代替
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = match value.get("id")? {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let name = value
            .get("name")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| id.clone());
        Some(Self { id, name })
    }
}

/// 附加在对话请求上的被标记元素
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedElement {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    /// true 表示来自影片全局目录，false 表示来自本片剧本
    pub is_global: bool,
}
