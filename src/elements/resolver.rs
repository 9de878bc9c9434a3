//! 可标记元素解析
//!
//! 并发调用本地源与全局源，合并为一个带来源标注的列表：本地在前、全局在后，各自保持源顺序，
//! 与哪个源先完成无关。两个列表之间不去重。某个源失败时记录告警并按空列表处理。

use std::sync::Arc;

use serde::Serialize;

use crate::core::HarnessError;
use crate::elements::ElementSource;
use crate::models::{ElementKind, ElementRef, TaggedElement};

const LOCAL_PREFIX: &str = "local - ";
const GLOBAL_PREFIX: &str = "global - ";

/// 供选择的候选元素
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggableElement {
    pub id: String,
    pub name: String,
    pub kind: ElementKind,
    pub is_global: bool,
    pub display_label: String,
}

impl TaggableElement {
    fn annotate(element: ElementRef, kind: ElementKind, is_global: bool) -> Self {
        let prefix = if is_global { GLOBAL_PREFIX } else { LOCAL_PREFIX };
        Self {
            display_label: format!("{}{}", prefix, element.name),
            id: element.id,
            name: element.name,
            kind,
            is_global,
        }
    }

    /// 用户确认选择后挂到请求上的形式
    pub fn to_tagged(&self) -> TaggedElement {
        TaggedElement {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind,
            is_global: self.is_global,
        }
    }
}

pub struct TaggableElementResolver {
    local: Arc<dyn ElementSource>,
    global: Arc<dyn ElementSource>,
}

impl TaggableElementResolver {
    pub fn new(local: Arc<dyn ElementSource>, global: Arc<dyn ElementSource>) -> Self {
        Self { local, global }
    }

    pub async fn resolve(&self, movie_id: &str, kind: ElementKind) -> Vec<TaggableElement> {
        if !kind.is_taggable() {
            return Vec::new();
        }

        let (local, global) = tokio::join!(
            self.local.fetch(movie_id, kind),
            self.global.fetch(movie_id, kind)
        );
        let local = or_empty(local, "local", movie_id, kind);
        let global = or_empty(global, "global", movie_id, kind);

        tracing::debug!(
            movie_id = %movie_id,
            kind = %kind,
            local = local.len(),
            global = global.len(),
            "resolved taggable elements"
        );

        local
            .into_iter()
            .map(|e| TaggableElement::annotate(e, kind, false))
            .chain(global.into_iter().map(|e| TaggableElement::annotate(e, kind, true)))
            .collect()
    }
}

fn or_empty(
    result: Result<Vec<ElementRef>, HarnessError>,
    source: &str,
    movie_id: &str,
    kind: ElementKind,
) -> Vec<ElementRef> {
    result.unwrap_or_else(|e| {
        tracing::warn!(source, movie_id = %movie_id, kind = %kind, "Element source failed: {}", e);
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::core::BackendError;

    /// 可控延迟、记录调用次数与完成顺序的数据源
    struct RecordingSource {
        label: &'static str,
        items: Vec<ElementRef>,
        delay: Duration,
        fail: bool,
        calls: AtomicUsize,
        finished: Arc<Mutex<Vec<&'static str>>>,
    }

    impl RecordingSource {
        fn new(label: &'static str, names: &[&str], delay_ms: u64, finished: Arc<Mutex<Vec<&'static str>>>) -> Self {
            Self {
                label,
                items: names
                    .iter()
                    .enumerate()
                    .map(|(i, n)| ElementRef::new(format!("{}-{}", label, i), *n))
                    .collect(),
                delay: Duration::from_millis(delay_ms),
                fail: false,
                calls: AtomicUsize::new(0),
                finished,
            }
        }
    }

    #[async_trait]
    impl ElementSource for RecordingSource {
        async fn fetch(&self, _scope_key: &str, _kind: ElementKind) -> Result<Vec<ElementRef>, HarnessError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.finished.lock().unwrap().push(self.label);
            if self.fail {
                return Err(BackendError::Transport("catalog down".into()).into());
            }
            Ok(self.items.clone())
        }
    }

    #[tokio::test]
    async fn test_locals_first_even_when_global_finishes_first() {
        let finished = Arc::new(Mutex::new(Vec::new()));
        let local = Arc::new(RecordingSource::new("local", &["Ada", "Bo"], 40, finished.clone()));
        let global = Arc::new(RecordingSource::new("global", &["Narrator"], 0, finished.clone()));
        let resolver = TaggableElementResolver::new(local, global);

        let out = resolver.resolve("movie-1", ElementKind::Character).await;

        assert_eq!(*finished.lock().unwrap(), vec!["global", "local"]);
        let labels: Vec<_> = out.iter().map(|e| e.display_label.as_str()).collect();
        assert_eq!(labels, vec!["local - Ada", "local - Bo", "global - Narrator"]);
        assert_eq!(
            out.iter().map(|e| e.is_global).collect::<Vec<_>>(),
            vec![false, false, true]
        );
        assert!(out.iter().all(|e| e.kind == ElementKind::Character));
    }

    #[tokio::test]
    async fn test_movie_kind_makes_no_calls() {
        let finished = Arc::new(Mutex::new(Vec::new()));
        let local = Arc::new(RecordingSource::new("local", &["Ada"], 0, finished.clone()));
        let global = Arc::new(RecordingSource::new("global", &["Narrator"], 0, finished));
        let resolver = TaggableElementResolver::new(local.clone(), global.clone());

        assert!(resolver.resolve("movie-1", ElementKind::Movie).await.is_empty());
        assert_eq!(local.calls.load(Ordering::SeqCst), 0);
        assert_eq!(global.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_same_id_in_both_lists_is_kept() {
        let finished = Arc::new(Mutex::new(Vec::new()));
        let mut local = RecordingSource::new("x", &["Lamp"], 0, finished.clone());
        let mut global = RecordingSource::new("x", &["Lamp"], 0, finished);
        local.label = "local";
        global.label = "global";
        let resolver = TaggableElementResolver::new(Arc::new(local), Arc::new(global));

        let out = resolver.resolve("movie-1", ElementKind::Prop).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, out[1].id);
    }

    #[tokio::test]
    async fn test_failed_source_degrades_to_empty() {
        let finished = Arc::new(Mutex::new(Vec::new()));
        let local = Arc::new(RecordingSource::new("local", &["Ada"], 0, finished.clone()));
        let mut global = RecordingSource::new("global", &["Narrator"], 0, finished);
        global.fail = true;
        let resolver = TaggableElementResolver::new(local, Arc::new(global));

        let out = resolver.resolve("movie-1", ElementKind::Character).await;
        assert_eq!(out.len(), 1);
        assert!(!out[0].is_global);
    }

    #[test]
    fn test_to_tagged() {
        let t = TaggableElement::annotate(ElementRef::new("s1", "Harbor"), ElementKind::Set, true);
        assert_eq!(t.display_label, "global - Harbor");
        let tagged = t.to_tagged();
        assert_eq!(tagged.id, "s1");
        assert!(tagged.is_global);
        assert_eq!(tagged.kind, ElementKind::Set);
    }
}
