//! 测试台端到端流程：发送 → 付款请求 → 查看改动 → 审批；元素标记；设置持久化

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use wonder_harness::backend::MockBackend;
    use wonder_harness::config::AppConfig;
    use wonder_harness::core::{ApprovalContext, OrchestratorPhase, PendingChanges};
    use wonder_harness::memory::{Origin, SettingsStore};
    use wonder_harness::models::{
        ConversationRequest, ConversationResponse, ElementKind, Environment, ScriptDocument,
    };
    use wonder_harness::HarnessBuilder;

    fn mock() -> Arc<MockBackend> {
        Arc::new(
            MockBackend::new()
                .with_response(ConversationResponse::payment_request(
                    "conv-1",
                    "Rewriting act two costs 25 credits",
                    25.0,
                    "po-1",
                ))
                .with_document(
                    "purchase_orders",
                    "po-1",
                    json!({"data": "{\"scenes\": [{\"id\": \"s1\"}]}"}),
                )
                .with_script(
                    "movie-1",
                    ScriptDocument::new(json!({
                        "characters": [{"id": "c1", "name": "Ada"}],
                        "props": [{"id": "p1", "name": "Lamp"}]
                    })),
                )
                .with_catalog(
                    "characters",
                    vec![
                        json!({"id": "g1", "name": "Narrator", "is_global": true}),
                        json!({"id": "g2", "name": "Draft", "is_global": false}),
                    ],
                ),
        )
    }

    #[tokio::test]
    async fn test_payment_flow() {
        let mock = mock();
        let harness = HarnessBuilder::new(AppConfig::default())
            .with_settings(Arc::new(SettingsStore::in_memory()))
            .with_mock(mock.clone())
            .build();
        let orchestrator = &harness.orchestrator;

        let request = ConversationRequest::new("rewrite act two", "movie-1", "movie-1", "user-1");
        let resp = orchestrator.send(request.clone()).await.unwrap();
        assert!(resp.is_payment_request());
        assert_eq!(orchestrator.phase(), OrchestratorPhase::Idle);

        let changes = orchestrator.fetch_pending_changes("po-1").await;
        assert_eq!(changes, PendingChanges::Ready(json!({"scenes": [{"id": "s1"}]})));

        let latest = orchestrator.last_payment_request().await.unwrap();
        let approved = orchestrator
            .approve(&latest, &ApprovalContext::from_request(&request))
            .await
            .unwrap();
        assert_eq!(approved.content.message, "Payment po-1 approved (mock)");

        let transcript = orchestrator.transcript().await;
        let origins: Vec<Origin> = transcript.iter().map(|e| e.origin()).collect();
        assert_eq!(
            origins,
            vec![Origin::User, Origin::Agent, Origin::User, Origin::Agent]
        );
        assert_eq!(mock.converse_calls(), 1);
        assert_eq!(mock.approve_calls(), 1);
    }

    #[tokio::test]
    async fn test_tagging_merges_local_and_global() {
        let mock = mock();
        let harness = HarnessBuilder::new(AppConfig::default())
            .with_settings(Arc::new(SettingsStore::in_memory()))
            .with_mock(mock.clone())
            .build();

        let found = harness.resolver.resolve("movie-1", ElementKind::Character).await;
        let labels: Vec<&str> = found.iter().map(|e| e.display_label.as_str()).collect();
        assert_eq!(labels, vec!["local - Ada", "global - Narrator"]);

        let mut request = ConversationRequest::new("give her a hat", "movie-1", "movie-1", "user-1");
        request.tag(found[1].to_tagged());
        assert!(request.tagged_elements[0].is_global);

        // 影片本身不可标记，不发任何请求
        let before = mock.total_calls();
        assert!(harness.resolver.resolve("movie-1", ElementKind::Movie).await.is_empty());
        assert_eq!(mock.total_calls(), before);
    }

    #[tokio::test]
    async fn test_settings_survive_restart() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.app.data_dir = dir.path().to_path_buf();

        let harness = HarnessBuilder::new(config.clone())
            .with_mock(mock())
            .build();
        harness.settings.set_environment(Environment::Development);
        harness.settings.add_saved_request(
            ConversationRequest::new("hello", "movie-1", "movie-1", "user-1"),
            "smoke",
        );
        harness.settings.flush().await.unwrap();

        let restarted = HarnessBuilder::new(config).with_mock(mock()).build();
        assert_eq!(restarted.settings.environment(), Environment::Development);
        assert_eq!(
            restarted.settings.saved_request("smoke").unwrap().request.message,
            "hello"
        );
    }
}
