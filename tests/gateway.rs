//! End-to-end gateway scenarios over a file-backed registry and a scripted
//! transport.

mod common;

use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

use common::{fast_retry, seeded_registry, ScriptedTransport, StubReply, OPENAI_OK};
use keyrotor::{
    ChatMessage, ChatRequest, Credential, EngineConfig, Gateway, GatewayError, InMemoryUsage,
    Invoker, MasterCredential, ReconcileOutcome,
};

const QWEN_PRIMARY: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation";

const QWEN_OK: &str = r#"{
    "output": { "choices": [ { "message": { "content": "bonjour" } } ] },
    "usage": { "input_tokens": 10, "output_tokens": 5 }
}"#;

fn gateway_over(
    registry: keyrotor::CredentialRegistry,
    transport: Arc<ScriptedTransport>,
) -> (Gateway, Arc<InMemoryUsage>) {
    let usage = Arc::new(InMemoryUsage::new());
    let gateway = Gateway::new(
        Arc::new(registry),
        Invoker::new(transport, fast_retry(3)),
        usage.clone(),
    );
    (gateway, usage)
}

#[tokio::test]
async fn successful_turn_updates_rotation_state_and_telemetry() {
    let temp = tempdir().unwrap();
    let registry = seeded_registry(
        temp.path(),
        vec![Credential::new("qwen", "sk-qwen-0123456789", "qwen-plus", None)],
    )
    .await;

    let transport = Arc::new(ScriptedTransport::new());
    transport.script(QWEN_PRIMARY, vec![StubReply::Http(200, QWEN_OK)]);

    let (gateway, usage) = gateway_over(registry, transport);
    let response = gateway
        .get_response(ChatRequest::new(vec![ChatMessage::user("salut")]))
        .await
        .unwrap();

    assert_eq!(response.content, "bonjour");
    assert_eq!(response.provider, "qwen");
    assert_eq!(response.model, "qwen-plus");

    // Provider-reported usage landed in the sink.
    assert_eq!(usage.total(), 15);

    // Selection stamped last_used and persisted it.
    let info = &gateway.registry().list().await[0];
    assert!(info.last_used.is_some());
    assert_eq!(info.error_count, 0);
}

#[tokio::test]
async fn empty_registry_fails_fast_with_no_credential_available() {
    let temp = tempdir().unwrap();
    let registry = seeded_registry(temp.path(), vec![]).await;
    let (gateway, _usage) = gateway_over(registry, Arc::new(ScriptedTransport::new()));

    let error = gateway
        .get_response(ChatRequest::new(vec![ChatMessage::user("salut")]))
        .await
        .unwrap_err();
    assert!(matches!(error, GatewayError::NoCredentialAvailable));
}

#[tokio::test]
async fn override_credential_bypasses_selection() {
    let temp = tempdir().unwrap();
    // Registry is empty; the session-scoped override carries the key.
    let registry = seeded_registry(temp.path(), vec![]).await;

    let transport = Arc::new(ScriptedTransport::new());
    transport.script(QWEN_PRIMARY, vec![StubReply::Http(200, QWEN_OK)]);

    let (gateway, _usage) = gateway_over(registry, transport);
    let override_credential =
        Credential::new("qwen", "sk-session-0123456789", "qwen-plus", None);

    let response = gateway
        .get_response(
            ChatRequest::new(vec![ChatMessage::user("salut")])
                .with_override_credential(override_credential),
        )
        .await
        .unwrap();

    assert_eq!(response.content, "bonjour");
    // The override never entered the registry.
    assert!(gateway.registry().list().await.is_empty());
}

#[tokio::test]
async fn unknown_provider_in_a_credential_is_a_typed_error() {
    let temp = tempdir().unwrap();
    let registry = seeded_registry(
        temp.path(),
        vec![Credential::new("mystery", "sk-m-0123456789", "m-1", None)],
    )
    .await;
    let (gateway, _usage) = gateway_over(registry, Arc::new(ScriptedTransport::new()));

    let error = gateway
        .get_response(ChatRequest::new(vec![ChatMessage::user("salut")]))
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        GatewayError::UnknownProvider { ref provider } if provider == "mystery"
    ));
}

#[tokio::test]
async fn request_model_filter_overrides_the_credential_default() {
    let temp = tempdir().unwrap();
    let registry = seeded_registry(
        temp.path(),
        vec![
            Credential::new("qwen", "sk-a-0123456789", "qwen-plus", None),
            Credential::new("qwen", "sk-b-0123456789", "qwen-max", None),
        ],
    )
    .await;

    let transport = Arc::new(ScriptedTransport::new());
    transport.script(QWEN_PRIMARY, vec![StubReply::Http(200, QWEN_OK)]);

    let (gateway, _usage) = gateway_over(registry, transport);
    let response = gateway
        .get_response(
            ChatRequest::new(vec![ChatMessage::user("salut")]).with_model("qwen-max"),
        )
        .await
        .unwrap();
    assert_eq!(response.model, "qwen-max");
}

#[tokio::test]
async fn apply_config_reconciles_the_master_credential() {
    let temp = tempdir().unwrap();
    let registry = seeded_registry(temp.path(), vec![]).await;
    let transport = Arc::new(ScriptedTransport::new());
    transport.script(QWEN_PRIMARY, vec![StubReply::Http(200, QWEN_OK)]);

    let (gateway, _usage) = gateway_over(registry, transport);
    let config = EngineConfig {
        base_dir: temp.path().to_path_buf(),
        master: Some(MasterCredential {
            provider: "qwen".to_string(),
            secret: "sk-master-0123456789".to_string(),
            model: "qwen-plus".to_string(),
        }),
        request_delay: Duration::ZERO,
    };
    let gateway = gateway.apply_config(&config).await.unwrap();

    assert_eq!(gateway.registry().list().await.len(), 1);
    // Reconciling again is an update, not a duplicate.
    assert_eq!(
        gateway
            .registry()
            .reconcile_master(config.master.as_ref())
            .await
            .unwrap(),
        ReconcileOutcome::Updated
    );
    assert_eq!(gateway.registry().list().await.len(), 1);

    let response = gateway
        .get_response(ChatRequest::new(vec![ChatMessage::user("salut")]))
        .await
        .unwrap();
    assert_eq!(response.content, "bonjour");
}
