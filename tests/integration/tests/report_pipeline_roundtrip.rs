use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use desk_cache::{InMemoryTtlCache, TtlCache};
use desk_core::ManualClock;
use desk_payload::{
    primary_wire, CommandDispatcher, DecodeStage, DecodedPayload, DynamicValue, PayloadCodec,
    RecordingCommandExecutor, SystemConfig, TypeRegistry, SYSTEM_CONFIG_TAG,
};
use desk_report_store::{report_cache_key, Principal, ReportStore, DEFAULT_REPORT_CACHE_TTL};
use serde_json::json;

const START_UNIX_MS: u64 = 1_767_225_600_000;

struct Pipeline {
    store: ReportStore,
    cache: Arc<InMemoryTtlCache>,
    clock: Arc<ManualClock>,
}

fn pipeline(executor: Arc<dyn desk_payload::CommandExecutor>) -> Pipeline {
    let clock = Arc::new(ManualClock::new(START_UNIX_MS));
    let cache = Arc::new(InMemoryTtlCache::with_clock(clock.clone()));
    let registry = Arc::new(TypeRegistry::builtin().expect("builtin registry"));
    let codec = PayloadCodec::new(registry, CommandDispatcher::new(executor));
    let store = ReportStore::new(cache.clone(), codec).with_clock(clock.clone());
    Pipeline {
        store,
        cache,
        clock,
    }
}

#[tokio::test]
async fn integration_nested_report_data_survives_create_and_view() {
    let executor = Arc::new(RecordingCommandExecutor::new());
    let p = pipeline(executor.clone());
    let data = json!({
        "revenue": 1000,
        "delta": -12.5,
        "regions": [{"name": "emea", "share": 0.4}, {"name": "apac", "share": null}],
        "approved": true,
    });

    let id = p
        .store
        .create_from_text(2, "Q1", "quarterly", &data.to_string())
        .await
        .expect("create");
    let owner = Principal {
        user_id: 2,
        is_admin: false,
    };
    let view = p.store.view_as(&owner, id).await.expect("view");
    let outcome = view.decode.expect("decode ran");

    assert_eq!(outcome.stage, DecodeStage::PrimaryDecoded);
    assert_eq!(
        outcome.state,
        Some(DecodedPayload::ReportData(DynamicValue::from(data)))
    );
    assert!(executor.invocations().is_empty());
}

#[tokio::test]
async fn integration_template_commands_skip_non_strings_and_run_in_order() {
    let executor = Arc::new(RecordingCommandExecutor::failing_on(["step-2"]));
    let p = pipeline(executor.clone());
    let id = p
        .store
        .create_from_text(
            1,
            "ops",
            "nightly",
            r#"{"template":{"commands":["step-1", 7, "step-2", null, "step-3"]},"note":"x"}"#,
        )
        .await
        .expect("create");

    let outcome = p
        .store
        .view(id)
        .await
        .expect("view")
        .decode
        .expect("decode ran");
    assert_eq!(outcome.stage, DecodeStage::TemplateDispatched);
    assert_eq!(outcome.dispatch_log.failed, 1);
    assert_eq!(executor.invocations(), vec!["step-1", "step-2", "step-3"]);
    assert!(outcome.primary_error.is_some());
}

#[tokio::test]
async fn integration_cache_ttl_boundary_controls_view_decode() {
    let executor = Arc::new(RecordingCommandExecutor::new());
    let p = pipeline(executor.clone());
    let id = p
        .store
        .create_from_text(1, "t", "d", r#"{"template":{"commands":["echo hi"]}}"#)
        .await
        .expect("create");

    let ttl_ms = DEFAULT_REPORT_CACHE_TTL.as_millis() as u64;
    p.clock.advance_ms(ttl_ms - 1);
    assert!(p.store.view(id).await.expect("view").decode.is_some());

    p.clock.advance_ms(1);
    assert!(p.store.view(id).await.expect("view").decode.is_none());
    assert_eq!(executor.invocations(), vec!["echo hi"]);
}

#[tokio::test]
async fn integration_foreign_primary_payload_is_not_mistaken_for_report_data() {
    // A system.config record written under the report key fails the report.data
    // hook and is not valid JSON, so the view yields nothing.
    let executor = Arc::new(RecordingCommandExecutor::new());
    let p = pipeline(executor.clone());
    let id = p.store.create(1, "t", "d", None).await.expect("create");

    let foreign = primary_wire::encode_typed(&SystemConfig::default()).expect("encode config");
    p.cache
        .set(
            &report_cache_key(id),
            BASE64.encode(foreign),
            Duration::from_secs(60),
        )
        .await
        .expect("seed cache");

    let outcome = p
        .store
        .view(id)
        .await
        .expect("view")
        .decode
        .expect("decode ran");
    assert_eq!(outcome.stage, DecodeStage::Exhausted);
    assert!(outcome.is_empty());

    let registry = TypeRegistry::builtin().expect("registry");
    assert!(registry.contains(SYSTEM_CONFIG_TAG));
}

#[cfg(unix)]
#[tokio::test]
async fn integration_shell_executor_runs_template_commands_from_cache() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let marker = workspace.path().join("ran.txt");
    let p = pipeline(Arc::new(desk_payload::ShellCommandExecutor::default()));

    let data = json!({
        "template": {
            "commands": [
                format!("printf one > '{}'", marker.display()),
                format!("printf ' two' >> '{}'", marker.display()),
            ]
        }
    });
    let id = p
        .store
        .create_from_text(1, "t", "d", &data.to_string())
        .await
        .expect("create");
    assert!(!marker.exists(), "create must not run commands");

    p.store.view(id).await.expect("view");
    assert_eq!(
        std::fs::read_to_string(&marker).expect("marker"),
        "one two"
    );
}
