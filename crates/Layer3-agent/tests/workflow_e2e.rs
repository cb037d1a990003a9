//! End-to-end: request → reply → parsed edits → files on disk

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anvil_agent::{AgentWorkflow, CodeRequest, RequestPipeline, WorkflowEvent};
use anvil_foundation::{
    ContextId, GovernorConfig, RequestGovernor, ResponseCache, ResponseCacheConfig, ResponseStore,
    TokenBudget,
};
use anvil_patch::{FailureReason, PatchApplier};
use anvil_provider::{CompletionParams, ReplayProvider};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const REPLY: &str = "\
Here are the changes.

--- FILE: src/utils.ts ---
action: replace
lines: 10-15
```ts
export const a = 1;
export const b = 2;
```

--- FILE: src/index.ts ---
action: append
```ts
export * from './utils';
```
";

fn numbered(count: usize) -> String {
    (1..=count).map(|n| format!("line {n}\n")).collect()
}

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/utils.ts"), numbered(20)).unwrap();
    std::fs::write(dir.path().join("src/index.ts"), "export {};\n").unwrap();
    dir
}

fn pipeline(provider: Arc<ReplayProvider>, max_requests: u32) -> RequestPipeline {
    RequestPipeline::new(
        provider,
        Arc::new(ResponseCache::new(ResponseCacheConfig::default())),
        Arc::new(RequestGovernor::new(GovernorConfig::new(max_requests, 60_000))),
    )
}

fn workflow(root: &Path, provider: Arc<ReplayProvider>) -> AgentWorkflow {
    let applier = PatchApplier::new(root).unwrap();
    AgentWorkflow::new(pipeline(provider, 10), applier)
}

#[tokio::test]
async fn test_reply_is_applied_to_workspace() {
    let dir = workspace();
    let provider = Arc::new(ReplayProvider::new(REPLY));
    let workflow = workflow(dir.path(), provider.clone());

    let outcome = workflow
        .run(
            CodeRequest::new("export {};", "typescript", "split utils"),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcome.instructions().len(), 2);
    assert!(outcome.parse.is_complete());
    assert!(outcome.report.is_success());

    let mut expected = numbered(9);
    expected.push_str("export const a = 1;\nexport const b = 2;\n");
    expected.extend((16..=20).map(|n| format!("line {n}\n")));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("src/utils.ts")).unwrap(),
        expected
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("src/index.ts")).unwrap(),
        "export {};\nexport * from './utils';\n"
    );

    // agent mode asks for the edit format
    let prompt = provider.last_prompt().unwrap();
    assert!(prompt.contains("--- FILE:"));
}

#[tokio::test]
async fn test_dry_run_leaves_files_untouched() {
    let dir = workspace();
    let workflow =
        workflow(dir.path(), Arc::new(ReplayProvider::new(REPLY))).dry_run(true);

    let outcome = workflow
        .run(
            CodeRequest::new("x", "typescript", "split utils"),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap();

    assert!(outcome.report.dry_run);
    assert_eq!(outcome.report.summary().applied, 2);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("src/index.ts")).unwrap(),
        "export {};\n"
    );
}

#[tokio::test]
async fn test_escaping_path_is_rejected_others_applied() {
    let dir = workspace();
    let reply = "\
--- FILE: ../outside.txt ---
```
nope
```
--- FILE: src/new.ts ---
```ts
export const fresh = true;
```
";
    let workflow = workflow(dir.path(), Arc::new(ReplayProvider::new(reply)));
    let (tx, mut rx) = mpsc::channel(32);

    let outcome = workflow
        .run(
            CodeRequest::new("x", "typescript", "add file"),
            &CancellationToken::new(),
            Some(tx),
        )
        .await
        .unwrap();

    let summary = outcome.report.summary();
    assert_eq!((summary.applied, summary.failed, summary.created), (1, 1, 1));
    assert!(matches!(
        outcome.report.entries[0].failure(),
        Some(FailureReason::PathViolation { .. })
    ));
    assert!(!dir.path().parent().unwrap().join("outside.txt").exists());
    assert!(dir.path().join("src/new.ts").exists());

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(events.contains(&WorkflowEvent::Applied {
        file_path: "src/new.ts".into()
    }));
    assert!(matches!(events.last(), Some(WorkflowEvent::Finished { applied: 1, failed: 1 })));
}

#[tokio::test]
async fn test_streamed_reply_reports_instructions_as_they_complete() {
    let dir = workspace();
    let provider = Arc::new(ReplayProvider::new(REPLY).with_chunk_chars(7));
    let applier = PatchApplier::new(dir.path()).unwrap();
    let pipeline = pipeline(provider, 10).with_params(CompletionParams::default().streaming(true));
    let workflow = AgentWorkflow::new(pipeline, applier);
    let (tx, mut rx) = mpsc::channel(64);

    let outcome = workflow
        .run(
            CodeRequest::new("x", "typescript", "split utils"),
            &CancellationToken::new(),
            Some(tx),
        )
        .await
        .unwrap();
    assert!(outcome.report.is_success());

    let mut ready = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let WorkflowEvent::InstructionReady { file_path } = event {
            ready.push(file_path);
        }
    }
    assert_eq!(ready, vec!["src/utils.ts", "src/index.ts"]);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_reply_is_neither_applied_nor_cached() {
    let dir = workspace();
    let provider = Arc::new(
        ReplayProvider::new(REPLY)
            .with_chunk_chars(16)
            .with_chunk_delay(Duration::from_millis(100)),
    );
    let cache = Arc::new(ResponseCache::new(ResponseCacheConfig::default()));
    let pipeline = RequestPipeline::new(
        provider,
        cache.clone(),
        Arc::new(RequestGovernor::new(GovernorConfig::default())),
    )
    .with_params(CompletionParams::default().streaming(true));
    let workflow = AgentWorkflow::new(pipeline, PatchApplier::new(dir.path()).unwrap());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        trigger.cancel();
    });

    let outcome = workflow
        .run(
            CodeRequest::new("x", "typescript", "split utils"),
            &cancel,
            None,
        )
        .await
        .unwrap();

    assert!(outcome.response.cancelled);
    assert!(!outcome.response.text.is_empty());
    assert!(outcome.report.is_empty());
    assert!(cache.is_empty());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("src/index.ts")).unwrap(),
        "export {};\n"
    );
}

#[tokio::test]
async fn test_rate_limit_and_budget_stop_before_provider() {
    let provider = Arc::new(ReplayProvider::new("ok"));
    let pipeline = pipeline(provider.clone(), 1);
    let cancel = CancellationToken::new();
    let context = ContextId::new("editor-1");

    pipeline
        .send(&CodeRequest::new("a", "rust", "fix").with_context(context.clone()), &cancel)
        .await
        .unwrap();

    let err = pipeline
        .send(&CodeRequest::new("b", "rust", "fix").with_context(context), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_rate_limited());
    assert!(err.retry_after().is_some());

    // a different context has its own window
    pipeline
        .send(
            &CodeRequest::new("b", "rust", "fix").with_context(ContextId::new("editor-2")),
            &cancel,
        )
        .await
        .unwrap();

    let strict = pipeline.with_budget(TokenBudget::new(3));
    let err = strict
        .send(&CodeRequest::new("c", "rust", "fix"), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_budget_exceeded());
    assert_eq!(provider.calls(), 2);
    assert_eq!(strict.cache().stats().item_count, 2);
}

#[tokio::test]
async fn test_applied_code_is_the_verbatim_fenced_body() {
    let dir = workspace();
    let body = "export function login(password: string, token = getToken()) {\n  return auth(password, token);\n}\n";
    let reply = format!("--- FILE: src/login.ts ---\n```ts\n{body}```\n");
    let provider = Arc::new(ReplayProvider::new(reply));
    let workflow = workflow(dir.path(), provider);

    let outcome = workflow
        .run(
            CodeRequest::new("x", "typescript", "add login"),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap();

    assert!(outcome.report.is_success());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("src/login.ts")).unwrap(),
        body
    );
    // the caller-facing copy is still masked
    assert!(outcome.response.text.contains("password: [REDACTED]"));
}

#[tokio::test]
async fn test_plain_reply_is_not_reused_for_agent_mode() {
    let dir = workspace();
    let provider = Arc::new(ReplayProvider::new(REPLY));
    let workflow = workflow(dir.path(), provider.clone());
    let cancel = CancellationToken::new();
    let request = CodeRequest::new("export {};", "typescript", "split utils");

    let plain = workflow.pipeline().send(&request, &cancel).await.unwrap();
    assert!(!plain.cache_hit);

    let outcome = workflow.run(request, &cancel, None).await.unwrap();
    assert!(!outcome.response.cache_hit);
    assert_ne!(outcome.response.key, plain.key);
    assert_eq!(provider.calls(), 2);
    assert_eq!(outcome.instructions().len(), 2);
}
