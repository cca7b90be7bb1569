use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use taskflow_core::models::MessageKind;
use taskflow_core::{EventKind, OrchestratorError, ReportFormat, StepStatus, TaskStatus};

mod common;

use common::{
    create_test_orchestrator, create_with_plan_source, create_with_transport, local_tools,
    SlowPlanSource, SlowTransport,
};

fn file_plan() -> serde_json::Value {
    json!({
        "task_type": "document",
        "steps": [
            {"description": "Echo the topic", "tool_name": "echo_tool",
             "arguments": {"topic": "rust"}},
            {"description": "Write notes", "tool_name": "file_generation_tool",
             "arguments": {"file_name": "notes.txt"}, "is_final": true}
        ]
    })
}

#[tokio::test]
async fn test_run_generates_files_and_reports() {
    let (_temp_dir, orchestrator) = create_test_orchestrator(file_plan()).await;

    let outcome = orchestrator
        .run("alice", "write some notes about rust")
        .await
        .expect("Failed to run task");

    let result = outcome.result.expect("Task should have a result");
    assert!(result.success);
    assert_eq!(result.completed_steps(), 2);
    assert_eq!(result.files_generated.len(), 1);
    assert!(result.files_generated[0].ends_with("notes.txt"));
    assert_eq!(outcome.task.status, TaskStatus::Completed);
    assert_eq!(outcome.task.task_type, "document");

    let report = &outcome.reports[&ReportFormat::Json];
    assert!(report.exists());
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(report).unwrap()).unwrap();
    assert_eq!(saved["task_info"]["task_id"], json!(outcome.task.task_id));

    let summary = orchestrator
        .file_summary(&outcome.task.task_id)
        .expect("Task should have artifacts");
    assert!(summary.files.iter().any(|f| f.name == "notes.txt"));
    assert!(summary.files.iter().any(|f| f.name.ends_with(".json")));

    let history = orchestrator.report_history(10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].task_id, outcome.task.task_id);
    assert!(history[0].success);
}

#[tokio::test]
async fn test_download_package_includes_reports() {
    let (_temp_dir, orchestrator) = create_test_orchestrator(file_plan()).await;
    let outcome = orchestrator.run("alice", "write notes").await.unwrap();

    let archive = orchestrator
        .download_package(&outcome.task.task_id, "alice")
        .await
        .expect("Failed to package task");

    assert!(archive.exists());
    assert!(archive
        .file_name()
        .unwrap()
        .to_string_lossy()
        .ends_with("_files.zip"));

    let missing = orchestrator.download_package("no-such-task", "alice").await;
    assert!(matches!(missing, Err(OrchestratorError::TaskNotFound { .. })));
}

#[tokio::test]
async fn test_failed_final_step() {
    let plan = json!({
        "steps": [
            {"description": "Blow up", "tool_name": "fail_tool", "is_final": true},
            {"description": "Never runs", "tool_name": "echo_tool"}
        ]
    });
    let (_temp_dir, orchestrator) = create_test_orchestrator(plan).await;

    let outcome = orchestrator.run("alice", "break things").await.unwrap();
    let result = outcome.result.unwrap();

    assert!(!result.success);
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].status, StepStatus::Failed);
    assert_eq!(outcome.task.status, TaskStatus::Failed);

    let page = orchestrator.chat_history("alice", 0, 1);
    assert_eq!(page.messages[0].message_type, MessageKind::Error);
    assert!(page.messages[0].content.contains("tool exploded"));
}

#[tokio::test]
async fn test_conversation_has_no_reports() {
    let plan = json!({"is_conversation": true, "reply": "Hello there!"});
    let (_temp_dir, orchestrator) = create_test_orchestrator(plan).await;

    let outcome = orchestrator.run("alice", "hi").await.unwrap();

    let result = outcome.result.unwrap();
    assert!(result.success);
    assert!(outcome.reports.is_empty());
    assert!(outcome.task.is_conversation);

    let page = orchestrator.chat_history("alice", 0, 10);
    assert_eq!(page.total_messages, 2);
    assert_eq!(page.messages[1].message_type, MessageKind::Conversation);
    assert_eq!(page.messages[1].content, "Hello there!");
    assert!(orchestrator.report_history(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_clarification_is_not_executed() {
    let plan = json!({
        "clarification_questions": ["Which format?", "How long?"],
        "clarity_score": 3.0
    });
    let (_temp_dir, orchestrator) = create_test_orchestrator(plan).await;

    let outcome = orchestrator.run("alice", "make a report").await.unwrap();

    assert!(outcome.result.is_none());
    assert!(outcome.task.requires_clarification());
    assert!(orchestrator.status("alice").is_none());

    let page = orchestrator.chat_history("alice", 0, 10);
    assert_eq!(page.total_messages, 2);
    assert_eq!(page.messages[1].message_type, MessageKind::Clarification);
    assert!(page.messages[1].content.contains("Which format?"));
}

#[tokio::test]
async fn test_chat_history_paging() {
    let (_temp_dir, orchestrator) = create_test_orchestrator(file_plan()).await;
    orchestrator.run("alice", "first").await.unwrap();
    orchestrator.run("alice", "second").await.unwrap();

    let page = orchestrator.chat_history("alice", 0, 2);
    assert_eq!(page.total_messages, 6);
    assert_eq!(page.messages.len(), 2);
    assert_eq!(page.messages[0].message_type, MessageKind::TaskPlan);
    assert_eq!(page.messages[1].message_type, MessageKind::TaskResult);

    let older = orchestrator.chat_history("alice", 3, 3);
    assert_eq!(older.messages.len(), 3);
    assert_eq!(older.messages[0].content, "first");

    let empty = orchestrator.chat_history("nobody", 0, 10);
    assert_eq!(empty.total_messages, 0);
    assert!(empty.messages.is_empty());
}

#[tokio::test]
async fn test_submit_cancels_previous_task() {
    let plan = json!({
        "steps": [
            {"description": "Wait", "tool_name": "slow_tool"},
            {"description": "Echo", "tool_name": "echo_tool", "is_final": true}
        ]
    });
    let transport = Arc::new(SlowTransport::new(Duration::from_millis(200)));
    let (_temp_dir, orchestrator) = create_with_transport(plan, transport).await;

    let (_id, mut events) = orchestrator.subscribe("alice");
    let first = orchestrator.submit("alice", "first").unwrap();
    loop {
        let event = events.recv().await.expect("event stream closed");
        if event.kind == EventKind::StepStart {
            break;
        }
    }

    let second = orchestrator.submit("alice", "second").unwrap();
    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();

    let cancelled = first.result.unwrap();
    assert!(!cancelled.success);
    assert_eq!(cancelled.error_message.as_deref(), Some("task cancelled"));
    assert_eq!(first.task.status, TaskStatus::Cancelled);
    assert_eq!(first.task.plan.steps[1].status, StepStatus::Skipped);

    assert!(second.result.unwrap().success);
    let last = orchestrator.last_result("alice").unwrap();
    assert_eq!(last.task_id, second.task.task_id);
}

#[tokio::test]
async fn test_later_submit_wins_over_slower_planning() {
    let plan = json!({
        "steps": [
            {"description": "Echo", "tool_name": "echo_tool", "is_final": true}
        ]
    });
    let source = Arc::new(SlowPlanSource::new(
        &plan,
        "first",
        Duration::from_millis(300),
    ));
    let (_temp_dir, orchestrator) =
        create_with_plan_source(source, Arc::new(local_tools())).await;

    let first = orchestrator.submit("alice", "first").unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = orchestrator.submit("alice", "second").unwrap();

    let second = second.await.unwrap().unwrap();
    let first = first.await.unwrap().unwrap();

    assert_eq!(second.task.status, TaskStatus::Completed);
    assert_eq!(first.task.status, TaskStatus::Cancelled);
    assert!(first
        .task
        .plan
        .steps
        .iter()
        .all(|s| s.status == StepStatus::Skipped));

    let last = orchestrator.last_result("alice").unwrap();
    assert_eq!(last.task_id, second.task.task_id);
    let status = orchestrator.status("alice").unwrap();
    assert_eq!(status.task_id, second.task.task_id);
}

#[tokio::test]
async fn test_rejects_ids_outside_artifact_base() {
    let (temp_dir, orchestrator) = create_test_orchestrator(file_plan()).await;

    for user in ["../../escaped", "..", "a/b", "a\\b"] {
        let err = orchestrator.run(user, "notes").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidInput { .. }));
        assert!(orchestrator.submit(user, "notes").is_err());
    }
    assert!(!temp_dir.path().join("escaped").exists());
    assert!(orchestrator.sessions().is_empty());

    let outcome = orchestrator.run("alice", "notes").await.unwrap();
    let err = orchestrator
        .download_package("../x", "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidInput { .. }));
    let err = orchestrator
        .cleanup_task(&outcome.task.task_id, "../alice")
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidInput { .. }));
    assert!(orchestrator.file_summary(&outcome.task.task_id).is_some());
}

#[tokio::test]
async fn test_download_package_requires_owner() {
    let (_temp_dir, orchestrator) = create_test_orchestrator(file_plan()).await;
    let outcome = orchestrator.run("alice", "notes").await.unwrap();
    let task_id = &outcome.task.task_id;

    let err = orchestrator
        .download_package(task_id, "mallory")
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::TaskNotFound { .. }));
    assert!(!orchestrator.artifacts().base_dir().join("mallory").exists());

    let err = orchestrator.cleanup_task(task_id, "mallory").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::TaskNotFound { .. }));
    assert!(orchestrator.file_summary(task_id).is_some());

    assert!(orchestrator.download_package(task_id, "alice").await.is_ok());
}

#[tokio::test]
async fn test_users_have_isolated_events() {
    let (_temp_dir, orchestrator) = create_test_orchestrator(file_plan()).await;
    let (_a, mut alice_events) = orchestrator.subscribe("alice");
    let (_b, mut bob_events) = orchestrator.subscribe("bob");

    let (alice, bob) = tokio::join!(
        orchestrator.run("alice", "alice's notes"),
        orchestrator.run("bob", "bob's notes")
    );
    let alice = alice.unwrap();
    let bob = bob.unwrap();
    assert_ne!(alice.task.task_id, bob.task.task_id);

    let mut alice_tasks = Vec::new();
    while let Ok(event) = alice_events.try_recv() {
        if event.kind == EventKind::TaskStart {
            alice_tasks.push(event.field_str("task_id").unwrap_or_default().to_string());
        }
    }
    let mut bob_tasks = Vec::new();
    while let Ok(event) = bob_events.try_recv() {
        if event.kind == EventKind::TaskStart {
            bob_tasks.push(event.field_str("task_id").unwrap_or_default().to_string());
        }
    }
    assert_eq!(alice_tasks, vec![alice.task.task_id]);
    assert_eq!(bob_tasks, vec![bob.task.task_id]);
}

#[tokio::test]
async fn test_sweep_and_cancel() {
    let (_temp_dir, orchestrator) = create_test_orchestrator(file_plan()).await;
    orchestrator.run("alice", "notes").await.unwrap();
    assert_eq!(orchestrator.sessions().len(), 1);

    assert!(!orchestrator.cancel("alice").unwrap());
    assert!(orchestrator.sweep(Duration::from_secs(3600)).is_empty());

    let removed = orchestrator.sweep(Duration::ZERO);
    assert_eq!(removed, vec!["alice".to_string()]);
    assert!(orchestrator.sessions().is_empty());
    assert!(matches!(
        orchestrator.cancel("alice"),
        Err(OrchestratorError::SessionNotFound { .. })
    ));
}

#[tokio::test]
async fn test_rejects_empty_input() {
    let (_temp_dir, orchestrator) = create_test_orchestrator(file_plan()).await;

    assert!(matches!(
        orchestrator.run("alice", "   ").await,
        Err(OrchestratorError::InvalidInput { .. })
    ));
    assert!(matches!(
        orchestrator.submit("", "hello"),
        Err(OrchestratorError::InvalidInput { .. })
    ));
}

#[tokio::test]
async fn test_cleanup_task_removes_artifacts() {
    let (_temp_dir, orchestrator) = create_test_orchestrator(file_plan()).await;
    let outcome = orchestrator.run("alice", "notes").await.unwrap();
    let task_dir = orchestrator
        .artifacts()
        .task_dir(&outcome.task.task_id, "alice")
        .unwrap();
    assert!(task_dir.exists());

    orchestrator
        .cleanup_task(&outcome.task.task_id, "alice")
        .await
        .unwrap();

    assert!(!task_dir.exists());
    assert!(orchestrator.file_summary(&outcome.task.task_id).is_none());
}
