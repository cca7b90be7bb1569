#[cfg(test)]
mod model_tests {
    use std::path::PathBuf;
    use std::str::FromStr;

    use jiff::Timestamp;
    use serde_json::{json, Map, Value};

    use crate::{
        error::OrchestratorError,
        models::{
            complexity_for, ArtifactRecord, ArtifactSummary, ChatMessage, ExecutionResult,
            MessageKind, Plan, Sender, Step, StepOutcome, StepStatus, Task, TaskStatus,
        },
    };

    fn create_test_step(tool: &str) -> Step {
        let mut args = Map::new();
        args.insert("text".to_string(), json!("hi"));
        Step::new("Echo text", tool, args)
    }

    fn create_record(name: &str, type_tag: &str, size: u64) -> ArtifactRecord {
        ArtifactRecord {
            resolved_path: PathBuf::from(format!("/tmp/{name}")),
            display_name: name.to_string(),
            type_tag: type_tag.to_string(),
            size_bytes: size,
            producing_step_id: "step-1".to_string(),
            description: format!("Generated {name}"),
            registered_at: Timestamp::from_second(1640995200).unwrap(),
            copied_path: None,
        }
    }

    #[test]
    fn test_step_status_round_trip() {
        for status in [
            StepStatus::Pending,
            StepStatus::Running,
            StepStatus::Completed,
            StepStatus::Failed,
            StepStatus::Skipped,
        ] {
            assert_eq!(StepStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(StepStatus::from_str("bogus").is_err());
        assert_eq!(StepStatus::from_str("COMPLETED").unwrap(), StepStatus::Completed);
    }

    #[test]
    fn test_task_status_accepts_american_spelling() {
        assert_eq!(TaskStatus::from_str("canceled").unwrap(), TaskStatus::Cancelled);
        assert!(TaskStatus::Cancelled.is_finished());
        assert!(!TaskStatus::Executing.is_finished());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_value(StepStatus::Completed).unwrap(), json!("completed"));
        assert_eq!(serde_json::to_value(TaskStatus::Analyzing).unwrap(), json!("analyzing"));
    }

    #[test]
    fn test_step_lifecycle_success() {
        let mut step = create_test_step("echo_tool");
        assert_eq!(step.status, StepStatus::Pending);
        assert!(step.start_time.is_none());

        step.start().unwrap();
        assert_eq!(step.status, StepStatus::Running);
        assert!(step.start_time.is_some());

        step.complete(json!({"text": "hi"})).unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        assert_eq!(step.result, Some(json!({"text": "hi"})));
        assert!(step.error.is_none());
        assert!(step.end_time.unwrap() >= step.start_time.unwrap());
        assert!(step.duration_secs().unwrap() >= 0.0);
    }

    #[test]
    fn test_step_failure_records_error_object() {
        let mut step = create_test_step("echo_tool");
        step.start().unwrap();
        step.fail("boom").unwrap();

        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.error.as_deref(), Some("boom"));
        assert_eq!(step.result, Some(json!({"error": "boom"})));
    }

    #[test]
    fn test_step_rejects_illegal_transitions() {
        let mut step = create_test_step("echo_tool");

        let err = step.complete(Value::Null).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::InvalidTransition {
                from: StepStatus::Pending,
                to: StepStatus::Completed,
                ..
            }
        ));
        assert_eq!(step.status, StepStatus::Pending);
        assert!(step.result.is_none());

        step.start().unwrap();
        assert!(step.start().is_err());
        assert!(step.skip().is_err());

        step.complete(json!(1)).unwrap();
        assert!(step.fail("late").is_err());
        assert_eq!(step.status, StepStatus::Completed);
        assert!(step.error.is_none());
    }

    #[test]
    fn test_step_skip_only_from_pending() {
        let mut step = create_test_step("echo_tool");
        step.skip().unwrap();
        assert_eq!(step.status, StepStatus::Skipped);
        assert!(step.status.is_terminal());
        assert!(step.start().is_err());
        assert!(step.duration_secs().is_none());
    }

    #[test]
    fn test_step_deserializes_with_defaults() {
        let step: Step = serde_json::from_value(json!({
            "step_id": "abc",
            "description": "d",
            "tool_name": "t",
            "start_time": null,
            "end_time": null
        }))
        .unwrap();

        assert!(step.arguments.is_empty());
        assert!(!step.is_final);
        assert_eq!(step.status, StepStatus::Pending);
    }

    #[test]
    fn test_step_ids_are_unique() {
        let a = create_test_step("echo_tool");
        let b = create_test_step("echo_tool");
        assert_ne!(a.step_id, b.step_id);
    }

    #[test]
    fn test_complexity_by_step_count() {
        assert_eq!(complexity_for(1), "simple");
        assert_eq!(complexity_for(2), "medium");
        assert_eq!(complexity_for(3), "medium");
        assert_eq!(complexity_for(4), "complex");
    }

    #[test]
    fn test_task_progress() {
        let steps = vec![
            create_test_step("a"),
            create_test_step("b"),
            create_test_step("c"),
            create_test_step("d"),
        ];
        let mut task = Task::new("do things", Plan::new(steps));
        assert_eq!(task.complexity, "complex");

        task.plan.steps[0].start().unwrap();
        task.plan.steps[0].complete(Value::Null).unwrap();
        task.plan.steps[1].start().unwrap();

        let progress = task.progress();
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.percentage, 25.0);
        assert_eq!(progress.current_step.as_deref(), Some("Echo text"));
    }

    #[test]
    fn test_empty_task_progress() {
        let task = Task::new("nothing", Plan::empty());
        let progress = task.progress();
        assert_eq!(progress.total, 0);
        assert_eq!(progress.percentage, 0.0);
        assert!(progress.current_step.is_none());
    }

    #[test]
    fn test_conversation_task_shape() {
        let task = Task::conversation("hello", "Hi there!");
        assert!(task.is_conversation);
        assert_eq!(task.task_type, "conversation");
        assert_eq!(task.plan.len(), 1);

        let step = &task.plan.steps[0];
        assert_eq!(step.tool_name, "chat_response");
        assert!(step.is_final);
        assert_eq!(step.arguments.get("response"), Some(&json!("Hi there!")));
    }

    #[test]
    fn test_clarification_task() {
        let task = Task::clarification("make it", vec!["Make what?".to_string()]);
        assert!(task.requires_clarification());
        assert!(task.plan.is_empty());
        assert!(!Task::new("x", Plan::empty()).requires_clarification());
    }

    #[test]
    fn test_execution_result_counts() {
        let mut ok = create_test_step("a");
        ok.start().unwrap();
        ok.complete(json!("done")).unwrap();
        let mut bad = create_test_step("b");
        bad.start().unwrap();
        bad.fail("nope").unwrap();

        let result = ExecutionResult {
            task_id: "t".to_string(),
            success: false,
            results: vec![StepOutcome::from(&ok), StepOutcome::from(&bad)],
            error_message: None,
            execution_time: 0.5,
            files_generated: vec![],
        };

        assert_eq!(result.completed_steps(), 1);
        assert_eq!(result.failed_steps(), 1);
        assert_eq!(result.results[1].result, json!({"error": "nope"}));
    }

    #[test]
    fn test_artifact_summary_histogram() {
        let records = vec![
            create_record("a.txt", "text", 10),
            create_record("b.txt", "text", 5),
            create_record("c.json", "json", 7),
        ];
        let summary = ArtifactSummary::from_records("task-1", Timestamp::now(), &records);

        assert_eq!(summary.file_count, 3);
        assert_eq!(summary.total_size, 22);
        assert_eq!(summary.type_histogram.get("text"), Some(&2));
        assert_eq!(summary.type_histogram.get("json"), Some(&1));
        assert_eq!(summary.files[2].name, "c.json");

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["file_types"]["text"], json!(2));
        assert_eq!(value["files"][0]["type"], json!("text"));
    }

    #[test]
    fn test_chat_message_constructors() {
        let msg = ChatMessage::assistant("Plan ready", MessageKind::TaskPlan).with_task("t-1");
        assert_eq!(msg.sender, Sender::Assistant);
        assert_eq!(msg.task_id.as_deref(), Some("t-1"));

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["sender"], json!("assistant"));
        assert_eq!(value["message_type"], json!("task_plan"));

        assert_eq!(ChatMessage::user("hi").message_type, MessageKind::Text);
    }
}
