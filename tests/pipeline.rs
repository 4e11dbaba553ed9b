//! Pipeline Integration Tests
//!
//! Drives the controller through whole sessions with a scripted provider.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use modernize::core::{IgnoreReason, PipelineController, StepOutcome, UploadedFile};
use modernize::domain::{Artifact, ArtifactId, ArtifactKind, Author, PlanItem, Stage, GREETING};
use modernize::error::{ProviderError, ProviderResult};
use modernize::Provider;

/// Provider that replays queued answers, falling back to canned successes
#[derive(Default)]
struct ScriptedProvider {
    analyses: Mutex<VecDeque<ProviderResult<String>>>,
    plans: Mutex<VecDeque<ProviderResult<Vec<PlanItem>>>>,
    transforms: Mutex<VecDeque<ProviderResult<Vec<Artifact>>>>,
    chats: Mutex<VecDeque<ProviderResult<String>>>,
    /// When set, analyze waits for a permit before answering
    gate: Option<Arc<Notify>>,
    /// Names of the files passed to each transform call
    transformed: Mutex<Vec<Vec<String>>>,
}

impl ScriptedProvider {
    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    fn with_analysis(self, result: ProviderResult<String>) -> Self {
        self.analyses.lock().unwrap().push_back(result);
        self
    }

    fn with_plan(self, result: ProviderResult<Vec<PlanItem>>) -> Self {
        self.plans.lock().unwrap().push_back(result);
        self
    }

    fn with_transform(self, result: ProviderResult<Vec<Artifact>>) -> Self {
        self.transforms.lock().unwrap().push_back(result);
        self
    }

    fn with_chat(self, result: ProviderResult<String>) -> Self {
        self.chats.lock().unwrap().push_back(result);
        self
    }
}

fn next<T>(queue: &Mutex<VecDeque<ProviderResult<T>>>, fallback: impl FnOnce() -> T) -> ProviderResult<T> {
    queue.lock().unwrap().pop_front().unwrap_or_else(|| Ok(fallback()))
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn analyze(&self, _files: &[Artifact]) -> ProviderResult<String> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        next(&self.analyses, || "Payroll batch job...".to_string())
    }

    async fn plan(&self, _analysis: &str) -> ProviderResult<Vec<PlanItem>> {
        next(&self.plans, || {
            vec![PlanItem::new("Extract domain model", "Map records to classes")]
        })
    }

    async fn transform(&self, files: &[Artifact], _plan: &[PlanItem]) -> ProviderResult<Vec<Artifact>> {
        self.transformed
            .lock()
            .unwrap()
            .push(files.iter().map(|f| f.name.clone()).collect());
        next(&self.transforms, || {
            vec![Artifact::generated("Payroll.java", "class Payroll {}")]
        })
    }

    async fn chat(&self, message: &str) -> ProviderResult<String> {
        next(&self.chats, || format!("About '{}': it computes net pay.", message))
    }
}

fn payroll() -> Vec<UploadedFile> {
    vec![UploadedFile::new(
        "PAYROLL.CBL",
        "IDENTIFICATION DIVISION.\nPROGRAM-ID. PAYROLL.\nPROCEDURE DIVISION.\n    STOP RUN.",
    )]
}

fn server_error() -> ProviderError {
    ProviderError::Provider {
        status: 500,
        body: "internal".to_string(),
    }
}

async fn drive_to(controller: &PipelineController, stage: Stage) {
    if stage == Stage::Upload {
        return;
    }
    assert!(controller.upload_files(payroll()).await.is_completed());
    if stage == Stage::Plan {
        return;
    }
    assert!(controller.generate_plan().await.is_completed());
    if stage == Stage::Transform {
        return;
    }
    assert!(controller.transform_code().await.is_completed());
    assert_eq!(controller.stage(), stage);
}

#[tokio::test]
async fn test_end_to_end_payroll() {
    let controller = PipelineController::new(Arc::new(ScriptedProvider::default()));

    let outcome = controller.upload_files(payroll()).await;
    assert_eq!(outcome, StepOutcome::Completed);

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.stage, Stage::Plan);
    assert_eq!(snapshot.analysis.as_deref(), Some("Payroll batch job..."));

    // Greeting, then upload notice, acknowledgement, analysis, guidance
    assert_eq!(snapshot.transcript.len(), 5);
    assert_eq!(snapshot.transcript[0].text.as_deref(), Some(GREETING));
    let added = &snapshot.transcript[1..];
    assert_eq!(added[0].author, Author::User);
    assert_eq!(added[1].author, Author::Assistant);
    assert_eq!(added[2].analysis.as_deref(), Some("Payroll batch job..."));
    assert_eq!(added[3].author, Author::Assistant);
    assert!(added[3].text.is_some());

    assert!(controller.generate_plan().await.is_completed());
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.stage, Stage::Transform);
    assert_eq!(snapshot.plan.as_ref().map(Vec::len), Some(1));

    assert!(controller.transform_code().await.is_completed());
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.stage, Stage::Done);
    assert_eq!(snapshot.artifacts.len(), 2);
    assert_eq!(snapshot.active_artifact, Some(ArtifactId::generated("Payroll.java")));
    assert_eq!(snapshot.active().map(|a| a.language()), Some("java"));
    assert!(!snapshot.busy);

    let outputs = controller.output_files();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].name, "Payroll.java");
    assert_eq!(outputs[0].content, "class Payroll {}");
}

#[tokio::test]
async fn test_transcript_ids_strictly_increase() {
    let controller = PipelineController::new(Arc::new(ScriptedProvider::default()));
    drive_to(&controller, Stage::Done).await;
    controller.send_chat_message("What does it do?").await;

    let ids: Vec<u64> = controller.snapshot().transcript.iter().map(|e| e.id).collect();
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]), "ids: {:?}", ids);
}

#[tokio::test]
async fn test_upload_filters_unrecognized_files() {
    let controller = PipelineController::new(Arc::new(ScriptedProvider::default()));

    let outcome = controller
        .upload_files(vec![
            UploadedFile::new("PAYROLL.CBL", "a"),
            UploadedFile::new("notes.txt", "b"),
            UploadedFile::new("tax.Cob", "c"),
        ])
        .await;

    assert!(outcome.is_completed());
    let names: Vec<String> = controller
        .snapshot()
        .source_files()
        .map(|a| a.name.clone())
        .collect();
    assert_eq!(names, vec!["PAYROLL.CBL", "tax.Cob"]);
}

#[tokio::test]
async fn test_upload_without_cobol_posts_notice() {
    let controller = PipelineController::new(Arc::new(ScriptedProvider::default()));

    let outcome = controller
        .upload_files(vec![UploadedFile::new("README.md", "# hello")])
        .await;

    assert_eq!(
        outcome,
        StepOutcome::Ignored {
            reason: IgnoreReason::NoRecognizedFiles
        }
    );
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.stage, Stage::Upload);
    assert!(snapshot.artifacts.is_empty());
    assert_eq!(snapshot.transcript.len(), 2);
    assert!(snapshot.transcript[1].text.as_deref().unwrap().contains("No valid COBOL files"));
}

#[tokio::test]
async fn test_steps_out_of_order_are_noops() {
    let controller = PipelineController::new(Arc::new(ScriptedProvider::default()));
    let ignored = StepOutcome::Ignored {
        reason: IgnoreReason::Precondition,
    };

    let before = controller.snapshot();
    assert_eq!(controller.generate_plan().await, ignored);
    assert_eq!(controller.transform_code().await, ignored);
    assert_eq!(controller.snapshot(), before);

    drive_to(&controller, Stage::Plan).await;
    let before = controller.snapshot();
    assert_eq!(controller.transform_code().await, ignored);
    assert_eq!(controller.upload_files(payroll()).await, ignored);
    assert_eq!(controller.snapshot(), before);
}

#[tokio::test]
async fn test_analysis_failure_returns_to_upload() {
    let provider = ScriptedProvider::default().with_analysis(Err(server_error()));
    let controller = PipelineController::new(Arc::new(provider));

    let outcome = controller.upload_files(payroll()).await;
    assert!(matches!(outcome, StepOutcome::Failed { .. }));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.stage, Stage::Upload);
    assert!(snapshot.analysis.is_none());
    assert!(!snapshot.busy);
    assert_eq!(snapshot.source_files().count(), 1);
    let last = snapshot.transcript.last().unwrap();
    assert_eq!(last.author, Author::Assistant);
    assert!(last
        .text
        .as_deref()
        .unwrap()
        .starts_with("An error occurred during analysis: Provider API error! status: 500"));

    // The resident files can be analyzed again without a re-upload
    assert!(controller.retry_analysis().await.is_completed());
    assert_eq!(controller.stage(), Stage::Plan);
}

#[tokio::test]
async fn test_plan_failure_stays_in_plan() {
    let provider = ScriptedProvider::default().with_plan(Err(ProviderError::malformed("no plan array")));
    let controller = PipelineController::new(Arc::new(provider));
    drive_to(&controller, Stage::Plan).await;

    let outcome = controller.generate_plan().await;
    assert!(matches!(outcome, StepOutcome::Failed { .. }));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.stage, Stage::Plan);
    assert!(snapshot.plan.is_none());
    assert!(snapshot
        .transcript
        .last()
        .and_then(|e| e.text.as_deref())
        .unwrap()
        .starts_with("An error occurred while creating the plan"));

    // Second attempt uses the fallback plan
    assert!(controller.generate_plan().await.is_completed());
    assert_eq!(controller.stage(), Stage::Transform);
}

#[tokio::test]
async fn test_empty_plan_can_be_regenerated() {
    let provider = ScriptedProvider::default().with_plan(Ok(vec![]));
    let controller = PipelineController::new(Arc::new(provider));
    drive_to(&controller, Stage::Plan).await;

    let outcome = controller.generate_plan().await;
    assert!(matches!(outcome, StepOutcome::Failed { .. }));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.stage, Stage::Plan);
    assert!(snapshot.plan.is_none());
    assert!(!snapshot.busy);
    assert!(snapshot
        .transcript
        .last()
        .and_then(|e| e.text.as_deref())
        .unwrap()
        .contains("the plan has no steps"));

    // The session is not stuck: the next attempt gets a usable plan
    assert!(controller.trigger_next_step().await.is_completed());
    assert_eq!(controller.stage(), Stage::Transform);
    assert!(controller.trigger_next_step().await.is_completed());
    assert_eq!(controller.stage(), Stage::Done);
}

#[tokio::test]
async fn test_output_sharing_a_source_name_becomes_active() {
    let provider = ScriptedProvider::default().with_transform(Ok(vec![Artifact::generated(
        "PAYROLL.CBL",
        "class Payroll {}",
    )]));
    let controller = PipelineController::new(Arc::new(provider));
    drive_to(&controller, Stage::Done).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.artifacts.len(), 2);
    assert_eq!(snapshot.active_artifact, Some(ArtifactId::generated("PAYROLL.CBL")));
    let active = snapshot.active().unwrap();
    assert_eq!(active.kind, ArtifactKind::Generated);
    assert_eq!(active.content, "class Payroll {}");

    // Both artifacts with the shared name stay selectable
    assert!(controller.select_artifact(ArtifactKind::Source, "PAYROLL.CBL"));
    assert!(controller.snapshot().active().unwrap().is_source());
    assert!(controller.select_artifact(ArtifactKind::Generated, "PAYROLL.CBL"));
    assert_eq!(
        controller.snapshot().active().map(|a| a.content.as_str()),
        Some("class Payroll {}")
    );
}

#[tokio::test]
async fn test_transform_failure_stays_in_transform() {
    let provider = ScriptedProvider::default().with_transform(Err(ProviderError::Transport("reset".into())));
    let controller = PipelineController::new(Arc::new(provider));
    drive_to(&controller, Stage::Transform).await;

    assert!(matches!(controller.transform_code().await, StepOutcome::Failed { .. }));
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.stage, Stage::Transform);
    assert_eq!(snapshot.artifacts.len(), 1);
    assert!(snapshot.plan.is_some());
}

#[tokio::test]
async fn test_transform_keeps_sources() {
    let provider = ScriptedProvider::default().with_transform(Ok(vec![
        Artifact::generated("Payroll.java", "class Payroll {}"),
        Artifact::generated("Employee.java", "record Employee() {}"),
    ]));
    let provider = Arc::new(provider);
    let controller = PipelineController::new(provider.clone());

    controller
        .upload_files(vec![
            UploadedFile::new("PAYROLL.CBL", "a"),
            UploadedFile::new("EMPLOYEE.cob", "b"),
        ])
        .await;
    let sources_before: Vec<Artifact> = controller.snapshot().source_files().cloned().collect();

    controller.generate_plan().await;
    controller.transform_code().await;

    let snapshot = controller.snapshot();
    let sources_after: Vec<Artifact> = snapshot.source_files().cloned().collect();
    assert_eq!(sources_after, sources_before);
    assert_eq!(snapshot.artifacts.len(), 4);
    assert_eq!(snapshot.active_artifact, Some(ArtifactId::generated("Payroll.java")));

    // Only sources are sent for translation
    let transformed = provider.transformed.lock().unwrap().clone();
    assert_eq!(transformed, vec![vec!["PAYROLL.CBL".to_string(), "EMPLOYEE.cob".to_string()]]);
}

#[tokio::test]
async fn test_transform_with_no_outputs() {
    let provider = ScriptedProvider::default().with_transform(Ok(vec![]));
    let controller = PipelineController::new(Arc::new(provider));
    drive_to(&controller, Stage::Transform).await;

    assert_eq!(controller.transform_code().await, StepOutcome::Completed);

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.stage, Stage::Done);
    assert!(snapshot.active_artifact.is_none());
    assert!(snapshot.active().is_none());
    assert_eq!(snapshot.artifacts.len(), 1);
    assert!(snapshot.output_files().is_empty());
    assert!(snapshot
        .transcript
        .last()
        .and_then(|e| e.text.as_deref())
        .unwrap()
        .contains("no Java files"));
}

#[tokio::test]
async fn test_reset_from_every_stage() {
    for stage in [Stage::Upload, Stage::Plan, Stage::Transform, Stage::Done] {
        let controller = PipelineController::new(Arc::new(ScriptedProvider::default()));
        drive_to(&controller, stage).await;

        controller.reset();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.stage, Stage::Upload, "reset from {}", stage);
        assert_eq!(snapshot.transcript.len(), 1);
        assert_eq!(snapshot.transcript[0].text.as_deref(), Some(GREETING));
        assert!(snapshot.artifacts.is_empty());
        assert!(snapshot.active_artifact.is_none());
        assert!(snapshot.analysis.is_none());
        assert!(snapshot.plan.is_none());
        assert!(!snapshot.busy);
    }
}

#[tokio::test]
async fn test_chat_only_when_done() {
    let provider = ScriptedProvider::default()
        .with_chat(Ok("It computes net pay.".to_string()))
        .with_chat(Err(ProviderError::Transport("timed out".into())));
    let controller = PipelineController::new(Arc::new(provider));

    let before = controller.snapshot();
    assert_eq!(
        controller.send_chat_message("hi").await,
        StepOutcome::Ignored {
            reason: IgnoreReason::Precondition
        }
    );
    assert_eq!(controller.snapshot(), before);

    drive_to(&controller, Stage::Done).await;
    let count = controller.snapshot().transcript.len();

    assert!(controller.send_chat_message("What does PAYROLL do?").await.is_completed());
    let transcript = controller.snapshot().transcript;
    assert_eq!(transcript.len(), count + 2);
    assert_eq!(transcript[count].author, Author::User);
    assert_eq!(transcript[count].text.as_deref(), Some("What does PAYROLL do?"));
    assert_eq!(transcript[count + 1].author, Author::Assistant);
    assert_eq!(transcript[count + 1].text.as_deref(), Some("It computes net pay."));

    // Blank messages are ignored
    assert!(matches!(
        controller.send_chat_message("   ").await,
        StepOutcome::Ignored { .. }
    ));

    // Failures are reported in the transcript and the stage holds
    assert!(matches!(
        controller.send_chat_message("And the taxes?").await,
        StepOutcome::Failed { .. }
    ));
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.stage, Stage::Done);
    assert!(snapshot
        .transcript
        .last()
        .and_then(|e| e.text.as_deref())
        .unwrap()
        .starts_with("Sorry, I encountered an error"));
}

#[tokio::test]
async fn test_calls_while_busy_are_rejected() {
    let gate = Arc::new(Notify::new());
    let controller = Arc::new(PipelineController::new(Arc::new(ScriptedProvider::gated(gate.clone()))));
    let mut rx = controller.subscribe();

    let upload = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.upload_files(payroll()).await })
    };

    // Observers see the busy flag while analysis is in flight
    let busy = rx.wait_for(|s| s.busy).await.unwrap().clone();
    assert_eq!(busy.stage, Stage::Analyze);
    assert!(controller.is_busy());

    let rejected = StepOutcome::Ignored {
        reason: IgnoreReason::Busy,
    };
    let before = controller.snapshot();
    assert_eq!(controller.upload_files(payroll()).await, rejected);
    assert_eq!(controller.retry_analysis().await, rejected);
    assert_eq!(controller.generate_plan().await, rejected);
    assert_eq!(controller.send_chat_message("hi").await, rejected);
    assert_eq!(controller.snapshot(), before);

    gate.notify_one();
    assert_eq!(upload.await.unwrap(), StepOutcome::Completed);

    let snapshot = controller.snapshot();
    assert!(!snapshot.busy);
    assert_eq!(snapshot.stage, Stage::Plan);
}

#[tokio::test]
async fn test_reset_discards_in_flight_result() {
    let gate = Arc::new(Notify::new());
    let controller = Arc::new(PipelineController::new(Arc::new(ScriptedProvider::gated(gate.clone()))));
    let mut rx = controller.subscribe();

    let upload = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.upload_files(payroll()).await })
    };
    rx.wait_for(|s| s.busy).await.unwrap();

    controller.reset();
    gate.notify_one();

    assert_eq!(
        upload.await.unwrap(),
        StepOutcome::Ignored {
            reason: IgnoreReason::Superseded
        }
    );

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.stage, Stage::Upload);
    assert_eq!(snapshot.transcript.len(), 1);
    assert!(snapshot.analysis.is_none());
    assert!(!snapshot.busy);
}
