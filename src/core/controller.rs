//! Pipeline controller: the modernization state machine.
//!
//! The controller owns every piece of session state (stage, artifacts,
//! analysis, plan, transcript, busy flag) and sequences provider calls.
//! State lives behind a mutex that is never held across an `.await`, so all
//! mutation happens synchronously before or after the provider call.
//!
//! Guards:
//! - a call arriving while another step is in flight is ignored (`Busy`)
//! - a call whose precondition is unmet is ignored without any side effect
//! - provider failures never escape; they become transcript entries

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::Provider;
use crate::error::ProviderError;
use crate::domain::{Artifact, ArtifactId, ArtifactKind, OutputFile, PlanItem, Stage, Transcript, TranscriptEntry};

use super::upload::{UploadFilter, UploadedFile};

const NO_VALID_FILES: &str = "No valid COBOL files (.cbl, .cob) were found. Please try again.";
const UPLOAD_ACK: &str = "Files uploaded successfully. I will now analyze the code. This may take a moment.";
const ANALYSIS_DONE: &str = "Analysis complete. Next, I will generate a modernization plan.";
const PLAN_REQUEST: &str = "Generate the modernization plan.";
const PLAN_ACK: &str = "Creating a modernization plan based on the analysis...";
const PLAN_DONE: &str = "Modernization plan created. Ready to transform the code to Java.";
const TRANSFORM_REQUEST: &str = "Transform the code to Java.";
const TRANSFORM_ACK: &str = "Transforming COBOL to Java. This is the final step and may take some time.";
const TRANSFORM_DONE: &str = "Transformation complete! You can now view the generated Java files.";
const TRANSFORM_EMPTY: &str = "Transformation finished, but no Java files were returned. You can reset and try again.";
const RETRY_REQUEST: &str = "Retry the analysis.";

/// Result of a controller operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum StepOutcome {
    /// The step ran and the provider call succeeded
    Completed,

    /// The step ran but the provider call failed; the message is in the transcript
    Failed { error: String },

    /// The step did not run
    Ignored { reason: IgnoreReason },
}

impl StepOutcome {
    fn ignored(reason: IgnoreReason) -> Self {
        Self::Ignored { reason }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Why an operation was not performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Another step is in flight
    Busy,

    /// Stage or required artifacts do not allow this operation
    Precondition,

    /// The upload contained no recognized source file (a notice was posted)
    NoRecognizedFiles,

    /// The session was reset while the provider call was in flight
    Superseded,
}

/// Read-only view of the controller state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub session_id: Uuid,
    pub stage: Stage,
    pub busy: bool,
    pub artifacts: Vec<Artifact>,
    pub active_artifact: Option<ArtifactId>,
    pub analysis: Option<String>,
    pub plan: Option<Vec<PlanItem>>,
    pub transcript: Vec<TranscriptEntry>,
}

impl PipelineSnapshot {
    /// Artifact currently selected for viewing
    pub fn active(&self) -> Option<&Artifact> {
        let id = self.active_artifact.as_ref()?;
        self.artifacts.iter().find(|a| a.is(id))
    }

    pub fn source_files(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(|a| a.is_source())
    }

    /// Generated artifacts as `{name, content}` pairs for export
    pub fn output_files(&self) -> Vec<OutputFile> {
        self.artifacts
            .iter()
            .filter(|a| !a.is_source())
            .map(OutputFile::from)
            .collect()
    }
}

/// Mutable session state
#[derive(Debug, Clone)]
struct PipelineState {
    stage: Stage,
    busy: bool,
    /// Bumped by reset so late provider results can be discarded
    epoch: u64,
    artifacts: Vec<Artifact>,
    active_artifact: Option<ArtifactId>,
    analysis: Option<String>,
    plan: Option<Vec<PlanItem>>,
    transcript: Transcript,
}

impl PipelineState {
    fn new(epoch: u64) -> Self {
        Self {
            stage: Stage::Upload,
            busy: false,
            epoch,
            artifacts: Vec::new(),
            active_artifact: None,
            analysis: None,
            plan: None,
            transcript: Transcript::seeded(),
        }
    }

    fn sources(&self) -> Vec<Artifact> {
        self.artifacts.iter().filter(|a| a.is_source()).cloned().collect()
    }

    fn transition(&mut self, next: Stage) {
        debug_assert!(
            self.stage.can_transition_to(next),
            "illegal transition {} -> {}",
            self.stage,
            next
        );
        info!(from = %self.stage, to = %next, "Stage transition");
        self.stage = next;
    }

    fn snapshot(&self, session_id: Uuid) -> PipelineSnapshot {
        PipelineSnapshot {
            session_id,
            stage: self.stage,
            busy: self.busy,
            artifacts: self.artifacts.clone(),
            active_artifact: self.active_artifact.clone(),
            analysis: self.analysis.clone(),
            plan: self.plan.clone(),
            transcript: self.transcript.entries().to_vec(),
        }
    }
}

/// Drives one modernization session against a single provider
pub struct PipelineController {
    provider: Arc<dyn Provider>,
    filter: UploadFilter,
    session_id: Uuid,
    state: Mutex<PipelineState>,
    notifier: watch::Sender<PipelineSnapshot>,
}

impl PipelineController {
    /// Create a controller that accepts the default `.cbl`/`.cob` uploads
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self::with_filter(provider, UploadFilter::default())
    }

    /// Create a controller with a custom upload filter
    pub fn with_filter(provider: Arc<dyn Provider>, filter: UploadFilter) -> Self {
        let session_id = Uuid::new_v4();
        let state = PipelineState::new(0);
        let (notifier, _) = watch::channel(state.snapshot(session_id));

        info!(%session_id, provider = provider.name(), "Pipeline session created");

        Self {
            provider,
            filter,
            session_id,
            state: Mutex::new(state),
            notifier,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Current state as a read-only snapshot
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.lock().snapshot(self.session_id)
    }

    /// Receive a fresh snapshot after every state change
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.notifier.subscribe()
    }

    pub fn stage(&self) -> Stage {
        self.lock().stage
    }

    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    /// Generated artifacts as `{name, content}` pairs
    pub fn output_files(&self) -> Vec<OutputFile> {
        self.snapshot().output_files()
    }

    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &PipelineState) {
        self.notifier.send_replace(state.snapshot(self.session_id));
    }

    /// Lock the state for a step that ends with a provider call
    ///
    /// Returns `None` (after logging) if the session was reset meanwhile.
    fn finish(&self, epoch: u64) -> Option<MutexGuard<'_, PipelineState>> {
        let state = self.lock();
        if state.epoch != epoch {
            warn!("Session was reset while a step was in flight; discarding result");
            return None;
        }
        Some(state)
    }

    /// Replace the artifact set with an upload and start analysis
    #[instrument(skip(self, files), fields(session = %self.session_id, count = files.len()))]
    pub async fn upload_files(&self, files: Vec<UploadedFile>) -> StepOutcome {
        let (sources, epoch) = {
            let mut state = self.lock();
            if state.busy {
                return StepOutcome::ignored(IgnoreReason::Busy);
            }
            if files.is_empty() || !state.stage.can_transition_to(Stage::Analyze) {
                return StepOutcome::ignored(IgnoreReason::Precondition);
            }

            let upload = self.filter.filter(files);
            if upload.accepted.is_empty() {
                info!(rejected = upload.rejected, "Upload contained no recognized source files");
                state.transcript.assistant_text(NO_VALID_FILES);
                self.publish(&state);
                return StepOutcome::ignored(IgnoreReason::NoRecognizedFiles);
            }

            info!(
                accepted = upload.accepted.len(),
                rejected = upload.rejected,
                duplicates = upload.duplicates,
                "Source files uploaded"
            );

            let count = upload.accepted.len();
            state.active_artifact = upload.accepted.first().map(Artifact::id);
            state.artifacts = upload.accepted;
            state.analysis = None;
            state.plan = None;
            state
                .transcript
                .user_text(format!("Uploaded {} COBOL file(s).", count));
            state.transcript.assistant_text(UPLOAD_ACK);
            state.transition(Stage::Analyze);
            state.busy = true;
            self.publish(&state);

            (state.sources(), state.epoch)
        };

        self.analyze(sources, epoch).await
    }

    /// Re-run analysis on the resident sources after a failed attempt
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub async fn retry_analysis(&self) -> StepOutcome {
        let (sources, epoch) = {
            let mut state = self.lock();
            if state.busy {
                return StepOutcome::ignored(IgnoreReason::Busy);
            }
            let sources = state.sources();
            if state.stage != Stage::Upload || state.analysis.is_some() || sources.is_empty() {
                return StepOutcome::ignored(IgnoreReason::Precondition);
            }

            state.transcript.user_text(RETRY_REQUEST);
            state.transcript.assistant_text(format!(
                "Retrying the analysis of {} COBOL file(s). This may take a moment.",
                sources.len()
            ));
            state.transition(Stage::Analyze);
            state.busy = true;
            self.publish(&state);

            (sources, state.epoch)
        };

        self.analyze(sources, epoch).await
    }

    async fn analyze(&self, sources: Vec<Artifact>, epoch: u64) -> StepOutcome {
        let result = self.provider.analyze(&sources).await;

        let Some(mut state) = self.finish(epoch) else {
            return StepOutcome::ignored(IgnoreReason::Superseded);
        };

        let outcome = match result {
            Ok(analysis) => {
                state.analysis = Some(analysis.clone());
                state.transcript.assistant_analysis(analysis);
                state.transcript.assistant_text(ANALYSIS_DONE);
                state.transition(Stage::Plan);
                StepOutcome::Completed
            }
            Err(e) => {
                error!(error = %e, "Analysis failed");
                state
                    .transcript
                    .assistant_text(format!("An error occurred during analysis: {}", e));
                state.transition(Stage::Upload);
                StepOutcome::Failed { error: e.to_string() }
            }
        };

        state.busy = false;
        self.publish(&state);
        outcome
    }

    /// Ask the provider for a modernization plan based on the analysis
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub async fn generate_plan(&self) -> StepOutcome {
        let (analysis, epoch) = {
            let mut state = self.lock();
            if state.busy {
                return StepOutcome::ignored(IgnoreReason::Busy);
            }
            let analysis = match (&state.analysis, state.stage) {
                (Some(analysis), Stage::Plan) => analysis.clone(),
                _ => return StepOutcome::ignored(IgnoreReason::Precondition),
            };

            state.transcript.user_text(PLAN_REQUEST);
            state.transcript.assistant_text(PLAN_ACK);
            state.busy = true;
            self.publish(&state);

            (analysis, state.epoch)
        };

        // A plan without steps would leave nothing to transform
        let result = self.provider.plan(&analysis).await.and_then(|plan| {
            if plan.is_empty() {
                Err(ProviderError::malformed("the plan has no steps"))
            } else {
                Ok(plan)
            }
        });

        let Some(mut state) = self.finish(epoch) else {
            return StepOutcome::ignored(IgnoreReason::Superseded);
        };

        let outcome = match result {
            Ok(plan) => {
                info!(items = plan.len(), "Plan generated");
                state.plan = Some(plan.clone());
                state.transcript.assistant_plan(plan);
                state.transcript.assistant_text(PLAN_DONE);
                state.transition(Stage::Transform);
                StepOutcome::Completed
            }
            Err(e) => {
                error!(error = %e, "Plan generation failed");
                state
                    .transcript
                    .assistant_text(format!("An error occurred while creating the plan: {}", e));
                StepOutcome::Failed { error: e.to_string() }
            }
        };

        state.busy = false;
        self.publish(&state);
        outcome
    }

    /// Translate the sources following the plan
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub async fn transform_code(&self) -> StepOutcome {
        let (sources, plan, epoch) = {
            let mut state = self.lock();
            if state.busy {
                return StepOutcome::ignored(IgnoreReason::Busy);
            }
            let sources = state.sources();
            let plan = match (&state.plan, state.stage) {
                (Some(plan), Stage::Transform) if !plan.is_empty() && !sources.is_empty() => plan.clone(),
                _ => return StepOutcome::ignored(IgnoreReason::Precondition),
            };

            state.transcript.user_text(TRANSFORM_REQUEST);
            state.transcript.assistant_text(TRANSFORM_ACK);
            state.busy = true;
            self.publish(&state);

            (sources, plan, state.epoch)
        };

        let result = self.provider.transform(&sources, &plan).await;

        let Some(mut state) = self.finish(epoch) else {
            return StepOutcome::ignored(IgnoreReason::Superseded);
        };

        let outcome = match result {
            Ok(outputs) => {
                let mut produced: Vec<Artifact> = Vec::with_capacity(outputs.len());
                for output in outputs {
                    if produced.iter().any(|a| a.name == output.name) {
                        warn!(name = %output.name, "Provider returned a duplicate file name; keeping the first");
                        continue;
                    }
                    produced.push(output);
                }

                info!(files = produced.len(), "Transformation produced output files");
                state.active_artifact = produced.first().map(Artifact::id);
                let notice = if produced.is_empty() {
                    TRANSFORM_EMPTY
                } else {
                    TRANSFORM_DONE
                };
                state.artifacts.extend(produced);
                state.transcript.assistant_text(notice);
                state.transition(Stage::Done);
                StepOutcome::Completed
            }
            Err(e) => {
                error!(error = %e, "Transformation failed");
                state
                    .transcript
                    .assistant_text(format!("An error occurred during transformation: {}", e));
                StepOutcome::Failed { error: e.to_string() }
            }
        };

        state.busy = false;
        self.publish(&state);
        outcome
    }

    /// Run whichever step the current stage is waiting for
    pub async fn trigger_next_step(&self) -> StepOutcome {
        match self.stage() {
            Stage::Plan => self.generate_plan().await,
            Stage::Transform => self.transform_code().await,
            _ => StepOutcome::ignored(IgnoreReason::Precondition),
        }
    }

    /// Ask a free-form question; only available once the pipeline is done
    #[instrument(skip(self, text), fields(session = %self.session_id))]
    pub async fn send_chat_message(&self, text: &str) -> StepOutcome {
        let epoch = {
            let mut state = self.lock();
            if state.busy {
                return StepOutcome::ignored(IgnoreReason::Busy);
            }
            if !state.stage.is_terminal() || text.trim().is_empty() {
                return StepOutcome::ignored(IgnoreReason::Precondition);
            }

            state.transcript.user_text(text);
            state.busy = true;
            self.publish(&state);
            state.epoch
        };

        let result = self.provider.chat(text).await;

        let Some(mut state) = self.finish(epoch) else {
            return StepOutcome::ignored(IgnoreReason::Superseded);
        };

        let outcome = match result {
            Ok(reply) => {
                state.transcript.assistant_text(reply);
                StepOutcome::Completed
            }
            Err(e) => {
                error!(error = %e, "Chat request failed");
                state
                    .transcript
                    .assistant_text(format!("Sorry, I encountered an error: {}", e));
                StepOutcome::Failed { error: e.to_string() }
            }
        };

        state.busy = false;
        self.publish(&state);
        outcome
    }

    /// Select an artifact for viewing; returns false if no such artifact exists
    pub fn select_artifact(&self, kind: ArtifactKind, name: &str) -> bool {
        let id = ArtifactId::new(kind, name);
        let mut state = self.lock();
        if !state.artifacts.iter().any(|a| a.is(&id)) {
            return false;
        }
        state.active_artifact = Some(id);
        self.publish(&state);
        true
    }

    /// Return to a fresh session: Upload stage, greeting only, no artifacts
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub fn reset(&self) {
        let mut state = self.lock();
        let epoch = state.epoch + 1;
        *state = PipelineState::new(epoch);
        info!("Session reset");
        self.publish(&state);
    }
}
