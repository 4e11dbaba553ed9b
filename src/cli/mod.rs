//! Command-line interface for modernize.
//!
//! Provides commands for running the full modernization pipeline over a
//! set of COBOL files, inspecting saved sessions, and showing the resolved
//! configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use crate::adapters::{build_provider, ProviderKind};
use crate::config::{self, Settings};
use crate::core::{
    output_file_names, PipelineController, PipelineSnapshot, SessionStore, StepOutcome, UploadFilter, UploadedFile,
};
use crate::domain::{plan, Author, OutputFile, TranscriptEntry};

/// modernize - COBOL to Java modernization assistant
#[derive(Parser, Debug)]
#[command(name = "modernize")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Use this config file instead of discovering one
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze, plan and transform COBOL sources
    Run {
        /// COBOL files or directories containing them
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Provider to use (defaults to the configured provider)
        #[arg(short, long, value_enum, env = "MODERNIZE_PROVIDER")]
        provider: Option<ProviderArg>,

        /// Write generated Java files to this directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Questions to ask once the transformation is done
        #[arg(short, long)]
        ask: Vec<String>,

        /// Stop after the plan is generated
        #[arg(long)]
        plan_only: bool,

        /// Do not save the session transcript
        #[arg(long)]
        no_save: bool,
    },

    /// List saved sessions
    Sessions,

    /// Show the transcript of a saved session
    Show {
        /// Session ID (UUID)
        session_id: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Provider for CLI (maps to ProviderKind)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProviderArg {
    /// Google Gemini
    Gemini,

    /// Azure OpenAI
    Azure,
}

impl From<ProviderArg> for ProviderKind {
    fn from(p: ProviderArg) -> Self {
        match p {
            ProviderArg::Gemini => ProviderKind::Gemini,
            ProviderArg::Azure => ProviderKind::Azure,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let settings = load_settings(self.config.as_deref())?;

        match self.command {
            Commands::Run {
                inputs,
                provider,
                output_dir,
                ask,
                plan_only,
                no_save,
            } => {
                let options = RunOptions {
                    provider: provider.map(Into::into),
                    output_dir,
                    questions: ask,
                    plan_only,
                    save: !no_save,
                };
                run_pipeline(&settings, &inputs, options).await
            }
            Commands::Sessions => list_sessions().await,
            Commands::Show { session_id } => show_session(&session_id).await,
            Commands::Config => show_config(&settings),
        }
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => config::load_from(path),
        None => Ok(config::config()?.clone()),
    }
}

struct RunOptions {
    provider: Option<ProviderKind>,
    output_dir: Option<PathBuf>,
    questions: Vec<String>,
    plan_only: bool,
    save: bool,
}

/// Run the whole pipeline over the given inputs
async fn run_pipeline(settings: &Settings, inputs: &[PathBuf], options: RunOptions) -> Result<()> {
    let kind = options.provider.unwrap_or(settings.provider);

    let provider = build_provider(kind, settings.provider_config(kind))
        .with_context(|| format!("Failed to initialize the {} provider", kind))?;
    let controller = PipelineController::with_filter(provider, UploadFilter::new(&settings.accepted_extensions));

    let files = read_inputs(inputs)?;
    let mut printed = 0;

    let outcome = controller.upload_files(files).await;
    print_new_entries(&controller.snapshot(), &mut printed);
    let mut succeeded = outcome.is_completed();

    if succeeded {
        succeeded = controller.generate_plan().await.is_completed();
        print_new_entries(&controller.snapshot(), &mut printed);
    }

    if succeeded && !options.plan_only {
        succeeded = controller.transform_code().await.is_completed();
        print_new_entries(&controller.snapshot(), &mut printed);
    }

    if succeeded && controller.stage().is_terminal() {
        for question in &options.questions {
            if let StepOutcome::Failed { .. } = controller.send_chat_message(question).await {
                succeeded = false;
            }
            print_new_entries(&controller.snapshot(), &mut printed);
        }
    }

    let snapshot = controller.snapshot();

    if let Some(dir) = options.output_dir {
        write_output_dir(&dir, &snapshot.output_files()).await?;
    }

    if options.save {
        let store = SessionStore::open(&SessionStore::base_directory()?, snapshot.session_id).await?;
        store.save(&snapshot).await?;
        eprintln!("\n[Session {} saved to {}]", snapshot.session_id, store.session_dir().display());
    }

    if !succeeded {
        anyhow::bail!("Session {} stopped at stage '{}'", snapshot.session_id, snapshot.stage);
    }

    eprintln!("\n[Session {} finished at stage '{}']", snapshot.session_id, snapshot.stage);
    Ok(())
}

/// Read files, expanding directories one level deep
fn read_inputs(inputs: &[PathBuf]) -> Result<Vec<UploadedFile>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("Failed to read directory: {}", input.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file())
                .collect();
            entries.sort();
            for path in entries {
                files.push(read_file(&path)?);
            }
        } else {
            files.push(read_file(input)?);
        }
    }

    Ok(files)
}

fn read_file(path: &Path) -> Result<UploadedFile> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .with_context(|| format!("Not a file: {}", path.display()))?;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    Ok(UploadedFile::new(name, content))
}

async fn write_output_dir(dir: &Path, outputs: &[OutputFile]) -> Result<Vec<PathBuf>> {
    if outputs.is_empty() {
        return Ok(Vec::new());
    }

    let names = output_file_names(outputs)?;
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let mut written = Vec::with_capacity(outputs.len());
    for (file, name) in outputs.iter().zip(names) {
        let path = dir.join(name);
        tokio::fs::write(&path, &file.content)
            .await
            .with_context(|| format!("Failed to write output file: {}", path.display()))?;
        eprintln!("Wrote {}", path.display());
        written.push(path);
    }

    Ok(written)
}

fn print_new_entries(snapshot: &PipelineSnapshot, printed: &mut usize) {
    for entry in snapshot.transcript.iter().skip(*printed) {
        print_entry(entry);
    }
    *printed = snapshot.transcript.len();
}

fn print_entry(entry: &TranscriptEntry) {
    let who = match entry.author {
        Author::User => "you",
        Author::Assistant => "assistant",
    };

    if let Some(ref text) = entry.text {
        println!("[{}] {}", who, text);
    }
    if let Some(ref analysis) = entry.analysis {
        println!("[{}] Analysis:\n{}", who, analysis);
    }
    if let Some(ref items) = entry.plan {
        println!("[{}] Modernization plan:\n{}", who, plan::numbered(items));
    }
}

/// List saved sessions
async fn list_sessions() -> Result<()> {
    let base = SessionStore::base_directory()?;
    let sessions = SessionStore::list_sessions(&base).await?;

    if sessions.is_empty() {
        println!("No sessions found");
        return Ok(());
    }

    println!("{:<38} {:<12} {:<10}", "SESSION ID", "STAGE", "OUTPUTS");
    println!("{}", "-".repeat(62));

    for session_id in sessions {
        let store = SessionStore::open(&base, session_id).await?;
        match store.summary().await? {
            Some(summary) => println!(
                "{:<38} {:<12} {:<10}",
                session_id,
                summary.stage.to_string(),
                summary.output_files.len()
            ),
            None => println!("{:<38} {:<12}", session_id, "unknown"),
        }
    }

    Ok(())
}

/// Print a saved transcript
async fn show_session(session_id_str: &str) -> Result<()> {
    let session_id = Uuid::parse_str(session_id_str)
        .with_context(|| format!("Invalid session ID: {}", session_id_str))?;

    let base = SessionStore::base_directory()?;
    if !base.join(session_id.to_string()).is_dir() {
        anyhow::bail!("Session {} not found", session_id);
    }

    let store = SessionStore::open(&base, session_id).await?;
    let entries = store.replay().await?;

    for entry in &entries {
        print_entry(entry);
    }

    if let Some(summary) = store.summary().await? {
        eprintln!("\n[Stage: {} | outputs: {}]", summary.stage, summary.output_files.join(", "));
    }

    Ok(())
}

/// Show resolved configuration, without secrets
fn show_config(settings: &Settings) -> Result<()> {
    println!("Config file: {}", display_opt(settings.config_file.as_ref().map(|p| p.display().to_string())));
    println!("Default provider: {}", settings.provider);
    println!("Accepted extensions: {}", settings.accepted_extensions.join(", "));

    for kind in [ProviderKind::Gemini, ProviderKind::Azure] {
        let provider = settings.provider_config(kind);
        println!("\n[{}]", kind);
        println!("  endpoint: {}", display_opt(provider.endpoint));
        println!("  model: {}", display_opt(provider.model_name));
        println!(
            "  credential: {}",
            if provider.credential.is_some() { "set" } else { "not set" }
        );
        println!(
            "  retries: {} attempts, {}ms unit",
            provider.retry.max_attempts, provider.retry.delay_unit_ms
        );
        println!("  request timeout: {:?}", provider.request_timeout);
    }

    Ok(())
}

fn display_opt(value: Option<String>) -> String {
    value.unwrap_or_else(|| "(not set)".to_string())
}
