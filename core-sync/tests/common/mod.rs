//! Recording fakes for the host bridges.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::{
    Choice, CredentialStore, LogEntry, LoggerSink, ProgressHandle, ProgressOptions,
    ProgressReporter, ProgressResult, ProjectId, ProjectStore, PromptContext, PromptKind,
    PromptService, SaveMode, SyncLauncher,
};
use core_runtime::config::{OrchestratorConfig, OrchestratorConfigBuilder};
use core_runtime::events::{StatusBus, SyncStatus};
use core_sync::{OrchestratorEvent, SyncBridges, SyncOrchestrator};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

// ----------------------------------------------------------------------------
// Progress
// ----------------------------------------------------------------------------

#[derive(Default)]
struct ProgressState {
    shown: usize,
    dropped: usize,
    ticks: Vec<u64>,
    responses: VecDeque<ProgressResult>,
}

#[derive(Default, Clone)]
pub struct FakeProgress {
    state: Arc<Mutex<ProgressState>>,
}

impl FakeProgress {
    /// Responses handed out by successive polls; `Continue` once exhausted.
    pub fn script(&self, responses: &[ProgressResult]) {
        self.state
            .lock()
            .unwrap()
            .responses
            .extend(responses.iter().copied());
    }

    pub fn shown(&self) -> usize {
        self.state.lock().unwrap().shown
    }

    pub fn dropped(&self) -> usize {
        self.state.lock().unwrap().dropped
    }

    pub fn ticks(&self) -> Vec<u64> {
        self.state.lock().unwrap().ticks.clone()
    }
}

struct FakeHandle {
    state: Arc<Mutex<ProgressState>>,
}

impl ProgressHandle for FakeHandle {
    fn poll(&mut self, value: u64, _max: u64) -> ProgressResult {
        let mut state = self.state.lock().unwrap();
        state.ticks.push(value);
        state.responses.pop_front().unwrap_or(ProgressResult::Continue)
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.state.lock().unwrap().dropped += 1;
    }
}

impl ProgressReporter for FakeProgress {
    fn show_progress(
        &self,
        _title: &str,
        _message: &str,
        _options: ProgressOptions,
    ) -> Box<dyn ProgressHandle> {
        self.state.lock().unwrap().shown += 1;
        Box::new(FakeHandle {
            state: self.state.clone(),
        })
    }
}

// ----------------------------------------------------------------------------
// Prompts
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct FakePrompts {
    answers: Mutex<HashMap<PromptKind, Choice>>,
    shown: Mutex<Vec<(PromptKind, PromptContext)>>,
    unanswered: AtomicBool,
}

impl FakePrompts {
    pub fn answer(&self, kind: PromptKind, choice: Choice) {
        self.answers.lock().unwrap().insert(kind, choice);
    }

    /// Every later prompt stays open forever.
    pub fn never_answer(&self) {
        self.unanswered.store(true, Ordering::SeqCst);
    }

    pub fn shown(&self) -> Vec<PromptKind> {
        self.shown.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }

    pub fn contexts(&self) -> Vec<(PromptKind, PromptContext)> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl PromptService for FakePrompts {
    async fn prompt_choice(&self, kind: PromptKind, context: PromptContext) -> Result<Choice> {
        self.shown.lock().unwrap().push((kind, context));
        if self.unanswered.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(self
            .answers
            .lock()
            .unwrap()
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.fallback_choice()))
    }
}

// ----------------------------------------------------------------------------
// Project, launcher, credentials, logger
// ----------------------------------------------------------------------------

pub struct FakeProjects {
    saves_count: Mutex<Result<u64>>,
    resave_result: Mutex<bool>,
    resaves: Mutex<usize>,
    reopens: Mutex<usize>,
}

impl FakeProjects {
    pub fn with_saves(count: u64) -> Self {
        Self {
            saves_count: Mutex::new(Ok(count)),
            resave_result: Mutex::new(true),
            resaves: Mutex::new(0),
            reopens: Mutex::new(0),
        }
    }

    pub fn failing_counter() -> Self {
        let projects = Self::with_saves(0);
        *projects.saves_count.lock().unwrap() =
            Err(BridgeError::NotAvailable("counter".to_string()));
        projects
    }

    pub fn resave_succeeds(&self, succeeds: bool) {
        *self.resave_result.lock().unwrap() = succeeds;
    }

    pub fn resaves(&self) -> usize {
        *self.resaves.lock().unwrap()
    }

    pub fn reopens(&self) -> usize {
        *self.reopens.lock().unwrap()
    }
}

#[async_trait]
impl ProjectStore for FakeProjects {
    async fn resave_locally(&self, _project: &ProjectId) -> Result<bool> {
        *self.resaves.lock().unwrap() += 1;
        Ok(*self.resave_result.lock().unwrap())
    }

    async fn reopen_project(&self, _project: &ProjectId) -> Result<()> {
        *self.reopens.lock().unwrap() += 1;
        Ok(())
    }

    async fn saves_count(&self, _project: &ProjectId) -> Result<u64> {
        match &*self.saves_count.lock().unwrap() {
            Ok(count) => Ok(*count),
            Err(e) => Err(BridgeError::NotAvailable(e.to_string())),
        }
    }
}

#[derive(Default)]
pub struct FakeLauncher {
    modes: Mutex<Vec<SaveMode>>,
}

impl FakeLauncher {
    pub fn modes(&self) -> Vec<SaveMode> {
        self.modes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncLauncher for FakeLauncher {
    async fn trigger_sync(&self, _project: &ProjectId, mode: SaveMode) -> Result<()> {
        self.modes.lock().unwrap().push(mode);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeCredentials {
    unlinked: Mutex<usize>,
}

impl FakeCredentials {
    pub fn unlinked(&self) -> usize {
        *self.unlinked.lock().unwrap()
    }
}

#[async_trait]
impl CredentialStore for FakeCredentials {
    async fn unlink_credentials(&self) -> Result<()> {
        *self.unlinked.lock().unwrap() += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogger {
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl LoggerSink for MemoryLogger {
    async fn log(&self, entry: LogEntry) -> Result<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Harness
// ----------------------------------------------------------------------------

pub struct Harness {
    pub project: ProjectId,
    pub bus: StatusBus,
    pub progress: FakeProgress,
    pub prompts: Arc<FakePrompts>,
    pub projects: Arc<FakeProjects>,
    pub launcher: Arc<FakeLauncher>,
    pub credentials: Arc<FakeCredentials>,
    pub logger: Arc<MemoryLogger>,
}

impl Harness {
    pub fn new(projects: FakeProjects) -> Self {
        Self {
            project: ProjectId::new(),
            bus: StatusBus::new(32),
            progress: FakeProgress::default(),
            prompts: Arc::new(FakePrompts::default()),
            projects: Arc::new(projects),
            launcher: Arc::new(FakeLauncher::default()),
            credentials: Arc::new(FakeCredentials::default()),
            logger: Arc::new(MemoryLogger::default()),
        }
    }

    pub fn bridges(&self) -> SyncBridges {
        SyncBridges::builder()
            .progress_reporter(Arc::new(self.progress.clone()))
            .prompt_service(self.prompts.clone())
            .project_store(self.projects.clone())
            .sync_launcher(self.launcher.clone())
            .credential_store(self.credentials.clone())
            .logger_sink(self.logger.clone())
            .build()
            .expect("all bridges provided")
    }

    pub fn attach(&self) -> SyncOrchestrator {
        self.attach_with(OrchestratorConfig::builder())
    }

    pub fn attach_with(&self, config: OrchestratorConfigBuilder) -> SyncOrchestrator {
        let config = config
            .close_poll_interval(Duration::from_millis(5))
            .build()
            .expect("valid config");
        SyncOrchestrator::attach(self.project, &self.bus, self.bridges(), config)
            .expect("attach inside runtime")
    }

    pub fn publish(&self, status: SyncStatus) {
        self.bus.publish(status);
    }
}

pub async fn next_event(events: &mut broadcast::Receiver<OrchestratorEvent>) -> OrchestratorEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("orchestrator event in time")
        .expect("event channel open")
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
