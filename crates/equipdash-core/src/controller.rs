use std::collections::VecDeque;
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{ClientError, SummaryClient, UPLOAD_FALLBACK_MESSAGE};
use crate::report::ReportArchive;
use crate::summary::{SummaryPayload, UploadFile};

pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch data.";

/// Last known payload with independent loading and error layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardState {
    pub payload: Option<SummaryPayload>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase<'a> {
    Empty,
    Loading,
    Loaded(&'a SummaryPayload),
    Failed(&'a str),
}

impl DashboardState {
    pub fn phase(&self) -> Phase<'_> {
        if self.loading {
            return Phase::Loading;
        }
        if let Some(message) = self.error.as_deref() {
            return Phase::Failed(message);
        }
        match &self.payload {
            Some(payload) => Phase::Loaded(payload),
            None => Phase::Empty,
        }
    }

    /// Each transition is published as one update, so a settled request
    /// never shows up as loading and failed at once.
    pub(crate) fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::Fetched(fetched) => self.apply_fetch(fetched),
            Transition::UploadStarted => {
                self.loading = true;
                self.error = None;
            }
            Transition::UploadFailed(message) => {
                self.error = Some(message);
                self.loading = false;
            }
            Transition::UploadRefetched(fetched) => {
                self.apply_fetch(fetched);
                self.loading = false;
            }
        }
    }

    fn apply_fetch(&mut self, fetched: Fetched) {
        match fetched {
            Fetched::Payload(payload) => {
                self.payload = Some(payload);
                self.error = None;
            }
            Fetched::Empty => self.error = None,
            Fetched::Failed => self.error = Some(FETCH_FAILED_MESSAGE.to_string()),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Fetched {
    Payload(SummaryPayload),
    Empty,
    Failed,
}

impl Fetched {
    fn outcome(&self) -> FetchOutcome {
        match self {
            Fetched::Payload(_) => FetchOutcome::Loaded,
            Fetched::Empty => FetchOutcome::Empty,
            Fetched::Failed => FetchOutcome::Failed,
        }
    }
}

#[derive(Debug)]
pub(crate) enum Transition {
    Fetched(Fetched),
    UploadStarted,
    UploadFailed(String),
    UploadRefetched(Fetched),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Loaded,
    Empty,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Ignored,
    Completed(FetchOutcome),
    Rejected,
}

#[derive(Debug)]
pub enum DashboardAction {
    Mount,
    Refresh,
    Upload(Option<UploadFile>),
    Export,
}

pub struct DashboardController<C: SummaryClient> {
    client: Arc<C>,
    archive: ReportArchive,
    state: DashboardState,
    updates: watch::Sender<DashboardState>,
}

impl<C: SummaryClient + 'static> DashboardController<C> {
    pub fn new(client: Arc<C>, archive: ReportArchive) -> Self {
        let (updates, _) = watch::channel(DashboardState::default());
        Self {
            client,
            archive,
            state: DashboardState::default(),
            updates,
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.updates.subscribe()
    }

    pub async fn mount(&mut self) -> FetchOutcome {
        self.fetch().await
    }

    pub async fn refresh(&mut self) -> FetchOutcome {
        self.fetch().await
    }

    pub async fn upload(&mut self, file: Option<UploadFile>) -> UploadOutcome {
        let Some(file) = file else {
            debug!("upload requested without a file, ignoring");
            return UploadOutcome::Ignored;
        };

        self.transition(Transition::UploadStarted);
        match self.client.upload(&file).await {
            Ok(()) => {
                info!(filename = %file.filename, "upload accepted, refreshing summary");
                let fetched = self.load().await;
                let outcome = fetched.outcome();
                self.transition(Transition::UploadRefetched(fetched));
                UploadOutcome::Completed(outcome)
            }
            Err(ClientError::Validation(message)) => {
                warn!(filename = %file.filename, %message, "upload rejected");
                self.transition(Transition::UploadFailed(message));
                UploadOutcome::Rejected
            }
            Err(err) => {
                warn!(filename = %file.filename, error = %err, "upload failed");
                self.transition(Transition::UploadFailed(UPLOAD_FALLBACK_MESSAGE.to_string()));
                UploadOutcome::Rejected
            }
        }
    }

    /// Downloads the report in the background; dashboard state is untouched.
    pub fn request_export(&self) -> JoinHandle<()> {
        let client = Arc::clone(&self.client);
        let archive = self.archive.clone();

        tokio::spawn(async move {
            match client.export_report().await {
                Ok(document) => match archive.store(&document, SystemTime::now()) {
                    Ok(path) => info!(path = %path.display(), "report saved"),
                    Err(err) => warn!(error = %err, "failed to save report"),
                },
                Err(err) => warn!(error = %err, "report export failed"),
            }
        })
    }

    pub async fn handle(&mut self, action: DashboardAction) {
        match action {
            DashboardAction::Mount => {
                self.mount().await;
            }
            DashboardAction::Refresh => {
                self.refresh().await;
            }
            DashboardAction::Upload(file) => {
                self.upload(file).await;
            }
            DashboardAction::Export => {
                self.request_export();
            }
        }
    }

    /// Processes actions in order. Uploads that were already queued when an
    /// upload settles were submitted while it was in flight and are dropped.
    pub async fn run(mut self, mut actions: mpsc::Receiver<DashboardAction>) {
        let mut pending = VecDeque::new();

        loop {
            let action = match pending.pop_front() {
                Some(action) => action,
                None => match actions.recv().await {
                    Some(action) => action,
                    None => break,
                },
            };
            debug!(?action, "dashboard action");

            let started_upload = matches!(action, DashboardAction::Upload(Some(_)));
            self.handle(action).await;

            if started_upload {
                while let Ok(queued) = actions.try_recv() {
                    if let DashboardAction::Upload(Some(file)) = &queued {
                        warn!(filename = %file.filename, "upload submitted while another was in flight, ignoring");
                        continue;
                    }
                    pending.push_back(queued);
                }
            }
        }
    }

    async fn fetch(&mut self) -> FetchOutcome {
        let fetched = self.load().await;
        let outcome = fetched.outcome();
        self.transition(Transition::Fetched(fetched));
        outcome
    }

    async fn load(&self) -> Fetched {
        match self.client.fetch_summary().await {
            Ok(payload) => {
                info!(filename = %payload.filename, rows = payload.data.len(), "summary loaded");
                Fetched::Payload(payload)
            }
            Err(ClientError::NoContent) => {
                info!("no summary available yet");
                Fetched::Empty
            }
            Err(err) => {
                warn!(error = %err, "summary fetch failed");
                Fetched::Failed
            }
        }
    }

    fn transition(&mut self, transition: Transition) {
        self.state.apply(transition);
        self.updates.send_replace(self.state.clone());
    }
}
