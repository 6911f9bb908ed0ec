//! Analysis session engine: sequences summary → match → cover letter.
//!
//! Flow: submit(resume) → reset everything → stream summary → match jobs →
//!       (select job → stream cover letter)*
//!
//! Re-entrant from the top: a new submission may start while an older one is
//! still streaming. Every in-flight phase holds a `Ticket` stamped with the
//! submission generation (and, for cover letters, the letter generation). A
//! fragment or response whose ticket is no longer current is discarded, so stale
//! output never reaches the shared state.
//!
//! All session state is owned here. Consumers read it through `snapshot()` and
//! `subscribe()`; it changes only through the transitions below.

use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::accumulator::{Channel, TextAccumulator};
use crate::backend::AnalysisBackend;
use crate::errors::{ClientError, FailureKind};
use crate::models::{Job, ResumeInput};
use crate::session::SessionId;
use crate::stream::FragmentStream;

// ────────────────────────────────────────────────────────────────────────────
// State model
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    SummaryPending,
    Matching,
    Ready,
}

/// Cover-letter sub-state; only leaves `Idle` once a job has been selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LetterPhase {
    #[default]
    Idle,
    Pending,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Summary,
    Matching,
    CoverLetter,
}

/// Last failure of the current submission, kept for a retry affordance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseFailure {
    pub stage: Stage,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedJob {
    pub id: String,
    /// "{title} @ {company}"
    pub name: String,
}

/// Read-only copy of the session state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub generation: u64,
    pub phase: Phase,
    pub letter_phase: LetterPhase,
    pub summary: String,
    pub cover_letter: String,
    pub matched_jobs: Vec<Job>,
    pub selected_job: Option<SelectedJob>,
    /// Set once a cover letter was requested in this submission, selection or not.
    pub letter_requested: bool,
    pub failure: Option<PhaseFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Ready { matched: usize },
    /// A newer submission took over before this one finished.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverLetterOutcome {
    Ready,
    /// No job selected; only the request marker was recorded.
    NoSelection,
    Superseded,
}

/// Stamp carried by one in-flight phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    channel: Channel,
    generation: u64,
    letter: u64,
}

#[derive(Debug, Default)]
struct AnalysisState {
    generation: u64,
    letter_generation: u64,
    phase: Phase,
    letter_phase: LetterPhase,
    matched_jobs: Vec<Job>,
    selected_job: Option<SelectedJob>,
    letter_requested: bool,
    failure: Option<PhaseFailure>,
}

impl AnalysisState {
    fn is_current(&self, ticket: Ticket) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        match ticket.channel {
            Channel::Summary => self.phase == Phase::SummaryPending,
            Channel::CoverLetter => {
                ticket.letter == self.letter_generation
                    && self.letter_phase == LetterPhase::Pending
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

pub struct AnalysisSession<B> {
    backend: B,
    session_id: SessionId,
    text: TextAccumulator,
    state: Mutex<AnalysisState>,
}

impl<B: AnalysisBackend> AnalysisSession<B> {
    pub fn new(backend: B) -> Self {
        Self::with_session_id(backend, SessionId::generate())
    }

    pub fn with_session_id(backend: B, session_id: SessionId) -> Self {
        Self {
            backend,
            session_id,
            text: TextAccumulator::new(),
            state: Mutex::new(AnalysisState::default()),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn phase(&self) -> Phase {
        self.state().phase
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state();
        SessionSnapshot {
            generation: state.generation,
            phase: state.phase,
            letter_phase: state.letter_phase,
            summary: self.text.current(Channel::Summary),
            cover_letter: self.text.current(Channel::CoverLetter),
            matched_jobs: state.matched_jobs.clone(),
            selected_job: state.selected_job.clone(),
            letter_requested: state.letter_requested,
            failure: state.failure.clone(),
        }
    }

    /// Observes a text channel as it grows (e.g. to drive a reveal projector).
    pub fn subscribe(&self, channel: Channel) -> watch::Receiver<String> {
        self.text.subscribe(channel)
    }

    /// Runs a full analysis: summary stream, then job matching.
    ///
    /// Invalid input is rejected before any state changes. Otherwise all previous
    /// results are cleared before the first request goes out.
    pub async fn submit(&self, resume: ResumeInput) -> Result<SubmitOutcome, ClientError> {
        let ticket = self.begin_submission(&resume)?;
        info!(
            "Submission {} started ({} resume, session {})",
            ticket.generation,
            resume.mode(),
            self.session_id
        );

        let stream = match self
            .backend
            .open_summary_stream(self.session_id, &resume)
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                return self
                    .fail(ticket, Stage::Summary, e)
                    .map(|_| SubmitOutcome::Superseded)
            }
        };

        match self.pump(ticket, stream).await {
            Ok(true) => {}
            Ok(false) => return Ok(SubmitOutcome::Superseded),
            Err(e) => {
                return self
                    .fail(ticket, Stage::Summary, e)
                    .map(|_| SubmitOutcome::Superseded)
            }
        }

        if !self.summary_finished(ticket) {
            return Ok(SubmitOutcome::Superseded);
        }

        let jobs = match self.backend.match_jobs(self.session_id).await {
            Ok(jobs) => jobs,
            Err(e) => {
                return self
                    .fail(ticket, Stage::Matching, e)
                    .map(|_| SubmitOutcome::Superseded)
            }
        };

        Ok(self.matching_finished(ticket, jobs))
    }

    /// Records the job a cover letter should be written for. No network activity.
    pub fn select_job(&self, job_id: &str) -> Result<SelectedJob, ClientError> {
        let mut state = self.state();
        let job = state
            .matched_jobs
            .iter()
            .find(|job| job.id == job_id)
            .ok_or_else(|| ClientError::UnknownJob(job_id.to_string()))?;

        let selected = SelectedJob {
            id: job.id.clone(),
            name: job.display_name(),
        };
        info!("Selected job {} ({})", selected.id, selected.name);
        state.selected_job = Some(selected.clone());
        Ok(selected)
    }

    /// Streams a cover letter for the selected job, replacing any previous one.
    pub async fn generate_cover_letter(&self) -> Result<CoverLetterOutcome, ClientError> {
        let (ticket, job_id) = {
            let mut state = self.state();
            state.letter_requested = true;
            let Some(selected) = state.selected_job.clone() else {
                debug!("Cover letter requested without a selected job");
                return Ok(CoverLetterOutcome::NoSelection);
            };

            state.letter_generation += 1;
            state.letter_phase = LetterPhase::Pending;
            if matches!(&state.failure, Some(f) if f.stage == Stage::CoverLetter) {
                state.failure = None;
            }
            self.text.reset(Channel::CoverLetter);

            let ticket = Ticket {
                channel: Channel::CoverLetter,
                generation: state.generation,
                letter: state.letter_generation,
            };
            (ticket, selected.id)
        };

        let stream = match self
            .backend
            .open_cover_letter_stream(self.session_id, &job_id)
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                return self
                    .fail(ticket, Stage::CoverLetter, e)
                    .map(|_| CoverLetterOutcome::Superseded)
            }
        };

        match self.pump(ticket, stream).await {
            Ok(true) => {}
            Ok(false) => return Ok(CoverLetterOutcome::Superseded),
            Err(e) => {
                return self
                    .fail(ticket, Stage::CoverLetter, e)
                    .map(|_| CoverLetterOutcome::Superseded)
            }
        }

        let mut state = self.state();
        if !state.is_current(ticket) {
            return Ok(CoverLetterOutcome::Superseded);
        }
        state.letter_phase = LetterPhase::Ready;
        info!("Cover letter ready for job {job_id}");
        Ok(CoverLetterOutcome::Ready)
    }

    // ── transitions ─────────────────────────────────────────────────────────

    fn state(&self) -> MutexGuard<'_, AnalysisState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Idle/any → SummaryPending. Validation runs first; on failure nothing changes.
    fn begin_submission(&self, resume: &ResumeInput) -> Result<Ticket, ClientError> {
        resume.validate()?;

        let mut state = self.state();
        state.generation += 1;
        state.letter_generation += 1;
        state.phase = Phase::SummaryPending;
        state.letter_phase = LetterPhase::Idle;
        state.matched_jobs.clear();
        state.selected_job = None;
        state.letter_requested = false;
        state.failure = None;
        self.text.reset(Channel::Summary);
        self.text.reset(Channel::CoverLetter);

        Ok(Ticket {
            channel: Channel::Summary,
            generation: state.generation,
            letter: state.letter_generation,
        })
    }

    /// Applies one fragment if its ticket is still current. Returns false if discarded.
    fn apply(&self, ticket: Ticket, fragment: &str) -> bool {
        let state = self.state();
        if !state.is_current(ticket) {
            warn!(
                "Discarding stale {:?} fragment from generation {} (current {})",
                ticket.channel, ticket.generation, state.generation
            );
            return false;
        }
        self.text.apply(ticket.channel, fragment);
        true
    }

    /// Feeds a stream into its channel in arrival order until it ends or fails.
    /// A superseded stream is drained, not aborted; `Ok(false)` if anything was discarded.
    async fn pump(&self, ticket: Ticket, mut stream: FragmentStream) -> Result<bool, ClientError> {
        let (mut applied, mut discarded) = (0usize, 0usize);
        while let Some(item) = stream.next().await {
            let fragment = item?;
            if self.apply(ticket, &fragment) {
                applied += 1;
            } else {
                discarded += 1;
            }
        }
        debug!(
            "{:?} stream for generation {} ended ({applied} applied, {discarded} discarded)",
            ticket.channel, ticket.generation
        );
        Ok(discarded == 0)
    }

    /// SummaryPending → Matching.
    fn summary_finished(&self, ticket: Ticket) -> bool {
        let mut state = self.state();
        if !state.is_current(ticket) {
            return false;
        }
        state.phase = Phase::Matching;
        info!("Summary for generation {} complete; matching jobs", ticket.generation);
        true
    }

    /// Matching → Ready. The list replaces the previous one wholesale, order kept.
    fn matching_finished(&self, ticket: Ticket, jobs: Vec<Job>) -> SubmitOutcome {
        let mut state = self.state();
        if state.generation != ticket.generation || state.phase != Phase::Matching {
            debug!("Dropping match results for stale generation {}", ticket.generation);
            return SubmitOutcome::Superseded;
        }
        let matched = jobs.len();
        state.matched_jobs = jobs;
        state.phase = Phase::Ready;
        info!("Generation {} ready with {matched} matched jobs", ticket.generation);
        SubmitOutcome::Ready { matched }
    }

    /// Records a failure for the current submission. Stale failures are ignored:
    /// `Ok(())` means the phase had already been superseded.
    fn fail(&self, ticket: Ticket, stage: Stage, err: ClientError) -> Result<(), ClientError> {
        let mut state = self.state();
        if state.generation != ticket.generation
            || (stage == Stage::CoverLetter && state.letter_generation != ticket.letter)
        {
            debug!("Ignoring {stage:?} failure from stale generation: {err}");
            return Ok(());
        }
        warn!("{stage:?} phase failed ({:?}): {err}", err.kind());
        state.failure = Some(PhaseFailure {
            stage,
            kind: err.kind(),
            message: err.to_string(),
        });
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures::stream;
    use tokio::sync::mpsc;

    use super::*;
    use crate::models::job::sample_job;

    // ── scripted backend ────────────────────────────────────────────────────

    #[derive(Default)]
    struct ScriptedBackend {
        summaries: Mutex<VecDeque<Result<FragmentStream, ClientError>>>,
        matches: Mutex<VecDeque<Result<Vec<Job>, ClientError>>>,
        letters: Mutex<VecDeque<Result<FragmentStream, ClientError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn summary(self, stream: FragmentStream) -> Self {
            self.summaries.lock().unwrap().push_back(Ok(stream));
            self
        }

        fn summary_error(self, err: ClientError) -> Self {
            self.summaries.lock().unwrap().push_back(Err(err));
            self
        }

        fn matches(self, jobs: Result<Vec<Job>, ClientError>) -> Self {
            self.matches.lock().unwrap().push_back(jobs);
            self
        }

        fn letter(self, stream: FragmentStream) -> Self {
            self.letters.lock().unwrap().push_back(Ok(stream));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AnalysisBackend for ScriptedBackend {
        async fn open_summary_stream(
            &self,
            session: SessionId,
            resume: &ResumeInput,
        ) -> Result<FragmentStream, ClientError> {
            assert!(!session.as_uuid().is_nil());
            self.calls
                .lock()
                .unwrap()
                .push(format!("summary:{}", resume.mode()));
            self.summaries
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected summary request")
        }

        async fn match_jobs(&self, _session: SessionId) -> Result<Vec<Job>, ClientError> {
            self.calls.lock().unwrap().push("match".to_string());
            self.matches
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected match request")
        }

        async fn open_cover_letter_stream(
            &self,
            _session: SessionId,
            job_id: &str,
        ) -> Result<FragmentStream, ClientError> {
            self.calls.lock().unwrap().push(format!("letter:{job_id}"));
            self.letters
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected cover letter request")
        }
    }

    fn fragments(parts: &[&str]) -> FragmentStream {
        let items: Vec<Result<String, ClientError>> =
            parts.iter().map(|p| Ok(p.to_string())).collect();
        Box::pin(stream::iter(items))
    }

    /// A stream the test feeds by hand; closes when the sender is dropped.
    fn live_stream() -> (
        mpsc::UnboundedSender<Result<String, ClientError>>,
        FragmentStream,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        (tx, Box::pin(stream))
    }

    fn text(body: &str) -> ResumeInput {
        ResumeInput::Text(format!("{body}: seasoned engineer with Rust experience"))
    }

    fn ranked_jobs() -> Vec<Job> {
        let mut best = sample_job("2", "Globex", "Globex", &["backend"]);
        best.cosine_similarity = Some(0.91);
        best.reason = Some("Backend focus".to_string());
        let mut next = sample_job("1", "Acme", "Acme", &["frontend"]);
        next.cosine_similarity = Some(0.74);
        vec![best, next]
    }

    async fn ready_session() -> AnalysisSession<ScriptedBackend> {
        let backend = ScriptedBackend::default()
            .summary(fragments(&["Hel", "lo, ", "world"]))
            .matches(Ok(ranked_jobs()));
        let session = AnalysisSession::new(backend);
        session.submit(text("first")).await.unwrap();
        session
    }

    // ── submission flow ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_submit_streams_summary_then_matches() {
        let session = ready_session().await;
        let snapshot = session.snapshot();

        assert_eq!(snapshot.summary, "Hello, world");
        assert_eq!(snapshot.phase, Phase::Ready);
        assert_eq!(snapshot.generation, 1);
        let ids: Vec<&str> = snapshot.matched_jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"], "backend order must be kept");
        assert_eq!(session.backend.calls(), vec!["summary:text", "match"]);
    }

    #[tokio::test]
    async fn test_match_waits_for_summary_stream_end() {
        let (tx, stream) = live_stream();
        let backend = ScriptedBackend::default()
            .summary(stream)
            .matches(Ok(ranked_jobs()));
        let session = Arc::new(AnalysisSession::new(backend));
        let mut summary = session.subscribe(Channel::Summary);

        let task = {
            let session = session.clone();
            tokio::spawn(async move { session.submit(text("resume")).await })
        };

        tx.send(Ok("part one".to_string())).unwrap();
        summary.wait_for(|s| s == "part one").await.unwrap();
        assert_eq!(session.phase(), Phase::SummaryPending);
        assert_eq!(session.backend.calls(), vec!["summary:text"]);

        drop(tx);
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, SubmitOutcome::Ready { matched: 2 });
        assert_eq!(session.backend.calls(), vec!["summary:text", "match"]);
    }

    #[tokio::test]
    async fn test_new_submission_clears_previous_results_before_streaming() {
        let (tx, stream) = live_stream();
        let backend = ScriptedBackend::default()
            .summary(fragments(&["old summary"]))
            .matches(Ok(ranked_jobs()))
            .letter(fragments(&["Dear Globex"]))
            .summary(stream)
            .matches(Ok(vec![]));
        let session = Arc::new(AnalysisSession::new(backend));
        session.submit(text("first")).await.unwrap();
        session.select_job("2").unwrap();
        session.generate_cover_letter().await.unwrap();
        assert_eq!(session.snapshot().cover_letter, "Dear Globex");

        let task = {
            let session = session.clone();
            tokio::spawn(async move { session.submit(text("second")).await })
        };
        let mut summary = session.subscribe(Channel::Summary);
        summary.wait_for(|s| s.is_empty()).await.unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, Phase::SummaryPending);
        assert_eq!(snapshot.letter_phase, LetterPhase::Idle);
        assert!(snapshot.summary.is_empty());
        assert!(snapshot.cover_letter.is_empty());
        assert!(snapshot.matched_jobs.is_empty());
        assert!(snapshot.selected_job.is_none());
        assert!(!snapshot.letter_requested);

        drop(tx);
        assert_eq!(
            task.await.unwrap().unwrap(),
            SubmitOutcome::Ready { matched: 0 }
        );
    }

    #[tokio::test]
    async fn test_late_fragment_from_superseded_submission_is_discarded() {
        let (tx, first_stream) = live_stream();
        let backend = ScriptedBackend::default()
            .summary(first_stream)
            .summary(fragments(&["second ", "summary"]))
            .matches(Ok(ranked_jobs()));
        let session = Arc::new(AnalysisSession::new(backend));
        let mut summary = session.subscribe(Channel::Summary);

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.submit(text("resume one")).await })
        };
        tx.send(Ok("first ".to_string())).unwrap();
        tx.send(Ok("draft ".to_string())).unwrap();
        summary.wait_for(|s| s == "first draft ").await.unwrap();

        let second = session.submit(text("resume two")).await.unwrap();
        assert_eq!(second, SubmitOutcome::Ready { matched: 2 });

        tx.send(Ok("late".to_string())).unwrap();
        drop(tx);
        let first = first.await.unwrap().unwrap();

        assert_eq!(first, SubmitOutcome::Superseded);
        assert_eq!(session.snapshot().summary, "second summary");
        assert_eq!(session.snapshot().phase, Phase::Ready);
        assert_eq!(
            session.backend.calls(),
            vec!["summary:text", "summary:text", "match"]
        );
    }

    #[test]
    fn test_stale_generation_never_applies() {
        let session = AnalysisSession::new(ScriptedBackend::default());
        let mut previous = session.begin_submission(&text("gen 1")).unwrap();
        assert!(session.apply(previous, "kept"));

        for _ in 0..5 {
            let current = session.begin_submission(&text("next")).unwrap();
            assert_eq!(current.generation, previous.generation + 1);
            assert!(!session.apply(previous, "stale"));
            assert_eq!(session.snapshot().summary, "");
            assert!(session.apply(current, "fresh"));
            assert_eq!(session.snapshot().summary, "fresh");
            previous = current;
        }
    }

    // ── failures ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_validation_failure_changes_nothing() {
        let session = ready_session().await;
        let before = session.snapshot();

        let err = session
            .submit(ResumeInput::Text("too short".to_string()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::Validation);
        let after = session.snapshot();
        assert_eq!(after.generation, before.generation);
        assert_eq!(after.summary, before.summary);
        assert_eq!(after.matched_jobs, before.matched_jobs);
        assert_eq!(session.backend.calls(), vec!["summary:text", "match"]);
    }

    #[tokio::test]
    async fn test_protocol_violation_keeps_partial_summary() {
        let items: Vec<Result<String, ClientError>> = vec![
            Ok("partial ".to_string()),
            Err(ClientError::TruncatedStream("{\"chunk\": \"cut".to_string())),
        ];
        let backend = ScriptedBackend::default().summary(Box::pin(stream::iter(items)));
        let session = AnalysisSession::new(backend);

        let err = session.submit(text("resume")).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Protocol);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.summary, "partial ");
        assert_eq!(snapshot.phase, Phase::SummaryPending);
        let failure = snapshot.failure.unwrap();
        assert_eq!(failure.stage, Stage::Summary);
        assert_eq!(failure.kind, FailureKind::Protocol);
        assert_eq!(session.backend.calls(), vec!["summary:text"]);
    }

    #[tokio::test]
    async fn test_transport_failure_opening_summary_is_recorded() {
        let backend = ScriptedBackend::default().summary_error(ClientError::Api {
            status: 503,
            message: "unavailable".to_string(),
        });
        let session = AnalysisSession::new(backend);

        let err = session.submit(text("resume")).await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 503, .. }));
        let failure = session.snapshot().failure.unwrap();
        assert_eq!(failure.stage, Stage::Summary);
        assert_eq!(failure.kind, FailureKind::Transport);
    }

    #[tokio::test]
    async fn test_match_failure_leaves_phase_matching() {
        let backend = ScriptedBackend::default()
            .summary(fragments(&["summary"]))
            .matches(Err(ClientError::Api {
                status: 500,
                message: "ranker down".to_string(),
            }));
        let session = AnalysisSession::new(backend);

        assert!(session.submit(text("resume")).await.is_err());
        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, Phase::Matching);
        assert_eq!(snapshot.summary, "summary");
        assert_eq!(snapshot.failure.unwrap().stage, Stage::Matching);
    }

    // ── selection and cover letters ─────────────────────────────────────────

    #[tokio::test]
    async fn test_select_job_records_display_name() {
        let session = ready_session().await;
        let selected = session.select_job("2").unwrap();
        assert_eq!(selected.name, "Engineer 2 @ Globex");
        assert_eq!(session.snapshot().selected_job, Some(selected));
        assert_eq!(session.backend.calls().len(), 2, "selection is local only");
    }

    #[tokio::test]
    async fn test_select_unknown_job_keeps_selection() {
        let session = ready_session().await;
        session.select_job("1").unwrap();
        let err = session.select_job("99").unwrap_err();
        assert!(matches!(err, ClientError::UnknownJob(ref id) if id == "99"));
        assert_eq!(session.snapshot().selected_job.unwrap().id, "1");
    }

    #[tokio::test]
    async fn test_cover_letter_without_selection_only_marks_click() {
        let session = ready_session().await;
        assert!(!session.snapshot().letter_requested);

        let outcome = session.generate_cover_letter().await.unwrap();

        assert_eq!(outcome, CoverLetterOutcome::NoSelection);
        let snapshot = session.snapshot();
        assert!(snapshot.letter_requested);
        assert_eq!(snapshot.letter_phase, LetterPhase::Idle);
        assert!(session.backend.calls().iter().all(|c| !c.starts_with("letter")));
    }

    #[tokio::test]
    async fn test_cover_letter_streams_for_selected_job() {
        let backend = ScriptedBackend::default()
            .summary(fragments(&["summary"]))
            .matches(Ok(ranked_jobs()))
            .letter(fragments(&["Dear hiring team,\n", "I am excited."]));
        let session = AnalysisSession::new(backend);
        session.submit(text("resume")).await.unwrap();
        session.select_job("1").unwrap();

        let outcome = session.generate_cover_letter().await.unwrap();

        assert_eq!(outcome, CoverLetterOutcome::Ready);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.cover_letter, "Dear hiring team,\nI am excited.");
        assert_eq!(snapshot.letter_phase, LetterPhase::Ready);
        assert_eq!(snapshot.summary, "summary", "channels are independent");
        assert_eq!(
            session.backend.calls(),
            vec!["summary:text", "match", "letter:1"]
        );
    }

    #[tokio::test]
    async fn test_second_cover_letter_replaces_first() {
        let (tx, first_letter) = live_stream();
        let backend = ScriptedBackend::default()
            .summary(fragments(&["summary"]))
            .matches(Ok(ranked_jobs()))
            .letter(first_letter)
            .letter(fragments(&["For Acme"]));
        let session = Arc::new(AnalysisSession::new(backend));
        session.submit(text("resume")).await.unwrap();
        session.select_job("2").unwrap();

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.generate_cover_letter().await })
        };
        let mut letter = session.subscribe(Channel::CoverLetter);
        tx.send(Ok("For Glo".to_string())).unwrap();
        letter.wait_for(|s| s == "For Glo").await.unwrap();

        session.select_job("1").unwrap();
        assert_eq!(
            session.generate_cover_letter().await.unwrap(),
            CoverLetterOutcome::Ready
        );
        tx.send(Ok("bex".to_string())).unwrap();
        drop(tx);

        assert_eq!(first.await.unwrap().unwrap(), CoverLetterOutcome::Superseded);
        assert_eq!(session.snapshot().cover_letter, "For Acme");
    }

    #[tokio::test]
    async fn test_resubmission_discards_in_flight_cover_letter() {
        let (tx, letter_stream) = live_stream();
        let backend = ScriptedBackend::default()
            .summary(fragments(&["summary one"]))
            .matches(Ok(ranked_jobs()))
            .letter(letter_stream)
            .summary(fragments(&["summary two"]))
            .matches(Ok(ranked_jobs()));
        let session = Arc::new(AnalysisSession::new(backend));
        session.submit(text("resume one")).await.unwrap();
        session.select_job("2").unwrap();

        let letter_task = {
            let session = session.clone();
            tokio::spawn(async move { session.generate_cover_letter().await })
        };
        let mut letter = session.subscribe(Channel::CoverLetter);
        tx.send(Ok("Dear".to_string())).unwrap();
        letter.wait_for(|s| s == "Dear").await.unwrap();

        session.submit(text("resume two")).await.unwrap();
        tx.send(Ok(" Globex".to_string())).unwrap();
        drop(tx);

        assert_eq!(
            letter_task.await.unwrap().unwrap(),
            CoverLetterOutcome::Superseded
        );
        let snapshot = session.snapshot();
        assert_eq!(snapshot.cover_letter, "");
        assert_eq!(snapshot.summary, "summary two");
        assert_eq!(snapshot.letter_phase, LetterPhase::Idle);
    }
}
