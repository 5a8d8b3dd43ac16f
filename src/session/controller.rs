//! Recording session lifecycle orchestrator.
//!
//! One controller task owns the whole session:
//! acquire device → accumulate chunks → finalize artifact → release device.
//!
//! Commands from [`SessionHandle`]s, chunk deliveries, timer ticks and
//! acquisition completions are all events processed one at a time, in
//! arrival order. Device acquisition is the only asynchronous step and runs
//! in its own task, so the controller never blocks while waiting on a
//! permission prompt.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::artifact::{Artifact, ArtifactInfo, ArtifactRef, ArtifactStore, ChunkBuffer, Download};
use super::error::SessionError;
use super::status::{
    format_elapsed, RecorderVariant, SessionPhase, SessionSnapshot, SessionStatusHandle,
    StreamInfo,
};
use super::timer::ElapsedTimer;
use crate::capture::{CaptureError, CaptureMode, CaptureService, ChunkSink, DeviceStream, MediaChunk, StreamId};
use crate::config::RecorderConfig;

const COMMAND_QUEUE: usize = 16;
const TOGGLE_WARNING: &str = "Stop recording before switching capture mode";

/// Internal events marshalled back into the controller.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    Chunk {
        stream: StreamId,
        chunk: MediaChunk,
    },
    Tick {
        generation: u64,
    },
    Acquired {
        attempt: u64,
        result: Result<DeviceStream, CaptureError>,
    },
}

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

enum Command {
    Start(Reply<SessionSnapshot>),
    Pause(Reply<SessionSnapshot>),
    Stop(Reply<SessionSnapshot>),
    ToggleMode(Reply<CaptureMode>),
    Download(Reply<Download>),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub variant: RecorderVariant,
    /// Starting mode for a switchable recorder
    pub default_mode: CaptureMode,
    pub tick_interval: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            variant: RecorderVariant::Switchable,
            default_mode: CaptureMode::Audio,
            tick_interval: Duration::from_secs(1),
        }
    }
}

impl From<&RecorderConfig> for ControllerOptions {
    fn from(config: &RecorderConfig) -> Self {
        Self {
            variant: config.variant,
            default_mode: config.default_mode,
            tick_interval: config.tick_interval(),
        }
    }
}

struct Session {
    id: Uuid,
    mode: CaptureMode,
    chunks: ChunkBuffer,
    acquisitions: u32,
}

impl Session {
    fn new(mode: CaptureMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            chunks: ChunkBuffer::default(),
            acquisitions: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum CancelRequest {
    Pause,
    Stop,
}

struct Acquisition {
    attempt: u64,
    task: JoinHandle<()>,
    session: Session,
    resuming: bool,
    cancel: Option<CancelRequest>,
    reply: Option<Reply<SessionSnapshot>>,
}

struct Recording {
    session: Session,
    stream: DeviceStream,
    timer: ElapsedTimer,
}

enum Phase {
    Idle,
    Acquiring(Acquisition),
    Recording(Recording),
    Paused(Session),
    Stopped(Option<ArtifactInfo>),
}

impl Phase {
    fn kind(&self) -> SessionPhase {
        match self {
            Phase::Idle => SessionPhase::Idle,
            Phase::Acquiring(_) => SessionPhase::Acquiring,
            Phase::Recording(_) => SessionPhase::Recording,
            Phase::Paused(_) => SessionPhase::Paused,
            Phase::Stopped(_) => SessionPhase::Stopped,
        }
    }
}

pub struct RecordingSessionController {
    capture: Arc<dyn CaptureService>,
    variant: RecorderVariant,
    mode: CaptureMode,
    tick_interval: Duration,
    phase: Phase,
    elapsed_seconds: u64,
    last_duration_seconds: Option<u64>,
    last_error: Option<String>,
    warning: Option<String>,
    attempts: u64,
    timer_generation: u64,
    artifacts: ArtifactStore,
    status: SessionStatusHandle,
    events: mpsc::UnboundedSender<SessionEvent>,
    /// Events pulled off the queue while draining a stopped stream, replayed first.
    deferred: VecDeque<SessionEvent>,
}

impl RecordingSessionController {
    /// Start a controller task and return a handle to drive it.
    ///
    /// The task runs until [`SessionHandle::shutdown`] is called or every
    /// handle has been dropped; either way any held device is released.
    pub fn spawn(capture: Arc<dyn CaptureService>, options: ControllerOptions) -> SessionHandle {
        let mode = options.variant.initial_mode(options.default_mode);
        let status = SessionStatusHandle::new(SessionSnapshot::new(options.variant, mode));
        let artifacts = ArtifactStore::default();
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let controller = Self {
            capture,
            variant: options.variant,
            mode,
            tick_interval: options.tick_interval,
            phase: Phase::Idle,
            elapsed_seconds: 0,
            last_duration_seconds: None,
            last_error: None,
            warning: None,
            attempts: 0,
            timer_generation: 0,
            artifacts: artifacts.clone(),
            status: status.clone(),
            events: events_tx,
            deferred: VecDeque::new(),
        };

        tokio::spawn(controller.run(commands_rx, events_rx));

        SessionHandle {
            commands: commands_tx,
            status,
            artifacts,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        info!(
            "RecordingSessionController: ready ({:?}, {} mode)",
            self.variant, self.mode
        );

        loop {
            if let Some(event) = self.deferred.pop_front() {
                self.handle_event(event).await;
                continue;
            }

            tokio::select! {
                // Events already queued (chunks, ticks) land before any later command.
                biased;
                Some(event) = events.recv() => self.handle_event(event).await,
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command, &mut events).await {
                            break;
                        }
                    }
                    None => {
                        self.shutdown(&mut events).await;
                        break;
                    }
                },
            }
        }

        info!("RecordingSessionController: stopped");
    }

    /// Apply one command. Returns false once the controller should exit.
    async fn handle_command(
        &mut self,
        command: Command,
        events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    ) -> bool {
        match command {
            Command::Start(reply) => self.start(reply).await,
            Command::Pause(reply) => {
                let result = self.pause(events).await;
                self.publish().await;
                let _ = reply.send(result.map(|()| self.snapshot()));
            }
            Command::Stop(reply) => {
                let result = self.stop(events).await;
                self.publish().await;
                let _ = reply.send(result.map(|()| self.snapshot()));
            }
            Command::ToggleMode(reply) => {
                let result = self.toggle_mode();
                self.publish().await;
                let _ = reply.send(result);
            }
            Command::Download(reply) => {
                let _ = reply.send(self.download());
            }
            Command::Shutdown(done) => {
                self.shutdown(events).await;
                let _ = done.send(());
                return false;
            }
        }
        true
    }

    async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Chunk { stream, chunk } => self.on_chunk(stream, chunk),
            SessionEvent::Tick { generation } => {
                let current = matches!(
                    &self.phase,
                    Phase::Recording(recording) if recording.timer.generation() == generation
                );
                if current {
                    self.elapsed_seconds += 1;
                    self.publish().await;
                } else {
                    debug!("Ignoring stale tick from timer {}", generation);
                }
            }
            SessionEvent::Acquired { attempt, result } => self.on_acquired(attempt, result).await,
        }
    }

    async fn start(&mut self, reply: Reply<SessionSnapshot>) {
        let (session, resuming) = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => (Session::new(self.mode), false),
            Phase::Stopped(previous) => {
                if let Some(info) = previous {
                    self.artifacts.revoke(&info.reference).await;
                }
                (Session::new(self.mode), false)
            }
            Phase::Paused(session) => (session, true),
            busy => {
                self.phase = busy;
                let err = self.reject("start");
                self.publish().await;
                let _ = reply.send(Err(err));
                return;
            }
        };

        if !resuming {
            self.elapsed_seconds = 0;
        }
        self.last_error = None;
        self.warning = None;
        self.attempts += 1;

        let attempt = self.attempts;
        let mode = session.mode;
        info!(
            "RecordingSessionController: requesting {} stream for session {} (attempt {})",
            mode, session.id, attempt
        );

        let capture = Arc::clone(&self.capture);
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            let result = capture.request_stream(mode).await;
            let _ = events.send(SessionEvent::Acquired { attempt, result });
        });

        self.phase = Phase::Acquiring(Acquisition {
            attempt,
            task,
            session,
            resuming,
            cancel: None,
            reply: Some(reply),
        });
        self.publish().await;
    }

    async fn on_acquired(&mut self, attempt: u64, result: Result<DeviceStream, CaptureError>) {
        let acquisition = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Acquiring(acquisition) if acquisition.attempt == attempt => acquisition,
            other => {
                self.phase = other;
                if let Ok(stream) = result {
                    warn!(
                        "RecordingSessionController: releasing {} from superseded attempt {}",
                        stream.id(),
                        attempt
                    );
                    self.release(stream).await;
                }
                return;
            }
        };

        let Acquisition {
            session,
            resuming,
            cancel,
            reply,
            ..
        } = acquisition;

        let outcome = match (result, cancel) {
            (Err(err), cancel) => {
                error!("RecordingSessionController: device acquisition failed: {}", err);
                let err = SessionError::from(err);
                self.last_error = Some(err.to_string());
                self.settle(session, resuming, cancel).await;
                Err(err)
            }
            (Ok(stream), Some(cancel)) => {
                info!(
                    "RecordingSessionController: {:?} arrived during acquisition, releasing {}",
                    cancel,
                    stream.id()
                );
                self.release(stream).await;
                self.settle(session, resuming, Some(cancel)).await;
                Err(SessionError::AcquisitionCancelled)
            }
            (Ok(stream), None) => self.begin_recording(session, stream, resuming).await,
        };

        self.publish().await;
        if let Some(reply) = reply {
            let _ = reply.send(outcome.map(|()| self.snapshot()));
        }
    }

    async fn begin_recording(
        &mut self,
        mut session: Session,
        stream: DeviceStream,
        resuming: bool,
    ) -> Result<(), SessionError> {
        let sink = ChunkSink::new(stream.id(), self.events.clone());
        if let Err(err) = self.capture.on_data(&stream, sink) {
            error!(
                "RecordingSessionController: could not attach to {}: {}",
                stream.id(),
                err
            );
            self.release(stream).await;
            let err = SessionError::from(err);
            self.last_error = Some(err.to_string());
            self.settle(session, resuming, None).await;
            return Err(err);
        }

        session.acquisitions += 1;
        self.timer_generation += 1;
        let timer = ElapsedTimer::start(
            self.timer_generation,
            self.tick_interval,
            self.events.clone(),
        );

        info!(
            "RecordingSessionController: recording {} on {} (session {}, acquisition #{})",
            stream.mode(),
            stream.id(),
            session.id,
            session.acquisitions
        );

        self.phase = Phase::Recording(Recording {
            session,
            stream,
            timer,
        });
        Ok(())
    }

    /// Where a session lands when an acquisition does not end in Recording.
    async fn settle(&mut self, session: Session, resuming: bool, cancel: Option<CancelRequest>) {
        match (resuming, cancel) {
            (false, _) => {
                self.elapsed_seconds = 0;
                self.phase = Phase::Idle;
            }
            (true, Some(CancelRequest::Stop)) => {
                let _ = self.finalize(session).await;
            }
            (true, _) => self.phase = Phase::Paused(session),
        }
    }

    async fn pause(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    ) -> Result<(), SessionError> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Recording(Recording {
                mut session,
                stream,
                timer,
            }) => {
                drop(timer);
                self.release_recording(stream, &mut session, events).await;
                info!(
                    "RecordingSessionController: paused session {} at {}s ({} chunks, {} bytes)",
                    session.id,
                    self.elapsed_seconds,
                    session.chunks.len(),
                    session.chunks.total_bytes()
                );
                self.phase = Phase::Paused(session);
                self.warning = None;
                Ok(())
            }
            Phase::Acquiring(mut acquisition) => {
                if acquisition.cancel.is_none() {
                    acquisition.cancel = Some(CancelRequest::Pause);
                }
                info!("RecordingSessionController: pause requested while acquiring");
                self.phase = Phase::Acquiring(acquisition);
                Ok(())
            }
            other => {
                self.phase = other;
                Err(self.reject("pause"))
            }
        }
    }

    async fn stop(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    ) -> Result<(), SessionError> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Recording(Recording {
                mut session,
                stream,
                timer,
            }) => {
                drop(timer);
                self.release_recording(stream, &mut session, events).await;
                self.finalize(session).await
            }
            Phase::Paused(session) => self.finalize(session).await,
            Phase::Acquiring(mut acquisition) => {
                acquisition.cancel = Some(CancelRequest::Stop);
                info!("RecordingSessionController: stop requested while acquiring");
                self.phase = Phase::Acquiring(acquisition);
                Ok(())
            }
            other => {
                self.phase = other;
                Err(self.reject("stop"))
            }
        }
    }

    /// Build the artifact from everything buffered and move to Stopped.
    async fn finalize(&mut self, session: Session) -> Result<(), SessionError> {
        let duration = self.elapsed_seconds;
        self.last_duration_seconds = Some(duration);
        self.elapsed_seconds = 0;
        self.warning = None;

        let Session {
            id, mode, chunks, ..
        } = session;
        let chunk_count = chunks.len();

        match Artifact::from_chunks(chunks, mode, duration) {
            Ok(artifact) => {
                // At most one live artifact per controller.
                let _ = self.artifacts.revoke_all().await;
                let info = self.artifacts.register(artifact).await;
                info!(
                    "RecordingSessionController: session {} finalized as {} ({} chunks, {} bytes, {}s)",
                    id, info.reference, chunk_count, info.size_bytes, duration
                );
                self.phase = Phase::Stopped(Some(info));
                Ok(())
            }
            Err(err) => {
                warn!(
                    "RecordingSessionController: session {} stopped without media",
                    id
                );
                self.last_error = Some(err.to_string());
                self.phase = Phase::Stopped(None);
                Err(err)
            }
        }
    }

    fn toggle_mode(&mut self) -> Result<CaptureMode, SessionError> {
        if !self.variant.is_switchable() {
            warn!(
                "RecordingSessionController: toggle requested on fixed {} recorder",
                self.mode
            );
            self.warning = Some(format!("This recorder only captures {}", self.mode));
            return Err(SessionError::ModeFixed(self.mode));
        }

        match self.phase.kind() {
            SessionPhase::Idle | SessionPhase::Stopped => {
                self.mode = self.mode.toggled();
                self.warning = None;
                info!("RecordingSessionController: capture mode set to {}", self.mode);
                Ok(self.mode)
            }
            phase => {
                warn!(
                    "RecordingSessionController: toggle requested while {}",
                    phase
                );
                self.warning = Some(TOGGLE_WARNING.to_string());
                Err(SessionError::InvalidTransition {
                    action: "toggle mode",
                    phase,
                })
            }
        }
    }

    fn download(&self) -> Result<Download, SessionError> {
        match &self.phase {
            Phase::Stopped(Some(info)) => Ok(info.clone()),
            _ => Err(SessionError::NoArtifact),
        }
    }

    fn on_chunk(&mut self, stream: StreamId, chunk: MediaChunk) {
        match &mut self.phase {
            Phase::Recording(recording) if recording.stream.id() == stream => {
                let size = chunk.len();
                if !recording.session.chunks.push(chunk) {
                    debug!("Ignoring empty chunk from {}", stream);
                } else {
                    debug!(
                        "Buffered {} bytes from {} ({} chunks)",
                        size,
                        stream,
                        recording.session.chunks.len()
                    );
                }
            }
            _ => debug!("Dropping chunk from inactive {}", stream),
        }
    }

    /// Release a recording stream and keep whatever it flushed while stopping.
    ///
    /// Backends may deliver a final chunk from inside `stop_stream`. By the
    /// time it is queued the phase has left Recording, so it is pulled off
    /// the queue here instead of going through `on_chunk`.
    async fn release_recording(
        &mut self,
        stream: DeviceStream,
        session: &mut Session,
        events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let id = stream.id();
        self.release(stream).await;

        while let Ok(event) = events.try_recv() {
            match event {
                SessionEvent::Chunk { stream, chunk } if stream == id => {
                    let size = chunk.len();
                    if session.chunks.push(chunk) {
                        debug!("Buffered {} flushed bytes from {}", size, id);
                    }
                }
                other => self.deferred.push_back(other),
            }
        }
    }

    async fn release(&self, stream: DeviceStream) {
        let id = stream.id();
        match self.capture.stop_stream(stream).await {
            Ok(()) => debug!("Released {}", id),
            Err(err) => warn!("Failed to cleanly release {}: {}", id, err),
        }
    }

    fn reject(&mut self, action: &'static str) -> SessionError {
        let phase = self.phase.kind();
        warn!(
            "RecordingSessionController: {} requested while {}",
            action, phase
        );
        self.warning = Some(format!("Cannot {action} while {phase}"));
        SessionError::InvalidTransition { action, phase }
    }

    async fn shutdown(&mut self, events: &mut mpsc::UnboundedReceiver<SessionEvent>) {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Recording(Recording { stream, timer, .. }) => {
                drop(timer);
                self.release(stream).await;
            }
            Phase::Acquiring(acquisition) => {
                if let Some(reply) = acquisition.reply {
                    let _ = reply.send(Err(SessionError::ControllerGone));
                }
                // A prompt that never resolves must not block shutdown.
                acquisition.task.abort();
                if acquisition.task.await.is_err() {
                    info!(
                        "RecordingSessionController: abandoned pending acquisition {}",
                        acquisition.attempt
                    );
                }
            }
            _ => {}
        }

        // Streams granted before the abort still need handing back.
        let mut pending: Vec<SessionEvent> = self.deferred.drain(..).collect();
        while let Ok(event) = events.try_recv() {
            pending.push(event);
        }
        for event in pending {
            if let SessionEvent::Acquired {
                result: Ok(stream), ..
            } = event
            {
                self.release(stream).await;
            }
        }

        let revoked = self.artifacts.revoke_all().await;
        if revoked > 0 {
            debug!("Revoked {} artifact reference(s) at shutdown", revoked);
        }
        self.elapsed_seconds = 0;
        self.publish().await;
    }

    fn snapshot(&self) -> SessionSnapshot {
        let (session_id, mode, live_stream, artifact) = match &self.phase {
            Phase::Idle => (None, self.mode, None, None),
            Phase::Acquiring(acquisition) => (
                Some(acquisition.session.id),
                acquisition.session.mode,
                None,
                None,
            ),
            Phase::Recording(recording) => (
                Some(recording.session.id),
                recording.session.mode,
                Some(StreamInfo {
                    id: recording.stream.id(),
                    tracks: recording.stream.tracks().to_vec(),
                }),
                None,
            ),
            Phase::Paused(session) => (Some(session.id), session.mode, None, None),
            Phase::Stopped(info) => (None, self.mode, None, info.clone()),
        };

        SessionSnapshot {
            phase: self.phase.kind(),
            variant: self.variant,
            mode,
            elapsed_seconds: self.elapsed_seconds,
            elapsed: format_elapsed(self.elapsed_seconds),
            session_id,
            live_stream,
            artifact,
            last_duration_seconds: self.last_duration_seconds,
            last_error: self.last_error.clone(),
            warning: self.warning.clone(),
        }
    }

    async fn publish(&self) {
        self.status.set(self.snapshot()).await;
    }
}

/// Cloneable front door to a running [`RecordingSessionController`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    status: SessionStatusHandle,
    artifacts: ArtifactStore,
}

impl SessionHandle {
    /// Begin (or resume) recording. Resolves once the device has been granted or refused.
    pub async fn start(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(Command::Start).await
    }

    pub async fn pause(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(Command::Pause).await
    }

    pub async fn stop(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(Command::Stop).await
    }

    /// Flip between audio and video. Returns the new mode.
    pub async fn toggle_mode(&self) -> Result<CaptureMode, SessionError> {
        self.request(Command::ToggleMode).await
    }

    pub async fn download(&self) -> Result<Download, SessionError> {
        self.request(Command::Download).await
    }

    pub async fn status(&self) -> SessionSnapshot {
        self.status.get().await
    }

    /// Number of artifact references that still resolve. Never more than one.
    pub async fn live_artifacts(&self) -> usize {
        self.artifacts.live_count().await
    }

    /// Look up the blob behind a reference. `None` once it has been revoked.
    pub async fn resolve(&self, reference: &ArtifactRef) -> Option<Arc<Artifact>> {
        self.artifacts.resolve(reference).await
    }

    /// Release devices and stop the controller task.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| SessionError::ControllerGone)?;
        rx.await.map_err(|_| SessionError::ControllerGone)?
    }
}
