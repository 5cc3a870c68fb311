use crate::channel::AppChannel;
use crate::controller::{ScanEventHub, ScanProviderEvent, ScanSubscription, SessionConfig};
use crate::error::SessionError;
use crate::media::{MediaPipeline, MediaSource, RemoteStream};
use crate::session::{NegotiationState, PeerSession, SessionEvent};
use crate::signaling::{Rendezvous, RendezvousEvent};
use serde_json::Value;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use teleconsult_core::{AppMessage, PeerRole, RoomCode, epoch_millis};
use tokio::sync::mpsc;
use tokio::time::{Instant, Sleep, sleep};
use tracing::{debug, info, warn};

/// Role capability for the one controller both sides share. The profile
/// carries what the identity handshake needs; everything else the two roles
/// do differently hangs off [`RoleProfile::role`].
#[derive(Debug, Clone)]
pub enum RoleProfile {
    Doctor {
        name: String,
        specialization: String,
        bio: String,
    },
    Patient {
        name: String,
        id: u64,
        email: String,
    },
}

impl RoleProfile {
    pub fn role(&self) -> PeerRole {
        match self {
            RoleProfile::Doctor { .. } => PeerRole::Doctor,
            RoleProfile::Patient { .. } => PeerRole::Patient,
        }
    }

    fn identity_message(&self) -> AppMessage {
        match self {
            RoleProfile::Doctor {
                name,
                specialization,
                bio,
            } => AppMessage::DoctorInfo {
                doctor_name: name.clone(),
                specialization: specialization.clone(),
                bio: bio.clone(),
            },
            RoleProfile::Patient { name, id, email } => AppMessage::PatientInfo {
                patient_name: name.clone(),
                patient_id: *id,
                email: email.clone(),
                timestamp: epoch_millis(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JoinSummary {
    pub role: PeerRole,
    pub participant_count: u8,
}

/// What the controller surfaces to the UI layer. This is the only place
/// user-facing failure text comes from.
#[derive(Debug)]
pub enum SessionNotice {
    Joined { role: PeerRole, participant_count: u8 },
    PeerJoined { role: PeerRole },
    Connected,
    ChannelOpen,
    Message(AppMessage),
    ScanRequested,
    RemoteStreamChanged,
    PeerLeft,
    Failure(SessionError),
    Closed,
}

enum ControllerCommand {
    ArmScanTimer,
    RestartIce,
}

/// Orchestrates one consultation for either role: room join, media binding,
/// negotiation, the clinical-event channel, and the retry/timeout policy
/// for each phase. Construct with explicit collaborators so tests can
/// substitute fakes for any of them.
pub struct SessionController {
    profile: RoleProfile,
    config: SessionConfig,
    rendezvous: Arc<dyn Rendezvous>,
    media: Arc<MediaPipeline>,
    channel: Arc<AppChannel>,
    scan_hub: Arc<ScanEventHub>,
    session_slot: Arc<StdMutex<Option<Arc<PeerSession>>>>,
    room: Arc<StdMutex<Option<RoomCode>>>,
    joined: Arc<AtomicBool>,
    joining: AtomicBool,
    participant_count: Arc<AtomicU8>,
    notice_tx: mpsc::UnboundedSender<SessionNotice>,
    notice_rx: StdMutex<Option<mpsc::UnboundedReceiver<SessionNotice>>>,
    command_tx: mpsc::UnboundedSender<ControllerCommand>,
    loop_parts: StdMutex<Option<LoopParts>>,
}

struct LoopParts {
    session_tx: mpsc::Sender<SessionEvent>,
    session_rx: mpsc::Receiver<SessionEvent>,
    command_rx: mpsc::UnboundedReceiver<ControllerCommand>,
}

impl SessionController {
    pub fn new(
        profile: RoleProfile,
        config: SessionConfig,
        rendezvous: Arc<dyn Rendezvous>,
        source: Arc<dyn MediaSource>,
    ) -> Self {
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = mpsc::channel(256);

        Self {
            profile,
            config,
            rendezvous,
            media: Arc::new(MediaPipeline::new(source)),
            channel: Arc::new(AppChannel::new()),
            scan_hub: Arc::new(ScanEventHub::new()),
            session_slot: Arc::new(StdMutex::new(None)),
            room: Arc::new(StdMutex::new(None)),
            joined: Arc::new(AtomicBool::new(false)),
            joining: AtomicBool::new(false),
            participant_count: Arc::new(AtomicU8::new(0)),
            notice_tx,
            notice_rx: StdMutex::new(Some(notice_rx)),
            command_tx,
            loop_parts: StdMutex::new(Some(LoopParts {
                session_tx,
                session_rx,
                command_rx,
            })),
        }
    }

    pub fn role(&self) -> PeerRole {
        self.profile.role()
    }

    /// Doctor side: mint the room code to hand to the patient.
    pub fn host_room(&self) -> RoomCode {
        RoomCode::generate()
    }

    pub fn is_joined(&self) -> bool {
        self.joined.load(Ordering::SeqCst)
    }

    pub fn participant_count(&self) -> u8 {
        self.participant_count.load(Ordering::SeqCst)
    }

    /// Single consumer. Returns `None` once the stream has been taken.
    pub fn notices(&self) -> Option<mpsc::UnboundedReceiver<SessionNotice>> {
        self.notice_rx.lock().unwrap().take()
    }

    /// Where the scan-provider embedding publishes its events.
    pub fn scan_events(&self) -> Arc<ScanEventHub> {
        Arc::clone(&self.scan_hub)
    }

    /// Latest remote media snapshot; `None` when the peer is gone.
    pub fn remote_stream(&self) -> Option<Arc<RemoteStream>> {
        self.media.remote()
    }

    pub async fn camera_enabled(&self) -> bool {
        self.media.is_enabled().await
    }

    pub async fn join(&self, room: RoomCode) -> Result<JoinSummary, SessionError> {
        if self.joined.load(Ordering::SeqCst) || self.joining.swap(true, Ordering::SeqCst) {
            return Err(SessionError::AlreadyJoined);
        }
        let result = self.try_join(room).await;
        self.joining.store(false, Ordering::SeqCst);
        if let Ok(summary) = &result {
            let _ = self.notice_tx.send(SessionNotice::Joined {
                role: summary.role,
                participant_count: summary.participant_count,
            });
        }
        result
    }

    async fn try_join(&self, room: RoomCode) -> Result<JoinSummary, SessionError> {
        self.rendezvous.connect().await?;
        let ack = self.rendezvous.join(&room, self.role()).await?;
        let role = ack.role.unwrap_or_else(|| self.role());
        let participant_count = ack.participant_count.unwrap_or(1);

        // Camera problems surface immediately and leave the room; they need
        // a user permission action, not a retry loop.
        if let Err(e) = self.media.acquire().await {
            self.rendezvous.leave(&room);
            return Err(e.into());
        }

        *self.room.lock().unwrap() = Some(room);
        self.participant_count
            .store(participant_count, Ordering::SeqCst);
        self.joined.store(true, Ordering::SeqCst);
        self.spawn_loop();

        Ok(JoinSummary {
            role,
            participant_count,
        })
    }

    fn spawn_loop(&self) {
        let Some(parts) = self.loop_parts.lock().unwrap().take() else {
            return;
        };
        let Some(rendezvous_rx) = self.rendezvous.take_events() else {
            warn!("rendezvous event stream unavailable, session loop not started");
            return;
        };

        let session_loop = SessionLoop {
            profile: self.profile.clone(),
            config: self.config.clone(),
            rendezvous: Arc::clone(&self.rendezvous),
            media: Arc::clone(&self.media),
            channel: Arc::clone(&self.channel),
            session_slot: Arc::clone(&self.session_slot),
            room: Arc::clone(&self.room),
            joined: Arc::clone(&self.joined),
            participant_count: Arc::clone(&self.participant_count),
            notice_tx: self.notice_tx.clone(),
            rendezvous_rx,
            session_tx: parts.session_tx,
            session_rx: parts.session_rx,
            command_rx: parts.command_rx,
            scan_rx: self.scan_hub.subscribe(),
            scan_alive: true,
            scan_pending: false,
            ice_restart_attempted: false,
            early_candidates: Vec::new(),
        };
        tokio::spawn(session_loop.run());
    }

    /// Safe from any state and under concurrent invocation: local tracks
    /// stop exactly once, every other step is a no-op the second time.
    pub async fn leave(&self) {
        let was_joined = self.joined.swap(false, Ordering::SeqCst);

        self.media.stop().await;
        self.channel.detach();
        let session = self.session_slot.lock().unwrap().take();
        if let Some(session) = session {
            session.close().await;
        }
        self.media.clear_remote();
        self.participant_count.store(0, Ordering::SeqCst);

        let room = self.room.lock().unwrap().take();
        if let Some(room) = room {
            self.rendezvous.leave(&room);
        }
        if was_joined {
            let _ = self.notice_tx.send(SessionNotice::Closed);
        }
    }

    /// Returns the new enabled state.
    pub async fn toggle_camera(&self) -> bool {
        self.media.toggle().await
    }

    /// Doctor side: ask the patient to begin a scan, then watch the
    /// bounded scan-completion window.
    pub async fn send_scan_request(&self) -> Result<(), SessionError> {
        if self.role() != PeerRole::Doctor {
            return Err(SessionError::WrongRole);
        }
        let room = self.current_room().ok_or(SessionError::NotJoined)?;
        self.channel
            .wait_open(self.config.channel_open_timeout)
            .await?;
        self.channel
            .send(AppMessage::FaceScanRequest {
                room_id: room,
                timestamp: epoch_millis(),
            })
            .await;
        let _ = self.command_tx.send(ControllerCommand::ArmScanTimer);
        Ok(())
    }

    pub async fn send_status(
        &self,
        status: impl Into<String>,
        payload: Option<Value>,
    ) -> Result<(), SessionError> {
        if !self.is_joined() {
            return Err(SessionError::NotJoined);
        }
        self.channel
            .wait_open(self.config.channel_open_timeout)
            .await?;
        self.channel
            .send(AppMessage::FaceScanStatus {
                status: status.into(),
                payload,
                timestamp: epoch_millis(),
            })
            .await;
        Ok(())
    }

    pub async fn send_results(&self, results: Value) -> Result<(), SessionError> {
        if !self.is_joined() {
            return Err(SessionError::NotJoined);
        }
        self.channel
            .wait_open(self.config.channel_open_timeout)
            .await?;
        self.channel
            .send(AppMessage::FaceScanResults {
                results,
                status: "Face scan completed successfully!".to_string(),
            })
            .await;
        Ok(())
    }

    /// Recovery action for a stalled media path on a live session.
    pub fn request_ice_restart(&self) {
        let _ = self.command_tx.send(ControllerCommand::RestartIce);
    }

    fn current_room(&self) -> Option<RoomCode> {
        self.room.lock().unwrap().clone()
    }
}

const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 30);

struct Timers {
    scan_deadline: Pin<Box<Sleep>>,
    scan_armed: bool,
    media_deadline: Pin<Box<Sleep>>,
    media_armed: bool,
}

impl Timers {
    fn new() -> Self {
        Self {
            scan_deadline: Box::pin(sleep(FAR_FUTURE)),
            scan_armed: false,
            media_deadline: Box::pin(sleep(FAR_FUTURE)),
            media_armed: false,
        }
    }

    fn arm_scan(&mut self, after: Duration) {
        self.scan_deadline.as_mut().reset(Instant::now() + after);
        self.scan_armed = true;
    }

    fn disarm_scan(&mut self) {
        self.scan_armed = false;
    }

    fn arm_media(&mut self, after: Duration) {
        self.media_deadline.as_mut().reset(Instant::now() + after);
        self.media_armed = true;
    }

    fn disarm_media(&mut self) {
        self.media_armed = false;
    }
}

/// The per-consultation event loop: one task selecting over relay events,
/// session events, commands, scan-provider events, and the two bounded
/// timers. All negotiation state transitions happen here, one event at a
/// time.
struct SessionLoop {
    profile: RoleProfile,
    config: SessionConfig,
    rendezvous: Arc<dyn Rendezvous>,
    media: Arc<MediaPipeline>,
    channel: Arc<AppChannel>,
    session_slot: Arc<StdMutex<Option<Arc<PeerSession>>>>,
    room: Arc<StdMutex<Option<RoomCode>>>,
    joined: Arc<AtomicBool>,
    participant_count: Arc<AtomicU8>,
    notice_tx: mpsc::UnboundedSender<SessionNotice>,
    rendezvous_rx: mpsc::UnboundedReceiver<RendezvousEvent>,
    session_tx: mpsc::Sender<SessionEvent>,
    session_rx: mpsc::Receiver<SessionEvent>,
    command_rx: mpsc::UnboundedReceiver<ControllerCommand>,
    scan_rx: ScanSubscription,
    scan_alive: bool,
    scan_pending: bool,
    ice_restart_attempted: bool,
    early_candidates: Vec<String>,
}

impl SessionLoop {
    async fn run(mut self) {
        info!("session loop started");
        let mut timers = Timers::new();

        loop {
            tokio::select! {
                evt = self.rendezvous_rx.recv() => match evt {
                    Some(evt) => self.handle_rendezvous(evt, &mut timers).await,
                    None => {
                        warn!("rendezvous event stream closed");
                        break;
                    }
                },

                evt = self.session_rx.recv() => match evt {
                    Some(evt) => self.handle_session(evt, &mut timers).await,
                    None => break,
                },

                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd, &mut timers).await,
                    None => {
                        debug!("controller dropped, stopping session loop");
                        break;
                    }
                },

                evt = self.scan_rx.recv(), if self.scan_alive => match evt {
                    Some(evt) => self.handle_scan(evt).await,
                    None => self.scan_alive = false,
                },

                () = timers.scan_deadline.as_mut(), if timers.scan_armed => {
                    timers.scan_armed = false;
                    self.on_scan_deadline();
                }

                () = timers.media_deadline.as_mut(), if timers.media_armed => {
                    timers.media_armed = false;
                    self.on_media_deadline(&mut timers).await;
                }
            }
        }

        info!("session loop finished");
    }

    async fn handle_rendezvous(&mut self, evt: RendezvousEvent, timers: &mut Timers) {
        if !self.joined.load(Ordering::SeqCst) {
            debug!("ignoring rendezvous event outside a session");
            return;
        }
        match evt {
            RendezvousEvent::Connected => debug!("rendezvous connected"),

            RendezvousEvent::Disconnected(reason) => {
                warn!("rendezvous connection lost: {reason}");
                self.notify(SessionNotice::Failure(SessionError::Network(reason)));
            }

            RendezvousEvent::PeerJoined { role } => {
                info!("peer joined as {role}");
                self.participant_count.store(2, Ordering::SeqCst);
                self.notify(SessionNotice::PeerJoined { role });
                self.start_as_initiator(timers).await;
            }

            RendezvousEvent::PeerLeft => {
                info!("peer left the room");
                self.participant_count.store(1, Ordering::SeqCst);
                self.teardown_session(timers).await;
                self.notify(SessionNotice::PeerLeft);
            }

            RendezvousEvent::Offer(sdp) => self.on_remote_offer(sdp, timers).await,

            RendezvousEvent::Answer(sdp) => self.on_remote_answer(sdp).await,

            RendezvousEvent::Candidate(json) => self.on_remote_candidate(json).await,
        }
    }

    /// We were in the room first, so we drive: build the session, create
    /// the data channel, send the offer.
    async fn start_as_initiator(&mut self, timers: &mut Timers) {
        if self.current_session().is_some() {
            // A peer joining while we still hold a session means the old
            // one is stale; negotiation state is never reused.
            self.teardown_session(timers).await;
        }
        let Some(session) = self.build_session().await else {
            return;
        };
        match session.start_offer(true).await {
            Ok(sdp) => self.relay_offer(sdp).await,
            Err(e) => self.notify(SessionNotice::Failure(e.into())),
        }
    }

    async fn on_remote_offer(&mut self, sdp: String, timers: &mut Timers) {
        let session = match self.current_session() {
            // A live session getting a fresh offer is renegotiation (ICE
            // restart from the other side); answer on the same session.
            Some(s)
                if matches!(
                    s.state(),
                    NegotiationState::Connected | NegotiationState::Negotiating
                ) =>
            {
                s
            }
            Some(_) => {
                self.teardown_session(timers).await;
                match self.build_session().await {
                    Some(s) => s,
                    None => return,
                }
            }
            None => match self.build_session().await {
                Some(s) => s,
                None => return,
            },
        };
        match session.accept_offer(sdp).await {
            Ok(answer) => self.relay_answer(answer).await,
            Err(e) => self.notify(SessionNotice::Failure(e.into())),
        }
    }

    async fn on_remote_answer(&mut self, sdp: String) {
        let Some(session) = self.current_session() else {
            warn!("answer arrived with no session in progress, dropping");
            return;
        };
        if let Err(e) = session.apply_answer(sdp).await {
            self.notify(SessionNotice::Failure(e.into()));
        }
    }

    async fn on_remote_candidate(&mut self, json: String) {
        match self.current_session() {
            Some(session) => {
                if let Err(e) = session.add_remote_candidate(json).await {
                    warn!("failed to apply remote candidate: {e}");
                }
            }
            // Candidates can beat the offer itself; stage them for the
            // session about to be built.
            None => self.early_candidates.push(json),
        }
    }

    async fn build_session(&mut self) -> Option<Arc<PeerSession>> {
        let session =
            match PeerSession::new(&self.config.ice_servers, self.session_tx.clone()).await {
                Ok(s) => Arc::new(s),
                Err(e) => {
                    self.notify(SessionNotice::Failure(e.into()));
                    return None;
                }
            };
        // Tracks go in before any description work so they land in the SDP.
        if let Err(e) = self.media.bind(&session).await {
            self.notify(SessionNotice::Failure(e.into()));
            session.close().await;
            return None;
        }
        *self.session_slot.lock().unwrap() = Some(Arc::clone(&session));
        self.ice_restart_attempted = false;
        for json in std::mem::take(&mut self.early_candidates) {
            if let Err(e) = session.add_remote_candidate(json).await {
                warn!("failed to stage early candidate: {e}");
            }
        }
        Some(session)
    }

    async fn handle_session(&mut self, evt: SessionEvent, timers: &mut Timers) {
        match evt {
            SessionEvent::StateChanged(state) => self.on_state(state, timers).await,

            SessionEvent::DataChannelOpened(dc) => {
                self.channel.attach(dc).await;
                self.notify(SessionNotice::ChannelOpen);
                // A recreated channel is a reset point: the other side
                // starts from nothing, so identity goes out on every open.
                self.channel.send(self.profile.identity_message()).await;
            }

            SessionEvent::ChannelMessage(bytes) => {
                if let Some(msg) = AppChannel::decode(&bytes) {
                    self.on_app_message(msg, timers);
                }
            }

            SessionEvent::RemoteTrack(track) => {
                self.media.on_remote_track(track);
                timers.disarm_media();
                self.notify(SessionNotice::RemoteStreamChanged);
            }

            SessionEvent::CandidateGenerated(json) => {
                if let Some(room) = self.current_room() {
                    self.rendezvous.send_candidate(&room, json).await;
                }
            }
        }
    }

    async fn on_state(&mut self, state: NegotiationState, timers: &mut Timers) {
        match state {
            NegotiationState::Connected => {
                info!("peer session connected");
                self.notify(SessionNotice::Connected);
                if self.media.remote().is_none() {
                    timers.arm_media(self.config.remote_media_timeout);
                }
            }
            NegotiationState::Failed => {
                warn!("peer session failed");
                self.teardown_session(timers).await;
                self.notify(SessionNotice::Failure(SessionError::Negotiation(
                    "transport failed".into(),
                )));
            }
            other => debug!("negotiation state: {other:?}"),
        }
    }

    fn on_app_message(&mut self, msg: AppMessage, timers: &mut Timers) {
        match &msg {
            AppMessage::FaceScanRequest { .. } if self.profile.role() == PeerRole::Patient => {
                self.scan_pending = true;
                self.notify(SessionNotice::ScanRequested);
            }
            AppMessage::FaceScanResults { .. } if self.profile.role() == PeerRole::Doctor => {
                self.scan_pending = false;
                timers.disarm_scan();
            }
            _ => {}
        }
        self.notify(SessionNotice::Message(msg));
    }

    async fn handle_scan(&mut self, evt: ScanProviderEvent) {
        if self.profile.role() != PeerRole::Patient {
            return;
        }
        match evt {
            ScanProviderEvent::AnalysisStarted => {
                self.channel
                    .send(AppMessage::FaceScanStatus {
                        status: "Face scan started".to_string(),
                        payload: None,
                        timestamp: epoch_millis(),
                    })
                    .await;
            }
            ScanProviderEvent::AnalysisFinished(results) => {
                self.scan_pending = false;
                self.channel
                    .send(AppMessage::FaceScanResults {
                        results,
                        status: "Face scan completed successfully!".to_string(),
                    })
                    .await;
            }
            ScanProviderEvent::AnalysisFailed(reason) => {
                self.scan_pending = false;
                self.channel
                    .send(AppMessage::FaceScanStatus {
                        status: format!("Face scan failed: {reason}"),
                        payload: None,
                        timestamp: epoch_millis(),
                    })
                    .await;
            }
        }
    }

    async fn handle_command(&mut self, cmd: ControllerCommand, timers: &mut Timers) {
        match cmd {
            ControllerCommand::ArmScanTimer => {
                self.scan_pending = true;
                timers.arm_scan(self.config.scan_timeout);
            }
            ControllerCommand::RestartIce => self.try_ice_restart(timers).await,
        }
    }

    async fn try_ice_restart(&mut self, timers: &mut Timers) {
        let Some(session) = self.current_session() else {
            return;
        };
        match session.restart_ice().await {
            Ok(sdp) => {
                self.ice_restart_attempted = true;
                timers.arm_media(self.config.remote_media_timeout);
                self.relay_offer(sdp).await;
            }
            Err(e) => self.notify(SessionNotice::Failure(e.into())),
        }
    }

    /// Distinct from an explicit failure status sent by the remote side:
    /// nothing arrived at all within the window.
    fn on_scan_deadline(&mut self) {
        if self.scan_pending {
            self.scan_pending = false;
            self.notify(SessionNotice::Failure(SessionError::Timeout(
                "scan completion",
            )));
        }
    }

    async fn on_media_deadline(&mut self, timers: &mut Timers) {
        if !self.joined.load(Ordering::SeqCst) || self.media.remote().is_some() {
            return;
        }
        if self.ice_restart_attempted {
            self.notify(SessionNotice::Failure(SessionError::Timeout("remote media")));
        } else {
            info!("no remote media yet, attempting an ICE restart");
            self.try_ice_restart(timers).await;
        }
    }

    /// Tear down the current peer session without leaving the room. Queued
    /// channel messages die with the channel; they are never replayed into
    /// a fresh one.
    async fn teardown_session(&mut self, timers: &mut Timers) {
        timers.disarm_scan();
        timers.disarm_media();
        self.scan_pending = false;
        self.early_candidates.clear();
        self.channel.detach();
        self.media.clear_remote();
        let session = self.session_slot.lock().unwrap().take();
        if let Some(session) = session {
            session.close().await;
        }
    }

    async fn relay_offer(&self, sdp: String) {
        if let Some(room) = self.current_room() {
            self.rendezvous.send_offer(&room, sdp).await;
        }
    }

    async fn relay_answer(&self, sdp: String) {
        if let Some(room) = self.current_room() {
            self.rendezvous.send_answer(&room, sdp).await;
        }
    }

    fn current_session(&self) -> Option<Arc<PeerSession>> {
        self.session_slot.lock().unwrap().clone()
    }

    fn current_room(&self) -> Option<RoomCode> {
        self.room.lock().unwrap().clone()
    }

    fn notify(&self, notice: SessionNotice) {
        let _ = self.notice_tx.send(notice);
    }
}
