//! Conversation controller: drives listen → think → speak turns.
//!
//! [`ConversationController`] owns the [`ConversationState`] machine and is
//! the only writer of [`SharedState`].  It reacts to two inputs:
//!
//! * [`ControllerCommand`]s from the UI, over a bounded `tokio::sync::mpsc`
//!   channel;
//! * [`SpeechEvent`]s from the recognizer, over an unbounded channel.
//!
//! # Turn flow
//!
//! ```text
//! StartListening ─▶ SpeechInput::start_listening          [Listening]
//! ListeningChanged(false)                                 [Processing]
//! Final(utterance) ─▶ spawn ReplyGenerator::generate
//!                        └─ Err → connectivity banner      [Error]
//!   Replied ─▶ append user + assistant messages, save session
//!           ─▶ spawn VoiceSynthesizer::synthesize
//!   Synthesized ─▶ AudioPlayer::schedule                    [Speaking]
//!               ─▶ spawn_blocking(AudioPlayer::play)
//!   Played ─▶                                              [Idle]
//! ```
//!
//! Every spawned step carries the [`TurnToken`] it was started under.  A
//! result whose token is no longer current is discarded, so an abandoned
//! turn can never overwrite state.  The playback ticket is taken before the
//! blocking thread starts, so a stop issued in between still silences the clip.

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::audio::{AudioPlayer, PlaybackError, PlaybackOutcome, WaveformData};
use crate::config::TtsConfig;
use crate::llm::{ContextWindow, LlmError, ReplyGenerator};
use crate::session::{Author, ChatSession, Message, SessionStore};
use crate::speech::{RecognitionError, SpeechEvent, SpeechInput};
use crate::tts::{TtsError, Voice, VoiceSynthesizer};

use super::state::{
    lock_state, AppState, ConnectionStatus, ConversationState, SessionSummary, SharedState,
    UserFacingError,
};

// ---------------------------------------------------------------------------
// Commands and tokens
// ---------------------------------------------------------------------------

/// Requests from the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerCommand {
    /// Begin capturing.  Interrupts playback or a pending reply.
    StartListening,
    /// End capture early; the utterance still produces a transcript.
    StopListening,
    /// Drop whatever is in flight and return to idle.
    Cancel,
    /// Speak the configured greeting.  Only honoured while idle.
    Greet,
    NewSession,
    OpenSession(Uuid),
    DeleteSession(Uuid),
    /// Play the cached audio of an assistant message again.
    Replay(Uuid),
    /// New voice settings from the settings form.
    UpdateVoice(TtsConfig),
    TestConnection,
    ListVoices,
}

/// Identifies one turn.  Strictly increasing per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnToken(u64);

/// Builds a synthesizer for new credentials or base URL.
pub type SynthesizerFactory = Box<dyn Fn(&TtsConfig) -> Arc<dyn VoiceSynthesizer> + Send>;

/// Results of spawned work, fed back into the controller loop.
enum TaskResult {
    Replied {
        token: TurnToken,
        /// `None` for the greeting.
        heard: Option<(String, f32)>,
        reply: String,
    },
    GenerationFailed {
        token: TurnToken,
        error: LlmError,
    },
    Synthesized {
        token: TurnToken,
        message_id: Uuid,
        audio: Result<Vec<u8>, TtsError>,
    },
    Played {
        token: TurnToken,
        result: Result<PlaybackOutcome, PlaybackError>,
    },
    ConnectionTested(bool),
    VoicesListed(Result<Vec<Voice>, TtsError>),
}

// ---------------------------------------------------------------------------
// ConversationController
// ---------------------------------------------------------------------------

/// Create with [`ConversationController::new`], then spawn [`run`](Self::run).
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tokio::sync::mpsc;
/// use voice_companion::config::AppConfig;
/// use voice_companion::pipeline::{new_shared_state, ControllerCommand, ConversationController};
/// use voice_companion::session::SessionStore;
/// # use voice_companion::audio::AudioPlayer;
/// # use voice_companion::llm::ReplyGenerator;
/// # use voice_companion::speech::SpeechInput;
/// # use voice_companion::tts::VoiceSynthesizer;
/// # fn parts() -> (Arc<dyn SpeechInput>, Arc<dyn ReplyGenerator>, Arc<dyn VoiceSynthesizer>, Arc<dyn AudioPlayer>) { unimplemented!() }
///
/// # async fn example() {
/// let state = new_shared_state(AppConfig::default());
/// let (speech, generator, synthesizer, player) = parts();
/// let (_speech_tx, speech_rx) = mpsc::unbounded_channel();
/// let (command_tx, command_rx) = mpsc::channel(32);
///
/// let controller = ConversationController::new(
///     state,
///     speech,
///     generator,
///     synthesizer,
///     player,
///     SessionStore::load("sessions.json"),
/// );
/// tokio::spawn(controller.run(command_rx, speech_rx));
/// command_tx.send(ControllerCommand::StartListening).await.unwrap();
/// # }
/// ```
pub struct ConversationController {
    state: SharedState,
    speech: Arc<dyn SpeechInput>,
    generator: Arc<dyn ReplyGenerator>,
    synthesizer: Arc<dyn VoiceSynthesizer>,
    player: Arc<dyn AudioPlayer>,
    store: SessionStore,
    synthesizer_factory: Option<SynthesizerFactory>,
    tts: TtsConfig,
    context: ContextWindow,
    greeting: String,

    active: Option<ChatSession>,
    utterance: Option<u64>,
    turn: Option<TurnToken>,
    generation: u64,
    results_tx: mpsc::UnboundedSender<TaskResult>,
    results_rx: Option<mpsc::UnboundedReceiver<TaskResult>>,
}

impl ConversationController {
    /// Settings are read from the config held in `state`.
    pub fn new(
        state: SharedState,
        speech: Arc<dyn SpeechInput>,
        generator: Arc<dyn ReplyGenerator>,
        synthesizer: Arc<dyn VoiceSynthesizer>,
        player: Arc<dyn AudioPlayer>,
        store: SessionStore,
    ) -> Self {
        let config = lock_state(&state).config.clone();
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            state,
            speech,
            generator,
            synthesizer,
            player,
            store,
            synthesizer_factory: None,
            tts: config.tts,
            context: ContextWindow::new(config.llm.history_turns),
            greeting: config.ui.greeting,
            active: None,
            utterance: None,
            turn: None,
            generation: 0,
            results_tx,
            results_rx: Some(results_rx),
        }
    }

    /// Rebuild the synthesizer when credentials or endpoint change.
    pub fn with_synthesizer_factory(mut self, factory: SynthesizerFactory) -> Self {
        self.synthesizer_factory = Some(factory);
        self
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until `commands` is closed.  Stops capture and playback on exit.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<ControllerCommand>,
        mut speech_events: mpsc::UnboundedReceiver<SpeechEvent>,
    ) {
        let Some(mut results) = self.results_rx.take() else {
            log::error!("controller: already running");
            return;
        };
        self.publish_sessions();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = speech_events.recv() => self.handle_speech(event),
                Some(result) = results.recv() => self.handle_result(result),
            }
        }

        self.speech.abort();
        self.player.stop();
        log::info!("controller: command channel closed, shutting down");
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn handle_command(&mut self, command: ControllerCommand) {
        // UpdateVoice may carry an API key.
        if !matches!(command, ControllerCommand::UpdateVoice(_)) {
            log::debug!("controller: {command:?} in {:?}", self.conversation());
        }
        match command {
            ControllerCommand::StartListening => self.start_listening(),
            ControllerCommand::StopListening => {
                if self.conversation() == ConversationState::Listening {
                    self.speech.stop_listening();
                }
            }
            ControllerCommand::Cancel => self.cancel_activity(),
            ControllerCommand::Greet => self.greet(),
            ControllerCommand::NewSession => {
                self.cancel_activity();
                self.active = None;
                self.publish_session();
            }
            ControllerCommand::OpenSession(id) => {
                let Some(session) = self.store.get(id).cloned() else {
                    log::warn!("controller: no session {id}");
                    return;
                };
                self.cancel_activity();
                self.active = Some(session);
                self.publish_session();
            }
            ControllerCommand::DeleteSession(id) => self.delete_session(id),
            ControllerCommand::Replay(id) => self.replay(id),
            ControllerCommand::UpdateVoice(tts) => self.update_voice(tts),
            ControllerCommand::TestConnection => {
                self.update(|st| st.connection = ConnectionStatus::Testing);
                let synthesizer = Arc::clone(&self.synthesizer);
                let tx = self.results_tx.clone();
                tokio::spawn(async move {
                    let ok = synthesizer.test_connection().await;
                    let _ = tx.send(TaskResult::ConnectionTested(ok));
                });
            }
            ControllerCommand::ListVoices => {
                let synthesizer = Arc::clone(&self.synthesizer);
                let tx = self.results_tx.clone();
                tokio::spawn(async move {
                    let voices = synthesizer.available_voices().await;
                    let _ = tx.send(TaskResult::VoicesListed(voices));
                });
            }
        }
    }

    fn start_listening(&mut self) {
        match self.conversation() {
            ConversationState::Listening => return,
            ConversationState::Speaking => {
                self.player.stop();
                self.abandon_turn();
            }
            ConversationState::Processing => self.abandon_turn(),
            ConversationState::Idle | ConversationState::Error => {}
        }

        let utterance = self.speech.start_listening();
        self.utterance = Some(utterance);
        log::debug!("controller: listening for utterance {utterance}");
        self.update(|st| {
            st.conversation = ConversationState::Listening;
            st.transcript.clear();
            st.confidence = None;
            st.banner = None;
            st.waveform = WaveformData::default();
        });
    }

    /// Stop capture and playback and drop the current turn.
    fn cancel_activity(&mut self) {
        if self.utterance.take().is_some() {
            self.speech.abort();
            self.speech.reset_transcript();
        }
        if self.conversation() == ConversationState::Speaking {
            self.player.stop();
        }
        self.abandon_turn();
        self.update(|st| {
            if st.conversation.is_busy() {
                st.conversation = ConversationState::Idle;
            }
            st.transcript.clear();
            st.confidence = None;
            st.waveform = WaveformData::default();
        });
    }

    fn greet(&mut self) {
        if self.conversation() != ConversationState::Idle {
            log::debug!("controller: greeting skipped, not idle");
            return;
        }
        let token = self.begin_turn();
        self.set_conversation(ConversationState::Processing);
        let reply = self.greeting.clone();
        self.on_replied(token, None, reply);
    }

    fn delete_session(&mut self, id: Uuid) {
        if self.active.as_ref().is_some_and(|s| s.id == id) {
            self.cancel_activity();
            self.active = None;
        }
        if self.store.delete(id) {
            if let Err(e) = self.store.save() {
                log::warn!("controller: failed to save sessions: {e}");
            }
        }
        self.publish_session();
    }

    fn replay(&mut self, message_id: Uuid) {
        if self.conversation().is_busy() {
            return;
        }
        let audio = self
            .active
            .as_ref()
            .and_then(|s| s.messages.iter().find(|m| m.id == message_id))
            .and_then(|m| m.audio.clone());
        match audio {
            Some(audio) => {
                let token = self.begin_turn();
                self.play(token, audio);
            }
            None => log::debug!("controller: no cached audio for {message_id}"),
        }
    }

    fn update_voice(&mut self, tts: TtsConfig) {
        let endpoint_changed = tts.base_url != self.tts.base_url
            || tts.resolve_api_key() != self.tts.resolve_api_key()
            || tts.timeout_secs != self.tts.timeout_secs;
        if endpoint_changed {
            if let Some(factory) = &self.synthesizer_factory {
                self.synthesizer = factory(&tts);
                log::info!("controller: voice client rebuilt for {}", tts.base_url);
            }
        }
        self.tts = tts.clone();
        self.update(|st| {
            st.config.tts = tts;
            if endpoint_changed {
                st.connection = ConnectionStatus::Unknown;
            }
        });
    }

    // -----------------------------------------------------------------------
    // Speech events
    // -----------------------------------------------------------------------

    fn handle_speech(&mut self, event: SpeechEvent) {
        match event {
            SpeechEvent::ListeningChanged(true) => log::trace!("controller: microphone open"),
            SpeechEvent::ListeningChanged(false) => {
                if self.utterance.is_some() && self.conversation() == ConversationState::Listening
                {
                    self.update(|st| {
                        st.conversation = ConversationState::Processing;
                        st.waveform = WaveformData::default();
                    });
                }
            }
            SpeechEvent::Level(waveform) => {
                if self.conversation() == ConversationState::Listening {
                    self.update(|st| st.waveform = waveform);
                }
            }
            SpeechEvent::Interim { utterance, text } => {
                if self.utterance == Some(utterance) {
                    self.update(|st| st.transcript = text);
                }
            }
            SpeechEvent::Final {
                utterance,
                text,
                confidence,
            } => {
                if self.utterance != Some(utterance) {
                    log::debug!("controller: ignoring transcript of utterance {utterance}");
                    return;
                }
                self.utterance = None;
                let text = text.trim().to_string();
                if text.is_empty() {
                    self.set_conversation(ConversationState::Idle);
                    return;
                }
                self.dispatch_turn(text, confidence);
            }
            SpeechEvent::Error { utterance, error } => {
                if self.utterance != Some(utterance) {
                    return;
                }
                self.utterance = None;
                self.recognition_failed(error);
            }
        }
    }

    fn recognition_failed(&mut self, error: RecognitionError) {
        match UserFacingError::from_recognition(&error) {
            None => {
                log::debug!("controller: {error}");
                self.update(|st| {
                    st.conversation = ConversationState::Idle;
                    st.waveform = WaveformData::default();
                });
            }
            Some(banner) => {
                log::warn!("controller: recognition failed: {error}");
                self.update(|st| {
                    st.conversation = ConversationState::Error;
                    st.banner = Some(banner);
                    st.transcript.clear();
                    st.confidence = None;
                    st.waveform = WaveformData::default();
                });
            }
        }
    }

    /// Generate a reply to `text` under a fresh turn.
    fn dispatch_turn(&mut self, text: String, confidence: f32) {
        let token = self.begin_turn();
        self.update(|st| {
            st.conversation = ConversationState::Processing;
            st.transcript = text.clone();
            st.confidence = Some(confidence);
        });

        let history = self
            .active
            .as_ref()
            .map(|s| self.context.history(&s.messages))
            .unwrap_or_default();
        let generator = Arc::clone(&self.generator);
        let tx = self.results_tx.clone();

        tokio::spawn(async move {
            let result = match generator.generate(&text, &history).await {
                Ok(reply) => TaskResult::Replied {
                    token,
                    heard: Some((text, confidence)),
                    reply,
                },
                Err(error) => TaskResult::GenerationFailed { token, error },
            };
            let _ = tx.send(result);
        });
    }

    // -----------------------------------------------------------------------
    // Task results
    // -----------------------------------------------------------------------

    fn handle_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Replied {
                token,
                heard,
                reply,
            } => self.on_replied(token, heard, reply),
            TaskResult::GenerationFailed { token, error } => {
                if self.is_current(token) {
                    log::error!("controller: generation failed: {error}");
                    self.turn = None;
                    self.fail(UserFacingError::Connectivity);
                }
            }
            TaskResult::Synthesized {
                token,
                message_id,
                audio,
            } => self.on_synthesized(token, message_id, audio),
            TaskResult::Played { token, result } => self.on_played(token, result),
            TaskResult::ConnectionTested(ok) => {
                let status = if ok { "reachable" } else { "unreachable" };
                log::info!("controller: voice service {status}");
                self.update(|st| {
                    st.connection = if ok {
                        ConnectionStatus::Connected
                    } else {
                        ConnectionStatus::Failed
                    };
                });
            }
            TaskResult::VoicesListed(Ok(voices)) => self.update(|st| {
                st.voices = voices;
                st.voices_error = None;
            }),
            TaskResult::VoicesListed(Err(e)) => {
                log::warn!("controller: voice list unavailable: {e}");
                self.update(|st| st.voices_error = Some(e.to_string()));
            }
        }
    }

    fn on_replied(&mut self, token: TurnToken, heard: Option<(String, f32)>, reply: String) {
        if !self.is_current(token) {
            log::debug!("controller: discarding stale reply");
            return;
        }

        let session = self.active.get_or_insert_with(ChatSession::new);
        if let Some((text, confidence)) = heard {
            session.push(Message::user(text, Some(confidence)));
        }
        let message = Message::assistant(reply.clone());
        let message_id = message.id;
        session.push(message);
        self.persist_active();

        let synthesizer = Arc::clone(&self.synthesizer);
        let voice_id = self.tts.voice_id.clone();
        let settings = self.tts.voice;
        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let audio = synthesizer
                .synthesize(&reply, Some(&voice_id), Some(settings))
                .await;
            let _ = tx.send(TaskResult::Synthesized {
                token,
                message_id,
                audio,
            });
        });
    }

    fn on_synthesized(
        &mut self,
        token: TurnToken,
        message_id: Uuid,
        audio: Result<Vec<u8>, TtsError>,
    ) {
        if !self.is_current(token) {
            log::debug!("controller: discarding stale audio");
            return;
        }
        match audio {
            Ok(audio) => {
                if let Some(message) = self
                    .active
                    .as_mut()
                    .and_then(|s| s.messages.iter_mut().find(|m| m.id == message_id))
                {
                    message.audio = Some(audio.clone());
                }
                self.publish_session();
                self.play(token, audio);
            }
            Err(e) => {
                log::error!("controller: synthesis failed: {e}");
                self.turn = None;
                self.fail(UserFacingError::from_tts(&e));
            }
        }
    }

    fn play(&mut self, token: TurnToken, audio: Vec<u8>) {
        self.set_conversation(ConversationState::Speaking);
        let ticket = self.player.schedule();
        let player = Arc::clone(&self.player);
        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let blocking = tokio::task::spawn_blocking(move || player.play(ticket, &audio));
            let result = match blocking.await {
                Ok(result) => result,
                Err(e) => Err(PlaybackError::Decode(format!("playback task failed: {e}"))),
            };
            let _ = tx.send(TaskResult::Played { token, result });
        });
    }

    fn on_played(&mut self, token: TurnToken, result: Result<PlaybackOutcome, PlaybackError>) {
        if !self.is_current(token) {
            return;
        }
        self.turn = None;
        match result {
            Ok(outcome) => {
                log::debug!("controller: playback {outcome:?}");
                self.set_conversation(ConversationState::Idle);
            }
            Err(e) => {
                log::error!("controller: playback failed: {e}");
                self.fail(UserFacingError::from_playback(&e));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn begin_turn(&mut self) -> TurnToken {
        self.abandon_turn();
        self.generation += 1;
        let token = TurnToken(self.generation);
        self.turn = Some(token);
        token
    }

    fn abandon_turn(&mut self) {
        if let Some(TurnToken(n)) = self.turn.take() {
            log::debug!("controller: turn {n} abandoned");
        }
    }

    fn is_current(&self, token: TurnToken) -> bool {
        self.turn == Some(token)
    }

    /// Store the active session once it holds something the user said.
    fn persist_active(&mut self) {
        if let Some(session) = &self.active {
            if session.messages.iter().any(|m| m.author == Author::User) {
                self.store.upsert(session.clone());
                if let Err(e) = self.store.save() {
                    log::warn!("controller: failed to save sessions: {e}");
                }
            }
        }
        self.publish_session();
    }

    fn publish_session(&self) {
        let active = self.active.clone();
        self.update(|st| st.active_session = active);
        self.publish_sessions();
    }

    fn publish_sessions(&self) {
        let sessions: Vec<SessionSummary> =
            self.store.sessions().iter().map(SessionSummary::from).collect();
        self.update(|st| st.sessions = sessions);
    }

    fn conversation(&self) -> ConversationState {
        lock_state(&self.state).conversation
    }

    fn set_conversation(&self, conversation: ConversationState) {
        self.update(|st| st.conversation = conversation);
    }

    fn fail(&self, banner: UserFacingError) {
        self.update(|st| {
            st.conversation = ConversationState::Error;
            st.banner = Some(banner);
        });
    }

    fn update(&self, f: impl FnOnce(&mut AppState)) {
        f(&mut lock_state(&self.state));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
