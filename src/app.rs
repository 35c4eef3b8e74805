//! Voice companion window — egui/eframe application.
//!
//! # Architecture
//!
//! [`CompanionApp`] is the top-level [`eframe::App`].  It never changes
//! conversation state itself: every frame it reads a [`FrameView`] out of
//! [`SharedState`] and turns clicks and key presses into
//! [`ControllerCommand`]s for the controller task.
//!
//! # Visualizer
//!
//! | State | Visual |
//! |-------|--------|
//! | `Idle` | "Press Space to talk" |
//! | `Listening` | Live waveform bars + interim transcript |
//! | `Processing` | Spinner + transcript being answered |
//! | `Speaking` | Animated pulse bars |
//! | `Error` | Banner with a dismiss button |

use std::path::PathBuf;
use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::audio::{WaveformData, DEFAULT_BARS};
use crate::config::{AppConfig, TtsConfig};
use crate::pipeline::{
    lock_state, AppState, ConnectionStatus, ControllerCommand, ConversationState, SessionSummary,
    SharedState, UserFacingError,
};
use crate::session::Author;
use crate::tts::Voice;

const ACCENT: egui::Color32 = egui::Color32::from_rgb(80, 200, 120);
const LISTEN: egui::Color32 = egui::Color32::from_rgb(255, 90, 90);
const THINK: egui::Color32 = egui::Color32::from_rgb(68, 136, 255);
const WARN: egui::Color32 = egui::Color32::from_rgb(255, 136, 68);
const DIM: egui::Color32 = egui::Color32::from_rgb(140, 140, 140);

// ---------------------------------------------------------------------------
// FrameView
// ---------------------------------------------------------------------------

/// One chat line, without the cached audio bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatLine {
    pub id: Uuid,
    pub author: Author,
    pub text: String,
    pub has_audio: bool,
}

/// A copy of the shared state taken under one short lock.
#[derive(Debug, Clone)]
pub struct FrameView {
    pub conversation: ConversationState,
    pub transcript: String,
    pub banner: Option<UserFacingError>,
    pub chat: Vec<ChatLine>,
    pub session_title: Option<String>,
    pub sessions: Vec<SessionSummary>,
    pub waveform: WaveformData,
    pub voices: Vec<Voice>,
    pub voices_error: Option<String>,
    pub connection: ConnectionStatus,
    pub config: AppConfig,
}

impl From<&AppState> for FrameView {
    fn from(st: &AppState) -> Self {
        let chat = st
            .active_session
            .as_ref()
            .map(|s| {
                s.messages
                    .iter()
                    .map(|m| ChatLine {
                        id: m.id,
                        author: m.author,
                        text: m.text.clone(),
                        has_audio: m.audio.is_some(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            conversation: st.conversation,
            transcript: st.transcript.clone(),
            banner: st.banner,
            chat,
            session_title: st.active_session.as_ref().map(|s| s.title.clone()),
            sessions: st.sessions.clone(),
            waveform: st.waveform.clone(),
            voices: st.voices.clone(),
            voices_error: st.voices_error.clone(),
            connection: st.connection,
            config: st.config.clone(),
        }
    }
}

/// What the talk button (and Space) does in `state`.
pub fn talk_command(state: ConversationState) -> ControllerCommand {
    match state {
        ConversationState::Listening => ControllerCommand::StopListening,
        ConversationState::Idle
        | ConversationState::Processing
        | ConversationState::Speaking
        | ConversationState::Error => ControllerCommand::StartListening,
    }
}

// ---------------------------------------------------------------------------
// SettingsDraft
// ---------------------------------------------------------------------------

/// Form fields for the voice-synthesis settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsDraft {
    pub api_key: String,
    pub voice_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub speaker_boost: bool,
}

impl SettingsDraft {
    pub fn from_config(tts: &TtsConfig) -> Self {
        Self {
            api_key: tts.api_key.clone().unwrap_or_default(),
            voice_id: tts.voice_id.clone(),
            stability: tts.voice.stability,
            similarity_boost: tts.voice.similarity_boost,
            style: tts.voice.style.unwrap_or(0.0),
            speaker_boost: tts.voice.use_speaker_boost.unwrap_or(true),
        }
    }

    /// `base` with the form applied.  A blank key clears the stored key.
    pub fn apply(&self, base: &TtsConfig) -> TtsConfig {
        let key = self.api_key.trim();
        let voice_id = self.voice_id.trim();
        let mut tts = base.clone();
        tts.api_key = (!key.is_empty()).then(|| key.to_string());
        if !voice_id.is_empty() {
            tts.voice_id = voice_id.to_string();
        }
        tts.voice.stability = self.stability;
        tts.voice.similarity_boost = self.similarity_boost;
        tts.voice.style = Some(self.style);
        tts.voice.use_speaker_boost = Some(self.speaker_boost);
        tts.voice = tts.voice.clamped();
        tts
    }
}

// ---------------------------------------------------------------------------
// CompanionApp
// ---------------------------------------------------------------------------

/// eframe application: the companion window.
pub struct CompanionApp {
    state: SharedState,
    commands: mpsc::Sender<ControllerCommand>,
    settings_path: PathBuf,

    // ── UI state ─────────────────────────────────────────────────────────
    /// Open settings form, if any.
    settings: Option<SettingsDraft>,
    settings_error: Option<String>,
    show_api_test: bool,
    show_history: bool,
    /// Spinner animation phase (increases each frame).
    spinner_phase: f32,
}

impl CompanionApp {
    /// * `state`: shared state written by the controller.
    /// * `commands`: sender end of the controller command channel.
    /// * `settings_path`: where the settings form saves `settings.toml`.
    pub fn new(
        state: SharedState,
        commands: mpsc::Sender<ControllerCommand>,
        settings_path: PathBuf,
    ) -> Self {
        Self {
            state,
            commands,
            settings_path,
            settings: None,
            settings_error: None,
            show_api_test: false,
            show_history: false,
            spinner_phase: 0.0,
        }
    }

    fn send(&self, command: ControllerCommand) {
        if let Err(e) = self.commands.try_send(command) {
            log::warn!("ui: controller unavailable: {e}");
        }
    }

    /// Persist `tts` into `settings.toml` and hand it to the controller.
    fn save_tts(&mut self, config: &AppConfig, tts: TtsConfig) -> bool {
        let mut updated = config.clone();
        updated.tts = tts.clone();
        match updated.save_to(&self.settings_path) {
            Ok(()) => {
                log::info!("ui: settings saved to {}", self.settings_path.display());
                self.settings_error = None;
                self.send(ControllerCommand::UpdateVoice(tts));
                true
            }
            Err(e) => {
                log::error!("ui: failed to save settings: {e:#}");
                self.settings_error = Some(format!("Could not save settings: {e}"));
                false
            }
        }
    }

    // ── Header ───────────────────────────────────────────────────────────

    fn draw_header(&mut self, ui: &mut egui::Ui, view: &FrameView) {
        ui.horizontal(|ui| {
            ui.label(
                egui::RichText::new("●")
                    .color(state_color(view.conversation))
                    .size(14.0),
            );
            ui.label(egui::RichText::new(view.conversation.label()).size(14.0));

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let talk = match view.conversation {
                    ConversationState::Listening => "Stop",
                    ConversationState::Speaking | ConversationState::Processing => "Interrupt",
                    ConversationState::Idle | ConversationState::Error => "Talk",
                };
                let button = egui::Button::new(egui::RichText::new(talk).size(14.0))
                    .fill(state_color(view.conversation).gamma_multiply(0.35));
                if ui.add(button).on_hover_text("Space").clicked() {
                    self.send(talk_command(view.conversation));
                }
                if ui.small_button("Settings").clicked() {
                    self.settings = Some(SettingsDraft::from_config(&view.config.tts));
                    self.settings_error = None;
                }
                if ui.small_button("Voice API").clicked() {
                    self.show_api_test = true;
                }
                if ui.small_button("History").clicked() {
                    self.show_history = !self.show_history;
                }
            });
        });
    }

    fn draw_banner(&mut self, ui: &mut egui::Ui, banner: UserFacingError) {
        egui::Frame::new()
            .fill(WARN.gamma_multiply(0.2))
            .corner_radius(egui::CornerRadius::same(6))
            .inner_margin(egui::Margin::same(6))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new(banner.message()).color(WARN));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("Dismiss").clicked() {
                            self.send(ControllerCommand::Cancel);
                        }
                    });
                });
            });
    }

    // ── Visualizer ───────────────────────────────────────────────────────

    fn draw_visualizer(&self, ui: &mut egui::Ui, ctx: &egui::Context, view: &FrameView) {
        match view.conversation {
            ConversationState::Listening => {
                draw_bars(ui, &view.waveform, LISTEN);
                self.draw_transcript(ui, &view.transcript);
            }
            ConversationState::Speaking => {
                let t = ctx.input(|i| i.time);
                draw_bars(ui, &WaveformData::pulse(t, DEFAULT_BARS), ACCENT);
            }
            ConversationState::Processing => {
                ui.add_space(6.0);
                ui.vertical_centered(|ui| {
                    ui.label(
                        egui::RichText::new(format!("{} Thinking…", self.spinner_char()))
                            .color(THINK)
                            .size(13.0),
                    );
                });
                self.draw_transcript(ui, &view.transcript);
            }
            ConversationState::Idle | ConversationState::Error => {
                ui.add_space(6.0);
                ui.vertical_centered(|ui| {
                    ui.label(
                        egui::RichText::new("Press Space to talk")
                            .color(DIM)
                            .size(13.0),
                    );
                });
            }
        }
    }

    fn draw_transcript(&self, ui: &mut egui::Ui, transcript: &str) {
        if !transcript.is_empty() {
            ui.vertical_centered(|ui| {
                ui.label(egui::RichText::new(transcript).color(DIM).italics().size(12.0));
            });
        }
    }

    // ── Chat ─────────────────────────────────────────────────────────────

    fn draw_chat(&mut self, ui: &mut egui::Ui, view: &FrameView) {
        if let Some(title) = &view.session_title {
            ui.label(egui::RichText::new(title).strong());
            ui.add_space(2.0);
        }
        if view.chat.is_empty() {
            ui.label(egui::RichText::new("No messages yet.").color(DIM));
            return;
        }

        let can_replay = !view.conversation.is_busy();
        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for line in &view.chat {
                    let (who, color, layout) = match line.author {
                        Author::User => ("You", THINK, egui::Layout::top_down(egui::Align::Max)),
                        Author::Assistant => {
                            ("Companion", ACCENT, egui::Layout::top_down(egui::Align::Min))
                        }
                    };
                    ui.with_layout(layout, |ui| {
                        ui.label(egui::RichText::new(who).color(color).size(11.0));
                        ui.label(egui::RichText::new(&line.text).size(13.0));
                        if line.has_audio
                            && ui
                                .add_enabled(can_replay, egui::Button::new("▶ Replay").small())
                                .clicked()
                        {
                            self.send(ControllerCommand::Replay(line.id));
                        }
                    });
                    ui.add_space(6.0);
                }
            });
    }

    // ── Windows ──────────────────────────────────────────────────────────

    fn draw_history(&mut self, ctx: &egui::Context, view: &FrameView) {
        let mut open = self.show_history;
        egui::Window::new("History")
            .open(&mut open)
            .collapsible(false)
            .default_width(320.0)
            .show(ctx, |ui| {
                if ui.button("New conversation").clicked() {
                    self.send(ControllerCommand::NewSession);
                }
                ui.separator();
                if view.sessions.is_empty() {
                    ui.label(egui::RichText::new("No saved conversations.").color(DIM));
                }
                egui::ScrollArea::vertical().max_height(360.0).show(ui, |ui| {
                    for summary in &view.sessions {
                        ui.horizontal(|ui| {
                            let when = summary.updated_at.format("%Y-%m-%d %H:%M");
                            if ui
                                .link(summary.title.as_str())
                                .on_hover_text(format!("{} messages", summary.message_count))
                                .clicked()
                            {
                                self.send(ControllerCommand::OpenSession(summary.id));
                            }
                            ui.label(egui::RichText::new(when.to_string()).color(DIM).size(11.0));
                            ui.with_layout(
                                egui::Layout::right_to_left(egui::Align::Center),
                                |ui| {
                                    if ui.small_button("Delete").clicked() {
                                        self.send(ControllerCommand::DeleteSession(summary.id));
                                    }
                                },
                            );
                        });
                    }
                });
            });
        self.show_history = open;
    }

    fn draw_settings(&mut self, ctx: &egui::Context, view: &FrameView) {
        let Some(mut draft) = self.settings.take() else {
            return;
        };
        let mut open = true;
        let mut save = false;

        egui::Window::new("Settings")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                egui::Grid::new("settings_grid").num_columns(2).show(ui, |ui| {
                    ui.label("API key");
                    ui.add(egui::TextEdit::singleline(&mut draft.api_key).password(true));
                    ui.end_row();

                    ui.label("Voice id");
                    ui.text_edit_singleline(&mut draft.voice_id);
                    ui.end_row();

                    ui.label("Stability");
                    ui.add(egui::Slider::new(&mut draft.stability, 0.0..=1.0));
                    ui.end_row();

                    ui.label("Similarity");
                    ui.add(egui::Slider::new(&mut draft.similarity_boost, 0.0..=1.0));
                    ui.end_row();

                    ui.label("Style");
                    ui.add(egui::Slider::new(&mut draft.style, 0.0..=1.0));
                    ui.end_row();

                    ui.label("Speaker boost");
                    ui.checkbox(&mut draft.speaker_boost, "");
                    ui.end_row();
                });
                if view.config.tts.api_key.is_none() {
                    ui.label(
                        egui::RichText::new(format!(
                            "Leave blank to use ${}.",
                            view.config.tts.api_key_env
                        ))
                        .color(DIM)
                        .size(11.0),
                    );
                }
                if let Some(error) = &self.settings_error {
                    ui.label(egui::RichText::new(error).color(WARN));
                }
                ui.separator();
                if ui.button("Save").clicked() {
                    save = true;
                }
            });

        if save {
            let tts = draft.apply(&view.config.tts);
            if self.save_tts(&view.config, tts) {
                return;
            }
        }
        if open {
            self.settings = Some(draft);
        }
    }

    fn draw_api_test(&mut self, ctx: &egui::Context, view: &FrameView) {
        let mut open = self.show_api_test;
        let mut chosen: Option<String> = None;

        egui::Window::new("Voice API")
            .open(&mut open)
            .collapsible(false)
            .default_width(320.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let testing = view.connection == ConnectionStatus::Testing;
                    if ui
                        .add_enabled(!testing, egui::Button::new("Test connection"))
                        .clicked()
                    {
                        self.send(ControllerCommand::TestConnection);
                    }
                    let (text, color) = match view.connection {
                        ConnectionStatus::Unknown => ("Not tested", DIM),
                        ConnectionStatus::Testing => ("Testing…", THINK),
                        ConnectionStatus::Connected => ("Connected", ACCENT),
                        ConnectionStatus::Failed => ("Unreachable", WARN),
                    };
                    ui.label(egui::RichText::new(text).color(color));
                });
                ui.separator();
                if ui.button("Load voices").clicked() {
                    self.send(ControllerCommand::ListVoices);
                }
                if let Some(error) = &view.voices_error {
                    ui.label(egui::RichText::new(error).color(WARN));
                }
                egui::ScrollArea::vertical().max_height(260.0).show(ui, |ui| {
                    for voice in &view.voices {
                        ui.horizontal(|ui| {
                            let current = voice.voice_id == view.config.tts.voice_id;
                            let mut name = egui::RichText::new(&voice.name);
                            if current {
                                name = name.strong().color(ACCENT);
                            }
                            ui.label(name);
                            if let Some(category) = &voice.category {
                                ui.label(egui::RichText::new(category).color(DIM).size(11.0));
                            }
                            ui.with_layout(
                                egui::Layout::right_to_left(egui::Align::Center),
                                |ui| {
                                    if !current && ui.small_button("Use").clicked() {
                                        chosen = Some(voice.voice_id.clone());
                                    }
                                },
                            );
                        });
                    }
                });
            });

        if let Some(voice_id) = chosen {
            let mut tts = view.config.tts.clone();
            tts.voice_id = voice_id;
            self.save_tts(&view.config, tts);
        }
        self.show_api_test = open;
    }

    // ── Helpers ───────────────────────────────────────────────────────────

    fn handle_keys(&self, ctx: &egui::Context, view: &FrameView) {
        if ctx.wants_keyboard_input() {
            return;
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Space)) {
            self.send(talk_command(view.conversation));
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) && view.conversation.is_busy() {
            self.send(ControllerCommand::Cancel);
        }
    }

    /// A simple rotating ASCII spinner character driven by `spinner_phase`.
    fn spinner_char(&self) -> char {
        let chars = ['|', '/', '-', '\\'];
        let idx = (self.spinner_phase as usize) % chars.len();
        chars[idx]
    }
}

/// Accent colour for a conversation state.
fn state_color(state: ConversationState) -> egui::Color32 {
    match state {
        ConversationState::Idle => egui::Color32::from_rgb(100, 100, 100),
        ConversationState::Listening => LISTEN,
        ConversationState::Processing => THINK,
        ConversationState::Speaking => ACCENT,
        ConversationState::Error => WARN,
    }
}

/// Draw an amplitude bar chart.
fn draw_bars(ui: &mut egui::Ui, waveform: &WaveformData, color: egui::Color32) {
    let (rect, _) =
        ui.allocate_exact_size(egui::vec2(ui.available_width(), 48.0), egui::Sense::hover());

    let painter = ui.painter();
    let num_bars = waveform.bars.len().max(1);
    let bar_width = rect.width() / num_bars as f32;

    for (i, &amplitude) in waveform.bars.iter().enumerate() {
        let x = rect.left() + i as f32 * bar_width;
        let bar_height = (amplitude * rect.height()).max(2.0);
        painter.rect_filled(
            egui::Rect::from_center_size(
                egui::pos2(x + bar_width / 2.0, rect.center().y),
                egui::vec2((bar_width * 0.65).max(1.0), bar_height),
            ),
            1.0,
            color,
        );
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for CompanionApp {
    /// Called every frame by eframe.  Snapshots shared state, then renders.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let view = FrameView::from(&*lock_state(&self.state));

        self.handle_keys(ctx, &view);

        self.spinner_phase += 0.08;
        if self.spinner_phase >= 4.0 {
            self.spinner_phase = 0.0;
        }

        // The controller writes state from another thread, so keep polling.
        let repaint = match view.conversation {
            ConversationState::Listening | ConversationState::Speaking => 33,
            ConversationState::Processing => 66,
            ConversationState::Idle | ConversationState::Error => 250,
        };
        ctx.request_repaint_after(Duration::from_millis(repaint));

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(4.0);
            self.draw_header(ui, &view);
            ui.add_space(4.0);
        });

        egui::TopBottomPanel::bottom("visualizer")
            .min_height(72.0)
            .show(ctx, |ui| {
                if let Some(banner) = view.banner {
                    ui.add_space(4.0);
                    self.draw_banner(ui, banner);
                }
                ui.add_space(4.0);
                self.draw_visualizer(ui, ctx, &view);
                ui.add_space(4.0);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_chat(ui, &view);
        });

        if self.show_history {
            self.draw_history(ctx, &view);
        }
        if self.settings.is_some() {
            self.draw_settings(ctx, &view);
        }
        if self.show_api_test {
            self.draw_api_test(ctx, &view);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("companion window closing");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
