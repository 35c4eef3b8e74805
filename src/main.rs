//! Application entry point — Voice Companion.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from `settings.toml` (defaults on first run).
//! 3. Create the [`tokio`] runtime.
//! 4. Build the recognizer: Whisper engine, microphone, recognition profile.
//! 5. Build the remote clients, the audio player and the session store.
//! 6. Spawn the conversation controller on the runtime.
//! 7. Run [`eframe::run_native`] — blocks the main thread until the window
//!    is closed.

use std::sync::Arc;

use anyhow::Context as _;
use tokio::sync::mpsc;
use voice_companion::{
    app::CompanionApp,
    audio::{AudioPlayer, AudioSource, CpalPlayer, MicrophoneSource},
    config::{AppConfig, AppPaths, TtsConfig},
    llm::{ApiGenerator, FallbackGenerator, ReplyGenerator},
    pipeline::{new_shared_state, ControllerCommand, ConversationController},
    session::SessionStore,
    speech::{DeviceCapabilities, RecognitionProfile, SpeechInput, SpeechRecognizer},
    stt::{Recognition, SttEngine, SttError, TranscribeParams, WhisperEngine},
    tts::{ElevenLabsClient, VoiceSynthesizer},
};

use eframe::egui;

// ---------------------------------------------------------------------------
// Native options builder
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let (width, height) = config.ui.window_size;
    let viewport = egui::ViewportBuilder::default()
        .with_title("Voice Companion")
        .with_inner_size([width, height])
        .with_min_inner_size([360.0, 420.0]);

    eframe::NativeOptions {
        viewport,
        ..Default::default()
    }
}

fn synthesizer_for(tts: &TtsConfig) -> Arc<dyn VoiceSynthesizer> {
    Arc::new(ElevenLabsClient::from_config(tts))
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Voice Companion starting up");

    // 2. Configuration
    let paths = AppPaths::new();
    let config = AppConfig::load_or_default(&paths.settings_file);

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Recognition (degrades to an explanatory error without a model file)
    let model_path = paths.model_file(&config.recognition.model);
    let params = TranscribeParams::from_config(&config.recognition);
    let engine: Arc<dyn SttEngine> = match WhisperEngine::load(&model_path, params) {
        Ok(engine) => {
            log::info!("Whisper model loaded: {}", model_path.display());
            Arc::new(engine)
        }
        Err(e) => {
            log::warn!("Could not load Whisper model: {e}. Recognition will report an error.");
            Arc::new(NoModelStt {
                path: model_path.display().to_string(),
            })
        }
    };
    let source: Arc<dyn AudioSource> = Arc::new(MicrophoneSource::new(
        config.recognition.input_device.clone(),
    ));
    let profile = RecognitionProfile::select(&config.recognition, &DeviceCapabilities::detect());
    let (speech_tx, speech_rx) = mpsc::unbounded_channel();
    let speech: Arc<dyn SpeechInput> = Arc::new(SpeechRecognizer::new(
        engine,
        source,
        profile,
        &config.recognition,
        speech_tx,
    ));

    // 5. Remote services, playback, history
    let generator: Arc<dyn ReplyGenerator> =
        Arc::new(FallbackGenerator::new(ApiGenerator::from_config(&config.llm)));
    let synthesizer = synthesizer_for(&config.tts);
    let player: Arc<dyn AudioPlayer> = Arc::new(CpalPlayer::new());
    let store = SessionStore::load(&paths.sessions_file);
    if config.tts.resolve_api_key().is_none() {
        log::warn!(
            "No voice API key: set ${} or enter one in Settings",
            config.tts.api_key_env
        );
    }

    // 6. Controller
    let state = new_shared_state(config.clone());
    let (command_tx, command_rx) = mpsc::channel::<ControllerCommand>(32);
    let controller = ConversationController::new(
        Arc::clone(&state),
        speech,
        generator,
        synthesizer,
        player,
        store,
    )
    .with_synthesizer_factory(Box::new(synthesizer_for));
    rt.spawn(controller.run(command_rx, speech_rx));

    if config.ui.auto_greet {
        command_tx
            .try_send(ControllerCommand::Greet)
            .context("controller did not accept the greeting")?;
    }

    // 7. Window (blocks until closed)
    let app = CompanionApp::new(state, command_tx, paths.settings_file.clone());
    eframe::run_native(
        "Voice Companion",
        native_options(&config),
        Box::new(move |_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow::anyhow!("window failed: {e}"))?;

    log::info!("Voice Companion shut down");
    Ok(())
}

// ---------------------------------------------------------------------------
// NoModelStt: stands in when the model file is missing
// ---------------------------------------------------------------------------

struct NoModelStt {
    path: String,
}

impl SttEngine for NoModelStt {
    fn transcribe(&self, _audio: &[f32]) -> Result<Recognition, SttError> {
        Err(SttError::ModelNotFound(self.path.clone()))
    }
}
