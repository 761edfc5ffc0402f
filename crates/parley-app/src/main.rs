//! Parley application binary - composition root.
//!
//! 1. Load `.env`, parse CLI flags and read the TOML configuration
//! 2. Initialise logging on stderr
//! 3. Resolve the model credential (fatal when missing)
//! 4. Build the agent, the voice adapters and the turn controller
//! 5. Run the terminal front end on stdin/stdout

mod cli;
mod repl;

use std::path::Path;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use parley_agent::{Agent, GeminiModel, ToolRegistry};
use parley_audio::{CommandSynthesizer, Microphone, MicrophoneConfig};
use parley_chat::{ControllerOptions, ListenerInput, SynthesizerOutput, TurnController};
use parley_core::config::{read_credential, VoiceConfig};
use parley_core::ParleyConfig;
use parley_speech::{HostedTranscriber, ListenerConfig, VoiceListener};

use cli::CliArgs;

/// Log filter. Priority: --log-level > RUST_LOG > config file.
fn log_filter(cli_level: Option<&str>, config_level: &str) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(level);
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config_level))
}

/// Load the config file, falling back to defaults.
///
/// Returns the failure alongside so it can be logged once tracing is up.
fn load_config(path: &Path) -> (ParleyConfig, Option<parley_core::ParleyError>) {
    match ParleyConfig::load(path) {
        Ok(config) => (config, None),
        Err(e) => (ParleyConfig::default(), Some(e)),
    }
}

/// Wire the microphone listener, or explain why voice input is off.
fn build_voice_input(voice: &VoiceConfig) -> Option<ListenerInput<Microphone, HostedTranscriber>> {
    if !voice.enabled {
        tracing::info!("Voice input disabled");
        return None;
    }
    if !Microphone::is_supported() {
        tracing::warn!("Voice input unavailable: built without the `microphone` feature");
        return None;
    }

    let api_key = match read_credential(&voice.transcription.api_key_env) {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!(error = %e, "Voice input unavailable: no transcription credential");
            return None;
        }
    };
    let transcriber = match HostedTranscriber::from_config(&voice.transcription, api_key) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(error = %e, "Voice input unavailable");
            return None;
        }
    };

    let microphone = Microphone::new(MicrophoneConfig {
        device_name: voice.device_name.clone(),
        sample_rate: voice.sample_rate,
    });
    let listener = VoiceListener::new(
        microphone,
        transcriber,
        ListenerConfig::from_voice_config(voice),
    );
    tracing::info!(device = %voice.device_name, "Voice input ready");
    Some(ListenerInput::new(listener))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Environment first so both config and credentials can see it.
    let dotenv = dotenvy::dotenv();

    let args = CliArgs::parse();
    let config_file = args.resolve_config_path();
    let (mut config, config_error) = load_config(&config_file);
    args.apply_overrides(&mut config);

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(
            args.log_level.as_deref(),
            &config.general.log_level,
        ))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Parley v{}", env!("CARGO_PKG_VERSION"));
    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to read .env"),
    }
    match config_error {
        None => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Some(_) if !config_file.exists() => {
            tracing::info!(path = %config_file.display(), "No config file, using defaults")
        }
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
    }

    // Agent.
    let api_key = match config.model.resolve_api_key() {
        Ok(key) => key,
        Err(e) => {
            tracing::error!(error = %e, "Missing model credential");
            return Err(e.into());
        }
    };
    let model = GeminiModel::from_config(&config.model, api_key)?;
    let agent = Agent::from_config(
        model,
        ToolRegistry::with_defaults(),
        &config.agent,
        &config.model,
    );
    tracing::info!(
        model = %config.model.model,
        strategy = ?config.agent.strategy,
        "Agent ready"
    );

    // Turn controller with voice adapters.
    let mut controller = TurnController::new(agent, ControllerOptions::from_config(&config))
        .with_voice_output(SynthesizerOutput::new(CommandSynthesizer::from_config(
            &config.voice.synthesis,
        )));
    if let Some(input) = build_voice_input(&config.voice) {
        controller = controller.with_voice_input(input);
    }
    tracing::debug!(session = %controller.session().id(), "Session started");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    repl::run(&mut controller, &config.chat.title, stdin, tokio::io::stdout()).await?;

    Ok(())
}
