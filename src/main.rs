//! Application entry point: MindScan console session.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Build the [`Platform`]: the HTTP scoring client plus whatever device
//!    and speech capabilities the host offers (none on a plain terminal).
//! 5. Spawn the event printer.
//! 6. Read commands from stdin until `:quit` or end of input.
//!
//! Without a camera or speech engine the session still runs end to end:
//! answers are typed, and the scoring request carries no visual data.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use mindscan::{
    config::AppConfig,
    scoring::{HttpScoringClient, ScoringService, SentimentService, VisualPanel},
    sensor::{MediaDevices, NoMediaDevices},
    session::{
        Navigation, Platform, SessionController, SessionError, SessionEvent, Stage,
        INTERVIEW_TOPICS, PHQ_OPTIONS, PHQ_QUESTIONS,
    },
};

const HELP: &str = "\
commands start with `:`; any other line is an answer.
  :begin                   start the session
  :camera | :mic | :voice  setup checks (toggle camera, toggle mic test, play voice)
  :start                   begin the interview
  :rec                     toggle voice recording
  <text>                   answer the current interview prompt
  0-3                      answer the current questionnaire item
  :next | :back            questionnaire navigation
  :submit                  retry a failed submission
  :reset                   start over
  :quit";

// ---------------------------------------------------------------------------
// Event printer
// ---------------------------------------------------------------------------

async fn print_events(mut events: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        if let Some(line) = render(&event) {
            println!("{line}");
        }
    }
}

fn render(event: &SessionEvent) -> Option<String> {
    let line = match event {
        SessionEvent::StageChanged(stage) => format!("── {} ({}/5) ──", stage, stage.step() + 1),
        SessionEvent::CheckUpdated { device, status } => format!("  {device:?}: {status}"),
        SessionEvent::ModalityUnavailable { modality, reason } => {
            format!("  ! {modality} unavailable ({reason})")
        }
        SessionEvent::AssistantTyping => "  …".to_string(),
        SessionEvent::AssistantMessage(text) => format!("Mira: {}", text.replace("**", "")),
        SessionEvent::UserMessage(text) => format!("You: {text}"),
        SessionEvent::InterviewProgress(index) => {
            let topic = INTERVIEW_TOPICS.get(*index).copied().unwrap_or("done");
            format!("  [{}/{}] {topic}", index, INTERVIEW_TOPICS.len())
        }
        SessionEvent::RecordingChanged(on) => {
            format!("  recording {}", if *on { "started" } else { "stopped" })
        }
        SessionEvent::QuestionShown { index, answer } => {
            let mut out = format!(
                "Q{}/{}: {}",
                index + 1,
                PHQ_QUESTIONS.len(),
                PHQ_QUESTIONS[*index]
            );
            for option in PHQ_OPTIONS {
                let mark = if *answer == Some(option.value) { '*' } else { ' ' };
                out.push_str(&format!("\n  {mark} {} {}", option.value, option.label));
            }
            out
        }
        SessionEvent::Submitting => "  analyzing…".to_string(),
        SessionEvent::SubmissionFailed(message) => {
            format!("  submission failed: {message} (type `:submit` to retry)")
        }
        SessionEvent::ResultsReady(view) => {
            let mut out = view.to_string();
            if let VisualPanel::Measured { note, .. } = &view.visual {
                out.push_str(&format!("\n{note}"));
            }
            out
        }
        SessionEvent::SentimentReady(s) => format!(
            "Sentiment: {:.0}% negative, {:.0}% neutral, {:.0}% positive",
            s.neg * 100.0,
            s.neu * 100.0,
            s.pos * 100.0
        ),
        SessionEvent::InputEnabled(_) | SessionEvent::PlaybackAvailable(_) => return None,
    };
    Some(line)
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// One line of console input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    /// `:word`, lower-cased.
    Command(String),
    /// Anything else: an interview answer or a questionnaire key.
    Answer(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    match line.strip_prefix(':') {
        Some(command) => Input::Command(command.trim().to_ascii_lowercase()),
        None => Input::Answer(line),
    }
}

/// Run one line of input.  Returns `false` on `:quit`.
async fn dispatch(controller: &mut SessionController, line: &str) -> Result<bool, SessionError> {
    let command = match parse_input(line) {
        Input::Command(command) => command,
        Input::Answer(text) => {
            answer(controller, text).await?;
            return Ok(true);
        }
    };
    match command.as_str() {
        "quit" | "exit" => return Ok(false),
        "help" | "?" => println!("{HELP}"),
        "begin" => controller.begin()?,
        "camera" => {
            controller.toggle_setup_camera().await?;
        }
        "mic" => {
            controller.toggle_setup_microphone().await?;
        }
        "voice" => {
            controller.test_voice().await?;
        }
        "start" => controller.start_interview().await?,
        "rec" => {
            if !controller.toggle_recording().await? {
                let heard = controller.recording_transcript();
                if !heard.trim().is_empty() {
                    println!("  heard: {heard}");
                }
            }
        }
        "next" => {
            if controller.advance().await? == Navigation::Blocked {
                println!("  select an answer first");
            }
        }
        "back" => {
            controller.retreat()?;
        }
        "submit" => controller.submit().await?,
        "reset" => controller.reset(),
        other => println!("  unknown command `:{other}`, type `:help`"),
    }
    Ok(true)
}

async fn answer(controller: &mut SessionController, text: &str) -> Result<(), SessionError> {
    match controller.stage() {
        Stage::Interview => {
            controller.submit_utterance(text).await?;
        }
        Stage::Questionnaire => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(key), None) if controller.handle_key(key) => {}
                _ => println!("  answer with 0-3, or type `:help`"),
            }
        }
        _ => println!("  commands start with `:`, type `:help`"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("MindScan starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    rt.block_on(run(config))
}

async fn run(config: AppConfig) -> Result<()> {
    // 4. Platform
    let client = Arc::new(HttpScoringClient::from_config(&config.scoring));
    log::info!("Scoring service: {}", config.scoring.base_url);
    let platform = Platform {
        devices: Arc::new(NoMediaDevices) as Arc<dyn MediaDevices>,
        detector: None,
        synthesizer: None,
        recognizer: None,
        scoring: Arc::clone(&client) as Arc<dyn ScoringService>,
        sentiment: Some(client as Arc<dyn SentimentService>),
    };

    // 5. Event printer
    let (mut controller, events) = SessionController::new(config, platform);
    tokio::spawn(print_events(events));

    // 6. Command loop
    println!("MindScan: a short, private mental-health check-in.");
    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match dispatch(&mut controller, line).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("  {e}"),
        }
    }

    controller.reset();
    log::info!("MindScan shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_words_without_prefix_are_answers() {
        for word in ["next", "back", "submit", "reset", "quit"] {
            assert_eq!(parse_input(word), Input::Answer(word));
        }
        let text = "I want to reset my sleep";
        assert_eq!(parse_input(text), Input::Answer(text));
        assert_eq!(parse_input("2"), Input::Answer("2"));
    }

    #[test]
    fn prefixed_lines_are_commands() {
        assert_eq!(parse_input(":next"), Input::Command("next".into()));
        assert_eq!(parse_input(": Reset "), Input::Command("reset".into()));
    }
}
