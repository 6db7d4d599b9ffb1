//! readaloud main entry point
//!
//! Reads text from the command line, a JSON summary file or piped stdin and
//! speaks it chunk by chunk. When stdin is a terminal the main loop also
//! watches it for single-key commands:
//! 1. p / r / space - pause, resume, toggle
//! 2. + / - - faster, slower (saved to the config file)
//! 3. s / q - stop and exit

use clap::{CommandFactory, Parser};
use log::{debug, error, info, warn};
use mio::{Events, Interest, Poll, Token};
use nix::libc;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::termios::{self, LocalFlags, SetArg, SpecialCharacterIndices, Termios};
use readaloud::config::Config;
use readaloud::lang::speech_tag;
use readaloud::speech::{PlaybackController, PlaybackStatus, SpeakOptions, SpeechInput};
use readaloud::{ReadaloudError, Result};
use std::io::{self, IsTerminal, Read};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Token for stdin in mio poll
const STDIN: Token = Token(0);

/// How often the loop drains playback events
const TICK: Duration = Duration::from_millis(50);

/// Rate change per +/- key press
const RATE_STEP: f32 = 0.1;

/// Global flag set by SIGINT/SIGTERM handler
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_interrupt(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::Relaxed);
}

/// Command line options
#[derive(Parser, Debug)]
#[command(name = "readaloud")]
#[command(about = "Speak text chunk by chunk with pause, resume and rate control")]
#[command(version = readaloud::VERSION)]
#[command(after_help = "Without TEXT or --json, text is read from piped stdin.")]
struct Args {
    /// Write debug log to readaloud.log
    #[arg(short, long)]
    debug: bool,

    /// List local voices as JSON and exit
    #[arg(long)]
    voices: bool,

    /// Language tag or code (en, zh, ms, ta, fr-FR, ...)
    #[arg(short, long, value_name = "TAG")]
    lang: Option<String>,

    /// Speech rate multiplier (1.0 is normal)
    #[arg(short, long, value_name = "RATE")]
    rate: Option<f32>,

    /// Speak the strings of a JSON summary, in order
    #[arg(short, long, value_name = "FILE")]
    json: Option<PathBuf>,

    /// Text to speak
    #[arg(value_name = "TEXT")]
    text: Vec<String>,
}

fn main() {
    let args = Args::parse();

    // Initialize logger
    if args.debug {
        // Debug mode: write to readaloud.log file
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("readaloud.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open readaloud.log for debug logging: {}", e);
                eprintln!("Continuing without file logging...");
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }

        info!(
            "{} version {} starting (debug mode, logging to readaloud.log)",
            readaloud::APP_NAME,
            readaloud::VERSION
        );
    } else {
        // Normal mode: errors only, unless RUST_LOG says otherwise
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Error)
            .parse_default_env()
            .init();
    }

    if let Err(e) = run(args) {
        error!("Fatal error: {}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    debug!("Initializing readaloud");

    let mut config = Config::load()?;
    info!("Config loaded from {:?}", config.path());

    let mut settings = config.engine_settings();
    if let Some(rate) = args.rate {
        settings.rate = rate;
    }
    let lang = args.lang.as_deref().map(speech_tag).unwrap_or(settings.lang.clone());

    let mut controller = PlaybackController::from_settings(&settings);

    if args.voices {
        println!("{}", serde_json::to_string_pretty(&controller.voices())?);
        return Ok(());
    }

    if !controller.is_supported() {
        return Err(ReadaloudError::Speech(
            "Speech is not supported on this system".to_string(),
        ));
    }

    let from_stdin = args.text.is_empty() && args.json.is_none();
    let input = read_input(&args)?;

    install_signal_handlers()?;

    if !controller.speak(input, SpeakOptions::lang(&lang)) {
        eprintln!("Nothing to read");
        return Ok(());
    }

    if !from_stdin && io::stdin().is_terminal() {
        run_interactive(&mut controller, &mut config)?;
    } else {
        wait_until_idle(&mut controller);
    }

    let failure = controller.last_failure().map(str::to_string);
    match failure {
        Some(reason) => Err(ReadaloudError::Speech(reason)),
        None => Ok(()),
    }
}

/// Gather the text to speak from the command line, a JSON file or stdin
fn read_input(args: &Args) -> Result<SpeechInput> {
    if let Some(path) = args.json.as_ref() {
        debug!("Reading JSON summary from {:?}", path);
        let contents = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&contents)?;
        return Ok(SpeechInput::from_json(&value));
    }

    if !args.text.is_empty() {
        return Ok(SpeechInput::Text(args.text.join(" ")));
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Err(ReadaloudError::Other(format!(
            "No text given\n\n{}",
            Args::command().render_usage()
        )));
    }

    let mut text = String::new();
    stdin.lock().read_to_string(&mut text)?;
    Ok(SpeechInput::Text(text))
}

fn install_signal_handlers() -> Result<()> {
    for sig in [Signal::SIGINT, Signal::SIGTERM] {
        unsafe {
            signal::signal(sig, SigHandler::Handler(handle_interrupt)).map_err(|e| {
                ReadaloudError::Other(format!("Failed to set {:?} handler: {}", sig, e))
            })?;
        }
    }
    Ok(())
}

/// Drain playback events until the session ends
fn wait_until_idle(controller: &mut PlaybackController) {
    while controller.status() != PlaybackStatus::Idle {
        if INTERRUPTED.load(Ordering::Relaxed) {
            info!("Interrupted, stopping playback");
            controller.stop();
            break;
        }
        controller.wait_event(TICK);
    }
}

/// Single-key playback commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyCommand {
    Pause,
    Resume,
    Toggle,
    Faster,
    Slower,
    Stop,
}

fn key_command(byte: u8) -> Option<KeyCommand> {
    match byte {
        b'p' | b'P' => Some(KeyCommand::Pause),
        b'r' | b'R' => Some(KeyCommand::Resume),
        b' ' => Some(KeyCommand::Toggle),
        b'+' | b'=' => Some(KeyCommand::Faster),
        b'-' | b'_' => Some(KeyCommand::Slower),
        b's' | b'S' | b'q' | b'Q' | 0x1b => Some(KeyCommand::Stop),
        _ => None,
    }
}

fn apply_key(controller: &mut PlaybackController, config: &mut Config, command: KeyCommand) {
    debug!("Key command: {:?}", command);
    match command {
        KeyCommand::Pause => controller.pause(),
        KeyCommand::Resume => controller.resume(),
        KeyCommand::Toggle => match controller.status() {
            PlaybackStatus::Paused => controller.resume(),
            _ => controller.pause(),
        },
        KeyCommand::Faster | KeyCommand::Slower => {
            let step = if command == KeyCommand::Faster {
                RATE_STEP
            } else {
                -RATE_STEP
            };
            controller.set_rate(controller.rate() + step);
            config.set_rate(controller.rate());
            if let Err(e) = config.save() {
                warn!("Failed to save rate: {}", e);
            }
            println!("Rate {:.1}\r", controller.rate());
        }
        KeyCommand::Stop => controller.stop(),
    }
}

fn run_interactive(controller: &mut PlaybackController, config: &mut Config) -> Result<()> {
    let stdin = io::stdin();
    let stdin_fd = stdin.as_raw_fd();

    // Single key presses without echo; Ctrl+C still raises SIGINT
    let _guard = TermiosGuard::new()?;

    let mut poll = Poll::new()?;
    let mut stdin_source = mio::unix::SourceFd(&stdin_fd);
    poll.registry()
        .register(&mut stdin_source, STDIN, Interest::READABLE)?;
    let mut events = Events::with_capacity(16);

    println!("p pause, r resume, space toggle, +/- rate, q quit\r");
    info!("Entering event loop");

    let mut buf = [0u8; 64];
    loop {
        controller.process_events();
        if controller.status() == PlaybackStatus::Idle {
            break;
        }
        if INTERRUPTED.load(Ordering::Relaxed) {
            info!("Interrupted, stopping playback");
            controller.stop();
            break;
        }

        match poll.poll(&mut events, Some(TICK)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }

        for event in events.iter() {
            if event.token() != STDIN {
                continue;
            }
            let n = stdin.lock().read(&mut buf)?;
            if n == 0 {
                debug!("stdin closed");
                controller.stop();
                break;
            }
            for command in buf[..n].iter().filter_map(|&b| key_command(b)) {
                apply_key(controller, config, command);
            }
        }
    }

    Ok(())
}

/// Puts stdin in non-canonical, no-echo mode and restores it on drop
struct TermiosGuard {
    original: Termios,
}

impl TermiosGuard {
    fn new() -> Result<Self> {
        let original = termios::tcgetattr(io::stdin()).map_err(io::Error::from)?;

        let mut raw = original.clone();
        raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &raw).map_err(io::Error::from)?;

        Ok(Self { original })
    }
}

impl Drop for TermiosGuard {
    fn drop(&mut self) {
        if let Err(e) = termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &self.original) {
            warn!("Failed to restore terminal attributes: {}", e);
        }
        debug!("Terminal attributes restored");
    }
}
