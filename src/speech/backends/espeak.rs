//! espeak-ng subprocess backend
//!
//! Fallback for Linux systems without Speech Dispatcher. Each utterance is
//! one espeak-ng process reading its text from stdin; a waiter thread turns
//! the exit status into a playback outcome. Pause and resume stop and
//! continue the process in place with SIGSTOP/SIGCONT.
//!
//! Dependencies:
//! - espeak-ng (install with: sudo apt install espeak-ng)

use crate::lang::primary_subtag;
use crate::speech::backend::Notifier;
use crate::speech::backends::local::Synthesizer;
use crate::speech::voices::Voice;
use crate::{ReadaloudError, Result};
use log::{debug, error, warn};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io::{self, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// espeak-ng's default speed in words per minute
const NORMAL_WPM: f32 = 175.0;
const MIN_WPM: f32 = 80.0;
const MAX_WPM: f32 = 450.0;

/// How often the waiter checks whether espeak-ng has exited
const REAP_INTERVAL: Duration = Duration::from_millis(20);

/// A running espeak-ng process
///
/// The child is only reaped while its lock is held, so a pid read under the
/// lock from a child that has not exited still belongs to that child.
struct Utterance {
    child: Arc<Mutex<Child>>,
    cancelled: Arc<AtomicBool>,
}

/// espeak-ng synthesizer
pub struct EspeakSynthesizer {
    espeak_path: String,
    current: Option<Utterance>,
}

impl EspeakSynthesizer {
    /// Create a new espeak-ng synthesizer
    ///
    /// Verifies espeak-ng is installed
    pub fn new() -> Result<Self> {
        debug!("Creating espeak-ng backend");

        let espeak_path = Self::find_espeak()?;
        debug!("Found espeak-ng at: {}", espeak_path);

        Ok(Self {
            espeak_path,
            current: None,
        })
    }

    /// Find espeak-ng executable
    fn find_espeak() -> Result<String> {
        let paths = ["espeak-ng", "/usr/bin/espeak-ng"];

        for path in paths {
            if let Ok(status) = Command::new(path)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                if status.success() {
                    return Ok(path.to_string());
                }
            }
        }

        Err(ReadaloudError::Speech(
            "espeak-ng not found. Install with: sudo apt install espeak-ng".to_string(),
        ))
    }

    /// Convert a rate multiplier to espeak speed (80-450 wpm)
    fn rate_to_wpm(rate: f32) -> u16 {
        (NORMAL_WPM * rate).clamp(MIN_WPM, MAX_WPM).round() as u16
    }

    /// Send a signal to the current process
    ///
    /// Returns whether a live process was signalled. Exited processes are
    /// skipped, so their recycled pids are never touched.
    fn signal_current(&self, signal: Signal) -> Result<bool> {
        let Some(utterance) = self.current.as_ref() else {
            return Ok(false);
        };

        let mut child = utterance
            .child
            .lock()
            .map_err(|_| ReadaloudError::Speech("espeak-ng process lock poisoned".to_string()))?;
        if !matches!(child.try_wait(), Ok(None)) {
            return Ok(false);
        }

        match kill(Pid::from_raw(child.id() as i32), signal) {
            Ok(()) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(e) => Err(ReadaloudError::Speech(format!(
                "Failed to send {:?} to espeak-ng: {}",
                signal, e
            ))),
        }
    }
}

/// Poll the child until it exits, reaping it under its lock
fn wait_for_exit(child: &Mutex<Child>) -> io::Result<ExitStatus> {
    loop {
        let status = child
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "process lock poisoned"))?
            .try_wait()?;
        match status {
            Some(status) => return Ok(status),
            None => thread::sleep(REAP_INTERVAL),
        }
    }
}

/// Parse the table printed by `espeak-ng --voices`
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  af              --/M      Afrikaans          gmw/af
/// ```
fn parse_voice_list(output: &str) -> Vec<Voice> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [_, lang, _, name, ..] => Some(Voice::new(lang, &name.replace('_', " "), lang, true)),
                _ => None,
            }
        })
        .collect()
}

impl Synthesizer for EspeakSynthesizer {
    fn name(&self) -> &str {
        "espeak-ng"
    }

    fn voices(&self) -> Result<Vec<Voice>> {
        let output = Command::new(&self.espeak_path)
            .arg("--voices")
            .output()
            .map_err(|e| ReadaloudError::Speech(format!("Failed to list voices: {}", e)))?;

        Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
    }

    fn speak(
        &mut self,
        text: &str,
        lang: &str,
        voice: Option<&Voice>,
        rate: f32,
        notifier: Notifier,
    ) -> Result<()> {
        self.cancel()?;

        let voice_name = voice
            .map(|v| v.id.clone())
            .unwrap_or_else(|| primary_subtag(lang));

        let mut cmd = Command::new(&self.espeak_path);
        if !voice_name.is_empty() {
            cmd.arg("-v").arg(&voice_name);
        }
        cmd.arg("-s").arg(Self::rate_to_wpm(rate).to_string());
        cmd.arg("--stdin");
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| {
            error!("Failed to spawn espeak-ng: {}", e);
            ReadaloudError::Speech(format!("Failed to start espeak-ng: {}", e))
        })?;

        // Closing stdin marks the end of the text. A broken pipe means the
        // process already exited, and its exit status tells the rest.
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(text.as_bytes()) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!("espeak-ng closed stdin early");
                }
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ReadaloudError::Speech(format!(
                        "Failed to send text to espeak-ng: {}",
                        e
                    )));
                }
            }
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let child = Arc::new(Mutex::new(child));
        self.current = Some(Utterance {
            child: Arc::clone(&child),
            cancelled: Arc::clone(&cancelled),
        });
        debug!("espeak-ng process started");

        thread::Builder::new()
            .name("espeak-waiter".to_string())
            .spawn(move || match wait_for_exit(&child) {
                _ if cancelled.load(Ordering::SeqCst) => notifier.interrupted(),
                Ok(status) if status.success() => notifier.completed(),
                Ok(status) => notifier.failed(format!("espeak-ng exited with {}", status)),
                Err(e) => notifier.failed(format!("Failed to wait for espeak-ng: {}", e)),
            })
            .map_err(|e| ReadaloudError::Speech(format!("Failed to start waiter: {}", e)))?;

        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        debug!("Pausing espeak-ng");
        self.signal_current(Signal::SIGSTOP).map(drop)
    }

    fn resume(&mut self) -> Result<()> {
        debug!("Resuming espeak-ng");
        self.signal_current(Signal::SIGCONT).map(drop)
    }

    fn cancel(&mut self) -> Result<()> {
        let Some(utterance) = self.current.as_ref() else {
            return Ok(());
        };
        debug!("Killing espeak-ng process");
        utterance.cancelled.store(true, Ordering::SeqCst);

        // A stopped process must be continued before it can die
        self.signal_current(Signal::SIGCONT)?;
        self.signal_current(Signal::SIGKILL)?;
        self.current = None;
        Ok(())
    }

    fn set_rate(&mut self, rate: f32) -> Result<()> {
        if self.current.is_some() {
            warn!(
                "espeak-ng takes its speed at launch; rate {} applies from the next chunk",
                rate
            );
        }
        Ok(())
    }
}

impl Drop for EspeakSynthesizer {
    fn drop(&mut self) {
        debug!("Shutting down espeak-ng backend");
        let _ = self.cancel();
    }
}
