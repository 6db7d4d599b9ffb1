//! Playback session state
//!
//! A session lives from one `speak()` until its queue runs out or it is
//! stopped. The epoch outlives sessions: it only ever grows, so an event
//! stamped with an old epoch can never match the current one.

use crate::lang::DEFAULT_LANG;
use crate::speech::backend::BackendKind;
use crate::speech::voices::Voice;

/// Observable playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Speaking,
    Paused,
}

/// Mutable state of the current (or last) session
#[derive(Debug)]
pub struct PlaybackSession {
    queue: Vec<String>,
    cursor: usize,
    status: PlaybackStatus,
    backend: BackendKind,
    lang: String,
    voice: Option<Voice>,
    epoch: u64,
    /// The chunk under the cursor has not been started yet; resume starts it
    start_pending: bool,
}

impl PlaybackSession {
    pub fn new() -> Self {
        Self {
            queue: Vec::new(),
            cursor: 0,
            status: PlaybackStatus::Idle,
            backend: BackendKind::Local,
            lang: DEFAULT_LANG.to_string(),
            voice: None,
            epoch: 0,
            start_pending: false,
        }
    }

    /// Start a new session and return its epoch
    pub fn begin(
        &mut self,
        queue: Vec<String>,
        lang: &str,
        backend: BackendKind,
        voice: Option<Voice>,
    ) -> u64 {
        self.epoch += 1;
        self.queue = queue;
        self.cursor = 0;
        self.status = PlaybackStatus::Speaking;
        self.backend = backend;
        self.lang = lang.to_string();
        self.voice = voice;
        self.start_pending = false;
        self.epoch
    }

    /// Drop the session and invalidate everything issued under it
    pub fn clear(&mut self) -> u64 {
        self.epoch += 1;
        self.queue.clear();
        self.cursor = 0;
        self.status = PlaybackStatus::Idle;
        self.voice = None;
        self.start_pending = false;
        self.epoch
    }

    /// Chunk under the cursor, if the queue is not exhausted
    pub fn current_chunk(&self) -> Option<&str> {
        self.queue.get(self.cursor).map(String::as_str)
    }

    /// Move past the current chunk; returns whether chunks remain
    pub fn advance(&mut self) -> bool {
        if self.cursor < self.queue.len() {
            self.cursor += 1;
        }
        self.cursor < self.queue.len()
    }

    /// Queue exhausted; the session ends naturally
    pub fn finish(&mut self) {
        self.cursor = self.queue.len();
        self.status = PlaybackStatus::Idle;
        self.start_pending = false;
    }

    /// Speaking -> Paused; false in any other state
    pub fn pause(&mut self) -> bool {
        if self.status != PlaybackStatus::Speaking {
            return false;
        }
        self.status = PlaybackStatus::Paused;
        true
    }

    /// Paused -> Speaking; false in any other state
    pub fn resume(&mut self) -> bool {
        if self.status != PlaybackStatus::Paused {
            return false;
        }
        self.status = PlaybackStatus::Speaking;
        true
    }

    /// Move the session from Local to Remote
    ///
    /// Returns the new epoch, so late events from the abandoned local unit
    /// are ignored, or `None` if the session is already on Remote.
    pub fn escalate(&mut self) -> Option<u64> {
        if self.backend == BackendKind::Remote {
            return None;
        }
        self.backend = BackendKind::Remote;
        self.epoch += 1;
        Some(self.epoch)
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    pub fn set_start_pending(&mut self, pending: bool) {
        self.start_pending = pending;
    }

    /// Take the pending-start flag, clearing it
    pub fn take_start_pending(&mut self) -> bool {
        std::mem::take(&mut self.start_pending)
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn queue(&self) -> &[String] {
        &self.queue
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.voice.as_ref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("chunk {}", i)).collect()
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = PlaybackSession::new();
        assert_eq!(session.status(), PlaybackStatus::Idle);
        assert!(session.queue().is_empty());
        assert_eq!(session.epoch(), 0);
    }

    #[test]
    fn test_epoch_grows_across_sessions() {
        let mut session = PlaybackSession::new();
        let first = session.begin(queue(2), "en-US", BackendKind::Local, None);
        let cleared = session.clear();
        let second = session.begin(queue(1), "en-US", BackendKind::Local, None);

        assert!(first < cleared && cleared < second);
        assert!(session.is_current(second));
        assert!(!session.is_current(first));
    }

    #[test]
    fn test_advance_to_end() {
        let mut session = PlaybackSession::new();
        session.begin(queue(2), "en-US", BackendKind::Local, None);

        assert_eq!(session.current_chunk(), Some("chunk 0"));
        assert!(session.advance());
        assert_eq!(session.current_chunk(), Some("chunk 1"));
        assert!(!session.advance());
        assert_eq!(session.current_chunk(), None);

        // Cursor never runs past the queue
        assert!(!session.advance());
        assert_eq!(session.cursor(), 2);

        session.finish();
        assert_eq!(session.status(), PlaybackStatus::Idle);
        assert_eq!(session.cursor(), session.queue().len());
    }

    #[test]
    fn test_pause_only_from_speaking() {
        let mut session = PlaybackSession::new();
        assert!(!session.pause());
        assert!(!session.resume());

        session.begin(queue(1), "en-US", BackendKind::Local, None);
        assert!(!session.resume());
        assert!(session.pause());
        assert!(!session.pause());
        assert_eq!(session.status(), PlaybackStatus::Paused);
        assert!(session.resume());
        assert_eq!(session.status(), PlaybackStatus::Speaking);
    }

    #[test]
    fn test_escalate_once() {
        let mut session = PlaybackSession::new();
        let epoch = session.begin(queue(1), "ms-MY", BackendKind::Local, None);
        assert_eq!(session.escalate(), Some(epoch + 1));
        assert_eq!(session.backend(), BackendKind::Remote);
        assert_eq!(session.escalate(), None);
        assert!(session.is_current(epoch + 1));
    }

    #[test]
    fn test_clear_resets_queue() {
        let mut session = PlaybackSession::new();
        session.begin(queue(3), "en-US", BackendKind::Local, None);
        session.advance();
        session.clear();

        assert_eq!(session.status(), PlaybackStatus::Idle);
        assert!(session.queue().is_empty());
        assert_eq!(session.cursor(), 0);
    }
}
