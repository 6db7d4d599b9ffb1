//! Matching platform utterance callbacks to the chunk that started them
//!
//! Platform services report the end of an utterance on their own thread and
//! tag it with an id the service chose. The id is only known once `speak`
//! returns, and a short utterance can finish before that, so callbacks for a
//! pending utterance are held until the id arrives.

use crate::speech::backend::Notifier;
use crate::{ReadaloudError, Result};
use log::debug;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard};

/// How a callback's utterance id is matched against ours
#[derive(Debug, Clone, Copy)]
enum IdMatch<Id> {
    /// `speak()` has not returned the id yet
    Pending,
    Known(Id),
    /// The platform returns no ids; any callback is ours
    Any,
}

struct ActiveUtterance<Id> {
    id: IdMatch<Id>,
    notifier: Notifier,
}

struct TrackerState<Id> {
    active: Option<ActiveUtterance<Id>>,
    /// Callbacks that arrived while the id was still pending
    early: Vec<(Id, bool)>,
}

/// The utterance a synthesizer currently owns, shared with its callbacks
pub struct UtteranceTracker<Id> {
    state: Arc<Mutex<TrackerState<Id>>>,
}

impl<Id> Clone for UtteranceTracker<Id> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<Id: Copy + PartialEq + Debug> Default for UtteranceTracker<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: Copy + PartialEq + Debug> UtteranceTracker<Id> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerState {
                active: None,
                early: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, TrackerState<Id>>> {
        self.state
            .lock()
            .map_err(|_| ReadaloudError::Speech("Utterance state lock poisoned".to_string()))
    }

    /// Claim the next utterance before handing its text to the platform
    pub fn begin(&self, notifier: Notifier) -> Result<()> {
        let mut state = self.lock()?;
        state.early.clear();
        state.active = Some(ActiveUtterance {
            id: IdMatch::Pending,
            notifier,
        });
        Ok(())
    }

    /// Record the id the platform gave the utterance claimed by `begin`
    ///
    /// Reports the outcome right away if a callback for it already arrived.
    pub fn started(&self, id: Option<Id>) -> Result<()> {
        let mut state = self.lock()?;
        let early = std::mem::take(&mut state.early);
        if state.active.is_none() {
            return Ok(());
        }

        let finished = match id {
            Some(id) => early.iter().find(|(early_id, _)| *early_id == id).map(|e| e.1),
            None => early.last().map(|e| e.1),
        };

        match finished {
            Some(completed) => {
                if let Some(utterance) = state.active.take() {
                    report(utterance.notifier, completed);
                }
            }
            None => {
                if let Some(active) = state.active.as_mut() {
                    active.id = id.map_or(IdMatch::Any, IdMatch::Known);
                }
            }
        }
        Ok(())
    }

    /// Forget the active utterance without reporting it
    ///
    /// Must run before silencing the platform, so the stop callback that
    /// follows finds nothing to report.
    pub fn abandon(&self) -> Result<Option<Notifier>> {
        Ok(self.lock()?.active.take().map(|a| a.notifier))
    }

    pub fn is_active(&self) -> bool {
        self.lock().map(|s| s.active.is_some()).unwrap_or(false)
    }

    /// Route a platform callback to the active utterance, if it is ours
    pub fn finished(&self, id: Id, completed: bool) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        let ours = match state.active.as_ref().map(|a| a.id) {
            Some(IdMatch::Known(own)) => own == id,
            Some(IdMatch::Any) => true,
            Some(IdMatch::Pending) => {
                state.early.push((id, completed));
                return;
            }
            None => false,
        };

        if !ours {
            debug!("Ignoring callback for utterance {:?}", id);
            return;
        }
        if let Some(utterance) = state.active.take() {
            report(utterance.notifier, completed);
        }
    }
}

fn report(notifier: Notifier, completed: bool) {
    if completed {
        notifier.completed();
    } else {
        // Our own stops abandon the utterance first, so this one came from
        // outside
        notifier.interrupted();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::backend::{FailureReason, PlaybackOutcome};
    use std::sync::mpsc;

    #[test]
    fn test_callback_for_known_id_reports_once() {
        let tracker = UtteranceTracker::<u64>::new();
        let (tx, rx) = mpsc::channel();

        tracker.begin(Notifier::new(4, tx)).unwrap();
        tracker.started(Some(7)).unwrap();
        tracker.finished(3, true);
        assert!(rx.try_recv().is_err());

        tracker.finished(7, true);
        tracker.finished(7, true);
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].epoch, 4);
        assert_eq!(events[0].outcome, PlaybackOutcome::Completed);
        assert!(!tracker.is_active());
    }

    #[test]
    fn test_callback_before_id_is_known() {
        let tracker = UtteranceTracker::<u64>::new();
        let (tx, rx) = mpsc::channel();

        tracker.begin(Notifier::new(1, tx)).unwrap();
        tracker.finished(9, true);
        assert!(rx.try_recv().is_err());

        tracker.started(Some(9)).unwrap();
        assert_eq!(rx.try_recv().unwrap().outcome, PlaybackOutcome::Completed);
    }

    #[test]
    fn test_abandoned_utterance_is_not_reported() {
        let tracker = UtteranceTracker::<u64>::new();
        let (tx, rx) = mpsc::channel();

        tracker.begin(Notifier::new(1, tx)).unwrap();
        tracker.started(Some(2)).unwrap();
        assert!(tracker.abandon().unwrap().is_some());
        tracker.finished(2, false);

        assert!(rx.try_recv().is_err());
        assert!(tracker.abandon().unwrap().is_none());
    }

    #[test]
    fn test_outside_stop_reports_interruption() {
        let tracker = UtteranceTracker::<u64>::new();
        let (tx, rx) = mpsc::channel();

        tracker.begin(Notifier::new(1, tx)).unwrap();
        tracker.started(None).unwrap();
        tracker.finished(11, false);

        assert_eq!(
            rx.try_recv().unwrap().outcome,
            PlaybackOutcome::Failed(FailureReason::Interrupted)
        );
    }
}
