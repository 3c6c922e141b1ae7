//! Local edit buffer with a debounced flush.
//!
//! The buffer holds the text the user sees. Local edits replace it
//! immediately and (re)arm a single timer; only the last edit of a burst
//! reaches the store. While the timer is armed the user is "still typing",
//! and remote updates are recorded without touching the visible text.
//!
//! The buffer does not spawn anything itself. The owner supplies the timer
//! task when an edit arms it, and presents the [`FlushTicket`] back through
//! [`EditBuffer::fire`] when the quiet period elapses. A ticket from a
//! superseded arm is rejected, so a timer that lost a race with a newer edit
//! never flushes a stale value.
//!
//! Writes this session sends are noted until the store echoes them back.
//! The echo of an own write that has since been superseded by a newer own
//! write is ignored, so late delivery cannot roll the visible text back.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Identifies one arming of the debounce timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlushTicket(u64);

/// Identifies one write sent by this buffer's session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct WriteId(u64);

/// Debounced local edit buffer.
#[derive(Debug)]
pub struct EditBuffer {
    /// What the user sees.
    value: String,
    /// Last text received from the store.
    backing: String,
    generation: u64,
    timer: Option<JoinHandle<()>>,
    quiet_period: Duration,
    disposed: bool,
    /// Own writes not yet echoed back, oldest first.
    in_flight: VecDeque<(WriteId, i64, String)>,
    next_write: u64,
    /// Newest own write that was not rejected.
    newest_write: Option<WriteId>,
    newest_echo: Option<WriteId>,
}

/// Own writes remembered while waiting for their echo.
const MAX_IN_FLIGHT: usize = 32;

impl EditBuffer {
    pub fn new(initial: impl Into<String>, quiet_period: Duration) -> Self {
        let initial = initial.into();
        Self {
            value: initial.clone(),
            backing: initial,
            generation: 0,
            timer: None,
            quiet_period,
            disposed: false,
            in_flight: VecDeque::new(),
            next_write: 0,
            newest_write: None,
            newest_echo: None,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Last text received from the store, which may be hidden while typing.
    pub fn backing(&self) -> &str {
        &self.backing
    }

    /// Whether an edit is waiting for its quiet period to elapse.
    pub fn is_pending(&self) -> bool {
        self.timer.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Replace the value and re-arm the timer.
    ///
    /// `arm` receives the ticket and the quiet period and must return the
    /// spawned timer task. Any previously armed timer is aborted first.
    pub fn on_local_edit<F>(&mut self, text: impl Into<String>, arm: F)
    where
        F: FnOnce(FlushTicket, Duration) -> JoinHandle<()>,
    {
        if self.disposed {
            return;
        }
        self.cancel_timer();
        self.value = text.into();
        self.generation += 1;
        let ticket = FlushTicket(self.generation);
        debug!(generation = self.generation, "debounce armed");
        self.timer = Some(arm(ticket, self.quiet_period));
    }

    /// Called by the timer task when its quiet period elapses.
    ///
    /// Returns the value to flush and disarms, or `None` if the ticket was
    /// superseded or the buffer was disposed.
    pub fn fire(&mut self, ticket: FlushTicket) -> Option<String> {
        if self.disposed || ticket.0 != self.generation || self.timer.is_none() {
            return None;
        }
        // The running task is the one holding this ticket; dropping its
        // handle detaches rather than aborts.
        self.timer = None;
        debug!(generation = self.generation, "debounce fired");
        Some(self.value.clone())
    }

    /// Disarm the timer early and return the pending value, if any.
    pub fn flush_pending(&mut self) -> Option<String> {
        if self.disposed || self.timer.is_none() {
            return None;
        }
        self.cancel_timer();
        Some(self.value.clone())
    }

    /// Note a write of `text` stamped `last_updated` about to be sent.
    pub fn note_write(&mut self, last_updated: i64, text: impl Into<String>) -> WriteId {
        if self.in_flight.len() == MAX_IN_FLIGHT {
            self.in_flight.pop_front();
        }
        let id = WriteId(self.next_write);
        self.next_write += 1;
        self.in_flight.push_back((id, last_updated, text.into()));
        self.newest_write = Some(id);
        id
    }

    /// Forget a noted write that the store rejected.
    pub fn forget_write(&mut self, id: WriteId) {
        self.in_flight.retain(|(noted, _, _)| *noted != id);
        if self.newest_write == Some(id) {
            let pending = self.in_flight.iter().map(|(noted, _, _)| *noted).max();
            self.newest_write = pending.max(self.newest_echo);
        }
    }

    /// Record a remote update stamped `last_updated`.
    ///
    /// When idle, a differing remote text replaces the visible value and is
    /// returned. While an edit is pending the visible value is kept. A late
    /// echo of an own write older than the newest own write is dropped.
    pub fn on_remote_update(
        &mut self,
        remote: impl Into<String>,
        last_updated: i64,
    ) -> Option<&str> {
        if self.disposed {
            return None;
        }
        let remote = remote.into();
        let echoed = self
            .in_flight
            .iter()
            .position(|(_, stamp, text)| *stamp == last_updated && *text == remote);
        if let Some((id, _, _)) = echoed.and_then(|pos| self.in_flight.remove(pos)) {
            self.newest_echo = self.newest_echo.max(Some(id));
            if self.newest_write.is_some_and(|newest| id < newest) {
                debug!(last_updated, "stale echo of own write ignored");
                return None;
            }
        }
        self.backing = remote;
        if self.is_pending() {
            if self.backing != self.value {
                debug!("remote update suppressed while typing");
            }
            return None;
        }
        if self.backing == self.value {
            return None;
        }
        self.value.clone_from(&self.backing);
        Some(&self.value)
    }

    /// Drop any pending edit and show `text`.
    pub fn reset(&mut self, text: impl Into<String>) {
        self.cancel_timer();
        self.backing = text.into();
        self.value.clone_from(&self.backing);
    }

    /// Cancel the timer for good. Further edits and fires are ignored.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.cancel_timer();
        self.disposed = true;
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for EditBuffer {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    const QUIET: Duration = Duration::from_millis(500);

    fn idle_timer(_: FlushTicket, _: Duration) -> JoinHandle<()> {
        tokio::spawn(std::future::pending())
    }

    #[tokio::test]
    async fn test_local_edit_replaces_value() {
        let mut buf = EditBuffer::new("start", QUIET);
        buf.on_local_edit("typed", idle_timer);

        assert_eq!(buf.value(), "typed");
        assert!(buf.is_pending());
    }

    #[tokio::test]
    async fn test_only_latest_ticket_fires() {
        let mut buf = EditBuffer::new("", QUIET);
        let mut tickets = Vec::new();
        for text in ["a", "ab", "abc"] {
            buf.on_local_edit(text, |ticket, _| {
                tickets.push(ticket);
                tokio::spawn(std::future::pending())
            });
        }

        assert_eq!(buf.fire(tickets[0]), None);
        assert_eq!(buf.fire(tickets[1]), None);
        assert_eq!(buf.fire(tickets[2]), Some("abc".to_string()));
        // Fires exactly once
        assert_eq!(buf.fire(tickets[2]), None);
        assert!(!buf.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_aborts_previous_timer() {
        let flushed = Arc::new(Mutex::new(Vec::new()));
        let mut buf = EditBuffer::new("", QUIET);

        for text in ["h", "he", "hel"] {
            let flushed = flushed.clone();
            buf.on_local_edit(text, move |_, quiet| {
                tokio::spawn(async move {
                    tokio::time::sleep(quiet).await;
                    flushed.lock().await.push(text);
                })
            });
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(QUIET).await;

        assert_eq!(*flushed.lock().await, vec!["hel"]);
    }

    #[tokio::test]
    async fn test_remote_update_applies_when_idle() {
        let mut buf = EditBuffer::new("old", QUIET);
        assert_eq!(buf.on_remote_update("new", 1), Some("new"));
        assert_eq!(buf.value(), "new");
        // Same text again is not a change.
        assert_eq!(buf.on_remote_update("new", 1), None);
    }

    #[tokio::test]
    async fn test_remote_update_suppressed_while_pending() {
        let mut buf = EditBuffer::new("", QUIET);
        buf.on_local_edit("my draf", idle_timer);

        assert_eq!(buf.on_remote_update("their text", 1), None);
        assert_eq!(buf.value(), "my draf");
        assert_eq!(buf.backing(), "their text");
    }

    #[tokio::test]
    async fn test_remote_update_after_fire_applies() {
        let mut buf = EditBuffer::new("", QUIET);
        let mut ticket = None;
        buf.on_local_edit("mine", |t, _| {
            ticket = Some(t);
            tokio::spawn(std::future::pending())
        });
        buf.fire(ticket.unwrap());

        assert_eq!(buf.on_remote_update("theirs", 1), Some("theirs"));
    }

    #[tokio::test]
    async fn test_dispose_cancels_and_ignores() {
        let mut buf = EditBuffer::new("", QUIET);
        let mut ticket = None;
        buf.on_local_edit("x", |t, _| {
            ticket = Some(t);
            tokio::spawn(std::future::pending())
        });

        buf.dispose();
        assert!(buf.is_disposed());
        assert!(!buf.is_pending());
        assert_eq!(buf.fire(ticket.unwrap()), None);

        buf.on_local_edit("y", idle_timer);
        assert_eq!(buf.value(), "x");
        assert_eq!(buf.on_remote_update("z", 1), None);
    }

    #[tokio::test]
    async fn test_flush_pending_disarms() {
        let mut buf = EditBuffer::new("", QUIET);
        assert_eq!(buf.flush_pending(), None);

        let mut ticket = None;
        buf.on_local_edit("now", |t, _| {
            ticket = Some(t);
            tokio::spawn(std::future::pending())
        });
        assert_eq!(buf.flush_pending(), Some("now".to_string()));
        assert!(!buf.is_pending());
        assert_eq!(buf.fire(ticket.unwrap()), None);
    }

    #[tokio::test]
    async fn test_reset_discards_pending_edit() {
        let mut buf = EditBuffer::new("", QUIET);
        buf.on_local_edit("draft", idle_timer);

        buf.reset("server");
        assert!(!buf.is_pending());
        assert_eq!(buf.value(), "server");
        assert_eq!(buf.backing(), "server");
    }

    #[tokio::test]
    async fn test_late_echo_of_older_write_is_ignored() {
        let mut buf = EditBuffer::new("", QUIET);
        buf.note_write(10, "first");
        buf.note_write(20, "second");
        buf.reset("second");

        // Echoes arrive newest first.
        assert_eq!(buf.on_remote_update("second", 20), None);
        assert_eq!(buf.on_remote_update("first", 10), None);
        assert_eq!(buf.value(), "second");
        assert_eq!(buf.backing(), "second");

        // Another client's text still applies.
        assert_eq!(buf.on_remote_update("other", 15), Some("other"));
    }

    #[tokio::test]
    async fn test_same_stamp_writes_order_by_send() {
        let mut buf = EditBuffer::new("", QUIET);
        buf.note_write(10, "a");
        buf.note_write(10, "ab");
        buf.reset("ab");

        assert_eq!(buf.on_remote_update("ab", 10), None);
        assert_eq!(buf.on_remote_update("a", 10), None);
        assert_eq!(buf.value(), "ab");
    }

    #[tokio::test]
    async fn test_forgotten_write_does_not_mask_remote() {
        let mut buf = EditBuffer::new("", QUIET);
        buf.note_write(10, "sent");
        let rejected = buf.note_write(20, "rejected");
        buf.forget_write(rejected);

        assert_eq!(buf.on_remote_update("sent", 10), Some("sent"));
    }
}
