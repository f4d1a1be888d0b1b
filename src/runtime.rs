use std::cell::Cell;
use std::rc::Rc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::debug;

/// Input the trial loop reacts to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The participant signalled "match"
    Response,
    /// End the session now
    Stop,
}

/// Monotonic time since the session clock's origin
pub trait Clock {
    fn now(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Source of participant input. Every suspension of the trial loop waits here,
/// which is what lets a `Stop` cut any of them short.
pub trait ResponseInput {
    /// Called as a response window opens; anything received earlier is dropped.
    fn open_window(&mut self);

    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&mut self, timeout: Duration) -> Result<SessionEvent, RecvTimeoutError>;
}

/// Production input fed by another thread over a channel
pub struct ChannelInput {
    rx: Receiver<SessionEvent>,
    stop_pending: bool,
}

impl ChannelInput {
    pub fn new(rx: Receiver<SessionEvent>) -> Self {
        Self {
            rx,
            stop_pending: false,
        }
    }
}

impl ResponseInput for ChannelInput {
    fn open_window(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(SessionEvent::Stop) => self.stop_pending = true,
                Ok(SessionEvent::Response) => debug!("dropping response queued before window"),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Result<SessionEvent, RecvTimeoutError> {
        if self.stop_pending {
            return Ok(SessionEvent::Stop);
        }
        self.rx.recv_timeout(timeout)
    }
}

/// Space signals a match; Esc, `q` and ctrl+c stop the session.
pub fn key_to_event(key: &KeyEvent) -> Option<SessionEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char(' ') => Some(SessionEvent::Response),
        KeyCode::Esc | KeyCode::Char('q') => Some(SessionEvent::Stop),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(SessionEvent::Stop)
        }
        _ => None,
    }
}

/// Forwards terminal key presses to a session until the session hangs up.
pub fn spawn_key_reader(tx: Sender<SessionEvent>) {
    std::thread::spawn(move || loop {
        match event::read() {
            Ok(CtEvent::Key(key)) => {
                if let Some(ev) = key_to_event(&key) {
                    if tx.send(ev).is_err() {
                        break;
                    }
                }
            }
            Ok(_) => {}
            Err(_) => {
                let _ = tx.send(SessionEvent::Stop);
                break;
            }
        }
    });
}

/// Shared, manually advanced time for replays and tests
#[derive(Clone, Debug, Default)]
pub struct VirtualClock {
    now: Rc<Cell<Duration>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    fn set(&self, to: Duration) {
        if to > self.now.get() {
            self.now.set(to);
        }
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Virtual-time input: asks a responder, per response window, how long the
/// participant takes to respond (`None` for no response). Waiting advances the
/// shared clock instead of sleeping.
pub struct ScriptedInput<F> {
    clock: VirtualClock,
    responder: F,
    windows: usize,
    pending: Option<Duration>,
    stop_at: Option<Duration>,
}

impl<F> ScriptedInput<F>
where
    F: FnMut(usize) -> Option<Duration>,
{
    pub fn new(clock: VirtualClock, responder: F) -> Self {
        Self {
            clock,
            responder,
            windows: 0,
            pending: None,
            stop_at: None,
        }
    }

    /// Deliver a `Stop` once the clock reaches `at`.
    pub fn stop_at(mut self, at: Duration) -> Self {
        self.stop_at = Some(at);
        self
    }

    pub fn windows_opened(&self) -> usize {
        self.windows
    }
}

impl<F> ResponseInput for ScriptedInput<F>
where
    F: FnMut(usize) -> Option<Duration>,
{
    fn open_window(&mut self) {
        let now = self.clock.now();
        self.pending = (self.responder)(self.windows).map(|latency| now + latency);
        self.windows += 1;
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Result<SessionEvent, RecvTimeoutError> {
        let now = self.clock.now();
        let deadline = now + timeout;

        let stop = self
            .stop_at
            .filter(|at| *at < deadline || *at <= now)
            .map(|at| (at, SessionEvent::Stop));
        let response = self
            .pending
            .filter(|at| *at < deadline)
            .map(|at| (at, SessionEvent::Response));

        // a stop wins a tie
        let next = match (stop, response) {
            (Some(s), Some(r)) if r.0 < s.0 => Some(r),
            (Some(s), _) => Some(s),
            (None, r) => r,
        };

        match next {
            Some((at, ev)) => {
                self.clock.set(at);
                if ev == SessionEvent::Response {
                    self.pending = None;
                }
                Ok(ev)
            }
            None => {
                self.clock.set(deadline);
                Err(RecvTimeoutError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::mpsc;

    #[test]
    fn channel_input_times_out() {
        let (_tx, rx) = mpsc::channel();
        let mut input = ChannelInput::new(rx);
        assert_matches!(
            input.recv_timeout(Duration::from_millis(1)),
            Err(RecvTimeoutError::Timeout)
        );
    }

    #[test]
    fn channel_input_drops_stale_responses_but_keeps_stop() {
        let (tx, rx) = mpsc::channel();
        tx.send(SessionEvent::Response).unwrap();
        let mut input = ChannelInput::new(rx);
        input.open_window();
        assert_matches!(
            input.recv_timeout(Duration::from_millis(1)),
            Err(RecvTimeoutError::Timeout)
        );

        tx.send(SessionEvent::Stop).unwrap();
        tx.send(SessionEvent::Response).unwrap();
        input.open_window();
        assert_eq!(input.recv_timeout(Duration::from_millis(1)), Ok(SessionEvent::Stop));
    }

    #[test]
    fn channel_input_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        let mut input = ChannelInput::new(rx);
        input.open_window();
        tx.send(SessionEvent::Response).unwrap();
        assert_eq!(
            input.recv_timeout(Duration::from_millis(10)),
            Ok(SessionEvent::Response)
        );
    }

    #[test]
    fn key_mapping() {
        let space = KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE);
        let esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let plain_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE);

        assert_eq!(key_to_event(&space), Some(SessionEvent::Response));
        assert_eq!(key_to_event(&esc), Some(SessionEvent::Stop));
        assert_eq!(key_to_event(&ctrl_c), Some(SessionEvent::Stop));
        assert_eq!(key_to_event(&plain_c), None);
    }

    #[test]
    fn key_release_is_ignored() {
        let mut release = KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(key_to_event(&release), None);
    }

    #[test]
    fn scripted_input_advances_clock_on_timeout() {
        let clock = VirtualClock::new();
        let mut input = ScriptedInput::new(clock.clone(), |_| None);
        input.open_window();
        assert_matches!(
            input.recv_timeout(Duration::from_millis(250)),
            Err(RecvTimeoutError::Timeout)
        );
        assert_eq!(clock.now(), Duration::from_millis(250));
    }

    #[test]
    fn scripted_input_delivers_response_inside_timeout() {
        let clock = VirtualClock::new();
        clock.advance(Duration::from_secs(1));
        let mut input = ScriptedInput::new(clock.clone(), |_| Some(Duration::from_millis(300)));

        input.open_window();
        assert_eq!(
            input.recv_timeout(Duration::from_millis(500)),
            Ok(SessionEvent::Response)
        );
        assert_eq!(clock.now(), Duration::from_millis(1300));
        assert_eq!(input.windows_opened(), 1);
    }

    #[test]
    fn scripted_input_late_response_misses_window() {
        let clock = VirtualClock::new();
        let mut input = ScriptedInput::new(clock.clone(), |_| Some(Duration::from_millis(600)));

        input.open_window();
        assert_matches!(
            input.recv_timeout(Duration::from_millis(500)),
            Err(RecvTimeoutError::Timeout)
        );
        assert_eq!(
            input.recv_timeout(Duration::from_millis(500)),
            Ok(SessionEvent::Response)
        );
        assert_eq!(clock.now(), Duration::from_millis(600));
    }

    #[test]
    fn scripted_input_stop_beats_response() {
        let clock = VirtualClock::new();
        let mut input = ScriptedInput::new(clock.clone(), |_| Some(Duration::from_millis(200)))
            .stop_at(Duration::from_millis(100));

        input.open_window();
        assert_eq!(input.recv_timeout(Duration::from_secs(1)), Ok(SessionEvent::Stop));
        assert_eq!(clock.now(), Duration::from_millis(100));
        assert_eq!(input.recv_timeout(Duration::from_secs(1)), Ok(SessionEvent::Stop));
    }
}
