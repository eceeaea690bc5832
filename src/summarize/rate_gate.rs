// src/summarize/rate_gate.rs
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Process-wide minimum spacing between AI calls.
/// - First call always passes.
/// - A call inside the interval waits until it elapses.
/// - A backend hint (`defer`) can push the next slot further out.
#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    state: Mutex<GateState>,
}

#[derive(Debug, Clone, Copy, Default)]
struct GateState {
    last_call: Option<Instant>,
    not_before: Option<Instant>,
}

impl GateState {
    /// Earliest instant the next call may start. Does NOT mutate state.
    fn ready_at(&self, min_interval: Duration) -> Option<Instant> {
        let by_interval = self.last_call.map(|t| t + min_interval);
        match (by_interval, self.not_before) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            state: Mutex::new(GateState::default()),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for a slot and claim it. Returns how long the caller was held.
    /// The lock is held while sleeping, so concurrent callers queue up.
    pub async fn acquire(&self) -> Duration {
        let mut st = self.state.lock().await;
        let start = Instant::now();
        if let Some(at) = st.ready_at(self.min_interval) {
            if at > start {
                tracing::debug!(wait_ms = (at - start).as_millis() as u64, "rate gate holding AI call");
                tokio::time::sleep_until(at).await;
            }
        }
        let now = Instant::now();
        st.last_call = Some(now);
        st.not_before = None;
        now - start
    }

    /// Claim a slot only if one is free right now.
    pub async fn try_acquire(&self) -> bool {
        let mut st = self.state.lock().await;
        let now = Instant::now();
        match st.ready_at(self.min_interval) {
            Some(at) if at > now => false,
            _ => {
                st.last_call = Some(now);
                st.not_before = None;
                true
            }
        }
    }

    /// Keep the gate closed for at least `by` from now.
    pub async fn defer(&self, by: Duration) {
        let mut st = self.state.lock().await;
        let until = Instant::now() + by;
        st.not_before = Some(st.not_before.map_or(until, |t| t.max(until)));
    }
}
