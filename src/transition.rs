//! Image transition scheduling
//!
//! An image swap fades the current image out, commits the new URL after a
//! fixed delay, then fades back in. Only one timer is ever active: a new
//! request cancels the in-flight timer and restarts with the latest target,
//! so intermediate targets are dropped rather than queued.
//!
//! Timers fire back into the owner's event queue as `TimerToken`s. A token
//! that no longer matches the active handle is ignored, which covers a timer
//! that elapsed just before it was cancelled.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::AbortHandle;
use tracing::debug;

/// Identifies one armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(pub u64);

/// Handle to an armed timer. Dropping it cancels the timer.
#[derive(Debug)]
pub struct TimerHandle {
    token: TimerToken,
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    pub fn new(token: TimerToken, abort: Option<AbortHandle>) -> Self {
        Self { token, abort }
    }

    pub fn token(&self) -> TimerToken {
        self.token
    }

    pub fn cancel(&mut self) {
        if let Some(abort) = self.abort.take() {
            abort.abort();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Arms one-shot timers that report back with their token
pub trait SwapTimers {
    fn start(&self, token: TimerToken, delay: Duration) -> TimerHandle;
}

/// Tokio-backed timers delivering expiries through a callback
#[derive(Clone)]
pub struct TokioSwapTimers {
    on_fire: Arc<dyn Fn(TimerToken) + Send + Sync>,
}

impl TokioSwapTimers {
    pub fn new(on_fire: Arc<dyn Fn(TimerToken) + Send + Sync>) -> Self {
        Self { on_fire }
    }
}

impl SwapTimers for TokioSwapTimers {
    fn start(&self, token: TimerToken, delay: Duration) -> TimerHandle {
        let on_fire = self.on_fire.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(token);
        });
        TimerHandle::new(token, Some(task.abort_handle()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TransitionPhase {
    #[default]
    Idle,
    /// Old image fading out; the target commits when the timer fires
    FadingOut,
    /// New image committed and fading in
    FadingIn,
}

/// What a fired timer did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapEffect {
    Committed(String),
    Settled,
}

/// Displayed image and transition phase, as published to the page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageState {
    pub displayed_url: String,
    pub phase: TransitionPhase,
}

#[derive(Debug)]
pub struct TransitionScheduler {
    delay: Duration,
    displayed_url: String,
    phase: TransitionPhase,
    target: Option<String>,
    timer: Option<TimerHandle>,
    next_token: u64,
}

impl TransitionScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            displayed_url: String::new(),
            phase: TransitionPhase::Idle,
            target: None,
            timer: None,
            next_token: 0,
        }
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub fn displayed_url(&self) -> &str {
        &self.displayed_url
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn state(&self) -> ImageState {
        ImageState {
            displayed_url: self.displayed_url.clone(),
            phase: self.phase,
        }
    }

    /// Request a swap to `new_url`.
    ///
    /// Returns true if a fade-out was (re)started. Empty URLs and requests
    /// for what is already shown or already targeted are ignored.
    pub fn schedule_swap<T: SwapTimers + ?Sized>(&mut self, new_url: &str, timers: &T) -> bool {
        if new_url.is_empty() {
            return false;
        }
        let unchanged = match &self.target {
            Some(target) => target == new_url,
            None => self.displayed_url == new_url,
        };
        if unchanged {
            return false;
        }

        if let Some(previous) = self.target.replace(new_url.to_string()) {
            debug!(%previous, target = %new_url, "Superseding in-flight image swap");
        }
        self.phase = TransitionPhase::FadingOut;
        self.arm(timers);
        true
    }

    /// Handle an expired timer
    pub fn on_timer<T: SwapTimers + ?Sized>(
        &mut self,
        token: TimerToken,
        timers: &T,
    ) -> Option<SwapEffect> {
        if self.timer.as_ref().map(TimerHandle::token) != Some(token) {
            debug!(token = token.0, "Ignoring cancelled swap timer");
            return None;
        }
        self.timer = None;

        match self.phase {
            TransitionPhase::FadingOut => {
                let url = self.target.take()?;
                self.displayed_url = url.clone();
                self.phase = TransitionPhase::FadingIn;
                self.arm(timers);
                Some(SwapEffect::Committed(url))
            }
            TransitionPhase::FadingIn => {
                self.phase = TransitionPhase::Idle;
                Some(SwapEffect::Settled)
            }
            TransitionPhase::Idle => None,
        }
    }

    /// Cancel any swap in progress. The displayed image stays up.
    pub fn cancel(&mut self) {
        self.timer = None;
        self.target = None;
        self.phase = TransitionPhase::Idle;
    }

    /// Replace the active timer; the old handle is cancelled on drop
    fn arm<T: SwapTimers + ?Sized>(&mut self, timers: &T) {
        self.next_token += 1;
        let token = TimerToken(self.next_token);
        self.timer = Some(timers.start(token, self.delay));
    }
}
