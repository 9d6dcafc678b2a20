//! On-demand activation state
//!
//! ```text
//!  Initial ──activate──► WaitingReady ──ready──► Closing ◄──last reader left── Ready
//!     ▲                       │                   │  │                           ▲
//!     │                       │ ready timeout     │  └──────reader attached──────┘
//!     └───────────────────────┴───────────────────┘
//!                                   close timer fired
//! ```

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Sleep};

/// A timer that can be armed, stopped and awaited
///
/// A disarmed timer never fires, so it can sit in a `select!` branch
/// unconditionally.
#[derive(Default)]
pub(crate) struct Timer {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl Timer {
    /// Fire after `after`, replacing any previous deadline
    pub fn arm(&mut self, after: Duration) {
        self.sleep = Some(Box::pin(sleep(after)));
    }

    pub fn stop(&mut self) {
        self.sleep = None;
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Wait for the deadline; the timer is disarmed once it fires
    pub async fn wait(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => sleep.as_mut().await,
            None => pending::<()>().await,
        }
        self.sleep = None;
    }
}

/// Activation state of an on-demand resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnDemandState {
    /// Not activated
    Initial,
    /// Activated, waiting for the source to become ready
    WaitingReady,
    /// Ready and in use by at least one reader
    Ready,
    /// Ready without readers, close timer armed
    Closing,
}

/// One on-demand resource with its two timers
pub(crate) struct OnDemand {
    pub state: OnDemandState,
    pub ready_timer: Timer,
    pub close_timer: Timer,
}

impl Default for OnDemand {
    fn default() -> Self {
        Self {
            state: OnDemandState::Initial,
            ready_timer: Timer::default(),
            close_timer: Timer::default(),
        }
    }
}

impl OnDemand {
    pub fn is_initial(&self) -> bool {
        self.state == OnDemandState::Initial
    }

    /// Activation was requested
    pub fn begin(&mut self, start_timeout: Duration) {
        self.ready_timer.arm(start_timeout);
        self.state = OnDemandState::WaitingReady;
    }

    /// The resource became ready
    pub fn ready(&mut self, close_after: Duration) {
        self.ready_timer.stop();
        self.schedule_close(close_after);
    }

    /// Arm the close timer
    pub fn schedule_close(&mut self, close_after: Duration) {
        self.close_timer.arm(close_after);
        self.state = OnDemandState::Closing;
    }

    /// A reader attached; cancels a pending close
    pub fn reader_attached(&mut self) {
        if self.state == OnDemandState::Closing {
            self.close_timer.stop();
            self.state = OnDemandState::Ready;
        }
    }

    /// The last reader left; arms the close timer if the resource is in use
    pub fn readers_gone(&mut self, close_after: Duration) {
        if self.state == OnDemandState::Ready {
            self.schedule_close(close_after);
        }
    }

    /// Back to `Initial`
    pub fn reset(&mut self) {
        self.stop_timers();
        self.state = OnDemandState::Initial;
    }

    /// Disarm both timers without touching the state
    pub fn stop_timers(&mut self) {
        self.ready_timer.stop();
        self.close_timer.stop();
    }
}
