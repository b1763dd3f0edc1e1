use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::models::StrategyKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Init,
    SessionOpen,
    Navigated,
    ConsentHandled,
    ConsentAbsent,
    Scrolled,
    Extracted(StrategyKind),
    StatsComputed,
    Done,
    Error,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Whether `next` may directly follow `self`.
    pub fn can_advance_to(self, next: RequestState) -> bool {
        use RequestState::*;

        if self.is_terminal() {
            return false;
        }

        match (self, next) {
            (_, Error) => true,
            (Init, SessionOpen) => true,
            (SessionOpen, Navigated) => true,
            (Navigated, ConsentHandled | ConsentAbsent) => true,
            (ConsentHandled | ConsentAbsent, Scrolled) => true,
            (Scrolled, Extracted(_)) => true,
            (Extracted(_), StatsComputed) => true,
            (StatsComputed, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("INIT"),
            Self::SessionOpen => f.write_str("SESSION_OPEN"),
            Self::Navigated => f.write_str("NAVIGATED"),
            Self::ConsentHandled => f.write_str("CONSENT_HANDLED"),
            Self::ConsentAbsent => f.write_str("CONSENT_ABSENT"),
            Self::Scrolled => f.write_str("SCROLLED"),
            Self::Extracted(strategy) => write!(f, "EXTRACTED({})", strategy),
            Self::StatsComputed => f.write_str("STATS_COMPUTED"),
            Self::Done => f.write_str("DONE"),
            Self::Error => f.write_str("ERROR"),
        }
    }
}

#[derive(Debug, Default)]
struct TraceLog {
    states: Vec<RequestState>,
    context_closed: bool,
}

/// Per-request record of lifecycle transitions, shared between the coordinator and its session.
#[derive(Debug)]
pub struct RequestTrace {
    request_id: Uuid,
    started: Instant,
    log: Mutex<TraceLog>,
}

impl RequestTrace {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            started: Instant::now(),
            log: Mutex::new(TraceLog {
                states: vec![RequestState::Init],
                ..Default::default()
            }),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn current(&self) -> RequestState {
        self.with_log(|log| log.states.last().copied().unwrap_or(RequestState::Init))
    }

    pub fn states(&self) -> Vec<RequestState> {
        self.with_log(|log| log.states.clone())
    }

    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .states()
            .iter()
            .map(ToString::to_string)
            .collect();
        if self.context_closed() {
            labels.push("CLOSED".to_string());
        }
        labels
    }

    /// Records `next`. Out-of-order transitions are logged and ignored.
    pub fn transition(&self, next: RequestState) -> bool {
        let request_id = self.request_id;
        self.with_log(|log| {
            let current = log.states.last().copied().unwrap_or(RequestState::Init);
            if !current.can_advance_to(next) {
                tracing::warn!(%request_id, from = %current, to = %next, "Ignoring invalid state transition");
                return false;
            }
            log.states.push(next);
            tracing::debug!(%request_id, from = %current, to = %next, "Request state changed");
            true
        })
    }

    pub fn mark_context_closed(&self) {
        self.with_log(|log| log.context_closed = true);
    }

    pub fn context_closed(&self) -> bool {
        self.with_log(|log| log.context_closed)
    }

    fn with_log<T>(&self, f: impl FnOnce(&mut TraceLog) -> T) -> T {
        let mut guard = match self.log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

impl Default for RequestTrace {
    fn default() -> Self {
        Self::new()
    }
}
