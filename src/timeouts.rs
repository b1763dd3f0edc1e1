pub mod ms {
    pub const POLL_INTERVAL: u64 = 100;
    pub const NETWORK_IDLE: u64 = 500;
    pub const CONSENT_PROBE: u64 = 2000;
    pub const CONSENT_SETTLE: u64 = 300;
    pub const SCROLL_INTERVAL: u64 = 100;
}

pub mod secs {
    pub const READY_STATE: u64 = 5;
    pub const NAVIGATION: u64 = 30;
    pub const REQUEST: u64 = 60;
    pub const CLOSE: u64 = 5;
    pub const SESSION_WAIT: u64 = 30;
    pub const OCR: u64 = 60;
}

/// Pixels advanced per scroll tick while triggering lazy-loaded content.
pub const SCROLL_STEP_PX: u32 = 100;

/// Upper bound on scroll ticks for pages that keep growing as they are scrolled.
pub const MAX_SCROLL_TICKS: u32 = 600;
