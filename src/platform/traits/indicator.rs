//! Status indicator trait
//!
//! The status LED and buzzer are board concerns. The tracker only says which
//! cue to play; the implementation decides pin timings and is expected to block
//! until the cue has finished.

/// Audible/visual cues emitted by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cue {
    /// Initialization started (3 blinks)
    Booting,
    /// Initialization finished (5 blinks + short beep)
    Ready,
    /// GPS fix acquired (2 blinks)
    GpsFix,
    /// Tracker armed (3 blinks + 200 ms beep)
    Armed,
    /// Tracker disarmed (1 blink + 100 ms beep)
    Disarmed,
    /// Alert raised (1 s beep)
    Alert,
    /// Telemetry upload succeeded (1 blink)
    UploadOk,
    /// Degraded start without GPS (3 double blinks)
    Degraded,
    /// Diagnostics run (5 blinks + 500 ms beep)
    SelfTest,
}

/// Indicator interface trait
pub trait Indicator {
    /// Play a cue synchronously
    fn cue(&mut self, cue: Cue);
}

/// Indicator that ignores every cue
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIndicator;

impl Indicator for NoopIndicator {
    fn cue(&mut self, _cue: Cue) {}
}
