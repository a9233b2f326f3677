use serde::Deserialize;
use std::io::Write;
use std::time::Duration;
use thiserror::Error;

/// Length of the feedback pulse emitted on every attendance change.
pub const PULSE: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum HapticsError {
    #[error("haptic feedback is not supported on this host")]
    Unsupported,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Best-effort tactile feedback. Callers ignore failures.
pub trait Haptics {
    fn pulse(&self, duration: Duration) -> Result<(), HapticsError>;
}

pub struct NoHaptics;

impl Haptics for NoHaptics {
    fn pulse(&self, _duration: Duration) -> Result<(), HapticsError> {
        Err(HapticsError::Unsupported)
    }
}

/// Rings the terminal bell, the closest thing a console has to a vibration motor.
pub struct TerminalBell;

impl Haptics for TerminalBell {
    fn pulse(&self, _duration: Duration) -> Result<(), HapticsError> {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HapticsKind {
    #[default]
    None,
    Bell,
}

impl HapticsKind {
    pub fn build(self) -> Box<dyn Haptics + Send + Sync> {
        match self {
            HapticsKind::None => Box::new(NoHaptics),
            HapticsKind::Bell => Box::new(TerminalBell),
        }
    }
}
