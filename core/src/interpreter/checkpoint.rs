//! Interruption checkpoint
//!
//! The executor calls [`Checkpoint::check`] before every statement, every
//! call and every loop iteration. The controller arms it with a deadline,
//! a cancellation token, or both. Once tripped it stays tripped, so every
//! later check on the way out reports the same interrupt.

use super::control::Interrupt;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub(crate) struct Checkpoint {
    deadline: Option<Instant>,
    token: Option<CancellationToken>,
    tripped: Option<Interrupt>,
}

impl Checkpoint {
    /// A checkpoint that never fires
    pub fn unarmed() -> Self {
        Self::default()
    }

    pub fn new(deadline: Option<Instant>, token: Option<CancellationToken>) -> Self {
        Self {
            deadline,
            token,
            tripped: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Some(Instant::now() + timeout), None)
    }

    pub fn check(&mut self) -> Result<(), Interrupt> {
        if let Some(interrupt) = self.tripped {
            return Err(interrupt);
        }
        if let Some(interrupt) = self.poll() {
            self.tripped = Some(interrupt);
            return Err(interrupt);
        }
        Ok(())
    }

    /// Look at the deadline and token without tripping
    pub fn poll(&self) -> Option<Interrupt> {
        if self.tripped.is_some() {
            return self.tripped;
        }
        if self.token.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Some(Interrupt::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(Interrupt::TimedOut);
        }
        None
    }

    /// Time left before the deadline, if one is set
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unarmed_never_fires() {
        let mut checkpoint = Checkpoint::unarmed();
        assert!(checkpoint.check().is_ok());
        assert_eq!(checkpoint.remaining(), None);
    }

    #[test]
    fn test_deadline_trips_and_stays_tripped() {
        let mut checkpoint = Checkpoint::new(Some(Instant::now()), None);
        assert_eq!(checkpoint.check(), Err(Interrupt::TimedOut));
        assert_eq!(checkpoint.check(), Err(Interrupt::TimedOut));
    }

    #[test]
    fn test_cancellation_wins_over_deadline() {
        let token = CancellationToken::new();
        let mut checkpoint =
            Checkpoint::new(Some(Instant::now() + Duration::from_secs(60)), Some(token.clone()));
        assert!(checkpoint.check().is_ok());
        token.cancel();
        assert_eq!(checkpoint.poll(), Some(Interrupt::Cancelled));
        assert_eq!(checkpoint.check(), Err(Interrupt::Cancelled));
    }
}
