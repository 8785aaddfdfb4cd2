use std::time::{Duration, Instant};

use crate::error::{Result, SqlshapeError};

/// Absolute deadline for the current transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionTimeout {
    deadline: Instant,
}

impl TransactionTimeout {
    pub fn from_now(seconds: u32) -> Self {
        Self::at(Instant::now() + Duration::from_secs(u64::from(seconds)))
    }

    pub fn at(deadline: Instant) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Whole seconds left, at least one. An expired deadline is an error,
    /// never zero.
    pub fn remaining_seconds(&self) -> Result<u32> {
        let remaining = self
            .deadline
            .checked_duration_since(Instant::now())
            .filter(|d| !d.is_zero())
            .ok_or(SqlshapeError::TransactionTimeout)?;
        let secs = remaining.as_secs().max(1);
        Ok(u32::try_from(secs).unwrap_or(u32::MAX))
    }
}
