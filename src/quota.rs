//! Daily message quota for the relayed free tier
//!
//! The relayed Groq path shares a server-side credential, so the client
//! caps itself at [`DAILY_LIMIT`] messages per device-local calendar day.
//! The cap is advisory: it is client-trusted and only blocks the network
//! call on the relay path. Direct-key paths bypass it entirely, since a
//! personal credential removes the shared-cost rationale.
//!
//! Day rollover is detected lazily on the next access rather than by a
//! timer; a stale stored date is reset transparently.

use crate::error::Result;
use crate::storage::{keys, Storage};
use serde::{Deserialize, Serialize};

/// Free-tier messages allowed per calendar day
pub const DAILY_LIMIT: u32 = 30;

/// Persisted quota state: a device-local date and a counter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaRecord {
    /// Device-local calendar date, `YYYY-MM-DD`
    pub date: String,
    /// Messages sent through the relay on that date
    pub count: u32,
}

/// Tracker over the persisted quota record
#[derive(Clone)]
pub struct DailyQuota {
    storage: Storage,
}

impl DailyQuota {
    /// Create a tracker over the shared storage handle
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    fn today() -> String {
        chrono::Local::now().date_naive().to_string()
    }

    /// Today's message count
    ///
    /// Recomputes against the current date: a stored record carrying a
    /// stale date is reset to zero and the reset is persisted before the
    /// count is returned.
    pub fn current_count(&self) -> Result<u32> {
        let today = Self::today();
        // An unreadable record is treated like a missing one
        let stored = self
            .storage
            .get_json::<QuotaRecord>(keys::DAILY_QUOTA)
            .unwrap_or_else(|e| {
                tracing::warn!("Resetting unreadable quota record: {}", e);
                None
            });
        match stored {
            Some(record) if record.date == today => Ok(record.count),
            _ => {
                let fresh = QuotaRecord {
                    date: today,
                    count: 0,
                };
                self.storage.put_json(keys::DAILY_QUOTA, &fresh)?;
                Ok(0)
            }
        }
    }

    /// Increment today's count and persist immediately
    ///
    /// # Returns
    ///
    /// The new count after the increment.
    pub fn increment(&self) -> Result<u32> {
        let count = self.current_count()? + 1;
        let record = QuotaRecord {
            date: Self::today(),
            count,
        };
        self.storage.put_json(keys::DAILY_QUOTA, &record)?;
        tracing::debug!("Daily quota now {}/{}", count, DAILY_LIMIT);
        Ok(count)
    }

    /// True when today's count has reached the daily ceiling
    ///
    /// # Examples
    ///
    /// ```
    /// use otakuverse::quota::DailyQuota;
    /// use otakuverse::storage::Storage;
    ///
    /// # fn main() -> otakuverse::error::Result<()> {
    /// let quota = DailyQuota::new(Storage::in_memory());
    /// assert!(!quota.is_exhausted()?);
    /// # Ok(())
    /// # }
    /// ```
    pub fn is_exhausted(&self) -> Result<bool> {
        Ok(self.current_count()? >= DAILY_LIMIT)
    }
}
