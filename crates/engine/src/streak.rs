//! Daily activity streaks.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::debug;
use wordcards_core::{ActivityStore, Result, UserActivity, UserId};

/// Fold one day of activity into a user's streak.
///
/// A second visit on the same day changes nothing, a visit on the day after
/// the last one extends the streak, and any longer gap starts over at one.
/// Dates earlier than the last recorded one are ignored.
pub fn advance_streak(prev: &UserActivity, today: NaiveDate) -> UserActivity {
    let current = match prev.last_active_date {
        Some(last) if today <= last => return prev.clone(),
        Some(last) if last.succ_opt() == Some(today) => prev.current_streak + 1,
        _ => 1,
    };
    UserActivity {
        user_id: prev.user_id,
        current_streak: current,
        longest_streak: prev.longest_streak.max(current),
        last_active_date: Some(today),
    }
}

pub struct StreakTracker {
    store: Arc<dyn ActivityStore>,
}

impl StreakTracker {
    pub fn new(store: Arc<dyn ActivityStore>) -> Self {
        Self { store }
    }

    /// Record activity at `now` (UTC calendar day).
    pub async fn record(&self, user: UserId, now: DateTime<Utc>) -> Result<UserActivity> {
        let prev = self.current(user).await?;
        let next = advance_streak(&prev, now.date_naive());
        if next != prev {
            self.store.put_activity(&next).await?;
            debug!(
                user_id = user,
                streak = next.current_streak,
                "Streak updated"
            );
        }
        Ok(next)
    }

    pub async fn current(&self, user: UserId) -> Result<UserActivity> {
        Ok(self
            .store
            .get_activity(user)
            .await?
            .unwrap_or_else(|| UserActivity::empty(user)))
    }
}
