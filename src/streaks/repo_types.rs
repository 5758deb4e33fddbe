use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use crate::users::repo_types::UserId;

/// Consecutive civil days with at least one exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub user_id: UserId,
    pub current: i32,
    pub longest: i32,
    pub last_date: Option<Date>,
}

impl Streak {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            current: 0,
            longest: 0,
            last_date: None,
        }
    }

    /// Streak after an exercise logged on `date`.
    ///
    /// Same day is a no-op, the day after `last_date` extends the run, anything
    /// else (a gap, or a date before `last_date`) restarts it at 1.
    pub fn advance(&self, date: Date) -> Streak {
        let mut next = self.clone();
        match self.last_date {
            Some(last) if last == date => return next,
            Some(last) if last + Duration::days(1) == date => {
                next.current += 1;
            }
            _ => {
                next.current = 1;
            }
        }
        next.last_date = Some(date);
        next.longest = next.longest.max(next.current);
        next
    }

    /// Re-derives the streak from every day the user exercised on.
    /// `longest` never drops below what was already recorded.
    pub fn rebuild(user_id: UserId, mut days: Vec<Date>, previous_longest: i32) -> Streak {
        days.sort_unstable();
        days.dedup();

        let mut streak = Streak::empty(user_id);
        for day in days {
            streak = streak.advance(day);
        }
        streak.longest = streak.longest.max(previous_longest);
        streak
    }
}
