use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::daemon::store::entities::TallyStateEntity;

/// A calendar day paired with its keypress count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

/// The mutable core of the daemon: the running count for the current day plus every finalized
/// day. Owned by a single task and mutated only through the operations below.
///
/// Invariants:
///  - `history` never holds an entry for `today`; the current day lives in `today_count` until a
///    rollover finalizes it.
///  - finalizing is not repeatable: once a day moved into `history` its count is gone from
///    `today_count`, so replaying a rollover cannot double it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningState {
    today: NaiveDate,
    today_count: u64,
    history: BTreeMap<NaiveDate, u64>,
}

impl RunningState {
    /// Rebuilds state from a persisted document. A persisted date differing from `today` means
    /// the process was down across at least one midnight: the loaded count is finalized under
    /// the date it was actually accumulated on and today starts from zero. Days during which
    /// nothing ran stay absent from history, there is no zero-filling.
    pub fn restore(entity: TallyStateEntity, today: NaiveDate) -> Self {
        let TallyStateEntity {
            mut today_count,
            mut history,
            last_date,
            ..
        } = entity;

        if let Some(last) = last_date {
            if last != today {
                if today_count > 0 {
                    history.insert(last, today_count);
                }
                today_count = 0;
            }
        }

        // A finalized entry for the current date can only exist if the system clock moved
        // backwards across a rollover. Fold it back into the running count so history never
        // contains today.
        if let Some(resumed) = history.remove(&today) {
            today_count += resumed;
        }

        Self {
            today,
            today_count,
            history,
        }
    }

    pub fn record_key_down(&mut self) {
        self.today_count += 1;
    }

    /// Finalizes the day this state believes is ending and starts `new_today`. The believed date
    /// is used instead of a wall-clock recomputation, so a timer that fires slightly late still
    /// archives the count under the day that accumulated it.
    pub fn roll_over(&mut self, new_today: NaiveDate) {
        if self.today_count > 0 {
            self.history.insert(self.today, self.today_count);
        }
        // Usually None. Yields the old count back when the date did not actually advance, which
        // keeps the rollover idempotent and history clear of the current day.
        self.today_count = self.history.remove(&new_today).unwrap_or(0);
        self.today = new_today;
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn today_count(&self) -> u64 {
        self.today_count
    }

    pub fn history(&self) -> &BTreeMap<NaiveDate, u64> {
        &self.history
    }

    pub fn to_entity(&self) -> TallyStateEntity {
        TallyStateEntity {
            today_count: self.today_count,
            history: self.history.clone(),
            last_date: Some(self.today),
            autostart_hinted: false,
        }
    }
}
