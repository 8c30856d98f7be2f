//! Derived statistics over [RunningState]. Everything here is a pure read recomputed on demand,
//! nothing is cached between calls.

use chrono::Duration;

use super::state::{DailyCount, RunningState};

impl RunningState {
    /// Mean count across finalized days, with truncating integer division. Falls back to the
    /// running count while no day has been finalized yet.
    pub fn average_count(&self) -> u64 {
        if self.history().is_empty() {
            return self.today_count();
        }
        let sum: u64 = self.history().values().sum();
        sum / self.history().len() as u64
    }

    /// The strongest finalized day. The earliest date wins a tie, which is deterministic because
    /// history iterates in date order. None until some day has been finalized.
    pub fn peak_day(&self) -> Option<DailyCount> {
        let mut best: Option<DailyCount> = None;
        for (&date, &count) in self.history() {
            match best {
                Some(current) if count <= current.count => {}
                _ => best = Some(DailyCount { date, count }),
            }
        }
        best
    }

    pub fn total_all_time(&self) -> u64 {
        self.history().values().sum::<u64>() + self.today_count()
    }

    /// Count finalized for the calendar day right before today, zero when that day is absent.
    pub fn yesterday_count(&self) -> u64 {
        let Some(yesterday) = self.today().pred_opt() else {
            return 0;
        };
        self.history().get(&yesterday).copied().unwrap_or(0)
    }

    /// Relative change of today's count against yesterday's, in whole percent. Integer division
    /// truncates toward zero, so +49.9% reports as 49 and -49.9% as -49. None when yesterday has
    /// no count to compare against.
    pub fn trend_percentage(&self) -> Option<i64> {
        let yesterday = self.yesterday_count();
        if yesterday == 0 {
            return None;
        }
        let diff = self.today_count() as i64 - yesterday as i64;
        Some(diff * 100 / yesterday as i64)
    }

    /// The last calendar week of counts, oldest first. Always exactly 7 entries: days without a
    /// record report zero and the final entry is today with the running count.
    pub fn last_7_days(&self) -> Vec<DailyCount> {
        (0..7)
            .rev()
            .map(|offset| {
                let date = self.today() - Duration::days(offset);
                let count = if date == self.today() {
                    self.today_count()
                } else {
                    self.history().get(&date).copied().unwrap_or(0)
                };
                DailyCount { date, count }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::daemon::{engine::state::RunningState, store::entities::TallyStateEntity};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// history = {2025-01-01: 100, 2025-01-02: 300}, today = 2025-01-03 with 200 keypresses.
    fn reference_state() -> RunningState {
        let mut entity = TallyStateEntity {
            today_count: 200,
            last_date: Some(date(2025, 1, 3)),
            ..Default::default()
        };
        entity.history.insert(date(2025, 1, 1), 100);
        entity.history.insert(date(2025, 1, 2), 300);
        RunningState::restore(entity, date(2025, 1, 3))
    }

    #[test]
    fn test_average_over_finalized_days() {
        assert_eq!(reference_state().average_count(), 200);
    }

    #[test]
    fn test_average_truncates() {
        let mut entity = TallyStateEntity {
            last_date: Some(date(2025, 1, 3)),
            ..Default::default()
        };
        entity.history.insert(date(2025, 1, 1), 100);
        entity.history.insert(date(2025, 1, 2), 101);
        let state = RunningState::restore(entity, date(2025, 1, 3));

        assert_eq!(state.average_count(), 100);
    }

    #[test]
    fn test_average_falls_back_to_today() {
        let entity = TallyStateEntity {
            today_count: 17,
            last_date: Some(date(2025, 1, 3)),
            ..Default::default()
        };
        let state = RunningState::restore(entity, date(2025, 1, 3));

        assert_eq!(state.average_count(), 17);
    }

    #[test]
    fn test_peak_day() {
        let peak = reference_state().peak_day().unwrap();
        assert_eq!(peak.date, date(2025, 1, 2));
        assert_eq!(peak.count, 300);
    }

    #[test]
    fn test_peak_day_tie_takes_earliest() {
        let mut entity = TallyStateEntity {
            last_date: Some(date(2025, 1, 4)),
            ..Default::default()
        };
        entity.history.insert(date(2025, 1, 1), 300);
        entity.history.insert(date(2025, 1, 2), 300);
        entity.history.insert(date(2025, 1, 3), 100);
        let state = RunningState::restore(entity, date(2025, 1, 4));

        assert_eq!(state.peak_day().unwrap().date, date(2025, 1, 1));
    }

    #[test]
    fn test_peak_day_empty_history() {
        let state = RunningState::restore(TallyStateEntity::default(), date(2025, 1, 3));
        assert_eq!(state.peak_day(), None);
    }

    #[test]
    fn test_total_all_time_includes_today() {
        assert_eq!(reference_state().total_all_time(), 600);
    }

    #[test]
    fn test_yesterday_count() {
        assert_eq!(reference_state().yesterday_count(), 300);
    }

    #[test]
    fn test_yesterday_absent_reports_zero() {
        let state = RunningState::restore(TallyStateEntity::default(), date(2025, 1, 3));
        assert_eq!(state.yesterday_count(), 0);
    }

    #[test]
    fn test_trend_sign() {
        let mut entity = TallyStateEntity {
            today_count: 150,
            last_date: Some(date(2025, 1, 3)),
            ..Default::default()
        };
        entity.history.insert(date(2025, 1, 2), 100);

        let up = RunningState::restore(entity.clone(), date(2025, 1, 3));
        assert_eq!(up.trend_percentage(), Some(50));

        entity.today_count = 50;
        let down = RunningState::restore(entity.clone(), date(2025, 1, 3));
        assert_eq!(down.trend_percentage(), Some(-50));

        entity.history.clear();
        let unknown = RunningState::restore(entity, date(2025, 1, 3));
        assert_eq!(unknown.trend_percentage(), None);
    }

    #[test]
    fn test_trend_truncates_toward_zero() {
        let mut entity = TallyStateEntity {
            today_count: 299,
            last_date: Some(date(2025, 1, 3)),
            ..Default::default()
        };
        entity.history.insert(date(2025, 1, 2), 200);

        let up = RunningState::restore(entity.clone(), date(2025, 1, 3));
        assert_eq!(up.trend_percentage(), Some(49));

        entity.today_count = 101;
        let down = RunningState::restore(entity, date(2025, 1, 3));
        assert_eq!(down.trend_percentage(), Some(-49));
    }

    #[test]
    fn test_last_7_days_shape() {
        let days = reference_state().last_7_days();

        assert_eq!(days.len(), 7);
        assert_eq!(days[0].date, date(2024, 12, 28));
        assert_eq!(days[6].date, date(2025, 1, 3));
        assert_eq!(days[6].count, 200);
        // sparse days report zero
        assert_eq!(days[0].count, 0);
        assert_eq!(days[4].count, 100);
        assert_eq!(days[5].count, 300);
    }

    #[test]
    fn test_last_7_days_on_empty_state() {
        let state = RunningState::restore(TallyStateEntity::default(), date(2025, 1, 3));
        let days = state.last_7_days();

        assert_eq!(days.len(), 7);
        assert!(days.iter().all(|day| day.count == 0));
        assert_eq!(days.last().unwrap().date, date(2025, 1, 3));
    }
}
