use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;

/// The struct used for storing counter state on the disk. Dates serialize as `YYYY-MM-DD` both
/// for the marker and for history keys. Every field defaults to its zero value so a partially
/// written or outdated document still loads.
#[derive(PartialEq, Eq, Debug, Default, Serialize, Deserialize, Clone)]
pub struct TallyStateEntity {
    /// Keypresses counted since `last_date` began.
    #[serde(default)]
    pub today_count: u64,
    /// Finalized days. Never holds an entry for `last_date` itself.
    #[serde(default)]
    pub history: BTreeMap<NaiveDate, u64>,
    /// The local calendar date `today_count` was accumulated under.
    #[serde(default)]
    pub last_date: Option<NaiveDate>,
    /// One-time marker for the autostart hint shown by the cli. Not part of the counter state.
    #[serde(default)]
    pub autostart_hinted: bool,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::TallyStateEntity;

    #[test]
    fn test_defaults_from_empty_document() {
        let entity: TallyStateEntity = serde_json::from_str("{}").unwrap();
        assert_eq!(entity, TallyStateEntity::default());
        assert_eq!(entity.today_count, 0);
        assert!(entity.history.is_empty());
        assert_eq!(entity.last_date, None);
    }

    #[test]
    fn test_history_keys_use_date_strings() {
        let mut entity = TallyStateEntity {
            today_count: 3,
            last_date: NaiveDate::from_ymd_opt(2025, 1, 3),
            ..Default::default()
        };
        entity
            .history
            .insert(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(), 300);

        let json = serde_json::to_string(&entity).unwrap();
        assert!(json.contains("\"2025-01-02\":300"));
        assert!(json.contains("\"2025-01-03\""));

        let back: TallyStateEntity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entity);
    }
}
