use std::collections::BTreeSet;

use chrono::{NaiveDateTime, TimeDelta};
use kpi_core::{FilterCriteria, TicketRecord};
use kpi_store::RecordStore;
use serde::{Deserialize, Serialize};

use crate::AnalysisError;

/// An ordered, borrowed selection of store records.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSet<'a> {
    records: Vec<&'a TicketRecord>,
}

impl<'a> RecordSet<'a> {
    pub fn all(store: &'a RecordStore) -> Self {
        Self {
            records: store.records().iter().collect(),
        }
    }

    pub fn from_records(records: &'a [TicketRecord]) -> Self {
        Self {
            records: records.iter().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a TicketRecord> + '_ {
        self.records.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn keys(&self) -> Vec<&'a str> {
        self.iter().map(|record| record.key.as_str()).collect()
    }

    pub fn to_records(&self) -> Vec<TicketRecord> {
        self.iter().cloned().collect()
    }

    fn retain(&self, keep: impl Fn(&TicketRecord) -> bool) -> Self {
        Self {
            records: self
                .records
                .iter()
                .copied()
                .filter(|record| keep(*record))
                .collect(),
        }
    }
}

/// The anchor and lower bound of a recency window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecencyBounds {
    pub days: u32,
    pub latest: NaiveDateTime,
    pub cutoff: NaiveDateTime,
}

impl RecencyBounds {
    pub fn contains(&self, created: NaiveDateTime) -> bool {
        created >= self.cutoff
    }
}

/// `cutoff = max(created) - days`. Fails on an empty store because there is
/// nothing to anchor on.
pub fn recency_bounds(store: &RecordStore, days: u32) -> Result<RecencyBounds, AnalysisError> {
    let latest = store.latest_created().ok_or(AnalysisError::EmptyStore)?;
    let cutoff = latest
        .checked_sub_signed(TimeDelta::days(i64::from(days)))
        .unwrap_or(NaiveDateTime::MIN);

    Ok(RecencyBounds {
        days,
        latest,
        cutoff,
    })
}

/// Records created on or after the cutoff, in store order.
pub fn filter_recent(store: &RecordStore, days: u32) -> Result<RecordSet<'_>, AnalysisError> {
    let bounds = recency_bounds(store, days)?;
    Ok(RecordSet::all(store).retain(|record| bounds.contains(record.created)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalField {
    RootCause,
    Assignee,
}

impl CategoricalField {
    pub fn value(self, record: &TicketRecord) -> Option<&str> {
        match self {
            Self::RootCause => record.root_cause(),
            Self::Assignee => record.assignee(),
        }
    }
}

/// Conjunction of per-field whitelists. An empty whitelist is no restriction;
/// an absent field value never satisfies a non-empty one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CategoricalFilter {
    whitelists: Vec<(CategoricalField, BTreeSet<String>)>,
}

impl CategoricalFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_criteria(criteria: &FilterCriteria) -> Self {
        Self::new()
            .with_whitelist(CategoricalField::RootCause, criteria.root_causes.clone())
            .with_whitelist(CategoricalField::Assignee, criteria.assignees.clone())
    }

    pub fn with_whitelist(mut self, field: CategoricalField, values: BTreeSet<String>) -> Self {
        if !values.is_empty() {
            self.whitelists.push((field, values));
        }
        self
    }

    pub fn is_identity(&self) -> bool {
        self.whitelists.is_empty()
    }

    pub fn matches(&self, record: &TicketRecord) -> bool {
        self.whitelists.iter().all(|(field, allowed)| {
            field
                .value(record)
                .is_some_and(|value| allowed.contains(value))
        })
    }

    pub fn apply<'a>(&self, records: &RecordSet<'a>) -> RecordSet<'a> {
        if self.is_identity() {
            return records.clone();
        }
        records.retain(|record| self.matches(record))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use kpi_core::RecencyWindow;

    use super::*;

    fn day(offset: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .expect("date")
            .and_hms_opt(12, 0, 0)
            .expect("time")
            + TimeDelta::days(offset)
    }

    fn store_with_days(days: &[i64]) -> RecordStore {
        RecordStore::from_records(
            days.iter()
                .map(|offset| TicketRecord::new(format!("PBSD-{offset}"), day(*offset)))
                .collect(),
        )
    }

    fn triage_store() -> RecordStore {
        RecordStore::from_records(vec![
            TicketRecord::new("T-1", day(0))
                .with_assignee("A")
                .with_root_cause("X"),
            TicketRecord::new("T-2", day(1))
                .with_assignee("B")
                .with_root_cause("X"),
            TicketRecord::new("T-3", day(2)).with_assignee("A"),
            TicketRecord::new("T-4", day(3)).with_root_cause("Y"),
            TicketRecord::new("T-5", day(4))
                .with_assignee("A")
                .with_root_cause("Y"),
        ])
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    #[test]
    fn basic_recency_window_keeps_only_latest_day() {
        let store = store_with_days(&[0, 5, 10, 20]);

        let recent = filter_recent(&store, 7).expect("filter");

        assert_eq!(recent.keys(), vec!["PBSD-20"]);
        let bounds = recency_bounds(&store, 7).expect("bounds");
        assert_eq!(bounds.latest, day(20));
        assert_eq!(bounds.cutoff, day(13));
    }

    #[test]
    fn cutoff_is_inclusive() {
        let store = store_with_days(&[0, 13, 20]);
        let recent = filter_recent(&store, 7).expect("filter");
        assert_eq!(recent.keys(), vec!["PBSD-13", "PBSD-20"]);
    }

    #[test]
    fn wider_windows_never_lose_records() {
        let store = store_with_days(&[0, 3, 8, 14, 16, 22, 29, 31, 45]);

        let mut previous: Option<Vec<&str>> = None;
        for window in RecencyWindow::ALL {
            let keys = filter_recent(&store, window.days()).expect("filter").keys();
            if let Some(narrower) = previous {
                assert!(narrower.iter().all(|key| keys.contains(key)));
                assert!(keys.len() >= narrower.len());
            }
            previous = Some(keys);
        }
    }

    #[test]
    fn zero_day_window_keeps_ties_on_latest_timestamp() {
        let store = store_with_days(&[1, 9, 9]);
        assert_eq!(filter_recent(&store, 0).expect("filter").len(), 2);
    }

    #[test]
    fn huge_windows_include_everything() {
        let store = store_with_days(&[0, 400]);
        assert_eq!(filter_recent(&store, u32::MAX).expect("filter").len(), 2);
    }

    #[test]
    fn empty_store_is_an_error() {
        let store = RecordStore::default();
        assert!(matches!(
            filter_recent(&store, 7),
            Err(AnalysisError::EmptyStore)
        ));
    }

    #[test]
    fn empty_whitelists_are_identity() {
        let store = triage_store();
        let all = RecordSet::all(&store);

        let filtered = CategoricalFilter::new()
            .with_whitelist(CategoricalField::Assignee, BTreeSet::new())
            .apply(&all);

        assert_eq!(filtered, all);
        assert_eq!(filtered.keys(), vec!["T-1", "T-2", "T-3", "T-4", "T-5"]);
    }

    #[test]
    fn whitelists_combine_conjunctively_and_skip_absent_values() {
        let store = triage_store();
        let all = RecordSet::all(&store);

        let by_assignee = CategoricalFilter::new()
            .with_whitelist(CategoricalField::Assignee, set(&["A"]))
            .apply(&all);
        assert_eq!(by_assignee.keys(), vec!["T-1", "T-3", "T-5"]);

        let both = CategoricalFilter::new()
            .with_whitelist(CategoricalField::Assignee, set(&["A"]))
            .with_whitelist(CategoricalField::RootCause, set(&["Y"]))
            .apply(&all);
        assert_eq!(both.keys(), vec!["T-5"]);

        let reversed = CategoricalFilter::new()
            .with_whitelist(CategoricalField::RootCause, set(&["Y"]))
            .with_whitelist(CategoricalField::Assignee, set(&["A"]))
            .apply(&all);
        assert_eq!(reversed, both);
    }

    #[test]
    fn applying_a_filter_twice_changes_nothing() {
        let store = triage_store();
        let filter = CategoricalFilter::new()
            .with_whitelist(CategoricalField::RootCause, set(&["X", "Y"]));

        let once = filter.apply(&RecordSet::all(&store));
        let twice = filter.apply(&once);

        assert_eq!(once, twice);
        assert_eq!(once.keys(), vec!["T-1", "T-2", "T-4", "T-5"]);
    }

    #[test]
    fn unmatched_whitelist_yields_empty_set() {
        let store = RecordStore::from_records(vec![
            TicketRecord::new("E-1", day(0)).with_assignee("A"),
            TicketRecord::new("E-2", day(1)).with_assignee("A"),
            TicketRecord::new("E-3", day(2)).with_assignee("A"),
        ]);
        let criteria = FilterCriteria::new(RecencyWindow::Month).with_assignees(["B"]);

        let filtered = CategoricalFilter::from_criteria(&criteria).apply(&RecordSet::all(&store));
        assert!(filtered.is_empty());
    }
}
