//! Request-scoped memoization of health-record lookups.
//!
//! A `RequestCache` lives for one incoming request. Every entry is keyed by the
//! user it was fetched for, so values never cross between users.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::chatbot::database::{DataError, HealthData};
use crate::chatbot::model::{Appointment, DiseaseKnowledge, HealthCondition, Medication, UserId};

/// What a cache entry holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataKind {
    Conditions,
    /// Active as of the given day.
    Medications(NaiveDate),
    /// Upcoming from the given day, capped at the given count.
    Appointments(NaiveDate, usize),
    Guidelines(String),
}

#[derive(Debug, Clone)]
enum Cached {
    Conditions(Vec<HealthCondition>),
    Medications(Vec<Medication>),
    Appointments(Vec<Appointment>),
    Guidelines(Option<DiseaseKnowledge>),
}

/// Memo cache keyed by `(UserId, DataKind)`.
///
/// Keys carry every argument of the lookup. The cache still must not be
/// carried across requests: the underlying records can change.
#[derive(Debug)]
pub struct RequestCache {
    entries: HashMap<(UserId, DataKind), Cached>,
    hits: usize,
    enabled: bool,
}

impl RequestCache {
    pub fn new() -> Self {
        Self { entries: HashMap::new(), hits: 0, enabled: true }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self { entries: HashMap::new(), hits: 0, enabled: false }
    }

    /// Number of lookups served without touching the data layer.
    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn lookup(&mut self, user_id: UserId, kind: &DataKind) -> Option<Cached> {
        let found = self.entries.get(&(user_id, kind.clone())).cloned();
        if found.is_some() {
            self.hits += 1;
            debug!("Cache hit for user {} {:?}", user_id, kind);
        }
        found
    }

    fn store(&mut self, user_id: UserId, kind: DataKind, value: Cached) {
        if self.enabled {
            self.entries.insert((user_id, kind), value);
        }
    }

    pub fn chronic_conditions(
        &mut self,
        data: &dyn HealthData,
        user_id: UserId,
    ) -> Result<Vec<HealthCondition>, DataError> {
        if let Some(Cached::Conditions(v)) = self.lookup(user_id, &DataKind::Conditions) {
            return Ok(v);
        }
        let v = data.chronic_conditions(user_id)?;
        self.store(user_id, DataKind::Conditions, Cached::Conditions(v.clone()));
        Ok(v)
    }

    pub fn active_medications(
        &mut self,
        data: &dyn HealthData,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<Vec<Medication>, DataError> {
        let kind = DataKind::Medications(today);
        if let Some(Cached::Medications(v)) = self.lookup(user_id, &kind) {
            return Ok(v);
        }
        let v = data.active_medications(user_id, today)?;
        self.store(user_id, kind, Cached::Medications(v.clone()));
        Ok(v)
    }

    pub fn upcoming_appointments(
        &mut self,
        data: &dyn HealthData,
        user_id: UserId,
        today: NaiveDate,
        limit: usize,
    ) -> Result<Vec<Appointment>, DataError> {
        let kind = DataKind::Appointments(today, limit);
        if let Some(Cached::Appointments(v)) = self.lookup(user_id, &kind) {
            return Ok(v);
        }
        let v = data.upcoming_appointments(user_id, today, limit)?;
        self.store(user_id, kind, Cached::Appointments(v.clone()));
        Ok(v)
    }

    pub fn guidelines(
        &mut self,
        data: &dyn HealthData,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<DiseaseKnowledge>, DataError> {
        let kind = DataKind::Guidelines(key.to_string());
        if let Some(Cached::Guidelines(v)) = self.lookup(user_id, &kind) {
            return Ok(v);
        }
        let v = data.find_guidelines(key)?;
        self.store(user_id, kind, Cached::Guidelines(v.clone()));
        Ok(v)
    }
}

impl Default for RequestCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Counts calls; user 1 is a diabetic, everyone else has asthma.
    struct CountingData {
        calls: Cell<usize>,
    }

    impl HealthData for CountingData {
        fn chronic_conditions(&self, user_id: UserId) -> Result<Vec<HealthCondition>, DataError> {
            self.calls.set(self.calls.get() + 1);
            let name = if user_id == UserId(1) { "Diabetes" } else { "Asthma" };
            Ok(vec![HealthCondition::chronic(name)])
        }

        fn active_medications(&self, _: UserId, _: NaiveDate) -> Result<Vec<Medication>, DataError> {
            self.calls.set(self.calls.get() + 1);
            Ok(vec![])
        }

        fn upcoming_appointments(&self, _: UserId, _: NaiveDate, _: usize) -> Result<Vec<Appointment>, DataError> {
            self.calls.set(self.calls.get() + 1);
            Ok(vec![])
        }

        fn find_guidelines(&self, _: &str) -> Result<Option<DiseaseKnowledge>, DataError> {
            self.calls.set(self.calls.get() + 1);
            Ok(None)
        }
    }

    #[test]
    fn test_repeat_lookup_hits_cache() {
        let data = CountingData { calls: Cell::new(0) };
        let mut cache = RequestCache::new();

        cache.chronic_conditions(&data, UserId(1)).unwrap();
        cache.chronic_conditions(&data, UserId(1)).unwrap();
        assert_eq!(data.calls.get(), 1);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_entries_are_per_user() {
        let data = CountingData { calls: Cell::new(0) };
        let mut cache = RequestCache::new();

        let first = cache.chronic_conditions(&data, UserId(1)).unwrap();
        let second = cache.chronic_conditions(&data, UserId(2)).unwrap();
        assert_eq!(first[0].name, "Diabetes");
        assert_eq!(second[0].name, "Asthma");
        assert_eq!(data.calls.get(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_guidelines_keyed_by_lookup_key() {
        let data = CountingData { calls: Cell::new(0) };
        let mut cache = RequestCache::new();

        cache.guidelines(&data, UserId(1), "asthma").unwrap();
        cache.guidelines(&data, UserId(1), "diabetes").unwrap();
        cache.guidelines(&data, UserId(1), "asthma").unwrap();
        assert_eq!(data.calls.get(), 2);
    }

    #[test]
    fn test_keys_include_lookup_arguments() {
        let data = CountingData { calls: Cell::new(0) };
        let mut cache = RequestCache::new();
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let tomorrow = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        cache.active_medications(&data, UserId(1), today).unwrap();
        cache.active_medications(&data, UserId(1), tomorrow).unwrap();
        cache.upcoming_appointments(&data, UserId(1), today, 3).unwrap();
        cache.upcoming_appointments(&data, UserId(1), today, 5).unwrap();
        assert_eq!(data.calls.get(), 4);
        assert_eq!(cache.hits(), 0);

        cache.upcoming_appointments(&data, UserId(1), today, 3).unwrap();
        assert_eq!(data.calls.get(), 4);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_clear_forces_refetch() {
        let data = CountingData { calls: Cell::new(0) };
        let mut cache = RequestCache::new();
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

        cache.active_medications(&data, UserId(1), today).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        cache.active_medications(&data, UserId(1), today).unwrap();
        assert_eq!(data.calls.get(), 2);
    }

    #[test]
    fn test_disabled_cache_always_fetches() {
        let data = CountingData { calls: Cell::new(0) };
        let mut cache = RequestCache::disabled();
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

        cache.upcoming_appointments(&data, UserId(1), today, 3).unwrap();
        cache.upcoming_appointments(&data, UserId(1), today, 3).unwrap();
        assert_eq!(data.calls.get(), 2);
        assert_eq!(cache.hits(), 0);
    }
}
