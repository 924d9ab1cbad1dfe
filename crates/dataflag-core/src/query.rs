//! Read-side facade for downstream pipelines
//!
//! Answers "is this time flagged, and how badly" against active flags only.

use std::sync::Arc;

use crate::error::Result;
use crate::flag::Flag;
use crate::interval::TimeRange;
use crate::scope::Scope;
use crate::store::{FlagFilter, FlagStore};

pub struct QueryService<S> {
    store: Arc<S>,
}

impl<S: FlagStore> QueryService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Active flags covering the instant `t`.
    ///
    /// A non-finite `t` is an `InvalidInterval` error.
    pub fn is_flagged(&self, t: f64, scope: Option<&Scope>) -> Result<Vec<Flag>> {
        let instant = TimeRange::instant(t)?;
        self.store.query_overlapping(&instant, &Self::filter(scope, None))
    }

    /// Active flags overlapping `range`.
    pub fn flags_in_range(
        &self,
        range: &TimeRange,
        scope: Option<&Scope>,
        flag_type: Option<&str>,
    ) -> Result<Vec<Flag>> {
        self.store
            .query_overlapping(range, &Self::filter(scope, flag_type))
    }

    /// Highest severity among active flags overlapping `range`, if any.
    pub fn max_severity(&self, range: &TimeRange, scope: Option<&Scope>) -> Result<Option<u32>> {
        let mut max = None;
        for flag in self.flags_in_range(range, scope, None)? {
            let severity = self.store.flag_type(&flag.flag_type)?.severity;
            max = max.max(Some(severity));
        }
        Ok(max)
    }

    fn filter(scope: Option<&Scope>, flag_type: Option<&str>) -> FlagFilter {
        let mut filter = FlagFilter::active();
        if let Some(scope) = scope {
            filter = filter.with_scope(scope.clone());
        }
        if let Some(code) = flag_type {
            filter = filter.with_type(code);
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataFlagError;
    use crate::flag::{FlagStatus, NewFlag};
    use crate::persistence::SqliteStore;
    use crate::registry::FlagType;

    fn service() -> (Arc<SqliteStore>, QueryService<SqliteStore>) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.register_type(FlagType::new("rfi", 2)).unwrap();
        store.register_type(FlagType::new("bad_gains", 4)).unwrap();
        (Arc::clone(&store), QueryService::new(store))
    }

    fn active(store: &SqliteStore, new_flag: NewFlag) -> Flag {
        let flag = store.create(new_flag).unwrap();
        store
            .update_status(flag.id, FlagStatus::Active, None)
            .unwrap()
            .flag
    }

    #[test]
    fn instant_uses_half_open_end() {
        let (store, query) = service();
        let flag = active(&store, NewFlag::new("rfi", 10.0, Some(20.0), "alice"));

        assert_eq!(query.is_flagged(10.0, None).unwrap().len(), 1);
        assert_eq!(query.is_flagged(19.5, None).unwrap()[0].id, flag.id);
        assert!(query.is_flagged(20.0, None).unwrap().is_empty());
        assert!(query.is_flagged(9.9, None).unwrap().is_empty());
    }

    #[test]
    fn non_finite_instant_is_an_error() {
        let (store, query) = service();
        active(&store, NewFlag::new("rfi", 0.0, None, "alice"));
        for t in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                query.is_flagged(t, None),
                Err(DataFlagError::InvalidInterval { .. })
            ));
        }
    }

    #[test]
    fn proposed_flags_are_invisible() {
        let (store, query) = service();
        store
            .create(NewFlag::new("rfi", 0.0, Some(100.0), "alice"))
            .unwrap();
        assert!(query.is_flagged(50.0, None).unwrap().is_empty());
    }

    #[test]
    fn scope_and_type_filters() {
        let (store, query) = service();
        active(
            &store,
            NewFlag::new("rfi", 0.0, Some(100.0), "alice").with_scope(Scope::instrument("antenna-3")),
        );
        active(&store, NewFlag::new("bad_gains", 50.0, None, "alice"));

        let range = TimeRange::span(60.0, 70.0).unwrap();
        assert_eq!(query.flags_in_range(&range, None, None).unwrap().len(), 2);

        let antenna_4 = Scope::instrument("antenna-4");
        let found = query.flags_in_range(&range, Some(&antenna_4), None).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].flag_type, "bad_gains");

        let rfi_only = query.flags_in_range(&range, None, Some("rfi")).unwrap();
        assert_eq!(rfi_only.len(), 1);
    }

    #[test]
    fn max_severity_reports_worst_flag() {
        let (store, query) = service();
        active(&store, NewFlag::new("rfi", 0.0, Some(100.0), "alice"));
        active(&store, NewFlag::new("bad_gains", 50.0, Some(60.0), "alice"));

        let early = TimeRange::span(0.0, 10.0).unwrap();
        let overlap = TimeRange::span(55.0, 56.0).unwrap();
        let later = TimeRange::span(200.0, 300.0).unwrap();
        assert_eq!(query.max_severity(&early, None).unwrap(), Some(2));
        assert_eq!(query.max_severity(&overlap, None).unwrap(), Some(4));
        assert_eq!(query.max_severity(&later, None).unwrap(), None);
    }
}
