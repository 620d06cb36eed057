//! Candidate selection by pattern and date
//!
//! Snapshot ids embed a `YYYY.MM.DD` token. Ids sharing everything but that
//! token form a series. Per series the selector keeps the snapshot(s) with
//! the latest date at or before the target date; later snapshots are never
//! considered, and a series with nothing old enough yields nothing.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use regex::Regex;

use super::errors::{CatalogError, CatalogResult};
use super::merge::{CatalogEntry, SnapshotCatalog};
use crate::observability::{Event, Logger};

/// Date format of tokens and of the target date
pub const DATE_FORMAT: &str = "%Y.%m.%d";

const DATE_TOKEN: &str = r"\d{4}\.\d{2}\.\d{2}";

/// Parse an operator-supplied `YYYY.MM.DD` date
pub fn parse_target_date(value: &str) -> CatalogResult<NaiveDate> {
    let shape = Regex::new(&format!("^{}$", DATE_TOKEN)).map_err(|e| CatalogError::InvalidPattern {
        pattern: DATE_TOKEN.to_string(),
        reason: e.to_string(),
    })?;
    if !shape.is_match(value) {
        return Err(CatalogError::InvalidDate(value.to_string()));
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| CatalogError::InvalidDate(value.to_string()))
}

/// Unit name restored from a snapshot: the id with `prefix` removed when it
/// is a true prefix, else the id unchanged
pub fn source_unit_name(snapshot_id: &str, prefix: &str) -> String {
    snapshot_id
        .strip_prefix(prefix)
        .filter(|rest| !rest.is_empty())
        .unwrap_or(snapshot_id)
        .to_string()
}

/// Selects the closest-dated snapshot per series
#[derive(Debug, Clone)]
pub struct CandidateSelector {
    pattern: Regex,
    date_token: Regex,
    target: NaiveDate,
}

impl CandidateSelector {
    /// `pattern` is an unanchored regular expression
    pub fn new(pattern: &str, target: NaiveDate) -> CatalogResult<Self> {
        let compiled = Regex::new(pattern).map_err(|e| CatalogError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        let date_token = Regex::new(DATE_TOKEN).map_err(|e| CatalogError::InvalidPattern {
            pattern: DATE_TOKEN.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            pattern: compiled,
            date_token,
            target,
        })
    }

    /// Series key and embedded date of an id.
    ///
    /// `None` when the id has no date token at all, `Some(Err)` when the
    /// token is not a real calendar date.
    fn dated(&self, id: &str) -> Option<(String, Result<NaiveDate, String>)> {
        let found = self.date_token.find(id)?;
        let series = format!("{}{}", &id[..found.start()], &id[found.end()..]);
        let date = NaiveDate::parse_from_str(found.as_str(), DATE_FORMAT)
            .map_err(|_| found.as_str().to_string());
        Some((series, date))
    }

    /// Matching entries, ordered by series key then snapshot id
    pub fn select<'c>(&self, catalog: &'c SnapshotCatalog) -> Vec<&'c CatalogEntry> {
        let mut series: BTreeMap<String, (NaiveDate, Vec<&'c CatalogEntry>)> = BTreeMap::new();

        for entry in catalog.iter() {
            let id = entry.listing.id.as_str();
            if !self.pattern.is_match(id) {
                continue;
            }

            let (key, date) = match self.dated(id) {
                Some((key, Ok(date))) => (key, date),
                Some((_, Err(token))) => {
                    Logger::event(
                        Event::DateTokenMalformed,
                        &[("snapshot", id), ("token", token.as_str())],
                    );
                    continue;
                }
                None => {
                    Logger::event(
                        Event::DateTokenMalformed,
                        &[("snapshot", id), ("token", "")],
                    );
                    continue;
                }
            };

            if date > self.target {
                continue;
            }

            match series.get_mut(&key) {
                Some((best, members)) if date == *best => members.push(entry),
                Some((best, members)) if date > *best => {
                    *best = date;
                    members.clear();
                    members.push(entry);
                }
                Some(_) => {}
                None => {
                    series.insert(key, (date, vec![entry]));
                }
            }
        }

        series.into_values().flat_map(|(_, members)| members).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Endpoint, SnapshotListing};

    fn catalog(ids: &[&str]) -> SnapshotCatalog {
        let mut catalog = SnapshotCatalog::new("dc1");
        catalog.merge(
            &Endpoint::new("es01", 9200),
            ids.iter()
                .map(|id| SnapshotListing {
                    id: id.to_string(),
                    status: "SUCCESS".to_string(),
                    total_shards: 1,
                })
                .collect(),
        );
        catalog
    }

    fn date(s: &str) -> NaiveDate {
        parse_target_date(s).unwrap()
    }

    fn selected(selector: &CandidateSelector, catalog: &SnapshotCatalog) -> Vec<String> {
        selector
            .select(catalog)
            .into_iter()
            .map(|e| e.listing.id.clone())
            .collect()
    }

    #[test]
    fn test_picks_latest_at_or_before_target() {
        let catalog = catalog(&["snapshot_logs-app-2024.01.01", "snapshot_logs-app-2024.01.10"]);
        let selector = CandidateSelector::new("logs-app", date("2024.01.05")).unwrap();

        assert_eq!(selected(&selector, &catalog), vec!["snapshot_logs-app-2024.01.01"]);
    }

    #[test]
    fn test_exact_date_is_included() {
        let catalog = catalog(&["snapshot_logs-app-2024.01.01", "snapshot_logs-app-2024.01.10"]);
        let selector = CandidateSelector::new("logs-app", date("2024.01.10")).unwrap();

        assert_eq!(selected(&selector, &catalog), vec!["snapshot_logs-app-2024.01.10"]);
    }

    #[test]
    fn test_series_without_old_enough_snapshot_yields_nothing() {
        let catalog = catalog(&["snapshot_logs-app-2024.02.01", "snapshot_logs-db-2024.01.01"]);
        let selector = CandidateSelector::new("logs", date("2024.01.15")).unwrap();

        assert_eq!(selected(&selector, &catalog), vec!["snapshot_logs-db-2024.01.01"]);
    }

    #[test]
    fn test_each_series_resolved_independently() {
        let catalog = catalog(&[
            "snapshot_logs-app-2024.01.01",
            "snapshot_logs-app-2024.01.04",
            "snapshot_logs-db-2024.01.02",
            "snapshot_logs-db-2024.01.09",
        ]);
        let selector = CandidateSelector::new("logs-", date("2024.01.05")).unwrap();

        assert_eq!(
            selected(&selector, &catalog),
            vec!["snapshot_logs-app-2024.01.04", "snapshot_logs-db-2024.01.02"]
        );
    }

    #[test]
    fn test_snapshots_sharing_the_best_date_are_all_kept() {
        let catalog = catalog(&[
            "snapshot_logs-app-2024.01.03-000001",
            "snapshot_logs-app-2024.01.03-000002",
            "snapshot_logs-app-2024.01.01-000001",
        ]);
        let selector = CandidateSelector::new("logs-app", date("2024.01.05")).unwrap();

        assert_eq!(
            selected(&selector, &catalog),
            vec![
                "snapshot_logs-app-2024.01.03-000001",
                "snapshot_logs-app-2024.01.03-000002"
            ]
        );
    }

    #[test]
    fn test_malformed_and_missing_tokens_skipped() {
        let catalog = catalog(&[
            "snapshot_logs-app-2024.13.45",
            "snapshot_logs-app-latest",
            "snapshot_logs-app-2024.01.02",
        ]);
        let selector = CandidateSelector::new("logs-app", date("2024.12.31")).unwrap();

        assert_eq!(selected(&selector, &catalog), vec!["snapshot_logs-app-2024.01.02"]);
    }

    #[test]
    fn test_pattern_is_regex() {
        let catalog = catalog(&["snapshot_logs-app-2024.01.01", "snapshot_metrics-app-2024.01.01"]);
        let selector = CandidateSelector::new("^snapshot_metrics", date("2024.01.01")).unwrap();
        assert_eq!(selected(&selector, &catalog), vec!["snapshot_metrics-app-2024.01.01"]);

        assert!(matches!(
            CandidateSelector::new("logs-(", date("2024.01.01")),
            Err(CatalogError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_target_date_validation() {
        assert!(parse_target_date("2024.01.05").is_ok());
        assert!(parse_target_date("2024-01-05").is_err());
        assert!(parse_target_date("2024.1.5").is_err());
        assert!(parse_target_date("2024.02.30").is_err());
    }

    #[test]
    fn test_source_unit_name_strips_true_prefix_only() {
        assert_eq!(source_unit_name("snapshot_logs-app", "snapshot_"), "logs-app");
        // Character-set trimming would eat the leading 's' of "shop"
        assert_eq!(source_unit_name("snapshot_shop-2024.01.01", "snapshot_"), "shop-2024.01.01");
        assert_eq!(source_unit_name("logs-app", "snapshot_"), "logs-app");
        assert_eq!(source_unit_name("snapshot_", "snapshot_"), "snapshot_");
    }
}
