//! Cohort indexing, sparse cohort matrices and retention/churn ratios
//!
//! A cohort is every customer who signed up in the same calendar year. Each
//! row is placed at `(cohort year, cohort index)` where index 1 is the signup
//! year itself. Matrices are sparse: a cell that was never observed is absent,
//! which is distinct from a cell holding zero.

use std::collections::{BTreeMap, HashSet};

use chrono::Datelike;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, warn};

use crate::normalize::TransactionRecord;

/// Position of a cell in a cohort matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CohortKey {
    /// Signup year of the cohort
    pub year: i32,
    /// Years since signup, starting at 1
    pub index: u32,
}

impl CohortKey {
    pub fn new(year: i32, index: u32) -> Self {
        Self { year, index }
    }
}

/// Sparse mapping from [`CohortKey`] to a value.
#[derive(Clone, Debug, PartialEq)]
pub struct CohortMatrix<T> {
    cells: BTreeMap<CohortKey, T>,
}

impl<T> Default for CohortMatrix<T> {
    fn default() -> Self {
        Self {
            cells: BTreeMap::new(),
        }
    }
}

impl<T> CohortMatrix<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, year: i32, index: u32) -> Option<&T> {
        self.cells.get(&CohortKey::new(year, index))
    }

    pub fn insert(&mut self, key: CohortKey, value: T) {
        self.cells.insert(key, value);
    }

    /// Cells in `(year, index)` order.
    pub fn iter(&self) -> impl Iterator<Item = (&CohortKey, &T)> {
        self.cells.iter()
    }

    /// Distinct cohort years, ascending.
    pub fn cohort_years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.cells.keys().map(|k| k.year).collect();
        years.dedup();
        years
    }

    /// Largest cohort index present in any row.
    pub fn max_index(&self) -> Option<u32> {
        self.cells.keys().map(|k| k.index).max()
    }

    /// The cells of one cohort as `(index, value)`, ascending by index.
    pub fn row(&self, year: i32) -> impl Iterator<Item = (u32, &T)> {
        self.cells
            .range(CohortKey::new(year, 0)..=CohortKey::new(year, u32::MAX))
            .map(|(k, v)| (k.index, v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<T> FromIterator<(CohortKey, T)> for CohortMatrix<T> {
    fn from_iter<I: IntoIterator<Item = (CohortKey, T)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

/// Serialized as `{ "<year>": { "<index>": value } }`.
impl<T: Serialize> Serialize for CohortMatrix<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let years = self.cohort_years();
        let mut map = serializer.serialize_map(Some(years.len()))?;
        for year in years {
            let row: BTreeMap<u32, &T> = self.row(year).collect();
            map.serialize_entry(&year, &row)?;
        }
        map.end()
    }
}

/// A cleaned record placed in its cohort.
#[derive(Clone, Copy, Debug)]
pub struct CohortRow<'a> {
    pub key: CohortKey,
    pub record: &'a TransactionRecord,
}

/// Output of [`index_cohorts`].
#[derive(Clone, Debug, Default)]
pub struct IndexedCohorts<'a> {
    pub rows: Vec<CohortRow<'a>>,
    /// Rows whose activity year precedes the signup year
    pub dropped_pre_signup: usize,
}

/// Assign each record its cohort year and cohort index.
///
/// `index = activity year - signup year + 1`; rows where this is not
/// positive are dropped and counted.
pub fn index_cohorts(records: &[TransactionRecord]) -> IndexedCohorts<'_> {
    let mut out = IndexedCohorts {
        rows: Vec::with_capacity(records.len()),
        dropped_pre_signup: 0,
    };

    for record in records {
        let year = record.signup_date.year();
        let index = record.activity_date().year() - year + 1;
        if index <= 0 {
            out.dropped_pre_signup += 1;
            continue;
        }
        out.rows.push(CohortRow {
            key: CohortKey::new(year, index as u32),
            record,
        });
    }

    if out.dropped_pre_signup > 0 {
        warn!(
            rows = out.dropped_pre_signup,
            "dropped rows with activity before signup year"
        );
    }
    debug!(rows = out.rows.len(), "indexed cohort rows");
    out
}

/// Distinct active customers per cell.
pub fn active_customer_matrix<'a, 'r: 'a, I>(rows: I) -> CohortMatrix<usize>
where
    I: IntoIterator<Item = &'a CohortRow<'r>>,
{
    let mut seen: BTreeMap<CohortKey, HashSet<&str>> = BTreeMap::new();
    for row in rows {
        seen.entry(row.key)
            .or_default()
            .insert(row.record.customer_id.as_str());
    }
    seen.into_iter().map(|(key, ids)| (key, ids.len())).collect()
}

/// Summed amount per cell. Empty amount cells count as zero.
pub fn spend_matrix<'a, 'r: 'a, I>(rows: I) -> CohortMatrix<f64>
where
    I: IntoIterator<Item = &'a CohortRow<'r>>,
{
    let mut sums: BTreeMap<CohortKey, f64> = BTreeMap::new();
    for row in rows {
        *sums.entry(row.key).or_insert(0.0) += row.record.amount.unwrap_or(0.0);
    }
    sums.into_iter().collect()
}

/// Cohort sizes with the retention and churn ratios derived from them.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct RetentionTable {
    /// Active customers per cell, for cohorts with a usable baseline
    pub sizes: CohortMatrix<usize>,
    /// `sizes / baseline`; exactly 1.0 at index 1, may exceed 1.0
    pub retention: CohortMatrix<f64>,
    /// `1 - retention`; negative when reactivations outnumber departures
    pub churn: CohortMatrix<f64>,
}

impl RetentionTable {
    /// Derive ratios relative to each cohort's index-1 size.
    ///
    /// A cohort with no index-1 cell, or a zero baseline, is left out of all
    /// three matrices instead of producing non-finite ratios.
    pub fn from_sizes(all_sizes: &CohortMatrix<usize>) -> Self {
        let mut table = RetentionTable::default();

        for year in all_sizes.cohort_years() {
            let baseline = match all_sizes.get(year, 1) {
                Some(&b) if b > 0 => b as f64,
                _ => {
                    debug!(cohort = year, "cohort has no index-1 baseline, skipping");
                    continue;
                }
            };

            for (index, &size) in all_sizes.row(year) {
                let key = CohortKey::new(year, index);
                let retention = size as f64 / baseline;
                table.sizes.insert(key, size);
                table.retention.insert(key, retention);
                table.churn.insert(key, 1.0 - retention);
            }
        }

        table
    }

    /// Build sizes and ratios straight from indexed rows.
    pub fn from_rows(rows: &[CohortRow<'_>]) -> Self {
        Self::from_sizes(&active_customer_matrix(rows))
    }
}
