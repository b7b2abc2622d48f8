//! Two-party comparison engine.
//!
//! Builds the keyed union of both players' visible inventories, then
//! applies category filters (OR'd), the differences-only filter and a
//! free-text filter (AND'd on top), plus one-column sorting.

use crate::types::{Item, SortDir, SortKey, SortState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareRow {
    pub id: i64,
    /// First non-empty name of either side; Ad's side wins a tie.
    pub name: String,
    pub ad_qty: i64,
    pub sic_qty: i64,
    pub delta: i64,
}

/// Union of both item lists, keyed by id. A missing side contributes
/// qty 0. Row order: Ad's first-seen ids, then Sic-only ids.
pub fn build_rows(ad: &[Item], sic: &[Item]) -> Vec<CompareRow> {
    let mut rows: Vec<CompareRow> = Vec::new();
    let mut index_by_id = std::collections::HashMap::new();

    for item in ad {
        index_by_id.insert(item.id, rows.len());
        rows.push(CompareRow {
            id: item.id,
            name: item.name.clone(),
            ad_qty: item.qty,
            sic_qty: 0,
            delta: item.qty,
        });
    }
    for item in sic {
        match index_by_id.get(&item.id) {
            Some(&i) => {
                rows[i].sic_qty = item.qty;
                rows[i].delta = rows[i].ad_qty - item.qty;
                if rows[i].name.is_empty() && !item.name.is_empty() {
                    rows[i].name = item.name.clone();
                }
            }
            None => {
                index_by_id.insert(item.id, rows.len());
                rows.push(CompareRow {
                    id: item.id,
                    name: item.name.clone(),
                    ad_qty: 0,
                    sic_qty: item.qty,
                    delta: -item.qty,
                });
            }
        }
    }
    rows
}

#[derive(Debug, Clone, Default)]
pub struct CompareFilter {
    pub unique_ad: bool,
    pub unique_sic: bool,
    pub in_both: bool,
    pub diff_only: bool,
    /// Matched against name substring (case-insensitive) or id substring.
    pub term: String,
}

impl CompareFilter {
    pub fn matches(&self, row: &CompareRow) -> bool {
        let term = self.term.trim().to_lowercase();
        if !term.is_empty()
            && !row.name.to_lowercase().contains(&term)
            && !row.id.to_string().contains(&term)
        {
            return false;
        }

        // Category flags OR together: a row passes if it matches any
        // selected category. No selected category means no restriction.
        let mut category = Vec::new();
        if self.unique_ad {
            category.push(row.ad_qty > 0 && row.sic_qty == 0);
        }
        if self.unique_sic {
            category.push(row.sic_qty > 0 && row.ad_qty == 0);
        }
        if self.in_both {
            category.push(row.ad_qty > 0 && row.sic_qty > 0);
        }
        if !category.is_empty() && !category.iter().any(|&m| m) {
            return false;
        }

        if self.diff_only && row.ad_qty == row.sic_qty {
            return false;
        }
        true
    }

    pub fn apply(&self, rows: &[CompareRow]) -> Vec<CompareRow> {
        rows.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

pub fn sort_rows(rows: &mut [CompareRow], sort: SortState) {
    rows.sort_by(|a, b| {
        let ord = match sort.key {
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::Id => a.id.cmp(&b.id),
            SortKey::AdQty => a.ad_qty.cmp(&b.ad_qty),
            SortKey::SicQty => a.sic_qty.cmp(&b.sic_qty),
            SortKey::Delta | SortKey::Qty => a.delta.cmp(&b.delta),
        };
        match sort.dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        }
    });
}

/// Category counts over the unfiltered union, for the compare summary
/// line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompareSummary {
    pub total_rows: usize,
    pub unique_ad: usize,
    pub unique_sic: usize,
    pub in_both: usize,
    pub differences: usize,
}

pub fn summarize(rows: &[CompareRow]) -> CompareSummary {
    CompareSummary {
        total_rows: rows.len(),
        unique_ad: rows.iter().filter(|r| r.ad_qty > 0 && r.sic_qty == 0).count(),
        unique_sic: rows.iter().filter(|r| r.sic_qty > 0 && r.ad_qty == 0).count(),
        in_both: rows.iter().filter(|r| r.ad_qty > 0 && r.sic_qty > 0).count(),
        differences: rows.iter().filter(|r| r.ad_qty != r.sic_qty).count(),
    }
}
