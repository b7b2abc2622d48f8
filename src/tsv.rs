//! TSV import parser and row merger.
//!
//! Turns a raw tab-separated bank export into a deduplicated item
//! list. Bad rows produce warnings and are skipped; parsing never
//! aborts on a single row.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::types::Item;

// Header detection tolerates optional internal whitespace ("ItemID",
// "Item  Quantity", any case).
static HEADER_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^item\s*id$").unwrap());
static HEADER_QTY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^item\s*quantity$").unwrap());

#[derive(Debug, Clone, Default)]
pub struct ParsedTsv {
    /// Deduplicated items in first-seen id order.
    pub items: Vec<Item>,
    /// Row-level warnings, one per skipped row, in input order.
    pub warnings: Vec<String>,
}

/// Parse raw multi-line TSV text into a merged inventory.
///
/// Each non-blank line needs at least 3 tab-separated columns: the
/// first is the id, the last the quantity, and everything between is
/// rejoined with tabs as the name (tab-containing names survive).
/// Rows sharing an id are merged: quantities sum, and the first row
/// that supplies a non-empty name wins the name. Pure and idempotent.
pub fn parse_tsv(text: &str) -> ParsedTsv {
    let mut warnings = Vec::new();
    let mut items: Vec<Item> = Vec::new();
    let mut index_by_id: HashMap<i64, usize> = HashMap::new();

    let lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    for (idx, line) in lines.enumerate() {
        let row = idx + 1;
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 3 {
            warnings.push(format!("Row {row}: expected 3 columns."));
            continue;
        }

        let raw_id = cols[0].trim();
        let raw_qty = cols[cols.len() - 1].trim();
        let name = cols[1..cols.len() - 1].join("\t").trim().to_string();

        if HEADER_ID_RE.is_match(raw_id) && HEADER_QTY_RE.is_match(raw_qty) {
            continue;
        }

        let (Ok(id), Ok(qty)) = (raw_id.parse::<i64>(), raw_qty.parse::<i64>()) else {
            warnings.push(format!("Row {row}: invalid id or quantity."));
            continue;
        };

        match index_by_id.get(&id) {
            Some(&i) => {
                items[i].qty += qty;
                if items[i].name.is_empty() && !name.is_empty() {
                    items[i].name = name;
                }
            }
            None => {
                index_by_id.insert(id, items.len());
                items.push(Item { id, name, qty });
            }
        }
    }

    ParsedTsv { items, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_row_warns_with_line_number() {
        let parsed = parse_tsv("1\tCoal\t5\n2\t7\n");
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.warnings, vec!["Row 2: expected 3 columns."]);
    }

    #[test]
    fn rows_merge_by_id_summing_quantity() {
        let parsed = parse_tsv("1\tRune scimitar\t5\n1\tRune scimitar\t3");
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(
            parsed.items[0],
            Item { id: 1, name: "Rune scimitar".into(), qty: 8 }
        );
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn empty_name_never_overwrites_captured_name() {
        // Empty name first, then named row.
        let parsed = parse_tsv("2\t\t1\n2\tCoal\t1");
        assert_eq!(parsed.items, vec![Item { id: 2, name: "Coal".into(), qty: 2 }]);

        // Named row first, then empty name.
        let parsed = parse_tsv("2\tCoal\t1\n2\t\t1");
        assert_eq!(parsed.items, vec![Item { id: 2, name: "Coal".into(), qty: 2 }]);
    }

    #[test]
    fn header_row_is_silently_skipped() {
        let parsed = parse_tsv("Item ID\tItem Name\tItem Quantity\n1\tCoal\t5");
        assert!(parsed.warnings.is_empty());
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].id, 1);
    }

    #[test]
    fn header_match_tolerates_case_and_spacing() {
        let parsed = parse_tsv("ITEMID\tname\titem  quantity");
        assert!(parsed.items.is_empty());
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn invalid_id_or_quantity_warns_and_skips() {
        let parsed = parse_tsv("abc\tCoal\t5\n1\tCoal\txyz\n1\tCoal\t2");
        assert_eq!(
            parsed.warnings,
            vec!["Row 1: invalid id or quantity.", "Row 2: invalid id or quantity."]
        );
        assert_eq!(parsed.items, vec![Item { id: 1, name: "Coal".into(), qty: 2 }]);
    }

    #[test]
    fn tab_containing_names_are_rejoined() {
        let parsed = parse_tsv("3\tAbyssal\twhip\t1");
        assert_eq!(parsed.items[0].name, "Abyssal\twhip");
        assert_eq!(parsed.items[0].qty, 1);
    }

    #[test]
    fn blank_lines_are_dropped_before_numbering() {
        let parsed = parse_tsv("\n\n1\tCoal\t5\n\n2\t9\n");
        // The bad row is the second retained line.
        assert_eq!(parsed.warnings, vec!["Row 2: expected 3 columns."]);
    }

    #[test]
    fn first_seen_order_is_preserved() {
        let parsed = parse_tsv("5\tE\t1\n1\tA\t1\n5\tE\t1\n3\tC\t1");
        let ids: Vec<i64> = parsed.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![5, 1, 3]);
    }

    #[test]
    fn parse_is_idempotent() {
        let text = "1\tCoal\t5\n2\tbad\n1\t\t3";
        let a = parse_tsv(text);
        let b = parse_tsv(text);
        assert_eq!(a.items, b.items);
        assert_eq!(a.warnings, b.warnings);
    }
}
