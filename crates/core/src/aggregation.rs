//! Percentage distribution of artifact quantities by production center.
//!
//! Computed once when a moderator completes a request and stored on the
//! request row as a JSON object (`center -> percentage`).

use std::collections::BTreeMap;

/// Production center name mapped to its share of the total quantity, in percent.
///
/// A `BTreeMap` keeps the serialized JSON key order stable.
pub type AnalysisResult = BTreeMap<String, f64>;

/// Sum of all entry quantities.
pub fn total_quantity<'a, I>(entries: I) -> i64
where
    I: IntoIterator<Item = (&'a str, i32)>,
{
    entries.into_iter().map(|(_, qty)| i64::from(qty)).sum()
}

/// Group `(production_center, quantity)` pairs by center and express each
/// group's quantity as a percentage of the total.
///
/// Returns an empty map when there are no entries or the total quantity is
/// not positive.
pub fn percentage_by_center<'a, I>(entries: I) -> AnalysisResult
where
    I: IntoIterator<Item = (&'a str, i32)>,
{
    let mut per_center: BTreeMap<&'a str, i64> = BTreeMap::new();
    let mut total: i64 = 0;

    for (center, qty) in entries {
        *per_center.entry(center).or_insert(0) += i64::from(qty);
        total += i64::from(qty);
    }

    if total <= 0 {
        return AnalysisResult::new();
    }

    per_center
        .into_iter()
        .map(|(center, sum)| (center.to_string(), sum as f64 / total as f64 * 100.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn three_to_one_split() {
        let result = percentage_by_center([("Attica", 3), ("Corinth", 1)]);
        assert_eq!(result.len(), 2);
        assert!((result["Attica"] - 75.0).abs() < EPSILON);
        assert!((result["Corinth"] - 25.0).abs() < EPSILON);
    }

    #[test]
    fn same_center_entries_are_merged() {
        let result = percentage_by_center([("Attica", 2), ("Phoenicia", 2), ("Attica", 4)]);
        assert_eq!(result.len(), 2);
        assert!((result["Attica"] - 75.0).abs() < EPSILON);
        assert!((result["Phoenicia"] - 25.0).abs() < EPSILON);
    }

    #[test]
    fn empty_input_yields_empty_map() {
        let result = percentage_by_center(std::iter::empty());
        assert!(result.is_empty());
    }

    #[test]
    fn zero_total_yields_empty_map() {
        let result = percentage_by_center([("Attica", 0), ("Corinth", 0)]);
        assert!(result.is_empty());
    }

    #[test]
    fn percentages_sum_to_one_hundred() {
        let entries = [
            ("Attica", 7),
            ("Corinth", 13),
            ("Phoenicia", 1),
            ("Italy", 29),
            ("Scythia", 3),
            ("Central Europe", 11),
        ];
        let result = percentage_by_center(entries);

        let sum: f64 = result.values().sum();
        assert!((sum - 100.0).abs() < 1e-6, "sum was {sum}");

        for key in result.keys() {
            assert!(entries.iter().any(|(center, _)| center == key));
        }
    }

    #[test]
    fn single_center_gets_everything() {
        let result = percentage_by_center([("Italy", 5)]);
        assert_eq!(result.len(), 1);
        assert!((result["Italy"] - 100.0).abs() < EPSILON);
    }

    #[test]
    fn total_quantity_sums_all_entries() {
        assert_eq!(total_quantity([("a", 3), ("b", 1), ("a", 2)]), 6);
        assert_eq!(total_quantity(std::iter::empty()), 0);
    }
}
