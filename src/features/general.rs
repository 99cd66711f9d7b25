//! Column reconciliation against a requested feature list

use tracing::{debug, warn};

use crate::table::DataTable;

/// Add every requested feature the table lacks, filled with missing values.
/// Without a feature list the table is returned untouched.
pub fn add_missing_feature_columns(mut table: DataTable, feature_names: Option<&[String]>) -> DataTable {
    let Some(names) = feature_names else {
        return table;
    };

    let missing: Vec<&String> = names.iter().filter(|n| !table.has_column(n)).collect();
    if !missing.is_empty() {
        debug!(count = missing.len(), columns = ?missing, "Adding missing feature columns");
    }
    for name in missing {
        table.fill_column(name.clone(), None);
    }
    table
}

/// Drop every column that was not requested and order the rest like the
/// feature list. Without a feature list the table is returned untouched.
pub fn remove_extra_feature_columns(mut table: DataTable, feature_names: Option<&[String]>) -> DataTable {
    let Some(names) = feature_names else {
        return table;
    };

    let dropped = table.retain_columns(names);
    if dropped > 0 {
        warn!(count = dropped, "Removed features that were not requested");
    }
    table
}

/// Shape `table` into exactly the requested schema
pub fn reconcile_feature_columns(table: DataTable, feature_names: Option<&[String]>) -> DataTable {
    let table = add_missing_feature_columns(table, feature_names);
    remove_extra_feature_columns(table, feature_names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn table() -> DataTable {
        let t0 = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        DataTable::new(vec![t0, t0 + chrono::Duration::minutes(15)])
            .with_column("load", vec![Some(1.0), Some(2.0)])
            .unwrap()
            .with_column("T-720min", vec![Some(0.5), None])
            .unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_missing_fills_with_missing_values() {
        let requested = names(&["T-720min", "APX"]);
        let out = add_missing_feature_columns(table(), Some(&requested));
        assert_eq!(out.column("APX").unwrap(), &[None, None]);
        assert_eq!(out.column("T-720min").unwrap(), &[Some(0.5), None]);
        assert!(out.has_column("load"));
    }

    #[test]
    fn test_remove_extra_drops_unrequested() {
        let requested = names(&["T-720min"]);
        let out = remove_extra_feature_columns(table(), Some(&requested));
        assert_eq!(out.column_names().collect::<Vec<_>>(), vec!["T-720min"]);
    }

    #[test]
    fn test_no_feature_list_is_noop() {
        assert_eq!(add_missing_feature_columns(table(), None), table());
        assert_eq!(remove_extra_feature_columns(table(), None), table());
    }

    #[test]
    fn test_reconcile_matches_requested_schema_exactly() {
        let requested = names(&["APX", "T-720min"]);
        let out = reconcile_feature_columns(table(), Some(&requested));
        assert_eq!(out.column_names().collect::<Vec<_>>(), vec!["APX", "T-720min"]);
        assert_eq!(out.len(), 2);
    }
}
