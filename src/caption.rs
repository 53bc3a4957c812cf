use crate::record::Record;

/// Render the caption lines for one record.
///
/// Lines follow the order of `selected_columns`; columns the record does not
/// have are skipped. Null values render as an empty value.
pub fn build(record: &Record, selected_columns: &[String]) -> Vec<String> {
    selected_columns
        .iter()
        .filter_map(|column| {
            record
                .get(column)
                .map(|value| format!("{}: {}", column, value))
        })
        .collect()
}
