use chrono::NaiveDate;

use crate::MediaKind;

/// `{YYYY-MM-DD}_story_{index}.{ext}`
pub fn filename_for(kind: MediaKind, index: usize, date: NaiveDate) -> String {
    format!(
        "{}_story_{}.{}",
        date.format("%Y-%m-%d"),
        index,
        kind.extension()
    )
}
