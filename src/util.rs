//! Small shared helpers.

use chrono::Utc;

/// Generate a fresh v4 UUID string for new rows.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current UTC time as RFC 3339, the timestamp format used in every table.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// First day of the current calendar month, `YYYY-MM-DD`.
pub fn month_start() -> String {
    Utc::now().format("%Y-%m-01").to_string()
}

/// First day of the next calendar month, `YYYY-MM-DD`. Used as the
/// exclusive upper bound for this-month sums.
pub fn next_month_start() -> String {
    let now = Utc::now();
    let (year, month) = {
        use chrono::Datelike;
        if now.month() == 12 {
            (now.year() + 1, 1)
        } else {
            (now.year(), now.month() + 1)
        }
    };
    format!("{year:04}-{month:02}-01")
}
