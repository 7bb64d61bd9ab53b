//! Simple time helpers used by multiple services.

use chrono::{DateTime, Local, TimeZone};

/// Layout used for every `CreateTime` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Wall-clock capture time at second precision.
pub fn timestamp() -> String {
    format_timestamp(&Local::now())
}

pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn formats_to_second_precision() {
        let at = Utc.with_ymd_and_hms(2021, 9, 20, 7, 5, 3).unwrap();
        assert_eq!(format_timestamp(&at), "2021-09-20 07:05:03");
    }

    #[test]
    fn timestamp_has_fixed_width() {
        assert_eq!(timestamp().len(), 19);
    }
}
