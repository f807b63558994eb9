//! Run and job identifiers.

use chrono::{DateTime, Local, TimeZone};
use uuid::Uuid;

/// `YYYYMMDDHHmm-<uuid v4>` using the local clock.
pub fn job_id() -> String {
    job_id_at(&Local::now())
}

/// Job id for a given instant. The minute prefix sorts chronologically; the
/// uuid suffix keeps ids unique within a minute.
pub fn job_id_at<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}-{}", at.format("%Y%m%d%H%M"), Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn prefix_is_minute_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 21, 5, 59).unwrap();
        let id = job_id_at(&at);

        let (prefix, token) = id.split_once('-').unwrap();
        assert_eq!(prefix, "202401022105");
        assert!(Uuid::parse_str(token).is_ok());
    }

    #[test]
    fn ids_are_unique_within_a_minute() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 21, 5, 0).unwrap();
        assert_ne!(job_id_at(&at), job_id_at(&at));
    }
}
