use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

const ISO_SECONDS: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

/// Wall-clock seconds since the Unix epoch. Event timestamps use this; two
/// concurrent writers may stamp the same second.
pub fn now_epoch() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Payload for the stateless time-sync endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TimeView {
    pub epoch: i64,
    pub epoch_ms: i64,
    pub iso: String,
}

pub fn time_view() -> TimeView {
    let now = OffsetDateTime::now_utc();
    TimeView {
        epoch: now.unix_timestamp(),
        epoch_ms: (now.unix_timestamp_nanos() / 1_000_000) as i64,
        iso: now.format(ISO_SECONDS).unwrap_or_default(),
    }
}
