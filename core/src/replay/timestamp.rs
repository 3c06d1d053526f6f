use time::{Date, Month, PrimitiveDateTime, Time};

/// Parses Arbiter's start stamp `dd.mm.yyyy.HH:MM:SS:xsss` into epoch microseconds.
///
/// The sub-second field drops its first digit and keeps the rest as milliseconds.
pub(crate) fn arbiter_start(text: &str) -> Option<u64> {
    let mut parts = text.splitn(4, '.');
    let day = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let year = parts.next()?.parse().ok()?;
    let clock = parts.next()?;
    epoch_micros(year, month, day, clock)
}

/// Parses Arbiter's end stamp `dd.HH:MM:SS:xsss`, which borrows month and year from the start
/// stamp and rolls the month over when its day is smaller.
pub(crate) fn arbiter_end(start: &str, end: &str) -> Option<u64> {
    let mut start_parts = start.splitn(4, '.');
    let start_day: u8 = start_parts.next()?.parse().ok()?;
    let mut month: u8 = start_parts.next()?.parse().ok()?;
    let mut year: i32 = start_parts.next()?.parse().ok()?;

    let (end_day, clock) = end.split_once('.')?;
    let end_day: u8 = end_day.parse().ok()?;
    if start_day > end_day {
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }
    epoch_micros(year, month, end_day, clock)
}

/// Calendar fields in UTC to epoch microseconds.
pub(crate) fn calendar_micros(
    year: i32,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
) -> Option<u64> {
    let date = Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()?;
    let time = Time::from_hms(hour, minute, second).ok()?;
    let seconds = PrimitiveDateTime::new(date, time)
        .assume_utc()
        .unix_timestamp();
    u64::try_from(seconds).ok()?.checked_mul(1_000_000)
}

fn epoch_micros(year: i32, month: u8, day: u8, clock: &str) -> Option<u64> {
    let mut fields = clock.split(':');
    let hour = fields.next()?.parse().ok()?;
    let minute = fields.next()?.parse().ok()?;
    let second = fields.next()?.parse().ok()?;
    let sub_second: u64 = fields.next()?.get(1..)?.parse().ok()?;
    calendar_micros(year, month, day, hour, minute, second)?.checked_add(sub_second * 1_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arbiter_start_stamp() {
        assert_eq!(
            arbiter_start("18.10.2022.20:15:35:6606"),
            Some(1_666_124_135_606_000)
        );
    }

    #[test]
    fn arbiter_end_stamp() {
        assert_eq!(
            arbiter_end("18.10.2022.20:15:35:6606", "18.20:16:24:8868"),
            Some(1_666_124_184_868_000)
        );
    }

    #[test]
    fn end_stamp_rolls_into_next_year() {
        let end = arbiter_end("31.12.2021.23:59:59:0000", "01.00:00:01:0000").unwrap();
        assert_eq!(end, calendar_micros(2022, 1, 1, 0, 0, 1).unwrap());
    }

    #[test]
    fn malformed_stamps_are_none() {
        assert_eq!(arbiter_start("18.10.2022"), None);
        assert_eq!(arbiter_start("32.10.2022.20:15:35:6606"), None);
        assert_eq!(arbiter_end("18.10.2022.20:15:35:6606", "garbage"), None);
    }
}
