use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

// Packed calendar layout, MSB first:
// year-2000:6  month:4  day:5  hour:5  minute:6  second:6

/// Decode a packed calendar word into a naive local instant.
/// Returns `None` when the fields do not form a valid date.
pub fn decode_calendar(word: u32) -> Option<NaiveDateTime> {
    let year = 2000 + ((word >> 26) & 0x3f) as i32;
    let month = (word >> 22) & 0x0f;
    let day = (word >> 17) & 0x1f;
    let hour = (word >> 12) & 0x1f;
    let minute = (word >> 6) & 0x3f;
    let second = word & 0x3f;

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

pub fn encode_calendar(time: &NaiveDateTime) -> u32 {
    ((time.year() - 2000) as u32) << 26
        | time.month() << 22
        | time.day() << 17
        | time.hour() << 12
        | time.minute() << 6
        | time.second()
}

/// Add a fractional second in 1/65536 units, truncated to whole nanoseconds.
pub fn with_fractional(time: NaiveDateTime, fractional: u16) -> NaiveDateTime {
    time + Duration::nanoseconds((i64::from(fractional) * 1_000_000_000) >> 16)
}

pub fn seconds_to_nanos(seconds: f64) -> i64 {
    (seconds * 1e9) as i64
}

/// Signed nanoseconds from `earlier` to `later`, saturated on overflow.
pub fn nanos_between(later: NaiveDateTime, earlier: NaiveDateTime) -> i64 {
    later
        .signed_duration_since(earlier)
        .num_nanoseconds()
        .unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calendar(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn calendar_round_trip() {
        let cases = [
            calendar(2000, 1, 1, 0, 0, 0),
            calendar(2020, 1, 2, 3, 4, 5),
            calendar(2020, 2, 29, 23, 59, 59),
            calendar(2063, 12, 31, 23, 59, 59),
        ];
        for time in &cases {
            assert_eq!(decode_calendar(encode_calendar(time)), Some(*time));
        }
    }

    #[test]
    fn invalid_fields_are_rejected() {
        // month 0, month 13, day 0 and a nonexistent February day
        assert_eq!(decode_calendar(encode_calendar(&calendar(2020, 1, 1, 0, 0, 0)) & !(0x0f << 22)), None);
        assert_eq!(decode_calendar(13 << 22 | 1 << 17), None);
        assert_eq!(decode_calendar(1 << 22), None);
        assert_eq!(decode_calendar(2 << 22 | 30 << 17), None);
    }

    #[test]
    fn fractional_is_truncated_to_nanos() {
        let base = calendar(2020, 1, 2, 3, 4, 5);
        assert_eq!(with_fractional(base, 0), base);
        assert_eq!(
            with_fractional(base, 0x8000),
            base + Duration::nanoseconds(500_000_000)
        );
        // 65535/65536 s is 999984741.21... ns, the fraction is dropped
        assert_eq!(
            with_fractional(base, 0xffff),
            base + Duration::nanoseconds(999_984_741)
        );
    }

    #[test]
    fn seconds_to_nanos_truncates_toward_zero() {
        assert_eq!(seconds_to_nanos(1.5), 1_500_000_000);
        assert_eq!(seconds_to_nanos(-2.25), -2_250_000_000);
        assert_eq!(seconds_to_nanos(0.0000000009), 0);
    }

    #[test]
    fn nanos_between_is_signed() {
        let base = calendar(2020, 1, 2, 3, 4, 5);
        let later = base + Duration::milliseconds(1500);
        assert_eq!(nanos_between(later, base), 1_500_000_000);
        assert_eq!(nanos_between(base, later), -1_500_000_000);
    }
}
