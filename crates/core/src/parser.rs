use anyhow::{anyhow, Context, Result};
use chrono::{prelude::*, Duration};
use once_cell::sync::Lazy;
use regex::Regex;

const DEFAULT_HOUR: u32 = 9;

static RELATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+(?P<value>\d+)\s*(?P<unit>min|m|h|d|w)$").expect("valid regex")
});

/// Resolve a human due-date specification against the local clock.
///
/// Accepted forms: `now`, `today`/`tomorrow`/weekday names with an optional
/// `HH:MM`, relative offsets (`+30m`, `+2h`, `+3d`, `+1w`), RFC 3339,
/// `YYYY-MM-DD[ HH:MM]`, `DD/MM/YYYY[ HH:MM]`, and a bare `HH:MM` (today).
/// Dates without a time resolve to 09:00.
pub fn parse_due_spec(spec: &str) -> Result<DateTime<Utc>> {
    parse_due_spec_at(spec, Local::now())
}

/// Same as [`parse_due_spec`] with an explicit "now" and time zone.
pub fn parse_due_spec_at<Tz: TimeZone>(spec: &str, now: DateTime<Tz>) -> Result<DateTime<Utc>> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Date specification cannot be empty"));
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower == "now" {
        return Ok(now.with_timezone(&Utc));
    }

    if lower.starts_with('+') {
        return parse_relative_spec(&lower, &now);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let tz = now.timezone();
    let (date_part, time_part) = split_date_time(&lower);
    let time = match time_part {
        Some(raw) => Some(parse_time(raw)?),
        None => None,
    };

    if let Some(date) = parse_date_word(date_part, &now) {
        let time = time.unwrap_or_else(default_time);
        return resolve_local(&tz, date.and_time(time), trimmed);
    }

    if time_part.is_none() {
        if let Ok(time) = parse_time(date_part) {
            let date = now.date_naive();
            return resolve_local(&tz, date.and_time(time), trimmed);
        }
    }

    Err(anyhow!(
        "Unrecognized date specification '{}'. Try 2026-12-24 18:00, tomorrow, +2h, fri 09:30",
        spec
    ))
}

fn split_date_time(spec: &str) -> (&str, Option<&str>) {
    if let Some((date, time)) = spec.split_once(char::is_whitespace) {
        let time = time.trim();
        if !time.is_empty() {
            return (date, Some(time));
        }
    }
    if let Some((date, time)) = spec.split_once('t') {
        if date.starts_with(|c: char| c.is_ascii_digit()) && !time.is_empty() {
            return (date, Some(time));
        }
    }
    (spec, None)
}

fn parse_date_word<Tz: TimeZone>(word: &str, now: &DateTime<Tz>) -> Option<NaiveDate> {
    let today = now.date_naive();
    match word {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        _ => {}
    }

    if let Some(weekday) = parse_weekday(word) {
        let mut days_ahead = (weekday.num_days_from_monday() as i64
            - today.weekday().num_days_from_monday() as i64)
            .rem_euclid(7);
        if days_ahead == 0 {
            days_ahead = 7;
        }
        return Some(today + Duration::days(days_ahead));
    }

    NaiveDate::parse_from_str(word, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(word, "%d/%m/%Y"))
        .ok()
}

fn parse_time(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .with_context(|| format!("Invalid time '{}': expected HH:MM", raw))
}

fn default_time() -> NaiveTime {
    NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0).unwrap_or_default()
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime, spec: &str) -> Result<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("Could not resolve local time for '{}'", spec))
}

fn parse_relative_spec<Tz: TimeZone>(spec: &str, now: &DateTime<Tz>) -> Result<DateTime<Utc>> {
    let captures = RELATIVE_RE
        .captures(spec)
        .ok_or_else(|| anyhow!("Unsupported relative date '{}'. Use +30m, +2h, +3d or +1w.", spec))?;
    let value: i64 = captures["value"]
        .parse()
        .context("Invalid relative offset")?;
    let offset = match &captures["unit"] {
        "m" | "min" => Duration::try_minutes(value),
        "h" => Duration::try_hours(value),
        "d" => Duration::try_days(value),
        "w" => Duration::try_weeks(value),
        other => return Err(anyhow!("Unsupported relative unit '{}'", other)),
    };
    offset
        .and_then(|offset| now.clone().checked_add_signed(offset))
        .map(|due| due.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("Relative offset '{}' is out of range", spec))
}

fn parse_weekday(label: &str) -> Option<Weekday> {
    match label {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    // Saturday 2026-10-17 12:00 at UTC+7.
    fn fixed_now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 17, 12, 0, 0)
            .unwrap()
    }

    fn local(spec: &str) -> String {
        parse_due_spec_at(spec, fixed_now())
            .unwrap()
            .with_timezone(&fixed_now().timezone())
            .format("%Y-%m-%d %H:%M")
            .to_string()
    }

    #[rstest]
    #[case("today", "2026-10-17 09:00")]
    #[case("tomorrow", "2026-10-18 09:00")]
    #[case("Tomorrow 18:30", "2026-10-18 18:30")]
    #[case("mon", "2026-10-19 09:00")]
    #[case("sat 07:15", "2026-10-24 07:15")]
    #[case("2026-12-24", "2026-12-24 09:00")]
    #[case("2026-12-24 20:00", "2026-12-24 20:00")]
    #[case("2026-12-24T20:00", "2026-12-24 20:00")]
    #[case("24/12/2026 20:00", "2026-12-24 20:00")]
    #[case("16:45", "2026-10-17 16:45")]
    #[case("+30m", "2026-10-17 12:30")]
    #[case("+2h", "2026-10-17 14:00")]
    #[case("+3d", "2026-10-20 12:00")]
    #[case("+1w", "2026-10-24 12:00")]
    fn resolves_specs(#[case] spec: &str, #[case] expected: &str) {
        assert_eq!(local(spec), expected);
    }

    #[test]
    fn parses_rfc3339_verbatim() {
        let parsed = parse_due_spec_at("2026-11-01T08:00:00Z", fixed_now()).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 11, 1, 8, 0, 0).unwrap());
    }

    #[test]
    fn now_is_the_reference_instant() {
        let parsed = parse_due_spec_at("now", fixed_now()).unwrap();
        assert_eq!(parsed, fixed_now().with_timezone(&Utc));
    }

    #[rstest]
    #[case("")]
    #[case("someday")]
    #[case("+3y")]
    #[case("2026-13-01")]
    #[case("tomorrow 25:00")]
    #[case("+1000000000d")]
    #[case("+999999999999999d")]
    #[case("+99999999999999999999m")]
    fn rejects_garbage(#[case] spec: &str) {
        assert!(parse_due_spec_at(spec, fixed_now()).is_err());
    }
}
