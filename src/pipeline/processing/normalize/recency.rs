use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::types::{Cell, Recency};

const TIME_FORMATS: [&str; 5] = [
    "%H:%M:%S%.f",
    "%H:%M:%S",
    "%H:%M",
    "%I:%M:%S %p",
    "%I:%M %p",
];

/// ISO timestamps with an offset but no seconds, which RFC 3339 rejects.
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%d %H:%M%z",
];

/// Month-name dates as one token (`24-Oct-2025`).
const NAMED_COMPACT_FORMATS: [&str; 2] = ["%d-%b-%Y", "%d-%b-%y"];

/// Month-name dates spread over three tokens (`24 Oct 2025`, `Oct 24, 2025`).
const NAMED_SPACED_FORMATS: [&str; 4] = ["%d %b %Y", "%d %B %Y", "%b %d %Y", "%B %d %Y"];

/// Parse a recency value using the day-first convention.
///
/// Year-first ISO dates (`2025-07-18`) are recognised by their four-digit
/// leading component; numeric dates are otherwise read as day, month, year
/// (`18-07-2025`, `18/07/2025`, `18.07.25`), falling back to month, day, year
/// only when the day-first reading is not a real date (`10/22/2025`).
/// Month names (`24 Oct 2025`, `Oct 24, 2025`, `24-Oct-2025`) are accepted.
/// An optional 24-hour or AM/PM time may follow. Anything unparseable is
/// `Recency::Missing`.
pub fn parse_recency(raw: &str) -> Recency {
    parse_datetime(raw).map_or(Recency::Missing, Recency::At)
}

/// Read the recency of a cell in any stage of normalization.
///
/// Raw text is parsed on the fly, so a dataset that never went through the
/// normalizer still orders the same way.
pub fn cell_recency(cell: &Cell) -> Recency {
    match cell {
        Cell::Recency(r) => *r,
        Cell::Text(s) => parse_recency(s),
        Cell::Null | Cell::Flag(_) => Recency::Missing,
    }
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(value, fmt).ok())
    {
        return Some(dt.naive_utc());
    }

    parse_numeric(value).or_else(|| parse_named(value))
}

fn parse_numeric(value: &str) -> Option<NaiveDateTime> {
    let (date_part, time_part) = match value.split_once(|c: char| c == ' ' || c == 'T') {
        Some((d, t)) => (d, t),
        None => (value, ""),
    };
    with_time(parse_date(date_part)?, time_part)
}

fn parse_named(value: &str) -> Option<NaiveDateTime> {
    let normalized = value.replace(',', " ");
    let tokens: Vec<&str> = normalized.split_whitespace().collect();

    for (width, formats) in [(1, &NAMED_COMPACT_FORMATS[..]), (3, &NAMED_SPACED_FORMATS[..])] {
        if tokens.len() < width {
            continue;
        }
        let date_text = tokens[..width].join(" ");
        if let Some(date) = formats
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(&date_text, fmt).ok())
        {
            return with_time(date, &tokens[width..].join(" "));
        }
    }
    None
}

fn with_time(date: NaiveDate, time: &str) -> Option<NaiveDateTime> {
    match time.trim() {
        "" => date.and_hms_opt(0, 0, 0),
        t => parse_time(t).map(|time| date.and_time(time)),
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let separator = ['-', '/', '.'].into_iter().find(|sep| value.contains(*sep))?;
    let parts: Vec<&str> = value.split(separator).collect();
    let [first, second, third] = parts.as_slice() else {
        return None;
    };
    if !parts
        .iter()
        .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    if first.len() == 4 {
        // Year-first ISO layout wins even under the day-first convention
        if second.len() > 2 || third.len() > 2 {
            return None;
        }
        return NaiveDate::from_ymd_opt(first.parse().ok()?, second.parse().ok()?, third.parse().ok()?);
    }

    if first.len() > 2 || second.len() > 2 {
        return None;
    }
    let year: i32 = match third.len() {
        4 => third.parse().ok()?,
        // Same pivot as chrono's %y: 00-68 -> 2000s, 69-99 -> 1900s
        2 => {
            let yy: i32 = third.parse().ok()?;
            if yy < 69 {
                2000 + yy
            } else {
                1900 + yy
            }
        }
        _ => return None,
    };
    let (first, second): (u32, u32) = (first.parse().ok()?, second.parse().ok()?);
    NaiveDate::from_ymd_opt(year, second, first).or_else(|| {
        // Month-first only when day-first names no real date
        NaiveDate::from_ymd_opt(year, first, second)
    })
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.strip_suffix('Z').unwrap_or(value);
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(value, fmt).ok())
}
