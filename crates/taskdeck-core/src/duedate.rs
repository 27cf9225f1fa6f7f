use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Threshold below which a bare epoch number is taken as seconds rather
/// than milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A due-date value exactly as it arrives on the wire. The backend has
/// emitted every one of these shapes at some point (calendar tuples and
/// structured objects from its datetime serializer, bare epochs, plain
/// strings), so the shape is resolved once here, at the API boundary,
/// instead of being re-sniffed at every call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DueDate {
    /// `[year, month(1-based), day, hour?, minute?, second?]`
    Tuple(Vec<i64>),
    /// `{year, month(1-based), day, hour?, minute?, second?}`
    Structured(StructuredDate),
    /// Bare number: seconds or milliseconds since the epoch.
    Epoch(serde_json::Number),
    /// Anything textual; parsed on a best-effort basis.
    Text(String),
    /// None of the known shapes. Carried through untouched so an update
    /// echoes the server's value back verbatim.
    Other(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minute: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second: Option<u32>,
}

/// Canonical form of a due date. Both the display label and the overdue
/// comparison are derived from this one value, so the two can never
/// disagree about what a given wire shape means.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedDue {
    Absent,
    Instant(DateTime<Utc>),
    /// The raw value could not be resolved to an instant. It is still
    /// shown to the user unchanged; comparisons treat it as unknown.
    Unparsed(String),
}

impl NormalizedDue {
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            NormalizedDue::Instant(dt) => Some(*dt),
            NormalizedDue::Absent | NormalizedDue::Unparsed(_) => None,
        }
    }

    /// Display label in the configured timezone; `None` when absent.
    pub fn display(&self, tz: Tz) -> Option<String> {
        match self {
            NormalizedDue::Absent => None,
            NormalizedDue::Instant(dt) => {
                Some(dt.with_timezone(&tz).format(DISPLAY_FORMAT).to_string())
            }
            NormalizedDue::Unparsed(raw) => Some(raw.clone()),
        }
    }
}

#[tracing::instrument(skip(due))]
pub fn normalize(due: Option<&DueDate>, tz: Tz) -> NormalizedDue {
    let Some(due) = due else {
        return NormalizedDue::Absent;
    };

    match due {
        DueDate::Tuple(parts) => normalize_tuple(parts, tz),
        DueDate::Structured(fields) => {
            from_calendar_fields(
                fields.year,
                fields.month,
                fields.day,
                fields.hour.unwrap_or(0),
                fields.minute.unwrap_or(0),
                fields.second.unwrap_or(0),
                tz,
            )
            .map(NormalizedDue::Instant)
            .unwrap_or_else(|| NormalizedDue::Unparsed(raw_json_text(due)))
        }
        DueDate::Epoch(number) => normalize_epoch(number),
        DueDate::Text(text) => normalize_text(text, tz),
        DueDate::Other(value) => {
            if value.is_null() {
                NormalizedDue::Absent
            } else {
                NormalizedDue::Unparsed(raw_json_text(due))
            }
        }
    }
}

fn normalize_tuple(parts: &[i64], tz: Tz) -> NormalizedDue {
    if parts.len() < 3 {
        return NormalizedDue::Unparsed(render_tuple(parts));
    }

    let component = |idx: usize| parts.get(idx).copied().unwrap_or(0);

    let instant = i32::try_from(parts[0]).ok().and_then(|year| {
        let month = u32::try_from(component(1)).ok()?;
        let day = u32::try_from(component(2)).ok()?;
        let hour = u32::try_from(component(3)).ok()?;
        let minute = u32::try_from(component(4)).ok()?;
        let second = u32::try_from(component(5)).ok()?;
        from_calendar_fields(year, month, day, hour, minute, second, tz)
    });

    match instant {
        Some(dt) => NormalizedDue::Instant(dt),
        None => NormalizedDue::Unparsed(render_tuple(parts)),
    }
}

fn normalize_epoch(number: &serde_json::Number) -> NormalizedDue {
    let Some(value) = number.as_f64() else {
        return NormalizedDue::Unparsed(number.to_string());
    };

    if value == 0.0 {
        // The backend emits zero for "no due date" in some variants.
        return NormalizedDue::Absent;
    }

    let millis = if value.abs() < EPOCH_MILLIS_THRESHOLD {
        value * 1000.0
    } else {
        value
    };

    match DateTime::from_timestamp_millis(millis as i64) {
        Some(dt) => NormalizedDue::Instant(dt),
        None => NormalizedDue::Unparsed(number.to_string()),
    }
}

fn normalize_text(text: &str, tz: Tz) -> NormalizedDue {
    let token = text.trim();
    if token.is_empty() {
        return NormalizedDue::Absent;
    }

    match parse_literal(token, tz) {
        Some(dt) => NormalizedDue::Instant(dt),
        None => NormalizedDue::Unparsed(text.to_string()),
    }
}

/// The literal formats the backend is known to emit: RFC 3339, the
/// zone-less ISO shapes of its datetime serializer, and a bare date.
/// Zone-less values are interpreted in the configured timezone.
fn parse_literal(token: &str, tz: Tz) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(token, fmt) {
            return to_utc_from_local(ndt, tz);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        return to_utc_from_local(midnight, tz);
    }

    None
}

fn from_calendar_fields(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    tz: Tz,
) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let naive = date.and_hms_opt(hour, minute, second)?;
    to_utc_from_local(naive, tz)
}

fn to_utc_from_local(local_naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&local_naive) {
        LocalResult::Single(local_dt) => Some(local_dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(first, second) => {
            warn!(
                first = %first,
                second = %second,
                "ambiguous local datetime; using earliest"
            );
            let chosen = if first <= second { first } else { second };
            Some(chosen.with_timezone(&Utc))
        }
        LocalResult::None => None,
    }
}

fn render_tuple(parts: &[i64]) -> String {
    serde_json::to_string(parts).unwrap_or_else(|_| format!("{parts:?}"))
}

fn raw_json_text(due: &DueDate) -> String {
    serde_json::to_string(due).unwrap_or_else(|_| format!("{due:?}"))
}

/// Due-date expression entered on the command line: `today`, `tomorrow`,
/// a relative offset (`+3d`, `+12h`, `-30m`), or any literal format the
/// normalizer accepts.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_due_input(input: &str, now: DateTime<Utc>, tz: Tz) -> anyhow::Result<DateTime<Utc>> {
    let token = input.trim();
    let lower = token.to_ascii_lowercase();

    match lower.as_str() {
        "now" => return Ok(now),
        "today" => {
            let date = now.with_timezone(&tz).date_naive();
            let midnight = date
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| anyhow::anyhow!("failed to construct midnight for today"))?;
            return to_utc_from_local(midnight, tz)
                .ok_or_else(|| anyhow::anyhow!("midnight does not exist in timezone {tz}"));
        }
        "tomorrow" => {
            let today = parse_due_input("today", now, tz)?;
            return Ok(today + Duration::days(1));
        }
        _ => {}
    }

    let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dhm])$")
        .map_err(|e| anyhow::anyhow!("internal regex compile failure: {e}"))?;

    if let Some(caps) = rel_re.captures(token) {
        let num: i64 = caps["num"]
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid relative amount in {token}"))?;
        let duration = match &caps["unit"] {
            "d" => Duration::days(num),
            "h" => Duration::hours(num),
            "m" => Duration::minutes(num),
            unit => return Err(anyhow::anyhow!("unknown relative unit: {unit}")),
        };

        return Ok(if &caps["sign"] == "-" {
            now - duration
        } else {
            now + duration
        });
    }

    parse_literal(token, tz).ok_or_else(|| {
        anyhow::anyhow!(
            "unrecognized due date: {input} (supported: now/today/tomorrow, \
             +Nd/+Nh/+Nm, RFC3339, YYYY-MM-DD, YYYY-MM-DDTHH:MM[:SS])"
        )
    })
}

/// Wire encoding for a due instant this client sends on create: the
/// zone-less ISO shape the backend's datetime type accepts.
pub fn to_wire(dt: DateTime<Utc>, tz: Tz) -> DueDate {
    DueDate::Text(
        dt.with_timezone(&tz)
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string(),
    )
}
