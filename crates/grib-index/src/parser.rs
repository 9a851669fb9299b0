//! Inventory line grammar.
//!
//! ```text
//! <ordinal>:<offset>:d=<YYYYMMDDHH>:<VARIABLE>:<level>[:<forecast>[:<extra>...]]
//! 4:2129428:d=2000010100:PRMSL:mean sea level:12 hour fcst:ENS=low-res ctl
//! ```

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use nom::{
    bytes::complete::{tag, take_while, take_while1, take_while_m_n},
    character::complete::{char, digit1},
    combinator::{map_res, opt, rest},
    sequence::{preceded, tuple},
    IResult,
};
use tracing::debug;

use crate::error::IndexError;
use crate::record::{ByteLength, IndexRecord};

/// Fields of one line before byte lengths are known.
struct RawLine<'a> {
    ordinal: u32,
    offset: u64,
    date: &'a str,
    variable: &'a str,
    level: &'a str,
    forecast: Option<&'a str>,
    extra: Option<&'a str>,
}

fn field(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c != ':')(input)
}

fn ordinal(input: &str) -> IResult<&str, u32> {
    map_res(digit1, str::parse)(input)
}

fn offset(input: &str) -> IResult<&str, u64> {
    map_res(digit1, str::parse)(input)
}

fn date_tag(input: &str) -> IResult<&str, &str> {
    preceded(
        tag("d="),
        take_while_m_n(10, 10, |c: char| c.is_ascii_digit()),
    )(input)
}

fn index_line(input: &str) -> IResult<&str, RawLine<'_>> {
    let (input, (ordinal, _, offset, _, date, _, variable, _, level, forecast, extra)) =
        tuple((
            ordinal,
            char(':'),
            offset,
            char(':'),
            date_tag,
            char(':'),
            field,
            char(':'),
            field,
            opt(preceded(char(':'), take_while(|c: char| c != ':'))),
            opt(preceded(char(':'), rest)),
        ))(input)?;

    Ok((
        input,
        RawLine {
            ordinal,
            offset,
            date,
            variable,
            level,
            forecast,
            extra,
        },
    ))
}

fn reference_time(date: &str) -> Option<DateTime<Utc>> {
    let year = date.get(0..4)?.parse().ok()?;
    let month = date.get(4..6)?.parse().ok()?;
    let day = date.get(6..8)?.parse().ok()?;
    let hour = date.get(8..10)?.parse().ok()?;
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, 0, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}

fn parse_line(line_no: usize, line: &str) -> Result<(RawLine<'_>, DateTime<Utc>), IndexError> {
    let (_, raw) = index_line(line).map_err(|e| {
        let reason = match e {
            nom::Err::Error(err) | nom::Err::Failure(err) => format!(
                "cannot split into index fields ({}) near {:?}",
                err.code.description(),
                err.input
            ),
            nom::Err::Incomplete(_) => "incomplete line".to_string(),
        };
        IndexError::Malformed {
            line: line_no,
            reason,
        }
    })?;

    let time = reference_time(raw.date).ok_or_else(|| IndexError::Malformed {
        line: line_no,
        reason: format!("invalid reference date d={}", raw.date),
    })?;

    Ok((raw, time))
}

/// Parse inventory text into records in file order.
///
/// Trailing blank lines are ignored; a blank line followed by more records is
/// malformed. Offsets must be strictly increasing. The last record is
/// [`ByteLength::OpenEnded`].
pub fn parse_index(text: &str) -> Result<Vec<IndexRecord>, IndexError> {
    let mut records: Vec<IndexRecord> = Vec::new();
    let mut blank_at: Option<usize> = None;

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        if line.trim().is_empty() {
            blank_at.get_or_insert(line_no);
            continue;
        }
        if let Some(blank) = blank_at {
            return Err(IndexError::Malformed {
                line: blank,
                reason: "blank line between records".to_string(),
            });
        }

        let (raw, time) = parse_line(line_no, line)?;

        if let Some(prev) = records.last_mut() {
            if raw.offset <= prev.byte_offset {
                return Err(IndexError::NonMonotonic {
                    line: line_no,
                    previous: prev.byte_offset,
                    offset: raw.offset,
                });
            }
            prev.byte_length = ByteLength::Known(raw.offset - prev.byte_offset);
        }

        records.push(IndexRecord {
            message_ordinal: raw.ordinal,
            byte_offset: raw.offset,
            byte_length: ByteLength::OpenEnded,
            reference_time: time,
            variable_tag: raw.variable.to_string(),
            level_tag: raw.level.to_string(),
            forecast_tag: raw
                .forecast
                .filter(|f| !f.is_empty())
                .map(str::to_string),
            extra: raw
                .extra
                .map(|rest| {
                    rest.split(':')
                        .filter(|f| !f.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        });
    }

    debug!(records = records.len(), "Parsed inventory");
    Ok(records)
}
