//! Reference timestamps and reference-layout rendering.
//!
//! Time values travel as text in one fixed wire format,
//! `Mon, 02 Jan 2006 15:04:05 -0700`. A placeholder's time-format spec is a
//! layout written against that same reference instant: `2006-01-02` renders
//! the date, `3:04PM` a twelve hour clock, and so on.

use chrono::{DateTime, Datelike, FixedOffset, Offset, TimeZone, Timelike, Weekday};
use std::fmt::{self, Write};

/// strftime rendering of the reference wire format
pub const REFERENCE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Byte shape of the wire format: `a` a letter, `d` a digit, `s` an offset sign
const REFERENCE_SHAPE: &[u8] = b"aaa, dd aaa dddd dd:dd:dd sdddd";

/// Parses a value written in the reference wire format.
///
/// Every field has a fixed width and the offset has no colon. The weekday
/// must be a weekday name but is not checked against the date.
#[must_use]
pub fn parse_reference(text: &str) -> Option<DateTime<FixedOffset>> {
    if !has_reference_shape(text.as_bytes()) {
        return None;
    }
    text[..3].parse::<Weekday>().ok()?;
    DateTime::parse_from_str(&text[5..], "%d %b %Y %H:%M:%S %z").ok()
}

fn has_reference_shape(bytes: &[u8]) -> bool {
    bytes.len() == REFERENCE_SHAPE.len()
        && bytes
            .iter()
            .zip(REFERENCE_SHAPE)
            .all(|(&byte, &shape)| match shape {
                b'a' => byte.is_ascii_alphabetic(),
                b'd' => byte.is_ascii_digit(),
                b's' => byte == b'+' || byte == b'-',
                literal => byte == literal,
            })
}

/// Writes an instant in the reference wire format.
#[must_use]
pub fn to_reference<Tz>(instant: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    instant.format(REFERENCE_FORMAT).to_string()
}

/// Re-renders a reference timestamp with `layout`, or `None` if `value` is
/// not a reference timestamp.
#[must_use]
pub fn reformat(value: &str, layout: &str) -> Option<String> {
    parse_reference(value).map(|instant| Layout::parse(layout).render(&instant))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZoneStyle {
    /// `-07`
    Hours,
    /// `-0700`
    HoursMinutes,
    /// `-07:00`
    HoursColonMinutes,
    /// `-070000`
    Full,
    /// `-07:00:00`
    FullColon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    LongMonth,
    Month,
    NumMonth,
    ZeroMonth,
    LongWeekDay,
    WeekDay,
    Day,
    UnderDay,
    ZeroDay,
    UnderYearDay,
    ZeroYearDay,
    Hour,
    Hour12,
    ZeroHour12,
    Minute,
    ZeroMinute,
    Second,
    ZeroSecond,
    LongYear,
    Year,
    UpperMeridiem,
    LowerMeridiem,
    ZoneName,
    /// Numeric offset. `iso` writes `Z` for UTC.
    Zone {
        style: ZoneStyle,
        iso: bool,
    },
    /// Fractional seconds. `trim` drops trailing zeros (the `.999` form).
    Fraction {
        separator: char,
        digits: usize,
        trim: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk<'a> {
    Literal(&'a str),
    Element(Element),
}

/// A time-format spec split into literal text and reference elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout<'a> {
    chunks: Vec<Chunk<'a>>,
}

impl<'a> Layout<'a> {
    /// Splits `layout` into chunks. Any text that is not a reference element is
    /// kept verbatim, so parsing never fails.
    #[must_use]
    pub fn parse(layout: &'a str) -> Self {
        let mut chunks = Vec::new();
        let mut rest = layout;
        while !rest.is_empty() {
            let Some((prefix, element, len)) = next_element(rest) else {
                chunks.push(Chunk::Literal(rest));
                break;
            };
            if prefix > 0 {
                chunks.push(Chunk::Literal(&rest[..prefix]));
            }
            chunks.push(Chunk::Element(element));
            rest = &rest[prefix + len..];
        }
        Self { chunks }
    }

    #[must_use]
    pub fn render<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> String
    where
        Tz::Offset: fmt::Display,
    {
        Rendered {
            layout: self,
            instant,
        }
        .to_string()
    }
}

/// A layout bound to an instant, written through `Display`
struct Rendered<'l, 'i, Tz: TimeZone> {
    layout: &'l Layout<'l>,
    instant: &'i DateTime<Tz>,
}

impl<Tz: TimeZone> fmt::Display for Rendered<'_, '_, Tz>
where
    Tz::Offset: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in &self.layout.chunks {
            match chunk {
                Chunk::Literal(text) => f.write_str(text)?,
                Chunk::Element(element) => write_element(f, *element, self.instant)?,
            }
        }
        Ok(())
    }
}

fn starts_lower(tail: &[u8]) -> bool {
    tail.first().is_some_and(u8::is_ascii_lowercase)
}

/// Finds the first reference element in `layout`, returning the length of the
/// literal prefix before it, the element, and the element's length.
fn next_element(layout: &str) -> Option<(usize, Element, usize)> {
    let bytes = layout.as_bytes();
    for (i, &byte) in bytes.iter().enumerate() {
        let tail = &bytes[i..];
        let found = match byte {
            b'J' if tail.starts_with(b"January") => Some((Element::LongMonth, 7)),
            b'J' if tail.starts_with(b"Jan") && !starts_lower(&tail[3..]) => {
                Some((Element::Month, 3))
            }
            b'M' if tail.starts_with(b"Monday") => Some((Element::LongWeekDay, 6)),
            b'M' if tail.starts_with(b"Mon") && !starts_lower(&tail[3..]) => {
                Some((Element::WeekDay, 3))
            }
            b'M' if tail.starts_with(b"MST") => Some((Element::ZoneName, 3)),
            b'0' if tail.starts_with(b"002") => Some((Element::ZeroYearDay, 3)),
            b'0' => match tail.get(1) {
                Some(b'1') => Some((Element::ZeroMonth, 2)),
                Some(b'2') => Some((Element::ZeroDay, 2)),
                Some(b'3') => Some((Element::ZeroHour12, 2)),
                Some(b'4') => Some((Element::ZeroMinute, 2)),
                Some(b'5') => Some((Element::ZeroSecond, 2)),
                Some(b'6') => Some((Element::Year, 2)),
                _ => None,
            },
            b'1' if tail.starts_with(b"15") => Some((Element::Hour, 2)),
            b'1' => Some((Element::NumMonth, 1)),
            b'2' if tail.starts_with(b"2006") => Some((Element::LongYear, 4)),
            b'2' => Some((Element::Day, 1)),
            // "_2006" is a literal underscore followed by the year
            b'_' if tail.starts_with(b"_2006") => return Some((i + 1, Element::LongYear, 4)),
            b'_' if tail.starts_with(b"_2") => Some((Element::UnderDay, 2)),
            b'_' if tail.starts_with(b"__2") => Some((Element::UnderYearDay, 3)),
            b'3' => Some((Element::Hour12, 1)),
            b'4' => Some((Element::Minute, 1)),
            b'5' => Some((Element::Second, 1)),
            b'P' if tail.starts_with(b"PM") => Some((Element::UpperMeridiem, 2)),
            b'p' if tail.starts_with(b"pm") => Some((Element::LowerMeridiem, 2)),
            b'-' => zone(&tail[1..], false),
            b'Z' => zone(&tail[1..], true),
            b'.' | b',' => fraction(tail),
            _ => None,
        };
        if let Some((element, len)) = found {
            return Some((i, element, len));
        }
    }
    None
}

/// Offset element after the leading `-` or `Z`; the returned length counts it
fn zone(tail: &[u8], iso: bool) -> Option<(Element, usize)> {
    const STYLES: [(&[u8], ZoneStyle); 5] = [
        (b"070000", ZoneStyle::Full),
        (b"07:00:00", ZoneStyle::FullColon),
        (b"0700", ZoneStyle::HoursMinutes),
        (b"07:00", ZoneStyle::HoursColonMinutes),
        (b"07", ZoneStyle::Hours),
    ];
    STYLES
        .iter()
        .find(|(pattern, _)| tail.starts_with(pattern))
        .map(|&(pattern, style)| (Element::Zone { style, iso }, pattern.len() + 1))
}

/// `.000`, `,000`, `.999` or `,999` not followed by another digit
fn fraction(tail: &[u8]) -> Option<(Element, usize)> {
    let fill = *tail.get(1).filter(|&&b| b == b'0' || b == b'9')?;
    let run = tail[1..].iter().take_while(|&&b| b == fill).count();
    if tail.get(run + 1).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let element = Element::Fraction {
        separator: char::from(tail[0]),
        digits: run,
        trim: fill == b'9',
    };
    Some((element, run + 1))
}

fn write_element<W: Write, Tz: TimeZone>(
    out: &mut W,
    element: Element,
    instant: &DateTime<Tz>,
) -> fmt::Result
where
    Tz::Offset: fmt::Display,
{
    let (is_pm, hour12) = instant.hour12();
    match element {
        Element::LongMonth => write!(out, "{}", instant.format("%B")),
        Element::Month => write!(out, "{}", instant.format("%b")),
        Element::NumMonth => write!(out, "{}", instant.month()),
        Element::ZeroMonth => write!(out, "{:02}", instant.month()),
        Element::LongWeekDay => write!(out, "{}", instant.format("%A")),
        Element::WeekDay => write!(out, "{}", instant.format("%a")),
        Element::Day => write!(out, "{}", instant.day()),
        Element::UnderDay => write!(out, "{:>2}", instant.day()),
        Element::ZeroDay => write!(out, "{:02}", instant.day()),
        Element::UnderYearDay => write!(out, "{:>3}", instant.ordinal()),
        Element::ZeroYearDay => write!(out, "{:03}", instant.ordinal()),
        Element::Hour => write!(out, "{:02}", instant.hour()),
        Element::Hour12 => write!(out, "{hour12}"),
        Element::ZeroHour12 => write!(out, "{hour12:02}"),
        Element::Minute => write!(out, "{}", instant.minute()),
        Element::ZeroMinute => write!(out, "{:02}", instant.minute()),
        Element::Second => write!(out, "{}", instant.second()),
        Element::ZeroSecond => write!(out, "{:02}", instant.second()),
        Element::LongYear => write!(out, "{:04}", instant.year()),
        Element::Year => write!(out, "{:02}", instant.year().rem_euclid(100)),
        Element::UpperMeridiem => out.write_str(if is_pm { "PM" } else { "AM" }),
        Element::LowerMeridiem => out.write_str(if is_pm { "pm" } else { "am" }),
        Element::ZoneName => {
            let seconds = instant.offset().fix().local_minus_utc();
            if seconds == 0 {
                out.write_str("UTC")
            } else {
                write_offset(out, seconds, ZoneStyle::HoursMinutes)
            }
        }
        Element::Zone { style, iso } => {
            let seconds = instant.offset().fix().local_minus_utc();
            if iso && seconds == 0 {
                out.write_char('Z')
            } else {
                write_offset(out, seconds, style)
            }
        }
        Element::Fraction {
            separator,
            digits,
            trim,
        } => {
            let digits = digits.min(9);
            // leap seconds are carried as nanos >= 1e9
            let nanos = instant.nanosecond() % 1_000_000_000;
            let scaled = nanos / 10u32.pow(9 - u32::try_from(digits).unwrap_or(9));
            let text = format!("{scaled:0digits$}");
            let text = if trim { text.trim_end_matches('0') } else { &text };
            if text.is_empty() {
                return Ok(());
            }
            out.write_char(separator)?;
            out.write_str(text)
        }
    }
}

fn write_offset<W: Write>(out: &mut W, seconds: i32, style: ZoneStyle) -> fmt::Result {
    let sign = if seconds < 0 { '-' } else { '+' };
    let seconds = seconds.unsigned_abs();
    let (hours, minutes, secs) = (seconds / 3600, seconds / 60 % 60, seconds % 60);
    match style {
        ZoneStyle::Hours => write!(out, "{sign}{hours:02}"),
        ZoneStyle::HoursMinutes => write!(out, "{sign}{hours:02}{minutes:02}"),
        ZoneStyle::HoursColonMinutes => write!(out, "{sign}{hours:02}:{minutes:02}"),
        ZoneStyle::Full => write!(out, "{sign}{hours:02}{minutes:02}{secs:02}"),
        ZoneStyle::FullColon => write!(out, "{sign}{hours:02}:{minutes:02}:{secs:02}"),
    }
}
