use crate::error::FormatError;
use crate::record::{Record, flatten, flatten_serialize};
use crate::scanner::{Alignment, Scanner, Selector, SelectorMode, SyntaxError};
use crate::timefmt::reformat;
use log::{debug, trace};
use serde::Serialize;
use std::borrow::{Borrow, Cow};
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::ops::Range;

/// Supplies raw values to the engine.
///
/// The resolver also fixes the selector mode for the whole expansion: a
/// positional resolver only accepts `{0}`-style placeholders and a named one
/// only accepts `{Key}`-style placeholders.
pub trait Resolver {
    fn mode(&self) -> SelectorMode;

    /// Number of values available
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn resolve(&self, selector: &Selector<'_>) -> Option<&str>;
}

/// Values addressed by position
#[derive(Debug, Clone, Copy)]
pub struct Positional<'a, S>(pub &'a [S]);

impl<S: AsRef<str>> Resolver for Positional<'_, S> {
    fn mode(&self) -> SelectorMode {
        SelectorMode::Index
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn resolve(&self, selector: &Selector<'_>) -> Option<&str> {
        match selector {
            Selector::Index(index) => self.0.get(*index).map(AsRef::as_ref),
            Selector::Key(_) => None,
        }
    }
}

/// Values addressed by key
#[derive(Debug, Clone, Copy)]
pub struct Named<'a, K, V, H>(pub &'a HashMap<K, V, H>);

impl<K, V, H> Resolver for Named<'_, K, V, H>
where
    K: Borrow<str> + Hash + Eq,
    V: AsRef<str>,
    H: BuildHasher,
{
    fn mode(&self) -> SelectorMode {
        SelectorMode::Key
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn resolve(&self, selector: &Selector<'_>) -> Option<&str> {
        match selector {
            Selector::Key(key) => self.0.get(*key).map(AsRef::as_ref),
            Selector::Index(_) => None,
        }
    }
}

/// One placeholder found by [`parse_placeholders`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placeholder<'t> {
    pub selector: Selector<'t>,
    pub alignment: Alignment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_format: Option<String>,
    /// Byte range of the placeholder, braces included
    pub span: Range<usize>,
}

/// Lists every placeholder in `template` without resolving any value.
///
/// # Errors
///
/// Returns the first syntax error (`UnbalancedBrace`, `TruncatedPlaceholder`,
/// `MalformedSelector` or `MalformedPlaceholder`).
pub fn parse_placeholders(
    template: &str,
    mode: SelectorMode,
) -> Result<Vec<Placeholder<'_>>, FormatError> {
    let mut scanner = Scanner::new(template);
    let mut sink = String::new();
    let mut placeholders = Vec::new();

    let mut scan = || -> Result<(), SyntaxError> {
        while scanner.literal(&mut sink)? {
            let start = scanner.position();
            let selector = scanner.selector(mode)?;
            let spec = scanner.spec()?;
            placeholders.push(Placeholder {
                selector,
                alignment: spec.alignment,
                time_format: spec.time_format,
                span: start..scanner.position(),
            });
        }
        Ok(())
    };

    scan().map_err(|err| err.into_format_error(template))?;
    Ok(placeholders)
}

/// Expands `template` with values from `resolver`.
///
/// An empty template is returned as is. With no values at all, escaped braces
/// are still unescaped, but a template holding real placeholders (or broken
/// syntax) comes back unchanged rather than failing.
///
/// # Errors
///
/// Any malformed placeholder or unresolvable selector aborts the expansion;
/// see [`FormatError`] for the variants. The error carries the original
/// template.
pub fn expand<R: Resolver + ?Sized>(template: &str, resolver: &R) -> Result<String, FormatError> {
    if template.is_empty() {
        return Ok(String::new());
    }
    if resolver.is_empty() {
        return Ok(unescape(template).unwrap_or_else(|| template.to_string()));
    }

    let mut out = String::with_capacity(template.len());
    let mut scanner = Scanner::new(template);
    let result = substitute(template, &mut scanner, resolver, &mut out);
    match result {
        Ok(()) => Ok(out),
        Err(err) => {
            debug!("expansion failed: {err}");
            Err(err)
        }
    }
}

/// Literal text with escapes removed, or `None` if the template has any
/// placeholder or brace error
fn unescape(template: &str) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    match Scanner::new(template).literal(&mut out) {
        Ok(false) => Some(out),
        _ => None,
    }
}

fn substitute<R: Resolver + ?Sized>(
    template: &str,
    scanner: &mut Scanner<'_>,
    resolver: &R,
    out: &mut String,
) -> Result<(), FormatError> {
    let syntax = |err: SyntaxError| err.into_format_error(template);

    while scanner.literal(out).map_err(syntax)? {
        let start = scanner.position();
        let selector = scanner.selector(resolver.mode()).map_err(syntax)?;
        let value = resolver
            .resolve(&selector)
            .ok_or_else(|| missing(template, &selector, resolver.len()))?;
        let spec = scanner.spec().map_err(syntax)?;
        trace!(
            "placeholder {selector:?} at {start}..{} -> {value:?}",
            scanner.position()
        );

        let value = match spec.time_format.as_deref() {
            Some(layout) if !layout.is_empty() => {
                Cow::Owned(reformat(value, layout).ok_or_else(|| {
                    FormatError::InvalidTimeValue {
                        template: template.to_string(),
                        value: value.to_string(),
                        time_format: layout.to_string(),
                    }
                })?)
            }
            _ => Cow::Borrowed(value),
        };

        pad(out, &value, spec.alignment);
    }
    Ok(())
}

fn missing(template: &str, selector: &Selector<'_>, len: usize) -> FormatError {
    match *selector {
        Selector::Index(index) => FormatError::IndexOutOfRange {
            template: template.to_string(),
            index,
            len,
        },
        Selector::Key(key) => FormatError::KeyNotFound {
            template: template.to_string(),
            key: key.to_string(),
        },
    }
}

/// Appends `value` padded to the alignment width.
///
/// A short value gets `width - len + 1` spaces, one more than the gap.
fn pad(out: &mut String, value: &str, alignment: Alignment) {
    let gap = alignment.width.saturating_sub(value.len());
    let fill = if gap > 0 { gap + 1 } else { 0 };

    if !alignment.left_justify {
        out.extend(std::iter::repeat_n(' ', fill));
    }
    out.push_str(value);
    if alignment.left_justify {
        out.extend(std::iter::repeat_n(' ', fill));
    }
}

/// Expands positional placeholders (`{0}`, `{1,-8}`, ...).
///
/// # Errors
///
/// See [`expand`].
pub fn expand_indexed<S: AsRef<str>>(template: &str, values: &[S]) -> Result<String, FormatError> {
    expand(template, &Positional(values))
}

/// Expands named placeholders (`{Name}`, `{When:2006-01-02}`, ...).
///
/// # Errors
///
/// See [`expand`].
pub fn expand_named<K, V, H>(
    template: &str,
    values: &HashMap<K, V, H>,
) -> Result<String, FormatError>
where
    K: Borrow<str> + Hash + Eq,
    V: AsRef<str>,
    H: BuildHasher,
{
    expand(template, &Named(values))
}

/// Flattens `record` and expands named placeholders against it.
///
/// # Errors
///
/// See [`expand`].
pub fn expand_record<R: Record + ?Sized>(template: &str, record: &R) -> Result<String, FormatError> {
    expand_named(template, &flatten(record))
}

/// Serializes `value`, flattens it and expands named placeholders against it.
///
/// # Errors
///
/// See [`expand`].
pub fn expand_serialize<T: Serialize + ?Sized>(
    template: &str,
    value: &T,
) -> Result<String, FormatError> {
    expand_named(template, &flatten_serialize(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::record::Field;
    use crate::timefmt::to_reference;
    use chrono::{DateTime, FixedOffset, TimeZone, Utc};
    use std::collections::BTreeMap;

    const REFERENCE: &str = "Mon, 02 Jan 2006 15:04:05 -0700";

    fn kind<T: std::fmt::Debug>(result: Result<T, FormatError>) -> ErrorKind {
        result.unwrap_err().kind()
    }

    #[test]
    fn test_positional_substitution() {
        assert_eq!(
            expand_indexed("Today is a {0} day", &["wonderful"]).unwrap(),
            "Today is a wonderful day"
        );
        assert_eq!(
            expand_indexed("{1}-{0}-{1}", &["a".to_string(), "b".to_string()]).unwrap(),
            "b-a-b"
        );
        assert_eq!(
            expand_indexed("{0 }", &["spaced"]).unwrap(),
            "spaced"
        );
    }

    #[test]
    fn test_identity_on_empty_inputs() {
        let none: [&str; 0] = [];
        assert_eq!(expand_indexed("", &["x"]).unwrap(), "");
        assert_eq!(expand_indexed("", &none).unwrap(), "");
        assert_eq!(expand_indexed("{0} stays", &none).unwrap(), "{0} stays");
        assert_eq!(expand_indexed("} broken {", &none).unwrap(), "} broken {");

        let empty: HashMap<String, String> = HashMap::new();
        assert_eq!(expand_named("{Key} stays", &empty).unwrap(), "{Key} stays");
        assert_eq!(expand_named("", &empty).unwrap(), "");
    }

    #[test]
    fn test_escapes() {
        let none: [&str; 0] = [];
        assert_eq!(expand_indexed("a{{b}}c", &none).unwrap(), "a{b}c");
        assert_eq!(expand_indexed("{{{0}}}", &["x"]).unwrap(), "{x}");

        // the same template and values give the same text every time
        let template = "{{literal}} and }} only";
        let first = expand_indexed(template, &["v"]).unwrap();
        let second = expand_indexed(template, &["v"]).unwrap();
        assert_eq!(first, "{literal} and } only");
        assert_eq!(first, second);
    }

    // Padding adds one space more than the gap between width and value
    // length. Kept for output compatibility with existing templates.
    #[test]
    fn test_padding_keeps_extra_space() {
        assert_eq!(
            expand_indexed("X{0,-6}Y", &["ab"]).unwrap(),
            format!("Xab{}Y", " ".repeat(5))
        );
        assert_eq!(
            expand_indexed("X{0,6}Y", &["ab"]).unwrap(),
            format!("X{}abY", " ".repeat(5))
        );
        assert_eq!(
            expand_indexed("Today is a {0,20} day", &["wonderful"]).unwrap(),
            format!("Today is a {}wonderful day", " ".repeat(12))
        );
    }

    #[test]
    fn test_padding_not_applied_when_value_fills_width() {
        assert_eq!(expand_indexed("[{0,2}]", &["ab"]).unwrap(), "[ab]");
        assert_eq!(expand_indexed("[{0,-1}]", &["abc"]).unwrap(), "[abc]");
        assert_eq!(expand_indexed("[{0,0}]", &["abc"]).unwrap(), "[abc]");
        assert_eq!(expand_indexed("[{0 , -4 }]", &["abc"]).unwrap(), "[abc  ]");
    }

    #[test]
    fn test_index_out_of_range() {
        let err = expand_indexed("{1}", &["only-one"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
        assert_eq!(err.template(), "{1}");
        assert_eq!(
            err,
            FormatError::IndexOutOfRange {
                template: "{1}".to_string(),
                index: 1,
                len: 1
            }
        );

        // capped index is still checked against the list
        assert_eq!(
            kind(expand_indexed("{99999}", &["a"])),
            ErrorKind::IndexOutOfRange
        );
    }

    #[test]
    fn test_missing_key() {
        let values = HashMap::from([("present".to_string(), "x".to_string())]);
        let err = expand_named("{missing}", &values).unwrap_err();
        assert_eq!(
            err,
            FormatError::KeyNotFound {
                template: "{missing}".to_string(),
                key: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_brace_errors() {
        let values = ["wonderful"];
        assert_eq!(
            kind(expand_indexed("{ open", &values)),
            ErrorKind::MalformedSelector
        );
        assert_eq!(
            kind(expand_indexed("stray } brace", &values)),
            ErrorKind::UnbalancedBrace
        );
        assert_eq!(
            kind(expand_indexed("Today is {} Day", &values)),
            ErrorKind::MalformedSelector
        );
        assert_eq!(
            kind(expand_indexed("Today is {0, Day", &values)),
            ErrorKind::MalformedPlaceholder
        );
        assert_eq!(
            kind(expand_indexed("Today is {", &values)),
            ErrorKind::TruncatedPlaceholder
        );
        assert_eq!(
            kind(expand_indexed("Today is {0", &values)),
            ErrorKind::TruncatedPlaceholder
        );
        assert_eq!(
            kind(expand_indexed("{0:2006", &values)),
            ErrorKind::TruncatedPlaceholder
        );
    }

    #[test]
    fn test_mode_is_fixed_by_entry_point() {
        let values = HashMap::from([("a", "1")]);
        assert_eq!(
            kind(expand_named("{0}", &values)),
            ErrorKind::MalformedSelector
        );
        assert_eq!(
            kind(expand_indexed("{a}", &["1"])),
            ErrorKind::MalformedSelector
        );
    }

    #[test]
    fn test_error_returns_original_template() {
        let template = "prefix {0} then {3}";
        let err = expand_indexed(template, &["a"]).unwrap_err();
        assert_eq!(err.into_template(), template);
    }

    #[test]
    fn test_named_substitution() {
        let values = HashMap::from([
            ("year", "2024"),
            ("month", "3"),
            ("DayofWeek2", "Friday"),
        ]);
        assert_eq!(
            expand_named("{year}-{month} on {DayofWeek2,-8}!", &values).unwrap(),
            format!("2024-3 on Friday{}!", " ".repeat(3))
        );
    }

    #[test]
    fn test_time_format() {
        assert_eq!(
            expand_indexed("{0:2006-01-02}", &[REFERENCE]).unwrap(),
            "2006-01-02"
        );
        assert_eq!(
            expand_indexed("Current Time is {0:2006-01-02 15:04:05 Mon}", &[REFERENCE]).unwrap(),
            "Current Time is 2006-01-02 15:04:05 Mon"
        );
        assert_eq!(
            expand_indexed("{0:3:04PM}", &[REFERENCE]).unwrap(),
            "3:04PM"
        );
        assert_eq!(
            expand_indexed("{0,12:2006}|", &[REFERENCE]).unwrap(),
            format!("{}2006|", " ".repeat(9))
        );
        assert_eq!(
            expand_indexed("{0:{{2006}}}", &[REFERENCE]).unwrap(),
            "{2006}"
        );

        let values = HashMap::from([("day", REFERENCE)]);
        assert_eq!(
            expand_named("{day:Jan _2}", &values).unwrap(),
            "Jan  2"
        );
    }

    #[test]
    fn test_time_format_passthrough_cases() {
        // unknown layout text renders verbatim, an empty spec leaves the value alone
        assert_eq!(expand_indexed("{0:yyyy-mm}", &[REFERENCE]).unwrap(), "yyyy-mm");
        assert_eq!(expand_indexed("{0:}", &[REFERENCE]).unwrap(), REFERENCE);
    }

    #[test]
    fn test_invalid_time_value() {
        let err = expand_indexed("when: {0:2006-01-02}", &["yesterday"]).unwrap_err();
        assert_eq!(
            err,
            FormatError::InvalidTimeValue {
                template: "when: {0:2006-01-02}".to_string(),
                value: "yesterday".to_string(),
                time_format: "2006-01-02".to_string(),
            }
        );

        for value in [
            "Mon, 2 Jan 2006 15:04:05 -0700",
            "Mon, 02 Jan 2006 15:04:05 -07:00",
        ] {
            let err = expand_indexed("{0:2006-01-02}", &[value]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidTimeValue, "value {value:?}");
        }
    }

    #[test]
    fn test_time_value_weekday_not_checked() {
        let text = expand_indexed("{0:2006-01-02}", &["Tue, 02 Jan 2006 15:04:05 -0700"]).unwrap();
        assert_eq!(text, "2006-01-02");
    }

    #[test]
    fn test_custom_resolver() {
        struct Upper(BTreeMap<&'static str, &'static str>);

        impl Resolver for Upper {
            fn mode(&self) -> SelectorMode {
                SelectorMode::Key
            }

            fn len(&self) -> usize {
                self.0.len()
            }

            fn resolve(&self, selector: &Selector<'_>) -> Option<&str> {
                match selector {
                    Selector::Key(key) => self.0.get(key.to_ascii_lowercase().as_str()).copied(),
                    Selector::Index(_) => None,
                }
            }
        }

        let resolver = Upper(BTreeMap::from([("name", "Ada")]));
        assert_eq!(expand("Hi {NAME}", &resolver).unwrap(), "Hi Ada");
    }

    struct People {
        id: String,
        name: String,
        age: i32,
        birthday: DateTime<FixedOffset>,
    }

    impl Record for People {
        fn fields(&self) -> Vec<Field<'_>> {
            vec![
                Field::new("Id", &self.id),
                Field::new("Name", &self.name),
                Field::new("Age", &self.age),
                Field::new("BirthDay", &self.birthday),
            ]
        }
    }

    struct Student {
        info: Box<People>,
        is_graduate: bool,
    }

    impl Record for Student {
        fn fields(&self) -> Vec<Field<'_>> {
            vec![
                Field::nested("Info", &self.info),
                Field::new("IsGraduate", &self.is_graduate),
            ]
        }
    }

    fn donald() -> People {
        People {
            id: "1001".to_string(),
            name: "Donald".to_string(),
            age: 51,
            birthday: FixedOffset::east_opt(3600)
                .unwrap()
                .with_ymd_and_hms(1970, 1, 1, 1, 1, 1)
                .unwrap(),
        }
    }

    #[test]
    fn test_expand_record() {
        let text = expand_record(
            "[{Id}]-People Info:name-[{Name}],age-[{Age}],birthday-[{BirthDay:2006/01/02}]",
            &donald(),
        )
        .unwrap();
        assert_eq!(
            text,
            "[1001]-People Info:name-[Donald],age-[51],birthday-[1970/01/01]"
        );
    }

    #[test]
    fn test_expand_nested_record() {
        let student = Student {
            info: Box::new(donald()),
            is_graduate: true,
        };
        let text = expand_record(
            "[{Id}]-Student Info:name-[{Name}],birthday-[{BirthDay}],is graduate-[{IsGraduate}]",
            &student,
        )
        .unwrap();
        assert_eq!(
            text,
            "[1001]-Student Info:name-[Donald],birthday-[Thu, 01 Jan 1970 01:01:01 +0100],is graduate-[true]"
        );
    }

    #[test]
    fn test_expand_record_missing_field() {
        assert_eq!(
            kind(expand_record("{Nickname}", &donald())),
            ErrorKind::KeyNotFound
        );
    }

    #[test]
    fn test_expand_absent_record_returns_template() {
        let nobody: Option<People> = None;
        assert_eq!(expand_record("{Name}", &nobody).unwrap(), "{Name}");
    }

    #[test]
    fn test_expand_serialize() {
        #[derive(Serialize)]
        struct Event {
            title: &'static str,
            at: String,
            seats: u32,
        }

        let at = Utc.with_ymd_and_hms(2024, 5, 17, 18, 30, 0).unwrap();
        let event = Event {
            title: "Launch",
            at: to_reference(&at),
            seats: 40,
        };
        assert_eq!(
            expand_serialize("{title,-8}|{at:Mon 15:04}|{seats,3}", &event).unwrap(),
            format!("Launch{}|Fri 18:30|{}40", " ".repeat(3), " ".repeat(2))
        );
        assert_eq!(expand_serialize("{title}", &17).unwrap(), "{title}");
    }

    #[test]
    fn test_parse_placeholders() {
        let placeholders =
            parse_placeholders("a {0} b {12,-3:15:04} {{c}}", SelectorMode::Index).unwrap();
        assert_eq!(placeholders.len(), 2);
        assert_eq!(placeholders[0].selector, Selector::Index(0));
        assert_eq!(placeholders[0].span, 2..5);
        assert_eq!(placeholders[1].selector, Selector::Index(12));
        assert_eq!(
            placeholders[1].alignment,
            Alignment {
                width: 3,
                left_justify: true
            }
        );
        assert_eq!(placeholders[1].time_format.as_deref(), Some("15:04"));
        assert_eq!(placeholders[1].span, 8..21);

        let named = parse_placeholders("{Name} {Age,4}", SelectorMode::Key).unwrap();
        assert_eq!(named[1].selector, Selector::Key("Age"));

        let err = parse_placeholders("bad }", SelectorMode::Key).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnbalancedBrace);
    }
}
