//! Byte cursor over a template and the placeholder sub-grammars.
//!
//! The scanner only knows syntax. Value lookup, time rendering and padding
//! live in [`crate::template`], which drives the scanner one phase at a time so
//! that a selector can be resolved before the rest of its placeholder is read.

use crate::error::FormatError;
use serde::Serialize;

/// Upper bound for both positional indices and alignment widths.
///
/// Digit accumulation stops as soon as the value reaches the cap, so `{2550}`
/// reads index 255 and leaves the trailing `0` for the next phase.
pub const MAX_NUMBER: usize = 255;

/// How selectors are read for a whole expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorMode {
    /// `{0}`, `{1}`, ... resolved by position
    Index,
    /// `{Name}` resolved by key
    Key,
}

/// Identifies the value a placeholder substitutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Selector<'t> {
    Index(usize),
    Key(&'t str),
}

/// Padding requested by a `,[-]width` clause
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Alignment {
    pub width: usize,
    /// Value first, spaces after. Otherwise spaces first.
    pub left_justify: bool,
}

/// Everything after the selector up to and including the closing `}`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderSpec {
    pub alignment: Alignment,
    /// Raw time-format spec with its `{{`/`}}` escapes already removed
    pub time_format: Option<String>,
}

/// Syntax failure with the byte offset it was detected at.
///
/// Turned into a [`FormatError`] once the caller attaches the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxError {
    UnbalancedBrace(usize),
    TruncatedPlaceholder(usize),
    MalformedSelector(usize),
    MalformedPlaceholder(usize),
}

impl SyntaxError {
    #[must_use]
    pub fn into_format_error(self, template: &str) -> FormatError {
        let template = template.to_string();
        match self {
            Self::UnbalancedBrace(position) => FormatError::UnbalancedBrace { template, position },
            Self::TruncatedPlaceholder(position) => {
                FormatError::TruncatedPlaceholder { template, position }
            }
            Self::MalformedSelector(position) => {
                FormatError::MalformedSelector { template, position }
            }
            Self::MalformedPlaceholder(position) => {
                FormatError::MalformedPlaceholder { template, position }
            }
        }
    }
}

type ScanResult<T> = std::result::Result<T, SyntaxError>;

/// Cursor over one template. One instance per expansion, never shared.
#[derive(Debug)]
pub struct Scanner<'t> {
    source: &'t str,
    pos: usize,
    /// Offset of the `{` that opened the placeholder being read
    open: usize,
}

impl<'t> Scanner<'t> {
    #[must_use]
    pub const fn new(source: &'t str) -> Self {
        Self {
            source,
            pos: 0,
            open: 0,
        }
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.source.as_bytes().get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.source.as_bytes().get(self.pos + 1).copied()
    }

    pub fn advance(&mut self) {
        if !self.at_end() {
            self.pos += 1;
        }
    }

    /// Byte at the cursor, or a truncation error naming the open placeholder
    fn require(&self) -> ScanResult<u8> {
        self.peek()
            .ok_or(SyntaxError::TruncatedPlaceholder(self.open))
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.advance();
        }
    }

    /// Copies literal text into `out`, unescaping `{{` and `}}`.
    ///
    /// Returns `true` with the cursor on the `{` of a placeholder, or `false`
    /// once the whole template has been consumed.
    ///
    /// # Errors
    ///
    /// - `SyntaxError::UnbalancedBrace` for a lone `}`.
    /// - `SyntaxError::TruncatedPlaceholder` when `{` is the final byte.
    pub fn literal(&mut self, out: &mut String) -> ScanResult<bool> {
        let mut start = self.pos;
        while let Some(byte) = self.peek() {
            match byte {
                b'{' | b'}' if self.peek_next() == Some(byte) => {
                    // keep the first brace, drop its twin
                    out.push_str(&self.source[start..=self.pos]);
                    self.pos += 2;
                    start = self.pos;
                }
                b'}' => return Err(SyntaxError::UnbalancedBrace(self.pos)),
                b'{' => {
                    out.push_str(&self.source[start..self.pos]);
                    self.open = self.pos;
                    if self.peek_next().is_none() {
                        return Err(SyntaxError::TruncatedPlaceholder(self.pos));
                    }
                    return Ok(true);
                }
                _ => self.advance(),
            }
        }
        out.push_str(&self.source[start..]);
        Ok(false)
    }

    /// Reads the selector right after `{` and the spaces that follow it.
    ///
    /// # Errors
    ///
    /// - `SyntaxError::MalformedSelector` if the first byte doesn't fit `mode`.
    /// - `SyntaxError::TruncatedPlaceholder` if the template ends here.
    pub fn selector(&mut self, mode: SelectorMode) -> ScanResult<Selector<'t>> {
        // step over '{'
        self.pos = self.open + 1;
        let first = self.require()?;
        let selector = match mode {
            SelectorMode::Index if first.is_ascii_digit() => Selector::Index(self.number()?),
            SelectorMode::Key if first.is_ascii_alphabetic() => {
                let start = self.pos;
                while self.peek().is_some_and(|b| b.is_ascii_alphanumeric()) {
                    self.advance();
                }
                Selector::Key(&self.source[start..self.pos])
            }
            _ => return Err(SyntaxError::MalformedSelector(self.pos)),
        };
        self.require()?;
        self.skip_spaces();
        Ok(selector)
    }

    /// Accumulates ASCII digits, stopping at the first non-digit or once the
    /// value reaches [`MAX_NUMBER`]
    fn number(&mut self) -> ScanResult<usize> {
        let mut value = 0usize;
        while let Some(digit) = self.peek().filter(u8::is_ascii_digit) {
            value = (value * 10 + usize::from(digit - b'0')).min(MAX_NUMBER);
            self.advance();
            self.require()?;
            if value >= MAX_NUMBER {
                break;
            }
        }
        Ok(value)
    }

    /// Reads the optional alignment and time-format clauses plus the closing
    /// brace, leaving the cursor just past the placeholder.
    ///
    /// # Errors
    ///
    /// - `SyntaxError::MalformedPlaceholder` for anything out of grammar.
    /// - `SyntaxError::TruncatedPlaceholder` if the template ends first.
    pub fn spec(&mut self) -> ScanResult<PlaceholderSpec> {
        let mut spec = PlaceholderSpec::default();

        if self.require()? == b',' {
            self.advance();
            self.skip_spaces();
            if self.require()? == b'-' {
                spec.alignment.left_justify = true;
                self.advance();
            }
            if !self.require()?.is_ascii_digit() {
                return Err(SyntaxError::MalformedPlaceholder(self.pos));
            }
            spec.alignment.width = self.number()?;
            self.skip_spaces();
        }

        if self.require()? == b':' {
            self.advance();
            spec.time_format = Some(self.time_format()?);
        }

        if self.require()? != b'}' {
            return Err(SyntaxError::MalformedPlaceholder(self.pos));
        }
        self.advance();
        Ok(spec)
    }

    /// Raw bytes up to the unescaped `}`, which is left under the cursor
    fn time_format(&mut self) -> ScanResult<String> {
        let mut raw = String::new();
        let mut start = self.pos;
        loop {
            let byte = self.require()?;
            match byte {
                b'{' | b'}' if self.peek_next() == Some(byte) => {
                    raw.push_str(&self.source[start..=self.pos]);
                    self.pos += 2;
                    start = self.pos;
                }
                b'{' => return Err(SyntaxError::MalformedPlaceholder(self.pos)),
                b'}' => {
                    raw.push_str(&self.source[start..self.pos]);
                    return Ok(raw);
                }
                _ => self.advance(),
            }
        }
    }
}
