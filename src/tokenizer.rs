//! Line splitting and field access for the delimited flat-file formats.
//!
//! All accessors are total: a missing field reads as `""`, a field that
//! fails numeric conversion reads as `None` (or the type's zero through the
//! `*_or_zero` helpers). Record parsers decide on their own whether a
//! partially populated record is still usable.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};

/// One split line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fields<'a> {
    fields: Vec<&'a str>,
}

impl<'a> Fields<'a> {
    pub fn split(line: &'a str, delimiter: char) -> Self {
        Self {
            fields: line.split(delimiter).collect(),
        }
    }

    /// Splits on runs of whitespace, as used by the X-Plane nav data files.
    pub fn split_whitespace(line: &'a str) -> Self {
        Self {
            fields: line.split_whitespace().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Raw field, `""` when out of range.
    pub fn get(&self, index: usize) -> &'a str {
        self.fields.get(index).copied().unwrap_or("")
    }

    /// Trimmed field, `""` when out of range.
    pub fn trimmed(&self, index: usize) -> &'a str {
        self.get(index).trim()
    }

    pub fn string(&self, index: usize) -> String {
        self.trimmed(index).to_string()
    }

    pub fn parse<T: FromStr>(&self, index: usize) -> Option<T> {
        self.trimmed(index).parse().ok()
    }

    pub fn f64_or_zero(&self, index: usize) -> f64 {
        self.parse(index).unwrap_or(0.)
    }

    pub fn i32_or_zero(&self, index: usize) -> i32 {
        // some feeds send "350.0" style integers
        self.parse::<i32>(index)
            .or_else(|| self.parse::<f64>(index).map(|f| f as i32))
            .unwrap_or(0)
    }

    pub fn timestamp(&self, index: usize) -> Option<DateTime<Utc>> {
        parse_timestamp(self.trimmed(index))
    }

    /// Everything from `index` on, joined with `delimiter` again.
    pub fn rest(&self, index: usize, delimiter: &str) -> String {
        self.fields
            .get(index..)
            .map(|rest| rest.join(delimiter))
            .unwrap_or_default()
    }
}

/// Parses the compact `YYYYMMDDhhmmss` UTC timestamps used across the feeds.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Content lines: trimmed of line endings, skipping blank lines and `;` comments.
pub fn lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with(';')
        })
}
