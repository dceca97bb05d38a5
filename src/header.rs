//! Fixed-width WEPP text tokenizing and preamble detection.
//!
//! WEPP output files open with a title, column names, units, and separator
//! lines, followed by whitespace-separated numeric rows. This module finds
//! where the data starts, splits sentinel runs glued to neighbouring numbers,
//! and normalizes every missing-value spelling to `None` so parsers never
//! see strings where numbers are expected.

use crate::config::SentinelSet;
use crate::error::{InterchangeError, Result};
use crate::models::Value;
use std::path::Path;
use tracing::{debug, warn};

/// File processing boundaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBoundaries {
    /// Lines before the first data row
    pub skip_rows: usize,
    /// Data rows parsed
    pub data_rows: usize,
    pub total_lines: usize,
}

/// Expected shape of a simple fixed-column table
#[derive(Debug, Clone, Copy)]
pub struct TableLayout {
    /// Tokens per data row
    pub columns: usize,
    /// Header lines that must precede the data
    pub min_header_lines: usize,
}

impl TableLayout {
    pub const fn new(columns: usize, min_header_lines: usize) -> Self {
        Self {
            columns,
            min_header_lines,
        }
    }
}

/// A data row with every token resolved to a number or `None`
#[derive(Debug, Clone, PartialEq)]
pub struct NumericLine {
    /// 1-based line number in the source file
    pub line_no: usize,
    pub values: Vec<Option<f64>>,
}

impl NumericLine {
    pub fn float(&self, idx: usize) -> Option<f64> {
        self.values.get(idx).copied().flatten()
    }

    pub fn value(&self, idx: usize) -> Value {
        self.float(idx).into()
    }

    /// Values `start..start + count` as cells
    pub fn values_from(&self, start: usize, count: usize) -> impl Iterator<Item = Value> + '_ {
        (start..start + count).map(|idx| self.value(idx))
    }

    /// Integer token; missing or fractional values are malformed input
    pub fn int(&self, idx: usize, path: &Path) -> Result<i32> {
        let value = self.float(idx).ok_or_else(|| {
            InterchangeError::malformed(
                path,
                self.line_no,
                format!("missing integer in column {}", idx + 1),
            )
        })?;
        as_int(value).ok_or_else(|| {
            InterchangeError::malformed(
                path,
                self.line_no,
                format!("expected integer in column {}, found {}", idx + 1, value),
            )
        })
    }
}

pub(crate) fn as_int(value: f64) -> Option<i32> {
    (value.fract() == 0.0 && value >= i32::MIN as f64 && value <= i32::MAX as f64)
        .then_some(value as i32)
}

/// Read a raw text product; WEPP output is ASCII but tolerate stray bytes
pub fn read_source(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// True for lines made only of `-` / `=` characters
pub fn is_separator(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c == '-' || c == '=')
}

/// Whitespace tokenizer that also splits `*` runs from adjacent digits
///
/// Fixed-width Fortran output overflows a field with `*`s and can leave
/// no blank between that run and the next value (`0.25******12.0`).
pub fn split_tokens(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for token in line.split_whitespace() {
        if !token.contains('*') || token.chars().all(|c| c == '*') {
            tokens.push(token);
            continue;
        }
        let mut start = 0;
        let mut in_stars = token.starts_with('*');
        for (i, c) in token.char_indices() {
            let star = c == '*';
            if star != in_stars {
                tokens.push(&token[start..i]);
                start = i;
                in_stars = star;
            }
        }
        tokens.push(&token[start..]);
    }
    tokens
}

/// Parse a numeric token: `Ok(None)` for sentinels, `Err` for garbage
pub(crate) fn parse_number(
    token: &str,
    sentinels: &SentinelSet,
) -> std::result::Result<Option<f64>, ()> {
    if sentinels.is_missing(token) {
        return Ok(None);
    }
    if let Ok(value) = token.parse::<f64>() {
        return Ok(Some(value));
    }
    fortran_exponent(token).map(Some).ok_or(())
}

/// Fortran drops the `E` for three-digit exponents: `0.123-105`
fn fortran_exponent(token: &str) -> Option<f64> {
    let pos = token.rfind(['+', '-'])?;
    if pos == 0 || !token.as_bytes()[pos - 1].is_ascii_digit() {
        return None;
    }
    format!("{}E{}", &token[..pos], &token[pos..]).parse().ok()
}

/// Tokenize a line into numbers, or `None` if any token is not numeric
pub fn numeric_tokens(line: &str, sentinels: &SentinelSet) -> Option<Vec<Option<f64>>> {
    split_tokens(line)
        .into_iter()
        .map(|t| parse_number(t, sentinels).ok())
        .collect()
}

/// Parse a line that must be numeric
pub fn parse_numeric_line(
    path: &Path,
    line_no: usize,
    line: &str,
    sentinels: &SentinelSet,
) -> Result<NumericLine> {
    let values = numeric_tokens(line, sentinels).ok_or_else(|| {
        InterchangeError::malformed(
            path,
            line_no,
            format!("non-numeric token in '{}'", line.trim()),
        )
    })?;
    Ok(NumericLine { line_no, values })
}

fn looks_like_data(values: &[Option<f64>], columns: usize) -> bool {
    values.len() == columns && values.first().copied().flatten().and_then(as_int).is_some()
}

/// Locate the data rows of a fixed-column table and parse them
///
/// Header lines are everything before the first line with exactly
/// `layout.columns` numeric tokens led by an integer. After that every
/// non-blank, non-separator line must be a full data row.
pub fn read_table(
    path: &Path,
    text: &str,
    layout: TableLayout,
    sentinels: &SentinelSet,
) -> Result<(DataBoundaries, Vec<NumericLine>)> {
    let lines: Vec<&str> = text.lines().collect();
    let total_lines = lines.len();

    if text.trim().is_empty() {
        warn!("Empty input file: {}", path.display());
        return Ok((
            DataBoundaries {
                skip_rows: 0,
                data_rows: 0,
                total_lines,
            },
            Vec::new(),
        ));
    }

    let start = lines.iter().position(|line| {
        numeric_tokens(line, sentinels)
            .is_some_and(|values| looks_like_data(&values, layout.columns))
    });

    let Some(skip_rows) = start else {
        debug!("No data rows in {}", path.display());
        return Ok((
            DataBoundaries {
                skip_rows: total_lines,
                data_rows: 0,
                total_lines,
            },
            Vec::new(),
        ));
    };

    if skip_rows < layout.min_header_lines {
        return Err(InterchangeError::malformed(
            path,
            skip_rows + 1,
            format!(
                "expected at least {} header lines before data, found {}",
                layout.min_header_lines, skip_rows
            ),
        ));
    }

    let mut rows = Vec::new();
    for (idx, line) in lines.iter().enumerate().skip(skip_rows) {
        if line.trim().is_empty() || is_separator(line) {
            continue;
        }
        let row = parse_numeric_line(path, idx + 1, line, sentinels)?;
        if row.values.len() != layout.columns {
            return Err(InterchangeError::malformed(
                path,
                idx + 1,
                format!("expected {} columns, found {}", layout.columns, row.values.len()),
            ));
        }
        rows.push(row);
    }

    let boundaries = DataBoundaries {
        skip_rows,
        data_rows: rows.len(),
        total_lines,
    };
    debug!(
        "Parsed table in {}: skip_rows={}, data_rows={}",
        path.display(),
        boundaries.skip_rows,
        boundaries.data_rows
    );
    Ok((boundaries, rows))
}

/// Rows of an embedded table inside a larger report
///
/// The table body starts after the first separator at or after `from` and
/// ends at the first blank line. Returns the rows and the index of the
/// line after the table.
pub fn read_block(
    path: &Path,
    lines: &[&str],
    from: usize,
    columns: usize,
    sentinels: &SentinelSet,
) -> Result<(Vec<NumericLine>, usize)> {
    let separator = lines
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, line)| is_separator(line))
        .map(|(idx, _)| idx)
        .ok_or_else(|| InterchangeError::malformed(path, from + 1, "table has no separator line"))?;

    let mut rows = Vec::new();
    let mut idx = separator + 1;
    while idx < lines.len() {
        let line = lines[idx];
        if line.trim().is_empty() {
            break;
        }
        if !is_separator(line) {
            let row = parse_numeric_line(path, idx + 1, line, sentinels)?;
            if row.values.len() != columns {
                return Err(InterchangeError::malformed(
                    path,
                    idx + 1,
                    format!("expected {} columns, found {}", columns, row.values.len()),
                ));
            }
            rows.push(row);
        }
        idx += 1;
    }
    Ok((rows, idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn path() -> PathBuf {
        PathBuf::from("H1.test.dat")
    }

    #[test]
    fn test_read_block_stops_at_blank_line() {
        let text = "\
Class  Diameter
        (mm)
---------------
 1  0.002
 2  0.010

 trailing words
";
        let lines: Vec<&str> = text.lines().collect();
        let (rows, next) = read_block(&path(), &lines, 1, 2, &SentinelSet::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].float(1), Some(0.010));
        assert_eq!(next, 5);

        let missing = read_block(&path(), &lines, 6, 2, &SentinelSet::default());
        assert!(matches!(missing, Err(InterchangeError::MalformedInput { .. })));
    }

    #[test]
    fn test_split_glued_sentinels() {
        assert_eq!(split_tokens("  1  0.25******12.0 "), vec!["1", "0.25", "******", "12.0"]);
        assert_eq!(split_tokens("******3"), vec!["******", "3"]);
        assert_eq!(split_tokens("*****"), vec!["*****"]);
    }

    #[test]
    fn test_parse_number_variants() {
        let sentinels = SentinelSet::default();
        assert_eq!(parse_number("1.5", &sentinels), Ok(Some(1.5)));
        assert_eq!(parse_number("-2.0E-03", &sentinels), Ok(Some(-0.002)));
        assert_eq!(parse_number("******", &sentinels), Ok(None));
        assert_eq!(parse_number("NaN", &sentinels), Ok(None));
        assert_eq!(parse_number("abc", &sentinels), Err(()));

        let value = parse_number("0.15-105", &sentinels).unwrap().unwrap();
        assert!((value - 0.15e-105).abs() < 1e-110);
        assert_eq!(parse_number("-5", &sentinels), Ok(Some(-5.0)));
    }

    #[test]
    fn test_separator_detection() {
        assert!(is_separator(" --------- "));
        assert!(is_separator("====="));
        assert!(!is_separator(""));
        assert!(!is_separator("-- a --"));
    }

    #[test]
    fn test_read_table_skips_header() {
        let text = "\
Title line
 OFE  J  Y  P
  #   #  #  mm
--------------
  1  1 2000 0.0

  1  2 2000 ******
";
        let (bounds, rows) =
            read_table(&path(), text, TableLayout::new(4, 2), &SentinelSet::default()).unwrap();
        assert_eq!(bounds.skip_rows, 4);
        assert_eq!(bounds.data_rows, 2);
        assert_eq!(rows[0].line_no, 5);
        assert_eq!(rows[1].float(3), None);
        assert_eq!(rows[1].int(1, &path()).unwrap(), 2);
    }

    #[test]
    fn test_read_table_rejects_short_rows() {
        let text = "Header\nunits\n1 2 3\n1 2\n";
        let err =
            read_table(&path(), text, TableLayout::new(3, 1), &SentinelSet::default()).unwrap_err();
        match err {
            InterchangeError::MalformedInput { line, .. } => assert_eq!(line, 4),
            other => panic!("Expected MalformedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_read_table_requires_header() {
        let text = "1 2 3\n";
        let result = read_table(&path(), text, TableLayout::new(3, 1), &SentinelSet::default());
        assert!(matches!(result, Err(InterchangeError::MalformedInput { line: 1, .. })));
    }

    #[test]
    fn test_read_table_header_only_is_empty() {
        let text = "Header\n a b c\n-----\n";
        let (bounds, rows) =
            read_table(&path(), text, TableLayout::new(3, 1), &SentinelSet::default()).unwrap();
        assert!(rows.is_empty());
        assert_eq!(bounds.data_rows, 0);
    }

    #[test]
    fn test_int_rejects_fractions() {
        let line = NumericLine {
            line_no: 7,
            values: vec![Some(1.5), None],
        };
        assert!(line.int(0, &path()).is_err());
        assert!(line.int(1, &path()).is_err());
    }
}
