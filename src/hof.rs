//! Hall of Fame files.
//!
//! A Hall of Fame (".gen") file lists the best genotypes of an evolutionary
//! run. Each genotype is a group of `key:value` lines. A value of `~` opens a
//! raw multi-line block which runs until the next line containing a `~`.
//! Entries are separated by blank lines, and the last line of the file is a
//! terminator which is not part of the data.
//!
//! ```text
//! org:
//! genotype:~
//! X[0:0,1]
//! ~
//! vertpos:0.73
//!
//! ```

use crate::convert::{self, ConversionError};
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Value which opens a multi-line block.
const BLOCK_SENTINEL: &str = "~";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {index}: expected \"key:value\", found {line:?}")]
    MalformedLine { index: usize, line: String },

    #[error("block \"{key}\" opened on line {opened_at} is never closed")]
    UnterminatedBlock { key: String, opened_at: usize },

    #[error("invalid argument: no attributes requested")]
    InvalidArgument,
}

/// Error type for reading Hall of Fame files.
#[derive(thiserror::Error, Debug)]
pub enum HofError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("{path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

/// The requested attributes of one genotype entry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Record {
    values: HashMap<String, String>,
}

impl Record {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Convert an attribute to a number.
    /// Returns None if this entry does not have the attribute.
    pub fn get_f64(&self, key: &str) -> Result<Option<f64>, ConversionError> {
        self.get(key).map(|value| convert::parse_f64(key, value)).transpose()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the attributes in the given order, skipping missing ones.
    pub fn iter_in<'a>(&'a self, order: &'a [impl AsRef<str>]) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        order.iter().filter_map(|key| {
            let key = key.as_ref();
            self.get(key).map(|value| (key, value))
        })
    }

    /// Consume the record, returning the underlying map.
    pub fn into_inner(self) -> HashMap<String, String> {
        self.values
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[derive(Debug)]
enum State {
    Normal,
    InBlock {
        key: String,
        opened_at: usize,
        lines: Vec<String>,
    },
}

/// Accumulates the entry which is currently being read.
struct Parser<'a> {
    wanted: &'a [&'a str],
    state: State,
    /// Every key seen in the current entry, including unwanted ones.
    seen: HashSet<String>,
    current: Record,
    records: Vec<Record>,
}

impl<'a> Parser<'a> {
    fn new(wanted: &'a [&'a str]) -> Self {
        Self {
            wanted,
            state: State::Normal,
            seen: HashSet::new(),
            current: Record::default(),
            records: Vec::new(),
        }
    }

    fn is_wanted(&self, key: &str) -> bool {
        self.wanted.contains(&key)
    }

    fn flush(&mut self) {
        if !self.seen.is_empty() {
            self.seen.clear();
            self.records.push(std::mem::take(&mut self.current));
        }
    }

    /// A key which is already in the current entry starts the next entry.
    fn begin_attribute(&mut self, key: &str) {
        if self.seen.contains(key) {
            self.flush();
        }
        self.seen.insert(key.to_string());
    }

    fn step(&mut self, index: usize, line: &str) -> Result<(), ParseError> {
        match std::mem::replace(&mut self.state, State::Normal) {
            State::InBlock {
                key,
                opened_at,
                mut lines,
            } => {
                if line.contains('~') {
                    if self.is_wanted(&key) {
                        self.current.insert(key, lines.join("\n"));
                    }
                } else {
                    lines.push(line.to_string());
                    self.state = State::InBlock { key, opened_at, lines };
                }
            }
            State::Normal => {
                if line.trim().is_empty() {
                    self.flush();
                    return Ok(());
                }
                let Some((key, value)) = line.split_once(':') else {
                    return Err(ParseError::MalformedLine {
                        index,
                        line: line.to_string(),
                    });
                };
                self.begin_attribute(key);
                if value == BLOCK_SENTINEL {
                    self.state = State::InBlock {
                        key: key.to_string(),
                        opened_at: index,
                        lines: Vec::new(),
                    };
                } else if self.is_wanted(key) {
                    self.current.insert(key, value);
                }
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Record>, ParseError> {
        if let State::InBlock { key, opened_at, .. } = std::mem::replace(&mut self.state, State::Normal) {
            return Err(ParseError::UnterminatedBlock { key, opened_at });
        }
        self.flush();
        Ok(self.records)
    }
}

/// Parse the lines of a Hall of Fame file into one record per genotype.
///
/// The caller must strip the line terminators and exclude the final line of
/// the file. Only the attributes named in `wanted` are kept.
///
/// A new entry begins after a blank line, or when a key repeats within the
/// current entry. Entries without any wanted attributes yield empty records,
/// so the number of records never depends on `wanted`.
pub fn parse<I>(lines: I, wanted: &[&str]) -> Result<Vec<Record>, ParseError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    if wanted.is_empty() {
        return Err(ParseError::InvalidArgument);
    }
    let mut parser = Parser::new(wanted);
    for (index, line) in lines.into_iter().enumerate() {
        parser.step(index, line.as_ref())?;
    }
    parser.finish()
}

/// Read and parse a Hall of Fame file. The last line of the file is ignored.
pub fn read_file(path: impl AsRef<Path>, wanted: &[&str]) -> Result<Vec<Record>, HofError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let mut lines: Vec<&str> = text.lines().collect();
    lines.pop();
    tracing::trace!("parsing {} lines from {path:?}", lines.len());
    parse(lines, wanted).map_err(|source| HofError::Parse {
        path: path.into(),
        source,
    })
}

/// Write records in the Hall of Fame file format.
///
/// Each entry starts with a `class_name:` header and lists its attributes in
/// the given order. Multi-line values are written as blocks.
pub fn write_records(
    writer: &mut impl Write,
    class_name: &str,
    records: &[Record],
    order: &[impl AsRef<str>],
) -> Result<(), io::Error> {
    for record in records {
        writeln!(writer, "{class_name}:")?;
        for (key, value) in record.iter_in(order) {
            if value.contains('\n') {
                if value.contains('~') {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("block value of \"{key}\" contains '~'"),
                    ));
                }
                writeln!(writer, "{key}:{BLOCK_SENTINEL}\n{value}\n{BLOCK_SENTINEL}")?;
            } else if value == BLOCK_SENTINEL {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("value of \"{key}\" is the block sentinel"),
                ));
            } else {
                writeln!(writer, "{key}:{value}")?;
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().copied().collect()
    }

    const TWO_ENTRIES: [&str; 11] = [
        "vertpos:0.73",
        "genotype:~",
        "X[0:0,1]",
        "~",
        "numparts:4",
        "",
        "vertpos:1.10",
        "genotype:~",
        "Y",
        "~",
        "numparts:2",
    ];

    #[test]
    fn empty_input() {
        let no_lines: [&str; 0] = [];
        assert_eq!(parse(no_lines, &["genotype"]).unwrap(), vec![]);
        assert_eq!(parse(["", "  "], &["genotype"]).unwrap(), vec![]);
    }

    #[test]
    fn two_entries() {
        let records = parse(TWO_ENTRIES, &["genotype", "vertpos"]).unwrap();
        assert_eq!(
            records,
            vec![
                record(&[("vertpos", "0.73"), ("genotype", "X[0:0,1]")]),
                record(&[("vertpos", "1.10"), ("genotype", "Y")]),
            ]
        );
    }

    #[test]
    fn filtered_block_is_skipped() {
        let records = parse(TWO_ENTRIES, &["vertpos"]).unwrap();
        assert_eq!(records, vec![record(&[("vertpos", "0.73")]), record(&[("vertpos", "1.10")])]);
    }

    #[test]
    fn record_count_ignores_filter() {
        let all = parse(TWO_ENTRIES, &["genotype", "vertpos", "numparts"]).unwrap();
        let none = parse(TWO_ENTRIES, &["velocity"]).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(none.len(), 2);
        assert!(none.iter().all(Record::is_empty));
    }

    #[test]
    fn block_keeps_inner_newlines() {
        let records = parse(["genotype:~", "LINE1", "LINE2", "~END"], &["genotype"]).unwrap();
        assert_eq!(records, vec![record(&[("genotype", "LINE1\nLINE2")])]);
    }

    #[test]
    fn block_keeps_blank_lines_and_colons() {
        let lines = ["genotype:~", "p:", "", "j:0, 1", "~"];
        let records = parse(lines, &["genotype"]).unwrap();
        assert_eq!(records[0].get("genotype"), Some("p:\n\nj:0, 1"));
    }

    #[test]
    fn empty_block() {
        let records = parse(["genotype:~", "~", "vertpos:1"], &["genotype"]).unwrap();
        assert_eq!(records, vec![record(&[("genotype", "")])]);
    }

    #[test]
    fn repeated_key_starts_new_entry() {
        let lines = ["org:", "vertpos:1", "org:", "vertpos:2", "org:", "vertpos:3"];
        let records = parse(lines, &["vertpos"]).unwrap();
        assert_eq!(
            records,
            vec![
                record(&[("vertpos", "1")]),
                record(&[("vertpos", "2")]),
                record(&[("vertpos", "3")]),
            ]
        );
    }

    #[test]
    fn blank_line_splits_entry() {
        // A blank line ends the entry even when no key repeats after it.
        let lines = ["org:", "genotype:~", "X", "~", "", "vertpos:0.5", "numparts:3"];
        let records = parse(lines, &["genotype", "vertpos"]).unwrap();
        assert_eq!(
            records,
            vec![record(&[("genotype", "X")]), record(&[("vertpos", "0.5")])]
        );
    }

    #[test]
    fn repeated_block_key_starts_new_entry() {
        let lines = ["genotype:~", "A", "~", "genotype:~", "B", "~"];
        let records = parse(lines, &["genotype"]).unwrap();
        assert_eq!(records, vec![record(&[("genotype", "A")]), record(&[("genotype", "B")])]);
    }

    #[test]
    fn value_may_contain_colons() {
        let records = parse(["name:a:b:c", "time:12:30"], &["name", "time"]).unwrap();
        assert_eq!(records, vec![record(&[("name", "a:b:c"), ("time", "12:30")])]);
    }

    #[test]
    fn values_are_exact() {
        let records = parse(["name: spaced out ", "empty:"], &["name", "empty"]).unwrap();
        assert_eq!(records[0].get("name"), Some(" spaced out "));
        assert_eq!(records[0].get("empty"), Some(""));
    }

    #[test]
    fn tilde_inside_scalar_is_not_a_block() {
        let records = parse(["name:~x", "vertpos:1"], &["name", "vertpos"]).unwrap();
        assert_eq!(records, vec![record(&[("name", "~x"), ("vertpos", "1")])]);
    }

    #[test]
    fn idempotent() {
        let wanted = ["genotype", "vertpos"];
        assert_eq!(parse(TWO_ENTRIES, &wanted).unwrap(), parse(TWO_ENTRIES, &wanted).unwrap());
    }

    #[test]
    fn malformed_line() {
        let error = parse(["vertpos:1", "novalueline"], &["vertpos"]).unwrap_err();
        assert_eq!(
            error,
            ParseError::MalformedLine {
                index: 1,
                line: "novalueline".to_string()
            }
        );
        eprintln!("{error}"); // Check error message formatting.
    }

    #[test]
    fn unterminated_block() {
        let error = parse(["vertpos:1", "genotype:~", "LINE1"], &["genotype"]).unwrap_err();
        assert_eq!(
            error,
            ParseError::UnterminatedBlock {
                key: "genotype".to_string(),
                opened_at: 1
            }
        );
    }

    #[test]
    fn invalid_argument() {
        // The lines are never looked at.
        assert_eq!(parse(["novalueline"], &[]), Err(ParseError::InvalidArgument));
    }

    #[test]
    fn iter_in_order() {
        let rec = record(&[("vertpos", "1"), ("genotype", "X")]);
        let order = ["genotype", "numparts", "vertpos"];
        let pairs: Vec<_> = rec.iter_in(&order).collect();
        assert_eq!(pairs, vec![("genotype", "X"), ("vertpos", "1")]);
    }

    #[test]
    fn get_f64() {
        let rec = record(&[("vertpos", "0.5"), ("genotype", "X")]);
        assert_eq!(rec.get_f64("vertpos").unwrap(), Some(0.5));
        assert_eq!(rec.get_f64("velocity").unwrap(), None);
        assert!(rec.get_f64("genotype").is_err());
    }

    #[test]
    fn write_then_read() {
        let records = vec![
            record(&[("genotype", "p:\np:1\nj:0, 1"), ("vertpos", "0.25")]),
            record(&[("genotype", "X"), ("vertpos", "-1e-3")]),
        ];
        let order = ["genotype", "vertpos"];
        let mut path = std::env::temp_dir();
        path.push(format!("hof_write_then_read_{}.gen", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        write_records(&mut file, "org", &records, &order).unwrap();
        drop(file);
        let returned = read_file(&path, &order).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(records, returned);
    }

    #[test]
    fn write_rejects_tilde_in_block() {
        let records = vec![record(&[("genotype", "a\n~b")])];
        let mut buf = vec![];
        let error = write_records(&mut buf, "org", &records, &["genotype"]).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn read_file_reports_path() {
        let mut path = std::env::temp_dir();
        path.push(format!("hof_read_file_reports_path_{}.gen", std::process::id()));
        std::fs::write(&path, "vertpos:1\nbroken\n\n").unwrap();
        let error = read_file(&path, &["vertpos"]).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        match error {
            HofError::Parse { path: error_path, source } => {
                assert_eq!(error_path, path);
                assert!(matches!(source, ParseError::MalformedLine { index: 1, .. }));
            }
            HofError::Io(err) => panic!("unexpected io error {err}"),
        }
    }
}
