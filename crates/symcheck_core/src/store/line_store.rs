//! Predicate-scoped line persistence.
//!
//! # Responsibility
//! - Load one predicate's facts out of a (possibly shared) backing store.
//! - Rewrite one predicate's facts without disturbing anything else.
//!
//! # Invariants
//! - A line belongs to predicate `P` iff, trimmed, it starts with `P(` and
//!   ends with `).`.
//! - `save` keeps every line that does not belong to the predicate verbatim
//!   (comments, blank lines and other predicates included), then appends one
//!   line per fact.
//! - Malformed lines of the predicate are skipped on load and dropped on the
//!   next save of that predicate. A predicate line that is not valid UTF-8
//!   counts as malformed.
//! - Foreign lines are carried as raw bytes, so other encodings survive.
//! - Saves go through a sibling temp file renamed over the resolved target:
//!   symlinks keep pointing at the same file and its permissions are kept.

use super::{StoreError, StoreResult};
use crate::model::fact::{Arity, Fact, FactFieldsError};
use log::{debug, error, info};
use std::fs;
use std::io::{self, Write};
use std::borrow::Cow;
use std::path::PathBuf;

/// Backing storage for the facts of individual predicates.
///
/// Implementations decide the physical layout; the store only asks for one
/// predicate at a time.
pub trait LineStore: Send + Sync {
    /// Human-readable location, used in logs and errors.
    fn describe(&self) -> String;

    /// Loads every well-formed fact of `predicate`.
    fn load(&self, predicate: &str, arity: Arity) -> StoreResult<Vec<Fact>>;

    /// Replaces every stored fact of `predicate` with `facts`.
    fn save(&self, predicate: &str, facts: &[Fact]) -> StoreResult<()>;
}

/// Flat text file shared by several predicates, one fact per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatFile {
    path: PathBuf,
}

impl FlatFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_existing(&self) -> StoreResult<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(self.persistence_error(err)),
        }
    }

    /// Where the bytes actually live: the symlink target when the configured
    /// path is a link, the configured path when nothing exists yet.
    fn resolve_target(&self) -> io::Result<PathBuf> {
        match fs::canonicalize(&self.path) {
            Ok(resolved) => Ok(resolved),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(self.path.clone()),
            Err(err) => Err(err),
        }
    }

    fn write_atomically(&self, contents: &[u8]) -> io::Result<()> {
        let target = self.resolve_target()?;
        let file_name = target
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
        let mut temp_name = std::ffi::OsString::from(".");
        temp_name.push(file_name);
        temp_name.push(".tmp");
        let temp_path = target.with_file_name(temp_name);

        let mut temp = fs::File::create(&temp_path)?;
        temp.write_all(contents)?;
        temp.sync_all()?;
        drop(temp);

        match fs::metadata(&target) {
            Ok(existing) => fs::set_permissions(&temp_path, existing.permissions())?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        fs::rename(&temp_path, &target)
    }

    fn persistence_error(&self, source: io::Error) -> StoreError {
        StoreError::Persistence {
            target: self.describe(),
            source,
        }
    }
}

impl LineStore for FlatFile {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self, predicate: &str, arity: Arity) -> StoreResult<Vec<Fact>> {
        let bytes = self.read_existing()?;
        let mut facts = Vec::new();
        let mut skipped = 0usize;

        for (index, raw) in bytes.split(|byte| *byte == b'\n').enumerate() {
            let Some(parsed) = parse_raw_line(predicate, arity, raw) else {
                continue;
            };
            match parsed {
                Ok(fact) => facts.push(fact),
                Err(err) => {
                    skipped += 1;
                    debug!(
                        "event=line_skipped module=line_store status=skipped predicate={} line_no={} reason={}",
                        predicate,
                        index + 1,
                        err
                    );
                }
            }
        }

        info!(
            "event=predicate_load module=line_store status=ok predicate={} facts={} skipped={} file={}",
            predicate,
            facts.len(),
            skipped,
            self.describe()
        );
        Ok(facts)
    }

    fn save(&self, predicate: &str, facts: &[Fact]) -> StoreResult<()> {
        let existing = self.read_existing()?;
        let contents = rewrite_predicate(&existing, predicate, facts);

        if let Err(err) = self.write_atomically(&contents) {
            error!(
                "event=predicate_save module=line_store status=error predicate={} file={} error={}",
                predicate,
                self.describe(),
                err
            );
            return Err(self.persistence_error(err));
        }

        debug!(
            "event=predicate_save module=line_store status=ok predicate={} facts={} file={}",
            predicate,
            facts.len(),
            self.describe()
        );
        Ok(())
    }
}

/// Why a line of the predicate could not be turned into a fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineParseError {
    /// Quote left open or a field is empty.
    Malformed,
    /// The line is not valid UTF-8.
    Encoding,
    Fields(FactFieldsError),
}

impl std::fmt::Display for LineParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed_fields"),
            Self::Encoding => write!(f, "invalid_utf8"),
            Self::Fields(err) => write!(f, "{err}"),
        }
    }
}

/// Returns the text between `predicate(` and `).` when `line` belongs to the
/// predicate.
pub fn predicate_body<'a>(predicate: &str, line: &'a str) -> Option<&'a str> {
    line.trim()
        .strip_prefix(predicate)?
        .strip_prefix('(')?
        .strip_suffix(").")
}

/// Parses one line for `predicate`.
///
/// Returns `None` when the line belongs to some other predicate (or is not a
/// fact at all), `Some(Err(_))` when it belongs to `predicate` but is
/// malformed.
pub fn parse_line(
    predicate: &str,
    arity: Arity,
    line: &str,
) -> Option<Result<Fact, LineParseError>> {
    let body = predicate_body(predicate, line)?;
    let parsed = split_top_level(body)
        .ok_or(LineParseError::Malformed)
        .and_then(|fields| {
            if fields.iter().any(|field| field.is_empty()) {
                return Err(LineParseError::Malformed);
            }
            Fact::from_fields(arity, &fields).map_err(LineParseError::Fields)
        });
    Some(parsed)
}

/// Byte-level variant of [`parse_line`]; a trailing `\r` is ignored.
///
/// Membership is decided on a lossy decoding so a predicate line with broken
/// encoding is reported instead of silently treated as foreign.
pub fn parse_raw_line(
    predicate: &str,
    arity: Arity,
    raw: &[u8],
) -> Option<Result<Fact, LineParseError>> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    match std::str::from_utf8(raw) {
        Ok(line) => parse_line(predicate, arity, line),
        Err(_) => {
            predicate_body(predicate, &String::from_utf8_lossy(raw))?;
            Some(Err(LineParseError::Encoding))
        }
    }
}

fn belongs_to(predicate: &str, raw: &[u8]) -> bool {
    let line: Cow<'_, str> = String::from_utf8_lossy(raw);
    predicate_body(predicate, &line).is_some()
}

/// Splits `body` on commas that are outside quotes and brackets.
///
/// Fields are trimmed and a surrounding pair of matching quotes is removed.
/// Returns `None` when a quote is never closed.
pub fn split_top_level(body: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for ch in body.chars() {
        match quote {
            Some(open) => {
                current.push(ch);
                if ch == open {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                '(' | '[' => {
                    depth += 1;
                    current.push(ch);
                }
                ')' | ']' => {
                    depth = depth.saturating_sub(1);
                    current.push(ch);
                }
                ',' if depth == 0 => {
                    fields.push(unquote(&current));
                    current.clear();
                }
                _ => current.push(ch),
            },
        }
    }

    if quote.is_some() {
        return None;
    }
    fields.push(unquote(&current));
    Some(fields)
}

fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    if let (Some(first), Some(last)) = (chars.next(), chars.next_back()) {
        if first == last && (first == '\'' || first == '"') {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}

/// Rebuilds file contents: foreign lines first, byte for byte, then `facts`.
pub fn rewrite_predicate(existing: &[u8], predicate: &str, facts: &[Fact]) -> Vec<u8> {
    let mut out = Vec::with_capacity(existing.len());

    for segment in existing.split_inclusive(|byte| *byte == b'\n') {
        if belongs_to(predicate, segment) {
            continue;
        }
        out.extend_from_slice(segment);
        if !segment.ends_with(b"\n") {
            out.push(b'\n');
        }
    }

    for fact in facts {
        out.extend_from_slice(fact.to_line(predicate).as_bytes());
        out.push(b'\n');
    }
    out
}
