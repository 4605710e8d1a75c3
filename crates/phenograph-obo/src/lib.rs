//! OBO 1.4 surface syntax for Phenograph.
//!
//! This crate turns OBO text into typed records and knows nothing about
//! graphs:
//!
//! - `grammar`: one `tag: value {modifier} ! comment` line → `StanzaEntry`
//! - `stanza`: header block + `[Term]` / `[Typedef]` / `[Instance]` stanzas
//!
//! Entry-type resolution is context-free: a `replaced_by:` line parses the
//! same way whichever stanza kind it sits in.

pub mod entry;
pub mod grammar;
pub mod stanza;

pub use entry::{
    Dbxref, EntryValue, KeyValue, StanzaEntry, StanzaEntryType, SynonymScope, TrailingModifier,
};
pub use grammar::{parse_header_entry_at, parse_stanza_entry, parse_stanza_entry_at};
pub use stanza::{
    parse_obo, read_obo, Header, HeaderEntry, OboEvent, OboFile, OboReader, Stanza, StanzaKind,
};

use thiserror::Error;

/// Errors raised while reading OBO text. All of them are fatal for the stream.
#[derive(Debug, Error)]
pub enum OboParseError {
    #[error("syntax error on line {line} ({rule}): {message}: `{text}`")]
    Syntax {
        line: usize,
        rule: &'static str,
        message: String,
        text: String,
    },
    #[error("{kind} stanza starting on line {line} has no `id` entry")]
    MissingId { line: usize, kind: StanzaKind },
    #[error("duplicate `{tag}` entry on line {line} (stanza starting on line {stanza_line})")]
    DuplicateEntry {
        line: usize,
        stanza_line: usize,
        tag: String,
    },
    #[error("unknown stanza header on line {line}: `{text}`")]
    UnknownStanza { line: usize, text: String },
    #[error("failed to read OBO input: {0}")]
    Io(#[from] std::io::Error),
}

impl OboParseError {
    /// 1-based source line the error points at (`None` for I/O failures).
    pub fn line(&self) -> Option<usize> {
        match self {
            OboParseError::Syntax { line, .. }
            | OboParseError::MissingId { line, .. }
            | OboParseError::DuplicateEntry { line, .. }
            | OboParseError::UnknownStanza { line, .. } => Some(*line),
            OboParseError::Io(_) => None,
        }
    }
}
