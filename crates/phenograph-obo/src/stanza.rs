//! Stanza assembly: groups entry lines into a header block and stanzas.
//!
//! `OboReader` is the streaming surface (one event per header / stanza);
//! `parse_obo` and `read_obo` collect the stream into an `OboFile`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::BufRead;

use crate::entry::{StanzaEntry, StanzaEntryType};
use crate::grammar::{parse_header_entry_at, parse_stanza_entry_at, split_comment};
use crate::OboParseError;

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StanzaKind {
    Term,
    Typedef,
    Instance,
}

impl StanzaKind {
    /// Recognize a `[Kind]` line (already trimmed).
    pub fn from_header_line(line: &str) -> Option<Self> {
        match line {
            "[Term]" => Some(Self::Term),
            "[Typedef]" => Some(Self::Typedef),
            "[Instance]" => Some(Self::Instance),
            _ => None,
        }
    }
}

impl fmt::Display for StanzaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Term => "[Term]",
            Self::Typedef => "[Typedef]",
            Self::Instance => "[Instance]",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stanza {
    pub kind: StanzaKind,
    /// Value of the stanza's `id` entry.
    pub id: String,
    /// Line of the `[Kind]` opener.
    pub line: usize,
    /// Entries in source order, `id` included.
    pub entries: Vec<StanzaEntry>,
}

impl Stanza {
    pub fn entries_of(&self, entry_type: StanzaEntryType) -> impl Iterator<Item = &StanzaEntry> {
        self.entries
            .iter()
            .filter(move |e| e.entry_type() == entry_type)
    }

    pub fn first(&self, entry_type: StanzaEntryType) -> Option<&StanzaEntry> {
        self.entries_of(entry_type).next()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub tag: String,
    pub value: String,
    pub comment: Option<String>,
    pub line: usize,
}

/// Header block (everything before the first stanza), order preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub entries: Vec<HeaderEntry>,
}

impl Header {
    /// First value for `tag`.
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.tag == tag)
            .map(|e| e.value.as_str())
    }

    pub fn get_all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.tag == tag)
            .map(|e| e.value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OboFile {
    pub header: Header,
    pub stanzas: Vec<Stanza>,
}

impl OboFile {
    pub fn stanzas_of(&self, kind: StanzaKind) -> impl Iterator<Item = &Stanza> {
        self.stanzas.iter().filter(move |s| s.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OboEvent {
    Header(Header),
    Stanza(Stanza),
}

// ============================================================================
// Assembly
// ============================================================================

struct StanzaBuilder {
    kind: StanzaKind,
    line: usize,
    id: Option<String>,
    entries: Vec<StanzaEntry>,
}

impl StanzaBuilder {
    fn new(kind: StanzaKind, line: usize) -> Self {
        Self {
            kind,
            line,
            id: None,
            entries: Vec::new(),
        }
    }

    fn add(&mut self, entry: StanzaEntry) -> Result<(), OboParseError> {
        let entry_type = entry.entry_type();
        if entry_type.is_single_valued()
            && self.entries.iter().any(|e| e.entry_type() == entry_type)
        {
            return Err(OboParseError::DuplicateEntry {
                line: entry.line,
                stanza_line: self.line,
                tag: entry_type.to_string(),
            });
        }
        if entry_type == StanzaEntryType::Id {
            self.id = entry.id().map(str::to_string);
        }
        self.entries.push(entry);
        Ok(())
    }

    fn finish(self) -> Result<Stanza, OboParseError> {
        let id = self.id.ok_or(OboParseError::MissingId {
            line: self.line,
            kind: self.kind,
        })?;
        Ok(Stanza {
            kind: self.kind,
            id,
            line: self.line,
            entries: self.entries,
        })
    }
}

/// Streaming OBO reader.
///
/// Yields the header first (possibly empty), then one event per stanza.
/// The iterator is fused after the first error.
pub struct OboReader<R> {
    reader: R,
    buf: String,
    line_no: usize,
    /// `Some` until the header has been emitted.
    header: Option<Vec<HeaderEntry>>,
    current: Option<StanzaBuilder>,
    done: bool,
}

impl<R: BufRead> OboReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            line_no: 0,
            header: Some(Vec::new()),
            current: None,
            done: false,
        }
    }

    /// Lines consumed so far.
    pub fn line_number(&self) -> usize {
        self.line_no
    }

    fn fail(&mut self, err: OboParseError) -> Option<Result<OboEvent, OboParseError>> {
        self.done = true;
        Some(Err(err))
    }

    fn emit(&mut self, builder: StanzaBuilder) -> Option<Result<OboEvent, OboParseError>> {
        match builder.finish() {
            Ok(stanza) => Some(Ok(OboEvent::Stanza(stanza))),
            Err(err) => self.fail(err),
        }
    }

    fn at_eof(&mut self) -> Option<Result<OboEvent, OboParseError>> {
        if let Some(entries) = self.header.take() {
            return Some(Ok(OboEvent::Header(Header { entries })));
        }
        if let Some(builder) = self.current.take() {
            return self.emit(builder);
        }
        self.done = true;
        None
    }
}

impl<R: BufRead> Iterator for OboReader<R> {
    type Item = Result<OboEvent, OboParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return self.at_eof(),
                Ok(_) => {}
                Err(err) => return self.fail(err.into()),
            }
            self.line_no += 1;
            let line_no = self.line_no;
            let line = self.buf.trim().to_string();

            if line.is_empty() || line.starts_with('!') {
                continue;
            }

            if line.starts_with('[') {
                let opener = match split_comment(&line, false) {
                    Ok((body, _)) => body.trim(),
                    Err(_) => line.as_str(),
                };
                let Some(kind) = StanzaKind::from_header_line(opener) else {
                    return self.fail(OboParseError::UnknownStanza {
                        line: line_no,
                        text: line,
                    });
                };
                let next = StanzaBuilder::new(kind, line_no);
                if let Some(entries) = self.header.take() {
                    self.current = Some(next);
                    return Some(Ok(OboEvent::Header(Header { entries })));
                }
                if let Some(prev) = self.current.replace(next) {
                    return self.emit(prev);
                }
                continue;
            }

            if let Some(entries) = self.header.as_mut() {
                match parse_header_entry_at(&line, line_no) {
                    Ok(entry) => entries.push(entry),
                    Err(err) => return self.fail(err),
                }
                continue;
            }

            let added = match parse_stanza_entry_at(&line, line_no) {
                Ok(entry) => match self.current.as_mut() {
                    Some(builder) => builder.add(entry),
                    None => Ok(()),
                },
                Err(err) => Err(err),
            };
            if let Err(err) = added {
                return self.fail(err);
            }
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for OboReader<R> {}

/// Collect a full OBO document from a reader.
pub fn read_obo<R: BufRead>(reader: R) -> Result<OboFile, OboParseError> {
    let mut file = OboFile::default();
    for event in OboReader::new(reader) {
        match event? {
            OboEvent::Header(header) => file.header = header,
            OboEvent::Stanza(stanza) => file.stanzas.push(stanza),
        }
    }
    Ok(file)
}

/// Parse a complete OBO document held in memory.
pub fn parse_obo(text: &str) -> Result<OboFile, OboParseError> {
    read_obo(text.as_bytes())
}
