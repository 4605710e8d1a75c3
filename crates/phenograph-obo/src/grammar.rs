//! OBO line grammar: `tag: value {key=value, ...} ! comment`.
//!
//! Parsing happens in two passes:
//! 1. split the text after `tag:` into value, trailing modifier block and
//!    comment (escape- and quote-aware);
//! 2. parse the value with the rule selected by the tag.
//!
//! Rule selection depends on the tag only, never on the enclosing stanza.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char as pchar, multispace0, multispace1, space0},
    combinator::{all_consuming, map, opt},
    multi::separated_list0,
    sequence::{delimited, preceded, tuple},
    IResult,
};

use crate::entry::{
    Dbxref, EntryValue, KeyValue, StanzaEntry, StanzaEntryType, SynonymScope, TrailingModifier,
};
use crate::stanza::HeaderEntry;
use crate::OboParseError;

/// `(rule, message)`; turned into `OboParseError::Syntax` at the boundary.
type RuleError = (&'static str, String);

/// Parse a single stanza entry line (line number 1).
pub fn parse_stanza_entry(text: &str) -> Result<StanzaEntry, OboParseError> {
    parse_stanza_entry_at(text, 1)
}

/// Parse a single stanza entry line, reporting errors against `line`.
pub fn parse_stanza_entry_at(text: &str, line: usize) -> Result<StanzaEntry, OboParseError> {
    let raw = text.trim_end_matches(|c| c == '\n' || c == '\r');
    let syntax = |rule: &'static str, message: String| OboParseError::Syntax {
        line,
        rule,
        message,
        text: raw.to_string(),
    };

    let (rest, tag_name) =
        tag_prefix(raw).map_err(|_| syntax("tag", "expected `<tag>: <value>`".to_string()))?;
    let entry_type = StanzaEntryType::from_tag(tag_name);

    let trailing =
        split_trailing(rest, is_quote_aware(entry_type)).map_err(|(r, m)| syntax(r, m))?;

    let modifier = match trailing.modifier {
        Some(block) => Some(parse_modifier(block).map_err(|(r, m)| syntax(r, m))?),
        None => None,
    };

    let value =
        parse_value(tag_name, entry_type, trailing.value).map_err(|(r, m)| syntax(r, m))?;

    Ok(StanzaEntry {
        value,
        modifier,
        comment: trailing.comment.map(str::to_string),
        line,
    })
}

/// Parse a header line. The value is kept verbatim (comment stripped).
pub fn parse_header_entry_at(text: &str, line: usize) -> Result<HeaderEntry, OboParseError> {
    let raw = text.trim_end_matches(|c| c == '\n' || c == '\r');
    let (rest, tag_name) = tag_prefix(raw).map_err(|_| OboParseError::Syntax {
        line,
        rule: "header",
        message: "expected `<tag>: <value>`".to_string(),
        text: raw.to_string(),
    })?;

    // Header values are free-form; a stray quote must not swallow the comment
    // marker, so fall back to a quote-blind split.
    let (body, comment) = match split_comment(rest, true) {
        Ok(split) => split,
        Err(_) => split_comment(rest, false).map_err(|(rule, message)| OboParseError::Syntax {
            line,
            rule,
            message,
            text: raw.to_string(),
        })?,
    };

    Ok(HeaderEntry {
        tag: tag_name.to_string(),
        value: body.trim().to_string(),
        comment: comment.map(str::to_string),
        line,
    })
}

// ============================================================================
// Pass 1: value / modifier / comment split
// ============================================================================

struct Trailing<'a> {
    value: &'a str,
    modifier: Option<&'a str>,
    comment: Option<&'a str>,
}

fn is_quote_aware(entry_type: StanzaEntryType) -> bool {
    matches!(
        entry_type,
        StanzaEntryType::Def
            | StanzaEntryType::Synonym
            | StanzaEntryType::Xref
            | StanzaEntryType::PropertyValue
    )
}

/// Split at the first unescaped `!` outside a quoted string.
pub(crate) fn split_comment(rest: &str, quote_aware: bool) -> Result<(&str, Option<&str>), RuleError> {
    let mut escaped = false;
    let mut in_quotes = false;

    for (i, c) in rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' if quote_aware => in_quotes = !in_quotes,
            '!' if !in_quotes => {
                let comment = rest[i + 1..].trim();
                let comment = (!comment.is_empty()).then_some(comment);
                return Ok((&rest[..i], comment));
            }
            _ => {}
        }
    }

    if in_quotes {
        return Err(("quoted-string", "unterminated quoted string".to_string()));
    }
    Ok((rest, None))
}

fn split_trailing(rest: &str, quote_aware: bool) -> Result<Trailing<'_>, RuleError> {
    let (body, comment) = split_comment(rest, quote_aware)?;
    let body = body.trim();

    let mut escaped = false;
    let mut in_quotes = false;
    let mut depth: i32 = 0;
    let mut open = None;
    let mut last_block = None;

    for (i, c) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' if quote_aware => in_quotes = !in_quotes,
            '{' if !in_quotes => {
                if depth == 0 {
                    open = Some(i);
                }
                depth += 1;
            }
            '}' if !in_quotes => {
                depth -= 1;
                if depth < 0 {
                    return Err(("trailing-modifier", "unbalanced `}`".to_string()));
                }
                if depth == 0 {
                    last_block = open.map(|o| (o, i));
                }
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(("trailing-modifier", "unclosed `{`".to_string()));
    }

    // Only a block that closes the value is a modifier; balanced braces
    // inside free text stay part of the value.
    match last_block {
        Some((o, c)) if c + 1 == body.len() => Ok(Trailing {
            value: body[..o].trim_end(),
            modifier: Some(&body[o..]),
            comment,
        }),
        _ => Ok(Trailing {
            value: body,
            modifier: None,
            comment,
        }),
    }
}

// ============================================================================
// Pass 2: value rules
// ============================================================================

fn parse_value(
    tag_name: &str,
    entry_type: StanzaEntryType,
    value: &str,
) -> Result<EntryValue, RuleError> {
    use StanzaEntryType as T;

    Ok(match entry_type {
        T::Id => EntryValue::Id {
            id: single_id(value)?,
        },
        T::Name => EntryValue::Name {
            name: free_text(value)?,
        },
        T::Def => {
            let (text, xrefs) = def_body(value)?;
            EntryValue::Def { text, xrefs }
        }
        T::Comment => EntryValue::Comment {
            text: free_text(value)?,
        },
        T::Synonym => synonym_body(tag_name, value)?,
        T::Xref => EntryValue::Xref {
            xref: xref_body(value)?,
        },
        T::IsA => EntryValue::IsA {
            id: single_id(value)?,
        },
        T::Relationship => {
            let (relation, target) = relationship_body(value)?;
            EntryValue::Relationship { relation, target }
        }
        T::AltId => EntryValue::AltId {
            id: single_id(value)?,
        },
        T::ReplacedBy => EntryValue::ReplacedBy {
            id: single_id(value)?,
        },
        T::Consider => EntryValue::Consider {
            id: single_id(value)?,
        },
        T::UnionOf => EntryValue::UnionOf {
            id: single_id(value)?,
        },
        T::IntersectionOf => {
            let (relation, id) = intersection_body(value)?;
            EntryValue::IntersectionOf { relation, id }
        }
        T::DisjointFrom => EntryValue::DisjointFrom {
            id: single_id(value)?,
        },
        T::Subset => EntryValue::Subset {
            name: single_id(value)?,
        },
        T::Namespace => EntryValue::Namespace {
            name: free_text(value)?,
        },
        T::CreatedBy => EntryValue::CreatedBy {
            name: free_text(value)?,
        },
        T::CreationDate => EntryValue::CreationDate {
            value: free_text(value)?,
        },
        T::IsObsolete => EntryValue::IsObsolete {
            value: boolean(value)?,
        },
        T::IsAnonymous => EntryValue::IsAnonymous {
            value: boolean(value)?,
        },
        T::PropertyValue => {
            let (relation, value, datatype) = property_value_body(value)?;
            EntryValue::PropertyValue {
                relation,
                value,
                datatype,
            }
        }
        T::Generic => EntryValue::Generic {
            tag: tag_name.to_string(),
            value: unescape(value),
        },
    })
}

fn single_id(value: &str) -> Result<String, RuleError> {
    all_consuming(tuple((token, multispace0)))(value)
        .map(|(_, (id, _))| unescape(id))
        .map_err(|_| ("identifier", "expected exactly one identifier".to_string()))
}

fn free_text(value: &str) -> Result<String, RuleError> {
    if value.is_empty() {
        return Err(("text", "empty value".to_string()));
    }
    Ok(unescape(value))
}

fn boolean(value: &str) -> Result<bool, RuleError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(("boolean", format!("expected `true` or `false`, got `{other}`"))),
    }
}

fn def_body(value: &str) -> Result<(String, Vec<Dbxref>), RuleError> {
    fn parser(input: &str) -> IResult<&str, (String, Option<Vec<Dbxref>>)> {
        let (input, text) = quoted_string(input)?;
        let (input, xrefs) = opt(preceded(multispace0, dbxref_list))(input)?;
        let (input, _) = multispace0(input)?;
        Ok((input, (text, xrefs)))
    }

    all_consuming(parser)(value)
        .map(|(_, (text, xrefs))| (text, xrefs.unwrap_or_default()))
        .map_err(|_| ("def", "def expects: `\"<text>\" [<xrefs>]`".to_string()))
}

fn synonym_body(tag_name: &str, value: &str) -> Result<EntryValue, RuleError> {
    fn parser(input: &str) -> IResult<&str, (String, Option<(&str, Option<&str>)>, Option<Vec<Dbxref>>)> {
        let (input, text) = quoted_string(input)?;
        let (input, scope) = opt(tuple((
            preceded(multispace1, take_while1(|c: char| c.is_ascii_uppercase())),
            opt(preceded(
                multispace1,
                take_while1(|c: char| !c.is_whitespace() && c != '['),
            )),
        )))(input)?;
        let (input, xrefs) = opt(preceded(multispace0, dbxref_list))(input)?;
        let (input, _) = multispace0(input)?;
        Ok((input, (text, scope, xrefs)))
    }

    let (text, scope_and_type, xrefs) = all_consuming(parser)(value)
        .map(|(_, v)| v)
        .map_err(|_| {
            (
                "synonym",
                "synonym expects: `\"<text>\" <SCOPE> [<type>] [<xrefs>]`".to_string(),
            )
        })?;

    // OBO 1.2 tags carry the scope in the tag name.
    let legacy_scope = match tag_name {
        "exact_synonym" => Some(SynonymScope::Exact),
        "narrow_synonym" => Some(SynonymScope::Narrow),
        "broad_synonym" => Some(SynonymScope::Broad),
        "related_synonym" => Some(SynonymScope::Related),
        _ => None,
    };

    let (scope, type_name) = match (legacy_scope, scope_and_type) {
        (Some(scope), None) => (scope, None),
        (Some(_), Some(_)) => {
            return Err((
                "synonym",
                format!("`{tag_name}` does not take an explicit scope"),
            ))
        }
        (None, None) => (SynonymScope::Related, None),
        (None, Some((scope, type_name))) => {
            let scope = scope
                .parse::<SynonymScope>()
                .map_err(|message| ("synonym-scope", message))?;
            (scope, type_name.map(unescape))
        }
    };

    Ok(EntryValue::Synonym {
        text,
        scope,
        type_name,
        xrefs: xrefs.unwrap_or_default(),
    })
}

fn xref_body(value: &str) -> Result<Dbxref, RuleError> {
    fn parser(input: &str) -> IResult<&str, Dbxref> {
        let (input, name) = dbxref_name(input)?;
        let (input, description) = opt(preceded(multispace1, quoted_string))(input)?;
        let (input, _) = multispace0(input)?;
        Ok((input, Dbxref { name, description }))
    }

    all_consuming(parser)(value)
        .map(|(_, xref)| xref)
        .map_err(|_| ("xref", "xref expects: `<name> [\"<description>\"]`".to_string()))
}

fn relationship_body(value: &str) -> Result<(String, String), RuleError> {
    all_consuming(tuple((token, multispace1, token, multispace0)))(value)
        .map(|(_, (relation, _, target, _))| (unescape(relation), unescape(target)))
        .map_err(|_| {
            (
                "relationship",
                "relationship expects: `<relation> <target>`".to_string(),
            )
        })
}

fn intersection_body(value: &str) -> Result<(Option<String>, String), RuleError> {
    all_consuming(tuple((token, opt(preceded(multispace1, token)), multispace0)))(value)
        .map(|(_, (first, second, _))| match second {
            Some(id) => (Some(unescape(first)), unescape(id)),
            None => (None, unescape(first)),
        })
        .map_err(|_| {
            (
                "intersection_of",
                "intersection_of expects: `[<relation>] <class>`".to_string(),
            )
        })
}

fn property_value_body(value: &str) -> Result<(String, String, Option<String>), RuleError> {
    fn parser(input: &str) -> IResult<&str, (&str, String, Option<&str>)> {
        let (input, relation) = token(input)?;
        let (input, _) = multispace1(input)?;
        let (input, value) = alt((quoted_string, map(token, unescape)))(input)?;
        let (input, datatype) = opt(preceded(multispace1, token))(input)?;
        let (input, _) = multispace0(input)?;
        Ok((input, (relation, value, datatype)))
    }

    all_consuming(parser)(value)
        .map(|(_, (relation, value, datatype))| {
            (unescape(relation), value, datatype.map(str::to_string))
        })
        .map_err(|_| {
            (
                "property_value",
                "property_value expects: `<relation> <value> [<datatype>]`".to_string(),
            )
        })
}

fn parse_modifier(block: &str) -> Result<TrailingModifier, RuleError> {
    all_consuming(modifier_block)(block)
        .map(|(_, m)| m)
        .map_err(|_| {
            (
                "trailing-modifier",
                "modifier expects: `{key=value, ...}`".to_string(),
            )
        })
}

// ============================================================================
// Lexical helpers
// ============================================================================

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn tag_prefix(input: &str) -> IResult<&str, &str> {
    let (input, _) = space0(input)?;
    let (input, name) = take_while1(is_tag_char)(input)?;
    let (input, _) = pchar(':')(input)?;
    let (input, _) = space0(input)?;
    Ok((input, name))
}

fn token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace())(input)
}

fn modifier_block(input: &str) -> IResult<&str, TrailingModifier> {
    fn key_value(input: &str) -> IResult<&str, KeyValue> {
        let (input, _) = multispace0(input)?;
        let (input, key) =
            take_while1(|c: char| c != '=' && c != ',' && c != '}' && !c.is_whitespace())(input)?;
        let (input, _) = tuple((multispace0, tag("="), multispace0))(input)?;
        let (input, value) = alt((
            quoted_string,
            map(take_while1(|c: char| c != ',' && c != '}'), |s: &str| {
                unescape(s.trim())
            }),
        ))(input)?;
        let (input, _) = multispace0(input)?;
        Ok((
            input,
            KeyValue {
                key: key.to_string(),
                value,
            },
        ))
    }

    let (input, pairs) = delimited(
        pchar('{'),
        separated_list0(pchar(','), key_value),
        preceded(multispace0, pchar('}')),
    )(input)?;
    Ok((input, TrailingModifier { pairs }))
}

fn dbxref_list(input: &str) -> IResult<&str, Vec<Dbxref>> {
    fn item(input: &str) -> IResult<&str, Dbxref> {
        let (input, _) = multispace0(input)?;
        let (input, name) = dbxref_name(input)?;
        let (input, description) = opt(preceded(multispace1, quoted_string))(input)?;
        let (input, _) = multispace0(input)?;
        Ok((input, Dbxref { name, description }))
    }

    delimited(
        pchar('['),
        separated_list0(pchar(','), item),
        preceded(multispace0, pchar(']')),
    )(input)
}

/// Dbxref name: runs to the first unescaped whitespace, `,` or `]`.
fn dbxref_name(input: &str) -> IResult<&str, String> {
    let mut out = String::new();
    let mut end = input.len();
    let mut chars = input.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, e)) => out.push(unescape_char(e)),
                None => out.push('\\'),
            },
            ',' | ']' => {
                end = i;
                break;
            }
            c if c.is_whitespace() => {
                end = i;
                break;
            }
            c => out.push(c),
        }
    }

    if out.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TakeWhile1,
        )));
    }
    Ok((&input[end..], out))
}

/// `"..."` with OBO escapes; returns the unescaped content.
fn quoted_string(input: &str) -> IResult<&str, String> {
    let (rest, _) = pchar('"')(input)?;
    let mut out = String::new();
    let mut chars = rest.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, e)) => out.push(unescape_char(e)),
                None => break,
            },
            '"' => return Ok((&rest[i + 1..], out)),
            c => out.push(c),
        }
    }

    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

fn unescape_char(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'W' => ' ',
        other => other,
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(e) => out.push(unescape_char(e)),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
