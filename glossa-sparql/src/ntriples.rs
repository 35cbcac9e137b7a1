//! N-Triples decoder.
//!
//! Decodes the line-based N-Triples serialization returned for CONSTRUCT
//! queries into [`Statement`]s. Comments and blank lines are skipped.
//! Errors carry the 1-based line number.

use glossa_core::{ParseError, Statement, Term};

/// Decode a whole N-Triples document.
pub fn parse_ntriples(input: &str) -> Result<Vec<Statement>, ParseError> {
    let mut statements = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let mut cursor = Cursor::new(line, index + 1);
        cursor.skip_ws();
        if cursor.at_end_or_comment() {
            continue;
        }
        statements.push(cursor.statement()?);
    }
    Ok(statements)
}

/// Decode N-Triples from raw bytes.
pub fn parse_ntriples_bytes(input: &[u8]) -> Result<Vec<Statement>, ParseError> {
    let text = std::str::from_utf8(input).map_err(|e| ParseError::InvalidEncoding {
        reason: e.to_string(),
    })?;
    parse_ntriples(text)
}

struct Cursor<'a> {
    line: &'a str,
    pos: usize,
    line_no: usize,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str, line_no: usize) -> Self {
        Self {
            line,
            pos: 0,
            line_no,
        }
    }

    fn error(&self, reason: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            line: self.line_no,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.line[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of line", expected))),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\r')) {
            self.pos += 1;
        }
    }

    fn at_end_or_comment(&self) -> bool {
        matches!(self.peek(), None | Some('#'))
    }

    fn statement(&mut self) -> Result<Statement, ParseError> {
        let subject = match self.peek() {
            Some('<') => self.iri()?,
            Some('_') => self.blank_node()?,
            _ => return Err(self.error("subject must be an IRI or blank node")),
        };
        self.skip_ws();
        if self.peek() != Some('<') {
            return Err(self.error("predicate must be an IRI"));
        }
        let predicate = self.iri()?;
        self.skip_ws();
        let object = match self.peek() {
            Some('<') => Term::Iri(self.iri()?),
            Some('_') => Term::BlankNode(self.blank_node()?),
            Some('"') => self.literal()?,
            _ => return Err(self.error("object must be an IRI, blank node or literal")),
        };
        self.skip_ws();
        self.expect('.')?;
        self.skip_ws();
        if !self.at_end_or_comment() {
            return Err(self.error("unexpected content after '.'"));
        }
        Ok(Statement {
            subject,
            predicate,
            object,
        })
    }

    fn iri(&mut self) -> Result<String, ParseError> {
        self.expect('<')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('>') => return Ok(out),
                Some('\\') => out.push(self.unicode_escape()?),
                Some(c) if c <= ' ' || matches!(c, '<' | '"' | '{' | '}' | '|' | '^' | '`') => {
                    return Err(self.error(format!("invalid character {:?} in IRI", c)));
                }
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated IRI")),
            }
        }
    }

    fn blank_node(&mut self) -> Result<String, ParseError> {
        self.expect('_')?;
        self.expect(':')?;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        // a label may contain '.' but not end with one
        while self.pos > start && self.line[..self.pos].ends_with('.') {
            self.pos -= 1;
        }
        if self.pos == start {
            return Err(self.error("empty blank node label"));
        }
        Ok(self.line[start..self.pos].to_string())
    }

    fn literal(&mut self) -> Result<Term, ParseError> {
        self.expect('"')?;
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => value.push(self.string_escape()?),
                Some(c) => value.push(c),
                None => return Err(self.error("unterminated string literal")),
            }
        }
        match self.peek() {
            Some('@') => {
                self.pos += 1;
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c.is_ascii_alphanumeric() || c == '-' {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                let tag = &self.line[start..self.pos];
                if tag.is_empty() || !tag.starts_with(|c: char| c.is_ascii_alphabetic()) {
                    return Err(self.error("invalid language tag"));
                }
                Ok(Term::Literal {
                    value,
                    language: Some(tag.to_string()),
                    datatype: None,
                })
            }
            Some('^') => {
                self.expect('^')?;
                self.expect('^')?;
                let datatype = self.iri()?;
                Ok(Term::Literal {
                    value,
                    language: None,
                    datatype: Some(datatype),
                })
            }
            _ => Ok(Term::Literal {
                value,
                language: None,
                datatype: None,
            }),
        }
    }

    fn string_escape(&mut self) -> Result<char, ParseError> {
        match self.bump() {
            Some('t') => Ok('\t'),
            Some('b') => Ok('\u{8}'),
            Some('n') => Ok('\n'),
            Some('r') => Ok('\r'),
            Some('f') => Ok('\u{c}'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some('\\') => Ok('\\'),
            Some('u') => self.hex_char(4),
            Some('U') => self.hex_char(8),
            Some(c) => Err(self.error(format!("invalid escape '\\{}'", c))),
            None => Err(self.error("dangling escape")),
        }
    }

    fn unicode_escape(&mut self) -> Result<char, ParseError> {
        match self.bump() {
            Some('u') => self.hex_char(4),
            Some('U') => self.hex_char(8),
            _ => Err(self.error("only \\u and \\U escapes are allowed in IRIs")),
        }
    }

    fn hex_char(&mut self, digits: usize) -> Result<char, ParseError> {
        let end = self.pos + digits;
        let hex = self
            .line
            .get(self.pos..end)
            .ok_or_else(|| self.error("truncated unicode escape"))?;
        let code = u32::from_str_radix(hex, 16)
            .map_err(|_| self.error(format!("invalid hex in unicode escape: {}", hex)))?;
        self.pos = end;
        char::from_u32(code).ok_or_else(|| self.error(format!("invalid code point U+{:X}", code)))
    }
}
