//! Minimal tag-delimited markup writer and depth-tracking pull reader.
//!
//! Only the subset the store format needs is supported: elements with
//! quoted attributes, character data with the five predefined entities and
//! numeric references, CDATA sections, comments and the leading
//! declaration. Document type declarations are rejected.

use std::borrow::Cow;

use crate::error::{EnvelopeError, EnvelopeResult};

/// Markup declaration written at the top of every document.
pub const DECLARATION: &str = "<?xml version='1.0' encoding='utf-8' standalone='yes' ?>";

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Names follow `[A-Za-z_][A-Za-z0-9_.-]*`.
fn is_name_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c == '-' || c == '.' || c.is_ascii_digit()
}

/// Byte length of the tag name at the start of `s`, 0 if there is none.
fn name_length(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if is_name_start(c) => {}
        _ => return 0,
    }
    for (i, c) in chars {
        if !is_name_char(c) {
            return i;
        }
    }
    s.len()
}

/// Returns `true` if `name` is usable as a tag name.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name_length(name) == name.len()
}

/// Returns `true` if `text` is empty or only whitespace.
pub fn is_blank(text: &str) -> bool {
    text.chars().all(is_space)
}

/// Escape character data or an attribute value.
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(&['&', '<', '>', '"', '\''][..]) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Resolve entity references in raw character data.
///
/// `offset` is the position of `raw` in its document, used in errors.
pub fn unescape(raw: &str, offset: usize) -> EnvelopeResult<Cow<'_, str>> {
    if let Some(i) = raw.find('<') {
        return Err(EnvelopeError::Syntax {
            offset: offset + i,
            message: "'<' in character data".into(),
        });
    }
    if !raw.contains('&') {
        return Ok(Cow::Borrowed(raw));
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    let mut consumed = 0;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let invalid = |entity: &str| EnvelopeError::InvalidEntity {
            offset: offset + consumed + amp,
            entity: entity.to_string(),
        };
        let semi = after.find(';').ok_or_else(|| invalid(after))?;
        let entity = &after[..semi];
        let resolved = match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32).ok_or_else(|| invalid(entity))?
            }
        };
        out.push(resolved);
        let step = amp + 1 + semi + 1;
        consumed += step;
        rest = &rest[step..];
    }
    out.push_str(rest);
    Ok(Cow::Owned(out))
}

/// One attribute of a start tag. The value is kept raw (still escaped).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub name: &'a str,
    pub raw_value: &'a str,
}

/// A start tag, or an empty-element tag when `self_closing` is set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartTag<'a> {
    pub name: &'a str,
    pub attributes: Vec<Attribute<'a>>,
    pub self_closing: bool,
}

impl<'a> StartTag<'a> {
    /// Raw value of the named attribute.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.raw_value)
    }
}

/// Lexical unit produced by [`XmlReader::next_token`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token<'a> {
    /// `<? ... ?>`
    Declaration,
    /// `<!-- ... -->`
    Comment,
    /// Contents of `<![CDATA[ ... ]]>`.
    CData(&'a str),
    Start(StartTag<'a>),
    End { name: &'a str },
    /// Raw character data, entities unresolved.
    Text(&'a str),
}

/// Typed value element as written by [`XmlWriter::int_value`] and friends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlValue {
    Null,
    Int(i64),
    Bool(bool),
    Str(String),
}

/// Pull reader over a borrowed document.
///
/// The reader tracks the stack of open elements: [`depth`](Self::depth) is
/// the number of currently open elements, and closing tags are checked
/// against the innermost open name.
pub struct XmlReader<'a> {
    src: &'a str,
    pos: usize,
    token_start: usize,
    open: Vec<&'a str>,
}

impl<'a> XmlReader<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            token_start: 0,
            open: Vec::new(),
        }
    }

    /// Create a reader over UTF-8 bytes.
    pub fn from_bytes(bytes: &'a [u8]) -> EnvelopeResult<Self> {
        Ok(Self::new(std::str::from_utf8(bytes)?))
    }

    /// Number of open elements.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Byte offset just past the last token.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Byte offset where the last token began.
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    fn syntax(&self, at: usize, message: impl Into<String>) -> EnvelopeError {
        EnvelopeError::Syntax {
            offset: self.token_start + at,
            message: message.into(),
        }
    }

    /// Position just past `terminator`, searching from the current token.
    fn find_end(&self, rest: &str, terminator: &str, what: &str) -> EnvelopeResult<usize> {
        rest.find(terminator)
            .map(|i| i + terminator.len())
            .ok_or_else(|| EnvelopeError::UnexpectedEof {
                expected: format!("end of {what}"),
            })
    }

    /// Read the next token, or `None` at the end of input.
    pub fn next_token(&mut self) -> EnvelopeResult<Option<Token<'a>>> {
        if self.pos >= self.src.len() {
            return Ok(None);
        }
        self.token_start = self.pos;
        let src = self.src;
        let rest = &src[self.pos..];

        if !rest.starts_with('<') {
            let end = rest.find('<').unwrap_or(rest.len());
            self.pos += end;
            return Ok(Some(Token::Text(&rest[..end])));
        }
        if rest.starts_with("<?") {
            self.pos += self.find_end(rest, "?>", "declaration")?;
            return Ok(Some(Token::Declaration));
        }
        if rest.starts_with("<!--") {
            self.pos += self.find_end(rest, "-->", "comment")?;
            return Ok(Some(Token::Comment));
        }
        if let Some(body) = rest.strip_prefix("<![CDATA[") {
            let end = self.find_end(body, "]]>", "CDATA section")?;
            self.pos += "<![CDATA[".len() + end;
            return Ok(Some(Token::CData(&body[..end - "]]>".len()])));
        }
        if rest.starts_with("<!") {
            return Err(self.syntax(0, "unsupported markup declaration"));
        }
        if let Some(after) = rest.strip_prefix("</") {
            return self.end_tag(after).map(Some);
        }
        self.start_tag(rest).map(Some)
    }

    fn end_tag(&mut self, after: &'a str) -> EnvelopeResult<Token<'a>> {
        let name_len = name_length(after);
        if name_len == 0 {
            return Err(self.syntax(2, "expected tag name"));
        }
        let name = &after[..name_len];
        let tail = &after[name_len..];
        let trimmed = tail.trim_start_matches(is_space);
        if trimmed.is_empty() {
            return Err(EnvelopeError::UnexpectedEof {
                expected: format!("'>' closing </{name}"),
            });
        }
        if !trimmed.starts_with('>') {
            return Err(self.syntax(2 + name_len, "expected '>'"));
        }
        match self.open.pop() {
            Some(open) if open == name => {}
            Some(open) => {
                return Err(EnvelopeError::MismatchedTag {
                    offset: self.token_start,
                    expected: open.to_string(),
                    found: name.to_string(),
                })
            }
            None => return Err(self.syntax(0, format!("closing tag </{name}> without open tag"))),
        }
        self.pos += 2 + name_len + (tail.len() - trimmed.len()) + 1;
        Ok(Token::End { name })
    }

    fn start_tag(&mut self, rest: &'a str) -> EnvelopeResult<Token<'a>> {
        let name_len = name_length(&rest[1..]);
        if name_len == 0 {
            return Err(self.syntax(1, "expected tag name"));
        }
        let name = &rest[1..1 + name_len];
        let mut i = 1 + name_len;
        let mut attributes = Vec::new();
        let self_closing;

        loop {
            let tail = &rest[i..];
            let trimmed = tail.trim_start_matches(is_space);
            let ws = tail.len() - trimmed.len();
            i += ws;
            if trimmed.starts_with("/>") {
                i += 2;
                self_closing = true;
                break;
            }
            if trimmed.starts_with('>') {
                i += 1;
                self_closing = false;
                break;
            }
            if trimmed.is_empty() {
                return Err(EnvelopeError::UnexpectedEof {
                    expected: format!("'>' closing <{name}"),
                });
            }
            if ws == 0 {
                return Err(self.syntax(i, "expected whitespace before attribute"));
            }

            let attr_len = name_length(trimmed);
            if attr_len == 0 {
                return Err(self.syntax(i, "expected attribute name"));
            }
            let attr_name = &trimmed[..attr_len];
            i += attr_len;

            let tail = &rest[i..];
            let trimmed = tail.trim_start_matches(is_space);
            i += tail.len() - trimmed.len();
            if !trimmed.starts_with('=') {
                return Err(self.syntax(i, "expected '=' after attribute name"));
            }
            i += 1;

            let tail = &rest[i..];
            let trimmed = tail.trim_start_matches(is_space);
            i += tail.len() - trimmed.len();
            let quote = match trimmed.chars().next() {
                Some(q @ ('"' | '\'')) => q,
                Some(_) => return Err(self.syntax(i, "expected quoted attribute value")),
                None => {
                    return Err(EnvelopeError::UnexpectedEof {
                        expected: "attribute value".into(),
                    })
                }
            };
            i += 1;
            let close = rest[i..].find(quote).ok_or_else(|| EnvelopeError::UnexpectedEof {
                expected: "closing quote".into(),
            })?;
            let raw_value = &rest[i..i + close];
            if raw_value.contains('<') {
                return Err(self.syntax(i, "'<' in attribute value"));
            }
            i += close + 1;
            attributes.push(Attribute {
                name: attr_name,
                raw_value,
            });
        }

        if !self_closing {
            self.open.push(name);
        }
        self.pos += i;
        Ok(Token::Start(StartTag {
            name,
            attributes,
            self_closing,
        }))
    }

    /// Advance to the next child element of the element at the current depth.
    ///
    /// Whitespace, comments and declarations are skipped. Returns `None` once
    /// the closing tag of the current element has been consumed, or at the
    /// end of input when no element is open.
    pub fn next_child(&mut self) -> EnvelopeResult<Option<StartTag<'a>>> {
        loop {
            match self.next_token()? {
                None => {
                    return match self.open.last() {
                        None => Ok(None),
                        Some(open) => Err(EnvelopeError::UnexpectedEof {
                            expected: format!("</{open}>"),
                        }),
                    }
                }
                Some(Token::Start(tag)) => return Ok(Some(tag)),
                Some(Token::End { .. }) => return Ok(None),
                Some(Token::Declaration) | Some(Token::Comment) => continue,
                Some(Token::Text(text)) if is_blank(text) => continue,
                Some(Token::Text(_)) | Some(Token::CData(_)) => {
                    return Err(EnvelopeError::UnexpectedText {
                        offset: self.token_start,
                    })
                }
            }
        }
    }

    /// Consume the content of `tag` through its closing tag and return the
    /// raw inner content.
    ///
    /// Must be called directly after `tag` was returned by the reader.
    pub fn element_content(&mut self, tag: &StartTag<'a>) -> EnvelopeResult<&'a str> {
        if tag.self_closing {
            return Ok("");
        }
        let src = self.src;
        let outer = self.depth().saturating_sub(1);
        let content_start = self.pos;
        loop {
            match self.next_token()? {
                None => {
                    return Err(EnvelopeError::UnexpectedEof {
                        expected: format!("</{}>", tag.name),
                    })
                }
                Some(Token::End { .. }) if self.depth() == outer => {
                    return Ok(&src[content_start..self.token_start]);
                }
                Some(_) => {}
            }
        }
    }

    /// Skip `tag` and everything nested in it.
    pub fn skip_element(&mut self, tag: &StartTag<'a>) -> EnvelopeResult<()> {
        self.element_content(tag).map(|_| ())
    }

    /// Interpret `tag` as a typed value element and consume it.
    ///
    /// Returns the `name` attribute and the value.
    pub fn read_value(&mut self, tag: &StartTag<'a>) -> EnvelopeResult<(String, XmlValue)> {
        let name = match tag.attr("name") {
            Some(raw) => unescape(raw, self.token_start)?.into_owned(),
            None => {
                return Err(EnvelopeError::MalformedValue {
                    name: tag.name.to_string(),
                    reason: "missing name attribute".into(),
                })
            }
        };
        let malformed = |reason: String| EnvelopeError::MalformedValue {
            name: name.clone(),
            reason,
        };
        let value = match tag.name {
            "null" => XmlValue::Null,
            "int" | "long" => {
                let raw = tag
                    .attr("value")
                    .ok_or_else(|| malformed("missing value attribute".into()))?;
                let parsed = raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| malformed(format!("{raw:?}: {e}")))?;
                XmlValue::Int(parsed)
            }
            "boolean" => match tag.attr("value") {
                Some("true") => XmlValue::Bool(true),
                Some("false") => XmlValue::Bool(false),
                other => return Err(malformed(format!("invalid boolean {other:?}"))),
            },
            "string" => {
                let offset = self.pos;
                let content = self.element_content(tag)?;
                return Ok((name, XmlValue::Str(unescape(content, offset)?.into_owned())));
            }
            other => return Err(malformed(format!("unknown value type <{other}>"))),
        };
        self.skip_element(tag)?;
        Ok((name, value))
    }
}

/// Check that `fragment` is well-formed element content: balanced tags,
/// valid entity references, no declarations.
pub fn check_fragment(fragment: &str) -> EnvelopeResult<()> {
    let mut reader = XmlReader::new(fragment);
    while let Some(token) = reader.next_token()? {
        match token {
            Token::Declaration => {
                return Err(EnvelopeError::Syntax {
                    offset: reader.token_start(),
                    message: "declaration inside content".into(),
                })
            }
            Token::Text(text) => {
                unescape(text, reader.token_start())?;
            }
            Token::Start(tag) => {
                for attr in &tag.attributes {
                    unescape(attr.raw_value, reader.token_start())?;
                }
            }
            Token::Comment | Token::CData(_) | Token::End { .. } => {}
        }
    }
    match reader.open.last() {
        None => Ok(()),
        Some(open) => Err(EnvelopeError::UnexpectedEof {
            expected: format!("</{open}>"),
        }),
    }
}

/// Builder for documents and payload fragments.
///
/// The writer does not validate names; fragments it produces are checked by
/// the envelope encoder before they are committed.
#[derive(Clone, Debug, Default)]
pub struct XmlWriter {
    buf: String,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declaration(&mut self) -> &mut Self {
        self.buf.push_str(DECLARATION);
        self.buf.push('\n');
        self
    }

    pub fn start_section(&mut self, name: &str) -> &mut Self {
        self.buf.push('<');
        self.buf.push_str(name);
        self.buf.push('>');
        self
    }

    pub fn end_section(&mut self, name: &str) -> &mut Self {
        self.buf.push_str("</");
        self.buf.push_str(name);
        self.buf.push('>');
        self
    }

    pub fn empty_section(&mut self, name: &str) -> &mut Self {
        self.buf.push('<');
        self.buf.push_str(name);
        self.buf.push_str(" />");
        self
    }

    /// `<int name="..." value="..." />`
    pub fn int_value(&mut self, name: &str, value: i64) -> &mut Self {
        self.buf.push_str(&format!(
            "<int name=\"{}\" value=\"{value}\" />",
            escape(name)
        ));
        self
    }

    /// `<boolean name="..." value="..." />`
    pub fn bool_value(&mut self, name: &str, value: bool) -> &mut Self {
        self.buf.push_str(&format!(
            "<boolean name=\"{}\" value=\"{value}\" />",
            escape(name)
        ));
        self
    }

    /// `<string name="...">...</string>`, or `<null name="..." />` for `None`.
    pub fn string_value(&mut self, name: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) => self.buf.push_str(&format!(
                "<string name=\"{}\">{}</string>",
                escape(name),
                escape(v)
            )),
            None => self
                .buf
                .push_str(&format!("<null name=\"{}\" />", escape(name))),
        }
        self
    }

    /// Escaped character data.
    pub fn text(&mut self, text: &str) -> &mut Self {
        self.buf.push_str(&escape(text));
        self
    }

    /// Content inserted verbatim.
    pub fn raw(&mut self, content: &str) -> &mut Self {
        self.buf.push_str(content);
        self
    }

    pub fn newline(&mut self) -> &mut Self {
        self.buf.push('\n');
        self
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.into_bytes()
    }
}
