use confstore_types::DataVersion;
use tracing::debug;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::xml::{self, StartTag, Token, XmlReader, XmlValue, XmlWriter};

/// Root element of every store document.
pub const DOCUMENT_TAG: &str = "ConfigStoreData";
/// Name of the version value written right after the root start tag.
pub const VERSION_TAG: &str = "Version";
/// Header block carried by version 2 documents. Skipped, never interpreted.
pub const INTEGRITY_TAG: &str = "Integrity";

/// One named section: the opaque payload owned by a single provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub payload: Vec<u8>,
}

impl Section {
    pub fn new(name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }
}

/// The on-disk unit: a format version and an ordered list of sections.
///
/// Section order carries no meaning but is preserved by encode/decode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub version: DataVersion,
    pub sections: Vec<Section>,
}

impl Envelope {
    /// An empty envelope at the current version.
    pub fn new() -> Self {
        Self {
            version: DataVersion::CURRENT,
            sections: Vec::new(),
        }
    }

    pub fn with_section(mut self, name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        self.sections.push(Section::new(name, payload));
        self
    }

    /// First section with the given name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed view of one section produced by [`EnvelopeParser`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectionRef<'a> {
    pub name: &'a str,
    /// Raw inner content, exactly as it appears between the section tags.
    pub content: &'a [u8],
}

impl SectionRef<'_> {
    pub fn to_owned_section(&self) -> Section {
        Section::new(self.name, self.content)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParseState {
    /// Before the root start tag.
    Start,
    /// Root open; version not read yet.
    Header,
    /// Version read; iterating sections.
    Sections,
    /// Root closed and trailing content checked.
    Done,
}

/// Decode state machine over one document.
///
/// ```text
/// Start --root tag--> Header --version [+ integrity skip]--> Sections --root end--> Done
/// ```
///
/// Sections are found at depth 1 only, so markup nested inside a payload is
/// never mistaken for a sibling section.
pub struct EnvelopeParser<'a> {
    reader: XmlReader<'a>,
    state: ParseState,
    version: Option<DataVersion>,
}

impl<'a> EnvelopeParser<'a> {
    pub fn new(bytes: &'a [u8]) -> EnvelopeResult<Self> {
        Ok(Self {
            reader: XmlReader::from_bytes(bytes)?,
            state: ParseState::Start,
            version: None,
        })
    }

    /// Version of the document, once the header has been read.
    pub fn version(&self) -> Option<DataVersion> {
        self.version
    }

    /// Locate the root, read and validate the version, and skip the
    /// integrity block of version 2 documents.
    ///
    /// Idempotent once the header has been read.
    pub fn read_header(&mut self) -> EnvelopeResult<DataVersion> {
        if let Some(version) = self.version {
            return Ok(version);
        }
        self.goto_document_start()?;
        self.state = ParseState::Header;

        let version = self.read_version()?;
        if version.has_integrity_block() {
            self.skip_integrity_block()?;
        }
        self.version = Some(version);
        self.state = ParseState::Sections;
        Ok(version)
    }

    fn goto_document_start(&mut self) -> EnvelopeResult<()> {
        loop {
            let offset = self.reader.offset();
            let found = match self.reader.next_token()? {
                None => "end of document".to_string(),
                Some(Token::Declaration) | Some(Token::Comment) => continue,
                Some(Token::Text(text)) if xml::is_blank(text) => continue,
                Some(Token::Start(tag)) if tag.name == DOCUMENT_TAG && !tag.self_closing => {
                    return Ok(())
                }
                Some(Token::Start(tag)) => format!("<{}>", tag.name),
                Some(Token::End { name }) => format!("</{name}>"),
                Some(Token::Text(_)) | Some(Token::CData(_)) => {
                    format!("character data at byte {offset}")
                }
            };
            return Err(EnvelopeError::MissingDocumentStart {
                expected: DOCUMENT_TAG,
                found,
            });
        }
    }

    fn read_version(&mut self) -> EnvelopeResult<DataVersion> {
        let tag = match self.reader.next_child()? {
            Some(tag) if tag.name == "int" && tag.attr("name") == Some(VERSION_TAG) => tag,
            _ => return Err(EnvelopeError::MissingVersion),
        };
        let raw = match self.reader.read_value(&tag) {
            Ok((_, XmlValue::Int(raw))) => raw,
            Ok((_, other)) => return Err(EnvelopeError::MalformedVersion(format!("{other:?}"))),
            Err(EnvelopeError::MalformedValue { reason, .. }) => {
                return Err(EnvelopeError::MalformedVersion(reason))
            }
            Err(e) => return Err(e),
        };
        Ok(DataVersion::new(raw)?)
    }

    fn skip_integrity_block(&mut self) -> EnvelopeResult<()> {
        match self.reader.next_child()? {
            Some(tag) if tag.name == INTEGRITY_TAG => {
                self.reader.skip_element(&tag)?;
                debug!("skipped obsolete integrity block");
                Ok(())
            }
            _ => Err(EnvelopeError::MissingIntegrityBlock),
        }
    }

    /// Next section of the document, or `None` once the root is closed.
    pub fn next_section(&mut self) -> EnvelopeResult<Option<SectionRef<'a>>> {
        match self.state {
            ParseState::Start | ParseState::Header => {
                self.read_header()?;
            }
            ParseState::Sections => {}
            ParseState::Done => return Ok(None),
        }

        let tag = match self.reader.next_child() {
            Ok(Some(tag)) => tag,
            Ok(None) => {
                self.finish()?;
                return Ok(None);
            }
            Err(EnvelopeError::UnexpectedEof { .. }) => {
                return Err(EnvelopeError::MissingDocumentEnd(DOCUMENT_TAG))
            }
            Err(e) => return Err(e),
        };
        let content = self.section_content(&tag)?;
        Ok(Some(SectionRef {
            name: tag.name,
            content: content.as_bytes(),
        }))
    }

    fn section_content(&mut self, tag: &StartTag<'a>) -> EnvelopeResult<&'a str> {
        match self.reader.element_content(tag) {
            Err(EnvelopeError::UnexpectedEof { .. }) => {
                Err(EnvelopeError::MissingDocumentEnd(DOCUMENT_TAG))
            }
            other => other,
        }
    }

    /// Only whitespace and comments may follow the root end.
    fn finish(&mut self) -> EnvelopeResult<()> {
        loop {
            let offset = self.reader.offset();
            match self.reader.next_token() {
                Ok(None) => break,
                Ok(Some(Token::Comment)) => {}
                Ok(Some(Token::Text(text))) if xml::is_blank(text) => {}
                _ => return Err(EnvelopeError::TrailingContent { offset }),
            }
        }
        self.state = ParseState::Done;
        Ok(())
    }
}

/// Encoder/decoder for whole envelopes.
pub struct EnvelopeCodec;

impl EnvelopeCodec {
    /// Encode an envelope.
    ///
    /// Section names must be valid tag names and payloads well-formed markup
    /// fragments, so that every committed document parses back.
    pub fn encode(envelope: &Envelope) -> EnvelopeResult<Vec<u8>> {
        let mut out = XmlWriter::new();
        out.declaration();
        out.start_section(DOCUMENT_TAG).newline();
        out.int_value(VERSION_TAG, i64::from(envelope.version.get())).newline();
        if envelope.version.has_integrity_block() {
            out.empty_section(INTEGRITY_TAG).newline();
        }
        for section in &envelope.sections {
            let payload = Self::validate_section(section)?;
            if payload.is_empty() {
                out.empty_section(&section.name);
            } else {
                out.start_section(&section.name)
                    .raw(payload)
                    .end_section(&section.name);
            }
            out.newline();
        }
        out.end_section(DOCUMENT_TAG).newline();
        Ok(out.into_bytes())
    }

    fn validate_section(section: &Section) -> EnvelopeResult<&str> {
        if !xml::is_valid_name(&section.name) {
            return Err(EnvelopeError::InvalidSectionName(section.name.clone()));
        }
        let malformed = |reason: String| EnvelopeError::MalformedPayload {
            section: section.name.clone(),
            reason,
        };
        let payload =
            std::str::from_utf8(&section.payload).map_err(|e| malformed(e.to_string()))?;
        xml::check_fragment(payload).map_err(|e| malformed(e.to_string()))?;
        Ok(payload)
    }

    /// Decode a whole document into an owned envelope.
    pub fn decode(bytes: &[u8]) -> EnvelopeResult<Envelope> {
        let mut parser = EnvelopeParser::new(bytes)?;
        let version = parser.read_header()?;
        let mut sections = Vec::new();
        while let Some(section) = parser.next_section()? {
            sections.push(section.to_owned_section());
        }
        Ok(Envelope { version, sections })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confstore_types::TypeError;
    use proptest::prelude::*;

    fn doc(body: &str) -> Vec<u8> {
        format!("{}\n<{DOCUMENT_TAG}>\n{body}</{DOCUMENT_TAG}>\n", xml::DECLARATION).into_bytes()
    }

    fn version_line(v: i64) -> String {
        format!("<int name=\"Version\" value=\"{v}\" />\n")
    }

    #[test]
    fn encode_layout() {
        let env = Envelope::new().with_section("A", "X").with_section("B", "");
        let bytes = EnvelopeCodec::encode(&env).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            format!(
                "{}\n<ConfigStoreData>\n<int name=\"Version\" value=\"3\" />\n<A>X</A>\n<B />\n</ConfigStoreData>\n",
                xml::DECLARATION
            )
        );
    }

    #[test]
    fn roundtrip_preserves_order_and_bytes() {
        let env = Envelope::new()
            .with_section("Zeta", "<Network><SSID>home</SSID></Network>")
            .with_section("Alpha", "  spaced text &amp; more  ")
            .with_section("Empty", "");
        let decoded = EnvelopeCodec::decode(&EnvelopeCodec::encode(&env).unwrap()).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn nested_tag_with_section_name_is_not_a_sibling() {
        let env = Envelope::new()
            .with_section("A", "<B>inner</B><A>same name nested</A>")
            .with_section("B", "outer");
        let decoded = EnvelopeCodec::decode(&EnvelopeCodec::encode(&env).unwrap()).unwrap();
        assert_eq!(decoded.sections.len(), 2);
        assert_eq!(decoded.section("B").unwrap().payload, b"outer");
    }

    #[test]
    fn version_zero_rejected() {
        let err = EnvelopeCodec::decode(&doc(&version_line(0))).unwrap_err();
        assert!(matches!(
            err,
            EnvelopeError::InvalidVersion(TypeError::InvalidVersion { version: 0, .. })
        ));
    }

    #[test]
    fn future_version_rejected() {
        let next = i64::from(DataVersion::CURRENT.get()) + 1;
        let err = EnvelopeCodec::decode(&doc(&version_line(next))).unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidVersion(_)));
    }

    #[test]
    fn integrity_block_skipped() {
        let body = format!(
            "{}<Integrity>\n<EncryptedData>\n<byte-array name=\"EncryptedData\" num=\"2\">abcd</byte-array>\n</EncryptedData>\n</Integrity>\n<A>payload</A>\n",
            version_line(2)
        );
        let env = EnvelopeCodec::decode(&doc(&body)).unwrap();
        assert_eq!(env.version, DataVersion::INTEGRITY);
        assert_eq!(env.sections, vec![Section::new("A", "payload")]);
    }

    #[test]
    fn integrity_block_required_at_version_two() {
        let body = format!("{}<A>payload</A>\n", version_line(2));
        let err = EnvelopeCodec::decode(&doc(&body)).unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingIntegrityBlock));
    }

    #[test]
    fn integrity_version_encodes_placeholder_block() {
        let env = Envelope {
            version: DataVersion::INTEGRITY,
            sections: vec![Section::new("A", "x")],
        };
        let decoded = EnvelopeCodec::decode(&EnvelopeCodec::encode(&env).unwrap()).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn version_one_accepted() {
        let body = format!("{}<A>1</A>\n", version_line(1));
        let env = EnvelopeCodec::decode(&doc(&body)).unwrap();
        assert_eq!(env.version, DataVersion::INITIAL);
    }

    #[test]
    fn missing_document_start() {
        let err = EnvelopeCodec::decode(b"<Other><int name=\"Version\" value=\"3\" /></Other>")
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingDocumentStart { .. }));

        let err = EnvelopeCodec::decode(b"junk<ConfigStoreData></ConfigStoreData>").unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingDocumentStart { .. }));

        let err = EnvelopeCodec::decode(b"").unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingDocumentStart { .. }));
    }

    #[test]
    fn missing_version() {
        let err = EnvelopeCodec::decode(&doc("<A>x</A>\n")).unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingVersion));
    }

    #[test]
    fn malformed_version() {
        let err = EnvelopeCodec::decode(&doc("<int name=\"Version\" value=\"three\" />\n"))
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::MalformedVersion(_)));
    }

    #[test]
    fn missing_document_end() {
        let text = format!(
            "{}\n<ConfigStoreData>\n{}<A>x</A>\n",
            xml::DECLARATION,
            version_line(3)
        );
        let err = EnvelopeCodec::decode(text.as_bytes()).unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingDocumentEnd(DOCUMENT_TAG)));

        let text = format!(
            "<ConfigStoreData>\n{}<A>unterminated",
            version_line(3)
        );
        let err = EnvelopeCodec::decode(text.as_bytes()).unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingDocumentEnd(DOCUMENT_TAG)));
    }

    #[test]
    fn trailing_content_rejected() {
        let mut bytes = doc(&version_line(3));
        bytes.extend_from_slice(b"<Extra/>");
        let err = EnvelopeCodec::decode(&bytes).unwrap_err();
        assert!(matches!(err, EnvelopeError::TrailingContent { .. }));
    }

    #[test]
    fn trailing_comment_allowed() {
        let mut bytes = doc(&version_line(3));
        bytes.extend_from_slice(b"<!-- written by test -->\n");
        assert!(EnvelopeCodec::decode(&bytes).is_ok());
    }

    #[test]
    fn invalid_utf8_rejected() {
        let err = EnvelopeCodec::decode(&[0x3c, 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidUtf8(_)));
    }

    #[test]
    fn encode_rejects_bad_names_and_payloads() {
        let bad_name = Envelope::new().with_section("has space", "x");
        assert!(matches!(
            EnvelopeCodec::encode(&bad_name).unwrap_err(),
            EnvelopeError::InvalidSectionName(_)
        ));

        let unbalanced = Envelope::new().with_section("A", "<open>");
        assert!(matches!(
            EnvelopeCodec::encode(&unbalanced).unwrap_err(),
            EnvelopeError::MalformedPayload { .. }
        ));

        let not_utf8 = Envelope::new().with_section("A", vec![0xffu8, 0x00]);
        assert!(matches!(
            EnvelopeCodec::encode(&not_utf8).unwrap_err(),
            EnvelopeError::MalformedPayload { .. }
        ));
    }

    #[test]
    fn streaming_parser_states() {
        let bytes = EnvelopeCodec::encode(&Envelope::new().with_section("A", "1")).unwrap();
        let mut parser = EnvelopeParser::new(&bytes).unwrap();
        assert_eq!(parser.version(), None);
        let first = parser.next_section().unwrap().unwrap();
        assert_eq!(parser.version(), Some(DataVersion::CURRENT));
        assert_eq!(first.name, "A");
        assert_eq!(first.content, b"1");
        assert!(parser.next_section().unwrap().is_none());
        assert!(parser.next_section().unwrap().is_none());
    }

    #[test]
    fn duplicate_sections_are_reported_in_order() {
        let body = format!("{}<A>1</A><A>2</A>\n", version_line(3));
        let env = EnvelopeCodec::decode(&doc(&body)).unwrap();
        let names: Vec<&str> = env.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A", "A"]);
    }

    fn payload_strategy() -> impl Strategy<Value = String> {
        let text = "[a-zA-Z0-9 <>&\"'\n\t]{0,24}".prop_map(|t| xml::escape(&t).into_owned());
        let leaf = text.clone();
        leaf.prop_recursive(3, 16, 4, move |inner| {
            (
                "[A-Za-z][A-Za-z0-9]{0,6}",
                prop::collection::vec(inner, 0..4),
                text.clone(),
            )
                .prop_map(|(tag, children, tail)| {
                    format!("<{tag}>{}</{tag}>{tail}", children.concat())
                })
        })
    }

    proptest! {
        #[test]
        fn arbitrary_fragments_roundtrip(
            sections in prop::collection::vec(("[A-Za-z_][A-Za-z0-9_]{0,10}", payload_strategy()), 0..6)
        ) {
            let mut env = Envelope::new();
            for (name, payload) in &sections {
                env = env.with_section(name.clone(), payload.clone());
            }
            let decoded = EnvelopeCodec::decode(&EnvelopeCodec::encode(&env).unwrap()).unwrap();
            prop_assert_eq!(decoded, env);
        }
    }
}
