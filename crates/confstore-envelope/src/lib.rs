//! Envelope format for confstore files.
//!
//! A store file is one UTF-8, tag-delimited document:
//!
//! ```text
//! <?xml version='1.0' encoding='utf-8' standalone='yes' ?>
//! <ConfigStoreData>
//! <int name="Version" value="3" />
//! <SectionName>...provider payload...</SectionName>
//! </ConfigStoreData>
//! ```
//!
//! The codec never interprets payloads. It only checks that each one is a
//! well-formed markup fragment so the document it writes can be read back.
//! Providers build and parse their payloads with [`XmlWriter`] and
//! [`XmlReader`].
//!
//! # Modules
//!
//! - [`envelope`] -- [`Envelope`], [`EnvelopeCodec`] and the streaming [`EnvelopeParser`]
//! - [`xml`] -- Markup writer, depth-tracking reader, escaping
//! - [`error`] -- [`EnvelopeError`]

pub mod envelope;
pub mod error;
pub mod xml;

pub use envelope::{
    Envelope, EnvelopeCodec, EnvelopeParser, Section, SectionRef, DOCUMENT_TAG, INTEGRITY_TAG,
    VERSION_TAG,
};
pub use error::{EnvelopeError, EnvelopeResult};
pub use xml::{StartTag, Token, XmlReader, XmlValue, XmlWriter};
