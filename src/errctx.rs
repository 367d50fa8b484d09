//! Context phrases for error messages.
//!
//! They are spliced into messages like "invalid eof {ctx}" and "U+3c not
//! allowed {ctx}", so each reads as a trailing prepositional phrase.
pub const ERRCTX_UNKNOWN: &str = "(unknown context)";
pub const ERRCTX_DOCBEGIN: &str = "at start of document";
pub const ERRCTX_DOCEND: &str = "after the root element";
pub const ERRCTX_XML_DECL: &str = "in XML declaration";
pub const ERRCTX_DOCTYPE: &str = "in document type declaration";
pub const ERRCTX_ENTITY_DECL: &str = "in entity declaration";
pub const ERRCTX_ELEMENT: &str = "in element header";
pub const ERRCTX_ELEMENT_FOOT: &str = "in element footer";
pub const ERRCTX_NAME: &str = "in name";
pub const ERRCTX_NAMESTART: &str = "at start of name";
pub const ERRCTX_ATTNAME: &str = "in attribute name";
pub const ERRCTX_ATTVAL: &str = "in attribute value";
pub const ERRCTX_TEXT: &str = "in text";
pub const ERRCTX_CONTENT: &str = "in element content";
pub const ERRCTX_REF: &str = "in entity or character reference";
pub const ERRCTX_CDATA_SECTION: &str = "in CDATA section";
pub const ERRCTX_COMMENT: &str = "in comment";
pub const ERRCTX_PI: &str = "in processing instruction";
