/*!
# Pull reader

[`XmlReader`] turns a byte stream into [`Event`]s, one per call to
[`EventRead::read`]. It decodes the input (see [`Encoding`]), expands
character references, predefined and internally declared entities, and
resolves element and attribute names against the namespace declarations in
scope.

```
use nsxml::{Event, EventRead, XmlReader};

let mut reader = XmlReader::from_str("<a xmlns='urn:x'><b c='1'/></a>");
let mut names = Vec::new();
reader.read_all(|ev| {
	if let Event::StartElement(start) = ev {
		names.push(start.name.to_string());
	}
}).unwrap();
assert_eq!(names, vec!["{urn:x}a", "{urn:x}b"]);
```

## Relaxed mode

By default, every error is fatal. A [`ReaderConfig`] can enable individual
[`Relaxation`]s; the affected errors are then reported in-band as
[`Event::Recovered`] and parsing continues.
*/
mod content;
mod encoding;
mod entities;
mod source;

use std::collections::VecDeque;
use std::convert::TryFrom;
use std::io;

use bitflags::bitflags;
use smartstring::alias::String as SmartString;

use nsxml_validation::is_xml_whitespace;
use nsxml_validation::selectors::{CharSelector, CLASS_XML_NAME, CLASS_XML_NAMESTART};

use crate::errctx::*;
use crate::error::{Error, ErrorWithContext, Location, NWFError, Result, WFError};
use crate::event::{Attribute, Event, EventType, StartElement, XmlDeclaration};
use crate::namespaces::{Namespace, NamespaceContext, NamespaceHolder, XMLNS_XML, XMLNS_XMLNS};
use crate::strings::{NCName, Name, QName};
use crate::EventRead;

pub use content::{all_text, read_simple_element, skip_element};
pub use encoding::Encoding;
use encoding::Sniffed;
use entities::{char_reference, EntityTable, Piece, Resolved};
use source::CharSource;

bitflags! {
	/// Classes of errors which a relaxed reader reports as
	/// [`Event::Recovered`] instead of failing.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct Relaxation: u8 {
		/// Prefix without a namespace declaration in scope; the name is
		/// put into the null namespace.
		const UNDECLARED_PREFIX = 0b0000_0001;
		/// Undeclared named entity in strict mode; an
		/// [`Event::EntityRef`] is produced. In attribute values, the
		/// reference is kept literally.
		const UNKNOWN_ENTITY = 0b0000_0010;
		/// Attribute without `=` (the value becomes the attribute name) or
		/// with an unquoted value.
		const ATTRIBUTE_SYNTAX = 0b0000_0100;
		/// End tag which does not match the innermost open element.
		/// Elements up to a matching ancestor are closed; a stray end tag
		/// is dropped.
		const ELEMENT_MISMATCH = 0b0000_1000;
		/// `--` inside a comment.
		const COMMENT_SYNTAX = 0b0001_0000;
	}
}

/// Default of [`ReaderConfig::entity_expansion_limit`].
pub const DEFAULT_ENTITY_EXPANSION_LIMIT: usize = 1 << 20;

/**
Options for [`XmlReader`].

```
use nsxml::{ReaderConfig, Relaxation, XmlReader};

let config = ReaderConfig::default()
	.relax(Relaxation::UNDECLARED_PREFIX | Relaxation::UNKNOWN_ENTITY)
	.expand_entities(true);
let reader = XmlReader::with_config(&b"<a/>"[..], config);
# drop(reader);
```
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
	/// Errors which are downgraded to [`Event::Recovered`].
	pub relaxations: Relaxation,
	/// Decode the input with this encoding instead of detecting it.
	pub encoding: Option<Encoding>,
	/// Strict entity handling: references to undeclared entities are
	/// errors and references to external entities are refused with
	/// [`Error::RestrictedXml`], instead of both being reported as
	/// [`Event::EntityRef`].
	pub expand_entities: bool,
	/// Maximum number of chars produced by expanding declared entities over
	/// the whole document.
	pub entity_expansion_limit: usize,
}

impl ReaderConfig {
	/// Enable or disable all relaxations at once.
	pub fn relaxed(mut self, v: bool) -> ReaderConfig {
		self.relaxations = if v {
			Relaxation::all()
		} else {
			Relaxation::empty()
		};
		self
	}

	/// Enable the given relaxations in addition to those already enabled.
	pub fn relax(mut self, r: Relaxation) -> ReaderConfig {
		self.relaxations |= r;
		self
	}

	/// Set the [`ReaderConfig::encoding`] value.
	pub fn encoding(mut self, v: Option<Encoding>) -> ReaderConfig {
		self.encoding = v;
		self
	}

	/// Set the [`ReaderConfig::expand_entities`] value.
	pub fn expand_entities(mut self, v: bool) -> ReaderConfig {
		self.expand_entities = v;
		self
	}

	/// Set the [`ReaderConfig::entity_expansion_limit`] value.
	pub fn entity_expansion_limit(mut self, v: usize) -> ReaderConfig {
		self.entity_expansion_limit = v;
		self
	}
}

impl Default for ReaderConfig {
	fn default() -> Self {
		Self {
			relaxations: Relaxation::empty(),
			encoding: None,
			expand_entities: false,
			entity_expansion_limit: DEFAULT_ENTITY_EXPANSION_LIMIT,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocState {
	/// Nothing read yet; the XML declaration may follow.
	Start,
	/// Before the root element.
	Prolog,
	/// Inside the root element.
	Body,
	/// After the root element.
	Epilog,
	/// END_DOCUMENT was produced.
	Finished,
}

#[derive(Debug)]
struct OpenElement {
	raw: Name,
	name: QName,
}

enum Reference {
	Char(char),
	Named(Name),
}

/**
Pull parser for XML 1.0 with namespaces.

The reader owns a [`NamespaceHolder`]. Its depth is incremented when a
start tag has been read and decremented on the read *after* the matching
END_ELEMENT was returned, so that the declarations of an element stay
visible while its END_ELEMENT is being processed.

Errors poison the reader: every later call returns the same error.
*/
pub struct XmlReader<R> {
	src: CharSource<R>,
	config: ReaderConfig,
	state: DocState,
	namespaces: NamespaceHolder,
	open: Vec<OpenElement>,
	pending: VecDeque<Event>,
	leave_pending: bool,
	entities: EntityTable,
	err: Option<Error>,
	closed: bool,
	seen_doctype: bool,
}

impl<R: io::BufRead> XmlReader<R> {
	/// Create a reader with default options.
	pub fn new(inner: R) -> XmlReader<R> {
		Self::with_config(inner, ReaderConfig::default())
	}

	pub fn with_config(inner: R, config: ReaderConfig) -> XmlReader<R> {
		let entities = EntityTable::new(config.entity_expansion_limit);
		XmlReader {
			src: CharSource::new(inner),
			config,
			state: DocState::Start,
			namespaces: NamespaceHolder::new(),
			open: Vec::new(),
			pending: VecDeque::new(),
			leave_pending: false,
			entities,
			err: None,
			closed: false,
			seen_doctype: false,
		}
	}

	/// Number of open elements, counting the one whose START_ELEMENT was
	/// just returned and the one whose END_ELEMENT was just returned.
	pub fn depth(&self) -> usize {
		self.namespaces.depth()
	}

	/// Position of the input cursor.
	pub fn location(&self) -> Location {
		self.src.location()
	}

	/// Encoding used to decode the input.
	///
	/// Only meaningful after the first event was read.
	pub fn encoding(&self) -> Encoding {
		self.src.encoding()
	}

	/// All namespace bindings in scope.
	pub fn namespace_context(&self) -> &NamespaceHolder {
		&self.namespaces
	}

	/// Namespace declarations made on the current element.
	pub fn namespaces_at_current_depth(&self) -> &[Namespace] {
		self.namespaces.namespaces_at_current_depth()
	}

	pub fn config(&self) -> &ReaderConfig {
		&self.config
	}

	/// Release all buffers. Further reads fail with [`Error::Closed`].
	pub fn close(&mut self) {
		self.closed = true;
		self.pending.clear();
		self.open.clear();
		self.namespaces.clear();
		self.entities.clear();
	}

	pub fn is_closed(&self) -> bool {
		self.closed
	}

	/// Return the underlying source, discarding the reader state.
	pub fn into_inner(self) -> R {
		self.src.into_inner()
	}

	/**
	Skip to the next START_ELEMENT or END_ELEMENT and return it.

	Whitespace, comments, processing instructions, the document type
	declaration and recovered errors are skipped. Any other event,
	including the end of the document, is an error.
	*/
	pub fn next_tag(&mut self) -> Result<Event> {
		const EXPECTED: &str = "START_ELEMENT or END_ELEMENT";
		loop {
			let ev = match self.read()? {
				Some(ev) => ev,
				None => {
					return Err(Error::UnexpectedEvent {
						expected: EXPECTED,
						found: EventType::EndDocument,
					})
				}
			};
			match ev.event_type() {
				EventType::StartElement | EventType::EndElement => return Ok(ev),
				EventType::EndDocument => {
					return Err(Error::UnexpectedEvent {
						expected: EXPECTED,
						found: EventType::EndDocument,
					})
				}
				kind if kind.is_ignorable() => continue,
				EventType::Text if ev.is_whitespace() => continue,
				other => {
					return Err(Error::UnexpectedEvent {
						expected: EXPECTED,
						found: other,
					})
				}
			}
		}
	}

	fn poison(&mut self, e: Error) -> Error {
		let e = e.at(self.src.location());
		self.pending.clear();
		self.err = Some(e.clone());
		e
	}

	fn step(&mut self) -> Result<()> {
		match self.state {
			DocState::Start => self.read_document_start(),
			DocState::Finished => Ok(()),
			_ => match self.src.peek()? {
				None => self.read_eof(),
				Some('<') => self.read_markup(),
				Some(_) => self.read_text(),
			},
		}
	}

	fn recover(&mut self, relaxation: Relaxation, err: Error) -> Result<()> {
		if !self.config.relaxations.contains(relaxation) {
			return Err(err);
		}
		let loc = self.src.location();
		log::warn!("recovering from error at {}: {}", loc, err);
		self.pending.push_back(Event::Recovered(err.at(loc)));
		Ok(())
	}

	fn skip_ws(&mut self) -> Result<bool> {
		let mut any = false;
		while let Some(c) = self.src.peek()? {
			if !is_xml_whitespace(c) {
				break;
			}
			self.src.skip(1)?;
			any = true;
		}
		Ok(any)
	}

	fn expect(&mut self, ch: char, ctx: &'static str) -> Result<()> {
		match self.src.next()? {
			Some(c) if c == ch => Ok(()),
			Some(c) => Err(WFError::UnexpectedChar(ctx, c, None).into()),
			None => Err(Error::wfeof(ctx)),
		}
	}

	fn read_name(&mut self, ctx: &'static str) -> Result<Name> {
		match self.src.peek()? {
			None => return Err(Error::wfeof(ctx)),
			Some(c) if CLASS_XML_NAMESTART.select(c) => (),
			Some(c) => return Err(WFError::UnexpectedChar(ctx, c, Some(&["Name"])).into()),
		}
		let mut name = SmartString::new();
		while let Some(c) = self.src.peek()? {
			if !CLASS_XML_NAME.select(c) {
				break;
			}
			name.push(c);
			self.src.skip(1)?;
		}
		Ok(Name::from_validated(name))
	}

	fn read_document_start(&mut self) -> Result<()> {
		let sniffed = self.src.detect(self.config.encoding)?;
		let has_decl = self.src.lookahead_is("<?xml")?
			&& matches!(self.src.peek_nth(5)?, Some(' ') | Some('\t') | Some('\n'));
		let decl = if has_decl {
			self.src.skip(5)?;
			self.read_xml_decl(sniffed)?
		} else {
			XmlDeclaration::default()
		};
		self.state = DocState::Prolog;
		self.pending.push_back(Event::StartDocument(decl));
		Ok(())
	}

	/// Read one `name = 'value'` pair of the XML declaration, or `None` at
	/// the closing `?>`.
	fn read_decl_attr(&mut self) -> Result<Option<(String, String)>> {
		let had_ws = self.skip_ws()?;
		match self.src.peek()? {
			None => return Err(Error::wfeof(ERRCTX_XML_DECL)),
			Some('?') => return Ok(None),
			Some(c) if !had_ws => {
				return Err(WFError::UnexpectedChar(ERRCTX_XML_DECL, c, Some(&["whitespace", "?>"])).into())
			}
			Some(_) => (),
		}
		let mut name = String::new();
		while let Some(c) = self.src.peek()? {
			if !c.is_ascii_alphabetic() {
				break;
			}
			name.push(c);
			self.src.skip(1)?;
		}
		self.skip_ws()?;
		self.expect('=', ERRCTX_XML_DECL)?;
		self.skip_ws()?;
		let quote = match self.src.next()? {
			Some(q @ '"') | Some(q @ '\'') => q,
			Some(c) => return Err(WFError::UnexpectedChar(ERRCTX_XML_DECL, c, Some(&["\"", "'"])).into()),
			None => return Err(Error::wfeof(ERRCTX_XML_DECL)),
		};
		let mut value = String::new();
		loop {
			match self.src.next()? {
				None => return Err(Error::wfeof(ERRCTX_XML_DECL)),
				Some(c) if c == quote => break,
				Some(c) => value.push(c),
			}
		}
		Ok(Some((name, value)))
	}

	fn read_xml_decl(&mut self, sniffed: Sniffed) -> Result<XmlDeclaration> {
		let mut attrs = Vec::new();
		while let Some(attr) = self.read_decl_attr()? {
			attrs.push(attr);
		}
		if !self.src.eat("?>")? {
			return Err(Error::syntax("malformed end of XML declaration"));
		}

		let mut attrs = attrs.into_iter().peekable();
		let mut decl = XmlDeclaration::default();
		match attrs.next() {
			Some((name, value)) if name == "version" => {
				if !is_version_num(&value) {
					return Err(Error::syntax("unsupported XML version"));
				}
				decl.version = Some(value.into());
			}
			_ => return Err(Error::syntax("XML declaration must start with the version")),
		}
		if let Some((_, value)) = attrs.next_if(|(name, _)| name == "encoding") {
			if !is_enc_name(&value) {
				return Err(Error::syntax("invalid encoding name"));
			}
			decl.encoding = Some(value.into());
		}
		if let Some((_, value)) = attrs.next_if(|(name, _)| name == "standalone") {
			decl.standalone = Some(match value.as_str() {
				"yes" => true,
				"no" => false,
				_ => return Err(Error::syntax("standalone must be 'yes' or 'no'")),
			});
		}
		if attrs.next().is_some() {
			return Err(Error::syntax("unexpected pseudo-attribute in XML declaration"));
		}

		if let Some(label) = decl.encoding.as_ref() {
			self.apply_declared_encoding(label, sniffed)?;
		}
		Ok(decl)
	}

	fn apply_declared_encoding(&mut self, label: &str, sniffed: Sniffed) -> Result<()> {
		if self.config.encoding.is_some() {
			return Ok(());
		}
		let declared = match Encoding::from_label(label) {
			Some(enc) => enc,
			None => return Err(Error::UnsupportedEncoding(label.into())),
		};
		let current = self.src.encoding();
		let compatible = (current.is_ascii_compatible() && declared.is_ascii_compatible())
			|| (current.is_utf16() && declared.is_utf16())
			|| (current.is_utf32() && declared.is_utf32());
		if !compatible {
			if sniffed.bom_len > 0 {
				log::debug!(
					"declared encoding {} contradicts byte order mark of {}, keeping {}",
					declared,
					current,
					current
				);
				return Ok(());
			}
			return Err(Error::UnsupportedEncoding(label.into()));
		}
		if sniffed.bom_len == 0 && current.is_ascii_compatible() && declared != current {
			log::debug!("switching input encoding from {} to {}", current, declared);
			self.src.switch_encoding(declared);
		}
		Ok(())
	}

	fn read_eof(&mut self) -> Result<()> {
		match self.state {
			DocState::Body => Err(Error::wfeof(ERRCTX_CONTENT)),
			DocState::Prolog => Err(Error::wfeof(ERRCTX_DOCBEGIN)),
			DocState::Epilog => {
				self.state = DocState::Finished;
				self.pending.push_back(Event::EndDocument);
				Ok(())
			}
			DocState::Start | DocState::Finished => Ok(()),
		}
	}

	fn text_ctx(&self) -> &'static str {
		match self.state {
			DocState::Body => ERRCTX_TEXT,
			DocState::Epilog | DocState::Finished => ERRCTX_DOCEND,
			DocState::Start | DocState::Prolog => ERRCTX_DOCBEGIN,
		}
	}

	fn read_markup(&mut self) -> Result<()> {
		match self.src.peek_nth(1)? {
			None => Err(Error::wfeof(ERRCTX_ELEMENT)),
			Some('/') => self.read_end_tag(),
			Some('?') => self.read_pi(),
			Some('!') => {
				if self.src.lookahead_is("<!--")? {
					self.read_comment()
				} else if self.src.lookahead_is("<![CDATA[")? {
					self.read_cdata()
				} else if self.src.lookahead_is("<!DOCTYPE")? {
					self.read_doctype()
				} else {
					Err(WFError::UnexpectedChar(
						self.text_ctx(),
						'!',
						Some(&["<!--", "<![CDATA[", "<!DOCTYPE"]),
					)
					.into())
				}
			}
			Some(_) => self.read_start_tag(),
		}
	}

	fn read_reference(&mut self, ctx: &'static str) -> Result<Reference> {
		if self.src.peek()? == Some('#') {
			self.src.skip(1)?;
			let mut body = String::new();
			loop {
				match self.src.next()? {
					None => return Err(Error::wfeof(ERRCTX_REF)),
					Some(';') => break,
					Some(c) if c.is_ascii_alphanumeric() && body.len() < 16 => body.push(c),
					Some(c) => return Err(WFError::UnexpectedChar(ERRCTX_REF, c, Some(&[";"])).into()),
				}
			}
			Ok(Reference::Char(char_reference(&body, ctx)?))
		} else {
			let name = self.read_name(ERRCTX_REF)?;
			self.expect(';', ERRCTX_REF)?;
			Ok(Reference::Named(name))
		}
	}

	fn push_text(&mut self, text: String) {
		if text.is_empty() {
			return;
		}
		if self.state == DocState::Body {
			self.pending.push_back(Event::Text(text));
		} else {
			self.pending.push_back(Event::IgnorableWhitespace(text));
		}
	}

	fn read_text(&mut self) -> Result<()> {
		let mut text = String::new();
		loop {
			match self.src.peek()? {
				None | Some('<') => break,
				Some('&') => {
					if self.state != DocState::Body {
						return Err(WFError::UnexpectedChar(self.text_ctx(), '&', None).into());
					}
					self.src.skip(1)?;
					let name = match self.read_reference(ERRCTX_TEXT)? {
						Reference::Char(c) => {
							text.push(c);
							continue;
						}
						Reference::Named(name) => name,
					};
					match self.entities.resolve(&name)? {
						Resolved::Text(replacement) => text.push_str(&replacement),
						Resolved::Partial(pieces) => {
							for piece in pieces {
								match piece {
									Piece::Text(replacement) => text.push_str(&replacement),
									Piece::Unknown(nested) => {
										let nested = Name::try_from(nested).map_err(|e| e.with_context(ERRCTX_REF))?;
										if self.config.expand_entities {
											self.recover(
												Relaxation::UNKNOWN_ENTITY,
												WFError::UndeclaredEntity(nested.as_str().into()).into(),
											)?;
										}
										self.push_entity_ref(std::mem::take(&mut text), nested)?;
									}
								}
							}
						}
						Resolved::External => {
							if self.config.expand_entities {
								return Err(Error::RestrictedXml("reference to external entity"));
							}
							return self.push_entity_ref(text, name);
						}
						Resolved::Unknown => {
							if self.config.expand_entities {
								self.recover(
									Relaxation::UNKNOWN_ENTITY,
									WFError::UndeclaredEntity(name.as_str().into()).into(),
								)?;
							}
							return self.push_entity_ref(text, name);
						}
					}
				}
				Some(']') if self.src.lookahead_is("]]>")? => {
					return Err(WFError::InvalidSyntax("']]>' not allowed in text").into());
				}
				Some(c) => {
					if self.state != DocState::Body && !is_xml_whitespace(c) {
						return Err(WFError::UnexpectedChar(self.text_ctx(), c, None).into());
					}
					self.src.skip(1)?;
					text.push(c);
				}
			}
		}
		self.push_text(text);
		Ok(())
	}

	fn push_entity_ref(&mut self, text: String, name: Name) -> Result<()> {
		let name = NCName::try_from(name.into_inner()).map_err(|e| e.with_context(ERRCTX_REF))?;
		// text before the reference goes first; a recovery marker queued
		// by the caller has to stay in front of both
		let marker = match self.pending.back() {
			Some(Event::Recovered(_)) => self.pending.pop_back(),
			_ => None,
		};
		self.push_text(text);
		if let Some(marker) = marker {
			self.pending.push_back(marker);
		}
		self.pending.push_back(Event::EntityRef(name));
		Ok(())
	}

	fn read_start_tag(&mut self) -> Result<()> {
		if matches!(self.state, DocState::Epilog | DocState::Finished) {
			return Err(WFError::InvalidSyntax("more than one root element").into());
		}
		self.src.skip(1)?;
		let raw = self.read_name(ERRCTX_ELEMENT)?;
		let mut raw_attrs: Vec<(Name, String)> = Vec::new();
		let mut ws_carried = false;
		let empty = loop {
			let had_ws = self.skip_ws()? || ws_carried;
			ws_carried = false;
			match self.src.peek()? {
				None => return Err(Error::wfeof(ERRCTX_ELEMENT)),
				Some('>') => {
					self.src.skip(1)?;
					break false;
				}
				Some('/') => {
					self.src.skip(1)?;
					self.expect('>', ERRCTX_ELEMENT)?;
					break true;
				}
				Some(c) if !had_ws => {
					return Err(
						WFError::UnexpectedChar(ERRCTX_ELEMENT, c, Some(&["whitespace", "/", ">"])).into(),
					)
				}
				Some(_) => {
					let name = self.read_name(ERRCTX_ATTNAME)?;
					let ws = self.skip_ws()?;
					let value = if self.src.peek()? == Some('=') {
						self.src.skip(1)?;
						self.skip_ws()?;
						self.read_attribute_value()?
					} else {
						let err = match self.src.peek()? {
							None => Error::wfeof(ERRCTX_ATTNAME),
							Some(c) => WFError::UnexpectedChar(ERRCTX_ATTNAME, c, Some(&["="])).into(),
						};
						self.recover(Relaxation::ATTRIBUTE_SYNTAX, err)?;
						ws_carried = ws;
						name.as_str().to_string()
					};
					if raw_attrs.iter().any(|(existing, _)| *existing == name) {
						return Err(WFError::DuplicateAttribute(name.into_inner()).into());
					}
					raw_attrs.push((name, value));
				}
			}
		};
		self.open_element(raw, raw_attrs, empty)
	}

	fn read_attribute_value(&mut self) -> Result<String> {
		let quote = match self.src.peek()? {
			None => return Err(Error::wfeof(ERRCTX_ATTVAL)),
			Some(q @ '"') | Some(q @ '\'') => {
				self.src.skip(1)?;
				q
			}
			Some(c) => {
				self.recover(
					Relaxation::ATTRIBUTE_SYNTAX,
					WFError::UnexpectedChar(ERRCTX_ATTVAL, c, Some(&["\"", "'"])).into(),
				)?;
				return self.read_unquoted_value();
			}
		};
		let mut value = String::new();
		loop {
			match self.src.next()? {
				None => return Err(Error::wfeof(ERRCTX_ATTVAL)),
				Some(c) if c == quote => return Ok(value),
				Some('<') => return Err(WFError::UnexpectedChar(ERRCTX_ATTVAL, '<', None).into()),
				Some('&') => self.read_attribute_reference(&mut value)?,
				Some('\t') | Some('\n') => value.push(' '),
				Some(c) => value.push(c),
			}
		}
	}

	fn read_unquoted_value(&mut self) -> Result<String> {
		let mut value = String::new();
		loop {
			match self.src.peek()? {
				None => return Err(Error::wfeof(ERRCTX_ATTVAL)),
				Some('>') => break,
				Some('/') if self.src.peek_nth(1)? == Some('>') => break,
				Some(c) if is_xml_whitespace(c) => break,
				Some('<') => return Err(WFError::UnexpectedChar(ERRCTX_ATTVAL, '<', None).into()),
				Some('&') => {
					self.src.skip(1)?;
					self.read_attribute_reference(&mut value)?;
				}
				Some(c) => {
					self.src.skip(1)?;
					value.push(c);
				}
			}
		}
		Ok(value)
	}

	fn read_attribute_reference(&mut self, value: &mut String) -> Result<()> {
		let name = match self.read_reference(ERRCTX_ATTVAL)? {
			Reference::Char(c) => {
				value.push(c);
				return Ok(());
			}
			Reference::Named(name) => name,
		};
		match self.entities.resolve(&name)? {
			Resolved::Text(replacement) => {
				if replacement.contains('<') {
					return Err(WFError::UnexpectedChar(ERRCTX_ATTVAL, '<', None).into());
				}
				value.push_str(&replacement);
			}
			Resolved::Partial(pieces) => {
				for piece in pieces {
					match piece {
						Piece::Text(replacement) => {
							if replacement.contains('<') {
								return Err(WFError::UnexpectedChar(ERRCTX_ATTVAL, '<', None).into());
							}
							value.push_str(&replacement);
						}
						Piece::Unknown(nested) => {
							self.recover(
								Relaxation::UNKNOWN_ENTITY,
								WFError::UndeclaredEntity(nested.clone()).into(),
							)?;
							value.push('&');
							value.push_str(&nested);
							value.push(';');
						}
					}
				}
			}
			Resolved::External => {
				return Err(Error::RestrictedXml("reference to external entity in attribute value"));
			}
			Resolved::Unknown => {
				self.recover(
					Relaxation::UNKNOWN_ENTITY,
					WFError::UndeclaredEntity(name.as_str().into()).into(),
				)?;
				value.push('&');
				value.push_str(&name);
				value.push(';');
			}
		}
		Ok(())
	}

	fn declare_namespace(&mut self, prefix: &str, uri: &str) -> Result<Namespace> {
		match prefix {
			"xmlns" => return Err(NWFError::ReservedNamespacePrefix.into()),
			"xml" => {
				if uri != XMLNS_XML {
					return Err(NWFError::ReservedNamespacePrefix.into());
				}
			}
			_ => {
				if uri == XMLNS_XML || uri == XMLNS_XMLNS {
					return Err(NWFError::ReservedNamespacePrefix.into());
				}
				if uri.is_empty() && !prefix.is_empty() {
					return Err(NWFError::EmptyNamespaceUri.into());
				}
			}
		}
		self.namespaces.add_prefix_to_context(prefix, uri);
		Ok(Namespace::new(prefix, uri))
	}

	fn resolve_name(&mut self, raw: &Name, is_element: bool) -> Result<QName> {
		let ctx = if is_element { ERRCTX_ELEMENT } else { ERRCTX_ATTNAME };
		let (prefix, local) = raw.split_name().map_err(|e| e.with_context(ctx))?;
		let prefix = match prefix {
			None => {
				// unprefixed attributes are never in the default namespace
				let ns = if is_element {
					self.namespaces.namespace_uri("").unwrap_or("")
				} else {
					""
				};
				return Ok(QName::new(ns, &local));
			}
			Some(prefix) => prefix,
		};
		if prefix.as_str() == "xmlns" {
			return Err(NWFError::ReservedNamespacePrefix.into());
		}
		let uri: Option<SmartString> = self.namespaces.namespace_uri(&prefix).map(Into::into);
		match uri {
			Some(uri) => Ok(QName::with_prefix(&uri, &local, &prefix)),
			None => {
				self.recover(
					Relaxation::UNDECLARED_PREFIX,
					NWFError::UndeclaredNamespacePrefix(prefix.as_str().into()).into(),
				)?;
				Ok(QName::with_prefix("", &local, &prefix))
			}
		}
	}

	fn open_element(&mut self, raw: Name, raw_attrs: Vec<(Name, String)>, empty: bool) -> Result<()> {
		self.namespaces.inc_depth();
		let mut namespace_decls = Vec::new();
		let mut plain = Vec::with_capacity(raw_attrs.len());
		for (name, value) in raw_attrs {
			if name.as_str() == "xmlns" {
				namespace_decls.push(self.declare_namespace("", &value)?);
			} else if let Some(prefix) = name.strip_prefix("xmlns:") {
				NCName::try_from(prefix).map_err(|e| e.with_context(ERRCTX_ATTNAME))?;
				namespace_decls.push(self.declare_namespace(prefix, &value)?);
			} else {
				plain.push((name, value));
			}
		}

		let name = self.resolve_name(&raw, true)?;
		let mut attributes: Vec<Attribute> = Vec::with_capacity(plain.len());
		for (raw_name, value) in plain {
			let qname = self.resolve_name(&raw_name, false)?;
			if attributes.iter().any(|attr| attr.name.same_name(&qname)) {
				return Err(WFError::DuplicateAttribute(raw_name.into_inner()).into());
			}
			attributes.push(Attribute::new(qname, value));
		}

		self.state = DocState::Body;
		self.pending.push_back(Event::StartElement(StartElement {
			name: name.clone(),
			attributes,
			namespace_decls,
		}));
		if empty {
			self.pending.push_back(Event::EndElement(name));
			if self.open.is_empty() {
				self.state = DocState::Epilog;
			}
		} else {
			self.open.push(OpenElement { raw, name });
		}
		Ok(())
	}

	fn close_innermost(&mut self) {
		if let Some(element) = self.open.pop() {
			self.pending.push_back(Event::EndElement(element.name));
		}
		if self.open.is_empty() {
			self.state = DocState::Epilog;
		}
	}

	fn read_end_tag(&mut self) -> Result<()> {
		self.src.skip(2)?;
		let raw = self.read_name(ERRCTX_ELEMENT_FOOT)?;
		self.skip_ws()?;
		self.expect('>', ERRCTX_ELEMENT_FOOT)?;
		if self.open.last().map(|top| top.raw == raw) == Some(true) {
			self.close_innermost();
			return Ok(());
		}
		let expected: SmartString = self
			.open
			.last()
			.map(|top| top.raw.as_str().into())
			.unwrap_or_default();
		self.recover(
			Relaxation::ELEMENT_MISMATCH,
			WFError::ElementMismatch {
				expected,
				found: raw.as_str().into(),
			}
			.into(),
		)?;
		if let Some(idx) = self.open.iter().rposition(|e| e.raw == raw) {
			while self.open.len() > idx {
				self.close_innermost();
			}
		}
		Ok(())
	}

	fn read_comment(&mut self) -> Result<()> {
		self.src.skip(4)?;
		let mut text = String::new();
		loop {
			match self.src.next()? {
				None => return Err(Error::wfeof(ERRCTX_COMMENT)),
				Some('-') if self.src.peek()? == Some('-') => {
					if self.src.peek_nth(1)? == Some('>') {
						self.src.skip(2)?;
						break;
					}
					self.recover(
						Relaxation::COMMENT_SYNTAX,
						WFError::InvalidSyntax("'--' not allowed in comment").into(),
					)?;
					text.push('-');
				}
				Some(c) => text.push(c),
			}
		}
		self.pending.push_back(Event::Comment(text));
		Ok(())
	}

	fn read_cdata(&mut self) -> Result<()> {
		if self.state != DocState::Body {
			return Err(WFError::InvalidSyntax("CDATA section outside of the root element").into());
		}
		self.src.skip(9)?;
		let mut text = String::new();
		loop {
			if self.src.eat("]]>")? {
				break;
			}
			match self.src.next()? {
				None => return Err(Error::wfeof(ERRCTX_CDATA_SECTION)),
				Some(c) => text.push(c),
			}
		}
		self.pending.push_back(Event::CData(text));
		Ok(())
	}

	fn read_pi(&mut self) -> Result<()> {
		self.src.skip(2)?;
		let target = self.read_name(ERRCTX_PI)?;
		if target.eq_ignore_ascii_case("xml") {
			return Err(WFError::InvalidSyntax("reserved processing instruction target").into());
		}
		let mut data = String::new();
		if !self.src.eat("?>")? {
			if !self.skip_ws()? {
				return match self.src.peek()? {
					None => Err(Error::wfeof(ERRCTX_PI)),
					Some(c) => Err(WFError::UnexpectedChar(ERRCTX_PI, c, Some(&["whitespace", "?>"])).into()),
				};
			}
			loop {
				if self.src.eat("?>")? {
					break;
				}
				match self.src.next()? {
					None => return Err(Error::wfeof(ERRCTX_PI)),
					Some(c) => data.push(c),
				}
			}
		}
		self.pending
			.push_back(Event::ProcessingInstruction { target, data });
		Ok(())
	}

	fn read_doctype(&mut self) -> Result<()> {
		if self.state != DocState::Prolog || self.seen_doctype {
			return Err(WFError::InvalidSyntax("document type declaration not allowed here").into());
		}
		self.src.skip(9)?;
		if !self.skip_ws()? {
			return Err(WFError::InvalidSyntax("whitespace required after <!DOCTYPE").into());
		}
		let mut text = String::new();
		let mut subset = String::new();
		let mut in_subset = false;
		let mut quote: Option<char> = None;
		loop {
			if in_subset && quote.is_none() && self.src.eat("<!--")? {
				// comments may contain quotes which must not be paired
				text.push_str("<!--");
				subset.push_str("<!--");
				loop {
					if self.src.eat("-->")? {
						break;
					}
					match self.src.next()? {
						None => return Err(Error::wfeof(ERRCTX_DOCTYPE)),
						Some(c) => {
							text.push(c);
							subset.push(c);
						}
					}
				}
				text.push_str("-->");
				subset.push_str("-->");
				continue;
			}
			let c = match self.src.next()? {
				None => return Err(Error::wfeof(ERRCTX_DOCTYPE)),
				Some(c) => c,
			};
			match quote {
				Some(q) if q == c => quote = None,
				Some(_) => (),
				None => match c {
					'"' | '\'' => quote = Some(c),
					'[' if !in_subset => {
						in_subset = true;
						text.push(c);
						continue;
					}
					']' if in_subset => {
						in_subset = false;
						text.push(c);
						continue;
					}
					'>' if !in_subset => break,
					_ => (),
				},
			}
			text.push(c);
			if in_subset {
				subset.push(c);
			}
		}
		self.entities.scan_internal_subset(&subset)?;
		self.seen_doctype = true;
		let trimmed_len = text.trim_end().len();
		text.truncate(trimmed_len);
		self.pending.push_back(Event::DocType(text));
		Ok(())
	}
}

impl<'a> XmlReader<&'a [u8]> {
	/// Read from a string. Encoding detection is skipped.
	#[allow(clippy::should_implement_trait)]
	pub fn from_str(s: &'a str) -> XmlReader<&'a [u8]> {
		Self::with_config(
			s.as_bytes(),
			ReaderConfig::default().encoding(Some(Encoding::Utf8)),
		)
	}
}

impl<R: io::BufRead> EventRead for XmlReader<R> {
	fn read(&mut self) -> Result<Option<Event>> {
		if self.closed {
			return Err(Error::Closed);
		}
		if let Some(e) = self.err.as_ref() {
			return Err(e.clone());
		}
		if self.leave_pending {
			self.leave_pending = false;
			self.namespaces.dec_depth();
		}
		loop {
			if let Some(ev) = self.pending.pop_front() {
				if let Event::EndElement(_) = ev {
					self.leave_pending = true;
				}
				return Ok(Some(ev));
			}
			if self.state == DocState::Finished {
				return Ok(None);
			}
			if let Err(e) = self.step() {
				return Err(self.poison(e));
			}
		}
	}
}

impl<R> NamespaceContext for XmlReader<R> {
	fn namespace_uri(&self, prefix: &str) -> Option<&str> {
		self.namespaces.namespace_uri(prefix)
	}

	fn prefix(&self, uri: &str) -> Option<&str> {
		self.namespaces.prefix(uri)
	}
}

fn is_version_num(s: &str) -> bool {
	match s.strip_prefix("1.") {
		Some(minor) => !minor.is_empty() && minor.bytes().all(|b| b.is_ascii_digit()),
		None => false,
	}
}

fn is_enc_name(s: &str) -> bool {
	let mut chars = s.chars();
	match chars.next() {
		Some(c) if c.is_ascii_alphabetic() => (),
		_ => return false,
	}
	chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn read_all(doc: &str) -> Result<Vec<Event>> {
		read_all_with(doc.as_bytes(), ReaderConfig::default())
	}

	fn read_all_with(doc: &[u8], config: ReaderConfig) -> Result<Vec<Event>> {
		let mut reader = XmlReader::with_config(doc, config);
		let mut out = Vec::new();
		reader.read_all(|ev| out.push(ev))?;
		Ok(out)
	}

	fn body(events: Vec<Event>) -> Vec<Event> {
		events
			.into_iter()
			.filter(|ev| !matches!(ev, Event::StartDocument(_) | Event::EndDocument))
			.collect()
	}

	#[test]
	fn minimal_document() {
		let evs = read_all("<a/>").unwrap();
		assert_eq!(evs.len(), 4);
		match &evs[0] {
			Event::StartDocument(decl) => assert_eq!(*decl, XmlDeclaration::default()),
			other => panic!("unexpected event: {:?}", other),
		}
		match &evs[1] {
			Event::StartElement(start) => assert_eq!(start.name, QName::local("a")),
			other => panic!("unexpected event: {:?}", other),
		}
		match &evs[2] {
			Event::EndElement(name) => assert_eq!(*name, QName::local("a")),
			other => panic!("unexpected event: {:?}", other),
		}
		assert_eq!(evs[3], Event::EndDocument);
	}

	#[test]
	fn xml_declaration_is_reported() {
		let evs = read_all("<?xml version='1.0' encoding=\"utf-8\" standalone='yes'?><a/>").unwrap();
		match &evs[0] {
			Event::StartDocument(decl) => {
				assert_eq!(decl.version.as_deref(), Some("1.0"));
				assert_eq!(decl.encoding.as_deref(), Some("utf-8"));
				assert_eq!(decl.standalone, Some(true));
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn xml_declaration_order_is_enforced() {
		match read_all("<?xml encoding='utf-8' version='1.0'?><a/>") {
			Err(e) => match e.kind() {
				Error::NotWellFormed(WFError::InvalidSyntax(_)) => (),
				other => panic!("unexpected error: {:?}", other),
			},
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn declared_latin1_switches_decoding() {
		let mut doc = b"<?xml version='1.0' encoding='ISO-8859-1'?><a>".to_vec();
		doc.push(0xe4);
		doc.extend_from_slice(b"</a>");
		let evs = body(read_all_with(&doc, ReaderConfig::default()).unwrap());
		assert_eq!(evs[1], Event::Text("\u{e4}".into()));
	}

	#[test]
	fn unknown_encoding_label_is_rejected() {
		match read_all("<?xml version='1.0' encoding='x-unknown'?><a/>") {
			Err(e) => match e.kind() {
				Error::UnsupportedEncoding(label) => assert_eq!(label.as_str(), "x-unknown"),
				other => panic!("unexpected error: {:?}", other),
			},
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn utf16_document_with_bom() {
		let mut doc = vec![0xff, 0xfe];
		for unit in "<?xml version='1.0' encoding='UTF-16'?><a>\u{20ac}</a>".encode_utf16() {
			doc.extend_from_slice(&unit.to_le_bytes());
		}
		let evs = body(read_all_with(&doc, ReaderConfig::default()).unwrap());
		assert_eq!(evs[1], Event::Text("\u{20ac}".into()));
	}

	#[test]
	fn entities_and_char_refs_are_expanded() {
		let evs = body(read_all("<tag>&lt;foo&amp;&#039;&gt;</tag>").unwrap());
		assert_eq!(evs[1], Event::Text("<foo&'>".into()));
	}

	#[test]
	fn unknown_entity_becomes_entity_ref() {
		let evs = body(read_all("<tag>a&unknown;b</tag>").unwrap());
		assert_eq!(evs[1], Event::Text("a".into()));
		match &evs[2] {
			Event::EntityRef(name) => assert_eq!(name.as_str(), "unknown"),
			other => panic!("unexpected event: {:?}", other),
		}
		assert_eq!(evs[3], Event::Text("b".into()));
	}

	#[test]
	fn unknown_entity_is_fatal_in_strict_mode() {
		let config = ReaderConfig::default().expand_entities(true);
		match read_all_with(b"<tag>&unknown;</tag>", config) {
			Err(e) => match e.kind() {
				Error::NotWellFormed(WFError::UndeclaredEntity(name)) => assert_eq!(name.as_str(), "unknown"),
				other => panic!("unexpected error: {:?}", other),
			},
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn unknown_entity_is_recovered_in_relaxed_strict_mode() {
		let config = ReaderConfig::default()
			.expand_entities(true)
			.relax(Relaxation::UNKNOWN_ENTITY);
		let evs = body(read_all_with(b"<tag>x&unknown;</tag>", config).unwrap());
		assert_eq!(evs[1], Event::Text("x".into()));
		match &evs[2] {
			Event::Recovered(e) => match e.kind() {
				Error::NotWellFormed(WFError::UndeclaredEntity(_)) => (),
				other => panic!("unexpected error: {:?}", other),
			},
			other => panic!("unexpected event: {:?}", other),
		}
		match &evs[3] {
			Event::EntityRef(name) => assert_eq!(name.as_str(), "unknown"),
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn unknown_entity_inside_replacement_text_is_passed_through() {
		let doc = "<!DOCTYPE a [<!ENTITY wrap 'x&inner;y'>]><a>&wrap;z</a>";
		let evs = body(read_all(doc).unwrap());
		assert_eq!(evs[2], Event::Text("x".into()));
		match &evs[3] {
			Event::EntityRef(name) => assert_eq!(name.as_str(), "inner"),
			other => panic!("unexpected event: {:?}", other),
		}
		assert_eq!(evs[4], Event::Text("yz".into()));

		let config = ReaderConfig::default().expand_entities(true);
		match read_all_with(doc.as_bytes(), config) {
			Err(e) => match e.kind() {
				Error::NotWellFormed(WFError::UndeclaredEntity(name)) => assert_eq!(name.as_str(), "inner"),
				other => panic!("unexpected error: {:?}", other),
			},
			other => panic!("unexpected result: {:?}", other),
		}

		let config = ReaderConfig::default()
			.expand_entities(true)
			.relax(Relaxation::UNKNOWN_ENTITY);
		let evs = body(read_all_with(doc.as_bytes(), config).unwrap());
		match &evs[3] {
			Event::Recovered(_) => (),
			other => panic!("unexpected event: {:?}", other),
		}
		match &evs[4] {
			Event::EntityRef(name) => assert_eq!(name.as_str(), "inner"),
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn internal_entities_are_expanded() {
		let doc = "<!DOCTYPE a [<!ENTITY who \"w&#111;rld\"><!ENTITY greet 'hello &who;'>]><a t='&greet;'>&greet;!</a>";
		let evs = body(read_all(doc).unwrap());
		match &evs[0] {
			Event::DocType(text) => {
				assert!(text.starts_with("a ["));
				assert!(text.ends_with(']'));
			}
			other => panic!("unexpected event: {:?}", other),
		}
		match &evs[1] {
			Event::StartElement(start) => assert_eq!(start.attribute_value("", "t"), Some("hello world")),
			other => panic!("unexpected event: {:?}", other),
		}
		assert_eq!(evs[2], Event::Text("hello world!".into()));
	}

	#[test]
	fn external_entity_is_not_fetched() {
		let doc = "<!DOCTYPE a [<!ENTITY xxe SYSTEM \"file:///etc/passwd\">]><a>&xxe;</a>";
		let evs = body(read_all(doc).unwrap());
		match &evs[2] {
			Event::EntityRef(name) => assert_eq!(name.as_str(), "xxe"),
			other => panic!("unexpected event: {:?}", other),
		}
		let config = ReaderConfig::default().expand_entities(true);
		match read_all_with(doc.as_bytes(), config) {
			Err(e) => match e.kind() {
				Error::RestrictedXml(_) => (),
				other => panic!("unexpected error: {:?}", other),
			},
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn namespace_declarations_are_split_from_attributes() {
		let evs = body(read_all("<X xmlns:a=\"a\" a:b=\"v\"/>").unwrap());
		match &evs[0] {
			Event::StartElement(start) => {
				assert_eq!(start.name, QName::local("X"));
				assert_eq!(start.attributes.len(), 1);
				assert_eq!(start.attributes[0].name, QName::with_prefix("a", "b", "a"));
				assert_eq!(start.attributes[0].value, "v");
				assert_eq!(start.namespace_decls, vec![Namespace::new("a", "a")]);
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn default_namespace_does_not_apply_to_attributes() {
		let evs = body(read_all("<a xmlns='urn:x' b='1'><c/></a>").unwrap());
		match &evs[0] {
			Event::StartElement(start) => {
				assert_eq!(start.name, QName::new("urn:x", "a"));
				assert_eq!(start.attributes[0].name, QName::local("b"));
			}
			other => panic!("unexpected event: {:?}", other),
		}
		match &evs[1] {
			Event::StartElement(start) => assert_eq!(start.name, QName::new("urn:x", "c")),
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn namespace_scope_closes_after_end_element() {
		let mut reader = XmlReader::from_str("<a><b xmlns:p='urn:p'><p:c/></b><d/></a>");
		assert!(matches!(reader.next_tag().unwrap(), Event::StartElement(_)));
		assert!(matches!(reader.next_tag().unwrap(), Event::StartElement(_)));
		assert_eq!(reader.depth(), 2);
		assert_eq!(reader.namespaces_at_current_depth(), &[Namespace::new("p", "urn:p")][..]);
		reader.next_tag().unwrap();
		reader.next_tag().unwrap();
		match reader.next_tag().unwrap() {
			Event::EndElement(name) => assert_eq!(name.local_name.as_str(), "b"),
			other => panic!("unexpected event: {:?}", other),
		}
		// still visible while the end tag is current
		assert_eq!(reader.namespace_uri("p"), Some("urn:p"));
		reader.next_tag().unwrap();
		assert_eq!(reader.namespace_uri("p"), None);
		assert_eq!(reader.depth(), 2);
	}

	#[test]
	fn undeclared_prefix_is_fatal() {
		match read_all("<a:b/>") {
			Err(e) => match e.kind() {
				Error::NotNamespaceWellFormed(NWFError::UndeclaredNamespacePrefix(p)) => assert_eq!(p.as_str(), "a"),
				other => panic!("unexpected error: {:?}", other),
			},
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn undeclared_prefix_is_recovered_when_relaxed() {
		let config = ReaderConfig::default().relax(Relaxation::UNDECLARED_PREFIX);
		let evs = body(read_all_with(b"<a:b/>", config).unwrap());
		assert!(matches!(evs[0], Event::Recovered(_)));
		match &evs[1] {
			Event::StartElement(start) => assert_eq!(start.name, QName::with_prefix("", "b", "a")),
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn reserved_prefixes_are_rejected() {
		for doc in &[
			"<a xmlns:xmlns='urn:x'/>",
			"<a xmlns:xml='urn:x'/>",
			"<a xmlns:p='http://www.w3.org/2000/xmlns/'/>",
			"<xmlns:a/>",
		] {
			match read_all(doc) {
				Err(e) => match e.kind() {
					Error::NotNamespaceWellFormed(NWFError::ReservedNamespacePrefix) => (),
					other => panic!("unexpected error for {}: {:?}", doc, other),
				},
				other => panic!("unexpected result for {}: {:?}", doc, other),
			}
		}
	}

	#[test]
	fn prefixed_undeclaration_is_rejected() {
		match read_all("<a xmlns:p=''/>") {
			Err(e) => match e.kind() {
				Error::NotNamespaceWellFormed(NWFError::EmptyNamespaceUri) => (),
				other => panic!("unexpected error: {:?}", other),
			},
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn duplicate_attributes_after_resolution() {
		match read_all("<a xmlns:p='urn:x' xmlns:q='urn:x' p:b='1' q:b='2'/>") {
			Err(e) => match e.kind() {
				Error::NotWellFormed(WFError::DuplicateAttribute(name)) => assert_eq!(name.as_str(), "q:b"),
				other => panic!("unexpected error: {:?}", other),
			},
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn attribute_values_are_normalized() {
		let evs = body(read_all("<a b='x\ty\nz&#10;'/>").unwrap());
		match &evs[0] {
			Event::StartElement(start) => assert_eq!(start.attributes[0].value, "x y z\n"),
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn attribute_syntax_relaxation() {
		let config = ReaderConfig::default().relax(Relaxation::ATTRIBUTE_SYNTAX);
		let evs = body(read_all_with(b"<input checked disabled value=x/>", config).unwrap());
		let start = evs
			.iter()
			.find_map(|ev| match ev {
				Event::StartElement(start) => Some(start),
				_ => None,
			})
			.unwrap();
		assert_eq!(start.attribute_value("", "checked"), Some("checked"));
		assert_eq!(start.attribute_value("", "disabled"), Some("disabled"));
		assert_eq!(start.attribute_value("", "value"), Some("x"));
		assert_eq!(evs.iter().filter(|ev| matches!(ev, Event::Recovered(_))).count(), 3);
	}

	#[test]
	fn mismatched_end_tag_is_fatal_with_location() {
		match read_all("<a>\n  <b></c></a>") {
			Err(e) => {
				match e.kind() {
					Error::NotWellFormed(WFError::ElementMismatch { expected, found }) => {
						assert_eq!(expected.as_str(), "b");
						assert_eq!(found.as_str(), "c");
					}
					other => panic!("unexpected error: {:?}", other),
				}
				assert_eq!(e.location().map(|l| l.line), Some(2));
			}
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn mismatched_end_tag_recovery_closes_to_ancestor() {
		let config = ReaderConfig::default().relax(Relaxation::ELEMENT_MISMATCH);
		let evs = body(read_all_with(b"<a><b><c></a>", config).unwrap());
		let kinds: Vec<_> = evs.iter().map(|ev| ev.event_type()).collect();
		assert_eq!(
			kinds,
			vec![
				EventType::StartElement,
				EventType::StartElement,
				EventType::StartElement,
				EventType::Comment,
				EventType::EndElement,
				EventType::EndElement,
				EventType::EndElement,
			]
		);
	}

	#[test]
	fn double_hyphen_in_comment() {
		match read_all("<a><!-- x -- y --></a>") {
			Err(e) => match e.kind() {
				Error::NotWellFormed(WFError::InvalidSyntax(_)) => (),
				other => panic!("unexpected error: {:?}", other),
			},
			other => panic!("unexpected result: {:?}", other),
		}
		let config = ReaderConfig::default().relax(Relaxation::COMMENT_SYNTAX);
		let evs = body(read_all_with(b"<a><!-- x -- y --></a>", config).unwrap());
		assert!(matches!(evs[1], Event::Recovered(_)));
		assert_eq!(evs[2], Event::Comment(" x -- y ".into()));
	}

	#[test]
	fn cdata_end_in_text_is_rejected() {
		match read_all("<a>x]]>y</a>") {
			Err(e) => match e.kind() {
				Error::NotWellFormed(WFError::InvalidSyntax(_)) => (),
				other => panic!("unexpected error: {:?}", other),
			},
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn cdata_comment_and_pi() {
		let evs = body(read_all("<?pi data here?><a><![CDATA[<x>&amp;]]><!--c--><?t?></a>").unwrap());
		match &evs[0] {
			Event::ProcessingInstruction { target, data } => {
				assert_eq!(target.as_str(), "pi");
				assert_eq!(data, "data here");
			}
			other => panic!("unexpected event: {:?}", other),
		}
		assert_eq!(evs[2], Event::CData("<x>&amp;".into()));
		assert_eq!(evs[3], Event::Comment("c".into()));
		match &evs[4] {
			Event::ProcessingInstruction { target, data } => {
				assert_eq!(target.as_str(), "t");
				assert_eq!(data, "");
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn whitespace_outside_root_is_ignorable() {
		let evs = body(read_all("\n<a> </a>\n").unwrap());
		assert_eq!(evs[0], Event::IgnorableWhitespace("\n".into()));
		assert_eq!(evs[2], Event::Text(" ".into()));
		assert_eq!(evs[4], Event::IgnorableWhitespace("\n".into()));
	}

	#[test]
	fn text_outside_root_is_rejected() {
		match read_all("<a/>junk") {
			Err(e) => match e.kind() {
				Error::NotWellFormed(WFError::UnexpectedChar(ERRCTX_DOCEND, 'j', _)) => (),
				other => panic!("unexpected error: {:?}", other),
			},
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn second_root_is_rejected() {
		assert!(read_all("<a/><b/>").is_err());
	}

	#[test]
	fn eof_inside_element() {
		match read_all("<a><b>") {
			Err(e) => match e.kind() {
				Error::NotWellFormed(WFError::InvalidEof(ERRCTX_CONTENT)) => (),
				other => panic!("unexpected error: {:?}", other),
			},
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn errors_poison_the_reader() {
		let mut reader = XmlReader::from_str("<a></b>");
		reader.read().unwrap();
		reader.read().unwrap();
		let first = reader.read().unwrap_err();
		let second = reader.read().unwrap_err();
		assert_eq!(first, second);
	}

	#[test]
	fn closed_reader_refuses_reads() {
		let mut reader = XmlReader::from_str("<a/>");
		reader.close();
		match reader.read() {
			Err(Error::Closed) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn next_tag_rejects_text() {
		let mut reader = XmlReader::from_str("<a>  <!-- c --> <b/>x</a>");
		assert!(matches!(reader.next_tag().unwrap(), Event::StartElement(_)));
		assert!(matches!(reader.next_tag().unwrap(), Event::StartElement(_)));
		assert!(matches!(reader.next_tag().unwrap(), Event::EndElement(_)));
		match reader.next_tag() {
			Err(Error::UnexpectedEvent {
				found: EventType::Text,
				..
			}) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn doctype_only_once_and_before_root() {
		assert!(read_all("<!DOCTYPE a><!DOCTYPE a><a/>").is_err());
		assert!(read_all("<a/><!DOCTYPE a>").is_err());
		let evs = body(read_all("<!DOCTYPE a SYSTEM \"a>b.dtd\"><a/>").unwrap());
		assert_eq!(evs[0], Event::DocType("a SYSTEM \"a>b.dtd\"".into()));
	}

	#[test]
	fn crlf_is_normalized_in_text() {
		let evs = body(read_all("<a>x\r\ny\rz</a>").unwrap());
		assert_eq!(evs[1], Event::Text("x\ny\nz".into()));
	}
}
