/*!
# Streaming writer

[`XmlWriter`] serializes calls of the [`EventWrite`] interface into a
[`bytes::BufMut`]. Start tags stay "partially open" until the next call which
writes content, so that elements without content are written as `<x/>`.

With namespace repair (the default), the writer declares every namespace a
start tag or attribute needs and which is not yet bound in scope, using the
requested prefix or an automatically generated one.

```
use nsxml::{EventWrite, XmlWriter};

let mut w = XmlWriter::new(Vec::new());
w.start_tag("urn:example", "greeting", Some("ex")).unwrap();
w.attribute("", "lang", None, "en").unwrap();
w.text("Hello & welcome").unwrap();
w.end_tag("urn:example", "greeting").unwrap();
assert_eq!(
	std::str::from_utf8(&w.into_inner()).unwrap(),
	"<ex:greeting xmlns:ex=\"urn:example\" lang=\"en\">Hello &amp; welcome</ex:greeting>",
);
```
*/
mod helpers;
mod indent;
mod scope;

use std::convert::TryFrom;

use bytes::BufMut;
use smartstring::alias::String as SmartString;

use nsxml_validation::{is_whitespace_only, validate_name, validate_ncname};

use crate::error::{Error, Result, WriteError};
use crate::event::Event;
use crate::namespaces::{Namespace, NamespaceContext, NamespaceHolder, XMLNS_XMLNS};
use crate::strings::QName;
use crate::EventRead;

pub use helpers::{
	add_undeclared_namespaces, filter_substream, write_element, write_element_content,
	write_simple_element, SubstreamFilter,
};
pub use indent::{IndentSequence, IndentToken};
pub(crate) use scope::{element_prefix, WriterScope};

/// When the writer emits an XML declaration on its own.
///
/// An explicit [`EventWrite::start_document`] call always writes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlDeclMode {
	/// Never.
	None,
	/// Before the first markup, without an encoding unless one is given.
	Minimal,
	/// Before the first markup, with the encoding.
	Charset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlVersion {
	V1_0,
	V1_1,
}

impl XmlVersion {
	pub fn as_str(self) -> &'static str {
		match self {
			XmlVersion::V1_0 => "1.0",
			XmlVersion::V1_1 => "1.1",
		}
	}
}

/**
Options for [`XmlWriter`].

```
use nsxml::{WriterConfig, XmlDeclMode, XmlWriter};

let config = WriterConfig::default()
	.xml_decl_mode(XmlDeclMode::Minimal)
	.indent_string("  ")
	.unwrap();
let writer = XmlWriter::with_config(Vec::new(), config);
# drop(writer);
```
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
	/// Declare missing namespaces automatically.
	pub repair_namespaces: bool,
	pub xml_decl_mode: XmlDeclMode,
	/// Version used for validating and escaping characters. Changed by an
	/// explicit [`EventWrite::start_document`].
	pub xml_version: XmlVersion,
	/// Written once per depth before tags and comments; empty disables
	/// indentation.
	pub indent: IndentSequence,
	/// Write `<x />` and `?>` with a space in front.
	pub trailing_space_before_end: bool,
	/// Close open elements in [`EventWrite::end_document`] instead of
	/// failing.
	pub auto_close_on_end_document: bool,
}

impl WriterConfig {
	pub fn repair_namespaces(mut self, v: bool) -> WriterConfig {
		self.repair_namespaces = v;
		self
	}

	pub fn xml_decl_mode(mut self, v: XmlDeclMode) -> WriterConfig {
		self.xml_decl_mode = v;
		self
	}

	pub fn xml_version(mut self, v: XmlVersion) -> WriterConfig {
		self.xml_version = v;
		self
	}

	pub fn indent(mut self, v: IndentSequence) -> WriterConfig {
		self.indent = v;
		self
	}

	/// Parse and set the indentation.
	pub fn indent_string(self, v: &str) -> Result<WriterConfig> {
		Ok(self.indent(IndentSequence::try_from(v)?))
	}

	pub fn trailing_space_before_end(mut self, v: bool) -> WriterConfig {
		self.trailing_space_before_end = v;
		self
	}

	pub fn auto_close_on_end_document(mut self, v: bool) -> WriterConfig {
		self.auto_close_on_end_document = v;
		self
	}
}

impl Default for WriterConfig {
	fn default() -> Self {
		Self {
			repair_namespaces: true,
			xml_decl_mode: XmlDeclMode::None,
			xml_version: XmlVersion::V1_0,
			indent: IndentSequence::new(),
			trailing_space_before_end: false,
			auto_close_on_end_document: false,
		}
	}
}

/**
# Sink for XML events

Implemented by [`XmlWriter`] and the DOM builder
([`DomWriter`](crate::dom::DomWriter)). An empty `namespace` argument
denotes the null namespace. A `prefix` of `None` lets the sink choose.
*/
pub trait EventWrite: NamespaceContext {
	/// Write the XML declaration. Only allowed as the very first call.
	fn start_document(
		&mut self,
		version: Option<&str>,
		encoding: Option<&str>,
		standalone: Option<bool>,
	) -> Result<()>;

	/// Finish the document.
	fn end_document(&mut self) -> Result<()>;

	fn start_tag(&mut self, namespace: &str, local_name: &str, prefix: Option<&str>) -> Result<()> {
		self.start_tag_with_namespaces(namespace, local_name, prefix, &[])
	}

	/**
	Open an element together with the namespace declarations made on it.

	The declarations are in effect when the prefix is chosen: a prefix the
	element declares for its own namespace is used even if an ancestor
	binds another prefix to it, and an inherited prefix which the
	declarations rebind is never chosen.
	*/
	fn start_tag_with_namespaces(
		&mut self,
		namespace: &str,
		local_name: &str,
		prefix: Option<&str>,
		declarations: &[Namespace],
	) -> Result<()>;

	/// Close the innermost element, which must have the given name.
	fn end_tag(&mut self, namespace: &str, local_name: &str) -> Result<()>;

	/// Add an attribute to the start tag just written.
	///
	/// Attributes in the `xmlns` namespace, and the unprefixed `xmlns`
	/// attribute, are namespace declarations and handled like
	/// [`namespace_attr`](Self::namespace_attr).
	fn attribute(
		&mut self,
		namespace: &str,
		local_name: &str,
		prefix: Option<&str>,
		value: &str,
	) -> Result<()>;

	/// Declare `prefix` (empty for the default namespace) on the start tag
	/// just written.
	fn namespace_attr(&mut self, prefix: &str, uri: &str) -> Result<()>;

	fn text(&mut self, text: &str) -> Result<()>;

	fn cdsect(&mut self, text: &str) -> Result<()>;

	fn comment(&mut self, text: &str) -> Result<()>;

	fn processing_instruction(&mut self, target: &str, data: &str) -> Result<()>;

	fn entity_ref(&mut self, name: &str) -> Result<()>;

	/// Write whitespace which carries no meaning.
	fn ignorable_whitespace(&mut self, text: &str) -> Result<()>;

	/// Write a document type declaration with the given content.
	fn docdecl(&mut self, text: &str) -> Result<()>;

	/// Number of open elements.
	fn depth(&self) -> usize;

	fn close(&mut self) -> Result<()>;

	/**
	Write a single event.

	A START_DOCUMENT without a version (as produced for documents without
	an XML declaration) writes nothing. A START_ELEMENT goes through
	[`start_tag_with_namespaces`](Self::start_tag_with_namespaces) with its
	own declarations. [`Event::Recovered`] is dropped.
	*/
	fn write_event(&mut self, ev: &Event) -> Result<()> {
		write_event_to(self, ev)
	}
}

fn write_event_to<W: EventWrite + ?Sized>(w: &mut W, ev: &Event) -> Result<()> {
	match ev {
		Event::StartDocument(decl) => match decl.version.as_deref() {
			Some(version) => w.start_document(Some(version), decl.encoding.as_deref(), decl.standalone),
			None => Ok(()),
		},
		Event::EndDocument => w.end_document(),
		Event::StartElement(start) => {
			let name = &start.name;
			w.start_tag_with_namespaces(
				&name.namespace,
				&name.local_name,
				Some(&name.prefix),
				&start.namespace_decls,
			)?;
			for attr in start.attributes.iter() {
				w.attribute(
					&attr.name.namespace,
					&attr.name.local_name,
					Some(&attr.name.prefix),
					&attr.value,
				)?;
			}
			Ok(())
		}
		Event::EndElement(name) => w.end_tag(&name.namespace, &name.local_name),
		Event::Text(text) => w.text(text),
		Event::IgnorableWhitespace(text) => w.ignorable_whitespace(text),
		Event::CData(text) => w.cdsect(text),
		Event::Comment(text) => w.comment(text),
		Event::ProcessingInstruction { target, data } => w.processing_instruction(target, data),
		Event::DocType(text) => w.docdecl(text),
		Event::EntityRef(name) => w.entity_ref(name),
		Event::Attribute(attr) => w.attribute(
			&attr.name.namespace,
			&attr.name.local_name,
			Some(&attr.name.prefix),
			&attr.value,
		),
		Event::Recovered(_) => Ok(()),
	}
}

/// Copy all remaining events of `reader` into `writer`.
///
/// Document boundaries and the document type declaration are dropped when
/// the writer is inside an element, so that a document can be embedded.
pub fn serialize<R, W>(reader: &mut R, writer: &mut W) -> Result<()>
where
	R: EventRead + ?Sized,
	W: EventWrite + ?Sized,
{
	while let Some(ev) = reader.read()? {
		match ev {
			Event::StartDocument(_) | Event::EndDocument | Event::DocType(_)
				if writer.depth() > 0 => {}
			ev => writer.write_event(&ev)?,
		}
	}
	Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
	BeforeDocument,
	AfterXmlDecl,
	AfterDocTypeDecl,
	InTagContent,
	Finished,
}

/// What was written last, for deciding about indentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastWrite {
	/// Text: never indent in mixed content.
	Text,
	/// A start tag at this depth.
	Tag(usize),
	/// An end tag, comment or declaration: always indent.
	Markup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EscapeMode {
	/// Comments, CDATA sections, processing instructions: only validate.
	Minimal,
	AttrQuot,
	AttrApos,
	Text,
}

enum Escaped {
	Entity(&'static str),
	CharRef(u32),
}

fn escape_char(ch: char, mode: EscapeMode, version: XmlVersion) -> Result<Option<Escaped>> {
	let is_attr = matches!(mode, EscapeMode::AttrQuot | EscapeMode::AttrApos);
	let restricted = |cp: u32| -> Result<Option<Escaped>> {
		match (version, mode) {
			(XmlVersion::V1_1, EscapeMode::Minimal) | (XmlVersion::V1_0, _) => {
				Err(WriteError::InvalidChar(cp).into())
			}
			(XmlVersion::V1_1, _) => Ok(Some(Escaped::CharRef(cp))),
		}
	};
	Ok(match ch {
		'&' if mode != EscapeMode::Minimal => Some(Escaped::Entity("&amp;")),
		'<' if mode != EscapeMode::Minimal => Some(Escaped::Entity("&lt;")),
		'>' if mode == EscapeMode::Text => Some(Escaped::Entity("&gt;")),
		'"' if mode == EscapeMode::AttrQuot => Some(Escaped::Entity("&quot;")),
		'\'' if mode == EscapeMode::AttrApos => Some(Escaped::Entity("&apos;")),
		'\t' | '\n' | '\r' if is_attr => Some(Escaped::CharRef(ch as u32)),
		'\r' if mode == EscapeMode::Text => Some(Escaped::CharRef(ch as u32)),
		'\t' | '\n' | '\r' => None,
		'\0' | '\u{fffe}' | '\u{ffff}' => return Err(WriteError::InvalidChar(ch as u32).into()),
		'\u{1}'..='\u{1f}' => return restricted(ch as u32),
		'\u{7f}'..='\u{84}' | '\u{86}'..='\u{9f}' if version == XmlVersion::V1_1 => {
			return restricted(ch as u32)
		}
		_ => None,
	})
}

fn write_escaped<B: BufMut>(
	out: &mut B,
	data: &str,
	mode: EscapeMode,
	version: XmlVersion,
) -> Result<()> {
	let bytes = data.as_bytes();
	let mut last_index = 0;
	for (i, ch) in data.char_indices() {
		let escaped = match escape_char(ch, mode, version)? {
			Some(escaped) => escaped,
			None => continue,
		};
		if i > last_index {
			out.put_slice(&bytes[last_index..i]);
		}
		match escaped {
			Escaped::Entity(entity) => out.put_slice(entity.as_bytes()),
			Escaped::CharRef(cp) => out.put_slice(format!("&#x{:x};", cp).as_bytes()),
		}
		last_index = i + ch.len_utf8();
	}
	out.put_slice(&bytes[last_index..]);
	Ok(())
}

fn is_utf8_label(label: &str) -> bool {
	label.eq_ignore_ascii_case("UTF-8") || label.eq_ignore_ascii_case("UTF8")
}

pub(crate) fn check_ncname(name: &str) -> Result<()> {
	validate_ncname(name).map_err(|_| WriteError::InvalidName(name.into()).into())
}

/**
Serializer for XML documents and fragments.

Several top-level elements may be written in sequence, which is what
fragment capture relies on; [`EventWrite::end_document`] ends the output.
Errors are reported at the offending call and leave the writer usable, but
the output may contain the partial construct.
*/
pub struct XmlWriter<O> {
	out: O,
	config: WriterConfig,
	indent: String,
	version: XmlVersion,
	state: WriteState,
	partial: bool,
	elements: Vec<QName>,
	scope: WriterScope,
	last_write: Option<LastWrite>,
	closed: bool,
}

impl<O: BufMut> XmlWriter<O> {
	/// Create a writer with default options.
	pub fn new(out: O) -> XmlWriter<O> {
		Self::with_config(out, WriterConfig::default())
	}

	pub fn with_config(out: O, config: WriterConfig) -> XmlWriter<O> {
		XmlWriter {
			out,
			indent: config.indent.render(),
			version: config.xml_version,
			scope: WriterScope::new(NamespaceHolder::new(), config.repair_namespaces),
			config,
			state: WriteState::BeforeDocument,
			partial: false,
			elements: Vec::new(),
			last_write: None,
			closed: false,
		}
	}

	pub fn config(&self) -> &WriterConfig {
		&self.config
	}

	/// XML version in effect.
	pub fn xml_version(&self) -> XmlVersion {
		self.version
	}

	pub fn get_ref(&self) -> &O {
		&self.out
	}

	/// Return the output, finishing a partially open start tag.
	pub fn into_inner(mut self) -> O {
		self.finish_partial_start_tag(false);
		self.out
	}

	/// Open an element, preferring `name.prefix` if it is already bound to
	/// `name.namespace`, then any prefix bound to the namespace, and
	/// declaring `name.prefix` otherwise.
	pub fn smart_start_tag(&mut self, name: &QName) -> Result<()> {
		let bound = self.scope.namespace_uri(&name.prefix) == Some(name.namespace.as_str());
		let prefix: SmartString = if name.namespace.is_empty() || bound {
			name.prefix.clone()
		} else {
			match self.scope.prefix(&name.namespace) {
				Some(existing) => existing.into(),
				None => name.prefix.clone(),
			}
		};
		self.open_tag(&name.namespace, &name.local_name, &prefix, &[])
	}

	fn check_open(&self) -> Result<()> {
		if self.closed {
			Err(Error::Closed)
		} else {
			Ok(())
		}
	}

	fn finish_partial_start_tag(&mut self, close: bool) {
		if !self.partial {
			return;
		}
		self.partial = false;
		self.scope.seal();
		let end: &[u8] = match (close, self.config.trailing_space_before_end) {
			(false, _) => b">",
			(true, true) => b" />",
			(true, false) => b"/>",
		};
		self.out.put_slice(end);
	}

	fn write_indent(&mut self, next: LastWrite) {
		let depth = self.scope.depth();
		let needed = !self.indent.is_empty()
			&& match self.last_write {
				None | Some(LastWrite::Text) => false,
				Some(LastWrite::Tag(d)) => d != depth,
				Some(LastWrite::Markup) => true,
			};
		if needed {
			self.finish_partial_start_tag(false);
			self.out.put_u8(b'\n');
			for _ in 0..depth {
				self.out.put_slice(self.indent.as_bytes());
			}
		}
		self.last_write = Some(next);
	}

	fn trigger_start_document(&mut self) -> Result<()> {
		if self.state != WriteState::BeforeDocument {
			return Ok(());
		}
		if self.config.xml_decl_mode != XmlDeclMode::None {
			self.start_document(None, None, None)?;
		}
		self.state = WriteState::AfterXmlDecl;
		Ok(())
	}

	fn open_tag(
		&mut self,
		namespace: &str,
		local_name: &str,
		prefix: &str,
		declarations: &[Namespace],
	) -> Result<()> {
		self.check_open()?;
		check_ncname(local_name)?;
		if !prefix.is_empty() {
			check_ncname(prefix)?;
		}
		self.finish_partial_start_tag(false);
		self.trigger_start_document()?;
		self.write_indent(LastWrite::Tag(self.scope.depth()));
		if self.state == WriteState::Finished {
			return Err(WriteError::EndOfDocument.into());
		}
		self.state = WriteState::InTagContent;

		self.elements
			.push(QName::with_prefix(namespace, local_name, prefix));
		self.out.put_u8(b'<');
		if !prefix.is_empty() {
			self.out.put_slice(prefix.as_bytes());
			self.out.put_u8(b':');
		}
		self.out.put_slice(local_name.as_bytes());
		self.partial = true;

		self.scope.open(namespace, prefix);
		for ns in declarations {
			self.namespace_attr(&ns.prefix, &ns.uri)?;
		}
		match self.scope.missing_element_binding(namespace, prefix) {
			Some(ns) => self.namespace_attr(&ns.prefix, &ns.uri),
			None => Ok(()),
		}
	}

	fn raw_write_attribute(&mut self, prefix: &str, local_name: &str, value: &str) -> Result<()> {
		self.out.put_u8(b' ');
		if !prefix.is_empty() {
			self.out.put_slice(prefix.as_bytes());
			self.out.put_u8(b':');
		}
		self.out.put_slice(local_name.as_bytes());
		self.out.put_u8(b'=');
		let (quote, mode) = if value.contains('"') {
			(b'\'', EscapeMode::AttrApos)
		} else {
			(b'"', EscapeMode::AttrQuot)
		};
		self.out.put_u8(quote);
		write_escaped(&mut self.out, value, mode, self.version)?;
		self.out.put_u8(quote);
		Ok(())
	}
}

impl<O: BufMut> EventWrite for XmlWriter<O> {
	/// Write the XML declaration.
	///
	/// The output is always UTF-8, so that is the only encoding which can be
	/// declared; other labels fail with [`Error::UnsupportedEncoding`].
	fn start_document(
		&mut self,
		version: Option<&str>,
		encoding: Option<&str>,
		standalone: Option<bool>,
	) -> Result<()> {
		self.check_open()?;
		if self.state != WriteState::BeforeDocument {
			return Err(WriteError::MisplacedXmlDeclaration.into());
		}
		if let Some(label) = encoding {
			if !is_utf8_label(label) {
				return Err(Error::UnsupportedEncoding(label.into()));
			}
		}
		self.write_indent(LastWrite::Markup);
		self.state = WriteState::AfterXmlDecl;
		match version {
			None => (),
			Some("1") | Some("1.0") => self.version = XmlVersion::V1_0,
			Some(_) => self.version = XmlVersion::V1_1,
		}
		self.out.put_slice(b"<?xml version='");
		self.out.put_slice(self.version.as_str().as_bytes());
		self.out.put_u8(b'\'');
		if self.config.xml_decl_mode != XmlDeclMode::Minimal || encoding.is_some() {
			self.out.put_slice(b" encoding='UTF-8'");
		}
		if let Some(standalone) = standalone {
			self.out.put_slice(if standalone {
				b" standalone='yes'"
			} else {
				b" standalone='no'"
			});
		}
		if self.config.trailing_space_before_end {
			self.out.put_u8(b' ');
		}
		self.out.put_slice(b"?>");
		Ok(())
	}

	/// Like the provided method, except that the encoding of a
	/// START_DOCUMENT is not passed on: it describes the source, the output
	/// is UTF-8.
	fn write_event(&mut self, ev: &Event) -> Result<()> {
		match ev {
			Event::StartDocument(decl) => match decl.version.as_deref() {
				Some(version) => self.start_document(Some(version), None, decl.standalone),
				None => Ok(()),
			},
			ev => write_event_to(self, ev),
		}
	}

	fn end_document(&mut self) -> Result<()> {
		self.check_open()?;
		if !self.elements.is_empty() {
			if !self.config.auto_close_on_end_document {
				return Err(WriteError::UnbalancedEndDocument(self.elements.len()).into());
			}
			while let Some(top) = self.elements.last().cloned() {
				self.end_tag(&top.namespace, &top.local_name)?;
			}
		}
		self.finish_partial_start_tag(false);
		self.state = WriteState::Finished;
		Ok(())
	}

	fn start_tag_with_namespaces(
		&mut self,
		namespace: &str,
		local_name: &str,
		prefix: Option<&str>,
		declarations: &[Namespace],
	) -> Result<()> {
		self.check_open()?;
		let applied = self
			.scope
			.choose_element_prefix(namespace, prefix, declarations);
		self.open_tag(namespace, local_name, &applied, declarations)
	}

	fn end_tag(&mut self, namespace: &str, local_name: &str) -> Result<()> {
		self.check_open()?;
		let top = match self.elements.last() {
			Some(top) => top,
			None => return Err(WriteError::NoOpenElement.into()),
		};
		if !top.matches(namespace, local_name) {
			return Err(WriteError::ElementMismatch {
				expected: top.to_string().into(),
				found: QName::new(namespace, local_name).to_string().into(),
			}
			.into());
		}
		self.scope.close();
		self.write_indent(LastWrite::Markup);
		let top = match self.elements.pop() {
			Some(top) => top,
			None => return Err(WriteError::NoOpenElement.into()),
		};
		if self.partial {
			self.finish_partial_start_tag(true);
		} else {
			self.out.put_slice(b"</");
			if !top.prefix.is_empty() {
				self.out.put_slice(top.prefix.as_bytes());
				self.out.put_u8(b':');
			}
			self.out.put_slice(top.local_name.as_bytes());
			self.out.put_u8(b'>');
		}
		Ok(())
	}

	fn attribute(
		&mut self,
		namespace: &str,
		local_name: &str,
		prefix: Option<&str>,
		value: &str,
	) -> Result<()> {
		self.check_open()?;
		if namespace == XMLNS_XMLNS {
			return self.namespace_attr(local_name, value);
		}
		if namespace.is_empty() && local_name == "xmlns" {
			return self.namespace_attr("", value);
		}
		if !self.partial {
			return Err(WriteError::AttributeNotAllowed.into());
		}
		check_ncname(local_name)?;
		let (actual, declaration) = self.scope.attribute_prefix(namespace, prefix.unwrap_or(""));
		if let Some(ns) = declaration {
			self.namespace_attr(&ns.prefix, &ns.uri)?;
		}
		self.raw_write_attribute(&actual, local_name, value)
	}

	fn namespace_attr(&mut self, prefix: &str, uri: &str) -> Result<()> {
		self.check_open()?;
		if !self.partial {
			return Err(WriteError::AttributeNotAllowed.into());
		}
		if !self.scope.declare(prefix, uri)? {
			return Ok(());
		}
		if prefix.is_empty() {
			self.raw_write_attribute("", "xmlns", uri)
		} else {
			self.raw_write_attribute("xmlns", prefix, uri)
		}
	}

	fn text(&mut self, text: &str) -> Result<()> {
		self.check_open()?;
		if text.is_empty() {
			return Ok(());
		}
		self.finish_partial_start_tag(false);
		write_escaped(&mut self.out, text, EscapeMode::Text, self.version)?;
		self.last_write = Some(LastWrite::Text);
		Ok(())
	}

	fn cdsect(&mut self, text: &str) -> Result<()> {
		self.check_open()?;
		self.finish_partial_start_tag(false);
		self.out.put_slice(b"<![CDATA[");
		let mut parts = text.split("]]>");
		if let Some(first) = parts.next() {
			write_escaped(&mut self.out, first, EscapeMode::Minimal, self.version)?;
		}
		for part in parts {
			// split the terminator over two sections
			self.out.put_slice(b"]]]]><![CDATA[>");
			write_escaped(&mut self.out, part, EscapeMode::Minimal, self.version)?;
		}
		self.out.put_slice(b"]]>");
		self.last_write = Some(LastWrite::Text);
		Ok(())
	}

	fn comment(&mut self, text: &str) -> Result<()> {
		self.check_open()?;
		self.finish_partial_start_tag(false);
		self.trigger_start_document()?;
		self.write_indent(LastWrite::Markup);
		self.out.put_slice(b"<!--");
		let mut last_was_hyphen = false;
		for ch in text.chars() {
			if ch == '-' {
				if last_was_hyphen {
					self.out.put_slice(b"&#x2d;");
					last_was_hyphen = false;
				} else {
					self.out.put_u8(b'-');
					last_was_hyphen = true;
				}
				continue;
			}
			last_was_hyphen = false;
			escape_char(ch, EscapeMode::Minimal, self.version)?;
			let mut buf = [0u8; 4];
			self.out.put_slice(ch.encode_utf8(&mut buf).as_bytes());
		}
		if last_was_hyphen {
			self.out.put_u8(b' ');
		}
		self.out.put_slice(b"-->");
		Ok(())
	}

	fn processing_instruction(&mut self, target: &str, data: &str) -> Result<()> {
		self.check_open()?;
		if validate_name(target).is_err() || target.eq_ignore_ascii_case("xml") {
			return Err(WriteError::InvalidName(target.into()).into());
		}
		if data.contains("?>") {
			return Err(WriteError::InvalidContent("'?>' in processing instruction data").into());
		}
		self.finish_partial_start_tag(false);
		self.trigger_start_document()?;
		self.write_indent(LastWrite::Markup);
		self.out.put_slice(b"<?");
		self.out.put_slice(target.as_bytes());
		if !data.is_empty() {
			self.out.put_u8(b' ');
			write_escaped(&mut self.out, data, EscapeMode::Minimal, self.version)?;
		}
		self.out.put_slice(b"?>");
		Ok(())
	}

	fn entity_ref(&mut self, name: &str) -> Result<()> {
		self.check_open()?;
		check_ncname(name)?;
		self.finish_partial_start_tag(false);
		self.out.put_u8(b'&');
		self.out.put_slice(name.as_bytes());
		self.out.put_u8(b';');
		self.last_write = Some(LastWrite::Text);
		Ok(())
	}

	fn ignorable_whitespace(&mut self, text: &str) -> Result<()> {
		self.check_open()?;
		if text.is_empty() {
			return Ok(());
		}
		if !is_whitespace_only(text) {
			return Err(WriteError::NotWhitespace.into());
		}
		self.finish_partial_start_tag(false);
		self.trigger_start_document()?;
		self.out.put_slice(text.as_bytes());
		self.last_write = Some(LastWrite::Text);
		Ok(())
	}

	fn docdecl(&mut self, text: &str) -> Result<()> {
		self.check_open()?;
		self.trigger_start_document()?;
		if self.state != WriteState::AfterXmlDecl {
			return Err(WriteError::MisplacedDoctype.into());
		}
		self.write_indent(LastWrite::Markup);
		self.state = WriteState::AfterDocTypeDecl;
		self.out.put_slice(b"<!DOCTYPE ");
		write_escaped(&mut self.out, text.trim_start(), EscapeMode::Minimal, self.version)?;
		self.out.put_u8(b'>');
		Ok(())
	}

	fn depth(&self) -> usize {
		self.scope.depth()
	}

	/// Finish a partially open start tag and release the namespace state.
	/// Further calls fail with [`Error::Closed`].
	fn close(&mut self) -> Result<()> {
		if self.closed {
			return Ok(());
		}
		self.finish_partial_start_tag(false);
		self.scope.clear();
		self.elements.clear();
		self.closed = true;
		Ok(())
	}
}

impl<O> NamespaceContext for XmlWriter<O> {
	fn namespace_uri(&self, prefix: &str) -> Option<&str> {
		self.scope.namespace_uri(prefix)
	}

	fn prefix(&self, uri: &str) -> Option<&str> {
		self.scope.prefix(uri)
	}
}
