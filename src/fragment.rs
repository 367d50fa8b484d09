/*!
# Fragment capture

A [`CompactFragment`] is a piece of serialized XML content (no wrapping
element) together with the namespace bindings it relies on but does not
declare itself. [`siblings_to_fragment`] captures one from an event
stream, [`FragmentReader`] turns it back into events.

```
use nsxml::{read_fragment, EventRead, FragmentReader, XmlReader};

let mut reader = XmlReader::from_str(
	"<root xmlns:p='urn:p'><p:item>1</p:item><p:item>2</p:item></root>",
);
let fragment = read_fragment(&mut reader).unwrap();
assert_eq!(fragment.content(), "<p:item>1</p:item><p:item>2</p:item>");
assert_eq!(fragment.namespaces()[0].uri.as_str(), "urn:p");

let mut replay = FragmentReader::new(&fragment).unwrap();
let mut count = 0;
replay.read_all(|_| count += 1).unwrap();
assert_eq!(count, 6);
```
*/
use std::fmt;
use std::io;

use crate::error::{Error, Result};
use crate::event::{Event, EventType};
use crate::namespaces::{Namespace, NamespaceContext, NamespaceHolder};
use crate::reader::{Encoding, ReaderConfig, XmlReader};
use crate::writer::{element_prefix, serialize, EventWrite, WriterConfig, XmlWriter};
use crate::EventRead;

/// Namespace of the synthetic element wrapping fragment content while it is
/// parsed.
pub const FRAGMENT_WRAPPER_NS: &str = "urn:x-nsxml:fragment";

/// Serialized content plus the namespace bindings it needs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompactFragment {
	namespaces: Vec<Namespace>,
	content: String,
}

impl CompactFragment {
	pub fn new(namespaces: Vec<Namespace>, content: impl Into<String>) -> CompactFragment {
		CompactFragment {
			namespaces,
			content: content.into(),
		}
	}

	/// A fragment which does not depend on any namespace bindings.
	pub fn from_content(content: impl Into<String>) -> CompactFragment {
		Self::new(Vec::new(), content)
	}

	/// Bindings the content uses without declaring them.
	pub fn namespaces(&self) -> &[Namespace] {
		&self.namespaces
	}

	pub fn content(&self) -> &str {
		&self.content
	}

	pub fn is_empty(&self) -> bool {
		self.content.is_empty()
	}

	/// Parse the content and write its events into `writer`.
	pub fn write_to<W: EventWrite + ?Sized>(&self, writer: &mut W) -> Result<()> {
		let mut reader = FragmentReader::new(self)?;
		serialize(&mut reader, writer)
	}
}

impl fmt::Display for CompactFragment {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.write_str(&self.content)
	}
}

/// Bindings used but not declared by captured content.
#[derive(Default)]
struct MissingNamespaces {
	bindings: Vec<Namespace>,
}

impl MissingNamespaces {
	/// Record that `prefix` must resolve to `uri` where the fragment is
	/// parsed. Returns false if the prefix is already required to resolve
	/// to something else, in which case it has to be declared locally.
	fn require(&mut self, prefix: &str, uri: &str) -> bool {
		match self.bindings.iter().find(|ns| ns.prefix.as_str() == prefix) {
			Some(existing) => existing.uri.as_str() == uri,
			None => {
				self.bindings.push(Namespace::new(prefix, uri));
				true
			}
		}
	}

	fn into_namespaces(mut self) -> Vec<Namespace> {
		// the null namespace is what an unbound default resolves to anyway
		self.bindings
			.retain(|ns| !(ns.prefix.is_empty() && ns.uri.is_empty()));
		self.bindings
	}
}

/// True if a non-empty prefix bound to `uri` is visible in `local`.
fn has_attribute_prefix(local: &NamespaceHolder, uri: &str) -> bool {
	local
		.iter()
		.rev()
		.any(|ns| !ns.prefix.is_empty() && ns.uri.as_str() == uri && local.namespace_uri(&ns.prefix) == Some(uri))
}

/**
Capture events from `reader` into a fragment, up to the end of the current
parent element.

Capture stops at the end tag of the element the reader is positioned in,
which is consumed, or at the end of the document. Namespace prefixes which
the captured names use but which are declared outside of the captured range
are recorded in [`CompactFragment::namespaces`].
*/
pub fn siblings_to_fragment<R: EventRead + ?Sized>(reader: &mut R) -> Result<CompactFragment> {
	let config = WriterConfig::default().repair_namespaces(false);
	let mut writer = XmlWriter::with_config(Vec::new(), config);
	let mut local = NamespaceHolder::new();
	let mut missing = MissingNamespaces::default();
	let mut depth = 0usize;

	while let Some(ev) = reader.read()? {
		match ev {
			Event::StartElement(start) => {
				let name = &start.name;
				// what the writer will pick, with the element's own declarations in effect
				let chosen_prefix = element_prefix(
					&local,
					&name.namespace,
					Some(&name.prefix),
					&start.namespace_decls,
				)
				.unwrap_or_else(|| name.prefix.clone());
				local.inc_depth();
				for ns in start.namespace_decls.iter() {
					local.add_prefix_to_context(&ns.prefix, &ns.uri);
				}

				let mut extra: Vec<Namespace> = Vec::new();
				let mut need = |local: &mut NamespaceHolder, prefix: &str, uri: &str| {
					if !missing.require(prefix, uri) {
						log::trace!("declaring {:?} locally in fragment, it is bound differently", prefix);
						local.add_prefix_to_context(prefix, uri);
						extra.push(Namespace::new(prefix, uri));
					}
				};
				if name.namespace.is_empty() {
					if !local.iter().any(|ns| ns.prefix.is_empty()) {
						need(&mut local, "", "");
					}
				} else if local.namespace_uri(&chosen_prefix) != Some(name.namespace.as_str()) {
					need(&mut local, &chosen_prefix, &name.namespace);
				}
				for attr in start.attributes.iter() {
					let (prefix, uri) = (attr.name.prefix.as_str(), attr.name.namespace.as_str());
					if uri.is_empty()
						|| (!prefix.is_empty() && local.namespace_uri(prefix) == Some(uri))
						|| has_attribute_prefix(&local, uri)
					{
						continue;
					}
					need(&mut local, prefix, uri);
				}

				let mut declarations = start.namespace_decls.clone();
				declarations.extend(extra);
				writer.start_tag_with_namespaces(
					&name.namespace,
					&name.local_name,
					Some(&chosen_prefix),
					&declarations,
				)?;
				for attr in start.attributes.iter() {
					writer.attribute(
						&attr.name.namespace,
						&attr.name.local_name,
						Some(&attr.name.prefix),
						&attr.value,
					)?;
				}
				depth += 1;
			}
			Event::EndElement(name) => {
				if depth == 0 {
					break;
				}
				writer.end_tag(&name.namespace, &name.local_name)?;
				local.dec_depth();
				depth -= 1;
			}
			Event::EndDocument => break,
			Event::Text(text) => writer.text(&text)?,
			Event::IgnorableWhitespace(text) => writer.ignorable_whitespace(&text)?,
			Event::CData(text) => writer.cdsect(&text)?,
			Event::Comment(text) => writer.comment(&text)?,
			Event::ProcessingInstruction { target, data } => {
				writer.processing_instruction(&target, &data)?
			}
			Event::EntityRef(name) => writer.entity_ref(&name)?,
			Event::StartDocument(_) | Event::DocType(_) | Event::Attribute(_) | Event::Recovered(_) => (),
		}
	}

	let bytes = writer.into_inner();
	let content = String::from_utf8(bytes).map_err(|e| {
		let index = e.utf8_error().valid_up_to();
		Error::InvalidUtf8Byte(e.as_bytes()[index])
	})?;
	Ok(CompactFragment::new(missing.into_namespaces(), content))
}

/// Like [`siblings_to_fragment`], but only the serialized content is kept.
pub fn siblings_to_string<R: EventRead + ?Sized>(reader: &mut R) -> Result<String> {
	Ok(siblings_to_fragment(reader)?.content)
}

/**
Capture the content of the next element into a fragment.

Leading whitespace, comments, processing instructions and the document
prologue are skipped. The next event must then be a start tag; its content
up to and including the matching end tag is consumed. An empty fragment is
returned at the end of the document.
*/
pub fn read_fragment<R: EventRead + ?Sized>(reader: &mut R) -> Result<CompactFragment> {
	loop {
		let ev = match reader.read()? {
			Some(ev) => ev,
			None => return Ok(CompactFragment::default()),
		};
		match ev.event_type() {
			EventType::StartElement => return siblings_to_fragment(reader),
			EventType::EndDocument => return Ok(CompactFragment::default()),
			EventType::StartDocument | EventType::DocType => continue,
			kind if kind.is_ignorable() => continue,
			EventType::Text if ev.is_whitespace() => continue,
			other => {
				return Err(Error::UnexpectedEvent {
					expected: "START_ELEMENT",
					found: other,
				})
			}
		}
	}
}

/**
Event source over the content of a [`CompactFragment`].

The content is parsed inside a synthetic element which declares the
fragment's namespaces. The events of that element, and the document events,
are not reported.
*/
pub struct FragmentReader {
	inner: XmlReader<io::Cursor<Vec<u8>>>,
	wrapper_seen: bool,
	depth: usize,
}

impl FragmentReader {
	pub fn new(fragment: &CompactFragment) -> Result<FragmentReader> {
		let mut wrapper_prefix = String::from("w");
		let mut n = 0;
		while fragment
			.namespaces
			.iter()
			.any(|ns| ns.prefix.as_str() == wrapper_prefix)
		{
			n += 1;
			wrapper_prefix = format!("w{}", n);
		}

		let mut wrapper = XmlWriter::new(Vec::new());
		wrapper.start_tag(FRAGMENT_WRAPPER_NS, "fragment", Some(&wrapper_prefix))?;
		for ns in fragment.namespaces.iter() {
			wrapper.namespace_attr(&ns.prefix, &ns.uri)?;
		}
		let mut buf = wrapper.into_inner();
		buf.extend_from_slice(fragment.content.as_bytes());
		buf.extend_from_slice(format!("</{}:fragment>", wrapper_prefix).as_bytes());

		let config = ReaderConfig::default().encoding(Some(Encoding::Utf8));
		Ok(FragmentReader {
			inner: XmlReader::with_config(io::Cursor::new(buf), config),
			wrapper_seen: false,
			depth: 0,
		})
	}

	/// Number of open elements inside the fragment.
	pub fn depth(&self) -> usize {
		self.depth
	}

	pub fn into_inner(self) -> XmlReader<io::Cursor<Vec<u8>>> {
		self.inner
	}
}

impl EventRead for FragmentReader {
	fn read(&mut self) -> Result<Option<Event>> {
		loop {
			let ev = match self.inner.read()? {
				Some(ev) => ev,
				None => return Ok(None),
			};
			match ev {
				Event::StartDocument(_) | Event::EndDocument => continue,
				Event::StartElement(_) if !self.wrapper_seen => {
					self.wrapper_seen = true;
					continue;
				}
				Event::StartElement(_) => {
					self.depth += 1;
					return Ok(Some(ev));
				}
				Event::EndElement(_) if self.depth == 0 => continue,
				Event::EndElement(_) => {
					self.depth -= 1;
					return Ok(Some(ev));
				}
				ev => return Ok(Some(ev)),
			}
		}
	}
}

impl NamespaceContext for FragmentReader {
	fn namespace_uri(&self, prefix: &str) -> Option<&str> {
		self.inner.namespace_uri(prefix)
	}

	fn prefix(&self, uri: &str) -> Option<&str> {
		self.inner.prefix(uri)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::strings::QName;

	fn events<R: EventRead>(mut r: R) -> Vec<Event> {
		let mut out = Vec::new();
		r.read_all(|ev| out.push(ev)).unwrap();
		out
	}

	fn capture(doc: &str) -> CompactFragment {
		let mut reader = XmlReader::from_str(doc);
		read_fragment(&mut reader).unwrap()
	}

	#[test]
	fn records_namespaces_from_outer_scope() {
		let f = capture("<r xmlns='urn:d' xmlns:p='urn:p'><a p:x='1'/><p:b/></r>");
		assert_eq!(f.content(), "<a p:x=\"1\"/><p:b/>");
		assert_eq!(
			f.namespaces(),
			&[Namespace::new("", "urn:d"), Namespace::new("p", "urn:p")][..]
		);
	}

	#[test]
	fn siblings_to_string_keeps_only_the_content() {
		let mut reader = XmlReader::from_str("<r xmlns:p='urn:p'><p:a/>x</r>");
		reader.next_tag().unwrap();
		assert_eq!(siblings_to_string(&mut reader).unwrap(), "<p:a/>x");
	}

	#[test]
	fn local_declarations_are_not_recorded() {
		let f = capture("<r><a xmlns='urn:a'><b/></a></r>");
		assert_eq!(f.content(), "<a xmlns=\"urn:a\"><b/></a>");
		assert!(f.namespaces().is_empty());
	}

	#[test]
	fn null_namespace_next_to_default_namespace() {
		let f = capture("<r xmlns:p='urn:p'><x/><y xmlns='urn:d'/><p:z xmlns=''/></r>");
		assert!(f.namespaces().iter().all(|ns| !ns.prefix.is_empty()));
		let evs = events(FragmentReader::new(&f).unwrap());
		match &evs[0] {
			Event::StartElement(start) => assert_eq!(start.name, QName::local("x")),
			other => panic!("unexpected event: {:?}", other),
		}
		match &evs[2] {
			Event::StartElement(start) => assert_eq!(start.name.namespace.as_str(), "urn:d"),
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn undeclared_default_round_trips() {
		let f = capture("<r><x/><d:y xmlns:d='urn:d'/></r>");
		assert!(f.namespaces().is_empty());
		let f2 = capture("<r xmlns='urn:d'><y/><x xmlns=''/><y/></r>");
		let evs = events(FragmentReader::new(&f2).unwrap());
		let names: Vec<String> = evs
			.iter()
			.filter_map(|ev| match ev {
				Event::StartElement(start) => Some(start.name.to_string()),
				_ => None,
			})
			.collect();
		assert_eq!(names, vec!["{urn:d}y", "x", "{urn:d}y"]);
	}

	#[test]
	fn reading_back_is_equivalent() {
		let doc = "<r xmlns:p='urn:p'><p:a k='v'>t&amp;<!--c--><b><![CDATA[<x>]]></b></p:a>tail</r>";
		let f = capture(doc);
		let evs = events(FragmentReader::new(&f).unwrap());

		let mut reader = XmlReader::from_str(doc);
		let mut original = Vec::new();
		reader.read_all(|ev| original.push(ev)).unwrap();
		// strip document, root start and end
		let inner: Vec<Event> = original[2..original.len() - 2].to_vec();

		let strip = |evs: &[Event]| -> Vec<Event> {
			evs.iter()
				.map(|ev| match ev {
					Event::StartElement(start) => {
						let mut start = start.clone();
						start.namespace_decls.clear();
						Event::StartElement(start)
					}
					other => other.clone(),
				})
				.collect()
		};
		assert_eq!(strip(&evs), strip(&inner));
	}

	#[test]
	fn capture_is_idempotent() {
		let f = capture("<r xmlns:p='urn:p'><p:a><b xmlns='urn:b'><c/></b></p:a> x </r>");
		let mut reader = FragmentReader::new(&f).unwrap();
		let again = siblings_to_fragment(&mut reader).unwrap();
		assert_eq!(again, f);
	}

	#[test]
	fn parent_end_tag_is_consumed() {
		let mut reader = XmlReader::from_str("<r><a><b/>x</a><c/></r>");
		reader.read().unwrap();
		reader.read().unwrap();
		reader.read().unwrap();
		let f = siblings_to_fragment(&mut reader).unwrap();
		assert_eq!(f.content(), "<b/>x");
		match reader.read().unwrap() {
			Some(Event::StartElement(start)) => assert_eq!(start.name, QName::local("c")),
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn read_fragment_requires_an_element() {
		let mut reader = XmlReader::from_str("<r>text</r>");
		reader.read().unwrap();
		reader.read().unwrap();
		match read_fragment(&mut reader) {
			Err(Error::UnexpectedEvent {
				found: EventType::Text,
				..
			}) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn empty_at_end_of_document() {
		let mut reader = XmlReader::from_str("<r/>");
		reader.read_all(|_| ()).unwrap();
		assert!(read_fragment(&mut reader).unwrap().is_empty());
	}

	#[test]
	fn wrapper_prefix_avoids_fragment_prefixes() {
		let f = CompactFragment::new(vec![Namespace::new("w", "urn:w")], "<w:a/>");
		let evs = events(FragmentReader::new(&f).unwrap());
		match &evs[0] {
			Event::StartElement(start) => {
				assert_eq!(start.name, QName::with_prefix("urn:w", "a", "w"))
			}
			other => panic!("unexpected event: {:?}", other),
		}
		assert_eq!(evs.len(), 2);
	}

	#[test]
	fn write_to_repairs_namespaces() {
		let f = CompactFragment::new(vec![Namespace::new("p", "urn:p")], "<p:a>x</p:a>");
		let mut w = XmlWriter::new(Vec::new());
		f.write_to(&mut w).unwrap();
		assert_eq!(
			std::str::from_utf8(&w.into_inner()).unwrap(),
			"<p:a xmlns:p=\"urn:p\">x</p:a>"
		);
	}

	#[test]
	fn own_declarations_choose_the_captured_prefix() {
		let f = capture("<w xmlns:a='urn:1'><b:e xmlns:b='urn:1' xmlns:a='urn:2'/><a:f/></w>");
		assert_eq!(
			f.content(),
			"<b:e xmlns:b=\"urn:1\" xmlns:a=\"urn:2\"/><a:f/>"
		);
		assert_eq!(f.namespaces(), &[Namespace::new("a", "urn:1")][..]);
		let names: Vec<QName> = events(FragmentReader::new(&f).unwrap())
			.into_iter()
			.filter_map(|ev| match ev {
				Event::StartElement(start) => Some(start.name),
				_ => None,
			})
			.collect();
		assert!(names[0].matches("urn:1", "e"));
		assert!(names[1].matches("urn:1", "f"));
	}
}
