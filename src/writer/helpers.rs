/*!
Helpers on top of [`EventWrite`] for writing whole elements and for
embedding one document in another.
*/
use crate::error::{Error, Result};
use crate::event::{Event, EventType, StartElement};
use crate::namespaces::{Namespace, NamespaceContext};
use crate::EventRead;

use super::EventWrite;

/// Write an element with text-only content. An empty or absent value
/// produces an empty element.
pub fn write_simple_element<W: EventWrite + ?Sized>(
	writer: &mut W,
	namespace: &str,
	local_name: &str,
	prefix: Option<&str>,
	value: Option<&str>,
) -> Result<()> {
	writer.start_tag(namespace, local_name, prefix)?;
	if let Some(value) = value {
		writer.text(value)?;
	}
	writer.end_tag(namespace, local_name)
}

/**
Record the binding `start` needs for its own name if `writer` does not
provide it at the current position.

Prefixes already in `missing` are left alone; so are elements which
declare their own prefix and elements in the null namespace. Call this
before the start tag is written, so that `writer` still reflects the
parent's scope.
*/
pub fn add_undeclared_namespaces<W: NamespaceContext + ?Sized>(
	writer: &W,
	start: &StartElement,
	missing: &mut Vec<Namespace>,
) {
	let (prefix, uri) = (start.name.prefix.as_str(), start.name.namespace.as_str());
	if uri.is_empty() || missing.iter().any(|ns| ns.prefix.as_str() == prefix) {
		return;
	}
	let declared = start
		.namespace_decls
		.iter()
		.any(|ns| ns.prefix.as_str() == prefix && ns.uri.as_str() == uri);
	if declared || writer.namespace_uri(prefix) == Some(uri) {
		return;
	}
	log::trace!("element {:?} needs undeclared prefix {:?}", start.name.local_name, prefix);
	missing.push(Namespace::new(prefix, uri));
}

/**
Write `first` and, if it is a start tag, the rest of its element from
`reader`.

`first` is usually the event just read from `reader`. With `missing`, the
bindings which nested elements use but `writer` lacks are collected through
[`add_undeclared_namespaces`].
*/
pub fn write_element<R, W>(
	writer: &mut W,
	mut missing: Option<&mut Vec<Namespace>>,
	first: &Event,
	reader: &mut R,
) -> Result<()>
where
	R: EventRead + ?Sized,
	W: EventWrite + ?Sized,
{
	match first {
		Event::EndElement(_) => Err(Error::UnexpectedEvent {
			expected: "an event other than END_ELEMENT",
			found: EventType::EndElement,
		}),
		Event::StartElement(start) => {
			if let Some(missing) = missing.as_deref_mut() {
				add_undeclared_namespaces(&*writer, start, missing);
			}
			writer.write_event(first)?;
			write_element_content(writer, missing, reader)?;
			writer.end_tag(&start.name.namespace, &start.name.local_name)
		}
		other => writer.write_event(other),
	}
}

/**
Copy the content of the element whose start tag was just read.

The end tag closing that element is consumed from `reader` but not
written; the container itself is the caller's business.
*/
pub fn write_element_content<R, W>(
	writer: &mut W,
	mut missing: Option<&mut Vec<Namespace>>,
	reader: &mut R,
) -> Result<()>
where
	R: EventRead + ?Sized,
	W: EventWrite + ?Sized,
{
	let mut depth = 0usize;
	loop {
		let ev = match reader.read()? {
			Some(ev) => ev,
			None => {
				return Err(Error::UnexpectedEvent {
					expected: "END_ELEMENT",
					found: EventType::EndDocument,
				})
			}
		};
		match &ev {
			Event::StartElement(start) => {
				if let Some(missing) = missing.as_deref_mut() {
					add_undeclared_namespaces(&*writer, start, missing);
				}
				depth += 1;
			}
			Event::EndElement(_) => {
				if depth == 0 {
					return Ok(());
				}
				depth -= 1;
			}
			Event::EndDocument => {
				return Err(Error::UnexpectedEvent {
					expected: "END_ELEMENT",
					found: EventType::EndDocument,
				})
			}
			_ => (),
		}
		writer.write_event(&ev)?;
	}
}

/// Wrap `writer` so that document-level events are dropped.
pub fn filter_substream<W: EventWrite + ?Sized>(writer: &mut W) -> SubstreamFilter<'_, W> {
	SubstreamFilter { inner: writer }
}

/**
Writer adapter for embedding a document into another one.

The XML declaration, the end of the document, document type declarations
and processing instructions are dropped; everything else is passed on.
*/
pub struct SubstreamFilter<'w, W: ?Sized> {
	inner: &'w mut W,
}

impl<'w, W: EventWrite + ?Sized> NamespaceContext for SubstreamFilter<'w, W> {
	fn namespace_uri(&self, prefix: &str) -> Option<&str> {
		self.inner.namespace_uri(prefix)
	}

	fn prefix(&self, uri: &str) -> Option<&str> {
		self.inner.prefix(uri)
	}
}

impl<'w, W: EventWrite + ?Sized> EventWrite for SubstreamFilter<'w, W> {
	fn start_document(
		&mut self,
		_version: Option<&str>,
		_encoding: Option<&str>,
		_standalone: Option<bool>,
	) -> Result<()> {
		Ok(())
	}

	fn end_document(&mut self) -> Result<()> {
		Ok(())
	}

	fn start_tag_with_namespaces(
		&mut self,
		namespace: &str,
		local_name: &str,
		prefix: Option<&str>,
		declarations: &[Namespace],
	) -> Result<()> {
		self.inner
			.start_tag_with_namespaces(namespace, local_name, prefix, declarations)
	}

	fn end_tag(&mut self, namespace: &str, local_name: &str) -> Result<()> {
		self.inner.end_tag(namespace, local_name)
	}

	fn attribute(
		&mut self,
		namespace: &str,
		local_name: &str,
		prefix: Option<&str>,
		value: &str,
	) -> Result<()> {
		self.inner.attribute(namespace, local_name, prefix, value)
	}

	fn namespace_attr(&mut self, prefix: &str, uri: &str) -> Result<()> {
		self.inner.namespace_attr(prefix, uri)
	}

	fn text(&mut self, text: &str) -> Result<()> {
		self.inner.text(text)
	}

	fn cdsect(&mut self, text: &str) -> Result<()> {
		self.inner.cdsect(text)
	}

	fn comment(&mut self, text: &str) -> Result<()> {
		self.inner.comment(text)
	}

	fn processing_instruction(&mut self, _target: &str, _data: &str) -> Result<()> {
		Ok(())
	}

	fn entity_ref(&mut self, name: &str) -> Result<()> {
		self.inner.entity_ref(name)
	}

	fn ignorable_whitespace(&mut self, text: &str) -> Result<()> {
		self.inner.ignorable_whitespace(text)
	}

	fn docdecl(&mut self, _text: &str) -> Result<()> {
		Ok(())
	}

	fn depth(&self) -> usize {
		self.inner.depth()
	}

	fn close(&mut self) -> Result<()> {
		self.inner.close()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::reader::XmlReader;
	use crate::writer::{serialize, XmlWriter};

	fn output(w: XmlWriter<Vec<u8>>) -> String {
		String::from_utf8(w.into_inner()).unwrap()
	}

	#[test]
	fn simple_element_with_and_without_value() {
		let mut w = XmlWriter::new(Vec::new());
		w.start_tag("urn:x", "r", Some("x")).unwrap();
		write_simple_element(&mut w, "urn:x", "a", Some("y"), Some("1 < 2")).unwrap();
		write_simple_element(&mut w, "", "b", None, None).unwrap();
		write_simple_element(&mut w, "", "c", None, Some("")).unwrap();
		w.end_tag("urn:x", "r").unwrap();
		assert_eq!(
			output(w),
			"<x:r xmlns:x=\"urn:x\"><x:a>1 &lt; 2</x:a><b/><c/></x:r>"
		);
	}

	#[test]
	fn write_element_copies_one_element() {
		let mut r = XmlReader::from_str("<r><a k='v'><b>t</b><!--c--></a><z/></r>");
		r.next_tag().unwrap();
		let first = r.next_tag().unwrap();
		let mut w = XmlWriter::new(Vec::new());
		write_element(&mut w, None, &first, &mut r).unwrap();
		assert_eq!(output(w), "<a k=\"v\"><b>t</b><!--c--></a>");
		match r.next_tag().unwrap() {
			Event::StartElement(start) => assert_eq!(start.name.local_name.as_str(), "z"),
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn write_element_refuses_end_tags() {
		let mut r = XmlReader::from_str("<r/>");
		let mut w = XmlWriter::new(Vec::new());
		let end = Event::EndElement(crate::QName::local("r"));
		match write_element(&mut w, None, &end, &mut r) {
			Err(Error::UnexpectedEvent {
				found: EventType::EndElement,
				..
			}) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn content_records_missing_bindings() {
		let mut r = XmlReader::from_str(
			"<r xmlns:p='urn:p' xmlns:q='urn:q'><p:a><q:b/><s:c xmlns:s='urn:s'/></p:a></r>",
		);
		r.next_tag().unwrap();
		let mut w = XmlWriter::new(Vec::new());
		w.start_tag("", "out", None).unwrap();
		let mut missing = Vec::new();
		write_element_content(&mut w, Some(&mut missing), &mut r).unwrap();
		w.end_tag("", "out").unwrap();
		assert_eq!(
			missing,
			vec![Namespace::new("p", "urn:p"), Namespace::new("q", "urn:q")]
		);
		// the writer repairs the bindings it is missing
		assert_eq!(
			output(w),
			"<out><p:a xmlns:p=\"urn:p\"><q:b xmlns:q=\"urn:q\"/><s:c xmlns:s=\"urn:s\"/></p:a></out>"
		);
	}

	#[test]
	fn bound_prefixes_are_not_missing() {
		let mut w = XmlWriter::new(Vec::new());
		w.start_tag("urn:p", "r", Some("p")).unwrap();
		let mut start = StartElement::new(crate::QName::with_prefix("urn:p", "a", "p"));
		let mut missing = Vec::new();
		add_undeclared_namespaces(&w, &start, &mut missing);
		assert!(missing.is_empty());

		start.name = crate::QName::with_prefix("urn:other", "a", "p");
		add_undeclared_namespaces(&w, &start, &mut missing);
		assert_eq!(missing, vec![Namespace::new("p", "urn:other")]);
		// first binding per prefix wins
		start.name = crate::QName::with_prefix("urn:third", "a", "p");
		add_undeclared_namespaces(&w, &start, &mut missing);
		assert_eq!(missing.len(), 1);
	}

	#[test]
	fn substream_drops_document_events() {
		let mut r = XmlReader::from_str(
			"<?xml version='1.0'?><!DOCTYPE inner><?pi data?><inner>x</inner>",
		);
		let mut w = XmlWriter::new(Vec::new());
		w.start_tag("", "outer", None).unwrap();
		{
			let mut filtered = filter_substream(&mut w);
			assert_eq!(filtered.depth(), 1);
			filtered.start_document(Some("1.0"), None, None).unwrap();
			serialize(&mut r, &mut filtered).unwrap();
			filtered.end_document().unwrap();
		}
		w.end_tag("", "outer").unwrap();
		assert_eq!(output(w), "<outer><inner>x</inner></outer>");
	}
}
