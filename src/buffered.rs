/*!
# Lookahead over an event stream

[`BufferedReader`] wraps any [`EventRead`] and adds a queue in front of it,
so that events can be inspected before they are consumed and consumed
events can be put back. The helpers which need to look at an event before
deciding whether to take it live here.

```
use nsxml::{BufferedReader, Event, EventRead, XmlReader};

let mut reader = BufferedReader::new(XmlReader::from_str("<!-- c --><a>x</a>"));
reader.skip_preamble().unwrap();
match reader.peek().unwrap() {
	Some(Event::StartElement(start)) => assert_eq!(start.name.local_name.as_str(), "a"),
	other => panic!("unexpected event: {:?}", other),
}
let fragment = reader.element_content_to_fragment().unwrap();
assert_eq!(fragment.content(), "x");
```
*/
use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::event::{Event, EventType};
use crate::fragment::{siblings_to_fragment, CompactFragment};
use crate::namespaces::{Namespace, NamespaceContext, NamespaceHolder};
use crate::EventRead;

/**
Event source with a lookahead queue.

The namespace context reflects the events handed out so far: after a
START_ELEMENT its declarations are in scope, after the matching END_ELEMENT
they are not. Peeked events do not affect it.
*/
pub struct BufferedReader<R> {
	inner: R,
	queue: VecDeque<Event>,
	namespaces: NamespaceHolder,
	/// Declarations of the element closed last, for pushing its end tag
	/// back.
	closed: Vec<Namespace>,
}

impl<R: EventRead> BufferedReader<R> {
	pub fn new(inner: R) -> BufferedReader<R> {
		BufferedReader {
			inner,
			queue: VecDeque::new(),
			namespaces: NamespaceHolder::new(),
			closed: Vec::new(),
		}
	}

	/// Number of elements opened by the events handed out so far.
	pub fn depth(&self) -> usize {
		self.namespaces.depth()
	}

	pub fn get_ref(&self) -> &R {
		&self.inner
	}

	/// Release the wrapped reader. Events still queued are returned too.
	pub fn into_inner(self) -> (R, Vec<Event>) {
		(self.inner, self.queue.into_iter().collect())
	}

	/// Look at the next event without consuming it.
	pub fn peek(&mut self) -> Result<Option<&Event>> {
		if self.queue.is_empty() {
			if let Some(ev) = self.inner.read()? {
				self.queue.push_back(ev);
			}
		}
		Ok(self.queue.front())
	}

	/**
	Put an event back in front of the stream.

	Pushing back the event returned last rewinds the namespace context as
	well. For an END_ELEMENT this restores the declarations of the element
	closed last.
	*/
	pub fn push_back(&mut self, ev: Event) {
		match &ev {
			Event::StartElement(_) if self.namespaces.depth() > 0 => {
				self.namespaces.dec_depth();
			}
			Event::EndElement(_) => {
				self.namespaces.inc_depth();
				for ns in std::mem::take(&mut self.closed) {
					self.namespaces.add_prefix_to_context(&ns.prefix, &ns.uri);
				}
			}
			_ => (),
		}
		self.queue.push_front(ev);
	}

	/// Consume the next event.
	pub fn next_event(&mut self) -> Result<Option<Event>> {
		let ev = match self.queue.pop_front() {
			Some(ev) => ev,
			None => match self.inner.read()? {
				Some(ev) => ev,
				None => return Ok(None),
			},
		};
		match &ev {
			Event::StartElement(start) => {
				self.namespaces.inc_depth();
				for ns in start.namespace_decls.iter() {
					self.namespaces.add_prefix_to_context(&ns.prefix, &ns.uri);
				}
			}
			// the reader has already rejected unbalanced end tags; a stream
			// started inside an element may still close it
			Event::EndElement(_) if self.namespaces.depth() > 0 => {
				self.closed = self.namespaces.namespaces_at_current_depth().to_vec();
				self.namespaces.dec_depth();
			}
			_ => (),
		}
		Ok(Some(ev))
	}

	/// Consume comments, processing instructions, whitespace and the
	/// document prologue, up to the first event with content.
	pub fn skip_preamble(&mut self) -> Result<()> {
		loop {
			let skip = match self.peek()? {
				Some(ev) => is_preamble(ev),
				None => return Ok(()),
			};
			if !skip {
				return Ok(());
			}
			self.next_event()?;
		}
	}

	/// Consume the next event which is not whitespace.
	pub fn next_non_ws(&mut self) -> Result<Option<Event>> {
		loop {
			match self.next_event()? {
				Some(ev) if ev.is_whitespace() => continue,
				other => return Ok(other),
			}
		}
	}

	/**
	Capture the content of the next element into a fragment.

	The preamble is skipped; the next event must then be a start tag, which
	is consumed along with its content and the matching end tag. Only the
	content ends up in the fragment. At the end of the stream the fragment is
	empty.
	*/
	pub fn element_content_to_fragment(&mut self) -> Result<CompactFragment> {
		self.skip_preamble()?;
		match self.next_event()? {
			None | Some(Event::EndDocument) => Ok(CompactFragment::default()),
			Some(ev) => {
				ev.require(EventType::StartElement, None, None)?;
				siblings_to_fragment(self)
			}
		}
	}

	/**
	Capture the next element, including its own tags, into a fragment.

	The document prologue, comments and processing instructions before it
	are skipped. If the next event carries text instead, the fragment holds
	just that text.
	*/
	pub fn element_to_fragment(&mut self) -> Result<CompactFragment> {
		loop {
			let kind = match self.peek()? {
				Some(ev) => ev.event_type(),
				None => return Ok(CompactFragment::default()),
			};
			match kind {
				EventType::StartDocument
				| EventType::DocType
				| EventType::Comment
				| EventType::ProcessingInstruction => {
					self.next_event()?;
				}
				EventType::EndDocument => return Ok(CompactFragment::default()),
				EventType::StartElement => break,
				kind if kind.is_text_element() => break,
				other => {
					return Err(Error::UnexpectedEvent {
						expected: "START_ELEMENT",
						found: other,
					})
				}
			}
		}
		let mut subtree = Subtree {
			inner: self,
			depth: 0,
			done: false,
		};
		siblings_to_fragment(&mut subtree)
	}
}

fn is_preamble(ev: &Event) -> bool {
	ev.event_type().is_ignorable() || ev.is_whitespace()
}

impl<R: EventRead> EventRead for BufferedReader<R> {
	fn read(&mut self) -> Result<Option<Event>> {
		self.next_event()
	}
}

impl<R> NamespaceContext for BufferedReader<R> {
	fn namespace_uri(&self, prefix: &str) -> Option<&str> {
		self.namespaces.namespace_uri(prefix)
	}

	fn prefix(&self, uri: &str) -> Option<&str> {
		self.namespaces.prefix(uri)
	}
}

/// The next event, and if it opens an element, everything up to the
/// matching end tag.
struct Subtree<'r, R> {
	inner: &'r mut BufferedReader<R>,
	depth: usize,
	done: bool,
}

impl<'r, R: EventRead> EventRead for Subtree<'r, R> {
	fn read(&mut self) -> Result<Option<Event>> {
		if self.done {
			return Ok(None);
		}
		let ev = match self.inner.next_event()? {
			Some(ev) => ev,
			None => return Ok(None),
		};
		match ev {
			Event::StartElement(_) => self.depth += 1,
			Event::EndElement(_) => self.depth = self.depth.saturating_sub(1),
			Event::EndDocument => {
				self.done = true;
				return Ok(None);
			}
			_ => (),
		}
		self.done = self.depth == 0;
		Ok(Some(ev))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::reader::XmlReader;

	fn buffered(doc: &str) -> BufferedReader<XmlReader<&[u8]>> {
		BufferedReader::new(XmlReader::from_str(doc))
	}

	#[test]
	fn peek_does_not_consume() {
		let mut r = buffered("<a/>");
		let first = r.peek().unwrap().cloned();
		match first {
			Some(Event::StartDocument(_)) => (),
			other => panic!("unexpected event: {:?}", other),
		}
		assert_eq!(r.next_event().unwrap(), first);
		match r.peek().unwrap() {
			Some(Event::StartElement(_)) => (),
			other => panic!("unexpected event: {:?}", other),
		}
		assert_eq!(r.depth(), 0);
	}

	#[test]
	fn push_back_rewinds_namespaces() {
		let mut r = buffered("<a xmlns:p='urn:p'><p:b/></a>");
		r.next_event().unwrap();
		let start = r.next_event().unwrap().unwrap();
		assert_eq!(r.namespace_uri("p"), Some("urn:p"));
		r.push_back(start.clone());
		assert_eq!(r.namespace_uri("p"), None);
		assert_eq!(r.depth(), 0);
		assert_eq!(r.next_event().unwrap(), Some(start));
		assert_eq!(r.depth(), 1);

		// <p:b>, </p:b>, </a>
		r.next_event().unwrap();
		r.next_event().unwrap();
		let end = r.next_event().unwrap().unwrap();
		assert_eq!(r.depth(), 0);
		assert_eq!(r.namespace_uri("p"), None);
		r.push_back(end);
		assert_eq!(r.depth(), 1);
		assert_eq!(r.namespace_uri("p"), Some("urn:p"));
	}

	#[test]
	fn skip_preamble_stops_at_content() {
		let mut r = buffered("<?xml version='1.0'?>\n<!-- c --><?pi x?>\n<a/>");
		r.skip_preamble().unwrap();
		match r.next_event().unwrap() {
			Some(Event::StartElement(start)) => assert_eq!(start.name.local_name.as_str(), "a"),
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn next_non_ws_skips_whitespace_only() {
		let mut r = buffered("<a>\n  <b/>  x</a>");
		r.next_event().unwrap();
		r.next_event().unwrap();
		match r.next_non_ws().unwrap() {
			Some(Event::StartElement(start)) => assert_eq!(start.name.local_name.as_str(), "b"),
			other => panic!("unexpected event: {:?}", other),
		}
		match r.next_non_ws().unwrap() {
			Some(Event::EndElement(_)) => (),
			other => panic!("unexpected event: {:?}", other),
		}
		match r.next_non_ws().unwrap() {
			Some(Event::Text(t)) => assert_eq!(t, "  x"),
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn element_content_to_fragment_takes_the_content() {
		let mut r = buffered("<!-- c --><r xmlns:p='urn:p'><p:a>1</p:a>t</r>");
		let fragment = r.element_content_to_fragment().unwrap();
		assert_eq!(fragment.content(), "<p:a>1</p:a>t");
		assert_eq!(fragment.namespaces(), &[Namespace::new("p", "urn:p")][..]);
		match r.next_event().unwrap() {
			Some(Event::EndDocument) => (),
			other => panic!("unexpected event: {:?}", other),
		}

		let mut r = buffered("<r>x</r>");
		r.next_event().unwrap();
		r.next_event().unwrap();
		r.next_event().unwrap();
		match r.element_content_to_fragment() {
			Err(Error::UnexpectedEvent {
				expected: "START_ELEMENT",
				found: EventType::EndElement,
			}) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn element_to_fragment_stops_after_the_element() {
		let mut r = buffered("<r xmlns='urn:r'><a x='1'><b/></a><c/></r>");
		r.next_event().unwrap();
		r.next_event().unwrap();
		let fragment = r.element_to_fragment().unwrap();
		assert_eq!(fragment.content(), "<a x=\"1\"><b/></a>");
		assert_eq!(fragment.namespaces(), &[Namespace::new("", "urn:r")][..]);
		match r.next_event().unwrap() {
			Some(Event::StartElement(start)) => assert_eq!(start.name.local_name.as_str(), "c"),
			other => panic!("unexpected event: {:?}", other),
		}
		assert_eq!(r.depth(), 2);
	}

	#[test]
	fn element_to_fragment_accepts_text() {
		let mut r = buffered("<r>a &amp; b<c/></r>");
		r.next_event().unwrap();
		r.next_event().unwrap();
		let fragment = r.element_to_fragment().unwrap();
		assert_eq!(fragment.content(), "a &amp; b");
		assert!(fragment.namespaces().is_empty());
		match r.next_event().unwrap() {
			Some(Event::StartElement(_)) => (),
			other => panic!("unexpected event: {:?}", other),
		}
	}
}
