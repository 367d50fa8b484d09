/*!
# Reading events from DOM trees

[`DomReader`] walks a subtree in document order and produces the same
[`Event`]s an [`XmlReader`](crate::XmlReader) would produce for its
serialization, so DOM trees can be fed into everything which consumes
events.
*/
use nsxml_validation::is_whitespace_only;

use crate::error::{Error, Result};
use crate::event::{Attribute, Event, StartElement, XmlDeclaration};
use crate::namespaces::{Namespace, NamespaceContext, NamespaceHolder};
use crate::strings::Name;
use crate::EventRead;

use super::{declared_prefix, Dom, NodeId, NodeKind, NodeType};

#[derive(Debug, Clone, Copy)]
struct Frame {
	/// `None` for the virtual frame holding only the root.
	parent: Option<NodeId>,
	index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkState {
	Start,
	Walking,
	Finished,
}

/// Bind `prefix` on the current element unless it already is.
fn declare(namespaces: &mut NamespaceHolder, decls: &mut Vec<Namespace>, prefix: &str, uri: &str) {
	if namespaces.namespace_at_current_depth(prefix).is_none() {
		namespaces.add_prefix_to_context(prefix, uri);
		decls.push(Namespace::new(prefix, uri));
	}
}

fn doctype_text(name: &str, public_id: &str, system_id: &str, internal_subset: &str) -> String {
	fn quote(s: &str) -> String {
		if s.contains('"') {
			format!("'{}'", s)
		} else {
			format!("\"{}\"", s)
		}
	}
	let mut text = name.to_string();
	if !public_id.is_empty() {
		text.push_str(" PUBLIC ");
		text.push_str(&quote(public_id));
		text.push(' ');
		text.push_str(&quote(system_id));
	} else if !system_id.is_empty() {
		text.push_str(" SYSTEM ");
		text.push_str(&quote(system_id));
	}
	if !internal_subset.is_empty() {
		text.push_str(" [");
		text.push_str(internal_subset);
		text.push(']');
	}
	text
}

/**
Event source over a DOM subtree.

The stream always starts with [`Event::StartDocument`], carrying the stored
declaration when the root is a document, and ends with
[`Event::EndDocument`]. Namespace declarations are taken from the `xmlns`
attributes; bindings which an element or attribute name needs but which no
attribute declares are added to the [`StartElement`] as well.

```
use nsxml::{Dom, DomReader, Event, EventRead};

let mut dom = Dom::new();
let doc = dom.create_document();
let root = dom.create_element_ns(doc, "urn:x", "x:root").unwrap();
dom.append_child(doc, root.into()).unwrap();

let mut reader = DomReader::new(&dom, doc.into());
let mut starts = Vec::new();
reader.read_all(|ev| if let Event::StartElement(start) = ev {
	starts.push(start);
}).unwrap();
assert_eq!(starts[0].namespace_decls[0].prefix.as_str(), "x");
```
*/
pub struct DomReader<'d> {
	dom: &'d Dom,
	root: NodeId,
	state: WalkState,
	stack: Vec<Frame>,
	namespaces: NamespaceHolder,
	leave_pending: bool,
	depth: usize,
	current: Option<NodeId>,
	closed: bool,
}

impl<'d> DomReader<'d> {
	/// Read `root` and everything below it.
	///
	/// The namespaces in scope at the parent of `root` are known to the
	/// reader, so they are not declared again.
	pub fn new(dom: &'d Dom, root: NodeId) -> DomReader<'d> {
		let mut namespaces = NamespaceHolder::new();
		if let Some(parent) = dom.parent_element(root) {
			for ns in dom.in_scope_namespaces(parent.node()) {
				namespaces.add_prefix_to_context(&ns.prefix, &ns.uri);
			}
		}
		let first = match dom.node_type(root) {
			NodeType::Document | NodeType::DocumentFragment => Frame {
				parent: Some(root),
				index: 0,
			},
			_ => Frame {
				parent: None,
				index: 0,
			},
		};
		DomReader {
			dom,
			root,
			state: WalkState::Start,
			stack: vec![first],
			namespaces,
			leave_pending: false,
			depth: 0,
			current: None,
			closed: false,
		}
	}

	/// Number of open elements.
	pub fn depth(&self) -> usize {
		self.depth
	}

	/// The node the last event was produced for.
	pub fn current_node(&self) -> Option<NodeId> {
		self.current
	}

	/// Path of the current node, such as `/a[1]/b[2]/text()[1]`.
	pub fn location(&self) -> String {
		let mut node = match self.current {
			Some(node) => node,
			None => return "/".into(),
		};
		let mut steps = Vec::new();
		loop {
			if self.dom.node_type(node) == NodeType::Document {
				break;
			}
			steps.push(self.step(node));
			match self.dom.parent(node) {
				Some(parent) => node = parent,
				None => break,
			}
		}
		if steps.is_empty() {
			return "/".into();
		}
		steps.reverse();
		let mut path = String::new();
		for step in steps {
			path.push('/');
			path.push_str(&step);
		}
		path
	}

	fn step(&self, node: NodeId) -> String {
		let dom = self.dom;
		let ty = dom.node_type(node);
		let same = |other: NodeId| -> bool {
			let other_ty = dom.node_type(other);
			match ty {
				NodeType::Element => {
					other_ty == NodeType::Element && dom.node_name(other) == dom.node_name(node)
				}
				NodeType::Text | NodeType::CDataSection => {
					matches!(other_ty, NodeType::Text | NodeType::CDataSection)
				}
				_ => other_ty == ty,
			}
		};
		let index = match dom.parent(node) {
			Some(parent) => {
				dom.children(parent)
					.iter()
					.take_while(|c| **c != node)
					.filter(|c| same(**c))
					.count() + 1
			}
			None => 1,
		};
		match ty {
			NodeType::Element => format!("{}[{}]", dom.node_name(node), index),
			NodeType::Text | NodeType::CDataSection => format!("text()[{}]", index),
			NodeType::Comment => format!("comment()[{}]", index),
			NodeType::ProcessingInstruction => format!("processing-instruction()[{}]", index),
			NodeType::Attribute => format!("@{}", dom.node_name(node)),
			_ => ".".into(),
		}
	}

	/// Stop reading. Further reads fail with [`Error::Closed`].
	pub fn close(&mut self) {
		self.closed = true;
		self.stack.clear();
		self.namespaces.clear();
	}

	fn start_element(&mut self, node: NodeId) -> Event {
		let dom = self.dom;
		let (name, attribute_ids) = match dom.kind(node) {
			NodeKind::Element {
				name, attributes, ..
			} => (name, attributes),
			_ => unreachable!("start_element on a non-element"),
		};
		self.namespaces.inc_depth();
		let mut start = StartElement::new(name.clone());
		for attr in attribute_ids.iter() {
			if let NodeKind::Attr { name, value, .. } = dom.kind(*attr) {
				match declared_prefix(name) {
					Some(prefix) => declare(&mut self.namespaces, &mut start.namespace_decls, prefix, value),
					None => start.attributes.push(Attribute::new(name.clone(), value.as_str())),
				}
			}
		}
		if self.namespaces.namespace_uri(&name.prefix) != Some(name.namespace.as_str()) {
			log::trace!("implicit declaration of {:?} for {:?}", name.prefix, name.namespace);
			declare(&mut self.namespaces, &mut start.namespace_decls, &name.prefix, &name.namespace);
		}
		for attr in start.attributes.iter() {
			let attr_name = &attr.name;
			if attr_name.prefix.is_empty() {
				continue;
			}
			if self.namespaces.namespace_uri(&attr_name.prefix) != Some(attr_name.namespace.as_str()) {
				declare(&mut self.namespaces, &mut start.namespace_decls, &attr_name.prefix, &attr_name.namespace);
			}
		}
		Event::StartElement(start)
	}

	fn node_event(&mut self, node: NodeId) -> Event {
		let dom = self.dom;
		match dom.kind(node) {
			NodeKind::Element { .. } => {
				let ev = self.start_element(node);
				self.stack.push(Frame {
					parent: Some(node),
					index: 0,
				});
				self.depth += 1;
				ev
			}
			NodeKind::Text(text) => {
				if self.depth == 0 && is_whitespace_only(text) {
					Event::IgnorableWhitespace(text.clone())
				} else {
					Event::Text(text.clone())
				}
			}
			NodeKind::CData(text) => Event::CData(text.clone()),
			NodeKind::Comment(text) => Event::Comment(text.clone()),
			NodeKind::ProcessingInstruction { target, data } => Event::ProcessingInstruction {
				target: Name::from_validated(target.clone()),
				data: data.clone(),
			},
			NodeKind::DocumentType {
				name,
				public_id,
				system_id,
				internal_subset,
			} => Event::DocType(doctype_text(name, public_id, system_id, internal_subset)),
			NodeKind::Attr { name, value, .. } => Event::Attribute(Attribute::new(name.clone(), value.as_str())),
			NodeKind::Document { .. } | NodeKind::Fragment { .. } => {
				unreachable!("documents and fragments are never children")
			}
		}
	}

	fn declaration(&self) -> XmlDeclaration {
		match self.dom.as_document(self.root) {
			Some(doc) => self.dom.xml_declaration(doc).clone(),
			None => XmlDeclaration::default(),
		}
	}

	fn walk(&mut self) -> Option<Event> {
		while let Some(frame) = self.stack.last().copied() {
			let child = match frame.parent {
				Some(parent) => self.dom.children(parent).get(frame.index).copied(),
				None if frame.index == 0 => Some(self.root),
				None => None,
			};
			match child {
				Some(child) => {
					if let Some(top) = self.stack.last_mut() {
						top.index += 1;
					}
					self.current = Some(child);
					return Some(self.node_event(child));
				}
				None => {
					self.stack.pop();
					let parent = match frame.parent {
						Some(parent) => parent,
						None => continue,
					};
					if let NodeKind::Element { name, .. } = self.dom.kind(parent) {
						self.depth -= 1;
						self.leave_pending = true;
						self.current = Some(parent);
						return Some(Event::EndElement(name.clone()));
					}
				}
			}
		}
		None
	}
}

impl EventRead for DomReader<'_> {
	fn read(&mut self) -> Result<Option<Event>> {
		if self.closed {
			return Err(Error::Closed);
		}
		if self.leave_pending {
			self.leave_pending = false;
			self.namespaces.dec_depth();
		}
		match self.state {
			WalkState::Start => {
				self.state = WalkState::Walking;
				Ok(Some(Event::StartDocument(self.declaration())))
			}
			WalkState::Walking => match self.walk() {
				Some(ev) => Ok(Some(ev)),
				None => {
					self.state = WalkState::Finished;
					self.current = None;
					Ok(Some(Event::EndDocument))
				}
			},
			WalkState::Finished => Ok(None),
		}
	}
}

impl NamespaceContext for DomReader<'_> {
	fn namespace_uri(&self, prefix: &str) -> Option<&str> {
		self.namespaces.namespace_uri(prefix)
	}

	fn prefix(&self, uri: &str) -> Option<&str> {
		self.namespaces.prefix(uri)
	}
}
