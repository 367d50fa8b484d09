/*!
# Minimal DOM

All nodes live in a [`Dom`] arena and are addressed by copyable handles. The
arena may hold any number of documents; every node is owned by exactly one of
them, and tree operations refuse nodes owned by a different document. Nodes
move between documents with [`Dom::adopt_node`] (in place) or
[`Dom::import_node`] (as a copy).

Container handles ([`DocumentId`], [`ElementId`], [`FragmentId`]) convert
into [`ParentId`], which is what the child operations take. Character data
nodes cannot be turned into a [`ParentId`] at all.

```
use nsxml::dom::Dom;

let mut dom = Dom::new();
let doc = dom.create_document();
let root = dom.create_element_ns(doc, "urn:example", "ex:root").unwrap();
dom.append_child(doc, root.into()).unwrap();
let text = dom.create_text_node(doc, "hello");
dom.append_child(root, text).unwrap();
assert_eq!(dom.text_content(root.into()).as_deref(), Some("hello"));
assert_eq!(dom.lookup_namespace_uri(text, "ex"), Some("urn:example"));
```

Handles are only meaningful for the arena which created them. Passing a
handle from another arena is a logic error; it may panic or address an
unrelated node.
*/
mod reader;
mod writer;

use smartstring::alias::String as SmartString;

use nsxml_validation::{is_whitespace_only, validate_name, validate_ncname};

use crate::error::{DomError, Result};
use crate::event::XmlDeclaration;
use crate::namespaces::{fixed_prefix, fixed_uri, Namespace, NamespaceContext, XMLNS_XML, XMLNS_XMLNS};
use crate::strings::QName;
use crate::writer::{serialize, EventWrite};

pub use reader::DomReader;
pub use writer::DomWriter;

/// Handle of any node in a [`Dom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

macro_rules! typed_handle {
	($(#[$outer:meta])* $name:ident) => {
		$(#[$outer])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
		pub struct $name(NodeId);

		impl $name {
			/// The untyped handle.
			pub fn node(self) -> NodeId {
				self.0
			}
		}

		impl From<$name> for NodeId {
			fn from(other: $name) -> Self {
				other.0
			}
		}
	};
}

typed_handle! {
	/// Handle of a document node.
	DocumentId
}

typed_handle! {
	/// Handle of an element node.
	ElementId
}

typed_handle! {
	/// Handle of a document fragment node.
	FragmentId
}

typed_handle! {
	/// Handle of an attribute node.
	AttrId
}

/// A node which can have children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentId {
	Document(DocumentId),
	Element(ElementId),
	Fragment(FragmentId),
}

impl ParentId {
	pub fn node(self) -> NodeId {
		match self {
			Self::Document(id) => id.0,
			Self::Element(id) => id.0,
			Self::Fragment(id) => id.0,
		}
	}
}

impl From<DocumentId> for ParentId {
	fn from(other: DocumentId) -> Self {
		Self::Document(other)
	}
}

impl From<ElementId> for ParentId {
	fn from(other: ElementId) -> Self {
		Self::Element(other)
	}
}

impl From<FragmentId> for ParentId {
	fn from(other: FragmentId) -> Self {
		Self::Fragment(other)
	}
}

impl From<ParentId> for NodeId {
	fn from(other: ParentId) -> Self {
		other.node()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
	Document,
	DocumentFragment,
	Element,
	Attribute,
	Text,
	CDataSection,
	Comment,
	ProcessingInstruction,
	DocumentType,
}

impl NodeType {
	/// True for the node types which carry character data and never have
	/// children.
	pub fn is_character_data(self) -> bool {
		matches!(
			self,
			Self::Text | Self::CDataSection | Self::Comment | Self::ProcessingInstruction
		)
	}
}

#[derive(Debug, Clone)]
enum NodeKind {
	Document {
		children: Vec<NodeId>,
		character_set: SmartString,
		declaration: XmlDeclaration,
	},
	Fragment {
		children: Vec<NodeId>,
	},
	Element {
		name: QName,
		attributes: Vec<NodeId>,
		children: Vec<NodeId>,
	},
	Attr {
		name: QName,
		value: String,
		owner_element: Option<NodeId>,
	},
	Text(String),
	CData(String),
	Comment(String),
	ProcessingInstruction {
		target: SmartString,
		data: String,
	},
	DocumentType {
		name: SmartString,
		public_id: String,
		system_id: String,
		internal_subset: String,
	},
}

impl NodeKind {
	fn node_type(&self) -> NodeType {
		match self {
			Self::Document { .. } => NodeType::Document,
			Self::Fragment { .. } => NodeType::DocumentFragment,
			Self::Element { .. } => NodeType::Element,
			Self::Attr { .. } => NodeType::Attribute,
			Self::Text(..) => NodeType::Text,
			Self::CData(..) => NodeType::CDataSection,
			Self::Comment(..) => NodeType::Comment,
			Self::ProcessingInstruction { .. } => NodeType::ProcessingInstruction,
			Self::DocumentType { .. } => NodeType::DocumentType,
		}
	}

	fn children(&self) -> &[NodeId] {
		match self {
			Self::Document { children, .. }
			| Self::Fragment { children }
			| Self::Element { children, .. } => children,
			_ => &[],
		}
	}

	fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
		match self {
			Self::Document { children, .. }
			| Self::Fragment { children }
			| Self::Element { children, .. } => Some(children),
			_ => None,
		}
	}

	/// Copy without links to other nodes.
	fn unlinked(&self) -> NodeKind {
		match self {
			Self::Document { .. } => unreachable!("documents are never copied"),
			Self::Fragment { .. } => Self::Fragment {
				children: Vec::new(),
			},
			Self::Element { name, .. } => Self::Element {
				name: name.clone(),
				attributes: Vec::new(),
				children: Vec::new(),
			},
			Self::Attr { name, value, .. } => Self::Attr {
				name: name.clone(),
				value: value.clone(),
				owner_element: None,
			},
			other => other.clone(),
		}
	}
}

#[derive(Debug, Clone)]
struct NodeData {
	owner: NodeId,
	parent: Option<NodeId>,
	kind: NodeKind,
}

/// Detached copy of a subtree in document order, used for importing.
///
/// The first entry is the copied node; every other entry refers to an
/// earlier one as its parent.
struct Template {
	nodes: Vec<TemplateNode>,
}

struct TemplateNode {
	kind: NodeKind,
	/// Index of the parent entry, and whether this is one of its attributes.
	parent: Option<(usize, bool)>,
}

/// Prefix declared by an attribute, if it is a namespace declaration.
fn declared_prefix(name: &QName) -> Option<&str> {
	if name.namespace.as_str() != XMLNS_XMLNS {
		return None;
	}
	match (name.prefix.as_str(), name.local_name.as_str()) {
		("xmlns", local) => Some(local),
		("", "xmlns") => Some(""),
		_ => None,
	}
}

fn split_qualified(qualified: &str) -> Result<(&str, &str)> {
	if validate_name(qualified).is_err() {
		return Err(DomError::InvalidCharacter("invalid qualified name").into());
	}
	match qualified.split_once(':') {
		None => Ok(("", qualified)),
		Some((prefix, local)) => {
			if prefix.is_empty() || validate_ncname(local).is_err() {
				return Err(DomError::Namespace("malformed qualified name").into());
			}
			Ok((prefix, local))
		}
	}
}

fn check_namespace(namespace: &str, prefix: &str, qualified: &str) -> Result<()> {
	if !prefix.is_empty() && namespace.is_empty() {
		return Err(DomError::Namespace("prefix without a namespace").into());
	}
	if prefix == "xml" && namespace != XMLNS_XML {
		return Err(DomError::Namespace("the xml prefix is reserved").into());
	}
	if (qualified == "xmlns" || prefix == "xmlns") != (namespace == XMLNS_XMLNS) {
		return Err(DomError::Namespace("xmlns is reserved for namespace declarations").into());
	}
	Ok(())
}

/**
Arena holding documents and their nodes.

Nodes are never freed; detached nodes stay valid and can be inserted again.
*/
#[derive(Debug, Clone, Default)]
pub struct Dom {
	nodes: Vec<NodeData>,
}

impl Dom {
	pub fn new() -> Dom {
		Dom { nodes: Vec::new() }
	}

	fn node_data(&self, id: NodeId) -> &NodeData {
		&self.nodes[id.0]
	}

	fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
		&mut self.nodes[id.0]
	}

	fn kind(&self, id: NodeId) -> &NodeKind {
		&self.node_data(id).kind
	}

	fn alloc(&mut self, owner: NodeId, kind: NodeKind) -> NodeId {
		let id = NodeId(self.nodes.len());
		self.nodes.push(NodeData {
			owner,
			parent: None,
			kind,
		});
		id
	}

	/// Create an empty document with character set UTF-8.
	pub fn create_document(&mut self) -> DocumentId {
		let id = NodeId(self.nodes.len());
		self.alloc(
			id,
			NodeKind::Document {
				children: Vec::new(),
				character_set: "UTF-8".into(),
				declaration: XmlDeclaration::default(),
			},
		);
		DocumentId(id)
	}

	/* node properties */

	pub fn node_type(&self, node: NodeId) -> NodeType {
		self.kind(node).node_type()
	}

	/// DOM node name: the qualified name of elements and attributes, the
	/// target of processing instructions, `#text` and friends otherwise.
	pub fn node_name(&self, node: NodeId) -> String {
		match self.kind(node) {
			NodeKind::Document { .. } => "#document".into(),
			NodeKind::Fragment { .. } => "#document-fragment".into(),
			NodeKind::Element { name, .. } | NodeKind::Attr { name, .. } => name.qualified_name(),
			NodeKind::Text(..) => "#text".into(),
			NodeKind::CData(..) => "#cdata-section".into(),
			NodeKind::Comment(..) => "#comment".into(),
			NodeKind::ProcessingInstruction { target, .. } => target.to_string(),
			NodeKind::DocumentType { name, .. } => name.to_string(),
		}
	}

	/// The document owning `node`; a document owns itself.
	pub fn owner_document(&self, node: NodeId) -> DocumentId {
		DocumentId(self.node_data(node).owner)
	}

	/// Parent node; always `None` for documents and attributes.
	pub fn parent(&self, node: NodeId) -> Option<NodeId> {
		self.node_data(node).parent
	}

	pub fn parent_element(&self, node: NodeId) -> Option<ElementId> {
		self.parent(node).and_then(|p| self.as_element(p))
	}

	pub fn children(&self, node: NodeId) -> &[NodeId] {
		self.kind(node).children()
	}

	pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
		self.children(node).first().copied()
	}

	pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
		self.children(node).last().copied()
	}

	fn sibling_index(&self, node: NodeId) -> Option<(NodeId, usize)> {
		let parent = self.parent(node)?;
		let index = self.children(parent).iter().position(|c| *c == node)?;
		Some((parent, index))
	}

	pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
		let (parent, index) = self.sibling_index(node)?;
		self.children(parent).get(index + 1).copied()
	}

	pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
		let (parent, index) = self.sibling_index(node)?;
		index.checked_sub(1).map(|i| self.children(parent)[i])
	}

	pub fn as_document(&self, node: NodeId) -> Option<DocumentId> {
		match self.kind(node) {
			NodeKind::Document { .. } => Some(DocumentId(node)),
			_ => None,
		}
	}

	pub fn as_element(&self, node: NodeId) -> Option<ElementId> {
		match self.kind(node) {
			NodeKind::Element { .. } => Some(ElementId(node)),
			_ => None,
		}
	}

	pub fn as_fragment(&self, node: NodeId) -> Option<FragmentId> {
		match self.kind(node) {
			NodeKind::Fragment { .. } => Some(FragmentId(node)),
			_ => None,
		}
	}

	pub fn as_attr(&self, node: NodeId) -> Option<AttrId> {
		match self.kind(node) {
			NodeKind::Attr { .. } => Some(AttrId(node)),
			_ => None,
		}
	}

	/// The node as a container, if it can have children.
	pub fn as_parent(&self, node: NodeId) -> Option<ParentId> {
		match self.kind(node) {
			NodeKind::Document { .. } => Some(ParentId::Document(DocumentId(node))),
			NodeKind::Element { .. } => Some(ParentId::Element(ElementId(node))),
			NodeKind::Fragment { .. } => Some(ParentId::Fragment(FragmentId(node))),
			_ => None,
		}
	}

	/* document properties */

	pub fn document_element(&self, doc: DocumentId) -> Option<ElementId> {
		self.children(doc.0).iter().find_map(|c| self.as_element(*c))
	}

	pub fn doctype(&self, doc: DocumentId) -> Option<NodeId> {
		self.children(doc.0)
			.iter()
			.copied()
			.find(|c| self.node_type(*c) == NodeType::DocumentType)
	}

	pub fn character_set(&self, doc: DocumentId) -> &str {
		match self.kind(doc.0) {
			NodeKind::Document { character_set, .. } => character_set,
			_ => unreachable!("document handle to a non-document"),
		}
	}

	pub fn set_character_set(&mut self, doc: DocumentId, value: &str) {
		if let NodeKind::Document { character_set, .. } = &mut self.data_mut(doc.0).kind {
			*character_set = value.into();
		}
	}

	/// The XML declaration recorded for the document, all `None` if there
	/// was none.
	pub fn xml_declaration(&self, doc: DocumentId) -> &XmlDeclaration {
		match self.kind(doc.0) {
			NodeKind::Document { declaration, .. } => declaration,
			_ => unreachable!("document handle to a non-document"),
		}
	}

	pub fn set_xml_declaration(&mut self, doc: DocumentId, value: XmlDeclaration) {
		if let NodeKind::Document { declaration, .. } = &mut self.data_mut(doc.0).kind {
			*declaration = value;
		}
	}

	/* factories */

	/// Create an element in the null namespace.
	pub fn create_element(&mut self, doc: DocumentId, local_name: &str) -> Result<ElementId> {
		if local_name.is_empty() {
			return Err(DomError::InvalidCharacter("element name cannot be empty").into());
		}
		if local_name.contains(':') {
			return Err(DomError::Namespace("prefix in name without namespace").into());
		}
		if validate_ncname(local_name).is_err() {
			return Err(DomError::InvalidCharacter("invalid element name").into());
		}
		let kind = NodeKind::Element {
			name: QName::local(local_name),
			attributes: Vec::new(),
			children: Vec::new(),
		};
		Ok(ElementId(self.alloc(doc.0, kind)))
	}

	/// Create an element from a namespace and a qualified name
	/// (`prefix:local` or `local`).
	pub fn create_element_ns(
		&mut self,
		doc: DocumentId,
		namespace: &str,
		qualified_name: &str,
	) -> Result<ElementId> {
		let (prefix, local) = split_qualified(qualified_name)?;
		check_namespace(namespace, prefix, qualified_name)?;
		let kind = NodeKind::Element {
			name: QName::with_prefix(namespace, local, prefix),
			attributes: Vec::new(),
			children: Vec::new(),
		};
		Ok(ElementId(self.alloc(doc.0, kind)))
	}

	/// Create an attribute in the null namespace with an empty value.
	pub fn create_attribute(&mut self, doc: DocumentId, local_name: &str) -> Result<AttrId> {
		if validate_ncname(local_name).is_err() {
			return Err(DomError::InvalidCharacter("invalid attribute name").into());
		}
		let name = if local_name == "xmlns" {
			QName::new(XMLNS_XMLNS, local_name)
		} else {
			QName::local(local_name)
		};
		Ok(self.new_attr(doc, name, String::new()))
	}

	/// Create an attribute from a namespace and a qualified name.
	///
	/// Attributes without prefix are always in the null namespace, except
	/// for the `xmlns` declaration itself.
	pub fn create_attribute_ns(
		&mut self,
		doc: DocumentId,
		namespace: &str,
		qualified_name: &str,
	) -> Result<AttrId> {
		let name = self.checked_attr_name(namespace, qualified_name)?;
		Ok(self.new_attr(doc, name, String::new()))
	}

	fn checked_attr_name(&self, namespace: &str, qualified_name: &str) -> Result<QName> {
		let (prefix, local) = split_qualified(qualified_name)?;
		check_namespace(namespace, prefix, qualified_name)?;
		if prefix.is_empty() && !namespace.is_empty() && namespace != XMLNS_XMLNS {
			return Err(DomError::Namespace("unprefixed attribute in a namespace").into());
		}
		Ok(QName::with_prefix(namespace, local, prefix))
	}

	fn new_attr(&mut self, doc: DocumentId, name: QName, value: String) -> AttrId {
		let kind = NodeKind::Attr {
			name,
			value,
			owner_element: None,
		};
		AttrId(self.alloc(doc.0, kind))
	}

	pub fn create_text_node(&mut self, doc: DocumentId, data: &str) -> NodeId {
		self.alloc(doc.0, NodeKind::Text(data.into()))
	}

	pub fn create_comment(&mut self, doc: DocumentId, data: &str) -> NodeId {
		self.alloc(doc.0, NodeKind::Comment(data.into()))
	}

	pub fn create_cdata_section(&mut self, doc: DocumentId, data: &str) -> Result<NodeId> {
		if data.contains("]]>") {
			return Err(DomError::InvalidCharacter("']]>' in CDATA section").into());
		}
		Ok(self.alloc(doc.0, NodeKind::CData(data.into())))
	}

	pub fn create_processing_instruction(
		&mut self,
		doc: DocumentId,
		target: &str,
		data: &str,
	) -> Result<NodeId> {
		if validate_name(target).is_err() || target.eq_ignore_ascii_case("xml") {
			return Err(DomError::InvalidCharacter("invalid processing instruction target").into());
		}
		if data.contains("?>") {
			return Err(DomError::InvalidCharacter("'?>' in processing instruction").into());
		}
		let kind = NodeKind::ProcessingInstruction {
			target: target.into(),
			data: data.into(),
		};
		Ok(self.alloc(doc.0, kind))
	}

	pub fn create_document_fragment(&mut self, doc: DocumentId) -> FragmentId {
		FragmentId(self.alloc(
			doc.0,
			NodeKind::Fragment {
				children: Vec::new(),
			},
		))
	}

	/// Create a document type node; it still has to be inserted into the
	/// document.
	pub fn create_document_type(
		&mut self,
		doc: DocumentId,
		name: &str,
		public_id: &str,
		system_id: &str,
	) -> Result<NodeId> {
		if validate_name(name).is_err() {
			return Err(DomError::InvalidCharacter("invalid document type name").into());
		}
		let kind = NodeKind::DocumentType {
			name: name.into(),
			public_id: public_id.into(),
			system_id: system_id.into(),
			internal_subset: String::new(),
		};
		Ok(self.alloc(doc.0, kind))
	}

	/* tree mutation */

	fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
		loop {
			if node == ancestor {
				return true;
			}
			match self.parent(node) {
				Some(parent) => node = parent,
				None => return false,
			}
		}
	}

	fn check_same_document(&self, parent: NodeId, node: NodeId) -> Result<()> {
		if self.node_data(parent).owner != self.node_data(node).owner {
			return Err(DomError::WrongDocument("node not owned by this document, try importing").into());
		}
		Ok(())
	}

	/// Check that `candidates` may become children of `parent`, with
	/// `replacing` about to be removed.
	fn check_hierarchy(&self, parent: NodeId, candidates: &[NodeId], replacing: Option<NodeId>) -> Result<()> {
		let parent_is_document = self.as_document(parent).is_some();
		for c in candidates.iter() {
			match self.kind(*c) {
				NodeKind::Document { .. } | NodeKind::Attr { .. } | NodeKind::Fragment { .. } => {
					return Err(DomError::HierarchyRequest("node cannot be a child").into());
				}
				NodeKind::DocumentType { .. } if !parent_is_document => {
					return Err(DomError::HierarchyRequest("document type outside of a document").into());
				}
				NodeKind::Text(text) if parent_is_document && !is_whitespace_only(text) => {
					return Err(DomError::HierarchyRequest("text outside of the document element").into());
				}
				NodeKind::CData(..) if parent_is_document => {
					return Err(DomError::HierarchyRequest("CDATA section outside of the document element").into());
				}
				_ => (),
			}
		}
		if !parent_is_document {
			return Ok(());
		}
		let remaining = self
			.children(parent)
			.iter()
			.filter(|c| Some(**c) != replacing && !candidates.contains(*c));
		let count = |ty: NodeType| {
			remaining.clone().filter(|c| self.node_type(**c) == ty).count()
				+ candidates.iter().filter(|c| self.node_type(**c) == ty).count()
		};
		if count(NodeType::Element) > 1 {
			return Err(DomError::HierarchyRequest("document already has a document element").into());
		}
		if count(NodeType::DocumentType) > 1 {
			return Err(DomError::HierarchyRequest("document already has a document type").into());
		}
		Ok(())
	}

	fn detach(&mut self, node: NodeId) {
		if let Some(parent) = self.data_mut(node).parent.take() {
			if let Some(children) = self.data_mut(parent).kind.children_mut() {
				children.retain(|c| *c != node);
			}
		}
	}

	/// Insert `nodes` (already validated and detached) before `reference`.
	fn insert_unchecked(&mut self, parent: NodeId, nodes: &[NodeId], reference: Option<NodeId>) {
		for node in nodes.iter() {
			self.data_mut(*node).parent = Some(parent);
		}
		if let Some(children) = self.data_mut(parent).kind.children_mut() {
			let index = reference
				.and_then(|r| children.iter().position(|c| *c == r))
				.unwrap_or(children.len());
			children.splice(index..index, nodes.iter().copied());
		}
	}

	/// Take the children out of a fragment, or return the node itself.
	fn take_insertable(&mut self, node: NodeId) -> Vec<NodeId> {
		if self.as_fragment(node).is_none() {
			self.detach(node);
			return vec![node];
		}
		let children = self
			.data_mut(node)
			.kind
			.children_mut()
			.map(std::mem::take)
			.unwrap_or_default();
		for c in children.iter() {
			self.data_mut(*c).parent = None;
		}
		children
	}

	fn insertable(&self, node: NodeId) -> Vec<NodeId> {
		match self.kind(node) {
			NodeKind::Fragment { children } => children.clone(),
			_ => vec![node],
		}
	}

	fn check_insert(&self, parent: NodeId, node: NodeId, replacing: Option<NodeId>) -> Result<()> {
		self.check_same_document(parent, node)?;
		if self.as_document(node).is_some() || self.as_attr(node).is_some() {
			return Err(DomError::HierarchyRequest("node cannot be a child").into());
		}
		if self.is_inclusive_ancestor(node, parent) {
			return Err(DomError::HierarchyRequest("node is an ancestor of the parent").into());
		}
		self.check_hierarchy(parent, &self.insertable(node), replacing)
	}

	/// Append `node` as last child of `parent`, detaching it from its
	/// previous parent first. Inserting a fragment moves all of its
	/// children and leaves it empty.
	pub fn append_child(&mut self, parent: impl Into<ParentId>, node: NodeId) -> Result<NodeId> {
		self.insert_before(parent, node, None)
	}

	/// Insert `node` before `reference`, or at the end if `reference` is
	/// `None`.
	pub fn insert_before(
		&mut self,
		parent: impl Into<ParentId>,
		node: NodeId,
		reference: Option<NodeId>,
	) -> Result<NodeId> {
		let parent = parent.into().node();
		if let Some(reference) = reference {
			if self.parent(reference) != Some(parent) {
				return Err(DomError::NotFound("reference node is not a child of this node").into());
			}
		}
		self.check_insert(parent, node, None)?;
		let reference = match reference {
			Some(r) if r == node => self.next_sibling(node),
			other => other,
		};
		let nodes = self.take_insertable(node);
		self.insert_unchecked(parent, &nodes, reference);
		Ok(node)
	}

	/// Replace `old` by `node` and return `old`.
	pub fn replace_child(&mut self, parent: impl Into<ParentId>, node: NodeId, old: NodeId) -> Result<NodeId> {
		let parent = parent.into().node();
		if self.parent(old) != Some(parent) {
			return Err(DomError::NotFound("node to replace is not a child of this node").into());
		}
		if node == old {
			return Ok(old);
		}
		self.check_insert(parent, node, Some(old))?;
		let mut reference = self.next_sibling(old);
		if reference == Some(node) {
			reference = self.next_sibling(node);
		}
		self.detach(old);
		let nodes = self.take_insertable(node);
		self.insert_unchecked(parent, &nodes, reference);
		Ok(old)
	}

	pub fn remove_child(&mut self, parent: impl Into<ParentId>, node: NodeId) -> Result<NodeId> {
		let parent = parent.into().node();
		if self.parent(node) != Some(parent) {
			return Err(DomError::NotFound("node is not a child of this node").into());
		}
		self.detach(node);
		Ok(node)
	}

	/* ownership */

	fn set_owner_recursive(&mut self, node: NodeId, owner: NodeId) {
		let mut stack = vec![node];
		while let Some(current) = stack.pop() {
			let data = self.data_mut(current);
			data.owner = owner;
			match &data.kind {
				NodeKind::Element {
					attributes,
					children,
					..
				} => {
					stack.extend(attributes.iter().copied());
					stack.extend(children.iter().copied());
				}
				NodeKind::Fragment { children } => stack.extend(children.iter().copied()),
				_ => (),
			}
		}
	}

	/// Move `node` and its subtree into `doc`, detaching it from its parent
	/// or owner element.
	pub fn adopt_node(&mut self, doc: DocumentId, node: NodeId) -> Result<NodeId> {
		match self.node_type(node) {
			NodeType::Document => {
				return Err(DomError::NotSupported("documents cannot be adopted").into())
			}
			NodeType::DocumentType => {
				return Err(DomError::NotSupported("document types cannot be adopted").into())
			}
			NodeType::Attribute => {
				if let Some(owner) = self.owner_element(AttrId(node)) {
					self.detach_attr(owner.0, node);
				}
			}
			_ => self.detach(node),
		}
		if self.node_data(node).owner != doc.0 {
			log::trace!("adopting {:?} into {:?}", node, doc);
			self.set_owner_recursive(node, doc.0);
		}
		Ok(node)
	}

	fn template(&self, node: NodeId, deep: bool) -> Result<Template> {
		match self.kind(node) {
			NodeKind::Document { .. } => {
				return Err(DomError::NotSupported("documents cannot be imported").into())
			}
			NodeKind::DocumentType { .. } => {
				return Err(DomError::NotSupported("document types cannot be imported").into())
			}
			_ => (),
		}
		let mut nodes = Vec::new();
		let mut stack: Vec<(NodeId, Option<(usize, bool)>)> = vec![(node, None)];
		while let Some((current, parent)) = stack.pop() {
			let kind = self.kind(current);
			let index = nodes.len();
			nodes.push(TemplateNode {
				kind: kind.unlinked(),
				parent,
			});
			// pushed in reverse: attributes come out first, then the children
			if deep {
				stack.extend(kind.children().iter().rev().map(|c| (*c, Some((index, false)))));
			}
			if let NodeKind::Element { attributes, .. } = kind {
				stack.extend(attributes.iter().rev().map(|a| (*a, Some((index, true)))));
			}
		}
		Ok(Template { nodes })
	}

	fn instantiate(&mut self, doc: DocumentId, template: Template) -> NodeId {
		let mut ids: Vec<NodeId> = Vec::with_capacity(template.nodes.len());
		for entry in template.nodes {
			let id = self.alloc(doc.0, entry.kind);
			match entry.parent {
				None => (),
				Some((parent, true)) => {
					let owner = ids[parent];
					if let NodeKind::Attr { owner_element, .. } = &mut self.data_mut(id).kind {
						*owner_element = Some(owner);
					}
					if let NodeKind::Element { attributes, .. } = &mut self.data_mut(owner).kind {
						attributes.push(id);
					}
				}
				Some((parent, false)) => {
					let parent = ids[parent];
					self.data_mut(id).parent = Some(parent);
					if let Some(children) = self.data_mut(parent).kind.children_mut() {
						children.push(id);
					}
				}
			}
			ids.push(id);
		}
		// the copied node is always the first entry
		ids[0]
	}

	/// Copy `node` (and its subtree if `deep`) into a new, unattached node
	/// owned by `doc`. Element attributes are always copied.
	pub fn import_node(&mut self, doc: DocumentId, node: NodeId, deep: bool) -> Result<NodeId> {
		let template = self.template(node, deep)?;
		log::trace!("importing {:?} into {:?} (deep: {})", node, doc, deep);
		Ok(self.instantiate(doc, template))
	}

	/// Like [`import_node`](Self::import_node), with the source node living
	/// in another arena.
	pub fn import_from(&mut self, doc: DocumentId, source: &Dom, node: NodeId, deep: bool) -> Result<NodeId> {
		let template = source.template(node, deep)?;
		Ok(self.instantiate(doc, template))
	}

	/// Copy a node within its own document.
	pub fn clone_node(&mut self, node: NodeId, deep: bool) -> Result<NodeId> {
		let doc = self.owner_document(node);
		self.import_node(doc, node, deep)
	}

	/* elements and attributes */

	pub fn element_name(&self, el: ElementId) -> &QName {
		match self.kind(el.0) {
			NodeKind::Element { name, .. } => name,
			_ => unreachable!("element handle to a non-element"),
		}
	}

	/// `prefix:local` or `local`.
	pub fn tag_name(&self, el: ElementId) -> String {
		self.element_name(el).qualified_name()
	}

	fn attribute_ids(&self, el: NodeId) -> &[NodeId] {
		match self.kind(el) {
			NodeKind::Element { attributes, .. } => attributes,
			_ => &[],
		}
	}

	/// Attributes in insertion order, namespace declarations included.
	pub fn attributes(&self, el: ElementId) -> impl Iterator<Item = AttrId> + '_ {
		self.attribute_ids(el.0).iter().map(|a| AttrId(*a))
	}

	pub fn attr_name(&self, attr: AttrId) -> &QName {
		match self.kind(attr.0) {
			NodeKind::Attr { name, .. } => name,
			_ => unreachable!("attribute handle to a non-attribute"),
		}
	}

	pub fn attr_value(&self, attr: AttrId) -> &str {
		match self.kind(attr.0) {
			NodeKind::Attr { value, .. } => value,
			_ => unreachable!("attribute handle to a non-attribute"),
		}
	}

	pub fn set_attr_value(&mut self, attr: AttrId, new_value: &str) {
		if let NodeKind::Attr { value, .. } = &mut self.data_mut(attr.0).kind {
			*value = new_value.into();
		}
	}

	pub fn owner_element(&self, attr: AttrId) -> Option<ElementId> {
		match self.kind(attr.0) {
			NodeKind::Attr { owner_element, .. } => owner_element.map(ElementId),
			_ => None,
		}
	}

	pub fn get_named_item_ns(&self, el: ElementId, namespace: &str, local_name: &str) -> Option<AttrId> {
		self.attributes(el)
			.find(|a| self.attr_name(*a).matches(namespace, local_name))
	}

	/// Find an attribute by its qualified name.
	pub fn get_named_item(&self, el: ElementId, qualified_name: &str) -> Option<AttrId> {
		self.attributes(el)
			.find(|a| self.attr_name(*a).qualified_name() == qualified_name)
	}

	/// Attach `attr` to `el`, replacing an attribute with the same namespace
	/// and local name, which is returned.
	pub fn set_named_item(&mut self, el: ElementId, attr: AttrId) -> Result<Option<AttrId>> {
		self.check_same_document(el.0, attr.0)?;
		match self.owner_element(attr) {
			Some(owner) if owner == el => return Ok(Some(attr)),
			Some(_) => {
				return Err(DomError::InUseAttribute("attribute belongs to another element").into())
			}
			None => (),
		}
		let name = self.attr_name(attr).clone();
		let old = self.get_named_item_ns(el, &name.namespace, &name.local_name);
		if let NodeKind::Attr { owner_element, .. } = &mut self.data_mut(attr.0).kind {
			*owner_element = Some(el.0);
		}
		if let Some(old) = old {
			if let NodeKind::Attr { owner_element, .. } = &mut self.data_mut(old.0).kind {
				*owner_element = None;
			}
		}
		if let NodeKind::Element { attributes, .. } = &mut self.data_mut(el.0).kind {
			match old.and_then(|old| attributes.iter().position(|a| *a == old.0)) {
				Some(index) => attributes[index] = attr.0,
				None => attributes.push(attr.0),
			}
		}
		Ok(old)
	}

	fn detach_attr(&mut self, el: NodeId, attr: NodeId) {
		if let NodeKind::Element { attributes, .. } = &mut self.data_mut(el).kind {
			attributes.retain(|a| *a != attr);
		}
		if let NodeKind::Attr { owner_element, .. } = &mut self.data_mut(attr).kind {
			*owner_element = None;
		}
	}

	/// Detach the attribute with the given namespace and local name.
	pub fn remove_named_item_ns(&mut self, el: ElementId, namespace: &str, local_name: &str) -> Result<AttrId> {
		match self.get_named_item_ns(el, namespace, local_name) {
			Some(attr) => {
				self.detach_attr(el.0, attr.0);
				Ok(attr)
			}
			None => Err(DomError::NotFound("no such attribute").into()),
		}
	}

	pub fn remove_named_item(&mut self, el: ElementId, qualified_name: &str) -> Result<AttrId> {
		match self.get_named_item(el, qualified_name) {
			Some(attr) => {
				self.detach_attr(el.0, attr.0);
				Ok(attr)
			}
			None => Err(DomError::NotFound("no such attribute").into()),
		}
	}

	pub fn get_attribute(&self, el: ElementId, qualified_name: &str) -> Option<&str> {
		self.get_named_item(el, qualified_name).map(|a| self.attr_value(a))
	}

	pub fn get_attribute_ns(&self, el: ElementId, namespace: &str, local_name: &str) -> Option<&str> {
		self.get_named_item_ns(el, namespace, local_name)
			.map(|a| self.attr_value(a))
	}

	pub fn has_attribute(&self, el: ElementId, qualified_name: &str) -> bool {
		self.get_named_item(el, qualified_name).is_some()
	}

	pub fn has_attribute_ns(&self, el: ElementId, namespace: &str, local_name: &str) -> bool {
		self.get_named_item_ns(el, namespace, local_name).is_some()
	}

	/// Set an attribute by qualified name. A prefix is resolved against the
	/// namespace declarations in scope of `el`.
	pub fn set_attribute(&mut self, el: ElementId, qualified_name: &str, value: &str) -> Result<()> {
		if let Some(attr) = self.get_named_item(el, qualified_name) {
			self.set_attr_value(attr, value);
			return Ok(());
		}
		let (prefix, _) = split_qualified(qualified_name)?;
		let namespace: SmartString = if qualified_name == "xmlns" {
			XMLNS_XMLNS.into()
		} else if prefix.is_empty() {
			SmartString::new()
		} else {
			match self.lookup_namespace_uri(el.0, prefix) {
				Some(uri) => uri.into(),
				None => return Err(DomError::Namespace("undeclared prefix").into()),
			}
		};
		self.set_attribute_ns(el, &namespace, qualified_name, value)
	}

	/// Set an attribute by namespace and qualified name, keeping the
	/// position (and prefix) of an existing attribute with the same
	/// namespace and local name.
	pub fn set_attribute_ns(
		&mut self,
		el: ElementId,
		namespace: &str,
		qualified_name: &str,
		value: &str,
	) -> Result<()> {
		let name = self.checked_attr_name(namespace, qualified_name)?;
		if let Some(attr) = self.get_named_item_ns(el, &name.namespace, &name.local_name) {
			self.set_attr_value(attr, value);
			return Ok(());
		}
		let doc = self.owner_document(el.0);
		let attr = self.new_attr(doc, name, value.into());
		self.set_named_item(el, attr)?;
		Ok(())
	}

	pub fn remove_attribute(&mut self, el: ElementId, qualified_name: &str) -> Option<AttrId> {
		self.remove_named_item(el, qualified_name).ok()
	}

	pub fn remove_attribute_ns(&mut self, el: ElementId, namespace: &str, local_name: &str) -> Option<AttrId> {
		self.remove_named_item_ns(el, namespace, local_name).ok()
	}

	/* character data */

	/// Data of text, CDATA, comment and processing instruction nodes.
	pub fn data(&self, node: NodeId) -> Option<&str> {
		match self.kind(node) {
			NodeKind::Text(data) | NodeKind::CData(data) | NodeKind::Comment(data) => Some(data),
			NodeKind::ProcessingInstruction { data, .. } => Some(data),
			_ => None,
		}
	}

	pub fn set_data(&mut self, node: NodeId, value: &str) -> Result<()> {
		match &mut self.data_mut(node).kind {
			NodeKind::Text(data) | NodeKind::Comment(data) => *data = value.into(),
			NodeKind::CData(data) => {
				if value.contains("]]>") {
					return Err(DomError::InvalidCharacter("']]>' in CDATA section").into());
				}
				*data = value.into();
			}
			NodeKind::ProcessingInstruction { data, .. } => {
				if value.contains("?>") {
					return Err(DomError::InvalidCharacter("'?>' in processing instruction").into());
				}
				*data = value.into();
			}
			_ => return Err(DomError::NotSupported("node has no character data").into()),
		}
		Ok(())
	}

	pub fn pi_target(&self, node: NodeId) -> Option<&str> {
		match self.kind(node) {
			NodeKind::ProcessingInstruction { target, .. } => Some(target),
			_ => None,
		}
	}

	/// Name, public id and system id of a document type node.
	pub fn doctype_ids(&self, node: NodeId) -> Option<(&str, &str, &str)> {
		match self.kind(node) {
			NodeKind::DocumentType {
				name,
				public_id,
				system_id,
				..
			} => Some((name, public_id, system_id)),
			_ => None,
		}
	}

	pub fn internal_subset(&self, node: NodeId) -> Option<&str> {
		match self.kind(node) {
			NodeKind::DocumentType {
				internal_subset, ..
			} => Some(internal_subset),
			_ => None,
		}
	}

	pub(crate) fn set_internal_subset(&mut self, node: NodeId, value: &str) {
		if let NodeKind::DocumentType {
			internal_subset, ..
		} = &mut self.data_mut(node).kind
		{
			*internal_subset = value.into();
		}
	}

	/// Concatenated text of all descendant text and CDATA nodes for elements
	/// and fragments, the data for character data nodes, the value for
	/// attributes and `None` for documents and document types.
	pub fn text_content(&self, node: NodeId) -> Option<String> {
		match self.kind(node) {
			NodeKind::Document { .. } | NodeKind::DocumentType { .. } => None,
			NodeKind::Attr { value, .. } => Some(value.clone()),
			NodeKind::Element { .. } | NodeKind::Fragment { .. } => {
				let mut out = String::new();
				self.collect_text(node, &mut out);
				Some(out)
			}
			_ => self.data(node).map(str::to_string),
		}
	}

	fn collect_text(&self, node: NodeId, out: &mut String) {
		let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
		while let Some(child) = stack.pop() {
			match self.kind(child) {
				NodeKind::Text(data) | NodeKind::CData(data) => out.push_str(data),
				NodeKind::Element { children, .. } => stack.extend(children.iter().rev().copied()),
				_ => (),
			}
		}
	}

	/// Replace all children by a single text node (none if `text` is
	/// empty), or set the data or value of other nodes.
	pub fn set_text_content(&mut self, node: NodeId, text: &str) -> Result<()> {
		match self.node_type(node) {
			NodeType::Document => Err(DomError::NotSupported("documents have no text content").into()),
			NodeType::DocumentType => Ok(()),
			NodeType::Attribute => {
				self.set_attr_value(AttrId(node), text);
				Ok(())
			}
			NodeType::Element | NodeType::DocumentFragment => {
				let children = self.children(node).to_vec();
				for child in children {
					self.detach(child);
				}
				if !text.is_empty() {
					let doc = self.owner_document(node);
					let text_node = self.create_text_node(doc, text);
					self.insert_unchecked(node, &[text_node], None);
				}
				Ok(())
			}
			_ => self.set_data(node, text),
		}
	}

	/// Drop empty text nodes and merge adjacent ones in the subtree.
	pub fn normalize(&mut self, node: NodeId) {
		let children = self.children(node).to_vec();
		let mut previous_text: Option<NodeId> = None;
		for child in children {
			match &self.kind(child) {
				NodeKind::Text(data) if data.is_empty() => {
					self.detach(child);
				}
				NodeKind::Text(data) => match previous_text {
					Some(previous) => {
						let data = data.clone();
						if let NodeKind::Text(previous_data) = &mut self.data_mut(previous).kind {
							previous_data.push_str(&data);
						}
						self.detach(child);
					}
					None => previous_text = Some(child),
				},
				_ => {
					previous_text = None;
					self.normalize(child);
				}
			}
		}
	}

	/* namespaces */

	/// The element whose namespace scope applies to `node`.
	fn scope_element(&self, node: NodeId) -> Option<NodeId> {
		match self.kind(node) {
			NodeKind::Element { .. } => Some(node),
			NodeKind::Attr { owner_element, .. } => *owner_element,
			NodeKind::Document { .. } => self.document_element(DocumentId(node)).map(|e| e.0),
			NodeKind::Fragment { .. } | NodeKind::DocumentType { .. } => None,
			_ => self.parent(node).and_then(|p| self.scope_element(p)),
		}
	}

	/// Namespace declarations made by the attributes of an element, in
	/// order.
	fn declarations(&self, el: NodeId) -> impl Iterator<Item = (&str, &str)> + '_ {
		self.attribute_ids(el).iter().filter_map(move |a| match self.kind(*a) {
			NodeKind::Attr { name, value, .. } => declared_prefix(name).map(|p| (p, value.as_str())),
			_ => None,
		})
	}

	/// Resolve `prefix` at `node` from the `xmlns` attributes and element
	/// names of the ancestors. The same rules as for
	/// [`NamespaceContext::namespace_uri`] apply: an unbound empty prefix
	/// resolves to the null namespace.
	pub fn lookup_namespace_uri(&self, node: NodeId, prefix: &str) -> Option<&str> {
		if let Some(uri) = fixed_uri(prefix) {
			return Some(uri);
		}
		let mut current = self.scope_element(node);
		while let Some(el) = current {
			if let Some((_, uri)) = self.declarations(el).find(|(p, _)| *p == prefix) {
				if uri.is_empty() && !prefix.is_empty() {
					return None;
				}
				return Some(uri);
			}
			if let NodeKind::Element { name, .. } = self.kind(el) {
				if name.prefix.as_str() == prefix && (prefix.is_empty() || !name.namespace.is_empty()) {
					return Some(name.namespace.as_str());
				}
			}
			current = self.parent_element(el).map(|e| e.0);
		}
		if prefix.is_empty() {
			Some("")
		} else {
			None
		}
	}

	/// Find a prefix bound to `uri` at `node` which is not shadowed.
	pub fn lookup_prefix(&self, node: NodeId, uri: &str) -> Option<&str> {
		if let Some(prefix) = fixed_prefix(uri) {
			return Some(prefix);
		}
		let mut current = self.scope_element(node);
		while let Some(el) = current {
			let own = match self.kind(el) {
				NodeKind::Element { name, .. } if name.namespace.as_str() == uri => Some(name.prefix.as_str()),
				_ => None,
			};
			let declared = self.declarations(el).filter(|(_, u)| *u == uri).map(|(p, _)| p);
			for candidate in declared.chain(own) {
				if self.lookup_namespace_uri(node, candidate) == Some(uri) {
					return Some(candidate);
				}
			}
			current = self.parent_element(el).map(|e| e.0);
		}
		if uri.is_empty() && self.lookup_namespace_uri(node, "") == Some("") {
			return Some("");
		}
		None
	}

	/// Effective bindings in scope at `node`, outermost first, one per
	/// prefix.
	pub fn in_scope_namespaces(&self, node: NodeId) -> Vec<Namespace> {
		let mut chain = Vec::new();
		let mut current = self.scope_element(node);
		while let Some(el) = current {
			chain.push(el);
			current = self.parent_element(el).map(|e| e.0);
		}
		let mut result: Vec<Namespace> = Vec::new();
		let mut bind = |prefix: &str, uri: &str| match result.iter_mut().find(|ns| ns.prefix.as_str() == prefix) {
			Some(existing) => existing.uri = uri.into(),
			None => result.push(Namespace::new(prefix, uri)),
		};
		for el in chain.into_iter().rev() {
			if let NodeKind::Element { name, .. } = self.kind(el) {
				if !name.namespace.is_empty() {
					bind(name.prefix.as_str(), name.namespace.as_str());
				}
			}
			for (prefix, uri) in self.declarations(el) {
				bind(prefix, uri);
			}
		}
		result.retain(|ns| !(ns.prefix.is_empty() && ns.uri.is_empty()));
		result
	}

	/// A [`NamespaceContext`] view of the scope at `node`.
	pub fn namespace_context(&self, node: NodeId) -> NodeNamespaces<'_> {
		NodeNamespaces { dom: self, node }
	}

	/* serialization */

	/// Write `node` and its subtree into an event sink.
	pub fn write_node<W: EventWrite + ?Sized>(&self, node: NodeId, writer: &mut W) -> Result<()> {
		let mut reader = DomReader::new(self, node);
		serialize(&mut reader, writer)
	}
}

/// Namespace scope at a DOM node; see [`Dom::namespace_context`].
#[derive(Debug, Clone, Copy)]
pub struct NodeNamespaces<'a> {
	dom: &'a Dom,
	node: NodeId,
}

impl NamespaceContext for NodeNamespaces<'_> {
	fn namespace_uri(&self, prefix: &str) -> Option<&str> {
		self.dom.lookup_namespace_uri(self.node, prefix)
	}

	fn prefix(&self, uri: &str) -> Option<&str> {
		self.dom.lookup_prefix(self.node, uri)
	}
}
