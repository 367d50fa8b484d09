/*!
# Building DOM trees from events

[`DomWriter`] implements [`EventWrite`], so anything that can be written
into an [`XmlWriter`](crate::XmlWriter) can be written into a [`Dom`]
instead, most notably the events of a reader via
[`serialize`](crate::serialize).
*/
use nsxml_validation::{is_whitespace_only, is_xml_whitespace, validate_name};

use crate::error::{DomError, Error, Result, WriteError};
use crate::event::XmlDeclaration;
use crate::namespaces::{Namespace, NamespaceContext, NamespaceHolder, XMLNS_XMLNS};
use crate::strings::QName;
use crate::writer::{check_ncname, EventWrite, WriterScope};

use super::{Dom, DocumentId, ElementId, NodeId, NodeKind, NodeType, ParentId};

/// Parts of a document type declaration.
struct DocTypeParts<'x> {
	name: &'x str,
	public_id: &'x str,
	system_id: &'x str,
	internal_subset: &'x str,
}

fn malformed_doctype() -> Error {
	DomError::InvalidCharacter("malformed document type declaration").into()
}

fn quoted(s: &str) -> Result<(&str, &str)> {
	let s = s.trim_start_matches(is_xml_whitespace);
	let quote = match s.chars().next() {
		Some(q @ '"') | Some(q @ '\'') => q,
		_ => return Err(malformed_doctype()),
	};
	let inner = &s[1..];
	match inner.find(quote) {
		Some(end) => Ok((&inner[..end], &inner[end + 1..])),
		None => Err(malformed_doctype()),
	}
}

/// Split the content of `<!DOCTYPE ...>` into its parts.
fn parse_doctype(text: &str) -> Result<DocTypeParts<'_>> {
	let rest = text.trim_start_matches(is_xml_whitespace);
	let name_end = rest
		.find(|c: char| is_xml_whitespace(c) || c == '[')
		.unwrap_or(rest.len());
	let name = &rest[..name_end];
	if validate_name(name).is_err() {
		return Err(malformed_doctype());
	}
	let mut rest = rest[name_end..].trim_start_matches(is_xml_whitespace);
	let mut public_id = "";
	let mut system_id = "";
	if let Some(after) = rest.strip_prefix("PUBLIC") {
		let (p, after) = quoted(after)?;
		let (s, after) = quoted(after)?;
		public_id = p;
		system_id = s;
		rest = after;
	} else if let Some(after) = rest.strip_prefix("SYSTEM") {
		let (s, after) = quoted(after)?;
		system_id = s;
		rest = after;
	}
	let rest = rest.trim_matches(is_xml_whitespace);
	let internal_subset = if rest.is_empty() {
		""
	} else {
		match rest.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
			Some(subset) => subset,
			None => return Err(malformed_doctype()),
		}
	};
	Ok(DocTypeParts {
		name,
		public_id,
		system_id,
		internal_subset,
	})
}

/**
Builder which turns [`EventWrite`] calls into DOM nodes.

Nodes are appended to a document created by [`DomWriter::new`], or below an
existing node with [`DomWriter::with_parent`]. Namespace declarations are
stored as `xmlns` attributes; with namespace repair (the default) missing
declarations are added the same way [`XmlWriter`](crate::XmlWriter) would
write them.

Whitespace outside of the document element is dropped, other text there is
an error. Entity references cannot be represented and fail with
[`DomError::NotSupported`].

```
use nsxml::{serialize, Dom, DomWriter, XmlReader};

let mut dom = Dom::new();
let mut reader = XmlReader::from_str("<a xmlns='urn:a'><b>text</b></a>");
let mut writer = DomWriter::new(&mut dom);
serialize(&mut reader, &mut writer).unwrap();
let doc = writer.document();
let root = dom.document_element(doc).unwrap();
assert_eq!(dom.element_name(root).namespace.as_str(), "urn:a");
assert_eq!(dom.text_content(root.into()).as_deref(), Some("text"));
```
*/
pub struct DomWriter<'d> {
	dom: &'d mut Dom,
	document: DocumentId,
	target: ParentId,
	elements: Vec<ElementId>,
	scope: WriterScope,
	start_open: bool,
	seen_declaration: bool,
	closed: bool,
}

impl<'d> DomWriter<'d> {
	/// Write into a new document.
	pub fn new(dom: &'d mut Dom) -> DomWriter<'d> {
		let document = dom.create_document();
		Self::build(dom, document, document.into(), NamespaceHolder::new())
	}

	/// Append the written nodes to `parent`. The namespaces in scope at
	/// `parent` are known to the writer and not declared again.
	pub fn with_parent(dom: &'d mut Dom, parent: impl Into<ParentId>) -> DomWriter<'d> {
		let parent = parent.into();
		let document = dom.owner_document(parent.node());
		let mut namespaces = NamespaceHolder::new();
		if let ParentId::Element(el) = parent {
			for ns in dom.in_scope_namespaces(el.node()) {
				namespaces.add_prefix_to_context(&ns.prefix, &ns.uri);
			}
		}
		Self::build(dom, document, parent, namespaces)
	}

	fn build(
		dom: &'d mut Dom,
		document: DocumentId,
		target: ParentId,
		namespaces: NamespaceHolder,
	) -> DomWriter<'d> {
		let seen_declaration = dom.xml_declaration(document).version.is_some();
		DomWriter {
			dom,
			document,
			target,
			elements: Vec::new(),
			scope: WriterScope::new(namespaces, true),
			start_open: false,
			seen_declaration,
			closed: false,
		}
	}

	/// Enable or disable namespace repair.
	pub fn repair_namespaces(mut self, v: bool) -> DomWriter<'d> {
		self.scope.set_repair(v);
		self
	}

	/// The document the nodes are created in.
	pub fn document(&self) -> DocumentId {
		self.document
	}

	/// The node written into at the top level.
	pub fn target(&self) -> ParentId {
		self.target
	}

	pub fn dom(&self) -> &Dom {
		&*self.dom
	}

	fn check_open(&self) -> Result<()> {
		if self.closed {
			Err(Error::Closed)
		} else {
			Ok(())
		}
	}

	fn current(&self) -> ParentId {
		match self.elements.last() {
			Some(el) => (*el).into(),
			None => self.target,
		}
	}

	fn at_document_level(&self) -> bool {
		self.elements.is_empty() && matches!(self.target, ParentId::Document(_))
	}

	fn end_start_tag(&mut self) {
		if self.start_open {
			self.start_open = false;
			self.scope.seal();
		}
	}

	fn append(&mut self, node: NodeId) -> Result<()> {
		self.end_start_tag();
		let parent = self.current();
		self.dom.append_child(parent, node)?;
		Ok(())
	}

	fn append_text(&mut self, text: &str) -> Result<()> {
		self.end_start_tag();
		let parent = self.current();
		if let Some(last) = self.dom.last_child(parent.node()) {
			if let NodeKind::Text(data) = &mut self.dom.data_mut(last).kind {
				data.push_str(text);
				return Ok(());
			}
		}
		let node = self.dom.create_text_node(self.document, text);
		self.append(node)
	}

	fn open_element(&self) -> Result<ElementId> {
		match (self.start_open, self.elements.last()) {
			(true, Some(el)) => Ok(*el),
			_ => Err(WriteError::AttributeNotAllowed.into()),
		}
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
		let qualified = if prefix.is_empty() {
			local_name.to_string()
		} else {
			check_ncname(prefix)?;
			format!("{}:{}", prefix, local_name)
		};
		let el = self.dom.create_element_ns(self.document, namespace, &qualified)?;
		self.append(el.into())?;
		self.elements.push(el);
		self.scope.open(namespace, prefix);
		self.start_open = true;

		for ns in declarations {
			self.namespace_attr(&ns.prefix, &ns.uri)?;
		}
		match self.scope.missing_element_binding(namespace, prefix) {
			Some(ns) => self.namespace_attr(&ns.prefix, &ns.uri),
			None => Ok(()),
		}
	}
}

impl EventWrite for DomWriter<'_> {
	/// Record the declaration on the document. Ignored when writing below
	/// an existing node.
	fn start_document(
		&mut self,
		version: Option<&str>,
		encoding: Option<&str>,
		standalone: Option<bool>,
	) -> Result<()> {
		self.check_open()?;
		let doc = match self.target {
			ParentId::Document(doc) => doc,
			_ => return Ok(()),
		};
		if self.seen_declaration || !self.dom.children(doc.node()).is_empty() {
			return Err(WriteError::MisplacedXmlDeclaration.into());
		}
		self.seen_declaration = true;
		self.dom.set_xml_declaration(
			doc,
			XmlDeclaration {
				version: Some(version.unwrap_or("1.0").into()),
				encoding: encoding.map(Into::into),
				standalone,
			},
		);
		if let Some(encoding) = encoding {
			self.dom.set_character_set(doc, encoding);
		}
		Ok(())
	}

	fn end_document(&mut self) -> Result<()> {
		self.check_open()?;
		if !self.elements.is_empty() {
			return Err(WriteError::UnbalancedEndDocument(self.elements.len()).into());
		}
		self.end_start_tag();
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
			Some(top) => *top,
			None => return Err(WriteError::NoOpenElement.into()),
		};
		let name = self.dom.element_name(top);
		if !name.matches(namespace, local_name) {
			return Err(WriteError::ElementMismatch {
				expected: name.to_string().into(),
				found: QName::new(namespace, local_name).to_string().into(),
			}
			.into());
		}
		self.end_start_tag();
		self.elements.pop();
		self.scope.close();
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
		let el = self.open_element()?;
		check_ncname(local_name)?;
		let (actual, declaration) = self.scope.attribute_prefix(namespace, prefix.unwrap_or(""));
		if let Some(ns) = declaration {
			self.namespace_attr(&ns.prefix, &ns.uri)?;
		}
		let qualified = if actual.is_empty() {
			local_name.to_string()
		} else {
			format!("{}:{}", actual, local_name)
		};
		self.dom.set_attribute_ns(el, namespace, &qualified, value)
	}

	fn namespace_attr(&mut self, prefix: &str, uri: &str) -> Result<()> {
		self.check_open()?;
		let el = self.open_element()?;
		if !self.scope.declare(prefix, uri)? {
			return Ok(());
		}
		if prefix.is_empty() {
			self.dom.set_attribute_ns(el, XMLNS_XMLNS, "xmlns", uri)
		} else {
			self.dom
				.set_attribute_ns(el, XMLNS_XMLNS, &format!("xmlns:{}", prefix), uri)
		}
	}

	fn text(&mut self, text: &str) -> Result<()> {
		self.check_open()?;
		if text.is_empty() {
			return Ok(());
		}
		if self.at_document_level() {
			if is_whitespace_only(text) {
				self.end_start_tag();
				return Ok(());
			}
			return Err(DomError::HierarchyRequest("text outside of the document element").into());
		}
		self.append_text(text)
	}

	fn cdsect(&mut self, text: &str) -> Result<()> {
		self.check_open()?;
		let node = self.dom.create_cdata_section(self.document, text)?;
		self.append(node)
	}

	fn comment(&mut self, text: &str) -> Result<()> {
		self.check_open()?;
		let node = self.dom.create_comment(self.document, text);
		self.append(node)
	}

	fn processing_instruction(&mut self, target: &str, data: &str) -> Result<()> {
		self.check_open()?;
		let node = self
			.dom
			.create_processing_instruction(self.document, target, data)?;
		self.append(node)
	}

	fn entity_ref(&mut self, _name: &str) -> Result<()> {
		self.check_open()?;
		Err(DomError::NotSupported("entity references cannot be stored in the DOM").into())
	}

	fn ignorable_whitespace(&mut self, text: &str) -> Result<()> {
		self.check_open()?;
		if !is_whitespace_only(text) {
			return Err(WriteError::NotWhitespace.into());
		}
		self.text(text)
	}

	/// Parse the declaration into a document type node. Ignored when
	/// writing below an existing node.
	fn docdecl(&mut self, text: &str) -> Result<()> {
		self.check_open()?;
		if !matches!(self.target, ParentId::Document(_)) {
			log::debug!("dropping document type declaration below a non-document node");
			return Ok(());
		}
		if !self.at_document_level() {
			return Err(WriteError::MisplacedDoctype.into());
		}
		let parts = parse_doctype(text)?;
		let node = self.dom.create_document_type(
			self.document,
			parts.name,
			parts.public_id,
			parts.system_id,
		)?;
		self.dom.set_internal_subset(node, parts.internal_subset);
		let has_element = self
			.dom
			.children(self.document.node())
			.iter()
			.any(|c| self.dom.node_type(*c) == NodeType::Element);
		if has_element {
			return Err(WriteError::MisplacedDoctype.into());
		}
		self.append(node)
	}

	fn depth(&self) -> usize {
		self.elements.len()
	}

	fn close(&mut self) -> Result<()> {
		self.closed = true;
		self.start_open = false;
		self.elements.clear();
		self.scope.clear();
		Ok(())
	}
}

impl NamespaceContext for DomWriter<'_> {
	fn namespace_uri(&self, prefix: &str) -> Option<&str> {
		self.scope.namespace_uri(prefix)
	}

	fn prefix(&self, uri: &str) -> Option<&str> {
		self.scope.prefix(uri)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builds_tree_with_repaired_namespaces() {
		let mut dom = Dom::new();
		let mut w = DomWriter::new(&mut dom);
		w.start_tag("urn:a", "root", Some("a")).unwrap();
		w.attribute("urn:b", "attr", Some("b"), "v").unwrap();
		w.start_tag("urn:a", "child", None).unwrap();
		w.text("x").unwrap();
		w.text("y").unwrap();
		w.end_tag("urn:a", "child").unwrap();
		w.end_tag("urn:a", "root").unwrap();
		w.end_document().unwrap();
		let doc = w.document();

		let root = dom.document_element(doc).unwrap();
		assert_eq!(dom.tag_name(root), "a:root");
		assert_eq!(dom.get_attribute_ns(root, XMLNS_XMLNS, "a"), Some("urn:a"));
		assert_eq!(dom.get_attribute_ns(root, XMLNS_XMLNS, "b"), Some("urn:b"));
		assert_eq!(dom.get_attribute_ns(root, "urn:b", "attr"), Some("v"));
		let child = dom.as_element(dom.first_child(root.into()).unwrap()).unwrap();
		assert_eq!(dom.tag_name(child), "a:child");
		assert_eq!(dom.attributes(child).count(), 0);
		// adjacent text is merged
		assert_eq!(dom.children(child.into()).len(), 1);
		assert_eq!(dom.text_content(child.into()).as_deref(), Some("xy"));
	}

	#[test]
	fn attributes_need_an_open_start_tag() {
		let mut dom = Dom::new();
		let mut w = DomWriter::new(&mut dom);
		w.start_tag("", "root", None).unwrap();
		w.text("t").unwrap();
		match w.attribute("", "a", None, "v") {
			Err(Error::Write(WriteError::AttributeNotAllowed)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn whitespace_outside_root_is_dropped() {
		let mut dom = Dom::new();
		let mut w = DomWriter::new(&mut dom);
		w.text("\n").unwrap();
		w.comment("c").unwrap();
		w.start_tag("", "root", None).unwrap();
		w.end_tag("", "root").unwrap();
		w.ignorable_whitespace("  ").unwrap();
		match w.text("x") {
			Err(Error::Dom(DomError::HierarchyRequest(_))) => (),
			other => panic!("unexpected result: {:?}", other),
		}
		let doc = w.document();
		assert_eq!(dom.children(doc.node()).len(), 2);
	}

	#[test]
	fn second_root_is_refused() {
		let mut dom = Dom::new();
		let mut w = DomWriter::new(&mut dom);
		w.start_tag("", "a", None).unwrap();
		w.end_tag("", "a").unwrap();
		match w.start_tag("", "b", None) {
			Err(Error::Dom(DomError::HierarchyRequest(_))) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn end_tag_must_match() {
		let mut dom = Dom::new();
		let mut w = DomWriter::new(&mut dom);
		w.start_tag("urn:a", "a", None).unwrap();
		match w.end_tag("urn:a", "b") {
			Err(Error::Write(WriteError::ElementMismatch { .. })) => (),
			other => panic!("unexpected result: {:?}", other),
		}
		match w.end_document() {
			Err(Error::Write(WriteError::UnbalancedEndDocument(1))) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn entity_refs_are_unsupported() {
		let mut dom = Dom::new();
		let mut w = DomWriter::new(&mut dom);
		w.start_tag("", "a", None).unwrap();
		match w.entity_ref("foo") {
			Err(Error::Dom(DomError::NotSupported(_))) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn declaration_and_doctype_are_recorded() {
		let mut dom = Dom::new();
		let mut w = DomWriter::new(&mut dom);
		w.start_document(Some("1.0"), Some("ISO-8859-1"), Some(true))
			.unwrap();
		w.docdecl("html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" 'x.dtd' [<!ENTITY a 'b'>]")
			.unwrap();
		w.start_tag("", "html", None).unwrap();
		w.end_tag("", "html").unwrap();
		let doc = w.document();
		assert_eq!(dom.character_set(doc), "ISO-8859-1");
		assert_eq!(dom.xml_declaration(doc).standalone, Some(true));
		let dt = dom.doctype(doc).unwrap();
		assert_eq!(
			dom.doctype_ids(dt),
			Some(("html", "-//W3C//DTD XHTML 1.0 Strict//EN", "x.dtd"))
		);
		assert_eq!(dom.internal_subset(dt), Some("<!ENTITY a 'b'>"));
	}

	#[test]
	fn malformed_doctype_is_refused() {
		let mut dom = Dom::new();
		let mut w = DomWriter::new(&mut dom);
		match w.docdecl("html SYSTEM unquoted") {
			Err(Error::Dom(DomError::InvalidCharacter(_))) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn writing_below_an_element_uses_its_scope() {
		let mut dom = Dom::new();
		let doc = dom.create_document();
		let root = dom.create_element_ns(doc, "urn:a", "a:root").unwrap();
		dom.append_child(doc, root.into()).unwrap();
		dom.set_attribute_ns(root, XMLNS_XMLNS, "xmlns:a", "urn:a")
			.unwrap();
		{
			let mut w = DomWriter::with_parent(&mut dom, root);
			w.start_document(None, None, None).unwrap();
			w.start_tag("urn:a", "child", Some("x")).unwrap();
			w.end_tag("urn:a", "child").unwrap();
			w.end_document().unwrap();
		}
		let child = dom.as_element(dom.first_child(root.into()).unwrap()).unwrap();
		assert_eq!(dom.tag_name(child), "a:child");
		assert_eq!(dom.attributes(child).count(), 0);
	}

	#[test]
	fn conflicting_declarations_fail() {
		let mut dom = Dom::new();
		let mut w = DomWriter::new(&mut dom);
		w.start_tag("", "a", None).unwrap();
		w.namespace_attr("p", "urn:1").unwrap();
		w.namespace_attr("p", "urn:1").unwrap();
		match w.namespace_attr("p", "urn:2") {
			Err(Error::Write(WriteError::NamespaceConflict(_))) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn own_declarations_choose_the_element_prefix() {
		let mut dom = Dom::new();
		let mut w = DomWriter::new(&mut dom);
		let mut reader =
			crate::XmlReader::from_str("<r xmlns:a='urn:1'><b:e xmlns:b='urn:1' xmlns:a='urn:2'/></r>");
		crate::serialize(&mut reader, &mut w).unwrap();
		let doc = w.document();

		let root = dom.document_element(doc).unwrap();
		let e = dom.as_element(dom.first_child(root.into()).unwrap()).unwrap();
		assert_eq!(dom.tag_name(e), "b:e");
		assert_eq!(dom.element_name(e).namespace.as_str(), "urn:1");
		assert_eq!(dom.get_attribute_ns(e, XMLNS_XMLNS, "b"), Some("urn:1"));
		assert_eq!(dom.get_attribute_ns(e, XMLNS_XMLNS, "a"), Some("urn:2"));
	}

	#[test]
	fn inherited_element_prefix_cannot_be_rebound() {
		let mut dom = Dom::new();
		let mut w = DomWriter::new(&mut dom);
		w.start_tag("urn:1", "r", Some("a")).unwrap();
		w.start_tag("urn:1", "e", None).unwrap();
		match w.namespace_attr("a", "urn:2") {
			Err(Error::Write(WriteError::NamespaceConflict(prefix))) => assert_eq!(prefix.as_str(), "a"),
			other => panic!("unexpected result: {:?}", other),
		}
	}
}
