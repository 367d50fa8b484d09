/*!
# Events of the streaming protocol

The reader produces, and the writer, the DOM writer and fragment capture
consume, a sequence of [`Event`]s.
*/
use std::fmt;

use smartstring::alias::String as SmartString;

use crate::error::{Error, Result};
use crate::namespaces::Namespace;
use crate::strings::{NCName, Name, QName};

/// Kind of an [`Event`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
	StartDocument,
	EndDocument,
	StartElement,
	EndElement,
	Text,
	IgnorableWhitespace,
	CData,
	Comment,
	ProcessingInstruction,
	DocType,
	EntityRef,
	Attribute,
}

impl EventType {
	/// Name of the event type as used in diagnostics.
	pub fn as_str(self) -> &'static str {
		match self {
			EventType::StartDocument => "START_DOCUMENT",
			EventType::EndDocument => "END_DOCUMENT",
			EventType::StartElement => "START_ELEMENT",
			EventType::EndElement => "END_ELEMENT",
			EventType::Text => "TEXT",
			EventType::IgnorableWhitespace => "IGNORABLE_WHITESPACE",
			EventType::CData => "CDSECT",
			EventType::Comment => "COMMENT",
			EventType::ProcessingInstruction => "PROCESSING_INSTRUCTION",
			EventType::DocType => "DOCDECL",
			EventType::EntityRef => "ENTITY_REF",
			EventType::Attribute => "ATTRIBUTE",
		}
	}

	/// Return true for events which carry no content that matters for the
	/// element structure: comments, processing instructions, ignorable
	/// whitespace and document boundaries.
	pub fn is_ignorable(self) -> bool {
		matches!(
			self,
			EventType::Comment
				| EventType::ProcessingInstruction
				| EventType::IgnorableWhitespace
				| EventType::StartDocument
				| EventType::EndDocument
				| EventType::DocType
		)
	}

	/// Return true for events which carry character data.
	pub fn is_text_element(self) -> bool {
		matches!(
			self,
			EventType::Text
				| EventType::CData
				| EventType::IgnorableWhitespace
				| EventType::EntityRef
		)
	}
}

impl fmt::Display for EventType {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Contents of the XML declaration.
///
/// Fields are `None` when the declaration (or the pseudo-attribute) is
/// absent from the document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlDeclaration {
	pub version: Option<SmartString>,
	pub encoding: Option<SmartString>,
	pub standalone: Option<bool>,
}

/// A namespace-resolved attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
	pub name: QName,
	pub value: String,
}

impl Attribute {
	pub fn new(name: QName, value: impl Into<String>) -> Attribute {
		Attribute {
			name,
			value: value.into(),
		}
	}
}

/// A start tag with its attributes and the namespace declarations made on
/// it.
///
/// `namespace_decls` holds the `xmlns` and `xmlns:*` pseudo-attributes,
/// which never appear in `attributes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartElement {
	pub name: QName,
	pub attributes: Vec<Attribute>,
	pub namespace_decls: Vec<Namespace>,
}

impl StartElement {
	pub fn new(name: QName) -> StartElement {
		StartElement {
			name,
			attributes: Vec::new(),
			namespace_decls: Vec::new(),
		}
	}

	/// Value of the attribute with the given namespace and local name.
	pub fn attribute_value(&self, namespace: &str, local_name: &str) -> Option<&str> {
		self.attributes
			.iter()
			.find(|attr| attr.name.matches(namespace, local_name))
			.map(|attr| attr.value.as_str())
	}
}

/**
A single unit of the event stream.

`Recovered` is only produced by a reader in relaxed mode: it carries an
error which was downgraded and precedes the event which was produced by
recovering from it. Its [`EventType`] is [`EventType::Comment`], so
consumers which do not care about it can treat it like a comment.
*/
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
	StartDocument(XmlDeclaration),
	EndDocument,
	StartElement(StartElement),
	EndElement(QName),
	Text(String),
	IgnorableWhitespace(String),
	CData(String),
	Comment(String),
	ProcessingInstruction { target: Name, data: String },
	DocType(String),
	EntityRef(NCName),
	Attribute(Attribute),
	Recovered(Error),
}

impl Event {
	pub fn event_type(&self) -> EventType {
		match self {
			Event::StartDocument(..) => EventType::StartDocument,
			Event::EndDocument => EventType::EndDocument,
			Event::StartElement(..) => EventType::StartElement,
			Event::EndElement(..) => EventType::EndElement,
			Event::Text(..) => EventType::Text,
			Event::IgnorableWhitespace(..) => EventType::IgnorableWhitespace,
			Event::CData(..) => EventType::CData,
			Event::Comment(..) | Event::Recovered(..) => EventType::Comment,
			Event::ProcessingInstruction { .. } => EventType::ProcessingInstruction,
			Event::DocType(..) => EventType::DocType,
			Event::EntityRef(..) => EventType::EntityRef,
			Event::Attribute(..) => EventType::Attribute,
		}
	}

	/// Name of a start or end tag.
	pub fn name(&self) -> Option<&QName> {
		match self {
			Event::StartElement(start) => Some(&start.name),
			Event::EndElement(name) => Some(name),
			Event::Attribute(attr) => Some(&attr.name),
			_ => None,
		}
	}

	/// Character content of text-like events.
	pub fn text(&self) -> Option<&str> {
		match self {
			Event::Text(s)
			| Event::IgnorableWhitespace(s)
			| Event::CData(s)
			| Event::Comment(s)
			| Event::DocType(s) => Some(s.as_str()),
			Event::ProcessingInstruction { data, .. } => Some(data.as_str()),
			Event::EntityRef(name) => Some(name.as_str()),
			_ => None,
		}
	}

	/// Return true for text events consisting only of XML whitespace, and
	/// for ignorable whitespace.
	pub fn is_whitespace(&self) -> bool {
		match self {
			Event::IgnorableWhitespace(_) => true,
			Event::Text(s) => nsxml_validation::is_whitespace_only(s),
			_ => false,
		}
	}

	/// Check that the event has the given type and, for named events, the
	/// given namespace and local name.
	///
	/// `None` for `namespace` or `local_name` matches anything.
	pub fn require(
		&self,
		kind: EventType,
		namespace: Option<&str>,
		local_name: Option<&str>,
	) -> Result<()> {
		if self.event_type() != kind {
			return Err(Error::UnexpectedEvent {
				expected: kind.as_str(),
				found: self.event_type(),
			});
		}
		if let Some(name) = self.name() {
			let ns_ok = namespace.map_or(true, |ns| name.namespace.as_str() == ns);
			let local_ok = local_name.map_or(true, |l| name.local_name.as_str() == l);
			if !ns_ok || !local_ok {
				return Err(Error::UnexpectedEvent {
					expected: "an element with a different name",
					found: self.event_type(),
				});
			}
		}
		Ok(())
	}
}
