/*!
Namespace bookkeeping shared by [`XmlWriter`](super::XmlWriter) and
[`DomWriter`](crate::dom::DomWriter).

The writers only differ in how a declaration or attribute ends up in their
output; prefix selection, repair and the validation of declarations live
here.
*/
use smartstring::alias::String as SmartString;

use crate::error::{NWFError, Result, WriteError};
use crate::namespaces::{Namespace, NamespaceContext, NamespaceHolder, XMLNS_XML, XMLNS_XMLNS};

use super::check_ncname;

/**
Pick the prefix for an element in `namespace`.

`declarations` are the declarations made on the element itself; they take
effect before the choice is made. In order of preference:

1. the requested prefix, if the element's own declarations bind it to
   `namespace`
2. a prefix bound to `namespace` which the declarations do not rebind
3. the requested prefix, unless the declarations bind it elsewhere

`None` means that a fresh prefix has to be allocated.
*/
pub(crate) fn element_prefix<C: NamespaceContext + ?Sized>(
	scope: &C,
	namespace: &str,
	requested: Option<&str>,
	declarations: &[Namespace],
) -> Option<SmartString> {
	if namespace.is_empty() {
		return Some(SmartString::new());
	}
	let declared = |prefix: &str| {
		declarations
			.iter()
			.rev()
			.find(|ns| ns.prefix.as_str() == prefix)
			.map(|ns| ns.uri.as_str())
	};
	if let Some(requested) = requested {
		if declared(requested) == Some(namespace) {
			return Some(requested.into());
		}
	}
	let own = declarations
		.iter()
		.find(|ns| ns.uri.as_str() == namespace && declared(&ns.prefix) == Some(namespace));
	if let Some(ns) = own {
		return Some(ns.prefix.clone());
	}
	if let Some(inherited) = scope.prefix(namespace) {
		if declared(inherited).is_none() {
			return Some(inherited.into());
		}
	}
	match requested {
		Some(requested) if declared(requested).is_none() => Some(requested.into()),
		_ => None,
	}
}

/// Namespace scope of a writer, plus the prefixes the open start tag
/// depends on.
#[derive(Debug, Clone)]
pub(crate) struct WriterScope {
	namespaces: NamespaceHolder,
	/// (prefix, namespace) pairs used by the open start tag's name and the
	/// attributes written so far.
	pinned: Vec<Namespace>,
	repair: bool,
}

impl WriterScope {
	pub(crate) fn new(namespaces: NamespaceHolder, repair: bool) -> WriterScope {
		WriterScope {
			namespaces,
			pinned: Vec::new(),
			repair,
		}
	}

	pub(crate) fn repair(&self) -> bool {
		self.repair
	}

	pub(crate) fn set_repair(&mut self, v: bool) {
		self.repair = v;
	}

	pub(crate) fn depth(&self) -> usize {
		self.namespaces.depth()
	}

	pub(crate) fn holder(&self) -> &NamespaceHolder {
		&self.namespaces
	}

	/// Prefix for a new element, allocating one if nothing fits.
	pub(crate) fn choose_element_prefix(
		&mut self,
		namespace: &str,
		requested: Option<&str>,
		declarations: &[Namespace],
	) -> SmartString {
		match element_prefix(&self.namespaces, namespace, requested, declarations) {
			Some(prefix) => prefix,
			None => {
				let prefix = self.namespaces.next_auto_prefix();
				log::trace!("allocated prefix {:?} for {:?}", prefix, namespace);
				prefix
			}
		}
	}

	/// Enter an element named with `prefix` in `namespace`.
	pub(crate) fn open(&mut self, namespace: &str, prefix: &str) {
		self.namespaces.inc_depth();
		self.pinned.clear();
		self.pinned.push(Namespace::new(prefix, namespace));
	}

	/// No more declarations can be made for the current start tag.
	pub(crate) fn seal(&mut self) {
		self.pinned.clear();
	}

	pub(crate) fn close(&mut self) {
		self.pinned.clear();
		self.namespaces.dec_depth();
	}

	pub(crate) fn clear(&mut self) {
		self.pinned.clear();
		self.namespaces.clear();
	}

	/// The declaration an element still needs after its own declarations
	/// have been made, if repairing.
	pub(crate) fn missing_element_binding(&self, namespace: &str, prefix: &str) -> Option<Namespace> {
		if !self.repair {
			return None;
		}
		if namespace.is_empty() {
			// an inherited default namespace would capture the element
			if prefix.is_empty() && self.namespaces.namespace_uri("") != Some("") {
				log::trace!("undeclaring default namespace");
				return Some(Namespace::new("", ""));
			}
			None
		} else if self.namespaces.namespace_uri(prefix) != Some(namespace) {
			log::trace!("declaring prefix {:?} for {:?}", prefix, namespace);
			Some(Namespace::new(prefix, namespace))
		} else {
			None
		}
	}

	/// Non-empty prefix bound to `uri` in scope.
	fn attribute_prefix_for(&self, uri: &str) -> Option<SmartString> {
		self.namespaces
			.iter()
			.rev()
			.filter(|ns| !ns.prefix.is_empty() && ns.uri.as_str() == uri)
			.find(|ns| self.namespaces.namespace_uri(&ns.prefix) == Some(uri))
			.map(|ns| ns.prefix.clone())
	}

	/**
	Prefix for an attribute in `namespace`.

	The second element is the declaration the writer has to make before
	writing the attribute, when repairing. The prefix is pinned for the rest
	of the start tag.
	*/
	pub(crate) fn attribute_prefix(
		&mut self,
		namespace: &str,
		requested: &str,
	) -> (SmartString, Option<Namespace>) {
		if namespace.is_empty() {
			return (SmartString::new(), None);
		}
		let mut declaration = None;
		let actual: SmartString = if !requested.is_empty()
			&& self.namespaces.namespace_uri(requested) == Some(namespace)
		{
			requested.into()
		} else if let Some(existing) = self.attribute_prefix_for(namespace) {
			existing
		} else if self.repair {
			let usable = !requested.is_empty()
				&& self.namespaces.namespace_at_current_depth(requested).is_none()
				&& !self.pinned.iter().any(|ns| ns.prefix.as_str() == requested);
			let chosen: SmartString = if usable {
				requested.into()
			} else {
				self.namespaces.next_auto_prefix()
			};
			log::trace!("declaring prefix {:?} for attribute namespace {:?}", chosen, namespace);
			declaration = Some(Namespace::new(&chosen, namespace));
			chosen
		} else {
			requested.into()
		};
		if !actual.is_empty() {
			self.pinned.push(Namespace::new(&actual, namespace));
		}
		(actual, declaration)
	}

	/**
	Validate and record the declaration of `prefix` on the open start tag.

	Returns false if an identical declaration was already made there, which
	is tolerated when repairing. Rebinding a prefix the start tag already
	uses for its name or an attribute fails with
	[`WriteError::NamespaceConflict`].
	*/
	pub(crate) fn declare(&mut self, prefix: &str, uri: &str) -> Result<bool> {
		if prefix == "xmlns" || (prefix == "xml") != (uri == XMLNS_XML) || uri == XMLNS_XMLNS {
			return Err(WriteError::ReservedNamespace(prefix.into()).into());
		}
		if !prefix.is_empty() {
			check_ncname(prefix)?;
			if uri.is_empty() {
				return Err(NWFError::EmptyNamespaceUri.into());
			}
		}
		let existing = self
			.namespaces
			.namespace_at_current_depth(prefix)
			.map(|existing| existing == uri);
		match existing {
			Some(true) if self.repair => return Ok(false),
			Some(true) => return Err(WriteError::DuplicateNamespace(prefix.into()).into()),
			Some(false) => return Err(WriteError::NamespaceConflict(prefix.into()).into()),
			None => (),
		}
		let moves_pinned = self
			.pinned
			.iter()
			.any(|ns| ns.prefix.as_str() == prefix && ns.uri.as_str() != uri);
		if moves_pinned {
			return Err(WriteError::NamespaceConflict(prefix.into()).into());
		}
		self.namespaces.add_prefix_to_context(prefix, uri);
		Ok(true)
	}
}

impl NamespaceContext for WriterScope {
	fn namespace_uri(&self, prefix: &str) -> Option<&str> {
		self.namespaces.namespace_uri(prefix)
	}

	fn prefix(&self, uri: &str) -> Option<&str> {
		self.namespaces.prefix(uri)
	}
}
