/*!
# Depth-scoped namespace bindings

[`NamespaceHolder`] is the single binding stack shared by the reader, the
writer and the DOM event bridges. Bindings are added at the current depth and
discarded when that depth is left again.

The `xml` and `xmlns` prefixes are never stored; lookups special-case them.
*/
use std::fmt;

use smartstring::alias::String as SmartString;

/// Namespace URI bound to the `xml` prefix.
pub const XMLNS_XML: &str = "http://www.w3.org/XML/1998/namespace";

/// Namespace URI of `xmlns` attributes.
pub const XMLNS_XMLNS: &str = "http://www.w3.org/2000/xmlns/";

pub const PREFIX_XML: &str = "xml";
pub const PREFIX_XMLNS: &str = "xmlns";

/// A single prefix binding.
///
/// An empty `prefix` is the default namespace; an empty `uri` undeclares the
/// default namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Namespace {
	pub prefix: SmartString,
	pub uri: SmartString,
}

impl Namespace {
	pub fn new(prefix: &str, uri: &str) -> Namespace {
		Namespace {
			prefix: prefix.into(),
			uri: uri.into(),
		}
	}
}

impl fmt::Display for Namespace {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		if self.prefix.is_empty() {
			write!(f, "xmlns={:?}", self.uri)
		} else {
			write!(f, "xmlns:{}={:?}", self.prefix, self.uri)
		}
	}
}

/**
# Read-only namespace lookups

Implemented by everything which can answer prefix and URI queries for a
position in a document: the [`NamespaceHolder`] itself, the reader and
writer (at their current position), and plain lists of [`Namespace`]s.
*/
pub trait NamespaceContext {
	/// Return the URI bound to `prefix`.
	///
	/// An unbound empty prefix yields `Some("")` (the null namespace). Any
	/// other unbound prefix yields `None`.
	fn namespace_uri(&self, prefix: &str) -> Option<&str>;

	/// Return a prefix which is currently bound to `uri` and not shadowed by
	/// a more recent binding of the same prefix.
	///
	/// The null namespace (`""`) maps to the empty prefix, unless the
	/// default namespace is currently bound to something else.
	fn prefix(&self, uri: &str) -> Option<&str>;
}

pub(crate) fn fixed_uri(prefix: &str) -> Option<&'static str> {
	match prefix {
		PREFIX_XML => Some(XMLNS_XML),
		PREFIX_XMLNS => Some(XMLNS_XMLNS),
		_ => None,
	}
}

pub(crate) fn fixed_prefix(uri: &str) -> Option<&'static str> {
	match uri {
		XMLNS_XML => Some(PREFIX_XML),
		XMLNS_XMLNS => Some(PREFIX_XMLNS),
		_ => None,
	}
}

fn lookup_uri<'a>(bindings: &'a [Namespace], prefix: &str) -> Option<&'a str> {
	if let Some(uri) = fixed_uri(prefix) {
		return Some(uri);
	}
	match bindings.iter().rev().find(|ns| ns.prefix.as_str() == prefix) {
		Some(ns) => Some(ns.uri.as_str()),
		None if prefix.is_empty() => Some(""),
		None => None,
	}
}

fn lookup_prefix<'a>(bindings: &'a [Namespace], uri: &str) -> Option<&'a str> {
	if let Some(prefix) = fixed_prefix(uri) {
		return Some(prefix);
	}
	for (i, ns) in bindings.iter().enumerate().rev() {
		if ns.uri.as_str() != uri {
			continue;
		}
		let shadowed = bindings[i + 1..].iter().any(|later| later.prefix == ns.prefix);
		if !shadowed {
			return Some(ns.prefix.as_str());
		}
	}
	if uri.is_empty() && lookup_uri(bindings, "") == Some("") {
		return Some("");
	}
	None
}

impl NamespaceContext for [Namespace] {
	fn namespace_uri(&self, prefix: &str) -> Option<&str> {
		lookup_uri(self, prefix)
	}

	fn prefix(&self, uri: &str) -> Option<&str> {
		lookup_prefix(self, uri)
	}
}

impl NamespaceContext for Vec<Namespace> {
	fn namespace_uri(&self, prefix: &str) -> Option<&str> {
		lookup_uri(self, prefix)
	}

	fn prefix(&self, uri: &str) -> Option<&str> {
		lookup_prefix(self, uri)
	}
}

/**
Stack of namespace bindings indexed by element depth.

`counts[d]` is the number of bindings visible at depth `d`; `counts` always
holds `depth + 1` entries. A binding added at depth `d` is visible at all
depths `>= d` until [`NamespaceHolder::dec_depth`] leaves `d`.

```
use nsxml::NamespaceHolder;
use nsxml::namespaces::NamespaceContext;

let mut ns = NamespaceHolder::new();
ns.inc_depth();
ns.add_prefix_to_context("a", "urn:a");
ns.inc_depth();
ns.add_prefix_to_context("a", "urn:b");
assert_eq!(ns.namespace_uri("a"), Some("urn:b"));
ns.dec_depth();
assert_eq!(ns.namespace_uri("a"), Some("urn:a"));
ns.dec_depth();
assert_eq!(ns.namespace_uri("a"), None);
```
*/
#[derive(Debug, Clone)]
pub struct NamespaceHolder {
	bindings: Vec<Namespace>,
	counts: Vec<usize>,
	next_auto: usize,
}

impl Default for NamespaceHolder {
	fn default() -> Self {
		Self::new()
	}
}

impl NamespaceHolder {
	pub fn new() -> Self {
		Self {
			bindings: Vec::new(),
			counts: vec![0],
			next_auto: 0,
		}
	}

	/// Current element depth; 0 outside of the root element.
	pub fn depth(&self) -> usize {
		self.counts.len() - 1
	}

	fn visible_count(&self) -> usize {
		// counts is never empty
		self.counts[self.counts.len() - 1]
	}

	fn baseline(&self) -> usize {
		let n = self.counts.len();
		if n >= 2 {
			self.counts[n - 2]
		} else {
			0
		}
	}

	/// Number of bindings in scope, shadowed ones included.
	pub fn total_count(&self) -> usize {
		self.visible_count()
	}

	/// Enter a new element.
	pub fn inc_depth(&mut self) {
		let count = self.visible_count();
		self.counts.push(count);
	}

	/// Leave the current element, discarding all bindings added since the
	/// matching [`inc_depth`](Self::inc_depth).
	///
	/// # Panics
	///
	/// Decrementing below depth zero is a programming error and panics.
	pub fn dec_depth(&mut self) {
		if self.counts.len() <= 1 {
			panic!("NamespaceHolder::dec_depth called at depth 0");
		}
		self.counts.pop();
		let count = self.visible_count();
		self.bindings.truncate(count);
	}

	/// Bind `prefix` to `uri` at the current depth.
	///
	/// Adding a pair which is already bound at the current depth is a no-op.
	/// Callers are responsible for rejecting conflicting declarations on the
	/// same element; see [`namespace_at_current_depth`](Self::namespace_at_current_depth).
	pub fn add_prefix_to_context(&mut self, prefix: &str, uri: &str) {
		let (start, end) = (self.baseline(), self.visible_count());
		if self.bindings[start..end]
			.iter()
			.any(|ns| ns.prefix.as_str() == prefix && ns.uri.as_str() == uri)
		{
			return;
		}
		self.bindings.truncate(end);
		self.bindings.push(Namespace::new(prefix, uri));
		let last = self.counts.len() - 1;
		self.counts[last] += 1;
	}

	/// Bindings declared at the current depth, in declaration order.
	pub fn namespaces_at_current_depth(&self) -> &[Namespace] {
		&self.bindings[self.baseline()..self.visible_count()]
	}

	/// URI bound to `prefix` by a declaration at the current depth, if any.
	pub fn namespace_at_current_depth(&self, prefix: &str) -> Option<&str> {
		self.namespaces_at_current_depth()
			.iter()
			.rev()
			.find(|ns| ns.prefix.as_str() == prefix)
			.map(|ns| ns.uri.as_str())
	}

	/// All bindings in scope, oldest first, shadowed ones included.
	pub fn iter(&self) -> std::slice::Iter<'_, Namespace> {
		self.bindings[..self.visible_count()].iter()
	}

	/// The effective bindings in scope: one per prefix, the innermost one
	/// winning, in order of their first declaration.
	pub fn visible_namespaces(&self) -> Vec<Namespace> {
		let mut result: Vec<Namespace> = Vec::new();
		for ns in self.iter() {
			match result.iter_mut().find(|existing| existing.prefix == ns.prefix) {
				Some(existing) => existing.uri = ns.uri.clone(),
				None => result.push(ns.clone()),
			}
		}
		result
	}

	/// Generate a prefix which is not bound at the current position.
	pub fn next_auto_prefix(&mut self) -> SmartString {
		loop {
			self.next_auto += 1;
			let candidate: SmartString = format!("n{}", self.next_auto).into();
			if self.namespace_uri(&candidate).is_none() {
				return candidate;
			}
		}
	}

	/// Drop all bindings and return to depth zero.
	pub fn clear(&mut self) {
		self.bindings.clear();
		self.counts.clear();
		self.counts.push(0);
		self.next_auto = 0;
	}
}

impl NamespaceContext for NamespaceHolder {
	fn namespace_uri(&self, prefix: &str) -> Option<&str> {
		lookup_uri(&self.bindings[..self.visible_count()], prefix)
	}

	fn prefix(&self, uri: &str) -> Option<&str> {
		lookup_prefix(&self.bindings[..self.visible_count()], uri)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use proptest::prelude::*;

	#[test]
	fn fixed_prefixes_resolve_without_declaration() {
		let ns = NamespaceHolder::new();
		assert_eq!(ns.namespace_uri("xml"), Some(XMLNS_XML));
		assert_eq!(ns.namespace_uri("xmlns"), Some(XMLNS_XMLNS));
		assert_eq!(ns.prefix(XMLNS_XML), Some("xml"));
		assert_eq!(ns.prefix(XMLNS_XMLNS), Some("xmlns"));
		assert_eq!(ns.total_count(), 0);
	}

	#[test]
	fn unbound_default_prefix_maps_to_null_namespace() {
		let ns = NamespaceHolder::new();
		assert_eq!(ns.namespace_uri(""), Some(""));
		assert_eq!(ns.namespace_uri("foo"), None);
		assert_eq!(ns.prefix(""), Some(""));
		assert_eq!(ns.prefix("urn:x"), None);
	}

	#[test]
	fn bound_default_namespace_hides_null_namespace_prefix() {
		let mut ns = NamespaceHolder::new();
		ns.inc_depth();
		ns.add_prefix_to_context("", "urn:x");
		assert_eq!(ns.prefix(""), None);
		assert_eq!(ns.prefix("urn:x"), Some(""));
		ns.inc_depth();
		ns.add_prefix_to_context("", "");
		assert_eq!(ns.prefix(""), Some(""));
		assert_eq!(ns.prefix("urn:x"), None);
	}

	#[test]
	fn add_is_idempotent_within_depth() {
		let mut ns = NamespaceHolder::new();
		ns.inc_depth();
		ns.add_prefix_to_context("a", "urn:a");
		ns.add_prefix_to_context("a", "urn:a");
		assert_eq!(ns.namespaces_at_current_depth().len(), 1);
		ns.inc_depth();
		// same pair at a deeper level is a new binding
		ns.add_prefix_to_context("a", "urn:a");
		assert_eq!(ns.namespaces_at_current_depth().len(), 1);
		assert_eq!(ns.total_count(), 2);
	}

	#[test]
	fn reverse_lookup_skips_shadowed_prefixes() {
		let mut ns = NamespaceHolder::new();
		ns.inc_depth();
		ns.add_prefix_to_context("a", "urn:one");
		ns.inc_depth();
		ns.add_prefix_to_context("a", "urn:two");
		assert_eq!(ns.prefix("urn:one"), None);
		assert_eq!(ns.prefix("urn:two"), Some("a"));
		ns.add_prefix_to_context("b", "urn:one");
		assert_eq!(ns.prefix("urn:one"), Some("b"));
	}

	#[test]
	fn dec_depth_discards_bindings_of_left_depth() {
		let mut ns = NamespaceHolder::new();
		ns.inc_depth();
		ns.add_prefix_to_context("a", "urn:a");
		ns.inc_depth();
		ns.add_prefix_to_context("b", "urn:b");
		ns.add_prefix_to_context("c", "urn:c");
		assert_eq!(ns.depth(), 2);
		ns.dec_depth();
		assert_eq!(ns.depth(), 1);
		assert_eq!(ns.namespace_uri("b"), None);
		assert_eq!(ns.namespace_uri("c"), None);
		assert_eq!(ns.namespace_uri("a"), Some("urn:a"));
		assert_eq!(ns.namespaces_at_current_depth(), &[Namespace::new("a", "urn:a")][..]);
	}

	#[test]
	#[should_panic]
	fn dec_depth_below_zero_panics() {
		let mut ns = NamespaceHolder::new();
		ns.dec_depth();
	}

	#[test]
	fn auto_prefix_avoids_bound_prefixes() {
		let mut ns = NamespaceHolder::new();
		ns.inc_depth();
		ns.add_prefix_to_context("n1", "urn:taken");
		ns.add_prefix_to_context("n2", "urn:taken-too");
		assert_eq!(ns.next_auto_prefix(), "n3");
		assert_eq!(ns.next_auto_prefix(), "n4");
	}

	#[test]
	fn visible_namespaces_collapses_shadowed_bindings() {
		let mut ns = NamespaceHolder::new();
		ns.inc_depth();
		ns.add_prefix_to_context("a", "urn:a");
		ns.add_prefix_to_context("", "urn:d");
		ns.inc_depth();
		ns.add_prefix_to_context("a", "urn:a2");
		assert_eq!(
			ns.visible_namespaces(),
			vec![Namespace::new("a", "urn:a2"), Namespace::new("", "urn:d")]
		);
	}

	#[test]
	fn clear_resets_everything() {
		let mut ns = NamespaceHolder::new();
		ns.inc_depth();
		ns.add_prefix_to_context("a", "urn:a");
		ns.next_auto_prefix();
		ns.clear();
		assert_eq!(ns.depth(), 0);
		assert_eq!(ns.total_count(), 0);
		assert_eq!(ns.next_auto_prefix(), "n1");
	}

	#[test]
	fn namespace_lists_answer_lookups() {
		let list = vec![Namespace::new("p", "urn:p"), Namespace::new("p", "urn:q")];
		assert_eq!(list.namespace_uri("p"), Some("urn:q"));
		assert_eq!(list.prefix("urn:p"), None);
		assert_eq!(list.prefix("urn:q"), Some("p"));
	}

	proptest! {
		#[test]
		fn bindings_are_visible_exactly_while_in_scope(
			levels in proptest::collection::vec(
				proptest::collection::vec((0usize..4, 0usize..4), 0..4),
				1..6,
			)
		) {
			let prefixes = ["a", "b", "c", ""];
			let uris = ["urn:0", "urn:1", "urn:2", "urn:3"];
			let mut ns = NamespaceHolder::new();
			let mut model: Vec<Vec<(usize, usize)>> = Vec::new();
			for level in levels.iter() {
				ns.inc_depth();
				for &(p, u) in level.iter() {
					ns.add_prefix_to_context(prefixes[p], uris[u]);
				}
				model.push(level.clone());
			}
			while !model.is_empty() {
				for (pi, prefix) in prefixes.iter().enumerate() {
					let expected = model
						.iter()
						.flat_map(|lvl| lvl.iter())
						.filter(|(p, _)| *p == pi)
						.last()
						.map(|(_, u)| uris[*u]);
					let expected = match (expected, prefix.is_empty()) {
						(None, true) => Some(""),
						(other, _) => other,
					};
					prop_assert_eq!(ns.namespace_uri(prefix), expected);
				}
				ns.dec_depth();
				model.pop();
			}
			prop_assert_eq!(ns.depth(), 0);
			prop_assert_eq!(ns.total_count(), 0);
		}
	}
}
