/*!
# Strongly-typed strings for XML names

- [`Name`] represents the `Name` production and is used for names before
  namespace prefix expansion (raw element and attribute names, processing
  instruction targets, entity names).
- [`NCName`] represents the `Name` production without colons; it is used for
  local names and prefixes.
- [`QName`] is the resolved triple of namespace URI, local name and prefix
  which the reader reports and the writer and DOM consume.

Owned values are constructed through [`std::convert::TryFrom`] from [`str`],
[`String`] and [`smartstring::alias::String`]. [`NCName`] converts to
[`Name`] without extra checking.
*/
use std::borrow::Borrow;
use std::convert::TryFrom;
use std::fmt;
use std::ops::Deref;

use smartstring::alias::String as SmartString;

use nsxml_validation::{validate_name, validate_ncname, Error as ValidationError};

use crate::errctx;
use crate::error::{Error, NWFError, WFError};

macro_rules! xml_string_type {
	(
		$(#[$outer:meta])*
		pub struct $name:ident use $check:ident;
	) => {
		$(#[$outer])*
		#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
		#[repr(transparent)]
		pub struct $name(SmartString);

		impl $name {
			/// Extract the inner string and return it.
			pub fn into_inner(self) -> SmartString {
				self.0
			}

			/// Obtain a reference to the inner string slice.
			pub fn as_str(&self) -> &str {
				self.0.as_str()
			}

			/// Construct the value without checking it.
			///
			/// Only for use with text that was already validated, e.g. by
			/// the reader's tokenizer. Passing unchecked text does not cause
			/// undefined behaviour, but may lead to malformed output.
			pub(crate) fn from_validated<T: Into<SmartString>>(s: T) -> Self {
				Self(s.into())
			}
		}

		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				self.0.as_str()
			}
		}

		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				self.0.as_str()
			}
		}

		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				self.0.as_str()
			}
		}

		impl fmt::Display for $name {
			fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
				f.write_str(self.0.as_str())
			}
		}

		impl PartialEq<str> for $name {
			fn eq(&self, other: &str) -> bool {
				self.0.as_str() == other
			}
		}

		impl PartialEq<&str> for $name {
			fn eq(&self, other: &&str) -> bool {
				self.0.as_str() == *other
			}
		}

		impl PartialEq<$name> for str {
			fn eq(&self, other: &$name) -> bool {
				self == other.0.as_str()
			}
		}

		impl PartialEq<$name> for &str {
			fn eq(&self, other: &$name) -> bool {
				*self == other.0.as_str()
			}
		}

		impl From<$name> for SmartString {
			fn from(other: $name) -> Self {
				other.0
			}
		}

		impl From<$name> for String {
			fn from(other: $name) -> Self {
				other.0.into()
			}
		}

		impl TryFrom<SmartString> for $name {
			type Error = Error;

			fn try_from(other: SmartString) -> Result<Self, Self::Error> {
				$check(&other)?;
				Ok(Self(other))
			}
		}

		impl TryFrom<String> for $name {
			type Error = Error;

			fn try_from(other: String) -> Result<Self, Self::Error> {
				$check(&other)?;
				Ok(Self(other.into()))
			}
		}

		impl TryFrom<&str> for $name {
			type Error = Error;

			fn try_from(other: &str) -> Result<Self, Self::Error> {
				$check(other)?;
				Ok(Self(other.into()))
			}
		}
	};
}

fn check_name(s: &str) -> Result<(), Error> {
	match validate_name(s) {
		Ok(()) => Ok(()),
		Err(ValidationError::InvalidChar(ch)) => {
			Err(WFError::UnexpectedChar(errctx::ERRCTX_NAME, ch, None).into())
		}
		Err(ValidationError::EmptyName) => Err(WFError::InvalidSyntax(errctx::ERRCTX_NAME).into()),
	}
}

fn check_ncname(s: &str) -> Result<(), Error> {
	match validate_ncname(s) {
		Ok(()) => Ok(()),
		Err(ValidationError::InvalidChar(':')) => {
			Err(NWFError::MultiColonName(errctx::ERRCTX_NAME).into())
		}
		Err(ValidationError::InvalidChar(ch)) => {
			Err(WFError::UnexpectedChar(errctx::ERRCTX_NAME, ch, None).into())
		}
		Err(ValidationError::EmptyName) => Err(NWFError::EmptyNamePart(errctx::ERRCTX_NAME).into()),
	}
}

xml_string_type! {
	/// String which conforms to the Name production of XML 1.0.
	///
	/// Names may contain colons; [`Name::split_name`] splits them into prefix
	/// and local name according to Namespaces in XML 1.0.
	pub struct Name use check_name;
}

xml_string_type! {
	/// String which conforms to the NCName production of Namespaces in XML
	/// 1.0.
	pub struct NCName use check_ncname;
}

impl Name {
	/// Split the name at its colon into an optional prefix and a local name.
	///
	/// # Errors
	///
	/// Fails with a namespace-well-formedness error if the name contains
	/// more than one colon, if either side of the colon is empty, or if the
	/// local name does not start with a name start character.
	pub fn split_name(&self) -> Result<(Option<NCName>, NCName), NWFError> {
		let mut parts = self.0.splitn(3, ':');
		let first = parts.next().unwrap_or("");
		let second = parts.next();
		if parts.next().is_some() {
			return Err(NWFError::MultiColonName(errctx::ERRCTX_NAME));
		}
		match second {
			None => Ok((None, NCName(self.0.clone()))),
			Some(local) => {
				if first.is_empty() || local.is_empty() {
					return Err(NWFError::EmptyNamePart(errctx::ERRCTX_NAME));
				}
				if validate_ncname(local).is_err() {
					return Err(NWFError::InvalidLocalName(errctx::ERRCTX_NAME));
				}
				Ok((Some(NCName(first.into())), NCName(local.into())))
			}
		}
	}
}

impl NCName {
	/// Compose `self:suffix` as a [`Name`].
	pub fn with_suffix(&self, suffix: &NCName) -> Name {
		let mut s = SmartString::new();
		s.push_str(&self.0);
		s.push(':');
		s.push_str(&suffix.0);
		Name(s)
	}
}

impl From<NCName> for Name {
	fn from(other: NCName) -> Self {
		Name(other.0)
	}
}

/**
Namespace-resolved name.

An empty `namespace` denotes the null namespace, an empty `prefix` the
default (unprefixed) form. Both are plain strings so that the same type can
describe reader output, writer input and DOM nodes.

The [`fmt::Display`] implementation uses Clark notation (`{uri}local`).
*/
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QName {
	pub namespace: SmartString,
	pub local_name: SmartString,
	pub prefix: SmartString,
}

impl QName {
	/// Unprefixed name in the given namespace.
	pub fn new(namespace: &str, local_name: &str) -> QName {
		QName {
			namespace: namespace.into(),
			local_name: local_name.into(),
			prefix: SmartString::new(),
		}
	}

	/// Name without namespace.
	pub fn local(local_name: &str) -> QName {
		QName::new("", local_name)
	}

	pub fn with_prefix(namespace: &str, local_name: &str, prefix: &str) -> QName {
		QName {
			namespace: namespace.into(),
			local_name: local_name.into(),
			prefix: prefix.into(),
		}
	}

	/// Compare namespace and local name, ignoring the prefix.
	pub fn matches(&self, namespace: &str, local_name: &str) -> bool {
		self.namespace.as_str() == namespace && self.local_name.as_str() == local_name
	}

	/// Compare namespace and local name of two names, ignoring the prefix.
	pub fn same_name(&self, other: &QName) -> bool {
		self.matches(&other.namespace, &other.local_name)
	}

	/// The name as it appears in markup: `prefix:local` or `local`.
	pub fn qualified_name(&self) -> String {
		if self.prefix.is_empty() {
			self.local_name.to_string()
		} else {
			format!("{}:{}", self.prefix, self.local_name)
		}
	}
}

impl fmt::Display for QName {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		if self.namespace.is_empty() {
			f.write_str(&self.local_name)
		} else {
			write!(f, "{{{}}}{}", self.namespace, self.local_name)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn split_name_on_unprefixed_name() {
		let nm = Name::try_from("foobar").unwrap();
		let (prefix, localname) = nm.split_name().unwrap();
		assert!(prefix.is_none());
		assert_eq!(localname, "foobar");
	}

	#[test]
	fn split_name_on_prefixed_name() {
		let nm = Name::try_from("foo:bar").unwrap();
		let (prefix, localname) = nm.split_name().unwrap();
		assert_eq!(prefix.unwrap(), "foo");
		assert_eq!(localname, "bar");
	}

	#[test]
	fn split_name_rejects_multiple_colons() {
		let nm = Name::try_from("foo:bar:baz").unwrap();
		match nm.split_name() {
			Err(NWFError::MultiColonName(_)) => (),
			other => panic!("unexpected split result: {:?}", other),
		}
	}

	#[test]
	fn split_name_rejects_empty_parts() {
		for s in &[":bar", "foo:"] {
			let nm = Name::try_from(*s).unwrap();
			match nm.split_name() {
				Err(NWFError::EmptyNamePart(_)) => (),
				other => panic!("unexpected split result for {:?}: {:?}", s, other),
			}
		}
	}

	#[test]
	fn split_name_rejects_local_name_with_digit_start() {
		let nm = Name::try_from("foo:1bar").unwrap();
		match nm.split_name() {
			Err(NWFError::InvalidLocalName(_)) => (),
			other => panic!("unexpected split result: {:?}", other),
		}
	}

	#[test]
	fn ncname_rejects_colon() {
		match NCName::try_from("foo:bar") {
			Err(Error::NotNamespaceWellFormed(NWFError::MultiColonName(_))) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn name_rejects_space() {
		match Name::try_from("foo bar") {
			Err(Error::NotWellFormed(WFError::UnexpectedChar(_, ' ', _))) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn ncname_with_suffix_builds_qualified_name() {
		let prefix = NCName::try_from("p").unwrap();
		let local = NCName::try_from("x").unwrap();
		assert_eq!(prefix.with_suffix(&local), "p:x");
	}

	#[test]
	fn qname_display_uses_clark_notation() {
		assert_eq!(format!("{}", QName::with_prefix("urn:a", "b", "p")), "{urn:a}b");
		assert_eq!(format!("{}", QName::local("b")), "b");
		assert_eq!(QName::with_prefix("urn:a", "b", "p").qualified_name(), "p:b");
	}

	#[test]
	fn qname_matching_ignores_prefix() {
		let a = QName::with_prefix("urn:a", "b", "p");
		let b = QName::with_prefix("urn:a", "b", "q");
		assert!(a.same_name(&b));
		assert_ne!(a, b);
	}
}
