/*!
# Validators for XML 1.0 strings

Supplementary crate for `nsxml`. It holds the codepoint classes of the XML
1.0 grammar and a few validators built on top of them, so that the tables can
be shared between the reader, the writer and the DOM.
*/
use std::fmt;

pub mod selectors;

use selectors::CharSelector;

/**
Error condition from validating an XML string.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
	/// A Name or NCName was empty.
	EmptyName,
	/// A character outside the allowed class was encountered.
	InvalidChar(char),
}

impl fmt::Display for Error {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::EmptyName => f.write_str("Name and NCName must not be empty"),
			Self::InvalidChar(c) => write!(f, "character U+{:04x} is not allowed", *c as u32),
		}
	}
}

impl std::error::Error for Error {}

fn validate_with(s: &str, allow_colon: bool) -> Result<(), Error> {
	let mut chars = s.chars();
	match chars.next() {
		None => return Err(Error::EmptyName),
		Some(c) => {
			if !selectors::CLASS_XML_NAMESTART.select(c) || (!allow_colon && c == ':') {
				return Err(Error::InvalidChar(c));
			}
		}
	}
	for ch in chars {
		if !selectors::CLASS_XML_NAME.select(ch) || (!allow_colon && ch == ':') {
			return Err(Error::InvalidChar(ch));
		}
	}
	Ok(())
}

/**
Check whether a str is a valid XML 1.0 Name

# Example

```rust
use nsxml_validation::{validate_name, Error};

assert!(validate_name("foobar").is_ok());
assert!(validate_name("foo:bar").is_ok());
assert!(matches!(validate_name("foo bar"), Err(Error::InvalidChar(' '))));
assert!(matches!(validate_name(""), Err(Error::EmptyName)));
```
*/
pub fn validate_name(s: &str) -> Result<(), Error> {
	validate_with(s, true)
}

/**
Check whether a str is a valid XML 1.0 Name without colons (an NCName from
Namespaces in XML 1.0).

# Example

```rust
use nsxml_validation::{validate_ncname, Error};

assert!(validate_ncname("foobar").is_ok());
assert!(matches!(validate_ncname("foo:bar"), Err(Error::InvalidChar(':'))));
```
*/
pub fn validate_ncname(s: &str) -> Result<(), Error> {
	validate_with(s, false)
}

/**
Check whether all chars of a str are XML 1.0 `Char`s.

# Example

```rust
use nsxml_validation::{validate_cdata, Error};

assert!(validate_cdata("foo bar baz <fnord!>").is_ok());
assert!(matches!(validate_cdata("\x01"), Err(Error::InvalidChar('\x01'))));
```
*/
pub fn validate_cdata(s: &str) -> Result<(), Error> {
	match s.chars().find(|ch| selectors::CLASS_XML_NONCHAR.select(*ch)) {
		Some(ch) => Err(Error::InvalidChar(ch)),
		None => Ok(()),
	}
}

/// Return true if `ch` matches the `S` production (space, tab, CR, LF).
#[inline]
pub fn is_xml_whitespace(ch: char) -> bool {
	selectors::CLASS_XML_SPACES.select(ch)
}

/// Return true if the string is empty or consists only of XML whitespace.
pub fn is_whitespace_only(s: &str) -> bool {
	s.chars().all(is_xml_whitespace)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cdata_rejects_nonchars() {
		assert!(validate_cdata("foo bar baz http://<xyz>").is_ok());
		assert!(validate_cdata("\u{ffff}").is_err());
		assert!(validate_cdata("\x0b").is_err());
	}

	#[test]
	fn name_accepts_colons() {
		assert!(validate_name("foobar").is_ok());
		assert!(validate_name("foo:bar").is_ok());
		assert!(validate_name(":x").is_ok());
		assert!(validate_name("").is_err());
		assert!(validate_name("1abc").is_err());
		assert!(validate_name("foo bar").is_err());
	}

	#[test]
	fn ncname_rejects_colons() {
		assert!(validate_ncname("foobar").is_ok());
		assert!(validate_ncname("a-b.c_d1").is_ok());
		assert!(validate_ncname("foo:bar").is_err());
		assert!(validate_ncname(":foo").is_err());
		assert!(validate_ncname("").is_err());
	}

	#[test]
	fn whitespace_class() {
		assert!(is_xml_whitespace(' '));
		assert!(is_xml_whitespace('\t'));
		assert!(is_xml_whitespace('\r'));
		assert!(is_xml_whitespace('\n'));
		assert!(!is_xml_whitespace('\u{a0}'));
		assert!(is_whitespace_only(" \n\t"));
		assert!(is_whitespace_only(""));
		assert!(!is_whitespace_only(" x "));
	}
}
