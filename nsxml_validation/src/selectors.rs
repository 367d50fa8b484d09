/*!
# Codepoint classes of the XML 1.0 grammar

Implementation details of `nsxml`; the exact set of exported items may change.
*/
use std::fmt;

/// Predicate over chars.
pub trait CharSelector {
	/// Return true if the given char belongs to the class.
	fn select(&self, c: char) -> bool;
}

impl CharSelector for char {
	fn select(&self, c: char) -> bool {
		*self == c
	}
}

impl CharSelector for &'_ [char] {
	fn select(&self, c: char) -> bool {
		self.contains(&c)
	}
}

/// Inclusive range of codepoints.
///
/// Both ends are included because some of the edge points of the grammar are
/// not representable as `char` when used as exclusive bounds.
#[derive(Debug, Clone, Copy)]
pub struct CodepointRange(pub char, pub char);

impl CodepointRange {
	pub fn contains(&self, c: char) -> bool {
		(self.0 <= c) && (c <= self.1)
	}
}

impl CharSelector for CodepointRange {
	fn select(&self, c: char) -> bool {
		self.contains(c)
	}
}

/// Union of several [`CodepointRange`]s.
#[derive(Clone, Copy)]
pub struct CodepointRanges(pub &'static [CodepointRange]);

impl CharSelector for CodepointRanges {
	fn select(&self, c: char) -> bool {
		self.0.iter().any(|r| r.contains(c))
	}
}

impl fmt::Debug for CodepointRanges {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		write!(f, "CodepointRanges(<{} ranges>)", self.0.len())
	}
}

/// `Char` (XML 1.0 § 2.2)
pub const VALID_XML_CDATA_RANGES: &[CodepointRange] = &[
	CodepointRange('\x09', '\x0a'),
	CodepointRange('\x0d', '\x0d'),
	CodepointRange('\u{0020}', '\u{d7ff}'),
	CodepointRange('\u{e000}', '\u{fffd}'),
	CodepointRange('\u{10000}', '\u{10ffff}'),
];

/// Complement of [`VALID_XML_CDATA_RANGES`], restricted to Rust `char`s
/// (surrogates cannot occur).
pub const INVALID_XML_CDATA_RANGES: &[CodepointRange] = &[
	CodepointRange('\x00', '\x08'),
	CodepointRange('\x0b', '\x0c'),
	CodepointRange('\x0e', '\x1f'),
	CodepointRange('\u{fffe}', '\u{ffff}'),
];

const NAME_START_RANGES: &[CodepointRange] = &[
	CodepointRange(':', ':'),
	CodepointRange('A', 'Z'),
	CodepointRange('_', '_'),
	CodepointRange('a', 'z'),
	CodepointRange('\u{c0}', '\u{d6}'),
	CodepointRange('\u{d8}', '\u{f6}'),
	CodepointRange('\u{f8}', '\u{2ff}'),
	CodepointRange('\u{370}', '\u{37d}'),
	CodepointRange('\u{37f}', '\u{1fff}'),
	CodepointRange('\u{200c}', '\u{200d}'),
	CodepointRange('\u{2070}', '\u{218f}'),
	CodepointRange('\u{2c00}', '\u{2fef}'),
	CodepointRange('\u{3001}', '\u{d7ff}'),
	CodepointRange('\u{f900}', '\u{fdcf}'),
	CodepointRange('\u{fdf0}', '\u{fffd}'),
	CodepointRange('\u{10000}', '\u{effff}'),
];

const NAME_RANGES: &[CodepointRange] = &[
	CodepointRange(':', ':'),
	CodepointRange('-', '.'),
	CodepointRange('0', '9'),
	CodepointRange('A', 'Z'),
	CodepointRange('_', '_'),
	CodepointRange('a', 'z'),
	CodepointRange('\u{b7}', '\u{b7}'),
	CodepointRange('\u{c0}', '\u{d6}'),
	CodepointRange('\u{d8}', '\u{f6}'),
	CodepointRange('\u{f8}', '\u{37d}'),
	CodepointRange('\u{37f}', '\u{1fff}'),
	CodepointRange('\u{200c}', '\u{200d}'),
	CodepointRange('\u{203f}', '\u{2040}'),
	CodepointRange('\u{2070}', '\u{218f}'),
	CodepointRange('\u{2c00}', '\u{2fef}'),
	CodepointRange('\u{3001}', '\u{d7ff}'),
	CodepointRange('\u{f900}', '\u{fdcf}'),
	CodepointRange('\u{fdf0}', '\u{fffd}'),
	CodepointRange('\u{10000}', '\u{effff}'),
];

const SPACE_RANGES: &[CodepointRange] = &[
	CodepointRange('\t', '\n'),
	CodepointRange('\r', '\r'),
	CodepointRange(' ', ' '),
];

/// `NameChar` (XML 1.0 § 2.3 \[4a\])
pub static CLASS_XML_NAME: CodepointRanges = CodepointRanges(NAME_RANGES);

/// `NameStartChar` (XML 1.0 § 2.3 \[4\])
pub static CLASS_XML_NAMESTART: CodepointRanges = CodepointRanges(NAME_START_RANGES);

/// Chars which must never appear in a document, see [`INVALID_XML_CDATA_RANGES`].
pub static CLASS_XML_NONCHAR: CodepointRanges = CodepointRanges(INVALID_XML_CDATA_RANGES);

/// `S` (XML 1.0 § 2.3 \[3\])
pub static CLASS_XML_SPACES: CodepointRanges = CodepointRanges(SPACE_RANGES);

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cdata_inclusion_and_exclusion_are_equivalent() {
		let excluder = CodepointRanges(INVALID_XML_CDATA_RANGES);
		let includer = CodepointRanges(VALID_XML_CDATA_RANGES);
		for cp in 0x0..=0x10ffffu32 {
			if let Some(ch) = std::char::from_u32(cp) {
				if includer.select(ch) == excluder.select(ch) {
					panic!("cdata class tables disagree about U+{:x}", cp)
				}
			}
		}
	}

	#[test]
	fn name_start_is_subset_of_name() {
		for cp in 0x0..=0x10ffffu32 {
			if let Some(ch) = std::char::from_u32(cp) {
				if CLASS_XML_NAMESTART.select(ch) && !CLASS_XML_NAME.select(ch) {
					panic!("U+{:x} may start a name but not continue it", cp)
				}
			}
		}
	}

	#[test]
	fn digits_and_combining_marks_cannot_start_names() {
		assert!(!CLASS_XML_NAMESTART.select('0'));
		assert!(!CLASS_XML_NAMESTART.select('-'));
		assert!(!CLASS_XML_NAMESTART.select('\u{300}'));
		assert!(CLASS_XML_NAME.select('\u{300}'));
		assert!(CLASS_XML_NAME.select('\u{b7}'));
	}
}
