/*!
# Input encodings

Detection follows Appendix F of XML 1.0: a byte order mark wins, otherwise
the first four bytes of `<?xm` are matched in the encodings which can
represent them, and everything else is read as UTF-8 until the XML
declaration says otherwise.
*/
use std::fmt;

/// Character encodings understood by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
	Utf8,
	Utf16Le,
	Utf16Be,
	Utf32Le,
	Utf32Be,
	/// ISO-8859-1
	Latin1,
	/// US-ASCII; bytes above 0x7f are rejected.
	Ascii,
}

impl Encoding {
	/// Resolve an encoding label as it appears in an XML declaration.
	///
	/// Labels without byte order (`UTF-16`, `UTF-32`) resolve to the big
	/// endian variant; the reader keeps the byte order it detected when such
	/// a label is declared.
	pub fn from_label(label: &str) -> Option<Encoding> {
		let label = label.trim().to_ascii_lowercase();
		match label.as_str() {
			"utf-8" | "utf8" => Some(Encoding::Utf8),
			"utf-16" | "utf16" | "utf-16be" | "ucs-2" | "iso-10646-ucs-2" => {
				Some(Encoding::Utf16Be)
			}
			"utf-16le" => Some(Encoding::Utf16Le),
			"utf-32" | "utf32" | "utf-32be" | "ucs-4" | "iso-10646-ucs-4" => {
				Some(Encoding::Utf32Be)
			}
			"utf-32le" => Some(Encoding::Utf32Le),
			"iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1" | "iso_8859-1" => {
				Some(Encoding::Latin1)
			}
			"us-ascii" | "ascii" | "ansi_x3.4-1968" => Some(Encoding::Ascii),
			_ => None,
		}
	}

	/// Canonical label of the encoding.
	pub fn name(self) -> &'static str {
		match self {
			Encoding::Utf8 => "UTF-8",
			Encoding::Utf16Le => "UTF-16LE",
			Encoding::Utf16Be => "UTF-16BE",
			Encoding::Utf32Le => "UTF-32LE",
			Encoding::Utf32Be => "UTF-32BE",
			Encoding::Latin1 => "ISO-8859-1",
			Encoding::Ascii => "US-ASCII",
		}
	}

	/// The byte order mark of this encoding, if it has one.
	pub fn bom(self) -> &'static [u8] {
		match self {
			Encoding::Utf8 => &[0xef, 0xbb, 0xbf],
			Encoding::Utf16Le => &[0xff, 0xfe],
			Encoding::Utf16Be => &[0xfe, 0xff],
			Encoding::Utf32Le => &[0xff, 0xfe, 0x00, 0x00],
			Encoding::Utf32Be => &[0x00, 0x00, 0xfe, 0xff],
			Encoding::Latin1 | Encoding::Ascii => &[],
		}
	}

	/// Return true for encodings in which `<?xml` is plain ASCII.
	pub fn is_ascii_compatible(self) -> bool {
		matches!(self, Encoding::Utf8 | Encoding::Latin1 | Encoding::Ascii)
	}

	pub(crate) fn is_utf16(self) -> bool {
		matches!(self, Encoding::Utf16Le | Encoding::Utf16Be)
	}

	pub(crate) fn is_utf32(self) -> bool {
		matches!(self, Encoding::Utf32Le | Encoding::Utf32Be)
	}
}

impl fmt::Display for Encoding {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Result of looking at the first bytes of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Sniffed {
	pub encoding: Encoding,
	/// Number of bytes occupied by the byte order mark.
	pub bom_len: usize,
	/// Whether the encoding is certain (BOM or unambiguous prefix) or just
	/// the UTF-8 fallback.
	pub certain: bool,
}

/// Guess the encoding from up to four leading bytes.
pub(crate) fn sniff(head: &[u8]) -> Sniffed {
	let with_bom = |encoding: Encoding, bom_len: usize| Sniffed {
		encoding,
		bom_len,
		certain: true,
	};
	let without_bom = |encoding: Encoding| Sniffed {
		encoding,
		bom_len: 0,
		certain: true,
	};
	match head {
		[0x00, 0x00, 0xfe, 0xff, ..] => with_bom(Encoding::Utf32Be, 4),
		[0xff, 0xfe, 0x00, 0x00, ..] => with_bom(Encoding::Utf32Le, 4),
		[0xef, 0xbb, 0xbf, ..] => with_bom(Encoding::Utf8, 3),
		[0xfe, 0xff, ..] => with_bom(Encoding::Utf16Be, 2),
		[0xff, 0xfe, ..] => with_bom(Encoding::Utf16Le, 2),
		[0x00, 0x00, 0x00, 0x3c, ..] => without_bom(Encoding::Utf32Be),
		[0x3c, 0x00, 0x00, 0x00, ..] => without_bom(Encoding::Utf32Le),
		[0x00, 0x3c, 0x00, 0x3f, ..] => without_bom(Encoding::Utf16Be),
		[0x3c, 0x00, 0x3f, 0x00, ..] => without_bom(Encoding::Utf16Le),
		_ => Sniffed {
			encoding: Encoding::Utf8,
			bom_len: 0,
			certain: false,
		},
	}
}
