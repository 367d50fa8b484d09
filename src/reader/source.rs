/*!
# Decoded character source

[`CharSource`] turns the bytes of a [`std::io::BufRead`] into XML chars:
it decodes, normalizes line endings (`\r\n` and lone `\r` become `\n`),
rejects codepoints outside the XML `Char` production and tracks the
[`Location`] of the next char.
*/
use std::collections::VecDeque;
use std::io;

use nsxml_validation::selectors::{CharSelector, CLASS_XML_NONCHAR};

use super::encoding::{sniff, Encoding, Sniffed};
use crate::errctx::*;
use crate::error::{Error, Location, Result, WFError};

pub(crate) struct CharSource<R> {
	inner: R,
	encoding: Encoding,
	/// Bytes read ahead for sniffing, drained before `inner`.
	bytes: VecDeque<u8>,
	/// Decoded char held back by CRLF folding.
	held: Option<char>,
	/// Normalized chars peeked but not consumed.
	lookahead: VecDeque<char>,
	loc: Location,
}

impl<R: io::BufRead> CharSource<R> {
	pub(crate) fn new(inner: R) -> Self {
		Self {
			inner,
			encoding: Encoding::Utf8,
			bytes: VecDeque::new(),
			held: None,
			lookahead: VecDeque::new(),
			loc: Location::START,
		}
	}

	pub(crate) fn encoding(&self) -> Encoding {
		self.encoding
	}

	pub(crate) fn location(&self) -> Location {
		self.loc
	}

	pub(crate) fn into_inner(self) -> R {
		self.inner
	}

	/// Determine the encoding and skip the byte order mark.
	///
	/// With `forced` set, detection is skipped, but a byte order mark of the
	/// forced encoding is still removed. Returns the sniffing result.
	pub(crate) fn detect(&mut self, forced: Option<Encoding>) -> Result<Sniffed> {
		while self.bytes.len() < 4 {
			match self.read_raw_byte()? {
				Some(b) => self.bytes.push_back(b),
				None => break,
			}
		}
		let head: Vec<u8> = self.bytes.iter().copied().collect();
		let sniffed = match forced {
			Some(encoding) => {
				let bom = encoding.bom();
				let bom_len = if !bom.is_empty() && head.starts_with(bom) {
					bom.len()
				} else {
					0
				};
				Sniffed {
					encoding,
					bom_len,
					certain: true,
				}
			}
			None => sniff(&head),
		};
		for _ in 0..sniffed.bom_len {
			self.bytes.pop_front();
		}
		self.encoding = sniffed.encoding;
		log::debug!(
			"input encoding {} (bom: {}, certain: {})",
			sniffed.encoding,
			sniffed.bom_len > 0,
			sniffed.certain
		);
		Ok(sniffed)
	}

	/// Switch to another encoding after the XML declaration was read.
	///
	/// Only valid while nothing beyond the declaration has been decoded.
	pub(crate) fn switch_encoding(&mut self, encoding: Encoding) {
		debug_assert!(self.lookahead.is_empty());
		debug_assert!(self.held.is_none());
		self.encoding = encoding;
	}

	fn read_raw_byte(&mut self) -> Result<Option<u8>> {
		loop {
			let buf = match self.inner.fill_buf() {
				Ok(buf) => buf,
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => return Err(Error::io(e)),
			};
			if buf.is_empty() {
				return Ok(None);
			}
			let b = buf[0];
			self.inner.consume(1);
			return Ok(Some(b));
		}
	}

	fn read_byte(&mut self) -> Result<Option<u8>> {
		match self.bytes.pop_front() {
			Some(b) => Ok(Some(b)),
			None => self.read_raw_byte(),
		}
	}

	fn require_byte(&mut self) -> Result<u8> {
		match self.read_byte()? {
			Some(b) => Ok(b),
			None => Err(Error::wfeof(ERRCTX_UNKNOWN)),
		}
	}

	fn decode_utf8(&mut self, first: u8) -> Result<char> {
		let (len, init) = match first {
			0x00..=0x7f => return Ok(first as char),
			0xc2..=0xdf => (2, (first & 0x1f) as u32),
			0xe0..=0xef => (3, (first & 0x0f) as u32),
			0xf0..=0xf4 => (4, (first & 0x07) as u32),
			_ => return Err(Error::InvalidUtf8Byte(first)),
		};
		let mut cp = init;
		for _ in 1..len {
			let b = self.require_byte()?;
			if b & 0xc0 != 0x80 {
				return Err(Error::InvalidUtf8Byte(b));
			}
			cp = (cp << 6) | (b & 0x3f) as u32;
		}
		let min = match len {
			2 => 0x80,
			3 => 0x800,
			_ => 0x10000,
		};
		if cp < min {
			// overlong encoding
			return Err(Error::InvalidUtf8Byte(first));
		}
		std::char::from_u32(cp).ok_or(Error::InvalidChar(cp))
	}

	fn read_u16(&mut self, first: u8, big_endian: bool) -> Result<u16> {
		let second = self.require_byte()?;
		Ok(if big_endian {
			u16::from_be_bytes([first, second])
		} else {
			u16::from_le_bytes([first, second])
		})
	}

	fn decode_utf16(&mut self, first: u8, big_endian: bool) -> Result<char> {
		let unit = self.read_u16(first, big_endian)? as u32;
		let cp = match unit {
			0xd800..=0xdbff => {
				let b = self.require_byte()?;
				let low = self.read_u16(b, big_endian)? as u32;
				if !(0xdc00..=0xdfff).contains(&low) {
					return Err(Error::InvalidChar(low));
				}
				0x10000 + ((unit - 0xd800) << 10) + (low - 0xdc00)
			}
			0xdc00..=0xdfff => return Err(Error::InvalidChar(unit)),
			other => other,
		};
		std::char::from_u32(cp).ok_or(Error::InvalidChar(cp))
	}

	fn decode_utf32(&mut self, first: u8, big_endian: bool) -> Result<char> {
		let mut buf = [first, 0, 0, 0];
		for slot in buf.iter_mut().skip(1) {
			*slot = self.require_byte()?;
		}
		let cp = if big_endian {
			u32::from_be_bytes(buf)
		} else {
			u32::from_le_bytes(buf)
		};
		std::char::from_u32(cp).ok_or(Error::InvalidChar(cp))
	}

	fn decode(&mut self) -> Result<Option<char>> {
		let first = match self.read_byte()? {
			Some(b) => b,
			None => return Ok(None),
		};
		let ch = match self.encoding {
			Encoding::Utf8 => self.decode_utf8(first)?,
			Encoding::Utf16Be => self.decode_utf16(first, true)?,
			Encoding::Utf16Le => self.decode_utf16(first, false)?,
			Encoding::Utf32Be => self.decode_utf32(first, true)?,
			Encoding::Utf32Le => self.decode_utf32(first, false)?,
			Encoding::Latin1 => first as char,
			Encoding::Ascii => {
				if first > 0x7f {
					return Err(Error::InvalidChar(first as u32));
				}
				first as char
			}
		};
		if CLASS_XML_NONCHAR.select(ch) {
			return Err(WFError::InvalidChar(ERRCTX_UNKNOWN, ch as u32, false).into());
		}
		Ok(Some(ch))
	}

	fn next_normalized(&mut self) -> Result<Option<char>> {
		let ch = match self.held.take() {
			Some(ch) => Some(ch),
			None => self.decode()?,
		};
		match ch {
			Some('\r') => {
				let following = self.decode()?;
				if following != Some('\n') {
					self.held = following;
				}
				Ok(Some('\n'))
			}
			other => Ok(other),
		}
	}

	fn fill(&mut self, n: usize) -> Result<bool> {
		while self.lookahead.len() <= n {
			match self.next_normalized()? {
				Some(ch) => self.lookahead.push_back(ch),
				None => return Ok(false),
			}
		}
		Ok(true)
	}

	/// Look at the `n`th char ahead without consuming anything.
	pub(crate) fn peek_nth(&mut self, n: usize) -> Result<Option<char>> {
		if self.fill(n)? {
			Ok(self.lookahead.get(n).copied())
		} else {
			Ok(None)
		}
	}

	pub(crate) fn peek(&mut self) -> Result<Option<char>> {
		self.peek_nth(0)
	}

	/// Return true if the upcoming chars are exactly `s`.
	pub(crate) fn lookahead_is(&mut self, s: &str) -> Result<bool> {
		for (i, expected) in s.chars().enumerate() {
			if self.peek_nth(i)? != Some(expected) {
				return Ok(false);
			}
		}
		Ok(true)
	}

	pub(crate) fn next(&mut self) -> Result<Option<char>> {
		let ch = match self.lookahead.pop_front() {
			Some(ch) => Some(ch),
			None => self.next_normalized()?,
		};
		if let Some(ch) = ch {
			self.loc.offset += 1;
			if ch == '\n' {
				self.loc.line += 1;
				self.loc.column = 1;
			} else {
				self.loc.column += 1;
			}
		}
		Ok(ch)
	}

	/// Consume `n` chars which are known to be present from peeking.
	pub(crate) fn skip(&mut self, n: usize) -> Result<()> {
		for _ in 0..n {
			self.next()?;
		}
		Ok(())
	}

	/// Consume `s` if the input continues with it.
	pub(crate) fn eat(&mut self, s: &str) -> Result<bool> {
		if self.lookahead_is(s)? {
			self.skip(s.chars().count())?;
			Ok(true)
		} else {
			Ok(false)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn decode_all(bytes: &[u8], forced: Option<Encoding>) -> Result<String> {
		let mut src = CharSource::new(bytes);
		src.detect(forced)?;
		let mut out = String::new();
		while let Some(ch) = src.next()? {
			out.push(ch);
		}
		Ok(out)
	}

	#[test]
	fn decodes_utf8_with_bom() {
		let mut data = vec![0xef, 0xbb, 0xbf];
		data.extend_from_slice("<a>ä€𝄞</a>".as_bytes());
		assert_eq!(decode_all(&data, None).unwrap(), "<a>ä€𝄞</a>");
	}

	#[test]
	fn decodes_utf16_both_byte_orders() {
		let text = "<a>𝄞x</a>";
		let mut le = vec![0xff, 0xfe];
		let mut be = vec![0xfe, 0xff];
		for unit in text.encode_utf16() {
			le.extend_from_slice(&unit.to_le_bytes());
			be.extend_from_slice(&unit.to_be_bytes());
		}
		assert_eq!(decode_all(&le, None).unwrap(), text);
		assert_eq!(decode_all(&be, None).unwrap(), text);
	}

	#[test]
	fn decodes_bomless_utf32() {
		let text = "<?xml version='1.0'?><a/>";
		let mut data = Vec::new();
		for ch in text.chars() {
			data.extend_from_slice(&(ch as u32).to_le_bytes());
		}
		assert_eq!(decode_all(&data, None).unwrap(), text);
	}

	#[test]
	fn decodes_forced_latin1() {
		let data = [b'<', b'a', b'>', 0xe4, b'<', b'/', b'a', b'>'];
		assert_eq!(decode_all(&data, Some(Encoding::Latin1)).unwrap(), "<a>ä</a>");
	}

	#[test]
	fn rejects_invalid_utf8() {
		match decode_all(&[b'<', 0xc0, 0x80], None) {
			Err(Error::InvalidUtf8Byte(0xc0)) => (),
			other => panic!("unexpected decode result: {:?}", other),
		}
		match decode_all(&[b'<', 0xe2, 0x28, 0xa1], None) {
			Err(Error::InvalidUtf8Byte(0x28)) => (),
			other => panic!("unexpected decode result: {:?}", other),
		}
	}

	#[test]
	fn rejects_unpaired_surrogate() {
		match decode_all(&[0xff, 0xfe, 0x00, 0xdc], None) {
			Err(Error::InvalidChar(0xdc00)) => (),
			other => panic!("unexpected decode result: {:?}", other),
		}
	}

	#[test]
	fn rejects_non_xml_chars() {
		match decode_all(b"a\x01b", None) {
			Err(Error::NotWellFormed(WFError::InvalidChar(_, 1, false))) => (),
			other => panic!("unexpected decode result: {:?}", other),
		}
	}

	#[test]
	fn normalizes_line_endings() {
		assert_eq!(decode_all(b"a\r\nb\rc\n\r\r\nd", None).unwrap(), "a\nb\nc\n\n\nd");
		assert_eq!(decode_all(b"a\r", None).unwrap(), "a\n");
	}

	#[test]
	fn tracks_lines_and_columns() {
		let mut src = CharSource::new(&b"ab\ncd"[..]);
		src.detect(None).unwrap();
		src.skip(4).unwrap();
		assert_eq!(
			src.location(),
			Location {
				line: 2,
				column: 2,
				offset: 4
			}
		);
	}

	#[test]
	fn peeking_does_not_move_location() {
		let mut src = CharSource::new(&b"<!--x-->"[..]);
		src.detect(None).unwrap();
		assert!(src.lookahead_is("<!--").unwrap());
		assert_eq!(src.location(), Location::START);
		assert!(src.eat("<!--").unwrap());
		assert_eq!(src.location().column, 5);
		assert_eq!(src.peek().unwrap(), Some('x'));
	}
}
