/*!
# Indentation sequences

An indentation sequence is written once per nesting level in front of tags.
Besides whitespace it may contain complete comments, which allows for
visible markers like `"<!--|-->  "`.
*/
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use nsxml_validation::is_xml_whitespace;

use crate::error::{Error, WriteError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndentToken {
	Whitespace(String),
	/// Comment body, without the `<!--` and `-->` delimiters.
	Comment(String),
}

/// Parsed indentation string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndentSequence {
	tokens: Vec<IndentToken>,
}

impl IndentSequence {
	/// The empty sequence, which disables indentation.
	pub fn new() -> IndentSequence {
		IndentSequence { tokens: Vec::new() }
	}

	/// `n` spaces per level.
	pub fn spaces(n: usize) -> IndentSequence {
		if n == 0 {
			return IndentSequence::new();
		}
		IndentSequence {
			tokens: vec![IndentToken::Whitespace(" ".repeat(n))],
		}
	}

	/// Parse an indentation string.
	///
	/// # Errors
	///
	/// Returns [`WriteError::InvalidIndent`] if the string contains anything
	/// but whitespace and comments, an unclosed comment, or `--` inside a
	/// comment.
	pub fn parse(s: &str) -> Result<IndentSequence, WriteError> {
		let mut tokens = Vec::new();
		let mut ws = String::new();
		let mut rest = s;
		while let Some(ch) = rest.chars().next() {
			if let Some(after) = rest.strip_prefix("<!--") {
				if !ws.is_empty() {
					tokens.push(IndentToken::Whitespace(std::mem::take(&mut ws)));
				}
				let end = after
					.find("-->")
					.ok_or(WriteError::InvalidIndent("unclosed comment"))?;
				let body = &after[..end];
				if body.contains("--") || body.ends_with('-') {
					return Err(WriteError::InvalidIndent("'--' inside comment"));
				}
				tokens.push(IndentToken::Comment(body.to_string()));
				rest = &after[end + 3..];
				continue;
			}
			if !is_xml_whitespace(ch) {
				return Err(WriteError::InvalidIndent(
					"indents can only be whitespace or comments",
				));
			}
			ws.push(ch);
			rest = &rest[ch.len_utf8()..];
		}
		if !ws.is_empty() {
			tokens.push(IndentToken::Whitespace(ws));
		}
		Ok(IndentSequence { tokens })
	}

	pub fn tokens(&self) -> &[IndentToken] {
		&self.tokens
	}

	pub fn is_empty(&self) -> bool {
		self.tokens.is_empty()
	}

	/// The markup written for one level.
	pub fn render(&self) -> String {
		let mut out = String::new();
		for token in self.tokens.iter() {
			match token {
				IndentToken::Whitespace(ws) => out.push_str(ws),
				IndentToken::Comment(body) => {
					out.push_str("<!--");
					out.push_str(body);
					out.push_str("-->");
				}
			}
		}
		out
	}
}

impl fmt::Display for IndentSequence {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.write_str(&self.render())
	}
}

impl FromStr for IndentSequence {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(IndentSequence::parse(s)?)
	}
}

impl TryFrom<&str> for IndentSequence {
	type Error = Error;

	fn try_from(s: &str) -> Result<Self, Self::Error> {
		s.parse()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn whitespace_and_comments() {
		let seq = IndentSequence::parse("  <!--|--> \t").unwrap();
		assert_eq!(
			seq.tokens(),
			&[
				IndentToken::Whitespace("  ".into()),
				IndentToken::Comment("|".into()),
				IndentToken::Whitespace(" \t".into()),
			][..]
		);
		assert_eq!(seq.render(), "  <!--|--> \t");
	}

	#[test]
	fn single_hyphens_in_comments_are_fine() {
		let seq = IndentSequence::parse("<!-- a-b -->").unwrap();
		assert_eq!(seq.tokens(), &[IndentToken::Comment(" a-b ".into())][..]);
	}

	#[test]
	fn rejects_text() {
		match IndentSequence::parse("  x") {
			Err(WriteError::InvalidIndent(_)) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn rejects_unclosed_comment() {
		match IndentSequence::parse(" <!-- x") {
			Err(WriteError::InvalidIndent("unclosed comment")) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn rejects_double_hyphen() {
		match IndentSequence::parse("<!-- a -- b -->") {
			Err(WriteError::InvalidIndent("'--' inside comment")) => (),
			other => panic!("unexpected result: {:?}", other),
		}
		match IndentSequence::parse("<!-- a --->") {
			Err(WriteError::InvalidIndent("'--' inside comment")) => (),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn spaces() {
		assert!(IndentSequence::spaces(0).is_empty());
		assert_eq!(IndentSequence::spaces(2).render(), "  ");
	}
}
