/*!
Helpers for consuming the content of an element whose start tag has just
been read.
*/
use crate::error::{Error, Result};
use crate::event::{Event, EventType};
use crate::EventRead;

fn unexpected_eof(expected: &'static str) -> Error {
	Error::UnexpectedEvent {
		expected,
		found: EventType::EndDocument,
	}
}

/**
Consume everything up to and including the end tag of the current element.

Must be called right after the START_ELEMENT of the element to skip was
read.
*/
pub fn skip_element<R: EventRead + ?Sized>(reader: &mut R) -> Result<()> {
	let mut depth = 0usize;
	loop {
		match reader.read()? {
			Some(Event::StartElement(_)) => depth += 1,
			Some(Event::EndElement(_)) => {
				if depth == 0 {
					return Ok(());
				}
				depth -= 1;
			}
			None | Some(Event::EndDocument) => return Err(unexpected_eof("END_ELEMENT")),
			Some(_) => (),
		}
	}
}

/**
Read the text content of an element which must not have child elements.

Comments, processing instructions and whitespace outside of text are
dropped. The end tag of the element is consumed. A child element is an
error.
*/
pub fn read_simple_element<R: EventRead + ?Sized>(reader: &mut R) -> Result<String> {
	const EXPECTED: &str = "text content or END_ELEMENT";
	let mut result = String::new();
	loop {
		match reader.read()? {
			Some(Event::EndElement(_)) => return Ok(result),
			Some(Event::Text(text)) | Some(Event::CData(text)) => result.push_str(&text),
			Some(Event::EntityRef(name)) => push_entity_ref(&mut result, &name),
			Some(Event::Comment(_))
			| Some(Event::ProcessingInstruction { .. })
			| Some(Event::IgnorableWhitespace(_))
			| Some(Event::Recovered(_)) => (),
			None | Some(Event::EndDocument) => return Err(unexpected_eof(EXPECTED)),
			Some(other) => {
				return Err(Error::UnexpectedEvent {
					expected: EXPECTED,
					found: other.event_type(),
				})
			}
		}
	}
}

/**
Collect all text up to the end of the current element.

Unlike [`read_simple_element`], ignorable whitespace is kept once any text
has been collected; only leading whitespace is dropped. The end tag is
consumed.
*/
pub fn all_text<R: EventRead + ?Sized>(reader: &mut R) -> Result<String> {
	const EXPECTED: &str = "text content or END_ELEMENT";
	let mut result = String::new();
	loop {
		match reader.read()? {
			Some(Event::EndElement(_)) => return Ok(result),
			Some(Event::IgnorableWhitespace(text)) => {
				if !result.is_empty() {
					result.push_str(&text);
				}
			}
			Some(Event::Text(text)) | Some(Event::CData(text)) => result.push_str(&text),
			Some(Event::EntityRef(name)) => push_entity_ref(&mut result, &name),
			Some(Event::Comment(_))
			| Some(Event::ProcessingInstruction { .. })
			| Some(Event::Recovered(_)) => (),
			None | Some(Event::EndDocument) => return Err(unexpected_eof(EXPECTED)),
			Some(other) => {
				return Err(Error::UnexpectedEvent {
					expected: EXPECTED,
					found: other.event_type(),
				})
			}
		}
	}
}

// unresolved references stay in their source form
fn push_entity_ref(out: &mut String, name: &str) {
	out.push('&');
	out.push_str(name);
	out.push(';');
}
