/*!
# Namespace-aware XML streaming and DOM

This crate reads and writes XML 1.0 (and 1.1) documents as a stream of
namespace-resolved events, and offers a small DOM which can be built from
and turned back into such a stream.

## Features

* Pull-based reader over any [`io::BufRead`], with encoding detection,
  entity expansion and an optional relaxed mode
* Writer with automatic namespace repair, indentation and escaping
* Shared namespace scoping ([`NamespaceHolder`]) for reader, writer and DOM
* Arena-based DOM ([`Dom`]) with ownership checks, import and adoption
* Capture of event runs into self-contained [`CompactFragment`]s
* No external resources: external entities are never fetched

## Example

```
use nsxml::{serialize, EventRead, XmlReader, XmlWriter};

let mut reader = XmlReader::from_str("<?xml version='1.0'?><a xmlns='urn:x'>b&amp;c</a>");
let mut writer = XmlWriter::new(Vec::new());
serialize(&mut reader, &mut writer).unwrap();
assert_eq!(
	std::str::from_utf8(&writer.into_inner()).unwrap(),
	"<?xml version='1.0' encoding='UTF-8'?><a xmlns=\"urn:x\">b&amp;c</a>",
);
```

## High-level usage

### Reading

[`XmlReader`] produces [`Event`]s through the [`EventRead`] trait. The
namespace bindings in scope at the current position are available through
[`NamespaceContext`].

### Lookahead

[`BufferedReader`] wraps any [`EventRead`] with a peek queue and carries
the helpers which need to look ahead, such as
[`BufferedReader::element_to_fragment`]. [`skip_element`],
[`read_simple_element`] and [`all_text`] consume the rest of an element
from any event source.

### Writing

Anything implementing [`EventWrite`] accepts events: the serializing
[`XmlWriter`] and the DOM builder [`DomWriter`]. [`serialize`] copies the
events of any [`EventRead`] into any [`EventWrite`]; [`write_element`]
copies a single element and [`filter_substream`] embeds a document into
another one.

### DOM

[`Dom`] holds documents and their nodes. [`DomWriter`] builds trees,
[`DomReader`] walks them and produces events again.
*/
use std::io;

pub mod buffered;
pub mod dom;
mod errctx;
pub mod error;
pub mod event;
pub mod fragment;
pub mod namespaces;
pub mod reader;
pub mod strings;
pub mod writer;


#[doc(inline)]
pub use buffered::BufferedReader;
#[doc(inline)]
pub use dom::{Dom, DomReader, DomWriter};
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use event::{Attribute, Event, EventType, StartElement, XmlDeclaration};
#[doc(inline)]
pub use fragment::{
	read_fragment, siblings_to_fragment, siblings_to_string, CompactFragment, FragmentReader,
};
#[doc(inline)]
pub use namespaces::{Namespace, NamespaceContext, NamespaceHolder, XMLNS_XML, XMLNS_XMLNS};
#[doc(inline)]
pub use reader::{
	all_text, read_simple_element, skip_element, Encoding, ReaderConfig, Relaxation, XmlReader,
};
pub use strings::{NCName, Name, QName};
#[doc(inline)]
pub use writer::{
	add_undeclared_namespaces, filter_substream, serialize, write_element, write_element_content,
	write_simple_element, EventWrite, IndentSequence, SubstreamFilter, WriterConfig, XmlDeclMode,
	XmlVersion, XmlWriter,
};

pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

/**
# Source for individual XML events

This trait is implemented by the reader frontends: [`XmlReader`],
[`DomReader`] and [`FragmentReader`]. It is analogous to the
[`std::io::Read`] trait, but for [`Event`]s instead of bytes.
*/
pub trait EventRead {
	/// Read a single event.
	///
	/// If the end of the document has been reached, `None` is returned.
	///
	/// Errors are fatal for [`XmlReader`]: the same error is returned again
	/// on the next invocation without reading further data from the source.
	fn read(&mut self) -> Result<Option<Event>>;

	/// Read all events which can be produced from the data source (at this
	/// point in time).
	///
	/// The given `cb` is invoked for each event.
	fn read_all<F>(&mut self, mut cb: F) -> Result<()>
	where
		F: FnMut(Event) -> (),
	{
		loop {
			match self.read()? {
				None => return Ok(()),
				Some(ev) => cb(ev),
			}
		}
	}

	/// Read all events which can be produced from the data source (at this
	/// point in time).
	///
	/// The given `cb` is invoked for each event.
	///
	/// If the data source indicates that it needs to block to read further
	/// data, `false` is returned. If the end of the document is reached,
	/// `true` is returned.
	fn read_all_eof<F>(&mut self, cb: F) -> Result<bool>
	where
		F: FnMut(Event) -> (),
	{
		as_eof_flag(self.read_all(cb))
	}
}

/// Convert end-of-file-ness of a result to a boolean flag.
///
/// If the result is ok, return true (EOF). If the result is not ok, but the
/// error is an I/O error indicating that the data source would have to block
/// to read further data, return false ("Ok, but not at eof yet").
///
/// All other errors are passed through.
pub fn as_eof_flag(r: Result<()>) -> Result<bool> {
	match r {
		Err(e) => match e.kind() {
			Error::IO(ioerr) if ioerr.kind() == io::ErrorKind::WouldBlock => Ok(false),
			_ => Err(e),
		},
		Ok(()) => Ok(true),
	}
}
