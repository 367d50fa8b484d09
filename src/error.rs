/*!
# Error types

This module holds the error types returned by the reader, the writer and the
DOM.

Reader errors are wrapped in [`Error::At`], which carries the [`Location`] at
which the problem was detected. Use [`Error::kind`] to look through that
wrapper.
*/
use std::error;
use std::fmt;
use std::io;
use std::ops::Deref;
use std::result::Result as StdResult;
use std::sync::Arc;

use smartstring::alias::String as SmartString;

use nsxml_validation::Error as ValidationError;

use crate::event::EventType;

pub use crate::errctx::*;

/// Position inside a source document.
///
/// Lines and columns are 1-based and count chars after line ending
/// normalization. The offset counts decoded chars from the start of the
/// input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
	pub line: usize,
	pub column: usize,
	pub offset: usize,
}

impl Location {
	pub const START: Location = Location {
		line: 1,
		column: 1,
		offset: 0,
	};
}

impl Default for Location {
	fn default() -> Self {
		Self::START
	}
}

impl fmt::Display for Location {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}:{}", self.line, self.column)
	}
}

/// Violation of a well-formedness constraint or the XML 1.0 grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum WFError {
	/// End-of-file encountered during a construct where more data was
	/// expected.
	InvalidEof(&'static str),

	/// Reference to an entity which is neither predefined nor declared in
	/// the internal subset.
	UndeclaredEntity(SmartString),

	/// Unicode codepoint which is not allowed in XML 1.0 encountered. The
	/// flag is set if the codepoint was produced by a character reference.
	InvalidChar(&'static str, u32, bool),

	/// Unicode codepoint which was not expected at that point in the
	/// grammar.
	UnexpectedChar(&'static str, char, Option<&'static [&'static str]>),

	/// Generalized invalid syntactic construct which does not fit into any
	/// of the other categories.
	InvalidSyntax(&'static str),

	/// Attribute was declared multiple times in the same element.
	///
	/// **Note:** This will also be emitted for namespaced attributes which
	/// resolve to the same `(uri, localname)` pair after prefix resolution.
	DuplicateAttribute(SmartString),

	/// Ending tag name does not match opening tag.
	ElementMismatch {
		expected: SmartString,
		found: SmartString,
	},
}

impl error::Error for WFError {}

impl ErrorWithContext for WFError {
	fn with_context(self, ctx: &'static str) -> WFError {
		match self {
			WFError::InvalidEof(_) => WFError::InvalidEof(ctx),
			WFError::InvalidChar(_, cp, fromref) => WFError::InvalidChar(ctx, cp, fromref),
			WFError::UnexpectedChar(_, ch, alt) => WFError::UnexpectedChar(ctx, ch, alt),
			other => other,
		}
	}
}

fn write_options(f: &mut fmt::Formatter, opts: &[&str]) -> fmt::Result {
	if opts.len() == 1 {
		f.write_str(opts[0])?;
	} else {
		f.write_str("one of: ")?;
		for (i, opt) in opts.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			f.write_str(opt)?;
		}
	}
	f.write_str(")")
}

impl fmt::Display for WFError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			WFError::InvalidEof(ctx) => write!(f, "invalid eof {}", ctx),
			WFError::UndeclaredEntity(name) => write!(f, "use of undeclared entity &{};", name),
			WFError::InvalidChar(ctx, cp, false) => {
				write!(f, "invalid codepoint U+{:x} {}", cp, ctx)
			}
			WFError::InvalidChar(ctx, cp, true) => write!(
				f,
				"character reference expanded to invalid codepoint U+{:x} {}",
				cp, ctx
			),
			WFError::UnexpectedChar(ctx, ch, Some(opts)) if !opts.is_empty() => {
				write!(f, "U+{:x} not allowed {} (expected ", *ch as u32, ctx)?;
				write_options(f, opts)
			}
			WFError::UnexpectedChar(ctx, ch, _) => {
				write!(f, "U+{:x} not allowed {}", *ch as u32, ctx)
			}
			WFError::InvalidSyntax(msg) => write!(f, "invalid syntax: {}", msg),
			WFError::DuplicateAttribute(name) => write!(f, "duplicate attribute {:?}", name),
			WFError::ElementMismatch { expected, found } => write!(
				f,
				"end tag </{}> does not match start tag <{}>",
				found, expected
			),
		}
	}
}

impl From<ValidationError> for WFError {
	fn from(other: ValidationError) -> Self {
		match other {
			ValidationError::EmptyName => Self::InvalidSyntax("Name must have at least one Char"),
			ValidationError::InvalidChar(ch) => Self::UnexpectedChar(ERRCTX_UNKNOWN, ch, None),
		}
	}
}

/// Violation of a namespace-well-formedness constraint or the Namespaces for
/// XML 1.0 grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum NWFError {
	/// More than one colon encountered in a name.
	MultiColonName(&'static str),

	/// One side of the colon in a name was empty.
	EmptyNamePart(&'static str),

	/// Use of an undeclared namespace prefix.
	UndeclaredNamespacePrefix(SmartString),

	/// Attempt to bind or unbind a reserved namespace prefix or URI.
	ReservedNamespacePrefix,

	/// Local name does not conform to the NCName production.
	InvalidLocalName(&'static str),

	/// A prefixed namespace declaration with an empty URI.
	EmptyNamespaceUri,
}

impl error::Error for NWFError {}

impl ErrorWithContext for NWFError {
	fn with_context(self, ctx: &'static str) -> NWFError {
		match self {
			Self::MultiColonName(_) => Self::MultiColonName(ctx),
			Self::EmptyNamePart(_) => Self::EmptyNamePart(ctx),
			Self::InvalidLocalName(_) => Self::InvalidLocalName(ctx),
			other => other,
		}
	}
}

impl fmt::Display for NWFError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::MultiColonName(ctx) => write!(f, "more than one colon {}", ctx),
			Self::EmptyNamePart(ctx) => {
				write!(f, "empty string on one side of the colon {}", ctx)
			}
			Self::UndeclaredNamespacePrefix(prefix) => {
				write!(f, "use of undeclared namespace prefix {:?}", prefix)
			}
			Self::ReservedNamespacePrefix => f.write_str("reserved namespace prefix"),
			Self::InvalidLocalName(ctx) => write!(f, "local name is invalid {}", ctx),
			Self::EmptyNamespaceUri => f.write_str("namespace URI is empty"),
		}
	}
}

/// Misuse of the writer API.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteError {
	/// XML declaration written after other content, or twice.
	MisplacedXmlDeclaration,

	/// Document type declaration written outside the prolog, or twice.
	MisplacedDoctype,

	/// Content written after the root element was closed and the document
	/// ended.
	EndOfDocument,

	/// Attribute or namespace declaration written while no start tag is
	/// open.
	AttributeNotAllowed,

	/// End tag written without a matching open element.
	NoOpenElement,

	/// End tag does not match the innermost open element.
	ElementMismatch {
		expected: SmartString,
		found: SmartString,
	},

	/// `end_document` called with elements still open.
	UnbalancedEndDocument(usize),

	/// Prefix bound to two different URIs on the same start tag.
	NamespaceConflict(SmartString),

	/// Identical namespace declaration repeated on the same start tag while
	/// namespace repair is off.
	DuplicateNamespace(SmartString),

	/// Binding or unbinding of `xml`/`xmlns` or their URIs.
	ReservedNamespace(SmartString),

	/// Text passed as ignorable whitespace which is not whitespace.
	NotWhitespace,

	/// Name which is not a valid XML name.
	InvalidName(SmartString),

	/// Codepoint which cannot be represented in the output XML version.
	InvalidChar(u32),

	/// Malformed indentation sequence.
	InvalidIndent(&'static str),

	/// Content which cannot be represented in the construct it was written
	/// to, such as `?>` in processing instruction data.
	InvalidContent(&'static str),
}

impl error::Error for WriteError {}

impl fmt::Display for WriteError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::MisplacedXmlDeclaration => f.write_str("misplaced XML declaration"),
			Self::MisplacedDoctype => {
				f.write_str("a document type declaration is only allowed once, in the prolog")
			}
			Self::EndOfDocument => f.write_str("no content allowed after the end of the document"),
			Self::AttributeNotAllowed => {
				f.write_str("attributes not allowed outside element headers")
			}
			Self::NoOpenElement => f.write_str("no open element"),
			Self::ElementMismatch { expected, found } => {
				write!(f, "end tag {} does not match start tag {}", found, expected)
			}
			Self::UnbalancedEndDocument(depth) => write!(
				f,
				"cannot end the document with {} element(s) still open",
				depth
			),
			Self::NamespaceConflict(prefix) => write!(
				f,
				"prefix {:?} bound to different namespaces on the same tag",
				prefix
			),
			Self::DuplicateNamespace(prefix) => {
				write!(f, "namespace declaration for {:?} duplicated", prefix)
			}
			Self::ReservedNamespace(what) => {
				write!(f, "{:?} is reserved and cannot be rebound", what)
			}
			Self::NotWhitespace => f.write_str("text is not ignorable whitespace"),
			Self::InvalidName(name) => write!(f, "{:?} is not a valid XML name", name),
			Self::InvalidChar(cp) => write!(f, "codepoint U+{:x} cannot be written", cp),
			Self::InvalidIndent(msg) => write!(f, "invalid indentation: {}", msg),
			Self::InvalidContent(msg) => write!(f, "invalid content: {}", msg),
		}
	}
}

/// Violation of a DOM structural constraint.
///
/// The contents describe the offending operation and should not be
/// interpreted by user code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomError {
	/// Node inserted somewhere it may not occur.
	HierarchyRequest(&'static str),
	/// Node used with a document that does not own it.
	WrongDocument(&'static str),
	/// Node is not where the operation expected it.
	NotFound(&'static str),
	/// Operation not supported for this kind of node.
	NotSupported(&'static str),
	/// Name contains a character not allowed in it.
	InvalidCharacter(&'static str),
	/// Namespace constraint violated by a name/namespace pair.
	Namespace(&'static str),
	/// Attribute is already owned by another element.
	InUseAttribute(&'static str),
}

impl error::Error for DomError {}

impl fmt::Display for DomError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::HierarchyRequest(msg) => write!(f, "hierarchy request error: {}", msg),
			Self::WrongDocument(msg) => write!(f, "wrong document: {}", msg),
			Self::NotFound(msg) => write!(f, "not found: {}", msg),
			Self::NotSupported(msg) => write!(f, "not supported: {}", msg),
			Self::InvalidCharacter(msg) => write!(f, "invalid character: {}", msg),
			Self::Namespace(msg) => write!(f, "namespace error: {}", msg),
			Self::InUseAttribute(msg) => write!(f, "attribute in use: {}", msg),
		}
	}
}

/// [`std::sync::Arc`]-based around [`std::io::Error`] to allow cloning.
#[derive(Clone)]
pub struct IOErrorWrapper(Arc<io::Error>);

impl IOErrorWrapper {
	fn wrap(e: io::Error) -> IOErrorWrapper {
		IOErrorWrapper(Arc::new(e))
	}
}

impl fmt::Debug for IOErrorWrapper {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		fmt::Debug::fmt(&**self, f)
	}
}

impl fmt::Display for IOErrorWrapper {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		fmt::Display::fmt(&**self, f)
	}
}

impl PartialEq for IOErrorWrapper {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl Deref for IOErrorWrapper {
	type Target = io::Error;

	fn deref(&self) -> &io::Error {
		&self.0
	}
}

/// Error type of this crate.
///
/// Errors returned by the reader are fatal, [`Error::IO`] included: the
/// reader returns the same error on all further reads. Writer errors leave
/// the writer usable, but its output may already contain a partial
/// construct.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
	/// An I/O error was encountered while reading or writing.
	///
	/// **Note:** An unexpected end of file during parsing is signalled using
	/// [`Error::NotWellFormed`] instead of
	/// [`std::io::ErrorKind::UnexpectedEof`].
	IO(IOErrorWrapper),

	/// An invalid byte was encountered during decoding.
	InvalidUtf8Byte(u8),
	/// An invalid Unicode scalar value was encountered during decoding.
	InvalidChar(u32),
	/// The document declares an encoding this crate cannot decode.
	UnsupportedEncoding(SmartString),
	/// A violation of the XML 1.0 grammar or a well-formedness constraint.
	NotWellFormed(WFError),
	/// A violation of the Namespaces in XML 1.0 grammar or a
	/// namespace-well-formedness constraint.
	NotNamespaceWellFormed(NWFError),
	/// A construct which is refused for safety reasons, such as references
	/// to external entities in strict mode or runaway entity expansion.
	///
	/// The string indicates the context and should not be interpreted by user
	/// code.
	RestrictedXml(&'static str),
	/// The writer was used in a way which would produce malformed output.
	Write(WriteError),
	/// A DOM operation violated a structural constraint.
	Dom(DomError),
	/// A different event than the one required was encountered.
	UnexpectedEvent {
		expected: &'static str,
		found: EventType,
	},
	/// The reader or writer was already closed.
	Closed,
	/// An error with the source location where it was detected.
	At(Location, Box<Error>),
}

pub type Result<T> = StdResult<T, Error>;

pub(crate) trait ErrorWithContext {
	fn with_context(self, ctx: &'static str) -> Self;
}

impl Error {
	pub fn io(e: io::Error) -> Error {
		Error::IO(IOErrorWrapper::wrap(e))
	}

	pub(crate) fn wfeof(ctx: &'static str) -> Error {
		Error::NotWellFormed(WFError::InvalidEof(ctx))
	}

	pub(crate) fn syntax(msg: &'static str) -> Error {
		Error::NotWellFormed(WFError::InvalidSyntax(msg))
	}

	pub(crate) fn at(self, loc: Location) -> Error {
		match self {
			already @ Error::At(..) => already,
			other => Error::At(loc, Box::new(other)),
		}
	}

	/// Source location at which the error was detected, if known.
	pub fn location(&self) -> Option<Location> {
		match self {
			Error::At(loc, _) => Some(*loc),
			_ => None,
		}
	}

	/// The error without its location wrapper.
	pub fn kind(&self) -> &Error {
		match self {
			Error::At(_, inner) => inner.kind(),
			other => other,
		}
	}

	/// Return true if retrying the failed operation may succeed.
	pub fn is_transient(&self) -> bool {
		matches!(self.kind(), Error::IO(_))
	}
}

impl ErrorWithContext for Error {
	fn with_context(self, ctx: &'static str) -> Self {
		match self {
			Self::NotWellFormed(wf) => Self::NotWellFormed(wf.with_context(ctx)),
			Self::NotNamespaceWellFormed(nwf) => {
				Self::NotNamespaceWellFormed(nwf.with_context(ctx))
			}
			other => other,
		}
	}
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Error {
		Error::io(e)
	}
}

impl From<WFError> for Error {
	fn from(e: WFError) -> Error {
		Error::NotWellFormed(e)
	}
}

impl From<NWFError> for Error {
	fn from(e: NWFError) -> Error {
		Error::NotNamespaceWellFormed(e)
	}
}

impl From<WriteError> for Error {
	fn from(e: WriteError) -> Error {
		Error::Write(e)
	}
}

impl From<DomError> for Error {
	fn from(e: DomError) -> Error {
		Error::Dom(e)
	}
}

impl fmt::Display for Error {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::NotWellFormed(e) => write!(f, "not-well-formed: {}", e),
			Error::NotNamespaceWellFormed(e) => write!(f, "not namespace-well-formed: {}", e),
			Error::RestrictedXml(msg) => write!(f, "restricted xml: {}", msg),
			Error::InvalidUtf8Byte(b) => write!(f, "invalid byte in input: \\x{:02x}", b),
			Error::InvalidChar(ch) => write!(f, "invalid char: U+{:08x}", ch),
			Error::UnsupportedEncoding(name) => write!(f, "unsupported encoding: {:?}", name),
			Error::IO(e) => write!(f, "I/O error: {}", e),
			Error::Write(e) => write!(f, "invalid write: {}", e),
			Error::Dom(e) => write!(f, "dom: {}", e),
			Error::UnexpectedEvent { expected, found } => {
				write!(f, "expected {}, found {:?}", expected, found)
			}
			Error::Closed => f.write_str("already closed"),
			Error::At(loc, inner) => write!(f, "{} at {}", inner, loc),
		}
	}
}

impl error::Error for Error {
	fn source(&self) -> Option<&(dyn error::Error + 'static)> {
		match self {
			Error::IO(e) => Some(&**e),
			Error::NotWellFormed(e) => Some(e),
			Error::NotNamespaceWellFormed(e) => Some(e),
			Error::Write(e) => Some(e),
			Error::Dom(e) => Some(e),
			Error::At(_, inner) => Some(&**inner),
			Error::RestrictedXml(_)
			| Error::InvalidUtf8Byte(_)
			| Error::InvalidChar(_)
			| Error::UnsupportedEncoding(_)
			| Error::UnexpectedEvent { .. }
			| Error::Closed => None,
		}
	}
}
