/*!
# General entities

Predefined entities and character references are always resolved. Entities
declared in the internal subset of the DOCTYPE are expanded from their
literal value; declarations of external entities are remembered so that
references to them can be reported, but their content is never fetched.
*/
use std::collections::HashMap;

use smartstring::alias::String as SmartString;

use nsxml_validation::selectors::{CharSelector, CLASS_XML_NAME, CLASS_XML_NAMESTART, CLASS_XML_NONCHAR};

use crate::errctx::*;
use crate::error::{Error, Result, WFError};

/// Replacement of a predefined entity.
pub(crate) fn predefined(name: &str) -> Option<char> {
	match name {
		"amp" => Some('&'),
		"lt" => Some('<'),
		"gt" => Some('>'),
		"apos" => Some('\''),
		"quot" => Some('"'),
		_ => None,
	}
}

/// Resolve the body of a character reference (the part between `&#` and
/// `;`).
pub(crate) fn char_reference(body: &str, ctx: &'static str) -> Result<char> {
	let (digits, radix) = match body.strip_prefix('x') {
		Some(hex) => (hex, 16),
		None => (body, 10),
	};
	if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
		return Err(WFError::InvalidSyntax("malformed character reference").into());
	}
	let cp = match u32::from_str_radix(digits, radix) {
		Ok(cp) => cp,
		// too many digits for any codepoint
		Err(_) => return Err(WFError::InvalidChar(ctx, u32::MAX, true).into()),
	};
	match std::char::from_u32(cp) {
		Some(ch) if !CLASS_XML_NONCHAR.select(ch) => Ok(ch),
		_ => Err(WFError::InvalidChar(ctx, cp, true).into()),
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EntityDef {
	/// Literal replacement text, references not yet expanded.
	Internal(String),
	/// `SYSTEM` or `PUBLIC` entity; the system identifier is kept for
	/// diagnostics only.
	External(SmartString),
}

/// Part of an expansion which refers to undeclared entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Piece {
	Text(String),
	/// Reference to an undeclared entity inside a replacement text.
	Unknown(SmartString),
}

/// Outcome of looking up a named entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolved {
	Text(String),
	/// The replacement text refers to undeclared entities; the reader
	/// treats each of them like an undeclared reference of its own.
	Partial(Vec<Piece>),
	External,
	Unknown,
}

/// General entities declared in the internal subset.
#[derive(Debug, Default)]
pub(crate) struct EntityTable {
	defs: HashMap<SmartString, EntityDef>,
	expanded: usize,
	limit: usize,
}

impl EntityTable {
	pub(crate) fn new(limit: usize) -> Self {
		Self {
			defs: HashMap::new(),
			expanded: 0,
			limit,
		}
	}

	pub(crate) fn clear(&mut self) {
		self.defs.clear();
		self.expanded = 0;
	}

	/// Declare an entity. The first declaration of a name is binding;
	/// predefined entities cannot be redeclared.
	pub(crate) fn declare(&mut self, name: &str, def: EntityDef) {
		if predefined(name).is_some() {
			return;
		}
		self.defs.entry(name.into()).or_insert(def);
	}

	#[cfg(test)]
	pub(crate) fn get(&self, name: &str) -> Option<&EntityDef> {
		self.defs.get(name)
	}

	/// Resolve a named entity to its fully expanded replacement text.
	pub(crate) fn resolve(&mut self, name: &str) -> Result<Resolved> {
		if let Some(ch) = predefined(name) {
			return Ok(Resolved::Text(ch.to_string()));
		}
		match self.defs.get(name) {
			None => Ok(Resolved::Unknown),
			Some(EntityDef::External(system_id)) => {
				log::debug!("not fetching external entity {:?} ({:?})", name, system_id);
				Ok(Resolved::External)
			}
			Some(EntityDef::Internal(_)) => {
				let mut active = Vec::new();
				let mut out = String::new();
				let mut pieces = Vec::new();
				self.expand_into(name, &mut active, &mut out, &mut pieces)?;
				if pieces.is_empty() {
					return Ok(Resolved::Text(out));
				}
				if !out.is_empty() {
					pieces.push(Piece::Text(out));
				}
				Ok(Resolved::Partial(pieces))
			}
		}
	}

	fn expand_into(
		&mut self,
		name: &str,
		active: &mut Vec<SmartString>,
		out: &mut String,
		pieces: &mut Vec<Piece>,
	) -> Result<()> {
		if active.iter().any(|n| n.as_str() == name) {
			return Err(Error::RestrictedXml("recursive entity reference"));
		}
		let value = match self.defs.get(name) {
			Some(EntityDef::Internal(value)) => value.clone(),
			Some(EntityDef::External(_)) => {
				return Err(Error::RestrictedXml("reference to external entity"))
			}
			None => return Err(WFError::UndeclaredEntity(name.into()).into()),
		};
		active.push(name.into());
		let mut rest = value.as_str();
		while let Some(amp) = rest.find('&') {
			self.account(out, &rest[..amp])?;
			let after = &rest[amp + 1..];
			let semi = match after.find(';') {
				Some(semi) => semi,
				None => return Err(WFError::InvalidSyntax("unterminated reference in entity value").into()),
			};
			let body = &after[..semi];
			if let Some(charref) = body.strip_prefix('#') {
				let ch = char_reference(charref, ERRCTX_REF)?;
				let mut buf = [0u8; 4];
				self.account(out, ch.encode_utf8(&mut buf))?;
			} else if let Some(ch) = predefined(body) {
				let mut buf = [0u8; 4];
				self.account(out, ch.encode_utf8(&mut buf))?;
			} else if self.defs.contains_key(body) {
				self.expand_into(body, active, out, pieces)?;
			} else {
				log::debug!("undeclared entity {:?} in replacement text of {:?}", body, name);
				if !out.is_empty() {
					pieces.push(Piece::Text(std::mem::take(out)));
				}
				pieces.push(Piece::Unknown(body.into()));
			}
			rest = &after[semi + 1..];
		}
		self.account(out, rest)?;
		active.pop();
		Ok(())
	}

	fn account(&mut self, out: &mut String, s: &str) -> Result<()> {
		self.expanded += s.len();
		if self.expanded > self.limit {
			return Err(Error::RestrictedXml("entity expansion limit exceeded"));
		}
		out.push_str(s);
		Ok(())
	}

	/// Scan an internal DTD subset for general entity declarations.
	///
	/// Everything else in the subset (element, attribute list and notation
	/// declarations, parameter entities, comments, processing instructions)
	/// is skipped without validation.
	pub(crate) fn scan_internal_subset(&mut self, subset: &str) -> Result<()> {
		let mut rest = subset;
		loop {
			rest = rest.trim_start();
			if rest.is_empty() {
				return Ok(());
			}
			if let Some(after) = rest.strip_prefix("<!--") {
				rest = match after.find("-->") {
					Some(end) => &after[end + 3..],
					None => return Err(Error::wfeof(ERRCTX_DOCTYPE)),
				};
			} else if let Some(after) = rest.strip_prefix("<?") {
				rest = match after.find("?>") {
					Some(end) => &after[end + 2..],
					None => return Err(Error::wfeof(ERRCTX_DOCTYPE)),
				};
			} else if let Some(after) = rest.strip_prefix("<!ENTITY") {
				rest = self.parse_entity_decl(after)?;
			} else if rest.starts_with("<!") {
				rest = skip_markup_decl(&rest[2..])?;
			} else if rest.starts_with('%') {
				// parameter entity reference
				rest = match rest.find(';') {
					Some(end) => &rest[end + 1..],
					None => return Err(Error::wfeof(ERRCTX_DOCTYPE)),
				};
			} else {
				return Err(WFError::InvalidSyntax("unexpected content in internal subset").into());
			}
		}
	}

	fn parse_entity_decl<'a>(&mut self, decl: &'a str) -> Result<&'a str> {
		let mut rest = require_space(decl)?;
		let parameter = if let Some(after) = rest.strip_prefix('%') {
			rest = require_space(after)?;
			true
		} else {
			false
		};
		let (name, after) = split_name(rest)?;
		rest = require_space(after)?;
		let def = if rest.starts_with('"') || rest.starts_with('\'') {
			let (value, after) = split_quoted(rest)?;
			rest = after;
			EntityDef::Internal(value.to_string())
		} else if let Some(after) = rest.strip_prefix("SYSTEM") {
			let (system_id, after) = split_quoted(require_space(after)?)?;
			rest = after;
			EntityDef::External(system_id.into())
		} else if let Some(after) = rest.strip_prefix("PUBLIC") {
			let (_public_id, after) = split_quoted(require_space(after)?)?;
			let (system_id, after) = split_quoted(require_space(after)?)?;
			rest = after;
			EntityDef::External(system_id.into())
		} else {
			return Err(WFError::InvalidSyntax("expected entity value or external id").into());
		};
		// optional NDATA and whitespace up to the end of the declaration
		let end = match rest.find('>') {
			Some(end) => end,
			None => return Err(Error::wfeof(ERRCTX_ENTITY_DECL)),
		};
		if parameter {
			log::debug!("skipping parameter entity declaration {:?}", name);
		} else {
			if let EntityDef::External(ref system_id) = def {
				log::debug!("external entity {:?} declared with system id {:?}", name, system_id);
			}
			self.declare(name, def);
		}
		Ok(&rest[end + 1..])
	}
}

fn require_space(s: &str) -> Result<&str> {
	let trimmed = s.trim_start_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r'));
	if trimmed.len() == s.len() {
		return Err(WFError::InvalidSyntax("whitespace required in entity declaration").into());
	}
	Ok(trimmed)
}

fn split_name(s: &str) -> Result<(&str, &str)> {
	let mut end = 0;
	for (i, ch) in s.char_indices() {
		let ok = if i == 0 {
			CLASS_XML_NAMESTART.select(ch)
		} else {
			CLASS_XML_NAME.select(ch)
		};
		if !ok {
			break;
		}
		end = i + ch.len_utf8();
	}
	if end == 0 {
		return Err(WFError::InvalidSyntax("expected entity name").into());
	}
	Ok((&s[..end], &s[end..]))
}

fn split_quoted(s: &str) -> Result<(&str, &str)> {
	let quote = match s.chars().next() {
		Some(q @ '"') | Some(q @ '\'') => q,
		_ => return Err(WFError::InvalidSyntax("expected quoted literal").into()),
	};
	let body = &s[1..];
	match body.find(quote) {
		Some(end) => Ok((&body[..end], &body[end + 1..])),
		None => Err(Error::wfeof(ERRCTX_ENTITY_DECL)),
	}
}

/// Skip a markup declaration after its `<!`, honouring quoted literals.
fn skip_markup_decl(s: &str) -> Result<&str> {
	let mut quote: Option<char> = None;
	for (i, ch) in s.char_indices() {
		match (quote, ch) {
			(Some(q), c) if c == q => quote = None,
			(Some(_), _) => (),
			(None, '"') | (None, '\'') => quote = Some(ch),
			(None, '>') => return Ok(&s[i + 1..]),
			(None, _) => (),
		}
	}
	Err(Error::wfeof(ERRCTX_DOCTYPE))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn char_references() {
		assert_eq!(char_reference("60", ERRCTX_TEXT).unwrap(), '<');
		assert_eq!(char_reference("x3c", ERRCTX_TEXT).unwrap(), '<');
		assert_eq!(char_reference("x1D11E", ERRCTX_TEXT).unwrap(), '\u{1d11e}');
		match char_reference("0", ERRCTX_TEXT) {
			Err(Error::NotWellFormed(WFError::InvalidChar(_, 0, true))) => (),
			other => panic!("unexpected char ref result: {:?}", other),
		}
		match char_reference("xZZ", ERRCTX_TEXT) {
			Err(Error::NotWellFormed(WFError::InvalidSyntax(_))) => (),
			other => panic!("unexpected char ref result: {:?}", other),
		}
		assert!(char_reference("xd800", ERRCTX_TEXT).is_err());
		assert!(char_reference("99999999999", ERRCTX_TEXT).is_err());
	}

	#[test]
	fn internal_subset_declarations() {
		let mut table = EntityTable::new(1024);
		table
			.scan_internal_subset(
				"\n<!ELEMENT a (#PCDATA)>\n<!-- <!ENTITY hidden 'x'> -->\n<!ENTITY e1 \"one &e2;\">\n<!ENTITY e2 'two'>\n<!ENTITY % pe 'ignored'>\n<!ENTITY ext SYSTEM \"file:///etc/passwd\">\n<!ENTITY pub PUBLIC '-//x' 'http://example.com/x'>\n%pe;\n<!ATTLIST a b CDATA 'x>y'>\n",
			)
			.unwrap();
		assert_eq!(table.get("e2"), Some(&EntityDef::Internal("two".to_string())));
		assert!(table.get("hidden").is_none());
		assert!(table.get("pe").is_none());
		assert_eq!(
			table.get("ext"),
			Some(&EntityDef::External("file:///etc/passwd".into()))
		);
		assert_eq!(table.resolve("e1").unwrap(), Resolved::Text("one two".to_string()));
		assert_eq!(table.resolve("ext").unwrap(), Resolved::External);
		assert_eq!(table.resolve("pub").unwrap(), Resolved::External);
		assert_eq!(table.resolve("nope").unwrap(), Resolved::Unknown);
		assert_eq!(table.resolve("lt").unwrap(), Resolved::Text("<".to_string()));
	}

	#[test]
	fn first_declaration_wins() {
		let mut table = EntityTable::new(1024);
		table
			.scan_internal_subset("<!ENTITY e 'first'><!ENTITY e 'second'><!ENTITY lt 'no'>")
			.unwrap();
		assert_eq!(table.resolve("e").unwrap(), Resolved::Text("first".to_string()));
		assert_eq!(table.resolve("lt").unwrap(), Resolved::Text("<".to_string()));
	}

	#[test]
	fn recursive_entities_are_rejected() {
		let mut table = EntityTable::new(1024);
		table
			.scan_internal_subset("<!ENTITY a '&b;'><!ENTITY b '&a;'>")
			.unwrap();
		match table.resolve("a") {
			Err(Error::RestrictedXml(_)) => (),
			other => panic!("unexpected resolve result: {:?}", other),
		}
	}

	#[test]
	fn expansion_limit_stops_entity_bombs() {
		let mut table = EntityTable::new(10_000);
		table
			.scan_internal_subset(
				"<!ENTITY a 'aaaaaaaaaa'><!ENTITY b '&a;&a;&a;&a;&a;&a;&a;&a;&a;&a;'><!ENTITY c '&b;&b;&b;&b;&b;&b;&b;&b;&b;&b;'><!ENTITY d '&c;&c;&c;&c;&c;&c;&c;&c;&c;&c;'><!ENTITY e '&d;&d;&d;&d;&d;&d;&d;&d;&d;&d;'>",
			)
			.unwrap();
		assert_eq!(table.resolve("c").unwrap(), Resolved::Text("a".repeat(1000)));
		match table.resolve("e") {
			Err(Error::RestrictedXml("entity expansion limit exceeded")) => (),
			other => panic!("unexpected resolve result: {:?}", other),
		}
	}

	#[test]
	fn undeclared_entity_in_replacement_text_is_reported_in_place() {
		let mut table = EntityTable::new(1024);
		table
			.scan_internal_subset("<!ENTITY in 'b&missing;c'><!ENTITY out 'a&in;&amp;'>")
			.unwrap();
		assert_eq!(
			table.resolve("out").unwrap(),
			Resolved::Partial(vec![
				Piece::Text("ab".to_string()),
				Piece::Unknown("missing".into()),
				Piece::Text("c&".to_string()),
			])
		);
	}

	#[test]
	fn external_entity_inside_internal_entity_is_refused() {
		let mut table = EntityTable::new(1024);
		table
			.scan_internal_subset("<!ENTITY ext SYSTEM 'file:///etc/passwd'><!ENTITY wrap 'x&ext;'>")
			.unwrap();
		match table.resolve("wrap") {
			Err(Error::RestrictedXml(_)) => (),
			other => panic!("unexpected resolve result: {:?}", other),
		}
	}
}
