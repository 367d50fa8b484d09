#[macro_use]
extern crate afl;
extern crate nsxml;

use nsxml::{serialize, Dom, DomReader, DomWriter, Event, EventRead, XmlReader, XmlWriter};

fn read_events(data: &[u8]) -> nsxml::Result<Vec<Event>> {
	let mut reader = XmlReader::new(data);
	let mut out = Vec::new();
	reader.read_all(|ev| out.push(ev))?;
	Ok(out)
}

/// Names and character data, which have to survive any round trip.
fn essence(events: &[Event]) -> Vec<String> {
	let mut out = Vec::new();
	for ev in events {
		match ev {
			Event::StartElement(start) => {
				out.push(format!("<{}", start.name));
				for attr in start.attributes.iter() {
					out.push(format!("@{}={}", attr.name, attr.value));
				}
			}
			Event::EndElement(name) => out.push(format!("</{}", name)),
			Event::Text(text) | Event::CData(text) => match out.last_mut() {
				Some(last) if last.starts_with('#') => last.push_str(text),
				_ => out.push(format!("#{}", text)),
			},
			_ => (),
		}
	}
	out
}

fn main() {
	fuzz!(|data: &[u8]| {
		let events = match read_events(data) {
			Ok(events) => events,
			Err(_) => return,
		};

		let mut reader = XmlReader::new(data);
		let mut writer = XmlWriter::new(Vec::new());
		if serialize(&mut reader, &mut writer).is_err() {
			// unknown entities and doctypes in odd places may be refused
			return;
		}
		let written = writer.into_inner();
		let reread = match read_events(&written) {
			Ok(events) => events,
			Err(e) => panic!("writer produced unreadable output: {}", e),
		};
		if essence(&events) != essence(&reread) {
			panic!("round trip changed the document");
		}

		let mut dom = Dom::new();
		let doc = {
			let mut reader = XmlReader::new(&written[..]);
			let mut builder = DomWriter::new(&mut dom);
			if serialize(&mut reader, &mut builder).is_err() {
				return;
			}
			builder.document()
		};
		let mut walked = Vec::new();
		DomReader::new(&dom, doc.node())
			.read_all(|ev| walked.push(ev))
			.unwrap();
		if essence(&walked) != essence(&reread) {
			panic!("dom walk differs from stream");
		}
	});
}
