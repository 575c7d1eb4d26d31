//! Uniform in-memory view of upstream XML.
//!
//! XML gives no way to tell "one child" from "a list of one child", so every
//! group of same-named children is kept as a [`Cardinality`] and read back as
//! a slice. Callers never see the difference between one record and many.

use std::{collections::BTreeMap, mem, str};

use quick_xml::{
    Reader,
    escape::{resolve_predefined_entity, unescape},
    events::{BytesStart, Event},
};

use crate::error::AppError;

const FRAGMENT_LEN: usize = 48;

/// XML text exactly as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawXml(String);

impl RawXml {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RawXml {
    fn from(xml: String) -> Self {
        Self(xml)
    }
}

impl From<&str> for RawXml {
    fn from(xml: &str) -> Self {
        Self(xml.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cardinality<T> {
    Empty,
    Single(T),
    Many(Vec<T>),
}

impl<T> Default for Cardinality<T> {
    fn default() -> Self {
        Cardinality::Empty
    }
}

impl<T> Cardinality<T> {
    pub fn push(&mut self, item: T) {
        *self = match mem::take(self) {
            Cardinality::Empty => Cardinality::Single(item),
            Cardinality::Single(first) => Cardinality::Many(vec![first, item]),
            Cardinality::Many(mut items) => {
                items.push(item);
                Cardinality::Many(items)
            }
        };
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            Cardinality::Empty => &[],
            Cardinality::Single(item) => std::slice::from_ref(item),
            Cardinality::Many(items) => items,
        }
    }
}

#[cfg(test)]
impl<T> From<Vec<T>> for Cardinality<T> {
    fn from(mut items: Vec<T>) -> Self {
        match items.len() {
            0 => Cardinality::Empty,
            1 => Cardinality::Single(items.remove(0)),
            _ => Cardinality::Many(items),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    name: String,
    attributes: BTreeMap<String, String>,
    text: String,
    fields: BTreeMap<String, Cardinality<Element>>,
}

impl Element {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn field(&self, name: &str) -> Option<&Cardinality<Element>> {
        self.fields.get(name)
    }

    /// All children called `name`, in document order. Absent means empty.
    pub fn sequence(&self, name: &str) -> &[Element] {
        self.field(name).map(Cardinality::as_slice).unwrap_or(&[])
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.sequence(name).first()
    }

    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(Element::text)
    }

    /// Children grouped by name; order between different names is not kept.
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.fields.values().flat_map(Cardinality::as_slice)
    }

    /// Depth-first search starting with this element itself.
    pub fn find(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.children().find_map(|child| child.find(name))
    }

    fn push_child(&mut self, child: Element) {
        self.fields.entry(child.name.clone()).or_default().push(child);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Element,
}

impl Document {
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Depth-first search from the root, e.g. for a payload inside a SOAP envelope.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.root().find(name)
    }
}

pub fn parse(xml: &RawXml) -> Result<Document, AppError> {
    let source = xml.as_str();
    let mut reader = Reader::from_str(source);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|err| malformed(source, position, err.to_string()))?;

        match event {
            Event::Start(start) => stack.push(open_element(&start, source, position)?),
            Event::Empty(start) => {
                let element = open_element(&start, source, position)?;
                attach(&mut stack, &mut root, element, source, position)?;
            }
            Event::End(_) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| malformed(source, position, "unexpected closing tag"))?;
                element.text = element.text.trim().to_string();
                attach(&mut stack, &mut root, element, source, position)?;
            }
            Event::Text(text) => {
                let raw = decode(&text, source, position)?;
                let unescaped =
                    unescape(raw).map_err(|err| malformed(source, position, err.to_string()))?;
                append_text(&mut stack, &unescaped, source, position)?;
            }
            Event::CData(data) => {
                let raw = decode(&data, source, position)?;
                append_text(&mut stack, raw, source, position)?;
            }
            Event::GeneralRef(reference) => {
                let name = decode(&reference, source, position)?;
                let resolved = match reference.resolve_char_ref() {
                    Ok(Some(ch)) => ch.to_string(),
                    Ok(None) => resolve_predefined_entity(name)
                        .map(str::to_string)
                        .ok_or_else(|| {
                            malformed(source, position, format!("unknown entity &{name};"))
                        })?,
                    Err(err) => return Err(malformed(source, position, err.to_string())),
                };
                append_text(&mut stack, &resolved, source, position)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(malformed(
            source,
            source.len(),
            format!("unclosed element <{}>", open.name),
        ));
    }

    root.map(|root| Document { root })
        .ok_or_else(|| malformed(source, 0, "document has no root element"))
}

fn open_element(start: &BytesStart, source: &str, position: usize) -> Result<Element, AppError> {
    let name = decode(start.local_name().as_ref(), source, position)?.to_string();
    let mut attributes = BTreeMap::new();

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| malformed(source, position, err.to_string()))?;
        if attribute.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let key = decode(attribute.key.local_name().as_ref(), source, position)?.to_string();
        let raw = decode(&attribute.value, source, position)?;
        let value = unescape(raw).map_err(|err| malformed(source, position, err.to_string()))?;
        attributes.insert(key, value.into_owned());
    }

    Ok(Element {
        name,
        attributes,
        ..Element::default()
    })
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    source: &str,
    position: usize,
) -> Result<(), AppError> {
    if let Some(parent) = stack.last_mut() {
        parent.push_child(element);
    } else if root.is_some() {
        return Err(malformed(source, position, "more than one root element"));
    } else {
        *root = Some(element);
    }
    Ok(())
}

fn append_text(
    stack: &mut [Element],
    text: &str,
    source: &str,
    position: usize,
) -> Result<(), AppError> {
    match stack.last_mut() {
        Some(current) => current.text.push_str(text),
        None if text.trim().is_empty() => {}
        None => return Err(malformed(source, position, "text outside of the root element")),
    }
    Ok(())
}

fn decode<'a>(bytes: &'a [u8], source: &str, position: usize) -> Result<&'a str, AppError> {
    str::from_utf8(bytes).map_err(|err| malformed(source, position, err.to_string()))
}

fn malformed(source: &str, position: usize, message: impl Into<String>) -> AppError {
    AppError::XmlParse {
        message: message.into(),
        fragment: fragment_at(source, position),
    }
}

fn fragment_at(source: &str, position: usize) -> String {
    let mut start = position.min(source.len()).saturating_sub(FRAGMENT_LEN / 2);
    while !source.is_char_boundary(start) {
        start -= 1;
    }
    source[start..].chars().take(FRAGMENT_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(xml: &str) -> Document {
        parse(&RawXml::from(xml)).unwrap()
    }

    #[test]
    fn test_single_record_is_a_one_element_sequence() {
        let document =
            doc(r#"<ValCurs><Record ID="R01235"><Value>92,3405</Value></Record></ValCurs>"#);
        let records = document.root().sequence("Record");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].attr("ID"), Some("R01235"));
        assert!(matches!(document.root().field("Record"), Some(Cardinality::Single(_))));
    }

    #[test]
    fn test_many_records_keep_document_order() {
        let document = doc(
            r#"<ValCurs>
                <Record Date="01.03.2023"><Value>1</Value></Record>
                <Record Date="02.03.2023"><Value>2</Value></Record>
                <Record Date="03.03.2023"><Value>3</Value></Record>
            </ValCurs>"#,
        );
        let dates: Vec<_> = document
            .root()
            .sequence("Record")
            .iter()
            .filter_map(|r| r.attr("Date"))
            .collect();

        assert_eq!(dates, ["01.03.2023", "02.03.2023", "03.03.2023"]);
    }

    #[test]
    fn test_missing_children_are_empty() {
        let document = doc("<ValCurs Date=\"01.03.2023\"/>");

        assert!(document.root().sequence("Record").is_empty());
        assert_eq!(document.root().attr("Date"), Some("01.03.2023"));
    }

    #[test]
    fn test_finds_payload_inside_soap_envelope() {
        let document = doc(
            r#"<?xml version="1.0" encoding="utf-8"?>
            <soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
              <soap:Body>
                <GetCursOnDateXMLResponse xmlns="http://web.cbr.ru/">
                  <GetCursOnDateXMLResult>
                    <ValCurs><Record ID="R01235"><Value>92,3405</Value></Record></ValCurs>
                  </GetCursOnDateXMLResult>
                </GetCursOnDateXMLResponse>
              </soap:Body>
            </soap:Envelope>"#,
        );

        assert_eq!(document.root().name(), "Envelope");
        let curs = document.find("ValCurs").unwrap();
        assert_eq!(curs.sequence("Record").len(), 1);
        assert!(document.root().attr("soap").is_none());
    }

    #[test]
    fn test_text_is_unescaped_and_trimmed() {
        let document = doc(
            "<Vvalute><Vname>  Bosnia &amp; Herzegovina&#33; </Vname>\
             <Note><![CDATA[a<b]]></Note></Vvalute>",
        );

        assert_eq!(document.root().child_text("Vname"), Some("Bosnia & Herzegovina!"));
        assert_eq!(document.root().child_text("Note"), Some("a<b"));
    }

    #[test]
    fn test_mismatched_tags_fail_with_fragment() {
        let err = parse(&RawXml::from("<ValCurs><Record></ValCurs>")).unwrap_err();

        match err {
            AppError::XmlParse { fragment, .. } => assert!(!fragment.is_empty()),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_structural_errors() {
        for xml in ["", "   ", "<ValCurs>", "<a/><b/>", "<a/>trailing", "plain text"] {
            assert!(
                matches!(parse(&RawXml::from(xml)), Err(AppError::XmlParse { .. })),
                "accepted {xml:?}"
            );
        }
    }

    #[test]
    fn test_cardinality_push_and_from_vec() {
        let mut items = Cardinality::default();
        assert!(items.as_slice().is_empty());
        items.push(1);
        assert_eq!(items, Cardinality::Single(1));
        items.push(2);
        assert_eq!(items.as_slice(), &[1, 2]);

        assert_eq!(Cardinality::from(vec![7]), Cardinality::Single(7));
        assert_eq!(Cardinality::<u8>::from(Vec::new()), Cardinality::Empty);
        assert_eq!(Cardinality::from(vec![1, 2]), Cardinality::Many(vec![1, 2]));
    }
}
