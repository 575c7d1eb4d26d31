//! Typed views over the upstream documents.

use crate::{
    error::AppError,
    xml::{Document, Element},
};

const ENUM_CONTAINERS: [(&str, &str); 2] = [("Vals", "Vvalute"), ("ValuteData", "EnumValutes")];
const CURS_CONTAINER: &str = "ValCurs";
const CURS_RECORD: &str = "Record";

#[derive(Debug, PartialEq)]
pub struct Valute<'a> {
    pub code: &'a str,
    pub name: &'a str,
}

#[derive(Debug, PartialEq)]
pub struct Curs<'a> {
    pub code: &'a str,
    pub value: Option<&'a str>,
}

#[derive(Debug, PartialEq)]
pub struct DynamicCurs<'a> {
    pub date: &'a str,
    pub value: Option<&'a str>,
}

/// Enumeration entries in source order. Entries without a code are skipped.
pub fn valutes(doc: &Document) -> Result<Vec<Valute<'_>>, AppError> {
    let entries = ENUM_CONTAINERS
        .iter()
        .find_map(|(container, entry)| doc.find(container).map(|c| c.sequence(entry)))
        .ok_or_else(|| unknown_shape(doc, "currency enumeration"))?;

    Ok(entries
        .iter()
        .filter_map(|entry| {
            let code = entry.child_text("Vcode")?.trim();
            if code.is_empty() {
                return None;
            }
            let name = entry.child_text("Vname").unwrap_or_default().trim();
            Some(Valute { code, name })
        })
        .collect())
}

pub fn curs_on_date(doc: &Document) -> Result<Vec<Curs<'_>>, AppError> {
    records(doc, "rates on date")?
        .iter()
        .map(|record| {
            let code = record
                .attr("ID")
                .or_else(|| record.attr("Id"))
                .ok_or_else(|| missing(record, "ID attribute"))?;
            Ok(Curs {
                code: code.trim(),
                value: record.child_text("Value"),
            })
        })
        .collect()
}

pub fn curs_dynamic(doc: &Document) -> Result<Vec<DynamicCurs<'_>>, AppError> {
    records(doc, "rate dynamics")?
        .iter()
        .map(|record| {
            let date = record
                .attr("Date")
                .ok_or_else(|| missing(record, "Date attribute"))?;
            Ok(DynamicCurs {
                date: date.trim(),
                value: record.child_text("Value"),
            })
        })
        .collect()
}

/// Records of the `ValCurs` container. A container with no records is an empty
/// day; a document without the container is a shape we don't understand.
fn records<'a>(doc: &'a Document, what: &str) -> Result<&'a [Element], AppError> {
    doc.find(CURS_CONTAINER)
        .map(|curs| curs.sequence(CURS_RECORD))
        .ok_or_else(|| unknown_shape(doc, what))
}

fn unknown_shape(doc: &Document, what: &str) -> AppError {
    let root = doc.root();
    let children: Vec<String> = root
        .children()
        .take(3)
        .map(|child| format!("<{}>", child.name()))
        .collect();
    let fragment = match children.is_empty() {
        true => format!("<{}/>", root.name()),
        false => format!("<{}> with {}", root.name(), children.join(", ")),
    };
    AppError::XmlParse {
        message: format!("no known {what} container"),
        fragment,
    }
}

fn missing(record: &Element, what: &str) -> AppError {
    let value = record.child_text("Value").unwrap_or_default();
    AppError::XmlParse {
        message: format!("{} without {what}", record.name()),
        fragment: format!("<{}><Value>{value}</Value>", record.name()),
    }
}
