use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::forms::document::FieldKind;

const FLAG_PUSHBUTTON: i64 = 1 << 16;
const MAX_DEPTH: usize = 32;

/// Terminal form field with the widget annotations that display it.
#[derive(Debug, Clone)]
pub(crate) struct FieldNode {
    pub(crate) id: ObjectId,
    pub(crate) kind: FieldKind,
    pub(crate) widgets: Vec<ObjectId>,
}

/// Terminal fields keyed by fully qualified name (`parent.child[0]`).
#[derive(Debug, Default)]
pub(crate) struct FieldIndex {
    fields: BTreeMap<String, FieldNode>,
}

impl FieldIndex {
    pub(crate) fn build(document: &Document, roots: &[Object]) -> Self {
        let mut fields = BTreeMap::new();
        for root in roots {
            if let Object::Reference(id) = root {
                walk(document, *id, None, None, 0, 0, &mut fields);
            }
        }
        Self { fields }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&FieldNode> {
        self.fields.get(name)
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn walk<'a>(
    document: &'a Document,
    id: ObjectId,
    parent_name: Option<&str>,
    inherited_type: Option<&'a [u8]>,
    inherited_flags: i64,
    depth: usize,
    out: &mut BTreeMap<String, FieldNode>,
) {
    if depth > MAX_DEPTH {
        return;
    }
    let Some(dict) = dictionary(document, id) else {
        return;
    };

    let name = match (parent_name, partial_name(dict)) {
        (Some(parent), Some(partial)) => format!("{parent}.{partial}"),
        (None, Some(partial)) => partial,
        (Some(parent), None) => parent.to_string(),
        (None, None) => return,
    };
    let field_type = match dict.get(b"FT") {
        Ok(Object::Name(name)) => Some(name.as_slice()),
        _ => inherited_type,
    };
    let flags = match dict.get(b"Ff") {
        Ok(Object::Integer(value)) => *value,
        _ => inherited_flags,
    };

    let (field_kids, widget_kids): (Vec<ObjectId>, Vec<ObjectId>) = kids(document, dict)
        .into_iter()
        .partition(|kid| dictionary(document, *kid).is_some_and(|kid| kid.has(b"T")));
    if field_kids.is_empty() && widget_kids.is_empty() && dict.has(b"Kids") {
        // Intermediate node whose children were removed.
        return;
    }

    if !field_kids.is_empty() {
        for kid in field_kids {
            walk(
                document,
                kid,
                Some(&name),
                field_type,
                flags,
                depth + 1,
                out,
            );
        }
        return;
    }

    let widgets = if widget_kids.is_empty() {
        vec![id]
    } else {
        widget_kids
    };
    out.insert(
        name,
        FieldNode {
            id,
            kind: classify(field_type, flags),
            widgets,
        },
    );
}

fn classify(field_type: Option<&[u8]>, flags: i64) -> FieldKind {
    match field_type {
        Some(b"Tx") => FieldKind::Text,
        Some(b"Btn") if flags & FLAG_PUSHBUTTON == 0 => FieldKind::Checkbox,
        _ => FieldKind::Other,
    }
}

fn kids(document: &Document, dict: &Dictionary) -> Vec<ObjectId> {
    let Ok(kids) = dict.get(b"Kids") else {
        return Vec::new();
    };
    match resolve(document, kids) {
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Object::Reference(id) => Some(*id),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn partial_name(dict: &Dictionary) -> Option<String> {
    match dict.get(b"T") {
        Ok(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

pub(crate) fn dictionary(document: &Document, id: ObjectId) -> Option<&Dictionary> {
    match document.get_object(id) {
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    }
}

pub(crate) fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Appearance state that marks a checkbox widget as on (`/AP /N` key other than `Off`).
pub(crate) fn on_state(document: &Document, widget: &Dictionary) -> Option<Vec<u8>> {
    let appearance = match resolve(document, widget.get(b"AP").ok()?)? {
        Object::Dictionary(dict) => dict,
        _ => return None,
    };
    let normal = match resolve(document, appearance.get(b"N").ok()?)? {
        Object::Dictionary(dict) => dict,
        _ => return None,
    };
    normal
        .iter()
        .map(|(key, _)| key)
        .find(|key| key.as_slice() != b"Off")
        .cloned()
}

/// PDF text strings are PDFDocEncoding unless they carry a UTF-16BE byte order mark.
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|byte| char::from(*byte)).collect()
}

pub(crate) fn encode_text_string(value: &str) -> Vec<u8> {
    if value.is_ascii() {
        return value.as_bytes().to_vec();
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    bytes
}
