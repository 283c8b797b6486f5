//! Appearance streams for filled text fields.
//!
//! Viewers built on PDFium or Preview render widgets from `/AP` and ignore
//! `/NeedAppearances`, so each text write regenerates a single-line appearance
//! from the field's default appearance string (`/DA`).

use lopdf::{Dictionary, Document, Object, Stream};

use super::field_tree::resolve;

const DEFAULT_APPEARANCE: &str = "/Helv 0 Tf 0 g";
const AUTO_SIZE_MAX: f32 = 12.0;
const AUTO_SIZE_MIN: f32 = 4.0;
const PADDING: f32 = 2.0;

pub(crate) fn string_entry(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key) {
        Ok(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

/// `/DR /Font` of the AcroForm.
pub(crate) fn font_resources(document: &Document, form: &Dictionary) -> Option<Dictionary> {
    let resources = match resolve(document, form.get(b"DR").ok()?)? {
        Object::Dictionary(dict) => dict,
        _ => return None,
    };
    match resolve(document, resources.get(b"Font").ok()?)? {
        Object::Dictionary(fonts) => Some(fonts.clone()),
        _ => None,
    }
}

#[derive(Debug, PartialEq)]
struct DefaultAppearance {
    font: String,
    size: f32,
    operators: String,
}

impl DefaultAppearance {
    fn parse(da: &str) -> Option<Self> {
        let tokens: Vec<&str> = da.split_whitespace().collect();
        let position = tokens.iter().position(|token| *token == "Tf")?;
        if position < 2 {
            return None;
        }
        let font = tokens[position - 2].strip_prefix('/')?.to_string();
        let size = tokens[position - 1].parse::<f32>().ok()?;
        let operators = tokens
            .iter()
            .enumerate()
            .filter(|(index, _)| !(position - 2..=position).contains(index))
            .map(|(_, token)| *token)
            .collect::<Vec<_>>()
            .join(" ");
        Some(Self {
            font,
            size,
            operators,
        })
    }

    /// A zero size means auto-fit to the widget height.
    fn resolved_size(&self, height: f32) -> f32 {
        if self.size > 0.0 {
            self.size
        } else {
            (height - 2.0 * PADDING).clamp(AUTO_SIZE_MIN, AUTO_SIZE_MAX)
        }
    }
}

/// Build the normal appearance for a text widget showing `value`.
///
/// Returns `None` when the widget has no usable `/Rect`.
pub(crate) fn text_appearance(
    document: &Document,
    widget: &Dictionary,
    da: Option<&str>,
    fonts: Option<&Dictionary>,
    value: &str,
) -> Option<Stream> {
    let (width, height) = widget_size(document, widget)?;
    let style = da
        .and_then(DefaultAppearance::parse)
        .or_else(|| DefaultAppearance::parse(DEFAULT_APPEARANCE))?;
    let size = style.resolved_size(height);
    let baseline = ((height - size) / 2.0 + 0.22 * size).max(1.0);

    let mut content = Vec::new();
    content.extend_from_slice(b"/Tx BMC\nq\n");
    content.extend_from_slice(
        format!(
            "1 1 {} {} re W n\nBT\n/{} {} Tf {}\n{PADDING} {baseline} Td\n",
            width - 2.0,
            height - 2.0,
            style.font,
            size,
            style.operators
        )
        .as_bytes(),
    );
    content.extend_from_slice(&literal(value));
    content.extend_from_slice(b" Tj\nET\nQ\nEMC\n");

    let font = fonts
        .and_then(|fonts| fonts.get(style.font.as_bytes()).ok().cloned())
        .unwrap_or_else(|| Object::Dictionary(helvetica()));
    let mut font_dict = Dictionary::new();
    font_dict.set(style.font.as_bytes().to_vec(), font);
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(font_dict));

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Form".to_vec()));
    dict.set(
        "BBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width),
            Object::Real(height),
        ]),
    );
    dict.set("Resources", Object::Dictionary(resources));
    Some(Stream::new(dict, content))
}

fn widget_size(document: &Document, widget: &Dictionary) -> Option<(f32, f32)> {
    let corners = match resolve(document, widget.get(b"Rect").ok()?)? {
        Object::Array(items) if items.len() == 4 => items
            .iter()
            .map(Object::as_float)
            .collect::<Result<Vec<f32>, _>>()
            .ok()?,
        _ => return None,
    };
    let width = (corners[2] - corners[0]).abs();
    let height = (corners[3] - corners[1]).abs();
    (width > 0.0 && height > 0.0).then_some((width, height))
}

fn helvetica() -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"Font".to_vec()));
    dict.set("Subtype", Object::Name(b"Type1".to_vec()));
    dict.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    dict.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    dict
}

/// Literal string in the single-byte encoding of the standard fonts.
/// Characters outside Latin-1 are shown as `?`.
fn literal(value: &str) -> Vec<u8> {
    let mut bytes = vec![b'('];
    for ch in value.chars() {
        match ch {
            '(' | ')' | '\\' => {
                bytes.push(b'\\');
                bytes.push(ch as u8);
            }
            ch if ch.is_control() => bytes.push(b' '),
            ch if (ch as u32) < 0x80 || (0xA0..=0xFF).contains(&(ch as u32)) => {
                bytes.push(ch as u32 as u8)
            }
            _ => bytes.push(b'?'),
        }
    }
    bytes.push(b')');
    bytes
}
