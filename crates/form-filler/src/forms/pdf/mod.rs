//! AcroForm backend built on `lopdf`.

mod appearance;
mod field_tree;
pub mod sample;

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

use self::field_tree::{decode_text_string, dictionary, encode_text_string, on_state, FieldIndex};
use super::document::{FieldKind, FieldWriteError, FormCodec, FormDocument};
use super::engine::FormFillError;

const DEFAULT_ON_STATE: &[u8] = b"Yes";

/// Opens templates with [`PdfForm::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfCodec;

impl FormCodec for LopdfCodec {
    type Document = PdfForm;

    fn open(&self, template: &[u8]) -> Result<PdfForm, FormFillError> {
        PdfForm::load(template)
    }
}

#[derive(Debug, Clone, Copy)]
enum AcroFormLocation {
    Indirect(ObjectId),
    InCatalog(ObjectId),
}

/// A loaded PDF with its AcroForm field tree indexed by qualified name.
pub struct PdfForm {
    document: Document,
    acroform: AcroFormLocation,
    index: FieldIndex,
    needs_appearances: bool,
}

impl PdfForm {
    pub fn load(bytes: &[u8]) -> Result<Self, FormFillError> {
        let document = Document::load_mem(bytes).map_err(|err| {
            FormFillError::TemplateError(format!("template is not a readable PDF: {err}"))
        })?;

        let root_id = match document.trailer.get(b"Root") {
            Ok(Object::Reference(id)) => *id,
            _ => {
                return Err(FormFillError::TemplateError(
                    "document catalog is missing".to_string(),
                ))
            }
        };
        let catalog = dictionary(&document, root_id).ok_or_else(|| {
            FormFillError::TemplateError("document catalog is not a dictionary".to_string())
        })?;

        let (acroform, form_dict) = match catalog.get(b"AcroForm") {
            Ok(Object::Reference(id)) => (AcroFormLocation::Indirect(*id), dictionary(&document, *id)),
            Ok(Object::Dictionary(dict)) => (AcroFormLocation::InCatalog(root_id), Some(dict)),
            _ => (AcroFormLocation::InCatalog(root_id), None),
        };
        let form_dict = form_dict.ok_or_else(|| {
            FormFillError::TemplateError("PDF template does not contain a form".to_string())
        })?;

        let index = match form_dict
            .get(b"Fields")
            .ok()
            .and_then(|fields| field_tree::resolve(&document, fields))
        {
            Some(Object::Array(roots)) => FieldIndex::build(&document, roots),
            _ => FieldIndex::default(),
        };
        if index.is_empty() {
            return Err(FormFillError::TemplateError(
                "PDF form defines no fields".to_string(),
            ));
        }

        Ok(Self {
            document,
            acroform,
            index,
            needs_appearances: false,
        })
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.index.names()
    }

    pub fn field_kind(&self, field: &str) -> Option<FieldKind> {
        self.index.get(field).map(|node| node.kind)
    }

    /// Current `/V` of a text field.
    pub fn text_value(&self, field: &str) -> Option<String> {
        let node = self.index.get(field)?;
        match dictionary(&self.document, node.id)?.get(b"V") {
            Ok(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
            _ => None,
        }
    }

    pub fn is_checked(&self, field: &str) -> bool {
        let Some(node) = self.index.get(field) else {
            return false;
        };
        matches!(
            dictionary(&self.document, node.id).map(|dict| dict.get(b"V")),
            Some(Ok(Object::Name(state))) if state.as_slice() != b"Off"
        )
    }

    fn field_dict_mut(&mut self, id: ObjectId) -> Option<&mut lopdf::Dictionary> {
        match self.document.get_object_mut(id) {
            Ok(Object::Dictionary(dict)) => Some(dict),
            _ => None,
        }
    }

    fn lookup(&self, field: &str, expected: FieldKind) -> Result<(ObjectId, Vec<ObjectId>), FieldWriteError> {
        let node = self.index.get(field).ok_or(FieldWriteError::NotFound)?;
        if node.kind != expected {
            return Err(FieldWriteError::KindMismatch {
                expected,
                actual: node.kind,
            });
        }
        Ok((node.id, node.widgets.clone()))
    }

    fn acroform_dict(&self) -> Option<&Dictionary> {
        match self.acroform {
            AcroFormLocation::Indirect(id) => dictionary(&self.document, id),
            AcroFormLocation::InCatalog(root_id) => {
                match dictionary(&self.document, root_id)?.get(b"AcroForm") {
                    Ok(Object::Dictionary(form)) => Some(form),
                    _ => None,
                }
            }
        }
    }

    fn mark_need_appearances(&mut self) {
        let id = match self.acroform {
            AcroFormLocation::Indirect(id) => id,
            AcroFormLocation::InCatalog(root_id) => {
                if let Some(Ok(Object::Dictionary(form))) = self
                    .field_dict_mut(root_id)
                    .map(|catalog| catalog.get_mut(b"AcroForm"))
                {
                    form.set("NeedAppearances", Object::Boolean(true));
                }
                return;
            }
        };
        if let Some(form) = self.field_dict_mut(id) {
            form.set("NeedAppearances", Object::Boolean(true));
        }
    }
}

impl FormDocument for PdfForm {
    fn set_text(&mut self, field: &str, value: &str) -> Result<(), FieldWriteError> {
        let (id, widgets) = self.lookup(field, FieldKind::Text)?;

        if let Some(dict) = self.field_dict_mut(id) {
            dict.set(
                "V",
                Object::String(encode_text_string(value), StringFormat::Literal),
            );
        }
        let field_da = dictionary(&self.document, id)
            .and_then(|dict| appearance::string_entry(dict, b"DA"));
        let form = self.acroform_dict();
        let form_da = form.and_then(|dict| appearance::string_entry(dict, b"DA"));
        let fonts = form.and_then(|dict| appearance::font_resources(&self.document, dict));

        let streams: Vec<_> = widgets
            .iter()
            .map(|widget| {
                let stream = dictionary(&self.document, *widget).and_then(|dict| {
                    let da = appearance::string_entry(dict, b"DA")
                        .or_else(|| field_da.clone())
                        .or_else(|| form_da.clone());
                    appearance::text_appearance(
                        &self.document,
                        dict,
                        da.as_deref(),
                        fonts.as_ref(),
                        value,
                    )
                });
                (*widget, stream)
            })
            .collect();

        for (widget, stream) in streams {
            let normal = stream.map(|stream| self.document.add_object(Object::Stream(stream)));
            let Some(dict) = self.field_dict_mut(widget) else {
                continue;
            };
            match normal {
                Some(normal) => {
                    let mut states = Dictionary::new();
                    states.set("N", Object::Reference(normal));
                    dict.set("AP", Object::Dictionary(states));
                }
                // A stale appearance would keep showing the template's blank value.
                None => {
                    dict.remove(b"AP");
                }
            }
        }
        self.needs_appearances = true;
        Ok(())
    }

    fn check(&mut self, field: &str) -> Result<(), FieldWriteError> {
        let (id, widgets) = self.lookup(field, FieldKind::Checkbox)?;

        let widget_states: Vec<(ObjectId, Option<Vec<u8>>)> = widgets
            .iter()
            .map(|widget| {
                let state = dictionary(&self.document, *widget)
                    .and_then(|dict| on_state(&self.document, dict));
                (*widget, state)
            })
            .collect();
        let on = widget_states
            .iter()
            .find_map(|(_, state)| state.clone())
            .unwrap_or_else(|| DEFAULT_ON_STATE.to_vec());

        for (widget, state) in widget_states {
            let appearance = match state {
                Some(state) if state == on => on.clone(),
                None => on.clone(),
                Some(_) => b"Off".to_vec(),
            };
            if let Some(dict) = self.field_dict_mut(widget) {
                dict.set("AS", Object::Name(appearance));
            }
        }
        if let Some(dict) = self.field_dict_mut(id) {
            dict.set("V", Object::Name(on));
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>, FormFillError> {
        if self.needs_appearances {
            self.mark_need_appearances();
        }
        let mut bytes = Vec::new();
        self.document
            .save_to(&mut bytes)
            .map_err(|err| FormFillError::Output(err.to_string()))?;
        Ok(bytes)
    }
}
