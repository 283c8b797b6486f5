//! Minimal fillable template generator.
//!
//! Produces a one-page PDF whose AcroForm mirrors the 1040 naming scheme
//! (`topmostSubform[0].Page1[0].<field>`), for local runs and tests where the
//! published IRS template is not available.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::forms::engine::FormFillError;

const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const ROW_HEIGHT: i64 = 28;

#[derive(Debug, Clone)]
enum SampleField {
    Text { name: String },
    Checkbox { name: String, on_state: String },
}

/// Builder for a small fillable PDF.
#[derive(Debug, Clone)]
pub struct TemplateBuilder {
    fields: Vec<SampleField>,
    with_form: bool,
}

impl Default for TemplateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateBuilder {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            with_form: true,
        }
    }

    /// Page-one name, SSN, and wages fields plus the five filing status boxes.
    ///
    /// Checkbox on-states follow the published form: `c1_3[n]` turns on as `n + 1`.
    pub fn form1040() -> Self {
        let mut builder = Self::new()
            .text_field("f1_04[0]")
            .text_field("f1_05[0]")
            .text_field("f1_06[0]")
            .text_field("f1_31[0]");
        for index in 0..5 {
            builder = builder.checkbox(format!("c1_3[{index}]"), (index + 1).to_string());
        }
        builder
    }

    /// Adds a text field under `topmostSubform[0].Page1[0]`.
    pub fn text_field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(SampleField::Text { name: name.into() });
        self
    }

    pub fn checkbox(mut self, name: impl Into<String>, on_state: impl Into<String>) -> Self {
        self.fields.push(SampleField::Checkbox {
            name: name.into(),
            on_state: on_state.into(),
        });
        self
    }

    /// Drop a field added earlier, e.g. to model an older template revision.
    pub fn without_field(mut self, name: &str) -> Self {
        self.fields.retain(|field| match field {
            SampleField::Text { name: existing } | SampleField::Checkbox { name: existing, .. } => {
                existing != name
            }
        });
        self
    }

    /// Leave the AcroForm out of the catalog so the page is a flat document.
    pub fn without_form(mut self) -> Self {
        self.with_form = false;
        self
    }

    pub fn build(&self) -> Result<Vec<u8>, FormFillError> {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let page_id = document.new_object_id();
        let top_id = document.new_object_id();
        let page1_id = document.new_object_id();

        let mut field_ids = Vec::with_capacity(self.fields.len());
        for (row, field) in self.fields.iter().enumerate() {
            let top = PAGE_HEIGHT - 72 - ROW_HEIGHT * row as i64;
            let field_dict = match field {
                SampleField::Text { name } => text_widget(name, top, page_id, page1_id),
                SampleField::Checkbox { name, on_state } => {
                    checkbox_widget(&mut document, name, on_state, top, page_id, page1_id)
                }
            };
            field_ids.push(document.add_object(Object::Dictionary(field_dict)));
        }
        let field_refs = references(&field_ids);

        let mut page1 = Dictionary::new();
        page1.set("T", text("Page1[0]"));
        page1.set("Parent", Object::Reference(top_id));
        page1.set("Kids", Object::Array(field_refs.clone()));
        document
            .objects
            .insert(page1_id, Object::Dictionary(page1));

        let mut top = Dictionary::new();
        top.set("T", text("topmostSubform[0]"));
        top.set("Kids", Object::Array(vec![Object::Reference(page1_id)]));
        document.objects.insert(top_id, Object::Dictionary(top));

        let mut page = Dictionary::new();
        page.set("Type", name("Page"));
        page.set("Parent", Object::Reference(pages_id));
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ]),
        );
        page.set("Resources", Object::Dictionary(Dictionary::new()));
        if self.with_form {
            page.set("Annots", Object::Array(field_refs));
        }
        document.objects.insert(page_id, Object::Dictionary(page));

        let mut pages = Dictionary::new();
        pages.set("Type", name("Pages"));
        pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
        pages.set("Count", Object::Integer(1));
        document.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", name("Catalog"));
        catalog.set("Pages", Object::Reference(pages_id));
        if self.with_form {
            let roots = if field_ids.is_empty() {
                Vec::new()
            } else {
                vec![Object::Reference(top_id)]
            };
            let acroform_id = document.add_object(Object::Dictionary(acroform(roots)));
            catalog.set("AcroForm", Object::Reference(acroform_id));
        }
        let catalog_id = document.add_object(Object::Dictionary(catalog));
        document.trailer.set("Root", Object::Reference(catalog_id));

        let mut bytes = Vec::new();
        document
            .save_to(&mut bytes)
            .map_err(|err| FormFillError::Output(err.to_string()))?;
        Ok(bytes)
    }
}

fn text_widget(field: &str, top: i64, page_id: ObjectId, parent_id: ObjectId) -> Dictionary {
    let mut dict = widget_base(field, page_id, parent_id, rect(72, top, 360));
    dict.set("FT", name("Tx"));
    dict.set("DA", text("/Helv 10 Tf 0 g"));
    dict
}

fn checkbox_widget(
    document: &mut Document,
    field: &str,
    on_state: &str,
    top: i64,
    page_id: ObjectId,
    parent_id: ObjectId,
) -> Dictionary {
    let on_id = document.add_object(Object::Stream(appearance(b"0 g 2 2 8 8 re f".to_vec())));
    let off_id = document.add_object(Object::Stream(appearance(Vec::new())));

    let mut normal = Dictionary::new();
    normal.set(on_state.as_bytes().to_vec(), Object::Reference(on_id));
    normal.set("Off", Object::Reference(off_id));
    let mut states = Dictionary::new();
    states.set("N", Object::Dictionary(normal));

    let mut dict = widget_base(field, page_id, parent_id, rect(72, top, 12));
    dict.set("FT", name("Btn"));
    dict.set("V", name("Off"));
    dict.set("AS", name("Off"));
    dict.set("AP", Object::Dictionary(states));
    dict
}

fn widget_base(field: &str, page_id: ObjectId, parent_id: ObjectId, rect: Object) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", name("Annot"));
    dict.set("Subtype", name("Widget"));
    dict.set("T", text(field));
    dict.set("Parent", Object::Reference(parent_id));
    dict.set("P", Object::Reference(page_id));
    dict.set("Rect", rect);
    dict
}

fn appearance(content: Vec<u8>) -> Stream {
    let mut dict = Dictionary::new();
    dict.set("Type", name("XObject"));
    dict.set("Subtype", name("Form"));
    dict.set(
        "BBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(12),
            Object::Integer(12),
        ]),
    );
    Stream::new(dict, content)
}

fn acroform(roots: Vec<Object>) -> Dictionary {
    let mut helvetica = Dictionary::new();
    helvetica.set("Type", name("Font"));
    helvetica.set("Subtype", name("Type1"));
    helvetica.set("BaseFont", name("Helvetica"));
    let mut fonts = Dictionary::new();
    fonts.set("Helv", Object::Dictionary(helvetica));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));

    let mut form = Dictionary::new();
    form.set("Fields", Object::Array(roots));
    form.set("DA", text("/Helv 0 Tf 0 g"));
    form.set("DR", Object::Dictionary(resources));
    form
}

fn rect(left: i64, top: i64, width: i64) -> Object {
    Object::Array(vec![
        Object::Integer(left),
        Object::Integer(top - 12),
        Object::Integer(left + width),
        Object::Integer(top),
    ])
}

fn references(ids: &[ObjectId]) -> Vec<Object> {
    ids.iter().map(|id| Object::Reference(*id)).collect()
}

fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

fn text(value: &str) -> Object {
    Object::String(value.as_bytes().to_vec(), StringFormat::Literal)
}
