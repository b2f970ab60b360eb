use super::{PdfError, inherited, name};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: &[&[u8]] = &[b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Builds a new PDF out of pages picked from any number of source documents.
///
/// Pages are deep-copied together with every object they reach. Sources are
/// told apart by the caller-supplied key, so the same source can feed many
/// pages without duplicating shared fonts or images.
pub struct Assembler {
    target: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    copied: HashMap<(usize, ObjectId), ObjectId>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        let mut target = Document::with_version("1.5");
        let pages_id = target.new_object_id();
        Self {
            target,
            pages_id,
            kids: Vec::new(),
            copied: HashMap::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    pub fn append_page(
        &mut self,
        source_key: usize,
        source: &Document,
        page_id: ObjectId,
    ) -> Result<(), PdfError> {
        let mut page = source
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|err| PdfError::Structure(format!("page {page_id:?}: {err}")))?
            .clone();
        for key in INHERITABLE {
            if !page.has(key)
                && let Some(value) = inherited(source, page_id, key)
            {
                page.set(key.to_vec(), value.clone());
            }
        }
        page.remove(b"Parent");

        // a page reached earlier through a link keeps the id it was given
        let new_id = match self.copied.get(&(source_key, page_id)) {
            Some(&id) => id,
            None => {
                let id = self.target.new_object_id();
                self.copied.insert((source_key, page_id), id);
                id
            }
        };
        let mut copied = self.copy_dictionary(source_key, source, &page);
        copied.set("Parent", Object::Reference(self.pages_id));
        self.target
            .objects
            .insert(new_id, Object::Dictionary(copied));
        self.kids.push(Object::Reference(new_id));
        Ok(())
    }

    pub fn finish(mut self) -> Result<Vec<u8>, PdfError> {
        let mut pages = Dictionary::new();
        pages.set("Type", name("Pages"));
        pages.set("Count", Object::Integer(self.kids.len() as i64));
        pages.set("Kids", Object::Array(self.kids));
        self.target
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", name("Catalog"));
        catalog.set("Pages", Object::Reference(self.pages_id));
        let catalog_id = self.target.add_object(Object::Dictionary(catalog));
        self.target.trailer.set("Root", Object::Reference(catalog_id));

        self.target.compress();
        let mut buffer = Vec::new();
        self.target
            .save_to(&mut buffer)
            .map_err(|err| PdfError::Write(err.to_string()))?;
        Ok(buffer)
    }

    fn copy_object(&mut self, source_key: usize, source: &Document, object: &Object) -> Object {
        match object {
            Object::Reference(id) => Object::Reference(self.copy_reference(source_key, source, *id)),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.copy_object(source_key, source, item))
                    .collect(),
            ),
            Object::Dictionary(dict) => {
                Object::Dictionary(self.copy_dictionary(source_key, source, dict))
            }
            Object::Stream(stream) => {
                let mut copied = stream.clone();
                copied.dict = self.copy_dictionary(source_key, source, &stream.dict);
                Object::Stream(copied)
            }
            other => other.clone(),
        }
    }

    /// Copies a dictionary, dropping back-pointers into the source page tree.
    fn copy_dictionary(&mut self, source_key: usize, source: &Document, dict: &Dictionary) -> Dictionary {
        let is_annotation = matches!(dict.get(b"Type"), Ok(Object::Name(kind)) if kind.as_slice() == b"Annot");
        let mut copied = Dictionary::new();
        for (key, value) in dict.iter() {
            if key.as_slice() == b"Parent" || (is_annotation && key.as_slice() == b"P") {
                continue;
            }
            let value = self.copy_object(source_key, source, value);
            copied.set(key.clone(), value);
        }
        copied
    }

    fn copy_reference(&mut self, source_key: usize, source: &Document, id: ObjectId) -> ObjectId {
        if let Some(&mapped) = self.copied.get(&(source_key, id)) {
            return mapped;
        }
        let new_id = self.target.new_object_id();
        // registered before recursing so cycles terminate
        self.copied.insert((source_key, id), new_id);
        let copied = match source.get_object(id) {
            Ok(object) => self.copy_object(source_key, source, object),
            Err(_) => Object::Null,
        };
        self.target.objects.insert(new_id, copied);
        new_id
    }
}
