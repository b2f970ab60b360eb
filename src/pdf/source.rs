use super::stamp::{Mark, PageBox, apply_marks};
use super::{PdfError, inherited, number};
use lopdf::{Document, ObjectId};
use tracing::warn;

/// One uploaded label export, parsed and ready for reading and stamping.
pub struct SourceDocument {
    name: String,
    document: Document,
    pages: Vec<ObjectId>,
}

impl SourceDocument {
    pub fn load(name: impl Into<String>, bytes: &[u8]) -> Result<Self, PdfError> {
        let name = name.into();
        let document = Document::load_mem(bytes).map_err(|err| PdfError::Load {
            name: name.clone(),
            reason: err.to_string(),
        })?;
        Self::from_document(name, document)
    }

    /// Owner-password exports open with the empty user password; anything
    /// that needs a real password is refused.
    fn from_document(name: String, mut document: Document) -> Result<Self, PdfError> {
        if document.trailer.get(b"Encrypt").is_ok() {
            if let Err(err) = document.decrypt("") {
                warn!(
                    target = "labelsort.pdf",
                    file = %name,
                    error = %err,
                    "decrypt_failed"
                );
                return Err(PdfError::Encrypted(name));
            }
            document.trailer.remove(b"Encrypt");
        }
        let pages = document.get_pages().into_values().collect();
        Ok(Self {
            name,
            document,
            pages,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn page_id(&self, index: usize) -> Result<ObjectId, PdfError> {
        self.pages
            .get(index)
            .copied()
            .ok_or(PdfError::PageOutOfRange {
                index,
                count: self.pages.len(),
            })
    }

    /// Plain text of a page; unreadable content yields an empty string.
    pub fn page_text(&self, index: usize) -> String {
        let page_number = index as u32 + 1;
        match self.document.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    target = "labelsort.pdf",
                    file = %self.name,
                    page = page_number,
                    error = %err,
                    "text_extraction_failed"
                );
                String::new()
            }
        }
    }

    /// The page's MediaBox, falling back to US Letter.
    pub fn page_box(&self, index: usize) -> PageBox {
        let Ok(page_id) = self.page_id(index) else {
            return PageBox::LETTER;
        };
        inherited(&self.document, page_id, b"MediaBox")
            .and_then(|object| object.as_array().ok())
            .and_then(|values| {
                let coords: Vec<f32> = values.iter().filter_map(number).collect();
                match coords.as_slice() {
                    [x0, y0, x1, y1] => Some(PageBox {
                        x: x0.min(*x1),
                        y: y0.min(*y1),
                        width: (x1 - x0).abs(),
                        height: (y1 - y0).abs(),
                    }),
                    _ => None,
                }
            })
            .unwrap_or(PageBox::LETTER)
    }

    pub fn stamp(&mut self, index: usize, marks: &[Mark]) -> Result<(), PdfError> {
        let page_id = self.page_id(index)?;
        apply_marks(&mut self.document, page_id, marks)
    }
}
