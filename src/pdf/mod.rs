//! PDF plumbing on top of `lopdf`: reading source exports, stamping pages,
//! and assembling output files from pages of several sources.

pub mod assemble;
pub mod source;
pub mod stamp;

pub use assemble::Assembler;
pub use source::SourceDocument;
pub use stamp::{Mark, PageBox};

use lopdf::{Document, Object, ObjectId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("could not read `{name}`: {reason}")]
    Load { name: String, reason: String },
    #[error("`{0}` is encrypted")]
    Encrypted(String),
    #[error("page {index} is out of range ({count} pages)")]
    PageOutOfRange { index: usize, count: usize },
    #[error("malformed document: {0}")]
    Structure(String),
    #[error("could not encode page content: {0}")]
    Encode(String),
    #[error("could not write document: {0}")]
    Write(String),
}

/// Follows references until a direct object is reached.
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    let mut current = object;
    // reference chains are short; the cap guards against cycles
    for _ in 0..32 {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

/// Looks up a page attribute, walking up the page tree for inherited keys.
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..64 {
        if let Ok(value) = node.get(key) {
            return resolve(doc, value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_object(parent).ok()?.as_dict().ok()?;
    }
    None
}

pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

pub(crate) fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}
