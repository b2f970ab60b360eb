use super::{PdfError, inherited, name, resolve};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

const FONT_RESOURCE: &str = "LSHelvB";

const STICKER_WIDTH: f32 = 232.0;
const STICKER_HEIGHT: f32 = 100.0;

/// Visible page area in default user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PageBox {
    pub const LETTER: PageBox = PageBox {
        x: 0.0,
        y: 0.0,
        width: 612.0,
        height: 792.0,
    };
}

/// Something drawn on top of an existing page. Coordinates are absolute.
#[derive(Debug, Clone, PartialEq)]
pub enum Mark {
    Text {
        x: f32,
        y: f32,
        size: f32,
        text: String,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        width: f32,
    },
    HazmatSticker {
        x: f32,
        y: f32,
    },
}

/// `Page: n` in the bottom-right corner.
pub fn page_number(page: &PageBox, number: usize) -> Mark {
    text_at(page, page.width - 65.0, 20.0, 8.0, format!("Page: {number}"))
}

/// Page number for orders spread over several slips.
pub fn slip_page_number(page: &PageBox, number: usize, slip: usize, total: usize) -> Mark {
    text_at(
        page,
        page.width - 120.0,
        20.0,
        8.0,
        format!("Page: {number} (Slip {slip} of {total})"),
    )
}

/// `SKU: T123 (2 of 9)` in the bottom-left corner.
pub fn label_count(page: &PageBox, sku: &str, current: usize, total: usize) -> Mark {
    text_at(
        page,
        50.0,
        40.0,
        10.0,
        format!("SKU: {sku} ({current} of {total})"),
    )
}

pub fn multi_quantity_banner(page: &PageBox) -> Vec<Mark> {
    let x = page.x + 50.0;
    let y = page.y + 72.0;
    vec![
        Mark::Text {
            x,
            y,
            size: 14.0,
            text: "MULTI-QUANTITY ORDER".into(),
        },
        Mark::Line {
            from: (x, y - 5.0),
            to: (x + 180.0, y - 5.0),
            width: 1.5,
        },
    ]
}

pub fn hazmat_sticker(page: &PageBox) -> Mark {
    Mark::HazmatSticker {
        x: page.x + (page.width - STICKER_WIDTH) / 7.0,
        y: page.y + 0.5,
    }
}

fn text_at(page: &PageBox, dx: f32, dy: f32, size: f32, text: String) -> Mark {
    Mark::Text {
        x: page.x + dx,
        y: page.y + dy,
        size,
        text,
    }
}

impl Mark {
    fn operations(&self) -> Vec<Operation> {
        match self {
            Mark::Text { x, y, size, text } => {
                let mut ops = vec![op("q", vec![]), op("rg", vec![real(0.0), real(0.0), real(0.0)])];
                ops.extend(text_operations(*x, *y, *size, text));
                ops.push(op("Q", vec![]));
                ops
            }
            Mark::Line { from, to, width } => vec![
                op("q", vec![]),
                op("RG", vec![real(0.0), real(0.0), real(0.0)]),
                op("w", vec![real(*width)]),
                op("m", vec![real(from.0), real(from.1)]),
                op("l", vec![real(to.0), real(to.1)]),
                op("S", vec![]),
                op("Q", vec![]),
            ],
            Mark::HazmatSticker { x, y } => sticker_operations(*x, *y),
        }
    }
}

fn text_operations(x: f32, y: f32, size: f32, text: &str) -> Vec<Operation> {
    vec![
        op("BT", vec![]),
        op("Tf", vec![name(FONT_RESOURCE), real(size)]),
        op("Td", vec![real(x), real(y)]),
        op("Tj", vec![Object::string_literal(text)]),
        op("ET", vec![]),
    ]
}

/// White card with a limited-quantity diamond (black top and bottom
/// corners) and a caption.
fn sticker_operations(x: f32, y: f32) -> Vec<Operation> {
    let (w, h) = (STICKER_WIDTH, STICKER_HEIGHT);
    let cx = x + 50.0;
    let cy = y + h / 2.0;
    let r = 38.0;
    let half = r / 2.0;

    let mut ops = vec![
        op("q", vec![]),
        op("g", vec![real(1.0)]),
        op("re", vec![real(x), real(y), real(w), real(h)]),
        op("f", vec![]),
        op("G", vec![real(0.0)]),
        op("w", vec![real(2.0)]),
        op(
            "re",
            vec![real(x + 1.0), real(y + 1.0), real(w - 2.0), real(h - 2.0)],
        ),
        op("S", vec![]),
        op("g", vec![real(0.0)]),
    ];
    ops.extend(polygon(&[(cx, cy + r), (cx + r, cy), (cx, cy - r), (cx - r, cy)]));
    ops.push(op("f", vec![]));
    ops.push(op("g", vec![real(1.0)]));
    ops.extend(polygon(&[
        (cx - half, cy + half),
        (cx + half, cy + half),
        (cx + r - 1.5, cy),
        (cx + half, cy - half),
        (cx - half, cy - half),
        (cx - r + 1.5, cy),
    ]));
    ops.push(op("f", vec![]));
    ops.push(op("g", vec![real(0.0)]));
    ops.extend(text_operations(x + 100.0, cy + 4.0, 24.0, "HAZMAT"));
    ops.extend(text_operations(x + 100.0, cy - 16.0, 9.0, "LIMITED QUANTITY"));
    ops.push(op("Q", vec![]));
    ops
}

fn polygon(points: &[(f32, f32)]) -> Vec<Operation> {
    let mut ops = Vec::with_capacity(points.len() + 1);
    for (idx, (px, py)) in points.iter().enumerate() {
        let operator = if idx == 0 { "m" } else { "l" };
        ops.push(op(operator, vec![real(*px), real(*py)]));
    }
    ops.push(op("h", vec![]));
    ops
}

fn op(operator: &str, operands: Vec<Object>) -> Operation {
    Operation::new(operator, operands)
}

fn real(value: f32) -> Object {
    Object::Real(value)
}

/// Draws `marks` over the page.
///
/// The existing content is wrapped in `q`/`Q` so a leftover transform in
/// the original stream cannot move the overlay. The page gets its own
/// `Resources` dictionary carrying the overlay font.
pub fn apply_marks(doc: &mut Document, page_id: ObjectId, marks: &[Mark]) -> Result<(), PdfError> {
    if marks.is_empty() {
        return Ok(());
    }

    let overlay = Content {
        operations: marks.iter().flat_map(Mark::operations).collect::<Vec<_>>(),
    }
    .encode()
    .map_err(|err| PdfError::Encode(err.to_string()))?;

    let mut font = Dictionary::new();
    font.set("Type", name("Font"));
    font.set("Subtype", name("Type1"));
    font.set("BaseFont", name("Helvetica-Bold"));
    font.set("Encoding", name("WinAnsiEncoding"));
    let font_id = doc.add_object(Object::Dictionary(font));

    let resources = page_resources_with_font(doc, page_id, font_id);
    let existing = page_contents(doc, page_id)?;

    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let close_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay));

    let mut contents = Vec::with_capacity(existing.len() + 3);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(close_id));
    contents.push(Object::Reference(overlay_id));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|err| PdfError::Structure(format!("page {page_id:?}: {err}")))?;
    page.set("Contents", Object::Array(contents));
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

fn page_resources_with_font(doc: &Document, page_id: ObjectId, font_id: ObjectId) -> Dictionary {
    let mut resources = inherited(doc, page_id, b"Resources")
        .and_then(|object| object.as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new);
    let mut fonts = resources
        .get(b"Font")
        .ok()
        .and_then(|object| resolve(doc, object))
        .and_then(|object| object.as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new);
    fonts.set(FONT_RESOURCE, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));
    resources
}

fn page_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>, PdfError> {
    let page = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|err| PdfError::Structure(format!("page {page_id:?}: {err}")))?;
    let contents = match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(parts)) => parts.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(parts)) => parts.clone(),
        _ => Vec::new(),
    };
    Ok(contents)
}
