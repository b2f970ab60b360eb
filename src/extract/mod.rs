//! Text-level parsing of marketplace label exports.
//!
//! Everything here works on the plain text of a single page so it can be
//! tested without a PDF in hand.

pub mod fields;
pub mod items;
pub mod page;

pub use fields::{extract_order_id, extract_qty_total, extract_tracking_number, is_hazmat};
pub use items::extract_items;
pub use page::{OrderPages, PageKind, detect_page_kind, group_label_with_slips, pair_pages};
