use super::{PicklistError, page_ranges};
use crate::order::Order;
use chrono::NaiveDate;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use std::collections::HashMap;

pub const SHEET_NAME: &str = "Warehouse Pick List";
const HEADERS: [&str; 6] = ["Item Name", "Qty", "SKU", "Pages", "Picked by", "Packed by"];
const COLUMN_WIDTHS: [f64; 6] = [45.0, 8.0, 12.0, 12.0, 15.0, 15.0];
const ROW_HEIGHT: f64 = 35.0;
const LAST_COLUMN: u16 = 5;

/// One pick-list line: every unit of a SKU across the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseRow {
    pub name: String,
    pub qty: u32,
    pub sku: String,
    /// Output page numbers the SKU ships on.
    pub pages: Vec<usize>,
}

/// Groups numbered orders by SKU, keeping the order in which SKUs first appear.
///
/// The name comes from the first occurrence, with the variation in front.
pub fn warehouse_rows<'a, I>(orders: I) -> Vec<WarehouseRow>
where
    I: IntoIterator<Item = (&'a Order, usize)>,
{
    let mut rows: Vec<WarehouseRow> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (order, page) in orders {
        for item in &order.items {
            let pos = *index.entry(item.sku.clone()).or_insert_with(|| {
                rows.push(WarehouseRow {
                    name: item.display_name(),
                    qty: 0,
                    sku: item.sku.clone(),
                    pages: Vec::new(),
                });
                rows.len() - 1
            });
            rows[pos].qty += item.qty;
            rows[pos].pages.push(page);
        }
    }
    rows
}

struct Formats {
    title: Format,
    date: Format,
    header: Format,
    header_centered: Format,
    name: Format,
    qty: Format,
    text: Format,
    signoff: Format,
}

impl Formats {
    fn new(shaded: bool) -> Self {
        let base = Format::new().set_font_name("Arial");
        let cell = {
            let format = base
                .clone()
                .set_font_size(13)
                .set_border(FormatBorder::Thin)
                .set_align(FormatAlign::VerticalCenter);
            if shaded {
                format.set_background_color(Color::RGB(0xF2F2F2))
            } else {
                format
            }
        };
        Self {
            title: base
                .clone()
                .set_font_size(16)
                .set_bold()
                .set_align(FormatAlign::Center),
            date: base.clone().set_font_size(13).set_align(FormatAlign::Center),
            header: base.clone().set_font_size(14).set_bold(),
            header_centered: base
                .set_font_size(14)
                .set_bold()
                .set_align(FormatAlign::Center),
            name: cell.clone().set_text_wrap(),
            qty: cell.clone().set_bold().set_align(FormatAlign::Center),
            text: cell.clone(),
            signoff: cell.set_align(FormatAlign::Center),
        }
    }
}

/// Renders the warehouse pick list workbook: hazmat rows first, then ground.
pub fn warehouse_workbook(
    hazmat: &[WarehouseRow],
    ground: &[WarehouseRow],
    date: NaiveDate,
) -> Result<Vec<u8>, PicklistError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;
    for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
        sheet.set_column_width(col as u16, *width)?;
    }

    let plain = Formats::new(false);
    let shaded = Formats::new(true);

    sheet.merge_range(0, 0, 0, LAST_COLUMN, "HAZMAT PICK LIST", &plain.title)?;
    sheet.merge_range(
        1,
        0,
        1,
        LAST_COLUMN,
        &date.format("%Y-%m-%d").to_string(),
        &plain.date,
    )?;
    for (col, header) in HEADERS.iter().enumerate() {
        let format = match *header {
            "Qty" | "Picked by" | "Packed by" => &plain.header_centered,
            _ => &plain.header,
        };
        sheet.write_string_with_format(2, col as u16, *header, format)?;
    }

    let mut row = 3;
    row = write_rows(sheet, row, hazmat, &plain, &shaded)?;

    // blank spacer row before the ground section
    row += 1;
    sheet.merge_range(row, 0, row, LAST_COLUMN, "GROUND PICK LIST", &plain.title)?;
    row += 1;
    write_rows(sheet, row, ground, &plain, &shaded)?;

    Ok(workbook.save_to_buffer()?)
}

fn write_rows(
    sheet: &mut Worksheet,
    mut row: u32,
    rows: &[WarehouseRow],
    plain: &Formats,
    shaded: &Formats,
) -> Result<u32, PicklistError> {
    for (counter, entry) in rows.iter().enumerate() {
        let formats = if counter % 2 == 1 { shaded } else { plain };
        sheet.write_string_with_format(row, 0, &entry.name, &formats.name)?;
        sheet.write_number_with_format(row, 1, f64::from(entry.qty), &formats.qty)?;
        sheet.write_string_with_format(row, 2, &entry.sku, &formats.text)?;
        sheet.write_string_with_format(row, 3, page_ranges(&entry.pages), &formats.text)?;
        sheet.write_blank(row, 4, &formats.signoff)?;
        sheet.write_blank(row, 5, &formats.signoff)?;
        sheet.set_row_height(row, ROW_HEIGHT)?;
        row += 1;
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::testing::{item, order};
    use std::io::{Cursor, Read};

    fn shared_strings(bytes: &[u8]) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("xlsx is a zip");
        let mut file = archive
            .by_name("xl/sharedStrings.xml")
            .expect("shared strings");
        let mut xml = String::new();
        file.read_to_string(&mut xml).expect("read");
        xml
    }

    #[test]
    fn rows_group_by_sku_in_first_seen_order() {
        let mut lotion = item("T200", 1);
        lotion.variation = "Large".to_string();
        let a = order(vec![item("T100", 1)], false);
        let b = order(vec![lotion.clone()], false);
        let c = order(vec![item("T100", 1)], false);

        let rows = warehouse_rows([(&a, 1), (&b, 2), (&c, 3)]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sku, "T100");
        assert_eq!(rows[0].qty, 2);
        assert_eq!(rows[0].pages, vec![1, 3]);
        assert_eq!(rows[1].name, "Large Product T200");
    }

    #[test]
    fn workbook_contains_both_sections() {
        let hazmat = order(vec![item("T1", 1)], true);
        let ground = order(vec![item("T2", 1)], false);
        let bytes = warehouse_workbook(
            &warehouse_rows([(&hazmat, 1)]),
            &warehouse_rows([(&ground, 2)]),
            NaiveDate::from_ymd_opt(2026, 3, 14).expect("date"),
        )
        .expect("render");

        let strings = shared_strings(&bytes);
        assert!(strings.contains("HAZMAT PICK LIST"));
        assert!(strings.contains("GROUND PICK LIST"));
        assert!(strings.contains("2026-03-14"));
        assert!(strings.contains("Product T1"));
        assert!(strings.contains("Picked by"));
    }

    #[test]
    fn empty_streams_still_render_titles() {
        let bytes = warehouse_workbook(
            &[],
            &[],
            NaiveDate::from_ymd_opt(2026, 1, 2).expect("date"),
        )
        .expect("render");
        assert!(bytes.starts_with(b"PK"));
        assert!(shared_strings(&bytes).contains("GROUND PICK LIST"));
    }
}
