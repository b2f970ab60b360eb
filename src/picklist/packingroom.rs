use super::PicklistError;
use crate::order::Order;
use crate::sort::{PackingCategories, PackingRoomOrders};
use std::collections::HashMap;

const COLUMNS: [&str; 4] = ["SKU", "Product Name", "Variation", "Quantity"];

/// Best name and variation per SKU across the whole packing room.
#[derive(Default)]
struct Catalog {
    names: HashMap<String, String>,
    variations: HashMap<String, String>,
}

impl Catalog {
    fn build<'a>(orders: impl Iterator<Item = &'a Order>) -> Self {
        let mut catalog = Self::default();
        for item in orders.flat_map(|order| order.items.iter()) {
            let name = item.product_name.trim();
            if !name.is_empty() {
                let best = catalog.names.entry(item.sku.clone()).or_default();
                if name.len() > best.len() {
                    *best = name.to_string();
                }
            }
            let variation = item.variation.trim();
            if !variation.is_empty() {
                catalog
                    .variations
                    .entry(item.sku.clone())
                    .or_insert_with(|| variation.to_string());
            }
        }
        catalog
    }

    fn name(&self, sku: &str) -> &str {
        self.names.get(sku).map(String::as_str).unwrap_or("")
    }

    fn variation(&self, sku: &str) -> &str {
        self.variations.get(sku).map(String::as_str).unwrap_or("")
    }
}

/// Units per SKU, largest first, ties broken by SKU.
fn sku_totals(orders: &[Order]) -> Vec<(String, u32)> {
    let mut totals: HashMap<&str, u32> = HashMap::new();
    for item in orders.iter().flat_map(|order| order.items.iter()) {
        *totals.entry(item.sku.as_str()).or_default() += item.qty;
    }
    let mut rows: Vec<(String, u32)> = totals
        .into_iter()
        .map(|(sku, qty)| (sku.to_string(), qty))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows
}

/// Renders the packing-room pick list: a hazmat part and a ground part, each
/// with single-item, single-SKU, and multi-SKU sections.
pub fn packingroom_csv(orders: &PackingRoomOrders) -> Result<Vec<u8>, PicklistError> {
    let catalog = Catalog::build(orders.all());
    let parts: [(&str, &PackingCategories); 2] = [
        ("HAZMAT PICK LIST", &orders.hazmat),
        ("GROUND PICK LIST", &orders.ground),
    ];

    // csv writes an empty record as `""`, so sections are written
    // separately and joined with a bare newline
    let mut sections = Vec::with_capacity(parts.len() * 3);
    for (title, categories) in parts {
        let mut title = Some(title);
        for (heading, bucket) in [
            ("SINGLE ITEM ORDERS", &categories.single_item),
            ("SINGLE SKU ORDERS (MULTI QTY)", &categories.single_sku),
            ("MULTI SKU ORDERS", &categories.multi_sku),
        ] {
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .from_writer(Vec::new());
            if let Some(title) = title.take() {
                writer.write_record([title])?;
            }
            writer.write_record([heading])?;
            writer.write_record(COLUMNS)?;
            for (sku, qty) in sku_totals(bucket) {
                writer.write_record([
                    sku.as_str(),
                    catalog.name(&sku),
                    catalog.variation(&sku),
                    qty.to_string().as_str(),
                ])?;
            }
            let section = writer
                .into_inner()
                .map_err(|err| PicklistError::Flush(err.to_string()))?;
            sections.push(section);
        }
    }

    Ok(sections.join(&b"\n"[..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::testing::{item, order};

    fn lines(bytes: &[u8]) -> Vec<String> {
        String::from_utf8(bytes.to_vec())
            .expect("utf8")
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn sections_are_written_in_order() {
        let mut room = PackingRoomOrders::default();
        room.hazmat.single_item.push(order(vec![item("T1", 1)], true));
        room.ground.multi_sku.push(order(vec![item("T2", 1), item("T3", 2)], false));

        let out = lines(&packingroom_csv(&room).expect("csv"));
        let position = |needle: &str| {
            out.iter()
                .position(|line| line == needle)
                .unwrap_or_else(|| panic!("missing {needle}"))
        };
        assert_eq!(out[0], "HAZMAT PICK LIST");
        assert!(position("GROUND PICK LIST") > position("T1,Product T1,,1"));
        assert!(out.contains(&"T3,Product T3,,2".to_string()));
        assert_eq!(
            out.iter().filter(|line| *line == "SKU,Product Name,Variation,Quantity").count(),
            6
        );
        // no trailing spacer after the last section
        assert_eq!(out.last().map(String::as_str), Some("T2,Product T2,,1"));
    }

    #[test]
    fn rows_sort_by_quantity_then_sku() {
        let mut room = PackingRoomOrders::default();
        room.ground.single_sku.push(order(vec![item("T9", 2)], false));
        room.ground.single_sku.push(order(vec![item("T5", 2)], false));
        room.ground.single_sku.push(order(vec![item("T7", 3)], false));

        let out = lines(&packingroom_csv(&room).expect("csv"));
        let start = out
            .iter()
            .rposition(|line| line == "SINGLE SKU ORDERS (MULTI QTY)")
            .expect("section");
        assert_eq!(out[start + 2], "T7,Product T7,,3");
        assert_eq!(out[start + 3], "T5,Product T5,,2");
        assert_eq!(out[start + 4], "T9,Product T9,,2");
    }

    #[test]
    fn longest_name_and_first_variation_win() {
        let mut short = item("T4", 1);
        short.product_name = "Body Mist".to_string();
        let mut long = item("T4", 1);
        long.product_name = "Body Mist Vanilla Cream".to_string();
        long.variation = "8 oz".to_string();

        let mut room = PackingRoomOrders::default();
        room.ground.single_item.push(order(vec![short], false));
        room.hazmat.single_item.push(order(vec![long], true));

        let out = lines(&packingroom_csv(&room).expect("csv"));
        assert_eq!(
            out.iter().filter(|line| *line == "T4,Body Mist Vanilla Cream,8 oz,1").count(),
            2
        );
    }

    #[test]
    fn sections_are_separated_by_empty_lines() {
        let mut room = PackingRoomOrders::default();
        room.hazmat.single_item.push(order(vec![item("T1", 1)], true));

        let bytes = packingroom_csv(&room).expect("csv");
        let out = lines(&bytes);
        assert_eq!(out.iter().filter(|line| line.is_empty()).count(), 5);
        assert!(!out.iter().any(|line| line == "\"\""));
        let text = String::from_utf8(bytes).expect("utf8");
        assert!(text.contains("T1,Product T1,,1\n\nSINGLE SKU ORDERS (MULTI QTY)\n"));
        assert!(text.contains("\n\nGROUND PICK LIST\nSINGLE ITEM ORDERS\n"));
    }
}
