use crate::order::LineItem;
use once_cell::sync::Lazy;
use regex::Regex;

static SKU_QTY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(T\d+)\s+(\d+)").expect("sku/qty pattern"));

const DEFAULT_VARIATION: &str = "Default";

/// Pulls every line item out of a packing slip's product table.
///
/// The table starts at `Product Name` and ends at `Qty Total:`. Each
/// `T<digits> <qty>` pair closes an item whose name and variation are the
/// text between it and the previous pair (or the column header for the
/// first item).
pub fn extract_items(text: &str) -> Vec<LineItem> {
    let Some(start) = text.find("Product Name") else {
        return Vec::new();
    };
    let end = text[start..]
        .find("Qty Total:")
        .map(|pos| start + pos)
        .unwrap_or(text.len());
    let section = &text[start..end];

    let mut items = Vec::new();
    let mut previous_end: Option<usize> = None;
    for caps in SKU_QTY.captures_iter(section) {
        let (Some(whole), Some(sku), Some(qty)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let name_start = match previous_end.or_else(|| column_header_end(section)) {
            Some(pos) => pos,
            None => {
                previous_end = Some(whole.end());
                continue;
            }
        };
        previous_end = Some(whole.end());
        let Ok(qty) = qty.as_str().parse::<u32>() else {
            continue;
        };

        let product_text = section
            .get(name_start..whole.start())
            .unwrap_or_default()
            .trim();
        let (name, variation) = split_variation(product_text);
        items.push(LineItem {
            product_name: clean_name(&name),
            variation,
            sku: sku.as_str().to_string(),
            qty,
        });
    }
    items
}

/// End of the `Qty` column header that follows `Seller SKU`.
fn column_header_end(section: &str) -> Option<usize> {
    let seller = section.find("Seller SKU")?;
    section[seller..].find("Qty").map(|pos| seller + pos + "Qty".len())
}

fn split_variation(product_text: &str) -> (String, String) {
    if let Some(pos) = product_text.rfind(DEFAULT_VARIATION) {
        return (product_text[..pos].trim().to_string(), String::new());
    }
    let lines: Vec<&str> = product_text.split('\n').collect();
    match lines.split_last() {
        Some((last, rest)) if !rest.is_empty() => {
            let variation = last.trim();
            if SKU_QTY.is_match(variation) {
                (product_text.to_string(), String::new())
            } else {
                (rest.join("\n").trim().to_string(), variation.to_string())
            }
        }
        _ => (product_text.to_string(), String::new()),
    }
}

fn clean_name(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.contains("SKU") && !line.contains("Seller"))
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIP: &str = "Packing Slip\nOrder ID: 576100\nShip To: Dana\n\
Product Name SKU Seller SKU Qty\n\
Rose Perfume EDP\n50ml\nDefault T1001 1\n\
Cotton Tee\nLarge\nT2002 3\n\
Qty Total: 4\nThank you";

    #[test]
    fn parses_default_and_named_variations() {
        let items = extract_items(SLIP);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].sku, "T1001");
        assert_eq!(items[0].qty, 1);
        assert_eq!(items[0].product_name, "Rose Perfume EDP 50ml");
        assert_eq!(items[0].variation, "");
        assert_eq!(items[1].sku, "T2002");
        assert_eq!(items[1].qty, 3);
        assert_eq!(items[1].product_name, "Cotton Tee");
        assert_eq!(items[1].variation, "Large");
    }

    #[test]
    fn single_line_name_has_no_variation() {
        let text = "Product Name SKU Seller SKU Qty\nTravel Mug T77 2\nQty Total: 2";
        let items = extract_items(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_name, "Travel Mug");
        assert_eq!(items[0].variation, "");
        assert_eq!(items[0].qty, 2);
    }

    #[test]
    fn first_item_needs_column_header() {
        let text = "Product Name\nMug T1 1\nPlate T2 1\nQty Total: 2";
        let items = extract_items(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].sku, "T2");
        assert_eq!(items[0].product_name, "Plate");
    }

    #[test]
    fn lines_mentioning_sku_are_dropped_from_names() {
        let text = "Product Name SKU Seller SKU Qty\nGift Box\nSeller SKU GB-1\nDefault T5 1";
        let items = extract_items(text);
        assert_eq!(items[0].product_name, "Gift Box");
    }

    #[test]
    fn text_without_product_table_yields_nothing() {
        assert!(extract_items("SHIP FROM: x\nTracking Number: T100 2").is_empty());
    }

    #[test]
    fn table_stops_at_qty_total() {
        let text = "Product Name SKU Seller SKU Qty\nSoap Default T3 1\nQty Total: 1\nPromo T9 9";
        let items = extract_items(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_name, "Soap");
    }
}
