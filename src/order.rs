use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_name: String,
    /// Empty when the slip lists the `Default` variation.
    pub variation: String,
    pub sku: String,
    pub qty: u32,
}

impl LineItem {
    /// Name as printed on pick lists: variation first when there is one.
    pub fn display_name(&self) -> String {
        if self.variation.is_empty() {
            self.product_name.clone()
        } else {
            format!("{} {}", self.variation, self.product_name)
        }
    }
}

/// One label plus the packing slips that ship with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    /// Index of the source PDF within the batch.
    pub source: usize,
    /// 0-based page index of the shipping label.
    pub label_page: usize,
    /// 0-based page indices of the packing slips, in document order.
    pub slip_pages: Vec<usize>,
    pub items: Vec<LineItem>,
    pub qty_total: u32,
    pub is_hazmat: bool,
    pub order_id: Option<String>,
    pub tracking_number: Option<String>,
}

pub type Fingerprint = Vec<(String, u32)>;

impl Order {
    /// Sorted `(sku, qty)` pairs; equal fingerprints mean identical orders.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut pairs: Fingerprint = self
            .items
            .iter()
            .map(|item| (item.sku.clone(), item.qty))
            .collect();
        pairs.sort();
        pairs
    }

    /// One line item with a total quantity of one.
    pub fn is_single_item(&self) -> bool {
        self.items.len() == 1 && self.qty_total == 1
    }

    pub fn single_sku(&self) -> Option<&str> {
        match self.items.as_slice() {
            [item] => Some(item.sku.as_str()),
            _ => None,
        }
    }

    pub fn has_multi_quantity(&self) -> bool {
        self.items.iter().any(|item| item.qty > 1)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn item(sku: &str, qty: u32) -> LineItem {
        LineItem {
            product_name: format!("Product {sku}"),
            variation: String::new(),
            sku: sku.to_string(),
            qty,
        }
    }

    pub fn order(items: Vec<LineItem>, hazmat: bool) -> Order {
        let qty_total = items.iter().map(|item| item.qty).sum();
        Order {
            source: 0,
            label_page: 0,
            slip_pages: vec![1],
            items,
            qty_total,
            is_hazmat: hazmat,
            order_id: None,
            tracking_number: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{item, order};

    #[test]
    fn fingerprint_ignores_item_order() {
        let a = order(vec![item("T2", 1), item("T1", 3)], false);
        let b = order(vec![item("T1", 3), item("T2", 1)], false);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(
            a.fingerprint(),
            order(vec![item("T1", 2), item("T2", 1)], false).fingerprint()
        );
    }

    #[test]
    fn single_item_requires_total_of_one() {
        assert!(order(vec![item("T1", 1)], false).is_single_item());
        assert!(!order(vec![item("T1", 2)], false).is_single_item());
        assert!(!order(vec![item("T1", 1), item("T2", 1)], false).is_single_item());
    }

    #[test]
    fn display_name_prefixes_variation() {
        let mut line = item("T9", 1);
        line.variation = "Blue".into();
        assert_eq!(line.display_name(), "Blue Product T9");
    }
}
