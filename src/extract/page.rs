use serde::Serialize;

const PACKING_SLIP_INDICATORS: &[&str] = &[
    "Order ID:",
    "Product Name",
    "SKU",
    "Qty Total:",
    "Packing Slip",
    "Ship To:",
];

const LABEL_INDICATORS: &[&str] = &[
    "SHIP FROM:",
    "DELIVER TO:",
    "Tracking Number:",
    "Carrier:",
    "Service:",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Label,
    PackingSlip,
}

pub fn detect_page_kind(text: &str) -> PageKind {
    // a product table settles it
    if text.contains("Product Name") && text.contains("SKU") {
        return PageKind::PackingSlip;
    }
    let slip_hits = count_hits(text, PACKING_SLIP_INDICATORS);
    let label_hits = count_hits(text, LABEL_INDICATORS);
    if slip_hits > label_hits {
        PageKind::PackingSlip
    } else {
        PageKind::Label
    }
}

fn count_hits(text: &str, indicators: &[&str]) -> usize {
    indicators
        .iter()
        .filter(|indicator| text.contains(*indicator))
        .count()
}

/// Page indices (0-based) that make up one shipment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPages {
    pub label: usize,
    pub slips: Vec<usize>,
}

/// Attaches every run of packing slips to the label in front of it.
///
/// Labels without slips are dropped, as are slips that appear before the
/// first label.
pub fn group_label_with_slips(kinds: &[PageKind]) -> Vec<OrderPages> {
    let mut groups = Vec::new();
    let mut idx = 0;
    while idx < kinds.len() {
        if kinds[idx] != PageKind::Label {
            idx += 1;
            continue;
        }
        let label = idx;
        let mut next = idx + 1;
        let mut slips = Vec::new();
        while next < kinds.len() && kinds[next] == PageKind::PackingSlip {
            slips.push(next);
            next += 1;
        }
        if !slips.is_empty() {
            groups.push(OrderPages { label, slips });
        }
        idx = next;
    }
    groups
}

/// Label/slip pairs for exports that carry no recognisable markers.
pub fn pair_pages(page_count: usize) -> Vec<OrderPages> {
    (0..page_count / 2)
        .map(|pair| OrderPages {
            label: pair * 2,
            slips: vec![pair * 2 + 1],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use PageKind::{Label, PackingSlip};

    #[test]
    fn product_table_means_packing_slip() {
        let text = "Tracking Number: 1Z\nCarrier: UPS\nProduct Name SKU Seller SKU Qty";
        assert_eq!(detect_page_kind(text), PackingSlip);
    }

    #[test]
    fn indicator_counts_decide_and_ties_go_to_label() {
        assert_eq!(
            detect_page_kind("SHIP FROM: a\nDELIVER TO: b\nTracking Number: 9400"),
            Label
        );
        assert_eq!(
            detect_page_kind("Packing Slip\nOrder ID: 1\nShip To: c"),
            PackingSlip
        );
        // one of each
        assert_eq!(detect_page_kind("Order ID: 1\nCarrier: USPS"), Label);
        assert_eq!(detect_page_kind(""), Label);
    }

    #[test]
    fn slips_attach_to_preceding_label() {
        let kinds = [Label, PackingSlip, PackingSlip, Label, PackingSlip];
        let groups = group_label_with_slips(&kinds);
        assert_eq!(
            groups,
            vec![
                OrderPages {
                    label: 0,
                    slips: vec![1, 2]
                },
                OrderPages {
                    label: 3,
                    slips: vec![4]
                },
            ]
        );
    }

    #[test]
    fn orphan_slips_and_bare_labels_are_skipped() {
        let kinds = [PackingSlip, Label, Label, PackingSlip, Label];
        let groups = group_label_with_slips(&kinds);
        assert_eq!(
            groups,
            vec![OrderPages {
                label: 2,
                slips: vec![3]
            }]
        );
    }

    #[test]
    fn pairing_ignores_trailing_page() {
        let pairs = pair_pages(5);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].label, 2);
        assert_eq!(pairs[1].slips, vec![3]);
        assert!(pair_pages(1).is_empty());
    }
}
