//! Routes orders into the warehouse, packing-room, and high-volume streams.

use crate::config::SortThresholds;
use crate::order::{Fingerprint, Order};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Default, Clone, Serialize)]
pub struct WarehouseOrders {
    pub hazmat: Vec<Order>,
    pub ground: Vec<Order>,
}

impl WarehouseOrders {
    /// Hazmat first, then ground.
    pub fn all(&self) -> impl Iterator<Item = &Order> {
        self.hazmat.iter().chain(self.ground.iter())
    }

    pub fn len(&self) -> usize {
        self.hazmat.len() + self.ground.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Packing-room orders of one shipping class, split by how they are packed.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PackingCategories {
    /// One item, quantity one.
    pub single_item: Vec<Order>,
    /// One SKU, quantity above one.
    pub single_sku: Vec<Order>,
    /// Anything else.
    pub multi_sku: Vec<Order>,
}

impl PackingCategories {
    pub fn all(&self) -> impl Iterator<Item = &Order> {
        self.single_item
            .iter()
            .chain(self.single_sku.iter())
            .chain(self.multi_sku.iter())
    }

    pub fn len(&self) -> usize {
        self.single_item.len() + self.single_sku.len() + self.multi_sku.len()
    }

    fn bucket_mut(&mut self, order: &Order) -> &mut Vec<Order> {
        match (order.items.len(), order.qty_total) {
            (1, 1) => &mut self.single_item,
            (1, _) => &mut self.single_sku,
            _ => &mut self.multi_sku,
        }
    }

    fn sort_by_frequency(&mut self, counts: &HashMap<Fingerprint, usize>) {
        for bucket in [
            &mut self.single_item,
            &mut self.single_sku,
            &mut self.multi_sku,
        ] {
            bucket.sort_by_key(|order| {
                std::cmp::Reverse(counts.get(&order.fingerprint()).copied().unwrap_or(0))
            });
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct PackingRoomOrders {
    pub hazmat: PackingCategories,
    pub ground: PackingCategories,
}

impl PackingRoomOrders {
    pub fn all(&self) -> impl Iterator<Item = &Order> {
        self.hazmat.all().chain(self.ground.all())
    }

    pub fn len(&self) -> usize {
        self.hazmat.len() + self.ground.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A SKU popular enough to get its own output file.
#[derive(Debug, Clone, Serialize)]
pub struct HighVolumeSku {
    pub sku: String,
    /// Single-item orders seen for the SKU across the batch.
    pub count: usize,
    pub product_name: String,
    pub is_hazmat: bool,
    pub orders: Vec<Order>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SortedOrders {
    pub warehouse: WarehouseOrders,
    pub packingroom: PackingRoomOrders,
    /// In order of first appearance.
    pub high_volume: Vec<HighVolumeSku>,
}

impl SortedOrders {
    pub fn total(&self) -> usize {
        self.warehouse.len()
            + self.packingroom.len()
            + self
                .high_volume
                .iter()
                .map(|sku| sku.orders.len())
                .sum::<usize>()
    }
}

/// Sorts a batch.
///
/// Identical orders (same SKUs and quantities) travel together: the first
/// occurrence decides the bucket and the rest follow it. Warehouse buckets
/// are ordered by how often the SKU appears, packing-room buckets by how
/// often the exact order appears.
pub fn sort_orders(orders: Vec<Order>, thresholds: &SortThresholds) -> SortedOrders {
    let occurrences = single_item_occurrences(&orders);

    let mut high_volume: Vec<HighVolumeSku> = Vec::new();
    let mut high_volume_index: HashMap<String, usize> = HashMap::new();
    for order in &orders {
        let Some(sku) = order.single_sku() else {
            continue;
        };
        let count = occurrences.get(sku).copied().unwrap_or(0);
        if count < thresholds.high_volume_threshold || high_volume_index.contains_key(sku) {
            continue;
        }
        high_volume_index.insert(sku.to_string(), high_volume.len());
        high_volume.push(HighVolumeSku {
            sku: sku.to_string(),
            count,
            product_name: order.items[0].product_name.clone(),
            is_hazmat: order.is_hazmat,
            orders: Vec::new(),
        });
    }

    // fingerprint -> member indices, in first-seen order
    let mut groups: Vec<(Fingerprint, Vec<usize>)> = Vec::new();
    let mut group_index: HashMap<Fingerprint, usize> = HashMap::new();
    for (idx, order) in orders.iter().enumerate() {
        let fingerprint = order.fingerprint();
        match group_index.get(&fingerprint) {
            Some(&pos) => groups[pos].1.push(idx),
            None => {
                group_index.insert(fingerprint.clone(), groups.len());
                groups.push((fingerprint, vec![idx]));
            }
        }
    }
    let fingerprint_counts: HashMap<Fingerprint, usize> = groups
        .iter()
        .map(|(fingerprint, members)| (fingerprint.clone(), members.len()))
        .collect();

    let mut slots: Vec<Option<Order>> = orders.into_iter().map(Some).collect();
    let mut warehouse = WarehouseOrders::default();
    let mut packingroom = PackingRoomOrders::default();

    for (_, members) in &groups {
        let lead = match slots[members[0]].as_ref() {
            Some(order) => order,
            None => continue,
        };
        let is_hazmat = lead.is_hazmat;
        let single_item_sku = lead
            .is_single_item()
            .then(|| lead.items[0].sku.clone());

        let members: Vec<Order> = members
            .iter()
            .filter_map(|&idx| slots[idx].take())
            .collect();
        let Some(first) = members.first() else {
            continue;
        };

        if let Some(sku) = &single_item_sku {
            if let Some(&pos) = high_volume_index.get(sku) {
                high_volume[pos].orders.extend(members);
                continue;
            }
            if occurrences.get(sku).copied().unwrap_or(0) >= thresholds.warehouse_min_occurrences
            {
                if is_hazmat {
                    warehouse.hazmat.extend(members);
                } else {
                    warehouse.ground.extend(members);
                }
                continue;
            }
        }

        let class = if is_hazmat {
            &mut packingroom.hazmat
        } else {
            &mut packingroom.ground
        };
        let bucket = class.bucket_mut(first);
        bucket.extend(members);
    }

    let by_occurrence = |order: &Order| {
        std::cmp::Reverse(
            order
                .single_sku()
                .and_then(|sku| occurrences.get(sku).copied())
                .unwrap_or(0),
        )
    };
    warehouse.hazmat.sort_by_key(by_occurrence);
    warehouse.ground.sort_by_key(by_occurrence);
    packingroom.hazmat.sort_by_frequency(&fingerprint_counts);
    packingroom.ground.sort_by_frequency(&fingerprint_counts);

    SortedOrders {
        warehouse,
        packingroom,
        high_volume,
    }
}

/// Single-item orders per SKU.
pub fn single_item_occurrences(orders: &[Order]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for order in orders.iter().filter(|order| order.is_single_item()) {
        *counts.entry(order.items[0].sku.clone()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::testing::{item, order};

    fn thresholds(warehouse: usize, high_volume: usize) -> SortThresholds {
        SortThresholds {
            warehouse_min_occurrences: warehouse,
            high_volume_threshold: high_volume,
            label_count_min: warehouse,
        }
    }

    fn tagged(mut o: Order, label_page: usize) -> Order {
        o.label_page = label_page;
        o
    }

    #[test]
    fn frequent_single_items_go_to_warehouse() {
        let mut orders = Vec::new();
        for n in 0..5 {
            orders.push(tagged(order(vec![item("T1", 1)], false), n));
        }
        orders.push(tagged(order(vec![item("T2", 1)], false), 10));
        let sorted = sort_orders(orders, &thresholds(5, 100));
        assert_eq!(sorted.warehouse.ground.len(), 5);
        assert!(sorted.warehouse.hazmat.is_empty());
        assert_eq!(sorted.packingroom.ground.single_item.len(), 1);
        assert_eq!(sorted.packingroom.ground.single_item[0].label_page, 10);
    }

    #[test]
    fn warehouse_orders_by_sku_frequency_with_hazmat_first() {
        let mut orders = Vec::new();
        for n in 0..2 {
            orders.push(tagged(order(vec![item("T1", 1)], false), n));
        }
        for n in 0..3 {
            orders.push(tagged(order(vec![item("T2", 1)], false), 10 + n));
        }
        orders.push(tagged(order(vec![item("T3", 1)], true), 20));
        orders.push(tagged(order(vec![item("T3", 1)], true), 21));
        let sorted = sort_orders(orders, &thresholds(2, 100));
        let skus: Vec<&str> = sorted
            .warehouse
            .all()
            .map(|o| o.items[0].sku.as_str())
            .collect();
        assert_eq!(skus, vec!["T3", "T3", "T2", "T2", "T2", "T1", "T1"]);
    }

    #[test]
    fn packing_room_splits_categories_and_groups_identical_orders() {
        let orders = vec![
            tagged(order(vec![item("T1", 1), item("T2", 1)], false), 0),
            tagged(order(vec![item("T5", 2)], false), 2),
            tagged(order(vec![item("T9", 1)], false), 4),
            tagged(order(vec![item("T2", 1), item("T1", 1)], false), 6),
            tagged(order(vec![item("T7", 1), item("T8", 4)], false), 8),
        ];
        let sorted = sort_orders(orders, &thresholds(5, 100));
        let ground = &sorted.packingroom.ground;
        assert_eq!(ground.single_item.len(), 1);
        assert_eq!(ground.single_sku.len(), 1);
        let multi: Vec<usize> = ground.multi_sku.iter().map(|o| o.label_page).collect();
        // the pair of identical orders outranks the lone one
        assert_eq!(multi, vec![0, 6, 8]);
        let all: Vec<usize> = sorted.packingroom.all().map(|o| o.label_page).collect();
        assert_eq!(all, vec![4, 2, 0, 6, 8]);
    }

    #[test]
    fn hazmat_packing_orders_come_first() {
        let orders = vec![
            tagged(order(vec![item("T1", 1)], false), 0),
            tagged(order(vec![item("T2", 1)], true), 2),
        ];
        let sorted = sort_orders(orders, &thresholds(5, 100));
        let pages: Vec<usize> = sorted.packingroom.all().map(|o| o.label_page).collect();
        assert_eq!(pages, vec![2, 0]);
    }

    #[test]
    fn high_volume_skus_are_split_out() {
        let mut orders = Vec::new();
        for n in 0..4 {
            orders.push(tagged(order(vec![item("T4", 1)], true), n));
        }
        orders.push(tagged(order(vec![item("T4", 3)], false), 50));
        let sorted = sort_orders(orders, &thresholds(2, 4));
        assert_eq!(sorted.high_volume.len(), 1);
        let sku = &sorted.high_volume[0];
        assert_eq!(sku.sku, "T4");
        assert_eq!(sku.count, 4);
        assert!(sku.is_hazmat);
        assert_eq!(sku.orders.len(), 4);
        assert!(sorted.warehouse.is_empty());
        // the multi-quantity order is not single-item and stays in the packing room
        assert_eq!(sorted.packingroom.ground.single_sku.len(), 1);
    }

    #[test]
    fn identical_orders_follow_the_first_occurrence() {
        let mut first = order(vec![item("T6", 1)], true);
        first.label_page = 0;
        let mut twin = order(vec![item("T6", 1)], false);
        twin.label_page = 2;
        let sorted = sort_orders(vec![first, twin], &thresholds(5, 100));
        assert_eq!(sorted.packingroom.hazmat.single_item.len(), 2);
        assert!(sorted.packingroom.ground.single_item.is_empty());
    }

    #[test]
    fn every_order_lands_in_exactly_one_stream() {
        let mut orders = Vec::new();
        for n in 0..30 {
            let sku = format!("T{}", n % 4);
            let qty = if n % 7 == 0 { 2 } else { 1 };
            let mut items = vec![item(&sku, qty)];
            if n % 5 == 0 {
                items.push(item("T99", 1));
            }
            orders.push(tagged(order(items, n % 3 == 0), n));
        }
        let sorted = sort_orders(orders, &thresholds(3, 6));
        let mut pages: Vec<usize> = sorted
            .warehouse
            .all()
            .chain(sorted.packingroom.all())
            .chain(sorted.high_volume.iter().flat_map(|sku| sku.orders.iter()))
            .map(|o| o.label_page)
            .collect();
        pages.sort();
        assert_eq!(pages, (0..30).collect::<Vec<_>>());
        assert_eq!(sorted.total(), 30);
    }

    #[test]
    fn orders_without_items_land_in_multi_sku() {
        let empty = order(Vec::new(), false);
        let sorted = sort_orders(vec![empty], &thresholds(5, 100));
        assert_eq!(sorted.packingroom.ground.multi_sku.len(), 1);
    }
}
