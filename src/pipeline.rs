use crate::config::{SortThresholds, SorterConfig};
use crate::extract::{
    PageKind, detect_page_kind, extract_items, extract_order_id, extract_qty_total,
    extract_tracking_number, group_label_with_slips, is_hazmat, pair_pages,
};
use crate::models::StageReport;
use crate::order::Order;
use crate::pdf::stamp::{
    hazmat_sticker, label_count, multi_quantity_banner, page_number, slip_page_number,
};
use crate::pdf::{Assembler, Mark, PdfError, SourceDocument};
use crate::picklist::{packingroom_csv, warehouse_rows, warehouse_workbook};
use crate::sort::{HighVolumeSku, SortedOrders, WarehouseOrders, sort_orders};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::info;

pub const WAREHOUSE_LABELS: &str = "warehouse_labels.pdf";
pub const WAREHOUSE_PICKLIST: &str = "warehouse_picklist.xlsx";
pub const PACKINGROOM_LABELS: &str = "packingroom_labels.pdf";
pub const PACKINGROOM_PICKLIST: &str = "packingroom_pick_list.csv";

/// An uploaded file, as received.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Per-batch overrides of the configured defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchOptions {
    #[serde(default)]
    pub hazmat_keywords: Option<Vec<String>>,
    #[serde(default)]
    pub hazmat_sticker: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchInput {
    pub files: Vec<SourceFile>,
    pub options: BatchOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Pdf,
    Xlsx,
    Csv,
}

impl OutputKind {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputKind::Pdf => "application/pdf",
            OutputKind::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            OutputKind::Csv => "text/csv; charset=utf-8",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputFile {
    pub name: String,
    pub kind: OutputKind,
    pub bytes: Vec<u8>,
}

impl OutputFile {
    fn new(name: impl Into<String>, kind: OutputKind, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind,
            bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HighVolumeSummary {
    pub sku: String,
    pub product_name: String,
    pub count: usize,
    pub is_hazmat: bool,
    pub file: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_orders: usize,
    /// Orders whose label carried a readable tracking number.
    pub tracked_orders: usize,
    pub duplicate_orders: usize,
    pub duplicate_details: Vec<String>,
    pub multi_slip_orders: usize,
    pub max_slips_per_order: usize,
    pub source_pages: usize,
    pub warehouse_orders: usize,
    pub warehouse_hazmat: usize,
    pub warehouse_ground: usize,
    pub packingroom_orders: usize,
    pub packingroom_hazmat: usize,
    pub packingroom_ground: usize,
    pub high_volume: Vec<HighVolumeSummary>,
    pub processing_time: String,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub summary: BatchSummary,
    pub files: Vec<OutputFile>,
    pub stages: Vec<StageReport>,
    pub log: Vec<String>,
}

#[derive(Clone)]
pub struct Pipeline {
    pub config: Arc<SorterConfig>,
}

impl Pipeline {
    pub fn new(config: SorterConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn from_env() -> Self {
        Self::new(SorterConfig::from_env())
    }

    pub fn run(&self, input: BatchInput) -> Result<BatchOutcome, PipelineError> {
        let started = Instant::now();
        let settings = self.settings(&input.options);
        let mut stages = Vec::new();
        let mut log = StatusLog::default();

        let mut documents = capture_stage("load_documents", &mut stages, || {
            stages::load_documents(input.files, &mut log)
        })?;

        let grouped = capture_stage("group_orders", &mut stages, || {
            stages::group_orders(&mut documents, &settings, &mut log)
        })?;

        log.push(format!("Sorting {} orders...", grouped.orders.len()));
        let sorted = capture_stage("sort_orders", &mut stages, || {
            Ok(stages::sort(grouped.orders, &settings.thresholds))
        })?;

        let mut files = Vec::new();
        let (high_volume_files, high_volume) =
            capture_stage("render_high_volume", &mut stages, || {
                stages::render_high_volume(&mut documents, &sorted.high_volume, &mut log)
            })?;
        files.extend(high_volume_files);

        files.extend(capture_stage("render_warehouse", &mut stages, || {
            stages::render_warehouse(
                &mut documents,
                &sorted.warehouse,
                settings.thresholds.label_count_min,
                &mut log,
            )
        })?);

        files.extend(capture_stage("render_packingroom", &mut stages, || {
            stages::render_packingroom(&mut documents, &sorted, &mut log)
        })?);

        let summary = BatchSummary {
            total_orders: sorted.total(),
            tracked_orders: grouped.tracked_orders,
            duplicate_orders: grouped.duplicates.len(),
            duplicate_details: grouped.duplicate_details,
            multi_slip_orders: grouped.multi_slip_orders,
            max_slips_per_order: grouped.max_slips_per_order,
            source_pages: grouped.source_pages,
            warehouse_orders: sorted.warehouse.len(),
            warehouse_hazmat: sorted.warehouse.hazmat.len(),
            warehouse_ground: sorted.warehouse.ground.len(),
            packingroom_orders: sorted.packingroom.len(),
            packingroom_hazmat: sorted.packingroom.hazmat.len(),
            packingroom_ground: sorted.packingroom.ground.len(),
            high_volume,
            processing_time: format_processing_time(started.elapsed()),
        };
        log.summary(&summary);

        Ok(BatchOutcome {
            summary,
            files,
            stages,
            log: log.into_lines(),
        })
    }

    fn settings(&self, options: &BatchOptions) -> SorterConfig {
        let mut settings = (*self.config).clone();
        if let Some(keywords) = options
            .hazmat_keywords
            .as_ref()
            .filter(|keywords| keywords.iter().any(|k| !k.trim().is_empty()))
        {
            settings.hazmat_keywords = keywords.clone();
        }
        if let Some(sticker) = options.hazmat_sticker {
            settings.hazmat_sticker = sticker;
        }
        settings
    }
}

fn capture_stage<T>(
    name: &'static str,
    stages: &mut Vec<StageReport>,
    run: impl FnOnce() -> Result<StageOutcome<T>, PipelineError>,
) -> Result<T, PipelineError> {
    let started = Instant::now();
    let outcome = run()?;
    let elapsed_ms = started.elapsed().as_millis();
    crate::metrics::stage_elapsed(name, elapsed_ms);
    stages.push(StageReport::new(name, elapsed_ms, outcome.output));
    Ok(outcome.value)
}

/// `12.3 seconds` under a minute, `2 min 5.0 sec` above.
pub fn format_processing_time(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1} seconds")
    } else {
        let minutes = (secs / 60.0).floor();
        format!("{} min {:.1} sec", minutes as u64, secs - minutes * 60.0)
    }
}

/// Human-readable progress lines, mirrored to the tracing subscriber.
#[derive(Default)]
struct StatusLog {
    lines: Vec<String>,
}

impl StatusLog {
    fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        info!(target = "labelsort.pipeline", "{line}");
        self.lines.push(line);
    }

    fn summary(&mut self, summary: &BatchSummary) {
        self.push("--- ORDER SUMMARY ---");
        self.push(format!("Total Orders: {}", summary.total_orders));
        if summary.multi_slip_orders > 0 {
            self.push(format!("Multi-slip Orders: {}", summary.multi_slip_orders));
            self.push(format!(
                "Max Slips per Order: {}",
                summary.max_slips_per_order
            ));
        }
        self.push(format!("Duplicate Orders: {}", summary.duplicate_orders));
        self.push(format!("Processing Time: {}", summary.processing_time));
        self.push(format!("Warehouse Orders: {}", summary.warehouse_orders));
        self.push(format!("  - Hazmat: {}", summary.warehouse_hazmat));
        self.push(format!("  - Ground: {}", summary.warehouse_ground));
        self.push(format!("Packingroom Orders: {}", summary.packingroom_orders));
        self.push(format!("  - Hazmat: {}", summary.packingroom_hazmat));
        self.push(format!("  - Ground: {}", summary.packingroom_ground));
    }

    fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// Orders read out of every source document, plus what was noticed on the way.
struct GroupedOrders {
    orders: Vec<Order>,
    tracked_orders: usize,
    duplicates: HashSet<String>,
    duplicate_details: Vec<String>,
    multi_slip_orders: usize,
    max_slips_per_order: usize,
    source_pages: usize,
}

mod stages {
    use super::*;

    pub(super) fn load_documents(
        files: Vec<SourceFile>,
        log: &mut StatusLog,
    ) -> Result<StageOutcome<Vec<SourceDocument>>, PipelineError> {
        let (pdfs, skipped): (Vec<_>, Vec<_>) = files
            .into_iter()
            .partition(|file| file.name.to_lowercase().ends_with(".pdf"));
        for file in &skipped {
            log.push(format!("Skipping non-PDF upload: {}", file.name));
        }
        if pdfs.is_empty() {
            return Err(PipelineError::invalid_input(
                "load_documents",
                "no PDF files in batch",
            ));
        }

        log.push(format!("Found {} PDF files to process.", pdfs.len()));
        let mut documents = Vec::with_capacity(pdfs.len());
        for file in pdfs {
            let document = SourceDocument::load(file.name, &file.bytes)
                .map_err(|err| PipelineError::invalid_input("load_documents", err.to_string()))?;
            documents.push(document);
        }
        let names: Vec<&str> = documents.iter().map(SourceDocument::name).collect();
        let pages: usize = documents.iter().map(SourceDocument::page_count).sum();
        let output = json!({
            "files": names,
            "skipped": skipped.len(),
            "pages": pages,
        });
        Ok(StageOutcome::new(documents, output))
    }

    pub(super) fn group_orders(
        documents: &mut [SourceDocument],
        settings: &SorterConfig,
        log: &mut StatusLog,
    ) -> Result<StageOutcome<GroupedOrders>, PipelineError> {
        let mut grouped = GroupedOrders {
            orders: Vec::new(),
            tracked_orders: 0,
            duplicates: HashSet::new(),
            duplicate_details: Vec::new(),
            multi_slip_orders: 0,
            max_slips_per_order: 1,
            source_pages: 0,
        };
        let mut seen_tracking: HashSet<String> = HashSet::new();
        let mut fallback_files = 0;

        for (source, document) in documents.iter_mut().enumerate() {
            let page_count = document.page_count();
            grouped.source_pages += page_count;
            log.push(format!("Processing: {}", document.name()));
            log.push(format!(
                "  - {page_count} pages found in {}",
                document.name()
            ));

            let texts: Vec<String> = (0..page_count).map(|i| document.page_text(i)).collect();
            let kinds: Vec<PageKind> = texts.iter().map(|text| detect_page_kind(text)).collect();
            let mut groups = group_label_with_slips(&kinds);
            if groups.is_empty() {
                fallback_files += 1;
                log.push(format!(
                    "  - Using two-page pairing for {}",
                    document.name()
                ));
                groups = pair_pages(page_count);
            } else {
                log.push(format!(
                    "  - Using multi-slip processing for {}",
                    document.name()
                ));
            }

            for group in groups {
                if group.slips.len() > 1 {
                    grouped.multi_slip_orders += 1;
                    grouped.max_slips_per_order =
                        grouped.max_slips_per_order.max(group.slips.len());
                }

                let mut order = Order {
                    source,
                    label_page: group.label,
                    slip_pages: group.slips.clone(),
                    items: Vec::new(),
                    qty_total: 0,
                    is_hazmat: false,
                    order_id: None,
                    tracking_number: extract_tracking_number(&texts[group.label]),
                };
                for &slip in &group.slips {
                    let text = &texts[slip];
                    if order.order_id.is_none() {
                        order.order_id = extract_order_id(text);
                    }
                    let items = extract_items(text);
                    order.qty_total += extract_qty_total(text);
                    order.is_hazmat |= is_hazmat(text, &settings.hazmat_keywords);
                    if items.iter().any(|item| item.qty > 1) {
                        let banner = multi_quantity_banner(&document.page_box(slip));
                        document
                            .stamp(slip, &banner)
                            .map_err(|err| stamp_failed("group_orders", err))?;
                    }
                    order.items.extend(items);
                }

                if let Some(tracking) = &order.tracking_number {
                    grouped.tracked_orders += 1;
                    if !seen_tracking.insert(tracking.clone()) {
                        grouped.duplicates.insert(tracking.clone());
                        grouped.duplicate_details.push(format!(
                            "Tracking: {tracking}, Order: {}",
                            order.order_id.as_deref().unwrap_or("None")
                        ));
                        log.push(format!("  - Found duplicate tracking number: {tracking}"));
                    }
                }

                if order.is_hazmat {
                    if settings.hazmat_sticker {
                        log.push("  - Hazmat keyword found, adding sticker to label");
                        let sticker = hazmat_sticker(&document.page_box(order.label_page));
                        document
                            .stamp(order.label_page, &[sticker])
                            .map_err(|err| stamp_failed("group_orders", err))?;
                    } else {
                        log.push("  - Hazmat keyword found, but stickers disabled");
                    }
                }
                grouped.orders.push(order);
            }
        }

        let output = json!({
            "orders": grouped.orders.len(),
            "hazmat": grouped.orders.iter().filter(|order| order.is_hazmat).count(),
            "duplicates": grouped.duplicates.len(),
            "multi_slip_orders": grouped.multi_slip_orders,
            "paired_fallback_files": fallback_files,
        });
        Ok(StageOutcome::new(grouped, output))
    }

    pub(super) fn sort(
        orders: Vec<Order>,
        thresholds: &SortThresholds,
    ) -> StageOutcome<SortedOrders> {
        let sorted = sort_orders(orders, thresholds);
        let output = json!({
            "warehouse": sorted.warehouse.len(),
            "packingroom": sorted.packingroom.len(),
            "high_volume_skus": sorted.high_volume.iter().map(|sku| sku.sku.as_str()).collect::<Vec<_>>(),
        });
        StageOutcome::new(sorted, output)
    }

    pub(super) fn render_high_volume(
        documents: &mut [SourceDocument],
        high_volume: &[HighVolumeSku],
        log: &mut StatusLog,
    ) -> Result<StageOutcome<(Vec<OutputFile>, Vec<HighVolumeSummary>)>, PipelineError> {
        let mut files = Vec::new();
        let mut summaries = Vec::new();
        for entry in high_volume {
            log.push(format!(
                "Found high-volume SKU: {} - {} ({} orders)",
                entry.sku, entry.product_name, entry.count
            ));
            let name = format!("sku_{}_{}.pdf", entry.sku, entry.count);
            let total = entry.orders.len();
            let mut current = 0;
            let bytes = render_stream(documents, entry.orders.iter(), |_| {
                current += 1;
                Some((entry.sku.clone(), current, total))
            })
            .map_err(|err| render_failed("render_high_volume", err))?;
            log.push(format!("Created separate file for SKU {}: {name}", entry.sku));
            summaries.push(HighVolumeSummary {
                sku: entry.sku.clone(),
                product_name: entry.product_name.clone(),
                count: entry.count,
                is_hazmat: entry.is_hazmat,
                file: name.clone(),
            });
            files.push(OutputFile::new(name, OutputKind::Pdf, bytes));
        }
        let output = json!({ "files": summaries.iter().map(|s| s.file.as_str()).collect::<Vec<_>>() });
        Ok(StageOutcome::new((files, summaries), output))
    }

    pub(super) fn render_warehouse(
        documents: &mut [SourceDocument],
        warehouse: &WarehouseOrders,
        label_count_min: usize,
        log: &mut StatusLog,
    ) -> Result<StageOutcome<Vec<OutputFile>>, PipelineError> {
        if warehouse.is_empty() {
            return Ok(StageOutcome::new(Vec::new(), json!({ "skipped": true })));
        }

        let mut sku_totals: HashMap<&str, usize> = HashMap::new();
        for order in warehouse.all() {
            if let Some(sku) = order.single_sku() {
                *sku_totals.entry(sku).or_default() += 1;
            }
        }
        let mut sku_counters: HashMap<String, usize> = HashMap::new();
        let pdf = render_stream(documents, warehouse.all(), |order| {
            let sku = order.single_sku()?;
            let total = sku_totals.get(sku).copied().unwrap_or(0);
            if total < label_count_min {
                return None;
            }
            let current = sku_counters.entry(sku.to_string()).or_default();
            *current += 1;
            Some((sku.to_string(), *current, total))
        })
        .map_err(|err| render_failed("render_warehouse", err))?;
        log.push(format!("Warehouse labels saved to {WAREHOUSE_LABELS}"));

        let hazmat_rows = warehouse_rows(warehouse.hazmat.iter().zip(1..));
        let ground_rows =
            warehouse_rows(warehouse.ground.iter().zip(warehouse.hazmat.len() + 1..));
        let picklist = warehouse_workbook(&hazmat_rows, &ground_rows, Local::now().date_naive())
            .map_err(|err| PipelineError::internal("render_warehouse", err.to_string()))?;
        log.push(format!("Warehouse pick list saved to {WAREHOUSE_PICKLIST}"));

        let output = json!({
            "orders": warehouse.len(),
            "picklist_rows": hazmat_rows.len() + ground_rows.len(),
        });
        Ok(StageOutcome::new(
            vec![
                OutputFile::new(WAREHOUSE_LABELS, OutputKind::Pdf, pdf),
                OutputFile::new(WAREHOUSE_PICKLIST, OutputKind::Xlsx, picklist),
            ],
            output,
        ))
    }

    pub(super) fn render_packingroom(
        documents: &mut [SourceDocument],
        sorted: &SortedOrders,
        log: &mut StatusLog,
    ) -> Result<StageOutcome<Vec<OutputFile>>, PipelineError> {
        let packingroom = &sorted.packingroom;
        if packingroom.is_empty() {
            return Ok(StageOutcome::new(Vec::new(), json!({ "skipped": true })));
        }
        let pdf = render_stream(documents, packingroom.all(), |_| None)
            .map_err(|err| render_failed("render_packingroom", err))?;
        log.push(format!("Packingroom labels saved to {PACKINGROOM_LABELS}"));

        let csv = packingroom_csv(packingroom)
            .map_err(|err| PipelineError::internal("render_packingroom", err.to_string()))?;
        log.push(format!("Packingroom pick list saved to {PACKINGROOM_PICKLIST}"));

        let output = json!({
            "orders": packingroom.len(),
            "hazmat": packingroom.hazmat.len(),
            "ground": packingroom.ground.len(),
        });
        Ok(StageOutcome::new(
            vec![
                OutputFile::new(PACKINGROOM_LABELS, OutputKind::Pdf, pdf),
                OutputFile::new(PACKINGROOM_PICKLIST, OutputKind::Csv, csv),
            ],
            output,
        ))
    }

    /// Writes one output PDF: each order's label followed by its slips.
    ///
    /// Page numbers count orders, starting at 1. `label_count` is asked once
    /// per order and its answer lands on the first slip.
    fn render_stream<'a>(
        documents: &mut [SourceDocument],
        orders: impl Iterator<Item = &'a Order>,
        mut label_count_for: impl FnMut(&Order) -> Option<(String, usize, usize)>,
    ) -> Result<Vec<u8>, PdfError> {
        let mut assembler = Assembler::new();
        for (order, number) in orders.zip(1usize..) {
            let document = documents
                .get_mut(order.source)
                .ok_or_else(|| PdfError::Structure(format!("unknown source {}", order.source)))?;
            let label_id = document.page_id(order.label_page)?;
            assembler.append_page(order.source, document.document(), label_id)?;

            let slip_total = order.slip_pages.len();
            let count = label_count_for(order);
            for (position, &slip) in order.slip_pages.iter().enumerate() {
                let page = document.page_box(slip);
                let mut marks: Vec<Mark> = Vec::with_capacity(2);
                if slip_total > 1 {
                    marks.push(slip_page_number(&page, number, position + 1, slip_total));
                } else {
                    marks.push(page_number(&page, number));
                }
                if position == 0
                    && let Some((sku, current, total)) = &count
                {
                    marks.push(label_count(&page, sku, *current, *total));
                }
                document.stamp(slip, &marks)?;
                let slip_id = document.page_id(slip)?;
                assembler.append_page(order.source, document.document(), slip_id)?;
            }
        }
        assembler.finish()
    }

    fn stamp_failed(stage: &'static str, err: PdfError) -> PipelineError {
        PipelineError::internal(stage, format!("stamping failed: {err}"))
    }

    fn render_failed(stage: &'static str, err: PdfError) -> PipelineError {
        PipelineError::internal(stage, err.to_string())
    }
}

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct PipelineError {
    stage: &'static str,
    message: String,
    kind: PipelineErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    InvalidInput,
    Internal,
}

impl PipelineError {
    pub fn invalid_input(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::InvalidInput,
        }
    }

    pub fn internal(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::Internal,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> PipelineErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

#[derive(Debug)]
pub struct StageOutcome<T> {
    pub value: T,
    pub output: Value,
}

impl<T> StageOutcome<T> {
    fn new(value: T, output: Value) -> Self {
        Self { value, output }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{build_pdf, label, slip};

    /// One PDF holding a label + slip per `(tracking, order_id, name, sku, qty)`.
    fn batch_pdf(orders: &[(&str, &str, &str, &str, u32)]) -> Vec<u8> {
        let pages: Vec<String> = orders
            .iter()
            .flat_map(|(tracking, order_id, name, sku, qty)| {
                [label(tracking), slip(order_id, name, sku, *qty)]
            })
            .collect();
        let refs: Vec<&str> = pages.iter().map(String::as_str).collect();
        build_pdf(&refs)
    }

    fn input(bytes: Vec<u8>) -> BatchInput {
        BatchInput {
            files: vec![SourceFile {
                name: "export.pdf".to_string(),
                bytes,
            }],
            options: BatchOptions::default(),
        }
    }

    fn file<'a>(outcome: &'a BatchOutcome, name: &str) -> Option<&'a OutputFile> {
        outcome.files.iter().find(|file| file.name == name)
    }

    fn pipeline_with(thresholds: SortThresholds) -> Pipeline {
        Pipeline::new(SorterConfig {
            thresholds,
            ..SorterConfig::default()
        })
    }

    #[test]
    fn mixed_batch_goes_to_packing_room() {
        let bytes = batch_pdf(&[
            ("9400111", "1001", "Cotton Socks", "T100", 1),
            ("9400222", "1002", "Rose Perfume", "T200", 2),
        ]);
        let outcome = Pipeline::new(SorterConfig::default())
            .run(input(bytes))
            .expect("pipeline runs");

        assert_eq!(outcome.summary.total_orders, 2);
        assert_eq!(outcome.summary.tracked_orders, 2);
        assert_eq!(outcome.summary.packingroom_orders, 2);
        assert_eq!(outcome.summary.packingroom_hazmat, 1);
        assert_eq!(outcome.summary.warehouse_orders, 0);
        assert_eq!(outcome.summary.source_pages, 4);
        assert!(file(&outcome, WAREHOUSE_LABELS).is_none());
        assert!(file(&outcome, PACKINGROOM_PICKLIST).is_some());

        let pdf = file(&outcome, PACKINGROOM_LABELS).expect("packing room pdf");
        let merged = SourceDocument::load("out.pdf", &pdf.bytes).expect("reload");
        assert_eq!(merged.page_count(), 4);
        // hazmat first: its slip carries the banner and page 1
        let first_slip = merged.page_text(1);
        assert!(first_slip.contains("Rose Perfume"));
        assert!(first_slip.contains("MULTI-QUANTITY ORDER"));
        assert!(first_slip.contains("Page: 1"));
        assert!(merged.page_text(0).contains("HAZMAT"));
        assert!(merged.page_text(3).contains("Page: 2"));

        let stage_names: Vec<&str> = outcome.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            stage_names,
            vec![
                "load_documents",
                "group_orders",
                "sort_orders",
                "render_high_volume",
                "render_warehouse",
                "render_packingroom"
            ]
        );
    }

    #[test]
    fn repeated_skus_go_to_the_warehouse_with_label_counts() {
        let bytes = batch_pdf(&[
            ("9400001", "2001", "Cotton Socks", "T100", 1),
            ("9400002", "2002", "Cotton Socks", "T100", 1),
            ("9400003", "2003", "Wool Hat", "T300", 1),
        ]);
        let pipeline = pipeline_with(SortThresholds {
            warehouse_min_occurrences: 2,
            high_volume_threshold: 100,
            label_count_min: 2,
        });
        let outcome = pipeline.run(input(bytes)).expect("pipeline runs");

        assert_eq!(outcome.summary.warehouse_orders, 2);
        assert_eq!(outcome.summary.packingroom_orders, 1);
        assert!(file(&outcome, WAREHOUSE_PICKLIST).is_some());

        let pdf = file(&outcome, WAREHOUSE_LABELS).expect("warehouse pdf");
        let merged = SourceDocument::load("out.pdf", &pdf.bytes).expect("reload");
        assert_eq!(merged.page_count(), 4);
        assert!(merged.page_text(1).contains("SKU: T100 (1 of 2)"));
        assert!(merged.page_text(3).contains("SKU: T100 (2 of 2)"));
    }

    #[test]
    fn multi_slip_order_numbers_each_slip() {
        let pages = [
            label("9400501"),
            slip("5001", "Cotton Socks", "T100", 1),
            slip("5001", "Wool Hat", "T300", 1),
            label("9400502"),
            slip("5002", "Linen Towel", "T400", 1),
        ];
        let refs: Vec<&str> = pages.iter().map(String::as_str).collect();
        let outcome = Pipeline::new(SorterConfig::default())
            .run(input(build_pdf(&refs)))
            .expect("pipeline runs");

        assert_eq!(outcome.summary.total_orders, 2);
        assert_eq!(outcome.summary.multi_slip_orders, 1);
        assert_eq!(outcome.summary.max_slips_per_order, 2);
        assert!(outcome.log.iter().any(|line| line == "Max Slips per Order: 2"));

        let pdf = file(&outcome, PACKINGROOM_LABELS).expect("packing room pdf");
        let merged = SourceDocument::load("out.pdf", &pdf.bytes).expect("reload");
        assert_eq!(merged.page_count(), 5);
        let texts: Vec<String> = (0..5).map(|page| merged.page_text(page)).collect();

        let first_slip = texts
            .iter()
            .position(|text| text.contains("(Slip 1 of 2)"))
            .expect("first slip stamped");
        // the order's own number: 1 if it leads the file, 2 after the other order
        let number = if first_slip == 1 { 1 } else { 2 };
        assert!(texts[first_slip].contains("Order ID: 5001"));
        assert!(texts[first_slip].contains(&format!("Page: {number} (Slip 1 of 2)")));
        assert!(texts[first_slip + 1].contains("Wool Hat"));
        assert!(texts[first_slip + 1].contains(&format!("Page: {number} (Slip 2 of 2)")));

        let single = texts
            .iter()
            .find(|text| text.contains("Order ID: 5002"))
            .expect("single-slip order");
        assert!(single.contains(&format!("Page: {}", 3 - number)));
        assert!(!single.contains("Slip 1"));
    }

    #[test]
    fn high_volume_sku_gets_its_own_file() {
        let bytes = batch_pdf(&[
            ("9400001", "3001", "Cotton Socks", "T100", 1),
            ("9400002", "3002", "Cotton Socks", "T100", 1),
            ("9400003", "3003", "Wool Hat", "T300", 2),
        ]);
        let pipeline = pipeline_with(SortThresholds {
            warehouse_min_occurrences: 5,
            high_volume_threshold: 2,
            label_count_min: 5,
        });
        let outcome = pipeline.run(input(bytes)).expect("pipeline runs");

        assert_eq!(outcome.summary.high_volume.len(), 1);
        assert_eq!(outcome.summary.high_volume[0].file, "sku_T100_2.pdf");
        let pdf = file(&outcome, "sku_T100_2.pdf").expect("sku pdf");
        let merged = SourceDocument::load("sku.pdf", &pdf.bytes).expect("reload");
        assert_eq!(merged.page_count(), 4);
        assert!(merged.page_text(3).contains("SKU: T100 (2 of 2)"));
        assert_eq!(outcome.summary.total_orders, 3);
    }

    #[test]
    fn duplicate_tracking_numbers_are_reported() {
        let bytes = batch_pdf(&[
            ("9400555", "4001", "Cotton Socks", "T100", 1),
            ("9400555", "4002", "Wool Hat", "T300", 1),
        ]);
        let outcome = Pipeline::new(SorterConfig::default())
            .run(input(bytes))
            .expect("pipeline runs");
        assert_eq!(outcome.summary.duplicate_orders, 1);
        assert_eq!(
            outcome.summary.duplicate_details,
            vec!["Tracking: 9400555, Order: 4002".to_string()]
        );
        assert!(
            outcome
                .log
                .iter()
                .any(|line| line.contains("Found duplicate tracking number: 9400555"))
        );
    }

    #[test]
    fn unmarked_pages_fall_back_to_pairs() {
        let bytes = build_pdf(&["first page", "second page", "stray page"]);
        let outcome = Pipeline::new(SorterConfig::default())
            .run(input(bytes))
            .expect("pipeline runs");
        assert_eq!(outcome.summary.total_orders, 1);
        assert_eq!(outcome.summary.tracked_orders, 0);
        assert!(outcome.log.iter().any(|line| line.contains("two-page pairing")));
    }

    #[test]
    fn disabling_stickers_leaves_labels_clean() {
        let bytes = batch_pdf(&[("9400777", "5001", "Rose Perfume", "T200", 1)]);
        let mut batch = input(bytes);
        batch.options.hazmat_sticker = Some(false);
        let outcome = Pipeline::new(SorterConfig::default())
            .run(batch)
            .expect("pipeline runs");
        let pdf = file(&outcome, PACKINGROOM_LABELS).expect("pdf");
        let merged = SourceDocument::load("out.pdf", &pdf.bytes).expect("reload");
        assert!(!merged.page_text(0).contains("HAZMAT"));
        assert!(outcome.log.iter().any(|line| line.contains("stickers disabled")));
    }

    #[test]
    fn batch_without_pdfs_is_invalid_input() {
        let batch = BatchInput {
            files: vec![SourceFile {
                name: "notes.txt".to_string(),
                bytes: b"hello".to_vec(),
            }],
            options: BatchOptions::default(),
        };
        let err = Pipeline::new(SorterConfig::default())
            .run(batch)
            .expect_err("no pdfs");
        assert_eq!(err.stage(), "load_documents");
        assert_eq!(err.kind(), PipelineErrorKind::InvalidInput);
    }

    #[test]
    fn keyword_override_replaces_defaults() {
        let bytes = batch_pdf(&[("9400888", "6001", "Cotton Socks", "T100", 1)]);
        let mut batch = input(bytes);
        batch.options.hazmat_keywords = Some(vec!["socks".to_string()]);
        let outcome = Pipeline::new(SorterConfig::default())
            .run(batch)
            .expect("pipeline runs");
        assert_eq!(outcome.summary.packingroom_hazmat, 1);
    }

    #[test]
    fn processing_time_format() {
        assert_eq!(
            format_processing_time(Duration::from_millis(4_300)),
            "4.3 seconds"
        );
        assert_eq!(
            format_processing_time(Duration::from_secs(125)),
            "2 min 5.0 sec"
        );
    }
}
