//! Pick lists handed to the warehouse (XLSX) and the packing room (CSV).

pub mod packingroom;
pub mod ranges;
pub mod warehouse;

pub use packingroom::packingroom_csv;
pub use ranges::page_ranges;
pub use warehouse::{WarehouseRow, warehouse_rows, warehouse_workbook};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PicklistError {
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("could not flush pick list: {0}")]
    Flush(String),
}
