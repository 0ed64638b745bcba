//! 表格数据源相关的节点

pub mod cache;
pub mod csv_row_looper;
pub mod excel;
pub mod excel_row_looper;
pub mod excel_row_reader;
pub mod row_cursor;

pub use csv_row_looper::CsvRowLooper;
pub use excel_row_looper::ExcelRowLooper;
pub use excel_row_reader::ExcelRowReader;
