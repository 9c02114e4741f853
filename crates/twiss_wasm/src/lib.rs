mod convert;
mod table;

pub use table::WasmTransferTable;
