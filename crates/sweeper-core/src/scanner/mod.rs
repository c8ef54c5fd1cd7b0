mod walk;

pub use walk::{scan_inventory, Inventory, ScanOptions, ScanStats, ScannedDir};
