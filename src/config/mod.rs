//! Settings file handling.

mod settings;

pub use settings::{BackupSettings, LimitSettings, Settings, TransferSettings};
