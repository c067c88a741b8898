mod convert;
mod format;

pub use convert::hours_to_ms;
pub use convert::pubkey_from_str;
pub use convert::raw_to_ui_amount;
pub use format::format_pubkey;
pub use format::ms_to_iso;
