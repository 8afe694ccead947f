#![deny(unused_must_use)]
#![forbid(unsafe_code)]
//! Parses the text report printed by `dmidecode` into a table of records.
//!
//! ```
//! use dmidecode_report::parse;
//!
//! let report = "Handle 0x0001, DMI type 1, 27 bytes\nSystem Information\n\tManufacturer: Acme\n";
//! let table = parse(report).unwrap();
//!
//! let system = table.search_by_type(1).unwrap().unwrap();
//! assert_eq!(system.get("Manufacturer"), Some("Acme"));
//! ```

pub mod err;

mod dmi_parser;
mod dmi_record;
mod dmi_table;

pub use dmi_parser::{DmiParser, ParserSettings, parse, parse_with_settings};
pub use dmi_record::{CONTINUATION_SEPARATOR, DMI_NAME, DMI_SIZE, DMI_TYPE, DmiRecord};
pub use dmi_table::{DmiTable, search_by, search_by_name, search_by_type};

// For tests, we only initialize logging once.
#[cfg(test)]
use std::sync::Once;

#[cfg(test)]
static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    LOGGER_INIT.call_once(env_logger::init);
}
