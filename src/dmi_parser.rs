use crate::dmi_record::{CONTINUATION_SEPARATOR, DmiRecord};
use crate::dmi_table::DmiTable;
use crate::err::{Error, Result};

use log::{debug, info, trace};
use regex::Regex;

use std::borrow::Cow;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

/// Blocks shorter than this (counting the empty piece left by a trailing
/// newline) are inactive or truncated entries.
const MIN_BLOCK_LINES: usize = 3;

static PATTERNS: LazyLock<ReportPatterns> = LazyLock::new(ReportPatterns::new);

struct ReportPatterns {
    /// `Handle 0x0001, DMI type 1, 27 bytes`
    header: Regex,
    /// `\tManufacturer: Acme`, split at the last `:` followed by whitespace
    key_value: Regex,
    /// `\tCharacteristics:`
    list_open: Regex,
    /// `\t\tPCI is supported`
    continuation: Regex,
}

impl ReportPatterns {
    fn new() -> Self {
        ReportPatterns {
            header: Regex::new(r"^Handle\s+([^,]+),\s+\S+\s+type\s+(\d+),\s+(\d+)\s+bytes$")
                .expect("static regex must compile"),
            key_value: Regex::new(r"^\t([^\t].*):\s+(.+)$").expect("static regex must compile"),
            list_open: Regex::new(r"^\t([^\t].*):$").expect("static regex must compile"),
            continuation: Regex::new(r"^\t\t(.+)$").expect("static regex must compile"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserSettings {
    continuation_separator: String,
    normalize_line_endings: bool,
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            continuation_separator: CONTINUATION_SEPARATOR.to_owned(),
            normalize_line_endings: true,
        }
    }
}

impl ParserSettings {
    pub fn new() -> Self {
        ParserSettings::default()
    }

    /// Sets the string placed between the lines of a multi-line attribute.
    pub fn continuation_separator(mut self, separator: impl Into<String>) -> Self {
        self.continuation_separator = separator.into();

        self
    }

    /// When set, `\r\n` line endings are turned into `\n` before parsing.
    pub fn normalize_line_endings(mut self, normalize: bool) -> Self {
        self.normalize_line_endings = normalize;

        self
    }

    pub fn get_continuation_separator(&self) -> &str {
        &self.continuation_separator
    }

    pub fn should_normalize_line_endings(&self) -> bool {
        self.normalize_line_endings
    }
}

/// Holds a captured `dmidecode` report and turns it into a [`DmiTable`].
///
/// Running `dmidecode` is the caller's business; the parser only ever sees its
/// text output.
#[derive(Debug, Clone)]
pub struct DmiParser {
    data: String,
    config: ParserSettings,
}

impl DmiParser {
    pub fn from_buffer(buffer: impl Into<String>) -> Self {
        DmiParser {
            data: buffer.into(),
            config: ParserSettings::default(),
        }
    }

    pub fn from_read(mut input: impl Read) -> Result<Self> {
        let mut data = String::new();
        input.read_to_string(&mut data)?;

        Ok(Self::from_buffer(data))
    }

    /// Reads a report previously saved to disk (e.g. `dmidecode > report.txt`).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let f = File::open(path).map_err(|e| Error::FailedToOpenFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_read(f)
    }

    pub fn with_configuration(mut self, configuration: ParserSettings) -> Self {
        self.config = configuration;
        self
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn parse(&self) -> Result<DmiTable> {
        parse_with_settings(&self.data, &self.config)
    }
}

/// Parses a report with the default settings.
pub fn parse(text: &str) -> Result<DmiTable> {
    parse_with_settings(text, &ParserSettings::default())
}

enum ScanState {
    Normal,
    InContinuation { key: String, value: String },
}

pub fn parse_with_settings(text: &str, settings: &ParserSettings) -> Result<DmiTable> {
    let text = if settings.normalize_line_endings && text.contains("\r\n") {
        Cow::Owned(text.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(text)
    };

    let mut table = DmiTable::default();

    for (block_number, block) in text.split("\n\n").enumerate() {
        if let Some(record) = parse_block(block, settings) {
            table.insert(record);
        } else {
            debug!("Skipping block {}", block_number);
        }
    }

    if table.is_empty() {
        return Err(Error::EmptyResult);
    }

    info!("Extracted {} DMI records", table.len());
    Ok(table)
}

fn parse_block(block: &str, settings: &ParserSettings) -> Option<DmiRecord> {
    let lines: Vec<&str> = block.split('\n').collect();

    if lines.len() < MIN_BLOCK_LINES {
        trace!("Block is too short ({} lines): {:?}", lines.len(), block);
        return None;
    }

    let Some(header) = PATTERNS.header.captures(lines[0]) else {
        trace!("Not a handle header: {:?}", lines[0]);
        return None;
    };

    let mut record = DmiRecord::new(&header[1], &header[2], &header[3], lines[1]);
    let mut state = ScanState::Normal;

    for line in &lines[2..] {
        if let ScanState::InContinuation { value, .. } = &mut state {
            if let Some(caps) = PATTERNS.continuation.captures(line) {
                if !value.is_empty() {
                    value.push_str(&settings.continuation_separator);
                }
                value.push_str(&caps[1]);
                continue;
            }
        }

        // Not a list item, so any open list ends here and the line is handled as a normal one.
        close_continuation(&mut record, std::mem::replace(&mut state, ScanState::Normal));

        if let Some(caps) = PATTERNS.key_value.captures(line) {
            record.insert(&caps[1], caps[2].to_owned());
        } else if let Some(caps) = PATTERNS.list_open.captures(line) {
            state = ScanState::InContinuation {
                key: caps[1].to_owned(),
                value: String::new(),
            };
        } else {
            trace!("Dropping line in {}: {:?}", record.handle(), line);
        }
    }

    close_continuation(&mut record, state);

    Some(record)
}

/// Stores the accumulated list value. A list header with no items stores nothing.
fn close_continuation(record: &mut DmiRecord, state: ScanState) {
    if let ScanState::InContinuation { key, value } = state {
        if !value.is_empty() {
            record.insert(&key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SYSTEM_INFORMATION: &str = "Handle 0x0001, DMI type 1, 27 bytes\nSystem Information\n\tManufacturer: Acme\n\tVersion:\n\t\tv1\n\t\tv2\n";

    #[test]
    fn test_parses_system_information() {
        crate::ensure_env_logger_initialized();
        let table = parse(SYSTEM_INFORMATION).unwrap();
        assert_eq!(table.len(), 1);

        let record = table.get("0x0001").unwrap();
        assert_eq!(record.get("DMIType"), Some("1"));
        assert_eq!(record.get("DMISize"), Some("27"));
        assert_eq!(record.get("DMIName"), Some("System Information"));
        assert_eq!(record.get("Manufacturer"), Some("Acme"));
        assert_eq!(record.get("Version"), Some("v1\t\tv2"));
    }

    #[test]
    fn test_empty_input_is_empty_result() {
        assert!(matches!(parse(""), Err(Error::EmptyResult)));
        assert!(matches!(
            parse("# dmidecode 3.3\nGetting SMBIOS data from sysfs.\nSMBIOS 3.2.0 present.\n"),
            Err(Error::EmptyResult)
        ));
    }

    #[test]
    fn test_short_block_is_skipped() {
        // Two pieces only: header and name, no trailing newline.
        let text = "Handle 0x0002, DMI type 2, 8 bytes\nBase Board Information";
        assert!(matches!(parse(text), Err(Error::EmptyResult)));
    }

    #[test]
    fn test_trailing_newline_completes_header_only_block() {
        let text = "Handle 0xFEFF, DMI type 127, 4 bytes\nEnd Of Table\n";
        let table = parse(text).unwrap();

        assert_eq!(table.get("0xFEFF").unwrap().name(), "End Of Table");
    }

    #[test]
    fn test_malformed_header_discards_block() {
        let text = "Handle 0x0003 DMI type 3 22 bytes\nChassis Information\n\tType: Desktop\n\n\
                    Handle 0x0004, DMI type 4, 48 bytes\nProcessor Information\n\tFamily: Core i7\n";
        let table = parse(text).unwrap();

        assert_eq!(table.handles().collect::<Vec<_>>(), vec!["0x0004"]);
    }

    #[test]
    fn test_continuation_ends_on_next_key() {
        let text = "Handle 0x0000, DMI type 0, 24 bytes\nBIOS Information\n\
                    \tCharacteristics:\n\t\tPCI is supported\n\t\tBIOS is upgradeable\n\t\tACPI is supported\n\
                    \tBIOS Revision: 5.17\n";
        let table = parse(text).unwrap();
        let record = table.get("0x0000").unwrap();

        assert_eq!(
            record.get("Characteristics"),
            Some("PCI is supported\t\tBIOS is upgradeable\t\tACPI is supported")
        );
        assert_eq!(record.get("BIOS Revision"), Some("5.17"));
    }

    #[test]
    fn test_list_followed_by_list() {
        let text = "Handle 0x0000, DMI type 0, 24 bytes\nBIOS Information\n\
                    \tCharacteristics:\n\t\tPCI is supported\n\
                    \tExtension:\n\t\tUSB legacy is supported\n";
        let record = parse(text).unwrap().get("0x0000").cloned().unwrap();

        assert_eq!(record.get("Characteristics"), Some("PCI is supported"));
        assert_eq!(record.get("Extension"), Some("USB legacy is supported"));
    }

    #[test]
    fn test_empty_list_is_not_stored() {
        let text = "Handle 0x000B, DMI type 11, 5 bytes\nOEM Strings\n\tStrings:\n\tCount: 0\n";
        let record = parse(text).unwrap().get("0x000B").cloned().unwrap();

        assert!(!record.contains("Strings"));
        assert_eq!(record.get("Count"), Some("0"));
    }

    #[test]
    fn test_unindented_and_stray_lines_are_dropped() {
        let text = "Handle 0x0005, DMI type 5, 10 bytes\nMemory Controller\n\
                    not indented: at all\n\t\tstray continuation\n\tSupported Speeds: 70 ns\n";
        let record = parse(text).unwrap().get("0x0005").cloned().unwrap();

        assert_eq!(record.len(), 4);
        assert_eq!(record.get("Supported Speeds"), Some("70 ns"));
    }

    #[test]
    fn test_key_ends_at_last_colon() {
        let text = "Handle 0x0020, DMI type 1, 27 bytes\nSystem Information\n\
                    \tUUID: 4c4c4544-0042\n\tWake-up Type: Power Switch: forced\n";
        let record = parse(text).unwrap().get("0x0020").cloned().unwrap();

        assert_eq!(record.get("UUID"), Some("4c4c4544-0042"));
        assert_eq!(record.get("Wake-up Type: Power Switch"), Some("forced"));
        assert!(!record.contains("Wake-up Type"));
    }

    #[test]
    fn test_oem_string_with_colon() {
        let text = "Handle 0x000B, DMI type 11, 5 bytes\nOEM Strings\n\tString 1: Dell System: 5.0\n";
        let record = parse(text).unwrap().get("0x000B").cloned().unwrap();

        assert_eq!(record.get("String 1: Dell System"), Some("5.0"));
    }

    #[test]
    fn test_colon_without_space_stays_in_value() {
        let text = "Handle 0x0300, DMI type 3, 22 bytes\nChassis Information\n\tMAC Address: 00:11:22:33:44:55\n";
        let record = parse(text).unwrap().get("0x0300").cloned().unwrap();

        assert_eq!(record.get("MAC Address"), Some("00:11:22:33:44:55"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let text = SYSTEM_INFORMATION.replace('\n', "\r\n");
        let table = parse(&text).unwrap();

        assert_eq!(table.get("0x0001").unwrap().get("Version"), Some("v1\t\tv2"));
    }

    #[test]
    fn test_crlf_untouched_when_normalization_disabled() {
        let text = SYSTEM_INFORMATION.replace('\n', "\r\n");
        let parser = DmiParser::from_buffer(text)
            .with_configuration(ParserSettings::new().normalize_line_endings(false));

        assert!(matches!(parser.parse(), Err(Error::EmptyResult)));
    }

    #[test]
    fn test_wide_type_code_is_searchable() {
        let text = "Handle 0x0001, DMI type 300, 4 bytes\nVendor Specific\n\tData: 01\n";
        let table = parse(text).unwrap();
        let record = table.search_by_type(300).unwrap().unwrap();

        assert_eq!(record.get("DMIType"), Some("300"));
        assert_eq!(record.get("Data"), Some("01"));
    }

    #[test]
    fn test_settings_defaults_and_builders() {
        let settings = ParserSettings::default();
        assert_eq!(settings.get_continuation_separator(), "\t\t");
        assert!(settings.should_normalize_line_endings());

        let settings = ParserSettings::new()
            .continuation_separator(" | ")
            .normalize_line_endings(false);
        assert_eq!(settings.get_continuation_separator(), " | ");
        assert!(!settings.should_normalize_line_endings());
    }

    #[test]
    fn test_custom_continuation_separator() {
        let parser = DmiParser::from_buffer(SYSTEM_INFORMATION)
            .with_configuration(ParserSettings::new().continuation_separator(", "));
        let table = parser.parse().unwrap();

        assert_eq!(table.get("0x0001").unwrap().get("Version"), Some("v1, v2"));
    }

    #[test]
    fn test_duplicate_handle_is_replaced() {
        let text = "Handle 0x0001, DMI type 1, 27 bytes\nSystem Information\n\tSerial Number: A\n\n\
                    Handle 0x0001, DMI type 1, 27 bytes\nSystem Information\n\tSKU Number: B\n";
        let table = parse(text).unwrap();
        let record = table.get("0x0001").unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(record.get("SKU Number"), Some("B"));
        assert!(!record.contains("Serial Number"));
    }
}
