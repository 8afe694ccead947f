use crate::dmi_record::{DMI_NAME, DMI_TYPE, DmiRecord};
use crate::err::{Error, Result};

use hashbrown::HashMap;
use log::debug;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// All records extracted from one report, keyed by handle.
///
/// Handles are kept in the order they first appeared in the report. Iteration,
/// serialization and every query follow that order, so when several records
/// match a query the one printed first wins.
///
/// A table is built in one go by [`crate::DmiParser::parse`] and is read-only
/// afterwards, so it can be shared freely between threads for querying.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DmiTable {
    records: HashMap<String, DmiRecord>,
    order: Vec<String>,
}

impl DmiTable {
    /// Adds a record, replacing any previous record with the same handle.
    /// A replaced record keeps the position of the original.
    pub(crate) fn insert(&mut self, record: DmiRecord) {
        let handle = record.handle().to_owned();

        if self.records.insert(handle.clone(), record).is_some() {
            debug!("Handle {} appears more than once, keeping the last block", handle);
        } else {
            self.order.push(handle);
        }
    }

    pub fn get(&self, handle: &str) -> Option<&DmiRecord> {
        self.records.get(handle)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Handles in report order.
    pub fn handles(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Records in report order.
    pub fn iter(&self) -> impl Iterator<Item = &DmiRecord> {
        self.order.iter().filter_map(move |h| self.records.get(h))
    }

    fn ensure_populated(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::NotInitialized);
        }
        Ok(())
    }

    /// Returns the first record (in report order) whose `attribute` equals `value`.
    pub fn search_by(&self, attribute: &str, value: &str) -> Result<Option<&DmiRecord>> {
        self.ensure_populated()?;

        Ok(self.iter().find(|r| r.get(attribute) == Some(value)))
    }

    /// Returns every record whose `attribute` equals `value`, in report order.
    pub fn search_all_by(&self, attribute: &str, value: &str) -> Result<Vec<&DmiRecord>> {
        self.ensure_populated()?;

        Ok(self
            .iter()
            .filter(|r| r.get(attribute) == Some(value))
            .collect())
    }

    pub fn search_by_name(&self, name: &str) -> Result<Option<&DmiRecord>> {
        self.search_by(DMI_NAME, name)
    }

    /// Matches the type code printed in the header. The header accepts any run
    /// of digits, so codes outside the SMBIOS `u8` range are reachable too.
    pub fn search_by_type(&self, dmi_type: u64) -> Result<Option<&DmiRecord>> {
        self.search_by(DMI_TYPE, &dmi_type.to_string())
    }

    pub fn search_all_by_type(&self, dmi_type: u64) -> Result<Vec<&DmiRecord>> {
        self.search_all_by(DMI_TYPE, &dmi_type.to_string())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl<'a> IntoIterator for &'a DmiTable {
    type Item = &'a DmiRecord;
    type IntoIter = Box<dyn Iterator<Item = &'a DmiRecord> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl Serialize for DmiTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for record in self.iter() {
            map.serialize_entry(record.handle(), record)?;
        }
        map.end()
    }
}

/// See [`DmiTable::search_by`].
pub fn search_by<'t>(
    table: &'t DmiTable,
    attribute: &str,
    value: &str,
) -> Result<Option<&'t DmiRecord>> {
    table.search_by(attribute, value)
}

/// See [`DmiTable::search_by_name`].
pub fn search_by_name<'t>(table: &'t DmiTable, name: &str) -> Result<Option<&'t DmiRecord>> {
    table.search_by_name(name)
}

/// See [`DmiTable::search_by_type`].
pub fn search_by_type(table: &DmiTable, dmi_type: u64) -> Result<Option<&DmiRecord>> {
    table.search_by_type(dmi_type)
}
