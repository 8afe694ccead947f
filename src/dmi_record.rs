use hashbrown::HashMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Attribute holding the numeric DMI type code of a record.
pub const DMI_TYPE: &str = "DMIType";
/// Attribute holding the structure size in bytes.
pub const DMI_SIZE: &str = "DMISize";
/// Attribute holding the human readable name (the line after the header).
pub const DMI_NAME: &str = "DMIName";

/// Separator placed between the fragments of a multi-line attribute value.
pub const CONTINUATION_SEPARATOR: &str = "\t\t";

/// A single `dmidecode` structure, keyed by its handle.
///
/// Every record produced by the parser carries the [`DMI_TYPE`], [`DMI_SIZE`]
/// and [`DMI_NAME`] attributes. All other attributes are whatever the report
/// printed for that structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmiRecord {
    handle: String,
    attributes: HashMap<String, String>,
}

impl DmiRecord {
    pub(crate) fn new(handle: &str, dmi_type: &str, size: &str, name: &str) -> Self {
        let mut attributes = HashMap::with_capacity(8);
        attributes.insert(DMI_TYPE.to_owned(), dmi_type.to_owned());
        attributes.insert(DMI_SIZE.to_owned(), size.to_owned());
        attributes.insert(DMI_NAME.to_owned(), name.to_owned());

        DmiRecord {
            handle: handle.to_owned(),
            attributes,
        }
    }

    pub(crate) fn insert(&mut self, key: &str, value: String) {
        self.attributes.insert(key.to_owned(), value);
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.attributes.get(attribute).map(String::as_str)
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.attributes.contains_key(attribute)
    }

    /// The DMI type code, `None` if it does not fit a `u8`.
    pub fn dmi_type(&self) -> Option<u8> {
        self.get(DMI_TYPE).and_then(|v| v.parse().ok())
    }

    pub fn size(&self) -> Option<u16> {
        self.get(DMI_SIZE).and_then(|v| v.parse().ok())
    }

    pub fn name(&self) -> &str {
        self.get(DMI_NAME).unwrap_or_default()
    }

    /// Splits a multi-line attribute back into its lines.
    ///
    /// A plain `key: value` attribute yields a single element.
    pub fn values(&self, attribute: &str) -> Option<Vec<&str>> {
        self.get(attribute)
            .map(|v| v.split(CONTINUATION_SEPARATOR).collect())
    }

    /// Attributes sorted by name, reserved ones included.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        let mut attributes: Vec<(&str, &str)> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        attributes.sort_unstable_by(|a, b| a.0.cmp(b.0));
        attributes.into_iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl Serialize for DmiRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.attributes.len()))?;
        for (key, value) in self.attributes() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
