//! Reader for VIA (VGG Image Annotator) exports.
//!
//! Both the full project file (with `_via_img_metadata`, `_via_settings`, ...)
//! and the bare "Export annotations (as json)" object are accepted. The image
//! entries are collected in document order so that a seeded shuffle is
//! reproducible for the same export.

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::Result;
use crate::types::ViaImage;

const METADATA_KEY: &str = "_via_img_metadata";

/// The image entries of a VIA export as (filename, entry) pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViaExport {
    pub entries: Vec<(String, ViaImage)>,
}

/// The `_via_img_metadata` object, kept in document order.
struct OrderedMetadata(Vec<(String, ViaImage)>);

impl<'de> Deserialize<'de> for OrderedMetadata {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MetadataVisitor;

        impl<'de> Visitor<'de> for MetadataVisitor {
            type Value = OrderedMetadata;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of VIA image entries")
            }

            fn visit_map<V>(self, mut map: V) -> Result<OrderedMetadata, V::Error>
            where
                V: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                // The keys are opaque ids (filename + size); only the entry matters
                while let Some((_key, entry)) = map.next_entry::<IgnoredAny, ViaImage>()? {
                    entries.push((entry.filename.clone(), entry));
                }
                Ok(OrderedMetadata(entries))
            }
        }

        deserializer.deserialize_map(MetadataVisitor)
    }
}

impl<'de> Deserialize<'de> for ViaExport {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ExportVisitor;

        impl<'de> Visitor<'de> for ExportVisitor {
            type Value = ViaExport;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a VIA project or annotation export")
            }

            fn visit_map<V>(self, mut map: V) -> Result<ViaExport, V::Error>
            where
                V: MapAccess<'de>,
            {
                let mut project_entries: Option<Vec<(String, ViaImage)>> = None;
                let mut bare_entries = Vec::new();

                while let Some(key) = map.next_key::<String>()? {
                    if key == METADATA_KEY {
                        if project_entries.is_some() {
                            return Err(de::Error::duplicate_field(METADATA_KEY));
                        }
                        let OrderedMetadata(entries) = map.next_value()?;
                        project_entries = Some(entries);
                    } else if key.starts_with("_via_") {
                        // Settings, attribute definitions, data format version, ...
                        map.next_value::<IgnoredAny>()?;
                    } else {
                        let entry: ViaImage = map.next_value()?;
                        bare_entries.push((entry.filename.clone(), entry));
                    }
                }

                Ok(ViaExport {
                    entries: project_entries.unwrap_or(bare_entries),
                })
            }
        }

        deserializer.deserialize_map(ExportVisitor)
    }
}

/// Parse a VIA export from any reader.
pub fn parse_via_export<R: Read>(reader: R) -> Result<ViaExport> {
    Ok(serde_json::from_reader(reader)?)
}

/// Read and parse a VIA export file into ordered (filename, entry) pairs.
pub fn read_via_export(path: &Path) -> Result<Vec<(String, ViaImage)>> {
    let file = File::open(path)?;
    let export = parse_via_export(BufReader::new(file))?;
    Ok(export.entries)
}
