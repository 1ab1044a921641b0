// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Device schema tree and the read-mostly schema index.
//!
//! A [`DeviceSchema`] is supplied by an external loader (the agent core never
//! parses device XML itself). The [`SchemaIndex`] is built once per device
//! registration and is immutable afterwards, so queries read it lock-free.

pub mod path;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub use path::PathFilter;

/// Observation category of a data item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Discrete state change (program name, execution mode, ...).
    Event,
    /// Continuous numeric reading (spindle speed, temperature, ...).
    Sample,
    /// Active alarm list entry (five-field SHDR representation).
    Condition,
}

impl Category {
    /// Parse the schema-document spelling (`EVENT`, `SAMPLE`, `CONDITION`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Category> {
        match s {
            "EVENT" => Some(Category::Event),
            "SAMPLE" => Some(Category::Sample),
            "CONDITION" => Some(Category::Condition),
            _ => None,
        }
    }

    /// Schema-document spelling.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Event => "EVENT",
            Category::Sample => "SAMPLE",
            Category::Condition => "CONDITION",
        }
    }

    /// Container element name inside a `ComponentStream`.
    #[must_use]
    pub fn stream_container(&self) -> &'static str {
        match self {
            Category::Sample => "Samples",
            Category::Event => "Events",
            Category::Condition => "Condition",
        }
    }
}

/// A single data item descriptor from the device description document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataItem {
    /// Unique within the device.
    pub id: String,
    /// Optional; if present, unique within the device. Adapters may key SHDR
    /// fields by either name or id.
    pub name: Option<String>,
    /// MTConnect type, e.g. `AVAILABILITY`, `SPINDLE_SPEED`.
    pub item_type: String,
    pub sub_type: Option<String>,
    pub category: Category,
    pub units: Option<String>,
    pub native_units: Option<String>,
}

/// An internal node of the component tree (`Axes`, `Controller`, `Linear`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Element name in the device document, e.g. `Axes`.
    pub kind: String,
    pub id: String,
    pub name: Option<String>,
    pub data_items: Vec<DataItem>,
    pub components: Vec<Component>,
}

/// Root of one device description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSchema {
    pub id: String,
    pub uuid: String,
    pub name: String,
    /// Device-level data items (availability and friends).
    pub data_items: Vec<DataItem>,
    pub components: Vec<Component>,
}

/// One entry of a schema walk: a component (or the device root) together with
/// the data items it owns and the containment chain leading to it.
#[derive(Debug, Clone)]
pub struct ComponentEntry<'a> {
    /// Element kind: `Device` for the root, otherwise the component kind.
    pub kind: &'a str,
    pub id: &'a str,
    pub name: Option<&'a str>,
    pub items: &'a [DataItem],
    /// Kinds from the device root down to (and including) this node, for
    /// path filtering.
    pub chain: Vec<PathNode<'a>>,
}

/// A node on the containment chain of a walk entry.
#[derive(Debug, Clone, Copy)]
pub struct PathNode<'a> {
    pub kind: &'a str,
    pub id: &'a str,
    pub name: Option<&'a str>,
}

/// Registering a device whose uuid already exists is rejected; the existing
/// registration wins.
#[derive(Debug, Clone, Error)]
#[error("device uuid \"{0}\" is already registered")]
pub struct DuplicateUuid(pub String);

struct DeviceEntry {
    schema: DeviceSchema,
    items_by_id: HashMap<String, DataItem>,
    id_by_name: HashMap<String, String>,
}

/// Read-mostly lookup over all registered devices.
///
/// Built during startup registration, then shared immutably; readers never
/// take a lock.
#[derive(Default)]
pub struct SchemaIndex {
    devices: Vec<DeviceEntry>,
    by_uuid: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl SchemaIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device. Duplicate uuids are rejected, the existing
    /// registration wins.
    pub fn register(&mut self, schema: DeviceSchema) -> Result<(), DuplicateUuid> {
        if self.by_uuid.contains_key(&schema.uuid) {
            return Err(DuplicateUuid(schema.uuid));
        }

        let mut items_by_id = HashMap::new();
        let mut id_by_name = HashMap::new();
        let mut collect = |items: &[DataItem]| {
            for item in items {
                items_by_id.insert(item.id.clone(), item.clone());
                if let Some(name) = &item.name {
                    id_by_name.insert(name.clone(), item.id.clone());
                }
            }
        };
        collect(&schema.data_items);
        let mut queue: Vec<&Component> = schema.components.iter().collect();
        while let Some(component) = queue.pop() {
            collect(&component.data_items);
            queue.extend(component.components.iter());
        }

        let slot = self.devices.len();
        self.by_uuid.insert(schema.uuid.clone(), slot);
        self.by_name.insert(schema.name.clone(), slot);
        self.devices.push(DeviceEntry {
            schema,
            items_by_id,
            id_by_name,
        });
        Ok(())
    }

    /// Uuid of the device with the given human name.
    #[must_use]
    pub fn device_uuid(&self, name: &str) -> Option<&str> {
        self.by_name
            .get(name)
            .map(|&slot| self.devices[slot].schema.uuid.as_str())
    }

    /// Schema of the device with the given uuid.
    #[must_use]
    pub fn device(&self, uuid: &str) -> Option<&DeviceSchema> {
        self.by_uuid.get(uuid).map(|&slot| &self.devices[slot].schema)
    }

    /// Resolve a device by uuid or by name (uuid wins on collision).
    #[must_use]
    pub fn resolve_device(&self, key: &str) -> Option<&DeviceSchema> {
        self.device(key)
            .or_else(|| self.device_uuid(key).and_then(|uuid| self.device(uuid)))
    }

    /// All registered devices in registration order.
    pub fn devices(&self) -> impl Iterator<Item = &DeviceSchema> {
        self.devices.iter().map(|entry| &entry.schema)
    }

    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Resolve a SHDR key (data-item name or id) for the given device.
    #[must_use]
    pub fn data_item(&self, uuid: &str, name_or_id: &str) -> Option<&DataItem> {
        let entry = self.by_uuid.get(uuid).map(|&slot| &self.devices[slot])?;
        if let Some(item) = entry.items_by_id.get(name_or_id) {
            return Some(item);
        }
        entry
            .id_by_name
            .get(name_or_id)
            .and_then(|id| entry.items_by_id.get(id))
    }

    /// Ordered pre-order traversal of a device: the device root first (kind
    /// `Device`), then every component that owns data items. Components
    /// without their own data items never produce stream content, so they are
    /// skipped here.
    #[must_use]
    pub fn walk<'a>(&'a self, uuid: &str) -> Vec<ComponentEntry<'a>> {
        let Some(device) = self.device(uuid) else {
            return Vec::new();
        };

        let root = PathNode {
            kind: "Device",
            id: device.id.as_str(),
            name: Some(device.name.as_str()),
        };

        let mut entries = Vec::new();
        if !device.data_items.is_empty() {
            entries.push(ComponentEntry {
                kind: "Device",
                id: &device.id,
                name: Some(&device.name),
                items: &device.data_items,
                chain: vec![root],
            });
        }
        for component in &device.components {
            Self::walk_component(component, vec![root], &mut entries);
        }
        entries
    }

    fn walk_component<'a>(
        component: &'a Component,
        mut chain: Vec<PathNode<'a>>,
        entries: &mut Vec<ComponentEntry<'a>>,
    ) {
        chain.push(PathNode {
            kind: component.kind.as_str(),
            id: component.id.as_str(),
            name: component.name.as_deref(),
        });
        if !component.data_items.is_empty() {
            entries.push(ComponentEntry {
                kind: &component.kind,
                id: &component.id,
                name: component.name.as_deref(),
                items: &component.data_items,
                chain: chain.clone(),
            });
        }
        for child in &component.components {
            Self::walk_component(child, chain.clone(), entries);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
