// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded asset buffer plus the current-asset map.
//!
//! Assets arrive as XML blobs over SHDR (`@ASSET@`), get patched in place
//! (`@UPDATE_ASSET@`) and are tombstoned rather than deleted
//! (`@REMOVE_ASSET@`). Every transition appends a record to the FIFO buffer;
//! an asset leaves the current map only when its last buffer record is
//! evicted.

use crate::xml::{XmlElement, XmlError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::collections::VecDeque;
use tracing::warn;

/// Default asset buffer capacity.
pub const DEFAULT_ASSET_BUFFER_SIZE: usize = 1024;

/// One asset revision.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub asset_id: String,
    pub asset_type: String,
    pub device_uuid: String,
    /// Timestamp of the SHDR line that produced this revision.
    pub timestamp: String,
    /// Parsed XML body; patched by updates.
    pub document: XmlElement,
    pub removed: bool,
}

struct AssetInner {
    buffer: VecDeque<Asset>,
    current: HashMap<String, Asset>,
}

/// Bounded FIFO of asset revisions plus `assetId -> Asset` current map.
///
/// Exclusive writer (the ingest path), shared readers.
pub struct AssetStore {
    capacity: usize,
    inner: RwLock<AssetInner>,
}

impl AssetStore {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(AssetInner {
                buffer: VecDeque::new(),
                current: HashMap::new(),
            }),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live (non-removed) assets in the current map.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner
            .read()
            .current
            .values()
            .filter(|asset| !asset.removed)
            .count()
    }

    /// Total buffered revisions (test/diagnostic visibility).
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.inner.read().buffer.len()
    }

    /// `@ASSET@`: parse the XML blob and upsert the asset.
    pub fn add(
        &self,
        device_uuid: &str,
        asset_id: &str,
        asset_type: &str,
        xml: &str,
        timestamp: &str,
    ) -> Result<(), XmlError> {
        let document = XmlElement::parse(xml)?;
        let asset = Asset {
            asset_id: asset_id.to_string(),
            asset_type: asset_type.to_string(),
            device_uuid: device_uuid.to_string(),
            timestamp: timestamp.to_string(),
            document,
            removed: false,
        };
        let mut inner = self.inner.write();
        inner.current.insert(asset_id.to_string(), asset.clone());
        Self::append(&mut inner, self.capacity, asset);
        Ok(())
    }

    /// `@UPDATE_ASSET@`: patch the innermost element named by each key and
    /// refresh the timestamp. Returns false when the asset id is unknown.
    pub fn update(&self, asset_id: &str, pairs: &[(String, String)], timestamp: &str) -> bool {
        let mut inner = self.inner.write();
        let Some(asset) = inner.current.get(asset_id).cloned() else {
            return false;
        };

        let mut asset = asset;
        for (key, value) in pairs {
            match asset.document.deepest_named_mut(key) {
                Some(element) => element.text = Some(value.clone()),
                None => {
                    warn!(
                        "[AssetStore::update] asset {asset_id} has no element \"{key}\", skipping"
                    );
                }
            }
        }
        asset.timestamp = timestamp.to_string();

        inner.current.insert(asset_id.to_string(), asset.clone());
        Self::append(&mut inner, self.capacity, asset);
        true
    }

    /// `@REMOVE_ASSET@`: tombstone. Idempotent - repeated removals neither
    /// change state nor append further buffer records. Returns false when the
    /// asset id is unknown.
    pub fn remove(&self, asset_id: &str, timestamp: &str) -> bool {
        let mut inner = self.inner.write();
        let Some(asset) = inner.current.get(asset_id).cloned() else {
            return false;
        };
        if asset.removed {
            return true;
        }

        let mut asset = asset;
        asset.removed = true;
        asset.timestamp = timestamp.to_string();
        inner.current.insert(asset_id.to_string(), asset.clone());
        Self::append(&mut inner, self.capacity, asset);
        true
    }

    /// Current revision of one asset (including tombstones).
    #[must_use]
    pub fn get(&self, asset_id: &str) -> Option<Asset> {
        self.inner.read().current.get(asset_id).cloned()
    }

    /// Live assets, newest revision first, optionally filtered by type and
    /// limited in count.
    #[must_use]
    pub fn list(&self, asset_type: Option<&str>, count: Option<usize>) -> Vec<Asset> {
        let inner = self.inner.read();
        let limit = count.unwrap_or(usize::MAX);
        let mut seen = Vec::new();
        let mut out = Vec::new();
        for revision in inner.buffer.iter().rev() {
            if out.len() >= limit {
                break;
            }
            if seen.contains(&revision.asset_id) {
                continue;
            }
            seen.push(revision.asset_id.clone());
            let Some(current) = inner.current.get(&revision.asset_id) else {
                continue;
            };
            if current.removed {
                continue;
            }
            if let Some(wanted) = asset_type {
                if current.asset_type != wanted {
                    continue;
                }
            }
            out.push(current.clone());
        }
        out
    }

    fn append(inner: &mut AssetInner, capacity: usize, asset: Asset) {
        inner.buffer.push_back(asset);
        while inner.buffer.len() > capacity {
            let Some(evicted) = inner.buffer.pop_front() else {
                break;
            };
            // Tombstones (and stale revisions) survive in the current map only
            // while some buffer record still references the asset.
            let still_buffered = inner
                .buffer
                .iter()
                .any(|revision| revision.asset_id == evicted.asset_id);
            if !still_buffered {
                inner.current.remove(&evicted.asset_id);
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TOOL_XML: &str = r#"<CuttingTool serialNumber="1" toolId="KSSP300R4SD43L240"><CuttingToolLifeCycle><ToolLife type="MINUTES">240</ToolLife><CuttingDiameterMax>60</CuttingDiameterMax></CuttingToolLifeCycle></CuttingTool>"#;

    fn store_with_tool() -> AssetStore {
        let store = AssetStore::new(8);
        store
            .add("000", "EM233", "CuttingTool", TOOL_XML, "2012-02-21T23:59:33.460470Z")
            .expect("add");
        store
    }

    #[test]
    fn test_add_parses_and_registers() {
        let store = store_with_tool();
        let asset = store.get("EM233").expect("asset");
        assert_eq!(asset.asset_type, "CuttingTool");
        assert_eq!(asset.device_uuid, "000");
        assert!(!asset.removed);
        assert_eq!(asset.document.name, "CuttingTool");
        assert_eq!(store.count(), 1);
        assert_eq!(store.buffered(), 1);
    }

    #[test]
    fn test_add_rejects_bad_xml() {
        let store = AssetStore::new(8);
        assert!(store
            .add("000", "X1", "CuttingTool", "<broken", "2012-02-21T23:59:33Z")
            .is_err());
        assert_eq!(store.count(), 0);
        assert_eq!(store.buffered(), 0);
    }

    #[test]
    fn test_update_patches_innermost_and_appends() {
        let store = store_with_tool();
        let pairs = vec![
            ("ToolLife".to_string(), "120".to_string()),
            ("CuttingDiameterMax".to_string(), "40".to_string()),
        ];
        assert!(store.update("EM233", &pairs, "2012-02-21T23:59:34.460470Z"));

        let asset = store.get("EM233").expect("asset");
        assert_eq!(asset.timestamp, "2012-02-21T23:59:34.460470Z");
        let life = asset
            .document
            .find_descendant("ToolLife")
            .expect("ToolLife");
        assert_eq!(life.text.as_deref(), Some("120"));
        let diameter = asset
            .document
            .find_descendant("CuttingDiameterMax")
            .expect("CuttingDiameterMax");
        assert_eq!(diameter.text.as_deref(), Some("40"));

        // Two revisions buffered, newest last.
        assert_eq!(store.buffered(), 2);
    }

    #[test]
    fn test_update_unknown_id_is_dropped() {
        let store = store_with_tool();
        let pairs = vec![("ToolLife".to_string(), "1".to_string())];
        assert!(!store.update("NOPE", &pairs, "2012-02-21T23:59:34Z"));
        assert_eq!(store.buffered(), 1);
    }

    #[test]
    fn test_remove_tombstones() {
        let store = store_with_tool();
        assert!(store.remove("EM233", "2012-02-22T00:00:00Z"));

        let asset = store.get("EM233").expect("tombstone stays resident");
        assert!(asset.removed);
        assert_eq!(asset.timestamp, "2012-02-22T00:00:00Z");
        assert_eq!(store.count(), 0);
        assert_eq!(store.buffered(), 2);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = store_with_tool();
        assert!(store.remove("EM233", "2012-02-22T00:00:00Z"));
        assert!(store.remove("EM233", "2012-02-22T00:00:01Z"));
        assert!(store.remove("EM233", "2012-02-22T00:00:02Z"));

        let asset = store.get("EM233").expect("asset");
        assert!(asset.removed);
        // Only the first removal appended a record.
        assert_eq!(store.buffered(), 2);
        assert_eq!(asset.timestamp, "2012-02-22T00:00:00Z");
    }

    #[test]
    fn test_remove_unknown_id() {
        let store = AssetStore::new(4);
        assert!(!store.remove("GHOST", "2012-02-22T00:00:00Z"));
    }

    #[test]
    fn test_eviction_drops_current_entry() {
        let store = AssetStore::new(2);
        for (id, n) in [("A", "1"), ("B", "2"), ("C", "3")] {
            let xml = format!("<CuttingTool serialNumber=\"{n}\"/>");
            store
                .add("000", id, "CuttingTool", &xml, "2012-02-21T23:59:33Z")
                .expect("add");
        }
        // A's only record was evicted.
        assert!(store.get("A").is_none());
        assert!(store.get("B").is_some());
        assert!(store.get("C").is_some());
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_eviction_keeps_asset_with_newer_revision() {
        let store = AssetStore::new(2);
        store
            .add("000", "A", "CuttingTool", "<CuttingTool serialNumber=\"1\"/>", "t1")
            .expect("add");
        store
            .update("A", &[("CuttingTool".to_string(), "x".to_string())], "t2");
        store
            .add("000", "B", "CuttingTool", "<CuttingTool serialNumber=\"2\"/>", "t3")
            .expect("add");
        // A's first revision was evicted but its update record remains.
        assert!(store.get("A").is_some());
        assert!(store.get("B").is_some());
    }

    #[test]
    fn test_list_filters_type_and_count() {
        let store = AssetStore::new(8);
        store
            .add("000", "T1", "CuttingTool", "<CuttingTool serialNumber=\"1\"/>", "t1")
            .expect("add");
        store
            .add("000", "F1", "Fixture", "<Fixture id=\"f\"/>", "t2")
            .expect("add");
        store
            .add("000", "T2", "CuttingTool", "<CuttingTool serialNumber=\"2\"/>", "t3")
            .expect("add");
        store.remove("T1", "t4");

        let tools = store.list(Some("CuttingTool"), None);
        let ids: Vec<&str> = tools.iter().map(|a| a.asset_id.as_str()).collect();
        // Newest first, tombstoned T1 excluded.
        assert_eq!(ids, vec!["T2"]);

        let all = store.list(None, None);
        assert_eq!(all.len(), 2);

        let limited = store.list(None, Some(1));
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].asset_id, "T2");
    }
}
