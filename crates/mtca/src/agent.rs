// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Agent facade: one explicit value owning the schema index, the data store
//! and the asset store.
//!
//! Devices are registered during startup; afterwards the agent is shared
//! immutably, ingest serializes through the stores' writer locks and queries
//! run concurrently.

use crate::assembler::Assembler;
use crate::asset::{AssetStore, DEFAULT_ASSET_BUFFER_SIZE};
use crate::error::QueryError;
use crate::schema::{Category, DeviceSchema, DuplicateUuid, SchemaIndex};
use crate::shdr::{self, AssetCommand};
use crate::store::{
    ConditionEntry, ConditionLevel, DataStore, ObservationValue, DEFAULT_BUFFER_SIZE,
    DEFAULT_REPLAY_CAP,
};
use crate::xml::XmlElement;
use chrono::Utc;
use tracing::{debug, warn};

pub use crate::assembler::{CurrentQuery, SampleQuery};

/// Agent construction parameters.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Sample buffer capacity `B`.
    pub buffer_size: usize,
    /// Asset buffer capacity.
    pub asset_buffer_size: usize,
    /// `sender` header attribute.
    pub sender: String,
    /// MTConnect schema version for namespaces and headers.
    pub version: String,
    /// Cap on `current?at=` replay work.
    pub replay_cap: usize,
    /// Identity for the `instanceId` header attribute; defaults to the
    /// startup Unix timestamp so restarts are observable to clients.
    pub instance_id: Option<u64>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            asset_buffer_size: DEFAULT_ASSET_BUFFER_SIZE,
            sender: "mtca-agent".to_string(),
            version: "1.3".to_string(),
            replay_cap: DEFAULT_REPLAY_CAP,
            instance_id: None,
        }
    }
}

/// The MTConnect agent data plane.
pub struct Agent {
    index: SchemaIndex,
    store: DataStore,
    assets: AssetStore,
    assembler: Assembler,
}

impl Agent {
    #[must_use]
    pub fn new(settings: AgentSettings) -> Self {
        let instance_id = settings
            .instance_id
            .unwrap_or_else(|| Utc::now().timestamp().unsigned_abs());
        Self {
            index: SchemaIndex::new(),
            store: DataStore::with_replay_cap(settings.buffer_size, settings.replay_cap),
            assets: AssetStore::new(settings.asset_buffer_size),
            assembler: Assembler::new(settings.sender, instance_id, settings.version),
        }
    }

    /// Register a device and seed every data item as UNAVAILABLE, so
    /// `current` reports a complete picture before the adapter connects.
    /// Duplicate uuids are rejected; the existing registration wins.
    pub fn register_device(&mut self, schema: DeviceSchema) -> Result<(), DuplicateUuid> {
        let uuid = schema.uuid.clone();
        self.index.register(schema)?;

        let now = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string();
        let seeded: Vec<(crate::schema::DataItem, ObservationValue)> = self
            .index
            .walk(&uuid)
            .iter()
            .flat_map(|entry| entry.items.iter())
            .map(|item| {
                let value = match item.category {
                    Category::Condition => ObservationValue::Condition(ConditionEntry {
                        level: ConditionLevel::Unavailable,
                        native_code: String::new(),
                        native_severity: String::new(),
                        qualifier: String::new(),
                        message: String::new(),
                    }),
                    Category::Event | Category::Sample => {
                        ObservationValue::Scalar("UNAVAILABLE".to_string())
                    }
                };
                (item.clone(), value)
            })
            .collect();
        for (item, value) in seeded {
            self.store.ingest(&uuid, &item, &now, value);
        }
        Ok(())
    }

    /// Parse one SHDR line and route it into the stores. Returns the number
    /// of observations that consumed a sequence. Failures never propagate:
    /// bad lines, unknown keys and unknown asset ids are logged and dropped.
    pub fn ingest_line(&self, uuid: &str, line: &str) -> usize {
        let parsed = match shdr::parse_line(line, uuid, &self.index) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("[Agent::ingest_line] {uuid}: {err}, line dropped");
                return 0;
            }
        };

        let mut applied = 0;
        for shdr_item in &parsed.items {
            let Some(item) = self.index.data_item(uuid, &shdr_item.key) else {
                continue;
            };
            let value = match item.category {
                Category::Condition => {
                    let fields = &shdr_item.values;
                    let Some(level) = ConditionLevel::parse(&fields[0]) else {
                        warn!(
                            "[Agent::ingest_line] {uuid}: unknown condition level \"{}\" for {}, skipping",
                            fields[0], shdr_item.key
                        );
                        continue;
                    };
                    ObservationValue::Condition(ConditionEntry {
                        level,
                        native_code: fields[1].clone(),
                        native_severity: fields[2].clone(),
                        qualifier: fields[3].clone(),
                        message: fields[4].clone(),
                    })
                }
                Category::Event | Category::Sample => {
                    ObservationValue::Scalar(shdr_item.values[0].clone())
                }
            };
            if self
                .store
                .ingest(uuid, item, &parsed.timestamp, value)
                .is_some()
            {
                applied += 1;
            }
        }

        for command in parsed.commands {
            self.apply_asset_command(uuid, command, &parsed.timestamp);
        }
        applied
    }

    fn apply_asset_command(&self, uuid: &str, command: AssetCommand, timestamp: &str) {
        match command {
            AssetCommand::Add {
                asset_id,
                asset_type,
                xml,
            } => {
                match self
                    .assets
                    .add(uuid, &asset_id, &asset_type, &xml, timestamp)
                {
                    Ok(()) => debug!("[Agent::ingest_line] asset {asset_id} updated from {uuid}"),
                    Err(err) => {
                        warn!("[Agent::ingest_line] asset {asset_id}: bad XML body ({err}), dropped");
                    }
                }
            }
            AssetCommand::Update { asset_id, pairs } => {
                if !self.assets.update(&asset_id, &pairs, timestamp) {
                    warn!("[Agent::ingest_line] @UPDATE_ASSET@ for unknown asset {asset_id}, dropped");
                }
            }
            AssetCommand::Remove { asset_id } => {
                if !self.assets.remove(&asset_id, timestamp) {
                    warn!("[Agent::ingest_line] @REMOVE_ASSET@ for unknown asset {asset_id}, dropped");
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // queries
    // ------------------------------------------------------------------

    pub fn probe(&self, device: Option<&str>) -> Result<XmlElement, Vec<QueryError>> {
        self.assembler
            .probe(&self.index, &self.store, &self.assets, device)
    }

    pub fn current(&self, query: CurrentQuery) -> Result<XmlElement, Vec<QueryError>> {
        self.assembler.current(&self.index, &self.store, &query)
    }

    pub fn sample(&self, query: SampleQuery) -> Result<XmlElement, Vec<QueryError>> {
        self.sample_with_next(query).map(|(document, _)| document)
    }

    /// `sample` plus the resume sequence, for interval streaming.
    pub fn sample_with_next(
        &self,
        query: SampleQuery,
    ) -> Result<(XmlElement, u64), Vec<QueryError>> {
        self.assembler.sample(&self.index, &self.store, &query)
    }

    pub fn assets_document(
        &self,
        ids: Option<&[String]>,
        asset_type: Option<&str>,
        count: Option<usize>,
    ) -> Result<XmlElement, Vec<QueryError>> {
        self.assembler
            .assets(&self.store, &self.assets, ids, asset_type, count)
    }

    #[must_use]
    pub fn error_document(&self, errors: &[QueryError]) -> XmlElement {
        self.assembler.error_document(errors, &self.store)
    }

    // ------------------------------------------------------------------
    // accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub fn index(&self) -> &SchemaIndex {
        &self.index
    }

    #[must_use]
    pub fn store(&self) -> &DataStore {
        &self.store
    }

    #[must_use]
    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    #[must_use]
    pub fn instance_id(&self) -> u64 {
        self.assembler.instance_id()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Component, DataItem};
    use crate::store::ItemKey;

    fn item(id: &str, name: &str, item_type: &str, category: Category) -> DataItem {
        DataItem {
            id: id.to_string(),
            name: Some(name.to_string()),
            item_type: item_type.to_string(),
            sub_type: None,
            category,
            units: None,
            native_units: None,
        }
    }

    fn test_schema() -> DeviceSchema {
        DeviceSchema {
            id: "dev".to_string(),
            uuid: "000".to_string(),
            name: "VMC-3Axis".to_string(),
            data_items: vec![item("dtop_1", "avail", "AVAILABILITY", Category::Event)],
            components: vec![Component {
                kind: "Controller".to_string(),
                id: "cn1".to_string(),
                name: None,
                data_items: vec![
                    item("cn2", "execution", "EXECUTION", Category::Event),
                    item("cn5", "htemp", "TEMPERATURE", Category::Condition),
                ],
                components: vec![],
            }],
        }
    }

    fn agent() -> Agent {
        let mut agent = Agent::new(AgentSettings {
            buffer_size: 64,
            ..Default::default()
        });
        agent.register_device(test_schema()).expect("register");
        agent
    }

    #[test]
    fn test_registration_seeds_unavailable() {
        let agent = agent();
        // Three data items, three seeded observations.
        assert_eq!(agent.store().len(), 3);

        let snapshot = agent.store().current();
        let avail = snapshot
            .values
            .get(&ItemKey::new("000", "dtop_1"))
            .expect("seeded");
        assert_eq!(avail.value, ObservationValue::Scalar("UNAVAILABLE".into()));

        let condition = snapshot
            .conditions
            .get(&ItemKey::new("000", "cn5"))
            .expect("seeded");
        assert_eq!(condition.active.len(), 1);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut agent = agent();
        let err = agent
            .register_device(test_schema())
            .expect_err("duplicate uuid");
        assert_eq!(err.0, "000");
        // No double seeding.
        assert_eq!(agent.store().len(), 3);
    }

    #[test]
    fn test_ingest_line_routes_observations() {
        let agent = agent();
        let applied = agent.ingest_line("000", "2014-08-11T08:32:54.028533Z|avail|AVAILABLE");
        assert_eq!(applied, 1);

        let snapshot = agent.store().current();
        let avail = snapshot
            .values
            .get(&ItemKey::new("000", "dtop_1"))
            .expect("current");
        assert_eq!(avail.value, ObservationValue::Scalar("AVAILABLE".into()));
        assert_eq!(avail.timestamp, "2014-08-11T08:32:54.028533Z");
    }

    #[test]
    fn test_ingest_line_drops_bad_lines() {
        let agent = agent();
        assert_eq!(agent.ingest_line("000", "not-a-timestamp|avail|AVAILABLE"), 0);
        assert_eq!(agent.ingest_line("000", ""), 0);
        assert_eq!(agent.ingest_line("000", "2014-08-11T08:32:54Z|ghost|1"), 0);
    }

    #[test]
    fn test_ingest_line_condition_flow() {
        let agent = agent();
        agent.ingest_line(
            "000",
            "2010-09-29T23:59:33.460470Z|htemp|WARNING|HTEMP|1|HIGH|Oil Temperature High",
        );

        let snapshot = agent.store().current();
        let state = snapshot
            .conditions
            .get(&ItemKey::new("000", "cn5"))
            .expect("state");
        assert_eq!(state.active.len(), 1);
        assert_eq!(state.active[0].native_code(), "HTEMP");

        // Global clear empties the list.
        agent.ingest_line("000", "2010-09-29T23:59:40.000000Z|htemp|NORMAL||||");
        let snapshot = agent.store().current();
        let state = snapshot
            .conditions
            .get(&ItemKey::new("000", "cn5"))
            .expect("state");
        assert!(state.active.is_empty());
    }

    #[test]
    fn test_ingest_asset_commands() {
        let agent = agent();
        agent.ingest_line(
            "000",
            r#"2012-02-21T23:59:33.460470Z|@ASSET@|EM233|CuttingTool|<CuttingTool serialNumber="1"><ToolLife>240</ToolLife><CuttingDiameterMax>60</CuttingDiameterMax></CuttingTool>"#,
        );
        agent.ingest_line(
            "000",
            "2012-02-21T23:59:34.460470Z|@UPDATE_ASSET@|EM233|ToolLife|120|CuttingDiameterMax|40",
        );

        let asset = agent.assets().get("EM233").expect("asset");
        assert_eq!(asset.asset_type, "CuttingTool");
        assert_eq!(asset.timestamp, "2012-02-21T23:59:34.460470Z");
        assert_eq!(
            asset
                .document
                .find_descendant("ToolLife")
                .and_then(|el| el.text.as_deref()),
            Some("120")
        );
        assert_eq!(
            asset
                .document
                .find_descendant("CuttingDiameterMax")
                .and_then(|el| el.text.as_deref()),
            Some("40")
        );
        assert_eq!(agent.assets().buffered(), 2);
    }

    #[test]
    fn test_round_trip_current_value() {
        let agent = agent();
        agent.ingest_line("000", "2014-08-11T08:32:54.028533Z|avail|AVAILABLE");

        let doc = agent.current(CurrentQuery::default()).expect("current");
        let availability = doc.find_descendant("Availability").expect("element");
        assert_eq!(availability.text.as_deref(), Some("AVAILABLE"));
        assert_eq!(
            availability.attribute("timestamp"),
            Some("2014-08-11T08:32:54.028533Z")
        );
    }

    #[test]
    fn test_instance_id_stable() {
        let agent = Agent::new(AgentSettings {
            instance_id: Some(777),
            ..Default::default()
        });
        assert_eq!(agent.instance_id(), 777);
    }
}
