// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Response assembly: projects the schema index and the stores into
//! MTConnect document trees.
//!
//! One assembler instance holds the per-agent identity (sender, instance id,
//! schema version); every method is a pure fold over the stores, so handlers
//! can run concurrently. Query failures return the accumulated error list,
//! which [`Assembler::error_document`] renders as MTConnectError.

use crate::asset::{Asset, AssetStore};
use crate::error::QueryError;
use crate::schema::{Category, DataItem, DeviceSchema, PathFilter, SchemaIndex};
use crate::store::{
    ConditionState, CurrentSnapshot, DataStore, ItemKey, Observation, ObservationValue,
};
use crate::xml::XmlElement;
use chrono::Utc;
use std::collections::HashMap;

/// Default `count` for `sample` when the query omits it.
pub const DEFAULT_SAMPLE_COUNT: usize = 100;

/// Query descriptor for `current`.
#[derive(Debug, Clone, Default)]
pub struct CurrentQuery {
    /// Device uuid or name; `a;b` selects several, `None` selects all.
    pub device: Option<String>,
    /// Historical sequence to replay to.
    pub at: Option<u64>,
    /// Restricted XPath filter.
    pub path: Option<String>,
}

/// Query descriptor for `sample`.
#[derive(Debug, Clone, Default)]
pub struct SampleQuery {
    pub device: Option<String>,
    /// Defaults to `firstSequence`.
    pub from: Option<u64>,
    /// Defaults to [`DEFAULT_SAMPLE_COUNT`] clamped to the buffer size.
    pub count: Option<usize>,
    pub path: Option<String>,
}

/// Builds MTConnectDevices / MTConnectStreams / MTConnectAssets /
/// MTConnectError documents.
pub struct Assembler {
    sender: String,
    instance_id: u64,
    version: String,
}

impl Assembler {
    #[must_use]
    pub fn new(sender: impl Into<String>, instance_id: u64, version: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            instance_id,
            version: version.into(),
        }
    }

    #[must_use]
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    // ------------------------------------------------------------------
    // probe
    // ------------------------------------------------------------------

    /// MTConnectDevices document for one device (uuid or name) or all.
    pub fn probe(
        &self,
        index: &SchemaIndex,
        store: &DataStore,
        assets: &AssetStore,
        device: Option<&str>,
    ) -> Result<XmlElement, Vec<QueryError>> {
        let devices = scope(index, device)?;

        let mut body = XmlElement::new("Devices");
        for schema in devices {
            body.push_child(device_element(schema));
        }

        let header = self
            .header(store)
            .attr("assetBufferSize", assets.capacity().to_string())
            .attr("assetCount", assets.count().to_string());
        Ok(self.envelope("MTConnectDevices", header, body))
    }

    // ------------------------------------------------------------------
    // current
    // ------------------------------------------------------------------

    /// MTConnectStreams snapshot document.
    pub fn current(
        &self,
        index: &SchemaIndex,
        store: &DataStore,
        query: &CurrentQuery,
    ) -> Result<XmlElement, Vec<QueryError>> {
        let devices = scope(index, query.device.as_deref())?;
        let uuids: Vec<&str> = devices.iter().map(|d| d.uuid.as_str()).collect();

        let mut errors = Vec::new();
        let filter = parse_path(index, query.path.as_deref(), &uuids, &mut errors);
        let snapshot = match query.at {
            None => Some(store.current()),
            Some(at) => match store.current_at(at) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    errors.push(err);
                    None
                }
            },
        };
        if !errors.is_empty() {
            return Err(errors);
        }
        let snapshot = snapshot.unwrap_or_else(|| store.current());

        let mut body = XmlElement::new("Streams");
        for schema in devices {
            body.push_child(device_stream_current(
                index,
                schema,
                &snapshot,
                filter.as_ref(),
            ));
        }

        let header = self
            .header(store)
            .attr("firstSequence", snapshot.first_sequence.to_string())
            .attr("lastSequence", snapshot.last_sequence.to_string())
            .attr("nextSequence", snapshot.next_sequence.to_string());
        Ok(self.envelope("MTConnectStreams", header, body))
    }

    // ------------------------------------------------------------------
    // sample
    // ------------------------------------------------------------------

    /// MTConnectStreams range document plus the resume point
    /// (`min(from + count, lastSequence + 1)`) for interval streaming.
    pub fn sample(
        &self,
        index: &SchemaIndex,
        store: &DataStore,
        query: &SampleQuery,
    ) -> Result<(XmlElement, u64), Vec<QueryError>> {
        let devices = scope(index, query.device.as_deref())?;
        let uuids: Vec<&str> = devices.iter().map(|d| d.uuid.as_str()).collect();

        let mut errors = Vec::new();
        let filter = parse_path(index, query.path.as_deref(), &uuids, &mut errors);

        let from = query.from.unwrap_or_else(|| store.first_sequence());
        let count = query
            .count
            .unwrap_or_else(|| DEFAULT_SAMPLE_COUNT.min(store.capacity()));

        // Validate both range parameters up front so a request with several
        // bad parameters reports all of them.
        if count < 1 {
            errors.push(QueryError::OutOfRange(
                "'count' must be greater than or equal to 1".to_string(),
            ));
        } else if count > store.capacity() {
            errors.push(QueryError::OutOfRange(format!(
                "'count' must be less than or equal to the buffer size ({})",
                store.capacity()
            )));
        }
        let first = store.first_sequence();
        let last = store.last_sequence();
        if from < first || from > last + 1 {
            errors.push(QueryError::OutOfRange(format!(
                "'from' must be between {first} and {}",
                last + 1
            )));
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        // Ingest may have advanced the window since validation; the store
        // re-checks and any late violation is reported as-is.
        let slice = match store.sample(from, count) {
            Ok(slice) => slice,
            Err(err) => return Err(vec![err]),
        };

        let mut by_item: HashMap<ItemKey, Vec<&Observation>> = HashMap::new();
        for observation in &slice.observations {
            by_item
                .entry(ItemKey::new(
                    observation.uuid.as_str(),
                    observation.item_id.as_str(),
                ))
                .or_default()
                .push(observation);
        }

        let mut body = XmlElement::new("Streams");
        for schema in devices {
            body.push_child(device_stream_sample(
                index,
                schema,
                &by_item,
                filter.as_ref(),
            ));
        }

        let header = self
            .header(store)
            .attr("firstSequence", slice.first_sequence.to_string())
            .attr("lastSequence", slice.last_sequence.to_string())
            .attr("nextSequence", slice.next_sequence.to_string());
        Ok((
            self.envelope("MTConnectStreams", header, body),
            slice.next_sequence,
        ))
    }

    // ------------------------------------------------------------------
    // asset
    // ------------------------------------------------------------------

    /// MTConnectAssets document for explicit ids (single-error on a missing
    /// id) or for a type/count filtered listing.
    pub fn assets(
        &self,
        store: &DataStore,
        assets: &AssetStore,
        ids: Option<&[String]>,
        asset_type: Option<&str>,
        count: Option<usize>,
    ) -> Result<XmlElement, Vec<QueryError>> {
        if count == Some(0) {
            return Err(vec![QueryError::OutOfRange(
                "'count' must be greater than or equal to 1".to_string(),
            )]);
        }

        let selected: Vec<Asset> = match ids {
            Some(ids) => {
                let mut out = Vec::with_capacity(ids.len());
                for id in ids {
                    match assets.get(id) {
                        Some(asset) => out.push(asset),
                        None => return Err(vec![QueryError::AssetNotFound(id.clone())]),
                    }
                }
                out
            }
            None => assets.list(asset_type, count),
        };

        let mut body = XmlElement::new("Assets");
        for asset in &selected {
            body.push_child(asset_element(asset));
        }

        let header = self
            .header(store)
            .attr("assetBufferSize", assets.capacity().to_string())
            .attr("assetCount", assets.count().to_string());
        Ok(self.envelope("MTConnectAssets", header, body))
    }

    // ------------------------------------------------------------------
    // errors
    // ------------------------------------------------------------------

    /// MTConnectError document carrying every accumulated error.
    #[must_use]
    pub fn error_document(&self, errors: &[QueryError], store: &DataStore) -> XmlElement {
        let mut body = XmlElement::new("Errors");
        for error in errors {
            body.push_child(
                XmlElement::new("Error")
                    .attr("errorCode", error.code())
                    .text(error.to_string()),
            );
        }
        let header = self.header(store);
        self.envelope("MTConnectError", header, body)
    }

    // ------------------------------------------------------------------
    // shared pieces
    // ------------------------------------------------------------------

    fn header(&self, store: &DataStore) -> XmlElement {
        XmlElement::new("Header")
            .attr("creationTime", creation_time())
            .attr("sender", self.sender.clone())
            .attr("instanceId", self.instance_id.to_string())
            .attr("version", self.version.clone())
            .attr("bufferSize", store.capacity().to_string())
    }

    fn envelope(&self, document: &str, header: XmlElement, body: XmlElement) -> XmlElement {
        let ns = format!("urn:mtconnect.org:{document}:{}", self.version);
        XmlElement::new(document)
            .attr("xmlns:m", ns.clone())
            .attr("xmlns", ns.clone())
            .attr("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance")
            .attr(
                "xsi:schemaLocation",
                format!(
                    "{ns} http://schemas.mtconnect.org/schemas/{document}_{}.xsd",
                    self.version
                ),
            )
            .child(header)
            .child(body)
    }
}

fn creation_time() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Resolve the device filter (`None` = all, `a;b` = several). Existence
/// failures are single-error.
fn scope<'a>(
    index: &'a SchemaIndex,
    device: Option<&str>,
) -> Result<Vec<&'a DeviceSchema>, Vec<QueryError>> {
    match device {
        None => {
            let all: Vec<&DeviceSchema> = index.devices().collect();
            Ok(all)
        }
        Some(filter) => {
            let mut out = Vec::new();
            for key in filter.split(';').filter(|key| !key.is_empty()) {
                match index.resolve_device(key) {
                    Some(schema) => out.push(schema),
                    None => return Err(vec![QueryError::NoDevice(key.to_string())]),
                }
            }
            if out.is_empty() {
                return Err(vec![QueryError::NoDevice(filter.to_string())]);
            }
            Ok(out)
        }
    }
}

/// Parse and scope-check the path filter, accumulating failures.
fn parse_path(
    index: &SchemaIndex,
    path: Option<&str>,
    uuids: &[&str],
    errors: &mut Vec<QueryError>,
) -> Option<PathFilter> {
    let expr = path?;
    match PathFilter::parse(expr) {
        Err(err) => {
            errors.push(err);
            None
        }
        Ok(filter) => {
            if filter.matches_any(index, uuids) {
                Some(filter)
            } else {
                errors.push(QueryError::Unsupported(expr.to_string()));
                None
            }
        }
    }
}

// ------------------------------------------------------------------
// probe rendering
// ------------------------------------------------------------------

fn device_element(schema: &DeviceSchema) -> XmlElement {
    let mut device = XmlElement::new("Device")
        .attr("id", schema.id.clone())
        .attr("uuid", schema.uuid.clone())
        .attr("name", schema.name.clone());
    if !schema.data_items.is_empty() {
        device.push_child(data_items_element(&schema.data_items));
    }
    if !schema.components.is_empty() {
        let mut components = XmlElement::new("Components");
        for component in &schema.components {
            components.push_child(component_element(component));
        }
        device.push_child(components);
    }
    device
}

fn component_element(component: &crate::schema::Component) -> XmlElement {
    let mut element = XmlElement::new(component.kind.clone()).attr("id", component.id.clone());
    if let Some(name) = &component.name {
        element.set_attribute("name", name.clone());
    }
    if !component.data_items.is_empty() {
        element.push_child(data_items_element(&component.data_items));
    }
    if !component.components.is_empty() {
        let mut children = XmlElement::new("Components");
        for child in &component.components {
            children.push_child(component_element(child));
        }
        element.push_child(children);
    }
    element
}

fn data_items_element(items: &[DataItem]) -> XmlElement {
    let mut container = XmlElement::new("DataItems");
    for item in items {
        let mut element = XmlElement::new("DataItem")
            .attr("id", item.id.clone())
            .attr("category", item.category.as_str())
            .attr("type", item.item_type.clone());
        if let Some(name) = &item.name {
            element.set_attribute("name", name.clone());
        }
        if let Some(sub_type) = &item.sub_type {
            element.set_attribute("subType", sub_type.clone());
        }
        if let Some(units) = &item.units {
            element.set_attribute("units", units.clone());
        }
        if let Some(native_units) = &item.native_units {
            element.set_attribute("nativeUnits", native_units.clone());
        }
        container.push_child(element);
    }
    container
}

// ------------------------------------------------------------------
// streams rendering
// ------------------------------------------------------------------

fn device_stream_current(
    index: &SchemaIndex,
    schema: &DeviceSchema,
    snapshot: &CurrentSnapshot,
    filter: Option<&PathFilter>,
) -> XmlElement {
    let mut stream = XmlElement::new("DeviceStream")
        .attr("name", schema.name.clone())
        .attr("uuid", schema.uuid.clone());

    for entry in index.walk(&schema.uuid) {
        let mut groups = CategoryGroups::default();
        for item in entry.items {
            if let Some(filter) = filter {
                if !filter.matches_item(&entry.chain, item) {
                    continue;
                }
            }
            let key = ItemKey::new(schema.uuid.as_str(), item.id.as_str());
            match item.category {
                Category::Condition => {
                    if let Some(state) = snapshot.conditions.get(&key) {
                        groups.push_condition_state(item, state);
                    }
                }
                Category::Event | Category::Sample => {
                    if let Some(observation) = snapshot.values.get(&key) {
                        groups.push(item, observation);
                    }
                }
            }
        }
        if let Some(component) = groups.into_component_stream(&entry) {
            stream.push_child(component);
        }
    }
    stream
}

fn device_stream_sample(
    index: &SchemaIndex,
    schema: &DeviceSchema,
    by_item: &HashMap<ItemKey, Vec<&Observation>>,
    filter: Option<&PathFilter>,
) -> XmlElement {
    let mut stream = XmlElement::new("DeviceStream")
        .attr("name", schema.name.clone())
        .attr("uuid", schema.uuid.clone());

    for entry in index.walk(&schema.uuid) {
        let mut groups = CategoryGroups::default();
        for item in entry.items {
            if let Some(filter) = filter {
                if !filter.matches_item(&entry.chain, item) {
                    continue;
                }
            }
            let key = ItemKey::new(schema.uuid.as_str(), item.id.as_str());
            if let Some(observations) = by_item.get(&key) {
                // Buffer order is preserved: the slice was collected in
                // sequence order and grouped without reordering.
                for observation in observations {
                    groups.push(item, observation);
                }
            }
        }
        if let Some(component) = groups.into_component_stream(&entry) {
            stream.push_child(component);
        }
    }
    stream
}

/// Per-component partition of stream elements by category.
#[derive(Default)]
struct CategoryGroups {
    samples: Vec<XmlElement>,
    events: Vec<XmlElement>,
    condition: Vec<XmlElement>,
}

impl CategoryGroups {
    fn push(&mut self, item: &DataItem, observation: &Observation) {
        let element = observation_element(item, observation);
        match item.category {
            Category::Sample => self.samples.push(element),
            Category::Event => self.events.push(element),
            Category::Condition => self.condition.push(element),
        }
    }

    /// One element per active entry, or a single `Normal` when the list has
    /// been cleared.
    fn push_condition_state(&mut self, item: &DataItem, state: &ConditionState) {
        if state.active.is_empty() {
            if let Some(last) = &state.last {
                self.condition.push(normal_element(item, last));
            }
            return;
        }
        for observation in &state.active {
            self.condition.push(observation_element(item, observation));
        }
    }

    /// Wrap the non-empty groups into a `ComponentStream`, or `None` when
    /// nothing was emitted (such components are omitted entirely).
    fn into_component_stream(self, entry: &crate::schema::ComponentEntry<'_>) -> Option<XmlElement> {
        if self.samples.is_empty() && self.events.is_empty() && self.condition.is_empty() {
            return None;
        }
        let mut stream = XmlElement::new("ComponentStream")
            .attr("component", entry.kind)
            .attr("componentId", entry.id);
        if let Some(name) = entry.name {
            stream.set_attribute("name", name);
        }
        for (container, elements) in [
            ("Samples", self.samples),
            ("Events", self.events),
            ("Condition", self.condition),
        ] {
            if elements.is_empty() {
                continue;
            }
            let mut group = XmlElement::new(container);
            for element in elements {
                group.push_child(element);
            }
            stream.push_child(group);
        }
        Some(stream)
    }
}

fn observation_element(item: &DataItem, observation: &Observation) -> XmlElement {
    match &observation.value {
        ObservationValue::Scalar(value) => {
            let mut element = XmlElement::new(pascal_case(&item.item_type))
                .attr("dataItemId", item.id.clone())
                .attr("timestamp", observation.timestamp.clone())
                .attr("sequence", observation.sequence.to_string());
            if let Some(name) = &item.name {
                element.set_attribute("name", name.clone());
            }
            if let Some(sub_type) = &item.sub_type {
                element.set_attribute("subType", sub_type.clone());
            }
            element.text(value.clone())
        }
        ObservationValue::Condition(entry) => {
            let mut element = XmlElement::new(entry.level.element_name())
                .attr("dataItemId", item.id.clone())
                .attr("timestamp", observation.timestamp.clone())
                .attr("sequence", observation.sequence.to_string())
                .attr("type", item.item_type.clone());
            if let Some(name) = &item.name {
                element.set_attribute("name", name.clone());
            }
            if !entry.native_code.is_empty() {
                element.set_attribute("nativeCode", entry.native_code.clone());
            }
            if !entry.native_severity.is_empty() {
                element.set_attribute("nativeSeverity", entry.native_severity.clone());
            }
            if !entry.qualifier.is_empty() {
                element.set_attribute("qualifier", entry.qualifier.clone());
            }
            if entry.message.is_empty() {
                element
            } else {
                element.text(entry.message.clone())
            }
        }
    }
}

/// Synthetic `Normal` for a cleared condition list, anchored to the clearing
/// observation.
fn normal_element(item: &DataItem, observation: &Observation) -> XmlElement {
    let mut element = XmlElement::new("Normal")
        .attr("dataItemId", item.id.clone())
        .attr("timestamp", observation.timestamp.clone())
        .attr("sequence", observation.sequence.to_string())
        .attr("type", item.item_type.clone());
    if let Some(name) = &item.name {
        element.set_attribute("name", name.clone());
    }
    element
}

// ------------------------------------------------------------------
// asset rendering
// ------------------------------------------------------------------

fn asset_element(asset: &Asset) -> XmlElement {
    let mut element = asset.document.clone();
    element.set_attribute("assetId", asset.asset_id.clone());
    element.set_attribute("timestamp", asset.timestamp.clone());
    element.set_attribute("deviceUuid", asset.device_uuid.clone());
    if asset.removed {
        element.set_attribute("removed", "true");
    }
    element
}

/// `SPINDLE_SPEED` -> `SpindleSpeed`.
fn pascal_case(type_name: &str) -> String {
    type_name
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
