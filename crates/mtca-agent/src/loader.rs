// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MTConnect Devices document loader.
//!
//! Parses a devices XML file into the core [`DeviceSchema`] values. The data
//! plane itself never touches XML input; everything it needs is extracted
//! here at startup.

use mtca::schema::{Category, Component, DataItem, DeviceSchema};
use roxmltree::{Document, Node};
use std::fs;
use std::path::Path;

/// Container element names that are structure, not components.
const STRUCTURAL: &[&str] = &["Components", "DataItems", "Description", "References"];

/// Load every `<Device>` from an MTConnect devices document.
pub fn load_devices<P: AsRef<Path>>(path: P) -> Result<Vec<DeviceSchema>, String> {
    let xml_content = fs::read_to_string(&path)
        .map_err(|e| format!("Failed to read devices file: {}", e))?;
    parse_devices(&xml_content)
}

/// Parse devices document content.
pub fn parse_devices(xml_content: &str) -> Result<Vec<DeviceSchema>, String> {
    let doc = Document::parse(xml_content).map_err(|e| format!("Failed to parse XML: {}", e))?;

    let root = doc.root_element();

    // Find <Devices>; a bare <Device> root is accepted for single-device files.
    let device_nodes: Vec<Node> = if root.tag_name().name() == "Device" {
        vec![root]
    } else {
        root.descendants()
            .find(|n| n.tag_name().name() == "Devices")
            .ok_or("No <Devices> element found")?
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "Device")
            .collect()
    };

    if device_nodes.is_empty() {
        return Err("No <Device> elements found".to_string());
    }

    device_nodes.into_iter().map(|n| parse_device(&n)).collect()
}

fn parse_device(node: &Node) -> Result<DeviceSchema, String> {
    let uuid = node
        .attribute("uuid")
        .ok_or("Device is missing required attribute \"uuid\"")?
        .to_string();
    let name = node
        .attribute("name")
        .ok_or("Device is missing required attribute \"name\"")?
        .to_string();
    let id = node.attribute("id").unwrap_or(uuid.as_str()).to_string();

    Ok(DeviceSchema {
        id,
        uuid,
        name,
        data_items: parse_data_items(node)?,
        components: parse_components(node)?,
    })
}

fn parse_components(node: &Node) -> Result<Vec<Component>, String> {
    let Some(container) = node
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "Components")
    else {
        return Ok(Vec::new());
    };

    container
        .children()
        .filter(|n| n.is_element() && !STRUCTURAL.contains(&n.tag_name().name()))
        .map(|n| parse_component(&n))
        .collect()
}

fn parse_component(node: &Node) -> Result<Component, String> {
    let kind = node.tag_name().name().to_string();
    let id = node
        .attribute("id")
        .ok_or_else(|| format!("<{kind}> is missing required attribute \"id\""))?
        .to_string();

    Ok(Component {
        kind,
        id,
        name: node.attribute("name").map(str::to_string),
        data_items: parse_data_items(node)?,
        components: parse_components(node)?,
    })
}

fn parse_data_items(node: &Node) -> Result<Vec<DataItem>, String> {
    let Some(container) = node
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "DataItems")
    else {
        return Ok(Vec::new());
    };

    container
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "DataItem")
        .map(|n| {
            let id = n
                .attribute("id")
                .ok_or("DataItem is missing required attribute \"id\"")?
                .to_string();
            let category_text = n
                .attribute("category")
                .ok_or_else(|| format!("DataItem {id} is missing \"category\""))?;
            let category = Category::parse(category_text)
                .ok_or_else(|| format!("DataItem {id}: unknown category \"{category_text}\""))?;
            let item_type = n
                .attribute("type")
                .ok_or_else(|| format!("DataItem {id} is missing \"type\""))?
                .to_string();

            Ok(DataItem {
                id,
                name: n.attribute("name").map(str::to_string),
                item_type,
                sub_type: n.attribute("subType").map(str::to_string),
                category,
                units: n.attribute("units").map(str::to_string),
                native_units: n.attribute("nativeUnits").map(str::to_string),
            })
        })
        .collect()
}
