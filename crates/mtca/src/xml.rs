// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Owned XML document tree.
//!
//! Response documents are built as [`XmlElement`] trees and serialized in one
//! pass; asset XML blobs arriving over SHDR are parsed into the same type so
//! `@UPDATE_ASSET@` can patch nested elements in place.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

/// XML processing errors.
#[derive(Debug, Clone, Error)]
pub enum XmlError {
    #[error("XML parse error: {0}")]
    Parse(String),
    #[error("unbalanced element nesting")]
    Unbalanced,
    #[error("document contains no root element")]
    NoRoot,
    #[error("XML write error: {0}")]
    Write(String),
}

/// A single element: name, attributes, optional text and child elements.
///
/// Attribute order is preserved (MTConnect documents are attribute-heavy and
/// readers expect stable output).
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Create an element with no attributes, text or children.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Builder-style attribute append.
    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Builder-style text assignment.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder-style child append.
    #[must_use]
    pub fn child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// Append a child in place.
    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    /// Set or replace an attribute in place.
    pub fn set_attribute(&mut self, key: &str, value: impl Into<String>) {
        if let Some(slot) = self.attributes.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value.into();
        } else {
            self.attributes.push((key.to_string(), value.into()));
        }
    }

    /// Look up an attribute value.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First descendant (depth-first, document order) with the given name.
    #[must_use]
    pub fn find_descendant(&self, name: &str) -> Option<&XmlElement> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(name) {
                return Some(found);
            }
        }
        None
    }

    /// Mutable reference to the innermost (deepest) element with the given
    /// name, considering this element and all descendants. Ties at equal
    /// depth resolve to the first in document order.
    pub fn deepest_named_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        let path = self.deepest_named_path(name, 0)?.1;
        let mut node = self;
        for idx in path {
            node = &mut node.children[idx];
        }
        Some(node)
    }

    fn deepest_named_path(&self, name: &str, depth: usize) -> Option<(usize, Vec<usize>)> {
        let mut best: Option<(usize, Vec<usize>)> = if self.name == name {
            Some((depth, Vec::new()))
        } else {
            None
        };
        for (idx, child) in self.children.iter().enumerate() {
            if let Some((d, mut path)) = child.deepest_named_path(name, depth + 1) {
                if best.as_ref().map_or(true, |(bd, _)| d > *bd) {
                    path.insert(0, idx);
                    best = Some((d, path));
                }
            }
        }
        best
    }

    /// Parse a single-rooted XML fragment into a tree.
    pub fn parse(input: &str) -> Result<XmlElement, XmlError> {
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => stack.push(Self::from_start(&start)?),
                Ok(Event::Empty(start)) => {
                    let element = Self::from_start(&start)?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack.pop().ok_or(XmlError::Unbalanced)?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(text)) => {
                    let value = text.unescape().map_err(|e| XmlError::Parse(e.to_string()))?;
                    if !value.trim().is_empty() {
                        if let Some(top) = stack.last_mut() {
                            top.text = Some(value.into_owned());
                        }
                    }
                }
                Ok(Event::CData(data)) => {
                    if let Some(top) = stack.last_mut() {
                        top.text = Some(String::from_utf8_lossy(&data).into_owned());
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {} // declarations, comments, PIs
                Err(e) => return Err(XmlError::Parse(e.to_string())),
            }
        }

        if !stack.is_empty() {
            return Err(XmlError::Unbalanced);
        }
        root.ok_or(XmlError::NoRoot)
    }

    fn from_start(start: &BytesStart<'_>) -> Result<XmlElement, XmlError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut element = XmlElement::new(name);
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| XmlError::Parse(e.to_string()))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|e| XmlError::Parse(e.to_string()))?
                .into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    fn attach(
        stack: &mut Vec<XmlElement>,
        root: &mut Option<XmlElement>,
        element: XmlElement,
    ) -> Result<(), XmlError> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => {
                if root.is_some() {
                    return Err(XmlError::Unbalanced);
                }
                *root = Some(element);
            }
        }
        Ok(())
    }

    /// Serialize this tree without an XML declaration.
    pub fn to_string_pretty(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        self.write_into(&mut writer)?;
        String::from_utf8(writer.into_inner()).map_err(|e| XmlError::Write(e.to_string()))
    }

    /// Serialize this tree as a complete document with XML declaration.
    pub fn to_document_string(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| XmlError::Write(e.to_string()))?;
        self.write_into(&mut writer)?;
        let mut out =
            String::from_utf8(writer.into_inner()).map_err(|e| XmlError::Write(e.to_string()))?;
        out.push('\n');
        Ok(out)
    }

    fn write_into(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), XmlError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() && self.text.is_none() {
            writer
                .write_event(Event::Empty(start))
                .map_err(|e| XmlError::Write(e.to_string()))?;
            return Ok(());
        }

        writer
            .write_event(Event::Start(start))
            .map_err(|e| XmlError::Write(e.to_string()))?;
        if let Some(text) = &self.text {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(|e| XmlError::Write(e.to_string()))?;
        }
        for child in &self.children {
            child.write_into(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(|e| XmlError::Write(e.to_string()))?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
