// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Restricted XPath filter for `path=` query parameters.
//!
//! # Supported Syntax
//!
//! ```text
//! path      ::= step+
//! step      ::= '//' name predicate?
//! name      ::= identifier | '*'
//! predicate ::= '[@' attr '=' '"' value '"' ']'
//! ```
//!
//! A path selects data items: the final step must be `DataItem` (with an
//! optional attribute predicate); any preceding steps constrain the component
//! containment chain. A path whose final step is a component name parses but
//! selects nothing.

use super::{DataItem, PathNode, SchemaIndex};
use crate::error::QueryError;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    name: String,
    predicate: Option<(String, String)>,
}

/// A parsed `path=` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFilter {
    steps: Vec<Step>,
}

impl PathFilter {
    /// Parse an expression; failures surface as `INVALID_XPATH`.
    pub fn parse(input: &str) -> Result<Self, QueryError> {
        let mut cursor = Cursor::new(input);
        let mut steps = Vec::new();

        while !cursor.at_end() {
            cursor.expect_str("//").map_err(|e| invalid(input, &e))?;
            let name = cursor.read_name().map_err(|e| invalid(input, &e))?;
            let predicate = if cursor.peek() == Some('[') {
                Some(cursor.read_predicate().map_err(|e| invalid(input, &e))?)
            } else {
                None
            };
            steps.push(Step { name, predicate });
        }

        if steps.is_empty() {
            return Err(invalid(input, "empty expression"));
        }
        Ok(Self { steps })
    }

    /// True iff at least one data item of any of the listed devices matches.
    #[must_use]
    pub fn matches_any(&self, index: &SchemaIndex, uuids: &[&str]) -> bool {
        uuids.iter().any(|uuid| {
            index.walk(uuid).iter().any(|entry| {
                entry
                    .items
                    .iter()
                    .any(|item| self.matches_item(&entry.chain, item))
            })
        })
    }

    /// True iff the given data item, reached through `chain`, is selected.
    #[must_use]
    pub fn matches_item(&self, chain: &[PathNode<'_>], item: &DataItem) -> bool {
        let Some((item_step, component_steps)) = self.steps.split_last() else {
            return false;
        };
        // Only DataItem steps select data items; a bare component path
        // (e.g. `//Axes`) selects nothing.
        if item_step.name != "DataItem" {
            return false;
        }
        if let Some((attr, value)) = &item_step.predicate {
            if !item_attr_matches(item, attr, value) {
                return false;
            }
        }

        // Component steps must align with the containment chain in order
        // (descendant semantics: gaps are allowed).
        let mut position = 0;
        for step in component_steps {
            let found = chain[position..].iter().position(|node| {
                let name_ok = step.name == "*" || step.name == node.kind;
                let pred_ok = match &step.predicate {
                    Some((attr, value)) => node_attr_matches(node, attr, value),
                    None => true,
                };
                name_ok && pred_ok
            });
            match found {
                Some(offset) => position += offset + 1,
                None => return false,
            }
        }
        true
    }
}

fn invalid(input: &str, detail: &str) -> QueryError {
    QueryError::InvalidXPath(format!("\"{input}\" ({detail})"))
}

fn item_attr_matches(item: &DataItem, attr: &str, value: &str) -> bool {
    match attr {
        "id" => item.id == value,
        "name" => item.name.as_deref() == Some(value),
        "type" => item.item_type == value,
        "subType" => item.sub_type.as_deref() == Some(value),
        "category" => {
            matches!(
                (item.category, value),
                (super::Category::Event, "EVENT")
                    | (super::Category::Sample, "SAMPLE")
                    | (super::Category::Condition, "CONDITION")
            )
        }
        _ => false,
    }
}

fn node_attr_matches(node: &PathNode<'_>, attr: &str, value: &str) -> bool {
    match attr {
        "id" => node.id == value,
        "name" => node.name == Some(value),
        _ => false,
    }
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn expect_str(&mut self, expected: &str) -> Result<(), String> {
        if self.input[self.pos..].starts_with(expected) {
            self.pos += expected.len();
            Ok(())
        } else {
            Err(format!("expected \"{expected}\" at offset {}", self.pos))
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), String> {
        match self.bump() {
            Some(ch) if ch == expected => Ok(()),
            _ => Err(format!("expected '{expected}'")),
        }
    }

    fn read_name(&mut self) -> Result<String, String> {
        if self.peek() == Some('*') {
            self.bump();
            return Ok("*".to_string());
        }
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' || ch == ':' {
                self.bump();
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err("expected element name".to_string());
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn read_predicate(&mut self) -> Result<(String, String), String> {
        self.expect_char('[')?;
        self.expect_char('@')?;
        let attr = self.read_name()?;
        self.expect_char('=')?;
        let quote = match self.bump() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err("expected quoted attribute value".to_string()),
        };
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch == quote {
                break;
            }
            self.bump();
        }
        let value = self.input[start..self.pos].to_string();
        self.expect_char(quote)
            .map_err(|_| "unterminated attribute value".to_string())?;
        self.expect_char(']')?;
        Ok((attr, value))
    }
}

// ============================================================================
// TESTS
// ============================================================================
