// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SHDR line parser.
//!
//! One adapter line becomes a timestamped set of keyed observations plus any
//! asset commands. The key's category (looked up in the schema index) decides
//! how many pipe-delimited tokens belong to it: one for EVENT/SAMPLE, five
//! for CONDITION. The parser never panics across the ingest boundary; bad
//! lines are reported as typed errors and unknown keys are skipped with a
//! warning.

use crate::schema::{Category, SchemaIndex};
use chrono::{DateTime, NaiveDateTime};
use thiserror::Error;
use tracing::warn;

/// Number of tokens a CONDITION key consumes:
/// level, nativeCode, nativeSeverity, qualifier, message.
pub const CONDITION_FIELD_COUNT: usize = 5;

/// SHDR parse failures. The whole line is discarded; the caller logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShdrError {
    #[error("empty line")]
    EmptyLine,
    #[error("malformed timestamp \"{0}\"")]
    MalformedTimestamp(String),
    #[error("truncated line: key \"{0}\" expects {1} value field(s)")]
    Truncated(String, usize),
    #[error("malformed asset command {0}")]
    MalformedCommand(String),
}

/// One keyed value from a line. `values` holds exactly one token for
/// EVENT/SAMPLE keys and exactly five for CONDITION keys (empty tokens
/// preserved as empty strings).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShdrItem {
    pub key: String,
    pub category: Category,
    pub values: Vec<String>,
}

/// Asset lifecycle commands embedded in SHDR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetCommand {
    /// `@ASSET@|id|type|<xml...>` - the XML blob is the raw remainder of the
    /// line and may itself contain pipes.
    Add {
        asset_id: String,
        asset_type: String,
        xml: String,
    },
    /// `@UPDATE_ASSET@|id|key|value[|key|value...]`
    Update {
        asset_id: String,
        pairs: Vec<(String, String)>,
    },
    /// `@REMOVE_ASSET@|id`
    Remove { asset_id: String },
}

/// Result of parsing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// Validated ISO-8601 timestamp, original spelling preserved.
    pub timestamp: String,
    pub items: Vec<ShdrItem>,
    pub commands: Vec<AssetCommand>,
}

/// Parse one SHDR line for the given device.
///
/// Unknown keys are skipped (with their single value token) and logged;
/// structural failures discard the whole line.
pub fn parse_line(
    line: &str,
    uuid: &str,
    index: &SchemaIndex,
) -> Result<ParsedLine, ShdrError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Err(ShdrError::EmptyLine);
    }

    let mut fields = Fields::new(line);
    let timestamp = fields.next().ok_or(ShdrError::EmptyLine)?;
    if !timestamp_is_valid(timestamp) {
        return Err(ShdrError::MalformedTimestamp(timestamp.to_string()));
    }

    let mut items = Vec::new();
    let mut commands = Vec::new();

    while let Some(key) = fields.next() {
        if key.is_empty() {
            continue;
        }
        if let Some(command) = key.strip_prefix('@').and_then(|k| k.strip_suffix('@')) {
            commands.push(parse_command(command, &mut fields)?);
            continue;
        }

        match index.data_item(uuid, key) {
            Some(item) => {
                let arity = match item.category {
                    Category::Condition => CONDITION_FIELD_COUNT,
                    Category::Event | Category::Sample => 1,
                };
                let mut values = Vec::with_capacity(arity);
                for _ in 0..arity {
                    match fields.next() {
                        Some(value) => values.push(value.to_string()),
                        None => return Err(ShdrError::Truncated(key.to_string(), arity)),
                    }
                }
                items.push(ShdrItem {
                    key: key.to_string(),
                    category: item.category,
                    values,
                });
            }
            None => {
                // Skip the key and its (assumed single) value token.
                warn!("[shdr::parse_line] unknown data item \"{key}\" for device {uuid}, skipping");
                fields.next();
            }
        }
    }

    Ok(ParsedLine {
        timestamp: timestamp.to_string(),
        items,
        commands,
    })
}

fn parse_command(name: &str, fields: &mut Fields<'_>) -> Result<AssetCommand, ShdrError> {
    match name {
        "ASSET" => {
            let asset_id = fields
                .next()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ShdrError::MalformedCommand("@ASSET@: missing id".into()))?
                .to_string();
            let asset_type = fields
                .next()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ShdrError::MalformedCommand("@ASSET@: missing type".into()))?
                .to_string();
            let xml = fields
                .remainder()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ShdrError::MalformedCommand("@ASSET@: missing body".into()))?
                .to_string();
            Ok(AssetCommand::Add {
                asset_id,
                asset_type,
                xml,
            })
        }
        "UPDATE_ASSET" => {
            let asset_id = fields
                .next()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ShdrError::MalformedCommand("@UPDATE_ASSET@: missing id".into()))?
                .to_string();
            let mut pairs = Vec::new();
            while let Some(key) = fields.next() {
                let value = fields.next().ok_or_else(|| {
                    ShdrError::MalformedCommand(format!(
                        "@UPDATE_ASSET@: key \"{key}\" has no value"
                    ))
                })?;
                pairs.push((key.to_string(), value.to_string()));
            }
            if pairs.is_empty() {
                return Err(ShdrError::MalformedCommand(
                    "@UPDATE_ASSET@: no key/value pairs".into(),
                ));
            }
            Ok(AssetCommand::Update { asset_id, pairs })
        }
        "REMOVE_ASSET" => {
            let asset_id = fields
                .next()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ShdrError::MalformedCommand("@REMOVE_ASSET@: missing id".into()))?
                .to_string();
            Ok(AssetCommand::Remove { asset_id })
        }
        other => Err(ShdrError::MalformedCommand(format!("@{other}@"))),
    }
}

/// Accepts ISO-8601 UTC with fractional seconds to microsecond precision,
/// with or without the trailing `Z`.
fn timestamp_is_valid(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}

/// Pipe-delimited field cursor. Unlike `split('|')` it can hand back the raw
/// remainder of the line, which `@ASSET@` needs for its XML body.
struct Fields<'a> {
    rest: Option<&'a str>,
}

impl<'a> Fields<'a> {
    fn new(line: &'a str) -> Self {
        Self { rest: Some(line) }
    }

    fn next(&mut self) -> Option<&'a str> {
        let rest = self.rest?;
        match rest.find('|') {
            Some(split) => {
                self.rest = Some(&rest[split + 1..]);
                Some(&rest[..split])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }

    fn remainder(&mut self) -> Option<&'a str> {
        self.rest.take()
    }
}

// ============================================================================
// TESTS
// ============================================================================
