// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MTConnect query error taxonomy.
//!
//! Every failed query surfaces as one or more `Error` elements in an
//! MTConnectError document; the variants here carry the human text and map to
//! the wire `errorCode` attribute. Ingest-side failures never reach clients,
//! they are logged and dropped at the parse boundary.

use thiserror::Error;

/// A single MTConnect query error.
///
/// Parameter-validation errors accumulate (a response may carry several);
/// existence errors (`NoDevice`, `AssetNotFound`) are single-error and
/// terminate validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Requested device uuid or name is not registered.
    #[error("Could not find the device matching \"{0}\"")]
    NoDevice(String),

    /// Asset id not present in the asset store.
    #[error("Could not find asset: {0}")]
    AssetNotFound(String),

    /// `at`/`from` outside the retained window, `count` outside `[1, B]`,
    /// `interval` outside its range, or a streaming client fell behind.
    #[error("{0}")]
    OutOfRange(String),

    /// `path=` failed to parse under the restricted XPath grammar.
    #[error("The path could not be parsed: {0}")]
    InvalidXPath(String),

    /// Path parsed but references no data item in scope.
    #[error("The path does not select any data items: {0}")]
    Unsupported(String),

    /// Mutually exclusive or malformed parameter combination.
    #[error("{0}")]
    InvalidRequest(String),
}

impl QueryError {
    /// Wire `errorCode` attribute for the MTConnectError document.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::NoDevice(_) => "NO_DEVICE",
            QueryError::AssetNotFound(_) => "ASSET_NOT_FOUND",
            QueryError::OutOfRange(_) => "OUT_OF_RANGE",
            QueryError::InvalidXPath(_) => "INVALID_XPATH",
            QueryError::Unsupported(_) => "UNSUPPORTED",
            QueryError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }
}
