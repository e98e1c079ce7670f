//! Message shapes exchanged with a channel subscriber.
//!
//! Inbound messages are JSON objects whose single recognized key selects the
//! command. Unknown keys are ignored. When several recognized keys are
//! present only the first in [`COMMAND_KEYS`] order is acted on.

use crate::models::CartItem;
use crate::state::OperationState;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Recognized inbound keys in precedence order. The trailing entries are
/// the names older front-ends still send.
pub const COMMAND_KEYS: &[&str] = &[
    "startBulkImport",
    "startBulkHide",
    "startBulkUnhide",
    "queryState",
    "cartImport",
    "cartUrlImport",
    "hide",
    "unhide",
    "getUnhideState",
    "getCartImportState",
];

/// Import payload: literal cart items, or page URLs that need resolving first.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ImportInput {
    Items(Vec<CartItem>),
    Urls(Vec<String>),
}

impl ImportInput {
    pub fn len(&self) -> usize {
        match self {
            ImportInput::Items(v) => v.len(),
            ImportInput::Urls(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    StartBulkImport(ImportInput),
    StartBulkHide { crumb: Option<String> },
    StartBulkUnhide { crumb: Option<String> },
    QueryState,
}

impl Command {
    pub fn is_start(&self) -> bool {
        !matches!(self, Command::QueryState)
    }

    /// Pick the command out of an inbound message.
    ///
    /// `Ok(None)` means nothing recognized. A recognized key with a payload
    /// that does not decode is an error.
    pub fn from_message(msg: &Value) -> Result<Option<Command>> {
        let obj = match msg.as_object() {
            Some(o) => o,
            None => return Ok(None),
        };
        let Some((key, body)) = COMMAND_KEYS
            .iter()
            .find_map(|k| obj.get(*k).filter(|v| !v.is_null()).map(|v| (*k, v)))
        else {
            return Ok(None);
        };

        let cmd = match key {
            "startBulkImport" | "cartImport" => {
                let input = body
                    .get("items")
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("{} is missing the items field", key))?;
                let input: ImportInput = serde_json::from_value(input)
                    .with_context(|| format!("decoding {} items", key))?;
                Command::StartBulkImport(input)
            }
            "cartUrlImport" => {
                let urls: Vec<String> = serde_json::from_value(body.get("urls").cloned().unwrap_or(Value::Null))
                    .context("decoding cartUrlImport urls")?;
                Command::StartBulkImport(ImportInput::Urls(urls))
            }
            "startBulkHide" | "hide" => Command::StartBulkHide { crumb: crumb_of(body) },
            "startBulkUnhide" | "unhide" => Command::StartBulkUnhide { crumb: crumb_of(body) },
            _ => Command::QueryState,
        };
        Ok(Some(cmd))
    }
}

fn crumb_of(body: &Value) -> Option<String> {
    body.get("crumb").and_then(|c| c.as_str()).map(|s| s.to_string())
}

/// Outbound message. Serializes as `{ "state": {...} }`,
/// `{ "complete": { "message": .. } }` or `{ "fatalError": { "message": .. } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outbound {
    State(OperationState),
    Complete { message: String },
    FatalError { message: String },
}

impl Outbound {
    pub fn to_json(&self) -> String {
        // Outbound only holds strings, integers and enums.
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!("{{\"fatalError\":{{\"message\":\"encode failed: {}\"}}}}", e)
        })
    }
}
