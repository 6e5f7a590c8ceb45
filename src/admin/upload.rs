use std::{collections::HashSet, fs, path::Path};

use anyhow::{Context, Result};

use crate::model::{InventoryItem, ItemAction};

use super::{BatchReport, Dispatcher, InventoryAction, directory::ITEM_ID_LENGTH};

/// Extracts item ids from an uploaded file: comma separated, surrounding
/// whitespace ignored, and only entries of exactly five digits kept. The
/// first occurrence of a repeated id wins.
pub fn parse_inventory_ids(contents: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    contents
        .split(',')
        .map(str::trim)
        .filter(|id| id.len() == ITEM_ID_LENGTH && id.bytes().all(|b| b.is_ascii_digit()))
        .filter(|id| seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}

pub fn uploaded_item(tracking: bool) -> InventoryItem {
    let action = if tracking { ItemAction::Tracking } else { ItemAction::Untracked };
    InventoryItem::new("", 0, action)
}

/// Adds every id found in `contents` to the dispatcher's client. Returns
/// `None` if the dispatcher is busy.
pub fn upload_inventory(dispatcher: &Dispatcher<InventoryAction>, contents: &str, tracking: bool) -> Option<BatchReport> {
    let ids = parse_inventory_ids(contents);
    log::info!("UPLOAD: {} item ids (tracking: {})", ids.len(), tracking);
    dispatcher.dispatch_batch(InventoryAction::Add(uploaded_item(tracking)), ids)
}

pub fn upload_inventory_file<P: AsRef<Path>>(
    dispatcher: &Dispatcher<InventoryAction>,
    path: P,
    tracking: bool,
) -> Result<Option<BatchReport>> {
    let contents = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
    Ok(upload_inventory(dispatcher, &contents, tracking))
}
