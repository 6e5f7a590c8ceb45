use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::store::{Field, FieldPath};

use super::alert_window::AlertWindow;

/// What the backend should do with an inventory item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ItemAction {
    Tracking,
    Untracked,
}

impl ItemAction {
    pub fn label(&self) -> &'static str {
        match self {
            ItemAction::Tracking => "Tracking",
            ItemAction::Untracked => "Untracked",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub action: ItemAction,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub available: i64,
}

impl InventoryItem {
    pub fn new(name: impl Into<String>, available: i64, action: ItemAction) -> Self {
        Self {
            action,
            name: name.into(),
            available,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    #[serde(default)]
    pub items: BTreeMap<String, InventoryItem>,
    #[serde(default = "default_inventory_change")]
    pub inventory_change: i64,
    #[serde(default)]
    pub min_hours_since_out_of_stock: i64,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
            inventory_change: default_inventory_change(),
            min_hours_since_out_of_stock: 0,
        }
    }
}

fn default_inventory_change() -> i64 {
    1
}

/// Inventory items split by action, each list ordered by item id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PartitionedItems {
    pub tracking: Vec<(String, InventoryItem)>,
    pub untracked: Vec<(String, InventoryItem)>,
}

impl Inventory {
    pub fn partition(&self) -> PartitionedItems {
        let mut partitioned = PartitionedItems::default();
        for (id, item) in &self.items {
            let entry = (id.clone(), item.clone());
            match item.action {
                ItemAction::Tracking => partitioned.tracking.push(entry),
                ItemAction::Untracked => partitioned.untracked.push(entry),
            }
        }
        partitioned
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.items.contains_key(item_id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertTimeZone {
    pub abbrev: String,
    pub alt_name: String,
    pub label: String,
    pub offset: f64,
    pub value: String,
}

impl Default for AlertTimeZone {
    fn default() -> Self {
        Self {
            abbrev: "PDT".to_string(),
            alt_name: "Pacific Daylight Time".to_string(),
            label: "(GMT-07:00) Pacific Time".to_string(),
            offset: -7.0,
            value: "America/Los_Angeles".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailPreferences {
    #[serde(default)]
    pub email: String,
    #[serde(default = "enabled")]
    pub updates_enabled: bool,
}

impl Default for EmailPreferences {
    fn default() -> Self {
        Self {
            email: String::new(),
            updates_enabled: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsPreferences {
    #[serde(default)]
    pub phone_number: String,
    /// Later revisions allow several numbers next to the primary one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phone_numbers: Vec<String>,
    #[serde(default = "enabled")]
    pub updates_enabled: bool,
    #[serde(default)]
    pub alert_time_zone: AlertTimeZone,
    #[serde(default)]
    pub alert_time_range: Vec<u32>,
    #[serde(default)]
    pub alert_window_enabled: bool,
}

impl Default for SmsPreferences {
    fn default() -> Self {
        Self {
            phone_number: String::new(),
            phone_numbers: Vec::new(),
            updates_enabled: true,
            alert_time_zone: AlertTimeZone::default(),
            alert_time_range: Vec::new(),
            alert_window_enabled: false,
        }
    }
}

impl SmsPreferences {
    /// The window SMS alerts are restricted to, if one is enabled and set.
    pub fn alert_window(&self) -> Option<AlertWindow> {
        if !self.alert_window_enabled {
            return None;
        }
        AlertWindow::from_range(&self.alert_time_range)
    }

    pub fn all_phone_numbers(&self) -> Vec<&str> {
        std::iter::once(self.phone_number.as_str())
            .chain(self.phone_numbers.iter().map(String::as_str))
            .filter(|number| !number.is_empty())
            .collect()
    }
}

fn enabled() -> bool {
    true
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notifications {
    #[serde(default)]
    pub email: EmailPreferences,
    #[serde(default)]
    pub sms: SmsPreferences,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub notifications: Notifications,
    #[serde(default)]
    pub update_on_new_data: bool,
    #[serde(default)]
    pub enable_new_data_sms_alerts: bool,
    #[serde(default)]
    pub enable_new_data_email_alerts: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accounting {
    #[serde(default)]
    pub has_paid: bool,
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub next_billing_date: String,
    #[serde(default)]
    pub next_billing_amount: f64,
}

impl Accounting {
    pub fn status_label(&self) -> &'static str {
        if self.has_paid { "Active" } else { "Inactive" }
    }
}

/// Per-client configuration document, stored under `clients/<email>`.
/// `Default` is the document written when an admin adds a client.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub accounting: Accounting,
}

// Typed accessors for the fields the dashboard reads and writes.
impl ClientConfig {
    pub fn has_paid() -> Field<ClientConfig, bool> {
        Field::new(FieldPath::from_dotted("accounting.hasPaid"))
    }

    pub fn inventory_field() -> Field<ClientConfig, Inventory> {
        Field::new(FieldPath::from_dotted("inventory"))
    }

    pub fn inventory_change() -> Field<ClientConfig, i64> {
        Field::new(FieldPath::from_dotted("inventory.inventoryChange"))
    }

    pub fn min_hours_since_out_of_stock() -> Field<ClientConfig, i64> {
        Field::new(FieldPath::from_dotted("inventory.minHoursSinceOutOfStock"))
    }

    pub fn item(item_id: &str) -> Field<ClientConfig, InventoryItem> {
        Field::new(FieldPath::from_segments(["inventory", "items", item_id]))
    }

    pub fn item_action(item_id: &str) -> Field<ClientConfig, ItemAction> {
        Field::new(FieldPath::from_segments(["inventory", "items", item_id, "action"]))
    }

    pub fn notification_email() -> Field<ClientConfig, String> {
        Field::new(FieldPath::from_dotted("preferences.notifications.email.email"))
    }

    pub fn email_updates_enabled() -> Field<ClientConfig, bool> {
        Field::new(FieldPath::from_dotted("preferences.notifications.email.updatesEnabled"))
    }

    pub fn sms_phone_number() -> Field<ClientConfig, String> {
        Field::new(FieldPath::from_dotted("preferences.notifications.sms.phoneNumber"))
    }

    pub fn sms_updates_enabled() -> Field<ClientConfig, bool> {
        Field::new(FieldPath::from_dotted("preferences.notifications.sms.updatesEnabled"))
    }

    pub fn alert_time_range() -> Field<ClientConfig, Vec<u32>> {
        Field::new(FieldPath::from_dotted("preferences.notifications.sms.alertTimeRange"))
    }

    pub fn alert_time_zone() -> Field<ClientConfig, AlertTimeZone> {
        Field::new(FieldPath::from_dotted("preferences.notifications.sms.alertTimeZone"))
    }

    pub fn alert_window_enabled() -> Field<ClientConfig, bool> {
        Field::new(FieldPath::from_dotted("preferences.notifications.sms.alertWindowEnabled"))
    }

    pub fn update_on_new_data() -> Field<ClientConfig, bool> {
        Field::new(FieldPath::from_dotted("preferences.updateOnNewData"))
    }
}
