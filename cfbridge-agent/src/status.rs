//! Connection status as shown to the user: a timestamped report plus the
//! banner item placed at the top of the settings model.

use cfbridge_common::config::BucketDefaults;
use cfbridge_common::error::BridgeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// `name` of the banner item in the settings model
pub const STATUS_BANNER_ID: &str = "connectionStatus";

const ITEMS: &str = "items";
const NAME: &str = "name";
const PLUGIN_WEBSITE: &str = "https://github.com/Seagate/nx-lyve-cloud-plugin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Failed,
}

/// Outcome of one reconcile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl StatusReport {
    pub fn connected() -> Self {
        Self::new(ConnectionStatus::Connected, None)
    }

    /// Report the mount state without anything having gone wrong
    pub fn from_mounted(mounted: bool) -> Self {
        if mounted {
            Self::connected()
        } else {
            Self::new(ConnectionStatus::Disconnected, None)
        }
    }

    pub fn failed(error: &BridgeError) -> Self {
        Self::new(ConnectionStatus::Failed, Some(error.to_string()))
    }

    fn new(status: ConnectionStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            checked_at: Utc::now(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Banner item for this report
    pub fn banner(&self) -> Value {
        if self.is_connected() {
            connected_banner()
        } else {
            failed_banner()
        }
    }
}

pub fn connected_banner() -> Value {
    banner("info", "Cloud storage connected successfully!")
}

pub fn failed_banner() -> Value {
    banner("warning", "Cloud storage connection failed!")
}

fn banner(icon: &str, text: &str) -> Value {
    json!({
        "type": "Banner",
        NAME: STATUS_BANNER_ID,
        "icon": icon,
        "text": text,
    })
}

/// Put `banner` into the model's `items`, replacing the item with the same
/// name or inserting it first if there is none.
pub fn set_status_banner(model: &mut Value, banner: Value) {
    let name = banner.get(NAME).cloned();

    if !model.is_object() {
        *model = json!({});
    }
    let Some(object) = model.as_object_mut() else {
        return;
    };
    let items = object.entry(ITEMS).or_insert_with(|| json!([]));
    if !items.is_array() {
        *items = json!([]);
    }
    let Some(items) = items.as_array_mut() else {
        return;
    };

    match items.iter_mut().find(|item| item.get(NAME) == name.as_ref()) {
        Some(existing) => *existing = banner,
        None => items.insert(0, banner),
    }
}

/// The settings dialog: credentials, and unless `credentials_only` the
/// advanced bucket options
pub fn default_settings_model(defaults: &BucketDefaults) -> Value {
    let mut items = vec![json!({
        "type": "GroupBox",
        "caption": "Credentials",
        ITEMS: [
            {
                "type": "TextField",
                NAME: "keyId",
                "caption": "Access Key ID",
                "description": "Cloud bucket access key ID",
                "defaultValue": "",
            },
            {
                "type": "PasswordField",
                NAME: "secretKey",
                "caption": "Secret Key",
                "description": "Cloud bucket secret key",
                "defaultValue": "",
            },
        ],
    })];

    if !defaults.credentials_only {
        items.push(json!({
            "type": "GroupBox",
            "caption": "Advanced Settings",
            ITEMS: [
                {
                    "type": "TextField",
                    NAME: "endpointUrl",
                    "caption": "Endpoint URL",
                    "description": "Set a different endpoint (different region or service)",
                    "defaultValue": defaults.endpoint,
                },
                {
                    "type": "TextField",
                    NAME: "bucketName",
                    "caption": "Bucket Name",
                    "description": "Specify a bucket name (leave empty to let the system automatically detect your bucket)",
                    "defaultValue": "",
                },
                {
                    "type": "SpinBox",
                    NAME: "bucketCapacity",
                    "caption": "Backup Storage Limit (in GB)",
                    "description": format!("Maximum data this server should back up - default is {}GB", defaults.capacity_gb),
                    "defaultValue": defaults.capacity_gb,
                    "minValue": 1,
                    "maxValue": 1_000_000_000u64,
                },
            ],
        }));
        items.push(json!({
            "type": "Link",
            "caption": "Plugin Website",
            "url": PLUGIN_WEBSITE,
        }));
    }

    json!({
        "type": "Settings",
        ITEMS: items,
    })
}
