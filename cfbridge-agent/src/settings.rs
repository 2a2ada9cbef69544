//! User-entered bucket settings and the decision whether they call for a
//! remount.

use cfbridge_common::config::{BucketDefaults, MAX_CAPACITY_GB};
use cfbridge_mount::{BucketParams, Credentials};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// One snapshot of the settings dialog, values exactly as the user typed them
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub key_id: String,
    pub secret_key: String,
    pub endpoint_url: String,
    pub bucket_name: String,
    /// Gigabytes, as text
    pub bucket_capacity: String,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("key_id", &self.key_id)
            .field("secret_key", &"<redacted>")
            .field("endpoint_url", &self.endpoint_url)
            .field("bucket_name", &self.bucket_name)
            .field("bucket_capacity", &self.bucket_capacity)
            .finish()
    }
}

impl Settings {
    /// No credentials at all; nothing to mount with
    pub fn is_empty(&self) -> bool {
        self.key_id.is_empty() && self.secret_key.is_empty()
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.key_id, &self.secret_key)
    }

    /// Capacity in GB, if the field holds a positive whole number small
    /// enough to be expressed in MB
    pub fn capacity_gb(&self) -> Option<u64> {
        self.bucket_capacity
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|gb| *gb > 0 && *gb <= MAX_CAPACITY_GB)
    }

    /// Replace an unusable capacity with the default. Returns whether it changed.
    pub fn normalize(&mut self, defaults: &BucketDefaults) -> bool {
        if defaults.credentials_only || self.capacity_gb().is_some() {
            return false;
        }
        warn!(
            "Bad input for bucket capacity '{}', using {} GB",
            self.bucket_capacity, defaults.capacity_gb
        );
        self.bucket_capacity = defaults.capacity_gb.to_string();
        true
    }

    /// Parameters for `gen-config`
    pub fn bucket_params(&self, defaults: &BucketDefaults) -> BucketParams {
        let mut params = BucketParams {
            region: defaults.region.clone(),
            endpoint: defaults.endpoint.clone(),
            bucket_name: String::new(),
            capacity_mb: defaults.capacity_mb(),
        };
        if defaults.credentials_only {
            return params;
        }

        if !self.endpoint_url.is_empty() {
            params.endpoint = self.endpoint_url.clone();
        }
        params.bucket_name = self.bucket_name.clone();
        if let Some(mb) = self.capacity_gb().and_then(|gb| gb.checked_mul(1024)) {
            params.capacity_mb = mb;
        }
        params
    }
}

/// Why a remount is needed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemountReason {
    NotMounted,
    CredentialsChanged,
    EndpointChanged,
    BucketChanged,
    CapacityChanged,
}

impl fmt::Display for RemountReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RemountReason::NotMounted => "bucket is not mounted",
            RemountReason::CredentialsChanged => "credentials changed",
            RemountReason::EndpointChanged => "endpoint changed",
            RemountReason::BucketChanged => "bucket name changed",
            RemountReason::CapacityChanged => "bucket capacity changed",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Settings carry no credentials
    Ignore,
    /// Current mount already reflects these settings
    Keep,
    Remount(RemountReason),
}

/// Decide what a new settings snapshot means for the mount.
///
/// A missing previous snapshot compares like an all-empty one.
pub fn remount_decision(
    previous: Option<&Settings>,
    current: &Settings,
    mounted: bool,
    defaults: &BucketDefaults,
) -> Decision {
    if current.is_empty() {
        return Decision::Ignore;
    }
    if !mounted {
        return Decision::Remount(RemountReason::NotMounted);
    }

    let empty = Settings::default();
    let previous = previous.unwrap_or(&empty);
    if previous == current {
        return Decision::Keep;
    }

    if previous.key_id != current.key_id || previous.secret_key != current.secret_key {
        return Decision::Remount(RemountReason::CredentialsChanged);
    }
    if defaults.credentials_only {
        return Decision::Keep;
    }

    if previous.endpoint_url != current.endpoint_url {
        let is_default = |endpoint: &str| endpoint.is_empty() || endpoint == defaults.endpoint;
        if !(is_default(&previous.endpoint_url) && is_default(&current.endpoint_url)) {
            return Decision::Remount(RemountReason::EndpointChanged);
        }
    }
    if previous.bucket_name != current.bucket_name {
        return Decision::Remount(RemountReason::BucketChanged);
    }
    if previous.bucket_capacity != current.bucket_capacity {
        return Decision::Remount(RemountReason::CapacityChanged);
    }

    Decision::Keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfbridge_common::config::DEFAULT_ENDPOINT;

    fn settings() -> Settings {
        Settings {
            key_id: "AKIA1".to_string(),
            secret_key: "secret".to_string(),
            endpoint_url: DEFAULT_ENDPOINT.to_string(),
            bucket_name: "footage".to_string(),
            bucket_capacity: "2048".to_string(),
        }
    }

    fn credentials_only() -> BucketDefaults {
        BucketDefaults {
            credentials_only: true,
            ..BucketDefaults::default()
        }
    }

    #[test]
    fn test_remount_decision_table() {
        let defaults = BucketDefaults::default();
        let base = settings();

        let cases: Vec<(&str, Option<Settings>, Settings, bool, Decision)> = vec![
            ("empty settings", Some(base.clone()), Settings::default(), true, Decision::Ignore),
            (
                "empty settings while unmounted",
                None,
                Settings { endpoint_url: "x".into(), ..Settings::default() },
                false,
                Decision::Ignore,
            ),
            (
                "not mounted",
                Some(base.clone()),
                base.clone(),
                false,
                Decision::Remount(RemountReason::NotMounted),
            ),
            ("identical", Some(base.clone()), base.clone(), true, Decision::Keep),
            (
                "first snapshot while mounted",
                None,
                base.clone(),
                true,
                Decision::Remount(RemountReason::CredentialsChanged),
            ),
            (
                "key id changed",
                Some(base.clone()),
                Settings { key_id: "AKIA2".into(), ..base.clone() },
                true,
                Decision::Remount(RemountReason::CredentialsChanged),
            ),
            (
                "secret changed",
                Some(base.clone()),
                Settings { secret_key: "other".into(), ..base.clone() },
                true,
                Decision::Remount(RemountReason::CredentialsChanged),
            ),
            (
                "default endpoint cleared",
                Some(base.clone()),
                Settings { endpoint_url: String::new(), ..base.clone() },
                true,
                Decision::Keep,
            ),
            (
                "endpoint changed",
                Some(base.clone()),
                Settings { endpoint_url: "https://s3.eu-west-1.example.com".into(), ..base.clone() },
                true,
                Decision::Remount(RemountReason::EndpointChanged),
            ),
            (
                "bucket changed",
                Some(base.clone()),
                Settings { bucket_name: "archive".into(), ..base.clone() },
                true,
                Decision::Remount(RemountReason::BucketChanged),
            ),
            (
                "capacity changed",
                Some(base.clone()),
                Settings { bucket_capacity: "4096".into(), ..base.clone() },
                true,
                Decision::Remount(RemountReason::CapacityChanged),
            ),
        ];

        for (name, previous, current, mounted, expected) in cases {
            assert_eq!(
                remount_decision(previous.as_ref(), &current, mounted, &defaults),
                expected,
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_credentials_only_ignores_bucket_fields() {
        let defaults = credentials_only();
        let base = settings();
        let changed = Settings {
            endpoint_url: "https://elsewhere.example.com".into(),
            bucket_name: "other".into(),
            bucket_capacity: "1".into(),
            ..base.clone()
        };
        assert_eq!(
            remount_decision(Some(&base), &changed, true, &defaults),
            Decision::Keep
        );

        let new_key = Settings { key_id: "AKIA9".into(), ..base.clone() };
        assert_eq!(
            remount_decision(Some(&base), &new_key, true, &defaults),
            Decision::Remount(RemountReason::CredentialsChanged)
        );
    }

    #[test]
    fn test_bucket_params_converts_capacity_to_mb() {
        let params = settings().bucket_params(&BucketDefaults::default());
        assert_eq!(params.capacity_mb, 2048 * 1024);
        assert_eq!(params.bucket_name, "footage");
        assert_eq!(params.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(params.region, "us-east-1");
    }

    #[test]
    fn test_bucket_params_empty_endpoint_uses_default() {
        let settings = Settings { endpoint_url: String::new(), ..settings() };
        let params = settings.bucket_params(&BucketDefaults::default());
        assert_eq!(params.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_bucket_params_credentials_only() {
        let settings = Settings {
            endpoint_url: "https://elsewhere.example.com".into(),
            ..settings()
        };
        let params = settings.bucket_params(&credentials_only());
        assert_eq!(params.endpoint, DEFAULT_ENDPOINT);
        assert!(params.bucket_name.is_empty());
        assert_eq!(params.capacity_mb, 1024 * 1024);
    }

    #[test]
    fn test_invalid_capacity_falls_back_to_default() {
        let defaults = BucketDefaults::default();
        for bad in ["", "lots", "-5", "0", "1.5"] {
            let mut settings = Settings { bucket_capacity: bad.to_string(), ..settings() };
            assert_eq!(settings.bucket_params(&defaults).capacity_mb, 1024 * 1024, "{bad}");
            assert!(settings.normalize(&defaults), "{bad}");
            assert_eq!(settings.bucket_capacity, "1024");
        }

        let mut valid = settings();
        assert!(!valid.normalize(&defaults));
        assert_eq!(valid.bucket_capacity, "2048");
    }

    #[test]
    fn test_capacity_too_large_for_mb_falls_back_to_default() {
        let defaults = BucketDefaults::default();
        let mut settings = Settings {
            bucket_capacity: u64::MAX.to_string(),
            ..settings()
        };
        assert_eq!(settings.capacity_gb(), None);
        assert_eq!(settings.bucket_params(&defaults).capacity_mb, 1024 * 1024);
        assert!(settings.normalize(&defaults));
        assert_eq!(settings.bucket_capacity, "1024");

        let largest = Settings {
            bucket_capacity: MAX_CAPACITY_GB.to_string(),
            ..Settings::default()
        };
        assert_eq!(
            largest.bucket_params(&defaults).capacity_mb,
            MAX_CAPACITY_GB * 1024
        );
    }

    #[test]
    fn test_debug_hides_secret() {
        let debug = format!("{:?}", settings());
        assert!(debug.contains("AKIA1"));
        assert!(!debug.contains("\"secret\""));
    }

    #[test]
    fn test_settings_toml_uses_field_ids() {
        let parsed: Settings = toml::from_str(
            "keyId = \"AKIA\"\nsecretKey = \"s\"\nbucketCapacity = \"10\"\n",
        )
        .unwrap();
        assert_eq!(parsed.key_id, "AKIA");
        assert_eq!(parsed.secret_key, "s");
        assert_eq!(parsed.capacity_gb(), Some(10));
        assert!(parsed.endpoint_url.is_empty());
    }
}
