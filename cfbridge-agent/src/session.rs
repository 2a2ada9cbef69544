use crate::passphrase::generate_passphrase;
use crate::settings::Settings;
use cfbridge_common::error::Result;
use std::fmt;

/// State carried between reconcile calls
#[derive(Default)]
pub struct Session {
    previous: Option<Settings>,
    passphrase: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings seen by the last reconcile
    pub fn previous(&self) -> Option<&Settings> {
        self.previous.as_ref()
    }

    pub fn record(&mut self, settings: Settings) {
        self.previous = Some(settings);
    }

    /// Passphrase the current config was generated with
    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref()
    }

    /// Replace the passphrase with a freshly generated one
    pub fn rotate_passphrase(&mut self) -> Result<&str> {
        let passphrase = generate_passphrase()?;
        Ok(self.passphrase.insert(passphrase).as_str())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("previous", &self.previous)
            .field("has_passphrase", &self.passphrase.is_some())
            .finish()
    }
}
