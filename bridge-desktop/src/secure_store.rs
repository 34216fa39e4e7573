//! Backend credential kept in the host keychain

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use keyring::Entry;
use tracing::{debug, warn};

/// Secrets held by the OS credential service (Keychain, Credential
/// Manager or Secret Service, depending on the host).
///
/// The keyring stores text, so values are base64 encoded on the way in.
pub struct KeyringSecureStore {
    service: String,
}

fn vault_error(action: &str, key: &str, e: keyring::Error) -> BridgeError {
    BridgeError::OperationFailed(format!("keychain {} `{}`: {}", action, key, e))
}

impl KeyringSecureStore {
    /// Entries are filed under the `device-audio` service.
    pub fn new() -> Self {
        Self::with_service_name("device-audio")
    }

    pub fn with_service_name(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service
    }

    fn slot(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).map_err(|e| vault_error("open", key, e))
    }
}

impl Default for KeyringSecureStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecureStore for KeyringSecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        let encoded = STANDARD.encode(value);
        self.slot(key)?
            .set_password(&encoded)
            .map_err(|e| vault_error("write", key, e))?;
        debug!(key, "Credential saved");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let stored = match self.slot(key)?.get_password() {
            Ok(text) => text,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => return Err(vault_error("read", key, e)),
        };
        STANDARD.decode(stored.as_bytes()).map(Some).map_err(|e| {
            warn!(key, "Stored credential is not valid base64");
            BridgeError::OperationFailed(format!("corrupt credential `{}`: {}", key, e))
        })
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        match self.slot(key)?.delete_credential() {
            Ok(()) => {
                debug!(key, "Credential removed");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(vault_error("delete", key, e)),
        }
    }
}
