use base64::{engine::general_purpose::STANDARD, Engine as _};
use cfbridge_common::error::{BridgeError, Result};
use rand::rngs::OsRng;
use rand::RngCore;

const PASSPHRASE_BYTES: usize = 32;

/// Fresh passphrase for encrypting the generated config: 32 random bytes, base64
pub fn generate_passphrase() -> Result<String> {
    let mut bytes = [0u8; PASSPHRASE_BYTES];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
        BridgeError::Internal(format!("Unable to generate secure passphrase: {}", e))
    })?;
    Ok(STANDARD.encode(bytes))
}
