// src/models/credential.rs
//! Device pairing credential.
//!
//! A [`Credential`] is the validated form of the two strings the device hands
//! out when pairing: its client id and an RSA private key. Building one runs
//! the key through the PKCS#8 converter, so every live credential holds a key
//! that the signer is guaranteed to accept.

use crate::error::{CredentialError, KeyError};
use crate::utils::crypto::convert_to_pkcs8_der;
use ring::signature::RsaKeyPair;
use std::fmt;

/// Length of a device client id (a hyphenated UUID).
pub const CLIENT_ID_LEN: usize = 36;

/// Validated device credential.
///
/// # Invariants
/// - `client_id` is exactly 36 characters
/// - `private_key_der` is PKCS#8 DER that parses as an RSA private key
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    client_id: String,
    private_key_der: Vec<u8>,
}

impl Credential {
    /// Builds a credential from the raw id and key text.
    ///
    /// # Arguments
    /// * `client_id` - contents of `deviceid.dat`; surrounding whitespace is ignored
    /// * `private_key` - contents of `privatekey.dat` in any format the key
    ///   converter accepts
    ///
    /// # Errors
    /// - [`CredentialError::InvalidDeviceId`] if the id is not 36 characters
    /// - [`CredentialError::InvalidKey`] if the key cannot be converted or parsed
    pub fn new(client_id: &str, private_key: &str) -> Result<Self, CredentialError> {
        let client_id = client_id.trim();
        let id_len = client_id.chars().count();
        if id_len != CLIENT_ID_LEN {
            return Err(CredentialError::InvalidDeviceId(id_len));
        }

        let private_key_der = convert_to_pkcs8_der(private_key.trim())?;
        RsaKeyPair::from_pkcs8(&private_key_der)
            .map_err(|e| KeyError::Rejected(e.to_string()))?;

        Ok(Self {
            client_id: client_id.to_string(),
            private_key_der,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Normalized PKCS#8 DER bytes of the private key.
    pub fn private_key_der(&self) -> &[u8] {
        &self.private_key_der
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("private_key_der", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const CLIENT_ID: &str = "0a1b2c3d-4e5f-6a7b-8c9d-0e1f2a3b4c5d";
    pub const PKCS1_PEM: &str = include_str!("../testdata/device_key_pkcs1.pem");
    pub const PKCS8_PEM: &str = include_str!("../testdata/device_key_pkcs8.pem");
    pub const OTHER_PKCS1_PEM: &str = include_str!("../testdata/other_key_pkcs1.pem");

    pub fn test_credential() -> Credential {
        Credential::new(CLIENT_ID, PKCS1_PEM).unwrap()
    }

    #[test]
    fn accepts_both_pem_flavours_with_same_result() {
        let from_pkcs1 = Credential::new(CLIENT_ID, PKCS1_PEM).unwrap();
        let from_pkcs8 = Credential::new(CLIENT_ID, PKCS8_PEM).unwrap();
        assert_eq!(from_pkcs1, from_pkcs8);
        assert_eq!(from_pkcs1.client_id(), CLIENT_ID);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let padded_id = format!("  {CLIENT_ID}\n");
        let padded_key = format!("\n{PKCS1_PEM}\n\n");
        assert!(Credential::new(&padded_id, &padded_key).is_ok());
    }

    #[test]
    fn rejects_short_client_id() {
        let err = Credential::new("too-short", PKCS1_PEM).unwrap_err();
        assert!(matches!(err, CredentialError::InvalidDeviceId(9)));
    }

    #[test]
    fn rejects_key_that_is_not_rsa() {
        let bogus = base64::encode(b"definitely not a key");
        let err = Credential::new(CLIENT_ID, &bogus).unwrap_err();
        assert!(matches!(
            err,
            CredentialError::InvalidKey(KeyError::Rejected(_))
        ));
    }

    #[test]
    fn debug_output_hides_key_material() {
        let rendered = format!("{:?}", test_credential());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("MII"));
    }
}
