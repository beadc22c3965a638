//! Wi-Fi credential types.
//!
//! # Example
//!
//! ```
//! use wifi_provision_esp32::config::{Credentials, Field};
//!
//! let mut creds = Credentials::empty();
//! assert!(!creds.is_configured());
//!
//! creds.set(Field::NetworkId, "HomeNet");
//! creds.set(Field::Secret, "s3cr3t");
//! assert!(creds.is_configured());
//! assert_eq!(creds.get(Field::NetworkId), "HomeNet");
//! ```

use super::{MAX_FIELD_LEN, SLOT_WIDTH};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// One of the two provisionable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Network identifier (SSID).
    NetworkId,
    /// Network secret (password).
    Secret,
}

impl Field {
    /// Both fields in storage order.
    pub const ALL: [Field; 2] = [Field::NetworkId, Field::Secret];

    /// Byte offset of this field's slot in the storage image.
    pub const fn offset(self) -> usize {
        match self {
            Self::NetworkId => 0,
            Self::Secret => SLOT_WIDTH,
        }
    }

    /// Short name used in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkId => "ssid",
            Self::Secret => "password",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cut `value` to what a storage slot can hold.
///
/// Text ends at the first NUL. Anything longer than [`MAX_FIELD_LEN`] bytes
/// is truncated at the nearest UTF-8 character boundary at or below the limit.
pub fn fit_to_slot(value: &str) -> &str {
    let value = match value.find('\0') {
        Some(end) => &value[..end],
        None => value,
    };
    if value.len() <= MAX_FIELD_LEN {
        return value;
    }
    let mut end = MAX_FIELD_LEN;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Credentials for connecting to an access point.
///
/// Both fields always fit a storage slot. The password is zeroed on drop and
/// redacted from `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    ssid: String,
    password: String,
}

impl Credentials {
    /// Create credentials, truncating each field to the slot width.
    pub fn new(ssid: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        Self {
            ssid: fit_to_slot(ssid.as_ref()).to_string(),
            password: fit_to_slot(password.as_ref()).to_string(),
        }
    }

    /// Credentials of a fresh device.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Network identifier.
    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// Network secret.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Value of one field.
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::NetworkId => &self.ssid,
            Field::Secret => &self.password,
        }
    }

    /// Replace one field, truncating to the slot width.
    pub fn set(&mut self, field: Field, value: &str) {
        let value = fit_to_slot(value).to_string();
        match field {
            Field::NetworkId => self.ssid = value,
            Field::Secret => {
                self.password.zeroize();
                self.password = value;
            }
        }
    }

    /// True once a network identifier is present.
    ///
    /// An empty password is valid (open network).
    pub fn is_configured(&self) -> bool {
        !self.ssid.is_empty()
    }

    /// True for an open network (no password).
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password_len", &self.password.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_offsets() {
        assert_eq!(Field::NetworkId.offset(), 0);
        assert_eq!(Field::Secret.offset(), SLOT_WIDTH);
        assert_eq!(Field::ALL, [Field::NetworkId, Field::Secret]);
    }

    #[test]
    fn test_fit_short_value_unchanged() {
        assert_eq!(fit_to_slot("HomeNet"), "HomeNet");
        assert_eq!(fit_to_slot(""), "");
    }

    #[test]
    fn test_fit_truncates_long_value() {
        let long = "a".repeat(80);
        assert_eq!(fit_to_slot(&long).len(), MAX_FIELD_LEN);

        let exact = "b".repeat(SLOT_WIDTH);
        assert_eq!(fit_to_slot(&exact).len(), MAX_FIELD_LEN);
    }

    #[test]
    fn test_fit_respects_char_boundary() {
        // 48 ASCII bytes then a 2-byte character straddling the limit
        let value = format!("{}é", "x".repeat(48));
        assert_eq!(value.len(), 50);
        assert_eq!(fit_to_slot(&value), "x".repeat(48));
    }

    #[test]
    fn test_fit_stops_at_nul() {
        assert_eq!(fit_to_slot("abc\0def"), "abc");
    }

    #[test]
    fn test_set_and_get() {
        let mut creds = Credentials::empty();
        creds.set(Field::NetworkId, "HomeNet");
        assert!(creds.is_configured());
        assert!(creds.is_open());

        creds.set(Field::Secret, "s3cr3t");
        assert_eq!(creds.ssid(), "HomeNet");
        assert_eq!(creds.password(), "s3cr3t");
        assert!(!creds.is_open());
    }

    #[test]
    fn test_new_truncates() {
        let creds = Credentials::new("n".repeat(60), "p".repeat(60));
        assert_eq!(creds.ssid().len(), MAX_FIELD_LEN);
        assert_eq!(creds.password().len(), MAX_FIELD_LEN);
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("HomeNet", "s3cr3t");
        let debug_str = format!("{:?}", creds);
        assert!(debug_str.contains("HomeNet"));
        assert!(!debug_str.contains("s3cr3t"));
    }
}
