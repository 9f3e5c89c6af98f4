use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressId(pub String);

impl AddressId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for AddressId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    Home,
    Work,
    Other,
}

impl AddressType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Work => "work",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for AddressType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "home" => Ok(Self::Home),
            "work" => Ok(Self::Work),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown address type `{other}` (expected home|work|other)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    #[serde(rename = "type")]
    pub address_type: AddressType,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

impl Address {
    pub fn from_draft(id: AddressId, draft: AddressDraft) -> Self {
        Self {
            id,
            address_type: draft.address_type,
            street: draft.street,
            city: draft.city,
            state: draft.state,
            zip_code: draft.zip_code,
            country: draft.country,
            is_default: draft.is_default,
        }
    }

    pub fn display_line(&self) -> String {
        format!("{}, {}, {} {}", self.street, self.city, self.state, self.zip_code)
    }

    /// Applies every field present in `patch`, leaving the rest untouched.
    pub fn merged(&self, patch: &AddressPatch) -> Self {
        let mut merged = self.clone();
        if let Some(address_type) = patch.address_type {
            merged.address_type = address_type;
        }
        if let Some(street) = &patch.street {
            merged.street = street.clone();
        }
        if let Some(city) = &patch.city {
            merged.city = city.clone();
        }
        if let Some(state) = &patch.state {
            merged.state = state.clone();
        }
        if let Some(zip_code) = &patch.zip_code {
            merged.zip_code = zip_code.clone();
        }
        if let Some(country) = &patch.country {
            merged.country = country.clone();
        }
        if let Some(is_default) = patch.is_default {
            merged.is_default = is_default;
        }
        merged
    }

    /// Returns the first field that fails validation, as `(field, reason)`.
    pub fn validate_fields(&self) -> Result<(), (&'static str, String)> {
        let required = [
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("zip_code", &self.zip_code),
            ("country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err((field, format!("{field} is required")));
            }
        }

        if !is_valid_zip_code(&self.zip_code) {
            return Err((
                "zip_code",
                format!("zip code `{}` must look like 12345 or 12345-6789", self.zip_code),
            ));
        }

        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDraft {
    #[serde(rename = "type")]
    pub address_type: AddressType,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressPatch {
    #[serde(rename = "type")]
    pub address_type: Option<AddressType>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub is_default: Option<bool>,
}

pub fn is_valid_zip_code(zip_code: &str) -> bool {
    static ZIP_CODE: OnceLock<Option<Regex>> = OnceLock::new();
    ZIP_CODE
        .get_or_init(|| Regex::new(r"^[0-9]{5}(-[0-9]{4})?$").ok())
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(zip_code))
}
