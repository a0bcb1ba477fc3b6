//! Reloadable lookup for display names and vendor code aliases.
//!
//! Keeps vendor taxonomy (numeric country ids, lowercase slugs, named
//! service codes, human labels) out of the core logic. Loaded from a
//! JSON file and reloadable at runtime without a restart.

use crate::config::ProviderId;
use crate::types::{CountryCode, ServiceCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

/// Error loading or reloading the catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Could not read the file.
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),
    /// File contents were not valid catalog JSON.
    #[error("failed to parse catalog file: {0}")]
    Parse(#[from] serde_json::Error),
    /// `reload` called on a catalog without a backing file.
    #[error("catalog has no backing file to reload from")]
    NoBackingFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogData {
    /// Service code -> display name.
    services: HashMap<String, String>,
    /// Country code -> display name.
    countries: HashMap<String, String>,
    /// Provider code -> (country code -> vendor country code).
    provider_countries: HashMap<String, HashMap<String, String>>,
    /// Provider code -> (service code -> vendor service code).
    provider_services: HashMap<String, HashMap<String, String>>,
}

/// Display-name and vendor-alias lookup keyed by provider + code.
#[derive(Debug, Default)]
pub struct Catalog {
    data: RwLock<CatalogData>,
    path: Option<PathBuf>,
}

impl Catalog {
    /// An empty catalog: every lookup falls back to the raw code.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a catalog from a JSON file, remembering the path for
    /// [`reload`](Self::reload).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref().to_path_buf();
        let data = Self::read(&path)?;
        Ok(Self {
            data: RwLock::new(data),
            path: Some(path),
        })
    }

    /// Parse a catalog from a JSON string. The result has no backing
    /// file, so [`reload`](Self::reload) is unavailable.
    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let data: CatalogData = serde_json::from_str(raw)?;
        Ok(Self {
            data: RwLock::new(data),
            path: None,
        })
    }

    /// Re-read the backing file, replacing the in-memory tables.
    pub fn reload(&self) -> Result<(), CatalogError> {
        let path = self.path.as_ref().ok_or(CatalogError::NoBackingFile)?;
        let fresh = Self::read(path)?;
        if let Ok(mut data) = self.data.write() {
            *data = fresh;
        }
        Ok(())
    }

    fn read(path: &Path) -> Result<CatalogData, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Display name for a service code, falling back to the code itself.
    pub fn service_name(&self, service: &ServiceCode) -> String {
        self.data
            .read()
            .ok()
            .and_then(|d| d.services.get(service.as_str()).cloned())
            .unwrap_or_else(|| service.to_string())
    }

    /// Display name for a country code, falling back to the code itself.
    pub fn country_name(&self, country: &CountryCode) -> String {
        self.data
            .read()
            .ok()
            .and_then(|d| d.countries.get(country.as_str()).cloned())
            .unwrap_or_else(|| country.to_string())
    }

    /// Vendor-specific country code for a provider, if mapped.
    pub fn vendor_country(&self, provider: ProviderId, country: &CountryCode) -> Option<String> {
        self.data.read().ok().and_then(|d| {
            d.provider_countries
                .get(provider.code())
                .and_then(|m| m.get(country.as_str()).cloned())
        })
    }

    /// Vendor-specific service code for a provider, if mapped.
    pub fn vendor_service(&self, provider: ProviderId, service: &ServiceCode) -> Option<String> {
        self.data.read().ok().and_then(|d| {
            d.provider_services
                .get(provider.code())
                .and_then(|m| m.get(service.as_str()).cloned())
        })
    }

    /// Reverse lookup: caller-facing service code for a vendor code.
    ///
    /// Used when a vendor lists services under its own names.
    pub fn service_from_vendor(&self, provider: ProviderId, vendor_code: &str) -> Option<ServiceCode> {
        self.data.read().ok().and_then(|d| {
            d.provider_services.get(provider.code()).and_then(|m| {
                m.iter()
                    .find(|(_, v)| v.as_str() == vendor_code)
                    .and_then(|(k, _)| ServiceCode::new(k).ok())
            })
        })
    }

    /// Reverse lookup: caller-facing country code for a vendor code.
    ///
    /// Used when deriving a country list from a vendor price map keyed
    /// by the vendor's own identifiers.
    pub fn country_from_vendor(&self, provider: ProviderId, vendor_code: &str) -> Option<CountryCode> {
        self.data.read().ok().and_then(|d| {
            d.provider_countries.get(provider.code()).and_then(|m| {
                m.iter()
                    .find(|(_, v)| v.as_str() == vendor_code)
                    .and_then(|(k, _)| CountryCode::new(k).ok())
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Catalog {
        let data: CatalogData = serde_json::from_str(
            r#"{
            "services": {"wa": "WhatsApp"},
            "countries": {"US": "United States"},
            "provider_countries": {
                "tiger_sms": {"US": "187"},
                "five_sim": {"US": "usa"}
            },
            "provider_services": {
                "text_verified": {"wa": "whatsapp"}
            }
        }"#,
        )
        .unwrap();
        Catalog {
            data: RwLock::new(data),
            path: None,
        }
    }

    #[test]
    fn test_display_names_with_fallback() {
        let catalog = sample();
        let wa = ServiceCode::new("wa").unwrap();
        let tg = ServiceCode::new("tg").unwrap();
        assert_eq!(catalog.service_name(&wa), "WhatsApp");
        assert_eq!(catalog.service_name(&tg), "tg");

        let us = CountryCode::new("US").unwrap();
        assert_eq!(catalog.country_name(&us), "United States");
    }

    #[test]
    fn test_vendor_aliases() {
        let catalog = sample();
        let us = CountryCode::new("US").unwrap();
        assert_eq!(
            catalog.vendor_country(ProviderId::TigerSms, &us).as_deref(),
            Some("187")
        );
        assert_eq!(
            catalog.vendor_country(ProviderId::FiveSim, &us).as_deref(),
            Some("usa")
        );
        assert_eq!(catalog.vendor_country(ProviderId::SmsPool, &us), None);

        let wa = ServiceCode::new("wa").unwrap();
        assert_eq!(
            catalog
                .vendor_service(ProviderId::TextVerified, &wa)
                .as_deref(),
            Some("whatsapp")
        );
    }

    #[test]
    fn test_reverse_country_lookup() {
        let catalog = sample();
        let code = catalog.country_from_vendor(ProviderId::TigerSms, "187");
        assert_eq!(code.unwrap().as_str(), "US");
        assert!(catalog.country_from_vendor(ProviderId::TigerSms, "999").is_none());
    }

    #[test]
    fn test_reverse_service_lookup() {
        let catalog = sample();
        let code = catalog.service_from_vendor(ProviderId::TextVerified, "whatsapp");
        assert_eq!(code.unwrap().as_str(), "wa");
        assert!(catalog
            .service_from_vendor(ProviderId::TextVerified, "telegram")
            .is_none());
    }

    #[test]
    fn test_reload_without_backing_file_fails() {
        let catalog = Catalog::empty();
        assert!(matches!(
            catalog.reload(),
            Err(CatalogError::NoBackingFile)
        ));
    }
}
