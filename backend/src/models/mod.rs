//! Domain models for the contacts import pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`RawContactRow`] - One untyped CSV data line
//! - [`NormalizedContact`] - Canonical unit of work produced by the normalizer
//! - [`IdentityKey`] - (identifier, category, canonical value) triple
//! - [`Category`] / [`Subcategory`] - Open enums with passthrough for unknown text
//! - [`StoredContactRow`] - A row already persisted in the contacts table

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Raw Row
// =============================================================================

/// One CSV data line, exactly as read.
///
/// Missing optional columns are read as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContactRow {
    /// Physical line in the source file (header is line 1).
    pub line: usize,
    pub identifier: String,
    pub category: String,
    pub subcategory: String,
    pub value: String,
    pub is_primary: String,
    pub label: String,
}

// =============================================================================
// Category
// =============================================================================

/// Contact category (`tipo`).
///
/// The enum is open: unrecognized text is kept verbatim in [`Category::Other`]
/// so that values added on the store side are never dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Email,
    Whatsapp,
    Telefone,
    Website,
    Outro,
    Other(String),
}

impl Category {
    /// Canonical spelling as stored in the database.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Email => "email",
            Self::Whatsapp => "whatsapp",
            Self::Telefone => "telefone",
            Self::Website => "website",
            Self::Outro => "outro",
            Self::Other(s) => s,
        }
    }

    /// Build from an already-canonical spelling.
    pub fn from_canonical(s: &str) -> Self {
        match s {
            "email" => Self::Email,
            "whatsapp" => Self::Whatsapp,
            "telefone" => Self::Telefone,
            "website" => Self::Website,
            "outro" => Self::Outro,
            other => Self::Other(other.to_string()),
        }
    }

    /// Categories whose value is reduced to digits.
    pub fn is_phone_like(&self) -> bool {
        match self {
            Self::Telefone | Self::Whatsapp => true,
            Self::Other(s) => s == "celular",
            _ => false,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_canonical(&s))
    }
}

// =============================================================================
// Subcategory
// =============================================================================

/// Contact subcategory (`subtipo`). Open enum, same policy as [`Category`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subcategory {
    Plantao,
    Emergencia,
    Divulgacao,
    Lgpd,
    ComercialPf,
    ComercialPj,
    Institucional,
    PortalDoPrestador,
    PortalDoCliente,
    PortalDaEmpresa,
    PortalDoCorretor,
    PortalDoCooperado,
    ECommerce,
    Other(String),
}

impl Subcategory {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plantao => "plantao",
            Self::Emergencia => "emergencia",
            Self::Divulgacao => "divulgacao",
            Self::Lgpd => "lgpd",
            Self::ComercialPf => "comercial pf",
            Self::ComercialPj => "comercial pj",
            Self::Institucional => "institucional",
            Self::PortalDoPrestador => "portal do prestador",
            Self::PortalDoCliente => "portal do cliente",
            Self::PortalDaEmpresa => "portal da empresa",
            Self::PortalDoCorretor => "portal do corretor",
            Self::PortalDoCooperado => "portal do cooperado",
            Self::ECommerce => "e-commerce",
            Self::Other(s) => s,
        }
    }

    pub fn from_canonical(s: &str) -> Self {
        match s {
            "plantao" => Self::Plantao,
            "emergencia" => Self::Emergencia,
            "divulgacao" => Self::Divulgacao,
            "lgpd" => Self::Lgpd,
            "comercial pf" => Self::ComercialPf,
            "comercial pj" => Self::ComercialPj,
            "institucional" => Self::Institucional,
            "portal do prestador" => Self::PortalDoPrestador,
            "portal do cliente" => Self::PortalDoCliente,
            "portal da empresa" => Self::PortalDaEmpresa,
            "portal do corretor" => Self::PortalDoCorretor,
            "portal do cooperado" => Self::PortalDoCooperado,
            "e-commerce" => Self::ECommerce,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Subcategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Subcategory {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Subcategory {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_canonical(&s))
    }
}

// =============================================================================
// Identity Key
// =============================================================================

/// The identity of a contact: two contacts with the same key are the same
/// contact, whatever their subcategory, label or primary flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    pub identifier: String,
    pub category: Category,
    pub value: String,
}

impl IdentityKey {
    pub fn new(identifier: impl Into<String>, category: Category, value: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            category,
            value: value.into(),
        }
    }

    /// True when any component is empty; such keys never identify a contact.
    pub fn is_incomplete(&self) -> bool {
        self.identifier.is_empty() || self.category.as_str().is_empty() || self.value.is_empty()
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.identifier, self.category, self.value)
    }
}

// =============================================================================
// Normalized Contact
// =============================================================================

/// A contact in canonical form, ready to be compared against the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedContact {
    /// Source line, kept for reporting.
    pub line: usize,
    /// Three-digit parent identifier (`"007"`).
    pub identifier: String,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<Subcategory>,
    pub value: String,
    pub is_primary: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl NormalizedContact {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(self.identifier.clone(), self.category.clone(), self.value.clone())
    }
}

// =============================================================================
// Stored Row
// =============================================================================

/// A row of the contacts table, as read back from the store.
///
/// Text fields are kept exactly as stored; canonicalization happens in the
/// deduplicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredContactRow {
    pub id: String,
    pub identifier: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub value: String,
    pub is_primary: bool,
    pub active: bool,
    pub label: Option<String>,
    pub created_at: Option<String>,
}

// =============================================================================
// Tests
// =============================================================================
