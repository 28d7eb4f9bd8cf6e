//! Synonym tables for categories and subcategories.
//!
//! Lookups run on text already folded by
//! [`normalize_enum_text`](super::normalize_enum_text). Unknown text is passed
//! through unchanged as `Other`.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::models::{Category, Subcategory};

/// Exact-match category synonyms.
static CATEGORY_SYNONYMS: Lazy<HashMap<&'static str, Category>> = Lazy::new(|| {
    HashMap::from([
        ("e-mail", Category::Email),
        ("email", Category::Email),
        ("mail", Category::Email),
        ("website", Category::Website),
        ("site", Category::Website),
        ("web", Category::Website),
        ("outro", Category::Outro),
        ("outros", Category::Outro),
        ("tel", Category::Telefone),
    ])
});

/// Exact-match subcategory variants.
static SUBCATEGORY_VARIANTS: Lazy<HashMap<&'static str, Subcategory>> = Lazy::new(|| {
    HashMap::from([
        ("plantao", Subcategory::Plantao),
        ("plantao24h", Subcategory::Plantao),
        ("plantao_24h", Subcategory::Plantao),
        ("plantao 24h", Subcategory::Plantao),
        ("plantao-24h", Subcategory::Plantao),
        ("emergencia", Subcategory::Emergencia),
        ("divulgacao", Subcategory::Divulgacao),
        ("lgpd", Subcategory::Lgpd),
        ("comercial pf", Subcategory::ComercialPf),
        ("comercial_pf", Subcategory::ComercialPf),
        ("comercial-pf", Subcategory::ComercialPf),
        ("comercial pj", Subcategory::ComercialPj),
        ("comercial_pj", Subcategory::ComercialPj),
        ("comercial-pj", Subcategory::ComercialPj),
        ("institucional", Subcategory::Institucional),
        ("portal do prestador", Subcategory::PortalDoPrestador),
        ("portal do cliente", Subcategory::PortalDoCliente),
        ("portal da empresa", Subcategory::PortalDaEmpresa),
        ("portal do corretor", Subcategory::PortalDoCorretor),
        ("portal do cooperado", Subcategory::PortalDoCooperado),
        ("e-commerce", Subcategory::ECommerce),
        ("ecommerce", Subcategory::ECommerce),
        ("e_commerce", Subcategory::ECommerce),
    ])
});

/// Map folded category text. Returns `None` for empty text.
pub fn lookup_category(folded: &str) -> Option<Category> {
    if folded.is_empty() {
        return None;
    }
    if let Some(category) = CATEGORY_SYNONYMS.get(folded) {
        return Some(category.clone());
    }
    if folded.contains("whats") {
        return Some(Category::Whatsapp);
    }
    if folded.starts_with("telefone") {
        return Some(Category::Telefone);
    }
    Some(Category::Other(folded.to_string()))
}

/// Map folded subcategory text. Returns `None` for empty text.
pub fn lookup_subcategory(folded: &str) -> Option<Subcategory> {
    if folded.is_empty() {
        return None;
    }
    Some(
        SUBCATEGORY_VARIANTS
            .get(folded)
            .cloned()
            .unwrap_or_else(|| Subcategory::Other(folded.to_string())),
    )
}
