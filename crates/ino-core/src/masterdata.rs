// SPDX-License-Identifier: MIT OR Apache-2.0
//! Master-data snapshot: customers, contacts, companies, products.
//!
//! A snapshot is immutable once constructed and carries a monotonic version
//! advanced by the upstream master-data service on any mutation. Run state
//! references snapshots by version; the full snapshot never crosses a
//! persistence boundary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// A customer the platform can create orders for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer identifier.
    pub customer_id: String,
    /// Human-facing customer number.
    pub customer_num: String,
    /// Customer display name.
    pub name: String,
    /// Owning company, when modelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
}

/// A contact person attached to a customer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Contact identifier.
    pub contact_id: String,
    /// Contact email address.
    pub email: String,
    /// Contact display name.
    pub name: String,
    /// Customer the contact belongs to.
    pub customer_id: String,
    /// Contact telephone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telephone: Option<String>,
}

/// A company record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Company {
    /// Company identifier.
    pub company_id: String,
    /// Company display name.
    pub name: String,
    /// Registered address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// A sellable product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier.
    pub product_id: String,
    /// Product display name.
    pub name: String,
    /// Unit price, when priced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
}

/// Versioned, immutable master-data snapshot.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MasterDataSnapshot {
    /// Monotonic snapshot version.
    pub version: u64,
    /// All customers.
    #[serde(default)]
    pub customers: Vec<Customer>,
    /// All contacts.
    #[serde(default)]
    pub contacts: Vec<Contact>,
    /// All companies.
    #[serde(default)]
    pub companies: Vec<Company>,
    /// All products.
    #[serde(default)]
    pub products: Vec<Product>,

    #[serde(skip)]
    customer_index: OnceLock<HashMap<String, usize>>,
}

impl Clone for MasterDataSnapshot {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            customers: self.customers.clone(),
            contacts: self.contacts.clone(),
            companies: self.companies.clone(),
            products: self.products.clone(),
            customer_index: OnceLock::new(),
        }
    }
}

impl MasterDataSnapshot {
    /// Build a snapshot from its parts.
    #[must_use]
    pub fn new(
        version: u64,
        customers: Vec<Customer>,
        contacts: Vec<Contact>,
        companies: Vec<Company>,
        products: Vec<Product>,
    ) -> Self {
        Self {
            version,
            customers,
            contacts,
            companies,
            products,
            customer_index: OnceLock::new(),
        }
    }

    /// O(1) customer lookup by id (index built on first use).
    #[must_use]
    pub fn get_customer_by_id(&self, customer_id: &str) -> Option<&Customer> {
        let index = self.customer_index.get_or_init(|| {
            self.customers
                .iter()
                .enumerate()
                .map(|(i, c)| (c.customer_id.clone(), i))
                .collect()
        });
        index.get(customer_id).map(|&i| &self.customers[i])
    }

    /// Contact lookup by email, case-insensitive on the trimmed address.
    #[must_use]
    pub fn get_contact_by_email(&self, email: &str) -> Option<&Contact> {
        let needle = email.trim().to_ascii_lowercase();
        self.contacts
            .iter()
            .find(|c| c.email.to_ascii_lowercase() == needle)
    }

    /// All contacts belonging to a customer.
    #[must_use]
    pub fn contacts_for_customer(&self, customer_id: &str) -> Vec<&Contact> {
        self.contacts
            .iter()
            .filter(|c| c.customer_id == customer_id)
            .collect()
    }

    /// Company lookup by id.
    #[must_use]
    pub fn get_company_by_id(&self, company_id: &str) -> Option<&Company> {
        self.companies.iter().find(|c| c.company_id == company_id)
    }

    /// Product lookup by id.
    #[must_use]
    pub fn get_product_by_id(&self, product_id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.product_id == product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> MasterDataSnapshot {
        MasterDataSnapshot::new(
            7,
            vec![
                Customer {
                    customer_id: "C1".into(),
                    customer_num: "1001".into(),
                    name: "Acme Industrial".into(),
                    company_id: None,
                },
                Customer {
                    customer_id: "C2".into(),
                    customer_num: "1002".into(),
                    name: "Globex".into(),
                    company_id: None,
                },
            ],
            vec![
                Contact {
                    contact_id: "P1".into(),
                    email: "Buyer@Example.com".into(),
                    name: "Buyer One".into(),
                    customer_id: "C1".into(),
                    telephone: Some("13812345678".into()),
                },
                Contact {
                    contact_id: "P2".into(),
                    email: "second@example.com".into(),
                    name: "Buyer Two".into(),
                    customer_id: "C1".into(),
                    telephone: None,
                },
            ],
            vec![],
            vec![],
        )
    }

    #[test]
    fn customer_lookup_by_id() {
        let snap = snapshot();
        assert_eq!(snap.get_customer_by_id("C2").unwrap().name, "Globex");
        assert!(snap.get_customer_by_id("C9").is_none());
    }

    #[test]
    fn contact_lookup_is_case_insensitive_and_trimmed() {
        let snap = snapshot();
        let hit = snap.get_contact_by_email("  buyer@example.COM ").unwrap();
        assert_eq!(hit.contact_id, "P1");
        assert!(snap.get_contact_by_email("nobody@example.com").is_none());
    }

    #[test]
    fn contacts_for_customer_filters() {
        let snap = snapshot();
        assert_eq!(snap.contacts_for_customer("C1").len(), 2);
        assert!(snap.contacts_for_customer("C2").is_empty());
    }

    #[test]
    fn clone_preserves_lookups() {
        let snap = snapshot();
        // Force the index, then clone; the clone rebuilds its own.
        let _ = snap.get_customer_by_id("C1");
        let cloned = snap.clone();
        assert_eq!(cloned.get_customer_by_id("C1").unwrap().customer_num, "1001");
        assert_eq!(cloned.version, 7);
    }

    #[test]
    fn serde_skips_index() {
        let snap = snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        assert!(!json.contains("customer_index"));
        let back: MasterDataSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get_customer_by_id("C1").unwrap().name, "Acme Industrial");
    }
}
