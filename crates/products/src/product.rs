use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopdesk_core::{Entity, Money, ProductId, TagId};

/// Catalog product as stored and listed by the admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub code: String,
    pub name: String,
    pub user_label: String,
    pub description: Option<String>,
    pub price: Money,
    pub catalog_price: Money,
    pub stock: i64,
    pub visible: bool,
    /// Sellable through the shop channel.
    pub shop: bool,
    pub sorting: i64,
    pub tag_ids: Vec<TagId>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Product {
    pub fn is_available(&self) -> bool {
        self.stock > 0
    }

    pub fn has_tag(&self, tag_id: TagId) -> bool {
        self.tag_ids.contains(&tag_id)
    }

    pub fn has_any_tag(&self, tag_ids: &[TagId]) -> bool {
        tag_ids.iter().any(|t| self.has_tag(*t))
    }

    /// Reduce stock after fulfillment. Stock is allowed to go negative
    /// (oversold), matching how the store applies `stock = stock - n`.
    pub fn decrease_stock(&mut self, count: i64) {
        self.stock -= count;
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> Self::Id {
        self.id
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::product;
    use super::*;

    #[test]
    fn availability_follows_stock() {
        let mut p = product(1, "book", "Book");
        assert!(p.is_available());
        p.decrease_stock(5);
        assert!(!p.is_available());
        p.decrease_stock(1);
        assert_eq!(p.stock, -1);
    }

    #[test]
    fn tag_membership() {
        let mut p = product(1, "book", "Book");
        p.tag_ids = vec![TagId::new(2), TagId::new(3)];
        assert!(p.has_tag(TagId::new(3)));
        assert!(p.has_any_tag(&[TagId::new(9), TagId::new(2)]));
        assert!(!p.has_any_tag(&[TagId::new(9)]));
        assert!(!p.has_any_tag(&[]));
    }
}
