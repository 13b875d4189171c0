//! Admin create/edit form input and save outcomes.

use serde::{Deserialize, Serialize};

use shopdesk_core::{DomainError, DomainResult, Money, TagId};

use crate::product::Product;

/// Editable product fields, as submitted by the admin form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductInput {
    pub code: String,
    pub name: String,
    pub user_label: String,
    pub description: Option<String>,
    pub price: Money,
    pub catalog_price: Money,
    pub stock: i64,
    pub visible: bool,
    pub shop: bool,
    /// `None` appends the product after the current last position.
    pub sorting: Option<i64>,
    pub tag_ids: Vec<TagId>,
}

impl ProductInput {
    /// Form defaults for editing an existing product.
    pub fn from_product(product: &Product) -> Self {
        Self {
            code: product.code.clone(),
            name: product.name.clone(),
            user_label: product.user_label.clone(),
            description: product.description.clone(),
            price: product.price,
            catalog_price: product.catalog_price,
            stock: product.stock,
            visible: product.visible,
            shop: product.shop,
            sorting: Some(product.sorting),
            tag_ids: product.tag_ids.clone(),
        }
    }

    /// Field-level validation. Code uniqueness needs storage and is checked
    /// by the repository.
    pub fn validate(&self) -> DomainResult<()> {
        if self.code.trim().is_empty() {
            return Err(DomainError::validation("code cannot be empty"));
        }
        if self.code.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("code cannot contain whitespace"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.price.is_negative() {
            return Err(DomainError::validation("price cannot be negative"));
        }
        if self.catalog_price.is_negative() {
            return Err(DomainError::validation("catalog price cannot be negative"));
        }
        if self.stock < 0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }
        if matches!(self.sorting, Some(s) if s < 0) {
            return Err(DomainError::validation("sorting cannot be negative"));
        }
        Ok(())
    }

    /// Label shown to customers; falls back to the name when left blank.
    pub fn effective_user_label(&self) -> &str {
        if self.user_label.trim().is_empty() {
            &self.name
        } else {
            &self.user_label
        }
    }
}

/// What a form save did. Callers turn this into a redirect + flash message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "product", rename_all = "snake_case")]
pub enum ProductSaved {
    Created(Product),
    Updated(Product),
}

impl ProductSaved {
    pub fn product(&self) -> &Product {
        match self {
            ProductSaved::Created(p) | ProductSaved::Updated(p) => p,
        }
    }

    pub fn flash_message(&self) -> &'static str {
        match self {
            ProductSaved::Created(_) => "product created",
            ProductSaved::Updated(_) => "product updated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::fixtures::product;

    fn valid() -> ProductInput {
        ProductInput {
            code: "weekly-box".to_string(),
            name: "Weekly box".to_string(),
            price: Money::from_cents(990),
            stock: 3,
            ..ProductInput::default()
        }
    }

    #[test]
    fn valid_input_passes() {
        assert_eq!(valid().validate(), Ok(()));
    }

    #[test]
    fn rejects_blank_code_and_name() {
        let input = ProductInput {
            code: "  ".into(),
            ..valid()
        };
        assert!(matches!(input.validate(), Err(DomainError::Validation(_))));

        let input = ProductInput {
            name: "".into(),
            ..valid()
        };
        assert!(matches!(input.validate(), Err(DomainError::Validation(_))));

        let input = ProductInput {
            code: "a b".into(),
            ..valid()
        };
        assert!(matches!(input.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn rejects_negative_amounts() {
        let input = ProductInput {
            price: Money::from_cents(-1),
            ..valid()
        };
        assert!(input.validate().is_err());
        let input = ProductInput {
            stock: -1,
            ..valid()
        };
        assert!(input.validate().is_err());
        let input = ProductInput {
            sorting: Some(-2),
            ..valid()
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn user_label_falls_back_to_name() {
        assert_eq!(valid().effective_user_label(), "Weekly box");
        let input = ProductInput {
            user_label: "Box".into(),
            ..valid()
        };
        assert_eq!(input.effective_user_label(), "Box");
    }

    #[test]
    fn outcome_carries_flash_message() {
        let p = product(1, "a", "A");
        let created = ProductSaved::Created(p.clone());
        assert_eq!(created.flash_message(), "product created");
        assert_eq!(created.product(), &p);
        assert_eq!(ProductSaved::Updated(p).flash_message(), "product updated");
    }

    #[test]
    fn edit_defaults_mirror_the_product() {
        let p = product(4, "a", "A");
        let input = ProductInput::from_product(&p);
        assert_eq!(input.sorting, Some(4));
        assert_eq!(input.price, p.price);
    }
}
