use chrono::{DateTime, Utc};
use mizan_primitives::{Amount, Quantity};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::books::{
    ledger::{non_negative, optional_text, required_text, too_large},
    Books, BooksError, ChangeSet, Committed, EntityKind, Notification, NotificationKind,
    PartyKind, Record, RecordKey,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub name_ar: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable fields of a [`Category`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDetails {
    pub name: String,
    #[serde(default)]
    pub name_ar: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub name_ar: Option<String>,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub category_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub cost_price: Amount,
    pub sale_price: Amount,
    pub quantity: Quantity,
    pub min_quantity: Quantity,
    pub unit: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_quantity
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.quantity <= Quantity::ZERO
    }

    pub fn stock_value(&self) -> Amount {
        self.cost_price.saturating_mul(self.quantity)
    }

    /// Which alert, if any, a stock movement from `before` to `self` crosses
    /// into. Staying low or staying out raises nothing.
    pub(crate) fn stock_alert(&self, before: &Product) -> Option<NotificationKind> {
        if self.is_out_of_stock() && !before.is_out_of_stock() {
            Some(NotificationKind::OutOfStock)
        } else if self.is_low_stock() && !before.is_low_stock() {
            Some(NotificationKind::LowStock)
        } else {
            None
        }
    }
}

/// Editable fields of a [`Product`]. Stock is changed through transactions
/// and [`Books::adjust_stock`], never here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    #[serde(default)]
    pub name_ar: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub supplier_id: Option<Uuid>,
    #[serde(default)]
    pub cost_price: Amount,
    #[serde(default)]
    pub sale_price: Amount,
    #[serde(default)]
    pub min_quantity: Quantity,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    #[serde(flatten)]
    pub details: ProductDetails,
    #[serde(default)]
    pub quantity: Quantity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub low_stock: bool,
}

impl ProductFilter {
    fn matches(&self, product: &Product) -> bool {
        if self.category_id.is_some() && product.category_id != self.category_id {
            return false;
        }
        if self.low_stock && !product.is_low_stock() {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                [
                    Some(&product.name),
                    product.name_ar.as_ref(),
                    product.sku.as_ref(),
                    product.barcode.as_ref(),
                ]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&term))
            }
            _ => true,
        }
    }
}

/// A manual stock correction such as a stock count or breakage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub delta: Quantity,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Books {
    pub fn category(&self, id: Uuid) -> Result<&Category, BooksError> {
        self.categories
            .get(&id)
            .ok_or(BooksError::not_found(EntityKind::Category, id))
    }

    /// All categories ordered by name.
    pub fn categories(&self) -> Vec<&Category> {
        let mut list: Vec<_> = self.categories.values().collect();
        list.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        list
    }

    #[instrument(skip_all, fields(name = %details.name))]
    pub fn create_category(
        &mut self,
        details: CategoryDetails,
    ) -> Result<Committed<Category>, BooksError> {
        let name = self.unique_category_name(&details.name, None)?;
        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name,
            name_ar: optional_text(details.name_ar),
            description: optional_text(details.description),
            created_at: now,
            updated_at: now,
        };
        self.categories.insert(category.id, category.clone());

        let mut changes = ChangeSet::new();
        changes.upsert(Record::Category(category.clone()));
        Ok(Committed::new(category, changes))
    }

    #[instrument(skip_all, fields(category_id = %id))]
    pub fn update_category(
        &mut self,
        id: Uuid,
        details: CategoryDetails,
    ) -> Result<Committed<Category>, BooksError> {
        self.category(id)?;
        let name = self.unique_category_name(&details.name, Some(id))?;
        let Some(category) = self.categories.get_mut(&id) else {
            return Err(BooksError::not_found(EntityKind::Category, id));
        };
        category.name = name;
        category.name_ar = optional_text(details.name_ar);
        category.description = optional_text(details.description);
        category.updated_at = Utc::now();
        let category = category.clone();

        let mut changes = ChangeSet::new();
        changes.upsert(Record::Category(category.clone()));
        Ok(Committed::new(category, changes))
    }

    #[instrument(skip_all, fields(category_id = %id))]
    pub fn delete_category(&mut self, id: Uuid) -> Result<Committed<Category>, BooksError> {
        self.category(id)?;
        if self.products.values().any(|p| p.category_id == Some(id)) {
            return Err(BooksError::InUse {
                entity: EntityKind::Category,
                id,
            });
        }
        let Some(category) = self.categories.remove(&id) else {
            return Err(BooksError::not_found(EntityKind::Category, id));
        };

        let mut changes = ChangeSet::new();
        changes.delete(RecordKey::Category(id));
        Ok(Committed::new(category, changes))
    }

    pub fn product(&self, id: Uuid) -> Result<&Product, BooksError> {
        self.products
            .get(&id)
            .ok_or(BooksError::not_found(EntityKind::Product, id))
    }

    /// Products matching `filter`, ordered by name.
    pub fn products(&self, filter: &ProductFilter) -> Vec<&Product> {
        let mut list: Vec<_> = self
            .products
            .values()
            .filter(|p| filter.matches(p))
            .collect();
        list.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()).then(a.id.cmp(&b.id)));
        list
    }

    #[instrument(skip_all, fields(name = %new.details.name))]
    pub fn create_product(&mut self, new: NewProduct) -> Result<Committed<Product>, BooksError> {
        if new.quantity.is_sign_negative() {
            return Err(BooksError::invalid("quantity", "must not be negative"));
        }
        let fields = self.validate_product(new.details, None)?;
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name: fields.name,
            name_ar: fields.name_ar,
            sku: fields.sku,
            barcode: fields.barcode,
            category_id: fields.category_id,
            supplier_id: fields.supplier_id,
            cost_price: fields.cost_price,
            sale_price: fields.sale_price,
            quantity: new.quantity,
            min_quantity: fields.min_quantity,
            unit: fields.unit,
            description: fields.description,
            created_at: now,
            updated_at: now,
        };
        self.products.insert(product.id, product.clone());

        let mut changes = ChangeSet::new();
        changes.upsert(Record::Product(product.clone()));
        Ok(Committed::new(product, changes))
    }

    #[instrument(skip_all, fields(product_id = %id))]
    pub fn update_product(
        &mut self,
        id: Uuid,
        details: ProductDetails,
    ) -> Result<Committed<Product>, BooksError> {
        self.product(id)?;
        let fields = self.validate_product(details, Some(id))?;
        let Some(product) = self.products.get_mut(&id) else {
            return Err(BooksError::not_found(EntityKind::Product, id));
        };
        product.name = fields.name;
        product.name_ar = fields.name_ar;
        product.sku = fields.sku;
        product.barcode = fields.barcode;
        product.category_id = fields.category_id;
        product.supplier_id = fields.supplier_id;
        product.cost_price = fields.cost_price;
        product.sale_price = fields.sale_price;
        product.min_quantity = fields.min_quantity;
        product.unit = fields.unit;
        product.description = fields.description;
        product.updated_at = Utc::now();
        let product = product.clone();

        let mut changes = ChangeSet::new();
        changes.upsert(Record::Product(product.clone()));
        Ok(Committed::new(product, changes))
    }

    #[instrument(skip_all, fields(product_id = %id))]
    pub fn delete_product(&mut self, id: Uuid) -> Result<Committed<Product>, BooksError> {
        self.product(id)?;
        let referenced = self
            .transactions
            .values()
            .any(|tx| tx.items.iter().any(|item| item.product_id == id));
        if referenced {
            return Err(BooksError::InUse {
                entity: EntityKind::Product,
                id,
            });
        }
        let Some(product) = self.products.remove(&id) else {
            return Err(BooksError::not_found(EntityKind::Product, id));
        };

        let mut changes = ChangeSet::new();
        changes.delete(RecordKey::Product(id));
        Ok(Committed::new(product, changes))
    }

    /// Apply a manual stock correction. The resulting quantity must stay
    /// non-negative; crossing into low or out of stock raises a notification.
    #[instrument(skip_all, fields(product_id = %id, delta = %adjustment.delta))]
    pub fn adjust_stock(
        &mut self,
        id: Uuid,
        adjustment: StockAdjustment,
    ) -> Result<Committed<Product>, BooksError> {
        let before = self.product(id)?.clone();
        if adjustment.delta == Quantity::ZERO {
            return Err(BooksError::invalid("delta", "must not be zero"));
        }
        let quantity = before
            .quantity
            .checked_add(adjustment.delta)
            .ok_or_else(|| too_large("delta"))?;
        if quantity.is_sign_negative() {
            return Err(BooksError::InsufficientStock {
                product: before.name,
                available: before.quantity,
                requested: -adjustment.delta,
            });
        }
        if let Some(reason) = optional_text(adjustment.reason) {
            tracing::info!(product = %before.name, %reason, "manual stock adjustment");
        }

        let mut changes = ChangeSet::new();
        let product = self.move_stock(id, adjustment.delta, &mut changes);
        let product = product.unwrap_or(before);
        Ok(Committed::new(product, changes))
    }

    /// Shift a product's stock by `delta`, recording the product and any
    /// alert it crosses into. Callers have already checked the result stays
    /// non-negative.
    pub(crate) fn move_stock(
        &mut self,
        id: Uuid,
        delta: Quantity,
        changes: &mut ChangeSet,
    ) -> Option<Product> {
        let product = self.products.get_mut(&id)?;
        let before = product.clone();
        product.quantity += delta;
        product.updated_at = Utc::now();
        let after = product.clone();

        if let Some(kind) = after.stock_alert(&before) {
            let notification =
                Notification::new(kind, Some(after.id), after.name.clone()).with_quantity(after.quantity);
            self.raise(notification, changes);
        }
        changes.upsert(Record::Product(after.clone()));
        Some(after)
    }

    fn unique_category_name(&self, name: &str, this: Option<Uuid>) -> Result<String, BooksError> {
        let name = required_text("name", name)?;
        let taken = self
            .categories
            .values()
            .any(|c| Some(c.id) != this && c.name.to_lowercase() == name.to_lowercase());
        if taken {
            return Err(BooksError::Duplicate {
                entity: EntityKind::Category,
                value: name,
            });
        }
        Ok(name)
    }

    fn validate_product(
        &self,
        details: ProductDetails,
        this: Option<Uuid>,
    ) -> Result<ProductDetails, BooksError> {
        let name = required_text("name", &details.name)?;
        let cost_price = non_negative("cost_price", self.money(details.cost_price))?;
        let sale_price = non_negative("sale_price", self.money(details.sale_price))?;
        if details.min_quantity.is_sign_negative() {
            return Err(BooksError::invalid("min_quantity", "must not be negative"));
        }

        let sku = optional_text(details.sku);
        if let Some(sku) = &sku {
            let taken = self.products.values().any(|p| {
                Some(p.id) != this
                    && p.sku.as_deref().is_some_and(|s| s.eq_ignore_ascii_case(sku))
            });
            if taken {
                return Err(BooksError::Duplicate {
                    entity: EntityKind::Product,
                    value: sku.clone(),
                });
            }
        }
        let barcode = optional_text(details.barcode);
        if let Some(barcode) = &barcode {
            let taken = self.products.values().any(|p| {
                Some(p.id) != this && p.barcode.as_deref() == Some(barcode.as_str())
            });
            if taken {
                return Err(BooksError::Duplicate {
                    entity: EntityKind::Product,
                    value: barcode.clone(),
                });
            }
        }
        if let Some(category_id) = details.category_id {
            self.category(category_id)?;
        }
        if let Some(supplier_id) = details.supplier_id {
            self.party_of_kind(supplier_id, PartyKind::Supplier)?;
        }

        Ok(ProductDetails {
            name,
            name_ar: optional_text(details.name_ar),
            sku,
            barcode,
            category_id: details.category_id,
            supplier_id: details.supplier_id,
            cost_price,
            sale_price,
            min_quantity: details.min_quantity,
            unit: optional_text(details.unit),
            description: optional_text(details.description),
        })
    }
}
