use serde::{Deserialize, Serialize};

use stockflow_core::{CategoryId, DomainError, Entity, EquipmentId, LocationId, SupplierId};

/// An equipment item (or material) tracked by the inventory.
///
/// Quantities are not stored here: once movements exist, the quantity of an
/// item is whatever the stock aggregator derives from the movement ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: EquipmentId,
    pub name: String,
    pub description: String,
    pub serial_number: String,
    pub category_id: Option<CategoryId>,
    pub supplier_id: Option<SupplierId>,
    /// Location the item was registered at. Where it is now follows from the
    /// movement ledger, not from this field.
    pub location_id: Option<LocationId>,
    /// Current unit price in the smallest currency unit (e.g. cents).
    pub unit_price: u64,
}

impl Equipment {
    pub fn new(id: EquipmentId, name: impl Into<String>, serial_number: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            serial_number: serial_number.into(),
            category_id: None,
            supplier_id: None,
            location_id: None,
            unit_price: 0,
        }
    }

    pub fn with_unit_price(mut self, unit_price: u64) -> Self {
        self.unit_price = unit_price;
        self
    }

    pub fn with_supplier(mut self, supplier_id: SupplierId) -> Self {
        self.supplier_id = Some(supplier_id);
        self
    }

    pub fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_location(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("equipment name cannot be empty"));
        }
        if self.serial_number.trim().is_empty() {
            return Err(DomainError::validation("serial number cannot be empty"));
        }
        Ok(())
    }
}

impl Entity for Equipment {
    type Id = EquipmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}
