//! Catalog lookups (repository-style access by id).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use stockflow_core::{
    CategoryId, DomainError, DomainResult, Entity, EquipmentId, LocationId, SupplierId,
};

use crate::{Category, Equipment, Location, Supplier};

/// Read access to catalog entities.
///
/// The stock engine resolves every reference through this trait at the moment it
/// needs it, so it never works on a stale embedded copy of an entity.
pub trait Catalog: Send + Sync {
    fn equipment(&self, id: EquipmentId) -> Option<Equipment>;
    fn location(&self, id: LocationId) -> Option<Location>;
    fn supplier(&self, id: SupplierId) -> Option<Supplier>;
    fn category(&self, id: CategoryId) -> Option<Category>;

    /// All equipment delivered by one supplier.
    fn equipment_by_supplier(&self, supplier_id: SupplierId) -> Vec<Equipment>;

    fn require_equipment(&self, id: EquipmentId) -> DomainResult<Equipment> {
        self.equipment(id)
            .ok_or_else(|| DomainError::not_found(format!("equipment {id}")))
    }

    fn require_location(&self, id: LocationId) -> DomainResult<Location> {
        self.location(id)
            .ok_or_else(|| DomainError::not_found(format!("location {id}")))
    }
}

impl<C> Catalog for Arc<C>
where
    C: Catalog + ?Sized,
{
    fn equipment(&self, id: EquipmentId) -> Option<Equipment> {
        (**self).equipment(id)
    }

    fn location(&self, id: LocationId) -> Option<Location> {
        (**self).location(id)
    }

    fn supplier(&self, id: SupplierId) -> Option<Supplier> {
        (**self).supplier(id)
    }

    fn category(&self, id: CategoryId) -> Option<Category> {
        (**self).category(id)
    }

    fn equipment_by_supplier(&self, supplier_id: SupplierId) -> Vec<Equipment> {
        (**self).equipment_by_supplier(supplier_id)
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    equipment: HashMap<EquipmentId, Equipment>,
    locations: HashMap<LocationId, Location>,
    suppliers: HashMap<SupplierId, Supplier>,
    categories: HashMap<CategoryId, Category>,
}

/// In-memory catalog for tests, the demo binary and embedding.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    inner: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_location(&self, location: Location) -> DomainResult<()> {
        location.validate()?;
        let mut state = self.write()?;
        state.locations.insert(location.id, location);
        Ok(())
    }

    pub fn upsert_supplier(&self, supplier: Supplier) -> DomainResult<()> {
        supplier.validate()?;
        let mut state = self.write()?;
        state.suppliers.insert(supplier.id, supplier);
        Ok(())
    }

    pub fn upsert_category(&self, category: Category) -> DomainResult<()> {
        category.validate()?;
        let mut state = self.write()?;
        state.categories.insert(category.id, category);
        Ok(())
    }

    /// Insert or replace an equipment record.
    ///
    /// Referenced supplier/category/location must already exist and the serial
    /// number must be unique across the catalog.
    pub fn upsert_equipment(&self, equipment: Equipment) -> DomainResult<()> {
        equipment.validate()?;
        let mut state = self.write()?;

        if let Some(id) = equipment.supplier_id {
            if !state.suppliers.contains_key(&id) {
                return Err(DomainError::not_found(format!("supplier {id}")));
            }
        }
        if let Some(id) = equipment.category_id {
            if !state.categories.contains_key(&id) {
                return Err(DomainError::not_found(format!("category {id}")));
            }
        }
        if let Some(id) = equipment.location_id {
            if !state.locations.contains_key(&id) {
                return Err(DomainError::not_found(format!("location {id}")));
            }
        }

        let owner = state
            .equipment
            .values()
            .find(|e| e.id != equipment.id && e.serial_number == equipment.serial_number);
        if let Some(owner) = owner {
            return Err(DomainError::validation(format!(
                "serial number '{}' is already registered to '{}'",
                equipment.serial_number,
                owner.label()
            )));
        }

        state.equipment.insert(equipment.id, equipment);
        Ok(())
    }

    /// All registered locations, ordered by name.
    pub fn locations(&self) -> Vec<Location> {
        let Ok(state) = self.inner.read() else {
            return vec![];
        };
        let mut out: Vec<_> = state.locations.values().cloned().collect();
        out.sort_by(|a, b| a.label().cmp(b.label()));
        out
    }

    fn write(&self) -> DomainResult<std::sync::RwLockWriteGuard<'_, CatalogState>> {
        self.inner
            .write()
            .map_err(|_| DomainError::invariant("catalog lock poisoned"))
    }
}

impl Catalog for InMemoryCatalog {
    fn equipment(&self, id: EquipmentId) -> Option<Equipment> {
        let state = self.inner.read().ok()?;
        state.equipment.get(&id).cloned()
    }

    fn location(&self, id: LocationId) -> Option<Location> {
        let state = self.inner.read().ok()?;
        state.locations.get(&id).cloned()
    }

    fn supplier(&self, id: SupplierId) -> Option<Supplier> {
        let state = self.inner.read().ok()?;
        state.suppliers.get(&id).cloned()
    }

    fn category(&self, id: CategoryId) -> Option<Category> {
        let state = self.inner.read().ok()?;
        state.categories.get(&id).cloned()
    }

    fn equipment_by_supplier(&self, supplier_id: SupplierId) -> Vec<Equipment> {
        let Ok(state) = self.inner.read() else {
            return vec![];
        };
        let mut out: Vec<_> = state
            .equipment
            .values()
            .filter(|e| e.supplier_id == Some(supplier_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.serial_number.cmp(&b.serial_number));
        out
    }
}
