//! Scripted walk through the engine: a receipt, a transfer, and a transfer that
//! overdraws stock. Every call's envelope is printed as JSON.

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use stockflow_api::app::build_service;
use stockflow_api::app::dto::{AddItemRequest, CreateDocumentRequest};
use stockflow_api::app::envelope::Envelope;
use stockflow_api::app::errors::ServiceResult;
use stockflow_api::app::services::InventoryService;
use stockflow_api::context::CallerContext;
use stockflow_catalog::{Equipment, InMemoryCatalog, Location};
use stockflow_core::{EquipmentId, LocationId, UserId};
use stockflow_documents::{DocumentId, DocumentKind};
use stockflow_infra::EngineConfig;

fn print<T: Serialize>(label: &str, result: ServiceResult<T>) -> anyhow::Result<Option<T>> {
    let envelope = Envelope::from(result);
    println!("{label}: {}", serde_json::to_string_pretty(&envelope)?);
    Ok(envelope.model)
}

fn move_stock(
    service: &dyn InventoryService,
    caller: &CallerContext,
    kind: DocumentKind,
    to: LocationId,
    from: Option<LocationId>,
    equipment_id: EquipmentId,
    quantity: i64,
) -> anyhow::Result<()> {
    let document = service
        .create_document(
            caller,
            CreateDocumentRequest {
                kind,
                location_id: to,
                source_location_id: from,
                date: None,
                comment: String::new(),
            },
        )
        .context("create document")?;
    let document_id: DocumentId = document.id_typed();
    tracing::info!(number = document.number(), "demo document created");

    service
        .add_item(
            caller,
            document_id,
            AddItemRequest {
                equipment_id,
                planned_quantity: quantity,
                unit_price: None,
                direction: None,
            },
        )
        .context("add item")?;
    service.submit(caller, document_id).context("submit")?;

    print(&format!("approve {}", document.number()), service.approve(caller, document_id))?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let (config, config_error) = match EngineConfig::from_env() {
        Ok(config) => (config, None),
        Err(e) => (EngineConfig::default(), Some(e)),
    };
    stockflow_observability::init(config.log_format);
    if let Some(e) = config_error {
        tracing::warn!(error = %e, "invalid engine configuration; using defaults");
    }

    let catalog = Arc::new(InMemoryCatalog::new());
    let warehouse = Location::new(LocationId::new(), "Main warehouse");
    let site = Location::new(LocationId::new(), "Field site");
    let (warehouse_id, site_id) = (warehouse.id, site.id);
    catalog.upsert_location(warehouse).context("seed warehouse")?;
    catalog.upsert_location(site).context("seed site")?;

    let drill = Equipment::new(EquipmentId::new(), "Hammer drill", "HD-0001")
        .with_unit_price(12_500)
        .with_location(warehouse_id);
    let drill_id = drill.id;
    catalog.upsert_equipment(drill).context("seed equipment")?;

    let service = build_service(catalog, config);
    let caller = CallerContext::new(UserId::new());

    move_stock(&service, &caller, DocumentKind::Receipt, warehouse_id, None, drill_id, 10)?;
    move_stock(&service, &caller, DocumentKind::Transfer, site_id, Some(warehouse_id), drill_id, 4)?;
    // Only 6 left at the warehouse.
    move_stock(&service, &caller, DocumentKind::Transfer, site_id, Some(warehouse_id), drill_id, 20)?;

    print("warehouse", service.stock_by_location(warehouse_id))?;
    print("site", service.stock_by_location(site_id))?;
    print("total", service.total_quantity(drill_id))?;

    let divergence = print("verify", service.verify_stock())?.unwrap_or_default();
    tracing::info!(divergent_buckets = divergence.len(), "demo finished");
    Ok(())
}
