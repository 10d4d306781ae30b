//! Configurator demo
//!
//! Seeds an in-memory catalog with two models, opens the first one through its
//! browse link and walks through a few selections and a lead submission.
//!
//! Usage: RUST_LOG=configurator_engine=debug cargo run --bin configurator_demo

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use configurator_engine::{
    detail_link, format_price, identifier_channel, CatalogSource, ConfiguratorConfig,
    ConfiguratorSession, ContactFormCapture, Entity, FetchKind, InventoryRecord, MemoryCatalog,
    PageReference, SessionSnapshot, TransitionPhase, Variant,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("configurator_engine=info")),
        )
        .init();

    let config = ConfiguratorConfig::from_env().context("loading configurator config")?;
    let catalog = Arc::new(seed_catalog().await);

    // Browse page
    let listing = catalog.list_entities().await?;
    for entry in &listing {
        println!(
            "{:<12} {:>10}  {}",
            entry.name,
            format_price(entry.base_price, &config.currency_symbol),
            detail_link(&config, &entry.id)
        );
    }
    let first = listing.first().context("catalog is empty")?;
    let page = PageReference::parse(&detail_link(&config, &first.id))?;

    // Detail page
    let (deals_tx, mut deals_rx) = mpsc::unbounded_channel();
    let lead = Arc::new(ContactFormCapture::new(deals_tx));
    let (publisher, source) = identifier_channel(config.identifier_param.clone());
    let (session, handle) = ConfiguratorSession::new(&config, catalog.clone(), lead.clone());
    let task = session.with_identifier_source(source).spawn();

    publisher.publish(&page);
    let snapshot = handle
        .wait_for(|s| s.view.loads.is_settled() && s.image.phase == TransitionPhase::Idle)
        .await?;
    print_snapshot(&config, &snapshot);

    handle.variant_clicked("a02-amaze-vx")?;
    handle.color_clicked("black")?;
    let snapshot = handle
        .wait_for(|s| {
            s.view.selection.color_id.as_ref().map(|c| c.as_str()) == Some("black")
                && s.image.phase == TransitionPhase::Idle
        })
        .await?;
    print_snapshot(&config, &snapshot);

    for (field, value) in [
        ("name", "Asha Rao"),
        ("email", "asha@example.com"),
        ("phone", "+91 98765 43210"),
        ("message", "Is a test drive possible this weekend?"),
    ] {
        lead.set_field(field, value).await;
    }
    let submission = handle.submit().await?;
    println!("Submitted {}", serde_json::to_string(&submission)?);
    if let Some(deal) = deals_rx.recv().await {
        println!("Deal request {}", serde_json::to_string_pretty(&deal)?);
    }

    handle.shutdown()?;
    task.await?;
    Ok(())
}

fn print_snapshot(config: &ConfiguratorConfig, snapshot: &SessionSnapshot) {
    let view = &snapshot.view;
    if let Some(summary) = view.purchase_summary() {
        println!("{summary}");
    }
    println!(
        "  price {}  in stock {}  image {}",
        view.price_label(&config.currency_symbol),
        view.derived.quantity,
        snapshot.image.displayed_url
    );
}

async fn seed_catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();

    let amaze = Entity {
        id: "a01-amaze".into(),
        name: "Honda Amaze".to_string(),
        description: "Compact sedan".to_string(),
        base_price: Some(Decimal::from(720_000)),
        warranty_years: Some(3),
        services: vec!["3 free services".to_string()],
        image_url: Some("https://img.example.com/amaze.png".to_string()),
    };
    let variants = vec![
        Variant {
            id: "a02-amaze-sx".into(),
            entity_id: amaze.id.clone(),
            name: "SX".to_string(),
            price: Some(Decimal::from(800_000)),
        },
        Variant {
            id: "a02-amaze-vx".into(),
            entity_id: amaze.id.clone(),
            name: "VX".to_string(),
            price: Some(Decimal::from(910_000)),
        },
    ];
    let inventory = vec![
        InventoryRecord {
            id: "a03-1".into(),
            variant_id: "a02-amaze-sx".into(),
            color: "white".to_string(),
            image_url: "https://img.example.com/amaze-white.png".to_string(),
            quantity: 4,
        },
        InventoryRecord {
            id: "a03-2".into(),
            variant_id: "a02-amaze-vx".into(),
            color: "Black".to_string(),
            image_url: "https://img.example.com/amaze-black.png".to_string(),
            quantity: 2,
        },
    ];
    catalog.insert(amaze.clone(), variants, inventory).await;

    let city = Entity {
        id: "a01-city".into(),
        name: "Honda City".to_string(),
        description: "Mid-size sedan".to_string(),
        base_price: Some(Decimal::from(1_200_000)),
        warranty_years: Some(5),
        services: vec!["Roadside assistance".to_string()],
        image_url: Some("https://img.example.com/city.png".to_string()),
    };
    catalog.insert(city, vec![], vec![]).await;

    // Make the detail page wait on its slowest fetch
    catalog
        .set_latency(&amaze.id, FetchKind::Inventory, Duration::from_millis(120))
        .await;
    catalog
}
