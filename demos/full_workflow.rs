//! End-to-end example: upload, visit, recognize, wait, decode.
//!
//! Run with:
//!   INSPECTOR_INSTANCE=https://acme.inspector-cloud.com/api/v1.5/ \
//!   INSPECTOR_API_KEY=... cargo run --example full_workflow -- shelf.jpg
//!
//! Set `RUST_LOG=inspector=debug` to see every poll and page fetch.

use std::time::Duration;

use inspector::{
    exponential_backoff, report_type, ClientBuilder, RecognizeRequest, ReportWaitOptions,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> inspector::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // -----------------------------------------------------------------------
    // 1. Create a client (reads INSPECTOR_INSTANCE / INSPECTOR_API_KEY)
    // -----------------------------------------------------------------------
    let client = ClientBuilder::new().build()?;

    // -----------------------------------------------------------------------
    // 2. Upload a photo and open a visit
    // -----------------------------------------------------------------------
    let file = std::env::args().nth(1).unwrap_or_else(|| "shelf.jpg".into());
    let image = client.upload_image(&file).await?;
    println!("Image {} uploaded ({}x{})", image.id, image.width, image.height);

    let visit = client.add_visit().await?;
    println!("Visit {} created", visit.id);

    // -----------------------------------------------------------------------
    // 3. Start recognition
    // -----------------------------------------------------------------------
    let recognition = client
        .recognize(&RecognizeRequest {
            images: vec![image.id],
            report_types: vec![
                report_type::FACING_COUNT.into(),
                report_type::PRICE_TAGS.into(),
                report_type::REALOGRAM.into(),
            ],
            visit: Some(visit.id),
            ..Default::default()
        })
        .await?;
    println!("Recognition {} started, scene {}", recognition.id, recognition.scene);

    // -----------------------------------------------------------------------
    // 4. Wait for every report; Ctrl-C cancels the wait
    // -----------------------------------------------------------------------
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    for (kind, id) in &recognition.reports {
        let opts = ReportWaitOptions {
            interval: Duration::from_secs(2),
            timeout: Some(Duration::from_secs(120)),
            ..Default::default()
        }
        .backoff(exponential_backoff(2, Duration::from_secs(15)))
        .on_progress(|r| println!("  report {} status: {:?}", r.id, r.status));

        let report = client
            .report_waiter(opts)
            .with_cancellation(cancel.clone())
            .wait(*id)
            .await?;

        match kind.as_str() {
            report_type::FACING_COUNT => {
                for facing in report.facing_count()? {
                    println!("  sku {}: {} facings", facing.sku_id, facing.count);
                }
            }
            report_type::PRICE_TAGS => {
                for tag in report.price_tags()? {
                    println!("  {} {:.2}", tag.name, tag.price);
                }
            }
            report_type::REALOGRAM => {
                for realogram in report.realogram()? {
                    println!(
                        "  image {}: {} products, {} shelves",
                        realogram.image,
                        realogram.annotations.len(),
                        realogram.shelf_annotations.len()
                    );
                }
            }
            _ => println!("  {kind}: {}", report.json),
        }
    }

    // -----------------------------------------------------------------------
    // 5. Page through the catalog
    // -----------------------------------------------------------------------
    let mut pages = client.iterate_sku(100);
    let mut total = 0;
    while let Some(skus) = pages.next_page().await? {
        total += skus.len();
    }
    println!("Catalog holds {total} SKUs");

    Ok(())
}
