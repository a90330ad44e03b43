//! Reconciliation of the source catalog against the sync ledger.
//!
//! One pass walks the source listing in order and, per product, decides
//! whether to stage and upload a photo, publish the record, or do nothing.
//! Failures are confined to the product that hit them; the pass always
//! completes and reports what is still pending.
use tracing::{debug, error, info, instrument, warn};

use crate::config;
use crate::db::{self, Pool, SyncRecord};
use crate::ingest::{AssetUploader, CatalogPublisher};
use crate::model::{ActionKind, CycleReport, PendingReason, Product, ProductDetail};
use crate::source::CatalogSource;
use crate::staging::Stager;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// First-publish products that have no photo and no ledger row.
    pub publish_without_photo: bool,
}

impl From<&config::SyncSettings> for ReconcileOptions {
    fn from(cfg: &config::SyncSettings) -> Self {
        Self {
            publish_without_photo: cfg.publish_without_photo,
        }
    }
}

pub struct Reconciler<'a> {
    source: &'a dyn CatalogSource,
    ledger: &'a Pool,
    stager: &'a Stager,
    uploader: &'a dyn AssetUploader,
    publisher: &'a dyn CatalogPublisher,
    options: ReconcileOptions,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        source: &'a dyn CatalogSource,
        ledger: &'a Pool,
        stager: &'a Stager,
        uploader: &'a dyn AssetUploader,
        publisher: &'a dyn CatalogPublisher,
    ) -> Self {
        Self {
            source,
            ledger,
            stager,
            uploader,
            publisher,
            options: ReconcileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Run one full pass over the source catalog.
    #[instrument(skip_all)]
    pub async fn run_pass(&self) -> CycleReport {
        let mut report = CycleReport::default();
        info!("starting catalog reconciliation");

        let products = match self.source.list_products().await {
            Ok(products) => products,
            Err(err) => {
                error!(?err, "failed to list products");
                report.mark_pending("*", PendingReason::Listing);
                return report;
            }
        };
        report.products = products.len();

        for product in products {
            self.reconcile_product(product, &mut report).await;
        }

        info!(
            products = report.products,
            uploaded = report.uploaded,
            published = report.published,
            unchanged = report.unchanged,
            unsynced = report.unsynced,
            pending = report.pending_count(),
            "catalog reconciliation finished"
        );
        report
    }

    #[instrument(skip_all, fields(code = %listed.code))]
    async fn reconcile_product(&self, listed: Product, report: &mut CycleReport) {
        let code = listed.code.clone();

        let detail = match self.source.fetch_detail(&code).await {
            Ok(detail) => detail,
            Err(err) => {
                warn!(?err, "failed to fetch product detail; skipping");
                report.mark_pending(&code, PendingReason::Fetch);
                return;
            }
        };

        if detail.photo.is_empty() {
            self.check_drift(listed, detail, report).await;
            return;
        }

        let staged = match self.stager.stage(&code, &detail.photo).await {
            Ok(staged) => staged,
            Err(err) => {
                warn!(?err, "failed to stage photo; skipping");
                report.mark_pending(&code, PendingReason::Stage);
                return;
            }
        };

        // Only a ledger row carrying an asset reference skips the upload; a row
        // written before the product had a photo still needs one.
        let prior = match self.prior_asset_id(&code).await {
            Ok(prior) => prior,
            Err(err) => {
                warn!(?err, "ledger lookup failed; skipping");
                report.mark_pending(&code, PendingReason::Ledger);
                return;
            }
        };
        let asset_id = match prior {
            Some(id) => id,
            None => match self.uploader.upload_asset(&staged.path).await {
                Ok(id) => {
                    report.uploaded += 1;
                    id
                }
                Err(err) => {
                    warn!(?err, "asset upload failed; skipping product");
                    report.mark_pending(&code, PendingReason::Upload);
                    return;
                }
            },
        };

        let product = Product {
            code,
            name: detail.name,
            price: detail.price,
            owner: listed.owner,
            assets: vec![asset_id.to_string()],
            photo_length: staged.size,
        };
        self.publish_and_record(&product, Some(asset_id), report).await;
    }

    /// Photo-less products are only republished when name or price moved
    /// away from what the ledger last acknowledged.
    async fn check_drift(&self, listed: Product, detail: ProductDetail, report: &mut CycleReport) {
        let record = match db::lookup(self.ledger, &listed.code).await {
            Ok(record) => record,
            Err(err) => {
                warn!(?err, "ledger lookup failed; skipping");
                report.mark_pending(&listed.code, PendingReason::Ledger);
                return;
            }
        };

        match record {
            Some(rec) if rec.name == detail.name && rec.price == detail.price => {
                debug!("no photo and no drift");
                report.unchanged += 1;
            }
            Some(rec) => {
                info!(
                    old_name = %rec.name,
                    new_name = %detail.name,
                    old_price = rec.price,
                    new_price = detail.price,
                    "name or price drifted"
                );
                let product = drifted_product(listed, detail, &rec);
                self.publish_and_record(&product, rec.asset_id, report).await;
            }
            None if self.options.publish_without_photo => {
                let product = Product {
                    name: detail.name,
                    price: detail.price,
                    ..listed
                };
                self.publish_and_record(&product, None, report).await;
            }
            None => {
                debug!("no photo and never synced; skipping");
                report.unsynced += 1;
            }
        }
    }

    async fn publish_and_record(
        &self,
        product: &Product,
        asset_id: Option<i64>,
        report: &mut CycleReport,
    ) {
        if let Err(err) = self.publisher.publish(product, ActionKind::Update).await {
            warn!(?err, "publish failed; ledger left unchanged");
            report.mark_pending(&product.code, PendingReason::Publish);
            return;
        }
        report.published += 1;

        if let Err(err) = db::upsert(
            self.ledger,
            &product.code,
            product.photo_length,
            asset_id,
            &product.name,
            product.price,
        )
        .await
        {
            error!(?err, "failed to record sync in ledger");
        }
    }

    async fn prior_asset_id(&self, code: &str) -> anyhow::Result<Option<i64>> {
        let record = db::lookup(self.ledger, code).await?;
        Ok(record.and_then(|rec| rec.asset_id))
    }
}

/// Update carrying the fresh name and price over the ledger's asset.
fn drifted_product(listed: Product, detail: ProductDetail, rec: &SyncRecord) -> Product {
    Product {
        code: listed.code,
        name: detail.name,
        price: detail.price,
        owner: listed.owner,
        assets: rec.asset_refs(),
        photo_length: rec.photo_size,
    }
}
