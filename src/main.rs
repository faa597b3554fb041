use anyhow::Result;
use log::{error, info, warn};
use std::sync::Arc;

use crawl_ocr::api::build_rocket;
use crawl_ocr::background::notifier::{NotificationSink, WebhookSink, spawn_notifier};
use crawl_ocr::background::processors::analyze::HttpAnalyzer;
use crawl_ocr::background::processors::fetch::HttpImageFetcher;
use crawl_ocr::background::processors::recognize::TesseractRecognizer;
use crawl_ocr::bootstrap::setup::{check_tesseract, initialize_folder, initialize_logger};
use crawl_ocr::common::ROCKET_RUNTIME;
use crawl_ocr::config::AppConfig;
use crawl_ocr::database::RedbStore;
use crawl_ocr::workflow::JobOrchestrator;

fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    initialize_logger()?;
    initialize_folder(&config)?;

    let store = Arc::new(RedbStore::open(&config.db_path)?);
    check_tesseract(&config);

    let mut orchestrator = JobOrchestrator::new(
        Arc::new(HttpImageFetcher::new(
            config.fetch_timeout(),
            config.max_image_bytes,
        )?),
        Arc::new(TesseractRecognizer::from_config(&config)),
        store.clone(),
        store.clone(),
    );
    match config.analysis_endpoint() {
        Some(endpoint) => {
            info!("Forwarding results to {}", endpoint);
            let analyzer = HttpAnalyzer::new(endpoint, config.fetch_timeout())?;
            orchestrator =
                orchestrator.with_analyzer(Arc::new(analyzer), config.analysis_failure_is_fatal);
        }
        None => info!("API_URL is not set, skipping result analysis"),
    }

    ROCKET_RUNTIME.block_on(async move {
        // The worker must be spawned from inside the runtime
        let notifier = match &config.error_webhook_url {
            Some(url) => {
                let sink: Arc<dyn NotificationSink> =
                    Arc::new(WebhookSink::new(url.clone(), config.notify_timeout())?);
                let (handle, worker) = spawn_notifier(sink, config.notify_queue_capacity);
                orchestrator = orchestrator.with_notifier(handle);
                Some(worker)
            }
            None => {
                warn!("ERROR_WEBHOOK_URL is not set, failures will only be logged");
                None
            }
        };

        let figment = rocket::Config::figment();
        let result = build_rocket(figment, Arc::new(orchestrator), store)
            .launch()
            .await;

        if let Some(worker) = notifier {
            let dropped = worker.shutdown().await;
            if dropped > 0 {
                warn!("Dropped {} undelivered failure notices on shutdown", dropped);
            }
        }

        if let Err(err) = result {
            error!("Rocket server failed: {}", err);
            return Err(anyhow::Error::from(err));
        }
        Ok(())
    })
}
