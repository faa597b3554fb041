use log::{info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::spawn_blocking;

use super::types::InFlightJobs;
use crate::background::notifier::{FailureNotice, NotifierHandle};
use crate::background::processors::analyze::ResultAnalyzer;
use crate::background::processors::fetch::ImageFetcher;
use crate::background::processors::optimize::optimize_image;
use crate::background::processors::recognize::Recognizer;
use crate::common::errors::{JobError, JobFailure};
use crate::database::{CacheStore, JobRecordStore};
use crate::models::{CacheEntry, JobRecord, JobRequest, ValidatedJob, resolve};

struct AnalysisStep {
    analyzer: Arc<dyn ResultAnalyzer>,
    fatal: bool,
}

/// Runs one job from request to terminal record.
///
/// Collaborators are injected so the same pipeline serves every transport.
/// One instance is shared by all requests of the process.
pub struct JobOrchestrator {
    fetcher: Arc<dyn ImageFetcher>,
    recognizer: Arc<dyn Recognizer>,
    records: Arc<dyn JobRecordStore>,
    cache: Arc<dyn CacheStore>,
    analysis: Option<AnalysisStep>,
    notifier: Option<NotifierHandle>,
    in_flight: InFlightJobs,
}

impl JobOrchestrator {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        recognizer: Arc<dyn Recognizer>,
        records: Arc<dyn JobRecordStore>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            fetcher,
            recognizer,
            records,
            cache,
            analysis: None,
            notifier: None,
            in_flight: InFlightJobs::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: NotifierHandle) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn ResultAnalyzer>, fatal: bool) -> Self {
        self.analysis = Some(AnalysisStep { analyzer, fatal });
        self
    }

    pub async fn process(&self, request: JobRequest) -> Result<JobRecord, JobFailure> {
        let start_time = Instant::now();

        // Step 1: Validate
        let job = match request.validate() {
            Ok(job) => job,
            Err(err) => {
                warn!(job_id = request.job_id.as_str(); "Rejected job for {:?}: {}", request.page_url(), err);
                return Err(self.finish_failed(&request.job_id, "", err).await);
            }
        };
        let job_id = job.job_id;

        // Step 2: Acquire in-flight guard
        let _guard = match self.in_flight.try_acquire(job_id) {
            Some(guard) => guard,
            None => {
                warn!(job_id = job_id; "Duplicate delivery while the job is still running");
                return Err(JobFailure::new(
                    JobError::InProgress(job_id.to_string()),
                    job_id,
                    "",
                ));
            }
        };

        // Step 3: Resolve
        let image_url = resolve(job.crawl_result, &request.position);
        if image_url.is_empty() {
            let err = JobError::Validation(format!("no image URL for {}", job.position));
            return Err(self.finish_failed(job_id, "", err).await);
        }
        info!(job_id = job_id; "Processing {} of {:?}", job.position, request.page_url());

        // Step 4: Fetch, optimize, recognize
        let outcome = match self.recognize_image(job_id, image_url).await {
            Ok(text) => self.analyze(&job, image_url, text, &request).await,
            Err(err) => Err(err),
        };

        let entry = match outcome {
            Ok(entry) => entry,
            Err(err) => return Err(self.finish_failed(job_id, image_url, err).await),
        };

        // Step 5: Persist
        let record = JobRecord::completed(job_id, image_url, entry.recognized_text.clone());
        let record = match self.persist(record).await {
            Ok(record) => record,
            Err(err) => {
                let failure = JobFailure::new(err, job_id, image_url);
                self.notify(&failure);
                return Err(failure);
            }
        };

        // Step 6: Cache
        let cache = Arc::clone(&self.cache);
        let cached = spawn_blocking(move || cache.put_cache_entry(&entry)).await;
        match cached {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(job_id = job_id; "Failed to write cache entry: {:#}", err),
            Err(err) => warn!(job_id = job_id; "Cache write task failed: {}", err),
        }

        info!(
            job_id = job_id,
            duration = &*format!("{:?}", start_time.elapsed());
            "Completed with {} characters",
            record.recognized_text.chars().count()
        );
        Ok(record)
    }

    /// Report a request that never became a job, such as an undecodable body.
    ///
    /// There is no jobId to record against, so this only logs and notifies.
    pub fn reject(&self, error: JobError) -> JobFailure {
        let failure = JobFailure::from(error);
        warn!("Rejected request at {}: {}", failure.error.source_tag(), failure.error);
        self.notify(&failure);
        failure
    }

    async fn recognize_image(&self, job_id: &str, image_url: &str) -> Result<String, JobError> {
        let start_time = Instant::now();
        let bytes = self
            .fetcher
            .fetch(image_url)
            .await
            .map_err(|err| JobError::Fetch(format!("{:#}", err)))?;
        info!(
            job_id = job_id,
            duration = &*format!("{:?}", start_time.elapsed());
            "Fetched {} bytes", bytes.len()
        );

        let start_time = Instant::now();
        let optimized = spawn_blocking(move || optimize_image(bytes))
            .await
            .map_err(|err| JobError::Optimize(err.to_string()))?
            .map_err(|err| JobError::Optimize(format!("{:#}", err)))?;
        info!(
            job_id = job_id,
            duration = &*format!("{:?}", start_time.elapsed());
            "Optimized to {} bytes", optimized.len()
        );

        let start_time = Instant::now();
        let text = self.recognizer.recognize(optimized).await?;
        info!(
            job_id = job_id,
            duration = &*format!("{:?}", start_time.elapsed());
            "Recognized text"
        );
        Ok(text)
    }

    /// Build the cache entry and hand it to the analysis service, if wired.
    async fn analyze(
        &self,
        job: &ValidatedJob<'_>,
        image_url: &str,
        text: String,
        request: &JobRequest,
    ) -> Result<CacheEntry, JobError> {
        let entry = CacheEntry::new(job.job_id, image_url, job.position, text);
        let Some(step) = &self.analysis else {
            return Ok(entry);
        };

        if let Err(err) = step.analyzer.analyze(&entry, request).await {
            let err = JobError::Downstream(format!("{:#}", err));
            if step.fatal {
                return Err(err);
            }
            warn!(job_id = job.job_id; "{}", err);
        }
        Ok(entry)
    }

    async fn persist(&self, record: JobRecord) -> Result<JobRecord, JobError> {
        let records = Arc::clone(&self.records);
        spawn_blocking(move || records.put_job_record(&record).map(|_| record))
            .await
            .map_err(|err| JobError::Persistence(err.to_string()))?
            .map_err(|err| JobError::Persistence(format!("{:#}", err)))
    }

    /// Record a FAILED job (when it has an id) and raise one notification.
    async fn finish_failed(&self, job_id: &str, image_url: &str, error: JobError) -> JobFailure {
        let failure = if job_id.trim().is_empty() {
            JobFailure::new(error, job_id, image_url)
        } else {
            let record = JobRecord::failed(job_id, image_url, error.to_string());
            match self.persist(record).await {
                Ok(_) => JobFailure::new(error, job_id, image_url),
                Err(persist_err) => {
                    warn!(job_id = job_id; "Job failed ({}) and its record could not be written", error);
                    JobFailure::new(persist_err, job_id, image_url)
                }
            }
        };

        warn!(job_id = job_id; "Failed at {}: {}", failure.error.source_tag(), failure.error);
        self.notify(&failure);
        failure
    }

    fn notify(&self, failure: &JobFailure) {
        if !failure.error.should_notify() {
            return;
        }
        if let Some(notifier) = &self.notifier {
            notifier.submit(FailureNotice::from_failure(failure));
        }
    }
}
