use rocket::FromForm;

use crate::models::request::parse_rfc3339;
use crate::models::{CrawlResult, JobRequest};

/// `application/x-www-form-urlencoded` rendition of a job. The crawl
/// reference arrives as nested `crawlResult.<field>` keys.
#[derive(FromForm, Debug, Default)]
pub struct JobForm {
    #[field(name = "jobId")]
    #[field(name = "JobId")]
    pub job_id: Option<String>,

    #[field(name = "requestId")]
    #[field(name = "reqId")]
    pub request_id: Option<String>,

    #[field(name = "position")]
    #[field(name = "currentPosition")]
    pub position: Option<String>,

    #[field(name = "isLatePeriod")]
    #[field(name = "is2025OrLater")]
    pub is_late_period: Option<String>,

    #[field(name = "requestedAt")]
    pub requested_at: Option<String>,

    #[field(name = "crawlResult")]
    pub crawl_result: Option<CrawlResultForm>,
}

#[derive(FromForm, Debug, Default)]
pub struct CrawlResultForm {
    pub url: Option<String>,
    #[field(name = "firstParagraph")]
    pub first_paragraph: Option<String>,
    #[field(name = "lastParagraph")]
    pub last_paragraph: Option<String>,
    pub content: Option<String>,
    #[field(name = "firstImageUrl")]
    pub first_image_url: Option<String>,
    #[field(name = "lastImageUrl")]
    pub last_image_url: Option<String>,
    #[field(name = "firstStickerUrl")]
    pub first_sticker_url: Option<String>,
    #[field(name = "secondStickerUrl")]
    pub second_sticker_url: Option<String>,
    #[field(name = "lastStickerUrl")]
    pub last_sticker_url: Option<String>,
}

impl CrawlResultForm {
    // Rocket yields `Some` for a nested form even when none of its keys were sent
    fn is_empty(&self) -> bool {
        [
            &self.url,
            &self.first_paragraph,
            &self.last_paragraph,
            &self.content,
            &self.first_image_url,
            &self.last_image_url,
            &self.first_sticker_url,
            &self.second_sticker_url,
            &self.last_sticker_url,
        ]
        .iter()
        .all(|field| field.is_none())
    }
}

impl From<CrawlResultForm> for CrawlResult {
    fn from(form: CrawlResultForm) -> Self {
        CrawlResult {
            url: form.url.unwrap_or_default(),
            first_paragraph: form.first_paragraph.unwrap_or_default(),
            last_paragraph: form.last_paragraph.unwrap_or_default(),
            content: form.content.unwrap_or_default(),
            first_image_url: form.first_image_url.unwrap_or_default(),
            last_image_url: form.last_image_url.unwrap_or_default(),
            first_sticker_url: form.first_sticker_url.unwrap_or_default(),
            second_sticker_url: form.second_sticker_url.unwrap_or_default(),
            last_sticker_url: form.last_sticker_url.unwrap_or_default(),
        }
    }
}

impl From<JobForm> for JobRequest {
    fn from(form: JobForm) -> Self {
        JobRequest {
            job_id: form.job_id.unwrap_or_default(),
            request_id: form.request_id.filter(|id| !id.is_empty()),
            position: form.position.unwrap_or_default(),
            // unparsable flags read as false
            is_late_period: form
                .is_late_period
                .and_then(|flag| flag.trim().parse().ok())
                .unwrap_or(false),
            requested_at: form.requested_at.as_deref().and_then(parse_rfc3339),
            crawl_result: form
                .crawl_result
                .filter(|crawl| !crawl.is_empty())
                .map(CrawlResult::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_canonical_request() {
        let form = JobForm {
            job_id: Some("job-1".into()),
            position: Some("LastImageUrl".into()),
            is_late_period: Some("yes".into()),
            requested_at: Some("2025-01-02T03:04:05+09:00".into()),
            crawl_result: Some(CrawlResultForm {
                last_image_url: Some("https://img/last.jpg".into()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let request = JobRequest::from(form);
        assert_eq!(request.job_id, "job-1");
        assert!(!request.is_late_period);
        assert_eq!(
            request.requested_at.map(|at| at.to_rfc3339()),
            Some("2025-01-01T18:04:05+00:00".to_string())
        );
        let job = request.validate().unwrap();
        assert_eq!(
            crate::models::resolve(job.crawl_result, &request.position),
            "https://img/last.jpg"
        );
    }

    #[test]
    fn empty_nested_form_is_no_crawl_result() {
        let form = JobForm {
            job_id: Some("job-1".into()),
            position: Some("LastImageUrl".into()),
            crawl_result: Some(CrawlResultForm::default()),
            ..Default::default()
        };
        let request = JobRequest::from(form);
        assert_eq!(request.crawl_result, None);
        assert_eq!(
            request.validate().unwrap_err().to_string(),
            "crawlResult is required"
        );
    }
}
