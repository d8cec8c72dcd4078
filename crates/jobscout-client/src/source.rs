use std::time::Duration;

use chrono::NaiveDate;
use jobscout_core::config::FetchConfig;
use jobscout_core::error::AppError;
use jobscout_core::models::{RawListing, SearchTask, Source};
use jobscout_core::traits::JobSource;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// HTTP client for the self-hosted search API.
///
/// One POST per task against `/api/v1/search_jobs`; the API fans out to the
/// actual job board and returns normalized listings as JSON. Transport and
/// server-side failures are mapped onto [`AppError`] so the retry layer can
/// tell transient from permanent.
#[derive(Clone)]
pub struct ApiJobSource {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl ApiJobSource {
    pub fn new(config: &FetchConfig) -> Result<Self, AppError> {
        let timeout_secs = config.timeout_secs;
        let client = Client::builder()
            .user_agent(concat!("jobscout/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            timeout_secs,
        })
    }
}

// ---- Search API types ----

#[derive(Debug, Serialize)]
struct SearchRequest {
    site_name: &'static str,
    search_term: String,
    location: String,
    results_wanted: u32,
    hours_old: u32,
    country_indeed: String,
    linkedin_fetch_description: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_remote: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    easy_apply: Option<bool>,
}

#[derive(Deserialize)]
struct SearchResponse {
    jobs: Vec<ApiListing>,
}

/// One listing as the search API returns it. Every field may be missing or
/// null; anything the API sends beyond these is ignored.
#[derive(Deserialize)]
struct ApiListing {
    title: Option<String>,
    company: Option<String>,
    location: Option<String>,
    job_url: Option<String>,
    job_type: Option<String>,
    is_remote: Option<bool>,
    job_level: Option<String>,
    description: Option<String>,
    date_posted: Option<NaiveDate>,
    min_amount: Option<f64>,
    max_amount: Option<f64>,
    currency: Option<String>,
    company_url: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    detail: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ApiListing {
    /// A record without the three identity fields cannot be deduplicated or
    /// scored, so it is dropped. Blank optionals become `None` rather than
    /// empty strings.
    fn into_raw(self, source: Source) -> Option<RawListing> {
        let title = non_empty(self.title)?;
        let company = non_empty(self.company)?;
        let location = non_empty(self.location)?;

        Some(RawListing {
            title,
            company,
            location,
            source,
            url: non_empty(self.job_url),
            job_type: non_empty(self.job_type),
            is_remote: self.is_remote,
            level: non_empty(self.job_level),
            description: non_empty(self.description),
            date_posted: self.date_posted,
            min_salary: self.min_amount,
            max_salary: self.max_amount,
            currency: non_empty(self.currency),
            company_url: non_empty(self.company_url),
        })
    }
}

fn build_request(task: &SearchTask, options: &FetchConfig) -> SearchRequest {
    let mut request = SearchRequest {
        site_name: task.source.as_str(),
        search_term: task.query.clone(),
        location: task.location.clone(),
        results_wanted: options.results_wanted,
        hours_old: options.hours_old,
        country_indeed: options.country_indeed.clone(),
        linkedin_fetch_description: options.linkedin_fetch_description,
        job_type: options.job_type.clone(),
        is_remote: options.is_remote,
        easy_apply: options.easy_apply,
    };

    // Indeed accepts only one filter family per request: posting age,
    // job-type/remote, or easy-apply. Posting age wins here.
    if task.source == Source::Indeed
        && (request.job_type.is_some()
            || request.is_remote.is_some()
            || request.easy_apply.is_some())
    {
        debug!(
            query = %task.query,
            "indeed limits filters to one family, keeping hours_old only"
        );
        request.job_type = None;
        request.is_remote = None;
        request.easy_apply = None;
    }

    request
}

impl JobSource for ApiJobSource {
    async fn fetch(
        &self,
        task: &SearchTask,
        options: &FetchConfig,
    ) -> Result<Vec<RawListing>, AppError> {
        let url = format!("{}/api/v1/search_jobs", self.base_url);
        let request = build_request(task, options);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();

            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.detail)
                .unwrap_or_else(|_| format!("HTTP {status_code}: {body}"));

            if status_code == 429 {
                return Err(AppError::RateLimitExceeded);
            }
            if status_code >= 500 {
                return Err(AppError::HttpError(format!("HTTP {status_code}: {message}")));
            }
            return Err(AppError::InvalidRequest(message));
        }

        let search_response: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::InvalidRequest(format!("Malformed search response: {e}")))?;

        let received = search_response.jobs.len();
        let listings: Vec<RawListing> = search_response
            .jobs
            .into_iter()
            .filter_map(|entry| entry.into_raw(task.source))
            .collect();

        if listings.len() < received {
            debug!(
                dropped = received - listings.len(),
                "discarded listings missing title, company or location"
            );
        }

        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> FetchConfig {
        FetchConfig {
            job_type: Some("fulltime".to_string()),
            is_remote: Some(true),
            ..FetchConfig::default()
        }
    }

    #[test]
    fn test_request_carries_task_and_options() {
        let task = SearchTask::new("rust developer", "Berlin", Source::Linkedin);
        let request = build_request(&task, &options());

        assert_eq!(request.site_name, "linkedin");
        assert_eq!(request.search_term, "rust developer");
        assert_eq!(request.location, "Berlin");
        assert_eq!(request.results_wanted, 50);
        assert_eq!(request.hours_old, 720);
        assert_eq!(request.job_type.as_deref(), Some("fulltime"));
        assert_eq!(request.is_remote, Some(true));
    }

    #[test]
    fn test_indeed_keeps_only_the_age_filter() {
        let task = SearchTask::new("rust developer", "Berlin", Source::Indeed);
        let request = build_request(&task, &options());

        assert_eq!(request.hours_old, 720);
        assert!(request.job_type.is_none());
        assert!(request.is_remote.is_none());
        assert!(request.easy_apply.is_none());
    }

    #[test]
    fn test_unset_options_are_left_out_of_the_payload() {
        let task = SearchTask::new("rust developer", "Remote", Source::Glassdoor);
        let request = build_request(&task, &FetchConfig::default());

        let payload = serde_json::to_value(&request).unwrap();
        let object = payload.as_object().unwrap();
        assert!(!object.contains_key("job_type"));
        assert!(!object.contains_key("is_remote"));
        assert!(!object.contains_key("easy_apply"));
        assert_eq!(object["site_name"], "glassdoor");
    }

    #[test]
    fn test_response_parsing_maps_fields() {
        let body = r#"{
            "count": 1,
            "jobs": [{
                "title": "Backend Engineer",
                "company": "Acme",
                "location": "Remote",
                "job_url": "https://example.com/jobs/1",
                "job_type": "fulltime",
                "is_remote": true,
                "job_level": "mid-senior",
                "description": "Build services in Rust.",
                "date_posted": "2026-08-20",
                "min_amount": 90000.0,
                "max_amount": 120000.0,
                "currency": "USD",
                "company_url": "https://acme.example.com",
                "company_num_employees": "200+"
            }]
        }"#;

        let response: SearchResponse = serde_json::from_str(body).unwrap();
        let listing = response
            .jobs
            .into_iter()
            .next()
            .unwrap()
            .into_raw(Source::Indeed)
            .unwrap();

        assert_eq!(listing.title, "Backend Engineer");
        assert_eq!(listing.company, "Acme");
        assert_eq!(listing.source, Source::Indeed);
        assert_eq!(listing.url.as_deref(), Some("https://example.com/jobs/1"));
        assert_eq!(listing.level.as_deref(), Some("mid-senior"));
        assert_eq!(
            listing.date_posted,
            Some(NaiveDate::from_ymd_opt(2026, 8, 20).unwrap())
        );
        assert_eq!(listing.min_salary, Some(90000.0));
    }

    #[test]
    fn test_records_without_identity_fields_are_dropped() {
        let entry = ApiListing {
            title: Some("Ghost Role".to_string()),
            company: Some("   ".to_string()),
            location: Some("Nowhere".to_string()),
            job_url: None,
            job_type: None,
            is_remote: None,
            job_level: None,
            description: None,
            date_posted: None,
            min_amount: None,
            max_amount: None,
            currency: None,
            company_url: None,
        };

        assert!(entry.into_raw(Source::Indeed).is_none());
    }

    #[test]
    fn test_blank_optionals_become_none() {
        let entry = ApiListing {
            title: Some("Backend Engineer".to_string()),
            company: Some("Acme".to_string()),
            location: Some("Remote".to_string()),
            job_url: Some("".to_string()),
            job_type: None,
            is_remote: None,
            job_level: Some("  ".to_string()),
            description: None,
            date_posted: None,
            min_amount: None,
            max_amount: None,
            currency: None,
            company_url: None,
        };

        let listing = entry.into_raw(Source::Indeed).unwrap();
        assert!(listing.url.is_none());
        assert!(listing.level.is_none());
    }

    #[test]
    fn test_missing_fields_deserialize_as_none() {
        let body = r#"{"jobs": [{"title": "Minimal", "company": "Acme", "location": "Remote"}]}"#;
        let response: SearchResponse = serde_json::from_str(body).unwrap();
        let listing = response
            .jobs
            .into_iter()
            .next()
            .unwrap()
            .into_raw(Source::Google)
            .unwrap();

        assert!(listing.description.is_none());
        assert!(listing.date_posted.is_none());
        assert!(listing.min_salary.is_none());
    }
}
