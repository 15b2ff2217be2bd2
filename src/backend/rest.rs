use super::*;
use serde::{Deserialize, Serialize};

/// PostgREST-style backend (e.g. a Supabase project)
pub struct RestBackend {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl RestBackend {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> BackendResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(BackendError::ConfigError(format!(
                "Backend URL must be http(s), got '{}'",
                base_url
            )));
        }
        if api_key.is_empty() {
            return Err(BackendError::ConfigError("Backend API key is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::ConfigError(e.to_string()))?;

        Ok(Self {
            base_url,
            api_key,
            client,
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("apikey", self.api_key.as_str())
            .bearer_auth(&self.api_key)
    }

    fn map_send_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout(self.timeout)
        } else {
            BackendError::ApiError(e.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
struct VoteRow<'a> {
    year: Year,
    category: &'a str,
    nominee_id: &'a str,
    voter_id: &'a str,
}

#[derive(Debug, Serialize)]
struct StatsParams<'a> {
    p_year: Year,
    p_category: &'a str,
}

#[derive(Debug, Deserialize)]
struct StatsRow {
    nominee_id: NomineeId,
    #[serde(default)]
    vote_count: u32,
}

#[async_trait]
impl VoteBackend for RestBackend {
    async fn submit_vote(&self, vote: RemoteVote) -> BackendResult<()> {
        let row = VoteRow {
            year: vote.year,
            category: &vote.category,
            nominee_id: &vote.nominee_id,
            voter_id: &vote.voter_id,
        };

        let response = self
            .post("votes")
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(BackendError::ApiError(format!(
                "Vote insert returned status: {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn category_stats(
        &self,
        year: Year,
        category: &str,
    ) -> BackendResult<HashMap<NomineeId, u32>> {
        let response = self
            .post("rpc/get_category_vote_stats")
            .json(&StatsParams {
                p_year: year,
                p_category: category,
            })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(BackendError::ApiError(format!(
                "Vote stats returned status: {}",
                response.status()
            )));
        }

        let rows: Vec<StatsRow> = response
            .json()
            .await
            .map_err(|e| BackendError::ParseError(e.to_string()))?;

        Ok(aggregate_rows(rows))
    }

    fn name(&self) -> &str {
        "rest"
    }
}

/// Sum rows per nominee; the RPC may return one row per nomination record
fn aggregate_rows(rows: Vec<StatsRow>) -> HashMap<NomineeId, u32> {
    let mut counts = HashMap::new();
    for row in rows {
        *counts.entry(row.nominee_id).or_insert(0) += row.vote_count;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_config() {
        let timeout = Duration::from_secs(5);
        assert!(RestBackend::new("https://x.supabase.co/".into(), "key".into(), timeout).is_ok());
        assert!(matches!(
            RestBackend::new("x.supabase.co".into(), "key".into(), timeout),
            Err(BackendError::ConfigError(_))
        ));
        assert!(matches!(
            RestBackend::new("https://x.supabase.co".into(), String::new(), timeout),
            Err(BackendError::ConfigError(_))
        ));
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let backend =
            RestBackend::new("https://x.supabase.co/".into(), "key".into(), Duration::from_secs(5))
                .unwrap();
        assert_eq!(backend.url("votes"), "https://x.supabase.co/rest/v1/votes");
    }

    #[test]
    fn test_aggregate_rows() {
        let rows: Vec<StatsRow> = serde_json::from_str(
            r#"[{"nominee_id":"a","vote_count":2},{"nominee_id":"b"},{"nominee_id":"a","vote_count":1}]"#,
        )
        .unwrap();
        let counts = aggregate_rows(rows);
        assert_eq!(counts.get("a"), Some(&3));
        assert_eq!(counts.get("b"), Some(&0));
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails_gracefully() {
        let backend = RestBackend::new(
            "http://127.0.0.1:9".into(),
            "key".into(),
            Duration::from_millis(500),
        )
        .unwrap();
        let result = backend.category_stats(2026, "Best Picture").await;
        assert!(result.is_err());
    }
}
