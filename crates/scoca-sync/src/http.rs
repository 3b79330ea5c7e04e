//! HTTP client for CourtListener's REST API (v3).
//!
//! A case filing is assembled from three resources: the docket entry, its
//! single opinion cluster, and the cluster's single sub-opinion, which holds
//! the plain text. The docket list is paged through `next` links.

use chrono::NaiveDate;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use scoca_core::CaseFiling;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::query::{FilterValue, filters_to_query};

const REST_API_PATH: &str = "/api/rest/v3";

const CLUSTER_FIELDS: &[&str] = &[
    "id",
    "absolute_url",
    "panel",
    "non_participating_judges",
    "sub_opinions",
    "judges",
    "date_filed",
    "date_filed_is_approximate",
];

const OPINION_FIELDS: &[&str] = &[
    "id",
    "author",
    "joined_by",
    "author_str",
    "type",
    "sha1",
    "download_url",
    "plain_text",
];

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("API request quota reached; is the CourtListener API token set?")]
    QuotaExceeded,
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected exactly one entry in {field}, found {len}")]
    UnexpectedShape { field: &'static str, len: usize },
    #[error("missing field {0}")]
    MissingField(&'static str),
    #[error("storing case filing {docket_number}: {source}")]
    Sink {
        docket_number: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SyncError {
    /// A docket entry CourtListener describes in a shape we cannot assemble
    /// into one case filing. The walk skips these instead of stopping.
    pub fn is_malformed_entry(&self) -> bool {
        matches!(self, Self::UnexpectedShape { .. } | Self::MissingField(_))
    }
}

/// Receives case filings one at a time as the docket walk fetches them, so
/// everything accepted before a failure is kept.
pub trait FilingSink {
    type Error: Into<Box<dyn std::error::Error + Send + Sync>>;

    /// True when the docket is already stored and needs no fetching.
    fn contains(&mut self, docket_number: &str) -> bool;

    fn accept(&mut self, filing: CaseFiling) -> Result<(), Self::Error>;
}

/// Counters for one walk of the docket list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkSummary {
    pub pages: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub malformed: usize,
}

/// One page of the docket list.
#[derive(Debug, Clone, Deserialize)]
pub struct DocketPage {
    #[serde(default)]
    pub results: Vec<DocketEntry>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocketEntry {
    pub docket_number: Option<String>,
    /// Cluster resource URLs.
    #[serde(default)]
    pub clusters: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpinionCluster {
    pub id: Option<i64>,
    pub absolute_url: Option<String>,
    /// Opinion resource URLs.
    #[serde(default)]
    pub sub_opinions: Vec<String>,
    pub date_filed: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpinionInstance {
    pub id: Option<i64>,
    pub sha1: Option<String>,
    pub download_url: Option<String>,
    #[serde(default)]
    pub plain_text: String,
}

/// The single element of a list that must hold exactly one.
fn only<'a>(field: &'static str, items: &'a [String]) -> Result<&'a str, SyncError> {
    match items {
        [one] => Ok(one),
        _ => Err(SyncError::UnexpectedShape {
            field,
            len: items.len(),
        }),
    }
}

/// HTTP client for CourtListener's REST API.
pub struct CourtListenerClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl CourtListenerClient {
    /// `base_url` should be like `https://www.courtlistener.com` (a trailing
    /// slash is trimmed). Without a token, requests are anonymous and will
    /// hit the quota quickly.
    pub fn new(base_url: String, token: Option<String>) -> Self {
        if token.is_none() {
            warn!("no CourtListener API token set; requests are anonymous");
        }
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// URL of the first docket-list page for `court`, newest changes first,
    /// limited to dockets with clusters filed on or after `since`.
    pub fn docket_list_url(&self, court: &str, since: NaiveDate) -> String {
        let since = since.format("%Y-%m-%d").to_string();
        format!(
            "{}{REST_API_PATH}/dockets/{}",
            self.base_url,
            filters_to_query(&[
                ("court", FilterValue::One(court)),
                ("clusters__date_filed__gte", FilterValue::One(&since)),
                (
                    "order_by",
                    FilterValue::List(&["-date_modified", "-date_created"]),
                ),
            ])
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SyncError> {
        debug!(url, "GET");
        let mut req = self.client.get(url).header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            req = req.header(AUTHORIZATION, format!("Token {token}"));
        }
        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SyncError::QuotaExceeded);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn docket_page(&self, url: &str) -> Result<DocketPage, SyncError> {
        self.get_json(url).await
    }

    pub async fn cluster(&self, url: &str) -> Result<OpinionCluster, SyncError> {
        let url = format!(
            "{url}{}",
            filters_to_query(&[("fields", FilterValue::List(CLUSTER_FIELDS))])
        );
        self.get_json(&url).await
    }

    pub async fn opinion(&self, url: &str) -> Result<OpinionInstance, SyncError> {
        let url = format!(
            "{url}{}",
            filters_to_query(&[("fields", FilterValue::List(OPINION_FIELDS))])
        );
        self.get_json(&url).await
    }

    /// Fetch the cluster and sub-opinion behind a docket entry.
    pub async fn case_filing(&self, entry: &DocketEntry) -> Result<CaseFiling, SyncError> {
        let docket_number = entry
            .docket_number
            .clone()
            .ok_or(SyncError::MissingField("docket_number"))?;
        let cluster = self.cluster(only("clusters", &entry.clusters)?).await?;
        let opinion = self
            .opinion(only("sub_opinions", &cluster.sub_opinions)?)
            .await?;
        Ok(CaseFiling {
            docket_number,
            url: cluster
                .absolute_url
                .map(|path| format!("{}{path}", self.base_url)),
            plain_text: opinion.plain_text,
            sha1: opinion.sha1,
            filed_on: cluster.date_filed,
        })
    }

    /// Walk the whole docket list for `court` since `since`, handing every
    /// case filing the sink does not already contain to
    /// [`FilingSink::accept`] as soon as it is fetched.
    ///
    /// The containment check happens before the cluster and opinion
    /// requests, so stored filings cost one list entry, not two extra
    /// requests. Malformed entries are logged and counted. Any other error
    /// stops the walk; filings accepted before it stay accepted.
    pub async fn active_docket<S: FilingSink>(
        &self,
        court: &str,
        since: NaiveDate,
        sink: &mut S,
    ) -> Result<WalkSummary, SyncError> {
        let mut next = Some(self.docket_list_url(court, since));
        let mut summary = WalkSummary::default();
        while let Some(url) = next {
            let page = self.docket_page(&url).await?;
            summary.pages += 1;
            for entry in &page.results {
                if let Some(docket_number) = &entry.docket_number
                    && sink.contains(docket_number)
                {
                    summary.skipped += 1;
                    continue;
                }
                let filing = match self.case_filing(entry).await {
                    Ok(filing) => filing,
                    Err(e) if e.is_malformed_entry() => {
                        warn!(
                            docket_number = entry.docket_number.as_deref().unwrap_or("?"),
                            error = %e,
                            "skipping malformed docket entry"
                        );
                        summary.malformed += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                let docket_number = filing.docket_number.clone();
                sink.accept(filing).map_err(|e| SyncError::Sink {
                    docket_number,
                    source: e.into(),
                })?;
                summary.fetched += 1;
            }
            next = page.next;
        }
        info!(
            pages = summary.pages,
            fetched = summary.fetched,
            skipped = summary.skipped,
            malformed = summary.malformed,
            "walked CourtListener docket list"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tracing_test::traced_test;

    type Route = (String, u16, String);

    /// Serve canned responses keyed by request path (query string dropped),
    /// recording every request target and its authorization header. Routes
    /// are built from the server's own base URL so that bodies can carry
    /// absolute links back to it. Unknown paths get a 404.
    async fn serve<F>(routes: F) -> (String, Arc<Mutex<Vec<String>>>)
    where
        F: FnOnce(&str) -> Vec<Route>,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let routes: HashMap<String, (u16, String)> = routes(&base)
            .into_iter()
            .map(|(path, status, body)| (path, (status, body)))
            .collect();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let (read, mut write) = stream.into_split();
                let mut lines = BufReader::new(read).lines();
                let Ok(Some(request_line)) = lines.next_line().await else {
                    continue;
                };
                let mut auth = String::new();
                while let Ok(Some(line)) = lines.next_line().await {
                    if line.is_empty() {
                        break;
                    }
                    if line.to_ascii_lowercase().starts_with("authorization:") {
                        auth = line;
                    }
                }
                let target = request_line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or_default()
                    .to_string();
                log.lock().unwrap().push(format!("{target} {auth}").trim().to_string());
                let path = target.split('?').next().unwrap_or_default();
                let (status, body) = routes
                    .get(path)
                    .cloned()
                    .unwrap_or((404, "not found".to_string()));
                let resp = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = write.write_all(resp.as_bytes()).await;
                let _ = write.shutdown().await;
            }
        });
        (base, seen)
    }

    fn cluster_json(base: &str, id: u32, sub_opinions: &[u32]) -> String {
        let subs: Vec<String> = sub_opinions
            .iter()
            .map(|o| format!("\"{base}/api/rest/v3/opinions/{o}/\""))
            .collect();
        format!(
            r#"{{"id": {id}, "absolute_url": "/opinion/{id}/people-v-doe/", "panel": [],
                "sub_opinions": [{}], "judges": "", "date_filed": "2019-06-27",
                "date_filed_is_approximate": false}}"#,
            subs.join(",")
        )
    }

    fn opinion_json(id: u32, text: &str) -> String {
        format!(
            r#"{{"id": {id}, "author": null, "joined_by": [], "type": "010combined",
                "sha1": "abc{id}", "download_url": null, "plain_text": "{text}"}}"#
        )
    }

    /// Sink that keeps filings in memory and can refuse one docket.
    #[derive(Default)]
    struct Collected {
        stored: Vec<String>,
        filings: Vec<CaseFiling>,
        refuse: Option<&'static str>,
    }

    impl FilingSink for Collected {
        type Error = String;

        fn contains(&mut self, docket_number: &str) -> bool {
            self.stored.iter().any(|d| d == docket_number)
        }

        fn accept(&mut self, filing: CaseFiling) -> Result<(), String> {
            if self.refuse == Some(filing.docket_number.as_str()) {
                return Err("disk full".into());
            }
            self.filings.push(filing);
            Ok(())
        }
    }

    fn since() -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 1, 3).unwrap()
    }

    fn one_page(base: &str, entries: &[(&str, &[u32])]) -> String {
        let results: Vec<String> = entries
            .iter()
            .map(|(docket, clusters)| {
                let urls: Vec<String> = clusters
                    .iter()
                    .map(|c| format!("\"{base}/api/rest/v3/clusters/{c}/\""))
                    .collect();
                format!(
                    r#"{{"docket_number": "{docket}", "clusters": [{}]}}"#,
                    urls.join(",")
                )
            })
            .collect();
        format!(r#"{{"next": null, "results": [{}]}}"#, results.join(","))
    }

    #[test]
    fn docket_list_url_has_filters() {
        let client = CourtListenerClient::new("https://www.courtlistener.com/".into(), None);
        let url = client.docket_list_url("cal", NaiveDate::from_ymd_opt(2019, 1, 3).unwrap());
        assert_eq!(
            url,
            "https://www.courtlistener.com/api/rest/v3/dockets/?court=cal\
             &clusters__date_filed__gte=2019-01-03&order_by=-date_modified,-date_created"
        );
    }

    #[test]
    fn decode_recorded_docket_page() {
        let json = r#"{
            "count": 2,
            "next": "https://www.courtlistener.com/api/rest/v3/dockets/?page=2",
            "previous": null,
            "results": [
                {"docket_number": "S245203", "clusters": ["https://www.courtlistener.com/api/rest/v3/clusters/1/"]},
                {"docket_number": "S245203A", "clusters": []}
            ]
        }"#;
        let page: DocketPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[1].clusters.len(), 0);
        assert!(page.next.is_some());
    }

    #[test]
    fn unit_list_rule() {
        assert_eq!(only("clusters", &["a".to_string()]).unwrap(), "a");
        assert!(matches!(
            only("clusters", &[]),
            Err(SyncError::UnexpectedShape { field: "clusters", len: 0 })
        ));
        assert!(matches!(
            only("sub_opinions", &["a".to_string(), "b".to_string()]),
            Err(SyncError::UnexpectedShape { len: 2, .. })
        ));
    }

    #[tokio::test]
    async fn walks_pages_and_assembles_filings() {
        let (base, seen) = serve(|base| {
            vec![
                (
                    "/api/rest/v3/dockets/".into(),
                    200,
                    format!(
                        r#"{{"next": "{base}/page2/", "results": [
                            {{"docket_number": "S1", "clusters": ["{base}/api/rest/v3/clusters/10/"]}},
                            {{"docket_number": "S0", "clusters": ["{base}/api/rest/v3/clusters/99/"]}}
                        ]}}"#
                    ),
                ),
                (
                    "/page2/".into(),
                    200,
                    format!(
                        r#"{{"next": null, "results": [
                            {{"docket_number": "S2A", "clusters": ["{base}/api/rest/v3/clusters/20/"]}}
                        ]}}"#
                    ),
                ),
                ("/api/rest/v3/clusters/10/".into(), 200, cluster_json(base, 10, &[100])),
                ("/api/rest/v3/clusters/20/".into(), 200, cluster_json(base, 20, &[200])),
                ("/api/rest/v3/opinions/100/".into(), 200, opinion_json(100, "first")),
                ("/api/rest/v3/opinions/200/".into(), 200, opinion_json(200, "second")),
            ]
        })
        .await;

        let client = CourtListenerClient::new(base.clone(), Some("secret".into()));
        let mut sink = Collected {
            stored: vec!["S0".into()],
            ..Collected::default()
        };
        let summary = client.active_docket("cal", since(), &mut sink).await.unwrap();

        assert_eq!(
            summary,
            WalkSummary {
                pages: 2,
                fetched: 2,
                skipped: 1,
                malformed: 0
            }
        );
        let filings = &sink.filings;
        assert_eq!(filings.len(), 2);
        assert_eq!(filings[0].docket_number, "S1");
        assert_eq!(filings[0].plain_text, "first");
        assert_eq!(filings[0].sha1.as_deref(), Some("abc100"));
        assert_eq!(
            filings[0].url.as_deref(),
            Some(format!("{base}/opinion/10/people-v-doe/").as_str())
        );
        assert_eq!(filings[0].filed_on, NaiveDate::from_ymd_opt(2019, 6, 27));
        assert_eq!(filings[1].docket_number, "S2A");
        assert!(filings[1].is_variant());

        let seen = seen.lock().unwrap().clone();
        // Skipped docket never triggers a cluster request.
        assert!(!seen.iter().any(|r| r.contains("/clusters/99/")));
        assert!(seen.iter().all(|r| r.ends_with("Token secret")));
        assert!(seen.iter().any(|r| r.contains("/clusters/10/?fields=id,absolute_url")));
    }

    #[tokio::test]
    async fn quota_exceeded_is_reported() {
        let (base, _) = serve(|_| {
            vec![("/api/rest/v3/dockets/".into(), 429, String::new())]
        })
        .await;
        let client = CourtListenerClient::new(base, None);
        let result = client
            .active_docket("cal", since(), &mut Collected::default())
            .await;
        assert!(matches!(result, Err(SyncError::QuotaExceeded)));
    }

    #[traced_test]
    #[tokio::test]
    async fn malformed_entry_is_skipped_and_walk_goes_on() {
        let (base, _) = serve(|base| {
            vec![
                (
                    "/api/rest/v3/dockets/".into(),
                    200,
                    one_page(base, &[("S1", &[10]), ("S2", &[20, 21]), ("S3", &[30])]),
                ),
                ("/api/rest/v3/clusters/10/".into(), 200, cluster_json(base, 10, &[100])),
                ("/api/rest/v3/clusters/30/".into(), 200, cluster_json(base, 30, &[300])),
                ("/api/rest/v3/opinions/100/".into(), 200, opinion_json(100, "first")),
                ("/api/rest/v3/opinions/300/".into(), 200, opinion_json(300, "third")),
            ]
        })
        .await;
        let client = CourtListenerClient::new(base, None);
        let mut sink = Collected::default();
        let summary = client.active_docket("cal", since(), &mut sink).await.unwrap();

        let dockets: Vec<_> = sink.filings.iter().map(|f| f.docket_number.as_str()).collect();
        assert_eq!(dockets, vec!["S1", "S3"]);
        assert_eq!(summary.malformed, 1);
        assert!(logs_contain("skipping malformed docket entry"));
    }

    #[tokio::test]
    async fn quota_mid_walk_keeps_earlier_filings() {
        let (base, _) = serve(|base| {
            vec![
                (
                    "/api/rest/v3/dockets/".into(),
                    200,
                    one_page(base, &[("S1", &[10]), ("S2", &[20])]),
                ),
                ("/api/rest/v3/clusters/10/".into(), 200, cluster_json(base, 10, &[100])),
                ("/api/rest/v3/clusters/20/".into(), 429, String::new()),
                ("/api/rest/v3/opinions/100/".into(), 200, opinion_json(100, "first")),
            ]
        })
        .await;
        let client = CourtListenerClient::new(base, None);
        let mut sink = Collected::default();
        let result = client.active_docket("cal", since(), &mut sink).await;

        assert!(matches!(result, Err(SyncError::QuotaExceeded)));
        assert_eq!(sink.filings.len(), 1);
        assert_eq!(sink.filings[0].docket_number, "S1");
    }

    #[tokio::test]
    async fn sink_failure_stops_the_walk() {
        let (base, _) = serve(|base| {
            vec![
                (
                    "/api/rest/v3/dockets/".into(),
                    200,
                    one_page(base, &[("S1", &[10])]),
                ),
                ("/api/rest/v3/clusters/10/".into(), 200, cluster_json(base, 10, &[100])),
                ("/api/rest/v3/opinions/100/".into(), 200, opinion_json(100, "first")),
            ]
        })
        .await;
        let client = CourtListenerClient::new(base, None);
        let mut sink = Collected {
            refuse: Some("S1"),
            ..Collected::default()
        };
        let err = client
            .active_docket("cal", since(), &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Sink { ref docket_number, .. } if docket_number == "S1"));
        assert!(err.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn multiple_sub_opinions_rejected() {
        let (base, _) = serve(|base| {
            vec![("/c/".into(), 200, cluster_json(base, 1, &[1, 2]))]
        })
        .await;
        let client = CourtListenerClient::new(base.clone(), None);
        let entry = DocketEntry {
            docket_number: Some("S1".into()),
            clusters: vec![format!("{base}/c/")],
        };
        assert!(matches!(
            client.case_filing(&entry).await,
            Err(SyncError::UnexpectedShape { field: "sub_opinions", len: 2 })
        ));
    }

    #[tokio::test]
    async fn server_error_carries_body() {
        let (base, _) = serve(|_| vec![]).await;
        let client = CourtListenerClient::new(base.clone(), None);
        let result = client.docket_page(&format!("{base}/missing/")).await;
        assert!(matches!(
            result,
            Err(SyncError::Server { status: 404, ref body }) if body == "not found"
        ));
    }
}
