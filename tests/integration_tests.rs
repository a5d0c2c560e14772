//! New Relic Exporter Integration Tests
//!
//! Drives the real NerdGraph client and collector against a local stub
//! GraphQL server:
//! - Client error classification over HTTP
//! - End-to-end collection scenarios
//! - Scrape server output

use std::sync::Arc;
use std::time::Duration;

use newrelic_exporter::adapters::{NerdGraphClient, NerdGraphConfig};
use newrelic_exporter::metrics::{Collector, CollectorConfig};

// =============================================================================
// Stub NerdGraph Server
// =============================================================================

mod stub {
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use http_body_util::{BodyExt, Full};
    use hyper::body::{Bytes, Incoming};
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use tokio::net::TcpListener;

    pub const API_KEY: &str = "NRAK-INTEGRATION";

    /// What the stub answers for one query.
    pub enum Reply {
        Json(serde_json::Value),
        Raw(u16, &'static str),
        Stall(Duration),
    }

    type Handler = dyn Fn(&str) -> Reply + Send + Sync;

    /// A GraphQL endpoint answering from a closure over the query text.
    pub struct StubNerdGraph {
        pub addr: SocketAddr,
        queries: Arc<Mutex<Vec<String>>>,
    }

    impl StubNerdGraph {
        pub async fn start(handler: impl Fn(&str) -> Reply + Send + Sync + 'static) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let queries = Arc::new(Mutex::new(Vec::new()));
            let handler: Arc<Handler> = Arc::new(handler);

            let recorded = queries.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        return;
                    };
                    let handler = handler.clone();
                    let recorded = recorded.clone();
                    tokio::spawn(async move {
                        let service = service_fn(move |req: Request<Incoming>| {
                            let handler = handler.clone();
                            let recorded = recorded.clone();
                            async move {
                                Ok::<_, Infallible>(answer(req, handler.as_ref(), &recorded).await)
                            }
                        });
                        let _ = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await;
                    });
                }
            });

            Self { addr, queries }
        }

        pub fn endpoint(&self) -> String {
            format!("http://{}/graphql", self.addr)
        }

        pub fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    async fn answer(
        req: Request<Incoming>,
        handler: &Handler,
        recorded: &Mutex<Vec<String>>,
    ) -> Response<Full<Bytes>> {
        let authorized = req
            .headers()
            .get("API-Key")
            .map(|v| v == API_KEY)
            .unwrap_or(false);

        let body = req.into_body().collect().await.unwrap().to_bytes();
        let request: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let query = request["query"].as_str().unwrap_or_default().to_string();
        recorded.lock().unwrap().push(query.clone());

        if !authorized {
            return json(serde_json::json!({
                "errors": [{"message": "Invalid API key"}],
                "data": null
            }));
        }

        match handler(&query) {
            Reply::Json(value) => json(value),
            Reply::Raw(status, body) => {
                let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
                *response.status_mut() = StatusCode::from_u16(status).unwrap();
                response
            }
            Reply::Stall(delay) => {
                tokio::time::sleep(delay).await;
                json(serde_json::json!({"data": {}}))
            }
        }
    }

    fn json(value: serde_json::Value) -> Response<Full<Bytes>> {
        Response::new(Full::new(Bytes::from(value.to_string())))
    }

    /// GUIDs listed in an `entities(guids: [...])` query.
    pub fn guids_in(query: &str) -> Vec<String> {
        let Some(start) = query.find("guids: [") else {
            return Vec::new();
        };
        let rest = &query[start + "guids: [".len()..];
        let end = rest.find(']').unwrap_or(rest.len());
        rest[..end]
            .split(", ")
            .filter(|s| !s.is_empty())
            .map(|s| s.trim_matches('"').to_string())
            .collect()
    }

    pub fn entity_page(entities: serde_json::Value) -> Reply {
        Reply::Json(serde_json::json!({"data": {"actor": {"entitySearch": {"results": {
            "nextCursor": null,
            "entities": entities
        }}}}}))
    }

    pub fn deployments(entities: serde_json::Value) -> Reply {
        Reply::Json(serde_json::json!({"data": {"actor": {"entities": entities}}}))
    }
}

use stub::{Reply, StubNerdGraph};

fn client_for(stub: &StubNerdGraph) -> NerdGraphClient {
    NerdGraphClient::new(NerdGraphConfig {
        endpoint: stub.endpoint(),
        api_key: stub::API_KEY.to_string(),
        query_timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn collector_for(stub: &StubNerdGraph) -> Collector {
    Collector::new(Arc::new(client_for(stub)), CollectorConfig::default()).unwrap()
}

// =============================================================================
// Client Classification Tests
// =============================================================================

mod client_tests {
    use super::*;
    use assert_matches::assert_matches;
    use newrelic_exporter::domain::GraphQlExecutor;
    use newrelic_exporter::error::Error;
    use newrelic_exporter::query;

    #[tokio::test]
    async fn test_posts_query_with_api_key() {
        let stub = StubNerdGraph::start(|_| Reply::Json(serde_json::json!({"data": {"ok": true}}))).await;
        let client = client_for(&stub);

        let data = client.execute(&query::entity_search(None)).await.unwrap();

        assert_eq!(data, serde_json::json!({"ok": true}));
        let queries = stub.queries();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].contains("entitySearch"));
    }

    #[tokio::test]
    async fn test_wrong_api_key_is_backend_error() {
        let stub = StubNerdGraph::start(|_| Reply::Json(serde_json::json!({"data": {}}))).await;
        let client = NerdGraphClient::new(NerdGraphConfig {
            endpoint: stub.endpoint(),
            api_key: "NRAK-WRONG".to_string(),
            query_timeout: Duration::from_secs(5),
        })
        .unwrap();

        let result = client.execute(&query::entity_search(None)).await;

        assert_matches!(result, Err(Error::UpstreamBackend(_)));
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let stub = StubNerdGraph::start(|_| Reply::Raw(503, "upstream unavailable")).await;

        let result = client_for(&stub).execute(&query::entity_search(None)).await;

        match result {
            Err(Error::UpstreamStatus { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "upstream unavailable");
            }
            other => panic!("Expected UpstreamStatus error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_body() {
        let stub = StubNerdGraph::start(|_| Reply::Raw(200, "<html>maintenance</html>")).await;

        let result = client_for(&stub).execute(&query::entity_search(None)).await;

        assert_matches!(result, Err(Error::UpstreamResponseParse(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_connection_error() {
        let stub = StubNerdGraph::start(|_| Reply::Stall(Duration::from_secs(5))).await;
        let client = NerdGraphClient::new(NerdGraphConfig {
            endpoint: stub.endpoint(),
            api_key: stub::API_KEY.to_string(),
            query_timeout: Duration::from_millis(200),
        })
        .unwrap();

        let result = client.execute(&query::entity_search(None)).await;

        assert_matches!(result, Err(Error::UpstreamConnection(_)));
    }
}

// =============================================================================
// Collection Scenario Tests
// =============================================================================

mod scenario_tests {
    use super::*;
    use stub::{deployments, entity_page, guids_in};

    fn series_value(
        series: &[newrelic_exporter::GaugeSeries],
        name: &str,
        labels: &[&str],
    ) -> Option<f64> {
        series
            .iter()
            .find(|s| s.name == name)
            .and_then(|s| s.value_for(labels))
    }

    #[tokio::test]
    async fn test_single_entity_statistics() {
        let stub = StubNerdGraph::start(|query| {
            if query.contains("entitySearch") {
                entity_page(serde_json::json!([{
                    "guid": "g1",
                    "name": "svc-a",
                    "apmSummary": {"errorRate": 0.02, "webResponseTimeAverage": 0.15}
                }]))
            } else {
                deployments(serde_json::json!([]))
            }
        })
        .await;

        let series = collector_for(&stub).collect().await;

        assert_eq!(
            series_value(&series, "newrelic_application_error_rate", &["svc-a"]),
            Some(0.02)
        );
        assert_eq!(
            series_value(&series, "newrelic_application_response_time", &["svc-a"]),
            Some(150.0)
        );
    }

    #[tokio::test]
    async fn test_entity_without_summary_is_skipped() {
        let stub = StubNerdGraph::start(|query| {
            if query.contains("entitySearch") {
                entity_page(serde_json::json!([
                    {"guid": "g1", "name": "svc-a", "apmSummary": {"apdexScore": 0.8}},
                    {"guid": "g2", "name": "svc-b"}
                ]))
            } else {
                deployments(serde_json::json!([]))
            }
        })
        .await;

        let series = collector_for(&stub).collect().await;
        let apdex = series
            .iter()
            .find(|s| s.name == "newrelic_application_apdex_score")
            .unwrap();

        assert_eq!(apdex.samples.len(), 1);
        assert_eq!(apdex.samples[0].label_values, vec!["svc-a"]);
    }

    #[tokio::test]
    async fn test_thirty_entities_two_batches() {
        let stub = StubNerdGraph::start(|query| {
            if query.contains("entitySearch") {
                let entities: Vec<_> = (0..30)
                    .map(|i| serde_json::json!({"guid": format!("g{i}"), "name": format!("svc-{i}")}))
                    .collect();
                entity_page(serde_json::Value::Array(entities))
            } else if guids_in(query).contains(&"g29".to_string()) {
                // Second batch reports a deployment for an entity of the first batch.
                deployments(serde_json::json!([
                    {"guid": "g7", "deployments": [{"version": "4.0.0", "timestamp": 1_700_000_000_000i64}]}
                ]))
            } else {
                deployments(serde_json::json!([]))
            }
        })
        .await;

        let series = collector_for(&stub).collect().await;

        let deployment_queries: Vec<_> = stub
            .queries()
            .into_iter()
            .filter(|q| q.contains("deployments"))
            .collect();
        assert_eq!(deployment_queries.len(), 2);
        assert_eq!(guids_in(&deployment_queries[0]).len(), 25);
        assert_eq!(guids_in(&deployment_queries[1]).len(), 5);

        assert_eq!(
            series_value(&series, "newrelic_application_deployment", &["svc-7", "4.0.0"]),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn test_deployment_sample_timestamp() {
        let stub = StubNerdGraph::start(|query| {
            if query.contains("entitySearch") {
                entity_page(serde_json::json!([{"guid": "g1", "name": "svc-a"}]))
            } else {
                deployments(serde_json::json!([
                    {"guid": "g1", "deployments": [{"version": "1.2.3", "timestamp": 1_700_000_000_000i64}]}
                ]))
            }
        })
        .await;

        let series = collector_for(&stub).collect().await;
        let deployment = series
            .iter()
            .find(|s| s.name == "newrelic_application_deployment")
            .unwrap();

        assert_eq!(deployment.samples.len(), 1);
        let sample = &deployment.samples[0];
        assert_eq!(sample.label_values, vec!["svc-a", "1.2.3"]);
        assert_eq!(sample.value, 1.0);
        assert_eq!(sample.timestamp.unwrap().timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn test_entity_error_aborts_pass() {
        let stub = StubNerdGraph::start(|_| {
            Reply::Json(serde_json::json!({"errors": [{"message": "boom"}], "data": null}))
        })
        .await;

        let series = collector_for(&stub).collect().await;

        assert!(series.is_empty());
        assert_eq!(stub.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_deployment_error_keeps_entity_series() {
        let stub = StubNerdGraph::start(|query| {
            if query.contains("entitySearch") {
                entity_page(serde_json::json!([
                    {"guid": "g1", "name": "svc-a", "apmSummary": {"webThroughput": 42.0}}
                ]))
            } else {
                Reply::Raw(500, "internal error")
            }
        })
        .await;

        let series = collector_for(&stub).collect().await;

        assert_eq!(series.len(), 4);
        assert!(series
            .iter()
            .all(|s| s.name != "newrelic_application_deployment"));
        assert_eq!(
            series_value(&series, "newrelic_application_throughput", &["svc-a"]),
            Some(42.0)
        );
    }
}

// =============================================================================
// Scrape Server Tests
// =============================================================================

mod server_tests {
    use super::*;
    use newrelic_exporter::server;
    use stub::{deployments, entity_page};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn http_get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_scrape_over_http() {
        let stub = StubNerdGraph::start(|query| {
            if query.contains("entitySearch") {
                entity_page(serde_json::json!([
                    {"guid": "g1", "name": "svc-a", "apmSummary": {"errorRate": 0.02}}
                ]))
            } else {
                deployments(serde_json::json!([
                    {"guid": "g1", "deployments": [{"version": "1.2.3", "timestamp": 1_700_000_000_000i64}]}
                ]))
            }
        })
        .await;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let collector = Arc::new(collector_for(&stub));
        tokio::spawn(server::serve(listener, collector));

        let response = http_get(addr, "/metrics").await;

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("# TYPE newrelic_application_error_rate gauge"));
        assert!(response.contains(r#"newrelic_application_error_rate{appname="svc-a"} 0.02"#));
        assert!(response.contains(
            r#"newrelic_application_deployment{appname="svc-a",version="1.2.3"} 1 1700000000000"#
        ));

        let health = http_get(addr, "/healthz").await;
        assert!(health.starts_with("HTTP/1.1 200 OK"));
        assert!(health.ends_with("ok"));
    }
}
