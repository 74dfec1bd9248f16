//! InfluxDB sink against a mock HTTP server
//!
//! The sink is blocking (it drives the shared runtime itself), so the mock
//! server lives on a separate runtime and requests are made from plain test
//! threads.

use caseflux_core::ProgressContext;
use caseflux_ingest::sink::FieldValue;
use caseflux_ingest::{Config, InfluxSink, MetricSink, Point, RunOutcome, run};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn start_server(rt: &tokio::runtime::Runtime, status: u16, body: &str) -> MockServer {
    let body = body.to_string();
    rt.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/write"))
            .and(query_param("org", "epi"))
            .and(query_param("bucket", "covid"))
            .and(query_param("precision", "s"))
            .and(header("Authorization", "Token s3cret"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    })
}

fn sink(server: &MockServer) -> InfluxSink {
    InfluxSink::new(server.uri(), "s3cret", "epi", "covid", "cases")
}

fn point(country: &str) -> Point {
    Point {
        tags: vec![
            ("country_region", country.to_string()),
            ("s2_cell_id", String::new()),
        ],
        fields: vec![
            ("confirmed", FieldValue::Integer(100)),
            ("lat", FieldValue::Float(0.0)),
        ],
        timestamp: 1_583_056_800,
    }
}

#[test]
fn writes_line_protocol() {
    let rt = runtime();
    let server = start_server(&rt, 204, "");

    let mut sink = sink(&server);
    sink.write_points(&[point("China"), point("South Korea")])
        .unwrap();

    let requests = rt.block_on(server.received_requests()).unwrap();
    assert_eq!(requests.len(), 1);
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    assert_eq!(
        body,
        "cases,country_region=China confirmed=100i,lat=0 1583056800\n\
         cases,country_region=South\\ Korea confirmed=100i,lat=0 1583056800"
    );
}

#[test]
fn rejected_write_is_an_error() {
    let rt = runtime();
    let server = start_server(&rt, 400, r#"{"code":"invalid","message":"unable to parse"}"#);

    let err = sink(&server).write_points(&[point("China")]).unwrap_err();
    assert!(err.message.starts_with("HTTP 400"), "{err}");
    assert!(err.message.contains("unable to parse"), "{err}");
}

#[test]
fn empty_batch_sends_nothing() {
    let rt = runtime();
    let server = start_server(&rt, 204, "");
    sink(&server).write_points(&[]).unwrap();
    let requests = rt.block_on(server.received_requests()).unwrap();
    assert!(requests.is_empty());
}

#[test]
fn pipeline_one_request_per_batch() {
    let rt = runtime();
    let server = start_server(&rt, 204, "");

    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data");
    std::fs::create_dir(&data).unwrap();
    let mut text = String::from("Province/State,Country/Region,Last Update,Confirmed,Deaths,Recovered\n");
    for i in 0..750 {
        text.push_str(&format!("P{i},Italy,2020-03-01T10:00:00,{i},0,0\n"));
    }
    std::fs::write(data.join("03-01-2020.csv"), text).unwrap();

    let config = Config {
        data_dir: data,
        checkpoint_path: tmp.path().join(".last"),
        ..Default::default()
    };
    let outcome = run(&config, sink(&server), None, &ProgressContext::hidden()).unwrap();
    match outcome {
        RunOutcome::Completed { summary, checkpoint } => {
            assert_eq!(summary.stats.batches, 2);
            assert!(checkpoint.is_some());
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let requests = rt.block_on(server.received_requests()).unwrap();
    let lines: Vec<usize> = requests
        .iter()
        .map(|r| String::from_utf8_lossy(&r.body).lines().count())
        .collect();
    assert_eq!(lines, [500, 250]);
}
