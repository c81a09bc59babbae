use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stratus::signing::signature_of;
use stratus::transport::{ReqwestTransport, Transport};
use stratus::{ClientConfig, ClientError, CloudStack, ParameterSet};

const API_PATH: &str = "/client/api";

fn client(server: &MockServer) -> CloudStack {
    let config = ClientConfig::new(format!("{}{}", server.uri(), API_PATH), "key", "secret")
        .with_poll_interval(Duration::ZERO);
    CloudStack::connect(config).unwrap()
}

#[tokio::test]
async fn sends_signed_get_and_unwraps_envelope() {
    let server = MockServer::start().await;

    let mut expected = ParameterSet::new();
    for (k, v) in [
        ("apikey", "key"),
        ("command", "listZones"),
        ("name", "zone one/a+b"),
        ("page", "1"),
        ("pagesize", "500"),
        ("response", "json"),
    ] {
        expected.insert(k.to_string(), v.to_string());
    }
    let signature = signature_of(&expected, b"secret");

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("command", "listZones"))
        .and(query_param("name", "zone one/a+b"))
        .and(query_param("signature", signature.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "listzonesresponse": {"count": 1, "zone": [{"id": "z1", "name": "zone one/a+b"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut params = ParameterSet::new();
    params.insert("name".to_string(), "zone one/a+b".to_string());
    let payload = client(&server).execute("listZones", params).await.unwrap();

    assert_eq!(
        payload,
        json!({"count": 1, "zone": [{"id": "z1", "name": "zone one/a+b"}]})
    );
}

#[tokio::test]
async fn follows_async_job_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("command", "deployVirtualMachine"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deployvirtualmachineresponse": {"id": "vm-1", "jobid": "job-1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("command", "queryAsyncJobResult"))
        .and(query_param("jobid", "job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "queryasyncjobresultresponse": {
                "jobid": "job-1", "jobstatus": 1, "jobresultcode": 0,
                "jobresult": {"virtualmachine": {"id": "vm-1", "state": "Running"}}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let payload = client(&server)
        .execute("deployVirtualMachine", ParameterSet::new())
        .await
        .unwrap();
    assert_eq!(payload["virtualmachine"]["state"], "Running");
}

#[tokio::test]
async fn pages_until_short_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("command", "listVirtualMachines"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "listvirtualmachinesresponse": {"count": 2, "virtualmachine": [{"id": 1}, {"id": 2}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("command", "listVirtualMachines"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "listvirtualmachinesresponse": {"count": 1, "virtualmachine": [{"id": 3}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::new(format!("{}{}", server.uri(), API_PATH), "key", "secret")
        .with_page_size(2);
    let payload = CloudStack::connect(config)
        .unwrap()
        .execute("listVirtualMachines", ParameterSet::new())
        .await
        .unwrap();

    assert_eq!(
        payload,
        json!({"count": 3, "virtualmachine": [{"id": 1}, {"id": 2}, {"id": 3}]})
    );
}

#[tokio::test]
async fn plain_text_body_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("This is not a json response!"))
        .mount(&server)
        .await;

    let err = client(&server)
        .execute("nojson", ParameterSet::new())
        .await
        .unwrap_err();
    match err {
        ClientError::Decode(e) => assert_eq!(e.raw, "This is not a json response!"),
        other => panic!("expected Decode, got {other:?}"),
    }
}

#[tokio::test]
async fn error_status_with_json_body_is_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errorresponse": {"errorcode": 401, "errortext": "unable to verify user credentials"}
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .execute("listZones", ParameterSet::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Api {
            status: 401,
            code: Some(401),
            ..
        }
    ));
}

#[tokio::test]
async fn synchronous_commands_are_not_paged() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("command", "startVirtualMachine"))
        .and(query_param_is_missing("page"))
        .and(query_param_is_missing("pagesize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "startvirtualmachineresponse": {"success": true}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let payload = client(&server)
        .execute("startVirtualMachine", ParameterSet::new())
        .await
        .unwrap();
    assert_eq!(payload, json!({"success": true}));
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    // Nothing listens on port 9 (discard) in the test environment.
    let config = ClientConfig::new("http://127.0.0.1:9/client/api", "key", "secret");
    let err = CloudStack::connect(config)
        .unwrap()
        .execute("listZones", ParameterSet::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}

#[tokio::test]
async fn closed_transport_rejects_requests() {
    let server = MockServer::start().await;
    let transport = Arc::new(ReqwestTransport::new().unwrap());
    let config = ClientConfig::new(format!("{}{}", server.uri(), API_PATH), "key", "secret");
    let cs = CloudStack::new(config.clone(), transport.clone());

    cs.close().await;
    assert!(transport.is_closed().await);

    let err = CloudStack::new(config, transport.clone())
        .execute("listZones", ParameterSet::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Closed));

    // Closing twice is harmless.
    transport.close().await;
}
