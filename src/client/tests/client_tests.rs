use std::sync::{ Arc, Mutex };
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::time::Duration;

use http::HeaderMap;
use serde_json::json;
use tokio::time::Instant;

use crate::client::ProtocolClient;
use crate::client::config::SESSION_HEADER;
use crate::errors::Error;
use crate::protocol::ProviderId;

use super::support::{
    MockCall,
    MockReply,
    MockTransport,
    init_frame,
    sse_ok,
    sse_ok_with_session,
    test_config,
    text_response,
    tool_frame,
    tools_list_frame,
};

/// Handler answering every method successfully with a fixed session token
fn happy_handler(token: &'static str) -> impl Fn(MockCall) -> MockReply + Send + Sync {
    move |call| {
        let response = match call.method.as_str() {
            "initialize" => sse_ok_with_session(&init_frame(None), token),
            "notifications/initialized" => text_response(202, ""),
            "tools/call" => sse_ok(&tool_frame(&call.body["id"], r#"{"hexagram":"qian"}"#)),
            "tools/list" => sse_ok(&tools_list_frame(&call.body["id"], json!([]))),
            other => panic!("unexpected method {other}"),
        };
        MockReply::Respond(response)
    }
}

#[tokio::test]
async fn concurrent_calls_initialize_once() {
    super::support::init_tracing();
    let client = Arc::new(
        ProtocolClient::with_transport(
            test_config(ProviderId::Yijing),
            MockTransport::new(happy_handler("sess-1"))
        )
    );

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = Arc::clone(&client);
        handles.push(
            tokio::spawn(async move {
                client.call_tool("yijing_divination", Some(json!({ "question": "?" }))).await
            })
        );
    }
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert!(result.success);
        assert_eq!(result.data, Some(json!({ "hexagram": "qian" })));
    }

    assert_eq!(client.transport.count("initialize"), 1);
    assert_eq!(client.transport.count("tools/call"), 8);
    assert_eq!(client.session().token().as_deref(), Some("sess-1"));
}

#[tokio::test]
async fn handshake_body_carries_protocol_version_and_client_name() {
    let init_body: Arc<Mutex<Option<serde_json::Value>>> = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&init_body);

    let client = ProtocolClient::with_transport(
        test_config(ProviderId::Star),
        MockTransport::new(move |call| {
            if call.method == "initialize" {
                *seen.lock().unwrap() = Some(call.body.clone());
            }
            happy_handler("sess-star")(call)
        })
    );

    client.list_tools().await.unwrap();

    let body = init_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["id"], json!(1));
    assert_eq!(body["params"]["protocolVersion"], json!("2025-03-26"));
    assert_eq!(body["params"]["clientInfo"]["name"], json!("StarClient"));
}

#[tokio::test]
async fn request_ids_are_monotonic_and_skip_the_handshake_id() {
    let ids: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&ids);

    let client = ProtocolClient::with_transport(
        test_config(ProviderId::Bazi),
        MockTransport::new(move |call| {
            if call.method == "tools/call" {
                seen.lock().unwrap().push(call.body["id"].as_i64().unwrap());
            }
            happy_handler("sess-bazi")(call)
        })
    );

    for _ in 0..3 {
        client.call_tool("bazi_chart", None).await.unwrap();
    }

    let ids = ids.lock().unwrap().clone();
    assert_eq!(ids, vec![2, 3, 4]);
}

#[tokio::test]
async fn tool_calls_carry_the_session_token() {
    let headers: Arc<Mutex<Option<HeaderMap>>> = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&headers);

    let client = ProtocolClient::with_transport(
        test_config(ProviderId::Ziwei),
        MockTransport::new(move |call| {
            if call.method == "tools/call" {
                *seen.lock().unwrap() = Some(call.headers.clone());
            }
            happy_handler("sess-ziwei")(call)
        })
    );

    client.call_tool("ziwei_chart", None).await.unwrap();

    let headers = headers.lock().unwrap().clone().unwrap();
    assert_eq!(headers.get(SESSION_HEADER).unwrap(), "sess-ziwei");
    assert_eq!(headers.get("x-api-key").unwrap(), "test-key-0000");
}

#[tokio::test(start_paused = true)]
async fn expired_session_is_dropped_and_reinitialized() {
    let tool_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&tool_calls);

    let client = ProtocolClient::with_transport(
        test_config(ProviderId::Yijing),
        MockTransport::new(move |call| {
            if call.method == "tools/call" && counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return MockReply::Respond(
                    text_response(400, r#"{"error":"SessionExpired: session not found"}"#)
                );
            }
            happy_handler("sess-2")(call)
        })
    );

    let result = client.call_tool("yijing_divination", None).await.unwrap();
    assert!(result.success);

    assert_eq!(client.transport.count("initialize"), 2);
    assert_eq!(client.transport.count("tools/call"), 2);
}

#[tokio::test(start_paused = true)]
async fn transient_server_errors_are_retried_with_fixed_delay() {
    let tool_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&tool_calls);

    let client = ProtocolClient::with_transport(
        test_config(ProviderId::Star),
        MockTransport::new(move |call| {
            if call.method == "tools/call" && counter.fetch_add(1, Ordering::SeqCst) < 2 {
                return MockReply::Respond(text_response(503, "service unavailable"));
            }
            happy_handler("sess-3")(call)
        })
    );

    let started = Instant::now();
    let result = client.call_tool("zodiac_info", None).await.unwrap();

    assert!(result.success);
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(client.transport.count("tools/call"), 3);
}

#[tokio::test(start_paused = true)]
async fn persistent_server_errors_exhaust_the_retry_budget() {
    let client = ProtocolClient::with_transport(
        test_config(ProviderId::Star),
        MockTransport::new(|call| {
            if call.method == "tools/call" {
                return MockReply::Respond(text_response(503, "service unavailable"));
            }
            happy_handler("sess-4")(call)
        })
    );

    let err = client.call_tool("zodiac_info", None).await.unwrap_err();
    match err {
        Error::RetryExhausted { attempts, cause, .. } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*cause, Error::Transport { status: Some(503), .. }));
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
    assert_eq!(client.transport.count("tools/call"), 3);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let client = ProtocolClient::with_transport(
        test_config(ProviderId::Bazi),
        MockTransport::new(|call| {
            if call.method == "tools/call" {
                return MockReply::Respond(text_response(404, "no such tool"));
            }
            happy_handler("sess-5")(call)
        })
    );

    let err = client.call_tool("missing_tool", None).await.unwrap_err();
    assert!(matches!(err, Error::Transport { status: Some(404), .. }));
    assert_eq!(client.transport.count("tools/call"), 1);
}

#[tokio::test]
async fn application_errors_surface_as_failed_results() {
    let client = ProtocolClient::with_transport(
        test_config(ProviderId::Tarot),
        MockTransport::new(|call| {
            let response = match call.method.as_str() {
                "initialize" => sse_ok_with_session(&init_frame(None), "sess-6"),
                "notifications/initialized" => text_response(202, ""),
                "tools/call" =>
                    sse_ok(
                        &json!({
                        "jsonrpc": "2.0",
                        "id": call.body["id"],
                        "result": {
                            "content": [{ "type": "text", "text": "unknown spread" }],
                            "isError": true
                        }
                    })
                    ),
                other => panic!("unexpected method {other}"),
            };
            MockReply::Respond(response)
        })
    );

    let result = client.call_tool("tarot_reading", None).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.error_message.as_deref(), Some("unknown spread"));
    assert!(result.data.is_none());
}

#[tokio::test]
async fn list_tools_decodes_typed_tool_info() {
    let tools = json!([
        {
            "name": "bazi_chart",
            "description": "Compute a four-pillar chart",
            "inputSchema": { "type": "object", "properties": { "birth_time": { "type": "string" } } }
        },
        { "name": "bazi_luck" }
    ]);

    let client = ProtocolClient::with_transport(
        test_config(ProviderId::Bazi),
        MockTransport::new(move |call| {
            let response = match call.method.as_str() {
                "initialize" => sse_ok_with_session(&init_frame(None), "sess-7"),
                "notifications/initialized" => text_response(202, ""),
                "tools/list" => sse_ok(&tools_list_frame(&call.body["id"], tools.clone())),
                other => panic!("unexpected method {other}"),
            };
            MockReply::Respond(response)
        })
    );

    let listed = client.list_tools().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].name, "bazi_chart");
    assert!(listed[0].input_schema.is_some());
    assert_eq!(listed[1].name, "bazi_luck");
    assert!(listed[1].description.is_none());
}

#[tokio::test]
async fn session_token_falls_back_to_the_response_body() {
    let client = ProtocolClient::with_transport(
        test_config(ProviderId::Yijing),
        MockTransport::new(|call| {
            let response = match call.method.as_str() {
                "initialize" => sse_ok(&init_frame(Some("body-token-9"))),
                "notifications/initialized" => text_response(202, ""),
                "tools/list" => sse_ok(&tools_list_frame(&call.body["id"], json!([]))),
                other => panic!("unexpected method {other}"),
            };
            MockReply::Respond(response)
        })
    );

    client.list_tools().await.unwrap();
    assert_eq!(client.session().token().as_deref(), Some("body-token-9"));
}

#[tokio::test]
async fn missing_session_token_is_synthesized_locally() {
    let client = ProtocolClient::with_transport(
        test_config(ProviderId::Star),
        MockTransport::new(|call| {
            let response = match call.method.as_str() {
                "initialize" => sse_ok(&init_frame(None)),
                "notifications/initialized" => text_response(202, ""),
                "tools/list" => sse_ok(&tools_list_frame(&call.body["id"], json!([]))),
                other => panic!("unexpected method {other}"),
            };
            MockReply::Respond(response)
        })
    );

    client.list_tools().await.unwrap();
    let token = client.session().token().unwrap();
    assert!(token.starts_with("local-divination-mcp-server-2-3-1-"));
}
