// End-to-end: proxy in front of the demo tool server spawned over stdio

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use toolguard_core::{GuardPayload, GuardRequest, PolicyError, PolicyEvaluator, Role, Verdict};
use toolguard_mcp::peer::Peer;
use toolguard_mcp::protocol::{from_raw, methods, to_raw, JsonRpcError};
use toolguard_mcp::{GuardConfig, McpError, Proxy, SpawnSpec, StdioDownstream, ToolGateway};

/// Blocks anything mentioning "DROP TABLE", redacts "secret" in tool output
struct KeywordPolicy;

#[async_trait::async_trait]
impl PolicyEvaluator for KeywordPolicy {
    async fn evaluate(&self, request: &GuardRequest) -> Result<Verdict, PolicyError> {
        let (role, content) = match &request.payload {
            GuardPayload::Messages(messages) => (messages[0].role, messages[0].content.clone()),
            GuardPayload::Tools(_) => return Ok(Verdict::allow()),
        };
        if content.contains("DROP TABLE") {
            let mut diagnostics = serde_json::Map::new();
            diagnostics.insert("detector".to_string(), json!("sql_injection"));
            return Ok(Verdict::block(diagnostics));
        }
        if role == Role::Tool && content.contains("secret") {
            return Ok(Verdict::transform(content.replace("secret", "[redacted]")));
        }
        Ok(Verdict::allow())
    }
}

async fn request(client: &Peer, method: &str, params: Option<Value>) -> Result<Value, McpError> {
    let params = params.map(|p| to_raw(&p).unwrap());
    let result = client.request(method, params).await?;
    Ok(from_raw(&result).unwrap())
}

async fn call(client: &Peer, name: &str, arguments: Value) -> Value {
    request(client, methods::TOOLS_CALL, Some(json!({"name": name, "arguments": arguments})))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_guarded_demo_server_over_stdio() {
    let spec = SpawnSpec::new(env!("CARGO_BIN_EXE_toolguard-demo-tools"), vec![]);
    let (downstream, notifications) = StdioDownstream::spawn(&spec, Duration::from_secs(10))
        .await
        .unwrap();
    let downstream = Arc::new(downstream);

    let gateway = ToolGateway::new(downstream.clone(), Arc::new(KeywordPolicy), GuardConfig::default());
    let proxy = Arc::new(Proxy::new(downstream.clone(), Some(gateway)).unwrap());

    let (client_side, proxy_side) = tokio::io::duplex(64 * 1024);
    let (proxy_read, proxy_write) = tokio::io::split(proxy_side);
    let session = tokio::spawn(proxy.serve(
        proxy_read,
        proxy_write,
        notifications,
        futures::future::pending(),
    ));

    let (client_read, client_write) = tokio::io::split(client_side);
    let (client, _inbound) = Peer::spawn("agent", client_read, client_write);

    let init = request(
        &client,
        methods::INITIALIZE,
        Some(json!({
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": {"name": "agent", "version": "1.0"}
        })),
    )
    .await
    .unwrap();
    assert_eq!(init["serverInfo"]["name"], json!("Toolguard Demo Tools"));
    assert_eq!(init["capabilities"], json!({"tools": {}}));

    let list = request(&client, methods::TOOLS_LIST, None).await.unwrap();
    assert_eq!(list["tools"].as_array().unwrap().len(), 3);

    // Allowed both ways
    let plain = call(&client, "echo", json!({"message": "42"})).await;
    assert_eq!(plain, json!({"content": [{"type": "text", "text": "42"}]}));

    // Output rewritten
    let redacted = call(&client, "echo", json!({"message": "the secret is 7"})).await;
    assert_eq!(redacted["content"][0]["text"], json!("the [redacted] is 7"));

    // Structured output and its text mirror rewritten together
    let structured = call(&client, "echo", json!({"message": "secret", "structured": true})).await;
    assert_eq!(structured["structuredContent"], json!({"message": "[redacted]"}));
    let mirror: Value = serde_json::from_str(structured["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(mirror, json!({"message": "[redacted]"}));

    // Input blocked before reaching the server
    let blocked = call(&client, "echo", json!({"message": "1; DROP TABLE users"})).await;
    assert_eq!(blocked["isError"], json!(true));
    let body: Value = serde_json::from_str(blocked["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(body["blocked"], json!(true));
    assert_eq!(body["policy"], json!({"detector": "sql_injection"}));

    // Non-tool categories are not registered for this server
    let err = request(&client, methods::RESOURCES_LIST, None).await.unwrap_err();
    assert!(matches!(err, McpError::Remote(e) if e.code == JsonRpcError::METHOD_NOT_FOUND));

    // Child exit ends the session
    downstream.close().await;
    let outcome = tokio::time::timeout(Duration::from_secs(5), session)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(outcome, Err(McpError::ConnectionClosed)));
}
