#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use piata_config::default_servers;
    use piata_core::{ServerKind, ToolCall};
    use piata_orchestrator::{ExecutionMode, ToolExecutor, ToolServerRegistry};
    use serde_json::{Map, Value, json};
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registry_at(uri: &str) -> Arc<ToolServerRegistry> {
        let servers = default_servers()
            .into_iter()
            .map(|mut s| {
                s.base_url = format!("{uri}/");
                s
            })
            .collect();
        Arc::new(ToolServerRegistry::new(servers).unwrap())
    }

    fn call(server: &str, tool: &str, args: Value) -> ToolCall {
        let args: Map<String, Value> = args.as_object().cloned().unwrap_or_default();
        ToolCall::new(ServerKind::new(server), tool, args)
    }

    async fn mount_tool(server: &MockServer, tool: &str, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/call"))
            .and(body_partial_json(json!({ "method": "tools/call", "params": { "name": tool } })))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_posts_mcp_envelope_and_unwraps_result() {
        let server = MockServer::start().await;
        let c = call("database", "search_listings", json!({"query": "bmw"}));
        Mock::given(method("POST"))
            .and(path("/call"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(json!({
                "method": "tools/call",
                "params": { "name": "search_listings", "arguments": { "query": "bmw" } },
                "id": c.correlation_id(),
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"count": 4}})))
            .expect(1)
            .mount(&server)
            .await;

        let executor = ToolExecutor::new(registry_at(&server.uri()), Duration::from_secs(5));
        let results = executor.execute(&[c]).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].tool_ref, "database.search_listings");
        assert_eq!(results[0].payload(), Some(&json!({"count": 4})));
    }

    #[tokio::test]
    async fn test_json_without_result_is_kept_whole() {
        let server = MockServer::start().await;
        mount_tool(
            &server,
            "get_platform_stats",
            ResponseTemplate::new(200).set_body_json(json!({"users": 10, "listings": 99})),
        )
        .await;

        let executor = ToolExecutor::new(registry_at(&server.uri()), Duration::from_secs(5));
        let results = executor
            .execute(&[call("database", "get_platform_stats", json!({}))])
            .await;
        assert_eq!(results[0].payload(), Some(&json!({"users": 10, "listings": 99})));
    }

    #[tokio::test]
    async fn test_non_json_body_becomes_string_payload() {
        let server = MockServer::start().await;
        mount_tool(
            &server,
            "check_inventory",
            ResponseTemplate::new(200).set_body_string("42 units in stock"),
        )
        .await;

        let executor = ToolExecutor::new(registry_at(&server.uri()), Duration::from_secs(5));
        let results = executor
            .execute(&[call("stock", "check_inventory", json!({"sku": "T-1"}))])
            .await;
        assert!(results[0].is_success());
        assert_eq!(results[0].payload(), Some(&json!("42 units in stock")));
    }

    #[tokio::test]
    async fn test_http_error_is_failure_with_truncated_body() {
        let server = MockServer::start().await;
        mount_tool(
            &server,
            "execute_query",
            ResponseTemplate::new(500).set_body_string("E".repeat(500)),
        )
        .await;

        let executor = ToolExecutor::new(registry_at(&server.uri()), Duration::from_secs(5));
        let results = executor
            .execute(&[call("database", "execute_query", json!({"sql": "select 1"}))])
            .await;
        let error = results[0].error().unwrap();
        assert_eq!(error, format!("Server returned 500: {}", "E".repeat(200)));
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let server = MockServer::start().await;
        mount_tool(
            &server,
            "forecast_demand",
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": "late"}))
                .set_delay(Duration::from_secs(3)),
        )
        .await;

        let executor = ToolExecutor::new(registry_at(&server.uri()), Duration::from_millis(200));
        let results = executor
            .execute(&[call("stock", "forecast_demand", json!({}))])
            .await;
        assert_eq!(results[0].error(), Some("Request timeout"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_request_failed() {
        let registry = registry_at("http://127.0.0.1:1");
        let executor = ToolExecutor::new(registry, Duration::from_secs(5));
        let results = executor
            .execute(&[call("database", "search_listings", json!({"query": "x"}))])
            .await;
        assert!(results[0].error().unwrap().starts_with("Request failed"));
    }

    #[tokio::test]
    async fn test_unregistered_server_is_unexpected_error() {
        let executor = ToolExecutor::new(registry_at("http://127.0.0.1:1"), Duration::from_secs(1));
        let results = executor
            .execute(&[call("crm", "list_leads", json!({}))])
            .await;
        assert!(results[0].error().unwrap().starts_with("Unexpected error"));
        assert_eq!(results[0].tool_ref, "crm.list_leads");
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_later_calls() {
        let server = MockServer::start().await;
        mount_tool(&server, "get_user_stats", ResponseTemplate::new(404).set_body_string("nope")).await;
        mount_tool(
            &server,
            "get_platform_stats",
            ResponseTemplate::new(200).set_body_json(json!({"result": 1})),
        )
        .await;

        let executor = ToolExecutor::new(registry_at(&server.uri()), Duration::from_secs(5));
        let results = executor
            .execute(&[
                call("database", "get_user_stats", json!({})),
                call("database", "get_platform_stats", json!({})),
            ])
            .await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].is_success());
        assert!(results[1].is_success());
    }

    #[tokio::test]
    async fn test_parallel_mode_preserves_call_order() {
        let server = MockServer::start().await;
        mount_tool(
            &server,
            "forecast_demand",
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": "slow"}))
                .set_delay(Duration::from_millis(300)),
        )
        .await;
        mount_tool(
            &server,
            "check_inventory",
            ResponseTemplate::new(200).set_body_json(json!({"result": "fast"})),
        )
        .await;

        let executor = ToolExecutor::new(registry_at(&server.uri()), Duration::from_secs(5))
            .with_mode(ExecutionMode::Parallel);
        let results = executor
            .execute(&[
                call("stock", "forecast_demand", json!({})),
                call("stock", "check_inventory", json!({})),
            ])
            .await;
        assert_eq!(results[0].tool_ref, "stock.forecast_demand");
        assert_eq!(results[0].payload(), Some(&json!("slow")));
        assert_eq!(results[1].payload(), Some(&json!("fast")));
    }

    #[tokio::test]
    async fn test_cancellation_abandons_execution() {
        let server = MockServer::start().await;
        mount_tool(
            &server,
            "analyze_suppliers",
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": "never"}))
                .set_delay(Duration::from_secs(5)),
        )
        .await;

        let executor = ToolExecutor::new(registry_at(&server.uri()), Duration::from_secs(30));
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = executor
            .execute_cancellable(&[call("stock", "analyze_suppliers", json!({}))], &token)
            .await;
        assert!(matches!(result, Err(piata_core::PiataError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_empty_plan_yields_no_results() {
        let executor = ToolExecutor::new(registry_at("http://127.0.0.1:1"), Duration::from_secs(1));
        assert!(executor.execute(&[]).await.is_empty());
    }
}
