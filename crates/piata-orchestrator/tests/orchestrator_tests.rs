#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use piata_config::default_servers;
    use piata_core::response::DEGRADED_REPLY;
    use piata_core::{IntentType, Message, PiataError, Result, ServerKind};
    use piata_llm::mock::MockProvider;
    use piata_llm::{GatewaySettings, LlmGateway, LlmProvider, LlmRequest, LlmResponse};
    use piata_orchestrator::{Orchestrator, PipelineOptions, ToolServerRegistry};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const APOLOGY_PREFIX: &str = "I'm sorry, I couldn't generate a complete answer right now (";

    fn settings() -> GatewaySettings {
        GatewaySettings {
            model: "test-model".into(),
            temperature: 0.1,
            max_tokens: 512,
            max_retries: 0,
            base_delay_ms: 1,
        }
    }

    /// Default catalogue with every server pointed at `uri`.
    fn registry_at(uri: &str) -> ToolServerRegistry {
        let servers = default_servers()
            .into_iter()
            .map(|mut s| {
                s.base_url = uri.to_string();
                s
            })
            .collect();
        ToolServerRegistry::new(servers).unwrap()
    }

    fn orchestrator(provider: MockProvider, registry: ToolServerRegistry) -> (Orchestrator, Arc<MockProvider>) {
        let provider = Arc::new(provider);
        let gateway = LlmGateway::new(provider.clone(), settings());
        let options = PipelineOptions {
            tool_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        (Orchestrator::new(registry, gateway, options), provider)
    }

    async fn mount_tool(server: &MockServer, tool: &str, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/call"))
            .and(body_partial_json(json!({ "params": { "name": tool } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    /// Text of the last user turn sent to the model in request `index`.
    fn prompt_text(provider: &MockProvider, index: usize) -> String {
        let recorded = provider.recorded_requests();
        let recorded = recorded.lock();
        recorded[index]
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    struct PanickingProvider;

    #[async_trait]
    impl LlmProvider for PanickingProvider {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse> {
            panic!("provider exploded");
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    // ── Scenario 1: database search ────────────────────────────

    #[tokio::test]
    async fn test_database_search() {
        let server = MockServer::start().await;
        mount_tool(
            &server,
            "search_listings",
            json!({"result": {"listings": [
                {"title": "iPhone 13 128GB", "price": 3200},
                {"title": "iPhone 14", "price": 3900}
            ]}}),
        )
        .await;

        let provider = MockProvider::new("mock")
            .with_json(json!({
                "intent_type": "database",
                "confidence": 0.92,
                "required_tools": ["search_listings"],
                "server_needed": "database",
                "reasoning": "The user wants to browse listings"
            }))
            .with_json(json!({
                "calls": [{
                    "server": "database",
                    "tool": "search_listings",
                    "params": {"query": "iPhone", "max_price": 4000},
                    "expected_result": "Matching listings"
                }]
            }))
            .with_response("I found 2 iPhone listings under 4000 lei: iPhone 13 for 3200 and iPhone 14 for 3900.");
        let (orch, provider) = orchestrator(provider, registry_at(&server.uri()));

        let resp = orch
            .process_request("show me iPhone listings under 4000", &[])
            .await;

        let intent = resp.intent.as_ref().unwrap();
        assert_eq!(intent.intent_type, IntentType::Database);
        assert_eq!(intent.server_needed, Some(ServerKind::new("database")));
        assert!(intent.confidence >= 0.6);
        assert_eq!(resp.tools_used, vec!["database.search_listings"]);
        assert_eq!(resp.tool_results.len(), 1);
        assert!(resp.reply_text.contains("iPhone"));
        assert!(resp.reply_text.contains("4000"));
        assert_eq!(resp.reasoning, "Analyzed as database with 0.92");

        let synthesis_prompt = prompt_text(&provider, 2);
        assert!(synthesis_prompt.contains("✅ database.search_listings:"));
        assert!(synthesis_prompt.contains("iPhone 13 128GB"));
    }

    // ── Scenario 2: advertising optimisation ───────────────────

    #[tokio::test]
    async fn test_advertising_title_optimisation() {
        let server = MockServer::start().await;
        mount_tool(
            &server,
            "optimize_listing_title",
            json!({"result": {"title": "BMW Seria 3 320d 2019, full service history"}}),
        )
        .await;

        let provider = MockProvider::new("mock")
            .with_json(json!({
                "intent_type": "advertising",
                "confidence": 0.88,
                "server_needed": "advertising",
                "reasoning": "Title optimisation request"
            }))
            .with_json(json!({
                "calls": [{
                    "server": "advertising",
                    "tool": "optimize_listing_title",
                    "params": {"title": "BMW for sale"}
                }]
            }))
            .with_response("Try this title: \"BMW Seria 3 320d 2019, full service history\".");
        let (orch, _) = orchestrator(provider, registry_at(&server.uri()));

        let resp = orch
            .process_request("optimize the title for my BMW listing", &[])
            .await;

        let intent = resp.intent.as_ref().unwrap();
        assert_eq!(intent.intent_type, IntentType::Advertising);
        assert_eq!(intent.server_needed, Some(ServerKind::new("advertising")));
        assert_eq!(resp.tools_used, vec!["advertising.optimize_listing_title"]);
        assert!(resp.reply_text.contains("BMW Seria 3"));
    }

    // ── Scenario 3: stock forecast ─────────────────────────────

    #[tokio::test]
    async fn test_stock_forecast() {
        let server = MockServer::start().await;
        mount_tool(
            &server,
            "forecast_demand",
            json!({"result": {"product": "winter tires", "next_30_days": 340, "trend": "rising"}}),
        )
        .await;

        let provider = MockProvider::new("mock")
            .with_json(json!({
                "intent_type": "stock",
                "confidence": 0.9,
                "server_needed": "stock",
                "reasoning": "Demand forecast"
            }))
            .with_json(json!({
                "calls": [{
                    "server": "stock",
                    "tool": "forecast_demand",
                    "params": {"product": "winter tires"}
                }]
            }))
            .with_response("Demand for winter tires is rising: about 340 units over the next 30 days.");
        let (orch, provider) = orchestrator(provider, registry_at(&server.uri()));

        let resp = orch.process_request("forecast demand for winter tires", &[]).await;

        assert_eq!(resp.intent.as_ref().unwrap().intent_type, IntentType::Stock);
        assert_eq!(resp.tools_used, vec!["stock.forecast_demand"]);
        assert!(resp.reply_text.contains("340"));
        assert!(prompt_text(&provider, 2).contains("\"trend\":\"rising\""));
    }

    // ── Scenario 4: tool-server down ───────────────────────────

    #[tokio::test]
    async fn test_tool_server_down() {
        let provider = MockProvider::new("mock")
            .with_json(json!({
                "intent_type": "database",
                "confidence": 0.9,
                "server_needed": "database",
                "reasoning": "Listing search"
            }))
            .with_json(json!({
                "calls": [{
                    "server": "database",
                    "tool": "search_listings",
                    "params": {"query": "iPhone"}
                }]
            }))
            .with_response("Sorry, the listings database is unavailable right now. Please try again later.");
        let (orch, provider) = orchestrator(provider, registry_at("http://127.0.0.1:1"));

        let resp = orch
            .process_request("show me iPhone listings under 4000", &[])
            .await;

        assert_eq!(resp.tool_results.len(), 1);
        assert!(!resp.tool_results[0].is_success());
        assert!(resp.tool_results[0].error().unwrap().starts_with("Request failed"));
        assert!(resp.tools_used.is_empty());
        assert!(resp.reply_text.contains("unavailable"));
        assert!(prompt_text(&provider, 2).contains("❌ database.search_listings: Request failed"));
    }

    // ── Scenario 5: small talk ─────────────────────────────────

    #[tokio::test]
    async fn test_small_talk_runs_no_tools() {
        let provider = MockProvider::new("mock")
            .with_json(json!({
                "intent_type": "general",
                "confidence": 0.95,
                "server_needed": null,
                "reasoning": "Greeting"
            }))
            .with_response("Hello! I can help you search listings, improve your ads or check stock.");
        let (orch, provider) = orchestrator(provider, registry_at("http://127.0.0.1:1"));

        let resp = orch.process_request("hello", &[]).await;

        let intent = resp.intent.as_ref().unwrap();
        assert_eq!(intent.intent_type, IntentType::General);
        assert!(intent.server_needed.is_none());
        assert!(resp.tool_results.is_empty());
        assert!(resp.tools_used.is_empty());
        assert!(resp.reply_text.starts_with("Hello!"));
        // Classify and synthesise only; nothing was planned.
        assert_eq!(provider.recorded_requests().lock().len(), 2);
    }

    // ── Scenario 6: LLM outage ─────────────────────────────────

    #[tokio::test]
    async fn test_llm_outage_falls_back_everywhere() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/call"))
            .and(body_partial_json(json!({
                "params": { "name": "search_listings", "arguments": { "query": "search users" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
            .expect(1)
            .mount(&server)
            .await;

        let provider = MockProvider::unavailable("down", "HTTP 401: service offline");
        let (orch, _) = orchestrator(provider, registry_at(&server.uri()));

        let resp = orch.process_request("search users", &[]).await;

        let intent = resp.intent.as_ref().unwrap();
        assert_eq!(intent.intent_type, IntentType::Database);
        assert_eq!(intent.confidence, 0.7);
        assert!(intent.is_fallback());
        assert_eq!(resp.tool_results.len(), 1);
        assert_eq!(resp.tool_results[0].tool_ref, "database.search_listings");
        assert_eq!(resp.tools_used, vec!["database.search_listings"]);
        assert!(resp.reply_text.starts_with(APOLOGY_PREFIX));
        assert!(resp.reasoning.starts_with("Analyzed as database"));
    }

    // ── Planner validation through the facade ──────────────────

    #[tokio::test]
    async fn test_invalid_plan_entries_use_generic_call() {
        let server = MockServer::start().await;
        mount_tool(&server, "forecast_demand", json!({"result": "ok"})).await;

        let provider = MockProvider::new("mock")
            .with_json(json!({
                "intent_type": "stock",
                "confidence": 0.8,
                "server_needed": "stock",
                "reasoning": "stock question"
            }))
            .with_json(json!({
                "calls": [
                    {"server": "database", "tool": "search_listings", "params": {}},
                    {"server": "stock", "tool": "order_more_tires", "params": {}}
                ]
            }))
            .with_response("Here is what I found.");
        let (orch, _) = orchestrator(provider, registry_at(&server.uri()));

        let resp = orch.process_request("tires please", &[]).await;

        assert_eq!(resp.tool_results.len(), 1);
        assert_eq!(resp.tool_results[0].tool_ref, "stock.forecast_demand");
        assert!(resp
            .tool_results
            .iter()
            .all(|r| r.tool_ref.starts_with("stock.")));
    }

    #[tokio::test]
    async fn test_unknown_server_in_intent_triggers_keyword_fallback() {
        let server = MockServer::start().await;
        mount_tool(&server, "forecast_demand", json!({"result": "ok"})).await;

        let provider = MockProvider::new("mock")
            .with_json(json!({
                "intent_type": "stock",
                "confidence": 0.8,
                "server_needed": "warehouse",
                "reasoning": "stock question"
            }))
            .with_json(json!({"calls": [{"server": "stock", "tool": "forecast_demand", "params": {}}]}))
            .with_response("ok");
        let (orch, _) = orchestrator(provider, registry_at(&server.uri()));

        let resp = orch.process_request("check inventory levels", &[]).await;
        let intent = resp.intent.as_ref().unwrap();
        assert!(intent.is_fallback());
        assert_eq!(intent.server_needed, Some(ServerKind::new("stock")));
    }

    #[tokio::test]
    async fn test_server_without_tools_gets_empty_plan() {
        let mut servers = default_servers();
        for s in &mut servers {
            if s.kind == "stock" {
                s.tools.clear();
            }
        }
        let registry = ToolServerRegistry::new(servers).unwrap();

        let provider = MockProvider::new("mock")
            .with_json(json!({
                "intent_type": "stock",
                "confidence": 0.8,
                "server_needed": "stock",
                "reasoning": "stock question"
            }))
            .with_response("I can't check stock right now.");
        let (orch, _) = orchestrator(provider, registry);

        let resp = orch.process_request("forecast demand", &[]).await;
        assert!(resp.tool_results.is_empty());
        assert_eq!(resp.reply_text, "I can't check stock right now.");
    }

    // ── History, degradation and cancellation ──────────────────

    #[tokio::test]
    async fn test_history_reaches_the_synthesiser() {
        let provider = MockProvider::new("mock")
            .with_json(json!({"intent_type": "general", "confidence": 0.9, "reasoning": "follow-up"}))
            .with_response("You asked about BMWs earlier.");
        let (orch, provider) = orchestrator(provider, registry_at("http://127.0.0.1:1"));

        let history = vec![
            Message::user("do you have BMWs?"),
            Message::assistant("Yes, 12 listings.", vec!["database.search_listings".into()]),
        ];
        orch.process_request("what did I ask?", &history).await;

        let recorded = provider.recorded_requests();
        let recorded = recorded.lock();
        // Classification does not see history; synthesis does.
        assert_eq!(recorded[0].messages.len(), 1);
        assert_eq!(recorded[1].messages.len(), 3);
        assert_eq!(recorded[1].messages[0].content, "do you have BMWs?");
    }

    #[tokio::test]
    async fn test_panic_yields_degraded_response() {
        let gateway = LlmGateway::new(Arc::new(PanickingProvider), settings());
        let orch = Orchestrator::new(
            ToolServerRegistry::defaults(),
            gateway,
            PipelineOptions::default(),
        );

        let resp = orch.process_request("search users", &[]).await;

        assert_eq!(resp.reply_text, DEGRADED_REPLY);
        assert!(resp.intent.is_none());
        assert!(resp.tool_results.is_empty());
        assert!(resp.tools_used.is_empty());
        assert_eq!(resp.reasoning, "Error occurred: provider exploded");
    }

    #[tokio::test]
    async fn test_empty_utterance_is_degraded() {
        let (orch, provider) = orchestrator(MockProvider::new("mock"), ToolServerRegistry::defaults());
        let resp = orch.process_request("   ", &[]).await;
        assert!(resp.intent.is_none());
        assert!(resp.reasoning.contains("utterance is empty"));
        assert!(provider.recorded_requests().lock().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_stops_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/call"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"result": "late"}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let provider = MockProvider::new("mock")
            .with_json(json!({
                "intent_type": "database",
                "confidence": 0.9,
                "server_needed": "database",
                "reasoning": "search"
            }))
            .with_json(json!({"calls": [{"server": "database", "tool": "search_listings", "params": {}}]}));
        let (orch, _) = orchestrator(provider, registry_at(&server.uri()));

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let result = orch
            .process_request_cancellable("search listings", &[], &token)
            .await;
        assert!(matches!(result, Err(PiataError::Cancelled)));
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_orchestrator() {
        let provider = MockProvider::unavailable("down", "HTTP 401: offline");
        let (orch, _) = orchestrator(provider, registry_at("http://127.0.0.1:1"));

        let a = tokio::spawn({
            let orch = orch.clone();
            async move { orch.process_request("hello", &[]).await }
        });
        let b = tokio::spawn({
            let orch = orch.clone();
            async move { orch.process_request("check inventory", &[]).await }
        });

        let a = a.await.unwrap();
        let b = b.await.unwrap();
        assert_eq!(a.intent.unwrap().intent_type, IntentType::General);
        assert!(a.tool_results.is_empty());
        assert_eq!(b.intent.unwrap().intent_type, IntentType::Stock);
        assert_eq!(b.tool_results.len(), 1);
    }
}
