use bracketbot::api::BinanceClient;
use bracketbot::config::{BinanceConfig, Thresholds, TradingConfig};
use bracketbot::execution::OrderOrchestrator;
use bracketbot::BotError;
use mockito::{Matcher, Server};
use rust_decimal_macros::dec;

const EXCHANGE_INFO: &str = r#"{
    "symbols": [{
        "symbol": "BNBUSDT",
        "filters": [
            {"filterType": "PRICE_FILTER", "minPrice": "0.01000000", "maxPrice": "100000.00000000", "tickSize": "0.01000000"},
            {"filterType": "LOT_SIZE", "minQty": "0.00100000", "maxQty": "900000.00000000", "stepSize": "0.00100000"},
            {"filterType": "NOTIONAL", "minNotional": "5.00000000", "applyMinToMarket": true}
        ]
    }]
}"#;

fn orchestrator(server: &Server) -> OrderOrchestrator<BinanceClient> {
    let client = BinanceClient::new(&BinanceConfig {
        api_key: "e2e-key".to_string(),
        api_secret: "e2e-secret".to_string(),
        base_url: server.url(),
        recv_window_ms: 5000,
        request_timeout_ms: 2000,
        requests_per_minute: 6000,
    })
    .unwrap();

    OrderOrchestrator::new(
        client,
        TradingConfig {
            default_symbol: "BNB".to_string(),
            quote_asset: "USDT".to_string(),
            thresholds: Thresholds {
                price_update_trigger: dec!(0.5),
                take_profit_percentage: dec!(50),
                stop_loss_percentage: dec!(0.5),
            },
        },
    )
}

#[tokio::test]
async fn test_oco_bracket_end_to_end() {
    let _ = tracing_subscriber::fmt::try_init();
    let mut server = Server::new_async().await;

    let account = server
        .mock("GET", "/api/v3/account")
        .match_header("X-MBX-APIKEY", "e2e-key")
        .match_query(Matcher::Regex("signature=[0-9a-f]{64}".to_string()))
        .with_status(200)
        .with_body(r#"{"balances": [{"asset": "BNB", "free": "1.23456780", "locked": "0.00000000"}]}"#)
        .expect(1)
        .create_async()
        .await;

    let exchange_info = server
        .mock("GET", "/api/v3/exchangeInfo")
        .match_query(Matcher::UrlEncoded("symbol".into(), "BNBUSDT".into()))
        .with_status(200)
        .with_body(EXCHANGE_INFO)
        .expect(1)
        .create_async()
        .await;

    let oco = server
        .mock("POST", "/api/v3/orderList/oco")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbol".into(), "BNBUSDT".into()),
            Matcher::UrlEncoded("side".into(), "SELL".into()),
            Matcher::UrlEncoded("quantity".into(), "1.234".into()),
            Matcher::UrlEncoded("aboveType".into(), "TAKE_PROFIT".into()),
            Matcher::UrlEncoded("aboveStopPrice".into(), "918.51000000".into()),
            Matcher::UrlEncoded("belowType".into(), "STOP_LOSS".into()),
            Matcher::UrlEncoded("belowStopPrice".into(), "609.27000000".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"orderListId": 1, "contingencyType": "OCO", "listStatusType": "EXEC_STARTED",
                "listOrderStatus": "EXECUTING", "listClientOrderId": "lH1YDkuQKWiXVXHPSKYEIp", "symbol": "BNBUSDT"}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let orch = orchestrator(&server);
    let report = orch.create_oco("BNB", dec!(612.34)).await.unwrap();

    assert_eq!(report.order_list.order_list_id, 1);
    assert_eq!(report.order_list.list_order_status.as_deref(), Some("EXECUTING"));
    assert_eq!(report.plan.quantity, dec!(1.234));

    account.assert_async().await;
    exchange_info.assert_async().await;
    oco.assert_async().await;
}

#[tokio::test]
async fn test_sell_with_zero_balance_never_looks_up_filters() {
    let mut server = Server::new_async().await;

    let _account = server
        .mock("GET", "/api/v3/account")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"balances": [{"asset": "USDT", "free": "50.00000000", "locked": "0.00000000"}]}"#)
        .create_async()
        .await;

    let exchange_info = server
        .mock("GET", "/api/v3/exchangeInfo")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let order = server
        .mock("POST", "/api/v3/order")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let orch = orchestrator(&server);
    let err = orch.market_sell("BNB").await.unwrap_err();

    assert!(matches!(err.root(), BotError::InsufficientBalance { .. }));
    assert!(!err.is_transport());
    exchange_info.assert_async().await;
    order.assert_async().await;
}

#[tokio::test]
async fn test_rsi_from_exchange_klines() {
    let mut server = Server::new_async().await;

    let closes = [
        "44.00", "44.25", "44.50", "43.75", "44.50", "44.75", "45.00", "45.50", "45.25", "44.75",
        "44.50", "44.25", "44.00", "43.50", "44.00",
    ];
    let rows: Vec<String> = closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            let open_time = 1_700_000_000_000i64 + i as i64 * 900_000;
            format!(
                r#"[{}, "{c}", "{c}", "{c}", "{c}", "10.0", {}, "0", 1, "0", "0", "0"]"#,
                open_time,
                open_time + 899_999,
                c = close
            )
        })
        .collect();

    let _klines = server
        .mock("GET", "/api/v3/klines")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbol".into(), "BNBUSDT".into()),
            Matcher::UrlEncoded("interval".into(), "15m".into()),
        ]))
        .with_status(200)
        .with_body(format!("[{}]", rows.join(",")))
        .create_async()
        .await;

    let orch = orchestrator(&server);
    let rsi = orch.latest_rsi("BNB", "15m", 14).await.unwrap();

    assert!(rsi > 0.0 && rsi < 100.0);
}

#[tokio::test]
async fn test_exchange_error_is_reported_as_transport() {
    let mut server = Server::new_async().await;

    let _account = server
        .mock("GET", "/api/v3/account")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"code": -2015, "msg": "Invalid API-key, IP, or permissions for action."}"#)
        .create_async()
        .await;

    let orch = orchestrator(&server);
    let err = orch.market_buy("BNB", dec!(25)).await.unwrap_err();

    assert!(err.is_transport());
    assert!(matches!(err.root(), BotError::Api { code: -2015, .. }));
    assert!(err.to_string().contains("market buy failed for BNBUSDT"));
}
