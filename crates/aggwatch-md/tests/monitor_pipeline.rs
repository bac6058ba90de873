//! End-to-end: a local server plays Binance combined-stream frames, the
//! monitor turns them into single-trade and window alerts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aggwatch_core::MarketType;
use aggwatch_core::config::AlertThresholds;
use aggwatch_core::time_util;
use aggwatch_core::ws::{ConnectOptions, ConnectionStatus};
use aggwatch_md::aggregator::StatKey;
use aggwatch_md::alert::{AlertDispatcher, AlertSink, SinkResponse};
use aggwatch_md::monitor::{AggTradeMonitor, MarketStream, MonitorSettings};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Default)]
struct RecordingSink {
    texts: Mutex<Vec<String>>,
}

#[async_trait]
impl AlertSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, _channel_id: &str, text: &str) -> anyhow::Result<SinkResponse> {
        self.texts.lock().push(text.to_string());
        Ok(SinkResponse::ok())
    }
}

fn frame(symbol: &str, price: f64, qty: f64, buyer_maker: bool, event_ms: u64) -> String {
    format!(
        r#"{{"stream":"{}@aggTrade","data":{{"e":"aggTrade","E":{event_ms},"s":"{symbol}","a":1,"p":"{price}","q":"{qty}","f":1,"l":1,"T":{event_ms},"m":{buyer_maker}}}}}"#,
        symbol.to_lowercase()
    )
}

/// Serves `frames` to every connection, then idles until the client leaves.
async fn start_feed(frames: Vec<String>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let frames = frames.clone();
            tokio::spawn(async move {
                let Ok(ws) = accept_async(stream).await else { return };
                let (mut write, mut read) = ws.split();
                let _ = write.send(Message::Text(r#"{"result":null,"id":1}"#.to_string().into())).await;
                for f in frames {
                    let _ = write.send(Message::Text(f.into())).await;
                }
                while let Some(Ok(msg)) = read.next().await {
                    if msg.is_close() {
                        break;
                    }
                }
            });
        }
    });
    port
}

fn settings() -> MonitorSettings {
    MonitorSettings {
        thresholds: AlertThresholds {
            qty_limits: HashMap::from([("BTC".to_string(), 100.0)]),
            window_secs: 60,
            window_count: 5,
            notional_limit_millions: 1.0,
        },
        check_interval: Duration::from_millis(100),
        utc_offset: time_util::offset_hours(8),
        monitor_interval: Duration::from_millis(30),
        connect_timeout: Duration::from_secs(2),
        keep_alive: (Duration::from_secs(5), Duration::from_secs(10)),
    }
}

async fn wait_for(sink: &RecordingSink, needle: &str) {
    let found = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if sink.texts.lock().iter().any(|t| t.contains(needle)) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(found.is_ok(), "no alert containing {needle:?}; got {:?}", sink.texts.lock());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn trades_become_alerts() {
    let now = time_util::now_ms();
    // ETH has no quantity limit configured: never a single-trade alert.
    let mut frames = vec![frame("ETHUSDT", 3_000.0, 1_000_000.0, true, now)];
    // Large buy by quantity: single-trade alert, one qualifying buy.
    frames.push(frame("BTCUSDT", 50_000.0, 150.0, false, now));
    // Five sells of 1.5M each: window alert on the sell side only.
    for i in 0..5 {
        frames.push(frame("BTCUSDT", 50_000.0, 30.0, true, now + i));
    }

    let port = start_feed(frames).await;
    let sink = Arc::new(RecordingSink::default());
    let dispatcher =
        Arc::new(AlertDispatcher::new(sink.clone(), "-100", 4, tokio::runtime::Handle::current()));

    let streams = vec![MarketStream {
        market: MarketType::Spot,
        options: ConnectOptions::new("127.0.0.1", port, "/stream?streams=btcusdt@aggTrade/ethusdt@aggTrade", false),
    }];
    let mut monitor = AggTradeMonitor::start_with(streams, settings(), dispatcher.clone()).unwrap();

    wait_for(&sink, "#single #BTCUSDT #Buy #Spot").await;
    wait_for(&sink, "#window #BTCUSDT #Sell #Spot").await;

    {
        let texts = sink.texts.lock();
        assert_eq!(texts.iter().filter(|t| t.contains("#single")).count(), 1);
        assert!(!texts.iter().any(|t| t.contains("#window #BTCUSDT #Buy")));
        assert!(!texts.iter().any(|t| t.contains("#single #ETHUSDT")));
    }

    let btc = monitor.registry().get(&StatKey::new(MarketType::Spot, "BTCUSDT")).unwrap();
    assert_eq!(btc.window_len(), 6);
    assert_eq!(monitor.registry().len(), 2);
    assert_eq!(monitor.statuses(), vec![("binance_spot".to_string(), ConnectionStatus::Connected)]);
    assert_eq!(dispatcher.failed(), 0);

    monitor.stop();
    assert!(monitor.statuses().is_empty());
}
