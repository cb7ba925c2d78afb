//! Order-book providers.
//!
//! The feed only needs one operation from the outside world: fetch the current
//! book for a symbol. `HttpBookProvider` does this against an `l2Book` info
//! endpoint; `ScriptedBookProvider` replays a fixed sequence for tests and dry runs.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use cohort_core::{BookLevel, BookSnapshot, Price, Size};
use parking_lot::Mutex;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FeedError, FeedResult};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Source of order-book snapshots.
pub trait OrderBookProvider: Send + Sync {
    /// Fetch the current book for `symbol`, at most `depth` levels per side.
    fn fetch_book<'a>(&'a self, symbol: &'a str, depth: usize)
        -> BoxFuture<'a, FeedResult<BookSnapshot>>;
}

/// Default timeout for info requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct L2BookRequest<'a> {
    #[serde(rename = "type")]
    request_type: &'static str,
    coin: &'a str,
}

/// One level as returned by the info endpoint. The order count `n` is ignored.
#[derive(Debug, Deserialize)]
struct RawLevel {
    px: Decimal,
    sz: Decimal,
}

#[derive(Debug, Deserialize)]
struct L2BookResponse {
    #[serde(default)]
    time: Option<i64>,
    /// `[bids, asks]`, each best-first.
    levels: Vec<Vec<RawLevel>>,
}

/// Order-book provider backed by an HTTP info endpoint.
pub struct HttpBookProvider {
    client: Client,
    info_url: String,
}

impl HttpBookProvider {
    /// Create a provider for `info_url` (e.g. "https://api.hyperliquid.xyz/info").
    pub fn new(info_url: impl Into<String>, timeout: Duration) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            info_url: info_url.into(),
        })
    }

    async fn fetch(&self, symbol: &str, depth: usize) -> FeedResult<BookSnapshot> {
        let request = L2BookRequest {
            request_type: "l2Book",
            coin: symbol,
        };

        let response = self
            .client
            .post(&self.info_url)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Http(format!("HTTP {status}: {body}")));
        }

        let body = response.bytes().await?;
        let book = parse_l2_book(symbol, &body, depth)?;
        debug!(
            symbol,
            bids = book.bids.len(),
            asks = book.asks.len(),
            "Fetched l2Book"
        );
        Ok(book)
    }
}

impl OrderBookProvider for HttpBookProvider {
    fn fetch_book<'a>(
        &'a self,
        symbol: &'a str,
        depth: usize,
    ) -> BoxFuture<'a, FeedResult<BookSnapshot>> {
        Box::pin(self.fetch(symbol, depth))
    }
}

/// Parse an `l2Book` response body into a snapshot truncated to `depth` levels.
pub fn parse_l2_book(symbol: &str, body: &[u8], depth: usize) -> FeedResult<BookSnapshot> {
    let raw: L2BookResponse = serde_json::from_slice(body)?;
    let mut sides = raw.levels.into_iter();
    let (Some(bids), Some(asks)) = (sides.next(), sides.next()) else {
        return Err(FeedError::InvalidBook(format!(
            "{symbol}: expected [bids, asks] levels"
        )));
    };

    let convert = |levels: Vec<RawLevel>| -> Vec<BookLevel> {
        levels
            .into_iter()
            .take(depth)
            .map(|l| BookLevel::new(Price::new(l.px), Size::new(l.sz)))
            .collect()
    };

    let received_at = raw
        .time
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(Utc::now);

    Ok(BookSnapshot {
        symbol: symbol.to_string(),
        bids: convert(bids),
        asks: convert(asks),
        received_at,
    })
}

/// Build an evenly spaced book around a best bid / best ask.
///
/// Level `i` sits `i * step` away from the touch with size `size`.
pub fn ladder_book(
    symbol: &str,
    best_bid: Decimal,
    best_ask: Decimal,
    step: Decimal,
    levels: usize,
    size: Decimal,
) -> BookSnapshot {
    let bids = (0..levels)
        .map(|i| BookLevel::new(Price::new(best_bid - step * Decimal::from(i)), Size::new(size)))
        .collect();
    let asks = (0..levels)
        .map(|i| BookLevel::new(Price::new(best_ask + step * Decimal::from(i)), Size::new(size)))
        .collect();
    BookSnapshot::new(symbol, bids, asks)
}

/// Provider that replays a fixed script of snapshots and failures.
///
/// Once the script is exhausted the last successful snapshot is repeated
/// (with a fresh timestamp). An empty script with no prior success fails.
#[derive(Debug, Default)]
pub struct ScriptedBookProvider {
    script: Mutex<VecDeque<Result<BookSnapshot, String>>>,
    last: Mutex<Option<BookSnapshot>>,
    calls: AtomicU64,
}

impl ScriptedBookProvider {
    pub fn new(script: impl IntoIterator<Item = Result<BookSnapshot, String>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicU64::new(0),
        }
    }

    /// Always return `book`.
    pub fn repeating(book: BookSnapshot) -> Self {
        Self::new([Ok(book)])
    }

    /// Append a step to the script.
    pub fn push(&self, step: Result<BookSnapshot, String>) {
        self.script.lock().push_back(step);
    }

    /// Number of fetches served so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self, symbol: &str) -> FeedResult<BookSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().pop_front();
        match step {
            Some(Ok(mut book)) => {
                book.received_at = Utc::now();
                *self.last.lock() = Some(book.clone());
                Ok(book)
            }
            Some(Err(msg)) => Err(FeedError::Provider(msg)),
            None => match self.last.lock().clone() {
                Some(mut book) => {
                    book.received_at = Utc::now();
                    Ok(book)
                }
                None => Err(FeedError::Provider(format!("{symbol}: script exhausted"))),
            },
        }
    }
}

impl OrderBookProvider for ScriptedBookProvider {
    fn fetch_book<'a>(
        &'a self,
        symbol: &'a str,
        _depth: usize,
    ) -> BoxFuture<'a, FeedResult<BookSnapshot>> {
        Box::pin(async move { self.next(symbol) })
    }
}
