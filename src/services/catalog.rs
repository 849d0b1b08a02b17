//! Tradable instrument discovery over the exchange REST API.

use crate::error::CatalogError;
use crate::models::MarketCategory;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, warn};

const TRADING_STATUS: &str = "Trading";
/// Largest page the instruments endpoint serves.
const PAGE_LIMIT: &str = "1000";
const MAX_PAGES: usize = 50;

#[async_trait]
pub trait InstrumentCatalog: Send + Sync {
    /// Active, quote-matched symbols for `category`, in catalog order.
    async fn fetch_active(&self, category: MarketCategory) -> Result<Vec<String>, CatalogError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentsResponse {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    #[serde(default)]
    result: InstrumentsResult,
}

#[derive(Debug, Deserialize, Default)]
struct InstrumentsResult {
    #[serde(default)]
    list: Vec<InstrumentInfo>,
    #[serde(default, rename = "nextPageCursor")]
    next_page_cursor: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentInfo {
    pub symbol: String,
    pub status: String,
    #[serde(default)]
    pub base_coin: String,
    #[serde(default)]
    pub quote_coin: String,
}

impl InstrumentInfo {
    pub fn is_active_with_suffix(&self, quote_suffix: &str) -> bool {
        self.status == TRADING_STATUS && self.symbol.ends_with(quote_suffix)
    }
}

pub struct BybitCatalogClient {
    base_url: String,
    quote_suffix: String,
    client: reqwest::Client,
}

impl BybitCatalogClient {
    pub fn new(base_url: impl Into<String>, quote_suffix: impl Into<String>) -> Self {
        Self::with_client(base_url, quote_suffix, reqwest::Client::new())
    }

    pub fn with_client(
        base_url: impl Into<String>,
        quote_suffix: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            quote_suffix: quote_suffix.into(),
            client,
        }
    }

    /// Every instrument in `category`, following `nextPageCursor` until the
    /// exchange stops returning one.
    pub async fn fetch_instruments(
        &self,
        category: MarketCategory,
    ) -> Result<Vec<InstrumentInfo>, CatalogError> {
        let mut instruments = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor: Option<String> = None;

        for page in 1..=MAX_PAGES {
            let result = self.fetch_page(category, cursor.as_deref()).await?;
            instruments.extend(result.list);

            let next = result.next_page_cursor;
            if next.is_empty() {
                return Ok(instruments);
            }
            if !seen.insert(next.clone()) {
                warn!(category = %category, page, cursor = %next, "Instrument cursor repeated");
                return Ok(instruments);
            }
            cursor = Some(next);
        }

        warn!(category = %category, pages = MAX_PAGES, "Instrument catalog truncated");
        Ok(instruments)
    }

    async fn fetch_page(
        &self,
        category: MarketCategory,
        cursor: Option<&str>,
    ) -> Result<InstrumentsResult, CatalogError> {
        let url = format!("{}/v5/market/instruments-info", self.base_url);
        let mut request = self
            .client
            .get(&url)
            .query(&[("category", category.as_str()), ("limit", PAGE_LIMIT)]);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }

        let body: InstrumentsResponse = response.json().await?;
        if body.ret_code != 0 {
            return Err(CatalogError::Api {
                code: body.ret_code,
                message: body.ret_msg,
            });
        }

        Ok(body.result)
    }
}

#[async_trait]
impl InstrumentCatalog for BybitCatalogClient {
    async fn fetch_active(&self, category: MarketCategory) -> Result<Vec<String>, CatalogError> {
        let instruments = self.fetch_instruments(category).await?;
        let total = instruments.len();

        let symbols: Vec<String> = instruments
            .into_iter()
            .filter(|inst| inst.is_active_with_suffix(&self.quote_suffix))
            .map(|inst| inst.symbol)
            .collect();

        debug!(
            category = %category,
            total,
            active = symbols.len(),
            "Fetched instrument catalog"
        );
        Ok(symbols)
    }
}
