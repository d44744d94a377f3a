/// Recording orchestrator.
///
/// Coordinates the full recording flow for one exchange:
/// 1. Execute the network call, capture timings and both halves
/// 2. Fingerprint the request and response structures
/// 3. Archive the composite document (sealed when configured)
/// 4. Ensure sufficient spending allowance
/// 5. Anchor on the ledger and wait for confirmation
/// 6. Render and archive the verification certificate
/// 7. Assemble the receipt
///
/// Strictly sequential; no step is retried, any failure aborts the
/// remaining steps and propagates to the caller. Side effects already
/// committed are not rolled back: an archived payload whose anchor
/// failed is orphaned debris, carrying no ledger reference.
use std::sync::Arc;

use alloy::primitives::{B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::archive::{ArchiveAdapter, Certificate};
use crate::error::{NotaryError, Result};
use crate::fingerprint::fingerprint;
use crate::ledger::{AnchorLedger, AnchorOutcome, RecordId, Visibility};

/// An outbound request to execute and record.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RequestSpec {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".into(),
            headers: Vec::new(),
            body: None,
        }
    }
}

/// One captured network exchange. Immutable after capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub request_timestamp: DateTime<Utc>,
    pub status: u16,
    pub response_headers: Vec<(String, String)>,
    pub response_body: Option<String>,
    pub response_timestamp: DateTime<Utc>,
}

impl Exchange {
    /// Request half, as fingerprinted and archived.
    pub fn request_view(&self) -> serde_json::Value {
        json!({
            "url": self.url,
            "method": self.method,
            "headers": self.headers,
            "body": self.body,
            "timestamp": self.request_timestamp,
        })
    }

    /// Response half, as fingerprinted and archived.
    pub fn response_view(&self) -> serde_json::Value {
        json!({
            "status": self.status,
            "headers": self.response_headers,
            "body": self.response_body,
            "timestamp": self.response_timestamp,
        })
    }

    /// Fingerprint both halves.
    pub fn digests(&self) -> Result<(B256, B256)> {
        Ok((
            fingerprint(&self.request_view())?,
            fingerprint(&self.response_view())?,
        ))
    }
}

/// Response as seen by the original caller. The pipeline reads the body
/// once and hands it back here untouched.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Token and gas cost of a recording operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCost {
    /// Tokens collected by the registry.
    pub units_spent: U256,
    /// Gas paid, in the chain's native currency (gas_used × gas_price).
    pub gas_native: U256,
}

/// Consumer-facing summary of a completed recording operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub record_id: RecordId,
    pub tx_hash: B256,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
    pub gas_used: u64,
    pub explorer_url: String,
    pub certificate_url: String,
    pub archive_url: String,
    pub token_cost: TokenCost,
}

/// A recorded call: the original response plus its receipt.
#[derive(Debug)]
pub struct Recorded {
    pub response: CapturedResponse,
    pub receipt: Receipt,
}

/// Callback invoked synchronously with each completed receipt.
pub type RecordedCallback = Arc<dyn Fn(&Receipt) + Send + Sync>;

/// The orchestrator. Holds explicitly injected adapters; multiple
/// recorders with different configurations can coexist.
pub struct Recorder {
    http: reqwest::Client,
    archive: ArchiveAdapter,
    ledger: Arc<dyn AnchorLedger>,
    encrypt_archives: bool,
    on_recorded: Option<RecordedCallback>,
}

impl Recorder {
    pub fn new(
        archive: ArchiveAdapter,
        ledger: Arc<dyn AnchorLedger>,
        encrypt_archives: bool,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            archive,
            ledger,
            encrypt_archives,
            on_recorded: None,
        }
    }

    /// Register a completion callback, invoked with the receipt before
    /// `record`/`record_batch` return.
    pub fn with_callback(mut self, callback: RecordedCallback) -> Self {
        self.on_recorded = Some(callback);
        self
    }

    pub fn archive(&self) -> &ArchiveAdapter {
        &self.archive
    }

    /// Execute the network call and capture the exchange.
    pub async fn execute(&self, spec: &RequestSpec) -> Result<(Exchange, CapturedResponse)> {
        let method = reqwest::Method::from_bytes(spec.method.as_bytes())
            .map_err(|_| NotaryError::Network(format!("invalid method: {}", spec.method)))?;

        let mut request = self.http.request(method, &spec.url);
        for (name, value) in &spec.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &spec.body {
            request = request.body(body.clone());
        }

        let request_timestamp = Utc::now();
        let response = request
            .send()
            .await
            .map_err(|e| NotaryError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let response_headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| NotaryError::Network(e.to_string()))?
            .to_vec();
        let response_timestamp = Utc::now();

        let exchange = Exchange {
            url: spec.url.clone(),
            method: spec.method.clone(),
            headers: spec.headers.clone(),
            body: spec.body.clone(),
            request_timestamp,
            status,
            response_headers: response_headers.clone(),
            response_body: if body.is_empty() {
                None
            } else {
                Some(String::from_utf8_lossy(&body).into_owned())
            },
            response_timestamp,
        };

        Ok((
            exchange,
            CapturedResponse {
                status,
                headers: response_headers,
                body,
            },
        ))
    }

    /// Execute and record a single call end-to-end.
    ///
    /// Unspecified visibility resolves to PUBLIC.
    pub async fn record(
        &self,
        spec: &RequestSpec,
        visibility: Option<Visibility>,
    ) -> Result<Recorded> {
        let (exchange, response) = self.execute(spec).await?;
        let receipt = self.record_exchange(&exchange, visibility).await?;
        Ok(Recorded { response, receipt })
    }

    /// Anchor one already-captured exchange.
    pub async fn record_exchange(
        &self,
        exchange: &Exchange,
        visibility: Option<Visibility>,
    ) -> Result<Receipt> {
        let visibility = visibility.unwrap_or_default();
        let (request_digest, response_digest) = exchange.digests()?;

        let document = json!({
            "request": exchange.request_view(),
            "response": exchange.response_view(),
            "metadata": {
                "recorded_at": Utc::now(),
                "network": self.ledger.network(),
                "client": concat!("apinotary/", env!("CARGO_PKG_VERSION")),
            },
        });
        let payload = serde_json::to_vec(&document)
            .map_err(|e| NotaryError::Serialization(e.to_string()))?;
        let archived = self.archive.archive(&payload, self.encrypt_archives).await?;

        self.ledger.ensure_spending_allowance(1).await?;
        let outcome = self
            .ledger
            .submit_single(request_digest, response_digest, &archived.locator, visibility)
            .await?;

        let certificate = self
            .archive
            .archive_certificate(&Certificate {
                record_id: outcome.record_id.to_string(),
                tx_hash: format!("{}", outcome.tx_hash),
                timestamp: outcome.timestamp,
                url: exchange.url.clone(),
                status: exchange.status,
                network: self.ledger.network().to_string(),
            })
            .await?;

        let pricing = self.ledger.pricing_info().await?;
        let receipt = build_receipt(
            self.ledger.as_ref(),
            &outcome,
            pricing.single_price,
            1,
            &archived.url,
            &certificate.url,
        );

        info!(
            record_id = %receipt.record_id,
            url = %exchange.url,
            status = exchange.status,
            "Exchange recorded"
        );
        self.deliver(&receipt);
        Ok(receipt)
    }

    /// Anchor a batch of captured exchanges with one transaction and one
    /// shared archive locator. Cost uses the discounted batch price.
    pub async fn record_batch(
        &self,
        exchanges: &[Exchange],
        visibility: Option<Visibility>,
    ) -> Result<Receipt> {
        if exchanges.is_empty() {
            return Err(NotaryError::Ledger(
                "refusing to anchor an empty batch".into(),
            ));
        }
        let visibility = visibility.unwrap_or_default();
        let count = exchanges.len();

        let mut request_digests = Vec::with_capacity(count);
        let mut response_digests = Vec::with_capacity(count);
        let mut records = Vec::with_capacity(count);
        for exchange in exchanges {
            let (req, resp) = exchange.digests()?;
            request_digests.push(req);
            response_digests.push(resp);
            records.push(json!({
                "request": exchange.request_view(),
                "response": exchange.response_view(),
            }));
        }

        let document = json!({
            "records": records,
            "timestamp": Utc::now(),
            "count": count,
        });
        let payload = serde_json::to_vec(&document)
            .map_err(|e| NotaryError::Serialization(e.to_string()))?;
        let archived = self.archive.archive(&payload, self.encrypt_archives).await?;

        self.ledger.ensure_spending_allowance(count as u64).await?;
        let outcome = self
            .ledger
            .submit_batch(request_digests, response_digests, &archived.locator, visibility)
            .await?;

        let certificate = self
            .archive
            .archive_certificate(&Certificate {
                record_id: outcome.record_id.to_string(),
                tx_hash: format!("{}", outcome.tx_hash),
                timestamp: outcome.timestamp,
                url: format!("batch:{count} records"),
                status: 0,
                network: self.ledger.network().to_string(),
            })
            .await?;

        let pricing = self.ledger.pricing_info().await?;
        let receipt = build_receipt(
            self.ledger.as_ref(),
            &outcome,
            pricing.batch_price,
            count as u64,
            &archived.url,
            &certificate.url,
        );

        info!(
            record_id = %receipt.record_id,
            count,
            units = %receipt.token_cost.units_spent,
            "Batch recorded"
        );
        self.deliver(&receipt);
        Ok(receipt)
    }

    fn deliver(&self, receipt: &Receipt) {
        if let Some(callback) = &self.on_recorded {
            callback(receipt);
        }
    }
}

/// Assemble a receipt from a confirmed anchor.
fn build_receipt(
    ledger: &dyn AnchorLedger,
    outcome: &AnchorOutcome,
    per_unit: U256,
    units: u64,
    archive_url: &str,
    certificate_url: &str,
) -> Receipt {
    Receipt {
        record_id: outcome.record_id.clone(),
        tx_hash: outcome.tx_hash,
        block_number: outcome.block_number,
        timestamp: outcome.timestamp,
        gas_used: outcome.gas_used,
        explorer_url: ledger.explorer_url(&outcome.tx_hash),
        certificate_url: certificate_url.to_string(),
        archive_url: archive_url.to_string(),
        token_cost: TokenCost {
            units_spent: per_unit * U256::from(units),
            gas_native: U256::from(outcome.gas_used) * U256::from(outcome.gas_price),
        },
    }
}
