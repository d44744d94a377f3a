/// Ledger adapter: anchoring transactions and read-only queries against
/// the registry and token contracts.
///
/// Uses raw JSON-RPC for maximum node compatibility; transactions are
/// built and signed locally with alloy. Write calls block until the
/// transaction reaches confirmation, then decode the confirmation logs
/// against the typed event schema to extract the assigned record id.
pub mod abi;

use std::str::FromStr;
use std::time::Duration;

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, Bytes, LogData, TxKind, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::LedgerConfig;
use crate::error::{NotaryError, Result};
use abi::{NotaryRegistry, NotaryToken};

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const RECEIPT_POLL_ATTEMPTS: u32 = 60;

/// Access-control classification attached to an anchored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Shared,
}

impl Visibility {
    pub fn as_u8(self) -> u8 {
        match self {
            Visibility::Public => 0,
            Visibility::Private => 1,
            Visibility::Shared => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Visibility::Public),
            1 => Some(Visibility::Private),
            2 => Some(Visibility::Shared),
            _ => None,
        }
    }
}

impl FromStr for Visibility {
    type Err = NotaryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            "shared" => Ok(Visibility::Shared),
            other => Err(NotaryError::Configuration(format!(
                "unknown visibility: {other}"
            ))),
        }
    }
}

/// Record identifier extracted from a confirmed anchor transaction.
///
/// `Degraded` means the confirmation logs carried no decodable anchoring
/// event; the transaction hash is the only usable handle. Callers still
/// get a receipt, but the case is logged for telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordId {
    Confirmed(U256),
    Degraded { tx_hash: B256 },
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordId::Confirmed(id) => write!(f, "{id}"),
            RecordId::Degraded { tx_hash } => write!(f, "tx:{tx_hash}"),
        }
    }
}

/// Confirmed anchor transaction outcome.
#[derive(Debug, Clone)]
pub struct AnchorOutcome {
    pub record_id: RecordId,
    pub tx_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    /// Effective gas price paid, for native-currency cost accounting.
    pub gas_price: u128,
    pub timestamp: DateTime<Utc>,
}

/// Ledger-resident record as returned by `verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub record_id: U256,
    pub request_digest: B256,
    pub response_digest: B256,
    pub timestamp: u64,
    pub submitter: Address,
    pub archive_locator: String,
    pub visibility: Visibility,
}

/// Current contract pricing.
#[derive(Debug, Clone, Copy)]
pub struct PricingInfo {
    /// Token cost per single-record anchor.
    pub single_price: U256,
    /// Discounted per-record token cost on the batch path.
    pub batch_price: U256,
    pub burn_rate: U256,
}

/// Registry-wide counters.
#[derive(Debug, Clone, Copy)]
pub struct LedgerStats {
    pub total_records: U256,
    pub total_batches: U256,
    pub tokens_burned: U256,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    topics: Vec<String>,
    data: String,
}

impl RpcLog {
    fn to_log_data(&self) -> Option<LogData> {
        let topics = self
            .topics
            .iter()
            .map(|t| t.parse::<B256>().ok())
            .collect::<Option<Vec<_>>>()?;
        let data = hex::decode(self.data.trim_start_matches("0x")).ok()?;
        Some(LogData::new_unchecked(topics, data.into()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    status: Option<String>,
    block_number: Option<String>,
    gas_used: Option<String>,
    #[serde(default)]
    logs: Vec<RpcLog>,
}

fn parse_hex_u64(value: &str) -> Result<u64> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16)
        .map_err(|e| NotaryError::Ledger(format!("invalid hex quantity: {e}")))
}

fn parse_hex_u128(value: &str) -> Result<u128> {
    u128::from_str_radix(value.trim_start_matches("0x"), 16)
        .map_err(|e| NotaryError::Ledger(format!("invalid hex quantity: {e}")))
}

/// The ledger surface the recording orchestrator depends on.
///
/// Injected so tests drive the pipeline against fakes, mirroring the
/// storage and batching seams.
#[async_trait]
pub trait AnchorLedger: Send + Sync {
    fn network(&self) -> &str;
    fn explorer_url(&self, tx_hash: &B256) -> String;
    async fn ensure_spending_allowance(&self, units: u64) -> Result<()>;
    async fn submit_single(
        &self,
        request_digest: B256,
        response_digest: B256,
        archive_locator: &str,
        visibility: Visibility,
    ) -> Result<AnchorOutcome>;
    async fn submit_batch(
        &self,
        request_digests: Vec<B256>,
        response_digests: Vec<B256>,
        archive_locator: &str,
        visibility: Visibility,
    ) -> Result<AnchorOutcome>;
    async fn pricing_info(&self) -> Result<PricingInfo>;
}

/// Ledger adapter over raw JSON-RPC with a local signer.
pub struct LedgerAdapter {
    client: Client,
    config: LedgerConfig,
    signer: PrivateKeySigner,
}

impl LedgerAdapter {
    pub fn new(config: LedgerConfig, signer_key_hex: &str) -> Result<Self> {
        let signer: PrivateKeySigner = signer_key_hex
            .parse()
            .map_err(|_| NotaryError::Configuration("invalid signer private key".into()))?;
        Ok(Self {
            client: Client::new(),
            config,
            signer,
        })
    }

    /// Address of the configured signer.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Explorer link for a transaction.
    pub fn explorer_url(&self, tx_hash: &B256) -> String {
        format!("{}{tx_hash}", self.config.explorer_base)
    }

    /// Network label from configuration.
    pub fn network(&self) -> &str {
        &self.config.network
    }

    /// Send a JSON-RPC request; `result: null` becomes `Ok(None)`.
    async fn rpc_call_opt<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp: JsonRpcResponse<T> = self
            .client
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotaryError::Network(format!("RPC transport: {e}")))?
            .json()
            .await
            .map_err(|e| NotaryError::Serialization(format!("RPC response parse error: {e}")))?;

        if let Some(err) = resp.error {
            return Err(NotaryError::Ledger(err.message));
        }
        Ok(resp.result)
    }

    async fn rpc_call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        self.rpc_call_opt(method, params)
            .await?
            .ok_or_else(|| NotaryError::Ledger(format!("empty RPC response for {method}")))
    }

    /// Read-only contract call, ABI-decoded by the caller.
    async fn eth_call(&self, to: Address, calldata: Vec<u8>) -> Result<Vec<u8>> {
        let result: String = self
            .rpc_call(
                "eth_call",
                serde_json::json!([
                    { "to": format!("{to:?}"), "data": format!("0x{}", hex::encode(&calldata)) },
                    "latest"
                ]),
            )
            .await?;
        hex::decode(result.trim_start_matches("0x"))
            .map_err(|e| NotaryError::Ledger(format!("invalid eth_call result: {e}")))
    }

    /// Build, sign, submit a transaction and block until confirmation.
    async fn send_tx(&self, to: Address, calldata: Vec<u8>) -> Result<ConfirmedTx> {
        let from = self.signer.address();

        let nonce_hex: String = self
            .rpc_call(
                "eth_getTransactionCount",
                serde_json::json!([format!("{from:?}"), "pending"]),
            )
            .await?;
        let nonce = parse_hex_u64(&nonce_hex)?;

        let gas_price_hex: String = self.rpc_call("eth_gasPrice", serde_json::json!([])).await?;
        let gas_price = parse_hex_u128(&gas_price_hex)?;

        // A failed estimate usually means the call would revert; surface
        // the node's reason instead of submitting a doomed transaction.
        let gas_limit_hex: String = self
            .rpc_call(
                "eth_estimateGas",
                serde_json::json!([{
                    "from": format!("{from:?}"),
                    "to": format!("{to:?}"),
                    "data": format!("0x{}", hex::encode(&calldata)),
                }]),
            )
            .await?;
        let gas_limit = parse_hex_u64(&gas_limit_hex)?;

        let tx = TxLegacy {
            chain_id: Some(self.config.chain_id),
            nonce,
            gas_price,
            gas_limit: gas_limit + gas_limit / 5,
            to: TxKind::Call(to),
            value: U256::ZERO,
            input: Bytes::from(calldata),
        };

        let sig_hash = tx.signature_hash();
        let sig = self
            .signer
            .sign_hash(&sig_hash)
            .await
            .map_err(|e| NotaryError::Ledger(format!("signing failed: {e}")))?;

        let signed = TxEnvelope::Legacy(tx.into_signed(sig));
        let mut raw_tx = Vec::new();
        signed.encode_2718(&mut raw_tx);

        let tx_hash_hex: String = self
            .rpc_call(
                "eth_sendRawTransaction",
                serde_json::json!([format!("0x{}", hex::encode(&raw_tx))]),
            )
            .await?;
        let tx_hash: B256 = tx_hash_hex
            .parse()
            .map_err(|_| NotaryError::Ledger("invalid transaction hash".into()))?;

        self.wait_for_receipt(tx_hash, gas_price).await
    }

    /// Poll until the transaction is mined; reverts become `Ledger` errors.
    async fn wait_for_receipt(&self, tx_hash: B256, gas_price: u128) -> Result<ConfirmedTx> {
        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            let receipt: Option<RpcReceipt> = self
                .rpc_call_opt(
                    "eth_getTransactionReceipt",
                    serde_json::json!([format!("{tx_hash}")]),
                )
                .await?;

            if let Some(receipt) = receipt {
                if receipt.status.as_deref() == Some("0x0") {
                    return Err(NotaryError::Ledger(format!(
                        "transaction {tx_hash} reverted"
                    )));
                }
                let block_number = receipt
                    .block_number
                    .as_deref()
                    .map(parse_hex_u64)
                    .transpose()?
                    .unwrap_or(0);
                let gas_used = receipt
                    .gas_used
                    .as_deref()
                    .map(parse_hex_u64)
                    .transpose()?
                    .unwrap_or(0);
                let logs = receipt
                    .logs
                    .iter()
                    .filter_map(RpcLog::to_log_data)
                    .collect();
                return Ok(ConfirmedTx {
                    tx_hash,
                    block_number,
                    gas_used,
                    gas_price,
                    logs,
                });
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
        Err(NotaryError::Network(format!(
            "transaction {tx_hash} not confirmed after {RECEIPT_POLL_ATTEMPTS} polls"
        )))
    }

    /// Anchor a single fingerprint pair. Blocks until confirmation.
    pub async fn submit_single(
        &self,
        request_digest: B256,
        response_digest: B256,
        archive_locator: &str,
        visibility: Visibility,
    ) -> Result<AnchorOutcome> {
        let calldata = NotaryRegistry::storeAPIRecordCall {
            requestHash: request_digest,
            responseHash: response_digest,
            archiveCid: archive_locator.to_string(),
            visibility: visibility.as_u8(),
        }
        .abi_encode();

        let confirmed = self.send_tx(self.config.registry_address, calldata).await?;
        let record_id = extract_record_id(&confirmed.logs, confirmed.tx_hash, false);
        info!(
            record_id = %record_id,
            tx_hash = %confirmed.tx_hash,
            block = confirmed.block_number,
            "Anchor confirmed"
        );
        Ok(confirmed.into_outcome(record_id))
    }

    /// Anchor many fingerprint pairs in one transaction sharing one
    /// archive locator. Blocks until confirmation.
    pub async fn submit_batch(
        &self,
        request_digests: Vec<B256>,
        response_digests: Vec<B256>,
        archive_locator: &str,
        visibility: Visibility,
    ) -> Result<AnchorOutcome> {
        if request_digests.len() != response_digests.len() {
            return Err(NotaryError::Ledger(
                "batch digest lists have mismatched lengths".into(),
            ));
        }
        let count = request_digests.len();

        let calldata = NotaryRegistry::storeBatchRecordsCall {
            requestHashes: request_digests,
            responseHashes: response_digests,
            archiveCid: archive_locator.to_string(),
            visibility: visibility.as_u8(),
        }
        .abi_encode();

        let confirmed = self.send_tx(self.config.registry_address, calldata).await?;
        let record_id = extract_record_id(&confirmed.logs, confirmed.tx_hash, true);
        info!(
            record_id = %record_id,
            tx_hash = %confirmed.tx_hash,
            block = confirmed.block_number,
            count,
            "Batch anchor confirmed"
        );
        Ok(confirmed.into_outcome(record_id))
    }

    /// Look up an anchored record. `None` if no such record exists.
    pub async fn verify(&self, record_id: U256) -> Result<Option<AnchorRecord>> {
        let calldata = NotaryRegistry::verifyRecordCall { recordId: record_id }.abi_encode();
        let raw = self.eth_call(self.config.registry_address, calldata).await?;
        let ret = NotaryRegistry::verifyRecordCall::abi_decode_returns(&raw)
            .map_err(|e| NotaryError::Ledger(format!("verifyRecord decode: {e}")))?;

        if !ret.exists {
            return Ok(None);
        }
        Ok(Some(AnchorRecord {
            record_id,
            request_digest: ret.requestHash,
            response_digest: ret.responseHash,
            timestamp: ret.timestamp.try_into().unwrap_or(u64::MAX),
            submitter: ret.submitter,
            archive_locator: ret.archiveCid,
            visibility: Visibility::from_u8(ret.visibility).unwrap_or_default(),
        }))
    }

    /// Grant a viewer access to a SHARED record. Blocks for confirmation;
    /// ledger rejections (non-SHARED or nonexistent record) propagate.
    pub async fn grant_access(&self, record_id: U256, viewer: Address) -> Result<B256> {
        let calldata = NotaryRegistry::grantAccessCall {
            recordId: record_id,
            viewer,
        }
        .abi_encode();
        let confirmed = self.send_tx(self.config.registry_address, calldata).await?;
        Ok(confirmed.tx_hash)
    }

    /// Revoke a viewer's access to a SHARED record.
    pub async fn revoke_access(&self, record_id: U256, viewer: Address) -> Result<B256> {
        let calldata = NotaryRegistry::revokeAccessCall {
            recordId: record_id,
            viewer,
        }
        .abi_encode();
        let confirmed = self.send_tx(self.config.registry_address, calldata).await?;
        Ok(confirmed.tx_hash)
    }

    /// Make sure the registry can collect payment for `units` anchors.
    ///
    /// Reads the per-unit price and the current allowance; only when the
    /// allowance falls short does it submit a single `approve(U256::MAX)`,
    /// so later submissions skip the approval transaction entirely.
    /// Skipped when auto-approval is disabled in configuration.
    pub async fn ensure_spending_allowance(&self, units: u64) -> Result<()> {
        if !self.config.auto_approve {
            return Ok(());
        }

        let pricing = self.pricing_info().await?;
        let per_unit = if units > 1 {
            pricing.batch_price
        } else {
            pricing.single_price
        };
        let needed = per_unit * U256::from(units);

        let available = self.balance_of(self.address()).await?;
        if available < needed {
            return Err(NotaryError::InsufficientBalance {
                needed: needed.to_string(),
                available: available.to_string(),
            });
        }

        let current = self.allowance().await?;
        if current >= needed {
            return Ok(());
        }

        info!(needed = %needed, current = %current, "Raising spending allowance");
        let calldata = NotaryToken::approveCall {
            spender: self.config.registry_address,
            value: U256::MAX,
        }
        .abi_encode();
        self.send_tx(self.config.token_address, calldata).await?;
        Ok(())
    }

    /// Token balance of an address.
    pub async fn balance_of(&self, owner: Address) -> Result<U256> {
        let calldata = NotaryToken::balanceOfCall { owner }.abi_encode();
        let raw = self.eth_call(self.config.token_address, calldata).await?;
        NotaryToken::balanceOfCall::abi_decode_returns(&raw)
            .map_err(|e| NotaryError::Ledger(format!("balanceOf decode: {e}")))
    }

    /// Allowance currently granted by the signer to the registry.
    pub async fn allowance(&self) -> Result<U256> {
        let calldata = NotaryToken::allowanceCall {
            owner: self.address(),
            spender: self.config.registry_address,
        }
        .abi_encode();
        let raw = self.eth_call(self.config.token_address, calldata).await?;
        NotaryToken::allowanceCall::abi_decode_returns(&raw)
            .map_err(|e| NotaryError::Ledger(format!("allowance decode: {e}")))
    }

    /// Current single/batch pricing from the registry.
    pub async fn pricing_info(&self) -> Result<PricingInfo> {
        let calldata = NotaryRegistry::getPricingInfoCall {}.abi_encode();
        let raw = self.eth_call(self.config.registry_address, calldata).await?;
        let ret = NotaryRegistry::getPricingInfoCall::abi_decode_returns(&raw)
            .map_err(|e| NotaryError::Ledger(format!("getPricingInfo decode: {e}")))?;
        Ok(PricingInfo {
            single_price: ret.singlePrice,
            batch_price: ret.batchPrice,
            burn_rate: ret.burnRate,
        })
    }

    /// Registry-wide statistics.
    pub async fn statistics(&self) -> Result<LedgerStats> {
        let calldata = NotaryRegistry::getStatisticsCall {}.abi_encode();
        let raw = self.eth_call(self.config.registry_address, calldata).await?;
        let ret = NotaryRegistry::getStatisticsCall::abi_decode_returns(&raw)
            .map_err(|e| NotaryError::Ledger(format!("getStatistics decode: {e}")))?;
        Ok(LedgerStats {
            total_records: ret.totalRecords,
            total_batches: ret.totalBatches,
            tokens_burned: ret.tokensBurned,
        })
    }

    /// Number of records anchored by a user.
    pub async fn user_record_count(&self, user: Address) -> Result<U256> {
        let calldata = NotaryRegistry::userRecordCountCall { user }.abi_encode();
        let raw = self.eth_call(self.config.registry_address, calldata).await?;
        NotaryRegistry::userRecordCountCall::abi_decode_returns(&raw)
            .map_err(|e| NotaryError::Ledger(format!("userRecordCount decode: {e}")))
    }

    /// Current access-grant set of a SHARED record.
    pub async fn shared_access(&self, record_id: U256) -> Result<Vec<Address>> {
        let calldata = NotaryRegistry::sharedAccessCall { recordId: record_id }.abi_encode();
        let raw = self.eth_call(self.config.registry_address, calldata).await?;
        NotaryRegistry::sharedAccessCall::abi_decode_returns(&raw)
            .map_err(|e| NotaryError::Ledger(format!("sharedAccess decode: {e}")))
    }
}

#[async_trait]
impl AnchorLedger for LedgerAdapter {
    fn network(&self) -> &str {
        LedgerAdapter::network(self)
    }

    fn explorer_url(&self, tx_hash: &B256) -> String {
        LedgerAdapter::explorer_url(self, tx_hash)
    }

    async fn ensure_spending_allowance(&self, units: u64) -> Result<()> {
        LedgerAdapter::ensure_spending_allowance(self, units).await
    }

    async fn submit_single(
        &self,
        request_digest: B256,
        response_digest: B256,
        archive_locator: &str,
        visibility: Visibility,
    ) -> Result<AnchorOutcome> {
        LedgerAdapter::submit_single(self, request_digest, response_digest, archive_locator, visibility)
            .await
    }

    async fn submit_batch(
        &self,
        request_digests: Vec<B256>,
        response_digests: Vec<B256>,
        archive_locator: &str,
        visibility: Visibility,
    ) -> Result<AnchorOutcome> {
        LedgerAdapter::submit_batch(self, request_digests, response_digests, archive_locator, visibility)
            .await
    }

    async fn pricing_info(&self) -> Result<PricingInfo> {
        LedgerAdapter::pricing_info(self).await
    }
}

/// Confirmed transaction with its decoded logs.
struct ConfirmedTx {
    tx_hash: B256,
    block_number: u64,
    gas_used: u64,
    gas_price: u128,
    logs: Vec<LogData>,
}

impl ConfirmedTx {
    fn into_outcome(self, record_id: RecordId) -> AnchorOutcome {
        AnchorOutcome {
            record_id,
            tx_hash: self.tx_hash,
            block_number: self.block_number,
            gas_used: self.gas_used,
            gas_price: self.gas_price,
            timestamp: Utc::now(),
        }
    }
}

/// Decode the assigned record id from confirmation logs.
///
/// No decodable anchoring event yields `RecordId::Degraded` with the
/// transaction hash, logged as a warning.
fn extract_record_id(logs: &[LogData], tx_hash: B256, batch: bool) -> RecordId {
    for log in logs {
        if batch {
            if let Ok(event) = NotaryRegistry::BatchRecordStored::decode_log_data(log) {
                return RecordId::Confirmed(event.firstRecordId);
            }
        } else if let Ok(event) = NotaryRegistry::RecordStored::decode_log_data(log) {
            return RecordId::Confirmed(event.recordId);
        }
    }
    warn!(
        tx_hash = %tx_hash,
        batch,
        "No anchoring event in confirmation logs, falling back to transaction hash"
    );
    RecordId::Degraded { tx_hash }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn stored_event_log(record_id: u64) -> LogData {
        NotaryRegistry::RecordStored {
            recordId: U256::from(record_id),
            submitter: address!("00000000000000000000000000000000000000aa"),
            requestHash: B256::repeat_byte(1),
            responseHash: B256::repeat_byte(2),
            archiveCid: "bafytest".into(),
            visibility: Visibility::Public.as_u8(),
            timestamp: U256::from(1_700_000_000u64),
        }
        .encode_log_data()
    }

    #[test]
    fn test_extract_record_id_from_stored_event() {
        let logs = vec![stored_event_log(42)];
        let id = extract_record_id(&logs, B256::ZERO, false);
        assert_eq!(id, RecordId::Confirmed(U256::from(42)));
    }

    #[test]
    fn test_extract_record_id_from_batch_event() {
        let logs = vec![NotaryRegistry::BatchRecordStored {
            firstRecordId: U256::from(100),
            submitter: address!("00000000000000000000000000000000000000aa"),
            count: U256::from(7),
            archiveCid: "bafybatch".into(),
        }
        .encode_log_data()];
        let id = extract_record_id(&logs, B256::ZERO, true);
        assert_eq!(id, RecordId::Confirmed(U256::from(100)));
    }

    #[test]
    fn test_extract_record_id_skips_unrelated_events() {
        let unrelated = NotaryRegistry::AccessGranted {
            recordId: U256::from(9),
            viewer: address!("00000000000000000000000000000000000000bb"),
        }
        .encode_log_data();
        let logs = vec![unrelated, stored_event_log(7)];
        let id = extract_record_id(&logs, B256::ZERO, false);
        assert_eq!(id, RecordId::Confirmed(U256::from(7)));
    }

    #[test]
    fn test_extract_record_id_degrades_to_tx_hash() {
        let tx_hash = B256::repeat_byte(0xCD);
        let id = extract_record_id(&[], tx_hash, false);
        assert_eq!(id, RecordId::Degraded { tx_hash });
        assert_eq!(id.to_string(), format!("tx:{tx_hash}"));
    }

    #[test]
    fn test_single_submission_ignores_batch_event_and_vice_versa() {
        let single_log = vec![stored_event_log(1)];
        let id = extract_record_id(&single_log, B256::ZERO, true);
        assert!(matches!(id, RecordId::Degraded { .. }));
    }

    #[test]
    fn test_visibility_u8_roundtrip() {
        for vis in [Visibility::Public, Visibility::Private, Visibility::Shared] {
            assert_eq!(Visibility::from_u8(vis.as_u8()), Some(vis));
        }
        assert_eq!(Visibility::from_u8(3), None);
        assert_eq!(Visibility::default(), Visibility::Public);
    }

    #[test]
    fn test_visibility_parse() {
        assert_eq!("PUBLIC".parse::<Visibility>().unwrap(), Visibility::Public);
        assert_eq!("shared".parse::<Visibility>().unwrap(), Visibility::Shared);
        assert!("open".parse::<Visibility>().is_err());
    }

    #[test]
    fn test_hex_quantity_parsing() {
        assert_eq!(parse_hex_u64("0x1a").unwrap(), 26);
        assert_eq!(parse_hex_u128("0xde0b6b3a7640000").unwrap(), 10u128.pow(18));
        assert!(parse_hex_u64("nonsense").is_err());
    }
}
