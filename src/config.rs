/// Configuration for the notary client.
///
/// Secrets (signer key, archive sealing secret) are read once at
/// construction, held in zeroizing buffers, and never logged.
use alloy::primitives::Address;
use zeroize::Zeroizing;

use crate::error::{NotaryError, Result};

/// Ledger connection settings.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// EVM JSON-RPC endpoint.
    pub rpc_url: String,
    /// Chain ID for transaction signing.
    pub chain_id: u64,
    /// Human-readable network label (e.g. "sepolia"), embedded in
    /// certificates and receipts.
    pub network: String,
    /// Registry contract (record anchoring, access control).
    pub registry_address: Address,
    /// Fungible-token contract (pricing, allowance).
    pub token_address: Address,
    /// Block-explorer base URL for receipt links (e.g.
    /// "https://sepolia.etherscan.io/tx/").
    pub explorer_base: String,
    /// Whether `ensure_spending_allowance` may issue a maximal one-time
    /// approval when the current allowance is insufficient.
    pub auto_approve: bool,
}

/// Content-storage connection settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// IPFS HTTP API endpoint (e.g. "http://localhost:5001").
    pub api_url: String,
    /// IPFS gateway base for retrieval URLs (e.g. "https://ipfs.io/ipfs/").
    pub gateway_base: String,
}

/// Top-level notary configuration.
pub struct NotaryConfig {
    pub ledger: LedgerConfig,
    pub storage: StorageConfig,
    /// Transaction-signing private key, hex without 0x prefix.
    pub signer_key_hex: Zeroizing<String>,
    /// Secret used to derive the archive sealing key. Required only when
    /// `encrypt_archives` is set.
    pub seal_secret: Option<Zeroizing<String>>,
    /// Seal archived exchange payloads before upload.
    pub encrypt_archives: bool,
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| NotaryError::Configuration(format!("missing environment variable {name}")))
}

fn parse_address(name: &str, value: &str) -> Result<Address> {
    value
        .parse()
        .map_err(|_| NotaryError::Configuration(format!("{name} is not a valid address")))
}

impl NotaryConfig {
    /// Read configuration from `NOTARY_*` environment variables.
    ///
    /// Required: `NOTARY_RPC_URL`, `NOTARY_CHAIN_ID`, `NOTARY_SIGNER_KEY`,
    /// `NOTARY_REGISTRY_ADDRESS`, `NOTARY_TOKEN_ADDRESS`.
    /// Optional: `NOTARY_NETWORK`, `NOTARY_EXPLORER_BASE`,
    /// `NOTARY_IPFS_API_URL`, `NOTARY_IPFS_GATEWAY`, `NOTARY_SEAL_SECRET`,
    /// `NOTARY_ENCRYPT_ARCHIVES`, `NOTARY_AUTO_APPROVE`.
    pub fn from_env() -> Result<Self> {
        let chain_id = env_var("NOTARY_CHAIN_ID")?
            .parse::<u64>()
            .map_err(|_| NotaryError::Configuration("NOTARY_CHAIN_ID is not a number".into()))?;

        let registry = env_var("NOTARY_REGISTRY_ADDRESS")?;
        let token = env_var("NOTARY_TOKEN_ADDRESS")?;

        let encrypt_archives = std::env::var("NOTARY_ENCRYPT_ARCHIVES")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let auto_approve = std::env::var("NOTARY_AUTO_APPROVE")
            .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true);

        let seal_secret = std::env::var("NOTARY_SEAL_SECRET").ok().map(Zeroizing::new);
        if encrypt_archives && seal_secret.is_none() {
            return Err(NotaryError::Configuration(
                "NOTARY_ENCRYPT_ARCHIVES is set but NOTARY_SEAL_SECRET is missing".into(),
            ));
        }

        Ok(Self {
            ledger: LedgerConfig {
                rpc_url: env_var("NOTARY_RPC_URL")?,
                chain_id,
                network: std::env::var("NOTARY_NETWORK").unwrap_or_else(|_| "mainnet".into()),
                registry_address: parse_address("NOTARY_REGISTRY_ADDRESS", &registry)?,
                token_address: parse_address("NOTARY_TOKEN_ADDRESS", &token)?,
                explorer_base: std::env::var("NOTARY_EXPLORER_BASE")
                    .unwrap_or_else(|_| "https://etherscan.io/tx/".into()),
                auto_approve,
            },
            storage: StorageConfig {
                api_url: std::env::var("NOTARY_IPFS_API_URL")
                    .unwrap_or_else(|_| "http://localhost:5001".into()),
                gateway_base: std::env::var("NOTARY_IPFS_GATEWAY")
                    .unwrap_or_else(|_| "https://ipfs.io/ipfs/".into()),
            },
            signer_key_hex: Zeroizing::new(env_var("NOTARY_SIGNER_KEY")?),
            seal_secret,
            encrypt_archives,
        })
    }
}
