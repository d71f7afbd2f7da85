#![allow(async_fn_in_trait)]

pub use {
    keystore::{Account, AccountSigner, Keystore, KeystoreError},
    subxt::utils::AccountId32 as AccountId,
};
use subxt::{
    backend::{legacy::LegacyRpcMethods, rpc::RpcClient},
    dynamic::{self, At, Value},
    OnlineClient, PolkadotConfig,
};

pub mod keystore;

pub type Config = PolkadotConfig;
pub type Balance = u128;
pub type BlockHash = <Config as subxt::Config>::Hash;
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub const DEFAULT_DECIMALS: u8 = 12;
pub const DEFAULT_SYMBOL: &str = "UNIT";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to {0}: {1}")]
    Connection(String, subxt::Error),
    #[error("failed to query {0}: {1}")]
    Query(&'static str, subxt::Error),
    #[error("unexpected shape of {0}")]
    Malformed(&'static str),
    #[error("failed to submit batch: {0}")]
    Submission(subxt::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub decimals: u8,
    pub symbol: String,
}

impl Default for TokenInfo {
    fn default() -> Self {
        Self {
            decimals: DEFAULT_DECIMALS,
            symbol: DEFAULT_SYMBOL.to_owned(),
        }
    }
}

impl TokenInfo {
    /// Reads `tokenDecimals` and `tokenSymbol` from `system_properties`. Multi-token chains
    /// report arrays, the first entry is the native token.
    pub fn from_properties(
        properties: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self> {
        fn first(value: &serde_json::Value) -> &serde_json::Value {
            value.as_array().and_then(|a| a.first()).unwrap_or(value)
        }

        let mut info = Self::default();
        if let Some(decimals) = properties.get("tokenDecimals") {
            info.decimals = first(decimals)
                .as_u64()
                .and_then(|d| u8::try_from(d).ok())
                .ok_or(Error::Malformed("tokenDecimals"))?;
        }
        if let Some(symbol) = properties.get("tokenSymbol") {
            info.symbol = first(symbol)
                .as_str()
                .ok_or(Error::Malformed("tokenSymbol"))?
                .to_owned();
        }
        Ok(info)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    Amount { dest: AccountId, amount: Balance },
    All { dest: AccountId, keep_alive: bool },
}

impl Transfer {
    fn into_call(self) -> Value {
        fn address(dest: AccountId) -> Value {
            Value::unnamed_variant("Id", [Value::from_bytes(dest.0)])
        }

        match self {
            Self::Amount { dest, amount } => dynamic::tx(
                "Balances",
                "transfer_allow_death",
                vec![address(dest), Value::u128(amount)],
            ),
            Self::All { dest, keep_alive } => dynamic::tx(
                "Balances",
                "transfer_all",
                vec![address(dest), Value::bool(keep_alive)],
            ),
        }
        .into_value()
    }
}

/// Everything the payout needs from a connected chain.
pub trait Chain: Sized {
    async fn token(&self) -> Result<TokenInfo>;
    async fn free_balance(&self, account: &AccountId) -> Result<Balance>;
    async fn existential_deposit(&self) -> Result<Balance>;
    /// Submits `transfers` as one atomic batch and resolves once it is in a block.
    async fn submit_batch(
        &self,
        signer: &AccountSigner,
        transfers: Vec<Transfer>,
    ) -> Result<BlockHash>;
    async fn disconnect(self);
}

pub trait Connector {
    type Chain: Chain;

    async fn connect(&self, endpoint: &str) -> Result<Self::Chain>;
}

/// Connects over websocket.
#[derive(Debug, Default, Clone, Copy)]
pub struct Websocket;

impl Connector for Websocket {
    type Chain = Client;

    async fn connect(&self, endpoint: &str) -> Result<Client> {
        Client::connect(endpoint).await
    }
}

pub struct Client {
    endpoint: String,
    legacy: LegacyRpcMethods<Config>,
    client: OnlineClient<Config>,
}

impl Client {
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let err = |e| Error::Connection(endpoint.to_owned(), e);
        let rpc = RpcClient::from_url(endpoint).await.map_err(err)?;
        let client = OnlineClient::<Config>::from_rpc_client(rpc.clone())
            .await
            .map_err(err)?;
        log::debug!(
            "connected to {endpoint}, runtime spec version {}",
            client.runtime_version().spec_version
        );

        Ok(Self {
            endpoint: endpoint.to_owned(),
            legacy: LegacyRpcMethods::new(rpc),
            client,
        })
    }
}

impl Chain for Client {
    async fn token(&self) -> Result<TokenInfo> {
        let properties = self
            .legacy
            .system_properties()
            .await
            .map_err(|e| Error::Query("system properties", e))?;
        TokenInfo::from_properties(&properties)
    }

    async fn free_balance(&self, account: &AccountId) -> Result<Balance> {
        let err = |e| Error::Query("account info", e);
        let query = dynamic::storage("System", "Account", vec![Value::from_bytes(account.0)]);
        let Some(info) = self
            .client
            .storage()
            .at_latest()
            .await
            .map_err(err)?
            .fetch(&query)
            .await
            .map_err(err)?
        else {
            return Ok(0);
        };

        info.to_value()
            .map_err(err)?
            .at("data")
            .at("free")
            .and_then(|free| free.as_u128())
            .ok_or(Error::Malformed("account info"))
    }

    async fn existential_deposit(&self) -> Result<Balance> {
        let err = |e| Error::Query("existential deposit", e);
        let query = dynamic::constant("Balances", "ExistentialDeposit");
        self.client
            .constants()
            .at(&query)
            .map_err(err)?
            .to_value()
            .map_err(err)?
            .as_u128()
            .ok_or(Error::Malformed("existential deposit"))
    }

    async fn submit_batch(
        &self,
        signer: &AccountSigner,
        transfers: Vec<Transfer>,
    ) -> Result<BlockHash> {
        let calls = transfers
            .into_iter()
            .map(Transfer::into_call)
            .collect::<Vec<_>>();
        let batch = dynamic::tx("Utility", "batch_all", vec![Value::unnamed_composite(calls)]);

        let in_block = self
            .client
            .tx()
            .sign_and_submit_then_watch_default(&batch, signer)
            .await
            .map_err(Error::Submission)?
            .wait_for_in_block()
            .await
            .map_err(Error::Submission)?;

        Ok(in_block.block_hash())
    }

    async fn disconnect(self) {
        log::debug!("disconnecting from {}", self.endpoint);
    }
}

pub fn to_hex(hash: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(hash))
}
