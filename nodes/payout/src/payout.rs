use {
    crate::{
        config::{Config, KeystoreConfig, RewardsDestination},
        split::{format_units, TransferPlan},
    },
    chain_api::{AccountSigner, BlockHash, Chain, Connector, Keystore, KeystoreError},
    std::{
        future::Future,
        io,
        path::{Path, PathBuf},
        time::Duration,
    },
};

/// Time the operator gets to interrupt a payout that would leave a destination below the
/// existential deposit.
pub const SAFETY_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum PayoutError {
    #[error("failed to read config file {0:?}: {1}")]
    ConfigRead(PathBuf, io::Error),
    #[error("failed to parse config file {0:?}: {1}")]
    ConfigParse(PathBuf, serde_yaml::Error),
    #[error("invalid config:\n{0}")]
    Schema(#[from] ::config::SchemaError),
    #[error("failed to load keystore {0:?}: {1}")]
    KeystoreRead(PathBuf, KeystoreError),
    #[error("failed to unlock keystore {0:?}: {1}")]
    Decryption(PathBuf, KeystoreError),
    #[error("Failed to initialize keystore, account is locked")]
    LockedAccount,
    #[error("{0}")]
    Connection(chain_api::Error),
    #[error("{0}")]
    Query(chain_api::Error),
    #[error("{0}")]
    Submission(chain_api::Error),
    #[error("payout aborted by operator")]
    Aborted,
}

impl PayoutError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::LockedAccount => 1,
            Self::ConfigRead(..) => 2,
            Self::ConfigParse(..) => 3,
            Self::Schema(_) => 4,
            Self::KeystoreRead(..) => 5,
            Self::Decryption(..) => 6,
            Self::Connection(_) => 7,
            Self::Query(_) => 8,
            Self::Submission(_) => 9,
            Self::Aborted => 130,
        }
    }
}

impl From<::config::LoadError> for PayoutError {
    fn from(err: ::config::LoadError) -> Self {
        match err {
            ::config::LoadError::Read(path, e) => Self::ConfigRead(path, e),
            ::config::LoadError::Parse(path, e) => Self::ConfigParse(path, e),
        }
    }
}

impl From<chain_api::Error> for PayoutError {
    fn from(err: chain_api::Error) -> Self {
        match err {
            chain_api::Error::Connection(..) => Self::Connection(err),
            chain_api::Error::Query(..) | chain_api::Error::Malformed(_) => Self::Query(err),
            chain_api::Error::Submission(_) => Self::Submission(err),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Options {
    pub dry_run: bool,
}

/// Runs the whole payout. The connection is opened only after the account is unlocked and is
/// released on every path past that point. Returns the block including the batch, `None` on a
/// dry run.
///
/// `interrupt` resolves when the operator asks to stop, it aborts both the safety delay and the
/// wait for inclusion.
pub async fn run(
    config_path: &Path,
    options: Options,
    connector: &impl Connector,
    interrupt: impl Future<Output = io::Result<()>>,
) -> Result<Option<BlockHash>, PayoutError> {
    log::debug!("Reading config from file {}", config_path.display());
    let config = Config::load(config_path)?;

    let signer = unlock(&config.keystore)?;

    log::debug!("Connecting to {}", config.end_point);
    let chain = connector.connect(&config.end_point).await?;
    let res = payout(&chain, &signer, &config.rewards, options, interrupt).await;
    chain.disconnect().await;
    res
}

fn unlock(config: &KeystoreConfig) -> Result<AccountSigner, PayoutError> {
    let path = &config.wallet_file_path;
    log::debug!("Reading account key from {}", path.display());

    let account = Keystore::from_file(path)
        .and_then(|keystore| keystore.unlock(&config.password))
        .map_err(|e| match e {
            KeystoreError::Decryption(_) => PayoutError::Decryption(path.clone(), e),
            e => PayoutError::KeystoreRead(path.clone(), e),
        })?;

    account.signer().ok_or(PayoutError::LockedAccount)
}

async fn payout(
    chain: &impl Chain,
    signer: &AccountSigner,
    rewards: &RewardsDestination,
    options: Options,
    interrupt: impl Future<Output = io::Result<()>>,
) -> Result<Option<BlockHash>, PayoutError> {
    let interrupt = interrupted(interrupt);
    tokio::pin!(interrupt);

    let token = chain.token().await?;
    let units = |amount| format!("{} {}", format_units(amount, token.decimals), token.symbol);

    let balance = chain.free_balance(signer.address()).await?;
    log::debug!(
        "Account {} has free balance of: {}",
        signer.address(),
        units(balance)
    );

    let existential_deposit = chain.existential_deposit().await?;
    let plan = TransferPlan::new(balance, token.decimals, rewards.share);
    log::debug!(
        "Splitting {} {}: {} {} ({}%) to {} and the remaining {} {} to {}",
        plan.decimal_balance(),
        token.symbol,
        plan.main_amount(),
        token.symbol,
        rewards.share,
        rewards.main,
        plan.dust_amount(),
        token.symbol,
        rewards.dust,
    );

    let below = plan.below_existential_deposit(existential_deposit);
    if !below.is_empty() {
        log::warn!(
            "The {} amount would be below the existential deposit of {}, \
             interrupt within {}s to abort",
            below.join(" and "),
            units(existential_deposit),
            SAFETY_DELAY.as_secs(),
        );
        tokio::select! {
            _ = tokio::time::sleep(SAFETY_DELAY) => {}
            _ = &mut interrupt => return Err(PayoutError::Aborted),
        }
    }

    if options.dry_run {
        log::info!("Dry run, the batch is not submitted");
        return Ok(None);
    }

    let transfers = plan.transfers(rewards.main.clone(), rewards.dust.clone());
    let block = tokio::select! {
        block = chain.submit_batch(signer, transfers) => block?,
        _ = &mut interrupt => return Err(PayoutError::Aborted),
    };
    log::info!("Batch included in block {}", chain_api::to_hex(block));
    Ok(Some(block))
}

/// Resolves once the operator interrupts, never when interrupts cannot be observed.
async fn interrupted(signal: impl Future<Output = io::Result<()>>) {
    if let Err(e) = signal.await {
        log::warn!("Cannot listen for interrupts ({e}), continuing without a gate");
        std::future::pending::<()>().await;
    }
}
