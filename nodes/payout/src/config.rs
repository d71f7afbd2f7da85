use {
    crate::split::Share,
    chain_api::AccountId,
    config::{Report, SchemaError},
    serde::Deserialize,
    std::path::{Path, PathBuf},
};

#[derive(Debug, Clone)]
pub struct Config {
    pub end_point: String,
    pub rewards: RewardsDestination,
    pub keystore: KeystoreConfig,
}

#[derive(Debug, Clone)]
pub struct RewardsDestination {
    pub main: AccountId,
    pub share: Share,
    pub dust: AccountId,
}

#[derive(Clone)]
pub struct KeystoreConfig {
    pub wallet_file_path: PathBuf,
    pub password: String,
}

impl std::fmt::Debug for KeystoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeystoreConfig")
            .field("wallet_file_path", &self.wallet_file_path)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize, Default)]
struct RawConfig {
    end_point: Option<String>,
    #[serde(rename = "rewardsDestination")]
    rewards_destination: Option<RawRewardsDestination>,
    keystore: Option<RawKeystore>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawRewardsDestination {
    main_destination_address: Option<String>,
    main_destination_share: Option<serde_yaml::Value>,
    dust_destination_address: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawKeystore {
    wallet_file_path: Option<PathBuf>,
    password: Option<String>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, crate::payout::PayoutError> {
        let raw = ::config::load::<Option<RawConfig>>(path)?;
        Ok(Self::validate(raw.unwrap_or_default())?)
    }

    #[cfg(test)]
    pub fn from_yaml(content: &str) -> Result<Self, SchemaError> {
        let raw = ::config::parse::<Option<RawConfig>>(content).unwrap();
        Self::validate(raw.unwrap_or_default())
    }

    fn validate(raw: RawConfig) -> Result<Self, SchemaError> {
        let rewards = raw.rewards_destination.unwrap_or_default();
        let keystore = raw.keystore.unwrap_or_default();
        let mut report = Report::default();

        let end_point = report.require("end_point", raw.end_point);
        if let Some(url) = &end_point {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                report.invalid("end_point", "expected a ws:// or wss:// url");
            }
        }

        let main = report.parse::<AccountId>(
            "rewardsDestination.mainDestinationAddress",
            rewards.main_destination_address,
        );
        let share = report.parse::<Share>(
            "rewardsDestination.mainDestinationShare",
            rewards.main_destination_share.map(|share| match share {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                other => format!("{other:?}"),
            }),
        );
        let dust = report.parse::<AccountId>(
            "rewardsDestination.dustDestinationAddress",
            rewards.dust_destination_address,
        );

        let wallet_file_path = report.require("keystore.walletFilePath", keystore.wallet_file_path);
        let password = report.require("keystore.password", keystore.password);

        report.finish(|| {
            Some(Self {
                end_point: end_point?,
                rewards: RewardsDestination {
                    main: main?,
                    share: share?,
                    dust: dust?,
                },
                keystore: KeystoreConfig {
                    wallet_file_path: wallet_file_path?,
                    password: password?,
                },
            })
        })
    }
}
