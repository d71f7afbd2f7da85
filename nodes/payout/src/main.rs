use {
    clap::Parser,
    std::{path::PathBuf, process::ExitCode},
};

mod config;
mod payout;
mod split;

/// Split the free balance of a keystore account between the main and the dust reward
/// destination.
#[derive(Parser)]
struct Command {
    /// Path to config file.
    #[clap(short, long, env = "PAYOUT_CONFIG", default_value = "./config/main.yaml")]
    config: PathBuf,
    /// Compute and log the split without submitting it.
    #[clap(long, env = "PAYOUT_DRY_RUN")]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let cmd = Command::parse();
    let options = payout::Options {
        dry_run: cmd.dry_run,
    };

    let res = payout::run(
        &cmd.config,
        options,
        &chain_api::Websocket,
        tokio::signal::ctrl_c(),
    )
    .await;

    match res {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
