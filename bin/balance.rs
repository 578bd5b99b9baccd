use std::env;

use ethers_providers::{Http, Provider};
use ethers_signers::LocalWallet;
use gsn_sdk::*;

/// Usage: balance <config.json> <private key> [token address]
#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = env::args().collect::<Vec<_>>();
    if args.len() < 3 {
        eyre::bail!("usage: {} <config.json> <private key> [token]", args[0]);
    }

    let config = NetworkConfig::from_path(&args[1])?;
    let wallet: LocalWallet = args[2].parse()?;
    let token = args.get(3).map(|t| t.parse()).transpose()?;

    let provider = Provider::<Http>::try_from(config.gsn.rpc_url.as_str())?;
    let network = Network::new(config, provider).with_account(wallet);

    let balance = network.display_balance(token).await?;
    println!("Balance: {}", balance);

    Ok(())
}
