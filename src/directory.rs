use crate::error::Error;
use crate::types::Endpoint;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
    Localnet,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
            Network::Localnet => "localnet",
        };
        f.write_str(name)
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "devnet" => Ok(Network::Devnet),
            "localnet" => Ok(Network::Localnet),
            other => Err(Error::UnknownNetwork(other.to_string())),
        }
    }
}

const MAINNET: &[&str] = &[
    "https://fullnode.mainnet.sui.io:443",
    "https://mainnet.suiet.app",
    "https://rpc-mainnet.suiscan.xyz",
    "https://mainnet.sui.rpcpool.com",
    "https://sui-mainnet.nodeinfra.com",
    "https://mainnet-rpc.sui.chainbase.online",
    "https://sui-mainnet-ca-1.cosmostation.io",
    "https://sui-mainnet-ca-2.cosmostation.io",
    "https://sui-mainnet-us-1.cosmostation.io",
    "https://sui-mainnet-us-2.cosmostation.io",
    "https://sui-rpc.publicnode.com",
    "https://sui-mainnet-endpoint.blockvision.org",
];

const TESTNET: &[&str] = &[
    "https://fullnode.testnet.sui.io:443",
    "https://rpc-testnet.suiscan.xyz",
    "https://sui-testnet-endpoint.blockvision.org",
    "https://sui-testnet.public.blastapi.io",
    "https://testnet.suiet.app",
];

const DEVNET: &[&str] = &["https://fullnode.devnet.sui.io:443"];

const LOCALNET: &[&str] = &["http://127.0.0.1:9000"];

/// Candidate endpoints for a network, all enabled, in directory order.
/// Treated as a one-time seed.
pub fn seed_endpoints(network: Network) -> Vec<Endpoint> {
    let urls = match network {
        Network::Mainnet => MAINNET,
        Network::Testnet => TESTNET,
        Network::Devnet => DEVNET,
        Network::Localnet => LOCALNET,
    };
    urls.iter().map(|url| Endpoint::new(*url)).collect()
}
