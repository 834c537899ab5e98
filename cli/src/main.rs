//! relayrpc CLI — call gateway methods against REST peers from the terminal.
//!
//! Usage:
//! ```bash
//! # Fetch the latest block from a local peer
//! relayrpc call --method blocks.latest --peer 127.0.0.1:4003:4002
//!
//! # Look up a block, using peers and TTLs from a config file
//! relayrpc call --config relayrpc.json --method blocks.info --params '{"id":"123"}'
//!
//! # List methods and their effective cache TTLs
//! relayrpc methods
//! ```

mod logging;

use std::env;
use std::process;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;

use relayrpc_core::peer::Peer;
use relayrpc_core::request::JsonRpcRequest;
use relayrpc_core::{GatewayConfig, HealthStatus};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "call" => cmd_call(&args[2..]).await,
        "methods" => cmd_methods(&args[2..]),
        "peers" => cmd_peers(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("relayrpc {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("relayrpc {}", env!("CARGO_PKG_VERSION"));
    println!("JSON-RPC gateway over REST peers\n");
    println!("USAGE:");
    println!("    relayrpc <COMMAND>\n");
    println!("COMMANDS:");
    println!("    call       Invoke a method and print the JSON-RPC response");
    println!("    methods    List methods and their cache TTLs");
    println!("    peers      Check configured peers and show circuit and pool health");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("FLAGS:");
    println!("    --config <FILE>               JSON config file");
    println!("    --peer <HOST:API[:P2P]>       Peer to use (repeatable, overrides config peers)");
    println!("    --method <NAME>               Method to call  [call]");
    println!("    --params <JSON>               Params object   [call, default {{}}]");
}

/// Load `--config` (or defaults) and apply `--peer` overrides.
fn load_config(args: &[String]) -> Result<GatewayConfig> {
    let mut config = match parse_flag(args, "--config") {
        Some(path) => GatewayConfig::from_file(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => GatewayConfig::default(),
    };
    let peers = parse_flags(args, "--peer")
        .iter()
        .map(|s| parse_peer(s))
        .collect::<Result<Vec<_>>>()?;
    if !peers.is_empty() {
        config.peers = peers;
    }
    Ok(config)
}

async fn cmd_call(args: &[String]) -> Result<()> {
    let method = parse_flag(args, "--method").ok_or_else(|| anyhow!("--method is required"))?;
    let params: Value = match parse_flag(args, "--params") {
        Some(raw) => serde_json::from_str(&raw).context("--params is not valid JSON")?,
        None => Value::Object(Default::default()),
    };

    let config = load_config(args)?;
    logging::init_tracing(&config.log);
    if config.peers.is_empty() {
        tracing::warn!("no peers configured; every call will be unavailable");
    }

    let (registry, _pool) = relayrpc_methods::connect(&config)?;
    let response = registry.handle(JsonRpcRequest::new(1, method, params)).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.is_ok() {
        process::exit(2);
    }
    Ok(())
}

fn cmd_methods(args: &[String]) -> Result<()> {
    let config = load_config(args)?;
    println!("{:<24} TTL", "METHOD");
    for (name, default) in relayrpc_methods::DEFAULT_TTLS {
        let ttl = config.ttl_for(name, *default);
        let ttl = if ttl == 0 { "uncached".to_string() } else { format!("{ttl}s") };
        println!("{name:<24} {ttl}");
    }
    Ok(())
}

async fn cmd_peers(args: &[String]) -> Result<()> {
    let config = load_config(args)?;
    logging::init_tracing(&config.log);
    if config.peers.is_empty() {
        bail!("no peers configured (use --config or --peer)");
    }

    let (rows, health) = peer_report(config).await?;
    println!("{:<28} {:<10} {:<10} CIRCUIT", "API", "P2P PORT", "REACHABLE");
    for row in rows {
        println!("{row}");
    }
    println!("\npool: {health}");
    Ok(())
}

/// Check every peer through the pool and render one table row per peer.
async fn peer_report(mut config: GatewayConfig) -> Result<(Vec<String>, HealthStatus)> {
    config.probe_reachability = true;
    let (_registry, pool) = relayrpc_methods::connect(&config)?;
    let reachable = pool.check_all().await;
    let circuits = pool.health_summary();

    let rows = reachable
        .iter()
        .map(|(peer, up)| {
            let up = match up {
                Some(true) => "yes",
                Some(false) => "no",
                None => "-",
            };
            let circuit = circuits
                .iter()
                .find(|(p, _)| p == peer)
                .map(|(_, state)| state.to_string())
                .unwrap_or_else(|| "-".to_string());
            format!("{:<28} {:<10} {up:<10} {circuit}", peer.to_string(), peer.p2p_port)
        })
        .collect();
    Ok((rows, pool.health()))
}

/// `host:api_port[:p2p_port]`; the p2p port defaults to the api port.
fn parse_peer(raw: &str) -> Result<Peer> {
    let mut parts = raw.split(':');
    let host = parts.next().filter(|h| !h.is_empty());
    let api = parts.next().map(str::parse::<u16>);
    let p2p = parts.next().map(str::parse::<u16>);
    match (host, api, p2p, parts.next()) {
        (Some(host), Some(Ok(api)), None, None) => Ok(Peer::new(host, api, api)),
        (Some(host), Some(Ok(api)), Some(Ok(p2p)), None) => Ok(Peer::new(host, p2p, api)),
        _ => bail!("invalid --peer {raw:?}, expected host:api_port[:p2p_port]"),
    }
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn parse_flags(args: &[String], flag: &str) -> Vec<String> {
    args.windows(2)
        .filter(|w| w[0] == flag)
        .map(|w| w[1].clone())
        .collect()
}
