//! Command line interface for the `endrpc` binary.
//!
//! `serve` runs a demo dispatcher and `call` issues a single request against
//! a running server. The same definition drives man page generation.

use std::net::SocketAddr;

use clap::{Parser, Subcommand};

/// Command line arguments for the `endrpc` binary.
#[derive(Debug, Parser)]
#[command(name = "endrpc", version, about = "Controller/action RPC server and client")]
pub struct Cli {
    /// Operation to perform.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands of the `endrpc` binary.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve a demo dispatcher exposing `hello/world`.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:7000")]
        addr: SocketAddr,
        /// Application name reported in request logs.
        #[arg(long, default_value = "endrpc-demo")]
        app_name: String,
        /// Expose Prometheus metrics on this address.
        #[arg(long)]
        metrics_addr: Option<SocketAddr>,
    },
    /// Call `controller/action` on a server and print the response.
    Call {
        /// Server address.
        #[arg(long, default_value = "127.0.0.1:7000")]
        addr: String,
        /// Controller half of the route.
        controller: String,
        /// Action half of the route.
        action: String,
        /// Request parameter as `key=value`; may be repeated.
        #[arg(short, long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
        /// Call deadline in milliseconds.
        #[arg(long, default_value_t = 3000)]
        timeout_ms: u64,
    },
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}
