//! `endrpc` binary: a demo server and a one-shot client.

mod cli;

use std::{error::Error, net::SocketAddr, process::ExitCode, time::Duration};

use clap::Parser;
use endrpc::{
    Caller,
    DispatchError,
    Dispatcher,
    Server,
    client::ClientConfig,
    context::RequestContext,
    middleware,
};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    match run(Cli::parse().command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "endrpc failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Serve {
            addr,
            app_name,
            metrics_addr,
        } => {
            install_metrics(metrics_addr)?;
            let server = Server::new(demo_dispatcher(&app_name)?).bind(addr)?;
            tracing::info!(addr = ?server.local_addr(), app = %app_name, "serving");
            server.run().await?;
        }
        Command::Call {
            addr,
            controller,
            action,
            params,
            timeout_ms,
        } => {
            let config = ClientConfig::default().call_timeout(Duration::from_millis(timeout_ms));
            let bytes = Caller::new(config)
                .call_end_api(&addr, &controller, &action, params.into_iter().collect())
                .await?;
            println!("{}", String::from_utf8_lossy(&bytes));
        }
    }
    Ok(())
}

fn demo_dispatcher(app_name: &str) -> Result<Dispatcher, DispatchError> {
    Dispatcher::new(app_name)
        .wrap(middleware::recover)
        .wrap(middleware::logger)
        .register_func("hello", "world", |c: &mut RequestContext| {
            let greeting = format!("hi {}", c.string_param("name"));
            c.success_response(&greeting);
        })
}

#[cfg(feature = "metrics")]
fn install_metrics(addr: Option<SocketAddr>) -> Result<(), Box<dyn Error>> {
    if let Some(addr) = addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        tracing::info!(%addr, "prometheus exporter listening");
    }
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics(addr: Option<SocketAddr>) -> Result<(), Box<dyn Error>> {
    if addr.is_some() {
        tracing::warn!("built without the `metrics` feature; ignoring --metrics-addr");
    }
    Ok(())
}
