//! Counter push server example
//!
//! Run with: cargo run --example counter_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example counter_server                    # binds to 0.0.0.0:8765
//!   cargo run --example counter_server 127.0.0.1:9000     # binds to 127.0.0.1:9000
//!
//! ## Talking to it
//!
//! With netcat, one JSON message per line:
//!   nc localhost 8765
//!   {"@type":"subscribe","id":"1","endpointName":"Counter","methodName":"count","params":[5,200]}
//!   {"@type":"subscribe","id":"2","endpointName":"Counter","methodName":"forever"}
//!   {"@type":"unsubscribe","id":"2"}
//!
//! ## Methods
//!
//! - `Counter.count(limit, interval_ms)`: emits 0..limit, then completes
//! - `Counter.forever(interval_ms)`: emits until unsubscribed
//! - `Counter.broken(after)`: emits `after` items, then fails
//! - `Counter.total()`: not a stream, subscribing is rejected

use std::net::SocketAddr;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde_json::Value;

use push_mux::gateway::{Invocation, InvocationError, InvocationGateway, ItemStream, ReturnKind, StreamError};
use push_mux::{PushServer, ServerConfig};

struct CounterGateway;

fn param_u64(invocation: &Invocation<'_>, index: usize, default: u64) -> Result<u64, InvocationError> {
    match invocation.param(index) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .ok_or_else(|| InvocationError::BadRequest(format!("parameter {} must be a non-negative integer", index))),
    }
}

fn ticks(interval: Duration) -> impl futures::Stream<Item = u64> {
    stream::unfold(0u64, move |n| async move {
        tokio::time::sleep(interval).await;
        Some((n, n + 1))
    })
}

impl InvocationGateway for CounterGateway {
    fn return_kind(&self, endpoint: &str, method: &str) -> Option<ReturnKind> {
        match (endpoint, method) {
            ("Counter", "count" | "forever" | "broken") => Some(ReturnKind::Stream),
            ("Counter", "total") => Some(ReturnKind::Value),
            _ => None,
        }
    }

    fn invoke(&self, invocation: Invocation<'_>) -> Result<ItemStream, InvocationError> {
        match invocation.method {
            "count" => {
                let limit = param_u64(&invocation, 0, 10)?;
                let interval = Duration::from_millis(param_u64(&invocation, 1, 500)?);
                Ok(ticks(interval).take(limit as usize).map(|n| Ok(Value::from(n))).boxed())
            }
            "forever" => {
                let interval = Duration::from_millis(param_u64(&invocation, 0, 1000)?);
                Ok(ticks(interval).map(|n| Ok(Value::from(n))).boxed())
            }
            "broken" => {
                let after = param_u64(&invocation, 0, 3)?;
                Ok(ticks(Duration::from_millis(200))
                    .map(move |n| {
                        if n < after {
                            Ok(Value::from(n))
                        } else {
                            Err(StreamError::from("counter overflowed"))
                        }
                    })
                    .boxed())
            }
            other => Err(InvocationError::NotFound(format!("Counter.{}", other))),
        }
    }
}

fn print_usage() {
    println!("Usage: counter_server [BIND_ADDR]");
    println!();
    println!("BIND_ADDR defaults to 0.0.0.0:8765");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let mut config = ServerConfig::default();
    if let Some(addr) = args.get(1) {
        match addr.parse::<SocketAddr>() {
            Ok(addr) => config = config.bind(addr),
            Err(e) => {
                eprintln!("Error: invalid address '{}': {}", addr, e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("push_mux=debug".parse()?)
                .add_directive("counter_server=debug".parse()?),
        )
        .init();

    println!("Starting push server on {}", config.bind_addr);

    let server = PushServer::new(config, CounterGateway);
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    Ok(())
}
