//! # Calculator Service
//!
//! A small JSON-RPC service showing blocking and suspending methods,
//! a named module, a token protected method and a periodic heartbeat.
//!
//! ```bash
//! cargo run -p calculator-service -- --port 8000 --token s3cr3t
//!
//! curl -s http://127.0.0.1:8000/api -H 'Content-Type: application/json' \
//!   -d '{"jsonrpc":"2.0","method":"subtract","params":[42,23],"id":1}'
//! ```

use std::time::Duration;

use clap::Parser;
use quarry_derive::exposed_method;
use quarry_server::{HeaderStrategy, KwArgs, Module, PeriodicTask, Service, ServiceConfig, VarArgs};
use serde_json::{Value, json};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on [default: 127.0.0.1, or CALCULATOR_HOST]
    #[arg(long)]
    host: Option<String>,

    /// [default: 8000, or CALCULATOR_PORT]
    #[arg(short, long)]
    port: Option<u16>,

    /// Size of the blocking worker pool
    #[arg(short, long)]
    workers: Option<usize>,

    /// Token accepted for private methods (X-Api-Token header)
    #[arg(long, default_value = "s3cr3t")]
    token: String,

    /// Expose get_service_stats
    #[arg(long, default_value = "false")]
    stats: bool,
}

impl Args {
    /// Flags given on the command line win over the environment
    fn apply(&self, mut config: ServiceConfig) -> ServiceConfig {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(workers) = self.workers {
            config.max_parallel_blocking_tasks = workers;
        }
        if self.stats {
            config.use_statistics = true;
        }
        config
    }
}

#[derive(Debug, thiserror::Error)]
#[error("division by zero")]
struct ZeroDivisionError;

/// Subtract the subtrahend from the minuend
#[exposed_method]
fn subtract(minuend: f64, subtrahend: f64) -> f64 {
    minuend - subtrahend
}

/// Sum of any number of values
#[exposed_method]
fn sum(values: VarArgs) -> Result<f64, quarry_server::MethodError> {
    Ok(values.parse::<f64>()?.into_iter().sum())
}

#[exposed_method]
fn divide(a: f64, b: f64) -> Result<f64, ZeroDivisionError> {
    if b == 0.0 {
        return Err(ZeroDivisionError);
    }
    Ok(a / b)
}

/// Integer power with an optional modulus
#[exposed_method(name = "math.pow")]
fn pow(base: i64, exponent: u32, modulus: Option<i64>) -> Result<i64, quarry_server::MethodError> {
    let value = base
        .checked_pow(exponent)
        .ok_or_else(|| quarry_server::MethodError::failed("OverflowError", "result too large"))?;
    match modulus {
        Some(0) => Err(ZeroDivisionError.into()),
        Some(modulus) => Ok(value % modulus),
        None => Ok(value),
    }
}

/// Echo the keyword arguments back
#[exposed_method(name = "math.describe")]
async fn describe(options: KwArgs) -> Value {
    json!({ "received": options.into_value() })
}

#[exposed_method(private)]
async fn shutdown_hint() -> String {
    "press Ctrl-C on the host".to_string()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = args.apply(ServiceConfig::new("calculator").apply_env("CALCULATOR")?);

    let token = args.token;
    let service = Service::builder()
        .config(config)
        .method(SubtractMethod)
        .method(SumMethod)
        .method(DivideMethod)
        .method(ShutdownHintMethod)
        .module(Module::new("math").method(PowMethod).method(DescribeMethod))
        .periodic_task(PeriodicTask::suspending(
            "heartbeat",
            Duration::from_secs(30),
            || async { debug!("calculator is alive") },
        ))
        .validation_strategy(HeaderStrategy::default())
        .token_validator(move |candidate: Option<&str>| candidate == Some(token.as_str()))
        .build()?;

    info!(
        "Calculator listening at {} with {} methods",
        service.specs().accessible_at,
        service.specs().methods.len()
    );
    service.start()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_env(vars: &[(&str, &str)]) -> ServiceConfig {
        let vars: HashMap<_, _> = vars.iter().copied().collect();
        ServiceConfig::new("calculator")
            .apply_vars("CALCULATOR", |key| vars.get(key).map(|v| v.to_string()))
            .unwrap()
    }

    #[test]
    fn test_environment_survives_without_flags() {
        let env = from_env(&[
            ("CALCULATOR_HOST", "0.0.0.0"),
            ("CALCULATOR_PORT", "9100"),
            ("CALCULATOR_USE_STATISTICS", "true"),
        ]);
        let config = Args::parse_from(["calculator-service"]).apply(env);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9100);
        assert!(config.use_statistics);
    }

    #[test]
    fn test_flags_override_environment() {
        let env = from_env(&[("CALCULATOR_HOST", "0.0.0.0"), ("CALCULATOR_PORT", "9100")]);
        let config = Args::parse_from(["calculator-service", "--host", "10.0.0.5", "--port", "7000", "-w", "3"])
            .apply(env);
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, 7000);
        assert_eq!(config.max_parallel_blocking_tasks, 3);
    }

    #[test]
    fn test_defaults_without_flags_or_environment() {
        let config = Args::parse_from(["calculator-service"]).apply(from_env(&[]));
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert!(!config.use_statistics);
    }
}
