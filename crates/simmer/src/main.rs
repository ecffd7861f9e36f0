mod args;
mod metrics_server;

use args::Args;
use clap::error::ErrorKind;
use clap::Parser;
use simmer_core::report;
use std::fmt::Display;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const EX_USAGE: i32 = 64;

fn usage_exit(msg: impl Display) -> ! {
    eprintln!("{msg}");
    eprintln!("Try --help for help.");
    std::process::exit(EX_USAGE);
}

/// Exit status for a clap early exit. Help counts as a usage exit.
fn exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::DisplayVersion => 0,
        _ => EX_USAGE,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = match Args::try_parse() {
        Ok(a) => a,
        Err(e) => {
            let _ = e.print();
            std::process::exit(exit_code(e.kind()));
        }
    };
    let metric_addr = args.metric_addr;
    let cfg = args.into_config().unwrap_or_else(|e| usage_exit(format!("{e:#}")));

    // metrics
    if let Some(addr) = metric_addr {
        metrics_server::spawn(addr).await?;
    }

    println!("{}", report::banner(&cfg));
    println!("{}", report::header(cfg.interval));

    let summary = simmer_core::run(cfg, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    })
    .await?;

    tracing::info!(
        iterations = summary.iterations,
        requests = summary.lifetime.requests,
        good = summary.lifetime.good,
        bad = summary.lifetime.bad,
        failed = summary.lifetime.failed,
        bad_hash = summary.lifetime.failed_hash,
        "done"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_exits_like_a_usage_error() {
        let err = Args::try_parse_from(["simmer", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(exit_code(err.kind()), EX_USAGE);
    }

    #[test]
    fn test_exit_codes() {
        let err = Args::try_parse_from(["simmer"]).unwrap_err();
        assert_eq!(exit_code(err.kind()), EX_USAGE);

        let err = Args::try_parse_from(["simmer", "http://localhost/", "--qps", "x"]).unwrap_err();
        assert_eq!(exit_code(err.kind()), EX_USAGE);

        let err = Args::try_parse_from(["simmer", "--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
        assert_eq!(exit_code(err.kind()), 0);
    }
}
