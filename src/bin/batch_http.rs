//! batch-http — run a file of HTTP requests as one concurrent batch.
//!
//! Usage:
//!   batch-http run <file> [--mode direct|blocking|concurrent]
//!   batch-http version
//!
//! The file is a JSON or YAML list of request descriptors:
//!
//! ```yaml
//! - method: GET
//!   url: https://example.com
//! - method: POST
//!   url: https://example.com/submit
//!   options:
//!     timeout_ms: 2000
//!     body: { type: json, value: { "id": 1 } }
//! ```

use batch_http::{BatchDispatcher, CallbackMode, DispatcherConfig, Outcome, RequestDescriptor};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let code = match args[1].as_str() {
        "run" => cmd_run(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("batch-http {}", env!("CARGO_PKG_VERSION"));
            0
        }
        "help" | "--help" | "-h" => {
            print_usage();
            0
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            1
        }
    };
    std::process::exit(code);
}

fn print_usage() {
    println!(
        r#"batch-http — concurrent HTTP batch runner

USAGE:
    batch-http <COMMAND> [OPTIONS]

COMMANDS:
    run <file> [--mode <mode>]   Run every request in <file> (JSON or YAML)
    version                      Show version information
    help                         Show this help message

MODES:
    direct (default), blocking, concurrent

ENVIRONMENT:
    RUST_LOG                          Log filter (e.g. batch_http=debug)
    BATCH_HTTP_TIMEOUT_SECS           Session-wide default timeout
    BATCH_HTTP_MAX_BLOCKING_THREADS   Worker pool size
    BATCH_HTTP_PROXY_URL              Proxy for all requests"#
    );
}

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn load_requests(path: &Path) -> batch_http::Result<Vec<RequestDescriptor>> {
    let content = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .map(|ext| ext == "json")
        .unwrap_or(false);
    if is_json {
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_yaml::from_str(&content)?)
    }
}

fn print_outcome(outcome: &Outcome) -> anyhow::Result<()> {
    match outcome {
        Outcome::Response(r) => println!(
            "{:>5} {} {} ({} bytes, {} ms)",
            r.request_id.to_string(),
            r.status.as_u16(),
            r.url,
            r.content.len(),
            r.elapsed.as_millis()
        ),
        Outcome::Error(e) => println!("{:>5} ERR {} ({})", e.request_id.to_string(), e.url, e.error),
    }
    Ok(())
}

fn cmd_run(args: &[String]) -> i32 {
    let Some(file) = args.first().filter(|a| !a.starts_with("--")) else {
        eprintln!("run: missing <file>");
        return 1;
    };

    let mode = match flag_value(args, "--mode").unwrap_or("direct") {
        "direct" => CallbackMode::direct(print_outcome),
        "blocking" => CallbackMode::blocking(print_outcome),
        "concurrent" => CallbackMode::concurrent(|outcome| async move { print_outcome(&outcome) }),
        other => {
            eprintln!("run: unknown mode '{other}'");
            return 1;
        }
    };

    let requests = match load_requests(Path::new(file)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("run: {e}");
            return 1;
        }
    };

    let dispatcher = match BatchDispatcher::builder()
        .config(DispatcherConfig::from_env())
        .callback(mode)
        .build()
    {
        Ok(d) => d,
        Err(e) => {
            eprintln!("run: {e}");
            return 1;
        }
    };

    let result = dispatcher.batch(|scope| {
        for request in requests {
            scope.submit(request);
        }
        Ok(())
    });

    let summary = dispatcher.summary();
    println!(
        "\n{} requests: {} succeeded, {} failed in {} ms",
        summary.total,
        summary.succeeded,
        summary.failed,
        summary.elapsed.as_millis()
    );

    match result {
        Ok(_) if summary.failed == 0 => 0,
        Ok(_) => 2,
        Err(e) => {
            eprintln!("run: {e}");
            1
        }
    }
}
