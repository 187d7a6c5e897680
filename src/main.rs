use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use beeline::{Config, DnsDialer, FamilyPolicy, Resolver, config::parse_duration};

#[derive(Parser)]
#[command(name = "beeline")]
#[command(about = "Stub DNS resolver and dialer", long_about = None)]
struct Args {
    /// Host name or literal address to resolve
    host: String,

    /// Name server to query (ip or ip:port), repeatable; overrides
    /// BEELINE_DNS_SERVERS and the system configuration
    #[arg(short, long)]
    server: Vec<String>,

    /// Per-exchange timeout, e.g. "2s" or "500ms"
    #[arg(short, long)]
    timeout: Option<String>,

    /// Query A records only
    #[arg(short = '4', long, conflicts_with = "ipv6_only")]
    ipv4_only: bool,

    /// Query AAAA records only
    #[arg(short = '6', long)]
    ipv6_only: bool,

    /// Dial host:PORT through the engine instead of printing addresses
    #[arg(long, value_name = "PORT")]
    connect: Option<u16>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Fold CLI flags over the environment-derived configuration.
fn build_config(args: &Args) -> Config {
    let mut config = Config::from_env();

    if !args.server.is_empty() {
        let servers = beeline::config::parse_server_list(&args.server.join(","));
        if !servers.is_empty() {
            config.servers = Some(servers);
        }
    }
    if let Some(timeout) = args.timeout.as_deref().and_then(parse_duration) {
        config.timeout = timeout;
    }
    if args.ipv4_only {
        config.family = FamilyPolicy::V4Only;
    } else if args.ipv6_only {
        config.family = FamilyPolicy::V6Only;
    }
    config.debug |= args.verbose;

    config
}

async fn run(args: Args, config: Config) -> Result<(), String> {
    let resolver = Arc::new(Resolver::new(&config));

    match args.connect {
        Some(port) => {
            let dialer = DnsDialer::new(resolver);
            // Bracket IPv6 literals so the target parses as host:port.
            let target = if args.host.contains(':') {
                format!("[{}]:{}", args.host, port)
            } else {
                format!("{}:{}", args.host, port)
            };
            let conn = dialer
                .dial("tcp", &target)
                .await
                .map_err(|e| e.to_string())?;
            let peer = conn.peer_addr().map_err(|e| e.to_string())?;
            println!("connected to {peer}");
        }
        None => {
            let resolution = resolver
                .resolve(&args.host)
                .await
                .map_err(|e| e.to_string())?;
            for addr in &resolution.addrs {
                println!("{addr}");
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let config = build_config(&args);

    if config.debug {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("beeline: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(args, config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("beeline: {e}");
            ExitCode::FAILURE
        }
    }
}
