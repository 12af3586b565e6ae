use std::net::IpAddr;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wordrooms::config::Cli;
use wordrooms::dispatcher::Dispatcher;
use wordrooms::registry::Registry;
use wordrooms::server;
use wordrooms::session::SessionMap;
use wordrooms::words::WordSource;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wordrooms=info,warp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Without prompts there is no game to play
    let words = match WordSource::load(&cli.words) {
        Ok(words) => Arc::new(words),
        Err(e) => {
            error!("Failed to load word source {}: {}", cli.words.display(), e);
            process::exit(1);
        }
    };

    let registry = Arc::new(Registry::new(words, cli.timings()));
    let dispatcher = Dispatcher::new(registry, Arc::new(SessionMap::new()));
    let routes = server::routes(dispatcher, cli.static_dir.clone(), cli.ping_interval());

    if cli.usock {
        use tokio::net::UnixListener;
        use tokio_stream::wrappers::UnixListenerStream;

        let listener = match UnixListener::bind(&cli.addr) {
            Ok(listener) => listener,
            Err(e) => {
                error!("Problem when binding to Unix socket {}: {}", cli.addr, e);
                process::exit(1);
            }
        };
        let incoming = UnixListenerStream::new(listener);

        info!("Listening on unix:{}", cli.addr);
        warp::serve(routes).run_incoming(incoming).await;
    } else {
        let ip: IpAddr = match cli.addr.parse() {
            Ok(ip) => ip,
            Err(e) => {
                error!("Can't parse IP address {}: {}", cli.addr, e);
                process::exit(1);
            }
        };

        if cli.https {
            info!("Listening on https://{}:{}", ip, cli.port);
            warp::serve(routes)
                .tls()
                .cert_path(&cli.cert)
                .key_path(&cli.key)
                .run((ip, cli.port))
                .await;
        } else {
            info!("Listening on http://{}:{}", ip, cli.port);
            warp::serve(routes).run((ip, cli.port)).await;
        }
    }
}
