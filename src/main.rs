//! The Alexandria backend: a GraphQL API for a small library catalog, running
//! as an AWS Lambda function behind API Gateway.

use std::{env, sync::Arc};

use lambda_runtime::service_fn;

use crate::{config::Config, prelude::*, store::MongoStore};

mod api;
mod auth;
mod config;
mod gateway;
mod logger;
mod model;
mod prelude;
mod store;


#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Log error in case stderr is not captured by the deployment and only
        // the log output survives.
        error!("{:?}", e);

        eprintln!();
        eprintln!("▶▶▶ Error: {e}");
        if e.chain().len() > 1 {
            eprintln!("Caused by:");
        }
        for (i, cause) in e.chain().skip(1).enumerate() {
            eprint!(" {: >1$}", "", i * 2);
            eprintln!("‣ {cause}");
        }

        std::process::exit(1);
    }
}

/// Main entry point.
async fn run() -> Result<()> {
    // If `RUST_BACKTRACE` wasn't already set, we default to `1`. Generating a
    // backtrace is somewhat costly, but panics should be rare and a crash in a
    // Lambda log rarely gets a second chance to reproduce.
    if env::var("RUST_BACKTRACE") == Err(env::VarError::NotPresent) {
        env::set_var("RUST_BACKTRACE", "1");
    }

    // A broken or incomplete configuration (e.g. no signing secret) aborts
    // startup here instead of surfacing one invocation at a time.
    let config = Config::load()?;
    logger::init(&config.log)?;
    info!("Starting Alexandria backend ...");
    trace!("Configuration: {:#?}", config);

    // This does not connect yet: the store is only reached once the first
    // real API request needs it.
    let store = Arc::new(MongoStore::new(config.store));
    let gateway = gateway::Gateway::new(config.auth, config.gateway, store);

    let gateway = &gateway;
    lambda_runtime::run(service_fn(move |event| async move {
        gateway.handle(event).await
    }))
        .await
        .map_err(|e| anyhow!("lambda runtime failed: {e}"))
}
