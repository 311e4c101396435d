use std::collections::HashMap;

use serde::Deserialize;
use tracing_subscriber::{
    filter::{FilterFn, LevelFilter},
    prelude::*,
};

use crate::prelude::*;


#[derive(Debug, confique::Config)]
pub(crate) struct LogConfig {
    /// Specifies what log messages to emit, based on the module path and log level.
    ///
    /// This is a map where the key specifies a module path prefix, and the
    /// value specifies a minimum log level. For each log message, the map
    /// entry with the longest prefix matching the log's module path is chosen.
    /// If no such entry exists, the log is not emitted. Otherwise, that
    /// entry's level is used to check whether the log message should be
    /// emitted.
    ///
    /// Example: only ≥"info" logs from alexandria generally, but ≥"trace"
    /// messages from the store module, and ≥"debug" from the MongoDB driver:
    ///
    ///    [log]
    ///    filters.alexandria = "info"
    ///    filters."alexandria::store" = "trace"
    ///    filters.mongodb = "debug"
    #[config(default = { "alexandria": "debug" })]
    pub(crate) filters: Filters,
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "HashMap<String, String>")]
pub(crate) struct Filters(HashMap<String, LevelFilter>);

impl TryFrom<HashMap<String, String>> for Filters {
    type Error = String;
    fn try_from(value: HashMap<String, String>) -> Result<Self, Self::Error> {
        value.into_iter()
            .map(|(target_prefix, level)| {
                let level = parse_level_filter(&level)?;
                Ok((target_prefix, level))
            })
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

fn parse_level_filter(s: &str) -> Result<LevelFilter, String> {
    match s {
        "off" => Ok(LevelFilter::OFF),
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        other => Err(format!("invalid log level '{other}'")),
    }
}

/// Installs our logger globally. Must only be called once!
///
/// Everything is written to stdout, where the Lambda runtime picks it up and
/// forwards it to CloudWatch. That also means: no ANSI codes and no timestamps
/// of our own (CloudWatch stamps every line anyway).
pub(crate) fn init(config: &LogConfig) -> Result<()> {
    let filter = {
        let filters = config.filters.0.clone();
        let max_level = filters.values().max().copied().unwrap_or(LevelFilter::OFF);
        let filter = FilterFn::new(move |metadata: &tracing::Metadata<'_>| {
            // If there are many filters, it might be worth to build an extra
            // prefix data structure, but in practice we only expect very few
            // entries.
            //
            // See the config doc comment to see the logic behind this filter.
            filters.iter()
                .filter(|(target_prefix, _)| metadata.target().starts_with(*target_prefix))
                .max_by_key(|(target_prefix, _)| target_prefix.len())
                .map(|(_, level_filter)| metadata.level() <= level_filter)
                .unwrap_or(false)
        });
        filter.with_max_level_hint(max_level)
    };

    let output = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .without_time();

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .init();

    Ok(())
}
