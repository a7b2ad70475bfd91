// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// HTTP stack targets held at warn unless debugging.
const QUIET_TARGETS: [&str; 4] = ["actix_server=warn", "actix_web=warn", "hyper=warn", "reqwest=warn"];

/// Initialize logging. `RUST_LOG` wins over the configured level, which
/// falls back to INFO when missing or invalid.
pub fn init_logging(log_level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = log_level
            .and_then(|s| s.parse::<Level>().ok())
            .unwrap_or(Level::INFO);
        level_filter(level)
    });

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .init();
}

fn level_filter(level: Level) -> EnvFilter {
    let mut filter = EnvFilter::default().add_directive(LevelFilter::from_level(level).into());
    if level <= Level::INFO {
        for directive in QUIET_TARGETS {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}
