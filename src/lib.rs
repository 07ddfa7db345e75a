//! desert-quotes is the HTTP service behind Desert Solutions' sales process
//! for evaporative coolers, mini-splits, and heat pumps.
//!
//! It prices and stores quotations, renders quotation PDFs, product
//! datasheets, and site-photo addenda, emails quotations to customers, issues
//! invoices through Mercury, and records payments reported by Mercury's
//! webhook.
//!
//! # Usage
//!
//! View CLI help with `desert-quotes help` or `desert-quotes help <subcommand>`.
//!
//! ## Configuration
//!
//! desert-quotes reads a TOML configuration file from
//! `~/.config/desert_solutions/desert-quotes.toml`, or from the path given
//! with `--config`. Any value can be overridden with an environment variable
//! prefixed with `DESERT_QUOTES`, using a double underscore to reach into
//! sections, e.g. `DESERT_QUOTES__MERCURY__API_TOKEN=abc`.
//!
//! See `desert-quotes.example.toml` for every available setting.
//!
//! ## Commands
//!
//! ```desert-quotes serve [--port <PORT>]```
//!
//! Runs the HTTP API under `/api/desert-solutions` until interrupted (Ctrl+C
//! or SIGTERM). In-flight requests are allowed to finish.
//!
//! <br>
//!
//! ---
//!
//! ```desert-quotes config```
//!
//! Echoes the current config (with any overrides applied, secrets redacted)
//! and exits.
//!
//! <br>
//!
//! ---
//!
//! ```desert-quotes products [--category <CATEGORY>]```
//!
//! Lists the product catalog. Only the catalog needs to be configured, so
//! this works without any service credentials.
//!
//! ## Endpoints
//!
//! | Method | Path                                  | Description                                        |
//! |-       |-                                      |-                                                   |
//! | GET    | `/health`                             | Liveness check                                     |
//! | GET    | `/products?category=`                 | Catalog, optionally filtered by category           |
//! | GET    | `/products/{sku}`                     | One product with formatted specifications          |
//! | GET    | `/products/{sku}/datasheet`           | Product datasheet PDF                              |
//! | POST   | `/quotations`                         | Validate, price, and store a quotation             |
//! | GET    | `/quotations`                         | List quotations (status, email, order, paging)     |
//! | GET    | `/quotations/{id}`                    | One quotation                                      |
//! | PATCH  | `/quotations/{id}/status`             | Change a quotation's status                        |
//! | GET    | `/quotations/{id}/pdf`                | Quotation PDF                                      |
//! | POST   | `/quotations/{id}/send`               | Email the quotation PDF to the customer            |
//! | POST   | `/quotations/{id}/photos?filename=`   | Upload a site photo (raw image body)               |
//! | GET    | `/quotations/{id}/photos`             | Site photos with time-limited download URLs        |
//! | GET    | `/quotations/{id}/photo-addendum`     | Site photos as a PDF                               |
//! | POST   | `/quotations/{id}/invoice`            | Issue a Mercury invoice                            |
//! | GET    | `/quotations/{id}/payments`           | Payments recorded for a quotation                  |
//! | GET    | `/invoices/{invoice_id}`              | A Mercury invoice                                  |
//! | POST   | `/webhooks/mercury`                   | Signed payment notifications from Mercury          |
//!
//! JSON responses are wrapped as `{"success": true, "data": ...}` or
//! `{"success": false, "error": "...", "details": [...]}`.
//!
//! # Logging
//!
//! Set `RUST_LOG` to control verbosity, e.g. `RUST_LOG=desert_quotes=debug`
//! logs every request and response exchanged with external services.

#[cfg(not(debug_assertions))]
use human_panic::setup_panic;

mod app_config;
mod cli;
mod core;
mod server;

use anyhow::Result;

#[doc(hidden)]
/// Main entrypoint
pub fn run() -> Result<()> {
    // Human Panic. Only enabled when *not* debugging.
    //
    // Example of what panic message looks like:
    // https://docs.rs/human-panic/1.0.3/human_panic/
    #[cfg(not(debug_assertions))]
    {
        setup_panic!();
    }

    // Better Panic. Only enabled *when* debugging.
    #[cfg(debug_assertions)]
    {
        better_panic::Settings::debug()
            .most_recent_first(false)
            .lineno_suffix(true)
            .verbosity(better_panic::Verbosity::Full)
            .install();
    }

    env_logger::init();

    // Get CLI arguments and flags (one may have provided the config file to use)
    let cli_matches = cli::cli_config()?;

    let config_file = cli_matches.get_one::<String>("config").map(String::as_str);
    let settings = app_config::load(config_file)?;

    // Match against CLI subcommands, which delegate to functions
    cli::cli_match(settings, cli_matches)
}
