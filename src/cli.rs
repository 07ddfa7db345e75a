// Copyright (c) 2021 Tangram Robotics Inc. - All Rights Reserved
// Unauthorized copying of this file, via any medium is strictly prohibited
// Proprietary and confidential
// ----------------------------

use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::{crate_authors, crate_description, crate_version};
use clap::{value_parser, Arg, Command};
use strum::VariantNames;

use crate::core::catalog::Category;
use crate::core::commands;

/// Match commands
pub fn cli_match(config: config::Config, cli_matches: clap::ArgMatches) -> Result<()> {
    match cli_matches.subcommand() {
        // Doesn't need service credentials, which helps when debugging bad config
        Some(("config", _config_matches)) => {
            commands::print_config(config)?;
        }
        Some(("products", products_matches)) => {
            let category = products_matches
                .get_one::<String>("category")
                .map(|name| {
                    Category::from_str(name).map_err(|_| {
                        anyhow!(
                            "Unknown category: {}. Expected one of: {}",
                            name,
                            Category::VARIANTS.join(", ")
                        )
                    })
                })
                .transpose()?;
            for line in commands::list_products(config, category)? {
                println!("{}", line);
            }
        }
        Some(("serve", serve_matches)) => {
            let port = serve_matches.get_one::<u16>("port").copied();
            commands::serve(config, port)?;
        }
        _ => {
            // Arguments are required by default (in Clap).
            // This section should never execute.
            unreachable!("No matching subcommand!");
        }
    }
    Ok(())
}

/// Configure Clap
/// This function will configure clap and match arguments
pub fn cli_config() -> Result<clap::ArgMatches> {
    let cli_app = build_cli();

    // Get matches
    let cli_matches = cli_app.get_matches();

    Ok(cli_matches)
}

fn build_cli() -> Command<'static> {
    Command::new("desert-quotes")
        .arg_required_else_help(true)
        .version(crate_version!())
        .about(crate_description!())
        .author(crate_authors!("\n"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Set a custom config file")
                .takes_value(true),
        )
        .subcommand(
            Command::new("serve").about("Run the HTTP API").arg(
                Arg::new("port")
                    .short('p')
                    .long("port")
                    .value_name("PORT")
                    .help("Listen on this port instead of server.port")
                    .takes_value(true)
                    .value_parser(value_parser!(u16)),
            ),
        )
        .subcommand(
            Command::new("products").about("List the product catalog").arg(
                Arg::new("category")
                    .long("category")
                    .value_name("CATEGORY")
                    .help("Only list products in this category")
                    .takes_value(true),
            ),
        )
        .subcommand(Command::new("config").about("Show Configuration"))
}
