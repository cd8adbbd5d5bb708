pub mod cli;
pub mod commit;
pub mod dedup;
pub mod error;
pub mod extend;
pub mod form_cmd;
pub mod import_cmd;
pub mod io_utils;
pub mod mapping;
pub mod mapping_cmd;
pub mod pipeline;
pub mod record;
pub mod records_cmd;
pub mod schema;
pub mod store;
pub mod table;
pub mod tabular;
pub mod validate;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands, FormCommand};

pub use crate::{
    commit::ImportSummary,
    error::ImportError,
    pipeline::{ImportRequest, Importer},
    store::{FormStore, SqliteStore},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("bulk_onboard", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Form(FormCommand::Init(args)) => form_cmd::init(&args),
        Commands::Form(FormCommand::Show(args)) => form_cmd::show(&args),
        Commands::Mapping(args) => mapping_cmd::execute(&args),
        Commands::Import(args) => import_cmd::execute(&args),
        Commands::Records(args) => records_cmd::execute(&args),
    }
}
