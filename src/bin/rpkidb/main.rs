use structopt::StructOpt;

use std::ffi;

use rpkidb::{Config, Result};

mod cmd_cleanup;
mod cmd_status;

/// Options for cmd
#[derive(Clone, StructOpt)]
pub struct Opt {
    /// Storage directory, defaults to RPKIDB_DIR or the temp directory.
    #[structopt(long = "dir")]
    dir: Option<ffi::OsString>,

    #[structopt(long = "name")]
    name: Option<String>,

    /// Load configuration from a toml profile.
    #[structopt(long = "profile")]
    profile: Option<ffi::OsString>,

    #[structopt(subcommand)]
    subcmd: SubCommand,
}

#[derive(Clone, StructOpt)]
pub enum SubCommand {
    /// Storage status, live transactions and trust anchors.
    Status {},
    /// Size of every map.
    Stats {},
    /// Flush storage to disk.
    Gc {},
    /// Run retention over repositories and validation runs.
    Cleanup {
        #[structopt(long = "repositories")]
        repositories: bool,

        #[structopt(long = "validation-runs")]
        validation_runs: bool,

        /// Override grace duration, like `P7D` or `6h`.
        #[structopt(long = "grace")]
        grace: Option<String>,
    },
}

impl Opt {
    fn to_config(&self) -> Result<Config> {
        let mut config = match &self.profile {
            Some(loc) => Config::from_toml(loc)?,
            None => Config::from_env()?,
        };
        if let Some(dir) = &self.dir {
            config.dir = dir.clone();
        }
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        Ok(config)
    }
}

fn main() {
    let opts = Opt::from_iter(std::env::args_os());

    let res = match opts.to_config() {
        Ok(config) => match opts.subcmd.clone() {
            c @ SubCommand::Status { .. } | c @ SubCommand::Stats { .. } => {
                cmd_status::handle(config, cmd_status::Opt::from(c))
            }
            c @ SubCommand::Gc { .. } | c @ SubCommand::Cleanup { .. } => {
                cmd_cleanup::handle(config, cmd_cleanup::Opt::from(c))
            }
        },
        Err(err) => Err(err),
    };

    res.map_err(|e| println!("Error: {}", e)).ok();
}
