use std::sync::Arc;

use rpkidb::{
    cleanup::{RpkiRepositoryCleanup, ValidationRunCleanup},
    stores::Stores,
    util, Config, Result, Storage,
};

use crate::SubCommand;

pub struct Opt {
    gc: bool,
    repositories: bool,
    validation_runs: bool,
    grace: Option<String>,
}

impl From<SubCommand> for Opt {
    fn from(subcmd: SubCommand) -> Opt {
        match subcmd {
            SubCommand::Cleanup {
                repositories,
                validation_runs,
                grace,
            } => Opt {
                gc: false,
                // neither flag, cleanup both.
                repositories: repositories || !validation_runs,
                validation_runs: validation_runs || !repositories,
                grace,
            },
            _ => Opt {
                gc: true,
                repositories: false,
                validation_runs: false,
                grace: None,
            },
        }
    }
}

pub fn handle(mut config: Config, opts: Opt) -> Result<()> {
    if let Some(grace) = opts.grace.as_ref() {
        let grace = util::parse_duration(grace)?;
        config.set_rpki_repository_grace(grace);
        config.set_validation_run_grace(grace);
    }

    let storage = Arc::new(Storage::open(&config)?);
    if opts.gc {
        return storage.gc();
    }

    let stores = Stores::new(&storage)?;
    if opts.repositories {
        let cleanup = RpkiRepositoryCleanup::new(Arc::clone(&storage), &stores, &config);
        let stats = cleanup.cleanup_at(util::now())?;
        println!("rpki-repositories {}", stats);
    }
    if opts.validation_runs {
        let cleanup = ValidationRunCleanup::new(Arc::clone(&storage), &stores, &config);
        let stats = cleanup.cleanup_at(util::now())?;
        println!("validation-runs {}", stats);
    }

    Ok(())
}
