use prettytable::{cell, row};

use rpkidb::{store::Sizes, stores::Stores, stores::TrustAnchorStatus, Config, Result, Storage};

use crate::SubCommand;

pub struct Opt {
    stats: bool,
}

impl From<SubCommand> for Opt {
    fn from(subcmd: SubCommand) -> Opt {
        match subcmd {
            SubCommand::Stats {} => Opt { stats: true },
            _ => Opt { stats: false },
        }
    }
}

trait PrettyRow {
    fn to_format() -> prettytable::format::TableFormat {
        *prettytable::format::consts::FORMAT_CLEAN
    }

    fn to_head() -> prettytable::Row;

    fn to_row(&self) -> prettytable::Row;
}

impl PrettyRow for TrustAnchorStatus {
    fn to_head() -> prettytable::Row {
        row![Fy => "Key", "Name", "TA", "Tree", "Objects", "Warnings", "Errors"]
    }

    fn to_row(&self) -> prettytable::Row {
        let key = match self.trust_anchor.key() {
            Some(key) => key.to_string(),
            None => "-".to_string(),
        };
        row![
            key,
            self.trust_anchor.name,
            succeeded(self.ta_succeeded),
            succeeded(self.tree_succeeded),
            self.object_count,
            self.warnings,
            self.errors
        ]
    }
}

impl PrettyRow for (String, Sizes) {
    fn to_head() -> prettytable::Row {
        row![Fy => "Map", "Count", "KeyBytes", "ValueBytes"]
    }

    fn to_row(&self) -> prettytable::Row {
        let (name, sizes) = self;
        row![name, sizes.count, sizes.key_bytes, sizes.value_bytes]
    }
}

pub fn handle(config: Config, opts: Opt) -> Result<()> {
    let storage = Storage::open(&config)?;
    let stores = Stores::new(&storage)?;

    if opts.stats {
        let mut rows = vec![];
        for (name, sizes) in storage.db_stats()?.into_iter() {
            for (index, isizes) in sizes.indexes.iter() {
                rows.push((format!("{}/{}", name, index), isizes.clone()));
            }
            rows.push((name, sizes));
        }
        make_table(&rows).printstd();
        return Ok(());
    }

    print!("{}", storage.status()?);

    let tx = storage.begin_read()?;
    let mut rows = vec![];
    for key in stores.trust_anchors.keys(&tx)?.iter() {
        if let Some(status) = stores.trust_anchor_status(&tx, key)? {
            rows.push(status)
        }
    }
    println!();
    make_table(&rows).printstd();

    Ok(())
}

fn make_table<R: PrettyRow>(rows: &[R]) -> prettytable::Table {
    let mut table = prettytable::Table::new();
    table.set_titles(R::to_head());
    rows.iter().for_each(|r| {
        table.add_row(r.to_row());
    });
    table.set_format(R::to_format());
    table
}

fn succeeded(val: Option<bool>) -> &'static str {
    match val {
        Some(true) => "ok",
        Some(false) => "failed",
        None => "-",
    }
}
