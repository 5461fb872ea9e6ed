use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kicad_bom_xyrs::{
    config::default_board_path, merge::Merger, output::write_csv, Board, Error, MergeConfig,
    NetList, PruneRules,
};

#[derive(Parser)]
#[command(version, about = "Merge a KiCad netlist and board into one BOM + XYRS CSV", long_about = None)]
struct Cli {
    /// KiCad netlist export (.net)
    #[arg(value_name = "NETLIST")]
    netlist: PathBuf,

    /// KiCad board, defaults to NETLIST with a .kicad_pcb extension when
    /// omitted or empty
    #[arg(value_name = "BOARD")]
    board: Option<OsString>,

    /// Write the CSV here instead of standard output
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Drop references matching this regex (repeatable)
    #[arg(long, value_name = "REGEX")]
    exclude_ref: Vec<String>,

    /// Drop placed footprints matching this regex (repeatable)
    #[arg(long, value_name = "REGEX")]
    exclude_footprint: Vec<String>,

    /// Ignore components whose value matches this regex (repeatable)
    #[arg(long, value_name = "REGEX")]
    exclude_value: Vec<String>,

    /// Start from empty exclusion lists instead of the built-in ones
    #[arg(long)]
    no_default_excludes: bool,

    /// Config field text marking a part as not fitted
    #[arg(long, value_name = "TEXT", default_value = "DNF")]
    dnf_marker: String,

    /// Comma separated output columns
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    columns: Vec<String>,

    /// More diagnostics on standard error (-v info and field names, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn merge_config(&self) -> MergeConfig {
        let mut prune = if self.no_default_excludes {
            PruneRules::empty()
        } else {
            PruneRules::default()
        };
        prune.reference.extend(self.exclude_ref.iter().cloned());
        prune.footprint.extend(self.exclude_footprint.iter().cloned());
        prune.value.extend(self.exclude_value.iter().cloned());

        let mut config = MergeConfig {
            prune,
            dnf_marker: self.dnf_marker.clone(),
            ..MergeConfig::default()
        };
        if !self.columns.is_empty() {
            config.columns = self.columns.clone();
        }
        config
    }

    fn board_path(&self) -> PathBuf {
        match &self.board {
            Some(board) if !board.is_empty() => PathBuf::from(board),
            _ => default_board_path(&self.netlist),
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

fn read(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })
}

fn parse_error(path: &Path) -> impl FnOnce(kicad_bom_xyrs::ParseError) -> Error + '_ {
    move |source| Error::Parse {
        path: path.to_owned(),
        source,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let merger = Merger::new(cli.merge_config()).context("Invalid exclusion pattern")?;

    let netlist_path = cli.netlist.as_path();
    let netlist_text = read(netlist_path)?;
    let netlist = NetList::parse(&netlist_text).map_err(parse_error(netlist_path))?;
    info!(
        "Loaded {} components from {}",
        netlist.components.len(),
        netlist_path.display()
    );

    let board_path = cli.board_path();
    let board_text = read(&board_path)?;
    let board = Board::parse(&board_text).map_err(parse_error(&board_path))?;
    info!(
        "Loaded {} footprints from {}",
        board.footprints.len(),
        board_path.display()
    );

    let bom = merger.merge(&netlist, &board);
    info!(
        "{} BOM lines, {} warnings",
        bom.len(),
        bom.warnings().len()
    );

    let columns = &merger.config().columns;
    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Could not create {}", path.display()))?;
            write_csv(&bom, columns, BufWriter::new(file))?;
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            write_csv(&bom, columns, &mut lock)?;
            lock.flush()?;
        }
    }

    Ok(())
}
