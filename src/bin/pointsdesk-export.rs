//! CLI utility that writes a complete roster sheet from the database.

use std::path::PathBuf;

use pointsdesk::config;
use pointsdesk::sheet::RosterSheetExporter;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    let settings = config::load_or_default().map_err(|err| err.to_string())?;
    let db_path = match options.db_path {
        Some(path) => path,
        None => config::resolve_database_path(&settings).map_err(|err| err.to_string())?,
    };
    let out_path = options
        .out_path
        .or(settings.roster_sheet_path)
        .ok_or_else(|| "--out is required when roster_sheet_path is not configured".to_string())?;

    let exporter = RosterSheetExporter::new(db_path.clone());
    let written = if options.columns_only {
        exporter.update_columns(&out_path)
    } else {
        exporter.export_full(&out_path)
    }
    .map_err(|err| err.to_string())?;

    println!("Wrote {written} student(s) to {}.", out_path.display());
    Ok(())
}

#[derive(Default)]
struct Options {
    db_path: Option<PathBuf>,
    out_path: Option<PathBuf>,
    columns_only: bool,
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut options = Options::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--db" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--db requires a value".to_string())?;
                options.db_path = Some(PathBuf::from(value));
            }
            "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                options.out_path = Some(PathBuf::from(value));
            }
            "--columns-only" => {
                options.columns_only = true;
            }
            unknown => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
        }
        idx += 1;
    }
    Ok(Some(options))
}

fn help_text() -> String {
    [
        "pointsdesk-export",
        "",
        "Writes the student roster to an .xlsx workbook.",
        "",
        "Usage:",
        "  pointsdesk-export [--db <path>] [--out <path>] [--columns-only]",
        "",
        "Options:",
        "  --db <path>        Path to the points database (defaults to config).",
        "  --out <path>       Sheet to write (defaults to roster_sheet_path).",
        "  --columns-only     Only refresh card, points and message cells.",
    ]
    .join("\n")
}
