//! Command implementations for histdiff CLI

use crate::cli::{Commands, OutputFormat};
use crate::config::load_config;
use crate::diff_iter::{DiffRow, DiffRowIter};
use crate::diff_table::{DiffTable, DiffTableOptions};
use crate::error::Result;
use crate::fixture::Fixture;
use crate::output::{JsonFormatter, PrettyPrinter};
use crate::partition::DiffPartition;
use std::path::Path;

/// Execute a command
pub fn execute_command(command: Commands, config_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Diff {
            fixture,
            table,
            from,
            to,
            format,
        } => diff_command(
            &fixture,
            &table,
            from.as_deref(),
            to.as_deref(),
            format,
            config_path,
        ),
        Commands::Partitions {
            fixture,
            table,
            from,
            to,
            format,
        } => partitions_command(
            &fixture,
            &table,
            from.as_deref(),
            to.as_deref(),
            format,
            config_path,
        ),
        Commands::Schema {
            fixture,
            table,
            format,
        } => schema_command(&fixture, &table, format, config_path),
    }
}

/// Load a fixture and open a diff session over the requested range.
///
/// Without `to`, the fixture's head and working set are the newest endpoint.
pub fn open_diff_table(
    fixture_path: &Path,
    table: &str,
    from: Option<&str>,
    to: Option<&str>,
    config_path: Option<&Path>,
) -> Result<DiffTable> {
    let fixture = Fixture::load(fixture_path)?;
    let config = load_config(config_path)?;

    let (head, working) = match to {
        Some(reference) => (fixture.resolve(reference)?, None),
        None => (fixture.head().clone(), fixture.working()),
    };
    let from = match from {
        Some(reference) => Some(fixture.resolve(reference)?.hash),
        None => None,
    };

    let options = DiffTableOptions {
        working,
        from,
        config,
        ..DiffTableOptions::default()
    };
    DiffTable::open(fixture.store(), table, head, options)
}

/// Print every row change of a table, one partition at a time as the rows stream in
fn diff_command(
    fixture: &Path,
    table: &str,
    from: Option<&str>,
    to: Option<&str>,
    format: OutputFormat,
    config_path: Option<&Path>,
) -> Result<()> {
    let diff_table = open_diff_table(fixture, table, from, to, config_path)?;
    let mut partitions = diff_table.partitions()?;
    let mut total = 0usize;
    let mut visited = 0usize;

    while let Some(partition) = partitions.next()? {
        visited += 1;
        let mut rows = diff_table.partition_rows(&partition)?;
        let printed = print_partition_rows(&diff_table, &partition, &mut rows, format);
        rows.close()?;
        total += printed?;
    }

    log::info!("{}: {} diff rows in {} partitions", diff_table.name(), total, visited);
    if format == OutputFormat::Pretty {
        PrettyPrinter::print_diff_summary(&diff_table.name(), total, visited);
    }
    Ok(())
}

/// Print the rows of one partition as they arrive. JSON output is one object per line.
fn print_partition_rows(
    diff_table: &DiffTable,
    partition: &DiffPartition,
    rows: &mut DiffRowIter,
    format: OutputFormat,
) -> Result<usize> {
    let mut printed = 0usize;
    // pretty output holds one row back so the last row can close the tree
    let mut held: Option<DiffRow> = None;

    while let Some(row) = rows.next()? {
        match format {
            OutputFormat::Json => println!("{}", JsonFormatter::format_diff_row(&row)?),
            OutputFormat::Pretty => {
                if printed == 0 {
                    PrettyPrinter::print_partition_header(&diff_table.name(), partition);
                }
                if let Some(previous) = held.replace(row) {
                    PrettyPrinter::print_diff_row(diff_table.target_schema(), &previous, false);
                }
            }
        }
        printed += 1;
    }

    if let Some(last) = held {
        PrettyPrinter::print_diff_row(diff_table.target_schema(), &last, true);
    }
    Ok(printed)
}

/// Print the history partitions of a table
fn partitions_command(
    fixture: &Path,
    table: &str,
    from: Option<&str>,
    to: Option<&str>,
    format: OutputFormat,
    config_path: Option<&Path>,
) -> Result<()> {
    let diff_table = open_diff_table(fixture, table, from, to, config_path)?;
    let partitions = diff_table.collect_partitions()?;

    match format {
        OutputFormat::Pretty => PrettyPrinter::print_partitions(&diff_table.name(), &partitions),
        OutputFormat::Json => println!("{}", JsonFormatter::format_partitions(&partitions)?),
    }
    Ok(())
}

/// Print the reconciled schema of a table
fn schema_command(
    fixture: &Path,
    table: &str,
    format: OutputFormat,
    config_path: Option<&Path>,
) -> Result<()> {
    let diff_table = open_diff_table(fixture, table, None, None, config_path)?;

    match format {
        OutputFormat::Pretty => PrettyPrinter::print_super_schema(
            diff_table.table_name(),
            diff_table.super_schema(),
            diff_table.target_schema(),
        ),
        OutputFormat::Json => {
            println!("{}", JsonFormatter::format_schema(diff_table.target_schema())?)
        }
    }
    Ok(())
}
