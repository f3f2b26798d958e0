use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tabula_core::{AggregateKind, Query, ResultWindow, Table, View};

use crate::fixture::column;

/// Row range and match limit shared by every query command
#[derive(Args, Debug, Clone, Default)]
pub struct WindowArgs {
    /// First row position to scan
    #[arg(long, default_value = "0")]
    pub start: usize,
    /// Row position to stop before (defaults to the table size)
    #[arg(long)]
    pub end: Option<usize>,
    /// Maximum number of matches
    #[arg(long)]
    pub limit: Option<usize>,
}

impl WindowArgs {
    pub fn window(&self) -> Result<ResultWindow> {
        Ok(ResultWindow::new(self.start, self.end, self.limit)?)
    }
}

#[derive(Subcommand, Debug)]
pub enum QueryCommands {
    /// Count matching rows
    Count {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Print every matching row
    FindAll {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Print the position of the first matching row
    FindFirst {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Aggregate a column over the matching rows
    Aggregate {
        /// Column name
        column: String,
        /// sum, min, max, avg or count
        #[arg(short, long, default_value = "sum")]
        kind: AggregateKind,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Remove matching rows and print what remains
    Remove {
        #[command(flatten)]
        window: WindowArgs,
    },
}

pub fn execute_query_command(table: &Table, query: &Query, command: QueryCommands) -> Result<()> {
    println!("Query: {}", query.tree()?);

    match command {
        QueryCommands::Count { window } => {
            let window = window.window()?;
            let count = query.count(&window)?;
            println!("✓ {} matching rows in {}", count, window);
        }
        QueryCommands::FindAll { window } => {
            let window = window.window()?;
            let view = query.find_all(&window)?;
            print_view(&view)?;
            println!("✓ {} rows", view.size()?);
        }
        QueryCommands::FindFirst { window } => {
            let window = window.window()?;
            match query.find_first(&window)? {
                Some(row) => println!("✓ First match at row {}", row),
                None => println!("No match in {}", window),
            }
        }
        QueryCommands::Aggregate {
            column: name,
            kind,
            window,
        } => {
            let column = column(table, &name)?;
            let window = window.window()?;
            match query.aggregate(column, kind, &window)? {
                Some(value) => println!("✓ {}({}) = {}", kind, name, value),
                None => println!("{}({}) has no matching rows", kind, name),
            }
        }
        QueryCommands::Remove { window } => {
            let window = window.window()?;
            let removed = query.remove(&window)?;
            println!("✓ Removed {} rows", removed);
            print_view(&table.view()?)?;
        }
    }

    Ok(())
}

/// Print every row of a view, one tab-separated line per row
pub fn print_view(view: &View) -> Result<()> {
    let table = view.table()?;
    let schema = table.schema()?;
    let header: Vec<&str> = schema.columns().iter().map(|c| c.name.as_str()).collect();
    println!("row\t{}", header.join("\t"));

    for index in 0..view.size()? {
        let row = view
            .source_row_index(index)
            .with_context(|| format!("View row {} is no longer available", index))?;
        let cells = (0..schema.len())
            .map(|column| view.get(column, index).map(|value| value.to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        println!("{}\t{}", row, cells.join("\t"));
    }
    Ok(())
}
