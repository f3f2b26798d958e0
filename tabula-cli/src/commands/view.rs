use anyhow::Result;
use clap::{Subcommand, ValueEnum};
use tabula_core::{Order, Query, ResultWindow, SortDescriptor, Table};

use super::query::print_view;
use crate::fixture::column;

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl From<Direction> for Order {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Asc => Order::Ascending,
            Direction::Desc => Order::Descending,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ViewCommands {
    /// Print the matching rows sorted by one or more columns
    Sort {
        /// Column names, the first one sorting primarily
        #[arg(required = true)]
        columns: Vec<String>,
        #[arg(short, long, value_enum, default_value = "asc")]
        order: Direction,
    },
    /// Print the first matching row for each value of an indexed column
    Distinct {
        /// Column name
        column: String,
        /// Build a search index on the column first
        #[arg(long)]
        index: bool,
    },
}

pub fn execute_view_command(table: &Table, query: &Query, command: ViewCommands) -> Result<()> {
    match command {
        ViewCommands::Sort { columns, order } => {
            let order = Order::from(order);
            let mut descriptor: Option<SortDescriptor> = None;
            for name in &columns {
                let index = column(table, name)?;
                descriptor = Some(match descriptor {
                    None => SortDescriptor::new(index, order),
                    Some(descriptor) => descriptor.then(index, order),
                });
            }
            let matches = query.find_all(&ResultWindow::all())?;
            let sorted = match descriptor {
                Some(descriptor) => matches.sort_by(&descriptor)?,
                None => matches,
            };
            print_view(&sorted)?;
        }
        ViewCommands::Distinct {
            column: name,
            index,
        } => {
            let column = column(table, &name)?;
            if index {
                table.add_search_index(column)?;
            }
            let distinct = query.find_all(&ResultWindow::all())?.distinct(column)?;
            print_view(&distinct)?;
            println!("✓ {} distinct values of {}", distinct.size()?, name);
        }
    }

    Ok(())
}
