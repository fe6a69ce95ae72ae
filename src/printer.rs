use std::io::Write;

use anyhow::Result;

use crate::tuple::schema::{Schema, TypeId};
use crate::tuple::Tuple;

const RECORD_ID_HEADER: &str = "rid";

/// Renders tuples as a table with one right aligned column per field.
pub struct Printer {
    column_names: Vec<String>,
    column_widths: Vec<usize>,
    with_record_ids: bool,
}

impl Printer {
    pub fn new(schema: &Schema) -> Self {
        let mut column_names = vec![];
        let mut column_widths = vec![];
        for (i, col) in schema.columns().iter().enumerate() {
            let col_name = match col.column_name() {
                Some(name) => name.to_owned(),
                None => format!("#{i}"),
            };
            let col_name_size = col_name.chars().count();
            let col_width = match col.type_id() {
                TypeId::Integer => col_name_size.max(11),
                TypeId::Text => col_name_size.max(25),
            };
            column_names.push(col_name);
            column_widths.push(col_width);
        }

        Self {
            column_names,
            column_widths,
            with_record_ids: false,
        }
    }

    /// Prefixes every row with the location of the tuple
    pub fn with_record_ids(mut self) -> Self {
        self.with_record_ids = true;
        self.column_names.insert(0, RECORD_ID_HEADER.to_owned());
        self.column_widths.insert(0, 12);
        self
    }

    fn print_line<W: Write>(
        &self,
        writer: &mut W,
        cells: impl Iterator<Item = String>,
    ) -> Result<()> {
        let line = self
            .column_widths
            .iter()
            .zip(cells)
            .map(|(width, cell)| format!("{:>1$}", cell, *width))
            .collect::<Vec<String>>()
            .join("|");
        writer.write_all(line.as_bytes())?;
        writer.write_all("\n".as_bytes())?;
        Ok(())
    }

    fn print_header<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.print_line(writer, self.column_names.iter().cloned())?;
        let separator_line = self
            .column_widths
            .iter()
            .map(|width| format!("{:-^1$}", '-', width))
            .collect::<Vec<String>>()
            .join("+");
        writer.write_all(separator_line.as_bytes())?;
        writer.write_all("\n".as_bytes())?;

        Ok(())
    }

    /// Writes the header followed by one row per tuple and returns the number of rows
    pub fn print_all_tuples<W: Write>(
        &self,
        tuples: impl Iterator<Item = Tuple>,
        writer: &mut W,
    ) -> Result<usize> {
        self.print_header(writer)?;

        let mut rows = 0;
        for tuple in tuples {
            let record_id = if self.with_record_ids {
                let record_id = tuple
                    .record_id()
                    .map(|record_id| record_id.to_string())
                    .unwrap_or_default();
                Some(record_id)
            } else {
                None
            };
            let values = tuple.fields().map(|value| match value {
                Some(value) => value.to_string(),
                None => "null".to_owned(),
            });
            self.print_line(writer, record_id.into_iter().chain(values))?;
            rows += 1;
        }

        Ok(rows)
    }
}
