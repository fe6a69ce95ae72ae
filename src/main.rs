use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use heapdb::buffer::buffer_pool::BufferPool;
use heapdb::buffer::PageCache;
use heapdb::catalog::Catalog;
use heapdb::common::{
    PageId, PageNo, Permissions, Slot, TransactionId, DEFAULT_PAGE_SIZE, DEFAULT_POOL_SIZE,
};
use heapdb::config::StorageConfig;
use heapdb::printer::Printer;
use heapdb::storage::heap::file::HeapFile;
use heapdb::storage::store::FileStore;
use heapdb::storage::DbFile;
use heapdb::tuple::schema::Schema;
use heapdb::tuple::value::Value;
use heapdb::tuple::Tuple;

#[derive(Parser)]
#[command(about = "Inspect and modify a heap file")]
struct Cli {
    #[arg(long, help = "Heap file holding the table")]
    data: PathBuf,

    #[arg(long, help = "Columns of the table, e.g. 'id:int,name:text'")]
    schema: Schema,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, help = "Size of a page in bytes")]
    page_size: usize,

    #[arg(long, default_value_t = DEFAULT_POOL_SIZE, help = "Size of buffer pool")]
    pool_size: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Creates the heap file if it does not exist yet
    Create,
    /// Inserts a row, one value per column
    Insert {
        #[arg(allow_hyphen_values = true)]
        values: Vec<String>,
    },
    /// Deletes the row stored in a slot
    Delete { page: PageNo, slot: Slot },
    /// Prints every row
    Scan {
        #[arg(long, help = "Print the location of every row")]
        record_ids: bool,
    },
    /// Prints the slots of a single page
    DumpPage { page: PageNo },
    /// Prints how many slots of each page are used
    Pages,
}

struct Table {
    file: Arc<HeapFile>,
    buffer_pool: BufferPool,
}

impl Table {
    fn open(cli: &Cli, config: StorageConfig) -> Result<Self> {
        let store = FileStore::open(&cli.data)
            .with_context(|| format!("Failed to open {}", cli.data.display()))?;
        let file = Arc::new(HeapFile::open(
            Arc::new(store),
            Arc::new(cli.schema.clone()),
            config.page_size,
        )?);

        let catalog = Arc::new(Catalog::new());
        let table_name = cli
            .data
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "table".to_owned());
        catalog.add_table(file.clone(), &table_name);

        Ok(Self {
            file,
            buffer_pool: BufferPool::new(catalog, config.pool_size),
        })
    }

    /// Runs f in a new transaction which is committed if f succeeds
    fn run<T>(&self, f: impl FnOnce(TransactionId) -> Result<T>) -> Result<T> {
        let txn = TransactionId::next();
        match f(txn) {
            Ok(result) => {
                self.buffer_pool.transaction_complete(txn, true)?;
                Ok(result)
            }
            Err(e) => {
                self.buffer_pool.transaction_complete(txn, false)?;
                Err(e)
            }
        }
    }
}

fn insert(table: &Table, values: &[String], out: &mut impl Write) -> Result<()> {
    let schema = Arc::clone(table.file.schema());
    if values.len() != schema.len() {
        bail!(
            "Expected {} values for columns ({schema}), got {}",
            schema.len(),
            values.len()
        );
    }
    let values = schema
        .columns()
        .iter()
        .zip(values)
        .map(|(col, text)| Value::parse_text(col.type_id(), text))
        .collect::<heapdb::error::Result<Vec<_>>>()?;
    let mut tuple = Tuple::with_values(schema, values)?;

    table.run(|txn| {
        table
            .file
            .insert_tuple(&table.buffer_pool, txn, &mut tuple)
            .context("Failed to insert row")?;
        Ok(())
    })?;
    if let Some(record_id) = tuple.record_id() {
        writeln!(out, "Inserted {record_id}")?;
    }
    Ok(())
}

fn delete(table: &Table, page: PageNo, slot: Slot, out: &mut impl Write) -> Result<()> {
    let page_id = PageId::new(table.file.table_id(), page);
    table.run(|txn| {
        let stored = {
            let page_ref = table
                .buffer_pool
                .fetch(txn, page_id, Permissions::ReadOnly)
                .with_context(|| format!("Failed to read page {page}"))?;
            let cached = page_ref.read();
            cached.tuple(slot as usize).cloned()
        };
        let Some(mut tuple) = stored else {
            bail!("Slot {slot} of page {page_id} is empty");
        };
        table
            .file
            .delete_tuple(&table.buffer_pool, txn, &mut tuple)
            .context("Failed to delete row")?;
        writeln!(out, "Deleted ({page_id}, {slot})")?;
        Ok(())
    })
}

fn scan(table: &Table, record_ids: bool, out: &mut impl Write) -> Result<()> {
    table.run(|txn| {
        let mut scan = table.file.scan(&table.buffer_pool, txn);
        scan.open().context("Failed to scan table")?;
        let mut printer = Printer::new(table.file.schema());
        if record_ids {
            printer = printer.with_record_ids();
        }
        let rows = printer.print_all_tuples(scan, out)?;
        writeln!(out, "({rows} rows)")?;
        Ok(())
    })
}

fn dump_page(table: &Table, page: PageNo, out: &mut impl Write) -> Result<()> {
    let page_id = PageId::new(table.file.table_id(), page);
    let page = table
        .file
        .read_page(page_id)
        .with_context(|| format!("Failed to read page {page}"))?;
    let layout = page.layout();
    writeln!(
        out,
        "page {page_id}: {} bytes, {} slots of {} bytes, {} header bytes",
        layout.page_size(),
        layout.slot_count(),
        layout.tuple_size(),
        layout.header_size()
    )?;
    for slot in 0..page.slot_count() {
        match page.tuple(slot) {
            Some(tuple) => writeln!(out, "{slot:>5}: {tuple}")?,
            None => writeln!(out, "{slot:>5}: <empty>")?,
        }
    }
    Ok(())
}

fn pages(table: &Table, out: &mut impl Write) -> Result<()> {
    let page_count = table.file.page_count()?;
    for page_no in 0..page_count {
        let page = table
            .file
            .read_page(PageId::new(table.file.table_id(), page_no))
            .with_context(|| format!("Failed to read page {page_no}"))?;
        let used = page.slot_count() - page.empty_slot_count();
        writeln!(out, "{page_no:>5}: {used}/{} slots used", page.slot_count())?;
    }
    writeln!(out, "({page_count} pages)")?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = StorageConfig::new(cli.page_size, cli.pool_size);
    let table = Table::open(&cli, config)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match &cli.command {
        Command::Create => {
            info!(table_id = table.file.table_id(), "Created heap file");
            writeln!(
                out,
                "{} ({}), {} pages",
                cli.data.display(),
                table.file.schema(),
                table.file.page_count()?
            )?;
        }
        Command::Insert { values } => insert(&table, values, &mut out)?,
        Command::Delete { page, slot } => delete(&table, *page, *slot, &mut out)?,
        Command::Scan { record_ids } => scan(&table, *record_ids, &mut out)?,
        Command::DumpPage { page } => dump_page(&table, *page, &mut out)?,
        Command::Pages => pages(&table, &mut out)?,
    }

    table.buffer_pool.flush_all_pages()?;
    out.flush()?;
    Ok(())
}
