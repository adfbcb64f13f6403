use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::{IntHistogram, StringHistogram};
use crate::buffer::BufferPool;
use crate::catalog::Catalog;
use crate::common::{KilnConfig, KilnError, Result};
use crate::execution::{Op, TupleStream};
use crate::storage::disk::TableFile;
use crate::tuple::{DataType, Value};

/// Per-field histogram, matching the field's type.
#[derive(Debug, Clone)]
pub enum Histogram {
    Int(IntHistogram),
    Str(StringHistogram),
}

impl Histogram {
    fn add_value(&mut self, value: &Value) {
        match (self, value) {
            (Histogram::Int(h), Value::Int(v)) => h.add_value(*v),
            (Histogram::Str(h), Value::Str(s)) => h.add_value(s),
            // histograms are built from the table schema, which every stored tuple matches
            (Histogram::Int(_), Value::Str(_)) | (Histogram::Str(_), Value::Int(_)) => {}
        }
    }

    pub fn estimate_selectivity(&self, op: Op, value: &Value) -> Result<f64> {
        match (self, value) {
            (Histogram::Int(h), Value::Int(v)) => Ok(h.estimate_selectivity(op, *v)),
            (Histogram::Str(h), Value::Str(s)) => Ok(h.estimate_selectivity(op, s)),
            (Histogram::Int(_), Value::Str(_)) | (Histogram::Str(_), Value::Int(_)) => {
                Err(KilnError::SchemaMismatch(format!(
                    "cannot estimate {} against a histogram of another type",
                    value
                )))
            }
        }
    }

    pub fn total(&self) -> u64 {
        match self {
            Histogram::Int(h) => h.total(),
            Histogram::Str(h) => h.total(),
        }
    }
}

/// Statistics over one table: a histogram per field plus the tuple count.
///
/// Built with two scans: the first finds each integer field's bounds, the
/// second fills the histograms. The cost of those scans is not reflected in
/// any estimate.
pub struct TableStats {
    file: Arc<TableFile>,
    io_cost_per_page: f64,
    total_tuples: u64,
    histograms: Vec<Histogram>,
}

impl TableStats {
    pub fn compute(
        file: &Arc<TableFile>,
        pool: &Arc<BufferPool>,
        io_cost_per_page: f64,
        buckets: usize,
    ) -> Result<Self> {
        let schema = Arc::clone(file.schema());
        let mut scan = file.iter(pool);
        scan.open()?;

        // Pass 1: integer bounds and tuple count
        let mut bounds: Vec<Option<(i32, i32)>> = vec![None; schema.column_count()];
        let mut total_tuples = 0u64;
        while let Some(tuple) = scan.next_tuple()? {
            total_tuples += 1;
            for (bound, value) in bounds.iter_mut().zip(tuple.values()) {
                if let Value::Int(v) = *value {
                    *bound = Some(match *bound {
                        Some((lo, hi)) => (lo.min(v), hi.max(v)),
                        None => (v, v),
                    });
                }
            }
        }

        let mut histograms = schema
            .columns()
            .zip(&bounds)
            .map(|(column, bound)| match column.data_type() {
                DataType::Int => {
                    let (lo, hi) = bound.unwrap_or((0, 0));
                    IntHistogram::new(buckets, lo, hi).map(Histogram::Int)
                }
                DataType::Str(_) => StringHistogram::new(buckets).map(Histogram::Str),
            })
            .collect::<Result<Vec<_>>>()?;

        // Pass 2: populate
        scan.rewind()?;
        while let Some(tuple) = scan.next_tuple()? {
            for (histogram, value) in histograms.iter_mut().zip(tuple.values()) {
                histogram.add_value(value);
            }
        }
        scan.close();

        info!(
            table_id = file.table_id().as_u32(),
            tuples = total_tuples,
            pages = file.num_pages(),
            "computed table statistics"
        );

        Ok(Self {
            file: Arc::clone(file),
            io_cost_per_page,
            total_tuples,
            histograms,
        })
    }

    /// Cost of a full sequential scan. A partially filled page costs as much as a full one.
    pub fn estimate_scan_cost(&self) -> f64 {
        f64::from(self.file.num_pages()) * self.io_cost_per_page
    }

    /// Expected number of tuples left after a predicate of the given selectivity.
    pub fn estimate_table_cardinality(&self, selectivity: f64) -> u64 {
        (self.total_tuples as f64 * selectivity).ceil() as u64
    }

    pub fn avg_selectivity(&self, _field: usize, _op: Op) -> f64 {
        1.0
    }

    /// Estimates the selectivity of `field op constant`.
    pub fn estimate_selectivity(&self, field: usize, op: Op, constant: &Value) -> Result<f64> {
        self.histogram(field)
            .ok_or(KilnError::ColumnOutOfRange(field))?
            .estimate_selectivity(op, constant)
    }

    pub fn histogram(&self, field: usize) -> Option<&Histogram> {
        self.histograms.get(field)
    }

    pub fn total_tuples(&self) -> u64 {
        self.total_tuples
    }

    pub fn table_file(&self) -> &Arc<TableFile> {
        &self.file
    }
}

/// Statistics for every table of a catalog, keyed by table name.
#[derive(Default)]
pub struct StatsRegistry {
    tables: HashMap<String, TableStats>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans every table of the catalog and collects its statistics.
    pub fn compute_all(
        catalog: &Catalog,
        pool: &Arc<BufferPool>,
        config: &KilnConfig,
    ) -> Result<Self> {
        info!("computing table statistics");
        let mut registry = Self::new();
        for table_id in catalog.table_ids() {
            let file = catalog.table_file(table_id)?;
            let name = catalog
                .table_name(table_id)
                .ok_or(KilnError::TableNotFound(table_id))?;
            let stats = TableStats::compute(
                &file,
                pool,
                config.io_cost_per_page,
                config.histogram_buckets,
            )?;
            registry.insert(name, stats);
        }
        info!(tables = registry.len(), "done computing table statistics");
        Ok(registry)
    }

    pub fn get(&self, table: &str) -> Option<&TableStats> {
        self.tables.get(table)
    }

    pub fn insert(&mut self, table: impl Into<String>, stats: TableStats) -> Option<TableStats> {
        self.tables.insert(table.into(), stats)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TableStats)> {
        self.tables.iter().map(|(name, stats)| (name.as_str(), stats))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
