//! Unifier: per-symbol tables → unified table.

use stockpipe_core::warehouse::{union_all_statement, Warehouse};
use stockpipe_core::PipelineConfig;

use super::{Stage, StageError, StageReport};

/// Rebuild the unified table as the `UNION ALL` of every configured
/// per-symbol table. The previous unified table is discarded.
///
/// Every per-symbol table must exist, including those of symbols skipped in
/// this run; a missing one fails the stage.
pub fn unify(config: &PipelineConfig, warehouse: &dyn Warehouse) -> Result<StageReport, StageError> {
    let target = config.unified_table_ref();
    let sources = config.symbol_tables();
    tracing::info!(table = %target, sources = sources.len(), "unify started");
    tracing::debug!(statement = %union_all_statement(&target, &sources), "rebuilding unified table");

    let rows = match warehouse.replace_with_union_all(&target, &sources) {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(table = %target, error = %e, "unify failed");
            return Err(e.into());
        }
    };

    tracing::info!(table = %target, rows, "unify finished");
    let mut report = StageReport::new(Stage::Unify);
    report.unified_rows = Some(rows);
    Ok(report)
}
