use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::RefreshJob;
use crate::db::{RowFetcher, TableData};
use crate::error::{RefreshError, RefreshResult};
use crate::excel::{Sheet, Workbook, derive_output_path, open_workbook};
use crate::update::{
    ColumnMapping, FormulaMap, RestorePolicy, SheetUpdate, SourceUpdate, UpdatedRows,
    clear_old_data, collect_formulas, columns_to_check, restore_formulas, write_data,
};
use crate::utils::{timed, timed_debug};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    pub restore_policy: RestorePolicy,
}

/// Per-sheet diagnostics of one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SheetReport {
    pub sheet: String,
    pub formulas_found: usize,
    pub cells_cleared: usize,
    pub cells_written: usize,
    pub rows_updated: usize,
    pub formulas_restored: usize,
    pub formulas_dropped: usize,
}

/// Refreshes every listed sheet of `workbook` from one data set.
///
/// Missing sheets and an empty data set are skipped with a warning.
pub fn apply_single_source(
    workbook: &mut Workbook,
    data: &TableData,
    sheet_updates: &IndexMap<String, SheetUpdate>,
    options: UpdateOptions,
) -> RefreshResult<Vec<SheetReport>> {
    let mut reports = Vec::with_capacity(sheet_updates.len());

    for (sheet_name, update) in sheet_updates {
        let Some(sheet) = workbook.sheet_mut(sheet_name) else {
            warn!("Sheet '{}' does not exist in the workbook", sheet_name);
            continue;
        };

        if data.is_empty() {
            warn!("Data set is empty, skipping sheet '{}'", sheet_name);
            continue;
        }

        info!("Processing sheet '{}'", sheet_name);
        let formulas = timed_debug("Formula scan", || {
            collect_formulas(sheet, &update.columns_to_check())
        });

        let mut report = SheetReport {
            sheet: sheet_name.clone(),
            formulas_found: formulas.len(),
            ..Default::default()
        };

        let updated_rows = apply_data(sheet, data, &update.column_mapping, &formulas, &mut report)?;
        finish_sheet(sheet, &formulas, &updated_rows, options, &mut report);
        reports.push(report);
    }

    Ok(reports)
}

/// Refreshes sheets from several named data sets.
///
/// One formula index per sheet covers the columns of every update; updates are cleared
/// and written in order, and formulas are restored once against the union of
/// all rows any update wrote. Missing or empty sources are skipped with a
/// warning; a sheet none of whose updates applied is left as loaded.
pub fn apply_multi_source(
    workbook: &mut Workbook,
    sources: &HashMap<String, TableData>,
    sheet_updates: &IndexMap<String, Vec<SourceUpdate>>,
    options: UpdateOptions,
) -> RefreshResult<Vec<SheetReport>> {
    let mut reports = Vec::with_capacity(sheet_updates.len());

    for (sheet_name, updates) in sheet_updates {
        let Some(sheet) = workbook.sheet_mut(sheet_name) else {
            warn!("Sheet '{}' does not exist in the workbook", sheet_name);
            continue;
        };

        info!("Processing sheet '{}'", sheet_name);
        let formulas = timed_debug("Formula scan", || {
            collect_formulas(sheet, &columns_to_check(updates))
        });

        let mut report = SheetReport {
            sheet: sheet_name.clone(),
            formulas_found: formulas.len(),
            ..Default::default()
        };
        let mut all_updated_rows = UpdatedRows::new();
        let mut applied = 0;

        for update in updates {
            let Some(data) = sources.get(&update.source) else {
                warn!("Data source '{}' does not exist", update.source);
                continue;
            };
            if data.is_empty() {
                warn!("Data source '{}' is empty", update.source);
                continue;
            }

            let rows = apply_data(sheet, data, &update.column_mapping, &formulas, &mut report)?;
            all_updated_rows.extend(rows);
            applied += 1;
        }

        if applied == 0 {
            warn!("No data applied to sheet '{}', leaving it unchanged", sheet_name);
            continue;
        }

        finish_sheet(sheet, &formulas, &all_updated_rows, options, &mut report);
        reports.push(report);
    }

    Ok(reports)
}

fn apply_data(
    sheet: &mut Sheet,
    data: &TableData,
    mapping: &ColumnMapping,
    formulas: &FormulaMap,
    report: &mut SheetReport,
) -> RefreshResult<UpdatedRows> {
    report.cells_cleared += timed_debug("Clear", || clear_old_data(sheet, mapping, formulas));

    let outcome = timed_debug("Write", || write_data(sheet, data, mapping, formulas))?;
    report.cells_written += outcome.cells_written;

    Ok(outcome.updated_rows)
}

fn finish_sheet(
    sheet: &mut Sheet,
    formulas: &FormulaMap,
    updated_rows: &UpdatedRows,
    options: UpdateOptions,
    report: &mut SheetReport,
) {
    let stats = timed_debug("Formula restore", || {
        restore_formulas(sheet, formulas, updated_rows, options.restore_policy)
    });

    report.rows_updated = updated_rows.len();
    report.formulas_restored = stats.restored + stats.kept;
    report.formulas_dropped = stats.dropped;

    info!(
        "Sheet '{}': {} formulas found, {} cells cleared, {} cells written over {} rows, {} formulas restored, {} dropped",
        report.sheet,
        report.formulas_found,
        report.cells_cleared,
        report.cells_written,
        report.rows_updated,
        report.formulas_restored,
        report.formulas_dropped
    );
}

fn run_update<F>(path: &Path, apply: F) -> RefreshResult<PathBuf>
where
    F: FnOnce(&mut Workbook) -> RefreshResult<Vec<SheetReport>>,
{
    let output_path = derive_output_path(path);

    info!("Loading Excel file: {}", path.display());
    let mut workbook = timed("Workbook load", || open_workbook(path))?;

    apply(&mut workbook)?;

    info!("Saving file: {}", output_path.display());
    timed("Workbook save", || workbook.save_as(&output_path))?;

    Ok(output_path)
}

/// Loads `path`, refreshes it from one data set and saves the result next to
/// it as `<stem>_update<ext>`. Returns the new path.
pub fn update_excel_file(
    path: &Path,
    data: &TableData,
    sheet_updates: &IndexMap<String, SheetUpdate>,
    options: UpdateOptions,
) -> RefreshResult<PathBuf> {
    timed("update_excel_file", || {
        run_update(path, |workbook| {
            apply_single_source(workbook, data, sheet_updates, options)
        })
    })
    .inspect_err(|e| error!("Error updating Excel file: {}", e))
}

/// Multi-source counterpart of [`update_excel_file`].
pub fn update_excel_file_multi_sources(
    path: &Path,
    sources: &HashMap<String, TableData>,
    sheet_updates: &IndexMap<String, Vec<SourceUpdate>>,
    options: UpdateOptions,
) -> RefreshResult<PathBuf> {
    timed("update_excel_file_multi_sources", || {
        run_update(path, |workbook| {
            apply_multi_source(workbook, sources, sheet_updates, options)
        })
    })
    .inspect_err(|e| error!("Error updating Excel file: {}", e))
}

/// Fetches every source the job's sheets use concurrently, then runs the
/// multi-source update on a blocking thread. The first failed fetch aborts
/// the others and nothing is written.
pub async fn refresh(fetcher: Arc<dyn RowFetcher>, job: &RefreshJob) -> RefreshResult<PathBuf> {
    let mut tasks = JoinSet::new();

    for (name, query) in job.referenced_sources() {
        let fetcher = Arc::clone(&fetcher);
        tasks.spawn(async move {
            let result = fetcher.fetch(&query).await;
            (name, result)
        });
    }

    let mut sources = HashMap::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        let (name, result) = joined.map_err(|e| RefreshError::Task(e.to_string()))?;
        let data = result.inspect_err(|e| error!("Fetching source '{}' failed: {}", name, e))?;
        info!("Source '{}' returned {} rows", name, data.len());
        sources.insert(name, data);
    }

    let path = job.workbook.clone();
    let sheets = job.sheets.clone();
    let options = job.options();

    tokio::task::spawn_blocking(move || {
        update_excel_file_multi_sources(&path, &sources, &sheets, options)
    })
    .await
    .map_err(|e| RefreshError::Task(e.to_string()))?
}
