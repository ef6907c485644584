use serde::Deserialize;

use crate::excel::{Cell, Sheet};
use crate::update::{FormulaMap, UpdatedRows};

/// What happens to indexed formulas on rows that received no data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestorePolicy {
    /// Formulas only live on the header row and on rows with fresh data.
    #[default]
    DropUntouched,
    KeepUntouched,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RestoreStats {
    pub restored: usize,
    pub dropped: usize,
    pub kept: usize,
}

/// Writes each indexed formula back when its row is the header or was
/// updated; other formula cells are blanked or kept per `policy`.
pub fn restore_formulas(
    sheet: &mut Sheet,
    formulas: &FormulaMap,
    updated_rows: &UpdatedRows,
    policy: RestorePolicy,
) -> RestoreStats {
    let mut stats = RestoreStats::default();

    for (coord, source) in formulas {
        if coord.row == 1 || updated_rows.contains(&coord.row) {
            sheet.set(*coord, Cell::formula(source.clone()));
            stats.restored += 1;
            continue;
        }

        match policy {
            RestorePolicy::DropUntouched => {
                if sheet.clear(*coord) {
                    stats.dropped += 1;
                }
            }
            RestorePolicy::KeepUntouched => {
                sheet.set(*coord, Cell::formula(source.clone()));
                stats.kept += 1;
            }
        }
    }

    stats
}
