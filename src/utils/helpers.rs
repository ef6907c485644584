/// Last column Excel accepts (`XFD`).
pub const MAX_COLUMNS: usize = 16_384;

/// Last row Excel accepts.
pub const MAX_ROWS: u32 = 1_048_576;

/// Converts a 1-based column index into its letters (`1` -> `A`, `27` -> `AA`).
#[must_use]
pub fn index_to_col_name(index: usize) -> String {
    let mut col_name = String::new();
    let mut n = index;

    while n > 0 {
        let remainder = (n - 1) % 26;
        col_name.insert(0, (b'A' + remainder as u8) as char);
        n = (n - 1) / 26;
    }

    if col_name.is_empty() {
        col_name.push('A');
    }

    col_name
}

/// Converts column letters into a 1-based index. Case-insensitive.
///
/// Returns `None` for empty input, non-letters, or columns past `XFD`.
#[must_use]
pub fn col_name_to_index(name: &str) -> Option<usize> {
    if name.is_empty() {
        return None;
    }

    let mut result: usize = 0;

    for c in name.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }

        let val = (c.to_ascii_uppercase() as u8 - b'A' + 1) as usize;
        result = result * 26 + val;

        if result > MAX_COLUMNS {
            return None;
        }
    }

    Some(result)
}

// Format cell reference (e.g., A1, B2) from a (row, col) pair
#[must_use]
pub fn cell_reference(cell: (u32, usize)) -> String {
    format!("{}{}", index_to_col_name(cell.1), cell.0)
}
