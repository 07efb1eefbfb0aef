//! Column alignment for tab-delimited tool output.
//!
//! Test summaries arrive as one line per package with tab-separated fields.
//! This module turns them into a table whose columns line up across every row.

/// Formats tab-separated `text` as a left-justified table.
///
/// Lines starting with `detail_prefix` are per-assertion detail and are dropped
/// before any width is computed. Every remaining row is padded to the widest
/// row's column count and terminated by a newline.
pub fn format_table(text: &str, detail_prefix: &str) -> String {
    let rows = split_rows(text, detail_prefix);
    let widths = column_widths(&rows);
    if widths.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    for row in &rows {
        let cells = widths
            .iter()
            .enumerate()
            .map(|(index, width)| {
                let cell = row.get(index).copied().unwrap_or("");
                format!("{:<width$}", cell, width = *width)
            })
            .collect::<Vec<_>>();
        out.push_str(&cells.join(" "));
        out.push('\n');
    }
    out
}

fn split_rows<'a>(text: &'a str, detail_prefix: &str) -> Vec<Vec<&'a str>> {
    let trimmed = text.trim_matches(|c: char| c == '\n' || c == '\r');
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed
        .lines()
        .filter(|line| detail_prefix.is_empty() || !line.starts_with(detail_prefix))
        .map(|line| line.trim().split('\t').map(str::trim).collect())
        .collect()
}

fn column_widths(rows: &[Vec<&str>]) -> Vec<usize> {
    let mut widths: Vec<usize> = Vec::new();
    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            let width = cell.chars().count();
            match widths.get_mut(index) {
                Some(current) => *current = (*current).max(width),
                None => widths.push(width),
            }
        }
    }
    widths
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL: &str = "    ";

    #[test]
    fn aligns_columns_across_rows() {
        let out = format_table("PASS\tpkgA\t0.01s\nFAIL\tpkgB\t0.02s", DETAIL);
        assert_eq!(out, "PASS pkgA 0.01s\nFAIL pkgB 0.02s\n");
    }

    #[test]
    fn widths_come_from_the_widest_cell() {
        let out = format_table("ok\tgithub.com/a/b\t0.1s\n?\tc\t[no test files]\n", DETAIL);
        let lines = out.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "ok github.com/a/b 0.1s           ");
        assert_eq!(lines[1], "?  c              [no test files]");
        assert_eq!(lines[0].len(), lines[1].len());
    }

    #[test]
    fn short_rows_are_padded_to_full_width() {
        let out = format_table("a\tbb\tccc\nlonger", DETAIL);
        assert_eq!(out, "a      bb ccc\nlonger       \n");
    }

    #[test]
    fn detail_lines_do_not_affect_widths() {
        let raw = "ok\tpkg\t0.1s\n    foo_test.go:12: a very long assertion message\nok\tother\t0.2s";
        let out = format_table(raw, DETAIL);
        assert_eq!(out, "ok pkg   0.1s\nok other 0.2s\n");
        assert!(!out.contains("assertion"));
    }

    #[test]
    fn cells_are_trimmed() {
        let out = format_table("ok  \tpkg \t 0.1s\tcoverage: 50.0% of statements", DETAIL);
        assert_eq!(out, "ok pkg 0.1s coverage: 50.0% of statements\n");
    }

    #[test]
    fn single_column_rows_without_tabs() {
        assert_eq!(format_table("one\nthree", DETAIL), "one  \nthree\n");
    }

    #[test]
    fn empty_input_yields_empty_table() {
        assert_eq!(format_table("", DETAIL), "");
        assert_eq!(format_table("\n\n", DETAIL), "");
        assert_eq!(format_table("    only detail", DETAIL), "");
    }

    #[test]
    fn reformatting_with_tabs_restored_is_stable() {
        let first = format_table("PASS\tpkgA\t0.01s\nFAIL\tlonger-pkg\t0.2s", DETAIL);
        let retabbed = first
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join("\t"))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(format_table(&retabbed, DETAIL), first);
    }

    #[test]
    fn width_counts_characters_not_bytes() {
        let out = format_table("é\tx\nab\ty", DETAIL);
        assert_eq!(out, "é  x\nab y\n");
    }
}
