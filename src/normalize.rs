//! Table normalization for scraped trending CSVs.
//!
//! Loads every per-country file matching a glob into one [`Table`], then
//! cleans it:
//!
//! 1. Missing `description` becomes an empty string
//! 2. `trending_date` is parsed as `%y.%d.%m`, failures become null
//! 3. `publish_time` is parsed as an ISO-8601 UTC timestamp, failures become null
//! 4. `category` is joined from `category_id` via the region mapping
//! 5. Rows with a null in any column are dropped
//!
//! [`normalize`] always runs the category join before the null drop, so an
//! unmapped category removes the row just like any other missing value.

use crate::models::CategoryList;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

pub const COUNTRY_COLUMN: &str = "country";
pub const CATEGORY_COLUMN: &str = "category";
pub const CATEGORY_ID_COLUMN: &str = "category_id";
pub const DESCRIPTION_COLUMN: &str = "description";
pub const TRENDING_DATE_COLUMN: &str = "trending_date";
pub const PUBLISH_TIME_COLUMN: &str = "publish_time";

pub const TRENDING_DATE_TEMPLATE: &str = "%y.%d.%m";
/// Fractional seconds are optional: `%.f` also accepts their absence.
pub const PUBLISH_TIME_TEMPLATE: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Scraper header names mapped onto the dataset's snake_case names.
const COLUMN_ALIASES: [(&str, &str); 4] = [
    ("publishedAt", PUBLISH_TIME_COLUMN),
    ("channelId", "channel_id"),
    ("channelTitle", "channel_title"),
    ("categoryId", CATEGORY_ID_COLUMN),
];

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("unreadable path while globbing: {0}")]
    Glob(#[from] glob::GlobError),
    #[error("no CSV files match {0}")]
    NoFiles(String),
    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("column {0:?} not found")]
    MissingColumn(String),
    #[error("failed to read category mapping {path}: {source}")]
    CategoryIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid category mapping {path}: {source}")]
    CategoryJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A single table value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Rendering used when the table is written back out.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
            Cell::Timestamp(ts) => ts.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
}

/// Column-named rows from every loaded country file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, NormalizeError> {
        self.column_index(name)
            .ok_or_else(|| NormalizeError::MissingColumn(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append rows read under `columns`, widening the table as needed.
    /// Columns missing on either side are null-filled.
    fn append(&mut self, columns: Vec<String>, rows: Vec<Row>) {
        let mut positions = Vec::with_capacity(columns.len());
        for name in columns {
            let idx = match self.column_index(&name) {
                Some(idx) => idx,
                None => {
                    self.columns.push(name);
                    for row in &mut self.rows {
                        row.cells.push(Cell::Null);
                    }
                    self.columns.len() - 1
                }
            };
            positions.push(idx);
        }
        for row in rows {
            let mut cells = vec![Cell::Null; self.columns.len()];
            for (cell, &idx) in row.cells.into_iter().zip(&positions) {
                cells[idx] = cell;
            }
            self.rows.push(Row { cells });
        }
    }
}

/// Counts of what the cleanup pass discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub unparsed_trending_dates: usize,
    pub unparsed_publish_times: usize,
    pub dropped_rows: usize,
}

/// Load every CSV matching `pattern` (sorted by path) into one table.
#[instrument(level = "info")]
pub fn load_all_csv(pattern: &str) -> Result<Table, NormalizeError> {
    let mut files = glob::glob(pattern)?.collect::<Result<Vec<_>, _>>()?;
    files.sort();
    if files.is_empty() {
        return Err(NormalizeError::NoFiles(pattern.to_string()));
    }
    debug!(files = ?files, "Matched CSV files");

    let mut table = Table::default();
    for file in &files {
        let (columns, rows) = load_csv(file)?;
        table.append(columns, rows);
    }
    info!(files = files.len(), rows = table.len(), "Loaded trending CSVs");
    Ok(table)
}

/// Read one file and tag each row with the file's two-character country
/// prefix. Empty values load as null; invalid UTF-8 is replaced.
pub fn load_csv(path: &Path) -> Result<(Vec<String>, Vec<Row>), NormalizeError> {
    let csv_err = |source| NormalizeError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(csv_err)?;

    let mut columns: Vec<String> = rdr
        .byte_headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| canonical_column(&String::from_utf8_lossy(h)))
        .collect();
    columns.push(COUNTRY_COLUMN.to_string());

    let country: String = path
        .file_name()
        .map(|name| name.to_string_lossy().chars().take(2).collect())
        .unwrap_or_default();

    let mut rows = Vec::new();
    for record in rdr.byte_records() {
        let record = record.map_err(csv_err)?;
        let mut cells: Vec<Cell> = record
            .iter()
            .map(|value| {
                if value.is_empty() {
                    Cell::Null
                } else {
                    Cell::Text(String::from_utf8_lossy(value).into_owned())
                }
            })
            .collect();
        cells.push(Cell::Text(country.clone()));
        rows.push(Row { cells });
    }
    debug!(path = %path.display(), rows = rows.len(), %country, "Loaded CSV");
    Ok((columns, rows))
}

fn canonical_column(name: &str) -> String {
    let name = name.trim();
    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Replace nulls in `column` with `value`.
pub fn fill_missing(table: &mut Table, column: &str, value: &str) -> Result<(), NormalizeError> {
    let idx = table.require_column(column)?;
    for row in &mut table.rows {
        if row.cells[idx].is_null() {
            row.cells[idx] = Cell::Text(value.to_string());
        }
    }
    Ok(())
}

/// Parse `column` as a calendar date. Returns how many values became null.
pub fn parse_date_column(
    table: &mut Table,
    column: &str,
    template: &str,
) -> Result<usize, NormalizeError> {
    reformat_column(table, column, |text| {
        NaiveDate::parse_from_str(text, template).ok().map(Cell::Date)
    })
}

/// Parse `column` as a UTC timestamp. Returns how many values became null.
pub fn parse_timestamp_column(
    table: &mut Table,
    column: &str,
    template: &str,
) -> Result<usize, NormalizeError> {
    reformat_column(table, column, |text| {
        NaiveDateTime::parse_from_str(text, template)
            .ok()
            .map(|dt| Cell::Timestamp(dt.and_utc()))
    })
}

fn reformat_column<F>(table: &mut Table, column: &str, parse: F) -> Result<usize, NormalizeError>
where
    F: Fn(&str) -> Option<Cell>,
{
    let idx = table.require_column(column)?;
    let mut failed = 0;
    for row in &mut table.rows {
        let parsed = match &row.cells[idx] {
            Cell::Text(text) => parse(text.trim()),
            Cell::Null => None,
            already => Some(already.clone()),
        };
        row.cells[idx] = parsed.unwrap_or_else(|| {
            failed += 1;
            Cell::Null
        });
    }
    Ok(failed)
}

/// Remove every row holding a null. Returns the number removed.
pub fn drop_incomplete(table: &mut Table) -> usize {
    let before = table.rows.len();
    table
        .rows
        .retain(|row| !row.cells.iter().any(Cell::is_null));
    before - table.rows.len()
}

/// Fill descriptions, parse both datetime columns, then drop incomplete rows.
pub fn cleanup(table: &mut Table) -> Result<CleanupReport, NormalizeError> {
    fill_missing(table, DESCRIPTION_COLUMN, "")?;
    let unparsed_trending_dates =
        parse_date_column(table, TRENDING_DATE_COLUMN, TRENDING_DATE_TEMPLATE)?;
    let unparsed_publish_times =
        parse_timestamp_column(table, PUBLISH_TIME_COLUMN, PUBLISH_TIME_TEMPLATE)?;
    let dropped_rows = drop_incomplete(table);

    let report = CleanupReport {
        unparsed_trending_dates,
        unparsed_publish_times,
        dropped_rows,
    };
    info!(
        unparsed_trending_dates,
        unparsed_publish_times,
        dropped_rows,
        remaining = table.len(),
        "Cleaned trending table"
    );
    Ok(report)
}

/// Read a `videoCategories` dump into an `id → title` map.
pub fn load_category_map(path: &Path) -> Result<HashMap<String, String>, NormalizeError> {
    let text = std::fs::read_to_string(path).map_err(|source| NormalizeError::CategoryIo {
        path: path.to_path_buf(),
        source,
    })?;
    let list: CategoryList =
        serde_json::from_str(&text).map_err(|source| NormalizeError::CategoryJson {
            path: path.to_path_buf(),
            source,
        })?;
    let map = list.into_map();
    debug!(categories = map.len(), path = %path.display(), "Loaded category mapping");
    Ok(map)
}

/// Insert a `category` column right after `category_id`. Unmapped or
/// missing ids give a null category.
///
/// An existing `category` column, e.g. from a previously exported table, is
/// replaced rather than duplicated.
pub fn fill_category(
    table: &mut Table,
    categories: &HashMap<String, String>,
) -> Result<(), NormalizeError> {
    table.require_column(CATEGORY_ID_COLUMN)?;
    if let Some(old) = table.column_index(CATEGORY_COLUMN) {
        table.columns.remove(old);
        for row in &mut table.rows {
            row.cells.remove(old);
        }
    }
    let id_idx = table.require_column(CATEGORY_ID_COLUMN)?;
    let insert_at = id_idx + 1;
    table.columns.insert(insert_at, CATEGORY_COLUMN.to_string());

    for row in &mut table.rows {
        let name = row.cells[id_idx]
            .as_text()
            .and_then(|id| categories.get(id.trim()))
            .map(|title| Cell::Text(title.clone()))
            .unwrap_or(Cell::Null);
        row.cells.insert(insert_at, name);
    }
    Ok(())
}

/// Load, join categories, and clean in that order.
#[instrument(level = "info", skip_all, fields(%pattern, categories = %category_path.display()))]
pub fn normalize(pattern: &str, category_path: &Path) -> Result<Table, NormalizeError> {
    let categories = load_category_map(category_path)?;
    let mut table = load_all_csv(pattern)?;
    fill_category(&mut table, &categories)?;
    cleanup(&mut table)?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CountryDataset, TrendingRecord};
    use crate::outputs::csv::render_country_csv;
    use chrono::TimeZone;
    use std::fs;

    impl Table {
        fn get(&self, row: usize, column: &str) -> Option<&Cell> {
            let idx = self.column_index(column)?;
            self.rows.get(row).and_then(|r| r.cells.get(idx))
        }
    }

    const KAGGLE_HEADER: &str = "video_id,trending_date,title,channel_title,category_id,publish_time,tags,views,likes,dislikes,comment_count,thumbnail_link,comments_disabled,ratings_disabled,video_error_or_removed,description";

    fn kaggle_row(id: &str, trending: &str, category: &str, publish: &str, description: &str) -> String {
        format!(
            "{id},{trending},Title {id},Chan,{category},{publish},a|b,10,1,0,2,https://i.ytimg.com/{id}.jpg,False,False,False,{description}"
        )
    }

    fn categories() -> HashMap<String, String> {
        HashMap::from([
            ("10".to_string(), "Music".to_string()),
            ("24".to_string(), "Entertainment".to_string()),
        ])
    }

    fn record(id: &str) -> TrendingRecord {
        TrendingRecord {
            video_id: id.to_string(),
            title: format!("Title {id}"),
            published_at: "2021-03-14T17:00:00Z".to_string(),
            channel_id: "UC1".to_string(),
            channel_title: "Chan".to_string(),
            category_id: "10".to_string(),
            trending_date: "21.15.03".to_string(),
            tags: "a|b".to_string(),
            view_count: 100,
            likes: 10,
            dislikes: 1,
            comment_count: 4,
            thumbnail_link: format!("https://i.ytimg.com/vi/{id}/default.jpg"),
            comments_disabled: false,
            ratings_disabled: false,
            description: "desc".to_string(),
        }
    }

    fn write(dir: &Path, name: &str, lines: &[String]) {
        fs::write(dir.join(name), lines.join("\n") + "\n").unwrap();
    }

    #[test]
    fn test_round_trip_from_emitter() {
        let tmp = tempfile::tempdir().unwrap();
        let dataset = CountryDataset {
            country_code: "US".to_string(),
            records: vec![record("a"), record("b"), record("c")],
        };
        fs::write(tmp.path().join("USvideos.csv"), render_country_csv(&dataset).unwrap()).unwrap();

        let pattern = format!("{}/*videos.csv", tmp.path().display());
        let table = load_all_csv(&pattern).unwrap();
        assert_eq!(table.len(), 3);
        for i in 0..3 {
            assert_eq!(table.get(i, COUNTRY_COLUMN), Some(&Cell::Text("US".into())));
        }
        assert!(table.column_index(PUBLISH_TIME_COLUMN).is_some());
        assert!(table.column_index(CATEGORY_ID_COLUMN).is_some());
        assert_eq!(table.get(1, "video_id"), Some(&Cell::Text("b".into())));
    }

    #[test]
    fn test_emitter_output_normalizes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut unmapped = record("x");
        unmapped.category_id = "999".to_string();
        let dataset = CountryDataset {
            country_code: "GB".to_string(),
            records: vec![record("a"), unmapped],
        };
        fs::write(tmp.path().join("GBvideos.csv"), render_country_csv(&dataset).unwrap()).unwrap();
        let mapping = tmp.path().join("GB_category_id.json");
        fs::write(&mapping, r#"{"items": [{"id": "10", "snippet": {"title": "Music"}}]}"#).unwrap();

        let pattern = format!("{}/*videos.csv", tmp.path().display());
        let table = normalize(&pattern, &mapping).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0, CATEGORY_COLUMN), Some(&Cell::Text("Music".into())));
        assert_eq!(
            table.get(0, TRENDING_DATE_COLUMN),
            Some(&Cell::Date(NaiveDate::from_ymd_opt(2021, 3, 15).unwrap()))
        );
        assert_eq!(
            table.get(0, PUBLISH_TIME_COLUMN),
            Some(&Cell::Timestamp(Utc.with_ymd_and_hms(2021, 3, 14, 17, 0, 0).unwrap()))
        );
    }

    #[test]
    fn test_load_concatenates_countries_in_path_order() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "USvideos.csv",
            &[KAGGLE_HEADER.to_string(), kaggle_row("u1", "17.14.11", "10", "2017-11-13T17:13:01.000Z", "d")],
        );
        write(
            tmp.path(),
            "CAvideos.csv",
            &[
                KAGGLE_HEADER.to_string(),
                kaggle_row("c1", "17.14.11", "24", "2017-11-13T17:13:01.000Z", "d"),
                kaggle_row("c2", "17.14.11", "24", "2017-11-13T17:13:01.000Z", "d"),
            ],
        );
        let pattern = format!("{}/*videos.csv", tmp.path().display());
        let table = load_all_csv(&pattern).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(0, COUNTRY_COLUMN), Some(&Cell::Text("CA".into())));
        assert_eq!(table.get(2, COUNTRY_COLUMN), Some(&Cell::Text("US".into())));
    }

    #[test]
    fn test_load_no_matches() {
        let tmp = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*videos.csv", tmp.path().display());
        assert!(matches!(load_all_csv(&pattern), Err(NormalizeError::NoFiles(_))));
    }

    #[test]
    fn test_cleanup_fills_description_and_drops_bad_dates() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "DEvideos.csv",
            &[
                KAGGLE_HEADER.to_string(),
                kaggle_row("ok", "21.15.03", "10", "2021-03-14T17:00:00.000Z", ""),
                kaggle_row("bad_trend", "2021-03-15", "10", "2021-03-14T17:00:00.000Z", "d"),
                kaggle_row("bad_pub", "21.15.03", "10", "14/03/2021", "d"),
            ],
        );
        let mut table = load_all_csv(&format!("{}/*.csv", tmp.path().display())).unwrap();
        let report = cleanup(&mut table).unwrap();

        assert_eq!(report.unparsed_trending_dates, 1);
        assert_eq!(report.unparsed_publish_times, 1);
        assert_eq!(report.dropped_rows, 2);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0, "video_id"), Some(&Cell::Text("ok".into())));
        assert_eq!(table.get(0, DESCRIPTION_COLUMN), Some(&Cell::Text(String::new())));
    }

    #[test]
    fn test_trending_date_template() {
        assert_eq!(
            NaiveDate::parse_from_str("21.15.03", TRENDING_DATE_TEMPLATE).unwrap(),
            NaiveDate::from_ymd_opt(2021, 3, 15).unwrap()
        );
        assert!(NaiveDate::parse_from_str("2021-03-15", TRENDING_DATE_TEMPLATE).is_err());
    }

    #[test]
    fn test_publish_time_template_with_and_without_fraction() {
        let with = NaiveDateTime::parse_from_str("2017-11-13T17:13:01.000Z", PUBLISH_TIME_TEMPLATE).unwrap();
        let without = NaiveDateTime::parse_from_str("2017-11-13T17:13:01Z", PUBLISH_TIME_TEMPLATE).unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn test_fill_category_join() {
        let mut table = Table {
            columns: vec!["video_id".into(), CATEGORY_ID_COLUMN.into(), COUNTRY_COLUMN.into()],
            rows: vec![
                Row { cells: vec![Cell::Text("a".into()), Cell::Text("10".into()), Cell::Text("US".into())] },
                Row { cells: vec![Cell::Text("b".into()), Cell::Text("999".into()), Cell::Text("US".into())] },
                Row { cells: vec![Cell::Text("c".into()), Cell::Null, Cell::Text("US".into())] },
            ],
        };
        fill_category(&mut table, &categories()).unwrap();

        assert_eq!(table.columns[2], CATEGORY_COLUMN);
        assert_eq!(table.get(0, CATEGORY_COLUMN), Some(&Cell::Text("Music".into())));
        assert_eq!(table.get(1, CATEGORY_COLUMN), Some(&Cell::Null));
        assert_eq!(table.get(2, CATEGORY_COLUMN), Some(&Cell::Null));

        assert_eq!(drop_incomplete(&mut table), 2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_fill_category_replaces_existing_column() {
        let mut table = Table {
            columns: vec![
                "video_id".into(),
                CATEGORY_ID_COLUMN.into(),
                CATEGORY_COLUMN.into(),
                COUNTRY_COLUMN.into(),
            ],
            rows: vec![Row {
                cells: vec![
                    Cell::Text("a".into()),
                    Cell::Text("24".into()),
                    Cell::Text("Stale".into()),
                    Cell::Text("US".into()),
                ],
            }],
        };
        fill_category(&mut table, &categories()).unwrap();

        assert_eq!(
            table.columns,
            ["video_id", CATEGORY_ID_COLUMN, CATEGORY_COLUMN, COUNTRY_COLUMN]
        );
        assert_eq!(table.rows[0].cells.len(), 4);
        assert_eq!(table.get(0, CATEGORY_COLUMN), Some(&Cell::Text("Entertainment".into())));
        assert_eq!(table.get(0, COUNTRY_COLUMN), Some(&Cell::Text("US".into())));
    }

    #[test]
    fn test_fill_category_requires_column() {
        let mut table = Table {
            columns: vec!["video_id".into()],
            rows: Vec::new(),
        };
        assert!(matches!(
            fill_category(&mut table, &categories()),
            Err(NormalizeError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_append_null_fills_mismatched_columns() {
        let mut table = Table::default();
        table.append(
            vec!["a".into(), "b".into()],
            vec![Row { cells: vec![Cell::Text("1".into()), Cell::Text("2".into())] }],
        );
        table.append(
            vec!["b".into(), "c".into()],
            vec![Row { cells: vec![Cell::Text("3".into()), Cell::Text("4".into())] }],
        );
        assert_eq!(table.columns, ["a", "b", "c"]);
        assert_eq!(table.rows[0].cells[2], Cell::Null);
        assert_eq!(table.rows[1].cells, vec![Cell::Null, Cell::Text("3".into()), Cell::Text("4".into())]);
    }

    #[test]
    fn test_load_category_map_missing_file() {
        let err = load_category_map(Path::new("/no/such/US_category_id.json")).unwrap_err();
        assert!(matches!(err, NormalizeError::CategoryIo { .. }));
    }
}
