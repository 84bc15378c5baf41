use std::fs;
use std::path::{Path, PathBuf};
use trackcore::prelude::DashboardResult;
use trackcore::query::Detection;

pub const RESULTS_FILE: &str = "search_results.csv";
pub const RESULTS_PER_PAGE: usize = 10;

const HEADER: [&str; 8] = [
    "id",
    "timestamp",
    "tpms_id",
    "tpms_model",
    "car_model",
    "location",
    "latitude",
    "longitude",
];

/// Number of result pages, never less than one.
pub fn page_count(total: usize) -> usize {
    total.div_ceil(RESULTS_PER_PAGE).max(1)
}

/// The slice of `results` shown on `page`, clamped to the last page.
pub fn page_slice<T>(results: &[T], page: usize) -> &[T] {
    let page = page.min(page_count(results.len()) - 1);
    let start = page * RESULTS_PER_PAGE;
    let end = (start + RESULTS_PER_PAGE).min(results.len());
    results.get(start..end).unwrap_or(&[])
}

fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn coordinate(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn results_csv(results: &[Detection]) -> String {
    let mut out = HEADER.join(",");
    out.push('\n');
    for d in results {
        let row = [
            field(&d.id),
            field(&d.timestamp),
            field(&d.tpms_id),
            field(&d.tpms_model),
            field(&d.car_model),
            field(&d.location),
            coordinate(d.latitude),
            coordinate(d.longitude),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Writes the result list into `dir` and returns the file written.
pub fn write_results(dir: &Path, results: &[Detection]) -> DashboardResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(RESULTS_FILE);
    fs::write(&path, results_csv(results))?;
    log::info!("exported {} results to {}", results.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn pages_hold_ten_results() {
        let results: Vec<usize> = (0..23).collect();
        assert_eq!(page_count(results.len()), 3);
        assert_eq!(page_slice(&results, 0), &results[..10]);
        assert_eq!(page_slice(&results, 2), &results[20..]);
        // Past the end falls back to the last page.
        assert_eq!(page_slice(&results, 7), &results[20..]);
        assert_eq!(page_count(0), 1);
        assert!(page_slice::<usize>(&[], 0).is_empty());
    }

    #[test]
    fn csv_quotes_fields_that_need_it() {
        let detection = Detection {
            id: "1".into(),
            timestamp: "2025-01-01T10:00:00Z".into(),
            tpms_id: "T1".into(),
            tpms_model: "Schrader".into(),
            car_model: "Sedan, \"blue\"".into(),
            location: "Lantern 1".into(),
            latitude: Some(42.36),
            longitude: None,
        };
        let csv = results_csv(&[detection]);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "id,timestamp,tpms_id,tpms_model,car_model,location,latitude,longitude"
        );
        assert_eq!(
            lines[1],
            "1,2025-01-01T10:00:00Z,T1,Schrader,\"Sedan, \"\"blue\"\"\",Lantern 1,42.36,"
        );
    }

    #[test]
    fn export_writes_into_the_given_directory() {
        let dir = TempDir::new().unwrap();
        let path = write_results(dir.path(), &[]).unwrap();
        assert_eq!(path, dir.path().join(RESULTS_FILE));
        assert_eq!(fs::read_to_string(path).unwrap().lines().count(), 1);
    }
}
