use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::domain::{DataMethod, PriceSeries};
use crate::vendor::{VendorError, VendorImplementation, VendorPayload, VendorRequest};

/// Sub-directories of `{dir}/news` aggregated by the local news binding.
pub const LOCAL_NEWS_SOURCES: [&str; 3] = ["finnhub", "reddit", "google_news"];

const GLOBAL_FILE_STEM: &str = "global";

/// Offline price files: `{dir}/prices/{SYMBOL}.csv` in the CSV boundary format.
#[derive(Debug, Clone)]
pub struct LocalPrices {
    root: PathBuf,
}

impl LocalPrices {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl VendorImplementation for LocalPrices {
    fn fetch(&self, request: &VendorRequest) -> Result<VendorPayload, VendorError> {
        let symbol = request
            .require_symbol()
            .map_err(|error| VendorError::internal(error.to_string()))?;
        let range = request
            .require_range()
            .map_err(|error| VendorError::internal(error.to_string()))?;

        let path = self
            .root
            .join("prices")
            .join(format!("{}.csv", symbol.as_str()));
        let text = read_file(&path)?;
        let series = PriceSeries::from_csv(&text)
            .map_err(|error| VendorError::invalid_response(format!("{}: {error}", path.display())))?;
        Ok(VendorPayload::Prices(series.within(range)))
    }
}

/// Offline text reports: `{dir}/{subdir}/{SYMBOL}.txt`, or `global.txt` for
/// methods that take no symbol.
#[derive(Debug, Clone)]
pub struct LocalText {
    dir: PathBuf,
    label: String,
}

impl LocalText {
    /// Reports for `method`, stored under a directory named after it.
    pub fn for_method(root: &Path, method: DataMethod) -> Self {
        Self {
            dir: root.join(method.as_str()),
            label: method.as_str().to_string(),
        }
    }

    /// One news sub-source under `{dir}/news/{source}`.
    pub fn news_source(root: &Path, source: &str) -> Self {
        Self {
            dir: root.join("news").join(source),
            label: source.to_string(),
        }
    }
}

impl VendorImplementation for LocalText {
    fn fetch(&self, request: &VendorRequest) -> Result<VendorPayload, VendorError> {
        let stem = match &request.symbol {
            Some(symbol) => symbol.as_str().to_string(),
            None if !request.method.needs_symbol() => String::from(GLOBAL_FILE_STEM),
            None => {
                return Err(VendorError::internal(format!(
                    "method '{}' requires a symbol",
                    request.method
                )))
            }
        };

        let text = read_file(&self.dir.join(format!("{stem}.txt")))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(VendorError::not_found(format!("{} has no data for {stem}", self.label)));
        }
        Ok(VendorPayload::Text(format!("## {}\n{text}", self.label)))
    }
}

fn read_file(path: &Path) -> Result<String, VendorError> {
    fs::read_to_string(path).map_err(|error| match error.kind() {
        ErrorKind::NotFound => VendorError::not_found(format!("{} does not exist", path.display())),
        _ => VendorError::internal(format!("failed to read {}: {error}", path.display())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DateRange, Symbol};
    use crate::vendor::VendorErrorKind;

    #[test]
    fn reads_price_file_and_filters_range() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("prices")).expect("mkdir");
        fs::write(
            dir.path().join("prices").join("AAPL.csv"),
            "Date,Open,High,Low,Close,Adj Close,Volume\n\
             2024-01-02,187.15,188.44,183.89,185.64,184.94,82488700\n\
             2024-01-03,184.22,185.88,183.43,184.25,183.56,58414500\n",
        )
        .expect("write");

        let vendor = LocalPrices::new(dir.path());
        let request = VendorRequest::prices(
            Symbol::parse("AAPL").expect("symbol"),
            DateRange::parse("2024-01-03", "2024-01-05").expect("range"),
        );
        let VendorPayload::Prices(series) = vendor.fetch(&request).expect("prices") else {
            panic!("expected prices");
        };
        assert_eq!(series.len(), 1);
        assert_eq!(series.bars()[0].close, Some(184.25));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let vendor = LocalPrices::new(dir.path());
        let request = VendorRequest::prices(
            Symbol::parse("MSFT").expect("symbol"),
            DateRange::parse("2024-01-01", "2024-01-05").expect("range"),
        );
        let error = vendor.fetch(&request).expect_err("missing");
        assert_eq!(error.kind(), VendorErrorKind::NotFound);
    }

    #[test]
    fn global_news_reads_global_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let reddit = dir.path().join("news").join("reddit");
        fs::create_dir_all(&reddit).expect("mkdir");
        fs::write(reddit.join("global.txt"), "markets rally\n").expect("write");

        let vendor = LocalText::news_source(dir.path(), "reddit");
        let payload = vendor
            .fetch(&VendorRequest::new(DataMethod::GetGlobalNews))
            .expect("text");
        assert_eq!(payload, VendorPayload::Text(String::from("## reddit\nmarkets rally")));
    }
}
