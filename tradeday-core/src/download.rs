//! Download loop: walks the lookback window one calendar day at a time and
//! fetches only trading days missing from the store.

use crate::calendar::TradingCalendar;
use crate::data::provider::{DataError, PriceProvider};
use crate::storage::{DayStore, StoreError};
use chrono::{Days, NaiveDate};
use thiserror::Error;

/// Errors that stop a run. Nothing is retried.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("a {days}-day window before {today} starts outside the supported date range")]
    WindowOutOfRange { days: u32, today: NaiveDate },

    #[error("listing downloaded days failed: {0}")]
    Inventory(#[source] StoreError),

    #[error("fetch failed for {date}: {source}")]
    Fetch {
        date: NaiveDate,
        #[source]
        source: DataError,
    },

    #[error("CSV serialization failed for {date}: {source}")]
    Serialize {
        date: NaiveDate,
        #[source]
        source: DataError,
    },

    #[error("write failed for {date}: {source}")]
    Write {
        date: NaiveDate,
        #[source]
        source: StoreError,
    },
}

/// The last `days` calendar days before `today`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    pub days: u32,
    pub today: NaiveDate,
}

impl LookbackWindow {
    pub fn new(days: u32, today: NaiveDate) -> Self {
        Self { days, today }
    }

    /// First day of the window (`today - days`), or `None` when that falls
    /// before the earliest representable date.
    pub fn start(&self) -> Option<NaiveDate> {
        self.today.checked_sub_days(Days::new(u64::from(self.days)))
    }

    /// Dates in ascending order; `today` itself is not included. Empty when
    /// `start` is `None`.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let days = self.days as usize;
        self.start()
            .into_iter()
            .flat_map(move |start| start.iter_days().take(days))
    }
}

/// What happened to one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayOutcome {
    NotTradingDay,
    AlreadyDownloaded,
    Downloaded { location: String, rows: usize },
}

/// Result of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: Vec<NaiveDate>,
    pub already_present: Vec<NaiveDate>,
    pub not_trading: Vec<NaiveDate>,
}

impl DownloadSummary {
    pub fn total(&self) -> usize {
        self.downloaded.len() + self.already_present.len() + self.not_trading.len()
    }

    fn record(&mut self, date: NaiveDate, outcome: &DayOutcome) {
        match outcome {
            DayOutcome::NotTradingDay => self.not_trading.push(date),
            DayOutcome::AlreadyDownloaded => self.already_present.push(date),
            DayOutcome::Downloaded { .. } => self.downloaded.push(date),
        }
    }
}

/// Progress callback for a run. Exactly one `on_day` per calendar day.
pub trait DayProgress {
    /// Called once before the first day.
    fn on_run_start(&self, window: &LookbackWindow, store: &str, tickers: usize);

    /// Called when a day is about to be fetched.
    fn on_fetch(&self, _date: NaiveDate) {}

    /// Called with the outcome of each day.
    fn on_day(&self, date: NaiveDate, outcome: &DayOutcome);

    /// Called after the last day.
    fn on_run_complete(&self, summary: &DownloadSummary);
}

/// Progress reporter that writes through the `log` facade.
pub struct LogProgress;

impl DayProgress for LogProgress {
    fn on_run_start(&self, window: &LookbackWindow, store: &str, tickers: usize) {
        log::info!(
            "Downloading data for {tickers} tickers over the past {} days to {store} storage...",
            window.days
        );
    }

    fn on_fetch(&self, date: NaiveDate) {
        log::info!("Downloading data for {date}...");
    }

    fn on_day(&self, date: NaiveDate, outcome: &DayOutcome) {
        match outcome {
            DayOutcome::NotTradingDay => log::info!(
                "{date} is not a trading day, no data was downloaded for this date."
            ),
            DayOutcome::AlreadyDownloaded => log::info!("Data for {date} already downloaded."),
            DayOutcome::Downloaded { location, rows } => {
                log::info!("Data for {date} downloaded: {rows} rows stored at {location}.")
            }
        }
    }

    fn on_run_complete(&self, summary: &DownloadSummary) {
        log::info!(
            "Done: {} downloaded, {} already present, {} not trading days.",
            summary.downloaded.len(),
            summary.already_present.len(),
            summary.not_trading.len()
        );
    }
}

/// Fetch and store every trading day in `window` that the store lacks.
///
/// The trading schedule and the store inventory are each read once, up front.
/// Days run strictly in ascending order; the first fetch or write failure
/// ends the run.
pub fn download_missing_days(
    calendar: &dyn TradingCalendar,
    store: &dyn DayStore,
    provider: &dyn PriceProvider,
    tickers: &[&str],
    window: &LookbackWindow,
    progress: &dyn DayProgress,
) -> Result<DownloadSummary, DownloadError> {
    progress.on_run_start(window, store.name(), tickers.len());

    let start = window.start().ok_or(DownloadError::WindowOutOfRange {
        days: window.days,
        today: window.today,
    })?;
    let inventory = store.inventory().map_err(DownloadError::Inventory)?;
    let sessions = calendar.schedule(start, window.today);
    log::debug!(
        "{} {} sessions in window, {} days already stored",
        sessions.len(),
        calendar.name(),
        inventory.len()
    );

    let mut summary = DownloadSummary::default();

    for date in window.dates() {
        let outcome = if !sessions.contains_key(&date) {
            DayOutcome::NotTradingDay
        } else if inventory.contains(date) {
            DayOutcome::AlreadyDownloaded
        } else {
            progress.on_fetch(date);
            let dataset = provider
                .fetch_day(tickers, date)
                .map_err(|source| DownloadError::Fetch { date, source })?;
            let csv = dataset
                .to_csv_bytes()
                .map_err(|source| DownloadError::Serialize { date, source })?;
            let location = store
                .put_day(date, &csv, dataset.height())
                .map_err(|source| DownloadError::Write { date, source })?;
            DayOutcome::Downloaded {
                location,
                rows: dataset.height(),
            }
        };

        progress.on_day(date, &outcome);
        summary.record(date, &outcome);
    }

    progress.on_run_complete(&summary);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Session;
    use crate::data::{PriceDataset, PriceRow};
    use crate::storage::{file_name_for, parse_file_date, StoredObject};
    use chrono::{Datelike, Weekday};
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    const PREFIX: &str = "AGH_sp500";

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// Weekdays only.
    struct WeekdayCalendar;

    impl TradingCalendar for WeekdayCalendar {
        fn name(&self) -> &str {
            "weekdays"
        }

        fn schedule(&self, start: NaiveDate, end: NaiveDate) -> BTreeMap<NaiveDate, Session> {
            start
                .iter_days()
                .take_while(|d| *d <= end)
                .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
                .map(|date| {
                    let t = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
                    (
                        date,
                        Session {
                            date,
                            market_open: t,
                            market_close: t,
                            early_close: false,
                        },
                    )
                })
                .collect()
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        objects: RefCell<Vec<StoredObject>>,
        csv_writes: RefCell<Vec<String>>,
        fail_writes: bool,
    }

    impl MemoryStore {
        fn with_days(days: &[NaiveDate]) -> Self {
            let store = Self::default();
            for day in days {
                store.objects.borrow_mut().push(StoredObject {
                    name: file_name_for(PREFIX, *day),
                    size: Some(100),
                });
            }
            store
        }
    }

    impl DayStore for MemoryStore {
        fn name(&self) -> &str {
            "memory"
        }

        fn prefix(&self) -> &str {
            PREFIX
        }

        fn list_objects(&self) -> Result<Vec<StoredObject>, StoreError> {
            Ok(self.objects.borrow().clone())
        }

        fn put_object(
            &self,
            name: &str,
            bytes: &[u8],
            content_type: &str,
        ) -> Result<String, StoreError> {
            if self.fail_writes {
                return Err(StoreError::Http("bucket unavailable".into()));
            }
            if content_type == crate::storage::CSV_CONTENT_TYPE {
                self.csv_writes.borrow_mut().push(name.to_string());
            }
            self.objects.borrow_mut().push(StoredObject {
                name: name.to_string(),
                size: Some(bytes.len() as u64),
            });
            Ok(format!("mem://{name}"))
        }
    }

    #[derive(Default)]
    struct FakeProvider {
        fetched: RefCell<Vec<NaiveDate>>,
        fail_on: Option<NaiveDate>,
    }

    impl PriceProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        fn fetch_day(&self, tickers: &[&str], date: NaiveDate) -> Result<PriceDataset, DataError> {
            self.fetched.borrow_mut().push(date);
            if self.fail_on == Some(date) {
                return Err(DataError::NetworkUnreachable("connection reset".into()));
            }
            let rows: Vec<PriceRow> = tickers
                .iter()
                .map(|t| PriceRow {
                    close: Some(100.0),
                    ..PriceRow::empty(date, t)
                })
                .collect();
            PriceDataset::from_rows(&rows)
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        days: RefCell<Vec<(NaiveDate, DayOutcome)>>,
        completed: RefCell<bool>,
    }

    impl DayProgress for RecordingProgress {
        fn on_run_start(&self, _window: &LookbackWindow, _store: &str, _tickers: usize) {}

        fn on_day(&self, date: NaiveDate, outcome: &DayOutcome) {
            self.days.borrow_mut().push((date, outcome.clone()));
        }

        fn on_run_complete(&self, _summary: &DownloadSummary) {
            *self.completed.borrow_mut() = true;
        }
    }

    // 2024-03-13 is a Wednesday: the window is Mon 03-04 .. Tue 03-12.
    fn window() -> LookbackWindow {
        LookbackWindow::new(9, d(2024, 3, 13))
    }

    const TICKERS: [&str; 2] = ["AAPL", "MSFT"];

    #[test]
    fn window_excludes_today() {
        let dates: Vec<_> = window().dates().collect();
        assert_eq!(dates.len(), 9);
        assert_eq!(dates[0], d(2024, 3, 4));
        assert_eq!(dates[8], d(2024, 3, 12));
        assert_eq!(window().start(), Some(d(2024, 3, 4)));
    }

    #[test]
    fn window_before_earliest_date_has_no_start() {
        let window = LookbackWindow::new(200_000_000, d(2024, 3, 13));
        assert_eq!(window.start(), None);
        assert_eq!(window.dates().count(), 0);
    }

    #[test]
    fn out_of_range_window_is_an_error() {
        let store = MemoryStore::default();
        let provider = FakeProvider::default();
        let progress = RecordingProgress::default();

        let err = download_missing_days(
            &WeekdayCalendar,
            &store,
            &provider,
            &TICKERS,
            &LookbackWindow::new(u32::MAX, d(2024, 3, 13)),
            &progress,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            DownloadError::WindowOutOfRange { days: u32::MAX, .. }
        ));
        assert!(provider.fetched.borrow().is_empty());
        assert!(store.csv_writes.borrow().is_empty());
        assert!(progress.days.borrow().is_empty());
    }

    #[test]
    fn zero_day_window_does_nothing() {
        let store = MemoryStore::default();
        let provider = FakeProvider::default();
        let progress = RecordingProgress::default();

        let summary = download_missing_days(
            &WeekdayCalendar,
            &store,
            &provider,
            &TICKERS,
            &LookbackWindow::new(0, d(2024, 3, 13)),
            &progress,
        )
        .unwrap();

        assert_eq!(summary.total(), 0);
        assert!(provider.fetched.borrow().is_empty());
        assert!(progress.days.borrow().is_empty());
    }

    #[test]
    fn nine_days_two_weekend_one_present() {
        let store = MemoryStore::with_days(&[d(2024, 3, 6)]);
        let provider = FakeProvider::default();
        let progress = RecordingProgress::default();

        let summary = download_missing_days(
            &WeekdayCalendar,
            &store,
            &provider,
            &TICKERS,
            &window(),
            &progress,
        )
        .unwrap();

        assert_eq!(summary.downloaded.len(), 6);
        assert_eq!(summary.not_trading, vec![d(2024, 3, 9), d(2024, 3, 10)]);
        assert_eq!(summary.already_present, vec![d(2024, 3, 6)]);

        assert_eq!(provider.fetched.borrow().len(), 6);
        assert_eq!(store.csv_writes.borrow().len(), 6);
        assert!(!provider.fetched.borrow().contains(&d(2024, 3, 6)));
        assert!(!provider.fetched.borrow().contains(&d(2024, 3, 9)));

        assert_eq!(progress.days.borrow().len(), 9);
        assert!(*progress.completed.borrow());
    }

    #[test]
    fn written_file_names_embed_processed_date() {
        let store = MemoryStore::default();
        let provider = FakeProvider::default();

        download_missing_days(
            &WeekdayCalendar,
            &store,
            &provider,
            &TICKERS,
            &window(),
            &RecordingProgress::default(),
        )
        .unwrap();

        let written: Vec<NaiveDate> = store
            .csv_writes
            .borrow()
            .iter()
            .map(|name| parse_file_date(PREFIX, name).unwrap())
            .collect();
        assert_eq!(written, *provider.fetched.borrow());
    }

    #[test]
    fn days_are_processed_in_ascending_order() {
        let store = MemoryStore::default();
        let provider = FakeProvider::default();
        let progress = RecordingProgress::default();

        download_missing_days(
            &WeekdayCalendar,
            &store,
            &provider,
            &TICKERS,
            &window(),
            &progress,
        )
        .unwrap();

        let days: Vec<NaiveDate> = progress.days.borrow().iter().map(|(d, _)| *d).collect();
        let mut sorted = days.clone();
        sorted.sort();
        assert_eq!(days, sorted);
    }

    #[test]
    fn rerun_over_complete_window_downloads_nothing() {
        let store = MemoryStore::default();
        let first = FakeProvider::default();
        download_missing_days(
            &WeekdayCalendar,
            &store,
            &first,
            &TICKERS,
            &window(),
            &RecordingProgress::default(),
        )
        .unwrap();

        let second = FakeProvider::default();
        let summary = download_missing_days(
            &WeekdayCalendar,
            &store,
            &second,
            &TICKERS,
            &window(),
            &RecordingProgress::default(),
        )
        .unwrap();

        assert!(summary.downloaded.is_empty());
        assert_eq!(summary.already_present.len(), 7);
        assert!(second.fetched.borrow().is_empty());
    }

    #[test]
    fn downloaded_outcome_carries_location_and_rows() {
        let store = MemoryStore::default();
        let progress = RecordingProgress::default();

        download_missing_days(
            &WeekdayCalendar,
            &store,
            &FakeProvider::default(),
            &TICKERS,
            &LookbackWindow::new(1, d(2024, 3, 5)),
            &progress,
        )
        .unwrap();

        assert_eq!(
            progress.days.borrow()[0],
            (
                d(2024, 3, 4),
                DayOutcome::Downloaded {
                    location: "mem://AGH_sp500_2024-03-04.csv".into(),
                    rows: 2,
                }
            )
        );
    }

    #[test]
    fn fetch_failure_stops_the_run() {
        let store = MemoryStore::default();
        let provider = FakeProvider {
            fail_on: Some(d(2024, 3, 6)),
            ..FakeProvider::default()
        };
        let progress = RecordingProgress::default();

        let err = download_missing_days(
            &WeekdayCalendar,
            &store,
            &provider,
            &TICKERS,
            &window(),
            &progress,
        )
        .unwrap_err();

        assert!(matches!(err, DownloadError::Fetch { date, .. } if date == d(2024, 3, 6)));
        assert_eq!(store.csv_writes.borrow().len(), 2);
        assert_eq!(
            *provider.fetched.borrow(),
            vec![d(2024, 3, 4), d(2024, 3, 5), d(2024, 3, 6)]
        );
        assert!(!*progress.completed.borrow());
    }

    #[test]
    fn write_failure_stops_the_run() {
        let store = MemoryStore {
            fail_writes: true,
            ..MemoryStore::default()
        };
        let provider = FakeProvider::default();

        let err = download_missing_days(
            &WeekdayCalendar,
            &store,
            &provider,
            &TICKERS,
            &window(),
            &RecordingProgress::default(),
        )
        .unwrap_err();

        assert!(matches!(err, DownloadError::Write { date, .. } if date == d(2024, 3, 4)));
        assert_eq!(provider.fetched.borrow().len(), 1);
        assert!(err.to_string().contains("2024-03-04"));
    }

    #[test]
    fn inventory_is_read_once_before_the_loop() {
        // A file appearing mid-run is not seen; only the snapshot matters.
        struct CountingStore {
            inner: MemoryStore,
            lists: RefCell<usize>,
        }

        impl DayStore for CountingStore {
            fn name(&self) -> &str {
                "counting"
            }
            fn prefix(&self) -> &str {
                PREFIX
            }
            fn list_objects(&self) -> Result<Vec<StoredObject>, StoreError> {
                *self.lists.borrow_mut() += 1;
                self.inner.list_objects()
            }
            fn put_object(
                &self,
                name: &str,
                bytes: &[u8],
                content_type: &str,
            ) -> Result<String, StoreError> {
                self.inner.put_object(name, bytes, content_type)
            }
        }

        let store = CountingStore {
            inner: MemoryStore::default(),
            lists: RefCell::new(0),
        };
        download_missing_days(
            &WeekdayCalendar,
            &store,
            &FakeProvider::default(),
            &TICKERS,
            &window(),
            &RecordingProgress::default(),
        )
        .unwrap();

        assert_eq!(*store.lists.borrow(), 1);
    }

    /// Keeps every record so tests can check message and level.
    struct CapturingLogger {
        records: std::sync::Mutex<Vec<(log::Level, String)>>,
    }

    impl log::Log for CapturingLogger {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            self.records
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }

    fn captured_logger() -> &'static CapturingLogger {
        static LOGGER: std::sync::OnceLock<&'static CapturingLogger> = std::sync::OnceLock::new();
        LOGGER.get_or_init(|| {
            let logger: &'static CapturingLogger = Box::leak(Box::new(CapturingLogger {
                records: std::sync::Mutex::new(Vec::new()),
            }));
            log::set_logger(logger).unwrap();
            log::set_max_level(log::LevelFilter::Info);
            logger
        })
    }

    fn level_of(message: &str) -> Option<log::Level> {
        captured_logger()
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|(_, m)| m == message)
            .map(|(level, _)| *level)
    }

    #[test]
    fn log_progress_reports_every_step_at_info() {
        captured_logger();

        let progress = LogProgress;
        progress.on_run_start(&window(), "local", 9);
        progress.on_fetch(d(2031, 3, 4));
        progress.on_day(d(2031, 3, 8), &DayOutcome::NotTradingDay);
        progress.on_day(d(2031, 3, 6), &DayOutcome::AlreadyDownloaded);
        progress.on_day(
            d(2031, 3, 4),
            &DayOutcome::Downloaded {
                location: "x".into(),
                rows: 9,
            },
        );
        progress.on_run_complete(&DownloadSummary::default());

        let info = Some(log::Level::Info);
        assert_eq!(level_of("Downloading data for 2031-03-04..."), info);
        assert_eq!(
            level_of("2031-03-08 is not a trading day, no data was downloaded for this date."),
            info
        );
        assert_eq!(level_of("Data for 2031-03-06 already downloaded."), info);
        assert_eq!(
            level_of("Data for 2031-03-04 downloaded: 9 rows stored at x."),
            info
        );
    }
}
