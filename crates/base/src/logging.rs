use {
    log::{LevelFilter, Log, Metadata, Record},
    std::{
        fmt,
        fs::{self, File, OpenOptions},
        io::{self, Write},
        path::{Path, PathBuf},
        sync::Mutex,
        time::{SystemTime, UNIX_EPOCH},
    },
};

const SECS_PER_DAY: u64 = 86_400;

/// Wall-clock time in UTC, second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtcTime {
    pub year: i64,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn month_lengths(year: i64) -> [u64; 12] {
    let february = if is_leap_year(year) { 29 } else { 28 };
    [31, february, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
}

impl UtcTime {
    pub fn now() -> Self {
        // a clock before 1970 logs as the epoch
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::from_unix(secs)
    }

    /// Break seconds since the Unix epoch into calendar fields.
    pub fn from_unix(secs: u64) -> Self {
        let mut days = secs / SECS_PER_DAY;
        let clock = secs % SECS_PER_DAY;

        let mut year = 1970;
        loop {
            let length = if is_leap_year(year) { 366 } else { 365 };
            if days < length {
                break;
            }
            days -= length;
            year += 1;
        }

        let mut month = 1;
        for length in month_lengths(year) {
            if days < length {
                break;
            }
            days -= length;
            month += 1;
        }

        Self {
            year,
            month,
            day: days as u32 + 1,
            hour: (clock / 3600) as u32,
            minute: (clock % 3600 / 60) as u32,
            second: (clock % 60) as u32,
        }
    }

    /// `YYYY-MM-DD`, the name stem of a day's log file.
    pub fn date(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl fmt::Display for UtcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}T{:02}:{:02}:{:02}",
            self.date(),
            self.hour,
            self.minute,
            self.second
        )
    }
}

// one log line without the trailing newline
struct Line<'a, 'r>(&'a Record<'r>);

impl fmt::Display for Line<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.0;
        write!(
            f,
            "{} [{}] [thread:{:?}] {}:{} - {}",
            UtcTime::now(),
            record.level(),
            std::thread::current().id(),
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args()
        )
    }
}

/// Level installed by the `init_*` functions: Debug in debug builds, Info in
/// release builds.
pub fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Logs to stdout.
pub struct StdoutLogger;

impl Log for StdoutLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let mut out = io::stdout().lock();
        // nowhere left to report a failed stdout write
        let _ = writeln!(out, "{}", Line(record));
    }

    fn flush(&self) {
        io::stdout().flush().ok();
    }
}

struct DayFile {
    date: String,
    file: File,
}

impl DayFile {
    fn open(dir: &Path, date: String) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(format!("{date}.log")))?;
        Ok(Self { date, file })
    }
}

/// Logs to `<dir>/<YYYY-MM-DD>.log`, switching files when the UTC date
/// changes.
pub struct FileLogger {
    dir: PathBuf,
    current: Mutex<DayFile>,
}

impl FileLogger {
    /// Create `dir` if needed and open today's file in it.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let current = DayFile::open(&dir, UtcTime::now().date())?;
        Ok(Self {
            dir,
            current: Mutex::new(current),
        })
    }

    /// File the next line goes to, or went to if the date has not changed.
    pub fn current_path(&self) -> PathBuf {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        self.dir.join(format!("{}.log", current.date))
    }

    fn write_line(&self, line: &str) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());

        let today = UtcTime::now().date();
        if current.date != today {
            match DayFile::open(&self.dir, today) {
                Ok(next) => *current = next,
                // stay on the previous day's file
                Err(e) => eprintln!("cannot open next log file in {:?}: {}", self.dir, e),
            }
        }

        if let Err(e) = current.file.write_all(line.as_bytes()) {
            eprintln!("log file write failed: {}", e);
            eprint!("{}", line);
        }
    }
}

impl Log for FileLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.write_line(&format!("{}\n", Line(record)));
    }

    fn flush(&self) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.file.flush().ok();
    }
}

fn install(logger: &'static dyn Log) {
    // a logger is already installed: keep it
    if log::set_logger(logger).is_ok() {
        log::set_max_level(default_level());
    }
}

/// Install `StdoutLogger` globally. Only the first call per process has an
/// effect.
pub fn init_stdout_logger() {
    static LOGGER: StdoutLogger = StdoutLogger;
    install(&LOGGER);
}

/// Install a `FileLogger` over `dir` globally. Fails when the directory or
/// today's file cannot be opened.
pub fn init_file_logger(dir: impl Into<PathBuf>) -> io::Result<()> {
    let logger = FileLogger::new(dir)?;
    // leaked once per process for the 'static the facade needs
    install(Box::leak(Box::new(logger)));
    Ok(())
}
