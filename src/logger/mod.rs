use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, LazyLock, Mutex, RwLock, Weak};

static GLOBAL_LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static INSTANCES: LazyLock<Mutex<Vec<Weak<LoggerInner>>>> =
    LazyLock::new(|| Mutex::new(Vec::new()));
static USER_LOG_HANDLER: RwLock<Option<SharedLogHandler>> = RwLock::new(None);

type SharedLogHandler = Arc<dyn Fn(&LogRecord) + Send + Sync + 'static>;

/// User callback installed on every logger through [`set_user_log_handler`].
pub type LogCallback = SharedLogHandler;

/// Named, leveled logger. Handlers receive a [`LogRecord`] for every emitted message.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl Logger {
    pub fn new(name: impl Into<String>) -> Self {
        let inner = Arc::new(LoggerInner::new(name.into()));
        track_instance(&inner);
        Self { inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_u8(self.inner.log_level.load(Ordering::SeqCst))
    }

    pub fn set_log_level<L>(&self, level: L) -> Result<(), LogError>
    where
        L: IntoLogLevel,
    {
        let level = level.into_log_level()?;
        self.inner.log_level.store(level as u8, Ordering::SeqCst);
        Ok(())
    }

    /// Replaces the sink that writes records below the user handler.
    pub fn set_log_handler<F>(&self, handler: F)
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        *write_lock(&self.inner.log_handler) = Arc::new(handler);
    }

    pub fn reset_log_handler(&self) {
        *write_lock(&self.inner.log_handler) = default_handler();
    }

    fn set_user_log_handler(&self, handler: Option<SharedLogHandler>) {
        *write_lock(&self.inner.user_log_handler) = handler;
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(LogLevel::Debug, message.into(), Value::Null);
    }

    pub fn debug_with(&self, message: impl Into<String>, fields: Value) {
        self.emit(LogLevel::Debug, message.into(), fields);
    }

    pub fn log(&self, message: impl Into<String>) {
        self.emit(LogLevel::Verbose, message.into(), Value::Null);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(LogLevel::Info, message.into(), Value::Null);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(LogLevel::Warn, message.into(), Value::Null);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(LogLevel::Error, message.into(), Value::Null);
    }

    fn emit(&self, level: LogLevel, message: String, fields: Value) {
        if level < self.log_level() || level == LogLevel::Silent {
            return;
        }

        let record = LogRecord {
            level,
            logger: self.name().to_owned(),
            message,
            fields,
            timestamp: Utc::now(),
        };
        let user_handler = read_lock(&self.inner.user_log_handler).clone();
        if let Some(handler) = user_handler {
            handler(&record);
        }
        let handler = read_lock(&self.inner.log_handler).clone();
        handler(&record);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name())
            .field("level", &self.log_level())
            .finish()
    }
}

struct LoggerInner {
    name: String,
    log_level: AtomicU8,
    log_handler: RwLock<SharedLogHandler>,
    user_log_handler: RwLock<Option<SharedLogHandler>>,
}

impl LoggerInner {
    fn new(name: String) -> Self {
        Self {
            name,
            log_level: AtomicU8::new(GLOBAL_LOG_LEVEL.load(Ordering::SeqCst)),
            log_handler: RwLock::new(default_handler()),
            user_log_handler: RwLock::new(read_lock(&USER_LOG_HANDLER).clone()),
        }
    }
}

/// One emitted message.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub logger: String,
    pub message: String,
    pub fields: Value,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// `message` followed by the structured fields, when there are any.
    pub fn render(&self) -> String {
        match &self.fields {
            Value::Null => self.message.clone(),
            fields => format!("{} {fields}", self.message),
        }
    }
}

fn track_instance(inner: &Arc<LoggerInner>) {
    INSTANCES
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
        .push(Arc::downgrade(inner));
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poison| poison.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poison| poison.into_inner())
}

fn default_handler() -> SharedLogHandler {
    Arc::new(default_log_handler)
}

fn default_log_handler(record: &LogRecord) {
    let now = record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
    let line = format!("[{now}]  {} {}: {}", record.logger, record.level, record.render());
    match record.level {
        LogLevel::Warn | LogLevel::Error => eprintln!("{line}"),
        _ => println!("{line}"),
    }
}

fn with_instances<F>(mut f: F)
where
    F: FnMut(Logger),
{
    let mut instances = INSTANCES.lock().unwrap_or_else(|poison| poison.into_inner());
    instances.retain(|weak| match weak.upgrade() {
        Some(inner) => {
            f(Logger { inner });
            true
        }
        None => false,
    });
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    Debug = 0,
    Verbose = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Silent = 5,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Verbose => "verbose",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Silent => "silent",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Debug,
            1 => LogLevel::Verbose,
            2 => LogLevel::Info,
            3 => LogLevel::Warn,
            4 => LogLevel::Error,
            _ => LogLevel::Silent,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

impl FromStr for LogLevel {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "verbose" => Ok(LogLevel::Verbose),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "silent" => Ok(LogLevel::Silent),
            other => Err(LogError::InvalidLogLevel(other.to_string())),
        }
    }
}

pub trait IntoLogLevel {
    fn into_log_level(self) -> Result<LogLevel, LogError>;
}

impl IntoLogLevel for LogLevel {
    fn into_log_level(self) -> Result<LogLevel, LogError> {
        Ok(self)
    }
}

impl IntoLogLevel for &str {
    fn into_log_level(self) -> Result<LogLevel, LogError> {
        LogLevel::from_str(self)
    }
}

impl IntoLogLevel for String {
    fn into_log_level(self) -> Result<LogLevel, LogError> {
        LogLevel::from_str(&self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    InvalidLogLevel(String),
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogError::InvalidLogLevel(level) => write!(f, "Invalid log level \"{level}\""),
        }
    }
}

impl std::error::Error for LogError {}

/// Sets the level of every existing logger and of loggers created later.
pub fn set_log_level<L>(level: L) -> Result<(), LogError>
where
    L: IntoLogLevel,
{
    let level = level.into_log_level()?;
    GLOBAL_LOG_LEVEL.store(level as u8, Ordering::SeqCst);
    with_instances(|logger| {
        logger.inner.log_level.store(level as u8, Ordering::SeqCst);
    });
    Ok(())
}

/// Installs `callback` on every existing logger and on loggers created later, or removes it
/// with `None`.
pub fn set_user_log_handler(callback: Option<LogCallback>) {
    *write_lock(&USER_LOG_HANDLER) = callback.clone();
    with_instances(|logger| logger.set_user_log_handler(callback.clone()));
}

pub fn set_user_log_handler_fn<F>(callback: F)
where
    F: Fn(&LogRecord) + Send + Sync + 'static,
{
    set_user_log_handler(Some(Arc::new(callback)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    static TEST_GUARD: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    fn reset_logging() {
        set_log_level(LogLevel::Info).unwrap();
        set_user_log_handler(None);
    }

    fn capture(logger: &Logger) -> Arc<Mutex<Vec<(LogLevel, String)>>> {
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&records);
        logger.set_log_handler(move |record| {
            sink.lock().unwrap().push((record.level, record.render()));
        });
        records
    }

    #[test]
    fn messages_below_level_are_dropped() {
        let _guard = TEST_GUARD.lock().unwrap();
        reset_logging();
        let logger = Logger::new("logger-level-test");
        let records = capture(&logger);

        set_log_level("warn").unwrap();
        logger.debug("debug message");
        logger.info("info message");
        logger.warn("warn message");
        logger.error("error message");

        let stored = records.lock().unwrap();
        let levels: Vec<_> = stored.iter().map(|(level, _)| *level).collect();
        assert_eq!(levels, [LogLevel::Warn, LogLevel::Error]);
        assert_eq!(stored[0].1, "warn message");
    }

    #[test]
    fn structured_fields_are_rendered() {
        let _guard = TEST_GUARD.lock().unwrap();
        reset_logging();
        let logger = Logger::new("logger-fields-test");
        logger.set_log_level(LogLevel::Debug).unwrap();
        let records = capture(&logger);

        logger.debug_with("registered", json!({ "bean": "a" }));

        let stored = records.lock().unwrap();
        assert_eq!(stored[0], (LogLevel::Debug, r#"registered {"bean":"a"}"#.to_owned()));
    }

    #[test]
    fn user_handler_sees_records_from_all_loggers() {
        let _guard = TEST_GUARD.lock().unwrap();
        reset_logging();
        let first = Logger::new("logger-user-a");
        let second = Logger::new("logger-user-b");
        first.set_log_handler(|_| {});
        second.set_log_handler(|_| {});

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        set_user_log_handler_fn(move |record| {
            sink.lock().unwrap().push(record.logger.clone());
        });

        first.info("one");
        second.warn("two");
        set_user_log_handler(None);
        first.info("three");

        assert_eq!(*seen.lock().unwrap(), ["logger-user-a", "logger-user-b"]);
    }

    #[test]
    fn user_handler_reaches_loggers_created_later() {
        let _guard = TEST_GUARD.lock().unwrap();
        reset_logging();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        set_user_log_handler_fn(move |record| {
            if record.logger == "logger-user-late" {
                sink.lock().unwrap().push(record.message.clone());
            }
        });

        let late = Logger::new("logger-user-late");
        late.set_log_handler(|_| {});
        late.info("hello");
        set_user_log_handler(None);
        late.info("ignored");

        assert_eq!(*seen.lock().unwrap(), ["hello"]);
    }

    #[test]
    fn invalid_level_is_rejected() {
        assert_eq!(
            "loud".into_log_level(),
            Err(LogError::InvalidLogLevel("loud".into()))
        );
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
    }
}
