use std::{cell::RefCell, fmt, rc::Rc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Post,
    Console,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub text: String,
}

impl LogRecord {
    pub fn post(text: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Post,
            text: text.into(),
        }
    }

    pub fn console(text: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Console,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Error,
            text: text.into(),
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            LogLevel::Error => write!(f, "error: {}", self.text),
            LogLevel::Post | LogLevel::Console => write!(f, "{}", self.text),
        }
    }
}

/// Write-only sink behind `post`, `cpost` and `error`.
pub trait LogSink {
    fn write(&mut self, record: LogRecord);
}

/// Post window on stderr, console output on stdout.
#[derive(Debug, Default)]
pub struct ConsoleLog;

impl LogSink for ConsoleLog {
    fn write(&mut self, record: LogRecord) {
        match record.level {
            LogLevel::Console => println!("{record}"),
            LogLevel::Post | LogLevel::Error => eprintln!("{record}"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    records: Rc<RefCell<Vec<LogRecord>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.borrow().clone()
    }

    pub fn texts(&self, level: LogLevel) -> Vec<String> {
        self.records
            .borrow()
            .iter()
            .filter(|record| record.level == level)
            .map(|record| record.text.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.records.borrow_mut().clear();
    }
}

impl LogSink for MemoryLog {
    fn write(&mut self, record: LogRecord) {
        self.records.borrow_mut().push(record);
    }
}
