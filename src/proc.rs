use crate::config::{
    MEMINFO_FILE, MEM_AVAILABLE_LABEL, MEM_TOTAL_LABEL, PROC_ROOT, RSS_LABEL, SMAPS_FILE,
};
use crate::format::fraction_of;
use color_eyre::eyre::{eyre, Context, Result};
use rustix::{
    fd::{AsFd, OwnedFd},
    fs::{open, openat, Mode, OFlags},
};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
};
use tracing::{debug, warn};

/// Total and available system memory, in KiB.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct MemorySample {
    pub total_kb: u64,
    pub available_kb: u64,
}

impl MemorySample {
    pub fn used_kb(&self) -> u64 {
        self.total_kb.saturating_sub(self.available_kb)
    }

    pub fn used_fraction(&self) -> f64 {
        fraction_of(self.used_kb(), self.total_kb)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProcessUsage {
    pub pid: u32,
    pub resident_kb: u64,
}

/// A process whose `/proc/<pid>` directory was open at the time of lookup.
///
/// Files are read relative to the held directory, so a pid recycled after
/// the lookup is never mistaken for the original process.
#[derive(Debug)]
pub struct ProcessHandle {
    pub pid: u32,
    proc_dirfd: OwnedFd,
}

impl ProcessHandle {
    fn open_file(&self, name: &str) -> Result<File> {
        let fd = openat(
            self.proc_dirfd.as_fd(),
            name,
            OFlags::RDONLY | OFlags::CLOEXEC,
            Mode::empty(),
        )
        .wrap_err_with(|| format!("pid={} file={name}", self.pid))?;
        Ok(File::from(fd))
    }
}

/// Memory statistics read from a directory laid out like `/proc`.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcFs {
    pub fn new() -> Self {
        Self::at(PROC_ROOT)
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn total_memory_kb(&self) -> u64 {
        self.meminfo_kb(MEM_TOTAL_LABEL)
    }

    pub fn available_memory_kb(&self) -> u64 {
        self.meminfo_kb(MEM_AVAILABLE_LABEL)
    }

    pub fn sample(&self) -> MemorySample {
        MemorySample {
            total_kb: self.total_memory_kb(),
            available_kb: self.available_memory_kb(),
        }
    }

    /// Opens `<root>/<pid>`, failing if the process is not (or no longer) running.
    pub fn open_process(&self, pid: u32) -> Result<ProcessHandle> {
        let path = self.root.join(pid.to_string());
        let proc_dirfd = open(
            path.as_path(),
            OFlags::RDONLY | OFlags::DIRECTORY | OFlags::CLOEXEC,
            Mode::empty(),
        )
        .wrap_err_with(|| format!("process directory {}", path.display()))?;
        Ok(ProcessHandle { pid, proc_dirfd })
    }

    /// Sum of every `Rss:` entry in the process's `smaps`, or 0 if it cannot be read.
    pub fn resident_memory_kb(&self, process: &ProcessHandle) -> u64 {
        match process
            .open_file(SMAPS_FILE)
            .and_then(|file| sum_kb(BufReader::new(file), RSS_LABEL))
        {
            Ok(kb) => kb,
            Err(e) => {
                debug!(pid = process.pid, "counting process as 0 KiB: {e:?}");
                0
            }
        }
    }

    pub fn resident_memory_of(&self, pid: u32) -> u64 {
        match self.open_process(pid) {
            Ok(process) => self.resident_memory_kb(&process),
            Err(e) => {
                debug!(pid, "counting process as 0 KiB: {e:?}");
                0
            }
        }
    }

    pub fn usage(&self, process: &ProcessHandle) -> ProcessUsage {
        ProcessUsage {
            pid: process.pid,
            resident_kb: self.resident_memory_kb(process),
        }
    }

    fn meminfo_kb(&self, label: &str) -> u64 {
        let path = self.root.join(MEMINFO_FILE);
        let result = File::open(&path)
            .wrap_err_with(|| format!("failed to open {}", path.display()))
            .and_then(|file| scan_kb(BufReader::new(file), label));
        match result {
            Ok(Some(kb)) => kb,
            Ok(None) => {
                warn!(path = %path.display(), "no {label} entry, using 0");
                0
            }
            Err(e) => {
                warn!("{e:?}");
                0
            }
        }
    }
}

/// Value of the first `label` line, if any.
fn scan_kb(reader: impl BufRead, label: &str) -> Result<Option<u64>> {
    for line in reader.split(b'\n') {
        let line = line?;
        if let Some(field) = line.strip_prefix(label.as_bytes()) {
            return parse_kb(field).wrap_err(label.to_string()).map(Some);
        }
    }
    Ok(None)
}

/// Sum of the values of every `label` line.
///
/// Lines are matched as bytes: smaps prints mapped file paths verbatim and
/// those need not be valid UTF-8.
fn sum_kb(reader: impl BufRead, label: &str) -> Result<u64> {
    let mut total = 0u64;
    for line in reader.split(b'\n') {
        let line = line?;
        if let Some(field) = line.strip_prefix(label.as_bytes()) {
            total = total.saturating_add(parse_kb(field).wrap_err(label.to_string())?);
        }
    }
    Ok(total)
}

// "   16303716 kB"
fn parse_kb(field: &[u8]) -> Result<u64> {
    let field = std::str::from_utf8(field).wrap_err("non-utf8 value")?;
    let value = field
        .split_whitespace()
        .next()
        .ok_or_else(|| eyre!("missing value"))?;
    value
        .parse()
        .wrap_err_with(|| format!("invalid value {value:?}"))
}
