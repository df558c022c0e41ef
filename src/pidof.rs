use crate::config::PIDOF_COMMAND;
use color_eyre::eyre::{eyre, Context, Result};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Maps a program name to the pids currently running it.
pub trait PidLookup {
    fn list_pids_by_name(&self, name: &str) -> Result<Vec<u32>>;
}

/// Looks pids up with the system `pidof` utility.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pidof;

impl PidLookup for Pidof {
    fn list_pids_by_name(&self, name: &str) -> Result<Vec<u32>> {
        let output = Command::new(PIDOF_COMMAND)
            .arg(name)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .wrap_err_with(|| format!("failed to run {PIDOF_COMMAND}"))?;

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| eyre!("{PIDOF_COMMAND} printed non-utf8 output: {e}"))?;

        // pidof exits 1 with no output when nothing matches
        if !output.status.success() && !stdout.trim().is_empty() {
            return Err(eyre!("{PIDOF_COMMAND} {name} failed: {}", output.status));
        }

        Ok(parse_pid_list(&stdout))
    }
}

/// Parses whitespace-separated pids, skipping anything that is not one.
pub fn parse_pid_list(output: &str) -> Vec<u32> {
    output
        .split_whitespace()
        .filter_map(|token| match token.parse() {
            Ok(pid) => Some(pid),
            Err(_) => {
                warn!(token, "ignoring non-numeric pid");
                None
            }
        })
        .collect()
}

/// Pids of `program`, or none if the lookup itself failed.
pub fn pids_of_program(lookup: &impl PidLookup, program: &str) -> Vec<u32> {
    match lookup.list_pids_by_name(program) {
        Ok(pids) => {
            debug!(program, ?pids, "resolved program");
            pids
        }
        Err(e) => {
            warn!(program, "pid lookup failed: {e:?}");
            Vec::new()
        }
    }
}
