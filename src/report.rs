use crate::{
    config::{Config, HUMAN_READABLE_DECIMAL_PLACES},
    format::{bytes_to_human_readable, format_percent, fraction_of, percent_to_graph},
    pidof::{pids_of_program, PidLookup},
    proc::{ProcFs, ProcessHandle, ProcessUsage},
};
use color_eyre::eyre::Result;
use std::io::Write;
use tracing::debug;

/// Writes the memory report described by `config` to `out`.
///
/// Unreadable sources show up as zeros in the report; only a failure to
/// write the report itself is an error.
pub fn report(
    config: &Config,
    procfs: &ProcFs,
    lookup: &impl PidLookup,
    out: &mut impl Write,
) -> Result<()> {
    match &config.program {
        Some(program) => report_program(config, program, procfs, lookup, out),
        None => report_system(config, procfs, out),
    }
}

fn report_program(
    config: &Config,
    program: &str,
    procfs: &ProcFs,
    lookup: &impl PidLookup,
    out: &mut impl Write,
) -> Result<()> {
    let processes: Vec<ProcessHandle> = pids_of_program(lookup, program)
        .into_iter()
        .filter_map(|pid| {
            procfs
                .open_process(pid)
                .map_err(|e| debug!(pid, "dropping pid: {e:?}"))
                .ok()
        })
        .collect();

    if processes.is_empty() {
        writeln!(out, "{program} not found.")?;
        return Ok(());
    }

    let total_kb = procfs.total_memory_kb();

    let usages: Vec<ProcessUsage> = processes.iter().map(|p| procfs.usage(p)).collect();
    for usage in &usages {
        write_line(config, out, &usage.pid.to_string(), usage.resident_kb, total_kb)?;
    }

    let program_kb = usages.iter().map(|u| u.resident_kb).sum();
    write_line(config, out, program, program_kb, total_kb)?;

    Ok(())
}

fn report_system(config: &Config, procfs: &ProcFs, out: &mut impl Write) -> Result<()> {
    let sample = procfs.sample();
    let used_kb = sample.used_kb();
    let fraction = sample.used_fraction();
    let graph = percent_to_graph(fraction, config.length);

    if config.human_readable {
        writeln!(
            out,
            "Memory     {graph} {}/{}",
            size(config, used_kb),
            size(config, sample.total_kb)
        )?;
    } else {
        writeln!(
            out,
            "Memory  [{graph} | {}] {used_kb}/{}",
            format_percent(fraction),
            sample.total_kb
        )?;
    }

    Ok(())
}

fn write_line(
    config: &Config,
    out: &mut impl Write,
    name: &str,
    used_kb: u64,
    total_kb: u64,
) -> Result<()> {
    let fraction = fraction_of(used_kb, total_kb);
    writeln!(
        out,
        "{name} [{} | {}] {}/{}",
        percent_to_graph(fraction, config.length),
        format_percent(fraction),
        size(config, used_kb),
        size(config, total_kb)
    )?;
    Ok(())
}

fn size(config: &Config, kb: u64) -> String {
    if config.human_readable {
        bytes_to_human_readable(kb, HUMAN_READABLE_DECIMAL_PLACES)
    } else {
        kb.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::tests::{fixture, MEMINFO, SMAPS};
    use color_eyre::eyre::eyre;

    const SMALL_MEMINFO: &str = "MemTotal: 4000 kB\nMemAvailable: 1000 kB\n";

    struct Lookup(Vec<u32>);

    impl PidLookup for Lookup {
        fn list_pids_by_name(&self, _: &str) -> Result<Vec<u32>> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl PidLookup for Broken {
        fn list_pids_by_name(&self, _: &str) -> Result<Vec<u32>> {
            Err(eyre!("no pidof here"))
        }
    }

    fn config(length: usize, human_readable: bool, program: Option<&str>) -> Config {
        Config {
            length,
            human_readable,
            program: program.map(str::to_string),
        }
    }

    fn run(config: &Config, procfs: &ProcFs, lookup: &impl PidLookup) -> String {
        let mut out = Vec::new();
        report(config, procfs, lookup, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn system_wide_raw() {
        let dir = fixture(Some(MEMINFO), &[]);
        let output = run(&config(20, false, None), &ProcFs::at(dir.path()), &Broken);

        assert_eq!(
            output,
            "Memory  [########             | 39%] 6425988/16303716\n"
        );
    }

    #[test]
    fn system_wide_human_readable() {
        let dir = fixture(Some(MEMINFO), &[]);
        let output = run(&config(20, true, None), &ProcFs::at(dir.path()), &Broken);

        assert_eq!(
            output,
            "Memory     ########             6.13 GiB/15.55 GiB\n"
        );
    }

    #[test]
    fn system_wide_without_meminfo_reports_zero() {
        let dir = fixture(None, &[]);
        let output = run(&config(4, false, None), &ProcFs::at(dir.path()), &Broken);

        assert_eq!(output, "Memory  [     | 0%] 0/0\n");
    }

    #[test]
    fn one_line_per_process_plus_summary() {
        let dir = fixture(
            Some(SMALL_MEMINFO),
            &[(1, Some("Rss: 1000 kB\n")), (2, Some("Rss: 1500 kB\nRss: 500 kB\n"))],
        );
        let output = run(
            &config(4, false, Some("prog")),
            &ProcFs::at(dir.path()),
            &Lookup(vec![1, 2]),
        );

        assert_eq!(
            output,
            concat!(
                "1 [#    | 25%] 1000/4000\n",
                "2 [##   | 50%] 2000/4000\n",
                "prog [###  | 75%] 3000/4000\n",
            )
        );
    }

    #[test]
    fn program_human_readable() {
        let dir = fixture(
            Some(SMALL_MEMINFO),
            &[(1, Some("Rss: 1000 kB\n")), (2, Some("Rss: 2000 kB\n"))],
        );
        let output = run(
            &config(4, true, Some("prog")),
            &ProcFs::at(dir.path()),
            &Lookup(vec![1, 2]),
        );

        let lines: Vec<_> = output.lines().collect();
        assert_eq!(
            lines,
            [
                "1 [#    | 25%] 1000.00 KiB/3.91 MiB",
                "2 [##   | 50%] 1.95 MiB/3.91 MiB",
                "prog [###  | 75%] 2.93 MiB/3.91 MiB",
            ]
        );
    }

    #[test]
    fn dead_pids_are_filtered_out() {
        let dir = fixture(Some(SMALL_MEMINFO), &[(1, Some("Rss: 1000 kB\n"))]);
        let output = run(
            &config(4, false, Some("prog")),
            &ProcFs::at(dir.path()),
            &Lookup(vec![99, 1]),
        );

        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1 ["));
        assert!(lines[1].starts_with("prog ["));
        assert!(!output.contains("99"));
    }

    #[test]
    fn vanished_process_is_listed_with_zero() {
        let dir = fixture(Some(SMALL_MEMINFO), &[(5, None)]);
        let output = run(
            &config(4, false, Some("prog")),
            &ProcFs::at(dir.path()),
            &Lookup(vec![5]),
        );

        assert_eq!(output, "5 [     | 0%] 0/4000\nprog [     | 0%] 0/4000\n");
    }

    #[test]
    fn zero_total_memory_gives_zero_percent() {
        let dir = fixture(None, &[(3, Some("Rss: 2048 kB\n"))]);
        let output = run(
            &config(4, false, Some("prog")),
            &ProcFs::at(dir.path()),
            &Lookup(vec![3]),
        );

        assert_eq!(output, "3 [     | 0%] 2048/0\nprog [     | 0%] 2048/0\n");
    }

    #[test]
    fn unknown_program_is_not_found() {
        let dir = fixture(Some(SMALL_MEMINFO), &[]);
        let procfs = ProcFs::at(dir.path());

        for output in [
            run(&config(20, false, Some("ghost")), &procfs, &Lookup(vec![])),
            run(&config(20, true, Some("ghost")), &procfs, &Lookup(vec![404])),
            run(&config(20, false, Some("ghost")), &procfs, &Broken),
        ] {
            assert_eq!(output, "ghost not found.\n");
        }
    }

    #[test]
    fn summary_is_sum_of_listed_processes() {
        let pids = [10, 11, 12, 13];
        let processes: Vec<_> = pids
            .iter()
            .map(|&pid| (pid, Some(SMAPS)))
            .collect();
        let dir = fixture(Some(MEMINFO), &processes);
        let output = run(
            &config(10, false, Some("bash")),
            &ProcFs::at(dir.path()),
            &Lookup(pids.to_vec()),
        );

        let used: Vec<u64> = output
            .lines()
            .map(|line| {
                let (used, _) = line.rsplit_once(' ').unwrap().1.split_once('/').unwrap();
                used.parse().unwrap()
            })
            .collect();
        assert_eq!(used.len(), pids.len() + 1);
        assert_eq!(used[..pids.len()].iter().sum::<u64>(), used[pids.len()]);
        assert_eq!(used[pids.len()], 4 * 1080);
    }
}
