//! Human-readable renderings of the job history and the statistics table.

use crate::core::{Job, Timestamp};
use crate::stats::PriorityStats;
use std::fmt;

fn clock(ts: Option<&Timestamp>) -> String {
    ts.map_or_else(
        || "-".to_string(),
        |ts| ts.wall.format("%H:%M:%S%.6f").to_string(),
    )
}

pub struct HistoryReport<'a>(pub &'a [Job]);

impl fmt::Display for HistoryReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for job in self.0 {
            writeln!(f, "Command: {}", job.command)?;
            writeln!(f, "Args: {}", job.args.join(" "))?;
            writeln!(f, "Pid: {}", job.pid)?;
            writeln!(f, "Priority: {}", job.priority)?;
            writeln!(f, "Submit_Time: {}", clock(Some(&job.submit_time)))?;
            writeln!(f, "Start_Time: {}", clock(job.start_time.as_ref()))?;
            writeln!(f, "End_Time: {}", clock(job.end_time.as_ref()))?;
            writeln!(f, "Duration: {:.6} ms", job.duration_ms)?;
            writeln!(f, "Run Time: {:.6} ms", job.run_time_ms)?;
            writeln!(f, "Waiting Time: {:.6} ms", job.waiting_time_ms)?;
            writeln!(
                f,
                "Dispatches: {} (preempted {})",
                job.dispatches, job.preemptions
            )?;
            match job.exit {
                Some(exit) => writeln!(f, "Exit: {exit}")?,
                None => writeln!(f, "Exit: still {:?}", job.state)?,
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

pub struct StatsTable<'a>(pub &'a [PriorityStats]);

impl fmt::Display for StatsTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const RULE: &str =
            "-------------------------------------------------------------------------";
        writeln!(f, "Job Scheduling Statistics:")?;
        writeln!(f, "{RULE}")?;
        writeln!(
            f,
            "| Priority | Jobs | Average Waiting Time (ms) | Average Execution Time (ms) |"
        )?;
        writeln!(f, "{RULE}")?;
        for row in self.0 {
            writeln!(
                f,
                "| {:>8} | {:>4} | {:>25.2} | {:>27.2} |",
                row.priority, row.jobs, row.mean_waiting_ms, row.mean_duration_ms
            )?;
        }
        writeln!(f, "{RULE}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Priority, SchedState};
    use crate::process::{ExitState, Pid};

    #[test]
    fn history_lists_every_job() {
        let mut state = SchedState::new(1);
        let now = Timestamp::now();
        let id = state.create_job(
            Pid::from_raw(42),
            Priority::new(2).unwrap(),
            "sleep".into(),
            vec!["1".into()],
            now,
        );
        state.mark_terminated(id, now, ExitState::Exited(0));
        let jobs: Vec<Job> = state.history().cloned().collect();

        let text = HistoryReport(&jobs).to_string();
        assert!(text.contains("Command: sleep"));
        assert!(text.contains("Args: 1"));
        assert!(text.contains("Pid: 42"));
        assert!(text.contains("Start_Time: -"));
        assert!(text.contains("Exit: exit 0"));
    }

    #[test]
    fn stats_table_has_one_row_per_level() {
        let rows = vec![PriorityStats {
            priority: Priority::new(4).unwrap(),
            jobs: 3,
            mean_waiting_ms: 1.5,
            mean_duration_ms: 20.25,
        }];
        let text = StatsTable(&rows).to_string();
        assert!(text.contains("|        4 |    3 |"));
        assert!(text.contains("20.25"));
        assert_eq!(text.lines().filter(|l| l.starts_with("| ")).count(), 2);
    }
}
