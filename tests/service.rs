mod common;

use common::{config, ms, Op, ScriptedProcesses};
use sigsched::{
    core::JobState, policy::WeightedSlice, process::ExitState, Priority, SchedError, Scheduler,
};
use std::thread;
use std::time::{Duration, Instant};

type TestScheduler = Scheduler<ScriptedProcesses, WeightedSlice>;

fn scheduler(ncpu: usize, base_ms: u64) -> TestScheduler {
    Scheduler::with_process_control(config(ncpu, base_ms), ScriptedProcesses::new()).unwrap()
}

fn prio(level: i64) -> Priority {
    Priority::new(level).unwrap()
}

#[test]
fn invalid_config_is_rejected() {
    let err = Scheduler::<ScriptedProcesses, WeightedSlice>::with_process_control(
        config(0, 10),
        ScriptedProcesses::new(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, SchedError::Config(_)));
}

#[test]
fn launch_runs_one_quantum_before_returning() {
    let scheduler = scheduler(1, 5);
    let queued = scheduler.submit("work", &ms(100), prio(4)).unwrap();
    let launched = scheduler.launch("work", &ms(100)).unwrap();

    let job = scheduler.job(launched).unwrap();
    assert_eq!(job.priority, Priority::default());
    assert_eq!(job.dispatches, 1);
    assert_eq!(job.preemptions, 1);
    assert_eq!(job.state, JobState::Ready);
    assert_eq!(scheduler.job(queued).unwrap().dispatches, 0);
}

#[test]
fn short_launch_finishes_inline() {
    let scheduler = scheduler(1, 20);
    let id = scheduler.launch("work", &ms(1)).unwrap();
    assert_eq!(scheduler.job(id).unwrap().exit, Some(ExitState::Exited(0)));
    assert!(scheduler.is_idle());
}

#[test]
fn statistics_cover_terminated_jobs_per_level() {
    let scheduler = scheduler(2, 5);
    for level in [1, 1, 3] {
        scheduler.submit("work", &ms(2), prio(level)).unwrap();
    }
    scheduler.run_scheduler();

    let stats = scheduler.statistics();
    let levels: Vec<(u8, u64)> = stats.iter().map(|s| (s.priority.get(), s.jobs)).collect();
    assert_eq!(levels, vec![(1, 2), (3, 1)]);
    assert!(stats.iter().all(|s| s.mean_duration_ms > 0.0));
}

#[test]
fn halted_scheduler_dispatches_nothing() {
    let scheduler = scheduler(1, 5);
    scheduler.submit("work", &ms(2), prio(2)).unwrap();
    scheduler.halt();

    assert!(scheduler.is_halted());
    assert_eq!(scheduler.run_scheduler().cycles, 0);
    assert_eq!(scheduler.census().ready, 1);
}

#[test]
fn shutdown_returns_the_complete_history() {
    let scheduler = scheduler(1, 5);
    let done = scheduler.submit("work", &ms(1), prio(4)).unwrap();
    let pending = scheduler.submit("work", &ms(1_000), prio(1)).unwrap();
    scheduler.with_engine(|engine| engine.cycle());

    let history = scheduler.shutdown();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, done);
    assert_eq!(history[0].exit, Some(ExitState::Exited(0)));
    assert_eq!(history[1].id, pending);
    assert_eq!(history[1].exit, Some(ExitState::Signaled(9)));
    assert_eq!(
        scheduler.with_engine(|engine| engine.procs().count(Op::Terminate)),
        1
    );
}

#[test]
fn daemon_drains_work_submitted_while_it_runs() {
    let scheduler = scheduler(2, 5);
    let daemon = scheduler.spawn_daemon().unwrap();

    let submitter = {
        let scheduler = scheduler.clone();
        thread::spawn(move || {
            for level in [1, 2, 3, 4, 2, 1] {
                scheduler.submit("work", &ms(3), prio(level)).unwrap();
                thread::sleep(Duration::from_millis(2));
            }
        })
    };
    submitter.join().unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while scheduler.census().terminated < 6 {
        assert!(Instant::now() < deadline, "daemon did not drain in time");
        thread::sleep(Duration::from_millis(5));
    }
    let summary = daemon.stop();

    assert_eq!(summary.finished, 6);
    assert!(summary.cycles > 0);
    assert!(scheduler.is_idle());
}

#[test]
fn dropping_the_daemon_stops_it() {
    let scheduler = scheduler(1, 5);
    drop(scheduler.spawn_daemon().unwrap());

    scheduler.submit("work", &ms(1), prio(1)).unwrap();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(scheduler.census().ready, 1);
}
