//! Rehearsal sampling of running server processes
//!
//! Simulated runs may be narrowed to a handful of live worker processes so a
//! rehearsal exercises socket matching against processes that really exist.

use sysinfo::{ProcessesToUpdate, System};
use tracing::debug;

/// Pids of running processes whose name is one of `names`, ascending
pub fn worker_pids(names: &[String]) -> Vec<u32> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let mut pids: Vec<u32> = system
        .processes()
        .iter()
        .filter(|(_, process)| {
            let name = process.name().to_string_lossy();
            names.iter().any(|wanted| name == wanted.as_str())
        })
        .map(|(pid, _)| pid.as_u32())
        .collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}

/// The most recently started `size` of `pids`; all of them when `size` is `None`
pub fn pick_sample(mut pids: Vec<u32>, size: Option<usize>) -> Vec<u32> {
    pids.sort_unstable();
    if let Some(size) = size {
        let skip = pids.len().saturating_sub(size);
        pids.drain(..skip);
    }
    pids
}

/// Sample running server workers for a rehearsal
pub fn sample_worker_pids(names: &[String], size: Option<usize>) -> Vec<u32> {
    let sample = pick_sample(worker_pids(names), size);
    debug!(?names, ?sample, "Sampled worker processes");
    sample
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_sample_keeps_newest() {
        assert_eq!(pick_sample(vec![300, 100, 200, 400], Some(2)), vec![300, 400]);
    }

    #[test]
    fn test_pick_sample_without_limit() {
        assert_eq!(pick_sample(vec![3, 1, 2], None), vec![1, 2, 3]);
    }

    #[test]
    fn test_pick_sample_larger_than_population() {
        assert_eq!(pick_sample(vec![7], Some(5)), vec![7]);
        assert!(pick_sample(Vec::new(), Some(5)).is_empty());
    }

    #[test]
    fn test_unknown_process_name_yields_nothing() {
        let names = vec!["wsreaper-no-such-process-name".to_string()];
        assert!(worker_pids(&names).is_empty());
    }
}
