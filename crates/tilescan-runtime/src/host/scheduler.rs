use super::ExecutionError;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use spin::Mutex;

/// Runs `count` work-groups on up to `workers` threads.
///
/// Groups are pulled from a shared counter. The first failure stops the remaining groups from
/// being scheduled and is returned once every worker joined.
pub(crate) fn run_groups<F>(count: u32, workers: usize, run: F) -> Result<(), ExecutionError>
where
    F: Fn(u32) -> Result<(), ExecutionError> + Sync,
{
    let workers = workers.clamp(1, count.max(1) as usize);

    if workers == 1 {
        return (0..count).try_for_each(run);
    }

    let next = AtomicU32::new(0);
    let failed = AtomicBool::new(false);
    let error = Mutex::new(None);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                while !failed.load(Ordering::Relaxed) {
                    let group = next.fetch_add(1, Ordering::Relaxed);
                    if group >= count {
                        break;
                    }

                    if let Err(err) = run(group) {
                        failed.store(true, Ordering::Relaxed);
                        error.lock().get_or_insert(err);
                    }
                }
            });
        }
    });

    match error.into_inner() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicUsize;

    #[test]
    fn every_group_runs_once() {
        let hits = (0..64).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>();

        run_groups(64, 4, |group| {
            hits[group as usize].fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
        .unwrap();

        assert!(hits.iter().all(|hit| hit.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn first_failure_is_returned() {
        let result = run_groups(16, 3, |group| match group {
            5 => Err(ExecutionError::new("group 5 failed")),
            _ => Ok(()),
        });

        assert_eq!(result, Err(ExecutionError::new("group 5 failed")));
    }

    #[test]
    fn single_worker_runs_in_order() {
        let order = Mutex::new(Vec::new());

        run_groups(4, 1, |group| {
            order.lock().push(group);
            Ok(())
        })
        .unwrap();

        assert_eq!(order.into_inner(), vec![0, 1, 2, 3]);
    }
}
