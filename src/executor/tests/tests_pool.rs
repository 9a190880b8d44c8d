//! Operator pool: scheduling, joins, timeouts, first-failure-wins.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::executor::{ExecutorError, OperatorPool, join_all};

    #[test]
    fn submit_returns_the_result() {
        let pool = OperatorPool::new(2);
        let handle = pool.submit(|| Ok(2 + 2));
        assert_eq!(handle.wait().unwrap(), 4);
    }

    #[test]
    fn errors_flow_through_the_handle() {
        let pool = OperatorPool::new(1);
        let handle = pool.submit::<i64, _>(|| Err(ExecutorError::Invalid("bad plan".into())));
        assert!(matches!(handle.wait(), Err(ExecutorError::Invalid(_))));
    }

    #[test]
    fn wait_timeout_expires_on_slow_operators() {
        let pool = OperatorPool::new(1);
        let handle = pool.submit(|| {
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        });
        assert!(matches!(
            handle.wait_timeout(Duration::from_millis(20)),
            Err(ExecutorError::Timeout)
        ));
    }

    /// Many submissions on few workers all complete.
    #[test]
    fn fan_out_completes() {
        let pool = OperatorPool::new(2);
        let handles: Vec<_> = (0..16i64).map(|i| pool.submit(move || Ok(i * i))).collect();
        let results = join_all(handles).unwrap();
        let expected: Vec<i64> = (0..16).map(|i| i * i).collect();
        assert_eq!(results, expected);
    }

    /// # Scenario
    /// A fan-out where one branch fails.
    ///
    /// # Expected behavior
    /// `join_all` surfaces the first failure in submission order and
    /// drops the later results.
    #[test]
    fn first_failure_wins() {
        let pool = OperatorPool::new(4);
        let handles: Vec<_> = (0..4i64)
            .map(|i| {
                pool.submit(move || {
                    if i == 1 {
                        Err(ExecutorError::Invalid(format!("branch {i}")))
                    } else {
                        Ok(i)
                    }
                })
            })
            .collect();

        match join_all(handles) {
            Err(ExecutorError::Invalid(msg)) => assert_eq!(msg, "branch 1"),
            other => panic!("expected the branch-1 failure, got {other:?}"),
        }
    }

    /// Dropping the pool joins its workers; pending handles resolve.
    #[test]
    fn drop_drains_workers() {
        let handle = {
            let pool = OperatorPool::new(1);
            pool.submit(|| Ok(7))
        };
        assert_eq!(handle.wait().unwrap(), 7);
    }
}
