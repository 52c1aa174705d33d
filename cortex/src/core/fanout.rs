//! Fan-out/fan-in for independent sub-operations.
//!
//! Every branch runs to completion; one branch failing never cancels its
//! siblings. Results come back in input order, one `Result` per branch.

use anyhow::Result;
use futures::future::join_all;
use std::future::Future;

pub async fn settle_all<I, F, T>(branches: I) -> Vec<Result<T>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T>>,
{
    join_all(branches).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[tokio::test]
    async fn failing_branch_does_not_cancel_siblings() {
        let branches = (0..3).map(|i| async move {
            if i == 1 {
                Err(anyhow!("branch {} failed", i))
            } else {
                Ok(i * 10)
            }
        });
        let settled = settle_all(branches).await;
        assert_eq!(settled.len(), 3);
        assert_eq!(*settled[0].as_ref().unwrap(), 0);
        assert!(settled[1].is_err());
        assert_eq!(*settled[2].as_ref().unwrap(), 20);
    }

    #[tokio::test]
    async fn empty_input_settles_to_nothing() {
        let settled: Vec<Result<u8>> = settle_all(Vec::<std::future::Ready<Result<u8>>>::new()).await;
        assert!(settled.is_empty());
    }
}
