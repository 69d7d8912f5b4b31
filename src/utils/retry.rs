use log::warn;
use std::future::Future;
use tokio::time::{sleep, Duration};

/// Run `operation` up to `max_attempts` times, sleeping `base_delay * attempt`
/// between attempts. The last error is returned when every attempt fails.
pub async fn with_retry<T, E, F, Fut>(
    mut operation: F,
    max_attempts: u32,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("⚠️  Operation failed, attempt {}/{}: {}", attempt, max_attempts, e);

                if attempt >= max_attempts {
                    return Err(e);
                }

                sleep(base_delay * attempt).await;
                attempt += 1;
            }
        }
    }
}
