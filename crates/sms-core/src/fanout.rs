use std::future::Future;
use tracing::{info, warn};

use crate::{Receipt, SendReport, SmsError};

/// Attempt every recipient in order, one call each.
///
/// All accepted gives a report; all failed gives the first recipient's
/// error; anything in between is [`SmsError::PartialDelivery`]. A failure
/// never stops later recipients from being attempted.
pub async fn send_each<'a, F, Fut>(
    provider: &'static str,
    recipients: &'a [String],
    mut attempt: F,
) -> Result<SendReport, SmsError>
where
    F: FnMut(&'a str) -> Fut,
    Fut: Future<Output = Result<String, SmsError>>,
{
    let mut delivered = Vec::with_capacity(recipients.len());
    let mut failed = Vec::new();

    for to in recipients {
        match attempt(to).await {
            Ok(id) => {
                info!("{} accepted message {} for {}", provider, id, to);
                delivered.push(Receipt::new(to.as_str(), id));
            }
            Err(e) => {
                warn!("{} failed for {}: {}", provider, to, e);
                failed.push((to.clone(), e));
            }
        }
    }

    if failed.is_empty() {
        return Ok(SendReport {
            provider,
            receipts: delivered,
        });
    }
    if delivered.is_empty() {
        let (_, first) = failed.remove(0);
        return Err(first);
    }
    Err(SmsError::PartialDelivery { delivered, failed })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipients() -> Vec<String> {
        vec!["+1".into(), "+2".into(), "+3".into()]
    }

    #[tokio::test]
    async fn all_delivered() {
        let to = recipients();
        let report = send_each("test", &to, |r| async move { Ok(format!("id{r}")) })
            .await
            .unwrap();
        assert_eq!(report.receipts.len(), 3);
        assert_eq!(report.receipts[2], Receipt::new("+3", "id+3"));
    }

    #[tokio::test]
    async fn failure_does_not_stop_later_recipients() {
        let to = recipients();
        let mut attempted = Vec::new();
        let err = send_each("test", &to, |r| {
            attempted.push(r.to_string());
            async move {
                if r == "+2" {
                    Err(SmsError::rejection("21211", "invalid To"))
                } else {
                    Ok("ok".to_string())
                }
            }
        })
        .await
        .unwrap_err();

        assert_eq!(attempted, ["+1", "+2", "+3"]);
        match err {
            SmsError::PartialDelivery { delivered, failed } => {
                assert_eq!(delivered.len(), 2);
                assert_eq!(failed[0].0, "+2");
                assert!(failed[0].1.is_rejection());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn all_failed_returns_first_error() {
        let to = recipients();
        let err = send_each("test", &to, |r| async move {
            Err::<String, _>(SmsError::rejection(r, "nope"))
        })
        .await
        .unwrap_err();
        match err {
            SmsError::ProviderRejection { code, .. } => assert_eq!(code, "+1"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
