//! REST API for the portal backend

mod chat;
pub mod client;
mod entities;
pub mod envelope;
pub mod error;

use std::future::Future;

use tokio_util::sync::CancellationToken;

pub use client::PortalClient;
pub use envelope::Envelope;
pub use error::ApiError;

pub use chat::{listen, list_contacts, read_messages, send_message};
pub use entities::{create_entity, delete_entity, list_entities, update_entity};

/// Run `fut` unless `cancel` fires first.
pub async fn with_cancel<F, T>(cancel: &CancellationToken, fut: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_cancel_passes_result_through() {
        let cancel = CancellationToken::new();
        let value = with_cancel(&cancel, async { Ok::<_, ApiError>(7) }).await;
        tokio_test::assert_ok!(value);
    }

    #[tokio::test]
    async fn test_cancelled_token_wins() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = with_cancel(&cancel, std::future::pending::<Result<(), ApiError>>()).await;
        assert!(matches!(result, Err(ApiError::Cancelled)));
    }
}
