use thiserror::Error;

use crate::store::StoreError;

/// Failure of a one-shot chat operation, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("{kind} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("permission denied")]
    PermissionDenied,
    #[error("temporarily unavailable: {0}")]
    Unavailable(String),
    #[error("invalid request: {0}")]
    InvalidArgument(String),
}

impl ChatError {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_owned(),
        }
    }
}

pub(crate) fn map_store_error(error: StoreError) -> ChatError {
    match error {
        StoreError::NotFound { collection, id } => ChatError::NotFound {
            kind: kind_for_collection(&collection),
            id,
        },
        StoreError::PermissionDenied(_) => ChatError::PermissionDenied,
        StoreError::Unavailable(reason) | StoreError::Corrupted(reason) => {
            ChatError::Unavailable(reason)
        }
    }
}

fn kind_for_collection(collection: &str) -> &'static str {
    match collection {
        crate::store::CHATS => "chat",
        crate::store::MESSAGES => "message",
        crate::store::USERS => "user",
        _ => "document",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_not_found_to_record_kind() {
        let error = map_store_error(StoreError::NotFound {
            collection: "messages".to_owned(),
            id: "m1".to_owned(),
        });

        assert_eq!(error, ChatError::not_found("message", "m1"));
        assert_eq!(error.to_string(), "message not found");
    }

    #[test]
    fn maps_permission_denied() {
        let error = map_store_error(StoreError::PermissionDenied("rules".to_owned()));

        assert_eq!(error, ChatError::PermissionDenied);
    }

    #[test]
    fn maps_unavailable_and_corrupted_to_unavailable() {
        assert_eq!(
            map_store_error(StoreError::Unavailable("offline".to_owned())),
            ChatError::Unavailable("offline".to_owned())
        );
        assert_eq!(
            map_store_error(StoreError::Corrupted("bad page".to_owned())),
            ChatError::Unavailable("bad page".to_owned())
        );
    }
}
