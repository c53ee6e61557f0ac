use stockflow_core::UserId;

/// Caller context for a request.
///
/// The identity comes from the embedding application's identity provider; the
/// engine trusts it and only records it on documents and movements.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CallerContext {
    user_id: UserId,
}

impl CallerContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}
