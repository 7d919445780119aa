use std::sync::RwLock;

use uuid::Uuid;

/// Identity seam for owner-scoped reads and writes. The hosted identity
/// provider stays behind this trait; controllers only ever ask who is signed
/// in right now.
pub trait AuthProvider: Send + Sync {
    fn current_user(&self) -> Option<Uuid>;
}

/// Process-local auth state. Also serves as the test double.
#[derive(Debug, Default)]
pub struct LocalAuth {
    current: RwLock<Option<Uuid>>,
}

impl LocalAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: Uuid) -> Self {
        Self {
            current: RwLock::new(Some(user_id)),
        }
    }

    pub fn sign_in(&self, user_id: Uuid) {
        *self.current.write().expect("auth state lock poisoned") = Some(user_id);
    }

    pub fn sign_out(&self) {
        *self.current.write().expect("auth state lock poisoned") = None;
    }
}

impl AuthProvider for LocalAuth {
    fn current_user(&self) -> Option<Uuid> {
        *self.current.read().expect("auth state lock poisoned")
    }
}
