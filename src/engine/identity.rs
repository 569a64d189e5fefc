use std::sync::Arc;

/// Identity used when nobody is signed in.
pub const GUEST_IDENTITY: &str = "guest";

/// Supplies the stable key of whoever is using the tracker. Log records are written under it.
#[cfg_attr(test, mockall::automock)]
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Arc<str>;
}

/// Identity fixed for the lifetime of the process, for example taken from the command line.
#[derive(Debug, Clone)]
pub struct StaticIdentity(Arc<str>);

impl StaticIdentity {
    pub fn new(identity: &str) -> Self {
        let identity = identity.trim();
        if identity.is_empty() {
            Self(GUEST_IDENTITY.into())
        } else {
            Self(identity.into())
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_identity(&self) -> Arc<str> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{IdentityProvider, StaticIdentity, GUEST_IDENTITY};

    #[test]
    fn blank_identity_falls_back_to_guest() {
        assert_eq!(&*StaticIdentity::new("  ").current_identity(), GUEST_IDENTITY);
        assert_eq!(
            &*StaticIdentity::new(" student@example.com ").current_identity(),
            "student@example.com"
        );
    }
}
