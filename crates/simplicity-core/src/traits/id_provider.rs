use crate::error::SimplicityResult;

/// Issues and validates logical ids for stored media.
pub trait IdProvider: Send + Sync + 'static {
    fn generate(&self) -> String;

    /// Reject strings that this provider could never have generated.
    fn validate(&self, id: &str) -> SimplicityResult<()>;
}
