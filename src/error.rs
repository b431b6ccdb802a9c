//! User-facing outcomes that end a run.
//!
//! These travel inside `anyhow::Error`; match on them with `downcast_ref`.

#[derive(Debug, thiserror::Error)]
pub enum SkillKitError {
    #[error("The skill {name} has not yet been uploaded to the registry")]
    NotRegistered { name: String },

    /// Not a failure: the registry already points at the latest upstream commit.
    #[error("The latest version of {name} is already uploaded to the registry")]
    AlreadyUpdated { name: String },

    #[error("Not updating {url} since its description was not autogenerated")]
    PrModified { url: String },

    #[error("The skill {name} is already in the registry. Use 'skillkit upgrade' instead.")]
    AlreadyRegistered { name: String },
}

impl SkillKitError {
    /// Whether `err` is the informational already-updated outcome.
    pub fn is_already_updated(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<SkillKitError>(),
            Some(SkillKitError::AlreadyUpdated { .. })
        )
    }
}
