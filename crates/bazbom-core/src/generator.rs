//! The lockfile generator capability (§6): an optional external collaborator
//! that turns a manifest into a lockfile. The core never shells out itself —
//! this trait is the pure string-in, string-out seam a deployment is free to
//! implement with `npm install --package-lock-only`, `pip install` +
//! `pipdeptree`, or anything else, without the orchestrator knowing which.

use crate::Ecosystem;
use async_trait::async_trait;

/// `(lock_filename, lock_content)` on success.
pub type GeneratedLockfile = (String, String);

#[async_trait]
pub trait LockfileGenerator: Send + Sync {
    /// Produce a lockfile for `(ecosystem, filename, content)`, or fail.
    /// Implementations may shell out to a package manager; the trait itself
    /// makes no assumption about how the lockfile is produced.
    async fn generate(
        &self,
        ecosystem: Ecosystem,
        filename: &str,
        content: &str,
    ) -> Result<GeneratedLockfile, String>;
}
