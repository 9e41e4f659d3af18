use crate::role::Role;
use crate::types::RoleId;

/// Role-mutation event delivered synchronously to registered observers.
///
/// Delivery is in-process only; a clustered deployment needs a shared
/// invalidation channel instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleEvent {
    /// A role was created.
    Created(Role),
    /// A role was updated; carries the merged definition.
    Updated(Role),
    /// A role was deleted.
    Deleted(RoleId),
}

/// Observer callback registered via [`RoleResolver::on_role_changed`].
///
/// [`RoleResolver::on_role_changed`]: crate::RoleResolver::on_role_changed
pub type RoleObserver = Box<dyn Fn(&RoleEvent) + Send + Sync>;
