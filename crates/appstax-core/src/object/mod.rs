// ── Domain model ──
//
// Schema-less objects as the rest of the crate sees them: an optional
// identity, an owning collection, and an ordered bag of tagged values.

mod id;
#[allow(clippy::module_inception)]
mod object;
mod value;

pub use id::{ObjectId, ObjectRef};
pub use object::{Object, Related};
pub use value::Value;

/// Property holding the server-assigned identifier.
pub const SYS_OBJECT_ID: &str = "sysObjectId";

/// Property holding the owning collection name.
pub const SYS_COLLECTION: &str = "sysCollection";

/// Server-maintained creation timestamp.
pub const SYS_CREATED: &str = "sysCreated";

/// Server-maintained last-update timestamp.
pub const SYS_UPDATED: &str = "sysUpdated";
