pub mod project;
pub mod role;
pub mod task;
pub mod user;

use serde::{Deserialize, Deserializer};

/// Deserialize a field that distinguishes "absent" from "explicitly null".
/// `None` = field not in the request, `Some(None)` = field sent as null,
/// `Some(Some(v))` = field sent with a value. Combine with `#[serde(default)]`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
