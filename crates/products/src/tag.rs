use serde::{Deserialize, Serialize};

use shopdesk_core::{Entity, TagId};

/// Label attached to products for filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub code: String,
    pub user_label: Option<String>,
}

impl Entity for Tag {
    type Id = TagId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
