use crate::{fs::Credentials, users::ROOT_NAME};

/// the single logged in user of a workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// mount id of the partition the user logged into
    pub partition_id: String,
    pub user: String,
    pub uid: i32,
    pub gid: i32,
}

impl Session {
    pub fn new(partition_id: &str, user: &str, credentials: Credentials) -> Self {
        Session {
            partition_id: partition_id.to_string(),
            user: user.to_string(),
            uid: credentials.uid,
            gid: credentials.gid,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            uid: self.uid,
            gid: self.gid,
        }
    }

    pub fn is_root(&self) -> bool {
        self.user == ROOT_NAME
    }
}
