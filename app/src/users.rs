//! the group and user registry kept in `/users.txt`
//!
//! one comma separated row per line:
//! - `id,G,group`
//! - `id,U,group,user,password`
//!
//! ids are never reused, a removed row keeps its place with id `0`
use std::fmt;

use crate::{
    error::{FsError, Result},
    fs::Credentials,
};

pub const DEFAULT_USERS: &str = "1,G,root\n1,U,root,root,123\n";
pub const ROOT_NAME: &str = "root";
/// id of a removed row
pub const REMOVED_ID: i32 = 0;
/// longest group, user or password accepted
pub const MAX_FIELD_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Group {
        id: i32,
        name: String,
    },
    User {
        id: i32,
        group: String,
        name: String,
        password: String,
    },
}

impl Row {
    pub fn id(&self) -> i32 {
        match self {
            Row::Group { id, .. } | Row::User { id, .. } => *id,
        }
    }

    pub fn is_active(&self) -> bool {
        self.id() != REMOVED_ID
    }

    fn remove(&mut self) {
        match self {
            Row::Group { id, .. } | Row::User { id, .. } => *id = REMOVED_ID,
        }
    }

    fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let id = fields[0]
            .parse::<i32>()
            .map_err(|_| FsError::Format(format!("bad id in users row {line:?}")))?;
        match fields.as_slice() {
            [_, kind, name] if kind.eq_ignore_ascii_case("G") => Ok(Row::Group {
                id,
                name: name.to_string(),
            }),
            [_, kind, group, name, password] if kind.eq_ignore_ascii_case("U") => Ok(Row::User {
                id,
                group: group.to_string(),
                name: name.to_string(),
                password: password.to_string(),
            }),
            _ => Err(FsError::Format(format!("malformed users row {line:?}"))),
        }
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Row::Group { id, name } => write!(f, "{id},G,{name}"),
            Row::User {
                id,
                group,
                name,
                password,
            } => write!(f, "{id},U,{group},{name},{password}"),
        }
    }
}

fn check_field(what: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.contains([',', '\n', '\r']) {
        return Err(FsError::InvalidInput(format!("invalid {what} {value:?}")));
    }
    if value.len() > MAX_FIELD_LEN {
        return Err(FsError::InvalidInput(format!(
            "{what} {value} is longer than {MAX_FIELD_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsersRegistry {
    rows: Vec<Row>,
}

impl UsersRegistry {
    pub fn parse(text: &str) -> Result<Self> {
        let rows = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(Row::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(UsersRegistry { rows })
    }

    /// every row followed by a newline
    pub fn render(&self) -> String {
        self.rows.iter().map(|row| format!("{row}\n")).collect()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// one past the number of rows of the same kind, removed ones included
    fn next_id(&self, group: bool) -> i32 {
        let same_kind = self
            .rows
            .iter()
            .filter(|row| matches!(row, Row::Group { .. }) == group)
            .count();
        same_kind as i32 + 1
    }

    fn find_group(&self, name: &str) -> Option<&Row> {
        self.rows
            .iter()
            .find(|row| row.is_active() && matches!(row, Row::Group { name: n, .. } if n == name))
    }

    fn find_user(&self, name: &str) -> Option<&Row> {
        self.rows
            .iter()
            .find(|row| row.is_active() && matches!(row, Row::User { name: n, .. } if n == name))
    }

    /// id of the active group `name`
    pub fn group_id(&self, name: &str) -> Option<i32> {
        self.find_group(name).map(Row::id)
    }

    /// uid and gid of the active user `name`
    pub fn credentials_of(&self, name: &str) -> Result<Credentials> {
        match self.find_user(name) {
            Some(Row::User { id, group, .. }) => {
                let gid = self
                    .group_id(group)
                    .ok_or_else(|| FsError::NotFound(format!("group {group} of user {name}")))?;
                Ok(Credentials { uid: *id, gid })
            }
            _ => Err(FsError::NotFound(format!("user {name}"))),
        }
    }

    /// check `password` for the active user `name`
    pub fn authenticate(&self, name: &str, password: &str) -> Result<Credentials> {
        match self.find_user(name) {
            Some(Row::User { password: p, .. }) if p == password => self.credentials_of(name),
            _ => Err(FsError::InvalidCredentials),
        }
    }

    pub fn add_group(&mut self, name: &str) -> Result<i32> {
        check_field("group name", name)?;
        if self.find_group(name).is_some() {
            return Err(FsError::AlreadyExists(format!("group {name}")));
        }
        let id = self.next_id(true);
        self.rows.push(Row::Group {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    pub fn remove_group(&mut self, name: &str) -> Result<()> {
        if name == ROOT_NAME {
            return Err(FsError::InvalidInput("the root group cannot be removed".into()));
        }
        let row = self
            .rows
            .iter_mut()
            .find(|row| row.is_active() && matches!(row, Row::Group { name: n, .. } if n == name))
            .ok_or_else(|| FsError::NotFound(format!("group {name}")))?;
        row.remove();
        Ok(())
    }

    pub fn add_user(&mut self, name: &str, password: &str, group: &str) -> Result<i32> {
        check_field("user name", name)?;
        check_field("password", password)?;
        if self.find_group(group).is_none() {
            return Err(FsError::NotFound(format!("group {group}")));
        }
        if self.find_user(name).is_some() {
            return Err(FsError::AlreadyExists(format!("user {name}")));
        }
        let id = self.next_id(false);
        self.rows.push(Row::User {
            id,
            group: group.to_string(),
            name: name.to_string(),
            password: password.to_string(),
        });
        Ok(id)
    }

    pub fn remove_user(&mut self, name: &str) -> Result<()> {
        if name == ROOT_NAME {
            return Err(FsError::InvalidInput("the root user cannot be removed".into()));
        }
        let row = self
            .rows
            .iter_mut()
            .find(|row| row.is_active() && matches!(row, Row::User { name: n, .. } if n == name))
            .ok_or_else(|| FsError::NotFound(format!("user {name}")))?;
        row.remove();
        Ok(())
    }
}
