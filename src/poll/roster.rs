use serde::{Deserialize, Serialize};

use crate::error::{PollError, Result};

/// Identity handed out by the transport for the lifetime of one connection.
pub type ConnectionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "teacher" => Some(Role::Teacher),
            "student" => Some(Role::Student),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ConnectionId,
    pub name: String,
    pub role: Role,
}

/// Entry of the `usersList` broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentEntry {
    pub id: ConnectionId,
    pub name: String,
}

/// What a successful registration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Teacher,
    Student,
    /// A live student with the same name moved to this connection.
    StudentRebound { previous_id: ConnectionId },
}

impl Registration {
    pub fn is_student(&self) -> bool {
        !matches!(self, Registration::Teacher)
    }
}

/// Connected teachers and students in registration order.
#[derive(Debug, Default)]
pub struct Roster {
    participants: Vec<Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under a display name and role.
    ///
    /// Students are unique by name (case-insensitive): registering a name
    /// that is already live rebinds that entry to `id`, last write wins.
    pub fn register(&mut self, id: ConnectionId, name: &str, role: &str) -> Result<Registration> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PollError::InvalidRegistration("empty display name".to_string()));
        }
        let role = Role::parse(role)
            .ok_or_else(|| PollError::InvalidRegistration(format!("unknown role '{}'", role)))?;

        if role == Role::Student {
            if let Some(existing) = self.find_student_by_name_mut(name) {
                let previous_id = std::mem::replace(&mut existing.id, id.clone());
                self.dedupe_connection(&id, name);

                tracing::info!(
                    connection_id = %id,
                    previous_id = %previous_id,
                    name = %name,
                    "Student reconnected, identity rebound"
                );
                return Ok(Registration::StudentRebound { previous_id });
            }
        }

        self.participants.retain(|p| p.id != id);
        self.participants.push(Participant {
            id: id.clone(),
            name: name.to_string(),
            role,
        });

        tracing::info!(connection_id = %id, name = %name, role = ?role, "Participant registered");
        Ok(match role {
            Role::Teacher => Registration::Teacher,
            Role::Student => Registration::Student,
        })
    }

    /// Remove the participant bound to `id`, if any.
    pub fn remove(&mut self, id: &str) -> Option<Participant> {
        let index = self.participants.iter().position(|p| p.id == id)?;
        let removed = self.participants.remove(index);
        tracing::info!(
            connection_id = %id,
            name = %removed.name,
            role = ?removed.role,
            "Participant removed from roster"
        );
        Some(removed)
    }

    pub fn get(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn list_students(&self) -> Vec<StudentEntry> {
        self.participants
            .iter()
            .filter(|p| p.role == Role::Student)
            .map(|p| StudentEntry {
                id: p.id.clone(),
                name: p.name.clone(),
            })
            .collect()
    }

    pub fn student_ids(&self) -> Vec<ConnectionId> {
        self.ids_with_role(Role::Student)
    }

    pub fn teacher_ids(&self) -> Vec<ConnectionId> {
        self.ids_with_role(Role::Teacher)
    }

    pub fn student_count(&self) -> usize {
        self.participants
            .iter()
            .filter(|p| p.role == Role::Student)
            .count()
    }

    fn ids_with_role(&self, role: Role) -> Vec<ConnectionId> {
        self.participants
            .iter()
            .filter(|p| p.role == role)
            .map(|p| p.id.clone())
            .collect()
    }

    fn find_student_by_name_mut(&mut self, name: &str) -> Option<&mut Participant> {
        let needle = name.to_lowercase();
        self.participants
            .iter_mut()
            .find(|p| p.role == Role::Student && p.name.to_lowercase() == needle)
    }

    /// Drop any other entry the connection held before it took over `name`.
    fn dedupe_connection(&mut self, id: &str, name: &str) {
        let needle = name.to_lowercase();
        self.participants.retain(|p| {
            p.id != id || (p.role == Role::Student && p.name.to_lowercase() == needle)
        });
    }
}
