use std::sync::Arc;

use super::events::{ClientEvent, CreatePollRequest, ServerEvent};
use super::roster::Registration;
use super::server::{Classroom, PollServer};
use super::session::EndTrigger;
use crate::error::{PollError, Result};

impl PollServer {
    /// Apply one inbound event and emit whatever it causes.
    ///
    /// Rejected requests change nothing and send nothing back.
    pub async fn handle_event(self: &Arc<Self>, from: &str, event: ClientEvent) {
        let mut classroom = self.classroom.lock().await;

        let outcome = match event {
            ClientEvent::RegisterUser { name, role } => {
                self.register_user(&mut classroom, from, &name, &role).await
            }
            ClientEvent::CreatePoll(request) => self.create_poll(&mut classroom, request).await,
            ClientEvent::SelectChoice {
                student_id,
                name,
                choice,
            } => {
                let student_id = student_id.unwrap_or_else(|| from.to_string());
                self.select_choice(&mut classroom, &student_id, name, choice).await
            }
            ClientEvent::SubmitVote { student_id } => {
                let student_id = student_id.unwrap_or_else(|| from.to_string());
                self.submit_vote(&mut classroom, &student_id).await
            }
            ClientEvent::ManualEndPoll => self.manual_end_poll(&mut classroom).await,
            ClientEvent::RemoveStudent(student_id) => {
                self.remove_student(&mut classroom, &student_id).await;
                Ok(())
            }
            ClientEvent::GetPollHistory => {
                let history = ServerEvent::PollHistory(classroom.session.history().to_vec());
                self.broadcaster.unicast(from, &history).await
            }
        };

        if let Err(e) = outcome {
            if e.is_rejection() {
                tracing::debug!(connection_id = %from, error = %e, "Request ignored");
            } else {
                tracing::warn!(connection_id = %from, error = %e, "Failed to handle event");
            }
        }
    }

    async fn register_user(
        &self,
        classroom: &mut Classroom,
        from: &str,
        name: &str,
        role: &str,
    ) -> Result<()> {
        let registration = classroom.roster.register(from.to_string(), name, role)?;

        if let Registration::StudentRebound { previous_id } = &registration {
            classroom.session.rebind_student(previous_id, from);
        }
        if registration.is_student() {
            if let Some(poll) = classroom.session.current() {
                if let Err(e) = self
                    .broadcaster
                    .send_poll_snapshot(&classroom.roster, from, poll)
                    .await
                {
                    tracing::warn!(connection_id = %from, error = %e, "Failed to send running poll");
                }
            }
        }
        self.broadcaster.announce_roster(&classroom.roster).await;
        Ok(())
    }

    async fn create_poll(self: &Arc<Self>, classroom: &mut Classroom, request: CreatePollRequest) -> Result<()> {
        let CreatePollRequest {
            question,
            options,
            correct_index,
            duration,
        } = request;

        let (_, generation) = classroom
            .session
            .create(question, options, correct_index, duration)?;
        // Timer goes in with the poll, before anything is awaited.
        if duration > 0 {
            self.schedule_auto_end(classroom, generation, duration);
        }

        if let Some(poll) = classroom.session.current() {
            self.broadcaster
                .announce_poll_started(&classroom.roster, poll)
                .await;
        }
        Ok(())
    }

    async fn select_choice(
        &self,
        classroom: &mut Classroom,
        student_id: &str,
        name: String,
        choice: usize,
    ) -> Result<()> {
        let name = if name.trim().is_empty() {
            classroom
                .roster
                .get(student_id)
                .map(|p| p.name.clone())
                .unwrap_or_default()
        } else {
            name
        };

        let poll = classroom.session.record_choice(student_id, &name, choice)?;
        self.broadcaster
            .announce_poll_updated(&classroom.roster, poll)
            .await;
        Ok(())
    }

    async fn submit_vote(&self, classroom: &mut Classroom, student_id: &str) -> Result<()> {
        let poll = classroom.session.submit(student_id)?;
        self.broadcaster
            .announce_poll_updated(&classroom.roster, poll)
            .await;
        Ok(())
    }

    async fn manual_end_poll(&self, classroom: &mut Classroom) -> Result<()> {
        let total_students = classroom.roster.student_count();
        let result = classroom.session.end(EndTrigger::Manual, total_students)?;
        self.broadcaster
            .announce_poll_ended(&classroom.roster, &result)
            .await;
        Ok(())
    }

    /// Tell the student, close their connection, then drop them from the roster.
    async fn remove_student(&self, classroom: &mut Classroom, student_id: &str) {
        if let Err(e) = self.broadcaster.unicast(student_id, &ServerEvent::Removed).await {
            tracing::debug!(connection_id = %student_id, error = %e, "Removed student was not connected");
        }
        self.broadcaster.disconnect(student_id).await;

        if classroom.roster.remove(student_id).is_none() {
            tracing::debug!(connection_id = %student_id, "Remove request for unknown participant");
        }
        self.broadcaster.announce_roster(&classroom.roster).await;
    }
}

/// Parse one text frame into an event.
pub fn parse_client_event(text: &str) -> Result<ClientEvent> {
    serde_json::from_str(text).map_err(|e| PollError::InvalidMessage(e.to_string()))
}
