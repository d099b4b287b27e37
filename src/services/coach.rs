//! Prompt construction and plan parsing for the AI coach.

use std::collections::HashMap;

use serde::Deserialize;

use super::llm::{ChatMessage, ChatRole};
use crate::models::{ReplaceSet, SetType};

pub const MAX_CONVERSATION_MESSAGES: usize = 50;
pub const MAX_MESSAGE_CHARS: usize = 4000;
pub const MAX_GOAL_CHARS: usize = 500;
const MAX_PLANNED_SETS: usize = 10;

const COACH_SYSTEM_PROMPT: &str = "You are Repcount Coach, a concise strength and \
conditioning assistant inside a workout logging app. Give practical, safe advice about \
training, programming, technique and recovery. Recommend seeing a professional for \
injuries or medical questions. Keep answers short unless asked for detail.";

const PLANNER_SYSTEM_PROMPT: &str = "You design single workout sessions for a workout \
logging app. Reply with one JSON object and nothing else, shaped as \
{\"name\": string, \"exercises\": [{\"name\": string, \"sets\": [{\"reps\": integer, \
\"weight\": number, \"set_type\": \"default\"|\"warmup\"|\"drop\"|\"failure\"}]}]}. \
Only use exercise names from the provided list, spelled exactly. Use weight 0 when the \
lifter should pick their own load.";

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateWorkoutRequest {
    pub goal: String,
    pub duration_minutes: Option<u32>,
    pub equipment: Option<Vec<String>>,
}

impl GenerateWorkoutRequest {
    pub fn validate(&self) -> Result<(), String> {
        let goal = self.goal.trim();
        if goal.is_empty() {
            return Err("Goal is required".to_string());
        }
        if goal.chars().count() > MAX_GOAL_CHARS {
            return Err(format!("Goal must be at most {} characters", MAX_GOAL_CHARS));
        }
        if let Some(minutes) = self.duration_minutes {
            if !(10..=180).contains(&minutes) {
                return Err("Duration must be between 10 and 180 minutes".to_string());
            }
        }
        Ok(())
    }
}

/// Check a client-supplied conversation before it is sent upstream.
pub fn validate_conversation(messages: &[ChatMessage]) -> Result<(), String> {
    if messages.is_empty() {
        return Err("At least one message is required".to_string());
    }
    if messages.len() > MAX_CONVERSATION_MESSAGES {
        return Err(format!(
            "At most {} messages are allowed",
            MAX_CONVERSATION_MESSAGES
        ));
    }
    for message in messages {
        if message.role == ChatRole::System {
            return Err("Messages must come from the user or the assistant".to_string());
        }
        if message.content.trim().is_empty() {
            return Err("Messages must not be empty".to_string());
        }
        if message.content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(format!(
                "Messages must be at most {} characters",
                MAX_MESSAGE_CHARS
            ));
        }
    }
    if messages.last().map(|m| m.role) != Some(ChatRole::User) {
        return Err("The last message must come from the user".to_string());
    }
    Ok(())
}

pub fn chat_prompt(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut prompt = Vec::with_capacity(messages.len() + 1);
    prompt.push(ChatMessage::system(COACH_SYSTEM_PROMPT));
    prompt.extend(messages);
    prompt
}

pub fn generation_prompt(request: &GenerateWorkoutRequest, library: &[String]) -> Vec<ChatMessage> {
    let mut ask = format!("Goal: {}\n", request.goal.trim());
    if let Some(minutes) = request.duration_minutes {
        ask.push_str(&format!("Session length: about {} minutes\n", minutes));
    }
    match &request.equipment {
        Some(equipment) if !equipment.is_empty() => {
            ask.push_str(&format!("Available equipment: {}\n", equipment.join(", ")));
        }
        _ => {}
    }
    ask.push_str("Exercises you may use:\n");
    for name in library {
        ask.push_str("- ");
        ask.push_str(name);
        ask.push('\n');
    }

    vec![ChatMessage::system(PLANNER_SYSTEM_PROMPT), ChatMessage::user(ask)]
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedWorkout {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub exercises: Vec<GeneratedExercise>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedExercise {
    pub name: String,
    #[serde(default)]
    pub sets: Vec<GeneratedSet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedSet {
    pub reps: i32,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub set_type: Option<String>,
}

/// Parse the model's reply, tolerating a surrounding markdown code fence.
pub fn parse_generated_workout(reply: &str) -> Option<GeneratedWorkout> {
    let trimmed = reply.trim();
    let body = match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.trim_end().strip_suffix("```").unwrap_or(rest)
        }
        None => trimmed,
    };
    serde_json::from_str(body.trim()).ok()
}

/// Resolve planned exercises against the library (name -> exercise id).
/// Unknown names are skipped, as are sets outside the accepted ranges.
pub fn match_plan(
    plan: &GeneratedWorkout,
    library: &[(String, String)],
) -> Vec<(String, Vec<ReplaceSet>)> {
    let by_name: HashMap<String, &str> = library
        .iter()
        .map(|(id, name)| (name.trim().to_lowercase(), id.as_str()))
        .collect();

    plan.exercises
        .iter()
        .filter_map(|exercise| {
            let Some(id) = by_name.get(&exercise.name.trim().to_lowercase()) else {
                tracing::debug!(name = %exercise.name, "Skipping unknown planned exercise");
                return None;
            };
            let sets = exercise
                .sets
                .iter()
                .take(MAX_PLANNED_SETS)
                .map(|set| ReplaceSet {
                    reps: set.reps,
                    weight: set.weight,
                    set_type: set
                        .set_type
                        .as_deref()
                        .map(SetType::parse)
                        .unwrap_or_default(),
                    completed: false,
                })
                .filter(|set| set.validate().is_ok())
                .collect();
            Some((id.to_string(), sets))
        })
        .collect()
}
