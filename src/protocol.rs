//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Category, Difficulty, Page, Progress, Question, QuizOptions, QuizSummary};
use crate::error::ErrorRecord;
use crate::quiz::{Action, OptionChange, Outcome};

/// Question as shown to the player: the correct answer is not part of it.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct QuestionOut {
    pub text: String,
    pub answers: Vec<String>,
}

impl From<&Question> for QuestionOut {
    fn from(q: &Question) -> Self {
        Self { text: q.text.clone(), answers: q.answers.clone() }
    }
}

/// Everything the rendering surface needs to draw the current page.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    pub page: Page,
    pub question: Option<QuestionOut>,
    pub progress: Progress,
    pub score: usize,
    pub feedback: Option<String>,
    pub summary: Option<QuizSummary>,
    pub options: QuizOptions,
    pub categories: Vec<Category>,
    pub busy: bool,
    pub last_error: Option<ErrorRecord>,
}

/// Option-change payload. Difficulty is accepted in any letter case.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsIn {
    #[serde(default)]
    pub category: Option<u32>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub question_count: Option<u32>,
}

impl OptionsIn {
    pub fn into_change(self) -> Result<OptionChange, String> {
        let difficulty = match self.difficulty {
            Some(d) => Some(d.parse::<Difficulty>()?),
            None => None,
        };
        Ok(OptionChange { category: self.category, difficulty, question_count: self.question_count })
    }
}

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GetView,
    #[serde(rename_all = "camelCase")]
    SetOptions {
        #[serde(default)]
        category: Option<u32>,
        #[serde(default)]
        difficulty: Option<String>,
        #[serde(default)]
        question_count: Option<u32>,
    },
    Start,
    SubmitAnswer {
        #[serde(default)]
        answer: Option<String>,
        #[serde(default)]
        choice: Option<usize>,
    },
    Continue,
}

impl ClientWsMessage {
    /// The quiz action carried by this message, if any.
    pub fn into_action(self) -> Option<Result<Action, String>> {
        match self {
            ClientWsMessage::Ping | ClientWsMessage::GetView => None,
            ClientWsMessage::SetOptions { category, difficulty, question_count } => {
                let options = OptionsIn { category, difficulty, question_count };
                Some(options.into_change().map(Action::SetOptions))
            }
            ClientWsMessage::Start => Some(Ok(Action::Start)),
            ClientWsMessage::SubmitAnswer { answer, choice } => {
                Some(AnswerIn { answer, choice }.into_action())
            }
            ClientWsMessage::Continue => Some(Ok(Action::Continue)),
        }
    }
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    View {
        #[serde(skip_serializing_if = "Option::is_none")]
        outcome: Option<Outcome>,
        view: QuizView,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub session_id: String,
    pub bootstrap: Outcome,
    pub view: QuizView,
}

/// An answer is either the offered text verbatim or its 0-based `choice` index.
/// The index wins when both are present.
#[derive(Debug, Default, Deserialize)]
pub struct AnswerIn {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub choice: Option<usize>,
}

impl AnswerIn {
    pub fn into_action(self) -> Result<Action, String> {
        match (self.choice, self.answer) {
            (Some(i), _) => Ok(Action::SubmitChoice(i)),
            (None, Some(a)) => Ok(Action::SubmitAnswer(a)),
            (None, None) => Err("expected `answer` or `choice`".to_string()),
        }
    }
}

#[derive(Serialize)]
pub struct ActionOut {
    pub outcome: Outcome,
    pub view: QuizView,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
