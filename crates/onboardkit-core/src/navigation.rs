//! Navigation state machine for one resolved flow.
//!
//! The machine sits on `Screen(i)` for `i in [0, N)` until it reaches
//! `Complete` or the user exits. Every move is persisted before it is
//! committed in memory, so a process restart resumes on the last screen the
//! caller saw.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use onboardkit_store::{LocalStore, LocalStoreExt};
use tracing::{debug, info, warn};

use crate::delivery::DeliveryQueue;
use crate::domain::{
    AnalyticsEvent, AnalyticsEventBuilder, AnswerValue, CompletionResult, EventType, ExitResult,
    NavigationState, OnboardError, ResolvedFlow, Result, Screen,
};
use crate::obs::{self, FlowSpan};
use crate::session::{Identity, SessionState};
use crate::storage_keys;

/// Action names the rendering layer dispatches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Next,
    Skip,
    Back,
    Complete,
    Exit,
    /// Any other action. Behaves like `next`.
    Custom(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Next => "next",
            Action::Skip => "skip",
            Action::Back => "back",
            Action::Complete => "complete",
            Action::Exit => "exit",
            Action::Custom(name) => name,
        }
    }
}

impl From<&str> for Action {
    fn from(name: &str) -> Self {
        match name {
            "next" => Action::Next,
            "skip" => Action::Skip,
            "back" => Action::Back,
            "complete" => Action::Complete,
            "exit" => Action::Exit,
            other => Action::Custom(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Screen(usize),
    Complete,
    Exited,
}

/// Result of [`NavigationMachine::dispatch_action`].
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Moved { from: usize, to: usize },
    /// Nothing changed: unknown target, `back` on the first screen, or the
    /// flow already ended.
    Stayed,
    Completed(CompletionResult),
    Exited(ExitResult),
}

/// Read-only progress summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub current_index: Option<usize>,
    pub total_screens: usize,
    pub screens_completed: u32,
    pub complete: bool,
}

impl Progress {
    /// Share of the flow behind the user, in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.complete {
            return 1.0;
        }
        match (self.current_index, self.total_screens) {
            (Some(index), total) if total > 0 => index as f64 / total as f64,
            _ => 0.0,
        }
    }
}

/// Receives flow outcomes as they happen.
pub trait FlowListener: Send + Sync {
    fn on_complete(&self, _result: &CompletionResult) {}

    fn on_exit(&self, _result: &ExitResult) {}
}

/// Drives one identity through one flow.
pub struct NavigationMachine {
    flow: Arc<ResolvedFlow>,
    store: Arc<dyn LocalStore>,
    session: Arc<SessionState>,
    queue: Arc<DeliveryQueue>,
    identity: Identity,
    state_key: String,
    state: NavigationState,
    position: Position,
    screen_entered_at: DateTime<Utc>,
    listener: Option<Arc<dyn FlowListener>>,
}

impl NavigationMachine {
    /// Resume the persisted progress for the current identity, or start the
    /// flow at its entry screen.
    pub async fn start(
        flow: Arc<ResolvedFlow>,
        store: Arc<dyn LocalStore>,
        session: Arc<SessionState>,
        queue: Arc<DeliveryQueue>,
    ) -> Result<Self> {
        let identity = session.identity();
        let state_key = storage_keys::flow_state(&flow.flow_key, identity.key());
        let total = flow.screens.len();

        let saved = match store.get_json::<NavigationState>(&state_key) {
            Ok(saved) => saved,
            Err(e) => {
                warn!(key = %state_key, error = %e, "saved progress unreadable, starting over");
                None
            }
        };
        let resumed = saved.is_some();

        let mut state =
            saved.unwrap_or_else(|| NavigationState::new(&flow.flow_key, identity.user_id.clone(), total));
        let index = state
            .current_screen_id
            .as_deref()
            .and_then(|id| flow.screen_index(id))
            .unwrap_or_else(|| flow.entry_index());
        let Some(entry) = flow.screens.get(index) else {
            return Err(OnboardError::Decode(format!("flow {} has no screens", flow.flow_key)));
        };
        state.total_screens = total;
        state.current_screen_index = Some(index);
        state.current_screen_id = Some(entry.id.clone());
        store.set_json(&state_key, &state)?;

        let mut machine = Self {
            flow,
            store,
            session,
            queue,
            identity,
            state_key,
            state,
            position: Position::Screen(index),
            screen_entered_at: Utc::now(),
            listener: None,
        };

        if resumed {
            info!(flow_key = %machine.flow.flow_key, index = index, "resuming flow");
            let event = machine
                .event(EventType::FlowResumed)
                .data("screenId", machine.screen_id(index))
                .data("screenIndex", index)
                .data("screensCompleted", machine.state.screens_completed)
                .build();
            machine.emit(event).await;
        } else {
            let event = machine
                .event(EventType::FlowStart)
                .data("screenId", machine.screen_id(index))
                .data("totalScreens", total)
                .build();
            machine.emit(event).await;
        }
        machine.screen_entered_at = Utc::now();
        Ok(machine)
    }

    pub fn set_listener(&mut self, listener: Arc<dyn FlowListener>) {
        self.listener = Some(listener);
    }

    pub fn flow(&self) -> &ResolvedFlow {
        &self.flow
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self.position, Position::Screen(_))
    }

    /// The screen being shown, `None` once the flow ended.
    pub fn current_screen(&self) -> Option<&Screen> {
        match self.position {
            Position::Screen(index) => self.flow.screens.get(index),
            _ => None,
        }
    }

    pub fn progress(&self) -> Progress {
        Progress {
            current_index: match self.position {
                Position::Screen(index) => Some(index),
                _ => None,
            },
            total_screens: self.flow.screens.len(),
            screens_completed: self.state.screens_completed,
            complete: self.position == Position::Complete,
        }
    }

    /// Apply a user action to the current screen.
    pub async fn dispatch_action(&mut self, action: &str, target: Option<&str>) -> Result<Transition> {
        let Position::Screen(current) = self.position else {
            debug!(action = %action, position = ?self.position, "flow already ended, action ignored");
            return Ok(Transition::Stayed);
        };
        let action = Action::from(action);
        let last = self.flow.screens.len().saturating_sub(1);

        match (&action, target) {
            (Action::Back, _) => {
                if current == 0 {
                    return Ok(Transition::Stayed);
                }
                self.move_to(&action, current, current - 1, false).await
            }
            (Action::Complete, _) => self.complete().await,
            (Action::Exit, _) => self.exit().await,
            (_, Some(target)) => match self.flow.screen_index(target) {
                Some(to) => self.move_to(&action, current, to, true).await,
                None => {
                    warn!(action = %action.as_str(), target = %target, "unknown target screen, staying");
                    Ok(Transition::Stayed)
                }
            },
            (_, None) if current < last => self.move_to(&action, current, current + 1, true).await,
            (_, None) => self.complete().await,
        }
    }

    /// Record an answer for the current screen.
    ///
    /// A value that cannot be stored (a non-finite number anywhere in it) is
    /// rejected with [`OnboardError::Value`] and nothing is recorded.
    pub async fn submit_answer(&mut self, key: &str, value: impl Into<AnswerValue>) -> Result<()> {
        let value = value.into();
        value.validate()?;
        let Position::Screen(index) = self.position else {
            debug!(key = %key, "flow already ended, answer ignored");
            return Ok(());
        };
        let mut next = self.state.clone();
        next.answers.insert(key.to_string(), value.clone());
        self.commit(next, self.position)?;

        let event = self
            .event(EventType::Answer)
            .data("screenId", self.screen_id(index))
            .data("key", key)
            .data("value", value)
            .build();
        self.emit(event).await;
        Ok(())
    }

    /// Record a user attribute. Persisted with the progress, not reported.
    pub fn set_attribute(&mut self, key: &str, value: impl Into<AnswerValue>) -> Result<()> {
        let value = value.into();
        value.validate()?;
        let mut next = self.state.clone();
        next.attributes.insert(key.to_string(), value);
        self.commit(next, self.position)
    }

    /// The rendering layer displayed `screen_id`.
    pub async fn screen_entered(&mut self, screen_id: &str) {
        let Some(index) = self.flow.screen_index(screen_id) else {
            warn!(screen_id = %screen_id, "screen_entered for unknown screen");
            return;
        };
        self.screen_entered_at = Utc::now();
        let event = self
            .event(EventType::ScreenView)
            .data("screenId", screen_id)
            .data("screenIndex", index)
            .build();
        self.emit(event).await;
    }

    async fn move_to(
        &mut self,
        action: &Action,
        from: usize,
        to: usize,
        forward: bool,
    ) -> Result<Transition> {
        let mut next = self.state.clone();
        next.current_screen_index = Some(to);
        next.current_screen_id = Some(self.screen_id(to).to_string());
        if forward {
            next.screens_completed = next.screens_completed.saturating_add(1);
        }
        self.commit(next, Position::Screen(to))?;

        let now = Utc::now();
        let time_on_screen = (now - self.screen_entered_at).num_milliseconds().max(0);
        self.screen_entered_at = now;

        obs::emit_transition(&self.flow.flow_key, action.as_str(), from, to);
        let event = self
            .event(EventType::ScreenTransition)
            .data("fromScreenId", self.screen_id(from))
            .data("toScreenId", self.screen_id(to))
            .data("action", action.as_str())
            .data("timeOnScreenMs", time_on_screen)
            .build();
        self.emit(event).await;
        Ok(Transition::Moved { from, to })
    }

    async fn complete(&mut self) -> Result<Transition> {
        let now = Utc::now();
        let elapsed_ms = self.state.elapsed_ms(now);
        self.state.screens_completed = self.state.screens_completed.saturating_add(1);

        let result = CompletionResult {
            flow_id: self.flow.flow_id.clone(),
            variant_id: self.flow.active_test().and_then(|v| v.variant_id.clone()),
            completed_at: now,
            answers: self.state.answers.clone(),
        };

        let event = self
            .event(EventType::FlowComplete)
            .data("elapsedMs", elapsed_ms)
            .data("screensCompleted", self.state.screens_completed)
            .data("answerCount", result.answers.len())
            .build();
        self.emit(event).await;

        if let Err(e) = self.store.delete(&self.state_key) {
            warn!(key = %self.state_key, error = %e, "failed to clear completed progress");
        }
        self.session.reset_session();
        self.session.clear_context();
        self.position = Position::Complete;

        obs::emit_flow_completed(&self.flow.flow_key, elapsed_ms, result.answers.len());
        if let Some(listener) = &self.listener {
            listener.on_complete(&result);
        }
        Ok(Transition::Completed(result))
    }

    async fn exit(&mut self) -> Result<Transition> {
        let now = Utc::now();
        let result = ExitResult {
            flow_id: self.flow.flow_id.clone(),
            last_screen_id: self.state.current_screen_id.clone(),
            screens_completed: self.state.screens_completed,
            exited_at: now,
        };

        let mut event = self
            .event(EventType::FlowAbandoned)
            .data("screensCompleted", result.screens_completed)
            .data("elapsedMs", self.state.elapsed_ms(now));
        if let Some(last) = &result.last_screen_id {
            event = event.data("lastScreenId", last.as_str());
        }
        self.emit(event.build()).await;

        self.session.clear_context();
        self.position = Position::Exited;

        obs::emit_flow_abandoned(
            &self.flow.flow_key,
            result.last_screen_id.as_deref(),
            result.screens_completed,
        );
        if let Some(listener) = &self.listener {
            listener.on_exit(&result);
        }
        Ok(Transition::Exited(result))
    }

    /// Persist `next`, then make it current.
    fn commit(&mut self, next: NavigationState, position: Position) -> Result<()> {
        let _span = FlowSpan::enter(&self.flow.flow_key);
        self.store.set_json(&self.state_key, &next)?;
        debug!(position = ?position, answers = next.answers.len(), "progress saved");
        self.state = next;
        self.position = position;
        Ok(())
    }

    fn screen_id(&self, index: usize) -> &str {
        self.flow
            .screens
            .get(index)
            .map(|s| s.id.as_str())
            .unwrap_or_default()
    }

    /// Start an event carrying the session's attribution for this flow.
    fn event(&self, event_type: EventType) -> AnalyticsEventBuilder {
        let context = self.session.context();
        let builder = AnalyticsEvent::builder(event_type, self.session.session_id())
            .user_id(self.identity.user().map(str::to_string));

        if context.flow_id.as_deref() == Some(self.flow.flow_id.as_str()) {
            builder
                .flow_id(context.flow_id)
                .flow_version_id(context.flow_version_id)
                .experiment(context.experiment_id, context.variant_id)
        } else {
            let test = self.flow.active_test();
            builder
                .flow_id(Some(self.flow.flow_id.clone()))
                .flow_version_id(Some(self.flow.analytics_version_id()))
                .experiment(
                    test.and_then(|v| v.experiment_id.clone()),
                    test.and_then(|v| v.variant_id.clone()),
                )
        }
    }

    async fn emit(&self, event: AnalyticsEvent) {
        let event_type = event.event_type.clone();
        if let Err(e) = self.queue.enqueue(event).await {
            warn!(event_type = %event_type, error = %e, "analytics event not queued");
        }
    }
}
