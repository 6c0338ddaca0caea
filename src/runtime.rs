//! Runtime facade: text → schema retrieval → intent → decision →
//! confirmation/follow-up → guarded dispatch.
//!
//! The runtime is stateless across turns. When parameters are missing it
//! returns a continuation descriptor the client resubmits with the gaps
//! filled; when confirmation is needed it returns a confirmation request
//! the client answers by calling `execute_confirmed`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, instrument};

use oag_actions::{
    ActionDispatcher, ActionOutcome, ActionRegistry, DispatchContext, HandlerContext,
    HitlStrategy, PersistenceSession,
};
use oag_core::{OagError, OntologyRegistry, Result, RiskLevel, UserContext};
use oag_events::EventBus;
use oag_ooda::{
    DecidePhase, Decision, IntentRecognizer, IntentResult, MissingField, Observation,
    ObservePhase, Orientation, OrientPhase,
};
use oag_plan::PlanDispatcher;
use oag_retrieval::{RetrievalResult, SchemaRetriever};

/// Continuation descriptor for a partially-filled action. The server keeps
/// no conversation state; clients resubmit this with the gaps filled.
#[derive(Debug, Clone, Serialize)]
pub struct FollowupDescriptor {
    pub action_type: String,
    pub collected_fields: Map<String, Value>,
    pub missing_fields: Vec<MissingField>,
    pub prompt: String,
}

/// A decision that needs an explicit user confirmation turn.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationRequest {
    pub action_type: String,
    pub action_params: Map<String, Value>,
    pub risk_level: RiskLevel,
    pub reason: String,
}

/// What one chat turn produced.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// The input could not be turned into an executable decision.
    Invalid { errors: Vec<String> },
    /// Required parameters are missing; resubmit with the descriptor.
    Followup(FollowupDescriptor),
    /// Ready to execute once the user confirms.
    NeedsConfirmation(ConfirmationRequest),
    /// The action ran; the handler outcome is forwarded unchanged.
    Executed(ActionOutcome),
}

pub struct Runtime {
    registry: Arc<OntologyRegistry>,
    actions: Arc<ActionRegistry>,
    dispatcher: Arc<ActionDispatcher>,
    observe: ObservePhase,
    orient: OrientPhase,
    decide: DecidePhase,
    hitl: Option<Arc<dyn HitlStrategy>>,
    retriever: Option<SchemaRetriever>,
    events: Arc<EventBus>,
}

pub struct RuntimeBuilder {
    registry: Arc<OntologyRegistry>,
    actions: Arc<ActionRegistry>,
    recognizer: Box<dyn IntentRecognizer>,
    hitl: Option<Arc<dyn HitlStrategy>>,
    retriever: Option<SchemaRetriever>,
    events: Option<Arc<EventBus>>,
}

impl Runtime {
    pub fn builder(
        registry: Arc<OntologyRegistry>,
        actions: Arc<ActionRegistry>,
        recognizer: Box<dyn IntentRecognizer>,
    ) -> RuntimeBuilder {
        RuntimeBuilder {
            registry,
            actions,
            recognizer,
            hitl: None,
            retriever: None,
            events: None,
        }
    }

    pub fn registry(&self) -> &Arc<OntologyRegistry> {
        &self.registry
    }

    pub fn actions(&self) -> &Arc<ActionRegistry> {
        &self.actions
    }

    pub fn dispatcher(&self) -> &Arc<ActionDispatcher> {
        &self.dispatcher
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Focused schema slice for prompt seeding.
    pub async fn retrieve(&self, text: &str) -> Result<Option<RetrievalResult>> {
        match &self.retriever {
            Some(retriever) => Ok(Some(retriever.retrieve_for_query(text).await?)),
            None => Ok(None),
        }
    }

    /// One chat turn, end to end.
    #[instrument(skip(self, session), fields(user = %user.user_id))]
    pub async fn process_message(
        &self,
        text: &str,
        user: &UserContext,
        session: Arc<dyn PersistenceSession>,
    ) -> Result<ProcessOutcome> {
        let observation = self.observe.observe(text);
        let mut orientation = self.orient.orient(observation).await;
        self.attach_user_context(&mut orientation, user);
        let decision = self.decide.decide(&orientation);
        self.act_on_decision(decision, user, session).await
    }

    /// Resubmission of a follow-up descriptor with some fields filled.
    pub async fn resume_followup(
        &self,
        descriptor: &FollowupDescriptor,
        supplied_fields: Map<String, Value>,
        user: &UserContext,
        session: Arc<dyn PersistenceSession>,
    ) -> Result<ProcessOutcome> {
        let mut entities = descriptor.collected_fields.clone();
        for (key, value) in supplied_fields {
            entities.insert(key, value);
        }
        let mut intent = IntentResult::new(descriptor.action_type.clone(), 1.0);
        intent.entities = entities;

        let mut orientation = synthetic_orientation(intent);
        self.attach_user_context(&mut orientation, user);
        let decision = self.decide.decide(&orientation);
        self.act_on_decision(decision, user, session).await
    }

    /// Dispatch an action the user has already confirmed.
    pub async fn execute_confirmed(
        &self,
        action_type: &str,
        params: &Value,
        user: &UserContext,
        session: Arc<dyn PersistenceSession>,
        dispatch: DispatchOptions,
    ) -> Result<ActionOutcome> {
        let mut ctx =
            DispatchContext::new(HandlerContext::new(session, user.clone()));
        ctx.entity_state = dispatch.entity_state;
        ctx.current_state = dispatch.current_state;
        ctx.target_state = dispatch.target_state;
        self.dispatcher.dispatch(action_type, params, ctx).await
    }

    /// A plan-executor dispatch adapter bound to one user and session.
    pub fn plan_dispatcher(
        &self,
        user: UserContext,
        session: Arc<dyn PersistenceSession>,
    ) -> Arc<dyn PlanDispatcher> {
        Arc::new(RuntimePlanDispatcher {
            dispatcher: Arc::clone(&self.dispatcher),
            user,
            session,
        })
    }

    fn attach_user_context(&self, orientation: &mut Orientation, user: &UserContext) {
        orientation
            .context
            .insert("user_id".into(), json!(user.user_id));
        orientation.context.insert("role".into(), json!(user.role));
    }

    async fn act_on_decision(
        &self,
        decision: Decision,
        user: &UserContext,
        session: Arc<dyn PersistenceSession>,
    ) -> Result<ProcessOutcome> {
        if !decision.is_valid {
            if !decision.missing_fields.is_empty() {
                return Ok(ProcessOutcome::Followup(followup_from(&decision)));
            }
            return Ok(ProcessOutcome::Invalid {
                errors: decision.errors,
            });
        }

        let spec = self
            .registry
            .get_action_by_name(&decision.action_type)
            .ok_or_else(|| OagError::UnknownAction(decision.action_type.clone()))?;

        let mut requires_confirmation = decision.requires_confirmation;
        let mut risk_level = spec.risk_level;
        if let Some(hitl) = &self.hitl {
            requires_confirmation = requires_confirmation
                || hitl.requires_confirmation(&spec, &decision.action_params, &user.role);
            risk_level = risk_level.max(hitl.risk_level(&spec, &decision.action_params));
        }

        if requires_confirmation {
            info!(action = %decision.action_type, %risk_level, "confirmation required");
            return Ok(ProcessOutcome::NeedsConfirmation(ConfirmationRequest {
                action_type: decision.action_type,
                action_params: decision.action_params,
                risk_level,
                reason: format!("risk level {risk_level}"),
            }));
        }

        let params = Value::Object(decision.action_params.clone());
        let ctx = DispatchContext::new(HandlerContext::new(session, user.clone()));
        let outcome = self
            .dispatcher
            .dispatch(&decision.action_type, &params, ctx)
            .await?;
        Ok(ProcessOutcome::Executed(outcome))
    }
}

/// Optional guard inputs for a confirmed dispatch.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    pub entity_state: Option<Value>,
    pub current_state: Option<String>,
    pub target_state: Option<String>,
}

impl RuntimeBuilder {
    pub fn with_hitl(mut self, hitl: Arc<dyn HitlStrategy>) -> Self {
        self.hitl = Some(hitl);
        self
    }

    pub fn with_retriever(mut self, retriever: SchemaRetriever) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Runtime {
        let dispatcher = Arc::new(ActionDispatcher::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.actions),
        ));
        Runtime {
            decide: DecidePhase::new(Arc::clone(&self.registry)),
            registry: self.registry,
            actions: self.actions,
            dispatcher,
            observe: ObservePhase::new(),
            orient: OrientPhase::new(self.recognizer),
            hitl: self.hitl,
            retriever: self.retriever,
            events: self.events.unwrap_or_else(|| Arc::new(EventBus::new())),
        }
    }
}

fn followup_from(decision: &Decision) -> FollowupDescriptor {
    let field_names: Vec<String> = decision
        .missing_fields
        .iter()
        .map(|f| f.display_name.clone())
        .collect();
    FollowupDescriptor {
        action_type: decision.action_type.clone(),
        collected_fields: decision.action_params.clone(),
        missing_fields: decision.missing_fields.clone(),
        prompt: format!("Please provide: {}", field_names.join(", ")),
    }
}

fn synthetic_orientation(intent: IntentResult) -> Orientation {
    let observation = Observation {
        raw_input: String::new(),
        normalized_input: String::new(),
        is_valid: true,
        validation_errors: Vec::new(),
        timestamp: chrono::Utc::now(),
    };
    Orientation {
        observation,
        extracted_entities: intent.entities.clone(),
        confidence: intent.confidence,
        intent: Some(intent),
        context: Map::new(),
        is_valid: true,
        errors: Vec::new(),
    }
}

struct RuntimePlanDispatcher {
    dispatcher: Arc<ActionDispatcher>,
    user: UserContext,
    session: Arc<dyn PersistenceSession>,
}

#[async_trait]
impl PlanDispatcher for RuntimePlanDispatcher {
    async fn dispatch(
        &self,
        action_type: &str,
        params: &Value,
        _context: &Value,
    ) -> anyhow::Result<Value> {
        let ctx = DispatchContext::new(HandlerContext::new(
            Arc::clone(&self.session),
            self.user.clone(),
        ));
        match self.dispatcher.dispatch(action_type, params, ctx).await {
            Ok(outcome) => Ok(serde_json::to_value(outcome)?),
            // Gateway rejections fail the step; the executor handles
            // rollback, so they are step results rather than panics.
            Err(err) => Ok(json!({"success": false, "message": err.to_string()})),
        }
    }
}
