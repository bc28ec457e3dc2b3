use super::error::ValidationError;
use crate::models::schema::EffectName;
use crate::services::schema_fetcher::{FetchTicket, RequestSequencer};

/// Effect choice of an add session.
///
/// `loaded` is the effect whose schema the form currently shows; `pending`
/// is a switch that was requested but whose schema has not arrived yet.
#[derive(Debug, Default)]
pub struct EffectSelector {
    effects: Vec<EffectName>,
    loaded: Option<EffectName>,
    pending: Option<(FetchTicket, EffectName)>,
}

impl EffectSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the sorted effect list together with the effect already loaded.
    pub fn set_catalog(&mut self, effects: Vec<EffectName>, loaded: EffectName) {
        self.effects = effects;
        self.loaded = Some(loaded);
        self.pending = None;
    }

    /// Ask for a switch to `effect`.
    ///
    /// Returns the ticket of the fetch to run, or `None` when no fetch is
    /// needed because `effect` is already loaded or already on its way.
    /// Going back to the loaded effect abandons a pending switch.
    pub fn select(
        &mut self,
        effect: EffectName,
        sequencer: &mut RequestSequencer,
    ) -> Result<Option<FetchTicket>, ValidationError> {
        if !self.effects.contains(&effect) {
            return Err(ValidationError::UnknownEffect(effect));
        }

        if self.pending.as_ref().map(|(_, pending)| pending) == Some(&effect) {
            return Ok(None);
        }
        if self.loaded.as_ref() == Some(&effect) {
            if let Some((ticket, abandoned)) = self.pending.take() {
                log::debug!("Abandoning switch to {} (ticket {})", abandoned, ticket.seq());
                sequencer.cancel();
            }
            return Ok(None);
        }

        let ticket = sequencer.issue();
        self.pending = Some((ticket, effect));
        Ok(Some(ticket))
    }

    /// The fetch for `ticket` was applied to the form.
    pub fn resolve(&mut self, ticket: FetchTicket, effect: EffectName) {
        if self.is_pending(ticket) {
            self.pending = None;
        }
        self.loaded = Some(effect);
    }

    /// The fetch for `ticket` failed; selection falls back to the loaded effect.
    pub fn fail(&mut self, ticket: FetchTicket) {
        if self.is_pending(ticket) {
            self.pending = None;
        }
    }

    pub fn abandon(&mut self) {
        self.pending = None;
    }

    fn is_pending(&self, ticket: FetchTicket) -> bool {
        matches!(&self.pending, Some((pending, _)) if *pending == ticket)
    }

    pub fn effects(&self) -> &[EffectName] {
        &self.effects
    }

    /// What the user picked last: the pending effect if any, else the loaded one.
    pub fn selected(&self) -> Option<&EffectName> {
        self.pending
            .as_ref()
            .map(|(_, effect)| effect)
            .or(self.loaded.as_ref())
    }

    pub fn loaded(&self) -> Option<&EffectName> {
        self.loaded.as_ref()
    }

    pub fn is_switching(&self) -> bool {
        self.pending.is_some()
    }
}
