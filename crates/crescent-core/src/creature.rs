//! The per-creature aggregate.
//!
//! A [`Creature`] owns everything that is mutated for one creature: its
//! state, the processor that guards it, its stress and synthesis
//! sub-states and its random source. One worker holds a creature at a time,
//! so none of it is locked.

use crescent_changes::{ChangeConfig, ChangeProcessor, ChangeResult, FormChange};
use crescent_stress::StressState;
use crescent_synthesis::{Catalyst, SynthesisBook, SynthesisEngine, SynthesisResult};
use crescent_types::{CreatureId, CreatureState};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// One simulated creature and its engine-side bookkeeping.
#[derive(Debug)]
pub struct Creature {
    pub(crate) state: CreatureState,
    pub(crate) processor: ChangeProcessor,
    pub(crate) stress: Option<StressState>,
    pub(crate) synthesis: SynthesisBook,
    pub(crate) catalysts: Vec<Catalyst>,
    pub(crate) rng: StdRng,
    pub(crate) extinct: bool,
}

impl Creature {
    /// Wrap `state` with a processor built from `config` and a random
    /// source seeded with `seed`.
    pub fn new(state: CreatureState, config: ChangeConfig, seed: u64) -> Self {
        Self {
            state,
            processor: ChangeProcessor::new(config),
            stress: None,
            synthesis: SynthesisBook::new(),
            catalysts: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
            extinct: false,
        }
    }

    /// Creature identity.
    pub const fn id(&self) -> CreatureId {
        self.state.id
    }

    /// Current state.
    pub const fn state(&self) -> &CreatureState {
        &self.state
    }

    /// The change processor.
    pub const fn processor(&self) -> &ChangeProcessor {
        &self.processor
    }

    /// The change processor, for batches or validator rules.
    pub const fn processor_mut(&mut self) -> &mut ChangeProcessor {
        &mut self.processor
    }

    /// Stress state, once the creature has been exposed to an environment.
    pub const fn stress(&self) -> Option<&StressState> {
        self.stress.as_ref()
    }

    /// Synthesis states.
    pub const fn synthesis(&self) -> &SynthesisBook {
        &self.synthesis
    }

    /// Ask `engine` to start synthesizing one of the creature's traits.
    pub fn begin_synthesis(
        &mut self,
        engine: &SynthesisEngine,
        trait_id: &str,
        target_form: &str,
        catalyst: &Catalyst,
        environment: Option<&str>,
    ) -> SynthesisResult {
        engine.begin_synthesis(
            &mut self.synthesis,
            &self.state,
            trait_id,
            target_form,
            catalyst,
            environment,
        )
    }

    /// Whether extinction was signalled.
    pub const fn is_extinct(&self) -> bool {
        self.extinct
    }

    /// Queue a catalyst to be recorded at the start of the next tick.
    pub fn expose(&mut self, catalyst: Catalyst) {
        self.catalysts.push(catalyst);
    }

    /// Validate and apply a change.
    pub fn apply(&mut self, change: FormChange) -> ChangeResult {
        self.processor.process_change(&mut self.state, change)
    }

    /// Undo the newest applied change.
    pub fn undo(&mut self) -> bool {
        self.processor.undo(&mut self.state)
    }

    /// A serializable copy of the creature's state.
    pub fn snapshot(&self) -> CreatureSnapshot {
        CreatureSnapshot {
            state: self.state.clone(),
            stress: self.stress.clone(),
            synthesis: self.synthesis.clone(),
            extinct: self.extinct,
        }
    }
}

/// Point-in-time copy of one creature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureSnapshot {
    /// Creature state.
    pub state: CreatureState,
    /// Stress state, if any.
    pub stress: Option<StressState>,
    /// Synthesis states.
    pub synthesis: SynthesisBook,
    /// Whether extinction was signalled.
    pub extinct: bool,
}
