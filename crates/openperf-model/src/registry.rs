// SPDX-License-Identifier: Apache-2.0

//! The per-module generator registry (spec.md section 4.2).
//!
//! `Registry<C, S>` is generic over a module's config type `C` and stats type
//! `S` and implements every operation spec.md section 4.2 describes once; each
//! module kind in [`crate::module`] is a monomorphization (SPEC_FULL.md section
//! 4.7). Per spec.md section 9 ("single-writer registry"), a `Registry` is
//! owned exclusively by one module server's event loop and needs no internal
//! locking — callers on other threads reach it only through that server's
//! request/reply bus.

use std::collections::HashMap;

use crate::error::Error;
use crate::generator::Generator;
use crate::id::Id;
use crate::result::GeneratorResult;
use crate::worker::{GeneratorWorker, WorkerFactory};

/// A module's registry of generators and their results.
pub struct Registry<C, S> {
    /// Used in error messages, e.g. `"generator"` or `"cpu generator"`.
    kind: &'static str,
    generators: HashMap<Id, Generator<C>>,
    results: HashMap<Id, GeneratorResult<S>>,
    workers: HashMap<Id, Box<dyn GeneratorWorker<S>>>,
    validate: Box<dyn Fn(&C) -> Result<(), String> + Send + Sync>,
    spawn: WorkerFactory<C, S>,
}

impl<C, S> Registry<C, S>
where
    C: Clone,
    S: Clone + Default,
{
    /// Creates an empty registry. `validate` checks module-specific config
    /// validity (spec.md section 4.2: "create"); `spawn` builds the worker for
    /// a generator that is starting.
    pub fn new(
        kind: &'static str,
        validate: impl Fn(&C) -> Result<(), String> + Send + Sync + 'static,
        spawn: WorkerFactory<C, S>,
    ) -> Self {
        Self {
            kind,
            generators: HashMap::new(),
            results: HashMap::new(),
            workers: HashMap::new(),
            validate: Box::new(validate),
            spawn,
        }
    }

    /// Returns a snapshot vector of live generators (spec.md section 4.2: "list").
    #[must_use]
    pub fn list(&self) -> Vec<Generator<C>> {
        self.generators.values().cloned().collect()
    }

    /// Returns the generator or [`Error::NotFound`].
    pub fn get(&self, id: &Id) -> Result<Generator<C>, Error> {
        self.generators
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(self.kind, id.to_string()))
    }

    /// Creates a generator. An empty `id` assigns a random one; otherwise `id`
    /// must validate and be unused (spec.md section 4.2: "create").
    pub fn create(&mut self, id: Option<Id>, config: C) -> Result<Generator<C>, Error> {
        (self.validate)(&config).map_err(Error::invalid_argument)?;

        let id = match id {
            Some(id) => {
                if self.generators.contains_key(&id) {
                    return Err(Error::exists(self.kind, id.to_string()));
                }
                id
            }
            None => loop {
                let candidate = Id::random();
                if !self.generators.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        let generator = Generator::new(id.clone(), config);
        self.generators.insert(id, generator.clone());
        Ok(generator)
    }

    /// Deletes a generator. Refuses with [`Error::Busy`] while running; on
    /// success drops all of its *inactive* results (spec.md section 4.2: "erase").
    pub fn erase(&mut self, id: &Id) -> Result<(), Error> {
        let generator = self.get(id)?;
        if generator.running() {
            return Err(Error::busy(self.kind, id.to_string()));
        }
        self.results.retain(|_, r| r.generator_id() != id);
        self.generators.remove(id);
        Ok(())
    }

    /// All-or-nothing bulk create: on the first failure, every generator
    /// created within this call is rolled back (spec.md section 4.2: "bulk_create").
    pub fn bulk_create(&mut self, items: Vec<(Option<Id>, C)>) -> Result<Vec<Generator<C>>, Error> {
        let mut created = Vec::with_capacity(items.len());
        for (id, config) in items {
            match self.create(id, config) {
                Ok(generator) => created.push(generator),
                Err(err) => {
                    for generator in &created {
                        let _ = self.erase(generator.id());
                    }
                    return Err(err);
                }
            }
        }
        Ok(created)
    }

    /// Best-effort bulk delete: unknown ids are ignored; a running generator is
    /// skipped rather than failing the whole call (see DESIGN.md for the
    /// chosen resolution of spec.md section 9's open question).
    pub fn bulk_erase(&mut self, ids: &[Id]) -> Vec<Id> {
        let mut erased = Vec::with_capacity(ids.len());
        for id in ids {
            if self.erase(id).is_ok() {
                erased.push(id.clone());
            }
        }
        erased
    }

    /// Starts a generator: spawns its worker, mints a fresh result id, and
    /// atomically flips `running` (spec.md section 4.2: "start").
    pub fn start(&mut self, id: &Id, dynamic_results: Option<serde_json::Value>) -> Result<GeneratorResult<S>, Error> {
        let generator = self
            .generators
            .get(id)
            .ok_or_else(|| Error::not_found(self.kind, id.to_string()))?;
        if generator.running() {
            return Err(Error::invalid_argument(format!("{} '{id}' is already running", self.kind)));
        }

        let config = generator.config().clone();
        let result_id = self.fresh_result_id();
        let result = GeneratorResult::started(result_id.clone(), id.clone(), dynamic_results, S::default());

        let worker = (self.spawn)(id, &config);
        self.workers.insert(id.clone(), worker);
        self.results.insert(result_id.clone(), result.clone());
        self.generators.get_mut(id).expect("checked above").attach_result(result_id);

        Ok(result)
    }

    /// Idempotent stop: flips `running` off, marks the result inactive, and
    /// detaches `current_result_id`. Statistics are not cleared (spec.md
    /// section 4.2: "stop").
    pub fn stop(&mut self, id: &Id) -> Result<(), Error> {
        let generator = self
            .generators
            .get_mut(id)
            .ok_or_else(|| Error::not_found(self.kind, id.to_string()))?;
        let Some(result_id) = generator.detach_result() else {
            return Ok(());
        };
        if let Some(worker) = self.workers.remove(id) {
            let stats = worker.stats();
            worker.stop();
            if let Some(result) = self.results.get_mut(&result_id) {
                result.update_stats(stats);
                result.deactivate();
            }
        } else if let Some(result) = self.results.get_mut(&result_id) {
            result.deactivate();
        }
        Ok(())
    }

    /// Atomic replacement of one running generator by another (spec.md section
    /// 4.2: "toggle", network/packet modules only). `in_id`'s worker takes over
    /// `out_id`'s existing result id — seeded with `out_id`'s final stats
    /// snapshot rather than a zeroed default — so the result stays the same
    /// object across the handoff (spec.md scenario S3: "a result whose first
    /// element is A's final stats and whose subsequent elements reflect B's
    /// load"). `out_id`'s worker is stopped and discarded and `out_id` itself
    /// is left idle with no result. Both generators are checked before
    /// anything is mutated, so there is no partial-failure state to roll back.
    pub fn toggle(
        &mut self,
        out_id: &Id,
        in_id: &Id,
        dynamic_results: Option<serde_json::Value>,
    ) -> Result<GeneratorResult<S>, Error> {
        let out_generator = self.get(out_id)?;
        if !out_generator.running() {
            return Err(Error::invalid_argument(format!("{} '{out_id}' is not running", self.kind)));
        }
        let in_generator = self.get(in_id)?;
        if in_generator.running() {
            return Err(Error::invalid_argument(format!("{} '{in_id}' is already running", self.kind)));
        }
        let result_id = out_generator.current_result_id().expect("checked running above").clone();

        let in_config = in_generator.config().clone();
        let in_worker = (self.spawn)(in_id, &in_config);

        let out_worker = self.workers.remove(out_id).expect("running generator has a worker");
        let final_stats = out_worker.stats();
        out_worker.stop();

        self.workers.insert(in_id.clone(), in_worker);
        let result = self.results.get_mut(&result_id).expect("running generator has a result");
        result.update_stats(final_stats);
        result.retarget(in_id.clone(), dynamic_results);

        self.generators.get_mut(out_id).expect("checked above").detach_result();
        self.generators.get_mut(in_id).expect("checked above").attach_result(result_id.clone());

        Ok(self.results.get(&result_id).expect("updated above").clone())
    }

    fn fresh_result_id(&self) -> Id {
        loop {
            let candidate = Id::random();
            if !self.results.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Returns a snapshot vector of results, refreshing active ones from their
    /// live worker first.
    pub fn result_list(&mut self) -> Vec<GeneratorResult<S>> {
        self.refresh_active_results();
        self.results.values().cloned().collect()
    }

    /// Returns a result, refreshed from its live worker if active.
    pub fn result_get(&mut self, id: &Id) -> Result<GeneratorResult<S>, Error> {
        self.refresh_result(id);
        self.results
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found("result", id.to_string()))
    }

    /// Erases a result. Fails with [`Error::Busy`] if the result is active
    /// (spec.md section 4.2: "result ops").
    pub fn result_erase(&mut self, id: &Id) -> Result<(), Error> {
        let result = self
            .results
            .get(id)
            .ok_or_else(|| Error::not_found("result", id.to_string()))?;
        if result.active() {
            return Err(Error::busy("result", id.to_string()));
        }
        self.results.remove(id);
        Ok(())
    }

    fn refresh_active_results(&mut self) {
        let ids: Vec<Id> = self.results.iter().filter(|(_, r)| r.active()).map(|(id, _)| id.clone()).collect();
        for id in ids {
            self.refresh_result(&id);
        }
    }

    fn refresh_result(&mut self, id: &Id) {
        let Some(result) = self.results.get(id) else { return };
        if !result.active() {
            return;
        }
        let generator_id = result.generator_id().clone();
        if let Some(worker) = self.workers.get(&generator_id) {
            let stats = worker.stats();
            self.results.get_mut(id).expect("checked above").update_stats(stats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct FakeWorker(u64);
    impl GeneratorWorker<u64> for FakeWorker {
        fn stop(self: Box<Self>) {}
        fn stats(&self) -> u64 {
            self.0
        }
    }

    fn fixture() -> Registry<u64, u64> {
        Registry::new(
            "generator",
            |cfg: &u64| if *cfg == 0 { Err("config must be non-zero".into()) } else { Ok(()) },
            Arc::new(|_id, cfg: &u64| Box::new(FakeWorker(*cfg)) as Box<dyn GeneratorWorker<u64>>),
        )
    }

    #[test]
    fn create_rejects_duplicate_id() {
        let mut reg = fixture();
        let id = Id::parse("gen-1").unwrap();
        reg.create(Some(id.clone()), 1).unwrap();
        let err = reg.create(Some(id.clone()), 1).unwrap_err();
        assert!(matches!(err, Error::Exists { .. }));
    }

    #[test]
    fn create_rejects_invalid_config() {
        let mut reg = fixture();
        let err = reg.create(Some(Id::parse("gen-1").unwrap()), 0).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn start_then_stop_leaves_inactive_result() {
        let mut reg = fixture();
        let id = Id::parse("gen-1").unwrap();
        reg.create(Some(id.clone()), 7).unwrap();

        let result = reg.start(&id, None).unwrap();
        assert!(result.active());
        assert_eq!(reg.get(&id).unwrap().running(), true);

        reg.stop(&id).unwrap();
        let stopped = reg.result_get(result.id()).unwrap();
        assert!(!stopped.active());
        assert_eq!(reg.get(&id).unwrap().running(), false);
    }

    #[test]
    fn erase_drops_inactive_results_but_blocks_while_running() {
        let mut reg = fixture();
        let id = Id::parse("gen-1").unwrap();
        reg.create(Some(id.clone()), 5).unwrap();
        let result = reg.start(&id, None).unwrap();

        let err = reg.erase(&id).unwrap_err();
        assert!(matches!(err, Error::Busy { .. }));

        reg.stop(&id).unwrap();
        reg.erase(&id).unwrap();
        assert!(reg.result_get(result.id()).is_err());
        assert!(reg.get(&id).is_err());
    }

    #[test]
    fn bulk_create_rolls_back_all_on_first_failure() {
        let mut reg = fixture();
        let before = reg.list().len();
        let err = reg.bulk_create(vec![
            (Some(Id::parse("gen-1").unwrap()), 1),
            (Some(Id::parse("gen-2").unwrap()), 0),
        ]);
        assert!(err.is_err());
        assert_eq!(reg.list().len(), before);
    }

    #[test]
    fn bulk_erase_is_best_effort() {
        let mut reg = fixture();
        let running_id = Id::parse("gen-running").unwrap();
        let idle_id = Id::parse("gen-idle").unwrap();
        reg.create(Some(running_id.clone()), 1).unwrap();
        reg.create(Some(idle_id.clone()), 1).unwrap();
        reg.start(&running_id, None).unwrap();

        let erased = reg.bulk_erase(&[running_id.clone(), idle_id.clone(), Id::parse("missing").unwrap()]);
        assert_eq!(erased, vec![idle_id]);
        assert!(reg.get(&running_id).is_ok());
    }

    #[test]
    fn toggle_preserves_result_continuity_and_stops_outgoing() {
        let mut reg = fixture();
        let out_id = Id::parse("gen-out").unwrap();
        let in_id = Id::parse("gen-in").unwrap();
        reg.create(Some(out_id.clone()), 1).unwrap();
        reg.create(Some(in_id.clone()), 2).unwrap();
        reg.start(&out_id, None).unwrap();

        let new_result = reg.toggle(&out_id, &in_id, None).unwrap();
        assert!(new_result.active());
        assert_eq!(new_result.generator_id(), &in_id);
        assert!(!reg.get(&out_id).unwrap().running());
        assert!(reg.get(&in_id).unwrap().running());

        // The continued result carries `out_id`'s final stats (its config, 1,
        // per `FakeWorker`), not a zeroed default.
        assert_eq!(*new_result.stats(), 1);

        // Polling the same result id now refreshes from `in_id`'s worker.
        let refreshed = reg.result_get(new_result.id()).unwrap();
        assert_eq!(*refreshed.stats(), 2);
        assert_eq!(refreshed.id(), new_result.id());
    }

    #[test]
    fn toggle_rejects_when_incoming_already_running() {
        let mut reg = fixture();
        let out_id = Id::parse("gen-out").unwrap();
        let in_id = Id::parse("gen-in").unwrap();
        reg.create(Some(out_id.clone()), 1).unwrap();
        reg.create(Some(in_id.clone()), 2).unwrap();
        reg.start(&out_id, None).unwrap();
        reg.start(&in_id, None).unwrap();

        let err = reg.toggle(&out_id, &in_id, None).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert!(reg.get(&out_id).unwrap().running());
    }
}
