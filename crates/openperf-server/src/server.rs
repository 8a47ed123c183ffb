// SPDX-License-Identifier: Apache-2.0

//! The generic module server event loop (spec.md section 4.4).
//!
//! A module server owns a reply endpoint, its [`Registry`], and an event-loop
//! callback that dispatches each request to the registry via an exhaustive
//! match and sends back the typed reply. This is written once and
//! instantiated per module kind in [`crate::modules`].

use openperf_channel::bus::{self, BusError, BusSender};
use openperf_channel::error::ThreadTaskError;
use openperf_channel::thread_task::{self, ThreadLocalTaskHandle};
use openperf_model::registry::Registry;
use openperf_model::request::{Reply, Request};
use openperf_model::worker::WorkerFactory;

/// The default backlog of in-flight requests a module server's bus will queue
/// before callers start waiting for a free slot.
const BUS_CAPACITY: usize = 256;

/// A handle to a running module server: a bus sender every caller can clone,
/// plus the ability to shut the server's thread down.
pub struct ModuleServerHandle<C, S> {
    sender: BusSender<Request<C>, Reply<C, S>>,
    task: ThreadLocalTaskHandle<(), ThreadTaskError>,
}

impl<C, S> ModuleServerHandle<C, S>
where
    C: Send + 'static,
    S: Send + 'static,
{
    /// Sends a request and awaits the module server's reply.
    pub async fn call(&self, request: Request<C>) -> Result<Reply<C, S>, BusError<Request<C>>> {
        self.sender.call(request).await
    }

    /// Returns a cloned sender so multiple callers (REST handlers, the TVLP
    /// worker) can reach this module server concurrently.
    #[must_use]
    pub fn sender(&self) -> BusSender<Request<C>, Reply<C, S>> {
        self.sender.clone()
    }

    /// Requests the server's event loop exit and waits for its thread to join
    /// (spec.md section 5: "a shutdown message ... causes the event loop to
    /// exit and all owned workers to be joined").
    pub fn shutdown_and_join(self) -> Result<(), ThreadTaskError> {
        self.task.shutdown_and_join()
    }
}

/// Spawns a module server on a dedicated OS thread: a single-threaded Tokio
/// runtime driving the event loop, owning one [`Registry<C, S>`] for the
/// lifetime of the thread (spec.md section 9: "single-writer registry").
pub fn spawn<C, S>(
    kind: &'static str,
    validate: impl Fn(&C) -> Result<(), String> + Send + Sync + 'static,
    worker_factory: WorkerFactory<C, S>,
) -> ModuleServerHandle<C, S>
where
    C: Clone + Send + 'static,
    S: Clone + Default + Send + 'static,
{
    let (sender, mut receiver) = bus::bus::<Request<C>, Reply<C, S>>(BUS_CAPACITY);

    let task = thread_task::spawn_thread_local_task(format!("openperf-{kind}-server"), move |cancel| async move {
        let mut registry = Registry::new(kind, validate, worker_factory);
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                envelope = receiver.recv() => {
                    let Some(envelope) = envelope else { break };
                    let (request, reply) = envelope.into_parts();
                    let response = dispatch(&mut registry, request);
                    if reply.reply(response).is_err() {
                        tracing::debug!(module = kind, "caller dropped before reply was delivered");
                    }
                }
            }
        }
        Ok::<(), ThreadTaskError>(())
    })
    .expect("failed to spawn module server thread");

    ModuleServerHandle { sender, task }
}

/// Dispatches one request to the registry and builds the matching reply
/// (spec.md section 4.4: "dispatches to the registry via a `std::visit`-
/// equivalent exhaustive match").
fn dispatch<C, S>(registry: &mut Registry<C, S>, request: Request<C>) -> Reply<C, S>
where
    C: Clone,
    S: Clone + Default,
{
    match request {
        Request::List => Reply::Generators(registry.list()),
        Request::Get(id) => match registry.get(&id) {
            Ok(generator) => Reply::Generator(generator),
            Err(err) => Reply::Err(err),
        },
        Request::Create { id, config } => match registry.create(id, config) {
            Ok(generator) => Reply::Generator(generator),
            Err(err) => Reply::Err(err),
        },
        Request::Erase(id) => registry.erase(&id).into(),
        Request::BulkCreate(items) => match registry.bulk_create(items) {
            Ok(created) => Reply::BulkGenerators(created),
            Err(err) => Reply::Err(err),
        },
        Request::BulkErase(ids) => Reply::BulkErased(registry.bulk_erase(&ids)),
        Request::Start { id, dynamic_results } => match registry.start(&id, dynamic_results) {
            Ok(result) => Reply::Result(result),
            Err(err) => Reply::Err(err),
        },
        Request::Stop(id) => registry.stop(&id).into(),
        Request::Toggle { out_id, in_id, dynamic_results } => match registry.toggle(&out_id, &in_id, dynamic_results) {
            Ok(result) => Reply::Result(result),
            Err(err) => Reply::Err(err),
        },
        Request::ResultList => Reply::Results(registry.result_list()),
        Request::ResultGet(id) => match registry.result_get(&id) {
            Ok(result) => Reply::Result(result),
            Err(err) => Reply::Err(err),
        },
        Request::ResultErase(id) => registry.result_erase(&id).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openperf_model::id::Id;
    use openperf_model::worker::GeneratorWorker;
    use std::sync::Arc;

    struct FakeWorker;
    impl GeneratorWorker<u32> for FakeWorker {
        fn stop(self: Box<Self>) {}
        fn stats(&self) -> u32 {
            0
        }
    }

    fn spawn_fixture() -> ModuleServerHandle<u32, u32> {
        spawn(
            "test",
            |cfg: &u32| if *cfg == 0 { Err("zero config rejected".into()) } else { Ok(()) },
            Arc::new(|_id, _cfg: &u32| Box::new(FakeWorker) as Box<dyn GeneratorWorker<u32>>),
        )
    }

    #[tokio::test]
    async fn create_then_list_round_trips_over_the_bus() {
        let server = spawn_fixture();
        let id = Id::parse("gen-1").unwrap();

        let reply = server.call(Request::Create { id: Some(id.clone()), config: 7 }).await.unwrap();
        assert!(matches!(reply, Reply::Generator(_)));

        let reply = server.call(Request::List).await.unwrap();
        let Reply::Generators(generators) = reply else { panic!("expected Generators") };
        assert_eq!(generators.len(), 1);
        assert_eq!(generators[0].id(), &id);

        server.shutdown_and_join().unwrap();
    }

    #[tokio::test]
    async fn invalid_config_surfaces_as_typed_error() {
        let server = spawn_fixture();
        let reply = server.call(Request::Create { id: None, config: 0 }).await.unwrap();
        assert!(matches!(reply, Reply::Err(openperf_model::Error::InvalidArgument { .. })));
        server.shutdown_and_join().unwrap();
    }
}
